//! 模板孔位标注.
//!
//! 模板为固定在会阴部的 63 孔 (9 行 × 7 列) 网格. 每根针的底部点在给定的
//! 刚体变换下与最近的孔位 (平面距离) 匹配, 得到形如 `"Ba"` 的标签.

use once_cell::sync::Lazy;
use ordered_float::NotNan;

use crate::consts::template::*;
use crate::consts::UNASSIGNED_LABEL;
use crate::{Affine, Vec3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 模板上的一个孔位. 坐标位于模板自身的平面坐标系内 (单位: 毫米).
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TemplateHole {
    /// 标签, 行 (大写) + 列 (小写).
    pub label: String,

    /// x 坐标.
    pub x: f64,

    /// y 坐标.
    pub y: f64,
}

impl TemplateHole {
    /// 初始化.
    pub fn new<S: Into<String>>(label: S, x: f64, y: f64) -> Self {
        Self {
            label: label.into(),
            x,
            y,
        }
    }

    /// 孔位在模板坐标系中的三维坐标 (`z = 0`).
    #[inline]
    pub fn position(&self) -> Vec3 {
        Vec3::new(self.x, self.y, 0.0)
    }
}

static DEFAULT_TABLE: Lazy<TemplateHoleTable> = Lazy::new(|| {
    let rows = ROW_LABELS.len() as f64;
    let cols = COLUMN_LABELS.len() as f64;
    let holes = ROW_LABELS
        .iter()
        .enumerate()
        .flat_map(|(r, &row)| {
            COLUMN_LABELS.iter().enumerate().map(move |(c, &col)| {
                let x = (c as f64 - (cols - 1.0) / 2.0) * HOLE_PITCH_MM;
                let y = ((rows - 1.0) / 2.0 - r as f64) * HOLE_PITCH_MM;
                TemplateHole::new(format!("{row}{col}"), x, y)
            })
        })
        .collect();
    TemplateHoleTable { holes }
});

/// 孔位表. 在进程生命周期内不变.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TemplateHoleTable {
    holes: Vec<TemplateHole>,
}

impl TemplateHoleTable {
    /// 以任意孔位初始化. 匹配时的平局按此顺序打破.
    pub fn new(holes: Vec<TemplateHole>) -> Self {
        Self { holes }
    }

    /// 标准 63 孔模板: 行 `A..=I` 从上到下, 列 `a..=g` 从左到右,
    /// 间距 [`HOLE_PITCH_MM`], 中心孔 `"Ed"` 位于原点.
    #[inline]
    pub fn standard() -> &'static Self {
        &DEFAULT_TABLE
    }

    /// 全部孔位.
    #[inline]
    pub fn holes(&self) -> &[TemplateHole] {
        &self.holes
    }

    /// 孔位数.
    #[inline]
    pub fn len(&self) -> usize {
        self.holes.len()
    }

    /// 是否为空表.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.holes.is_empty()
    }

    /// 按标签查找.
    pub fn get(&self, label: &str) -> Option<&TemplateHole> {
        self.holes.iter().find(|h| h.label == label)
    }
}

impl Default for TemplateHoleTable {
    fn default() -> Self {
        DEFAULT_TABLE.clone()
    }
}

/// 最近孔位匹配器.
///
/// 变换后的孔位坐标会被缓存, 只在 [`Self::set_transform`] 时重新计算.
/// 这是简单的最近邻分配, 多根针竞争同一孔位时不做全局去重.
#[derive(Clone, Debug)]
pub struct HoleLabelMatcher {
    table: TemplateHoleTable,
    transform: Affine,
    transformed: Vec<Vec3>,
    max_distance: f64,
}

impl Default for HoleLabelMatcher {
    fn default() -> Self {
        Self::new(TemplateHoleTable::default())
    }
}

impl HoleLabelMatcher {
    /// 以单位变换初始化, 最大匹配距离为 [`MAX_MATCH_DISTANCE_MM`].
    pub fn new(table: TemplateHoleTable) -> Self {
        let transformed = table.holes.iter().map(TemplateHole::position).collect();
        Self {
            table,
            transform: Affine::identity(),
            transformed,
            max_distance: MAX_MATCH_DISTANCE_MM,
        }
    }

    /// 设置最大匹配距离. 不限制时传入 `f64::INFINITY`.
    pub fn with_max_distance(mut self, max_distance: f64) -> Self {
        self.max_distance = max_distance;
        self
    }

    /// 孔位表.
    #[inline]
    pub fn table(&self) -> &TemplateHoleTable {
        &self.table
    }

    /// 当前的模板到病人的刚体变换.
    #[inline]
    pub fn transform(&self) -> &Affine {
        &self.transform
    }

    /// 更新变换并重新计算所有孔位的位置.
    pub fn set_transform(&mut self, transform: Affine) {
        self.transform = transform;
        self.transformed = self
            .table
            .holes
            .iter()
            .map(|h| transform.apply(h.position()))
            .collect();
        log::debug!("template transform updated, {} holes recomputed", self.transformed.len());
    }

    /// 变换后的孔位坐标, 与孔位表一一对应.
    #[inline]
    pub fn transformed_holes(&self) -> &[Vec3] {
        &self.transformed
    }

    /// 平面距离最近的孔位下标及距离. 距离相同时取表中靠前者.
    /// 不考虑最大匹配距离.
    pub fn nearest(&self, base: Vec3) -> Option<(usize, f64)> {
        self.transformed
            .iter()
            .enumerate()
            .filter_map(|(i, h)| NotNan::new(h.planar_distance(base)).ok().map(|d| (d, i)))
            .min_by_key(|&(d, _)| d)
            .map(|(d, i)| (i, d.into_inner()))
    }

    /// 匹配到的孔位. 超过最大匹配距离时返回 `None`.
    pub fn match_hole(&self, base: Vec3) -> Option<&TemplateHole> {
        self.nearest(base)
            .filter(|&(_, d)| d <= self.max_distance)
            .map(|(i, _)| &self.table.holes[i])
    }

    /// 匹配到的标签. 无匹配时返回 [`UNASSIGNED_LABEL`].
    pub fn match_label(&self, base: Vec3) -> &str {
        self.match_hole(base)
            .map_or(UNASSIGNED_LABEL, |h| h.label.as_str())
    }
}
