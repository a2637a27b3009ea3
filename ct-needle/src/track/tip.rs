//! 针尖修正.

use ordered_float::OrderedFloat;

use super::Objective;
use crate::{TrackingParameters, Vec3, VolumeSampler};

/// 在针尖附近的长方体内搜索最优点.
///
/// 长方体以点击位置 (取整后) 为中心, 半宽由 `tip_box_xy_mm` / `tip_box_z_mm`
/// 换算为体素. 采样密度为每体素一个点, 越界点不参与比较.
/// 得分相同时离点击位置 (物理距离) 最近的点胜出.
pub struct TipRefiner<'a, V: ?Sized> {
    volume: &'a V,
    objective: Objective,
    offsets: Vec<(i64, i64, i64)>,
}

impl<'a, V: VolumeSampler + ?Sized> TipRefiner<'a, V> {
    /// 初始化, 并按物理距离预先排好搜索偏移.
    pub fn new(volume: &'a V, params: &TrackingParameters) -> Self {
        let spacing = volume.spacing();
        let half = |mm: f64, s: f64| (mm / s).round().max(0.0) as i64;
        let (hx, hy, hz) = (
            half(params.tip_box_xy_mm, spacing[0]),
            half(params.tip_box_xy_mm, spacing[1]),
            half(params.tip_box_z_mm, spacing[2]),
        );

        let mut offsets = Vec::with_capacity(((2 * hx + 1) * (2 * hy + 1) * (2 * hz + 1)) as usize);
        for dz in -hz..=hz {
            for dy in -hy..=hy {
                for dx in -hx..=hx {
                    offsets.push((dx, dy, dz));
                }
            }
        }
        let dist2 = |&(dx, dy, dz): &(i64, i64, i64)| {
            let (x, y, z) = (
                dx as f64 * spacing[0],
                dy as f64 * spacing[1],
                dz as f64 * spacing[2],
            );
            x * x + y * y + z * z
        };
        offsets.sort_by(|a, b| dist2(a).total_cmp(&dist2(b)));

        Self {
            volume,
            objective: Objective::new(params, spacing),
            offsets,
        }
    }

    /// 搜索框内的点数.
    #[inline]
    pub fn box_len(&self) -> usize {
        self.offsets.len()
    }

    #[inline]
    fn candidate(&self, center: Vec3, (dx, dy, dz): (i64, i64, i64)) -> Option<(Vec3, f64)> {
        let p = Vec3::new(
            center.x + dx as f64,
            center.y + dy as f64,
            center.z + dz as f64,
        );
        self.volume
            .contains(p)
            .then(|| (p, self.objective.point_score(self.volume, p)))
    }

    /// 修正针尖. `click` 为体素坐标. 搜索框全部越界时原样返回.
    pub fn refine(&self, click: Vec3) -> Vec3 {
        let center = click.round();
        self.offsets
            .iter()
            .filter_map(|&o| self.candidate(center, o))
            .min_by_key(|&(_, score)| OrderedFloat(score))
            .map_or(click, |(p, _)| p)
    }
}

#[cfg(feature = "rayon")]
impl<'a, V: VolumeSampler + Sync + ?Sized> TipRefiner<'a, V> {
    /// 借助 `rayon`, 并行地修正针尖. 结果与 [`TipRefiner::refine`] 相同.
    pub fn par_refine(&self, click: Vec3) -> Vec3 {
        use rayon::iter::{IndexedParallelIterator, IntoParallelRefIterator, ParallelIterator};

        let center = click.round();
        self.offsets
            .par_iter()
            .enumerate()
            .filter_map(|(i, &o)| self.candidate(center, o).map(|c| (i, c)))
            .min_by_key(|&(i, (_, score))| (OrderedFloat(score), i))
            .map_or(click, |(_, (p, _))| p)
    }
}
