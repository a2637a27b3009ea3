//! 合成体模. 生成带有若干直针的体数据, 用于测试与消融实验.

use ndarray::Array3;

use crate::{Idx3d, TrackResult, Vec3, Volume};

/// 体模中的一根直针, 坐标均为体素坐标.
#[derive(Copy, Clone, Debug)]
pub struct PhantomNeedle {
    /// 针的一端.
    pub from: Vec3,

    /// 针的另一端.
    pub to: Vec3,

    /// 针半径 (单位: 体素). 体素中心到针轴线的距离不大于该值时被视为针.
    pub radius: f64,

    /// 针的强度.
    pub intensity: f32,
}

impl PhantomNeedle {
    /// 计算点 `p` 到针轴线段的距离.
    pub fn distance_to(&self, p: Vec3) -> f64 {
        let d = self.to - self.from;
        let len2 = d.dot(d);
        let t = if len2 > 0.0 {
            ((p - self.from).dot(d) / len2).clamp(0.0, 1.0)
        } else {
            0.0
        };
        p.distance(self.from + d * t)
    }
}

/// 体模构建器.
#[derive(Clone, Debug)]
pub struct NeedlePhantom {
    shape: Idx3d,
    spacing: [f64; 3],
    origin: Vec3,
    background: f32,
    needles: Vec<PhantomNeedle>,
}

impl NeedlePhantom {
    /// 以 `(nx, ny, nz)` 个体素初始化. 默认体素尺寸为 1 毫米,
    /// 原点为 `(0, 0, 0)`, 背景强度为 100.
    pub fn new(shape: Idx3d) -> Self {
        Self {
            shape,
            spacing: [1.0; 3],
            origin: Vec3::ZERO,
            background: 100.0,
            needles: vec![],
        }
    }

    /// 设置体素尺寸.
    pub fn spacing(mut self, spacing: [f64; 3]) -> Self {
        self.spacing = spacing;
        self
    }

    /// 设置原点的物理坐标.
    pub fn origin(mut self, origin: Vec3) -> Self {
        self.origin = origin;
        self
    }

    /// 设置背景强度.
    pub fn background(mut self, background: f32) -> Self {
        self.background = background;
        self
    }

    /// 添加一根任意方向的直针.
    pub fn needle(mut self, needle: PhantomNeedle) -> Self {
        self.needles.push(needle);
        self
    }

    /// 添加一根沿 `k` 轴、一个体素宽的直针, 位于 `(i, j)`, 覆盖整个 `k` 范围.
    pub fn vertical_line(self, i: f64, j: f64, intensity: f32) -> Self {
        let top = self.shape.2.saturating_sub(1) as f64;
        self.needle(PhantomNeedle {
            from: Vec3::new(i, j, 0.0),
            to: Vec3::new(i, j, top),
            radius: 0.5,
            intensity,
        })
    }

    /// 已添加的针.
    #[inline]
    pub fn needles(&self) -> &[PhantomNeedle] {
        &self.needles
    }

    /// 生成体数据. 后添加的针覆盖先添加的针.
    pub fn build(&self) -> TrackResult<Volume> {
        let (nx, ny, nz) = self.shape;
        let data = Array3::from_shape_fn((nz, ny, nx), |(k, j, i)| {
            let p = Vec3::new(i as f64, j as f64, k as f64);
            self.needles
                .iter()
                .rev()
                .find(|n| n.distance_to(p) <= n.radius)
                .map_or(self.background, |n| n.intensity)
        });
        Volume::from_spacing(data, self.spacing, self.origin)
    }
}
