//! 三维几何基础: 向量与仿射变换.

use crate::{TrackError, TrackResult};
use std::ops::{Add, AddAssign, Mul, Neg, Sub};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 三维点 / 向量. 既可以表示体素坐标 (可为小数), 也可以表示物理坐标 (毫米).
#[derive(Copy, Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Vec3 {
    /// x 分量.
    pub x: f64,

    /// y 分量.
    pub y: f64,

    /// z 分量.
    pub z: f64,
}

impl Vec3 {
    /// 零向量.
    pub const ZERO: Vec3 = Vec3::new(0.0, 0.0, 0.0);

    /// 构建向量.
    #[inline]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// 点积.
    #[inline]
    pub fn dot(&self, rhs: Vec3) -> f64 {
        self.x * rhs.x + self.y * rhs.y + self.z * rhs.z
    }

    /// 欧几里得长度.
    #[inline]
    pub fn norm(&self) -> f64 {
        self.dot(*self).sqrt()
    }

    /// 到 `rhs` 的欧几里得距离.
    #[inline]
    pub fn distance(&self, rhs: Vec3) -> f64 {
        (*self - rhs).norm()
    }

    /// 只考虑 `(x, y)` 平面的欧几里得距离.
    #[inline]
    pub fn planar_distance(&self, rhs: Vec3) -> f64 {
        (self.x - rhs.x).hypot(self.y - rhs.y)
    }

    /// 线性插值. `t == 0` 时为 `self`, `t == 1` 时为 `rhs`.
    #[inline]
    pub fn lerp(&self, rhs: Vec3, t: f64) -> Vec3 {
        *self + (rhs - *self) * t
    }

    /// 单位化. 零向量返回 `None`.
    pub fn normalized(&self) -> Option<Vec3> {
        let n = self.norm();
        (n > 0.0 && n.is_finite()).then(|| *self * (1.0 / n))
    }

    /// 各分量四舍五入.
    #[inline]
    pub fn round(&self) -> Vec3 {
        Vec3::new(self.x.round(), self.y.round(), self.z.round())
    }

    /// 各分量是否都是有限值.
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    /// 转换为数组 `[x, y, z]`.
    #[inline]
    pub fn to_array(self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

impl From<[f64; 3]> for Vec3 {
    #[inline]
    fn from([x, y, z]: [f64; 3]) -> Self {
        Self::new(x, y, z)
    }
}

impl Add for Vec3 {
    type Output = Vec3;

    #[inline]
    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl AddAssign for Vec3 {
    #[inline]
    fn add_assign(&mut self, rhs: Vec3) {
        *self = *self + rhs;
    }
}

impl Sub for Vec3 {
    type Output = Vec3;

    #[inline]
    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for Vec3 {
    type Output = Vec3;

    #[inline]
    fn mul(self, k: f64) -> Vec3 {
        Vec3::new(self.x * k, self.y * k, self.z * k)
    }
}

impl Neg for Vec3 {
    type Output = Vec3;

    #[inline]
    fn neg(self) -> Vec3 {
        self * -1.0
    }
}

/// 三维仿射变换 `p' = M * p + t`.
///
/// 既用于体数据的体素 -> 物理坐标变换 (IJK -> RAS),
/// 也用于模板 -> 病人的刚体变换.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Affine {
    linear: [[f64; 3]; 3],
    translation: [f64; 3],
}

impl Default for Affine {
    fn default() -> Self {
        Self::identity()
    }
}

impl Affine {
    /// 恒等变换.
    pub const fn identity() -> Self {
        Self {
            linear: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            translation: [0.0; 3],
        }
    }

    /// 从线性部分和平移部分构建.
    #[inline]
    pub const fn new(linear: [[f64; 3]; 3], translation: [f64; 3]) -> Self {
        Self {
            linear,
            translation,
        }
    }

    /// 从 4x4 齐次矩阵的前三行构建 (nifti `srow_{x, y, z}` 即此格式).
    pub fn from_rows(rows: [[f64; 4]; 3]) -> Self {
        let mut linear = [[0.0; 3]; 3];
        let mut translation = [0.0; 3];
        for (r, row) in rows.iter().enumerate() {
            linear[r].copy_from_slice(&row[..3]);
            translation[r] = row[3];
        }
        Self {
            linear,
            translation,
        }
    }

    /// 轴对齐的缩放 + 平移. `spacing` 为各轴体素尺寸, `origin` 为体素 `(0, 0, 0)`
    /// 的物理坐标.
    pub fn from_spacing(spacing: [f64; 3], origin: Vec3) -> Self {
        let [sx, sy, sz] = spacing;
        Self {
            linear: [[sx, 0.0, 0.0], [0.0, sy, 0.0], [0.0, 0.0, sz]],
            translation: origin.to_array(),
        }
    }

    /// 纯平移.
    pub fn from_translation(t: Vec3) -> Self {
        Self {
            translation: t.to_array(),
            ..Self::identity()
        }
    }

    /// 绕 Z 轴旋转 `angle` (弧度) 后平移 `t`. 模板配准中最常见的刚体变换形式.
    pub fn from_rotation_z(angle: f64, t: Vec3) -> Self {
        let (s, c) = angle.sin_cos();
        Self {
            linear: [[c, -s, 0.0], [s, c, 0.0], [0.0, 0.0, 1.0]],
            translation: t.to_array(),
        }
    }

    /// 线性部分.
    #[inline]
    pub fn linear(&self) -> &[[f64; 3]; 3] {
        &self.linear
    }

    /// 平移部分.
    #[inline]
    pub fn translation(&self) -> Vec3 {
        self.translation.into()
    }

    /// 变换一个点.
    #[inline]
    pub fn apply(&self, p: Vec3) -> Vec3 {
        let m = &self.linear;
        let t = &self.translation;
        Vec3::new(
            m[0][0] * p.x + m[0][1] * p.y + m[0][2] * p.z + t[0],
            m[1][0] * p.x + m[1][1] * p.y + m[1][2] * p.z + t[1],
            m[2][0] * p.x + m[2][1] * p.y + m[2][2] * p.z + t[2],
        )
    }

    /// 变换一个向量 (不含平移).
    #[inline]
    pub fn apply_vector(&self, v: Vec3) -> Vec3 {
        self.apply(v) - self.translation()
    }

    /// 线性部分的行列式.
    pub fn determinant(&self) -> f64 {
        let m = &self.linear;
        m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
            - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
            + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
    }

    /// 逆变换. 线性部分奇异 (或含非有限值) 时返回 `Err`.
    pub fn inverse(&self) -> TrackResult<Affine> {
        let det = self.determinant();
        if !det.is_finite() || det.abs() < 1e-12 {
            return Err(TrackError::SingularTransform);
        }
        let m = &self.linear;
        // 伴随矩阵 / det
        let inv_det = 1.0 / det;
        let linear = [
            [
                (m[1][1] * m[2][2] - m[1][2] * m[2][1]) * inv_det,
                (m[0][2] * m[2][1] - m[0][1] * m[2][2]) * inv_det,
                (m[0][1] * m[1][2] - m[0][2] * m[1][1]) * inv_det,
            ],
            [
                (m[1][2] * m[2][0] - m[1][0] * m[2][2]) * inv_det,
                (m[0][0] * m[2][2] - m[0][2] * m[2][0]) * inv_det,
                (m[0][2] * m[1][0] - m[0][0] * m[1][2]) * inv_det,
            ],
            [
                (m[1][0] * m[2][1] - m[1][1] * m[2][0]) * inv_det,
                (m[0][1] * m[2][0] - m[0][0] * m[2][1]) * inv_det,
                (m[0][0] * m[1][1] - m[0][1] * m[1][0]) * inv_det,
            ],
        ];
        let partial = Affine::new(linear, [0.0; 3]);
        let t = -partial.apply(self.translation());
        Ok(Affine::new(linear, t.to_array()))
    }

    /// 复合变换 `self ∘ rhs`, 即先应用 `rhs` 再应用 `self`.
    pub fn compose(&self, rhs: &Affine) -> Affine {
        let a = &self.linear;
        let b = &rhs.linear;
        let mut linear = [[0.0; 3]; 3];
        for (r, row) in linear.iter_mut().enumerate() {
            for (c, v) in row.iter_mut().enumerate() {
                *v = (0..3).map(|k| a[r][k] * b[k][c]).sum();
            }
        }
        let t = self.apply(rhs.translation());
        Affine::new(linear, t.to_array())
    }
}
