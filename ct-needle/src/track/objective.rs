//! 目标函数. 为候选线段打分, 得分越低越像针.

use crate::{TrackingParameters, Vec3, VolumeSampler};

/// 梯度项使用的 8 个平面偏移方向 (未缩放).
const NEIGHBOUR_OFFSETS: [(f64, f64); 8] = [
    (1.0, 0.0),
    (-1.0, 0.0),
    (0.0, 1.0),
    (0.0, -1.0),
    (1.0, 1.0),
    (1.0, -1.0),
    (-1.0, 1.0),
    (-1.0, -1.0),
];

/// 保号幂: `sign(v) * |v|^e`. 保证负数的幂仍然有意义且保持单调.
#[inline]
pub fn signed_pow(v: f64, e: f64) -> f64 {
    v.signum() * v.abs().powf(e)
}

/// 高斯衰减权重, 取值 `(0, 1]`.
///
/// `d` 为候选点到圆锥轴线的距离, `r_max` 为本步圆锥半径.
/// `r_max` 不为正时不衰减.
#[inline]
pub fn gaussian_weight(d: f64, r_max: f64, sigma: f64) -> f64 {
    if r_max <= 0.0 {
        return 1.0;
    }
    let s = sigma / 10.0;
    (-(d / r_max).powi(2) / (2.0 * s * s)).exp()
}

/// 按衰减权重 `w` 把得分推向 "更差" 的一侧.
///
/// 得分越低越好: 非正得分乘以 `w` (向 0 靠拢), 正得分除以 `w` (变大).
#[inline]
pub fn attenuate(score: f64, w: f64) -> f64 {
    if score <= 0.0 {
        score * w
    } else {
        score / w
    }
}

/// 一个候选点的得分.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Score {
    /// 线段上所有插值点得分的平均值, 不含衰减. 用于反向追踪质量门限.
    pub raw: f64,

    /// 用于排序的得分 (可能含高斯衰减).
    pub ranked: f64,
}

/// 目标函数, 已将毫米单位的参数换算到体素单位.
#[derive(Copy, Clone, Debug)]
pub struct Objective {
    /// 梯度项邻域偏移距离 (单位: 体素).
    needle_radius: f64,
    gradient_ponderation: f64,
    center_ponderation: f64,
    /// `1.0` 或 `-1.0`. 亮针 (CT) 时为 `-1.0`.
    polarity: f64,
    segment_samples: u32,
    /// 启用高斯衰减时为 `Some(sigma)`.
    attenuation: Option<f64>,
}

impl Objective {
    /// 从追踪参数构建. `spacing` 为体素尺寸, 用于将针半径换算为体素.
    pub fn new(params: &TrackingParameters, spacing: [f64; 3]) -> Self {
        let needle_radius = (params.needle_radius_mm / spacing[0]).max(1.0);
        Self {
            needle_radius,
            gradient_ponderation: params.gradient_ponderation,
            center_ponderation: params.center_ponderation,
            polarity: if params.invert_contrast { -1.0 } else { 1.0 },
            segment_samples: params.segment_samples.max(1),
            attenuation: params.gaussian_attenuation.then_some(params.sigma),
        }
    }

    /// 梯度项邻域偏移距离 (单位: 体素).
    #[inline]
    pub fn needle_radius(&self) -> f64 {
        self.needle_radius
    }

    /// 单点得分.
    ///
    /// 中心强度减去 "邻域平均强度与中心强度之差" 的加权值, 再做中心加权指数.
    /// 只有不越界的邻域点参与平均; 全部越界时不计梯度项.
    pub fn point_score<V: VolumeSampler + ?Sized>(&self, volume: &V, p: Vec3) -> f64 {
        let center = self.polarity * volume.sample(p);
        let mut v = center;
        if self.gradient_ponderation != 0.0 {
            let r = self.needle_radius;
            let (sum, cnt) = NEIGHBOUR_OFFSETS
                .iter()
                .map(|&(dx, dy)| Vec3::new(p.x + dx * r, p.y + dy * r, p.z))
                .filter(|q| volume.contains(*q))
                .fold((0.0, 0u32), |(s, c), q| {
                    (s + self.polarity * volume.sample(q), c + 1)
                });
            if cnt != 0 {
                let mean = sum / cnt as f64;
                v -= self.gradient_ponderation * (mean - center);
            }
        }
        signed_pow(v, self.center_ponderation)
    }

    /// 线段 `from -> to` 上 `segment_samples + 1` 个等距插值点的平均得分.
    pub fn segment_score<V: VolumeSampler + ?Sized>(&self, volume: &V, from: Vec3, to: Vec3) -> f64 {
        let n = self.segment_samples;
        let total: f64 = (0..=n)
            .map(|t| self.point_score(volume, from.lerp(to, t as f64 / n as f64)))
            .sum();
        total / (n + 1) as f64
    }

    /// 候选点得分.
    ///
    /// `apex` 为上一个控制点, `candidate` 为候选点, `axis` 为本步圆锥轴线上的点,
    /// `r_max` 为本步圆锥半径 (单位: 体素).
    pub fn score<V: VolumeSampler + ?Sized>(
        &self,
        volume: &V,
        apex: Vec3,
        candidate: Vec3,
        axis: Vec3,
        r_max: f64,
    ) -> Score {
        let raw = self.segment_score(volume, apex, candidate);
        let ranked = match self.attenuation {
            Some(sigma) => {
                let d = candidate.planar_distance(axis);
                attenuate(raw, gaussian_weight(d, r_max, sigma))
            }
            None => raw,
        };
        Score { raw, ranked }
    }
}

#[cfg(test)]
mod tests {
    use super::{attenuate, gaussian_weight, signed_pow, Objective};
    use crate::data::phantom::NeedlePhantom;
    use crate::{TrackingParameters, Vec3};

    fn f64_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn params(gradient: f64, invert: bool) -> TrackingParameters {
        TrackingParameters {
            gradient_ponderation: gradient,
            center_ponderation: 1.0,
            invert_contrast: invert,
            gaussian_attenuation: false,
            ..Default::default()
        }
    }

    #[test]
    fn test_signed_pow() {
        assert!(f64_eq(signed_pow(-3.0, 2.0), -9.0));
        assert!(f64_eq(signed_pow(3.0, 2.0), 9.0));
        assert!(f64_eq(signed_pow(0.0, 0.5), 0.0));
    }

    #[test]
    fn test_gaussian_weight() {
        assert_eq!(gaussian_weight(0.0, 4.0, 20.0), 1.0);
        assert_eq!(gaussian_weight(3.0, 0.0, 20.0), 1.0);
        // (d / r_max) = 1, sigma / 10 = 2 -> exp(-1 / 8)
        assert!(f64_eq(gaussian_weight(4.0, 4.0, 20.0), (-0.125f64).exp()));
        assert!(gaussian_weight(1.0, 4.0, 20.0) > gaussian_weight(2.0, 4.0, 20.0));
    }

    #[test]
    fn test_attenuate_penalizes() {
        let w = 0.5;
        assert!(attenuate(-10.0, w) > -10.0);
        assert!(attenuate(10.0, w) > 10.0);
        assert_eq!(attenuate(-10.0, 1.0), -10.0);
    }

    #[test]
    fn test_dark_needle_scores_lower() {
        let v = NeedlePhantom::new((21, 21, 10))
            .background(100.0)
            .vertical_line(10.0, 10.0, 0.0)
            .build()
            .unwrap();
        let obj = Objective::new(&params(1.0, false), [1.0; 3]);
        let on = obj.point_score(&v, Vec3::new(10.0, 10.0, 5.0));
        let off = obj.point_score(&v, Vec3::new(4.0, 4.0, 5.0));
        // 中心 0, 邻域 100: 0 - (100 - 0) = -100.
        assert!(f64_eq(on, -100.0));
        assert!(f64_eq(off, 100.0));
    }

    #[test]
    fn test_bright_needle_needs_inversion() {
        let v = NeedlePhantom::new((21, 21, 10))
            .background(0.0)
            .vertical_line(10.0, 10.0, 100.0)
            .build()
            .unwrap();
        let on = Vec3::new(10.0, 10.0, 5.0);
        let off = Vec3::new(4.0, 4.0, 5.0);

        let plain = Objective::new(&params(1.0, false), [1.0; 3]);
        assert!(plain.point_score(&v, on) > plain.point_score(&v, off));

        let inverted = Objective::new(&params(1.0, true), [1.0; 3]);
        assert!(f64_eq(inverted.point_score(&v, on), -200.0));
        assert!(inverted.point_score(&v, on) < inverted.point_score(&v, off));
    }

    #[test]
    fn test_gradient_disabled() {
        let v = NeedlePhantom::new((21, 21, 10))
            .background(100.0)
            .vertical_line(10.0, 10.0, 0.0)
            .build()
            .unwrap();
        let obj = Objective::new(&params(0.0, false), [1.0; 3]);
        assert!(f64_eq(obj.point_score(&v, Vec3::new(10.0, 10.0, 5.0)), 0.0));
        assert!(f64_eq(obj.point_score(&v, Vec3::new(11.0, 10.0, 5.0)), 100.0));
    }

    #[test]
    fn test_segment_score_is_mean() {
        let v = NeedlePhantom::new((21, 21, 11))
            .background(100.0)
            .vertical_line(10.0, 10.0, 0.0)
            .build()
            .unwrap();
        let obj = Objective::new(&params(0.0, false), [1.0; 3]);
        let along = obj.segment_score(&v, Vec3::new(10.0, 10.0, 10.0), Vec3::new(10.0, 10.0, 0.0));
        assert!(f64_eq(along, 0.0));
        let across = obj.segment_score(&v, Vec3::new(0.0, 10.0, 5.0), Vec3::new(20.0, 10.0, 5.0));
        // 11 个点中恰好 1 个在针上.
        assert!(f64_eq(across, 1000.0 / 11.0));
    }

    #[test]
    fn test_score_attenuation() {
        let v = NeedlePhantom::new((21, 21, 11))
            .background(0.0)
            .vertical_line(10.0, 10.0, 100.0)
            .build()
            .unwrap();
        let p = TrackingParameters {
            gaussian_attenuation: true,
            ..params(1.0, true)
        };
        let obj = Objective::new(&p, [1.0; 3]);
        let apex = Vec3::new(10.0, 10.0, 10.0);
        let axis = Vec3::new(10.0, 10.0, 5.0);
        let near = obj.score(&v, apex, axis, axis, 4.0);
        assert_eq!(near.raw, near.ranked);
        let far = obj.score(&v, apex, Vec3::new(14.0, 10.0, 5.0), axis, 4.0);
        assert!(far.ranked >= far.raw);
        assert!(near.ranked < far.ranked);
    }
}
