//! 曲线拟合.
//!
//! 给定一根针的控制点 (物理坐标, 任意顺序), 该模块按针尖到针尾排序,
//! 必要时延长末段, 然后用 Bézier 曲线重采样.

use itertools::Itertools;
use ordered_float::OrderedFloat;

use crate::{TrackError, TrackResult, TrackingParameters, Vec3};

mod bezier;

/// 按 z 降序排列, z 相同时按 y 降序, 再按 x 降序. 结果为针尖到针尾的顺序.
pub fn sort_tip_to_base(points: &mut [Vec3]) {
    points.sort_by(|a, b| {
        b.z.total_cmp(&a.z)
            .then_with(|| b.y.total_cmp(&a.y))
            .then_with(|| b.x.total_cmp(&a.x))
    });
}

/// 折线总长度.
pub fn polyline_length(points: &[Vec3]) -> f64 {
    points
        .iter()
        .tuple_windows()
        .map(|(a, b)| a.distance(*b))
        .sum()
}

/// 折线短于 `target` 时, 沿最后一段的方向追加一个点, 使总长恰好为 `target`.
///
/// 返回是否追加了点. 少于两个点或最后一段退化时不做任何事.
pub fn extend_to_length(points: &mut Vec<Vec3>, target: f64) -> bool {
    let total = polyline_length(points);
    if points.len() < 2 || total >= target {
        return false;
    }
    let (a, b) = (points[points.len() - 2], points[points.len() - 1]);
    let Some(dir) = (b - a).normalized() else {
        return false;
    };
    points.push(b + dir * (target - total));
    true
}

/// Bézier 曲线, 次数恒为 `control.len() - 1`.
///
/// 对两个控制点即为两点之间的直线段. 返回在 `[0, 1]` 上等距采样的 `samples` 个点.
///
/// # 错误
///
/// 少于两个控制点时返回 [`TrackError::TooFewControlPoints`].
pub fn bezier(control: &[Vec3], samples: usize) -> TrackResult<Vec<Vec3>> {
    if control.len() < 2 {
        return Err(TrackError::TooFewControlPoints(control.len(), 2));
    }
    Ok(bezier::BezierImp::new(control).make_curve(samples.max(2)))
}

/// 一根针的拟合结果.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FittedCurve {
    /// 排序 (及延长) 后实际参与拟合的控制点.
    pub control: Vec<Vec3>,

    /// 曲线采样点, 从针尖到针尾.
    pub samples: Vec<Vec3>,
}

impl FittedCurve {
    /// 按参数拟合: 排序, 若 `extend_needle` 则延长到 `needle_length_mm`,
    /// 再以 `curve_samples` 个点采样.
    pub fn fit(points: &[Vec3], params: &TrackingParameters) -> TrackResult<Self> {
        let target = params.extend_needle.then_some(params.needle_length_mm);
        Self::fit_with(points, target, params.curve_samples)
    }

    /// 拟合. `target_length` 为 `Some` 时尝试延长末段.
    pub fn fit_with(points: &[Vec3], target_length: Option<f64>, samples: usize) -> TrackResult<Self> {
        let mut control = points.to_vec();
        sort_tip_to_base(&mut control);
        if let Some(target) = target_length {
            if extend_to_length(&mut control, target) {
                log::debug!("needle extended to {target} mm");
            }
        }
        let samples = bezier(&control, samples)?;
        Ok(Self { control, samples })
    }

    /// Bézier 曲线次数.
    #[inline]
    pub fn degree(&self) -> usize {
        self.control.len() - 1
    }

    /// 重采样后的曲线长度.
    pub fn length(&self) -> f64 {
        polyline_length(&self.samples)
    }

    /// 针尖 (曲线第一个点).
    #[inline]
    pub fn tip(&self) -> Vec3 {
        self.samples[0]
    }

    /// 针尾 (曲线最后一个点), 即用于模板标注的底部点.
    #[inline]
    pub fn base(&self) -> Vec3 {
        self.samples[self.samples.len() - 1]
    }

    /// 曲线上 z 最接近 `z` 的采样点.
    pub fn closest_to_z(&self, z: f64) -> Vec3 {
        self.samples
            .iter()
            .min_by_key(|p| OrderedFloat((p.z - z).abs()))
            .copied()
            .unwrap_or_else(|| self.tip())
    }
}

#[cfg(test)]
mod tests {
    use super::{bezier, extend_to_length, polyline_length, sort_tip_to_base, FittedCurve};
    use crate::{TrackError, TrackingParameters, Vec3};

    fn f64_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_sort() {
        let mut pts = vec![
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(1.0, 0.0, 5.0),
            Vec3::new(0.0, 2.0, 5.0),
            Vec3::new(3.0, 2.0, 5.0),
        ];
        sort_tip_to_base(&mut pts);
        assert_eq!(
            pts,
            vec![
                Vec3::new(3.0, 2.0, 5.0),
                Vec3::new(0.0, 2.0, 5.0),
                Vec3::new(1.0, 0.0, 5.0),
                Vec3::new(0.0, 0.0, 1.0),
            ]
        );
    }

    #[test]
    fn test_length_and_extension() {
        let mut pts = vec![Vec3::new(0.0, 0.0, 10.0), Vec3::new(0.0, 3.0, 6.0)];
        assert!(f64_eq(polyline_length(&pts), 5.0));
        assert!(!extend_to_length(&mut pts, 5.0));
        assert!(extend_to_length(&mut pts, 15.0));
        assert_eq!(pts.len(), 3);
        assert!(pts[2].distance(Vec3::new(0.0, 9.0, -2.0)) < 1e-9);
        assert!(f64_eq(polyline_length(&pts), 15.0));

        let mut single = vec![Vec3::ZERO];
        assert!(!extend_to_length(&mut single, 10.0));
    }

    #[test]
    fn test_two_points_give_straight_line() {
        let a = Vec3::new(1.0, 2.0, 30.0);
        let b = Vec3::new(5.0, -2.0, 10.0);
        let c = FittedCurve::fit_with(&[b, a], None, 50).unwrap();
        assert_eq!(c.degree(), 1);
        assert_eq!(c.samples.len(), 50);
        assert!(c.tip().distance(a) < 1e-12);
        assert!(c.base().distance(b) < 1e-12);
        for (k, p) in c.samples.iter().enumerate() {
            let q = a.lerp(b, k as f64 / 49.0);
            assert!(p.distance(q) < 1e-9);
        }
        assert!(f64_eq(c.length(), a.distance(b)));
    }

    #[test]
    fn test_degree_follows_input() {
        let pts: Vec<_> = (0..6)
            .map(|k| Vec3::new((k * k) as f64, 0.0, 50.0 - 10.0 * k as f64))
            .collect();
        let c = FittedCurve::fit(&pts, &TrackingParameters::default()).unwrap();
        assert_eq!(c.degree(), 5);
        assert_eq!(c.samples.len(), 50);
        assert!(c.tip().distance(pts[0]) < 1e-9);
        assert!(c.base().distance(pts[5]) < 1e-9);
    }

    #[test]
    fn test_fit_extends_needle() {
        let pts = [Vec3::new(0.0, 0.0, 40.0), Vec3::new(0.0, 0.0, 20.0)];
        let p = TrackingParameters {
            extend_needle: true,
            needle_length_mm: 60.0,
            ..Default::default()
        };
        let c = FittedCurve::fit(&pts, &p).unwrap();
        assert_eq!(c.control.len(), 3);
        assert!(c.base().distance(Vec3::new(0.0, 0.0, -20.0)) < 1e-9);
        assert!(f64_eq(c.length(), 60.0));
        assert!(c.closest_to_z(0.3).distance(Vec3::ZERO) < 2.0);
    }

    #[test]
    fn test_too_few_points() {
        assert!(matches!(
            bezier(&[Vec3::ZERO], 50),
            Err(TrackError::TooFewControlPoints(1, 2))
        ));
        assert!(FittedCurve::fit(&[], &TrackingParameters::default()).is_err());
    }
}
