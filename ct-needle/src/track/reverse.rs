//! 反向追踪: 从针尖沿 `+k` 行进, 并以二分法质量门限防止越过针的末端.

use super::{ConeSearch, Deadline, Direction, StopReason, TrackOutcome};
use crate::{TrackingParameters, Vec3, VolumeSampler};

/// 二分法质量门限.
///
/// 候选点得分相对参考得分的偏差超过门限时, 认为候选点 "不像针".
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DichotomyGate {
    reference: f64,
    threshold: f64,
}

impl DichotomyGate {
    /// 以参考得分 (正向追踪第一步的原始得分) 和相对偏差门限初始化.
    #[inline]
    pub fn new(reference: f64, threshold: f64) -> Self {
        Self {
            reference,
            threshold,
        }
    }

    /// 参考得分.
    #[inline]
    pub fn reference(&self) -> f64 {
        self.reference
    }

    /// 相对偏差 `(score - ref) / |ref|`. 得分越低越好, 所以偏差越小越像针.
    ///
    /// `ref` 为 0 时分母取 `f64::EPSILON`.
    #[inline]
    pub fn relative_deviation(&self, score: f64) -> f64 {
        (score - self.reference) / self.reference.abs().max(f64::EPSILON)
    }

    /// 是否接受该得分. NaN 一律拒绝.
    #[inline]
    pub fn accepts(&self, score: f64) -> bool {
        self.relative_deviation(score) <= self.threshold
    }
}

/// 反向追踪器.
///
/// 状态机为 `Init -> Stepping -> Dichotomy(retry <= R) -> AcceptOrStop`.
pub struct ReverseTracker<'a, V: ?Sized> {
    search: ConeSearch<'a, V>,
    steps: u32,
    gate: DichotomyGate,
    max_retries: u32,
}

impl<'a, V: VolumeSampler + ?Sized> ReverseTracker<'a, V> {
    /// 初始化. `reference` 一般取 [`TrackOutcome::reference_score`].
    pub fn new(volume: &'a V, params: &TrackingParameters, reference: f64) -> Self {
        Self {
            search: ConeSearch::new(volume, params),
            steps: params.steps(),
            gate: DichotomyGate::new(reference, params.dichotomy_threshold),
            max_retries: params.dichotomy_retries,
        }
    }

    /// 质量门限.
    #[inline]
    pub fn gate(&self) -> &DichotomyGate {
        &self.gate
    }

    /// 从 `tip` (体素坐标) 开始沿 `+k` 追踪.
    ///
    /// 每一步若候选点未通过门限, 步长减半后重新搜索; 重试次数耗尽时接受最后的候选点,
    /// 并以 `StopReason::RetryExhausted` 结束. 离开体数据的候选点按哨兵值打分,
    /// 由门限决定是否停止.
    pub fn track(&self, tip: Vec3, deadline: &Deadline) -> TrackOutcome {
        let mut out = TrackOutcome::new(tip);

        'steps: for k in 0..self.steps {
            let mut step = self.search.schedule().step(k);
            let mut retries = 0;
            loop {
                if deadline.is_expired() {
                    log::warn!("reverse tracking cancelled at step {k}");
                    out.stop = StopReason::Cancelled;
                    break 'steps;
                }

                let Some((_, best)) = self.search.step(&out.path, step, Direction::Up) else {
                    log::warn!("reverse tracking: degenerate direction at step {k}");
                    out.stop = StopReason::DegenerateDirection;
                    break 'steps;
                };
                if self.gate.accepts(best.score.raw) {
                    log::debug!(
                        "reverse step {k}: accepted {:?} after {retries} retries",
                        best.point
                    );
                    out.accept(best.point, best.score, retries);
                    break;
                }
                if retries >= self.max_retries {
                    log::debug!(
                        "reverse step {k}: retries exhausted, deviation {:.3}",
                        self.gate.relative_deviation(best.score.raw)
                    );
                    out.accept(best.point, best.score, retries);
                    out.stop = StopReason::RetryExhausted;
                    break 'steps;
                }
                retries += 1;
                step *= 0.5;
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::{DichotomyGate, ReverseTracker};
    use crate::data::phantom::{NeedlePhantom, PhantomNeedle};
    use crate::track::{Deadline, ForwardTracker, StopReason};
    use crate::{TrackingParameters, Vec3};

    fn bright_params() -> TrackingParameters {
        TrackingParameters {
            control_points: 3,
            needle_length_mm: 70.0,
            cone_radius_mm: 3.0,
            invert_contrast: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_gate() {
        let g = DichotomyGate::new(-100.0, 0.6);
        assert_eq!(g.relative_deviation(-100.0), 0.0);
        assert!((g.relative_deviation(-70.0) - 0.3).abs() < 1e-12);
        assert!(g.accepts(-70.0));
        assert!(g.accepts(-500.0));
        assert!(!g.accepts(0.0));
        assert!(!g.accepts(f64::NAN));

        let zero = DichotomyGate::new(0.0, 0.6);
        assert!(zero.accepts(-1.0));
        assert!(!zero.accepts(1.0));
    }

    #[test]
    fn test_accepts_first_iteration() {
        let v = NeedlePhantom::new((21, 21, 40))
            .background(0.0)
            .vertical_line(10.0, 10.0, 1000.0)
            .build()
            .unwrap();
        let p = bright_params();
        let out = ReverseTracker::new(&v, &p, 0.0).track(Vec3::new(10.0, 10.0, 0.0), &Deadline::none());

        assert_eq!(out.stop, StopReason::Completed);
        assert_eq!(out.path.len(), 3);
        assert!(out.steps.iter().all(|s| s.retries == 0));
        let mut last_z = f64::NEG_INFINITY;
        for q in out.path.iter() {
            assert!((q.x - 10.0).abs() <= 1.0 && (q.y - 10.0).abs() <= 1.0);
            assert!(q.z > last_z);
            last_z = q.z;
        }
    }

    #[test]
    fn test_retry_exhausted_on_background() {
        let v = NeedlePhantom::new((21, 21, 40)).build().unwrap();
        let p = TrackingParameters {
            invert_contrast: false,
            ..bright_params()
        };
        let out = ReverseTracker::new(&v, &p, -1000.0).track(Vec3::new(10.0, 10.0, 0.0), &Deadline::none());
        assert_eq!(out.stop, StopReason::RetryExhausted);
        assert_eq!(out.path.len(), 2);
        assert_eq!(out.steps[0].retries, p.dichotomy_retries);
    }

    #[test]
    fn test_stops_near_needle_end() {
        let v = NeedlePhantom::new((21, 21, 60))
            .background(0.0)
            .needle(PhantomNeedle {
                from: Vec3::new(10.0, 10.0, 0.0),
                to: Vec3::new(10.0, 10.0, 20.0),
                radius: 0.5,
                intensity: 1000.0,
            })
            .build()
            .unwrap();
        let p = TrackingParameters {
            control_points: 6,
            needle_length_mm: 120.0,
            ..bright_params()
        };
        let tip = Vec3::new(10.0, 10.0, 10.0);
        let reference = ForwardTracker::new(&v, &p)
            .track(tip, &Deadline::none())
            .reference_score()
            .unwrap();
        assert!(reference < 0.0);

        let out = ReverseTracker::new(&v, &p, reference).track(tip, &Deadline::none());
        assert_eq!(out.stop, StopReason::RetryExhausted);
        assert_eq!(out.steps[0].retries, 0);
        assert_eq!(out.steps.last().unwrap().retries, p.dichotomy_retries);
        assert!(out.path.iter().all(|q| q.z < 30.0), "{:?}", out.path);
    }

    /// 针尖在最上层, 走出体数据后由门限结束追踪.
    #[test]
    fn test_gate_stops_above_volume() {
        let v = NeedlePhantom::new((21, 21, 40))
            .background(0.0)
            .vertical_line(10.0, 10.0, 1000.0)
            .build()
            .unwrap();
        let p = bright_params();
        let tip = Vec3::new(10.0, 10.0, 39.0);
        let reference = ForwardTracker::new(&v, &p)
            .track(tip, &Deadline::none())
            .reference_score()
            .unwrap();

        let out = ReverseTracker::new(&v, &p, reference).track(tip, &Deadline::none());
        assert_eq!(out.stop, StopReason::RetryExhausted);
        assert_eq!(out.path.len(), 3);
        // 第一步只有缩短步长才能留在针上.
        assert!(out.steps[0].retries >= 1);
        assert!(out.steps[0].point.z > 39.0 && out.steps[0].point.z < 40.0);
        assert_eq!(out.steps[1].retries, p.dichotomy_retries);
        for q in out.path.iter() {
            assert!((q.x - 10.0).abs() <= 1.0 && (q.y - 10.0).abs() <= 1.0, "{q:?}");
        }
    }

    #[test]
    fn test_cancelled() {
        let v = NeedlePhantom::new((21, 21, 40)).build().unwrap();
        let out = ReverseTracker::new(&v, &bright_params(), 0.0)
            .track(Vec3::new(10.0, 10.0, 0.0), &Deadline::at(std::time::Instant::now()));
        assert_eq!(out.stop, StopReason::Cancelled);
        assert_eq!(out.path.len(), 1);
    }
}
