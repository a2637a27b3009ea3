//! 正向追踪: 从针尖沿 `-k` 走向针体.

use super::{ConeSearch, Deadline, Direction, StopReason, TrackOutcome};
use crate::{TrackingParameters, Vec3, VolumeSampler};

/// 正向追踪器.
///
/// 状态机为 `Init -> Stepping(k = 0..N) -> Clipped | Done`,
/// 其中 `N = control_points - 1`.
pub struct ForwardTracker<'a, V: ?Sized> {
    search: ConeSearch<'a, V>,
    steps: u32,
    axial_limit: Option<f64>,
}

impl<'a, V: VolumeSampler + ?Sized> ForwardTracker<'a, V> {
    /// 初始化. 截断平面取 [`TrackingParameters::effective_axial_limit`].
    pub fn new(volume: &'a V, params: &TrackingParameters) -> Self {
        Self {
            search: ConeSearch::new(volume, params),
            steps: params.steps(),
            axial_limit: params.effective_axial_limit(),
        }
    }

    /// 覆盖截断平面 (体素 `k` 坐标).
    pub fn with_axial_limit(mut self, limit: Option<f64>) -> Self {
        self.axial_limit = limit;
        self
    }

    /// 当前生效的截断平面.
    #[inline]
    pub fn axial_limit(&self) -> Option<f64> {
        self.axial_limit
    }

    /// 从 `tip` (体素坐标, 应当已经修正过) 开始追踪.
    ///
    /// 返回值的 `path` 第一个点恒为 `tip`. 截断平面存在且 `tip` 不在平面之上时,
    /// 直接以 `StopReason::Clipped` 返回.
    ///
    /// 候选点离开体数据时不停止: 越界采样取哨兵值, 搜索照常进行.
    pub fn track(&self, tip: Vec3, deadline: &Deadline) -> TrackOutcome {
        let mut out = TrackOutcome::new(tip);
        if self.axial_limit.is_some_and(|l| tip.z <= l) {
            out.stop = StopReason::Clipped;
            return out;
        }

        for k in 0..self.steps {
            if deadline.is_expired() {
                log::warn!("forward tracking cancelled at step {k}");
                out.stop = StopReason::Cancelled;
                break;
            }

            let step = self.search.schedule().step(k);
            let Some((axis, best)) = self.search.step(&out.path, step, Direction::Down) else {
                log::warn!("forward tracking: degenerate direction at step {k}");
                out.stop = StopReason::DegenerateDirection;
                break;
            };
            let apex = out.path[out.path.len() - 1];

            if let Some(limit) = self.axial_limit {
                if best.point.z < limit {
                    let clipped = clip_to_plane(apex, best.point, limit);
                    log::debug!("forward step {k}: clipped at k = {limit} -> {clipped:?}");
                    out.accept(clipped, best.score, 0);
                    out.stop = StopReason::Clipped;
                    break;
                }
            }

            log::debug!(
                "forward step {k}: axis {axis:?} -> {:?} (score {:.3})",
                best.point,
                best.score.ranked
            );
            out.accept(best.point, best.score, 0);
        }
        out
    }
}

/// 在线段 `from -> to` 上求 z 恰好为 `limit` 的点.
///
/// 要求 `from.z` 与 `to.z` 位于平面两侧 (或 `to` 在平面上).
pub fn clip_to_plane(from: Vec3, to: Vec3, limit: f64) -> Vec3 {
    debug_assert!(from.z != to.z);
    let t = (from.z - limit) / (from.z - to.z);
    let mut p = from.lerp(to, t);
    p.z = limit;
    p
}
