//! 插植针追踪.
//!
//! 从针尖出发, 在一系列圆锥形区域内反复做局部搜索, 得到针的控制点.
//!
//! 所有追踪都在体素坐标系中进行. 正向追踪沿 `-k` ("向下") 进行,
//! 反向追踪沿 `+k` 进行. 追踪是同步、单线程的, 但体数据是只读的,
//! 因此不同针的追踪可以并发执行.

use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::{TrackingParameters, Vec3, VolumeSampler};

pub mod forward;
pub mod objective;
pub mod reverse;
pub mod schedule;
pub mod tip;

pub use forward::ForwardTracker;
pub use objective::{Objective, Score};
pub use reverse::{DichotomyGate, ReverseTracker};
pub use schedule::{step_fraction, StepSchedule};
pub use tip::TipRefiner;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 控制点序列 (物理坐标). 第一个元素是针尖, 追踪过程中只追加.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ControlPointList(Vec<Vec3>);

impl ControlPointList {
    /// 以针尖初始化.
    #[inline]
    pub fn new(tip: Vec3) -> Self {
        Self(vec![tip])
    }

    /// 空序列. 仅用于手动验证的针.
    #[inline]
    pub fn empty() -> Self {
        Self(vec![])
    }

    /// 追加一个控制点.
    #[inline]
    pub fn push(&mut self, p: Vec3) {
        self.0.push(p);
    }

    /// 追加若干控制点.
    pub fn extend<I: IntoIterator<Item = Vec3>>(&mut self, it: I) {
        self.0.extend(it);
    }

    /// 针尖. 空序列返回 `None`.
    #[inline]
    pub fn tip(&self) -> Option<Vec3> {
        self.0.first().copied()
    }

    /// 消费自我, 获得底层数据.
    #[inline]
    pub fn into_inner(self) -> Vec<Vec3> {
        self.0
    }
}

impl Deref for ControlPointList {
    type Target = [Vec3];

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromIterator<Vec3> for ControlPointList {
    fn from_iter<I: IntoIterator<Item = Vec3>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// 追踪的截止条件: 可选的截止时刻, 以及可选的外部取消标志.
///
/// 追踪在每一步开始前检查一次. 过期后立即停止, 返回已得到的部分结果.
#[derive(Clone, Debug, Default)]
pub struct Deadline {
    at: Option<Instant>,
    cancel: Option<Arc<AtomicBool>>,
}

impl Deadline {
    /// 永不过期.
    #[inline]
    pub fn none() -> Self {
        Self::default()
    }

    /// 在 `at` 时刻过期.
    #[inline]
    pub fn at(at: Instant) -> Self {
        Self {
            at: Some(at),
            cancel: None,
        }
    }

    /// 从现在起 `d` 之后过期.
    #[inline]
    pub fn after(d: Duration) -> Self {
        Self::at(Instant::now() + d)
    }

    /// 附加一个外部取消标志. 标志被置为 `true` 后视为过期.
    pub fn with_cancel(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// 是否已过期.
    pub fn is_expired(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|f| f.load(Ordering::Acquire))
            || self.at.is_some_and(|t| Instant::now() >= t)
    }
}

/// 追踪停止的原因. 均不是错误.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum StopReason {
    /// 走完了全部步数.
    Completed,

    /// 越过轴向截断平面, 最后一个点被截断到平面上.
    Clipped,

    /// 方向向量的 z 分量为 0, 无法求解步长.
    DegenerateDirection,

    /// 反向追踪二分法重试耗尽, 接受了最后一个候选点.
    RetryExhausted,

    /// 截止时间已过或被外部取消.
    Cancelled,
}

/// 每一步被接受的控制点的记录.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct StepRecord {
    /// 控制点 (体素坐标).
    pub point: Vec3,

    /// 得分.
    pub score: Score,

    /// 二分法重试次数. 正向追踪恒为 0.
    pub retries: u32,
}

/// 一次追踪的结果.
#[derive(Clone, Debug)]
pub struct TrackOutcome {
    /// 体素坐标下的路径. 第一个点是 (修正后的) 针尖.
    pub path: Vec<Vec3>,

    /// 停止原因.
    pub stop: StopReason,

    /// 除针尖外每个控制点的记录, 与 `path[1..]` 一一对应.
    pub steps: Vec<StepRecord>,
}

impl TrackOutcome {
    #[inline]
    pub(crate) fn new(tip: Vec3) -> Self {
        Self {
            path: vec![tip],
            stop: StopReason::Completed,
            steps: vec![],
        }
    }

    /// 记录一个被接受的控制点.
    #[inline]
    pub(crate) fn accept(&mut self, point: Vec3, score: Score, retries: u32) {
        self.path.push(point);
        self.steps.push(StepRecord {
            point,
            score,
            retries,
        });
    }

    /// 针尖 (体素坐标).
    #[inline]
    pub fn tip(&self) -> Vec3 {
        self.path[0]
    }

    /// 第一步的原始得分, 作为反向追踪的参考得分.
    #[inline]
    pub fn reference_score(&self) -> Option<f64> {
        self.steps.first().map(|s| s.score.raw)
    }

    /// 转换为物理坐标下的控制点序列.
    pub fn to_control_points<V: VolumeSampler + ?Sized>(&self, volume: &V) -> ControlPointList {
        self.path
            .iter()
            .map(|p| volume.grid_to_physical(*p))
            .collect()
    }
}

/// 追踪方向.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Direction {
    /// 沿 `-k`, 从针尖走向针体.
    Down,

    /// 沿 `+k`.
    Up,
}

impl Direction {
    /// `-1.0` 或 `1.0`.
    #[inline]
    pub fn sign(&self) -> f64 {
        match self {
            Direction::Down => -1.0,
            Direction::Up => 1.0,
        }
    }
}

/// 求本步圆锥轴线上的点.
///
/// 第一步 (`prev` 为 `None`) 沿 `dir` 直走 `step`; 之后沿最近两个控制点的方向外推,
/// 使 z 分量恰好为 `step`, x/y 按原方向的斜率跟随.
/// 方向的 z 分量为 0 时返回 `None`.
pub fn extrapolate_axis(prev: Option<Vec3>, apex: Vec3, step: f64, dir: Direction) -> Option<Vec3> {
    let dz = dir.sign() * step;
    let Some(prev) = prev else {
        return Some(Vec3::new(apex.x, apex.y, apex.z + dz));
    };
    let d = apex - prev;
    if d.z == 0.0 {
        return None;
    }
    let s = step / d.z.abs();
    Some(Vec3::new(apex.x + d.x * s, apex.y + d.y * s, apex.z + dz))
}

/// 一个候选点及其得分.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Candidate {
    /// 候选点 (体素坐标).
    pub point: Vec3,

    /// 得分.
    pub score: Score,
}

/// 圆锥搜索器. 正向与反向追踪共用.
pub(crate) struct ConeSearch<'a, V: ?Sized> {
    volume: &'a V,
    objective: Objective,
    schedule: StepSchedule,
    /// 圆锥底面半径 (单位: 体素).
    cone_radius: f64,
    radius_steps: u32,
    min_radius_steps: u32,
    rotation_steps: u32,
}

impl<'a, V: VolumeSampler + ?Sized> ConeSearch<'a, V> {
    pub fn new(volume: &'a V, params: &TrackingParameters) -> Self {
        let spacing = volume.spacing();
        Self {
            volume,
            objective: Objective::new(params, spacing),
            schedule: StepSchedule::new(params.needle_length_mm / spacing[2], params.steps()),
            cone_radius: params.cone_radius_mm / spacing[0],
            radius_steps: params.radius_steps,
            min_radius_steps: params.min_radius_steps,
            rotation_steps: params.rotation_steps.max(1),
        }
    }

    #[inline]
    pub fn schedule(&self) -> &StepSchedule {
        &self.schedule
    }

    /// 步长为 `step` 时的圆锥半径与半径方向圈数.
    ///
    /// 半径与步长成正比, 最大步长时等于圆锥底面半径.
    pub fn cone(&self, step: f64) -> (f64, u32) {
        let max_step = self.schedule.max_step();
        if max_step <= 0.0 || self.cone_radius <= 0.0 {
            return (0.0, 0);
        }
        let ratio = (step / max_step).min(1.0);
        let rings = ((self.radius_steps as f64 * ratio).ceil() as u32)
            .clamp(self.min_radius_steps, self.radius_steps);
        (self.cone_radius * ratio, rings)
    }

    /// 在以 `axis` 为中心、半径 `r_max` 的圆盘上搜索最优候选点.
    ///
    /// 圆盘从中心开始, 共 `rings` 圈, 每圈 `rotation_steps` 个角度.
    /// 得分相同时先遇到的点胜出 (中心优先).
    pub fn search(&self, apex: Vec3, axis: Vec3, r_max: f64, rings: u32) -> Candidate {
        let score = |c: Vec3| self.objective.score(self.volume, apex, c, axis, r_max);
        let mut best = Candidate {
            point: axis,
            score: score(axis),
        };
        for ring in 1..=rings {
            let r = r_max * ring as f64 / rings as f64;
            for a in 0..self.rotation_steps {
                let theta = std::f64::consts::TAU * a as f64 / self.rotation_steps as f64;
                let (s, c) = theta.sin_cos();
                let point = Vec3::new(axis.x + r * c, axis.y + r * s, axis.z);
                let sc = score(point);
                if sc.ranked < best.score.ranked {
                    best = Candidate { point, score: sc };
                }
            }
        }
        best
    }

    /// 计算第 `k` 步的轴线点并搜索. `step` 为本步实际步长.
    ///
    /// 方向退化时返回 `None`.
    pub fn step(&self, path: &[Vec3], step: f64, dir: Direction) -> Option<(Vec3, Candidate)> {
        let apex = *path.last()?;
        let prev = path.len().checked_sub(2).map(|i| path[i]);
        let axis = extrapolate_axis(prev, apex, step, dir)?;
        let (r_max, rings) = self.cone(step);
        Some((axis, self.search(apex, axis, r_max, rings)))
    }
}
