//! 追踪会话.
//!
//! 负责每根针的编号、轮次、颜色和标签, 并把宿主程序的点击事件分派到
//! 追踪 / 手动验证 / 截断平面设置三种操作上.
//!
//! 会话内部的计数器 (轮次、针编号、调色板下标) 都是会话自身的字段.
//! 需要并行追踪时, 要么使用 [`track_needle`] 这一不修改会话状态的函数,
//! 要么使用 `par_submit_tips`.

use std::collections::HashMap;

use crate::consts::{PALETTE, UNASSIGNED_LABEL, VALIDATION_COLOR};
use crate::track::{ForwardTracker, ReverseTracker, TipRefiner};
use crate::{
    Affine, ControlPointList, Deadline, FittedCurve, HoleLabelMatcher, StopReason, TrackError,
    TrackOutcome, TrackResult, TrackingParameters, Vec3, VolumeSampler,
};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
    }
}

/// 针的来源.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum NeedleSource {
    /// 只做了正向追踪.
    Forward,

    /// 正向 + 反向追踪.
    Bidirectional,

    /// 手动逐点验证.
    Validated,
}

/// 会话中的一根针.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Needle {
    /// 会话内唯一编号, 从 1 开始, 不复用.
    pub id: u32,

    /// 创建时的轮次.
    pub round: u32,

    /// 显示颜色.
    pub color: [f32; 3],

    /// 控制点 (物理坐标).
    pub control_points: ControlPointList,

    /// 拟合曲线. 控制点少于两个时为 `None`.
    pub curve: Option<FittedCurve>,

    /// 模板孔位标签. 尚未设置模板变换时为 `None`; 无匹配时为 `"--"`.
    pub label: Option<String>,

    /// 来源.
    pub source: NeedleSource,

    /// 是否显示. 只有重复标签过滤会修改它.
    pub visible: bool,

    /// 正向追踪的停止原因. 手动验证的针为 `None`.
    pub stop: Option<StopReason>,
}

impl Needle {
    /// 底部点: 曲线最后一个点; 没有曲线时为唯一的控制点.
    pub fn base(&self) -> Option<Vec3> {
        self.curve
            .as_ref()
            .map(FittedCurve::base)
            .or_else(|| self.control_points.tip())
    }

    /// 是否已分配了有效标签.
    #[inline]
    pub fn has_label(&self) -> bool {
        self.label.as_deref().is_some_and(|l| l != UNASSIGNED_LABEL)
    }
}

/// 一次追踪的完整结果, 尚未登记到会话中.
#[derive(Clone, Debug)]
pub struct TrackedNeedle {
    /// 控制点 (物理坐标): 正向路径, 之后是反向路径 (不含针尖).
    pub control_points: ControlPointList,

    /// 拟合曲线.
    pub curve: Option<FittedCurve>,

    /// 来源, `Forward` 或 `Bidirectional`.
    pub source: NeedleSource,

    /// 正向追踪结果 (体素坐标).
    pub forward: TrackOutcome,

    /// 反向追踪结果 (体素坐标).
    pub reverse: Option<TrackOutcome>,
}

fn fit_curve(points: &[Vec3], params: &TrackingParameters) -> Option<FittedCurve> {
    match FittedCurve::fit(points, params) {
        Ok(c) => Some(c),
        Err(e) => {
            log::warn!("curve not fitted: {e}");
            None
        }
    }
}

/// 追踪一根针. 不涉及任何会话状态, 可以对不同针并发调用.
///
/// `tip` 为物理坐标. `axial_limit` (体素 `k` 坐标) 覆盖参数中的截断平面.
///
/// # 错误
///
/// 参数非法或针尖不在体数据内时返回错误, 此时不做任何搜索.
pub fn track_needle<V: VolumeSampler + ?Sized>(
    volume: &V,
    tip: Vec3,
    params: &TrackingParameters,
    axial_limit: Option<f64>,
    deadline: &Deadline,
) -> TrackResult<TrackedNeedle> {
    params.validate()?;
    let click = volume.physical_to_grid(tip);
    if !volume.contains(click) {
        return Err(TrackError::TipOutsideVolume);
    }

    let grid_tip = if params.auto_correct_tip {
        let refined = TipRefiner::new(volume, params).refine(click);
        log::debug!("tip refined: {click:?} -> {refined:?}");
        refined
    } else {
        click
    };

    let forward = ForwardTracker::new(volume, params)
        .with_axial_limit(axial_limit.or(params.effective_axial_limit()))
        .track(grid_tip, deadline);
    if !matches!(forward.stop, StopReason::Completed | StopReason::Clipped) {
        log::warn!("forward tracking stopped early: {:?}", forward.stop);
    }

    let mut control_points = forward.to_control_points(volume);
    let mut source = NeedleSource::Forward;
    let reverse = match (params.bidirectional, forward.reference_score()) {
        (true, Some(reference)) => {
            let out = ReverseTracker::new(volume, params, reference).track(grid_tip, deadline);
            control_points.extend(out.path[1..].iter().map(|p| volume.grid_to_physical(*p)));
            source = NeedleSource::Bidirectional;
            Some(out)
        }
        (true, None) => {
            log::warn!("no reference score, reverse tracking skipped");
            None
        }
        _ => None,
    };

    let curve = fit_curve(&control_points, params);
    Ok(TrackedNeedle {
        control_points,
        curve,
        source,
        forward,
        reverse,
    })
}

/// 宿主程序的输入模式. 一次点击按当前模式分派.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum InputMode {
    /// 点击为针尖, 触发追踪.
    #[default]
    Tip,

    /// 点击为手动验证的点. `needle` 为 `None` 时下一次点击新建一根针.
    Validation {
        /// 正在编辑的针.
        needle: Option<u32>,
    },

    /// 点击位置所在切片作为轴向截断平面.
    Obturator,
}

/// 一次点击的结果.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum ClickOutcome {
    /// 追踪得到了一根新针.
    Tracked(u32),

    /// 向手动验证的针追加了一个点.
    ValidationPoint {
        /// 针编号.
        needle: u32,

        /// 该针当前的点数.
        points: usize,
    },

    /// 设置了新的轴向截断平面 (体素 `k` 坐标).
    AxialLimit(f64),
}

/// 追踪会话.
#[derive(Clone, Debug)]
pub struct TrackingSession {
    round: u32,
    next_id: u32,
    palette_index: usize,
    needles: Vec<Needle>,
    matcher: Option<HoleLabelMatcher>,
    mode: InputMode,
    axial_limit: Option<f64>,
}

impl Default for TrackingSession {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackingSession {
    /// 空会话, 尚未设置模板变换.
    pub fn new() -> Self {
        Self {
            round: 0,
            next_id: 1,
            palette_index: 0,
            needles: vec![],
            matcher: None,
            mode: InputMode::Tip,
            axial_limit: None,
        }
    }

    /// 使用给定的孔位匹配器. 此后创建的针会自动分配标签.
    pub fn with_matcher(mut self, matcher: HoleLabelMatcher) -> Self {
        self.matcher = Some(matcher);
        self
    }

    /// 当前轮次.
    #[inline]
    pub fn round(&self) -> u32 {
        self.round
    }

    /// 全部针, 按创建顺序.
    #[inline]
    pub fn needles(&self) -> &[Needle] {
        &self.needles
    }

    /// 按编号查找.
    pub fn needle(&self, id: u32) -> Option<&Needle> {
        self.needles.iter().find(|n| n.id == id)
    }

    /// 当前输入模式.
    #[inline]
    pub fn mode(&self) -> InputMode {
        self.mode
    }

    /// 切换输入模式.
    pub fn set_mode(&mut self, mode: InputMode) {
        log::debug!("input mode: {:?} -> {mode:?}", self.mode);
        self.mode = mode;
    }

    /// 会话级轴向截断平面 (体素 `k` 坐标), 优先于参数中的设置.
    #[inline]
    pub fn axial_limit(&self) -> Option<f64> {
        self.axial_limit
    }

    /// 设置 (或清除) 会话级轴向截断平面.
    pub fn set_axial_limit(&mut self, limit: Option<f64>) {
        self.axial_limit = limit;
    }

    /// 孔位匹配器.
    #[inline]
    pub fn matcher(&self) -> Option<&HoleLabelMatcher> {
        self.matcher.as_ref()
    }

    /// 开始新的一轮. 返回新的轮次.
    pub fn next_round(&mut self) -> u32 {
        self.round += 1;
        log::info!("round {}", self.round);
        self.round
    }

    fn next_color(&mut self) -> [f32; 3] {
        let c = PALETTE[self.palette_index % PALETTE.len()];
        self.palette_index += 1;
        c
    }

    fn label_for(&self, base: Option<Vec3>) -> Option<String> {
        let m = self.matcher.as_ref()?;
        Some(base.map_or(UNASSIGNED_LABEL, |b| m.match_label(b)).to_string())
    }

    /// 把一次追踪结果登记为新针, 返回其编号.
    pub fn register(&mut self, tracked: TrackedNeedle) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        let color = self.next_color();
        let mut needle = Needle {
            id,
            round: self.round,
            color,
            control_points: tracked.control_points,
            curve: tracked.curve,
            label: None,
            source: tracked.source,
            visible: true,
            stop: Some(tracked.forward.stop),
        };
        needle.label = self.label_for(needle.base());
        log::info!(
            "needle #{id} (round {}): {} control points, {:?}, label {:?}",
            self.round,
            needle.control_points.len(),
            needle.source,
            needle.label
        );
        self.needles.push(needle);
        id
    }

    /// 以物理坐标 `point` 为针尖追踪一根针并登记.
    pub fn submit_tip<V: VolumeSampler + ?Sized>(
        &mut self,
        volume: &V,
        point: Vec3,
        params: &TrackingParameters,
    ) -> TrackResult<u32> {
        self.submit_tip_until(volume, point, params, &Deadline::none())
    }

    /// 同 [`Self::submit_tip`], 但带有截止条件.
    pub fn submit_tip_until<V: VolumeSampler + ?Sized>(
        &mut self,
        volume: &V,
        point: Vec3,
        params: &TrackingParameters,
        deadline: &Deadline,
    ) -> TrackResult<u32> {
        let tracked = track_needle(volume, point, params, self.axial_limit, deadline)?;
        Ok(self.register(tracked))
    }

    /// 依次追踪多根针, 结果与 `points` 一一对应.
    pub fn submit_tips<V: VolumeSampler + ?Sized>(
        &mut self,
        volume: &V,
        points: &[Vec3],
        params: &TrackingParameters,
    ) -> Vec<TrackResult<u32>> {
        points
            .iter()
            .map(|&p| self.submit_tip(volume, p, params))
            .collect()
    }

    /// 向手动验证的针追加一个点 (物理坐标). `needle` 为 `None` 时新建一根针.
    ///
    /// 每追加一个点都会重新拟合曲线. 返回针编号.
    pub fn submit_validation_point(
        &mut self,
        point: Vec3,
        needle: Option<u32>,
        params: &TrackingParameters,
    ) -> TrackResult<u32> {
        let id = match needle {
            Some(id) => id,
            None => {
                let id = self.next_id;
                self.next_id += 1;
                self.needles.push(Needle {
                    id,
                    round: self.round,
                    color: VALIDATION_COLOR,
                    control_points: ControlPointList::empty(),
                    curve: None,
                    label: None,
                    source: NeedleSource::Validated,
                    visible: true,
                    stop: None,
                });
                log::info!("validation needle #{id} created");
                id
            }
        };

        let idx = self
            .needles
            .iter()
            .position(|n| n.id == id && n.source == NeedleSource::Validated)
            .ok_or(TrackError::UnknownNeedle(id))?;
        let n = &mut self.needles[idx];
        n.control_points.push(point);
        if n.control_points.len() >= 2 {
            n.curve = fit_curve(&n.control_points, params);
        }
        let label = self.label_for(self.needles[idx].base());
        self.needles[idx].label = label;
        Ok(id)
    }

    /// 按当前输入模式处理一次点击 (物理坐标).
    pub fn handle_click<V: VolumeSampler + ?Sized>(
        &mut self,
        volume: &V,
        point: Vec3,
        params: &TrackingParameters,
    ) -> TrackResult<ClickOutcome> {
        match self.mode {
            InputMode::Tip => self.submit_tip(volume, point, params).map(ClickOutcome::Tracked),
            InputMode::Validation { needle } => {
                let id = self.submit_validation_point(point, needle, params)?;
                self.mode = InputMode::Validation { needle: Some(id) };
                let points = self.needle(id).map_or(0, |n| n.control_points.len());
                Ok(ClickOutcome::ValidationPoint { needle: id, points })
            }
            InputMode::Obturator => {
                let limit = volume.physical_to_grid(point).z;
                if !limit.is_finite() {
                    return Err(TrackError::InvalidParameters(format!(
                        "axial limit must be finite, got {limit}"
                    )));
                }
                log::info!("axial limit set to k = {limit:.2}");
                self.axial_limit = Some(limit);
                Ok(ClickOutcome::AxialLimit(limit))
            }
        }
    }

    /// 删除最后创建的针. 编号不会被复用.
    pub fn delete_last_needle(&mut self) -> Option<Needle> {
        let n = self.needles.pop()?;
        if self.mode == (InputMode::Validation { needle: Some(n.id) }) {
            self.mode = InputMode::Validation { needle: None };
        }
        log::info!("needle #{} deleted", n.id);
        Some(n)
    }

    /// 清空会话: 删除所有针, 重置计数器、截断平面和输入模式. 模板变换保留.
    pub fn reset_session(&mut self) {
        let matcher = self.matcher.take();
        *self = Self {
            matcher,
            ..Self::new()
        };
        log::info!("session reset");
    }

    /// 更新模板变换, 并为所有针重新分配标签.
    pub fn set_transform(&mut self, transform: Affine) {
        self.matcher
            .get_or_insert_with(HoleLabelMatcher::default)
            .set_transform(transform);
        self.assign_labels();
    }

    /// 为所有针重新分配标签. 没有匹配器时什么都不做.
    pub fn assign_labels(&mut self) {
        if self.matcher.is_none() {
            return;
        }
        let labels: Vec<_> = self.needles.iter().map(|n| self.label_for(n.base())).collect();
        for (n, l) in self.needles.iter_mut().zip(labels) {
            n.label = l;
        }
    }

    /// 对同一标签的多根针, 只保留底部点离孔位最近的那根可见, 其余隐藏.
    ///
    /// 只修改可见性, 不改变标签. 返回被隐藏的针的个数.
    pub fn filter_duplicate_labels(&mut self) -> usize {
        let Some(m) = self.matcher.as_ref() else {
            return 0;
        };

        let mut best: HashMap<&str, (usize, f64)> = HashMap::new();
        for (i, n) in self.needles.iter().enumerate() {
            let (Some(label), Some(base)) = (n.label.as_deref(), n.base()) else {
                continue;
            };
            if label == UNASSIGNED_LABEL {
                continue;
            }
            let Some((_, d)) = m.nearest(base) else {
                continue;
            };
            match best.get(label) {
                Some(&(_, bd)) if bd <= d => {}
                _ => {
                    best.insert(label, (i, d));
                }
            }
        }

        let keep: Vec<_> = self
            .needles
            .iter()
            .enumerate()
            .map(|(i, n)| match n.label.as_deref() {
                Some(l) if l != UNASSIGNED_LABEL => best.get(l).map_or(true, |&(b, _)| b == i),
                _ => true,
            })
            .collect();
        let mut hidden = 0;
        for (n, k) in self.needles.iter_mut().zip(keep) {
            n.visible = k;
            hidden += usize::from(!k);
        }
        if hidden != 0 {
            log::info!("{hidden} duplicated needles hidden");
        }
        hidden
    }
}

#[cfg(feature = "rayon")]
impl TrackingSession {
    /// 借助 `rayon`, 并行地追踪多根针, 再按 `points` 的顺序登记.
    ///
    /// 结果与 [`Self::submit_tips`] 相同.
    pub fn par_submit_tips<V: VolumeSampler + Sync + ?Sized>(
        &mut self,
        volume: &V,
        points: &[Vec3],
        params: &TrackingParameters,
    ) -> Vec<TrackResult<u32>> {
        let limit = self.axial_limit;
        let tracked: Vec<_> = points
            .par_iter()
            .map(|&p| track_needle(volume, p, params, limit, &Deadline::none()))
            .collect();
        tracked
            .into_iter()
            .map(|t| t.map(|t| self.register(t)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{track_needle, ClickOutcome, InputMode, NeedleSource, TrackingSession};
    use crate::consts::{PALETTE, UNASSIGNED_LABEL, VALIDATION_COLOR};
    use crate::data::phantom::NeedlePhantom;
    use crate::track::Deadline;
    use crate::{Affine, HoleLabelMatcher, StopReason, TrackError, TrackingParameters, Vec3, Volume};

    /// 两根竖直亮针, 位于 `(10, 10)` 与 `(14, 10)`.
    fn volume() -> Volume {
        NeedlePhantom::new((31, 21, 40))
            .background(0.0)
            .vertical_line(10.0, 10.0, 1000.0)
            .vertical_line(14.0, 10.0, 1000.0)
            .build()
            .unwrap()
    }

    fn params() -> TrackingParameters {
        TrackingParameters {
            control_points: 6,
            needle_length_mm: 60.0,
            cone_radius_mm: 3.0,
            tip_box_xy_mm: 2.0,
            tip_box_z_mm: 2.0,
            invert_contrast: true,
            ..Default::default()
        }
    }

    fn min_z(n: &super::Needle) -> f64 {
        n.control_points.iter().map(|p| p.z).fold(f64::INFINITY, f64::min)
    }

    /// `RUST_LOG=debug` 时可查看逐步追踪日志. 多个测试重复初始化时忽略错误.
    fn init_logger() {
        let _ = simple_logger::SimpleLogger::new()
            .with_level(log::LevelFilter::Warn)
            .env()
            .init();
    }

    #[test]
    fn test_submit_tip() {
        init_logger();
        let v = volume();
        let mut s = TrackingSession::new();
        let id = s.submit_tip(&v, Vec3::new(10.0, 10.0, 39.0), &params()).unwrap();
        assert_eq!(id, 1);

        let n = s.needle(id).unwrap();
        assert_eq!(n.round, 0);
        assert_eq!(n.color, PALETTE[0]);
        assert_eq!(n.source, NeedleSource::Forward);
        assert_eq!(n.stop, Some(StopReason::Completed));
        assert_eq!(n.control_points.len(), 6);
        assert_eq!(n.control_points.tip(), Some(Vec3::new(10.0, 10.0, 39.0)));
        assert!(n.control_points.iter().all(|p| (p.x - 10.0).abs() <= 1.0));
        assert_eq!(n.curve.as_ref().unwrap().degree(), 5);
        assert!(n.label.is_none());
        assert!(n.visible);
    }

    #[test]
    fn test_preconditions() {
        let v = volume();
        let mut s = TrackingSession::new();
        assert!(matches!(
            s.submit_tip(&v, Vec3::new(100.0, 10.0, 5.0), &params()),
            Err(TrackError::TipOutsideVolume)
        ));
        let bad = TrackingParameters {
            control_points: 0,
            ..params()
        };
        assert!(matches!(
            s.submit_tip(&v, Vec3::new(10.0, 10.0, 39.0), &bad),
            Err(TrackError::InvalidParameters(_))
        ));
        assert!(s.needles().is_empty());
    }

    #[test]
    fn test_raw_tip_without_refinement() {
        let v = volume();
        let p = TrackingParameters {
            auto_correct_tip: false,
            ..params()
        };
        let t = track_needle(&v, Vec3::new(10.4, 9.8, 39.0), &p, None, &Deadline::none()).unwrap();
        assert_eq!(t.control_points.tip(), Some(Vec3::new(10.4, 9.8, 39.0)));
    }

    #[test]
    fn test_bidirectional() {
        let v = volume();
        let p = TrackingParameters {
            bidirectional: true,
            ..params()
        };
        let t = track_needle(&v, Vec3::new(10.0, 10.0, 20.0), &p, None, &Deadline::none()).unwrap();
        assert_eq!(t.source, NeedleSource::Bidirectional);
        let reverse = t.reverse.as_ref().unwrap();
        assert!(reverse.path.len() > 1);
        assert_eq!(
            t.control_points.len(),
            t.forward.path.len() + reverse.path.len() - 1
        );
        assert!(t.control_points.iter().any(|p| p.z > 20.0));
        assert!(t.control_points.iter().any(|p| p.z < 20.0));
        // 曲线从最高点开始.
        let c = t.curve.unwrap();
        assert!(c.tip().z > 20.0);
    }

    #[test]
    fn test_obturator_then_tip() {
        let v = volume();
        let p = params();
        let mut s = TrackingSession::new();
        s.set_mode(InputMode::Obturator);
        let out = s.handle_click(&v, Vec3::new(3.0, 3.0, 30.0), &p).unwrap();
        assert_eq!(out, ClickOutcome::AxialLimit(30.0));
        assert_eq!(s.axial_limit(), Some(30.0));

        s.set_mode(InputMode::Tip);
        let ClickOutcome::Tracked(id) = s.handle_click(&v, Vec3::new(10.0, 10.0, 39.0), &p).unwrap() else {
            panic!("expected a tracked needle");
        };
        let n = s.needle(id).unwrap();
        assert_eq!(n.stop, Some(StopReason::Clipped));
        assert!((min_z(n) - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_validation_clicks() {
        let v = volume();
        let p = params();
        let mut s = TrackingSession::new();
        s.set_mode(InputMode::Validation { needle: None });

        let out = s.handle_click(&v, Vec3::new(5.0, 5.0, 30.0), &p).unwrap();
        assert_eq!(out, ClickOutcome::ValidationPoint { needle: 1, points: 1 });
        assert_eq!(s.mode(), InputMode::Validation { needle: Some(1) });
        assert!(s.needle(1).unwrap().curve.is_none());

        let out = s.handle_click(&v, Vec3::new(5.0, 6.0, 20.0), &p).unwrap();
        assert_eq!(out, ClickOutcome::ValidationPoint { needle: 1, points: 2 });
        let n = s.needle(1).unwrap();
        assert_eq!(n.source, NeedleSource::Validated);
        assert_eq!(n.color, VALIDATION_COLOR);
        assert_eq!(n.curve.as_ref().unwrap().degree(), 1);
        assert!(n.stop.is_none());

        assert!(matches!(
            s.submit_validation_point(Vec3::ZERO, Some(42), &p),
            Err(TrackError::UnknownNeedle(42))
        ));
    }

    #[test]
    fn test_long_validation_needle() {
        let p = params();
        let mut s = TrackingSession::new();
        let id = s.submit_validation_point(Vec3::new(3.0, 4.0, 200.0), None, &p).unwrap();
        for i in 1..200 {
            let z = 200.0 - i as f64;
            assert_eq!(s.submit_validation_point(Vec3::new(3.0, 4.0, z), Some(id), &p).unwrap(), id);
        }
        let n = s.needle(id).unwrap();
        assert_eq!(n.control_points.len(), 200);
        let curve = n.curve.as_ref().unwrap();
        assert_eq!(curve.degree(), 199);
        assert!(curve.samples.iter().all(|q| q.is_finite()));
    }

    #[test]
    fn test_rounds_colors_and_deletion() {
        let v = volume();
        let p = params();
        let mut s = TrackingSession::new();
        let a = s.submit_tip(&v, Vec3::new(10.0, 10.0, 39.0), &p).unwrap();
        assert_eq!(s.next_round(), 1);
        let b = s.submit_tip(&v, Vec3::new(14.0, 10.0, 39.0), &p).unwrap();
        assert_eq!((a, b), (1, 2));
        assert_eq!(s.needle(b).unwrap().round, 1);
        assert_eq!(s.needle(b).unwrap().color, PALETTE[1]);

        assert_eq!(s.delete_last_needle().unwrap().id, 2);
        let c = s.submit_tip(&v, Vec3::new(14.0, 10.0, 39.0), &p).unwrap();
        assert_eq!(c, 3);
        assert_eq!(s.needles().len(), 2);

        s.set_axial_limit(Some(12.0));
        s.reset_session();
        assert!(s.needles().is_empty());
        assert_eq!(s.round(), 0);
        assert_eq!(s.axial_limit(), None);
        assert_eq!(s.submit_tip(&v, Vec3::new(10.0, 10.0, 39.0), &p).unwrap(), 1);
        assert_eq!(s.needle(1).unwrap().color, PALETTE[0]);
        assert!(s.delete_last_needle().is_some());
        assert!(s.delete_last_needle().is_none());
    }

    #[test]
    fn test_labels_and_duplicates() {
        let v = volume();
        let p = params();
        let mut s = TrackingSession::new();
        let a = s.submit_tip(&v, Vec3::new(10.0, 10.0, 39.0), &p).unwrap();
        let b = s.submit_tip(&v, Vec3::new(14.0, 10.0, 39.0), &p).unwrap();
        assert_eq!(s.filter_duplicate_labels(), 0);

        // 标准模板中 "De" 位于 (10, 10).
        s.set_transform(Affine::identity());
        assert_eq!(s.needle(a).unwrap().label.as_deref(), Some("De"));
        assert_eq!(s.needle(b).unwrap().label.as_deref(), Some("De"));

        assert_eq!(s.filter_duplicate_labels(), 1);
        assert!(s.needle(a).unwrap().visible);
        assert!(!s.needle(b).unwrap().visible);
        assert_eq!(s.needle(b).unwrap().label.as_deref(), Some("De"));

        // 新的针创建时立即分配标签.
        let far = s.submit_validation_point(Vec3::new(200.0, 200.0, 0.0), None, &p).unwrap();
        assert_eq!(s.needle(far).unwrap().label.as_deref(), Some(UNASSIGNED_LABEL));
        assert!(!s.needle(far).unwrap().has_label());

        // 平移后两根针都离孔位太远.
        s.set_transform(Affine::from_translation(Vec3::new(100.0, 100.0, 0.0)));
        assert_eq!(s.needle(a).unwrap().label.as_deref(), Some(UNASSIGNED_LABEL));
        assert_eq!(s.filter_duplicate_labels(), 0);
        assert!(s.needles().iter().all(|n| n.visible));
    }

    #[test]
    fn test_with_matcher() {
        let v = volume();
        let mut s = TrackingSession::new().with_matcher(HoleLabelMatcher::default());
        let id = s.submit_tip(&v, Vec3::new(10.0, 10.0, 39.0), &params()).unwrap();
        assert_eq!(s.needle(id).unwrap().label.as_deref(), Some("De"));
    }

    #[test]
    fn test_submit_tips_keeps_order() {
        let v = volume();
        let p = params();
        let mut s = TrackingSession::new();
        let tips = [
            Vec3::new(14.0, 10.0, 39.0),
            Vec3::new(100.0, 0.0, 0.0),
            Vec3::new(10.0, 10.0, 39.0),
        ];
        let ids = s.submit_tips(&v, &tips, &p);
        assert_eq!(ids[0].as_ref().ok(), Some(&1));
        assert!(ids[1].is_err());
        assert_eq!(ids[2].as_ref().ok(), Some(&2));
        assert_eq!(s.needle(1).unwrap().control_points.tip(), Some(tips[0]));
        assert_eq!(s.needle(2).unwrap().control_points.tip(), Some(tips[2]));
    }

    #[cfg(feature = "rayon")]
    #[test]
    fn test_par_submit_tips_matches() {
        let v = volume();
        let p = params();
        let tips = [Vec3::new(14.0, 10.0, 39.0), Vec3::new(10.0, 10.0, 39.0)];
        let mut seq = TrackingSession::new();
        let mut par = TrackingSession::new();
        let a = seq.submit_tips(&v, &tips, &p);
        let b = par.par_submit_tips(&v, &tips, &p);
        assert_eq!(
            a.into_iter().map(|r| r.ok()).collect::<Vec<_>>(),
            b.into_iter().map(|r| r.ok()).collect::<Vec<_>>()
        );
        for (x, y) in seq.needles().iter().zip(par.needles()) {
            assert_eq!(x.control_points, y.control_points);
            assert_eq!(x.color, y.color);
        }
    }
}
