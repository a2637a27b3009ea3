//! 追踪运行统计.

use std::time::{Duration, Instant};

/// ablation/benchmark 计时器.
///
/// 该计时器支持 "中途中断" 与 "结束中断, 继续开始计时".
#[derive(Clone, Debug)]
struct AccTimer {
    consumed: Duration,
    since: Instant,
}

impl AccTimer {
    /// 初始化计时器. 初始化时会视为已经开始计时 (`self.start()`).
    #[inline]
    pub fn new() -> Self {
        Self {
            consumed: Duration::from_secs(0),
            since: Instant::now(),
        }
    }

    /// 开始计时.
    #[inline]
    pub fn start(&mut self) {
        self.since = Instant::now();
    }

    /// 结束计时, 并将这一区间的时间累加. 返回本轮计时时长.
    ///
    /// # 注意
    ///
    /// 上一次调用必须是 `self.start()`, 否则计算时间值无意义.
    #[inline]
    pub fn elapsed(&mut self) -> Duration {
        let d = self.since.elapsed();
        self.consumed += d;
        d
    }

    /// 获得总共累计下来的时间 (以微秒为单位).
    #[inline]
    pub fn get_total_us(&self) -> u64 {
        self.consumed.as_micros() as u64
    }
}

impl Default for AccTimer {
    fn default() -> Self {
        Self::new()
    }
}

/// 一组参数在全部用例上的统计.
#[derive(Clone, Debug)]
pub struct Profile {
    /// 追踪失败 (前置检查未通过) 的用例个数.
    failed: u64,

    /// 成功追踪的针数.
    tracked: u64,

    /// 追踪提前停止 (非 `Completed` / `Clipped`) 的针数.
    early_stops: u64,

    /// 追踪花费的总时间.
    track_time: AccTimer,

    /// 整个任务花费的总时间.
    real_time: AccTimer,

    /// 最耗时的一次追踪.
    most: Option<Duration>,

    /// 所有控制点到真实针轴线的平面距离之和 (毫米).
    deviation: f64,

    /// 最大的平面距离 (毫米).
    worst: f64,

    /// 参与统计的控制点个数.
    points: u64,
}

impl Profile {
    /// 初始化.
    #[inline]
    pub fn new() -> Self {
        Self {
            failed: 0,
            tracked: 0,
            early_stops: 0,
            track_time: AccTimer::default(),
            real_time: AccTimer::default(),
            most: None,
            deviation: 0.0,
            worst: 0.0,
            points: 0,
        }
    }

    /// 开始一次追踪计时.
    #[inline]
    pub fn track_start(&mut self) {
        self.track_time.start();
    }

    /// 结束一次追踪计时.
    #[inline]
    pub fn track_elapsed(&mut self) {
        let d = self.track_time.elapsed();
        self.most = Some(self.most.map_or(d, |m| m.max(d)));
    }

    /// 记录一次失败.
    #[inline]
    pub fn count_failed(&mut self) {
        self.failed += 1;
    }

    /// 记录一根成功追踪的针. `early` 表示是否提前停止.
    #[inline]
    pub fn count_tracked(&mut self, early: bool) {
        self.tracked += 1;
        self.early_stops += u64::from(early);
    }

    /// 记录一个控制点的平面误差.
    #[inline]
    pub fn count_deviation(&mut self, d: f64) {
        self.deviation += d;
        self.worst = self.worst.max(d);
        self.points += 1;
    }

    /// 结束全部计时.
    #[inline]
    pub fn finish(mut self) -> Self {
        self.real_time.elapsed();
        self
    }

    /// 失败次数.
    #[inline]
    pub fn get_failed(&self) -> u64 {
        self.failed
    }

    /// 成功追踪的针数.
    #[inline]
    pub fn get_tracked(&self) -> u64 {
        self.tracked
    }

    /// 提前停止的针数.
    #[inline]
    pub fn get_early_stops(&self) -> u64 {
        self.early_stops
    }

    /// 以微秒为单位获得追踪的总花费时间.
    #[inline]
    pub fn get_track_time_us(&self) -> u64 {
        self.track_time.get_total_us()
    }

    /// 以微秒为单位获得任务的总自然时间.
    #[inline]
    pub fn get_real_time_us(&self) -> u64 {
        self.real_time.get_total_us()
    }

    /// 以微秒为单位获得每根针的平均追踪时间.
    #[inline]
    pub fn get_avg_track_time_us(&self) -> Option<f64> {
        match self.tracked {
            0 => None,
            n => Some(self.get_track_time_us() as f64 / n as f64),
        }
    }

    /// 平均平面误差.
    #[inline]
    pub fn get_avg_deviation(&self) -> Option<f64> {
        match self.points {
            0 => None,
            n => Some(self.deviation / n as f64),
        }
    }

    /// 最大平面误差.
    #[inline]
    pub fn get_worst_deviation(&self) -> f64 {
        self.worst
    }

    /// 最耗时的一次追踪. 如果不存在任务, 则返回 `None`.
    #[inline]
    pub fn get_most_time_consuming(&self) -> Option<Duration> {
        self.most
    }
}

impl Default for Profile {
    fn default() -> Self {
        Self::new()
    }
}
