//! Fibonacci 步长规划.
//!
//! 离针尖越远, 步长越大: 针尖附近需要精细搜索, 针体部分相对笔直.

/// 生成长度为 `len` 的 Fibonacci 数列 `[1, 1, 2, 3, 5, ...]`.
pub fn fibonacci(len: usize) -> Vec<f64> {
    let mut seq = Vec::with_capacity(len);
    for i in 0..len {
        let v = if i < 2 { 1.0 } else { seq[i - 1] + seq[i - 2] };
        seq.push(v);
    }
    seq
}

/// 第 `k` 步占追踪总长度的比例.
///
/// 取长度为 `total_steps + 2` 的 Fibonacci 数列的第 `k` 项, 除以整个数列之和.
///
/// # 注意
///
/// 分母是整个数列之和, 所以对 `k = 0..total_steps` 求和 **不等于** 1,
/// 实际追踪长度短于给定针长. 这是保留下来的既有行为.
///
/// `k` 超出数列长度时 panic.
pub fn step_fraction(k: u32, total_steps: u32) -> f64 {
    let seq = fibonacci(total_steps as usize + 2);
    let sum: f64 = seq.iter().sum();
    seq[k as usize] / sum
}

/// 一次追踪的步长表 (单位: 体素).
#[derive(Clone, Debug)]
pub struct StepSchedule {
    steps: Vec<f64>,
}

impl StepSchedule {
    /// 将长度为 `length` 的追踪划分为 `total_steps` 步.
    pub fn new(length: f64, total_steps: u32) -> Self {
        let seq = fibonacci(total_steps as usize + 2);
        let sum: f64 = seq.iter().sum();
        let steps = seq
            .iter()
            .take(total_steps as usize)
            .map(|f| f / sum * length)
            .collect();
        Self { steps }
    }

    /// 第 `k` 步的步长. 越界时 panic.
    #[inline]
    pub fn step(&self, k: u32) -> f64 {
        self.steps[k as usize]
    }

    /// 最大的步长 (即最后一步). 没有步时为 0.
    #[inline]
    pub fn max_step(&self) -> f64 {
        self.steps.last().copied().unwrap_or(0.0)
    }

    /// 步数.
    #[inline]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// 是否没有任何步.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// 所有步长之和.
    pub fn total(&self) -> f64 {
        self.steps.iter().sum()
    }
}
