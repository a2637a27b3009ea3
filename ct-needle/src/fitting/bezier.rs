//! Bézier 曲线.

// ref: https://en.wikipedia.org/wiki/B%C3%A9zier_curve#Explicit_definition

use crate::Vec3;

/// `n` 次 Bernstein 基函数的二项式系数, 长度为 `n + 1`.
///
/// 以 `C(n, i + 1) = C(n, i) * (n - i) / (i + 1)` 递推, 全程使用 `f64`,
/// 控制点数上千时也不会整数溢出.
pub(crate) fn binomial_row(n: usize) -> Vec<f64> {
    let mut row = Vec::with_capacity(n + 1);
    let mut w = 1.0;
    row.push(w);
    for i in 0..n {
        w = w * (n - i) as f64 / (i + 1) as f64;
        row.push(w);
    }
    row
}

pub(crate) struct BezierImp<'a> {
    control: &'a [Vec3],
    weights: Vec<f64>,
}

impl<'a> BezierImp<'a> {
    /// 曲线次数固定为 `control.len() - 1`.
    pub fn new(control: &'a [Vec3]) -> Self {
        assert!(control.len() >= 2, "至少需要两个控制点");
        Self {
            control,
            weights: binomial_row(control.len() - 1),
        }
    }

    #[inline]
    pub fn degree(&self) -> usize {
        self.control.len() - 1
    }

    /// 求参数 `t ∈ [0, 1]` 处的点.
    pub fn eval(&self, t: f64) -> Vec3 {
        let n = self.degree() as i32;
        let s = 1.0 - t;
        self.control
            .iter()
            .zip(self.weights.iter())
            .enumerate()
            .fold(Vec3::ZERO, |acc, (i, (&p, &w))| {
                let i = i as i32;
                acc + p * (w * t.powi(i) * s.powi(n - i))
            })
    }

    /// 在 `[0, 1]` 上等距采样 `samples` 个点 (`samples >= 2`), 包含两个端点.
    pub fn make_curve(&self, samples: usize) -> Vec<Vec3> {
        assert!(samples >= 2, "至少需要采样两个点");
        let last = (samples - 1) as f64;
        (0..samples).map(|k| self.eval(k as f64 / last)).collect()
    }
}
