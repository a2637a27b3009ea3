//! 追踪参数.

use crate::consts::tracking::*;
use crate::{TrackError, TrackResult};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 一次追踪所需的全部参数. 所有长度以毫米为单位.
///
/// 由用户负责确保对象的值合法; 追踪开始前会调用 [`Self::validate`] 检查.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TrackingParameters {
    /// 搜索圆锥底面半径 (对应整根针长度时的半径).
    pub cone_radius_mm: f64,

    /// 半径方向最多采样多少圈.
    pub radius_steps: u32,

    /// 半径方向至少采样多少圈.
    pub min_radius_steps: u32,

    /// 每一圈采样多少个角度.
    pub rotation_steps: u32,

    /// 每根针的控制点个数 (包括针尖).
    pub control_points: u32,

    /// 高斯衰减的 sigma. 实际使用 `sigma / 10`.
    pub sigma: f64,

    /// 是否启用高斯衰减.
    pub gaussian_attenuation: bool,

    /// 梯度 (邻域对比) 项的权重. 为 0 时不计算梯度项.
    pub gradient_ponderation: f64,

    /// 中心加权指数.
    pub center_ponderation: f64,

    /// 针半径, 决定梯度项的邻域偏移距离.
    pub needle_radius_mm: f64,

    /// 针的目标 / 最大长度.
    pub needle_length_mm: f64,

    /// "最大长度" 模式. 没有指定 `axial_limit` 时, 以 `k = 0` 作为隐式截断平面.
    pub max_length: bool,

    /// 轴向截断平面, 以体素 `k` 坐标 (切片坐标) 表示.
    pub axial_limit: Option<f64>,

    /// 追踪前是否自动修正针尖.
    pub auto_correct_tip: bool,

    /// 针尖修正搜索盒在 X/Y 方向的半宽.
    pub tip_box_xy_mm: f64,

    /// 针尖修正搜索盒在 Z 方向的半宽.
    pub tip_box_z_mm: f64,

    /// 是否同时反向追踪.
    pub bidirectional: bool,

    /// 拟合时是否把针延长到 `needle_length_mm`.
    pub extend_needle: bool,

    /// 针比周围组织亮 (CT 金属针). 开启后所有采样强度取反.
    pub invert_contrast: bool,

    /// 每段候选线段上的插值点个数.
    pub segment_samples: u32,

    /// 反向追踪二分法质量门限.
    pub dichotomy_threshold: f64,

    /// 反向追踪二分法最大重试次数.
    pub dichotomy_retries: u32,

    /// Bézier 曲线采样点数.
    pub curve_samples: usize,
}

impl Default for TrackingParameters {
    fn default() -> Self {
        Self {
            cone_radius_mm: 4.0,
            radius_steps: 4,
            min_radius_steps: 1,
            rotation_steps: 35,
            control_points: 6,
            sigma: 20.0,
            gaussian_attenuation: true,
            gradient_ponderation: 1.0,
            center_ponderation: 2.0,
            needle_radius_mm: 1.0,
            needle_length_mm: 100.0,
            max_length: false,
            axial_limit: None,
            auto_correct_tip: true,
            tip_box_xy_mm: 5.0,
            tip_box_z_mm: 5.0,
            bidirectional: false,
            extend_needle: false,
            invert_contrast: false,
            segment_samples: SEGMENT_SAMPLES,
            dichotomy_threshold: DICHOTOMY_THRESHOLD,
            dichotomy_retries: DICHOTOMY_MAX_RETRIES,
            curve_samples: CURVE_SAMPLES,
        }
    }
}

impl TrackingParameters {
    /// 检查参数合法性.
    pub fn validate(&self) -> TrackResult<()> {
        fn positive(name: &str, v: f64) -> TrackResult<()> {
            if v.is_finite() && v > 0.0 {
                Ok(())
            } else {
                Err(TrackError::InvalidParameters(format!(
                    "`{name}` must be positive, got {v}"
                )))
            }
        }

        fn non_negative(name: &str, v: f64) -> TrackResult<()> {
            if v.is_finite() && v >= 0.0 {
                Ok(())
            } else {
                Err(TrackError::InvalidParameters(format!(
                    "`{name}` must be non-negative, got {v}"
                )))
            }
        }

        fn at_least(name: &str, v: u64, min: u64) -> TrackResult<()> {
            if v >= min {
                Ok(())
            } else {
                Err(TrackError::InvalidParameters(format!(
                    "`{name}` must be at least {min}, got {v}"
                )))
            }
        }

        non_negative("cone_radius_mm", self.cone_radius_mm)?;
        at_least("radius_steps", self.radius_steps as u64, 1)?;
        at_least("min_radius_steps", self.min_radius_steps as u64, 1)?;
        if self.min_radius_steps > self.radius_steps {
            return Err(TrackError::InvalidParameters(
                "`min_radius_steps` exceeds `radius_steps`".to_string(),
            ));
        }
        at_least("rotation_steps", self.rotation_steps as u64, 1)?;
        at_least("control_points", self.control_points as u64, 2)?;
        positive("sigma", self.sigma)?;
        non_negative("gradient_ponderation", self.gradient_ponderation)?;
        positive("center_ponderation", self.center_ponderation)?;
        positive("needle_radius_mm", self.needle_radius_mm)?;
        positive("needle_length_mm", self.needle_length_mm)?;
        if let Some(limit) = self.axial_limit {
            if !limit.is_finite() {
                return Err(TrackError::InvalidParameters(format!(
                    "`axial_limit` must be finite, got {limit}"
                )));
            }
        }
        non_negative("tip_box_xy_mm", self.tip_box_xy_mm)?;
        non_negative("tip_box_z_mm", self.tip_box_z_mm)?;
        at_least("segment_samples", self.segment_samples as u64, 1)?;
        non_negative("dichotomy_threshold", self.dichotomy_threshold)?;
        at_least("curve_samples", self.curve_samples as u64, 2)?;
        Ok(())
    }

    /// 正向追踪的步数, 即控制点个数减一.
    #[inline]
    pub fn steps(&self) -> u32 {
        self.control_points.saturating_sub(1)
    }

    /// 实际生效的轴向截断平面 (体素 `k` 坐标).
    ///
    /// 显式指定的 `axial_limit` 优先; 否则在 "最大长度" 模式下为 `0.0`.
    #[inline]
    pub fn effective_axial_limit(&self) -> Option<f64> {
        self.axial_limit.or(self.max_length.then_some(0.0))
    }

    /// 从 JSON 键值文件读取参数. 文件中缺失的键取默认值.
    #[cfg(feature = "serde")]
    pub fn load<P: AsRef<std::path::Path>>(path: P) -> TrackResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let params: Self = serde_json::from_str(&text)?;
        params.validate()?;
        Ok(params)
    }

    /// 将参数保存为 JSON 键值文件.
    #[cfg(feature = "serde")]
    pub fn save<P: AsRef<std::path::Path>>(&self, path: P) -> TrackResult<()> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::TrackingParameters;
    use crate::TrackError;

    #[test]
    fn test_default_is_valid() {
        let p = TrackingParameters::default();
        assert!(p.validate().is_ok());
        assert_eq!(p.steps(), 5);
        assert_eq!(p.effective_axial_limit(), None);
    }

    #[test]
    fn test_invalid_parameters() {
        let bad = [
            TrackingParameters {
                control_points: 1,
                ..Default::default()
            },
            TrackingParameters {
                sigma: 0.0,
                ..Default::default()
            },
            TrackingParameters {
                needle_length_mm: f64::NAN,
                ..Default::default()
            },
            TrackingParameters {
                min_radius_steps: 5,
                radius_steps: 4,
                ..Default::default()
            },
            TrackingParameters {
                axial_limit: Some(f64::INFINITY),
                ..Default::default()
            },
        ];
        for p in bad {
            assert!(matches!(
                p.validate(),
                Err(TrackError::InvalidParameters(_))
            ));
        }
    }

    #[test]
    fn test_effective_axial_limit() {
        let mut p = TrackingParameters {
            max_length: true,
            ..Default::default()
        };
        assert_eq!(p.effective_axial_limit(), Some(0.0));
        p.axial_limit = Some(12.5);
        assert_eq!(p.effective_axial_limit(), Some(12.5));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_load_partial_config() {
        let mut path = std::env::temp_dir();
        path.push(format!("ct-needle-params-{}.json", std::process::id()));
        std::fs::write(&path, r#"{ "control_points": 9, "invert_contrast": true }"#).unwrap();

        let p = TrackingParameters::load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(p.control_points, 9);
        assert!(p.invert_contrast);
        assert_eq!(p.rotation_steps, TrackingParameters::default().rotation_steps);
    }
}
