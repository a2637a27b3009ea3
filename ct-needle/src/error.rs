//! 运行时错误.
//!
//! 追踪过程中的越界采样、方向退化、二分重试耗尽等情况属于 "软停止",
//! 通过 [`crate::StopReason`] 报告, 不在此列.

use thiserror::Error;

/// 追踪 / 拟合 / 会话操作的前置检查错误.
#[derive(Debug, Error)]
pub enum TrackError {
    /// 追踪参数非法. 参数为具体原因.
    #[error("invalid tracking parameters: {0}")]
    InvalidParameters(String),

    /// 体数据非法 (空数据、非正体素尺寸等). 参数为具体原因.
    #[error("invalid volume: {0}")]
    InvalidVolume(String),

    /// 针尖不在体数据范围内.
    #[error("tip lies outside of the volume")]
    TipOutsideVolume,

    /// 仿射变换不可逆.
    #[error("transform is singular")]
    SingularTransform,

    /// 控制点不足以做实际拟合工作.
    ///
    /// 第一个参数代表目前已有的点, 第二个参数代表实际拟合需要的最少点数.
    #[error("too few control points: got {0}, need at least {1}")]
    TooFewControlPoints(usize, usize),

    /// 会话中不存在该编号的针.
    #[error("unknown needle #{0}")]
    UnknownNeedle(u32),

    /// nifti 文件读取失败.
    #[error(transparent)]
    Nifti(#[from] nifti::NiftiError),

    /// 配置文件读写失败.
    #[cfg(feature = "serde")]
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// 配置文件格式错误.
    #[cfg(feature = "serde")]
    #[error(transparent)]
    Config(#[from] serde_json::Error),
}

/// 追踪 / 拟合 / 会话操作的返回类型.
pub type TrackResult<T> = Result<T, TrackError>;
