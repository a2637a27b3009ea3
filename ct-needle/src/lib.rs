#![warn(missing_docs)] // <= 合适时移除它.
// #![warn(clippy::missing_docs_in_private_items)]  // <= too strict.

//! 核心库. 提供基于 3D 体数据 (MRI/CT) 的插植针 (needle / catheter) 追踪、
//! Bézier 曲线拟合与模板孔位标注功能.
//!
//! 该 crate 目前仅提供 `safe` 接口. 宿主程序 (场景图、渲染、GUI 交互、配准)
//! 不在本 crate 范围内, 本 crate 只负责纯计算部分.
//!
//! # 注意
//!
//! 1. 追踪在体素坐标系 (grid, `(i, j, k)`) 中进行, 输出控制点为物理坐标系
//!   (physical, 毫米) 下的点. 两者通过体数据的仿射变换互相转换.
//! 2. 默认 `k` 轴与病人的头足方向 (物理 Z 轴) 对齐, 这是轴位扫描的常见情况.
//! 3. 所有 "软停止" (越界采样、方向退化、二分重试耗尽、无匹配孔位)
//!   都不是错误, 只有参数/体数据的前置检查失败才返回 `Err`.
//!
//! # 开发计划
//!
//! ### 体数据与采样 ✅
//!
//! nifti 读取, 体素/物理坐标互转, 越界返回哨兵值.
//!
//! 实现位于 `ct-needle/src/data`.
//!
//! ### Fibonacci 步长规划 ✅
//!
//! 越远离针尖, 步长越大.
//!
//! 实现位于 `ct-needle/src/track/schedule.rs`.
//!
//! ### 目标函数 ✅
//!
//! 中心强度 + 邻域对比 (梯度) + 中心加权指数 + 可选的高斯衰减.
//!
//! 实现位于 `ct-needle/src/track/objective.rs`.
//!
//! ### 针尖修正, 正向追踪, 反向追踪 (二分法质量门限) ✅
//!
//! 实现位于 `ct-needle/src/track/{tip, forward, reverse}.rs`.
//!
//! ### Bézier 曲线拟合 ✅
//!
//! 实现位于 `ct-needle/src/fitting`.
//!
//! ### 模板孔位标注 ✅
//!
//! 63 孔模板, 在给定刚体变换下求最近孔位.
//!
//! 实现位于 `ct-needle/src/template.rs`.
//!
//! ### 追踪会话 ✅
//!
//! 针的编号、轮次、颜色、输入模式与标注管理.
//!
//! 实现位于 `ct-needle/src/session.rs`.
//!
//! ### 对比度极性 ⌛️
//!
//! CT 中金属针是亮的, MRI 中是暗的. 目前由 `invert_contrast`
//! 显式指定, 尚未根据体数据自动判断.

pub mod consts;
pub mod data;
pub mod error;
pub mod fitting;
pub mod geom;
pub mod params;
pub mod prelude;
pub mod session;
pub mod template;
pub mod track;

/// 三维体素索引, 顺序为 `(i, j, k)`, 同时也可一定程度上用作非负整数向量.
pub type Idx3d = (usize, usize, usize);

pub use data::{Volume, VolumeSampler};
pub use error::{TrackError, TrackResult};
pub use fitting::FittedCurve;
pub use geom::{Affine, Vec3};
pub use params::TrackingParameters;
pub use session::{InputMode, Needle, NeedleSource, TrackingSession};
pub use template::{HoleLabelMatcher, TemplateHole, TemplateHoleTable};
pub use track::{ControlPointList, Deadline, StopReason, TrackOutcome};
