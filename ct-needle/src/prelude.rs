//! 🪡欢迎光临🧵
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::Idx3d;

pub use crate::data::phantom::{NeedlePhantom, PhantomNeedle};
pub use crate::data::{Volume, VolumeSampler};
pub use crate::geom::{Affine, Vec3};

pub use crate::consts::{PALETTE, UNASSIGNED_LABEL};
pub use crate::error::{TrackError, TrackResult};
pub use crate::params::TrackingParameters;

pub use crate::track::{
    ControlPointList, Deadline, DichotomyGate, ForwardTracker, ReverseTracker, StopReason,
    TipRefiner, TrackOutcome,
};

pub use crate::fitting::FittedCurve;
pub use crate::session::{
    track_needle, ClickOutcome, InputMode, Needle, NeedleSource, TrackedNeedle, TrackingSession,
};
pub use crate::template::{HoleLabelMatcher, TemplateHole, TemplateHoleTable};
