mod profile;

use ct_needle::prelude::*;
use utils::phantoms::PhantomCase;

pub use profile::Profile;

/// 在参数 `params` 基础上, 依次追踪 `cases` 中的每一根针并统计.
fn run_with(name: &str, cases: &[PhantomCase], params: TrackingParameters) -> Profile {
    let mut profile = Profile::new();
    for case in cases {
        log::info!("{name}: case `{}`...", case.name);
        let params = TrackingParameters {
            invert_contrast: case.bright,
            ..params.clone()
        };

        profile.track_start();
        let tracked = track_needle(&case.volume, case.click, &params, None, &Deadline::none());
        profile.track_elapsed();

        match tracked {
            Ok(t) => {
                let early = !matches!(t.forward.stop, StopReason::Completed | StopReason::Clipped);
                profile.count_tracked(early);
                for p in t.control_points.iter() {
                    profile.count_deviation(case.planar_error(*p));
                }
            }
            Err(e) => {
                log::warn!("{name}: case `{}` failed: {e}", case.name);
                profile.count_failed();
            }
        }
    }
    profile.finish()
}

/// 默认参数.
pub fn baseline(cases: &[PhantomCase]) -> Profile {
    run_with("baseline", cases, TrackingParameters::default())
}

/// 关闭梯度 (邻域对比) 项.
pub fn no_gradient(cases: &[PhantomCase]) -> Profile {
    let params = TrackingParameters {
        gradient_ponderation: 0.0,
        ..Default::default()
    };
    run_with("no-gradient", cases, params)
}

/// 关闭高斯衰减.
pub fn no_attenuation(cases: &[PhantomCase]) -> Profile {
    let params = TrackingParameters {
        gaussian_attenuation: false,
        ..Default::default()
    };
    run_with("no-attenuation", cases, params)
}

/// 不修正针尖, 直接使用点击位置.
pub fn raw_tip(cases: &[PhantomCase]) -> Profile {
    let params = TrackingParameters {
        auto_correct_tip: false,
        ..Default::default()
    };
    run_with("raw-tip", cases, params)
}

/// 正向 + 反向追踪.
pub fn bidirectional(cases: &[PhantomCase]) -> Profile {
    let params = TrackingParameters {
        bidirectional: true,
        ..Default::default()
    };
    run_with("bidirectional", cases, params)
}
