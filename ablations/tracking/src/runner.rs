//! 程序运行函数.

use crate::result::AblationResult;
use std::thread;
use utils::phantoms;

/// 实际运行.
pub fn run() -> AblationResult {
    let cases = phantoms::all_cases().expect("Building phantoms error");
    assert!(!cases.is_empty());
    let cases = cases.as_slice();

    println!(
        "Running ablation studies on {} phantoms ({} cpus)...",
        cases.len(),
        utils::cpus()
    );
    thread::scope(|s| {
        use super::variants::*;

        let handles = [baseline, no_gradient, no_attenuation, raw_tip, bidirectional]
            .map(|t| s.spawn(move || t(cases)));

        AblationResult::from_iter(
            [
                "baseline",
                "no-gradient",
                "no-attenuation",
                "raw-tip",
                "bidirectional",
            ]
            .into_iter()
            .zip(
                handles
                    .into_iter()
                    .map(|th| th.join().expect("Thread joining error")),
            ),
        )
    })
}
