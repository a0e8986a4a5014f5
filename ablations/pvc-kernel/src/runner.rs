//! 程序运行函数.

use crate::profile::Profile;
use crate::result::AblationResult;
use asl_berry::pvc::{separate_tissues, PvcSpec};
use asl_berry::Kernel;
use std::thread;
use utils::phantom::Phantom;

const GRID: (usize, usize, usize) = (12, 32, 32);
const TIME_POINTS: usize = 8;

/// 以 `kernel` 校正体模, 统计灰质信号误差.
fn profile_kernel(phantom: &Phantom, kernel: Kernel) -> Profile {
    let mut profile = Profile::new(phantom.mask.len());
    let spec = PvcSpec::new(kernel);
    let signals = separate_tissues(
        phantom.data.view(),
        &phantom.mask,
        phantom.gm.view(),
        phantom.wm.view(),
        &spec,
    )
    .expect("Phantom shapes are consistent");
    profile.stop();

    profile.count_fallbacks(signals.fallbacks.len());
    let mut fallbacks = signals.fallbacks.iter().peekable();
    for (row, (est, truth)) in signals
        .gm
        .rows()
        .into_iter()
        .zip(phantom.truth_gm.rows())
        .enumerate()
    {
        if fallbacks.next_if_eq(&&row).is_some() {
            continue;
        }
        est.iter().zip(truth.iter()).for_each(|(e, t)| profile.record(*e, *t));
    }
    profile
}

/// 实际运行.
pub fn run() -> AblationResult {
    println!("Generating phantom {GRID:?} x {TIME_POINTS}...");
    let phantom = Phantom::new(GRID, TIME_POINTS);
    assert!(!phantom.mask.is_empty(), "Empty phantom mask");

    let names = ["in-plane r1", "in-plane r2", "cube r1", "cube r2"];
    let kernels = [
        Kernel::in_plane(1),
        Kernel::in_plane(2),
        Kernel::cube(1),
        Kernel::cube(2),
    ]
    .map(|k| k.expect("Kernel radius is positive"));

    println!("Running ablation studies on {} cores...", utils::cpus());
    let p = &phantom;
    thread::scope(|s| {
        let handles = kernels.map(|k| s.spawn(move || profile_kernel(p, k)));

        AblationResult::from_iter(
            names.into_iter().zip(
                handles
                    .into_iter()
                    .map(|th| th.join().expect("Thread joining error")),
            ),
        )
    })
}
