//! Crash curve math.
//!
//! The round scheduler in `round.rs` owns the timing and player state.
//! This module holds the pure pieces: where a round busts and what the
//! multiplier reads at a given flight time.

use crate::config::CrashConfig;
use crate::games::rng::DrawStream;

/// Draw a bust point from one uniform unit. `0.99 / (1 - p)` gives a
/// 1% instant-bust mass at 1.00x and a long tail, clamped to the
/// configured ceiling.
pub fn crash_point(stream: &mut DrawStream, max_crash_point: f64) -> f64 {
    let p = stream.next_unit();
    let raw = 0.99 / (1.0 - p);
    raw.clamp(1.0, max_crash_point)
}

/// Multiplier after `elapsed` seconds of flight. Quadratic in time so
/// late flight accelerates.
pub fn multiplier_at(elapsed_secs: f64, cfg: &CrashConfig) -> f64 {
    1.0 + cfg.base_rate * elapsed_secs + cfg.accel * elapsed_secs * elapsed_secs
}

/// Seconds of flight until the multiplier reaches `target`. Inverse of
/// `multiplier_at`, used to know when a round busts.
pub fn time_to_multiplier(target: f64, cfg: &CrashConfig) -> f64 {
    if target <= 1.0 {
        return 0.0;
    }
    // Solve accel*t^2 + base_rate*t - (target - 1) = 0 for t >= 0.
    let a = cfg.accel;
    let b = cfg.base_rate;
    let c = target - 1.0;
    if a == 0.0 {
        return c / b;
    }
    (-b + (b * b + 4.0 * a * c).sqrt()) / (2.0 * a)
}
