//! Small helpers shared by the engine and the binary.

use std::time::Duration;

use git_version::git_version;
use rustix::time::{clock_gettime, ClockId};

pub mod id;

pub fn version() -> String {
    if let Some(v) = option_env!("MECHANICS_BUILD_VERSION_STRING") {
        return String::from(v);
    }

    const MAJOR: &str = env!("CARGO_PKG_VERSION_MAJOR");
    const MINOR: &str = env!("CARGO_PKG_VERSION_MINOR");
    const PATCH: &str = env!("CARGO_PKG_VERSION_PATCH");

    let commit =
        option_env!("MECHANICS_BUILD_COMMIT").unwrap_or(git_version!(fallback = "unknown commit"));

    if PATCH == "0" {
        format!("{MAJOR}.{MINOR} ({commit})")
    } else {
        format!("{MAJOR}.{MINOR}.{PATCH} ({commit})")
    }
}

/// Returns the current time on the monotonic clock.
pub fn get_monotonic_time() -> Duration {
    let ts = clock_gettime(ClockId::Monotonic);
    Duration::new(ts.tv_sec as u64, ts.tv_nsec as u32)
}

pub fn lerp(start: f32, stop: f32, fraction: f32) -> f32 {
    start + (stop - start) * fraction
}

/// Fraction of the way from `last` to `current` at which `position` is crossed.
///
/// Clamped to `0..=1`. When the two samples are equal, the crossing is attributed to the end of
/// the interval.
pub fn crossing_fraction(position: f32, last: f32, current: f32) -> f32 {
    let span = current - last;
    if span == 0. || !span.is_finite() {
        return 1.;
    }

    let fraction = (position - last) / span;
    if fraction.is_nan() {
        return 1.;
    }
    fraction.clamp(0., 1.)
}

/// Interpolates a nanosecond timestamp, rounding to the nearest nanosecond.
pub fn lerp_nanos(start: u64, stop: u64, fraction: f32) -> u64 {
    if stop <= start {
        return start;
    }

    let span = (stop - start) as f64;
    let offset = (span * f64::from(fraction.clamp(0., 1.))).round() as u64;
    start + offset.min(stop - start)
}

pub fn duration_to_nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}
