//! Precision policies.
//!
//! Frame-to-frame rendering must be stable, so anything that sorts floats
//! (neighbour distances, node ages) goes through the helpers here instead of
//! `partial_cmp`.

use core::cmp::Ordering;

/// Tolerance used when comparing projected coordinates in metres.
pub const METRE_EPSILON: f64 = 1e-6;

/// Canonicalize a floating-point value for deterministic ordering.
///
/// Rules:
/// - `-0.0` becomes `0.0`
/// - all NaNs become a single canonical NaN
pub fn canonical_f64(v: f64) -> f64 {
    if v == 0.0 {
        0.0
    } else if v.is_nan() {
        f64::NAN
    } else {
        v
    }
}

/// Deterministic total ordering for floats.
///
/// NaN sorts after every finite value and after `+inf`.
pub fn stable_total_cmp_f64(a: f64, b: f64) -> Ordering {
    canonical_f64(a).total_cmp(&canonical_f64(b))
}

/// Returns true when `a` and `b` differ by at most `eps`.
pub fn approx_eq(a: f64, b: f64, eps: f64) -> bool {
    (a - b).abs() <= eps
}
