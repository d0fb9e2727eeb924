//! Mathematical utilities

pub mod frustum;

use crate::core::types::DVec3;

/// Squared length under which a vector counts as zero.
const MIN_LENGTH_SQ: f64 = 1e-4;

/// Normalize a direction vector, falling back to +Z for near-zero input.
///
/// A degenerate look direction means "cannot determine"; callers treat
/// the fallback as assume-visible rather than an error.
pub fn normalize_dir(v: DVec3) -> DVec3 {
    if v.length_squared() < MIN_LENGTH_SQ {
        DVec3::Z
    } else {
        v / v.length()
    }
}
