//! Approximate view-cone visibility for spheres
//!
//! Decides whether a sphere might be visible from the observer without any
//! matrix math: a dot-product cone test widened by the sphere's angular
//! size. No near/far clipping and no occlusion test.

use crate::core::types::DVec3;
use crate::math;

/// Squared length under which a facing vector counts as zero.
const MIN_FACING_LENGTH_SQ: f64 = 1e-4;

/// Check if a sphere is potentially visible.
///
/// Always true within `2 * radius` of the observer (avoids boundary
/// flicker up close) and for a near-zero facing vector (cannot determine,
/// fail open). Otherwise compares the angle between the observer-to-center
/// direction and `facing` against half the FOV plus the sphere's angular
/// size, so a sphere whose center sits just outside the nominal FOV but
/// whose extent does not still counts as visible.
pub fn sphere_visible(
    center: DVec3,
    radius: f64,
    observer_pos: DVec3,
    facing: DVec3,
    fov_degrees: f64,
) -> bool {
    let to_center = center - observer_pos;
    let distance = to_center.length();

    if distance < radius * 2.0 {
        return true;
    }

    if facing.length_squared() < MIN_FACING_LENGTH_SQ {
        return true;
    }

    let dir = to_center / distance;
    let look = math::normalize_dir(facing);
    let dot = dir.dot(look);

    let half_fov = (fov_degrees / 2.0).to_radians();
    let sphere_angle = (radius / distance).atan();
    let threshold = (half_fov + sphere_angle).cos();

    dot > threshold
}
