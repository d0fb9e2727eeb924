//! Distance-based detail selection for beacon spheres
//!
//! Maps a scalar distance to a segment count between configured min/max
//! tiers: full detail inside the threshold distance, then a linear falloff
//! that bottoms out at twice the threshold.

/// Segment count for a sphere at the given distance.
///
/// Negative distances clamp to zero and a swapped min/max pair is
/// normalized rather than rejected. The result is monotonically
/// non-increasing in distance.
///
/// # Examples
/// ```
/// use beacontrack::lod::segments_for_distance;
///
/// assert_eq!(segments_for_distance(10.0, 32, 16, 32.0), 32); // full detail
/// assert_eq!(segments_for_distance(64.0, 32, 16, 32.0), 16); // fully reduced
/// ```
pub fn segments_for_distance(
    distance: f64,
    max_segments: u32,
    min_segments: u32,
    lod_distance: f64,
) -> u32 {
    let distance = distance.max(0.0);

    let (max_segments, min_segments) = if max_segments < min_segments {
        (min_segments, max_segments)
    } else {
        (max_segments, min_segments)
    };

    if distance <= lod_distance {
        return max_segments;
    }

    // Linear falloff, fully reduced at twice the threshold distance.
    let ratio = ((distance - lod_distance) / lod_distance).min(1.0);
    let range = max_segments - min_segments;
    let reduction = (range as f64 * ratio) as u32;

    max_segments - reduction
}

/// Fixed 3-tier variant for callers without configured tiers.
pub fn segments_simple(distance: f64) -> u32 {
    if distance < 32.0 {
        32
    } else if distance < 64.0 {
        24
    } else {
        16
    }
}
