//! Core type aliases and re-exports

pub use glam::DVec3;

/// Standard Result type for the engine
pub type Result<T> = std::result::Result<T, crate::core::error::Error>;

/// Integer block position identifying a beacon.
///
/// Identity key for the canonical beacon map: two beacons refer to the
/// same entry iff their keys are equal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BlockKey {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockKey {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Block containing a world-space point (component-wise floor).
    pub fn containing(point: DVec3) -> Self {
        Self {
            x: point.x.floor() as i32,
            y: point.y.floor() as i32,
            z: point.z.floor() as i32,
        }
    }

    /// Centroid of the block, the default render-space beacon center.
    pub fn center(&self) -> DVec3 {
        DVec3::new(
            self.x as f64 + 0.5,
            self.y as f64 + 0.5,
            self.z as f64 + 0.5,
        )
    }

    /// Key offset by integer deltas.
    pub fn offset(&self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }
}
