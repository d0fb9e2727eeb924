//! Chunk-bucketed spatial index for beacon proximity queries
//!
//! Groups beacons into 16x16 horizontal chunk buckets so a nearby query
//! only touches the chunks overlapping the query radius instead of the
//! whole set. Any number of queries may run concurrently; mutation takes
//! the write lock and is exclusive with everything else, so a query always
//! observes whole pre- or post-mutation buckets.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::core::error::Error;
use crate::core::types::{BlockKey, DVec3, Result};

/// Horizontal bucket size in world units.
const CHUNK_SIZE: f64 = 16.0;

/// Bucketing key: the chunk column containing a position's X/Z.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct ChunkCoord {
    cx: i32,
    cz: i32,
}

impl ChunkCoord {
    fn containing(pos: DVec3) -> Self {
        Self {
            cx: (pos.x / CHUNK_SIZE).floor() as i32,
            cz: (pos.z / CHUNK_SIZE).floor() as i32,
        }
    }
}

/// One indexed beacon entry.
#[derive(Clone, Copy, Debug)]
pub struct IndexEntry {
    pub key: BlockKey,
    pub center: DVec3,
}

/// Chunk-bucketed spatial index.
///
/// Buckets are created lazily on first insert into a chunk and deleted
/// once emptied, bounding memory to the live beacon count.
#[derive(Debug, Default)]
pub struct SpatialIndex {
    buckets: RwLock<HashMap<ChunkCoord, Vec<IndexEntry>>>,
}

impl SpatialIndex {
    pub fn new() -> Self {
        Self {
            buckets: RwLock::new(HashMap::new()),
        }
    }

    /// Insert a beacon at `center`.
    ///
    /// Rejects non-finite positions as [`Error::InvalidInput`].
    pub fn insert(&self, key: BlockKey, center: DVec3) -> Result<()> {
        if !center.is_finite() {
            return Err(Error::InvalidInput(format!(
                "non-finite beacon center: {center:?}"
            )));
        }
        let mut buckets = self.buckets.write().unwrap();
        buckets
            .entry(ChunkCoord::containing(center))
            .or_default()
            .push(IndexEntry { key, center });
        Ok(())
    }

    /// Remove a beacon previously inserted at `center`.
    ///
    /// A missing bucket or key is a no-op. An emptied bucket is deleted so
    /// a roaming observer's history cannot accumulate empty entries.
    pub fn remove(&self, key: BlockKey, center: DVec3) {
        if !center.is_finite() {
            return;
        }
        let coord = ChunkCoord::containing(center);
        let mut buckets = self.buckets.write().unwrap();
        if let Some(entries) = buckets.get_mut(&coord) {
            entries.retain(|entry| entry.key != key);
            if entries.is_empty() {
                buckets.remove(&coord);
            }
        }
    }

    /// All entries within `radius` of `center`, boundary inclusive.
    ///
    /// The chunk scan is a coarse pre-filter; the final test is the exact
    /// Euclidean distance. Negative or non-finite radii are rejected as
    /// [`Error::InvalidInput`].
    pub fn query_nearby(&self, center: DVec3, radius: f64) -> Result<Vec<IndexEntry>> {
        if radius < 0.0 || !radius.is_finite() {
            return Err(Error::InvalidInput(format!(
                "invalid query radius: {radius}"
            )));
        }
        if !center.is_finite() {
            return Err(Error::InvalidInput(format!(
                "non-finite query center: {center:?}"
            )));
        }

        let chunk_radius = (radius / CHUNK_SIZE).ceil() as i32 + 1;
        let center_chunk = ChunkCoord::containing(center);

        let buckets = self.buckets.read().unwrap();
        let mut result = Vec::new();
        for cx in -chunk_radius..=chunk_radius {
            for cz in -chunk_radius..=chunk_radius {
                let coord = ChunkCoord {
                    cx: center_chunk.cx + cx,
                    cz: center_chunk.cz + cz,
                };
                if let Some(entries) = buckets.get(&coord) {
                    for entry in entries {
                        if center.distance(entry.center) <= radius {
                            result.push(*entry);
                        }
                    }
                }
            }
        }
        Ok(result)
    }

    /// Remove all entries and buckets.
    pub fn clear(&self) {
        self.buckets.write().unwrap().clear();
    }

    /// Number of indexed entries.
    pub fn len(&self) -> usize {
        self.buckets.read().unwrap().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(test)]
    fn bucket_count(&self) -> usize {
        self.buckets.read().unwrap().len()
    }
}
