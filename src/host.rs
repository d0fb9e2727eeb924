//! Host platform capabilities consumed by the tracking engine
//!
//! The engine is platform agnostic: each host runtime implements these
//! traits once and hands them to
//! [`TrackingEngine`](crate::engine::TrackingEngine). Composition over a
//! small trait set; no hierarchy.

use std::sync::Arc;

use crate::core::types::{BlockKey, DVec3, Result};

/// World query capability: confirms which block positions hold beacons.
pub trait WorldProbe {
    /// Whether the block at `key` currently holds a beacon.
    ///
    /// An error is treated as "not confirmed": during a scan the offset is
    /// logged and skipped, during an invalidation sweep the entry is
    /// dropped. It never aborts the surrounding operation.
    fn is_beacon(&self, key: BlockKey) -> Result<bool>;

    /// Render-space centroid for a beacon at `key`.
    fn center_of(&self, key: BlockKey) -> DVec3 {
        key.center()
    }
}

/// Observer-facing message sink for enable/disable/distance notices.
pub trait Notifier {
    /// `transient` requests an overlay-style message rather than a
    /// persistent log entry.
    fn notify(&self, text: &str, transient: bool);
}

impl<P: WorldProbe + ?Sized> WorldProbe for Arc<P> {
    fn is_beacon(&self, key: BlockKey) -> Result<bool> {
        (**self).is_beacon(key)
    }

    fn center_of(&self, key: BlockKey) -> DVec3 {
        (**self).center_of(key)
    }
}

impl<N: Notifier + ?Sized> Notifier for Arc<N> {
    fn notify(&self, text: &str, transient: bool) {
        (**self).notify(text, transient)
    }
}
