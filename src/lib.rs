//! Beacontrack - proximity tracking engine for world beacons
//!
//! Tracks point-of-interest markers ("beacons") discovered by scanning a
//! cubic volume around a moving observer, keeps the set queryable by
//! proximity, and derives per-beacon render parameters (color, detail
//! tier, visibility) every frame. Scans are expensive and rare; the
//! per-frame queries stay cheap.

pub mod core;
pub mod math;
pub mod lod;
pub mod index;
pub mod config;
pub mod host;
pub mod engine;
