//! Tracking engine: scan scheduling, invalidation, and render planning
//!
//! Owns the canonical beacon set and orchestrates the other components. A
//! tick thread drives scanning and invalidation; a render thread asks for
//! a per-frame render plan. One reader-writer lock guards the canonical
//! map and the scheduling state together, and index mutations only happen
//! while its write half is held, so the map and the spatial index stay
//! consistent with each other.

use std::collections::HashMap;
use std::sync::RwLock;

use log::{debug, warn};

use crate::config::{Color, Config};
use crate::core::types::{BlockKey, DVec3, Result};
use crate::host::{Notifier, WorldProbe};
use crate::index::SpatialIndex;
use crate::lod;
use crate::math::frustum;

/// A tracked point of interest.
///
/// Value object: never mutated in place, replaced wholesale on rescan.
#[derive(Clone, Copy, Debug)]
pub struct Beacon {
    pub key: BlockKey,
    pub center: DVec3,
}

/// Everything an external renderer needs to draw one beacon, with no
/// further distance or visibility computation.
#[derive(Clone, Copy, Debug)]
pub struct RenderInstruction {
    pub key: BlockKey,
    pub center: DVec3,
    pub radius: f64,
    pub color: Color,
    pub segments: u32,
    /// Observer is inside the beacon's activation sphere.
    pub in_range: bool,
}

/// Scheduling stamp recorded at the end of each scan.
#[derive(Clone, Copy, Debug)]
struct ScanStamp {
    time_ms: u64,
    position: DVec3,
}

#[derive(Default)]
struct TrackerState {
    enabled: bool,
    beacons: HashMap<BlockKey, Beacon>,
    last_scan: Option<ScanStamp>,
}

/// Platform-agnostic beacon tracker.
///
/// Time flows in as `now_ms` from the host rather than being sampled
/// internally, which keeps the scan scheduler deterministic under test.
pub struct TrackingEngine<P, N> {
    probe: P,
    notifier: N,
    config: RwLock<Config>,
    state: RwLock<TrackerState>,
    index: SpatialIndex,
}

impl<P: WorldProbe, N: Notifier> TrackingEngine<P, N> {
    /// Create a disabled engine with no tracked beacons.
    pub fn new(probe: P, notifier: N, config: Config) -> Self {
        Self {
            probe,
            notifier,
            config: RwLock::new(config),
            state: RwLock::new(TrackerState::default()),
            index: SpatialIndex::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.state.read().unwrap().enabled
    }

    /// Snapshot of the current configuration.
    pub fn config(&self) -> Config {
        self.config.read().unwrap().clone()
    }

    /// Replace the configuration, applied from the next operation on.
    ///
    /// Rejected wholesale if it fails validation.
    pub fn set_config(&self, config: Config) -> Result<()> {
        config.validate()?;
        *self.config.write().unwrap() = config;
        Ok(())
    }

    /// Number of beacons in the canonical set.
    pub fn beacon_count(&self) -> usize {
        self.state.read().unwrap().beacons.len()
    }

    /// Owned snapshot of the canonical beacon set.
    pub fn beacons(&self) -> Vec<Beacon> {
        self.state.read().unwrap().beacons.values().copied().collect()
    }

    /// Flip between disabled and enabled; returns the new state.
    ///
    /// Enabling runs an immediate full scan. Disabling clears the
    /// canonical map and the spatial index (stale index entries would leak
    /// across a long session otherwise). The whole transition happens
    /// under the write lock, so no other tracking operation interleaves.
    pub fn toggle(&self, observer_pos: DVec3, now_ms: u64) -> bool {
        let config = self.config();
        let mut state = self.state.write().unwrap();
        state.enabled = !state.enabled;
        if state.enabled {
            self.scan_locked(&mut state, &config, observer_pos, now_ms);
            self.notifier.notify("Beacon tracking enabled", true);
        } else {
            state.beacons.clear();
            state.last_scan = None;
            self.index.clear();
            self.notifier.notify("Beacon tracking disabled", true);
        }
        state.enabled
    }

    /// Periodic driver, called from the host's tick loop.
    ///
    /// No-op while disabled. Rescans when the scan interval has elapsed,
    /// when the observer has moved at least the movement threshold since
    /// the last scan, or when no scan has run yet. Every tick also sweeps
    /// out beacons the world no longer confirms; doing that here instead
    /// of per frame keeps the render path free of probe calls.
    pub fn tick(&self, observer_pos: DVec3, now_ms: u64) {
        let config = self.config();
        let mut state = self.state.write().unwrap();
        if !state.enabled {
            return;
        }

        let needs_scan = match state.last_scan {
            None => true,
            Some(stamp) => {
                now_ms.saturating_sub(stamp.time_ms) > config.scan_interval_ms()
                    || observer_pos.distance(stamp.position) >= config.movement_threshold()
            }
        };
        if needs_scan {
            self.scan_locked(&mut state, &config, observer_pos, now_ms);
        }

        self.sweep_locked(&mut state, &config);
    }

    /// Immediate out-of-band rescan, e.g. after a beacon block was placed
    /// or broken nearby. No-op while disabled.
    pub fn rescan(&self, observer_pos: DVec3, now_ms: u64) {
        let config = self.config();
        let mut state = self.state.write().unwrap();
        if !state.enabled {
            return;
        }
        self.scan_locked(&mut state, &config, observer_pos, now_ms);
    }

    /// Full clear-and-repopulate sweep of the scan cube around the
    /// observer.
    pub fn scan(&self, observer_pos: DVec3, now_ms: u64) {
        let config = self.config();
        let mut state = self.state.write().unwrap();
        self.scan_locked(&mut state, &config, observer_pos, now_ms);
    }

    fn scan_locked(
        &self,
        state: &mut TrackerState,
        config: &Config,
        observer_pos: DVec3,
        now_ms: u64,
    ) {
        state.beacons.clear();
        self.index.clear();

        let radius = config.scan_radius() as i32;
        let base = BlockKey::containing(observer_pos);

        for dx in -radius..=radius {
            for dy in -radius..=radius {
                for dz in -radius..=radius {
                    let key = base.offset(dx, dy, dz);
                    match self.probe.is_beacon(key) {
                        Ok(true) => {
                            let center = self.probe.center_of(key);
                            if config.enable_spatial_index() {
                                if let Err(err) = self.index.insert(key, center) {
                                    warn!("skipping unindexable beacon at {key:?}: {err}");
                                    continue;
                                }
                            }
                            state.beacons.insert(key, Beacon { key, center });
                        }
                        Ok(false) => {}
                        // One failed probe never aborts the rest of the scan.
                        Err(err) => warn!("probe failed at {key:?}: {err}"),
                    }
                }
            }
        }

        // Stamped even after partial failures; the next interval is the
        // natural retry.
        state.last_scan = Some(ScanStamp {
            time_ms: now_ms,
            position: observer_pos,
        });
        debug!(
            "scan complete: {} beacons within {} of {observer_pos:?}",
            state.beacons.len(),
            radius
        );
    }

    /// Drop beacons the world no longer confirms, from both structures.
    fn sweep_locked(&self, state: &mut TrackerState, config: &Config) {
        let mut stale = Vec::new();
        for (&key, beacon) in &state.beacons {
            match self.probe.is_beacon(key) {
                Ok(true) => {}
                Ok(false) => stale.push((key, beacon.center)),
                Err(err) => {
                    // Unconfirmed is unconfirmed; the next scan re-adds it
                    // if the probe recovers.
                    warn!("probe failed while validating {key:?}: {err}");
                    stale.push((key, beacon.center));
                }
            }
        }
        for (key, center) in stale {
            state.beacons.remove(&key);
            if config.enable_spatial_index() {
                self.index.remove(key, center);
            }
        }
    }

    /// Build the per-frame render plan.
    ///
    /// Empty while disabled or with no tracked beacons. Candidates are
    /// snapshotted under the read lock and iterated as an owned list, so a
    /// concurrent scan or sweep cannot mutate the set mid-plan.
    pub fn render_plan(
        &self,
        observer_pos: DVec3,
        observer_facing: DVec3,
    ) -> Vec<RenderInstruction> {
        let config = self.config();
        let sphere_radius = config.sphere_radius() as f64;
        let reach = (config.scan_radius() + config.sphere_radius()) as f64;

        let candidates: Vec<Beacon> = {
            let state = self.state.read().unwrap();
            if !state.enabled || state.beacons.is_empty() {
                return Vec::new();
            }
            if config.enable_spatial_index() {
                match self.index.query_nearby(observer_pos, reach) {
                    // Index hits resolve back against the canonical map;
                    // entries lost to a concurrent sweep are skipped.
                    Ok(entries) => entries
                        .iter()
                        .filter_map(|entry| state.beacons.get(&entry.key).copied())
                        .collect(),
                    Err(err) => {
                        warn!("nearby query failed, falling back to full set: {err}");
                        state.beacons.values().copied().collect()
                    }
                }
            } else {
                state.beacons.values().copied().collect()
            }
        };

        let mut plan = Vec::with_capacity(candidates.len());
        let mut nearest: Option<f64> = None;

        for beacon in candidates {
            let distance = observer_pos.distance(beacon.center);
            if distance >= reach {
                continue;
            }

            if config.enable_frustum_culling()
                && !frustum::sphere_visible(
                    beacon.center,
                    sphere_radius,
                    observer_pos,
                    observer_facing,
                    config.fov_degrees(),
                )
            {
                continue;
            }

            let in_range = distance <= sphere_radius;
            let color = if in_range {
                config.inside_color()
            } else {
                config.outside_color()
            };
            let segments = if config.enable_lod() {
                lod::segments_for_distance(
                    distance,
                    config.lod_max_segments(),
                    config.lod_min_segments(),
                    config.lod_distance(),
                )
            } else {
                config.sphere_segments()
            };

            plan.push(RenderInstruction {
                key: beacon.key,
                center: beacon.center,
                radius: sphere_radius,
                color,
                segments,
                in_range,
            });

            // Only the nearest in-range beacon gets a distance readout.
            if in_range && nearest.map_or(true, |d| distance < d) {
                nearest = Some(distance);
            }
        }

        if config.show_distance() {
            if let Some(distance) = nearest {
                self.notifier.notify(&format!("Beacon: {distance:.1} blocks"), true);
            }
        }

        plan
    }

    /// Whether `position` falls inside the scan radius around the
    /// observer. Pure query, always false while disabled; hosts use it to
    /// decide if a just-placed or just-broken beacon warrants a rescan.
    pub fn within_scan_radius(&self, position: DVec3, observer_pos: DVec3) -> bool {
        if !self.is_enabled() {
            return false;
        }
        let scan_radius = self.config.read().unwrap().scan_radius() as f64;
        position.distance(observer_pos) <= scan_radius
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::Error;
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};

    struct MockWorld {
        beacons: Mutex<HashSet<BlockKey>>,
        failing: Mutex<HashSet<BlockKey>>,
    }

    impl MockWorld {
        fn new(keys: &[(i32, i32, i32)]) -> Arc<Self> {
            Arc::new(Self {
                beacons: Mutex::new(
                    keys.iter().map(|&(x, y, z)| BlockKey::new(x, y, z)).collect(),
                ),
                failing: Mutex::new(HashSet::new()),
            })
        }

        fn set(&self, key: BlockKey, present: bool) {
            let mut beacons = self.beacons.lock().unwrap();
            if present {
                beacons.insert(key);
            } else {
                beacons.remove(&key);
            }
        }

        fn fail_at(&self, key: BlockKey) {
            self.failing.lock().unwrap().insert(key);
        }
    }

    impl WorldProbe for MockWorld {
        fn is_beacon(&self, key: BlockKey) -> crate::core::types::Result<bool> {
            if self.failing.lock().unwrap().contains(&key) {
                return Err(Error::Probe("mock probe failure".into()));
            }
            Ok(self.beacons.lock().unwrap().contains(&key))
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        messages: Mutex<Vec<String>>,
    }

    impl RecordingNotifier {
        fn messages(&self) -> Vec<String> {
            self.messages.lock().unwrap().clone()
        }
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, text: &str, _transient: bool) {
            self.messages.lock().unwrap().push(text.to_string());
        }
    }

    type TestEngine = TrackingEngine<Arc<MockWorld>, Arc<RecordingNotifier>>;

    fn engine_with(world: &Arc<MockWorld>, config: Config) -> (TestEngine, Arc<RecordingNotifier>) {
        let notifier = Arc::new(RecordingNotifier::default());
        (
            TrackingEngine::new(world.clone(), notifier.clone(), config),
            notifier,
        )
    }

    /// Small scan volume to keep cube sweeps cheap in tests.
    fn small_config() -> Config {
        let mut config = Config::default();
        config.set_scan_radius(16);
        config
    }

    #[test]
    fn test_scan_tracks_only_cube_hits() {
        // Default scan radius 64: (5,64,5) is inside the cube around the
        // origin, (100,64,100) is not.
        let world = MockWorld::new(&[(5, 64, 5), (100, 64, 100)]);
        let (engine, _) = engine_with(&world, Config::default());

        engine.scan(DVec3::ZERO, 0);

        assert_eq!(engine.beacon_count(), 1);
        assert_eq!(engine.beacons()[0].key, BlockKey::new(5, 64, 5));
    }

    #[test]
    fn test_toggle_twice_clears_everything() {
        let world = MockWorld::new(&[(2, 2, 2)]);
        let (engine, notifier) = engine_with(&world, small_config());

        assert!(engine.toggle(DVec3::ZERO, 0));
        assert!(engine.is_enabled());
        assert_eq!(engine.beacon_count(), 1);
        assert_eq!(engine.index.len(), 1);

        assert!(!engine.toggle(DVec3::ZERO, 10));
        assert!(!engine.is_enabled());
        assert_eq!(engine.beacon_count(), 0);
        assert_eq!(engine.index.len(), 0);

        let messages = notifier.messages();
        assert!(messages[0].contains("enabled"));
        assert!(messages[1].contains("disabled"));
    }

    #[test]
    fn test_tick_noop_while_disabled() {
        let world = MockWorld::new(&[(2, 2, 2)]);
        let (engine, _) = engine_with(&world, small_config());

        engine.tick(DVec3::ZERO, 0);
        assert_eq!(engine.beacon_count(), 0);
    }

    #[test]
    fn test_tick_scan_scheduling() {
        let world = MockWorld::new(&[]);
        let (engine, _) = engine_with(&world, small_config());
        engine.toggle(DVec3::ZERO, 0);

        // A beacon appears after the initial scan.
        world.set(BlockKey::new(3, 0, 3), true);

        // Within the interval and without movement: no rescan.
        engine.tick(DVec3::ZERO, 1000);
        assert_eq!(engine.beacon_count(), 0);

        // Interval elapsed: rescan picks it up.
        engine.tick(DVec3::ZERO, 5001);
        assert_eq!(engine.beacon_count(), 1);

        // Another appears; movement past the threshold forces a rescan
        // even though the interval has not elapsed again.
        world.set(BlockKey::new(4, 0, 4), true);
        engine.tick(DVec3::new(16.0, 0.0, 0.0), 5002);
        assert_eq!(engine.beacon_count(), 2);
    }

    #[test]
    fn test_tick_sweeps_unconfirmed_beacons() {
        let world = MockWorld::new(&[(2, 2, 2)]);
        let (engine, _) = engine_with(&world, small_config());
        engine.toggle(DVec3::ZERO, 0);
        assert_eq!(engine.beacon_count(), 1);

        world.set(BlockKey::new(2, 2, 2), false);

        // No rescan is due, but the sweep still drops the stale beacon
        // from both structures.
        engine.tick(DVec3::ZERO, 100);
        assert_eq!(engine.beacon_count(), 0);
        assert_eq!(engine.index.len(), 0);
    }

    #[test]
    fn test_probe_failure_skips_only_that_offset() {
        let world = MockWorld::new(&[(2, 0, 2), (3, 0, 3)]);
        world.fail_at(BlockKey::new(2, 0, 2));
        let (engine, _) = engine_with(&world, small_config());

        engine.scan(DVec3::ZERO, 0);

        assert_eq!(engine.beacon_count(), 1);
        assert_eq!(engine.beacons()[0].key, BlockKey::new(3, 0, 3));
    }

    #[test]
    fn test_render_plan_empty_while_disabled() {
        let world = MockWorld::new(&[(2, 2, 2)]);
        let (engine, _) = engine_with(&world, small_config());
        assert!(engine.render_plan(DVec3::ZERO, DVec3::Z).is_empty());
    }

    #[test]
    fn test_render_plan_range_classification() {
        // Sphere radius 20: a beacon at distance ~10 is in range, one at
        // ~30 is out of range but still rendered.
        let world = MockWorld::new(&[(10, 0, 0), (30, 0, 0)]);
        let mut config = Config::default();
        config.set_scan_radius(32);
        config.set_sphere_radius(20);
        config.set_show_distance(true);
        let (engine, notifier) = engine_with(&world, config.clone());
        engine.toggle(DVec3::new(0.5, 0.5, 0.5), 0);

        let observer = DVec3::new(0.5, 0.5, 0.5);
        let plan = engine.render_plan(observer, DVec3::X);
        assert_eq!(plan.len(), 2);

        let in_range: Vec<_> = plan.iter().filter(|i| i.in_range).collect();
        assert_eq!(in_range.len(), 1);
        assert_eq!(in_range[0].key, BlockKey::new(10, 0, 0));
        assert_eq!(in_range[0].color, config.inside_color());

        let out_of_range: Vec<_> = plan.iter().filter(|i| !i.in_range).collect();
        assert_eq!(out_of_range[0].color, config.outside_color());

        // The distance readout reports only the nearest in-range beacon.
        let distance_messages: Vec<_> = notifier
            .messages()
            .into_iter()
            .filter(|m| m.contains("blocks"))
            .collect();
        assert_eq!(distance_messages.len(), 1);
        assert!(distance_messages[0].contains("10.0"));
    }

    #[test]
    fn test_render_plan_frustum_culls_behind() {
        let world = MockWorld::new(&[(0, 0, -15)]);
        let mut config = small_config();
        config.set_sphere_radius(4);
        let (engine, _) = engine_with(&world, config);
        engine.toggle(DVec3::new(0.5, 0.5, 0.5), 0);

        let observer = DVec3::new(0.5, 0.5, 0.5);
        // Facing away from the beacon: culled.
        assert!(engine.render_plan(observer, DVec3::Z).is_empty());
        // Facing towards it: rendered.
        assert_eq!(engine.render_plan(observer, -DVec3::Z).len(), 1);
    }

    #[test]
    fn test_render_plan_without_spatial_index() {
        let world = MockWorld::new(&[(2, 2, 2)]);
        let mut config = small_config();
        config.set_enable_spatial_index(false);
        let (engine, _) = engine_with(&world, config);
        engine.toggle(DVec3::ZERO, 0);

        assert_eq!(engine.index.len(), 0);
        assert_eq!(engine.render_plan(DVec3::ZERO, DVec3::ONE).len(), 1);
    }

    #[test]
    fn test_render_plan_fixed_segments_when_lod_disabled() {
        let world = MockWorld::new(&[(2, 2, 2)]);
        let mut config = small_config();
        config.set_enable_lod(false);
        config.set_sphere_segments(12);
        let (engine, _) = engine_with(&world, config);
        engine.toggle(DVec3::ZERO, 0);

        let plan = engine.render_plan(DVec3::ZERO, DVec3::ONE);
        assert_eq!(plan[0].segments, 12);
    }

    #[test]
    fn test_within_scan_radius() {
        let world = MockWorld::new(&[]);
        let (engine, _) = engine_with(&world, small_config());

        // Always false while disabled.
        assert!(!engine.within_scan_radius(DVec3::new(1.0, 0.0, 0.0), DVec3::ZERO));

        engine.toggle(DVec3::ZERO, 0);
        assert!(engine.within_scan_radius(DVec3::new(16.0, 0.0, 0.0), DVec3::ZERO));
        assert!(!engine.within_scan_radius(DVec3::new(17.0, 0.0, 0.0), DVec3::ZERO));
    }

    #[test]
    fn test_rescan_noop_while_disabled() {
        let world = MockWorld::new(&[(2, 2, 2)]);
        let (engine, _) = engine_with(&world, small_config());

        engine.rescan(DVec3::ZERO, 0);
        assert_eq!(engine.beacon_count(), 0);

        engine.toggle(DVec3::ZERO, 0);
        world.set(BlockKey::new(3, 0, 3), true);
        engine.rescan(DVec3::ZERO, 1);
        assert_eq!(engine.beacon_count(), 2);
    }

    #[test]
    fn test_set_config_rejects_invalid() {
        let world = MockWorld::new(&[]);
        let (engine, _) = engine_with(&world, small_config());

        // Raw serde bypasses the clamping setters, producing a config
        // that violates the sphere <= scan invariant.
        let bad: Config =
            serde_json::from_str(r#"{"sphere_radius": 50, "scan_radius": 16}"#).unwrap();
        assert!(engine.set_config(bad).is_err());
        assert_eq!(engine.config().scan_radius(), 16);
    }
}
