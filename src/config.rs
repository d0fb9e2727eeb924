//! Tracking configuration with clamped ranges and safe defaults

use log::warn;
use serde::{Deserialize, Serialize};

use crate::core::error::Error;
use crate::core::types::Result;

/// RGBA color stored as 0-255 channels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Channels as 0.0-1.0 floats in RGBA order.
    pub fn to_f32(self) -> [f32; 4] {
        [
            self.r as f32 / 255.0,
            self.g as f32 / 255.0,
            self.b as f32 / 255.0,
            self.a as f32 / 255.0,
        ]
    }
}

/// Numeric knobs for scanning, culling and detail selection.
///
/// Every field has a documented valid range. Setters clamp at the point of
/// mutation; [`Config::validate`] additionally checks the cross-field
/// invariants (`sphere_radius <= scan_radius`,
/// `lod_min_segments <= lod_max_segments`), which matters for configs that
/// arrive whole from a loader instead of through the setters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Activation sphere radius in blocks (1-64, <= scan_radius).
    sphere_radius: u32,
    /// Half-extent of the cubic scan volume in blocks (16-256).
    scan_radius: u32,
    /// Minimum time between scheduled scans (>= 1000).
    scan_interval_ms: u64,
    /// Observer movement that forces a rescan, in blocks (1-64).
    movement_threshold: f64,
    /// Notify the observer of the nearest in-range beacon distance.
    show_distance: bool,
    /// Route render-plan candidate lookup through the spatial index.
    enable_spatial_index: bool,
    /// Skip beacons outside the observer's view cone.
    enable_frustum_culling: bool,
    /// Reduce segment count with distance.
    enable_lod: bool,
    /// Segment count at full detail (8-64).
    lod_max_segments: u32,
    /// Segment count when fully reduced (4-32, <= lod_max_segments).
    lod_min_segments: u32,
    /// Distance at which detail starts to fall off (16-128).
    lod_distance: f64,
    /// View cone angle for culling, degrees (30-160).
    fov_degrees: f64,
    /// Fixed segment count when LOD is disabled (8-64).
    sphere_segments: u32,
    /// Sphere color while the observer is inside it.
    inside_color: Color,
    /// Sphere color while the observer is outside it.
    outside_color: Color,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sphere_radius: 16,
            scan_radius: 64,
            scan_interval_ms: 5000,
            movement_threshold: 16.0,
            show_distance: false,
            enable_spatial_index: true,
            enable_frustum_culling: true,
            enable_lod: true,
            lod_max_segments: 32,
            lod_min_segments: 16,
            lod_distance: 32.0,
            fov_degrees: 90.0,
            sphere_segments: 24,
            inside_color: Color::new(255, 128, 0, 102),
            outside_color: Color::new(128, 255, 0, 51),
        }
    }
}

impl Config {
    pub fn sphere_radius(&self) -> u32 {
        self.sphere_radius
    }

    pub fn set_sphere_radius(&mut self, radius: u32) {
        self.sphere_radius = radius.clamp(1, 64).min(self.scan_radius);
    }

    pub fn scan_radius(&self) -> u32 {
        self.scan_radius
    }

    pub fn set_scan_radius(&mut self, radius: u32) {
        self.scan_radius = radius.clamp(16, 256);
        if self.sphere_radius > self.scan_radius {
            self.sphere_radius = self.scan_radius;
        }
    }

    pub fn scan_interval_ms(&self) -> u64 {
        self.scan_interval_ms
    }

    pub fn set_scan_interval_ms(&mut self, interval: u64) {
        self.scan_interval_ms = interval.max(1000);
    }

    pub fn movement_threshold(&self) -> f64 {
        self.movement_threshold
    }

    pub fn set_movement_threshold(&mut self, threshold: f64) {
        self.movement_threshold = threshold.clamp(1.0, 64.0);
    }

    pub fn show_distance(&self) -> bool {
        self.show_distance
    }

    pub fn set_show_distance(&mut self, show: bool) {
        self.show_distance = show;
    }

    pub fn enable_spatial_index(&self) -> bool {
        self.enable_spatial_index
    }

    pub fn set_enable_spatial_index(&mut self, enable: bool) {
        self.enable_spatial_index = enable;
    }

    pub fn enable_frustum_culling(&self) -> bool {
        self.enable_frustum_culling
    }

    pub fn set_enable_frustum_culling(&mut self, enable: bool) {
        self.enable_frustum_culling = enable;
    }

    pub fn enable_lod(&self) -> bool {
        self.enable_lod
    }

    pub fn set_enable_lod(&mut self, enable: bool) {
        self.enable_lod = enable;
    }

    pub fn lod_max_segments(&self) -> u32 {
        self.lod_max_segments
    }

    pub fn set_lod_max_segments(&mut self, segments: u32) {
        self.lod_max_segments = segments.clamp(8, 64);
        if self.lod_min_segments > self.lod_max_segments {
            self.lod_min_segments = self.lod_max_segments;
        }
    }

    pub fn lod_min_segments(&self) -> u32 {
        self.lod_min_segments
    }

    pub fn set_lod_min_segments(&mut self, segments: u32) {
        self.lod_min_segments = segments.clamp(4, 32).min(self.lod_max_segments);
    }

    pub fn lod_distance(&self) -> f64 {
        self.lod_distance
    }

    pub fn set_lod_distance(&mut self, distance: f64) {
        self.lod_distance = distance.clamp(16.0, 128.0);
    }

    pub fn fov_degrees(&self) -> f64 {
        self.fov_degrees
    }

    pub fn set_fov_degrees(&mut self, fov: f64) {
        self.fov_degrees = fov.clamp(30.0, 160.0);
    }

    pub fn sphere_segments(&self) -> u32 {
        self.sphere_segments
    }

    pub fn set_sphere_segments(&mut self, segments: u32) {
        self.sphere_segments = segments.clamp(8, 64);
    }

    pub fn inside_color(&self) -> Color {
        self.inside_color
    }

    pub fn set_inside_color(&mut self, color: Color) {
        self.inside_color = color;
    }

    pub fn outside_color(&self) -> Color {
        self.outside_color
    }

    pub fn set_outside_color(&mut self, color: Color) {
        self.outside_color = color;
    }

    /// Check field ranges and cross-field invariants.
    pub fn validate(&self) -> Result<()> {
        if !(1..=64).contains(&self.sphere_radius) {
            return Err(Error::ConfigInvalid(format!(
                "sphere_radius {} outside 1..=64",
                self.sphere_radius
            )));
        }
        if !(16..=256).contains(&self.scan_radius) {
            return Err(Error::ConfigInvalid(format!(
                "scan_radius {} outside 16..=256",
                self.scan_radius
            )));
        }
        if self.sphere_radius > self.scan_radius {
            return Err(Error::ConfigInvalid(format!(
                "sphere_radius {} exceeds scan_radius {}",
                self.sphere_radius, self.scan_radius
            )));
        }
        if self.scan_interval_ms < 1000 {
            return Err(Error::ConfigInvalid(format!(
                "scan_interval_ms {} below 1000",
                self.scan_interval_ms
            )));
        }
        if !(1.0..=64.0).contains(&self.movement_threshold) {
            return Err(Error::ConfigInvalid(format!(
                "movement_threshold {} outside 1..=64",
                self.movement_threshold
            )));
        }
        if !(8..=64).contains(&self.lod_max_segments) {
            return Err(Error::ConfigInvalid(format!(
                "lod_max_segments {} outside 8..=64",
                self.lod_max_segments
            )));
        }
        if !(4..=32).contains(&self.lod_min_segments) {
            return Err(Error::ConfigInvalid(format!(
                "lod_min_segments {} outside 4..=32",
                self.lod_min_segments
            )));
        }
        if self.lod_min_segments > self.lod_max_segments {
            return Err(Error::ConfigInvalid(format!(
                "lod_min_segments {} exceeds lod_max_segments {}",
                self.lod_min_segments, self.lod_max_segments
            )));
        }
        if !(16.0..=128.0).contains(&self.lod_distance) {
            return Err(Error::ConfigInvalid(format!(
                "lod_distance {} outside 16..=128",
                self.lod_distance
            )));
        }
        if !(30.0..=160.0).contains(&self.fov_degrees) {
            return Err(Error::ConfigInvalid(format!(
                "fov_degrees {} outside 30..=160",
                self.fov_degrees
            )));
        }
        if !(8..=64).contains(&self.sphere_segments) {
            return Err(Error::ConfigInvalid(format!(
                "sphere_segments {} outside 8..=64",
                self.sphere_segments
            )));
        }
        Ok(())
    }

    /// Parse a configuration from JSON, falling back to defaults.
    ///
    /// Missing fields take their default values. Unparseable input or a
    /// parsed config that fails [`Config::validate`] resets to
    /// [`Config::default`] with a warning; the engine never runs with an
    /// inconsistent config.
    pub fn from_json_str(json: &str) -> Self {
        let parsed: Config = match serde_json::from_str(json) {
            Ok(config) => config,
            Err(err) => {
                warn!("failed to parse config, using defaults: {err}");
                return Self::default();
            }
        };
        match parsed.validate() {
            Ok(()) => parsed,
            Err(err) => {
                warn!("loaded config is invalid, using defaults: {err}");
                Self::default()
            }
        }
    }
}
