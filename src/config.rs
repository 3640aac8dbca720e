//! Viewer configuration.
//!
//! Every tunable of the viewer lives here. Values come from (lowest to highest
//! priority) the built-in defaults, an optional JSON file, and the command line.
//!
//! ```json
//! {
//!   "mode": "interactive",
//!   "footprint_ratio": 0.6,
//!   "motion": { "drag_range": [2.0, 2.0], "idle_spin": 0.003 },
//!   "environment_map": "textures/studio.png"
//! }
//! ```

use crate::assets::material::{MaterialRule, ShadingProfile, UnmatchedMaterialPolicy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config JSON in {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("config value `{field}` is out of range: {value}")]
    OutOfRange { field: &'static str, value: f32 },
}

/// How the model is framed and whether it can be picked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresentationMode {
    /// Top-down silver display: idle spin only, no picking.
    Static,
    /// Angled display where the model can be dragged around.
    #[default]
    Interactive,
}

impl PresentationMode {
    pub fn allows_picking(self) -> bool {
        matches!(self, Self::Interactive)
    }

    pub fn default_unmatched_policy(self) -> UnmatchedMaterialPolicy {
        match self {
            Self::Static => UnmatchedMaterialPolicy::UniformAll(ShadingProfile::polished_silver()),
            Self::Interactive => UnmatchedMaterialPolicy::KeepAuthored,
        }
    }
}

impl std::fmt::Display for PresentationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Static => write!(f, "static"),
            Self::Interactive => write!(f, "interactive"),
        }
    }
}

impl std::str::FromStr for PresentationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "static" => Ok(Self::Static),
            "interactive" => Ok(Self::Interactive),
            other => Err(format!("unknown presentation mode '{other}'")),
        }
    }
}

/// Per-tick motion constants for drag-follow and idle animation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    /// World-space offset reached at the container edge, per axis.
    pub drag_range: [f32; 2],
    /// Tilt (radians) reached at the container edge.
    pub rotation_range: f32,
    /// Lerp factor applied every tick while following or returning.
    pub follow_factor: f32,
    /// Yaw added every idle tick.
    pub idle_spin: f32,
    /// Multiplier applied to pitch every idle tick.
    pub tilt_decay: f32,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            drag_range: [2.0, 2.0],
            rotation_range: 0.2,
            follow_factor: 0.1,
            idle_spin: 0.003,
            tilt_decay: 0.95,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrbitConfig {
    pub damping: f32,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    /// Closest zoom, as a fraction of the framing distance.
    pub min_distance_factor: f32,
    /// Furthest zoom, as a multiple of the framing distance.
    pub max_distance_factor: f32,
}

impl Default for OrbitConfig {
    fn default() -> Self {
        Self {
            damping: 0.25,
            rotate_speed: 1.0,
            zoom_speed: 1.0,
            min_distance_factor: 0.25,
            max_distance_factor: 4.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub fov_y_deg: f32,
    pub near: f32,
    pub far: f32,
    pub exposure: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_y_deg: 70.0,
            near: 0.1,
            far: 5000.0,
            exposure: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Showpiece".to_string(),
            width: 600,
            height: 400,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub source: Option<String>,
    pub mode: PresentationMode,
    /// Fraction of the smaller viewport side the model's largest dimension fills.
    pub footprint_ratio: f32,
    pub motion: MotionConfig,
    pub orbit: OrbitConfig,
    pub camera: CameraConfig,
    pub environment_map: Option<PathBuf>,
    /// Scene-wide multiplier on top of each material's own environment intensity.
    pub environment_intensity: f32,
    pub materials: Vec<MaterialRule>,
    /// `None` picks the mode's default.
    pub unmatched_materials: Option<UnmatchedMaterialPolicy>,
    pub window: WindowConfig,
    pub tick_rate_hz: f32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            source: None,
            mode: PresentationMode::default(),
            footprint_ratio: 0.6,
            motion: MotionConfig::default(),
            orbit: OrbitConfig::default(),
            camera: CameraConfig::default(),
            environment_map: None,
            environment_intensity: 1.0,
            materials: MaterialRule::default_table(),
            unmatched_materials: None,
            window: WindowConfig::default(),
            tick_rate_hz: 60.0,
        }
    }
}

impl ViewerConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config: Self = serde_json::from_str(&json).map_err(|source| ConfigError::Json {
            path: path.display().to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn unmatched_policy(&self) -> UnmatchedMaterialPolicy {
        self.unmatched_materials
            .clone()
            .unwrap_or_else(|| self.mode.default_unmatched_policy())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        unit_interval("footprint_ratio", self.footprint_ratio)?;
        unit_interval("motion.follow_factor", self.motion.follow_factor)?;
        unit_interval("motion.tilt_decay", self.motion.tilt_decay)?;
        unit_interval("orbit.damping", self.orbit.damping)?;
        positive("motion.drag_range[0]", self.motion.drag_range[0])?;
        positive("motion.drag_range[1]", self.motion.drag_range[1])?;
        positive("motion.rotation_range", self.motion.rotation_range)?;
        finite("motion.idle_spin", self.motion.idle_spin)?;
        positive("orbit.rotate_speed", self.orbit.rotate_speed)?;
        positive("orbit.zoom_speed", self.orbit.zoom_speed)?;
        positive("orbit.min_distance_factor", self.orbit.min_distance_factor)?;
        if self.orbit.max_distance_factor < self.orbit.min_distance_factor {
            return Err(ConfigError::OutOfRange {
                field: "orbit.max_distance_factor",
                value: self.orbit.max_distance_factor,
            });
        }
        if !(self.camera.fov_y_deg > 1.0 && self.camera.fov_y_deg < 179.0) {
            return Err(ConfigError::OutOfRange {
                field: "camera.fov_y_deg",
                value: self.camera.fov_y_deg,
            });
        }
        positive("camera.near", self.camera.near)?;
        if self.camera.far <= self.camera.near {
            return Err(ConfigError::OutOfRange {
                field: "camera.far",
                value: self.camera.far,
            });
        }
        positive("camera.exposure", self.camera.exposure)?;
        finite("environment_intensity", self.environment_intensity)?;
        positive("tick_rate_hz", self.tick_rate_hz)?;
        Ok(())
    }
}

fn finite(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange { field, value })
    }
}

fn positive(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange { field, value })
    }
}

/// (0, 1]
fn unit_interval(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange { field, value })
    }
}
