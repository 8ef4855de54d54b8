//! Configuration management for the virtual window tracker

use crate::arbiter::TrackingMode;
use crate::constants::{
    DEFAULT_CAMERA_POSITION, DEFAULT_DECAY, DEFAULT_DETECTION_BUDGET_MS, DEFAULT_FRAME_HEIGHT, DEFAULT_FRAME_WIDTH,
    DEFAULT_HANDOVER_RATE, DEFAULT_HOLD_FRAMES, DEFAULT_LOOK_AT, DEFAULT_MAX_OFFSET, DEFAULT_MIN_FACE_SIZE,
    DEFAULT_MIN_NEIGHBORS, DEFAULT_REFERENCE_FACE_SIZE, DEFAULT_SCALE_FACTOR, DEFAULT_TARGET_FPS, DEFAULT_ZERO_EPSILON,
};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Camera frame source configuration
    pub camera: CameraConfig,

    /// Face detection parameters
    pub detection: DetectionConfig,

    /// Head offset estimation
    pub head_pose: HeadPoseConfig,

    /// Accelerometer to scene mapping
    pub orientation: OrientationConfig,

    /// Scene camera defaults and limits
    pub viewpoint: ViewpointConfig,

    /// Render loop settings
    pub render: RenderConfig,

    /// Arbitration settings
    pub tracking: TrackingConfig,
}

/// Camera frame source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Camera device index (used by the OpenCV capture)
    pub index: i32,

    /// Requested frame width
    pub width: u32,

    /// Requested frame height
    pub height: u32,

    /// Frames waiting for detection; further frames are dropped
    pub frame_queue: usize,

    /// Frames older than this when dequeued are dropped
    pub detection_budget_ms: u64,
}

/// Face detection parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Path to the cascade classifier XML
    pub cascade_path: Option<PathBuf>,

    /// Minimum face height as a fraction of frame height (0.0-1.0]
    pub min_face_size: f32,

    /// Cascade pyramid scale step (> 1.0)
    pub scale_factor: f64,

    /// Neighbouring hits required per candidate
    pub min_neighbors: i32,

    /// Draw the detected face onto the preview frame
    pub annotate_preview: bool,
}

/// Head offset estimation parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeadPoseConfig {
    /// Smoothing filter spec, e.g. `exponential:0.6`
    pub smoothing: String,

    /// Face height fraction at which the depth offset is zero
    pub reference_face_size: f64,

    /// Maximum offset magnitude
    pub max_offset: f64,

    /// Misses during which the last offset is held
    pub hold_frames: u32,

    /// Per-miss decay factor after the hold (0.0-1.0)
    pub decay: f64,

    /// Decaying offsets below this magnitude become zero
    pub zero_epsilon: f64,

    /// Mirror the horizontal axis
    pub invert_x: bool,

    /// Mirror the vertical axis
    pub invert_y: bool,
}

/// Scene axis an orientation component is projected on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SceneAxis {
    X,
    Y,
    Z,
}

impl SceneAxis {
    pub const fn index(self) -> usize {
        match self {
            Self::X => 0,
            Self::Y => 1,
            Self::Z => 2,
        }
    }
}

/// Accelerometer to scene mapping
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrientationConfig {
    /// Scene axis driven by pitch changes
    pub pitch_axis: SceneAxis,

    /// Scene axis driven by roll changes
    pub roll_axis: SceneAxis,

    /// Sign applied when accumulating deltas (-1 moves against the rotation)
    pub sign: f64,

    /// Scene units per sensor unit
    pub gain: f64,
}

/// Scene camera defaults and limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewpointConfig {
    /// Position restored by recenter
    pub default_position: [f64; 3],

    /// Look-at target restored by recenter
    pub default_look_at: [f64; 3],

    /// Lower corner of the allowed camera volume
    pub bounds_min: [f64; 3],

    /// Upper corner of the allowed camera volume
    pub bounds_max: [f64; 3],

    /// Scene units per unit of head offset, per axis
    pub head_range: [f64; 3],

    /// Fraction of the remaining distance covered per head update (0.0-1.0]
    pub damping: f64,

    /// Fraction of the switch-time displacement released per head update
    /// after entering camera mode (0.0-1.0]
    pub handover_rate: f64,

    /// Vertical field of view used for picking
    pub fov_y_degrees: f64,

    /// Viewport width in pixels
    pub viewport_width: u32,

    /// Viewport height in pixels
    pub viewport_height: u32,
}

/// Render loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Target framerate
    pub target_fps: u32,

    /// Only redraw when the viewpoint changed
    pub demand_driven: bool,

    /// Scene layout (`cube_room` or `floating_planes`)
    pub scene: String,
}

/// Arbitration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Mode active at startup
    pub initial_mode: TrackingMode,

    /// Sensor events waiting for estimation; further events are dropped
    pub sensor_queue: usize,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            index: 0,
            width: DEFAULT_FRAME_WIDTH,
            height: DEFAULT_FRAME_HEIGHT,
            frame_queue: 1,
            detection_budget_ms: DEFAULT_DETECTION_BUDGET_MS,
        }
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            cascade_path: None,
            min_face_size: DEFAULT_MIN_FACE_SIZE,
            scale_factor: DEFAULT_SCALE_FACTOR,
            min_neighbors: DEFAULT_MIN_NEIGHBORS,
            annotate_preview: false,
        }
    }
}

impl Default for HeadPoseConfig {
    fn default() -> Self {
        Self {
            smoothing: "exponential:0.6".to_string(),
            reference_face_size: DEFAULT_REFERENCE_FACE_SIZE,
            max_offset: DEFAULT_MAX_OFFSET,
            hold_frames: DEFAULT_HOLD_FRAMES,
            decay: DEFAULT_DECAY,
            zero_epsilon: DEFAULT_ZERO_EPSILON,
            invert_x: false,
            invert_y: false,
        }
    }
}

impl Default for OrientationConfig {
    fn default() -> Self {
        Self {
            pitch_axis: SceneAxis::X,
            roll_axis: SceneAxis::Y,
            sign: -1.0,
            gain: 1.0,
        }
    }
}

impl Default for ViewpointConfig {
    fn default() -> Self {
        Self {
            default_position: DEFAULT_CAMERA_POSITION,
            default_look_at: DEFAULT_LOOK_AT,
            bounds_min: [-8.0, -8.0, 4.0],
            bounds_max: [8.0, 8.0, 16.0],
            head_range: [4.0, 3.0, 4.0],
            damping: 0.5,
            handover_rate: DEFAULT_HANDOVER_RATE,
            fov_y_degrees: 45.0,
            viewport_width: 1280,
            viewport_height: 720,
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            target_fps: DEFAULT_TARGET_FPS,
            demand_driven: true,
            scene: "cube_room".to_string(),
        }
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            initial_mode: TrackingMode::Orientation,
            sensor_queue: 64,
        }
    }
}

impl HeadPoseConfig {
    /// Validate head pose parameters
    pub fn validate(&self) -> Result<()> {
        crate::filters::create_filter(&self.smoothing)
            .map_err(|e| Error::ConfigError(format!("Invalid smoothing filter: {e}")))?;
        if !(self.reference_face_size > 0.0 && self.reference_face_size <= 1.0) {
            return Err(Error::ConfigError(
                "Reference face size must be in (0.0, 1.0]".to_string(),
            ));
        }
        if !(self.max_offset.is_finite() && self.max_offset > 0.0) {
            return Err(Error::ConfigError("Max offset must be positive".to_string()));
        }
        if !(self.decay > 0.0 && self.decay < 1.0) {
            return Err(Error::ConfigError("Decay must be between 0.0 and 1.0 (exclusive)".to_string()));
        }
        if !(self.zero_epsilon > 0.0) {
            return Err(Error::ConfigError("Zero epsilon must be positive".to_string()));
        }
        Ok(())
    }
}

impl ViewpointConfig {
    /// Validate viewpoint parameters
    pub fn validate(&self) -> Result<()> {
        let vectors = [
            ("default_position", &self.default_position),
            ("default_look_at", &self.default_look_at),
            ("bounds_min", &self.bounds_min),
            ("bounds_max", &self.bounds_max),
            ("head_range", &self.head_range),
        ];
        for (name, v) in vectors {
            if !v.iter().all(|c| c.is_finite()) {
                return Err(Error::ConfigError(format!("{name} must be finite")));
            }
        }
        for axis in 0..3 {
            if self.bounds_min[axis] > self.bounds_max[axis] {
                return Err(Error::ConfigError(format!("Bounds min exceeds max on axis {axis}")));
            }
            let p = self.default_position[axis];
            if p < self.bounds_min[axis] || p > self.bounds_max[axis] {
                return Err(Error::ConfigError("Default position lies outside the bounds".to_string()));
            }
        }
        if !(self.damping > 0.0 && self.damping <= 1.0) {
            return Err(Error::ConfigError("Damping must be in (0.0, 1.0]".to_string()));
        }
        if !(self.handover_rate > 0.0 && self.handover_rate <= 1.0) {
            return Err(Error::ConfigError("Handover rate must be in (0.0, 1.0]".to_string()));
        }
        if !(self.fov_y_degrees > 0.0 && self.fov_y_degrees < 180.0) {
            return Err(Error::ConfigError("Field of view must be between 0 and 180 degrees".to_string()));
        }
        if self.viewport_width == 0 || self.viewport_height == 0 {
            return Err(Error::ConfigError("Viewport must not be empty".to_string()));
        }
        Ok(())
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::IoError(e.to_string()))?;

        serde_yaml::from_str(&content).map_err(|e| Error::ConfigError(format!("Failed to parse config: {}", e)))
    }

    /// Save configuration to a YAML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(self)
            .map_err(|e| Error::ConfigError(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content).map_err(|e| Error::IoError(e.to_string()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        // Camera
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(Error::ConfigError("Camera resolution must not be empty".to_string()));
        }
        if self.camera.frame_queue == 0 {
            return Err(Error::ConfigError("Frame queue must hold at least one frame".to_string()));
        }
        if self.camera.detection_budget_ms == 0 {
            return Err(Error::ConfigError("Detection budget must be greater than 0".to_string()));
        }

        // Detection
        if !(self.detection.min_face_size > 0.0 && self.detection.min_face_size <= 1.0) {
            return Err(Error::ConfigError(
                "Minimum face size must be in (0.0, 1.0]".to_string(),
            ));
        }
        if self.detection.scale_factor <= 1.0 {
            return Err(Error::ConfigError("Scale factor must be greater than 1.0".to_string()));
        }
        if self.detection.min_neighbors < 0 {
            return Err(Error::ConfigError("Min neighbors must not be negative".to_string()));
        }

        self.head_pose.validate()?;

        // Orientation
        if self.orientation.pitch_axis == self.orientation.roll_axis {
            return Err(Error::ConfigError("Pitch and roll must drive different axes".to_string()));
        }
        if !self.orientation.gain.is_finite() || !self.orientation.sign.is_finite() {
            return Err(Error::ConfigError("Orientation gain and sign must be finite".to_string()));
        }

        self.viewpoint.validate()?;

        // Render
        if self.render.target_fps == 0 {
            return Err(Error::ConfigError("Target FPS must be greater than 0".to_string()));
        }
        if crate::scene::by_name(&self.render.scene).is_none() {
            return Err(Error::ConfigError(format!("Unknown scene: {}", self.render.scene)));
        }

        if self.tracking.sensor_queue == 0 {
            return Err(Error::ConfigError("Sensor queue must hold at least one event".to_string()));
        }

        Ok(())
    }
}

/// Example configuration file content
pub const EXAMPLE_CONFIG: &str = r#"# Virtual Window Configuration

# Camera frame source
camera:
  index: 0
  width: 640
  height: 480
  frame_queue: 1
  detection_budget_ms: 100

# Face detection parameters
detection:
  cascade_path: "assets/lbpcascade_frontalface.xml"
  min_face_size: 0.2
  scale_factor: 1.1
  min_neighbors: 2
  annotate_preview: false

# Head offset estimation
head_pose:
  smoothing: "exponential:0.6"
  reference_face_size: 0.25
  max_offset: 1.5
  hold_frames: 5
  decay: 0.7
  zero_epsilon: 0.001
  invert_x: false
  invert_y: false

# Accelerometer mapping
orientation:
  pitch_axis: x
  roll_axis: y
  sign: -1.0
  gain: 1.0

# Scene camera
viewpoint:
  default_position: [0.0, 0.0, 10.0]
  default_look_at: [0.0, 1.0, 0.0]
  bounds_min: [-8.0, -8.0, 4.0]
  bounds_max: [8.0, 8.0, 16.0]
  head_range: [4.0, 3.0, 4.0]
  damping: 0.5
  handover_rate: 0.05
  fov_y_degrees: 45.0
  viewport_width: 1280
  viewport_height: 720

# Render loop
render:
  target_fps: 60
  demand_driven: true
  scene: "cube_room"

# Arbitration
tracking:
  initial_mode: orientation
  sensor_queue: 64
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn test_example_config_parses() {
        let config: Config = serde_yaml::from_str(EXAMPLE_CONFIG).unwrap();
        config.validate().unwrap();
        assert_eq!(config.tracking.initial_mode, TrackingMode::Orientation);
        assert_eq!(config.orientation.pitch_axis, SceneAxis::X);
        assert_eq!(config.viewpoint.default_position, [0.0, 0.0, 10.0]);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config = serde_yaml::from_str("head_pose:\n  hold_frames: 9\n").unwrap();
        assert_eq!(config.head_pose.hold_frames, 9);
        assert_eq!(config.head_pose.decay, DEFAULT_DECAY);
        assert_eq!(config.render.target_fps, DEFAULT_TARGET_FPS);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = Config::default();
        config.detection.min_face_size = 0.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.head_pose.decay = 1.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.orientation.roll_axis = SceneAxis::X;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.viewpoint.bounds_max = [1.0, 1.0, 1.0];
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.render.scene = "nowhere".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_annotate_default_matches_detector_settings() {
        let settings = crate::face_detection::DetectorSettings::default();
        assert_eq!(DetectionConfig::default().annotate_preview, settings.annotate_preview());
        assert!(!settings.annotate_preview());
    }
}
