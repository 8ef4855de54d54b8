//! Constants used throughout the tracking pipeline

/// Minimum face size presets offered to the user, as fractions of frame height
pub const MIN_FACE_SIZE_PRESETS: [f32; 4] = [0.2, 0.3, 0.4, 0.5];

/// Default minimum face size (fraction of frame height)
pub const DEFAULT_MIN_FACE_SIZE: f32 = 0.2;

/// Default cascade pyramid scale step
pub const DEFAULT_SCALE_FACTOR: f64 = 1.1;

/// Default number of neighbouring hits a cascade candidate needs
pub const DEFAULT_MIN_NEIGHBORS: i32 = 2;

/// Default exponential smoothing factor for head offsets
pub const DEFAULT_SMOOTHING_ALPHA: f64 = 0.6;

/// Consecutive misses during which the last head offset is held
pub const DEFAULT_HOLD_FRAMES: u32 = 5;

/// Per-miss decay factor applied once the hold is exhausted
pub const DEFAULT_DECAY: f64 = 0.7;

/// Offsets smaller than this snap to zero while decaying
pub const DEFAULT_ZERO_EPSILON: f64 = 1e-3;

/// Face height (fraction of frame height) at which the depth offset is zero
pub const DEFAULT_REFERENCE_FACE_SIZE: f64 = 0.25;

/// Maximum magnitude of a head offset
pub const DEFAULT_MAX_OFFSET: f64 = 1.5;

/// Default scene camera position
pub const DEFAULT_CAMERA_POSITION: [f64; 3] = [0.0, 0.0, 10.0];

/// Default scene camera look-at target
pub const DEFAULT_LOOK_AT: [f64; 3] = [0.0, 1.0, 0.0];

/// Share of the switch-time displacement released per head update
pub const DEFAULT_HANDOVER_RATE: f64 = 0.05;

/// Render loop target frame rate
pub const DEFAULT_TARGET_FPS: u32 = 60;

/// Default camera resolution
pub const DEFAULT_FRAME_WIDTH: u32 = 640;
pub const DEFAULT_FRAME_HEIGHT: u32 = 480;

/// Frames older than this when dequeued are dropped instead of detected
pub const DEFAULT_DETECTION_BUDGET_MS: u64 = 100;

/// Numeric precision epsilon
pub const EPSILON: f64 = 1e-10;
