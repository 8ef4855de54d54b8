//! Head-coupled perspective ("virtual window") tracking library.
//!
//! The scene camera follows either the viewer's face, tracked through a
//! front-facing camera, or the tilt of the device, tracked through the
//! accelerometer. The result is the illusion of looking through the display
//! into a 3D room.
//!
//! The pipeline consists of:
//! 1. Face detection: a cascade classifier finds the primary face in each frame
//! 2. Head pose estimation: the face rectangle becomes a smoothed 3D offset
//! 3. Orientation estimation: accelerometer samples become incremental deltas
//! 4. Arbitration: exactly one source drives the camera at a time
//! 5. Rendering: the published viewpoint is applied to a [`scene::Scene`]
//!
//! # Examples
//!
//! ## Orientation tracking
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use virtual_window::config::Config;
//! use virtual_window::face_detection::MissingClassifier;
//! use virtual_window::scene::BoxScene;
//! use virtual_window::sensor::SensorEvent;
//! use virtual_window::session::TrackingSession;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut session = TrackingSession::start(
//!     Config::default(),
//!     Arc::new(MissingClassifier),
//!     Box::new(BoxScene::cube_room()),
//! )?;
//!
//! let sensors = session.sensor_sender();
//! sensors.send(SensorEvent::accelerometer([10.0, 5.0, 0.0], Duration::ZERO))?;
//! sensors.send(SensorEvent::accelerometer([10.0, 8.0, 2.0], Duration::from_millis(16)))?;
//!
//! let view = session.viewpoint();
//! println!("Camera at {:?}", view.transform.position);
//! session.shutdown();
//! # Ok(())
//! # }
//! ```
//!
//! ## Using the estimators directly
//!
//! ```
//! use virtual_window::config::HeadPoseConfig;
//! use virtual_window::face_detection::FaceRegion;
//! use virtual_window::head_pose::HeadPoseEstimator;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut estimator = HeadPoseEstimator::new(&HeadPoseConfig::default())?;
//! let face = FaceRegion::new(280, 200, 80, 80, 640, 480)?;
//! let offset = estimator.update(Some(face)).expect("face was detected");
//! assert!(offset.x().abs() < 0.1);
//! # Ok(())
//! # }
//! ```

pub mod arbiter;
pub mod camera_pose;
#[cfg(feature = "opencv")]
pub mod camera_source;
#[cfg(feature = "opencv")]
pub mod cascade;
pub mod config;
pub mod constants;
pub mod error;
pub mod face_detection;
pub mod filters;
pub mod head_pose;
pub mod orientation;
pub mod render;
pub mod scene;
pub mod sensor;
pub mod session;
pub mod tracker;
pub mod utils;

pub use error::{Error, Result};
