//! Error paths: invalid input, lifecycle misuse and degraded detection


use std::sync::Arc;
use test_helpers::{blank_frame, Script};
use virtual_window::arbiter::TrackingArbiter;
use virtual_window::config::{Config, HeadPoseConfig, ViewpointConfig};
use virtual_window::face_detection::{DetectorSettings, FaceDetector, FaceRegion, MissingClassifier};
use virtual_window::filters::create_filter;
use virtual_window::head_pose::HeadPoseEstimator;
use virtual_window::scene::BoxScene;
use virtual_window::session::TrackingSession;
use virtual_window::tracker::{FaceTracker, TrackerLifecycle};
use virtual_window::Error;

#[test]
fn test_invalid_filter_specs() {
    for spec in ["kalman", "exponential:0", "exponential:1.5", "exponential:abc", "moving_average:0", ""] {
        assert!(matches!(create_filter(spec), Err(Error::FilterError(_))), "{spec:?} accepted");
    }
}

#[test]
fn test_invalid_face_regions() {
    assert!(matches!(FaceRegion::new(0, 0, 0, 10, 640, 480), Err(Error::InvalidInput(_))));
    assert!(matches!(FaceRegion::new(600, 0, 80, 80, 640, 480), Err(Error::InvalidInput(_))));
    assert!(matches!(FaceRegion::new(u32::MAX, 0, 2, 2, 640, 480), Err(Error::InvalidInput(_))));
}

#[test]
fn test_min_face_size_range() {
    assert!(DetectorSettings::new(0.0).is_err());
    assert!(DetectorSettings::new(1.5).is_err());
    assert!(DetectorSettings::new(f32::NAN).is_err());
    let settings = DetectorSettings::new(1.0).unwrap();
    assert!(settings.set_min_face_size(-0.2).is_err());
    assert_eq!(settings.min_face_size(), 1.0);
}

#[test]
fn test_detector_rejects_zero_size() {
    let result = FaceDetector::new(None, Arc::new(DetectorSettings::default()), 0, 480);
    assert!(matches!(result, Err(Error::InvalidInput(_))));
}

#[test]
fn test_tracker_lifecycle_errors() {
    let mut tracker = FaceTracker::new(Script::default().loader(), Arc::new(DetectorSettings::default()));
    assert!(matches!(tracker.process_frame(blank_frame(64, 48)), Err(Error::Lifecycle(_))));

    tracker.init(64, 48).unwrap();
    assert!(matches!(tracker.detect_face(&blank_frame(32, 48)), Err(Error::InvalidInput(_))));

    tracker.release().unwrap();
    assert_eq!(tracker.lifecycle(), TrackerLifecycle::Released);
    assert!(matches!(tracker.release(), Err(Error::Lifecycle(_))));
}

#[test]
fn test_release_without_init() {
    let mut tracker = FaceTracker::new(Arc::new(MissingClassifier), Arc::new(DetectorSettings::default()));
    tracker.release().unwrap();
    assert!(matches!(tracker.init(64, 48), Err(Error::Lifecycle(_))));
}

#[test]
fn test_failed_classifier_load_degrades() {
    let mut tracker = FaceTracker::new(Arc::new(MissingClassifier), Arc::new(DetectorSettings::default()));
    tracker.init(64, 48).unwrap();
    assert!(tracker.is_degraded());
    let processed = tracker.process_frame(blank_frame(64, 48)).unwrap();
    assert_eq!(processed.face, None);
}

#[test]
fn test_invalid_head_pose_config() {
    let config = HeadPoseConfig {
        max_offset: -1.0,
        ..HeadPoseConfig::default()
    };
    assert!(matches!(HeadPoseEstimator::new(&config), Err(Error::ConfigError(_))));
}

#[test]
fn test_invalid_viewpoint_config() {
    let config = ViewpointConfig {
        damping: 0.0,
        ..ViewpointConfig::default()
    };
    assert!(config.validate().is_err());
}

#[test]
fn test_arbiter_rejects_nan_bounds() {
    let mut config = Config::default();
    config.viewpoint.bounds_max = [8.0, f64::NAN, 16.0];
    assert!(matches!(TrackingArbiter::new(&config), Err(Error::ConfigError(_))));
}

#[test]
fn test_session_rejects_invalid_config() {
    let mut config = Config::default();
    config.tracking.sensor_queue = 0;
    let result = TrackingSession::start(config, Arc::new(MissingClassifier), Box::new(BoxScene::cube_room()));
    assert!(matches!(result, Err(Error::ConfigError(_))));
}

#[test]
fn test_start_camera_with_zero_size() {
    let mut session = TrackingSession::start(
        Config::default(),
        Arc::new(MissingClassifier),
        Box::new(BoxScene::cube_room()),
    )
    .unwrap();
    assert!(matches!(session.start_camera(0, 0), Err(Error::InvalidInput(_))));
    assert!(session.camera_resolution().is_none());
    session.shutdown();
}
