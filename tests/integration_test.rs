//! End-to-end tracking scenarios


use std::sync::Arc;
use std::time::Duration;
use test_helpers::{blank_frame, test_config, wait_until, Script};
use virtual_window::arbiter::{Delivery, TrackingArbiter, TrackingMode};
use virtual_window::config::{Config, HeadPoseConfig};
use virtual_window::face_detection::{ClassifierLoader, DetectorSettings, FaceDetector, FaceRect, FaceRegion};
use virtual_window::head_pose::{region_offset, HeadPoseEstimator};
use virtual_window::scene::BoxScene;
use virtual_window::sensor::{OrientationSample, SensorEvent, SensorKind};
use virtual_window::session::{FrameOffer, TrackingSession};
use virtual_window::tracker::ProcessedFrame;

const WAIT: Duration = Duration::from_secs(2);

#[test]
fn test_centered_face_gives_zero_offset() {
    let region = FaceRegion::new(280, 200, 80, 80, 640, 480).unwrap();
    let offset = region_offset(&region, 0.25, 1.5, false, false);
    assert!(offset.x().abs() < 1e-9);
    assert!(offset.y().abs() < 1e-9);
}

#[test]
fn test_face_on_right_gives_positive_x() {
    let mut estimator = HeadPoseEstimator::new(&HeadPoseConfig::default()).unwrap();
    let region = FaceRegion::new(560, 200, 80, 80, 640, 480).unwrap();
    let offset = estimator.update(Some(region)).unwrap();
    assert!((offset.x() - 0.875).abs() < 1e-9);
    assert!(offset.y().abs() < 1e-9);
    assert!(offset.magnitude() <= estimator.max_offset());
}

#[test]
fn test_detector_to_estimator_pipeline() {
    let script = Script::new(vec![FaceRect::new(560, 200, 80, 80)]);
    let classifier = script.loader().load().unwrap();
    let settings = Arc::new(DetectorSettings::new(0.1).unwrap());
    let mut detector = FaceDetector::new(Some(classifier), settings, 640, 480).unwrap();
    let mut estimator = HeadPoseEstimator::new(&HeadPoseConfig::default()).unwrap();

    let region = detector.detect(&blank_frame(640, 480)).unwrap();
    let offset = estimator.update(region).unwrap();
    assert!(offset.x() > 0.8);
}

#[test]
fn test_orientation_samples_move_camera_against_tilt() {
    let arbiter = TrackingArbiter::new(&Config::default()).unwrap();
    assert_eq!(arbiter.mode(), TrackingMode::Orientation);

    arbiter.deliver_orientation(OrientationSample::new(10.0, 5.0, 0.0));
    let delivery = arbiter.deliver_orientation(OrientationSample::new(10.0, 8.0, 2.0));

    let Delivery::Applied(transform) = delivery else {
        panic!("expected the sample to be applied, got {delivery:?}");
    };
    assert!((transform.position.x + 3.0).abs() < 1e-9);
    assert!((transform.position.y + 2.0).abs() < 1e-9);
    assert!((transform.position.z - 10.0).abs() < 1e-9);
}

#[test]
fn test_recenter_restores_default_view() {
    let arbiter = TrackingArbiter::new(&Config::default()).unwrap();
    arbiter.deliver_orientation(OrientationSample::new(0.0, 0.0, 0.0));
    arbiter.deliver_orientation(OrientationSample::new(0.0, 4.0, -3.0));

    let transform = arbiter.reset_to_default();
    assert_eq!(transform.position, nalgebra::Point3::new(0.0, 0.0, 10.0));
    assert_eq!(transform.look_at, nalgebra::Point3::new(0.0, 1.0, 0.0));
}

#[test]
fn test_session_sensor_path() {
    let mut session = TrackingSession::start(
        Config::default(),
        Script::default().loader(),
        Box::new(BoxScene::cube_room()),
    )
    .unwrap();
    let sensors = session.sensor_sender();

    assert!(sensors.send(SensorEvent::accelerometer([10.0, 5.0, 0.0], Duration::ZERO)).unwrap());
    // Non-accelerometer events are ignored
    let gyro = SensorEvent {
        kind: SensorKind::Gyroscope,
        values: [100.0, 100.0, 100.0],
        timestamp: Duration::from_millis(5),
    };
    assert!(sensors.send(gyro).unwrap());
    assert!(sensors.send(SensorEvent::accelerometer([10.0, 8.0, 2.0], Duration::from_millis(10))).unwrap());

    assert!(wait_until(WAIT, || session.stats().sensor_events == 2));
    let view = session.viewpoint();
    assert!((view.transform.position.x + 3.0).abs() < 1e-6);
    assert!((view.transform.position.y + 2.0).abs() < 1e-6);
    session.shutdown();
}

#[test]
fn test_session_camera_path() {
    let script = Script::new(vec![FaceRect::new(560, 200, 80, 80)]);
    let mut session = TrackingSession::start(
        test_config(TrackingMode::Camera),
        script.loader(),
        Box::new(BoxScene::floating_planes()),
    )
    .unwrap();

    let previews = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let counter = Arc::clone(&previews);
    session.set_preview(Arc::new(move |frame: &ProcessedFrame| {
        assert!(frame.face.is_some());
        counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    }));

    let sender = session.start_camera(640, 480).unwrap();
    assert_eq!(sender.offer(blank_frame(640, 480)).unwrap(), FrameOffer::Queued);

    assert!(wait_until(WAIT, || session.stats().frames_processed == 1));
    assert!(wait_until(WAIT, || session.viewpoint().transform.position.x > 0.0));
    assert!(wait_until(WAIT, || previews.load(std::sync::atomic::Ordering::SeqCst) == 1));

    assert!(session.stop_camera());
    session.shutdown();
}

#[test]
fn test_render_thread_applies_viewpoint_to_scene() {
    let mut session = TrackingSession::start(
        Config::default(),
        Script::default().loader(),
        Box::new(BoxScene::cube_room()),
    )
    .unwrap();

    let arbiter = session.arbiter();
    arbiter.deliver_orientation(OrientationSample::new(0.0, 0.0, 0.0));
    arbiter.deliver_orientation(OrientationSample::new(0.0, 1.0, 0.0));
    std::thread::sleep(Duration::from_millis(100));

    let stats = session.shutdown().unwrap();
    assert!(stats.ticks >= stats.frames_drawn);
    assert!(stats.frames_drawn >= 1);
}

#[test]
fn test_min_face_size_change_applies_to_next_frame() {
    let script = Script::new(vec![FaceRect::new(560, 200, 80, 80)]);
    let mut session = TrackingSession::start(
        test_config(TrackingMode::Camera),
        script.loader(),
        Box::new(BoxScene::cube_room()),
    )
    .unwrap();
    let sender = session.start_camera(640, 480).unwrap();

    // 80px is below 0.5 * 480, so the face is ignored
    session.set_min_face_size(0.5).unwrap();
    sender.offer(blank_frame(640, 480)).unwrap();
    assert!(wait_until(WAIT, || session.stats().frames_processed == 1));
    assert_eq!(session.arbiter().stats().applied, 0);

    session.set_min_face_size(0.1).unwrap();
    assert_eq!(sender.offer(blank_frame(640, 480)).unwrap(), FrameOffer::Queued);
    assert!(wait_until(WAIT, || session.arbiter().stats().applied >= 1));
    session.shutdown();
}
