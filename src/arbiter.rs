//! Routing of estimator output to the scene camera.
//!
//! Exactly one tracking mode drives the camera. The mode, both estimators and
//! the camera pose controller sit behind a single mutex, so a mode switch is
//! observed either entirely before or entirely after any pose update. Producers
//! take a [`PoseTicket`] before doing expensive work; a ticket taken before a
//! switch no longer matches afterwards and its update is dropped.

use crate::camera_pose::{CameraPoseController, PoseSignal, ViewpointTransform};
use crate::config::Config;
use crate::face_detection::FaceRegion;
use crate::head_pose::HeadPoseEstimator;
use crate::orientation::OrientationEstimator;
use crate::render::{ViewpointReader, ViewpointSlot};
use crate::scene::{PickHit, Scene};
use crate::sensor::OrientationSample;
use crate::Result;
use log::{debug, info, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Input source driving the camera
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackingMode {
    /// Face tracking through the front camera
    Camera,
    /// Device tilt through the accelerometer
    Orientation,
}

impl fmt::Display for TrackingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Camera => write!(f, "camera"),
            Self::Orientation => write!(f, "orientation"),
        }
    }
}

impl std::str::FromStr for TrackingMode {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "camera" | "cam" | "face" => Ok(Self::Camera),
            "orientation" | "accelerometer" | "sensor" => Ok(Self::Orientation),
            _ => Err(crate::Error::InvalidInput(format!("Unknown tracking mode: {s}"))),
        }
    }
}

/// Proof of which mode and switch epoch a producer started under
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoseTicket {
    pub source: TrackingMode,
    pub epoch: u64,
}

/// Outcome of submitting estimator input
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Delivery {
    /// The camera moved (or stayed) according to the update
    Applied(ViewpointTransform),
    /// The active estimator had nothing to report yet
    NoSignal,
    /// The source is not active, or the mode changed since the ticket was taken
    Discarded,
}

/// Arbitration counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArbiterStats {
    pub applied: u64,
    pub discarded: u64,
    pub switches: u64,
}

struct ArbiterState {
    mode: TrackingMode,
    epoch: u64,
    head: HeadPoseEstimator,
    orientation: OrientationEstimator,
    controller: CameraPoseController,
    stats: ArbiterStats,
}

impl ArbiterState {
    fn accepts(&self, ticket: PoseTicket) -> bool {
        ticket.source == self.mode && ticket.epoch == self.epoch
    }
}

/// Single arbitration point between the estimators and the camera
pub struct TrackingArbiter {
    state: Mutex<ArbiterState>,
    slot: ViewpointSlot,
}

impl TrackingArbiter {
    pub fn new(config: &Config) -> Result<Self> {
        let head = HeadPoseEstimator::new(&config.head_pose)?;
        let orientation = OrientationEstimator::new(&config.orientation);
        let controller = CameraPoseController::new(&config.viewpoint, &config.orientation)?;
        let mode = config.tracking.initial_mode;
        let slot = ViewpointSlot::new(controller.transform(), mode);

        info!("Tracking arbiter initialised in {} mode", mode);
        Ok(Self {
            state: Mutex::new(ArbiterState {
                mode,
                epoch: 0,
                head,
                orientation,
                controller,
                stats: ArbiterStats::default(),
            }),
            slot,
        })
    }

    pub fn mode(&self) -> TrackingMode {
        self.state.lock().mode
    }

    /// Switch the active source.
    ///
    /// Returns `false` if `mode` was already active (nothing changes). On a real
    /// switch the newly active estimator starts from scratch and the camera
    /// keeps its current position.
    pub fn set_mode(&self, mode: TrackingMode) -> bool {
        let mut state = self.state.lock();
        if state.mode == mode {
            return false;
        }

        state.mode = mode;
        state.epoch += 1;
        state.stats.switches += 1;
        match mode {
            TrackingMode::Camera => state.head.reset(),
            TrackingMode::Orientation => state.orientation.reset(),
        }
        state.controller.rebase();
        self.publish(&state);

        info!("Tracking mode switched to {} (epoch {})", mode, state.epoch);
        true
    }

    /// Ticket for a producer about to compute an update from `source`
    pub fn ticket(&self, source: TrackingMode) -> PoseTicket {
        let state = self.state.lock();
        PoseTicket {
            source,
            epoch: state.epoch,
        }
    }

    /// Deliver a face detection result computed under `ticket`
    pub fn submit_face(&self, ticket: PoseTicket, region: Option<FaceRegion>) -> Delivery {
        let mut state = self.state.lock();
        if ticket.source != TrackingMode::Camera || !state.accepts(ticket) {
            state.stats.discarded += 1;
            debug!("Discarded face update from epoch {}", ticket.epoch);
            return Delivery::Discarded;
        }

        match state.head.update(region) {
            Some(offset) => self.apply(&mut state, PoseSignal::Head(offset)),
            None => Delivery::NoSignal,
        }
    }

    /// Deliver an orientation sample received under `ticket`
    pub fn submit_orientation(&self, ticket: PoseTicket, sample: OrientationSample) -> Delivery {
        let mut state = self.state.lock();
        if ticket.source != TrackingMode::Orientation || !state.accepts(ticket) {
            state.stats.discarded += 1;
            debug!("Discarded orientation update from epoch {}", ticket.epoch);
            return Delivery::Discarded;
        }
        if !sample.is_finite() {
            warn!("Ignoring non-finite orientation sample {:?}", sample);
            return Delivery::NoSignal;
        }

        let delta = state.orientation.update(sample);
        self.apply(&mut state, PoseSignal::Orientation(delta))
    }

    /// Ticket and submit in one step, for producers that do no work in between
    pub fn deliver_face(&self, region: Option<FaceRegion>) -> Delivery {
        let ticket = self.ticket(TrackingMode::Camera);
        self.submit_face(ticket, region)
    }

    /// Ticket and submit in one step, for producers that do no work in between
    pub fn deliver_orientation(&self, sample: OrientationSample) -> Delivery {
        let ticket = self.ticket(TrackingMode::Orientation);
        self.submit_orientation(ticket, sample)
    }

    fn apply(&self, state: &mut ArbiterState, signal: PoseSignal) -> Delivery {
        let before = state.controller.transform();
        let transform = state.controller.apply(signal);
        state.stats.applied += 1;
        if transform != before {
            self.publish(state);
        }
        Delivery::Applied(transform)
    }

    fn publish(&self, state: &ArbiterState) {
        self.slot.publish(
            state.controller.transform(),
            state.controller.show_tracking_overlay(),
            state.mode,
        );
    }

    /// Recenter the camera
    pub fn reset_to_default(&self) -> ViewpointTransform {
        let mut state = self.state.lock();
        let transform = state.controller.reset_to_default();
        self.publish(&state);
        info!("Viewpoint reset to default");
        transform
    }

    /// Flip the tracking overlay flag; returns the new value
    pub fn toggle_show_tracking_overlay(&self) -> bool {
        let mut state = self.state.lock();
        let visible = state.controller.toggle_show_tracking_overlay();
        self.publish(&state);
        visible
    }

    /// Best-effort pick of the object under a screen point
    pub fn pick_object_at(&self, screen_x: f64, screen_y: f64, scene: &dyn Scene) -> Option<PickHit> {
        let state = self.state.lock();
        state.controller.pick_object_at(screen_x, screen_y, scene)
    }

    pub fn transform(&self) -> ViewpointTransform {
        self.state.lock().controller.transform()
    }

    pub fn viewpoint_reader(&self) -> ViewpointReader {
        self.slot.reader()
    }

    pub fn stats(&self) -> ArbiterStats {
        self.state.lock().stats
    }

    /// Whether the orientation estimator has captured its baseline
    pub fn orientation_calibrated(&self) -> bool {
        self.state.lock().orientation.is_calibrated()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;

    fn arbiter() -> TrackingArbiter {
        TrackingArbiter::new(&Config::default()).unwrap()
    }

    fn face() -> FaceRegion {
        FaceRegion::new(560, 200, 80, 80, 640, 480).unwrap()
    }

    #[test]
    fn test_initial_mode_is_orientation() {
        assert_eq!(arbiter().mode(), TrackingMode::Orientation);
    }

    #[test]
    fn test_inactive_source_discarded() {
        let arb = arbiter();
        assert_eq!(arb.deliver_face(Some(face())), Delivery::Discarded);
        assert_eq!(arb.transform().position, Point3::new(0.0, 0.0, 10.0));
        assert_eq!(arb.stats().discarded, 1);
    }

    #[test]
    fn test_set_mode_is_idempotent() {
        let arb = arbiter();
        assert!(arb.set_mode(TrackingMode::Camera));
        assert!(!arb.set_mode(TrackingMode::Camera));
        assert_eq!(arb.stats().switches, 1);
    }

    #[test]
    fn test_stale_ticket_discarded_after_round_trip() {
        let arb = arbiter();
        arb.set_mode(TrackingMode::Camera);
        let ticket = arb.ticket(TrackingMode::Camera);
        arb.set_mode(TrackingMode::Orientation);
        arb.set_mode(TrackingMode::Camera);
        assert_eq!(arb.submit_face(ticket, Some(face())), Delivery::Discarded);
    }

    #[test]
    fn test_switch_rebaselines_orientation() {
        let arb = arbiter();
        arb.deliver_orientation(OrientationSample::new(0.0, 0.0, 0.0));
        arb.deliver_orientation(OrientationSample::new(0.0, 2.0, 0.0));
        let moved = arb.transform();

        arb.set_mode(TrackingMode::Camera);
        arb.set_mode(TrackingMode::Orientation);
        assert!(!arb.orientation_calibrated());

        // First sample after reactivation is a new baseline, no jump
        arb.deliver_orientation(OrientationSample::new(0.0, 50.0, 50.0));
        assert_eq!(arb.transform(), moved);
    }

    #[test]
    fn test_switch_to_camera_does_not_jump() {
        let arb = arbiter();
        arb.deliver_orientation(OrientationSample::new(0.0, 0.0, 0.0));
        arb.deliver_orientation(OrientationSample::new(0.0, 8.0, 8.0));
        let tilted = arb.transform().position;
        assert_eq!(tilted, Point3::new(-8.0, -8.0, 10.0));

        arb.set_mode(TrackingMode::Camera);
        let centred = FaceRegion::new(260, 180, 120, 120, 640, 480).unwrap();
        let mut last = tilted;
        for _ in 0..300 {
            match arb.deliver_face(Some(centred)) {
                Delivery::Applied(t) => {
                    assert!((t.position - last).norm() < 1.0, "jumped to {:?}", t.position);
                    last = t.position;
                }
                other => panic!("unexpected delivery {other:?}"),
            }
        }
        // Eventually back on the absolute head mapping
        assert!((last - Point3::new(0.0, 0.0, 10.0)).norm() < 0.5);
    }

    #[test]
    fn test_no_signal_before_first_face() {
        let arb = arbiter();
        arb.set_mode(TrackingMode::Camera);
        assert_eq!(arb.deliver_face(None), Delivery::NoSignal);
    }

    #[test]
    fn test_publish_on_change_only() {
        let arb = arbiter();
        let reader = arb.viewpoint_reader();
        let start = reader.revision();

        // Calibration sample does not move the camera
        arb.deliver_orientation(OrientationSample::new(0.0, 1.0, 1.0));
        assert_eq!(reader.revision(), start);

        arb.deliver_orientation(OrientationSample::new(0.0, 2.0, 1.0));
        assert_eq!(reader.revision(), start + 1);
        assert_eq!(reader.snapshot().transform, arb.transform());
    }

    #[test]
    fn test_overlay_toggle_published() {
        let arb = arbiter();
        let reader = arb.viewpoint_reader();
        assert!(arb.toggle_show_tracking_overlay());
        assert!(reader.snapshot().show_tracking_overlay);
        assert_eq!(reader.snapshot().transform, arb.transform());
    }

    #[test]
    fn test_mode_from_str() {
        assert_eq!("camera".parse::<TrackingMode>().unwrap(), TrackingMode::Camera);
        assert_eq!("Accelerometer".parse::<TrackingMode>().unwrap(), TrackingMode::Orientation);
        assert!("gps".parse::<TrackingMode>().is_err());
    }
}
