//! Render-side consumption of the viewpoint.
//!
//! The arbiter publishes complete snapshots behind a `RwLock`; the render
//! loop copies one out per tick, so it can never see a half-applied update and
//! only waits for the few instructions a publish takes.

use crate::arbiter::TrackingMode;
use crate::camera_pose::ViewpointTransform;
use crate::scene::Scene;
use log::{debug, info};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Immutable view of the camera state at one revision
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewpointSnapshot {
    pub transform: ViewpointTransform,
    /// Incremented on every published change
    pub revision: u64,
    pub show_tracking_overlay: bool,
    pub mode: TrackingMode,
}

/// Shared slot the arbiter writes snapshots into
#[derive(Debug, Clone)]
pub(crate) struct ViewpointSlot(Arc<RwLock<ViewpointSnapshot>>);

impl ViewpointSlot {
    pub(crate) fn new(transform: ViewpointTransform, mode: TrackingMode) -> Self {
        Self(Arc::new(RwLock::new(ViewpointSnapshot {
            transform,
            revision: 0,
            show_tracking_overlay: false,
            mode,
        })))
    }

    pub(crate) fn publish(
        &self,
        transform: ViewpointTransform,
        show_tracking_overlay: bool,
        mode: TrackingMode,
    ) -> u64 {
        let mut snapshot = self.0.write();
        snapshot.transform = transform;
        snapshot.show_tracking_overlay = show_tracking_overlay;
        snapshot.mode = mode;
        snapshot.revision += 1;
        snapshot.revision
    }

    pub(crate) fn reader(&self) -> ViewpointReader {
        ViewpointReader(Arc::clone(&self.0))
    }
}

/// Read handle for the render context
#[derive(Debug, Clone)]
pub struct ViewpointReader(Arc<RwLock<ViewpointSnapshot>>);

impl ViewpointReader {
    /// Copy of the latest complete snapshot
    pub fn snapshot(&self) -> ViewpointSnapshot {
        *self.0.read()
    }

    pub fn revision(&self) -> u64 {
        self.0.read().revision
    }
}

/// Counters reported when the loop exits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub ticks: u64,
    pub frames_drawn: u64,
}

/// Applies the published viewpoint to a scene at its own cadence
pub struct RenderLoop {
    reader: ViewpointReader,
    scene: Arc<Mutex<Box<dyn Scene>>>,
    frame_interval: Duration,
    demand_driven: bool,
    last_revision: Option<u64>,
    stats: RenderStats,
}

impl RenderLoop {
    pub fn new(
        reader: ViewpointReader,
        scene: Arc<Mutex<Box<dyn Scene>>>,
        target_fps: u32,
        demand_driven: bool,
    ) -> Self {
        let fps = target_fps.max(1);
        Self {
            reader,
            scene,
            frame_interval: Duration::from_secs_f64(1.0 / f64::from(fps)),
            demand_driven,
            last_revision: None,
            stats: RenderStats::default(),
        }
    }

    /// Run one tick; returns whether a frame was drawn
    pub fn render_frame(&mut self) -> bool {
        self.stats.ticks += 1;
        let snapshot = self.reader.snapshot();
        if self.demand_driven && self.last_revision == Some(snapshot.revision) {
            return false;
        }

        {
            let mut scene = self.scene.lock();
            scene.set_position(snapshot.transform.position);
            scene.set_look_at(snapshot.transform.look_at);
            scene.set_tracking_overlay(snapshot.show_tracking_overlay);
        }

        self.last_revision = Some(snapshot.revision);
        self.stats.frames_drawn += 1;
        debug!("Drew revision {}", snapshot.revision);
        true
    }

    /// Force the next tick to draw even without a change
    pub fn request_redraw(&mut self) {
        self.last_revision = None;
    }

    pub fn stats(&self) -> RenderStats {
        self.stats
    }

    /// Tick at the target rate until `stop` is set
    pub fn run(mut self, stop: &AtomicBool) -> RenderStats {
        info!("Render loop started at {:.1} Hz", 1.0 / self.frame_interval.as_secs_f64());
        while !stop.load(Ordering::Acquire) {
            let started = Instant::now();
            self.render_frame();
            if let Some(remaining) = self.frame_interval.checked_sub(started.elapsed()) {
                thread::sleep(remaining);
            }
        }
        info!("Render loop stopped: {} ticks, {} frames drawn", self.stats.ticks, self.stats.frames_drawn);
        self.stats
    }
}
