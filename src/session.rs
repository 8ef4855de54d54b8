//! Session orchestration.
//!
//! A [`TrackingSession`] owns the arbiter and runs three execution contexts:
//! a camera worker (started and stopped with the camera), a sensor worker and
//! a render thread. Producers feed the workers through bounded channels and
//! never wait on each other.

use crate::arbiter::{ArbiterStats, TrackingArbiter, TrackingMode};
use crate::config::Config;
use crate::face_detection::{ClassifierLoader, DetectorSettings};
use crate::render::{RenderLoop, RenderStats, ViewpointReader, ViewpointSnapshot};
use crate::scene::{PickHit, Scene};
use crate::sensor::{OrientationSample, SensorEvent};
use crate::tracker::{FaceTracker, ProcessedFrame};
use crate::{Error, Result};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use image::GrayImage;
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// How long workers block before re-checking their stop flags
const RECV_TIMEOUT: Duration = Duration::from_millis(20);

/// Receives every processed camera frame, e.g. to show a preview
pub type PreviewCallback = Arc<dyn Fn(&ProcessedFrame) + Send + Sync>;

/// Result of offering a frame to the camera worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOffer {
    Queued,
    /// The worker is still busy; the frame was not queued
    Dropped,
}

struct TimedFrame {
    image: GrayImage,
    captured_at: Instant,
}

#[derive(Debug, Default)]
struct Counters {
    frames_offered: AtomicU64,
    frames_dropped: AtomicU64,
    frames_stale: AtomicU64,
    frames_processed: AtomicU64,
    detection_failures: AtomicU64,
    sensor_events: AtomicU64,
    sensor_dropped: AtomicU64,
}

/// Snapshot of session activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub arbiter: ArbiterStats,
    pub frames_offered: u64,
    /// Rejected at offer time because the queue was full
    pub frames_dropped: u64,
    /// Discarded by the worker for exceeding the detection budget
    pub frames_stale: u64,
    pub frames_processed: u64,
    pub detection_failures: u64,
    pub sensor_events: u64,
    pub sensor_dropped: u64,
}

/// Producer handle for camera frames
#[derive(Clone)]
pub struct FrameSender {
    tx: Sender<TimedFrame>,
    released: Arc<AtomicBool>,
    counters: Arc<Counters>,
}

impl FrameSender {
    /// Offer a frame without blocking.
    ///
    /// # Errors
    ///
    /// `Lifecycle` once the camera has been stopped.
    pub fn offer(&self, image: GrayImage) -> Result<FrameOffer> {
        if self.released.load(Ordering::Acquire) {
            return Err(Error::Lifecycle("Camera stopped; frame rejected".to_string()));
        }

        self.counters.frames_offered.fetch_add(1, Ordering::Relaxed);
        let frame = TimedFrame {
            image,
            captured_at: Instant::now(),
        };
        match self.tx.try_send(frame) {
            Ok(()) => Ok(FrameOffer::Queued),
            Err(TrySendError::Full(_)) => {
                self.counters.frames_dropped.fetch_add(1, Ordering::Relaxed);
                debug!("Camera worker busy, frame dropped");
                Ok(FrameOffer::Dropped)
            }
            Err(TrySendError::Disconnected(_)) => Err(Error::Lifecycle("Camera worker has exited".to_string())),
        }
    }
}

/// Producer handle for sensor events
#[derive(Clone)]
pub struct SensorSender {
    tx: Sender<SensorEvent>,
    counters: Arc<Counters>,
}

impl SensorSender {
    /// Queue an event; returns `false` if it was dropped because the queue is full
    pub fn send(&self, event: SensorEvent) -> Result<bool> {
        match self.tx.try_send(event) {
            Ok(()) => Ok(true),
            Err(TrySendError::Full(_)) => {
                self.counters.sensor_dropped.fetch_add(1, Ordering::Relaxed);
                Ok(false)
            }
            Err(TrySendError::Disconnected(_)) => Err(Error::ChannelClosed("Sensor worker has exited".to_string())),
        }
    }
}

struct CameraWorker {
    sender: FrameSender,
    released: Arc<AtomicBool>,
    handle: JoinHandle<()>,
    resolution: (u32, u32),
}

struct CameraContext {
    rx: Receiver<TimedFrame>,
    tracker: FaceTracker,
    arbiter: Arc<TrackingArbiter>,
    released: Arc<AtomicBool>,
    counters: Arc<Counters>,
    budget: Duration,
    preview: Option<PreviewCallback>,
}

impl CameraContext {
    fn run(mut self) {
        loop {
            let frame = match self.rx.recv_timeout(RECV_TIMEOUT) {
                Ok(frame) => frame,
                Err(RecvTimeoutError::Timeout) => {
                    if self.released.load(Ordering::Acquire) {
                        break;
                    }
                    continue;
                }
                Err(RecvTimeoutError::Disconnected) => break,
            };

            // Queued frames are never dispatched to a tracker that is being released
            if self.released.load(Ordering::Acquire) {
                break;
            }

            let age = frame.captured_at.elapsed();
            if age > self.budget {
                self.counters.frames_stale.fetch_add(1, Ordering::Relaxed);
                warn!("Dropping stale frame ({} ms old)", age.as_millis());
                continue;
            }

            self.process(frame.image);
        }

        let discarded = self.rx.try_iter().count();
        if discarded > 0 {
            debug!("Discarded {} queued frame(s) on stop", discarded);
        }
        if let Err(e) = self.tracker.release() {
            error!("Failed to release face tracker: {}", e);
        }
    }

    fn process(&mut self, image: GrayImage) {
        let ticket = self.arbiter.ticket(TrackingMode::Camera);
        let started = Instant::now();

        match self.tracker.process_frame(image) {
            Ok(processed) => {
                let elapsed = started.elapsed();
                if elapsed > self.budget {
                    warn!("Slow detection: {} ms", elapsed.as_millis());
                }
                self.counters.frames_processed.fetch_add(1, Ordering::Relaxed);
                self.arbiter.submit_face(ticket, processed.face);
                if let Some(preview) = &self.preview {
                    preview(&processed);
                }
            }
            Err(e) => {
                self.counters.detection_failures.fetch_add(1, Ordering::Relaxed);
                warn!("Face detection failed: {}", e);
            }
        }
    }
}

fn run_sensor_worker(
    rx: Receiver<SensorEvent>,
    arbiter: Arc<TrackingArbiter>,
    stop: Arc<AtomicBool>,
    counters: Arc<Counters>,
) {
    while !stop.load(Ordering::Acquire) {
        match rx.recv_timeout(RECV_TIMEOUT) {
            Ok(event) => {
                let Some(sample) = OrientationSample::from_event(&event) else {
                    continue;
                };
                counters.sensor_events.fetch_add(1, Ordering::Relaxed);
                arbiter.deliver_orientation(sample);
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    debug!("Sensor worker exiting");
}

/// Running virtual window: arbiter, workers and user controls
pub struct TrackingSession {
    config: Config,
    arbiter: Arc<TrackingArbiter>,
    settings: Arc<DetectorSettings>,
    loader: Arc<dyn ClassifierLoader>,
    scene: Arc<Mutex<Box<dyn Scene>>>,
    counters: Arc<Counters>,
    preview: Option<PreviewCallback>,
    camera: Option<CameraWorker>,
    sensor_sender: SensorSender,
    sensor_handle: Option<JoinHandle<()>>,
    render_handle: Option<JoinHandle<RenderStats>>,
    stop: Arc<AtomicBool>,
}

impl TrackingSession {
    /// Validate the configuration and start the sensor and render threads
    pub fn start(config: Config, loader: Arc<dyn ClassifierLoader>, scene: Box<dyn Scene>) -> Result<Self> {
        config.validate()?;

        let arbiter = Arc::new(TrackingArbiter::new(&config)?);
        let settings = Arc::new(DetectorSettings::new(config.detection.min_face_size)?);
        settings.set_annotate_preview(config.detection.annotate_preview);

        let scene_name = scene.name().to_string();
        let scene = Arc::new(Mutex::new(scene));
        let counters = Arc::new(Counters::default());
        let stop = Arc::new(AtomicBool::new(false));

        let (sensor_tx, sensor_rx) = bounded::<SensorEvent>(config.tracking.sensor_queue);
        let sensor_handle = {
            let arbiter = Arc::clone(&arbiter);
            let stop = Arc::clone(&stop);
            let counters = Arc::clone(&counters);
            thread::Builder::new()
                .name("sensor-worker".to_string())
                .spawn(move || run_sensor_worker(sensor_rx, arbiter, stop, counters))?
        };

        let render = RenderLoop::new(
            arbiter.viewpoint_reader(),
            Arc::clone(&scene),
            config.render.target_fps,
            config.render.demand_driven,
        );
        let render_handle = {
            let stop = Arc::clone(&stop);
            thread::Builder::new()
                .name("render".to_string())
                .spawn(move || render.run(&stop))?
        };

        info!("Tracking session started with scene '{}' in {} mode", scene_name, arbiter.mode());
        Ok(Self {
            config,
            arbiter,
            settings,
            loader,
            scene,
            counters: Arc::clone(&counters),
            preview: None,
            camera: None,
            sensor_sender: SensorSender { tx: sensor_tx, counters },
            sensor_handle: Some(sensor_handle),
            render_handle: Some(render_handle),
            stop,
        })
    }

    /// Install a preview callback; applies to cameras started afterwards
    pub fn set_preview(&mut self, callback: PreviewCallback) {
        self.preview = Some(callback);
    }

    /// Start the camera worker with a fresh tracker for `width` x `height` frames.
    ///
    /// A running camera is stopped first, so this is also how the resolution
    /// changes.
    pub fn start_camera(&mut self, width: u32, height: u32) -> Result<FrameSender> {
        self.stop_camera();

        let mut tracker = FaceTracker::new(Arc::clone(&self.loader), Arc::clone(&self.settings));
        tracker.init(width, height)?;
        if tracker.is_degraded() {
            warn!("Camera started without a classifier; face tracking is inactive");
        }

        let (tx, rx) = bounded::<TimedFrame>(self.config.camera.frame_queue);
        let released = Arc::new(AtomicBool::new(false));
        let context = CameraContext {
            rx,
            tracker,
            arbiter: Arc::clone(&self.arbiter),
            released: Arc::clone(&released),
            counters: Arc::clone(&self.counters),
            budget: Duration::from_millis(self.config.camera.detection_budget_ms),
            preview: self.preview.clone(),
        };
        let handle = thread::Builder::new()
            .name("camera-worker".to_string())
            .spawn(move || context.run())?;

        let sender = FrameSender {
            tx,
            released: Arc::clone(&released),
            counters: Arc::clone(&self.counters),
        };
        self.camera = Some(CameraWorker {
            sender: sender.clone(),
            released,
            handle,
            resolution: (width, height),
        });
        info!("Camera started at {}x{}", width, height);
        Ok(sender)
    }

    /// Another handle to the running camera's queue
    pub fn frame_sender(&self) -> Result<FrameSender> {
        self.camera
            .as_ref()
            .map(|camera| camera.sender.clone())
            .ok_or_else(|| Error::Lifecycle("Camera not started".to_string()))
    }

    pub fn camera_resolution(&self) -> Option<(u32, u32)> {
        self.camera.as_ref().map(|camera| camera.resolution)
    }

    /// Stop the camera worker and release its tracker.
    ///
    /// The detection in flight completes, frames still queued are discarded,
    /// and every outstanding [`FrameSender`] starts rejecting frames. Returns
    /// `false` if no camera was running.
    pub fn stop_camera(&mut self) -> bool {
        let Some(camera) = self.camera.take() else {
            return false;
        };

        camera.released.store(true, Ordering::Release);
        drop(camera.sender);
        if camera.handle.join().is_err() {
            error!("Camera worker panicked");
        }
        info!("Camera stopped");
        true
    }

    pub fn sensor_sender(&self) -> SensorSender {
        self.sensor_sender.clone()
    }

    pub fn mode(&self) -> TrackingMode {
        self.arbiter.mode()
    }

    pub fn set_mode(&self, mode: TrackingMode) -> bool {
        self.arbiter.set_mode(mode)
    }

    /// Change the minimum face size; takes effect on the next frame
    pub fn set_min_face_size(&self, fraction: f32) -> Result<()> {
        self.settings.set_min_face_size(fraction)
    }

    pub fn min_face_size(&self) -> f32 {
        self.settings.min_face_size()
    }

    /// Toggle the debug overlay drawn by the scene
    pub fn toggle_show_tracking_overlay(&self) -> bool {
        self.arbiter.toggle_show_tracking_overlay()
    }

    /// Outline detected faces on preview frames
    pub fn set_annotate_preview(&self, enabled: bool) {
        self.settings.set_annotate_preview(enabled);
    }

    pub fn recenter(&self) {
        self.arbiter.reset_to_default();
    }

    /// Pick and select the object under a screen point
    pub fn pick_object_at(&self, screen_x: f64, screen_y: f64) -> Option<PickHit> {
        let mut scene = self.scene.lock();
        let hit = self.arbiter.pick_object_at(screen_x, screen_y, &**scene)?;
        scene.select(hit.id);
        debug!("Selected '{}' at distance {:.2}", hit.name, hit.distance);
        Some(hit)
    }

    pub fn release_selection(&self) {
        self.scene.lock().stop_moving_selected();
    }

    pub fn selected_object(&self) -> Option<usize> {
        self.scene.lock().selected()
    }

    pub fn viewpoint(&self) -> ViewpointSnapshot {
        self.arbiter.viewpoint_reader().snapshot()
    }

    pub fn viewpoint_reader(&self) -> ViewpointReader {
        self.arbiter.viewpoint_reader()
    }

    pub fn arbiter(&self) -> &Arc<TrackingArbiter> {
        &self.arbiter
    }

    pub fn stats(&self) -> SessionStats {
        let c = &self.counters;
        SessionStats {
            arbiter: self.arbiter.stats(),
            frames_offered: c.frames_offered.load(Ordering::Relaxed),
            frames_dropped: c.frames_dropped.load(Ordering::Relaxed),
            frames_stale: c.frames_stale.load(Ordering::Relaxed),
            frames_processed: c.frames_processed.load(Ordering::Relaxed),
            detection_failures: c.detection_failures.load(Ordering::Relaxed),
            sensor_events: c.sensor_events.load(Ordering::Relaxed),
            sensor_dropped: c.sensor_dropped.load(Ordering::Relaxed),
        }
    }

    /// Stop every worker. Safe to call more than once.
    pub fn shutdown(&mut self) -> Option<RenderStats> {
        self.stop_camera();
        self.stop.store(true, Ordering::Release);

        if let Some(handle) = self.sensor_handle.take() {
            if handle.join().is_err() {
                error!("Sensor worker panicked");
            }
        }

        let render_stats = self.render_handle.take().and_then(|handle| match handle.join() {
            Ok(stats) => Some(stats),
            Err(_) => {
                error!("Render thread panicked");
                None
            }
        });
        if render_stats.is_some() {
            info!("Tracking session shut down");
        }
        render_stats
    }
}

impl Drop for TrackingSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}
