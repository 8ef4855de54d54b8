//! Maps fused pose signals onto the scene camera.

use crate::config::{OrientationConfig, ViewpointConfig};
use crate::head_pose::HeadOffset;
use crate::orientation::OrientationDelta;
use crate::scene::{PickHit, Ray, Scene};
use crate::Result;
use log::debug;
use nalgebra::{Point3, Vector3};

/// Position and look-at target of the scene camera
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewpointTransform {
    pub position: Point3<f64>,
    pub look_at: Point3<f64>,
}

impl ViewpointTransform {
    pub fn new(position: Point3<f64>, look_at: Point3<f64>) -> Self {
        Self { position, look_at }
    }
}

impl Default for ViewpointTransform {
    fn default() -> Self {
        Self {
            position: Point3::new(0.0, 0.0, 10.0),
            look_at: Point3::new(0.0, 1.0, 0.0),
        }
    }
}

/// Signal produced by whichever estimator is active
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PoseSignal {
    /// Absolute head offset from face tracking
    Head(HeadOffset),
    /// Incremental device rotation from the accelerometer
    Orientation(OrientationDelta),
}

/// Owns the scene camera pose and the policy for moving it
#[derive(Debug, Clone)]
pub struct CameraPoseController {
    default_position: Point3<f64>,
    default_look_at: Point3<f64>,
    bounds_min: Point3<f64>,
    bounds_max: Point3<f64>,
    head_range: Vector3<f64>,
    damping: f64,
    handover_rate: f64,
    parallax_sign: f64,
    parallax_gain: f64,
    fov_y: f64,
    viewport: (u32, u32),
    transform: ViewpointTransform,
    orientation_offset: Vector3<f64>,
    /// Displacement between the absolute head target and where the camera
    /// was when head tracking took over; shrinks every head update
    head_anchor: Vector3<f64>,
    anchor_pending: bool,
    show_tracking_overlay: bool,
}

impl CameraPoseController {
    pub fn new(viewpoint: &ViewpointConfig, orientation: &OrientationConfig) -> Result<Self> {
        viewpoint.validate()?;
        let default_position = Point3::from(viewpoint.default_position);
        let default_look_at = Point3::from(viewpoint.default_look_at);

        Ok(Self {
            default_position,
            default_look_at,
            bounds_min: Point3::from(viewpoint.bounds_min),
            bounds_max: Point3::from(viewpoint.bounds_max),
            head_range: Vector3::from(viewpoint.head_range),
            damping: viewpoint.damping,
            handover_rate: viewpoint.handover_rate,
            parallax_sign: orientation.sign,
            parallax_gain: orientation.gain,
            fov_y: viewpoint.fov_y_degrees.to_radians(),
            viewport: (viewpoint.viewport_width, viewpoint.viewport_height),
            transform: ViewpointTransform::new(default_position, default_look_at),
            orientation_offset: Vector3::zeros(),
            head_anchor: Vector3::zeros(),
            anchor_pending: false,
            show_tracking_overlay: false,
        })
    }

    /// Move the camera according to a pose signal and return the new transform
    pub fn apply(&mut self, signal: PoseSignal) -> ViewpointTransform {
        let position = match signal {
            PoseSignal::Head(offset) => {
                let absolute = self.default_position + offset.0.component_mul(&self.head_range);
                if self.anchor_pending {
                    self.head_anchor = self.transform.position - absolute;
                    self.anchor_pending = false;
                } else {
                    self.head_anchor *= 1.0 - self.handover_rate;
                }
                let target = absolute + self.head_anchor;
                self.transform.position + (target - self.transform.position) * self.damping
            }
            PoseSignal::Orientation(delta) => {
                self.orientation_offset += delta.scene * (self.parallax_sign * self.parallax_gain);
                self.default_position + self.orientation_offset
            }
        };

        self.transform.position = self.clamp(position);
        // Keep accumulation in step with the clamped position so reversing
        // direction moves the camera immediately
        self.orientation_offset = self.transform.position - self.default_position;
        debug!("Viewpoint position {:?}", self.transform.position);
        self.transform
    }

    fn clamp(&self, p: Point3<f64>) -> Point3<f64> {
        Point3::new(
            p.x.clamp(self.bounds_min.x, self.bounds_max.x),
            p.y.clamp(self.bounds_min.y, self.bounds_max.y),
            p.z.clamp(self.bounds_min.z, self.bounds_max.z),
        )
    }

    /// Current camera transform
    pub fn transform(&self) -> ViewpointTransform {
        self.transform
    }

    /// Accumulated orientation displacement from the default position
    pub fn orientation_offset(&self) -> Vector3<f64> {
        self.orientation_offset
    }

    /// Recenter: default position and look-at, accumulation cleared
    pub fn reset_to_default(&mut self) -> ViewpointTransform {
        self.transform = ViewpointTransform::new(self.default_position, self.default_look_at);
        self.orientation_offset = Vector3::zeros();
        self.head_anchor = Vector3::zeros();
        self.anchor_pending = false;
        self.transform
    }

    /// Continue from wherever the camera is now.
    ///
    /// Orientation accumulation restarts at the current position. The next
    /// head update anchors its target there and the anchor is then released
    /// gradually, so head tracking drifts back to the absolute mapping.
    pub fn rebase(&mut self) {
        self.orientation_offset = self.transform.position - self.default_position;
        self.anchor_pending = true;
    }

    /// World ray through a screen pixel of the configured viewport.
    ///
    /// Returns `None` for points outside the viewport or a degenerate camera.
    pub fn screen_ray(&self, screen_x: f64, screen_y: f64) -> Option<Ray> {
        let (w, h) = (f64::from(self.viewport.0), f64::from(self.viewport.1));
        if !(0.0..=w).contains(&screen_x) || !(0.0..=h).contains(&screen_y) {
            return None;
        }

        let forward = (self.transform.look_at - self.transform.position).try_normalize(1e-12)?;
        let right = forward
            .cross(&Vector3::y())
            .try_normalize(1e-12)
            .unwrap_or_else(Vector3::x);
        let up = right.cross(&forward);

        let ndc_x = 2.0 * screen_x / w - 1.0;
        let ndc_y = 1.0 - 2.0 * screen_y / h;
        let tan_half = (self.fov_y / 2.0).tan();
        let aspect = w / h;

        let direction = forward + right * (ndc_x * tan_half * aspect) + up * (ndc_y * tan_half);
        Ray::new(self.transform.position, direction)
    }

    /// Find the scene object under a screen point.
    ///
    /// Best effort: the unprojection ignores the renderer's actual projection
    /// and is known to be imprecise, so dragging objects along with the pointer
    /// is not reliable. `None` is a normal outcome.
    pub fn pick_object_at(&self, screen_x: f64, screen_y: f64, scene: &dyn Scene) -> Option<PickHit> {
        let ray = self.screen_ray(screen_x, screen_y)?;
        scene.pick(&ray)
    }

    /// Flip the debug visualisation flag; the transform is unaffected
    pub fn toggle_show_tracking_overlay(&mut self) -> bool {
        self.show_tracking_overlay = !self.show_tracking_overlay;
        self.show_tracking_overlay
    }

    pub fn show_tracking_overlay(&self) -> bool {
        self.show_tracking_overlay
    }
}
