//! Renderer boundary.
//!
//! The tracking core treats the 3D scene as an opaque camera sink that can
//! also answer pick queries. Scene layouts are interchangeable
//! implementations chosen at construction.

use crate::camera_pose::ViewpointTransform;
use nalgebra::{Point3, Unit, Vector3};

/// World-space ray used for picking
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Point3<f64>,
    pub direction: Unit<Vector3<f64>>,
}

impl Ray {
    pub fn new(origin: Point3<f64>, direction: Vector3<f64>) -> Option<Self> {
        Unit::try_new(direction, 1e-12).map(|direction| Self { origin, direction })
    }

    pub fn at(&self, distance: f64) -> Point3<f64> {
        self.origin + self.direction.into_inner() * distance
    }
}

pub type ObjectId = usize;

/// Result of a successful pick
#[derive(Debug, Clone, PartialEq)]
pub struct PickHit {
    pub id: ObjectId,
    pub name: String,
    /// Distance along the ray to the entry point
    pub distance: f64,
}

/// 3D scene the virtual window looks into
pub trait Scene: Send {
    fn name(&self) -> &str;

    /// Camera as last applied
    fn current_camera(&self) -> ViewpointTransform;

    fn set_position(&mut self, position: Point3<f64>);

    fn set_look_at(&mut self, target: Point3<f64>);

    /// Show or hide the debug tracking visualisation
    fn set_tracking_overlay(&mut self, visible: bool);

    /// Nearest object hit by the ray
    fn pick(&self, ray: &Ray) -> Option<PickHit>;

    /// Mark an object as selected for dragging
    fn select(&mut self, id: ObjectId);

    fn selected(&self) -> Option<ObjectId>;

    fn stop_moving_selected(&mut self);
}

/// Axis-aligned box in scene coordinates
#[derive(Debug, Clone, PartialEq)]
pub struct SceneObject {
    pub name: String,
    pub min: Point3<f64>,
    pub max: Point3<f64>,
}

impl SceneObject {
    pub fn new(name: &str, min: [f64; 3], max: [f64; 3]) -> Self {
        Self {
            name: name.to_string(),
            min: Point3::from(min),
            max: Point3::from(max),
        }
    }

    /// Slab test; returns the entry distance if the ray hits the box
    pub fn intersect(&self, ray: &Ray) -> Option<f64> {
        let mut t_min = 0.0_f64;
        let mut t_max = f64::INFINITY;

        for axis in 0..3 {
            let origin = ray.origin[axis];
            let dir = ray.direction[axis];
            if dir.abs() < 1e-12 {
                if origin < self.min[axis] || origin > self.max[axis] {
                    return None;
                }
                continue;
            }

            let inv = 1.0 / dir;
            let mut t0 = (self.min[axis] - origin) * inv;
            let mut t1 = (self.max[axis] - origin) * inv;
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
            }
            t_min = t_min.max(t0);
            t_max = t_max.min(t1);
            if t_max < t_min {
                return None;
            }
        }

        Some(t_min)
    }
}

/// Scene made of axis-aligned boxes
#[derive(Debug, Clone)]
pub struct BoxScene {
    name: String,
    objects: Vec<SceneObject>,
    camera: ViewpointTransform,
    overlay: bool,
    selected: Option<ObjectId>,
}

impl BoxScene {
    pub fn new(name: &str, objects: Vec<SceneObject>) -> Self {
        Self {
            name: name.to_string(),
            objects,
            camera: ViewpointTransform::default(),
            overlay: false,
            selected: None,
        }
    }

    /// Room seen through the screen: walls behind the display plane and a few cubes
    pub fn cube_room() -> Self {
        Self::new(
            "cube_room",
            vec![
                SceneObject::new("back_wall", [-6.0, -4.0, -10.5], [6.0, 6.0, -10.0]),
                SceneObject::new("floor", [-6.0, -4.5, -10.0], [6.0, -4.0, 0.0]),
                SceneObject::new("left_wall", [-6.5, -4.0, -10.0], [-6.0, 6.0, 0.0]),
                SceneObject::new("right_wall", [6.0, -4.0, -10.0], [6.5, 6.0, 0.0]),
                SceneObject::new("cube_near", [-1.0, -4.0, -3.0], [1.0, -2.0, -1.0]),
                SceneObject::new("cube_far", [2.0, -4.0, -8.0], [4.0, -2.0, -6.0]),
                SceneObject::new("cube_floating", [-4.0, 0.0, -6.0], [-2.5, 1.5, -4.5]),
            ],
        )
    }

    /// Layered flat panels at increasing depth
    pub fn floating_planes() -> Self {
        Self::new(
            "floating_planes",
            vec![
                SceneObject::new("plane_front", [-2.0, -1.5, -2.05], [2.0, 1.5, -1.95]),
                SceneObject::new("plane_middle", [-3.0, -2.0, -5.05], [0.5, 2.5, -4.95]),
                SceneObject::new("plane_back", [-5.0, -3.0, -9.05], [5.0, 4.0, -8.95]),
            ],
        )
    }

    pub fn objects(&self) -> &[SceneObject] {
        &self.objects
    }

    pub fn overlay_visible(&self) -> bool {
        self.overlay
    }
}

impl Scene for BoxScene {
    fn name(&self) -> &str {
        &self.name
    }

    fn current_camera(&self) -> ViewpointTransform {
        self.camera
    }

    fn set_position(&mut self, position: Point3<f64>) {
        self.camera.position = position;
    }

    fn set_look_at(&mut self, target: Point3<f64>) {
        self.camera.look_at = target;
    }

    fn set_tracking_overlay(&mut self, visible: bool) {
        self.overlay = visible;
    }

    fn pick(&self, ray: &Ray) -> Option<PickHit> {
        self.objects
            .iter()
            .enumerate()
            .filter_map(|(id, object)| object.intersect(ray).map(|distance| (id, object, distance)))
            .min_by(|a, b| a.2.partial_cmp(&b.2).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(id, object, distance)| PickHit {
                id,
                name: object.name.clone(),
                distance,
            })
    }

    fn select(&mut self, id: ObjectId) {
        if id < self.objects.len() {
            self.selected = Some(id);
        }
    }

    fn selected(&self) -> Option<ObjectId> {
        self.selected
    }

    fn stop_moving_selected(&mut self) {
        self.selected = None;
    }
}

/// Build a scene layout by name
pub fn by_name(name: &str) -> Option<Box<dyn Scene>> {
    match name.to_lowercase().as_str() {
        "cube_room" | "cuberoom" => Some(Box::new(BoxScene::cube_room())),
        "floating_planes" | "planes" => Some(Box::new(BoxScene::floating_planes())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ray_hits_box() {
        let object = SceneObject::new("cube", [-1.0, -1.0, -1.0], [1.0, 1.0, 1.0]);
        let ray = Ray::new(Point3::new(0.0, 0.0, 10.0), Vector3::new(0.0, 0.0, -1.0)).unwrap();
        let distance = object.intersect(&ray).unwrap();
        assert!((distance - 9.0).abs() < 1e-12);
    }

    #[test]
    fn test_ray_misses_box() {
        let object = SceneObject::new("cube", [-1.0, -1.0, -1.0], [1.0, 1.0, 1.0]);
        let ray = Ray::new(Point3::new(5.0, 0.0, 10.0), Vector3::new(0.0, 0.0, -1.0)).unwrap();
        assert!(object.intersect(&ray).is_none());

        // Box behind the origin
        let away = Ray::new(Point3::new(0.0, 0.0, 10.0), Vector3::new(0.0, 0.0, 1.0)).unwrap();
        assert!(object.intersect(&away).is_none());
    }

    #[test]
    fn test_pick_returns_nearest() {
        let scene = BoxScene::floating_planes();
        let ray = Ray::new(Point3::new(0.0, 0.0, 10.0), Vector3::new(0.0, 0.0, -1.0)).unwrap();
        let hit = scene.pick(&ray).unwrap();
        assert_eq!(hit.name, "plane_front");
    }

    #[test]
    fn test_selection() {
        let mut scene = BoxScene::cube_room();
        scene.select(4);
        assert_eq!(scene.selected(), Some(4));
        scene.select(999);
        assert_eq!(scene.selected(), Some(4));
        scene.stop_moving_selected();
        assert_eq!(scene.selected(), None);
    }

    #[test]
    fn test_by_name() {
        assert_eq!(by_name("cube_room").unwrap().name(), "cube_room");
        assert_eq!(by_name("planes").unwrap().name(), "floating_planes");
        assert!(by_name("unknown").is_none());
    }

    #[test]
    fn test_zero_direction_rejected() {
        assert!(Ray::new(Point3::origin(), Vector3::zeros()).is_none());
    }
}
