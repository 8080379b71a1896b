use ash::vk;
use glam::{Mat4, Vec3};

/// Looks at a pivot from a fixed direction; zooming moves it along the view
/// axis
pub struct Camera {
    position: Vec3,
    forward: Vec3,
    up: Vec3,
    right: Vec3,
    world_up: Vec3,
    fov_y_deg: f32,
    near: f32,
    far: f32,
    pivot: Vec3,
    zoom: f32,
}

impl Camera {
    const DEFAULT_FOV_Y_DEG: f32 = 45.0;
    const DEFAULT_DISTANCE: f32 = 2.0;
    const MIN_DISTANCE: f32 = 0.5;
    const MAX_DISTANCE: f32 = 20.0;

    pub fn new() -> Self {
        let mut camera = Self {
            position: Vec3::new(0.0, 0.0, Self::DEFAULT_DISTANCE),
            forward: Vec3::NEG_Z,
            up: Vec3::Y,
            right: Vec3::X,
            world_up: Vec3::Y,
            fov_y_deg: Self::DEFAULT_FOV_Y_DEG,
            near: 0.1,
            far: 100.0,
            pivot: Vec3::ZERO,
            zoom: 0.0,
        };
        camera.look_at(Vec3::ZERO);
        camera
    }

    pub fn look_at(&mut self, target: Vec3) {
        if target == self.position {
            return;
        }
        self.pivot = target;
        self.forward = (target - self.position).normalize();
        self.right = self.forward.cross(self.world_up).normalize();
        self.up = self.right.cross(self.forward).normalize();
    }

    /// Positive values move closer to the pivot
    pub fn zoom(&mut self, delta: f32) {
        let distance = (Self::DEFAULT_DISTANCE - (self.zoom + delta))
            .clamp(Self::MIN_DISTANCE, Self::MAX_DISTANCE);
        self.zoom = Self::DEFAULT_DISTANCE - distance;
        self.position = self.pivot - self.forward * distance;
    }

    pub fn distance(&self) -> f32 {
        self.position.distance(self.pivot)
    }

    pub fn view_mat(&self) -> Mat4 {
        Mat4::look_to_rh(self.position, self.forward, self.up)
    }

    /// Right-handed perspective with depth in [0, 1] and Y pointing down in
    /// clip space, as Vulkan expects
    pub fn proj_mat(&self, extent: vk::Extent2D) -> Mat4 {
        let aspect_ratio = extent.width.max(1) as f32 / extent.height.max(1) as f32;
        let mut proj = Mat4::perspective_rh(
            self.fov_y_deg.to_radians(),
            aspect_ratio,
            self.near,
            self.far,
        );
        proj.y_axis.y *= -1.0;
        proj
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zoom_moves_towards_the_pivot_within_limits() {
        let mut camera = Camera::new();
        assert!((camera.distance() - 2.0).abs() < 1e-6);

        camera.zoom(0.5);
        assert!((camera.distance() - 1.5).abs() < 1e-6);

        camera.zoom(100.0);
        assert!((camera.distance() - Camera::MIN_DISTANCE).abs() < 1e-6);

        camera.zoom(-100.0);
        assert!((camera.distance() - Camera::MAX_DISTANCE).abs() < 1e-4);
    }

    #[test]
    fn projection_flips_y_for_vulkan() {
        let camera = Camera::new();
        let extent = vk::Extent2D {
            width: 800,
            height: 600,
        };

        let clip = camera.proj_mat(extent) * camera.view_mat() * Vec3::new(0.0, 0.5, 0.0).extend(1.0);
        assert!(clip.y / clip.w < 0.0, "points above the pivot land in the top half");
        assert!((0.0..=1.0).contains(&(clip.z / clip.w)));
    }

    #[test]
    fn zero_sized_extent_does_not_divide_by_zero() {
        let proj = Camera::new().proj_mat(vk::Extent2D { width: 0, height: 0 });
        assert!(proj.is_finite());
    }
}
