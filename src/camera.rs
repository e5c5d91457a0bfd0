use bitflags::bitflags;
use glam::{Mat4, Vec3};

use crate::config::CameraConfig;

// ======================================
// === PERSPECTIVE CAMERA ===
// ======================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerspectiveCamera {
    pub fov_y_degrees: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub position: Vec3,
    pub target: Vec3,
    proj_matrix: Mat4,
}

impl PerspectiveCamera {
    pub fn new(config: &CameraConfig, aspect: f32) -> Self {
        let mut camera = Self {
            fov_y_degrees: config.fov_y_degrees,
            aspect,
            near: config.near,
            far: config.far,
            position: config.position,
            target: config.target,
            proj_matrix: Mat4::IDENTITY,
        };
        camera.update_projection();
        camera
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        self.aspect = aspect;
        self.update_projection();
    }

    /// Call after touching `fov_y_degrees`, `near` or `far` directly.
    pub fn update_projection(&mut self) {
        self.proj_matrix = Mat4::perspective_rh(self.fov_y_degrees.to_radians(), self.aspect, self.near, self.far);
    }

    pub fn projection(&self) -> Mat4 {
        self.proj_matrix
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, Vec3::Y)
    }

    pub fn view_proj(&self) -> Mat4 {
        self.proj_matrix * self.view()
    }
}

// ======================================
// === ORBIT CONTROLS ===
// ======================================

bitflags! {
    /// Buttons currently held. Only `PRIMARY` rotates; the others are tracked
    /// so the drag anchor is kept until every button is released.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct PointerButtons: u8 {
        const PRIMARY = 1 << 0;
        const SECONDARY = 1 << 1;
        const MIDDLE = 1 << 2;
    }
}

const POLAR_EPSILON: f32 = 1e-6;
const MOVE_EPSILON_SQ: f32 = 1e-6;
const DOLLY_SCALE: f32 = 0.95;

/// Orbits the camera around a target on a sphere. Pointer drags and wheel
/// notches accumulate deltas; `update` applies them once per frame, easing
/// them out when damping is enabled.
#[derive(Debug, Clone)]
pub struct OrbitControls {
    pub target: Vec3,
    pub enable_damping: bool,
    pub damping_factor: f32,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    delta_theta: f32,
    delta_phi: f32,
    scale: f32,
    buttons: PointerButtons,
    last_pointer: Option<(f32, f32)>,
}

impl OrbitControls {
    pub fn new(target: Vec3, damping_factor: f32) -> Self {
        Self {
            target,
            enable_damping: true,
            damping_factor,
            rotate_speed: 1.0,
            zoom_speed: 1.0,
            min_distance: 0.0,
            max_distance: f32::INFINITY,
            delta_theta: 0.0,
            delta_phi: 0.0,
            scale: 1.0,
            buttons: PointerButtons::empty(),
            last_pointer: None,
        }
    }

    pub fn pointer_down(&mut self, button: PointerButtons) {
        self.buttons.insert(button);
    }

    pub fn pointer_up(&mut self, button: PointerButtons) {
        self.buttons.remove(button);
        if self.buttons.is_empty() {
            self.last_pointer = None;
        }
    }

    /// Pointer position in pixels. `viewport_height` must use the same units.
    pub fn pointer_moved(&mut self, x: f32, y: f32, viewport_height: f32) {
        let previous = self.last_pointer.replace((x, y));
        if !self.buttons.contains(PointerButtons::PRIMARY) || viewport_height <= 0.0 {
            return;
        }
        if let Some((px, py)) = previous {
            let full_turn = std::f32::consts::TAU * self.rotate_speed / viewport_height;
            self.rotate_left((x - px) * full_turn);
            self.rotate_up((y - py) * full_turn);
        }
    }

    /// Negative deltas (wheel pushed away) move the camera closer.
    pub fn wheel(&mut self, delta_y: f32) {
        let dolly = DOLLY_SCALE.powf(self.zoom_speed);
        if delta_y < 0.0 {
            self.scale *= dolly;
        } else if delta_y > 0.0 {
            self.scale /= dolly;
        }
    }

    pub fn rotate_left(&mut self, angle: f32) {
        self.delta_theta -= angle;
    }

    pub fn rotate_up(&mut self, angle: f32) {
        self.delta_phi -= angle;
    }

    /// Applies pending deltas to `camera`. Returns true when the camera moved.
    pub fn update(&mut self, camera: &mut PerspectiveCamera) -> bool {
        let offset = camera.position - self.target;
        let radius = offset.length();

        let mut theta = offset.x.atan2(offset.z);
        let mut phi = if radius > 0.0 {
            (offset.y / radius).clamp(-1.0, 1.0).acos()
        } else {
            std::f32::consts::FRAC_PI_2
        };

        if self.enable_damping {
            theta += self.delta_theta * self.damping_factor;
            phi += self.delta_phi * self.damping_factor;
        } else {
            theta += self.delta_theta;
            phi += self.delta_phi;
        }

        phi = phi.clamp(POLAR_EPSILON, std::f32::consts::PI - POLAR_EPSILON);
        let radius = (radius * self.scale).clamp(self.min_distance, self.max_distance);

        let (sin_phi, cos_phi) = phi.sin_cos();
        let (sin_theta, cos_theta) = theta.sin_cos();
        let new_offset = Vec3::new(radius * sin_phi * sin_theta, radius * cos_phi, radius * sin_phi * cos_theta);

        let previous_position = camera.position;
        camera.position = self.target + new_offset;
        camera.target = self.target;

        if self.enable_damping {
            self.delta_theta *= 1.0 - self.damping_factor;
            self.delta_phi *= 1.0 - self.damping_factor;
        } else {
            self.delta_theta = 0.0;
            self.delta_phi = 0.0;
        }
        self.scale = 1.0;

        (camera.position - previous_position).length_squared() > MOVE_EPSILON_SQ
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera() -> PerspectiveCamera {
        PerspectiveCamera::new(&CameraConfig::default(), 16.0 / 9.0)
    }

    #[test]
    fn aspect_updates_projection() {
        let mut camera = camera();
        let before = camera.projection();
        camera.set_aspect(1.0);
        assert_eq!(camera.aspect, 1.0);
        assert_ne!(before, camera.projection());
        assert_eq!(
            camera.projection(),
            Mat4::perspective_rh(75f32.to_radians(), 1.0, 0.1, 100.0)
        );
    }

    #[test]
    fn idle_update_keeps_camera_still() {
        let mut camera = camera();
        let mut controls = OrbitControls::new(Vec3::ZERO, 0.05);
        let start = camera.position;
        assert!(!controls.update(&mut camera));
        assert!((camera.position - start).length() < 1e-5);
    }

    #[test]
    fn drag_rotates_and_damping_settles() {
        let mut camera = camera();
        let mut controls = OrbitControls::new(Vec3::ZERO, 0.05);
        let radius = camera.position.length();

        controls.pointer_down(PointerButtons::PRIMARY);
        controls.pointer_moved(100.0, 100.0, 720.0);
        controls.pointer_moved(160.0, 100.0, 720.0);
        controls.pointer_up(PointerButtons::PRIMARY);

        assert!(controls.update(&mut camera));
        for _ in 0..600 {
            controls.update(&mut camera);
        }
        assert!(!controls.update(&mut camera));
        assert!((camera.position.length() - radius).abs() < 1e-4);
    }

    #[test]
    fn drag_without_button_is_ignored() {
        let mut camera = camera();
        let mut controls = OrbitControls::new(Vec3::ZERO, 0.05);
        controls.pointer_moved(0.0, 0.0, 720.0);
        controls.pointer_moved(300.0, 0.0, 720.0);
        assert!(!controls.update(&mut camera));
    }

    #[test]
    fn secondary_drag_does_not_rotate() {
        let mut camera = camera();
        let mut controls = OrbitControls::new(Vec3::ZERO, 0.05);
        controls.pointer_down(PointerButtons::SECONDARY | PointerButtons::MIDDLE);
        controls.pointer_moved(0.0, 0.0, 720.0);
        controls.pointer_moved(300.0, 50.0, 720.0);
        assert!(!controls.update(&mut camera));
    }

    #[test]
    fn releasing_another_button_keeps_the_primary_drag() {
        let mut controls = OrbitControls::new(Vec3::ZERO, 0.05);
        controls.pointer_down(PointerButtons::PRIMARY);
        controls.pointer_down(PointerButtons::SECONDARY);
        controls.pointer_moved(100.0, 100.0, 720.0);

        controls.pointer_up(PointerButtons::SECONDARY);
        assert_eq!(controls.last_pointer, Some((100.0, 100.0)));
        controls.pointer_moved(160.0, 100.0, 720.0);
        assert!(controls.delta_theta != 0.0);

        controls.pointer_up(PointerButtons::PRIMARY);
        assert_eq!(controls.buttons, PointerButtons::empty());
        assert_eq!(controls.last_pointer, None);
    }

    #[test]
    fn polar_angle_stays_off_the_pole() {
        let mut camera = camera();
        let mut controls = OrbitControls::new(Vec3::ZERO, 0.05);
        controls.enable_damping = false;
        controls.rotate_up(10.0);
        controls.update(&mut camera);
        assert!(camera.position.normalize().y > 0.99);
        assert!(camera.view().is_finite());
    }

    #[test]
    fn wheel_dollies_within_limits() {
        let mut camera = camera();
        let mut controls = OrbitControls::new(Vec3::ZERO, 0.05);
        controls.min_distance = 1.0;
        let radius = camera.position.length();

        controls.wheel(-1.0);
        controls.update(&mut camera);
        assert!((camera.position.length() - (radius * 0.95).max(1.0)).abs() < 1e-5);

        for _ in 0..100 {
            controls.wheel(-1.0);
            controls.update(&mut camera);
        }
        assert!((camera.position.length() - 1.0).abs() < 1e-5);
    }
}
