use glam::{Mat3, Mat4, Vec3};
use serde::{Deserialize, Serialize};

pub const DEFAULT_YAW: f32 = -90.0;
pub const DEFAULT_PITCH: f32 = 0.0;
pub const DEFAULT_SPEED: f32 = 2.5;
pub const DEFAULT_SENSITIVITY: f32 = 0.1;
pub const DEFAULT_ZOOM: f32 = 45.0;

pub const PITCH_LIMIT: f32 = 89.0;
pub const MIN_ZOOM: f32 = 1.0;
pub const MAX_ZOOM: f32 = 45.0;

pub const NEAR_PLANE: f32 = 0.1;
pub const FAR_PLANE: f32 = 100.0;

/// Direction of a keyboard-driven camera translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CameraMovement {
    Forward,
    Backward,
    Left,
    Right,
}

/// Orthonormal, right-handed camera basis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Basis {
    pub front: Vec3,
    pub right: Vec3,
    pub up: Vec3,
}

/// Derives the camera basis from yaw/pitch angles given in degrees.
pub fn orientation_from_yaw_pitch(yaw: f32, pitch: f32, world_up: Vec3) -> Basis {
    let (yaw_sin, yaw_cos) = yaw.to_radians().sin_cos();
    let (pitch_sin, pitch_cos) = pitch.to_radians().sin_cos();
    let front = Vec3::new(yaw_cos * pitch_cos, pitch_sin, yaw_sin * pitch_cos).normalize();
    let right = front.cross(world_up).normalize();
    let up = right.cross(front).normalize();
    Basis { front, right, up }
}

/// Free-look camera driven by keyboard translation and mouse yaw/pitch.
///
/// The `front`, `right` and `up` vectors are never written directly; every
/// orientation change goes through [`orientation_from_yaw_pitch`]. The
/// basis is not part of the serialized form and is rebuilt on deserialize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "CameraRepr", into = "CameraRepr")]
pub struct Camera {
    position: Vec3,
    world_up: Vec3,
    yaw: f32,
    pitch: f32,
    zoom: f32,
    movement_speed: f32,
    basis: Basis,
}

#[derive(Serialize, Deserialize)]
struct CameraRepr {
    position: Vec3,
    world_up: Vec3,
    yaw: f32,
    pitch: f32,
    zoom: f32,
    movement_speed: f32,
}

impl From<CameraRepr> for Camera {
    fn from(repr: CameraRepr) -> Self {
        let mut camera = Self::with_orientation(repr.position, repr.world_up, repr.yaw, repr.pitch);
        camera.zoom = repr.zoom.clamp(MIN_ZOOM, MAX_ZOOM);
        camera.movement_speed = repr.movement_speed;
        camera
    }
}

impl From<Camera> for CameraRepr {
    fn from(camera: Camera) -> Self {
        Self {
            position: camera.position,
            world_up: camera.world_up,
            yaw: camera.yaw,
            pitch: camera.pitch,
            zoom: camera.zoom,
            movement_speed: camera.movement_speed,
        }
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(Vec3::ZERO)
    }
}

impl Camera {
    /// Creates a camera at `position` looking down -Z.
    pub fn new(position: Vec3) -> Self {
        Self::with_orientation(position, Vec3::Y, DEFAULT_YAW, DEFAULT_PITCH)
    }

    pub fn with_orientation(position: Vec3, world_up: Vec3, yaw: f32, pitch: f32) -> Self {
        let world_up = world_up.normalize();
        let pitch = pitch.clamp(-PITCH_LIMIT, PITCH_LIMIT);
        Self {
            position,
            world_up,
            yaw,
            pitch,
            zoom: DEFAULT_ZOOM,
            movement_speed: DEFAULT_SPEED,
            basis: orientation_from_yaw_pitch(yaw, pitch, world_up),
        }
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    pub fn front(&self) -> Vec3 {
        self.basis.front
    }

    pub fn right(&self) -> Vec3 {
        self.basis.right
    }

    pub fn up(&self) -> Vec3 {
        self.basis.up
    }

    pub fn basis(&self) -> Basis {
        self.basis
    }

    pub fn world_up(&self) -> Vec3 {
        self.world_up
    }

    /// Yaw in degrees. Unbounded; only its sine and cosine matter.
    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    /// Pitch in degrees, always within `[-89, 89]`.
    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    /// Vertical field of view in degrees, always within `[1, 45]`.
    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn movement_speed(&self) -> f32 {
        self.movement_speed
    }

    pub fn set_movement_speed(&mut self, speed: f32) {
        self.movement_speed = speed;
    }

    /// Translates along `front` or `right` by `speed * dt`.
    pub fn process_keyboard(&mut self, direction: CameraMovement, dt: f32) {
        let velocity = self.movement_speed * dt;
        let offset = match direction {
            CameraMovement::Forward => self.basis.front,
            CameraMovement::Backward => -self.basis.front,
            CameraMovement::Left => -self.basis.right,
            CameraMovement::Right => self.basis.right,
        };
        self.position += offset * velocity;
    }

    /// Applies a look delta in degrees. Positive `dy` pitches the view up.
    pub fn process_mouse_movement(&mut self, dx: f32, dy: f32) {
        self.yaw += dx;
        self.pitch = (self.pitch + dy).clamp(-PITCH_LIMIT, PITCH_LIMIT);
        self.update_basis();
    }

    /// Narrows (positive `dy`) or widens the field of view.
    pub fn process_mouse_scroll(&mut self, dy: f32) {
        self.zoom = (self.zoom - dy).clamp(MIN_ZOOM, MAX_ZOOM);
    }

    /// Points the camera along `front`, recovering yaw and pitch from it.
    ///
    /// Zero-length or non-finite vectors leave the orientation unchanged and
    /// return `false`.
    pub fn look_along(&mut self, front: Vec3) -> bool {
        let Some(direction) = front.try_normalize() else {
            return false;
        };
        self.yaw = direction.z.atan2(direction.x).to_degrees();
        self.pitch = direction
            .y
            .clamp(-1.0, 1.0)
            .asin()
            .to_degrees()
            .clamp(-PITCH_LIMIT, PITCH_LIMIT);
        self.update_basis();
        true
    }

    /// Look-at transform for `(position, position + front, up)`.
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.basis.front, self.basis.up)
    }

    /// View matrix with the translation stripped, used for the skybox.
    pub fn rotation_only_view(&self) -> Mat4 {
        Mat4::from_mat3(Mat3::from_mat4(self.view_matrix()))
    }

    /// Perspective projection from the current zoom.
    pub fn projection(&self, aspect_ratio: f32) -> Mat4 {
        Mat4::perspective_rh(
            self.zoom.to_radians(),
            aspect_ratio.max(0.01),
            NEAR_PLANE,
            FAR_PLANE,
        )
    }

    fn update_basis(&mut self) {
        self.basis = orientation_from_yaw_pitch(self.yaw, self.pitch, self.world_up);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const EPS: f32 = 1e-4;

    #[test]
    fn deserialized_basis_follows_yaw_and_pitch() {
        let camera = Camera::new(Vec3::new(0.0, 0.0, 3.0));
        let mut value = serde_json::to_value(&camera).unwrap();
        assert!(value.get("basis").is_none());
        value["yaw"] = serde_json::json!(0.0);
        value["pitch"] = serde_json::json!(120.0);

        let restored: Camera = serde_json::from_value(value).unwrap();
        assert_eq!(restored.pitch(), PITCH_LIMIT);
        assert_eq!(restored.basis(), orientation_from_yaw_pitch(0.0, PITCH_LIMIT, Vec3::Y));
        assert_eq!(restored.position(), camera.position());
    }

    fn assert_orthonormal(basis: Basis) {
        assert!((basis.front.length() - 1.0).abs() < EPS);
        assert!((basis.right.length() - 1.0).abs() < EPS);
        assert!((basis.up.length() - 1.0).abs() < EPS);
        assert!(basis.front.dot(basis.right).abs() < EPS);
        assert!(basis.front.dot(basis.up).abs() < EPS);
        assert!(basis.right.dot(basis.up).abs() < EPS);
        // right-handed: right x up points backwards
        assert!((basis.right.cross(basis.up) + basis.front).length() < EPS);
    }

    #[test]
    fn default_camera_looks_down_negative_z() {
        let camera = Camera::new(Vec3::new(0.0, 0.0, 3.0));
        assert!((camera.front() - Vec3::NEG_Z).length() < EPS);
        assert!((camera.right() - Vec3::X).length() < EPS);
        assert!((camera.up() - Vec3::Y).length() < EPS);
        assert_eq!(camera.zoom(), 45.0);
    }

    #[test]
    fn pitch_clamps_at_upper_limit() {
        let mut camera = Camera::with_orientation(Vec3::ZERO, Vec3::Y, 0.0, 0.0);
        assert!((camera.front() - Vec3::X).length() < EPS);
        camera.process_mouse_movement(0.0, 100.0);
        assert_eq!(camera.pitch(), 89.0);
        let expected = Vec3::new(89f32.to_radians().cos(), 89f32.to_radians().sin(), 0.0);
        assert!((camera.front() - expected).length() < EPS);
        assert_orthonormal(camera.basis());
    }

    #[test]
    fn zoom_stays_at_maximum() {
        let mut camera = Camera::default();
        camera.process_mouse_scroll(-5.0);
        assert_eq!(camera.zoom(), 45.0);
        camera.process_mouse_scroll(5.0);
        assert_eq!(camera.zoom(), 40.0);
        camera.process_mouse_scroll(100.0);
        assert_eq!(camera.zoom(), 1.0);
    }

    #[test]
    fn keyboard_moves_along_basis() {
        let mut camera = Camera::new(Vec3::ZERO);
        camera.process_keyboard(CameraMovement::Forward, 2.0);
        assert!((camera.position() - Vec3::new(0.0, 0.0, -5.0)).length() < EPS);
        camera.process_keyboard(CameraMovement::Right, 0.4);
        assert!((camera.position() - Vec3::new(1.0, 0.0, -5.0)).length() < EPS);
        camera.process_keyboard(CameraMovement::Backward, 2.0);
        camera.process_keyboard(CameraMovement::Left, 0.4);
        assert!(camera.position().length() < EPS);
    }

    #[test]
    fn yaw_is_not_wrapped() {
        let mut camera = Camera::with_orientation(Vec3::ZERO, Vec3::Y, 0.0, 0.0);
        camera.process_mouse_movement(720.0, 0.0);
        assert_eq!(camera.yaw(), 720.0);
        assert!((camera.front() - Vec3::X).length() < EPS);
    }

    #[test]
    fn look_along_recovers_orientation() {
        let source = Camera::with_orientation(Vec3::ZERO, Vec3::Y, 33.0, -20.0);
        let mut target = Camera::default();
        assert!(target.look_along(source.front()));
        assert!((target.front() - source.front()).length() < EPS);
        assert!((target.pitch() + 20.0).abs() < 1e-3);
        assert!(!target.look_along(Vec3::ZERO));
        assert!((target.front() - source.front()).length() < EPS);
    }

    #[test]
    fn view_matrix_maps_target_onto_negative_z() {
        let camera = Camera::with_orientation(Vec3::new(1.0, 2.0, 3.0), Vec3::Y, 10.0, 5.0);
        let ahead = camera.view_matrix().transform_point3(camera.position() + camera.front());
        assert!((ahead - Vec3::NEG_Z).length() < EPS);
    }

    #[test]
    fn rotation_only_view_ignores_position() {
        let mut camera = Camera::with_orientation(Vec3::new(5.0, -3.0, 8.0), Vec3::Y, 15.0, 30.0);
        let near = camera.rotation_only_view();
        camera.set_position(Vec3::new(-40.0, 12.0, 1.0));
        assert!(camera.rotation_only_view().abs_diff_eq(near, EPS));
        assert_eq!(near.w_axis, glam::Vec4::W);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(128))]

        #[test]
        fn pitch_stays_clamped(deltas in proptest::collection::vec((-500.0f32..500.0, -500.0f32..500.0), 0..64)) {
            let mut camera = Camera::default();
            for (dx, dy) in deltas {
                camera.process_mouse_movement(dx, dy);
                prop_assert!((-89.0..=89.0).contains(&camera.pitch()));
            }
        }

        #[test]
        fn zoom_stays_clamped(deltas in proptest::collection::vec(-100.0f32..100.0, 0..64)) {
            let mut camera = Camera::default();
            for dy in deltas {
                camera.process_mouse_scroll(dy);
                prop_assert!((1.0..=45.0).contains(&camera.zoom()));
            }
        }

        #[test]
        fn basis_is_orthonormal(yaw in -3600.0f32..3600.0, pitch in -89.0f32..=89.0) {
            assert_orthonormal(orientation_from_yaw_pitch(yaw, pitch, Vec3::Y));
        }
    }
}
