use cgmath::{Deg, Matrix4, Point3};

use crate::constants::{CAMERA_START_DISTANCE, CAMERA_START_PITCH};
use crate::player::input::InputState;
use crate::scene::Entity;

/// Third-person camera orbiting the player entity. Scroll zooms; dragging
/// with the left button changes pitch and the angle around the player.
pub struct Camera {
    pub position: Point3<f32>,
    pub pitch: f32,
    pub yaw: f32,
    distance_from_player: f32,
    angle_around_player: f32,
}

impl Camera {
    pub fn new() -> Self {
        Camera {
            position: Point3::new(410.0, 10.0, 410.0),
            pitch: CAMERA_START_PITCH,
            yaw: 0.0,
            distance_from_player: CAMERA_START_DISTANCE,
            angle_around_player: 0.0,
        }
    }

    pub fn update(&mut self, player: &Entity, input: &mut InputState) {
        let (dx, dy, wheel) = input.take_mouse_deltas();
        self.distance_from_player = (self.distance_from_player - wheel * 0.1).max(5.0);
        if input.orbiting {
            self.pitch = (self.pitch - dy * 0.1).clamp(-89.0, 89.0);
            self.angle_around_player -= dx * 0.3;
        }

        let horizontal = self.distance_from_player * self.pitch.to_radians().cos();
        let vertical = self.distance_from_player * self.pitch.to_radians().sin();

        let theta = (player.rotation_y + self.angle_around_player).to_radians();
        self.position.x = player.position.x - horizontal * theta.sin();
        self.position.z = player.position.z - horizontal * theta.cos();
        self.position.y = player.position.y + vertical;

        self.yaw = 180.0 - (player.rotation_y + self.angle_around_player);
    }

    pub fn view_matrix(&self) -> Matrix4<f32> {
        Matrix4::from_angle_x(Deg(self.pitch))
            * Matrix4::from_angle_y(Deg(self.yaw))
            * Matrix4::from_translation(cgmath::Vector3::new(
                -self.position.x,
                -self.position.y,
                -self.position.z,
            ))
    }

    /// View matrix with the translation removed, for skybox rendering.
    pub fn sky_view_matrix(&self) -> Matrix4<f32> {
        Matrix4::from_angle_x(Deg(self.pitch)) * Matrix4::from_angle_y(Deg(self.yaw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::Vector3;

    fn player_at(x: f32, y: f32, z: f32, rotation_y: f32) -> Entity {
        Entity::new(0, Vector3::new(x, y, z), 0.0, rotation_y, 0.0, 1.0)
    }

    #[test]
    fn camera_sits_behind_and_above_the_player() {
        let mut camera = Camera::new();
        let mut input = InputState::default();
        let player = player_at(100.0, 5.0, -200.0, 0.0);
        camera.update(&player, &mut input);

        // Pitch 20 degrees, player facing +z: camera is pulled back along -z
        // and raised above the player.
        assert!(camera.position.z < player.position.z);
        assert!(camera.position.y > player.position.y);
        assert!((camera.position.x - player.position.x).abs() < 1e-3);
        assert!((camera.yaw - 180.0).abs() < 1e-3);
    }

    #[test]
    fn zoom_shortens_the_orbit_radius() {
        let mut camera = Camera::new();
        let mut input = InputState::default();
        let player = player_at(0.0, 0.0, 0.0, 0.0);

        camera.update(&player, &mut input);
        let far = (camera.position.y.powi(2) + camera.position.z.powi(2)).sqrt();

        input.wheel_delta = 100.0;
        camera.update(&player, &mut input);
        let near = (camera.position.y.powi(2) + camera.position.z.powi(2)).sqrt();
        assert!(near < far);
    }

    #[test]
    fn orbit_drag_only_applies_while_the_button_is_held() {
        let mut camera = Camera::new();
        let player = player_at(0.0, 0.0, 0.0, 0.0);

        let mut input = InputState::default();
        input.mouse_dy = 50.0;
        camera.update(&player, &mut input);
        assert_eq!(camera.pitch, CAMERA_START_PITCH);

        input.mouse_dy = 50.0;
        input.orbiting = true;
        camera.update(&player, &mut input);
        assert!((camera.pitch - (CAMERA_START_PITCH - 5.0)).abs() < 1e-3);
    }

    #[test]
    fn deltas_are_consumed_once() {
        let mut input = InputState::default();
        input.mouse_dx = 3.0;
        assert_eq!(input.take_mouse_deltas(), (3.0, 0.0, 0.0));
        assert_eq!(input.take_mouse_deltas(), (0.0, 0.0, 0.0));
    }
}
