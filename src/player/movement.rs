use crate::constants::{GRAVITY, JUMP_POWER, RUN_SPEED, TURN_SPEED};
use crate::player::input::InputState;
use crate::scene::Entity;
use crate::world::Terrain;

/// Movement capability attached to the player entity. Kept separate from
/// `Entity` so static scenery carries no movement state.
pub struct Mover {
    speed: f32,
    turn_speed: f32,
    y_speed: f32,
    in_air: bool,
}

impl Mover {
    pub fn new() -> Self {
        Mover {
            speed: 0.0,
            turn_speed: 0.0,
            y_speed: 0.0,
            in_air: false,
        }
    }

    pub fn update(&mut self, entity: &mut Entity, terrain: &Terrain, input: &InputState, dt: f32) {
        self.read_input(input);

        entity.increase_rotation(0.0, self.turn_speed * dt, 0.0);
        let distance = self.speed * dt;
        let dx = distance * entity.rotation_y.to_radians().sin();
        let dz = distance * entity.rotation_y.to_radians().cos();
        entity.increase_position(dx, 0.0, dz);

        self.y_speed += GRAVITY * dt;
        entity.increase_position(0.0, self.y_speed * dt, 0.0);

        let terrain_height = terrain.height_at(entity.position.x, entity.position.z);
        if entity.position.y < terrain_height {
            self.y_speed = 0.0;
            self.in_air = false;
            entity.position.y = terrain_height;
        }
    }

    fn read_input(&mut self, input: &InputState) {
        self.speed = if input.forward {
            RUN_SPEED
        } else if input.backward {
            -RUN_SPEED
        } else {
            0.0
        };

        self.turn_speed = if input.right {
            -TURN_SPEED
        } else if input.left {
            TURN_SPEED
        } else {
            0.0
        };

        if input.jump && !self.in_air {
            self.y_speed = JUMP_POWER;
            self.in_air = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::Heightmap;
    use cgmath::Vector3;

    fn flat_terrain() -> Terrain {
        let img = image::RgbaImage::from_pixel(3, 3, image::Rgba([0, 0, 0, 255]));
        Terrain::new(0, 0, &Heightmap::from_image(&img).unwrap())
    }

    fn player() -> Entity {
        Entity::new(0, Vector3::new(800.0, 0.0, 800.0), 0.0, 0.0, 0.0, 1.0)
    }

    #[test]
    fn gravity_clamps_the_player_onto_the_terrain() {
        let terrain = flat_terrain();
        let mut entity = player();
        entity.position.y = 5.0;
        let mut mover = Mover::new();
        let input = InputState::default();

        for _ in 0..120 {
            mover.update(&mut entity, &terrain, &input, 1.0 / 60.0);
        }
        assert_eq!(entity.position.y, 0.0);
    }

    #[test]
    fn running_forward_moves_along_the_facing_direction() {
        let terrain = flat_terrain();
        let mut entity = player();
        let mut mover = Mover::new();
        let mut input = InputState::default();
        input.forward = true;

        mover.update(&mut entity, &terrain, &input, 0.5);
        // Facing rotation_y = 0: forward is +z.
        assert!((entity.position.z - 800.0 - RUN_SPEED * 0.5).abs() < 1e-3);
        assert!((entity.position.x - 800.0).abs() < 1e-3);
    }

    #[test]
    fn turning_changes_heading_over_time() {
        let terrain = flat_terrain();
        let mut entity = player();
        let mut mover = Mover::new();
        let mut input = InputState::default();
        input.left = true;

        mover.update(&mut entity, &terrain, &input, 0.25);
        assert!((entity.rotation_y - TURN_SPEED * 0.25).abs() < 1e-3);
    }

    #[test]
    fn jump_is_ignored_while_airborne() {
        let terrain = flat_terrain();
        let mut entity = player();
        let mut mover = Mover::new();
        let mut input = InputState::default();
        input.jump = true;

        mover.update(&mut entity, &terrain, &input, 1.0 / 60.0);
        let first_jump_y = entity.position.y;
        assert!(first_jump_y > 0.0);

        // Still rising; a second jump press must not re-launch.
        mover.update(&mut entity, &terrain, &input, 1.0 / 60.0);
        let risen = entity.position.y - first_jump_y;
        assert!(risen < JUMP_POWER / 60.0 + 1e-3);
    }

    #[test]
    fn landing_restores_the_ability_to_jump() {
        let terrain = flat_terrain();
        let mut entity = player();
        let mut mover = Mover::new();
        let mut input = InputState::default();
        input.jump = true;

        // Jump, then fall back down.
        for _ in 0..240 {
            mover.update(&mut entity, &terrain, &input, 1.0 / 60.0);
        }
        // A full cycle later the player is jumping again, so it left the
        // ground at least once more.
        let airborne = entity.position.y > 0.0;
        assert!(airborne);
    }
}
