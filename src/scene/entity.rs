use cgmath::{Deg, Matrix4, Vector3};

/// A placed instance of a model: transform plus texture-atlas cell. Movement
/// is not part of the entity itself; entities that move carry a separate
/// `Mover` (see player::movement).
pub struct Entity {
    /// Index into the app's model table.
    pub model: usize,
    pub position: Vector3<f32>,
    pub rotation_x: f32,
    pub rotation_y: f32,
    pub rotation_z: f32,
    pub scale: f32,
    pub atlas_index: u32,
}

impl Entity {
    pub fn new(
        model: usize,
        position: Vector3<f32>,
        rotation_x: f32,
        rotation_y: f32,
        rotation_z: f32,
        scale: f32,
    ) -> Self {
        Entity {
            model,
            position,
            rotation_x,
            rotation_y,
            rotation_z,
            scale,
            atlas_index: 0,
        }
    }

    pub fn with_atlas_index(mut self, atlas_index: u32) -> Self {
        self.atlas_index = atlas_index;
        self
    }

    /// UV offset of this entity's cell in a texture atlas with `rows` rows.
    pub fn atlas_offset(&self, rows: u32) -> [f32; 2] {
        let column = self.atlas_index % rows;
        let row = self.atlas_index / rows;
        [column as f32 / rows as f32, row as f32 / rows as f32]
    }

    pub fn increase_position(&mut self, dx: f32, dy: f32, dz: f32) {
        self.position.x += dx;
        self.position.y += dy;
        self.position.z += dz;
    }

    pub fn increase_rotation(&mut self, dx: f32, dy: f32, dz: f32) {
        self.rotation_x += dx;
        self.rotation_y += dy;
        self.rotation_z += dz;
    }

    pub fn model_matrix(&self) -> Matrix4<f32> {
        Matrix4::from_translation(self.position)
            * Matrix4::from_angle_x(Deg(self.rotation_x))
            * Matrix4::from_angle_y(Deg(self.rotation_y))
            * Matrix4::from_angle_z(Deg(self.rotation_z))
            * Matrix4::from_scale(self.scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atlas_offsets_walk_left_to_right_top_to_bottom() {
        let entity = |index| {
            Entity::new(0, Vector3::new(0.0, 0.0, 0.0), 0.0, 0.0, 0.0, 1.0)
                .with_atlas_index(index)
        };
        assert_eq!(entity(0).atlas_offset(2), [0.0, 0.0]);
        assert_eq!(entity(1).atlas_offset(2), [0.5, 0.0]);
        assert_eq!(entity(2).atlas_offset(2), [0.0, 0.5]);
        assert_eq!(entity(3).atlas_offset(2), [0.5, 0.5]);
    }

    #[test]
    fn increments_accumulate() {
        let mut entity = Entity::new(0, Vector3::new(1.0, 2.0, 3.0), 0.0, 0.0, 0.0, 1.0);
        entity.increase_position(0.5, -1.0, 0.0);
        entity.increase_rotation(0.0, 90.0, 0.0);
        assert_eq!(entity.position, Vector3::new(1.5, 1.0, 3.0));
        assert_eq!(entity.rotation_y, 90.0);
    }
}
