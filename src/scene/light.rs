use cgmath::Vector3;

/// A point light. Attenuation coefficients are (constant, linear, quadratic);
/// the default (1, 0, 0) means no falloff, which is what the distant sun uses.
pub struct Light {
    pub position: Vector3<f32>,
    pub colour: Vector3<f32>,
    pub attenuation: Vector3<f32>,
}

impl Light {
    pub fn new(position: Vector3<f32>, colour: Vector3<f32>) -> Self {
        Light {
            position,
            colour,
            attenuation: Vector3::new(1.0, 0.0, 0.0),
        }
    }

    pub fn with_attenuation(
        position: Vector3<f32>,
        colour: Vector3<f32>,
        attenuation: Vector3<f32>,
    ) -> Self {
        Light {
            position,
            colour,
            attenuation,
        }
    }
}
