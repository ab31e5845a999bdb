use crate::constants::{DAY_CYCLE_LENGTH, SKYBOX_SIZE};

/// Positions for the 36-vertex skybox cube (triangle list, no indices).
pub fn cube_positions() -> [f32; 108] {
    let s = SKYBOX_SIZE;
    [
        -s, s, -s, -s, -s, -s, s, -s, -s, s, -s, -s, s, s, -s, -s, s, -s, //
        -s, -s, s, -s, -s, -s, -s, s, -s, -s, s, -s, -s, s, s, -s, -s, s, //
        s, -s, -s, s, -s, s, s, s, s, s, s, s, s, s, -s, s, -s, -s, //
        -s, -s, s, -s, s, s, s, s, s, s, s, s, s, -s, s, -s, -s, s, //
        -s, s, -s, s, s, -s, s, s, s, s, s, s, -s, s, s, -s, s, -s, //
        -s, -s, -s, -s, -s, s, s, -s, -s, s, -s, -s, -s, -s, s, s, -s, s,
    ]
}

/// Day-night clock for the skybox. Advances in milliseconds over a
/// 24000-unit cycle split into the original's four time bands.
pub struct SkyCycle {
    time: f32,
}

impl SkyCycle {
    pub fn new() -> Self {
        SkyCycle { time: 0.0 }
    }

    pub fn advance(&mut self, dt: f32) {
        self.time += dt * 1000.0;
        self.time %= DAY_CYCLE_LENGTH;
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    /// Cubemap pair and blend factor for the current time of day. Both
    /// endpoints reference the same cubemap in every band; the original
    /// behaves this way, so the blend is invisible by construction.
    pub fn blend_stage(&self, cubemap: u32) -> (u32, u32, f32) {
        let t = self.time;
        let blend_factor = if t < 5000.0 {
            t / 5000.0
        } else if t < 8000.0 {
            (t - 5000.0) / (8000.0 - 5000.0)
        } else if t < 21000.0 {
            (t - 8000.0) / (21000.0 - 8000.0)
        } else {
            (t - 21000.0) / (DAY_CYCLE_LENGTH - 21000.0)
        };
        (cubemap, cubemap, blend_factor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cube_has_36_vertices_on_the_cube_surface() {
        let positions = cube_positions();
        assert_eq!(positions.len(), 108);
        for v in positions.chunks(3) {
            let max = v.iter().fold(0.0f32, |m, c| m.max(c.abs()));
            assert_eq!(max, SKYBOX_SIZE);
        }
    }

    #[test]
    fn clock_wraps_at_cycle_length() {
        let mut cycle = SkyCycle::new();
        cycle.advance(30.0); // 30s -> 30000 units, wraps to 6000
        assert!((cycle.time() - 6000.0).abs() < 1e-3);
    }

    #[test]
    fn blend_factor_stays_normalized_across_all_bands() {
        let mut cycle = SkyCycle::new();
        for _ in 0..240 {
            cycle.advance(0.1);
            let (first, second, blend) = cycle.blend_stage(7);
            assert_eq!(first, second);
            assert!((0.0..=1.0).contains(&blend), "t={} b={}", cycle.time(), blend);
        }
    }

    #[test]
    fn blend_resets_at_band_boundaries() {
        let mut cycle = SkyCycle::new();
        cycle.advance(4.9999);
        let (_, _, before) = cycle.blend_stage(0);
        cycle.advance(0.001);
        let (_, _, after) = cycle.blend_stage(0);
        assert!(before > 0.99);
        assert!(after < 0.01);
    }
}
