use std::collections::HashMap;

use cgmath::{InnerSpace, Point3, Vector3};
use rand::Rng;

use crate::constants::GRAVITY;

/// Texture-atlas handle for a particle group. The atlas is split into
/// `rows` × `rows` animation stages.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct ParticleTexture {
    pub id: u32,
    pub rows: u32,
}

pub struct Particle {
    pub position: Vector3<f32>,
    velocity: Vector3<f32>,
    gravity_effect: f32,
    life_length: f32,
    pub rotation: f32,
    pub scale: f32,
    pub atlas_offset1: [f32; 2],
    pub atlas_offset2: [f32; 2],
    pub blend: f32,
    elapsed: f32,
    pub distance_sq: f32,
}

impl Particle {
    pub fn new(
        position: Vector3<f32>,
        velocity: Vector3<f32>,
        gravity_effect: f32,
        life_length: f32,
        rotation: f32,
        scale: f32,
    ) -> Self {
        Particle {
            position,
            velocity,
            gravity_effect,
            life_length,
            rotation,
            scale,
            atlas_offset1: [0.0, 0.0],
            atlas_offset2: [0.0, 0.0],
            blend: 0.0,
            elapsed: 0.0,
            distance_sq: 0.0,
        }
    }

    /// Advances the particle one frame; returns whether it is still alive.
    fn update(&mut self, dt: f32, camera_pos: Point3<f32>, rows: u32) -> bool {
        self.velocity.y += GRAVITY * self.gravity_effect * dt;
        self.position += self.velocity * dt;
        self.distance_sq =
            (Vector3::new(camera_pos.x, camera_pos.y, camera_pos.z) - self.position).magnitude2();
        self.update_atlas(rows);
        self.elapsed += dt;
        self.elapsed < self.life_length
    }

    /// Picks the current and next animation stage from how far through its
    /// life the particle is; the fractional part becomes the blend factor.
    /// The next stage clamps at the last atlas cell.
    fn update_atlas(&mut self, rows: u32) {
        let life_factor = self.elapsed / self.life_length;
        let stage_count = rows * rows;
        let atlas_progression = life_factor * stage_count as f32;
        let index1 = (atlas_progression.floor() as u32).min(stage_count - 1);
        let index2 = if index1 < stage_count - 1 {
            index1 + 1
        } else {
            index1
        };
        self.blend = atlas_progression % 1.0;
        self.atlas_offset1 = stage_offset(index1, rows);
        self.atlas_offset2 = stage_offset(index2, rows);
    }
}

fn stage_offset(index: u32, rows: u32) -> [f32; 2] {
    let column = index % rows;
    let row = index / rows;
    [column as f32 / rows as f32, row as f32 / rows as f32]
}

/// All live particles in the scene, grouped by texture so each group renders
/// in one instanced draw. Owned by the app and passed into the frame step
/// explicitly; there is no global registry.
pub struct ParticleRegistry {
    groups: HashMap<ParticleTexture, Vec<Particle>>,
}

impl ParticleRegistry {
    pub fn new() -> Self {
        ParticleRegistry {
            groups: HashMap::new(),
        }
    }

    pub fn add(&mut self, texture: ParticleTexture, particle: Particle) {
        self.groups.entry(texture).or_default().push(particle);
    }

    /// Integrates every particle, drops the expired ones and sorts each group
    /// far-to-near so alpha blending layers correctly.
    pub fn update(&mut self, dt: f32, camera_pos: Point3<f32>) {
        for (texture, list) in self.groups.iter_mut() {
            list.retain_mut(|p| p.update(dt, camera_pos, texture.rows));
            list.sort_by(|a, b| b.distance_sq.total_cmp(&a.distance_sq));
        }
        self.groups.retain(|_, list| !list.is_empty());
    }

    pub fn groups(&self) -> impl Iterator<Item = (&ParticleTexture, &[Particle])> {
        self.groups.iter().map(|(t, list)| (t, list.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.groups.values().map(|list| list.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Continuous emitter: spits out `pps` particles per second from a point,
/// with random horizontal spread and a fixed upward component.
pub struct ParticleSystem {
    texture: ParticleTexture,
    pps: f32,
    speed: f32,
    gravity_compliance: f32,
    life_length: f32,
}

impl ParticleSystem {
    pub fn new(
        texture: ParticleTexture,
        pps: f32,
        speed: f32,
        gravity_compliance: f32,
        life_length: f32,
    ) -> Self {
        ParticleSystem {
            texture,
            pps,
            speed,
            gravity_compliance,
            life_length,
        }
    }

    pub fn emit<R: Rng>(
        &self,
        registry: &mut ParticleRegistry,
        origin: Vector3<f32>,
        dt: f32,
        rng: &mut R,
    ) {
        let to_create = self.pps * dt;
        let count = to_create.floor() as u32;
        let partial = to_create % 1.0;
        for _ in 0..count {
            self.emit_one(registry, origin, rng);
        }
        if rng.random::<f32>() < partial {
            self.emit_one(registry, origin, rng);
        }
    }

    fn emit_one<R: Rng>(&self, registry: &mut ParticleRegistry, origin: Vector3<f32>, rng: &mut R) {
        let dir_x = rng.random::<f32>() * 2.0 - 1.0;
        let dir_z = rng.random::<f32>() * 2.0 - 1.0;
        let velocity = Vector3::new(dir_x, 1.0, dir_z).normalize() * self.speed;
        registry.add(
            self.texture,
            Particle::new(origin, velocity, self.gravity_compliance, self.life_length, 0.0, 1.0),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    const TEX: ParticleTexture = ParticleTexture { id: 1, rows: 4 };

    fn still_particle(life: f32) -> Particle {
        Particle::new(
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(0.0, 0.0, 0.0),
            0.0,
            life,
            0.0,
            1.0,
        )
    }

    #[test]
    fn particles_expire_after_their_life_length() {
        let mut registry = ParticleRegistry::new();
        registry.add(TEX, still_particle(1.0));
        registry.add(TEX, still_particle(3.0));

        registry.update(1.5, Point3::new(0.0, 0.0, 0.0));
        assert_eq!(registry.len(), 1);

        registry.update(2.0, Point3::new(0.0, 0.0, 0.0));
        assert!(registry.is_empty());
    }

    #[test]
    fn gravity_pulls_particles_down() {
        let mut registry = ParticleRegistry::new();
        let mut p = Particle::new(
            Vector3::new(0.0, 10.0, 0.0),
            Vector3::new(0.0, 0.0, 0.0),
            1.0,
            10.0,
            0.0,
            1.0,
        );
        assert!(p.update(0.5, Point3::new(0.0, 0.0, 0.0), TEX.rows));
        assert!(p.position.y < 10.0);
        registry.add(TEX, p);
    }

    #[test]
    fn groups_sort_far_to_near() {
        let mut registry = ParticleRegistry::new();
        for x in [5.0f32, 1.0, 3.0] {
            let mut p = still_particle(10.0);
            p.position.x = x;
            registry.add(TEX, p);
        }
        registry.update(0.1, Point3::new(0.0, 0.0, 0.0));

        let (_, list) = registry.groups().next().unwrap();
        let distances: Vec<f32> = list.iter().map(|p| p.distance_sq).collect();
        assert!(distances.windows(2).all(|w| w[0] >= w[1]), "{:?}", distances);
    }

    #[test]
    fn atlas_stage_clamps_at_the_last_cell() {
        let mut p = still_particle(1.0);
        // 99% through a 16-stage atlas: both offsets point at the final cell.
        p.elapsed = 0.99;
        p.update_atlas(4);
        assert_eq!(p.atlas_offset1, [0.75, 0.75]);
        assert_eq!(p.atlas_offset2, [0.75, 0.75]);
        assert!(p.blend >= 0.0 && p.blend < 1.0);
    }

    #[test]
    fn mid_life_stages_are_adjacent() {
        let mut p = still_particle(1.0);
        p.elapsed = 0.5;
        p.update_atlas(4);
        // Stage 8 of 16 -> cell (0, 2); next stage -> cell (1, 2).
        assert_eq!(p.atlas_offset1, [0.0, 0.5]);
        assert_eq!(p.atlas_offset2, [0.25, 0.5]);
    }

    #[test]
    fn emitter_respects_particles_per_second() {
        let system = ParticleSystem::new(TEX, 50.0, 25.0, 0.3, 4.0);
        let mut registry = ParticleRegistry::new();
        let mut rng = StdRng::seed_from_u64(42);
        system.emit(&mut registry, Vector3::new(0.0, 0.0, 0.0), 0.1, &mut rng);
        // 50 pps over 0.1s: five whole particles plus at most one fractional.
        assert!(registry.len() == 5 || registry.len() == 6);
    }
}
