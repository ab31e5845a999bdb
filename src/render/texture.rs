use image::GenericImageView;
use std::path::Path;

use crate::constants::{PARTICLE_ATLAS_ROWS, PROC_TEXTURE_SIZE};

pub fn load_rgba_image<P: AsRef<Path>>(path: P) -> Result<(Vec<u8>, u32, u32), String> {
    let img = image::open(path).map_err(|e| format!("Failed to load texture: {}", e))?;
    let rgba = img.to_rgba8();
    let (width, height) = img.dimensions();
    Ok((rgba.into_raw(), width, height))
}

fn hash(x: u32, y: u32, seed: u32) -> u8 {
    let n = x
        .wrapping_mul(374761393)
        .wrapping_add(y.wrapping_mul(668265263))
        .wrapping_add(seed);
    let n = (n ^ (n >> 13)).wrapping_mul(1274126177);
    ((n ^ (n >> 16)) & 0xFF) as u8
}

/// Coarse-cell noise smoothed over a 2x2 lattice, for the low-frequency
/// blend map and sky shading.
fn smooth_noise(x: u32, y: u32, cell: u32, seed: u32) -> f32 {
    let cx = x / cell;
    let cy = y / cell;
    let fx = (x % cell) as f32 / cell as f32;
    let fy = (y % cell) as f32 / cell as f32;
    let corner = |dx: u32, dy: u32| hash(cx + dx, cy + dy, seed) as f32 / 255.0;
    let top = corner(0, 0) * (1.0 - fx) + corner(1, 0) * fx;
    let bottom = corner(0, 1) * (1.0 - fx) + corner(1, 1) * fx;
    top * (1.0 - fy) + bottom * fy
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerrainTile {
    Grass,
    Mud,
    Flowers,
    Path,
}

/// One PROC_TEXTURE_SIZE square ground tile in RGBA8.
pub fn generate_terrain_tile(tile: TerrainTile) -> Vec<u8> {
    let size = PROC_TEXTURE_SIZE;
    let mut data = Vec::with_capacity((size * size * 4) as usize);

    for y in 0..size {
        for x in 0..size {
            let (r, g, b) = match tile {
                TerrainTile::Grass => {
                    let noise = hash(x, y, 20) as i32 - 128;
                    let g_val = (110 + noise / 6).clamp(70, 150) as u8;
                    (45, g_val, 30)
                }
                TerrainTile::Mud => {
                    let noise = hash(x, y, 21) as i32 - 128;
                    let base = 120 + noise / 8;
                    (
                        base.clamp(90, 150) as u8,
                        (base - 45).clamp(50, 105) as u8,
                        (base - 85).clamp(15, 55) as u8,
                    )
                }
                TerrainTile::Flowers => {
                    let noise = hash(x, y, 22);
                    let cluster = hash(x / 8, y / 8, 23);
                    if cluster > 210 && noise > 190 {
                        // Petal speckles over the grass base.
                        if cluster % 2 == 0 {
                            (220, 60, 70)
                        } else {
                            (230, 210, 70)
                        }
                    } else {
                        let g_val = (105 + (noise as i32 - 128) / 6).clamp(70, 145) as u8;
                        (45, g_val, 30)
                    }
                }
                TerrainTile::Path => {
                    let noise = hash(x, y, 24);
                    let pebble = if (noise / 40) % 3 == 0 { 25i32 } else { 0 };
                    let base = 140 + (noise as i32 - 128) / 8 - pebble;
                    (
                        base.clamp(95, 165) as u8,
                        (base - 25).clamp(75, 140) as u8,
                        (base - 55).clamp(45, 110) as u8,
                    )
                }
            };
            data.extend_from_slice(&[r, g, b, 255]);
        }
    }

    data
}

/// Blend map steering the terrain shader: r/g/b weight mud/flowers/path,
/// the remainder falls to grass. Low-frequency patches so the splat reads
/// as regions rather than static.
pub fn generate_blend_map(seed: u32) -> Vec<u8> {
    let size = PROC_TEXTURE_SIZE;
    let mut data = Vec::with_capacity((size * size * 4) as usize);

    for y in 0..size {
        for x in 0..size {
            let r = smooth_noise(x, y, 32, seed.wrapping_add(1));
            let g = smooth_noise(x, y, 48, seed.wrapping_add(2));
            let b = smooth_noise(x, y, 24, seed.wrapping_add(3));
            // Sharpen each channel so patches have definite interiors.
            let sharpen = |v: f32| ((v - 0.55) * 4.0).clamp(0.0, 1.0);
            data.extend_from_slice(&[
                (sharpen(r) * 255.0) as u8,
                (sharpen(g) * 255.0) as u8,
                (sharpen(b) * 255.0) as u8,
                255,
            ]);
        }
    }

    data
}

/// Particle atlas of PARTICLE_ATLAS_ROWS^2 stages: a soft disc that shrinks
/// and dims across stages so the animation reads as a puff burning out.
pub fn generate_particle_atlas() -> Vec<u8> {
    let rows = PARTICLE_ATLAS_ROWS;
    let cell = PROC_TEXTURE_SIZE / rows;
    let size = cell * rows;
    let mut data = vec![0u8; (size * size * 4) as usize];

    for stage in 0..rows * rows {
        let col = stage % rows;
        let row = stage / rows;
        let progress = stage as f32 / (rows * rows - 1) as f32;
        let radius = cell as f32 * 0.45 * (1.0 - 0.6 * progress);
        let brightness = 1.0 - 0.7 * progress;

        for y in 0..cell {
            for x in 0..cell {
                let dx = x as f32 - cell as f32 / 2.0;
                let dy = y as f32 - cell as f32 / 2.0;
                let dist = (dx * dx + dy * dy).sqrt();
                if dist >= radius {
                    continue;
                }
                let falloff = 1.0 - dist / radius;
                let alpha = (falloff * falloff * 255.0) as u8;
                let v = (brightness * 235.0) as u8;
                let px = col * cell + x;
                let py = row * cell + y;
                let idx = ((py * size + px) * 4) as usize;
                data[idx] = v;
                data[idx + 1] = (v as f32 * 0.9) as u8;
                data[idx + 2] = (v as f32 * 0.75) as u8;
                data[idx + 3] = alpha;
            }
        }
    }

    data
}

/// Tangent-space normal map with mild hash bumps around straight-up.
pub fn generate_normal_map(seed: u32) -> Vec<u8> {
    let size = PROC_TEXTURE_SIZE;
    let mut data = Vec::with_capacity((size * size * 4) as usize);

    for y in 0..size {
        for x in 0..size {
            let nx = 128 + (hash(x, y, seed) as i32 - 128) / 6;
            let ny = 128 + (hash(x, y, seed.wrapping_add(97)) as i32 - 128) / 6;
            data.extend_from_slice(&[nx.clamp(0, 255) as u8, ny.clamp(0, 255) as u8, 255, 255]);
        }
    }

    data
}

/// Noisy tinted surface for the placeholder entity models.
pub fn generate_entity_texture(base: [u8; 3], seed: u32) -> Vec<u8> {
    let size = PROC_TEXTURE_SIZE;
    let mut data = Vec::with_capacity((size * size * 4) as usize);

    for y in 0..size {
        for x in 0..size {
            let noise = hash(x, y, seed) as i32 - 128;
            let shade = |c: u8| (c as i32 + noise / 6).clamp(0, 255) as u8;
            data.extend_from_slice(&[shade(base[0]), shade(base[1]), shade(base[2]), 255]);
        }
    }

    data
}

/// One cubemap face as a vertical gradient between horizon and zenith
/// colours; `face` follows wgpu array-layer order (+x,-x,+y,-y,+z,-z).
/// Night faces scatter star points over the gradient.
pub fn generate_sky_face(face: u32, horizon: [u8; 3], zenith: [u8; 3], stars: bool) -> Vec<u8> {
    let size = PROC_TEXTURE_SIZE;
    let mut data = Vec::with_capacity((size * size * 4) as usize);

    for y in 0..size {
        for x in 0..size {
            let t = match face {
                2 => 1.0,
                3 => 0.0,
                _ => 1.0 - y as f32 / (size - 1) as f32,
            };
            let mix = |h: u8, z: u8| (h as f32 * (1.0 - t) + z as f32 * t) as u8;
            let mut r = mix(horizon[0], zenith[0]);
            let mut g = mix(horizon[1], zenith[1]);
            let mut b = mix(horizon[2], zenith[2]);
            if stars && hash(x, y, 600 + face) > 252 {
                r = 255;
                g = 255;
                b = 240;
            }
            data.extend_from_slice(&[r, g, b, 255]);
        }
    }

    data
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expected_len() -> usize {
        (PROC_TEXTURE_SIZE * PROC_TEXTURE_SIZE * 4) as usize
    }

    #[test]
    fn tiles_are_opaque_and_sized() {
        for tile in [
            TerrainTile::Grass,
            TerrainTile::Mud,
            TerrainTile::Flowers,
            TerrainTile::Path,
        ] {
            let data = generate_terrain_tile(tile);
            assert_eq!(data.len(), expected_len());
            assert!(data.chunks(4).all(|p| p[3] == 255));
        }
    }

    #[test]
    fn blend_map_is_deterministic() {
        assert_eq!(generate_blend_map(7), generate_blend_map(7));
        assert_ne!(generate_blend_map(7), generate_blend_map(8));
    }

    #[test]
    fn particle_atlas_fades_across_stages() {
        let rows = PARTICLE_ATLAS_ROWS;
        let cell = PROC_TEXTURE_SIZE / rows;
        let size = cell * rows;
        let data = generate_particle_atlas();
        let centre = |stage: u32| {
            let px = (stage % rows) * cell + cell / 2;
            let py = (stage / rows) * cell + cell / 2;
            data[((py * size + px) * 4 + 3) as usize]
        };
        assert!(centre(0) > 0);
        assert!(centre(0) >= centre(rows * rows - 1));
    }

    #[test]
    fn normal_map_points_mostly_up() {
        let data = generate_normal_map(3);
        for p in data.chunks(4) {
            assert_eq!(p[2], 255);
            assert!((p[0] as i32 - 128).abs() <= 22);
        }
    }

    #[test]
    fn sky_top_face_is_pure_zenith() {
        let zenith = [10, 20, 90];
        let data = generate_sky_face(2, [200, 200, 200], zenith, false);
        assert_eq!(&data[0..3], &zenith);
    }
}
