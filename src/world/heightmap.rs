use std::path::Path;

use crate::constants::{HALF_PIXEL_RANGE, MAX_HEIGHT};

/// Square grid of packed 24-bit colour values decoded from a heightmap image.
/// One pixel per terrain vertex.
pub struct Heightmap {
    side: u32,
    pixels: Vec<i32>,
}

impl Heightmap {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let img = image::open(&path)
            .map_err(|e| format!("Failed to load heightmap {}: {}", path.as_ref().display(), e))?;
        Self::from_image(&img.to_rgba8())
    }

    pub fn from_image(img: &image::RgbaImage) -> Result<Self, String> {
        let (width, height) = img.dimensions();
        if width != height {
            return Err(format!("Heightmap must be square, got {}x{}", width, height));
        }

        let mut pixels = Vec::with_capacity((width * height) as usize);
        for y in 0..height {
            for x in 0..width {
                let p = img.get_pixel(x, y);
                pixels.push(pack_rgb(p.0[0], p.0[1], p.0[2]));
            }
        }

        Ok(Heightmap {
            side: width,
            pixels,
        })
    }

    /// Smooth value-noise fallback used when no heightmap file is available,
    /// so the demo always has hills to stand on.
    pub fn procedural(side: u32, seed: u32) -> Self {
        let hash = |x: i32, z: i32| -> f32 {
            let n = (x as u32)
                .wrapping_mul(374761393)
                .wrapping_add((z as u32).wrapping_mul(668265263))
                .wrapping_add(seed.wrapping_mul(2246822519));
            let n = (n ^ (n >> 13)).wrapping_mul(1274126177);
            // Map to [-1, 1)
            ((n ^ (n >> 16)) & 0xFFFF) as f32 / 32768.0 - 1.0
        };

        let smooth = |x: f32, z: f32, cell: f32| -> f32 {
            let gx = (x / cell).floor() as i32;
            let gz = (z / cell).floor() as i32;
            let fx = (x / cell).fract();
            let fz = (z / cell).fract();
            // Cosine-eased bilinear blend of the four lattice corners
            let sx = (1.0 - (fx * std::f32::consts::PI).cos()) * 0.5;
            let sz = (1.0 - (fz * std::f32::consts::PI).cos()) * 0.5;
            let top = hash(gx, gz) * (1.0 - sx) + hash(gx + 1, gz) * sx;
            let bottom = hash(gx, gz + 1) * (1.0 - sx) + hash(gx + 1, gz + 1) * sx;
            top * (1.0 - sz) + bottom * sz
        };

        let mut pixels = Vec::with_capacity((side * side) as usize);
        for z in 0..side {
            for x in 0..side {
                let (xf, zf) = (x as f32, z as f32);
                let value = smooth(xf, zf, 32.0) * 0.6
                    + smooth(xf, zf, 16.0) * 0.3
                    + smooth(xf, zf, 8.0) * 0.1;
                pixels.push((value.clamp(-1.0, 1.0) * (HALF_PIXEL_RANGE - 1.0)) as i32);
            }
        }

        Heightmap { side, pixels }
    }

    pub fn side(&self) -> u32 {
        self.side
    }

    /// Height displacement for the pixel at (x, z). Out-of-bounds coordinates
    /// clamp to zero rather than wrapping; in-bounds values are rescaled from
    /// the packed colour range to [-MAX_HEIGHT, MAX_HEIGHT].
    pub fn sample_height(&self, x: i32, z: i32) -> f32 {
        if x < 0 || x >= self.side as i32 || z < 0 || z >= self.side as i32 {
            return 0.0;
        }
        let raw = self.pixels[(z as u32 * self.side + x as u32) as usize] as f32;
        (raw / HALF_PIXEL_RANGE * MAX_HEIGHT).clamp(-MAX_HEIGHT, MAX_HEIGHT)
    }
}

/// Packs one pixel's colour channels into a signed value symmetric around
/// zero (sign-extended 24-bit), so mid-grey maps near zero displacement.
fn pack_rgb(r: u8, g: u8, b: u8) -> i32 {
    let packed = ((r as u32) << 16) | ((g as u32) << 8) | (b as u32);
    ((packed << 8) as i32) >> 8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform_map(side: u32, rgb: [u8; 3]) -> Heightmap {
        let img = image::RgbaImage::from_pixel(side, side, image::Rgba([rgb[0], rgb[1], rgb[2], 255]));
        Heightmap::from_image(&img).unwrap()
    }

    #[test]
    fn all_zero_pixels_sample_to_zero() {
        let map = uniform_map(3, [0, 0, 0]);
        for x in 0..3 {
            for z in 0..3 {
                assert_eq!(map.sample_height(x, z), 0.0);
            }
        }
    }

    #[test]
    fn out_of_bounds_samples_are_exactly_zero() {
        let map = uniform_map(4, [200, 10, 10]);
        assert_eq!(map.sample_height(-1, 0), 0.0);
        assert_eq!(map.sample_height(0, -1), 0.0);
        assert_eq!(map.sample_height(4, 2), 0.0);
        assert_eq!(map.sample_height(2, 4), 0.0);
        assert_eq!(map.sample_height(-1000, -1000), 0.0);
    }

    #[test]
    fn in_bounds_samples_stay_within_max_height() {
        for rgb in [[0u8, 0, 0], [255, 255, 255], [128, 0, 0], [127, 255, 255]] {
            let map = uniform_map(2, rgb);
            for x in 0..2 {
                for z in 0..2 {
                    let h = map.sample_height(x, z);
                    assert!(h >= -MAX_HEIGHT && h <= MAX_HEIGHT, "{:?} -> {}", rgb, h);
                }
            }
        }
    }

    #[test]
    fn packed_colour_is_symmetric_around_zero() {
        // 0x000001 and 0xFFFFFF sit one step either side of zero.
        let up = uniform_map(1, [0, 0, 1]).sample_height(0, 0);
        let down = uniform_map(1, [255, 255, 255]).sample_height(0, 0);
        assert!(up > 0.0);
        assert!(down < 0.0);
        assert!((up + down).abs() < 1e-4);
    }

    #[test]
    fn non_square_images_are_rejected() {
        let img = image::RgbaImage::new(4, 3);
        assert!(Heightmap::from_image(&img).is_err());
    }

    #[test]
    fn procedural_map_is_deterministic_and_bounded() {
        let a = Heightmap::procedural(16, 7);
        let b = Heightmap::procedural(16, 7);
        for x in 0..16 {
            for z in 0..16 {
                let h = a.sample_height(x, z);
                assert_eq!(h, b.sample_height(x, z));
                assert!(h.abs() <= MAX_HEIGHT);
            }
        }
    }
}
