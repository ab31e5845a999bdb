use cgmath::{InnerSpace, Vector2, Vector3};

use crate::constants::TERRAIN_SIZE;
use crate::core::mesh::MeshData;
use crate::world::heightmap::Heightmap;

/// A square patch of terrain. Built once at scene setup from a heightmap;
/// afterwards the height grid is immutable and queried every frame for
/// ground clamping.
pub struct Terrain {
    x: f32,
    z: f32,
    /// Per-vertex heights, indexed [column][row].
    heights: Vec<Vec<f32>>,
    mesh: MeshData,
}

impl Terrain {
    pub fn new(grid_x: i32, grid_z: i32, heightmap: &Heightmap) -> Self {
        let (heights, mesh) = generate_terrain(heightmap);
        Terrain {
            x: grid_x as f32 * TERRAIN_SIZE,
            z: grid_z as f32 * TERRAIN_SIZE,
            heights,
            mesh,
        }
    }

    pub fn x(&self) -> f32 {
        self.x
    }

    pub fn z(&self) -> f32 {
        self.z
    }

    pub fn mesh(&self) -> &MeshData {
        &self.mesh
    }

    /// Interpolated terrain height under a world-space (x, z) point.
    ///
    /// Each grid cell is split into two triangles along the diagonal from
    /// local (0,1) to (1,0); the containing triangle's corner heights are
    /// blended barycentrically. Points off the terrain yield a flat 0 —
    /// callers tolerate that, it is not an error.
    pub fn height_at(&self, world_x: f32, world_z: f32) -> f32 {
        let terrain_x = world_x - self.x;
        let terrain_z = world_z - self.z;
        let side = self.heights.len();
        let grid_square_size = TERRAIN_SIZE / (side as f32 - 1.0);
        let grid_x = (terrain_x / grid_square_size).floor() as i32;
        let grid_z = (terrain_z / grid_square_size).floor() as i32;

        if grid_x < 0 || grid_z < 0 || grid_x >= side as i32 - 1 || grid_z >= side as i32 - 1 {
            return 0.0;
        }
        let (gx, gz) = (grid_x as usize, grid_z as usize);

        let x_coord = (terrain_x % grid_square_size) / grid_square_size;
        let z_coord = (terrain_z % grid_square_size) / grid_square_size;

        if x_coord <= 1.0 - z_coord {
            barycentric(
                Vector3::new(0.0, self.heights[gx][gz], 0.0),
                Vector3::new(1.0, self.heights[gx + 1][gz], 0.0),
                Vector3::new(0.0, self.heights[gx][gz + 1], 1.0),
                Vector2::new(x_coord, z_coord),
            )
        } else {
            barycentric(
                Vector3::new(1.0, self.heights[gx + 1][gz], 0.0),
                Vector3::new(1.0, self.heights[gx + 1][gz + 1], 1.0),
                Vector3::new(0.0, self.heights[gx][gz + 1], 1.0),
                Vector2::new(x_coord, z_coord),
            )
        }
    }
}

/// Height of a point inside a triangle given the three corners as
/// (x, height, z), by area-ratio weights over the projected (x, z) plane.
pub fn barycentric(p1: Vector3<f32>, p2: Vector3<f32>, p3: Vector3<f32>, pos: Vector2<f32>) -> f32 {
    let det = (p2.z - p3.z) * (p1.x - p3.x) + (p3.x - p2.x) * (p1.z - p3.z);
    let l1 = ((p2.z - p3.z) * (pos.x - p3.x) + (p3.x - p2.x) * (pos.y - p3.z)) / det;
    let l2 = ((p3.z - p1.z) * (pos.x - p3.x) + (p1.x - p3.x) * (pos.y - p3.z)) / det;
    let l3 = 1.0 - l1 - l2;
    l1 * p1.y + l2 * p2.y + l3 * p3.y
}

/// Builds the terrain mesh from an N×N heightmap: N² vertices on a uniform
/// planar grid scaled to TERRAIN_SIZE, central-difference normals, [0,1]²
/// texture coordinates and two consistently wound triangles per cell.
///
/// Rows advance along +z and columns along +x; the index winding below
/// assumes exactly that vertex order, so both loops must stay row-major.
fn generate_terrain(heightmap: &Heightmap) -> (Vec<Vec<f32>>, MeshData) {
    let vertex_count = heightmap.side() as usize;
    let count = vertex_count * vertex_count;
    let last = vertex_count as f32 - 1.0;

    let mut heights = vec![vec![0.0f32; vertex_count]; vertex_count];
    let mut positions = Vec::with_capacity(count * 3);
    let mut normals = Vec::with_capacity(count * 3);
    let mut uvs = Vec::with_capacity(count * 2);

    for i in 0..vertex_count {
        for j in 0..vertex_count {
            let height = heightmap.sample_height(j as i32, i as i32);
            heights[j][i] = height;
            positions.push(j as f32 / last * TERRAIN_SIZE);
            positions.push(height);
            positions.push(i as f32 / last * TERRAIN_SIZE);

            let normal = surface_normal(heightmap, j as i32, i as i32);
            normals.push(normal.x);
            normals.push(normal.y);
            normals.push(normal.z);

            uvs.push(j as f32 / last);
            uvs.push(i as f32 / last);
        }
    }

    let mut indices = Vec::with_capacity(6 * (vertex_count - 1) * (vertex_count - 1));
    for gz in 0..vertex_count - 1 {
        for gx in 0..vertex_count - 1 {
            let top_left = (gz * vertex_count + gx) as u32;
            let top_right = top_left + 1;
            let bottom_left = ((gz + 1) * vertex_count + gx) as u32;
            let bottom_right = bottom_left + 1;
            indices.extend_from_slice(&[
                top_left,
                bottom_left,
                top_right,
                top_right,
                bottom_left,
                bottom_right,
            ]);
        }
    }

    let mesh = MeshData {
        positions,
        uvs,
        normals,
        tangents: None,
        indices,
        furthest_point: TERRAIN_SIZE * std::f32::consts::SQRT_2,
    };
    (heights, mesh)
}

/// Central differencing over the four cardinal neighbours; the fixed 2.0 in
/// the y component sets the slope scale.
fn surface_normal(heightmap: &Heightmap, x: i32, z: i32) -> Vector3<f32> {
    let height_l = heightmap.sample_height(x - 1, z);
    let height_r = heightmap.sample_height(x + 1, z);
    let height_d = heightmap.sample_height(x, z - 1);
    let height_u = heightmap.sample_height(x, z + 1);
    Vector3::new(height_l - height_r, 2.0, height_d - height_u).normalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::MAX_HEIGHT;

    fn flat_map(side: u32) -> Heightmap {
        let img = image::RgbaImage::from_pixel(side, side, image::Rgba([0, 0, 0, 255]));
        Heightmap::from_image(&img).unwrap()
    }

    fn bumpy_map(side: u32) -> Heightmap {
        Heightmap::procedural(side, 5666778)
    }

    #[test]
    fn flat_three_by_three_terrain() {
        // 3x3 all-zero heightmap at grid (0, 0): 9 vertices, 24 indices,
        // flat everywhere including the patch centre.
        let terrain = Terrain::new(0, 0, &flat_map(3));
        assert_eq!(terrain.mesh().vertex_count(), 9);
        assert_eq!(terrain.mesh().index_count(), 24);
        assert!(terrain.mesh().positions.iter().skip(1).step_by(3).all(|&y| y == 0.0));
        assert_eq!(terrain.height_at(800.0, 800.0), 0.0);

        // Same scenario placed at grid (0, -1), queried at its centre.
        let shifted = Terrain::new(0, -1, &flat_map(3));
        assert_eq!(shifted.height_at(800.0, -800.0), 0.0);
    }

    #[test]
    fn mesh_counts_match_grid_side() {
        for side in [2u32, 5, 16] {
            let terrain = Terrain::new(0, 0, &bumpy_map(side));
            let n = side as usize;
            assert_eq!(terrain.mesh().vertex_count(), n * n);
            assert_eq!(terrain.mesh().index_count(), 6 * (n - 1) * (n - 1));
            assert_eq!(terrain.mesh().uvs.len(), n * n * 2);
            assert_eq!(terrain.mesh().normals.len(), n * n * 3);
        }
    }

    #[test]
    fn vertex_heights_round_trip_through_the_grid() {
        let map = bumpy_map(8);
        let terrain = Terrain::new(0, 0, &map);
        let n = 8usize;
        for i in 0..n {
            for j in 0..n {
                let y = terrain.mesh().positions[(i * n + j) * 3 + 1];
                assert_eq!(y, map.sample_height(j as i32, i as i32));
                assert!(y.abs() <= MAX_HEIGHT);
            }
        }
    }

    #[test]
    fn query_at_grid_vertices_is_exact() {
        let map = bumpy_map(8);
        let terrain = Terrain::new(0, 0, &map);
        let cell = TERRAIN_SIZE / 7.0;
        // Interior vertices; the last row/column sits on the rejected edge.
        for gx in 0..7 {
            for gz in 0..7 {
                let expected = map.sample_height(gx, gz);
                let got = terrain.height_at(gx as f32 * cell, gz as f32 * cell);
                assert!(
                    (got - expected).abs() < 1e-3,
                    "vertex ({}, {}): {} vs {}",
                    gx,
                    gz,
                    got,
                    expected
                );
            }
        }
    }

    #[test]
    fn height_is_continuous_across_the_diagonal_split() {
        let terrain = Terrain::new(0, 0, &bumpy_map(8));
        let cell = TERRAIN_SIZE / 7.0;
        // Mid-point of the diagonal in cell (2, 3), approached from both
        // triangles.
        let x = 2.0 * cell + cell * 0.5;
        let z = 3.0 * cell + cell * 0.5;
        let eps = cell * 1e-4;
        let left = terrain.height_at(x - eps, z);
        let right = terrain.height_at(x + eps, z);
        assert!((left - right).abs() < 1e-2, "{} vs {}", left, right);
    }

    #[test]
    fn off_terrain_queries_return_zero() {
        let terrain = Terrain::new(0, 0, &bumpy_map(8));
        assert_eq!(terrain.height_at(-1000.0, 100.0), 0.0);
        assert_eq!(terrain.height_at(100.0, -1000.0), 0.0);
        assert_eq!(terrain.height_at(TERRAIN_SIZE + 1.0, 100.0), 0.0);
        assert_eq!(terrain.height_at(-0.5, -0.5), 0.0);
    }

    #[test]
    fn queries_respect_the_grid_offset() {
        let map = bumpy_map(8);
        let at_origin = Terrain::new(0, 0, &map);
        let shifted = Terrain::new(0, -1, &map);
        let (x, z) = (321.0, 123.0);
        let expected = at_origin.height_at(x, z);
        assert!((shifted.height_at(x, z - TERRAIN_SIZE) - expected).abs() < 1e-4);
        // The same world point is off the shifted patch entirely.
        assert_eq!(shifted.height_at(x, z), 0.0);
    }

    #[test]
    fn barycentric_reproduces_corner_heights() {
        let p1 = Vector3::new(0.0, 4.0, 0.0);
        let p2 = Vector3::new(1.0, 8.0, 0.0);
        let p3 = Vector3::new(0.0, -2.0, 1.0);
        assert!((barycentric(p1, p2, p3, Vector2::new(0.0, 0.0)) - 4.0).abs() < 1e-6);
        assert!((barycentric(p1, p2, p3, Vector2::new(1.0, 0.0)) - 8.0).abs() < 1e-6);
        assert!((barycentric(p1, p2, p3, Vector2::new(0.0, 1.0)) + 2.0).abs() < 1e-6);
        // Centroid averages the three corners.
        let centre = barycentric(p1, p2, p3, Vector2::new(1.0 / 3.0, 1.0 / 3.0));
        assert!((centre - 10.0 / 3.0).abs() < 1e-5);
    }

    #[test]
    fn terrain_normals_are_unit_length_and_upward() {
        let terrain = Terrain::new(0, 0, &bumpy_map(8));
        let normals = &terrain.mesh().normals;
        for n in normals.chunks(3) {
            let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
            assert!((len - 1.0).abs() < 1e-4);
            assert!(n[1] > 0.0);
        }
    }
}
