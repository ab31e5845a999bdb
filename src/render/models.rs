use cgmath::{InnerSpace, Vector3};

use crate::core::mesh::MeshData;

/// Builders for the placeholder models used when no asset directory is
/// given. Meshes are assembled face by face so normals stay flat per quad.
struct MeshBuilder {
    positions: Vec<f32>,
    uvs: Vec<f32>,
    normals: Vec<f32>,
    tangents: Option<Vec<f32>>,
    indices: Vec<u32>,
}

impl MeshBuilder {
    fn new(with_tangents: bool) -> Self {
        MeshBuilder {
            positions: Vec::new(),
            uvs: Vec::new(),
            normals: Vec::new(),
            tangents: if with_tangents { Some(Vec::new()) } else { None },
            indices: Vec::new(),
        }
    }

    /// Corners wound counter-clockwise seen from the normal side; uv runs
    /// v0 -> v1 along u and v0 -> v3 along v.
    fn add_quad(&mut self, corners: [[f32; 3]; 4], normal: [f32; 3]) {
        let base = (self.positions.len() / 3) as u32;
        let uvs = [[0.0, 1.0], [1.0, 1.0], [1.0, 0.0], [0.0, 0.0]];
        for (corner, uv) in corners.iter().zip(uvs.iter()) {
            self.positions.extend_from_slice(corner);
            self.uvs.extend_from_slice(uv);
            self.normals.extend_from_slice(&normal);
        }
        if let Some(tangents) = self.tangents.as_mut() {
            let edge = Vector3::new(
                corners[1][0] - corners[0][0],
                corners[1][1] - corners[0][1],
                corners[1][2] - corners[0][2],
            )
            .normalize();
            for _ in 0..4 {
                tangents.extend_from_slice(&[edge.x, edge.y, edge.z]);
            }
        }
        self.indices
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    fn add_box(&mut self, centre: [f32; 3], half: [f32; 3]) {
        let [cx, cy, cz] = centre;
        let [hw, hh, hd] = half;
        let x0 = cx - hw;
        let x1 = cx + hw;
        let y0 = cy - hh;
        let y1 = cy + hh;
        let z0 = cz - hd;
        let z1 = cz + hd;

        self.add_quad(
            [[x0, y0, z1], [x1, y0, z1], [x1, y1, z1], [x0, y1, z1]],
            [0.0, 0.0, 1.0],
        );
        self.add_quad(
            [[x1, y0, z0], [x0, y0, z0], [x0, y1, z0], [x1, y1, z0]],
            [0.0, 0.0, -1.0],
        );
        self.add_quad(
            [[x1, y0, z1], [x1, y0, z0], [x1, y1, z0], [x1, y1, z1]],
            [1.0, 0.0, 0.0],
        );
        self.add_quad(
            [[x0, y0, z0], [x0, y0, z1], [x0, y1, z1], [x0, y1, z0]],
            [-1.0, 0.0, 0.0],
        );
        self.add_quad(
            [[x0, y1, z1], [x1, y1, z1], [x1, y1, z0], [x0, y1, z0]],
            [0.0, 1.0, 0.0],
        );
        self.add_quad(
            [[x0, y0, z0], [x1, y0, z0], [x1, y0, z1], [x0, y0, z1]],
            [0.0, -1.0, 0.0],
        );
    }

    fn finish(self) -> MeshData {
        let mut furthest_point = 0.0f32;
        for p in self.positions.chunks(3) {
            let len = (p[0] * p[0] + p[1] * p[1] + p[2] * p[2]).sqrt();
            furthest_point = furthest_point.max(len);
        }
        MeshData {
            positions: self.positions,
            uvs: self.uvs,
            normals: self.normals,
            tangents: self.tangents,
            indices: self.indices,
            furthest_point,
        }
    }
}

/// Trunk plus canopy, feet at the origin.
pub fn build_tree() -> MeshData {
    let mut builder = MeshBuilder::new(false);
    builder.add_box([0.0, 2.0, 0.0], [0.4, 2.0, 0.4]);
    builder.add_box([0.0, 5.0, 0.0], [1.8, 1.4, 1.8]);
    builder.finish()
}

/// Two crossed upright quads, double-sided through alpha-free backfaces.
pub fn build_fern() -> MeshData {
    let mut builder = MeshBuilder::new(false);
    let h = 1.2;
    let w = 0.8;
    builder.add_quad(
        [[-w, 0.0, 0.0], [w, 0.0, 0.0], [w, h, 0.0], [-w, h, 0.0]],
        [0.0, 0.0, 1.0],
    );
    builder.add_quad(
        [[w, 0.0, 0.0], [-w, 0.0, 0.0], [-w, h, 0.0], [w, h, 0.0]],
        [0.0, 0.0, -1.0],
    );
    builder.add_quad(
        [[0.0, 0.0, -w], [0.0, 0.0, w], [0.0, h, w], [0.0, h, -w]],
        [1.0, 0.0, 0.0],
    );
    builder.add_quad(
        [[0.0, 0.0, w], [0.0, 0.0, -w], [0.0, h, -w], [0.0, h, w]],
        [-1.0, 0.0, 0.0],
    );
    builder.finish()
}

/// Post with a head box, feet at the origin.
pub fn build_lamp() -> MeshData {
    let mut builder = MeshBuilder::new(false);
    builder.add_box([0.0, 1.5, 0.0], [0.15, 1.5, 0.15]);
    builder.add_box([0.0, 3.2, 0.0], [0.45, 0.35, 0.45]);
    builder.finish()
}

/// Unit cube carrying tangents for the normal-mapped pipeline.
pub fn build_crate() -> MeshData {
    let mut builder = MeshBuilder::new(true);
    builder.add_box([0.0, 1.0, 0.0], [1.0, 1.0, 1.0]);
    builder.finish()
}

/// Player stand-in, a torso box over leg boxes, feet at the origin.
pub fn build_figure() -> MeshData {
    let mut builder = MeshBuilder::new(false);
    builder.add_box([0.0, 3.4, 0.0], [0.5, 0.5, 0.5]);
    builder.add_box([0.0, 2.1, 0.0], [0.7, 0.8, 0.4]);
    builder.add_box([-0.35, 0.65, 0.0], [0.25, 0.65, 0.25]);
    builder.add_box([0.35, 0.65, 0.0], [0.25, 0.65, 0.25]);
    builder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boxes_emit_six_quads() {
        let mesh = build_crate();
        assert_eq!(mesh.vertex_count(), 24);
        assert_eq!(mesh.index_count(), 36);
    }

    #[test]
    fn crate_tangents_are_unit_length() {
        let mesh = build_crate();
        let tangents = mesh.tangents.as_ref().unwrap();
        assert_eq!(tangents.len(), mesh.vertex_count() * 3);
        for t in tangents.chunks(3) {
            let len = (t[0] * t[0] + t[1] * t[1] + t[2] * t[2]).sqrt();
            assert!((len - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn foliage_models_carry_no_tangents() {
        assert!(build_tree().tangents.is_none());
        assert!(build_fern().tangents.is_none());
    }

    #[test]
    fn furthest_point_covers_the_canopy() {
        let mesh = build_tree();
        let expected = (1.8f32 * 1.8 + 6.4 * 6.4 + 1.8 * 1.8).sqrt();
        assert!((mesh.furthest_point - expected).abs() < 1e-4);
    }

    #[test]
    fn normals_match_their_face_winding() {
        let mesh = build_fern();
        // First quad faces +z, second faces -z.
        assert_eq!(mesh.normals[2], 1.0);
        assert_eq!(mesh.normals[14], -1.0);
    }
}
