use crate::core::vertex::Vertex;

/// Flat mesh arrays produced by the terrain builder and the OBJ loader.
/// Nothing in here touches the GPU; upload happens through the render module.
pub struct MeshData {
    pub positions: Vec<f32>,
    pub uvs: Vec<f32>,
    pub normals: Vec<f32>,
    /// Present only for normal-mapped models.
    pub tangents: Option<Vec<f32>>,
    pub indices: Vec<u32>,
    /// Distance of the furthest vertex from the model origin.
    pub furthest_point: f32,
}

impl MeshData {
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    /// Interleaves the flat arrays into the GPU vertex layout. Missing
    /// tangents become zero vectors, which the entity shader treats as
    /// "no normal map".
    pub fn interleave(&self) -> Vec<Vertex> {
        let count = self.vertex_count();
        let mut vertices = Vec::with_capacity(count);
        for i in 0..count {
            let tangent = match &self.tangents {
                Some(t) => [t[i * 3], t[i * 3 + 1], t[i * 3 + 2]],
                None => [0.0, 0.0, 0.0],
            };
            vertices.push(Vertex {
                position: [
                    self.positions[i * 3],
                    self.positions[i * 3 + 1],
                    self.positions[i * 3 + 2],
                ],
                normal: [
                    self.normals[i * 3],
                    self.normals[i * 3 + 1],
                    self.normals[i * 3 + 2],
                ],
                uv: [self.uvs[i * 2], self.uvs[i * 2 + 1]],
                tangent,
            });
        }
        vertices
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interleave_matches_flat_arrays() {
        let mesh = MeshData {
            positions: vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
            uvs: vec![0.0, 0.5, 1.0, 0.25],
            normals: vec![0.0, 1.0, 0.0, 1.0, 0.0, 0.0],
            tangents: None,
            indices: vec![0, 1, 0],
            furthest_point: 6.0,
        };

        let vertices = mesh.interleave();
        assert_eq!(vertices.len(), 2);
        assert_eq!(vertices[0].position, [1.0, 2.0, 3.0]);
        assert_eq!(vertices[1].uv, [1.0, 0.25]);
        assert_eq!(vertices[1].tangent, [0.0, 0.0, 0.0]);
    }
}
