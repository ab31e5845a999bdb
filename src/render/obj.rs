use cgmath::{InnerSpace, Vector2, Vector3, Zero};

use crate::core::mesh::MeshData;

/// OBJ model loader with a single vertex-indexing arena shared by plain and
/// normal-mapped models; `with_tangents` switches tangent accumulation on for
/// the latter. Vertices reused with a different uv/normal pair chain into
/// arena duplicates through `duplicate` indices.
struct IndexedVertex {
    position: Vector3<f32>,
    uv_index: Option<usize>,
    normal_index: Option<usize>,
    duplicate: Option<usize>,
    tangent_sum: Vector3<f32>,
    length: f32,
}

impl IndexedVertex {
    fn new(position: Vector3<f32>) -> Self {
        let length = position.magnitude();
        IndexedVertex {
            position,
            uv_index: None,
            normal_index: None,
            duplicate: None,
            tangent_sum: Vector3::zero(),
            length,
        }
    }

    fn is_set(&self) -> bool {
        self.uv_index.is_some() && self.normal_index.is_some()
    }

    fn matches(&self, uv_index: usize, normal_index: usize) -> bool {
        self.uv_index == Some(uv_index) && self.normal_index == Some(normal_index)
    }
}

pub fn load_obj(source: &str, with_tangents: bool) -> Result<MeshData, String> {
    let mut raw_uvs: Vec<Vector2<f32>> = Vec::new();
    let mut raw_normals: Vec<Vector3<f32>> = Vec::new();
    let mut arena: Vec<IndexedVertex> = Vec::new();
    let mut indices: Vec<u32> = Vec::new();

    for (line_no, line) in source.lines().enumerate() {
        let mut parts = line.split_whitespace();
        let parse = |v: Option<&str>, what: &str| -> Result<f32, String> {
            v.ok_or_else(|| format!("line {}: missing {}", line_no + 1, what))?
                .parse::<f32>()
                .map_err(|e| format!("line {}: bad {}: {}", line_no + 1, what, e))
        };
        match parts.next() {
            Some("v") => {
                let x = parse(parts.next(), "x")?;
                let y = parse(parts.next(), "y")?;
                let z = parse(parts.next(), "z")?;
                arena.push(IndexedVertex::new(Vector3::new(x, y, z)));
            }
            Some("vt") => {
                let u = parse(parts.next(), "u")?;
                let v = parse(parts.next(), "v")?;
                raw_uvs.push(Vector2::new(u, v));
            }
            Some("vn") => {
                let x = parse(parts.next(), "x")?;
                let y = parse(parts.next(), "y")?;
                let z = parse(parts.next(), "z")?;
                raw_normals.push(Vector3::new(x, y, z));
            }
            Some("f") => {
                let mut face = [0usize; 3];
                for slot in face.iter_mut() {
                    let corner = parts
                        .next()
                        .ok_or_else(|| format!("line {}: face needs 3 corners", line_no + 1))?;
                    let (v, vt, vn) = parse_corner(corner)
                        .ok_or_else(|| format!("line {}: bad face corner {}", line_no + 1, corner))?;
                    *slot = process_vertex(&mut arena, &mut indices, v, vt, vn)?;
                }
                if with_tangents {
                    accumulate_tangent(&mut arena, &raw_uvs, face);
                }
            }
            _ => {}
        }
    }

    Ok(bake(arena, raw_uvs, raw_normals, indices, with_tangents))
}

/// "17/4/9" -> zero-based (vertex, uv, normal) indices.
fn parse_corner(corner: &str) -> Option<(usize, usize, usize)> {
    let mut it = corner.split('/');
    let v = it.next()?.parse::<usize>().ok()?.checked_sub(1)?;
    let vt = it.next()?.parse::<usize>().ok()?.checked_sub(1)?;
    let vn = it.next()?.parse::<usize>().ok()?.checked_sub(1)?;
    Some((v, vt, vn))
}

/// Resolve a face corner to an arena slot: claim the base vertex if it is
/// still untyped, reuse it on an exact (uv, normal) match, otherwise walk or
/// extend the duplicate chain.
fn process_vertex(
    arena: &mut Vec<IndexedVertex>,
    indices: &mut Vec<u32>,
    vertex: usize,
    uv: usize,
    normal: usize,
) -> Result<usize, String> {
    if vertex >= arena.len() {
        return Err(format!("face references missing vertex {}", vertex + 1));
    }

    let mut current = vertex;
    loop {
        if !arena[current].is_set() {
            arena[current].uv_index = Some(uv);
            arena[current].normal_index = Some(normal);
            indices.push(current as u32);
            return Ok(current);
        }
        if arena[current].matches(uv, normal) {
            indices.push(current as u32);
            return Ok(current);
        }
        match arena[current].duplicate {
            Some(next) => current = next,
            None => {
                let position = arena[current].position;
                let mut dup = IndexedVertex::new(position);
                dup.uv_index = Some(uv);
                dup.normal_index = Some(normal);
                let slot = arena.len();
                arena.push(dup);
                arena[current].duplicate = Some(slot);
                indices.push(slot as u32);
                return Ok(slot);
            }
        }
    }
}

/// Face tangent from edge deltas against uv deltas, summed into each corner
/// for later averaging.
fn accumulate_tangent(arena: &mut [IndexedVertex], raw_uvs: &[Vector2<f32>], face: [usize; 3]) {
    let p0 = arena[face[0]].position;
    let p1 = arena[face[1]].position;
    let p2 = arena[face[2]].position;
    let uv = |slot: usize| -> Vector2<f32> {
        arena[slot]
            .uv_index
            .and_then(|i| raw_uvs.get(i).copied())
            .unwrap_or_else(Vector2::zero)
    };
    let (uv0, uv1, uv2) = (uv(face[0]), uv(face[1]), uv(face[2]));

    let edge1 = p1 - p0;
    let edge2 = p2 - p0;
    let delta1 = uv1 - uv0;
    let delta2 = uv2 - uv0;
    let det = delta1.x * delta2.y - delta2.x * delta1.y;
    if det.abs() < 1e-12 {
        return;
    }
    let r = 1.0 / det;
    let tangent = (edge1 * delta2.y - edge2 * delta1.y) * r;
    for slot in face {
        arena[slot].tangent_sum += tangent;
    }
}

fn bake(
    arena: Vec<IndexedVertex>,
    raw_uvs: Vec<Vector2<f32>>,
    raw_normals: Vec<Vector3<f32>>,
    indices: Vec<u32>,
    with_tangents: bool,
) -> MeshData {
    let count = arena.len();
    let mut positions = Vec::with_capacity(count * 3);
    let mut uvs = Vec::with_capacity(count * 2);
    let mut normals = Vec::with_capacity(count * 3);
    let mut tangents = if with_tangents {
        Some(Vec::with_capacity(count * 3))
    } else {
        None
    };
    let mut furthest_point = 0.0f32;

    for vertex in &arena {
        furthest_point = furthest_point.max(vertex.length);
        positions.push(vertex.position.x);
        positions.push(vertex.position.y);
        positions.push(vertex.position.z);

        let uv = vertex
            .uv_index
            .and_then(|i| raw_uvs.get(i).copied())
            .unwrap_or_else(Vector2::zero);
        uvs.push(uv.x);
        uvs.push(1.0 - uv.y);

        let normal = vertex
            .normal_index
            .and_then(|i| raw_normals.get(i).copied())
            .unwrap_or(Vector3::new(0.0, 1.0, 0.0));
        normals.push(normal.x);
        normals.push(normal.y);
        normals.push(normal.z);

        if let Some(t) = tangents.as_mut() {
            let averaged = if vertex.tangent_sum.is_zero() {
                Vector3::zero()
            } else {
                vertex.tangent_sum.normalize()
            };
            t.push(averaged.x);
            t.push(averaged.y);
            t.push(averaged.z);
        }
    }

    MeshData {
        positions,
        uvs,
        normals,
        tangents,
        indices,
        furthest_point,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUAD: &str = "\
v 0.0 0.0 0.0
v 1.0 0.0 0.0
v 1.0 1.0 0.0
v 0.0 1.0 0.0
vt 0.0 0.0
vt 1.0 0.0
vt 1.0 1.0
vt 0.0 1.0
vn 0.0 0.0 1.0
f 1/1/1 2/2/1 3/3/1
f 1/1/1 3/3/1 4/4/1
";

    #[test]
    fn shared_corners_reuse_arena_slots() {
        let mesh = load_obj(QUAD, false).unwrap();
        // Two triangles sharing an edge: 4 vertices, 6 indices, no
        // duplicates because every corner reuses the same uv/normal pair.
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.indices, vec![0, 1, 2, 0, 2, 3]);
        assert!(mesh.tangents.is_none());
    }

    #[test]
    fn uv_seams_append_duplicates() {
        // Same positions, second face maps corner 1 to a different uv.
        let seam = "\
v 0.0 0.0 0.0
v 1.0 0.0 0.0
v 1.0 1.0 0.0
vt 0.0 0.0
vt 1.0 0.0
vt 1.0 1.0
vn 0.0 0.0 1.0
f 1/1/1 2/2/1 3/3/1
f 1/2/1 2/2/1 3/3/1
";
        let mesh = load_obj(seam, false).unwrap();
        assert_eq!(mesh.vertex_count(), 4);
        // The duplicate shares its source's position.
        assert_eq!(mesh.positions[9..12], mesh.positions[0..3]);
        assert_eq!(mesh.indices, vec![0, 1, 2, 3, 1, 2]);
    }

    #[test]
    fn uv_v_axis_is_flipped() {
        let mesh = load_obj(QUAD, false).unwrap();
        // vt 0,0 -> uv 0,1 after the flip.
        assert_eq!(mesh.uvs[0..2], [0.0, 1.0]);
        assert_eq!(mesh.uvs[4..6], [1.0, 0.0]);
    }

    #[test]
    fn tangents_follow_the_uv_gradient() {
        let mesh = load_obj(QUAD, true).unwrap();
        let tangents = mesh.tangents.as_ref().unwrap();
        assert_eq!(tangents.len(), mesh.vertex_count() * 3);
        // uv u runs along +x on this quad, so tangents point along +x.
        for t in tangents.chunks(3) {
            assert!((t[0] - 1.0).abs() < 1e-4, "{:?}", t);
            assert!(t[1].abs() < 1e-4);
        }
    }

    #[test]
    fn furthest_point_tracks_the_largest_vertex() {
        let mesh = load_obj(QUAD, false).unwrap();
        assert!((mesh.furthest_point - 2.0f32.sqrt()).abs() < 1e-5);
    }

    #[test]
    fn malformed_faces_are_reported() {
        assert!(load_obj("f 1/1/1 2/2/2 3/3/3", false).is_err());
        assert!(load_obj("v 0 0 zero", false).is_err());
    }
}
