use std::collections::HashMap;

use anyhow::{anyhow, Context, Result};
use glam::{Vec2, Vec3};

use crate::mesh::{Mesh, VertexLayout};

const STRIDE: usize = 8;

/// Parses an OBJ file from memory into an indexed mesh.
///
/// Vertices are laid out as `position.xyz`, `normal.xyz`, `uv.xy`. Missing
/// normals are rebuilt from face geometry, missing texture coordinates are
/// left at zero.
pub fn load_obj_from_str(data: &str) -> Result<Mesh> {
    let mut positions = Vec::new();
    let mut normals = Vec::new();
    let mut texcoords = Vec::new();
    let mut faces: Vec<[FaceIndex; 3]> = Vec::new();

    for (line_no, line) in data.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let mut parts = trimmed.split_whitespace();
        let Some(tag) = parts.next() else {
            continue;
        };
        match tag {
            "v" => positions.push(
                parse_vec3(parts)
                    .with_context(|| format!("invalid vertex on line {}", line_no + 1))?,
            ),
            "vn" => normals.push(
                parse_vec3(parts)
                    .with_context(|| format!("invalid normal on line {}", line_no + 1))?,
            ),
            "vt" => texcoords.push(
                parse_vec2(parts)
                    .with_context(|| format!("invalid texture coordinate on line {}", line_no + 1))?,
            ),
            "f" => {
                let polygon = parse_face(parts)
                    .with_context(|| format!("invalid face on line {}", line_no + 1))?;
                triangulate_face(&polygon, &mut faces);
            }
            _ => {}
        }
    }

    if positions.is_empty() {
        return Err(anyhow!("OBJ file does not define any vertices"));
    }

    let attributes = Attributes {
        positions: &positions,
        normals: &normals,
        texcoords: &texcoords,
    };
    let (mut vertices, indices) = build_vertices(&attributes, &faces)?;
    if needs_normals(&vertices) {
        compute_normals(&mut vertices, &indices);
    }
    Ok(Mesh {
        layout: VertexLayout::PositionNormalUv,
        vertices,
        indices: Some(indices),
    })
}

fn parse_vec3<'a>(mut parts: impl Iterator<Item = &'a str>) -> Result<Vec3> {
    let mut next = || -> Result<f32> {
        Ok(parts
            .next()
            .ok_or_else(|| anyhow!("missing vector component"))?
            .parse::<f32>()?)
    };
    Ok(Vec3::new(next()?, next()?, next()?))
}

fn parse_vec2<'a>(mut parts: impl Iterator<Item = &'a str>) -> Result<Vec2> {
    let u = parts
        .next()
        .ok_or_else(|| anyhow!("missing texture coordinate"))?
        .parse::<f32>()?;
    // `v` is optional in the format
    let v = match parts.next() {
        Some(value) => value.parse::<f32>()?,
        None => 0.0,
    };
    Ok(Vec2::new(u, v))
}

fn parse_face<'a>(parts: impl Iterator<Item = &'a str>) -> Result<Vec<FaceIndex>> {
    let mut indices = Vec::new();
    for part in parts {
        let mut segments = part.split('/');
        let v = segments
            .next()
            .ok_or_else(|| anyhow!("missing vertex index"))?
            .parse::<i32>()?;
        let vt = optional_index(segments.next());
        let vn = optional_index(segments.next());
        indices.push(FaceIndex { v, vt, vn });
    }
    if indices.len() < 3 {
        return Err(anyhow!("faces must reference at least 3 vertices"));
    }
    Ok(indices)
}

fn optional_index(segment: Option<&str>) -> i32 {
    segment
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse::<i32>().ok())
        .unwrap_or(0)
}

fn triangulate_face(polygon: &[FaceIndex], faces: &mut Vec<[FaceIndex; 3]>) {
    for i in 1..polygon.len().saturating_sub(1) {
        faces.push([polygon[0], polygon[i], polygon[i + 1]]);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Key {
    position: usize,
    texcoord: Option<usize>,
    normal: Option<usize>,
}

#[derive(Debug, Clone, Copy)]
struct FaceIndex {
    v: i32,
    vt: i32,
    vn: i32,
}

struct Attributes<'a> {
    positions: &'a [Vec3],
    normals: &'a [Vec3],
    texcoords: &'a [Vec2],
}

fn build_vertices(
    attributes: &Attributes<'_>,
    faces: &[[FaceIndex; 3]],
) -> Result<(Vec<f32>, Vec<u32>)> {
    let mut lookup: HashMap<Key, u32> = HashMap::new();
    let mut vertices = Vec::new();
    let mut indices = Vec::new();

    for face in faces {
        for idx in face {
            let position = fix_index(idx.v, attributes.positions.len())
                .ok_or_else(|| anyhow!("invalid vertex index {}", idx.v))?;
            let key = Key {
                position,
                texcoord: fix_index(idx.vt, attributes.texcoords.len()),
                normal: fix_index(idx.vn, attributes.normals.len()),
            };
            let next_index = (vertices.len() / STRIDE) as u32;
            let entry = lookup.entry(key).or_insert_with(|| {
                let p = attributes.positions[key.position];
                let n = key
                    .normal
                    .map(|i| attributes.normals[i])
                    .unwrap_or(Vec3::ZERO);
                let t = key
                    .texcoord
                    .map(|i| attributes.texcoords[i])
                    .unwrap_or(Vec2::ZERO);
                vertices.extend_from_slice(&[p.x, p.y, p.z, n.x, n.y, n.z, t.x, t.y]);
                next_index
            });
            indices.push(*entry);
        }
    }

    Ok((vertices, indices))
}

fn fix_index(index: i32, len: usize) -> Option<usize> {
    if index > 0 {
        let zero_based = index as usize - 1;
        (zero_based < len).then_some(zero_based)
    } else if index < 0 {
        let abs = index.unsigned_abs() as usize;
        (abs <= len).then_some(len - abs)
    } else {
        None
    }
}

fn needs_normals(vertices: &[f32]) -> bool {
    vertices
        .chunks_exact(STRIDE)
        .any(|chunk| chunk[3] == 0.0 && chunk[4] == 0.0 && chunk[5] == 0.0)
}

fn compute_normals(vertices: &mut [f32], indices: &[u32]) {
    let vertex_count = vertices.len() / STRIDE;
    let mut accum = vec![Vec3::ZERO; vertex_count];
    for triangle in indices.chunks_exact(3) {
        let [i0, i1, i2] = [triangle[0] as usize, triangle[1] as usize, triangle[2] as usize];
        let p0 = vertex_position(vertices, i0);
        let normal =
            (vertex_position(vertices, i1) - p0).cross(vertex_position(vertices, i2) - p0);
        if normal.length_squared() > f32::EPSILON {
            let normal = normal.normalize();
            accum[i0] += normal;
            accum[i1] += normal;
            accum[i2] += normal;
        }
    }

    for (i, normal) in accum.into_iter().enumerate() {
        let normal = normal.normalize_or_zero();
        vertices[i * STRIDE + 3..i * STRIDE + 6].copy_from_slice(&normal.to_array());
    }
}

fn vertex_position(vertices: &[f32], i: usize) -> Vec3 {
    Vec3::from_slice(&vertices[i * STRIDE..i * STRIDE + 3])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_triangle() {
        let obj = "\nv 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";
        let mesh = load_obj_from_str(obj).unwrap();
        assert_eq!(mesh.indices, Some(vec![0, 1, 2]));
        assert_eq!(mesh.vertices.len(), 24);
        assert_eq!(mesh.vertex_count(), 3);
    }

    #[test]
    fn computes_missing_normals() {
        let obj = "\nv 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";
        let mesh = load_obj_from_str(obj).unwrap();
        for chunk in mesh.vertices.chunks_exact(STRIDE) {
            let normal = Vec3::new(chunk[3], chunk[4], chunk[5]);
            assert!((normal - Vec3::Z).length() < 1e-5);
        }
    }

    #[test]
    fn keeps_texture_coordinates_and_splits_shared_positions() {
        let obj = "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\n\
                   vt 0 0\nvt 1 0\nvt 1 1\nvt 0 1\nvt 0.5 0.5\n\
                   vn 0 0 1\n\
                   f 1/1/1 2/2/1 3/3/1 4/4/1\n\
                   f 1/5/1 3/3/1 4/4/1\n";
        let mesh = load_obj_from_str(obj).unwrap();
        // quad -> two triangles, plus one more using a new uv on vertex 1
        assert_eq!(mesh.triangle_count(), 3);
        assert_eq!(mesh.vertex_count(), 5);
        let third = &mesh.vertices[2 * STRIDE..3 * STRIDE];
        assert_eq!(&third[6..8], &[1.0, 1.0]);
    }

    #[test]
    fn negative_indices_count_from_the_end() {
        let obj = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf -3 -2 -1\n";
        let mesh = load_obj_from_str(obj).unwrap();
        assert_eq!(mesh.indices, Some(vec![0, 1, 2]));
    }

    #[test]
    fn rejects_out_of_range_faces() {
        assert!(load_obj_from_str("v 0 0 0\nf 1 2 3\n").is_err());
        assert!(load_obj_from_str("# nothing here\n").is_err());
    }
}
