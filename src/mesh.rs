use serde::{Deserialize, Serialize};

/// Interleaved vertex formats used by the scene programs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VertexLayout {
    /// `position.xyz`
    Position,
    /// `position.xyz, uv.xy`
    PositionUv,
    /// `position.xyz, normal.xyz, uv.xy`
    PositionNormalUv,
}

impl VertexLayout {
    /// Number of `f32` components per vertex.
    pub const fn components(self) -> usize {
        match self {
            Self::Position => 3,
            Self::PositionUv => 5,
            Self::PositionNormalUv => 8,
        }
    }

    pub const fn stride(self) -> usize {
        self.components() * std::mem::size_of::<f32>()
    }
}

/// CPU-side geometry ready to be uploaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mesh {
    pub layout: VertexLayout,
    pub vertices: Vec<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indices: Option<Vec<u32>>,
}

impl Mesh {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / self.layout.components()
    }

    /// Number of vertices a draw of this mesh submits.
    pub fn element_count(&self) -> usize {
        match &self.indices {
            Some(indices) => indices.len(),
            None => self.vertex_count(),
        }
    }

    pub fn triangle_count(&self) -> usize {
        self.element_count() / 3
    }

    /// Unit cube centred on the origin with outward normals and per-face UVs.
    ///
    /// Stands in for models that fail to load.
    pub fn unit_cube() -> Self {
        const FACES: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
            // normal, u axis, v axis
            ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
            ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
            ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
            ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
            ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
            ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
        ];
        const CORNERS: [(f32, f32); 4] = [(-0.5, -0.5), (0.5, -0.5), (0.5, 0.5), (-0.5, 0.5)];

        let mut vertices = Vec::with_capacity(24 * 8);
        let mut indices = Vec::with_capacity(36);
        for (face, (normal, u_axis, v_axis)) in FACES.iter().enumerate() {
            let base = (face * 4) as u32;
            for (u, v) in CORNERS {
                for axis in 0..3 {
                    vertices.push(normal[axis] * 0.5 + u_axis[axis] * u + v_axis[axis] * v);
                }
                vertices.extend_from_slice(normal);
                vertices.extend_from_slice(&[u + 0.5, 0.5 - v]);
            }
            indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }

        Self {
            layout: VertexLayout::PositionNormalUv,
            vertices,
            indices: Some(indices),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn unit_cube_faces_wind_counter_clockwise_outwards() {
        let cube = Mesh::unit_cube();
        assert_eq!(cube.vertex_count(), 24);
        assert_eq!(cube.triangle_count(), 12);
        let stride = cube.layout.components();
        let indices = cube.indices.as_ref().unwrap();
        for triangle in indices.chunks_exact(3) {
            let p = |i: u32| Vec3::from_slice(&cube.vertices[i as usize * stride..][..3]);
            let n = Vec3::from_slice(&cube.vertices[triangle[0] as usize * stride + 3..][..3]);
            let face_normal = (p(triangle[1]) - p(triangle[0])).cross(p(triangle[2]) - p(triangle[0]));
            assert!(face_normal.dot(n) > 0.0);
        }
    }
}
