//! Triangle mesh data shared between the importer, the scene graph and the
//! ray-tracing engine.
//!
//! A [`MeshData`] always carries one normal, texcoord, tangent and bitangent
//! per vertex once [`MeshData::ensure_attributes`] has run, which is what the
//! triangle-mesh programs expect.

use pathview_math::{Aabb, Vec2, Vec3};

/// An indexed triangle mesh with per-vertex shading attributes.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshData {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub texcoords: Vec<Vec2>,
    pub tangents: Vec<Vec3>,
    pub bitangents: Vec<Vec3>,

    /// Triangle indices (every 3 indices form a triangle)
    pub indices: Vec<u32>,

    pub bounds: Aabb,
}

impl MeshData {
    /// Create a mesh from positions and indices. No attributes are derived;
    /// call [`MeshData::ensure_attributes`] before handing it to a backend.
    pub fn new(positions: Vec<Vec3>, indices: Vec<u32>) -> Self {
        let bounds = Aabb::enclosing(positions.iter().copied());
        Self {
            positions,
            normals: Vec::new(),
            texcoords: Vec::new(),
            tangents: Vec::new(),
            bitangents: Vec::new(),
            indices,
            bounds,
        }
    }

    pub fn with_normals(mut self, normals: Vec<Vec3>) -> Self {
        self.normals = normals;
        self
    }

    pub fn with_texcoords(mut self, texcoords: Vec<Vec2>) -> Self {
        self.texcoords = texcoords;
        self
    }

    /// Number of triangles, which is the primitive count of a mesh shape.
    pub fn primitive_count(&self) -> u32 {
        (self.indices.len() / 3) as u32
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty() || self.indices.len() < 3
    }

    /// Vertex indices of triangle `i`, or `None` if any index is out of range.
    pub fn triangle(&self, i: usize) -> Option<[usize; 3]> {
        let face = self.indices.get(i * 3..i * 3 + 3)?;
        let count = self.positions.len();
        let tri = [face[0] as usize, face[1] as usize, face[2] as usize];
        tri.iter().all(|&v| v < count).then_some(tri)
    }

    /// Iterate over valid triangles as position triplets.
    pub fn triangles(&self) -> impl Iterator<Item = [Vec3; 3]> + '_ {
        (0..self.primitive_count() as usize).filter_map(move |i| {
            self.triangle(i)
                .map(|[a, b, c]| [self.positions[a], self.positions[b], self.positions[c]])
        })
    }

    /// Smooth vertex normals from area-weighted face normals (CCW winding).
    pub fn compute_normals(&mut self) {
        let mut normals = vec![Vec3::ZERO; self.positions.len()];

        for i in 0..self.primitive_count() as usize {
            let Some([i0, i1, i2]) = self.triangle(i) else {
                continue;
            };
            let p0 = self.positions[i0];
            let face_normal = (self.positions[i1] - p0).cross(self.positions[i2] - p0);
            normals[i0] += face_normal;
            normals[i1] += face_normal;
            normals[i2] += face_normal;
        }

        for normal in &mut normals {
            *normal = normal.try_normalize().unwrap_or(Vec3::Y);
        }

        self.normals = normals;
    }

    /// Per-vertex tangent frames.
    ///
    /// With texcoords the tangent follows the u direction of the
    /// parameterisation; without them an arbitrary frame around the normal is
    /// used. Requires normals.
    pub fn compute_tangents(&mut self) {
        let count = self.positions.len();
        let mut tangents = vec![Vec3::ZERO; count];

        if self.texcoords.len() == count {
            for i in 0..self.primitive_count() as usize {
                let Some([i0, i1, i2]) = self.triangle(i) else {
                    continue;
                };
                let e1 = self.positions[i1] - self.positions[i0];
                let e2 = self.positions[i2] - self.positions[i0];
                let d1 = self.texcoords[i1] - self.texcoords[i0];
                let d2 = self.texcoords[i2] - self.texcoords[i0];

                let det = d1.x * d2.y - d2.x * d1.y;
                if det.abs() < 1e-12 {
                    continue;
                }
                let tangent = (e1 * d2.y - e2 * d1.y) / det;
                tangents[i0] += tangent;
                tangents[i1] += tangent;
                tangents[i2] += tangent;
            }
        }

        let mut bitangents = vec![Vec3::ZERO; count];
        for v in 0..count {
            let n = self.normals.get(v).copied().unwrap_or(Vec3::Y);
            // Gram-Schmidt against the normal, falling back to any perpendicular.
            let t = (tangents[v] - n * n.dot(tangents[v]))
                .try_normalize()
                .unwrap_or_else(|| n.any_orthonormal_vector());
            tangents[v] = t;
            bitangents[v] = n.cross(t);
        }

        self.tangents = tangents;
        self.bitangents = bitangents;
    }

    /// Fill in any per-vertex attribute that is missing or does not match the
    /// vertex count.
    pub fn ensure_attributes(&mut self) {
        let count = self.positions.len();

        if self.normals.len() != count {
            if !self.normals.is_empty() {
                log::debug!(
                    "Normals array length ({}) doesn't match vertex count ({}), computing smooth normals",
                    self.normals.len(),
                    count
                );
            }
            self.compute_normals();
        }

        if self.texcoords.len() != count {
            self.texcoords = vec![Vec2::ZERO; count];
        }

        if self.tangents.len() != count || self.bitangents.len() != count {
            self.compute_tangents();
        }
    }

    /// Concatenate several meshes into one, offsetting indices.
    ///
    /// An attribute survives only if every part provides it for all of its
    /// vertices; the result has its attributes completed either way.
    pub fn merge(parts: impl IntoIterator<Item = MeshData>) -> MeshData {
        let parts: Vec<MeshData> = parts.into_iter().collect();
        let complete = |f: fn(&MeshData) -> usize| parts.iter().all(|m| f(m) == m.vertex_count());
        let keep_normals = complete(|m| m.normals.len());
        let keep_texcoords = complete(|m| m.texcoords.len());

        let mut merged = MeshData::default();
        for part in parts {
            let offset = merged.positions.len() as u32;
            merged.indices.extend(part.indices.iter().map(|i| i + offset));
            merged.positions.extend(part.positions);
            if keep_normals {
                merged.normals.extend(part.normals);
            }
            if keep_texcoords {
                merged.texcoords.extend(part.texcoords);
            }
        }

        merged.bounds = Aabb::enclosing(merged.positions.iter().copied());
        merged.ensure_attributes();
        merged
    }

    /// Bounding box centre.
    pub fn center(&self) -> Vec3 {
        self.bounds.centroid()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad() -> MeshData {
        let positions = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        ];
        MeshData::new(positions, vec![0, 1, 2, 0, 2, 3])
    }

    #[test]
    fn test_primitive_count_is_triangle_count() {
        let mesh = quad();
        assert_eq!(mesh.primitive_count(), 2);
        assert_eq!(mesh.vertex_count(), 4);
        assert!(!mesh.is_empty());
    }

    #[test]
    fn test_compute_normals_ccw() {
        let mut mesh = quad();
        mesh.compute_normals();

        // CCW in the XY plane viewed from +Z faces +Z
        for normal in &mesh.normals {
            assert!((normal.z - 1.0).abs() < 0.001);
        }
    }

    #[test]
    fn test_bounds_computation() {
        let mesh = MeshData::new(
            vec![
                Vec3::new(-1.0, -2.0, -3.0),
                Vec3::new(4.0, 5.0, 6.0),
                Vec3::new(0.0, 0.0, 0.0),
            ],
            vec![0, 1, 2],
        );

        assert!((mesh.bounds.x.min - (-1.0)).abs() < 0.001);
        assert!((mesh.bounds.x.max - 4.0).abs() < 0.001);
        assert!((mesh.bounds.z.min - (-3.0)).abs() < 0.001);
        assert!((mesh.bounds.z.max - 6.0).abs() < 0.001);
    }

    #[test]
    fn test_ensure_attributes_fills_everything() {
        let mut mesh = quad();
        mesh.ensure_attributes();

        assert_eq!(mesh.normals.len(), 4);
        assert_eq!(mesh.texcoords.len(), 4);
        assert_eq!(mesh.tangents.len(), 4);
        assert_eq!(mesh.bitangents.len(), 4);

        for v in 0..4 {
            let n = mesh.normals[v];
            let t = mesh.tangents[v];
            let b = mesh.bitangents[v];
            assert!(n.dot(t).abs() < 1e-5);
            assert!(n.dot(b).abs() < 1e-5);
            assert!((t.length() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_tangents_follow_u_direction() {
        let mut mesh = quad().with_texcoords(vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(0.0, 1.0),
        ]);
        mesh.ensure_attributes();

        for t in &mesh.tangents {
            assert!((t.x - 1.0).abs() < 1e-5);
        }
        for b in &mesh.bitangents {
            assert!((b.y - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_out_of_range_triangle_is_skipped() {
        let mesh = MeshData::new(vec![Vec3::ZERO, Vec3::X, Vec3::Y], vec![0, 1, 7]);
        assert!(mesh.triangle(0).is_none());
        assert_eq!(mesh.triangles().count(), 0);
    }

    #[test]
    fn test_merge_offsets_indices() {
        let mut a = quad();
        a.ensure_attributes();
        let b = MeshData::new(
            vec![Vec3::new(5.0, 0.0, 0.0), Vec3::new(6.0, 0.0, 0.0), Vec3::new(5.0, 1.0, 0.0)],
            vec![0, 1, 2],
        );

        let merged = MeshData::merge([a, b]);

        assert_eq!(merged.vertex_count(), 7);
        assert_eq!(merged.primitive_count(), 3);
        assert_eq!(&merged.indices[6..], &[4, 5, 6]);
        assert_eq!(merged.normals.len(), 7);
        assert!((merged.bounds.x.max - 6.0).abs() < 0.001);
    }
}
