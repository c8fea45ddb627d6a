//! Triangle mesh primitives for ray tracing.
//!
//! Uses the Möller-Trumbore algorithm for ray-triangle intersection. Each
//! triangle borrows its vertices from the shared mesh rather than copying them.

use crate::hittable::{HitRecord, Hittable};
use pathview_math::{Aabb, Interval, Ray, Vec3};
use pathview_scene::MeshData;
use std::sync::Arc;

/// One triangle of a shared mesh.
pub struct MeshTriangle {
    mesh: Arc<MeshData>,
    indices: [usize; 3],
    /// Unit face normal, counter-clockwise winding
    normal: Vec3,
    bbox: Aabb,
}

impl MeshTriangle {
    /// Triangle `index` of `mesh`, or `None` when the index is out of range or
    /// references a missing vertex.
    pub fn new(mesh: Arc<MeshData>, index: usize) -> Option<Self> {
        let indices = mesh.triangle(index)?;
        let [v0, v1, v2] = indices.map(|i| mesh.positions[i]);
        let normal = (v1 - v0).cross(v2 - v0).normalize_or_zero();
        let bbox = Aabb::enclosing([v0, v1, v2]);

        Some(Self {
            mesh,
            indices,
            normal,
            bbox,
        })
    }

    fn vertices(&self) -> [Vec3; 3] {
        self.indices.map(|i| self.mesh.positions[i])
    }

    /// Interpolated vertex normal, falling back to the face normal.
    fn shading_normal(&self, u: f32, v: f32) -> Vec3 {
        let normals = &self.mesh.normals;
        if normals.len() != self.mesh.positions.len() {
            return self.normal;
        }
        let [n0, n1, n2] = self.indices.map(|i| normals[i]);
        let n = (1.0 - u - v) * n0 + u * n1 + v * n2;
        let n = n.normalize_or_zero();
        if n == Vec3::ZERO {
            self.normal
        } else {
            n
        }
    }

    fn texcoords(&self, u: f32, v: f32) -> (f32, f32) {
        let uvs = &self.mesh.texcoords;
        if uvs.len() != self.mesh.positions.len() {
            return (u, v);
        }
        let [t0, t1, t2] = self.indices.map(|i| uvs[i]);
        let t = (1.0 - u - v) * t0 + u * t1 + v * t2;
        (t.x, t.y)
    }
}

/// Every well-formed triangle of `mesh` as a hittable.
pub fn mesh_triangles(mesh: &Arc<MeshData>) -> Vec<Arc<dyn Hittable>> {
    (0..mesh.primitive_count() as usize)
        .filter_map(|i| MeshTriangle::new(Arc::clone(mesh), i))
        .map(|t| Arc::new(t) as Arc<dyn Hittable>)
        .collect()
}

impl Hittable for MeshTriangle {
    fn hit(&self, ray: &Ray, ray_t: Interval, rec: &mut HitRecord) -> bool {
        let [v0, v1, v2] = self.vertices();
        let edge1 = v1 - v0;
        let edge2 = v2 - v0;

        let h = ray.direction.cross(edge2);
        let a = edge1.dot(h);

        // Parallel to the triangle plane
        if a.abs() < 1e-8 {
            return false;
        }

        let f = 1.0 / a;
        let s = ray.origin - v0;
        let u = f * s.dot(h);
        if !(0.0..=1.0).contains(&u) {
            return false;
        }

        let q = s.cross(edge1);
        let v = f * ray.direction.dot(q);
        if v < 0.0 || u + v > 1.0 {
            return false;
        }

        let t = f * edge2.dot(q);
        if !ray_t.surrounds(t) {
            return false;
        }

        rec.t = t;
        rec.p = ray.at(t);
        rec.front_face = ray.direction.dot(self.normal) < 0.0;
        let shading = self.shading_normal(u, v);
        rec.normal = if rec.front_face { shading } else { -shading };
        (rec.u, rec.v) = self.texcoords(u, v);

        true
    }

    fn bounding_box(&self) -> Aabb {
        self.bbox
    }
}
