//! Flat quad primitive: plane test, then barycentric range check.

use crate::hittable::{HitRecord, Hittable};
use pathview_math::{Aabb, Interval, Ray, Vec3, Vec4};

pub struct Parallelogram {
    /// Unit normal in `xyz`, signed distance from the origin in `w`.
    plane: Vec4,
    anchor: Vec3,
    /// Edge vectors scaled by their inverse squared length.
    v1: Vec3,
    v2: Vec3,
    bbox: Aabb,
}

impl Parallelogram {
    pub fn new(plane: Vec4, anchor: Vec3, v1: Vec3, v2: Vec3) -> Self {
        let edge = |v: Vec3| {
            let len2 = v.length_squared();
            if len2 > 0.0 {
                v / len2
            } else {
                Vec3::ZERO
            }
        };
        let (e1, e2) = (edge(v1), edge(v2));
        let bbox = Aabb::enclosing([anchor, anchor + e1, anchor + e2, anchor + e1 + e2]);

        Self {
            plane,
            anchor,
            v1,
            v2,
            bbox,
        }
    }
}

impl Hittable for Parallelogram {
    fn hit(&self, ray: &Ray, ray_t: Interval, rec: &mut HitRecord) -> bool {
        let n = self.plane.truncate();
        let denom = n.dot(ray.direction);
        if denom.abs() < 1e-8 {
            return false;
        }

        let t = (self.plane.w - n.dot(ray.origin)) / denom;
        if !ray_t.surrounds(t) {
            return false;
        }

        let p = ray.at(t);
        let vi = p - self.anchor;
        let a1 = self.v1.dot(vi);
        let a2 = self.v2.dot(vi);
        if !(0.0..=1.0).contains(&a1) || !(0.0..=1.0).contains(&a2) {
            return false;
        }

        rec.t = t;
        rec.p = p;
        rec.set_face_normal(ray, n);
        rec.u = a1;
        rec.v = a2;

        true
    }

    fn bounding_box(&self) -> Aabb {
        self.bbox
    }
}
