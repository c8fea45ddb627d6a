//! Wrappers that place shared geometry in the scene.
//!
//! An engine instance reuses its geometry's prototype BVH untouched; a
//! transform node maps rays into the child's local space and the hit back
//! out, so moving a node never touches primitive data.

use crate::hittable::{HitRecord, Hittable};
use pathview_math::{Aabb, Interval, Mat4, Mat4Ext, Ray};
use pathview_scene::InstanceId;
use std::sync::Arc;

/// Shared geometry tagged with the instance whose material shades it.
pub struct InstanceHittable {
    instance: InstanceId,
    geometry: Arc<dyn Hittable>,
}

impl InstanceHittable {
    pub fn new(instance: InstanceId, geometry: Arc<dyn Hittable>) -> Self {
        Self { instance, geometry }
    }
}

impl Hittable for InstanceHittable {
    fn hit(&self, ray: &Ray, ray_t: Interval, rec: &mut HitRecord) -> bool {
        if !self.geometry.hit(ray, ray_t, rec) {
            return false;
        }
        rec.instance = Some(self.instance);
        true
    }

    fn bounding_box(&self) -> Aabb {
        self.geometry.bounding_box()
    }
}

/// A child placed by an object-to-world matrix.
pub struct TransformedHittable {
    child: Arc<dyn Hittable>,
    matrix: Mat4,
    inverse: Mat4,
    bbox: Aabb,
}

impl TransformedHittable {
    pub fn new(child: Arc<dyn Hittable>, matrix: Mat4, inverse: Mat4) -> Self {
        let bbox = matrix.transform_aabb(&child.bounding_box());
        Self {
            child,
            matrix,
            inverse,
            bbox,
        }
    }
}

impl Hittable for TransformedHittable {
    fn hit(&self, ray: &Ray, ray_t: Interval, rec: &mut HitRecord) -> bool {
        if !self.bbox.hit(ray, ray_t) {
            return false;
        }

        // Direction stays unnormalised so t means the same thing in both spaces.
        let local_ray = Ray::new(
            self.inverse.transform_point3(ray.origin),
            self.inverse.transform_vector3(ray.direction),
        );

        let mut local = HitRecord::default();
        if !self.child.hit(&local_ray, ray_t, &mut local) {
            return false;
        }

        rec.t = local.t;
        rec.p = self.matrix.transform_point3(local.p);
        rec.normal = self
            .inverse
            .transform_normal_with_inverse(local.normal)
            .normalize_or_zero();
        rec.u = local.u;
        rec.v = local.v;
        rec.front_face = local.front_face;
        rec.instance = local.instance;

        true
    }

    fn bounding_box(&self) -> Aabb {
        self.bbox
    }
}
