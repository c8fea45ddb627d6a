// Transform utilities for Mat4
//
// Backends take matrices as 16 row-major floats with an explicit inverse,
// glam stores them column-major.

use crate::Aabb;
use glam::{Mat4, Vec3};

/// Extension trait for Mat4 to provide additional transform utilities
pub trait Mat4Ext {
    /// Transform an axis-aligned bounding box.
    /// Computes the bounding box of all 8 transformed corners.
    fn transform_aabb(&self, aabb: &Aabb) -> Aabb;

    /// Transform a surface normal with the inverse-transpose of the upper 3x3.
    /// `self` must be the inverse of the object-to-world matrix.
    fn transform_normal_with_inverse(&self, normal: Vec3) -> Vec3;

    /// Component-wise comparison within `tolerance`.
    fn approx_eq(&self, other: &Mat4, tolerance: f32) -> bool;
}

impl Mat4Ext for Mat4 {
    fn transform_aabb(&self, aabb: &Aabb) -> Aabb {
        if aabb.is_empty() {
            return *aabb;
        }
        Aabb::enclosing(aabb.corners().iter().map(|&c| self.transform_point3(c)))
    }

    fn transform_normal_with_inverse(&self, normal: Vec3) -> Vec3 {
        self.transpose().transform_vector3(normal)
    }

    fn approx_eq(&self, other: &Mat4, tolerance: f32) -> bool {
        self.to_cols_array()
            .iter()
            .zip(other.to_cols_array().iter())
            .all(|(a, b)| (a - b).abs() <= tolerance)
    }
}

/// Flatten a matrix into 16 row-major floats.
pub fn to_row_major(m: &Mat4) -> [f32; 16] {
    m.transpose().to_cols_array()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn test_to_row_major_puts_translation_last_in_rows() {
        let m = Mat4::from_translation(Vec3::new(10.0, 20.0, 30.0));
        let rows = to_row_major(&m);

        assert_eq!(rows[3], 10.0);
        assert_eq!(rows[7], 20.0);
        assert_eq!(rows[11], 30.0);
        assert_eq!(rows[15], 1.0);
    }

    #[test]
    fn test_transform_aabb_translation() {
        let mat = Mat4::from_translation(Vec3::splat(5.0));
        let aabb = Aabb::from_points(Vec3::ZERO, Vec3::ONE);
        let transformed = mat.transform_aabb(&aabb);

        assert!((transformed.min() - Vec3::splat(5.0)).length() < 0.001);
        assert!((transformed.max() - Vec3::splat(6.0)).length() < 0.001);
    }

    #[test]
    fn test_transform_aabb_rotation_grows_box() {
        let mat = Mat4::from_rotation_z(FRAC_PI_2 / 2.0);
        let aabb = Aabb::from_points(Vec3::splat(-1.0), Vec3::splat(1.0));
        let transformed = mat.transform_aabb(&aabb);

        // 45 degrees about Z: the XY extent becomes the square's diagonal.
        assert!((transformed.x.max - 2.0_f32.sqrt()).abs() < 0.001);
        assert!((transformed.z.max - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_transform_aabb_keeps_empty() {
        assert!(Mat4::IDENTITY.transform_aabb(&Aabb::EMPTY).is_empty());
    }

    #[test]
    fn test_normal_under_non_uniform_scale() {
        // A plane tilted 45 degrees, squashed along Y.
        let m = Mat4::from_scale(Vec3::new(1.0, 0.5, 1.0));
        let n = m.inverse().transform_normal_with_inverse(Vec3::new(1.0, 1.0, 0.0).normalize());

        // Inverse-transpose stretches the normal's Y component.
        assert!(n.y > n.x);
    }

    #[test]
    fn test_approx_eq() {
        let a = Mat4::from_rotation_y(0.3);
        let b = a * Mat4::from_translation(Vec3::splat(1e-7));
        assert!(a.approx_eq(&b, 1e-5));
        assert!(!a.approx_eq(&Mat4::IDENTITY, 1e-5));
    }
}
