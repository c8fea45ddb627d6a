//! Position / Euler rotation / scale decomposition used by scene nodes.

use glam::{Mat4, Vec3};

/// A node's local pose. Rotation is stored in degrees, the unit the editor
/// works in; conversion to radians happens when the matrix is composed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub position: Vec3,
    pub rotation_degrees: Vec3,
    pub scale: Vec3,
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation_degrees: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}

impl Pose {
    pub fn new(position: Vec3, rotation_degrees: Vec3, scale: Vec3) -> Self {
        Self {
            position,
            rotation_degrees,
            scale,
        }
    }

    /// Object-to-world matrix, `T * Rx * Ry * Rz * S`.
    pub fn matrix(&self) -> Mat4 {
        compose_pose(self.position, self.rotation_degrees, self.scale)
    }

    /// Closed-form inverse of [`Pose::matrix`]:
    /// `S^-1 * Rz^T * Ry^T * Rx^T * T^-1`.
    ///
    /// A zero scale component yields non-finite entries, exactly as a general
    /// inversion of the singular forward matrix would.
    pub fn inverse_matrix(&self) -> Mat4 {
        let r = self.rotation_degrees * (std::f32::consts::PI / 180.0);
        Mat4::from_scale(self.scale.recip())
            * Mat4::from_rotation_z(-r.z)
            * Mat4::from_rotation_y(-r.y)
            * Mat4::from_rotation_x(-r.x)
            * Mat4::from_translation(-self.position)
    }
}

/// Compose translate * rotateX * rotateY * rotateZ * scale.
///
/// The order is fixed; rotations do not commute and stored scenes depend on
/// this exact sequence.
pub fn compose_pose(position: Vec3, rotation_degrees: Vec3, scale: Vec3) -> Mat4 {
    let r = rotation_degrees * (std::f32::consts::PI / 180.0);
    Mat4::from_translation(position)
        * Mat4::from_rotation_x(r.x)
        * Mat4::from_rotation_y(r.y)
        * Mat4::from_rotation_z(r.z)
        * Mat4::from_scale(scale)
}
