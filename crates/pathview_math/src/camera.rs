use glam::Vec3;

/// Pinhole camera described by an eye point and the U/V/W frame that a
/// ray-generation program spans the image plane with.
///
/// `W` points from the eye to the look-at point and keeps its length; `U`
/// and `V` are scaled by the tangent of the half field of view times that
/// length, so a pixel's direction is `dx * U + dy * V + W` for
/// `dx, dy` in [-1, 1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PinholeCamera {
    eye: Vec3,
    look_at: Vec3,
    up: Vec3,
    hfov: f32,
    vfov: f32,
    u: Vec3,
    v: Vec3,
    w: Vec3,
}

impl PinholeCamera {
    /// Create a camera. Field-of-view angles are in degrees.
    pub fn new(eye: Vec3, look_at: Vec3, up: Vec3, hfov: f32, vfov: f32) -> Self {
        let mut camera = Self {
            eye,
            look_at,
            up,
            hfov,
            vfov,
            u: Vec3::X,
            v: Vec3::Y,
            w: Vec3::Z,
        };
        camera.calc_vectors();
        camera
    }

    /// Replace all parameters and recompute the basis.
    pub fn set_parameters(&mut self, eye: Vec3, look_at: Vec3, up: Vec3, hfov: f32, vfov: f32) {
        self.eye = eye;
        self.look_at = look_at;
        self.up = up;
        self.hfov = hfov;
        self.vfov = vfov;
        self.calc_vectors();
    }

    /// Change only the field of view, e.g. after the output aspect changed.
    pub fn set_fov(&mut self, hfov: f32, vfov: f32) {
        self.hfov = hfov;
        self.vfov = vfov;
        self.calc_vectors();
    }

    fn calc_vectors(&mut self) {
        self.w = self.look_at - self.eye;
        let lookdir_len = self.w.length();
        self.u = self.w.cross(self.up).normalize();
        self.v = self.u.cross(self.w).normalize();
        self.u *= lookdir_len * (self.hfov * 0.5).to_radians().tan();
        self.v *= lookdir_len * (self.vfov * 0.5).to_radians().tan();
    }

    /// Eye position and U, V, W basis vectors.
    pub fn eye_uvw(&self) -> (Vec3, Vec3, Vec3, Vec3) {
        (self.eye, self.u, self.v, self.w)
    }

    pub fn eye(&self) -> Vec3 {
        self.eye
    }

    pub fn look_at(&self) -> Vec3 {
        self.look_at
    }

    pub fn up(&self) -> Vec3 {
        self.up
    }

    pub fn hfov(&self) -> f32 {
        self.hfov
    }

    pub fn vfov(&self) -> f32 {
        self.vfov
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basis_points_at_target() {
        let camera = PinholeCamera::new(
            Vec3::new(278.0, 273.0, -900.0),
            Vec3::new(278.0, 273.0, 0.0),
            Vec3::Y,
            35.0,
            35.0,
        );
        let (eye, u, v, w) = camera.eye_uvw();

        assert_eq!(eye, Vec3::new(278.0, 273.0, -900.0));
        assert!((w - Vec3::new(0.0, 0.0, 900.0)).length() < 1e-3);
        assert!(u.dot(w).abs() < 1e-2);
        assert!(v.dot(w).abs() < 1e-2);
        assert!(v.y > 0.0);
    }

    #[test]
    fn test_half_fov_scaling() {
        let camera = PinholeCamera::new(Vec3::ZERO, Vec3::new(0.0, 0.0, 2.0), Vec3::Y, 90.0, 90.0);
        let (_, u, v, _) = camera.eye_uvw();

        // tan(45deg) * |W| = 2
        assert!((u.length() - 2.0).abs() < 1e-4);
        assert!((v.length() - 2.0).abs() < 1e-4);
    }

    #[test]
    fn test_set_fov_rescales_u_only() {
        let mut camera = PinholeCamera::new(Vec3::ZERO, Vec3::Z, Vec3::Y, 35.0, 35.0);
        let (_, u0, v0, _) = camera.eye_uvw();

        camera.set_fov(70.0, 35.0);
        let (_, u1, v1, _) = camera.eye_uvw();

        assert!(u1.length() > u0.length());
        assert!((v1 - v0).length() < 1e-6);
    }
}
