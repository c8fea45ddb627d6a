//! Surface responses for the three built-in material kinds.
//!
//! Colours come from per-instance parameters: `diffuse_color` tints diffuse
//! and mirror surfaces, `emission_color` drives emitters.

use crate::hittable::HitRecord;
use pathview_math::{Ray, Vec3};
use pathview_scene::{MaterialKind, ParamValue};
use rand::{Rng, RngCore};
use std::collections::HashMap;

/// Color type alias (RGB values typically 0-1)
pub type Color = Vec3;

pub const DIFFUSE_COLOR: &str = "diffuse_color";
pub const EMISSION_COLOR: &str = "emission_color";

/// Trait for materials that describe how light interacts with surfaces.
pub trait Material: Send + Sync {
    /// Scatter an incoming ray.
    ///
    /// Returns the attenuation and outgoing ray, or `None` if the ray is absorbed.
    fn scatter(&self, ray_in: &Ray, rec: &HitRecord, rng: &mut dyn RngCore) -> Option<(Color, Ray)>;

    /// Light emitted at the hit point. Most materials emit nothing.
    fn emitted(&self, _rec: &HitRecord) -> Color {
        Color::ZERO
    }
}

/// Lambertian (diffuse) material.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lambertian {
    albedo: Color,
}

impl Lambertian {
    pub fn new(albedo: Color) -> Self {
        Self { albedo }
    }
}

impl Material for Lambertian {
    fn scatter(&self, _ray_in: &Ray, rec: &HitRecord, rng: &mut dyn RngCore) -> Option<(Color, Ray)> {
        let mut direction = rec.normal + random_unit_vector(rng);

        // Catch degenerate scatter direction
        if direction.length_squared() < 1e-8 {
            direction = rec.normal;
        }

        Some((self.albedo, Ray::new(rec.p, direction)))
    }
}

/// Perfect mirror tinted by its albedo.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mirror {
    albedo: Color,
}

impl Mirror {
    pub fn new(albedo: Color) -> Self {
        Self { albedo }
    }
}

impl Material for Mirror {
    fn scatter(&self, ray_in: &Ray, rec: &HitRecord, _rng: &mut dyn RngCore) -> Option<(Color, Ray)> {
        let reflected = reflect(ray_in.direction.normalize(), rec.normal);
        Some((self.albedo, Ray::new(rec.p, reflected)))
    }
}

/// Emits light from both faces and absorbs everything arriving.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiffuseLight {
    emit: Color,
}

impl DiffuseLight {
    pub fn new(emit: Color) -> Self {
        Self { emit }
    }
}

impl Material for DiffuseLight {
    fn scatter(&self, _ray_in: &Ray, _rec: &HitRecord, _rng: &mut dyn RngCore) -> Option<(Color, Ray)> {
        None
    }

    fn emitted(&self, _rec: &HitRecord) -> Color {
        self.emit
    }
}

/// The resolved response of one instance: its material kind bound to its
/// current parameters. Instances without a material absorb.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Surface {
    Diffuse(Lambertian),
    Reflection(Mirror),
    Emitter(DiffuseLight),
    Absorber,
}

impl Surface {
    pub fn resolve(kind: Option<MaterialKind>, params: &HashMap<String, ParamValue>) -> Self {
        let color = |name: &str, default: Color| {
            params
                .get(name)
                .and_then(ParamValue::as_vec3)
                .unwrap_or(default)
        };

        match kind {
            Some(MaterialKind::Diffuse) => {
                Surface::Diffuse(Lambertian::new(color(DIFFUSE_COLOR, Color::ONE)))
            }
            Some(MaterialKind::Reflection) => {
                Surface::Reflection(Mirror::new(color(DIFFUSE_COLOR, Color::ONE)))
            }
            Some(MaterialKind::DiffuseEmitter) => {
                Surface::Emitter(DiffuseLight::new(color(EMISSION_COLOR, Color::ZERO)))
            }
            None => Surface::Absorber,
        }
    }
}

impl Material for Surface {
    fn scatter(&self, ray_in: &Ray, rec: &HitRecord, rng: &mut dyn RngCore) -> Option<(Color, Ray)> {
        match self {
            Surface::Diffuse(m) => m.scatter(ray_in, rec, rng),
            Surface::Reflection(m) => m.scatter(ray_in, rec, rng),
            Surface::Emitter(m) => m.scatter(ray_in, rec, rng),
            Surface::Absorber => None,
        }
    }

    fn emitted(&self, rec: &HitRecord) -> Color {
        match self {
            Surface::Emitter(m) => m.emitted(rec),
            _ => Color::ZERO,
        }
    }
}

/// Reflect a vector about a normal.
#[inline]
fn reflect(v: Vec3, n: Vec3) -> Vec3 {
    v - 2.0 * v.dot(n) * n
}

/// Uniformly distributed unit vector, by rejection sampling the unit ball.
pub fn random_unit_vector(rng: &mut dyn RngCore) -> Vec3 {
    loop {
        let v = Vec3::new(
            rng.gen::<f32>() * 2.0 - 1.0,
            rng.gen::<f32>() * 2.0 - 1.0,
            rng.gen::<f32>() * 2.0 - 1.0,
        );
        let len_sq = v.length_squared();
        if len_sq > 1e-6 && len_sq <= 1.0 {
            return v / len_sq.sqrt();
        }
    }
}
