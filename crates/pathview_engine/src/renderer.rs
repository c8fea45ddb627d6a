//! Core path tracing renderer.
//!
//! Implements progressive Monte Carlo path tracing with:
//! - Stratified jittered sampling inside each pixel
//! - Russian roulette path termination
//! - Running-average accumulation across launches
//! - Gamma correction of the displayed average

use crate::material::{Color, Material, Surface};
use crate::{HitRecord, Hittable};
use pathview_math::{Interval, PinholeCamera, Ray, Vec2, Vec4};
use pathview_scene::InstanceId;
use rand::{Rng, RngCore};
use std::collections::HashMap;

/// Render configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderSettings {
    /// Maximum number of surface interactions along one path
    pub max_depth: u32,
    /// Samples per pixel per launch along each axis
    pub sqrt_samples: u32,
    /// Depth after which paths may be terminated by Russian roulette
    pub rr_begin_depth: u32,
    /// Offset applied to secondary rays to avoid self-intersection
    pub scene_epsilon: f32,
    /// Radiance returned by rays that leave the scene
    pub background: Color,
    /// Substituted for samples that came out NaN or infinite
    pub bad_color: Color,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            max_depth: 5,
            sqrt_samples: 2,
            rr_begin_depth: 1,
            scene_epsilon: 1.0e-3,
            background: Color::ZERO,
            bad_color: Color::new(233.0, 5.0, 150.0),
        }
    }
}

impl RenderSettings {
    pub fn with_max_depth(mut self, depth: u32) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_sqrt_samples(mut self, sqrt_samples: u32) -> Self {
        self.sqrt_samples = sqrt_samples.max(1);
        self
    }

    pub fn with_background(mut self, background: Color) -> Self {
        self.background = background;
        self
    }

    pub fn samples_per_pixel(&self) -> u32 {
        self.sqrt_samples * self.sqrt_samples
    }
}

/// What a launch traces against: the top object plus the resolved surface
/// of every instance reachable from it.
pub struct SceneView<'a> {
    pub world: &'a dyn Hittable,
    pub surfaces: &'a HashMap<InstanceId, Surface>,
}

impl SceneView<'_> {
    fn surface(&self, rec: &HitRecord) -> Surface {
        rec.instance
            .and_then(|id| self.surfaces.get(&id).copied())
            .unwrap_or(Surface::Absorber)
    }
}

/// Radiance arriving along `ray`.
pub fn ray_color(
    ray: &Ray,
    scene: &SceneView<'_>,
    settings: &RenderSettings,
    rng: &mut dyn RngCore,
) -> Color {
    let mut radiance = Color::ZERO;
    let mut throughput = Color::ONE;
    let mut ray = *ray;

    for depth in 0..settings.max_depth {
        let mut rec = HitRecord::default();
        if !scene.world.hit(
            &ray,
            Interval::new(settings.scene_epsilon, f32::INFINITY),
            &mut rec,
        ) {
            radiance += throughput * settings.background;
            break;
        }

        let surface = scene.surface(&rec);
        radiance += throughput * surface.emitted(&rec);

        let Some((attenuation, scattered)) = surface.scatter(&ray, &rec, rng) else {
            break;
        };
        throughput *= attenuation;

        if depth >= settings.rr_begin_depth {
            let survive = throughput.max_element().min(1.0);
            if survive <= 0.0 || rng.gen::<f32>() >= survive {
                break;
            }
            throughput /= survive;
        }

        ray = scattered;
    }

    radiance
}

/// Primary ray through pixel `(x, y)` offset by `jitter` in [0, 1)^2.
///
/// Row 0 is the bottom of the image.
pub fn camera_ray(camera: &PinholeCamera, x: u32, y: u32, width: u32, height: u32, jitter: Vec2) -> Ray {
    let (eye, u, v, w) = camera.eye_uvw();
    let pixel = Vec2::new(x as f32, y as f32) + jitter;
    let d = pixel / Vec2::new(width as f32, height as f32) * 2.0 - Vec2::ONE;
    let direction = (d.x * u + d.y * v + w).normalize();
    Ray::new(eye, direction)
}

/// Average of one launch's stratified samples for a pixel.
pub fn render_pixel(
    scene: &SceneView<'_>,
    camera: &PinholeCamera,
    (x, y): (u32, u32),
    (width, height): (u32, u32),
    settings: &RenderSettings,
    rng: &mut dyn RngCore,
) -> Color {
    let n = settings.sqrt_samples.max(1);
    let cell = 1.0 / n as f32;
    let mut color = Color::ZERO;

    for sy in 0..n {
        for sx in 0..n {
            let jitter = Vec2::new(
                (sx as f32 + rng.gen::<f32>()) * cell,
                (sy as f32 + rng.gen::<f32>()) * cell,
            );
            let ray = camera_ray(camera, x, y, width, height, jitter);
            color += ray_color(&ray, scene, settings, rng);
        }
    }

    let color = color / (n * n) as f32;
    if color.is_finite() {
        color
    } else {
        settings.bad_color
    }
}

/// Convert a linear color component to gamma space (gamma 2.0).
#[inline]
pub fn linear_to_gamma(linear: f32) -> f32 {
    if linear > 0.0 {
        linear.sqrt()
    } else {
        0.0
    }
}

/// Fold one launch's sample into the running average.
///
/// Frame 0 replaces whatever was accumulated; frame `n` weighs the new
/// sample by `1 / (n + 1)`.
#[inline]
pub fn accumulate(previous: Color, sample: Color, frame: u32) -> Color {
    if frame == 0 {
        sample
    } else {
        previous.lerp(sample, 1.0 / (frame as f32 + 1.0))
    }
}

/// Display value of an accumulated linear color.
#[inline]
pub fn display_color(linear: Color) -> Vec4 {
    Vec4::new(
        linear_to_gamma(linear.x),
        linear_to_gamma(linear.y),
        linear_to_gamma(linear.z),
        1.0,
    )
}

/// Linear running average plus the gamma-encoded buffer handed to callers.
#[derive(Debug, Clone, Default)]
pub struct Accumulator {
    width: u32,
    height: u32,
    linear: Vec<Color>,
    display: Vec<Vec4>,
}

impl Accumulator {
    pub fn new(width: u32, height: u32) -> Self {
        let len = width as usize * height as usize;
        Self {
            width,
            height,
            linear: vec![Color::ZERO; len],
            display: vec![Vec4::ZERO; len],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn display(&self) -> &[Vec4] {
        &self.display
    }

    pub fn linear(&self) -> &[Color] {
        &self.linear
    }

    /// Blend a full frame of samples, row-major with row 0 at the bottom.
    pub fn blend(&mut self, samples: &[Color], frame: u32) {
        for ((linear, display), sample) in self
            .linear
            .iter_mut()
            .zip(self.display.iter_mut())
            .zip(samples)
        {
            *linear = accumulate(*linear, *sample, frame);
            *display = display_color(*linear);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::InstanceHittable;
    use crate::material::{DiffuseLight, Lambertian};
    use crate::Sphere;
    use pathview_math::Vec3;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::Arc;

    fn camera() -> PinholeCamera {
        PinholeCamera::new(
            Vec3::new(0.0, 0.0, 5.0),
            Vec3::ZERO,
            Vec3::Y,
            45.0,
            45.0,
        )
    }

    #[test]
    fn test_linear_to_gamma() {
        assert_eq!(linear_to_gamma(0.0), 0.0);
        assert_eq!(linear_to_gamma(-1.0), 0.0);
        assert!((linear_to_gamma(0.25) - 0.5).abs() < 1e-6);
        assert!((linear_to_gamma(1.0) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_accumulate_running_average() {
        let a = Color::splat(1.0);
        let b = Color::splat(0.0);
        assert_eq!(accumulate(Color::splat(9.0), a, 0), a);
        // frame 1: average of two samples
        assert!((accumulate(a, b, 1) - Color::splat(0.5)).length() < 1e-6);
        // frame 3: the fourth sample gets weight 1/4
        assert!((accumulate(a, b, 3) - Color::splat(0.75)).length() < 1e-6);
    }

    #[test]
    fn test_accumulator_blend_converges_to_mean() {
        let mut acc = Accumulator::new(1, 1);
        for (frame, value) in [1.0, 0.0, 1.0, 0.0].into_iter().enumerate() {
            acc.blend(&[Color::splat(value)], frame as u32);
        }
        assert!((acc.linear()[0] - Color::splat(0.5)).length() < 1e-6);
        assert!((acc.display()[0].x - 0.5f32.sqrt()).abs() < 1e-6);
        assert_eq!(acc.display()[0].w, 1.0);
    }

    #[test]
    fn test_camera_ray_centre_looks_forward() {
        let cam = camera();
        let ray = camera_ray(&cam, 50, 50, 100, 100, Vec2::ZERO);
        assert!((ray.direction - Vec3::new(0.0, 0.0, -1.0)).length() < 1e-5);
        assert_eq!(ray.origin, Vec3::new(0.0, 0.0, 5.0));
    }

    #[test]
    fn test_camera_ray_row_zero_is_bottom() {
        let cam = camera();
        let bottom = camera_ray(&cam, 50, 0, 100, 100, Vec2::splat(0.5));
        let top = camera_ray(&cam, 50, 99, 100, 100, Vec2::splat(0.5));
        assert!(bottom.direction.y < 0.0);
        assert!(top.direction.y > 0.0);
    }

    #[test]
    fn test_miss_returns_background() {
        let world = crate::HittableList::new();
        let surfaces = HashMap::new();
        let scene = SceneView {
            world: &world,
            surfaces: &surfaces,
        };
        let settings = RenderSettings::default().with_background(Color::new(0.1, 0.2, 0.3));
        let mut rng = StdRng::seed_from_u64(3);
        let ray = Ray::new(Vec3::ZERO, Vec3::Z);
        assert_eq!(
            ray_color(&ray, &scene, &settings, &mut rng),
            Color::new(0.1, 0.2, 0.3)
        );
    }

    #[test]
    fn test_emitter_seen_directly() {
        let sphere = Arc::new(Sphere::new(Vec3::ZERO, 1.0));
        let world = InstanceHittable::new(InstanceId(1), sphere);
        let mut surfaces = HashMap::new();
        surfaces.insert(
            InstanceId(1),
            Surface::Emitter(DiffuseLight::new(Color::new(15.0, 15.0, 5.0))),
        );
        let scene = SceneView {
            world: &world,
            surfaces: &surfaces,
        };
        let mut rng = StdRng::seed_from_u64(3);
        let ray = Ray::new(Vec3::new(0.0, 0.0, 5.0), Vec3::new(0.0, 0.0, -1.0));
        let color = ray_color(&ray, &scene, &RenderSettings::default(), &mut rng);
        assert_eq!(color, Color::new(15.0, 15.0, 5.0));
    }

    #[test]
    fn test_unlit_diffuse_is_black() {
        let sphere = Arc::new(Sphere::new(Vec3::ZERO, 1.0));
        let world = InstanceHittable::new(InstanceId(1), sphere);
        let mut surfaces = HashMap::new();
        surfaces.insert(InstanceId(1), Surface::Diffuse(Lambertian::new(Color::ONE)));
        let scene = SceneView {
            world: &world,
            surfaces: &surfaces,
        };
        let mut rng = StdRng::seed_from_u64(3);
        let cam = camera();
        let color = render_pixel(
            &scene,
            &cam,
            (5, 5),
            (10, 10),
            &RenderSettings::default(),
            &mut rng,
        );
        assert_eq!(color, Color::ZERO);
    }

    #[test]
    fn test_untagged_hit_absorbs() {
        let world = Sphere::new(Vec3::ZERO, 1.0);
        let surfaces = HashMap::new();
        let scene = SceneView {
            world: &world,
            surfaces: &surfaces,
        };
        let mut rng = StdRng::seed_from_u64(3);
        let ray = Ray::new(Vec3::new(0.0, 0.0, 5.0), Vec3::new(0.0, 0.0, -1.0));
        let settings = RenderSettings::default().with_background(Color::ONE);
        assert_eq!(ray_color(&ray, &scene, &settings, &mut rng), Color::ZERO);
    }
}
