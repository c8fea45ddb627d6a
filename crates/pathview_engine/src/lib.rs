//! PathView engine - a CPU reference implementation of the ray-tracing
//! backend the scene graph drives.
//!
//! This crate provides:
//!
//! - **Primitives**: spheres, parallelograms and BVH-accelerated triangle meshes
//! - **Node graph**: instances, transforms and groups compiled into hittable trees
//! - **Shading**: diffuse, mirror and emissive surfaces driven by instance parameters
//! - **Progressive output**: per-launch samples blended into a running average
//!
//! # Example
//!
//! ```ignore
//! use pathview_engine::CpuEngine;
//! use pathview_scene::{EditorSettings, RenderContext, SceneEditor};
//!
//! let ctx = RenderContext::new(CpuEngine::default());
//! let mut editor = SceneEditor::new(ctx, EditorSettings::default())?;
//! editor.tick()?;
//! ```

pub mod bvh;
pub mod engine;
pub mod hittable;
pub mod instance;
pub mod material;
pub mod parallelogram;
pub mod programs;
pub mod renderer;
pub mod sphere;
pub mod triangle;

pub use bvh::BvhNode;
pub use engine::{CpuEngine, PINHOLE_ENTRY};
pub use hittable::{HitRecord, Hittable, HittableList};
pub use instance::{InstanceHittable, TransformedHittable};
pub use material::{Color, DiffuseLight, Lambertian, Material, Mirror, Surface};
pub use parallelogram::Parallelogram;
pub use programs::{ProgramRegistry, Routine};
pub use renderer::{linear_to_gamma, Accumulator, RenderSettings};
pub use sphere::Sphere;
pub use triangle::{mesh_triangles, MeshTriangle};
