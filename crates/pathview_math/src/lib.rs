//! PathView math - glam re-exports plus the small geometric types shared by
//! the scene graph and the ray-tracing backends.

// Re-export glam for convenience
pub use glam::*;

mod aabb;
mod camera;
mod interval;
mod pose;
mod ray;
mod transform;

pub use aabb::Aabb;
pub use camera::PinholeCamera;
pub use interval::Interval;
pub use pose::{compose_pose, Pose};
pub use ray::Ray;
pub use transform::{to_row_major, Mat4Ext};
