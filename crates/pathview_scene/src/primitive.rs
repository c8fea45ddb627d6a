//! Primitive kinds and the immutable shape data a geometry node renders.

use std::fmt;
use std::sync::Arc;

use pathview_math::{Aabb, Vec3, Vec4};

use crate::mesh::MeshData;

/// The parametric and imported shapes the scene can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PrimitiveKind {
    Sphere,
    Parallelogram,
    Mesh,
}

impl PrimitiveKind {
    pub const ALL: [PrimitiveKind; 3] = [
        PrimitiveKind::Sphere,
        PrimitiveKind::Parallelogram,
        PrimitiveKind::Mesh,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PrimitiveKind::Sphere => "sphere",
            PrimitiveKind::Parallelogram => "parallelogram",
            PrimitiveKind::Mesh => "mesh",
        }
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Object-space primitive data uploaded into a shape container.
///
/// Never mutated once created; instancing shares it.
#[derive(Debug, Clone, PartialEq)]
pub enum ShapeData {
    /// Centre in `xyz`, radius in `w`.
    Sphere { sphere: Vec4 },

    /// A flat quad spanning `anchor + a*offset1 + b*offset2` for `a, b` in [0, 1].
    ///
    /// `plane` holds the unit normal and its distance from the origin;
    /// `v1`/`v2` are the offsets divided by their squared lengths, so a hit
    /// point's barycentric coordinates are plain dot products.
    Parallelogram {
        plane: Vec4,
        anchor: Vec3,
        v1: Vec3,
        v2: Vec3,
    },

    Mesh(Arc<MeshData>),
}

impl ShapeData {
    /// Unit sphere at the origin.
    pub fn unit_sphere() -> Self {
        Self::sphere(Vec3::ZERO, 1.0)
    }

    pub fn sphere(center: Vec3, radius: f32) -> Self {
        ShapeData::Sphere {
            sphere: center.extend(radius),
        }
    }

    /// Unit square in the XZ plane centred on the origin, facing +Y.
    pub fn unit_parallelogram() -> Self {
        Self::parallelogram(
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(-0.5, 0.0, -0.5),
        )
    }

    pub fn parallelogram(offset1: Vec3, offset2: Vec3, anchor: Vec3) -> Self {
        let normal = offset1.cross(offset2).normalize_or_zero();
        ShapeData::Parallelogram {
            plane: normal.extend(normal.dot(anchor)),
            anchor,
            v1: offset1 / offset1.dot(offset1),
            v2: offset2 / offset2.dot(offset2),
        }
    }

    pub fn mesh(mesh: MeshData) -> Self {
        ShapeData::Mesh(Arc::new(mesh))
    }

    /// Default data for the parametric kinds. Meshes have no default.
    pub fn default_for(kind: PrimitiveKind) -> Option<Self> {
        match kind {
            PrimitiveKind::Sphere => Some(Self::unit_sphere()),
            PrimitiveKind::Parallelogram => Some(Self::unit_parallelogram()),
            PrimitiveKind::Mesh => None,
        }
    }

    pub fn kind(&self) -> PrimitiveKind {
        match self {
            ShapeData::Sphere { .. } => PrimitiveKind::Sphere,
            ShapeData::Parallelogram { .. } => PrimitiveKind::Parallelogram,
            ShapeData::Mesh(_) => PrimitiveKind::Mesh,
        }
    }

    /// Number of primitives the intersection program is launched over.
    pub fn primitive_count(&self) -> u32 {
        match self {
            ShapeData::Sphere { .. } | ShapeData::Parallelogram { .. } => 1,
            ShapeData::Mesh(mesh) => mesh.primitive_count(),
        }
    }

    /// The two edge vectors of a parallelogram, recovered from `v1`/`v2`.
    pub fn parallelogram_edges(&self) -> Option<(Vec3, Vec3)> {
        match self {
            ShapeData::Parallelogram { v1, v2, .. } => {
                Some((*v1 / v1.length_squared(), *v2 / v2.length_squared()))
            }
            _ => None,
        }
    }

    /// Object-space bounds.
    pub fn bounds(&self) -> Aabb {
        match self {
            ShapeData::Sphere { sphere } => {
                let center = sphere.truncate();
                let r = Vec3::splat(sphere.w.abs());
                Aabb::from_points(center - r, center + r)
            }
            ShapeData::Parallelogram { anchor, .. } => {
                let (e1, e2) = self.parallelogram_edges().unwrap_or((Vec3::ZERO, Vec3::ZERO));
                Aabb::enclosing([*anchor, *anchor + e1, *anchor + e2, *anchor + e1 + e2])
            }
            ShapeData::Mesh(mesh) => mesh.bounds,
        }
    }
}
