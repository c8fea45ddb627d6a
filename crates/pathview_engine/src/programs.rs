//! Device program lookup for the CPU engine.
//!
//! A program source is a module path plus an entry-point name. The CPU
//! engine has no compiler; each known pair maps onto one of its built-in
//! routines, and anything else is reported as missing.

use pathview_scene::{BackendError, PrimitiveKind, ProgramSource};
use std::collections::BTreeMap;

/// Built-in routine a program resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Routine {
    Intersect(PrimitiveKind),
    Bounds(PrimitiveKind),
}

impl Routine {
    pub fn kind(&self) -> PrimitiveKind {
        match *self {
            Routine::Intersect(kind) | Routine::Bounds(kind) => kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramRegistry {
    routines: BTreeMap<(String, String), Routine>,
}

impl Default for ProgramRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ProgramRegistry {
    pub fn empty() -> Self {
        Self {
            routines: BTreeMap::new(),
        }
    }

    /// The modules shipped with the viewer.
    pub fn builtin() -> Self {
        Self::empty()
            .with_module(
                "ptx/sphere.cu.ptx",
                PrimitiveKind::Sphere,
                "intersect_sphere",
                "bounds_sphere",
            )
            .with_module(
                "ptx/parallelogram.cu.ptx",
                PrimitiveKind::Parallelogram,
                "intersect",
                "bounds",
            )
            .with_module(
                "ptx/triangle_mesh.cu.ptx",
                PrimitiveKind::Mesh,
                "mesh_intersect",
                "mesh_bounds",
            )
    }

    /// Register a module exposing the intersection and bounds routines of `kind`.
    pub fn with_module(
        mut self,
        path: impl Into<String>,
        kind: PrimitiveKind,
        intersect: impl Into<String>,
        bounds: impl Into<String>,
    ) -> Self {
        let path = path.into();
        self.routines
            .insert((path.clone(), intersect.into()), Routine::Intersect(kind));
        self.routines
            .insert((path, bounds.into()), Routine::Bounds(kind));
        self
    }

    pub fn resolve(&self, source: &ProgramSource) -> Result<Routine, BackendError> {
        self.routines
            .get(&(source.path.clone(), source.entry.clone()))
            .copied()
            .ok_or_else(|| BackendError::ProgramNotFound {
                path: source.path.clone(),
                entry: source.entry.clone(),
            })
    }

    pub fn len(&self) -> usize {
        self.routines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routines.is_empty()
    }
}
