//! The rendering-context wrapper: a backend plus everything cached per
//! backend context.

use std::collections::BTreeMap;

use crate::backend::{MaterialId, MaterialKind, PrimitivePrograms, RayTracingBackend};
use crate::catalog::{PrimitiveCatalog, ProgramLibrary};
use crate::error::Result;
use crate::primitive::PrimitiveKind;

/// Owns the ray-tracing backend and the objects shared by every node created
/// through it: the primitive catalog and one material per kind.
pub struct RenderContext {
    backend: Box<dyn RayTracingBackend>,
    catalog: PrimitiveCatalog,
    materials: BTreeMap<MaterialKind, MaterialId>,
}

impl RenderContext {
    pub fn new(backend: impl RayTracingBackend + 'static) -> Self {
        Self::with_library(backend, ProgramLibrary::default())
    }

    pub fn with_library(backend: impl RayTracingBackend + 'static, library: ProgramLibrary) -> Self {
        Self {
            backend: Box::new(backend),
            catalog: PrimitiveCatalog::new(library),
            materials: BTreeMap::new(),
        }
    }

    pub fn backend(&self) -> &dyn RayTracingBackend {
        self.backend.as_ref()
    }

    pub fn backend_mut(&mut self) -> &mut dyn RayTracingBackend {
        self.backend.as_mut()
    }

    pub fn catalog(&self) -> &PrimitiveCatalog {
        &self.catalog
    }

    /// Shared routine pair for `kind`. See [`PrimitiveCatalog::get_or_create`].
    pub fn programs(&mut self, kind: PrimitiveKind) -> Result<PrimitivePrograms> {
        self.catalog.get_or_create(self.backend.as_mut(), kind)
    }

    /// Shared material for `kind`, created on first use.
    pub fn material(&mut self, kind: MaterialKind) -> Result<MaterialId> {
        if let Some(id) = self.materials.get(&kind) {
            return Ok(*id);
        }
        let id = self.backend.create_material(kind)?;
        log::debug!("Created {:?} material", kind);
        self.materials.insert(kind, id);
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Call, RecordingBackend};

    #[test]
    fn test_material_created_once() {
        let backend = RecordingBackend::new();
        let log = backend.log();
        let mut ctx = RenderContext::new(backend);

        let a = ctx.material(MaterialKind::Diffuse).unwrap();
        let b = ctx.material(MaterialKind::Diffuse).unwrap();
        let c = ctx.material(MaterialKind::DiffuseEmitter).unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
        let creations = log
            .calls()
            .iter()
            .filter(|call| matches!(call, Call::CreateMaterial(_)))
            .count();
        assert_eq!(creations, 2);
    }

    #[test]
    fn test_programs_go_through_catalog() {
        let backend = RecordingBackend::new();
        let log = backend.log();
        let mut ctx = RenderContext::new(backend);

        ctx.programs(PrimitiveKind::Mesh).unwrap();
        ctx.programs(PrimitiveKind::Mesh).unwrap();

        assert_eq!(log.program_creations(), 2);
        assert!(ctx.catalog().get(PrimitiveKind::Mesh).is_some());
    }
}
