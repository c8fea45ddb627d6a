//! Where primitive programs live, and the per-context cache of compiled
//! routine pairs.

use std::collections::BTreeMap;

use crate::backend::{
    BackendError, PrimitivePrograms, ProgramId, ProgramSource, RayTracingBackend,
};
use crate::error::{Result, SceneError};
use crate::primitive::PrimitiveKind;

/// Module path plus intersection and bounding-box entry points for one kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramLocation {
    pub path: String,
    pub intersection: String,
    pub bounds: String,
}

impl ProgramLocation {
    pub fn new(
        path: impl Into<String>,
        intersection: impl Into<String>,
        bounds: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            intersection: intersection.into(),
            bounds: bounds.into(),
        }
    }

    fn intersection_source(&self) -> ProgramSource {
        ProgramSource::new(&self.path, &self.intersection)
    }

    fn bounds_source(&self) -> ProgramSource {
        ProgramSource::new(&self.path, &self.bounds)
    }
}

/// Program locations per primitive kind.
///
/// A kind without a location cannot be instantiated; asking for it is a
/// configuration error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramLibrary {
    locations: BTreeMap<PrimitiveKind, ProgramLocation>,
}

impl Default for ProgramLibrary {
    fn default() -> Self {
        Self::empty()
            .with_location(
                PrimitiveKind::Sphere,
                ProgramLocation::new("ptx/sphere.cu.ptx", "intersect_sphere", "bounds_sphere"),
            )
            .with_location(
                PrimitiveKind::Parallelogram,
                ProgramLocation::new("ptx/parallelogram.cu.ptx", "intersect", "bounds"),
            )
            .with_location(
                PrimitiveKind::Mesh,
                ProgramLocation::new("ptx/triangle_mesh.cu.ptx", "mesh_intersect", "mesh_bounds"),
            )
    }
}

impl ProgramLibrary {
    pub fn empty() -> Self {
        Self {
            locations: BTreeMap::new(),
        }
    }

    pub fn with_location(mut self, kind: PrimitiveKind, location: ProgramLocation) -> Self {
        self.locations.insert(kind, location);
        self
    }

    pub fn without(mut self, kind: PrimitiveKind) -> Self {
        self.locations.remove(&kind);
        self
    }

    pub fn location(&self, kind: PrimitiveKind) -> Option<&ProgramLocation> {
        self.locations.get(&kind)
    }
}

/// Compiled routine pairs, created lazily and at most once per kind.
#[derive(Debug, Default)]
pub struct PrimitiveCatalog {
    library: ProgramLibrary,
    entries: BTreeMap<PrimitiveKind, PrimitivePrograms>,
    /// Intersection programs whose bounds program has not compiled yet
    pending: BTreeMap<PrimitiveKind, ProgramId>,
}

impl PrimitiveCatalog {
    pub fn new(library: ProgramLibrary) -> Self {
        Self {
            library,
            entries: BTreeMap::new(),
            pending: BTreeMap::new(),
        }
    }

    pub fn library(&self) -> &ProgramLibrary {
        &self.library
    }

    /// Cached routine pair for `kind`, if already created.
    pub fn get(&self, kind: PrimitiveKind) -> Option<PrimitivePrograms> {
        self.entries.get(&kind).copied()
    }

    /// Return the routine pair for `kind`, compiling it on first use.
    ///
    /// An unknown location, or a module that lacks the entry point, is a
    /// configuration error. Any other backend failure is a resource error.
    /// An intersection program that compiled before its bounds program
    /// failed is kept and reused by the next attempt.
    pub fn get_or_create(
        &mut self,
        backend: &mut dyn RayTracingBackend,
        kind: PrimitiveKind,
    ) -> Result<PrimitivePrograms> {
        if let Some(programs) = self.entries.get(&kind) {
            return Ok(*programs);
        }

        let location = self.library.location(kind).ok_or_else(|| {
            SceneError::Configuration(format!(
                "no program location set for {kind}, cannot create its programs"
            ))
        })?;

        let intersection = match self.pending.get(&kind) {
            Some(id) => *id,
            None => {
                let id = create_program(backend, &location.intersection_source())?;
                self.pending.insert(kind, id);
                id
            }
        };
        let bounds = create_program(backend, &location.bounds_source())?;
        self.pending.remove(&kind);
        log::debug!(
            "Created {} programs '{}'/'{}' from {}",
            kind,
            location.intersection,
            location.bounds,
            location.path
        );

        let programs = PrimitivePrograms {
            intersection,
            bounds,
        };
        self.entries.insert(kind, programs);
        Ok(programs)
    }
}

fn create_program(
    backend: &mut dyn RayTracingBackend,
    source: &ProgramSource,
) -> Result<ProgramId> {
    backend.create_program(source).map_err(|err| match err {
        BackendError::ProgramNotFound { path, entry } => SceneError::Configuration(format!(
            "program '{entry}' not found in '{path}'"
        )),
        other => SceneError::Resource(other),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Call, RecordingBackend};

    #[test]
    fn test_default_library_entry_points() {
        let library = ProgramLibrary::default();

        let sphere = library.location(PrimitiveKind::Sphere).unwrap();
        assert_eq!(sphere.intersection, "intersect_sphere");
        assert_eq!(sphere.bounds, "bounds_sphere");

        let quad = library.location(PrimitiveKind::Parallelogram).unwrap();
        assert_eq!(quad.intersection, "intersect");
        assert_eq!(quad.bounds, "bounds");

        let mesh = library.location(PrimitiveKind::Mesh).unwrap();
        assert_eq!(mesh.path, "ptx/triangle_mesh.cu.ptx");
        assert_eq!(mesh.intersection, "mesh_intersect");
    }

    #[test]
    fn test_programs_created_once_per_kind() {
        let mut backend = RecordingBackend::new();
        let mut catalog = PrimitiveCatalog::default();

        let first = catalog
            .get_or_create(&mut backend, PrimitiveKind::Sphere)
            .unwrap();
        let second = catalog
            .get_or_create(&mut backend, PrimitiveKind::Sphere)
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(backend.log().program_creations(), 2);

        catalog
            .get_or_create(&mut backend, PrimitiveKind::Parallelogram)
            .unwrap();
        assert_eq!(backend.log().program_creations(), 4);
        assert_eq!(catalog.get(PrimitiveKind::Sphere), Some(first));
    }

    #[test]
    fn test_missing_location_is_configuration_error() {
        let mut backend = RecordingBackend::new();
        let mut catalog =
            PrimitiveCatalog::new(ProgramLibrary::default().without(PrimitiveKind::Mesh));

        let err = catalog
            .get_or_create(&mut backend, PrimitiveKind::Mesh)
            .unwrap_err();

        assert!(matches!(err, SceneError::Configuration(_)));
        assert!(!err.is_fatal());
        assert_eq!(backend.log().program_creations(), 0);
        assert!(catalog.get(PrimitiveKind::Mesh).is_none());
    }

    #[test]
    fn test_missing_entry_point_is_configuration_error() {
        let mut backend = RecordingBackend::new();
        backend.log().reject_entry("bounds_sphere");
        let mut catalog = PrimitiveCatalog::default();

        let err = catalog
            .get_or_create(&mut backend, PrimitiveKind::Sphere)
            .unwrap_err();

        assert!(matches!(err, SceneError::Configuration(_)));
        assert!(catalog.get(PrimitiveKind::Sphere).is_none());
    }

    #[test]
    fn test_failed_bounds_program_keeps_intersection() {
        let mut backend = RecordingBackend::new();
        let log = backend.log();
        log.reject_entry("bounds_sphere");
        let mut catalog = PrimitiveCatalog::default();

        for _ in 0..3 {
            assert!(catalog
                .get_or_create(&mut backend, PrimitiveKind::Sphere)
                .is_err());
        }
        let compiled = |entry: &str| {
            log.count(|c| matches!(c, Call::CreateProgram(s) if s.entry == entry))
        };
        assert_eq!(compiled("intersect_sphere"), 1);
        assert_eq!(compiled("bounds_sphere"), 3);

        log.allow_entry("bounds_sphere");
        let programs = catalog
            .get_or_create(&mut backend, PrimitiveKind::Sphere)
            .unwrap();
        assert_eq!(compiled("intersect_sphere"), 1);
        assert_eq!(catalog.get(PrimitiveKind::Sphere), Some(programs));
    }
}
