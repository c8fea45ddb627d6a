//! PathView scene - geometry nodes, the scene graph and progressive-render
//! coordination for a ray-tracing backend.
//!
//! This crate provides:
//!
//! - **Backend seam**: [`RayTracingBackend`], the operations consumed from an engine
//! - **Geometry**: [`GeometryNode`] with pose-driven transforms and cheap instancing
//! - **Hierarchy**: [`SceneGraph`] with per-group acceleration dirty tracking
//! - **Rendering loop**: [`RenderCoordinator`] for frame accumulation and resets
//! - **Editing**: [`SceneEditor`], the handle-based surface a GUI drives
//!
//! # Example
//!
//! ```ignore
//! use pathview_scene::{EditorSettings, PrimitiveKind, RenderContext, SceneEditor};
//!
//! let ctx = RenderContext::new(engine);
//! let mut editor = SceneEditor::new(ctx, EditorSettings::default())?;
//! let sphere = editor.add_geometry(PrimitiveKind::Sphere)?;
//! editor.set_pose(sphere, Vec3::new(0.0, 1.0, 0.0), Vec3::ZERO, Vec3::ONE)?;
//! editor.tick()?;
//! ```

pub mod accel;
pub mod backend;
pub mod catalog;
pub mod context;
pub mod coordinator;
pub mod editor;
pub mod error;
pub mod export;
pub mod graph;
pub mod import;
pub mod mesh;
pub mod navigation;
pub mod node;
pub mod primitive;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use accel::AccelerationState;
pub use backend::{
    AccelKind, BackendError, GeometryId, GroupId, InstanceId, MaterialId, MaterialKind, NodeRef,
    ObjectRef, OutputView, ParamValue, PrimitivePrograms, ProgramId, ProgramSource,
    RayTracingBackend, TransformId,
};
pub use catalog::{PrimitiveCatalog, ProgramLibrary, ProgramLocation};
pub use context::RenderContext;
pub use coordinator::{CoordinatorSettings, RenderCoordinator, TickStatus, INITIAL_FRAME};
pub use editor::{EditorSettings, GeometryHandle, SceneEditor, SceneStats};
pub use error::{Result, SceneError};
pub use export::{ExportFormat, FrameImage};
pub use graph::SceneGraph;
pub use import::{AssetImporter, ObjImporter};
pub use mesh::MeshData;
pub use navigation::{DragMode, NavigationController, NavigationSettings};
pub use node::{GeometryInstance, GeometryNode, SharedGeometry};
pub use primitive::{PrimitiveKind, ShapeData};
