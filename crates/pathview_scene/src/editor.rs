//! The editing surface a GUI drives.
//!
//! [`SceneEditor`] owns the rendering context, the scene graph, the render
//! coordinator and every geometry node, and exposes them through small
//! handle-based operations. Unknown handles are logged and ignored.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use pathview_math::{Mat4, Pose, Vec3};

use crate::backend::{MaterialKind, ParamValue};
use crate::context::RenderContext;
use crate::coordinator::{CoordinatorSettings, RenderCoordinator, TickStatus};
use crate::error::{Result, SceneError};
use crate::export::{ExportFormat, FrameImage};
use crate::graph::SceneGraph;
use crate::import::{AssetImporter, ObjImporter};
use crate::mesh::MeshData;
use crate::navigation::{full_size, DragMode, NavigationController, NavigationSettings};
use crate::node::GeometryNode;
use crate::primitive::{PrimitiveKind, ShapeData};

/// Identifies a geometry node owned by the editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GeometryHandle(u32);

impl fmt::Display for GeometryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EditorSettings {
    pub coordinator: CoordinatorSettings,
    pub navigation: NavigationSettings,
    pub device_pixel_ratio: f32,
    /// Material bound to every node added through the editor.
    pub default_material: MaterialKind,
    /// `diffuse_color` given to every node added through the editor.
    pub default_color: Vec3,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            coordinator: CoordinatorSettings::default(),
            navigation: NavigationSettings::default(),
            device_pixel_ratio: 1.0,
            default_material: MaterialKind::Diffuse,
            default_color: Vec3::ONE,
        }
    }
}

/// Counts shown in the viewer's status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SceneStats {
    pub nodes: usize,
    pub attached: usize,
    pub primitives: u64,
    pub frame: u32,
}

struct Entry {
    name: String,
    node: GeometryNode,
}

pub struct SceneEditor {
    ctx: RenderContext,
    graph: SceneGraph,
    coordinator: RenderCoordinator,
    navigation: NavigationController,
    importer: Box<dyn AssetImporter>,
    nodes: BTreeMap<GeometryHandle, Entry>,
    next_handle: u32,
    view_size: (u32, u32),
    device_pixel_ratio: f32,
    default_material: MaterialKind,
    default_color: Vec3,
}

impl SceneEditor {
    pub fn new(mut ctx: RenderContext, settings: EditorSettings) -> Result<Self> {
        let graph = SceneGraph::new(&mut ctx)?;
        let view_size = (settings.coordinator.width, settings.coordinator.height);
        let device_pixel_ratio = settings.device_pixel_ratio.max(f32::EPSILON);

        let (width, height) = full_size(view_size.0, view_size.1, device_pixel_ratio);
        let coordinator = RenderCoordinator::new(settings.coordinator.with_size(width, height));

        Ok(Self {
            ctx,
            graph,
            coordinator,
            navigation: NavigationController::new(settings.navigation),
            importer: Box::new(ObjImporter),
            nodes: BTreeMap::new(),
            next_handle: 0,
            view_size,
            device_pixel_ratio,
            default_material: settings.default_material,
            default_color: settings.default_color,
        })
    }

    pub fn with_importer(mut self, importer: impl AssetImporter + 'static) -> Self {
        self.importer = Box::new(importer);
        self
    }

    pub fn context(&self) -> &RenderContext {
        &self.ctx
    }

    pub fn graph(&self) -> &SceneGraph {
        &self.graph
    }

    pub fn coordinator(&self) -> &RenderCoordinator {
        &self.coordinator
    }

    pub fn navigation(&self) -> &NavigationController {
        &self.navigation
    }

    // ---- geometry ----

    /// Add a parametric primitive with its default shape.
    pub fn add_geometry(&mut self, kind: PrimitiveKind) -> Result<GeometryHandle> {
        let Some(shape) = ShapeData::default_for(kind) else {
            let err = SceneError::Configuration(format!(
                "{kind} geometry needs data, use import_mesh"
            ));
            log::error!("{}", err);
            return Err(err);
        };
        self.add_shape(shape)
    }

    /// Add arbitrary shape data as a new node with the default material,
    /// and attach it.
    pub fn add_shape(&mut self, shape: ShapeData) -> Result<GeometryHandle> {
        let kind = shape.kind();
        let node = GeometryNode::new(&mut self.ctx, shape).map_err(|err| {
            log::error!("Cannot add {}: {}", kind, err);
            err
        })?;
        let name = format!("{}{}", kind, self.next_handle);
        let handle = self.insert(name, node, None)?;
        log::info!("Added {} {}", kind, handle);
        Ok(handle)
    }

    /// Load a mesh asset, merge all of its meshes into one node and attach
    /// it. A failed import leaves the scene untouched.
    pub fn import_mesh(&mut self, path: &Path) -> Result<GeometryHandle> {
        let meshes = self.importer.load(path).map_err(|err| {
            log::error!("{}", err);
            err
        })?;
        let mesh = MeshData::merge(meshes);
        let handle = self.add_shape(ShapeData::mesh(mesh))?;

        if let (Some(entry), Some(stem)) = (
            self.nodes.get_mut(&handle),
            path.file_stem().and_then(|s| s.to_str()),
        ) {
            entry.name = stem.to_string();
        }
        Ok(handle)
    }

    /// Instance an existing node: shared geometry, copied pose, material and
    /// parameters. `Ok(None)` for an unknown handle.
    pub fn instance_geometry(&mut self, handle: GeometryHandle) -> Result<Option<GeometryHandle>> {
        let Some(source) = self.nodes.get(&handle) else {
            log::warn!("No geometry {} to instance", handle);
            return Ok(None);
        };
        let node = source.node.instance(&mut self.ctx)?;
        let name = format!("{}_instance{}", source.name, self.next_handle);
        let copy_from = Some(handle);
        let new_handle = self.insert(name, node, copy_from)?;
        log::info!("Instanced {} as {}", handle, new_handle);
        Ok(Some(new_handle))
    }

    fn insert(
        &mut self,
        name: String,
        mut node: GeometryNode,
        copy_from: Option<GeometryHandle>,
    ) -> Result<GeometryHandle> {
        let attached = self
            .dress(&mut node, copy_from)
            .and_then(|()| self.graph.attach(&mut self.ctx, &mut node));
        if let Err(err) = attached {
            self.discard(node);
            return Err(err);
        }

        let handle = GeometryHandle(self.next_handle);
        self.next_handle += 1;
        self.nodes.insert(handle, Entry { name, node });
        Ok(handle)
    }

    /// Give a fresh node its material and parameters, copied from `copy_from`
    /// or the editor defaults.
    fn dress(&mut self, node: &mut GeometryNode, copy_from: Option<GeometryHandle>) -> Result<()> {
        match copy_from.and_then(|h| self.nodes.get(&h)) {
            Some(source) => {
                if let Some(material) = source.node.material() {
                    node.set_material(&mut self.ctx, material)?;
                }
                for (name, value) in source.node.params() {
                    node.set_param(&mut self.ctx, name, value)?;
                }
            }
            None => {
                let material = self.ctx.material(self.default_material)?;
                node.set_material(&mut self.ctx, material)?;
                node.set_param(
                    &mut self.ctx,
                    "diffuse_color",
                    ParamValue::Float3(self.default_color),
                )?;
            }
        }
        Ok(())
    }

    /// Drop a node that never made it into the editor, releasing its
    /// backend objects.
    fn discard(&mut self, mut node: GeometryNode) {
        if self.graph.contains(&node) {
            if let Err(err) = self.graph.detach(&mut self.ctx, &mut node) {
                log::warn!("Cannot detach {} node: {}", node.kind(), err);
            }
        }
        if let Err(node) = node.release(&mut self.ctx) {
            log::warn!("Leaking {} node still attached to the graph", node.kind());
        }
    }

    /// Detach and release a node. Returns `false` for an unknown handle.
    /// A failed detach keeps the node.
    pub fn remove_geometry(&mut self, handle: GeometryHandle) -> Result<bool> {
        let Some(entry) = self.nodes.get_mut(&handle) else {
            log::warn!("No geometry {} to remove", handle);
            return Ok(false);
        };
        self.graph.detach(&mut self.ctx, &mut entry.node)?;

        let Some(entry) = self.nodes.remove(&handle) else {
            return Ok(false);
        };
        if let Err(node) = entry.node.release(&mut self.ctx) {
            log::warn!("{} is still attached, keeping it", handle);
            self.nodes.insert(handle, Entry { name: entry.name, node });
            return Ok(false);
        }
        log::info!("Removed {} ({})", entry.name, handle);
        Ok(true)
    }

    pub fn handles(&self) -> impl Iterator<Item = GeometryHandle> + '_ {
        self.nodes.keys().copied()
    }

    pub fn node(&self, handle: GeometryHandle) -> Option<&GeometryNode> {
        self.nodes.get(&handle).map(|e| &e.node)
    }

    pub fn name(&self, handle: GeometryHandle) -> Option<&str> {
        self.nodes.get(&handle).map(|e| e.name.as_str())
    }

    pub fn rename(&mut self, handle: GeometryHandle, name: impl Into<String>) -> bool {
        match self.nodes.get_mut(&handle) {
            Some(entry) => {
                entry.name = name.into();
                true
            }
            None => false,
        }
    }

    // ---- per-node state ----

    pub fn set_pose(
        &mut self,
        handle: GeometryHandle,
        position: Vec3,
        rotation_degrees: Vec3,
        scale: Vec3,
    ) -> Result<bool> {
        let Some(entry) = self.nodes.get_mut(&handle) else {
            log::warn!("Cannot set pose: no geometry {}", handle);
            return Ok(false);
        };
        entry
            .node
            .set_pose(&mut self.ctx, position, rotation_degrees, scale)?;
        Ok(true)
    }

    pub fn pose(&self, handle: GeometryHandle) -> Option<Pose> {
        self.node(handle).map(GeometryNode::pose)
    }

    /// Current matrix and inverse of a node.
    pub fn transform(&self, handle: GeometryHandle) -> Option<(Mat4, Mat4)> {
        self.node(handle)
            .map(|n| (n.matrix(), n.inverse_matrix()))
    }

    pub fn set_material(&mut self, handle: GeometryHandle, kind: MaterialKind) -> Result<bool> {
        if !self.nodes.contains_key(&handle) {
            log::warn!("Cannot set material: no geometry {}", handle);
            return Ok(false);
        }
        let material = self.ctx.material(kind)?;
        if let Some(entry) = self.nodes.get_mut(&handle) {
            entry.node.set_material(&mut self.ctx, material)?;
        }
        Ok(true)
    }

    pub fn set_param(
        &mut self,
        handle: GeometryHandle,
        name: &str,
        value: ParamValue,
    ) -> Result<bool> {
        let Some(entry) = self.nodes.get_mut(&handle) else {
            log::warn!("Cannot set {}: no geometry {}", name, handle);
            return Ok(false);
        };
        entry.node.set_param(&mut self.ctx, name, value)?;
        Ok(true)
    }

    // ---- scene-wide ----

    pub fn set_global_transform(&mut self, matrix: Mat4) -> Result<()> {
        self.graph.set_global_transform(&mut self.ctx, matrix, None)
    }

    pub fn request_rebuild(&mut self) -> Result<()> {
        self.graph.request_rebuild(&mut self.ctx)
    }

    /// New view size in logical pixels.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            log::warn!("Ignoring resize to {}x{}", width, height);
            return;
        }
        self.view_size = (width, height);
        if !self.navigation.is_dragging() {
            let (w, h) = full_size(width, height, self.device_pixel_ratio);
            self.coordinator.resize(w, h);
        }
    }

    pub fn set_device_pixel_ratio(&mut self, ratio: f32) {
        self.device_pixel_ratio = ratio.max(f32::EPSILON);
        let (width, height) = self.view_size;
        self.resize(width, height);
    }

    pub fn tick(&mut self) -> Result<TickStatus> {
        self.coordinator.tick(&mut self.ctx, &mut self.graph)
    }

    pub fn toggle_rendering(&mut self) -> bool {
        self.coordinator.toggle_rendering()
    }

    pub fn is_timed_out(&self) -> bool {
        self.coordinator.is_timed_out()
    }

    // ---- navigation ----

    /// Start a drag; the output drops to the reduced resolution until it ends.
    pub fn begin_drag(&mut self, mode: DragMode, x: f32, y: f32) -> bool {
        if !self.navigation.begin_drag(mode, x, y) {
            return false;
        }
        let (w, h) = self
            .navigation
            .reduced_size(self.view_size.0, self.view_size.1);
        self.coordinator.resize(w, h);
        true
    }

    pub fn drag_to(&mut self, x: f32, y: f32) -> Result<()> {
        if let Some(matrix) = self.navigation.drag_to(x, y) {
            self.set_global_transform(matrix)?;
        }
        Ok(())
    }

    /// Finish a drag and restore the full resolution.
    pub fn end_drag(&mut self) {
        if self.navigation.end_drag().is_some() {
            let (w, h) = full_size(self.view_size.0, self.view_size.1, self.device_pixel_ratio);
            self.coordinator.resize(w, h);
        }
    }

    pub fn zoom(&mut self, delta: f32) -> Result<()> {
        if let Some(matrix) = self.navigation.zoom(delta) {
            self.set_global_transform(matrix)?;
        }
        Ok(())
    }

    // ---- output ----

    pub fn export_frame(&self) -> FrameImage {
        FrameImage::from_output(&self.ctx.backend().output())
    }

    /// Save the current frame. Without an explicit format it is taken from
    /// the file extension.
    pub fn save_frame(&self, path: &Path, format: Option<ExportFormat>) -> Result<()> {
        let format = format
            .or_else(|| ExportFormat::from_path(path))
            .ok_or_else(|| SceneError::Export {
                path: path.to_path_buf(),
                message: "unknown image format".to_string(),
            })?;
        self.export_frame().save(path, format)
    }

    pub fn stats(&self) -> SceneStats {
        SceneStats {
            nodes: self.nodes.len(),
            attached: self.graph.attached_count(),
            primitives: self
                .nodes
                .values()
                .map(|e| u64::from(e.node.primitive_count()))
                .sum(),
            frame: self.coordinator.frame(),
        }
    }

    /// Remove every node. Returns how many went.
    pub fn clear_scene(&mut self) -> Result<usize> {
        let handles: Vec<_> = self.nodes.keys().copied().collect();
        let mut removed = 0;
        for handle in handles {
            if self.remove_geometry(handle)? {
                removed += 1;
            }
        }
        log::info!("Cleared scene, {} nodes removed", removed);
        Ok(removed)
    }

    /// Drop all navigation: identity global transform, full resolution and
    /// rendering resumed.
    pub fn reset_global_transform(&mut self) -> Result<()> {
        self.end_drag();
        self.navigation.reset();
        self.set_global_transform(Mat4::IDENTITY)?;
        self.coordinator.set_rendering(true);
        Ok(())
    }

    /// Detach and release everything, then the graph itself.
    pub fn shutdown(mut self) {
        let handles: Vec<_> = self.nodes.keys().copied().collect();
        for handle in handles {
            if let Err(err) = self.remove_geometry(handle) {
                log::warn!("Failed to remove {} during shutdown: {}", handle, err);
            }
        }
        self.graph.release(&mut self.ctx);
        log::info!("Scene editor shut down");
    }
}
