//! The CPU reference backend.
//!
//! Objects live in id-keyed tables. Rebuilding a group compiles its current
//! children into an immutable hittable tree (a BVH or a plain list), so a
//! launch only reads shared, `Sync` data and can fan out across rayon's pool.

use crate::bvh::BvhNode;
use crate::hittable::{Hittable, HittableList};
use crate::instance::{InstanceHittable, TransformedHittable};
use crate::material::{Color, Surface};
use crate::parallelogram::Parallelogram;
use crate::programs::{ProgramRegistry, Routine};
use crate::renderer::{render_pixel, Accumulator, RenderSettings, SceneView};
use crate::sphere::Sphere;
use crate::triangle::mesh_triangles;
use log::{debug, info};
use pathview_math::{Mat4, PinholeCamera, Vec3};
use pathview_scene::{
    AccelKind, BackendError, GeometryId, GroupId, InstanceId, MaterialId, MaterialKind, NodeRef,
    ObjectRef, OutputView, ParamValue, PrimitiveKind, PrimitivePrograms, ProgramId, ProgramSource,
    RayTracingBackend, ShapeData, TransformId,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;

/// Nesting limit when walking the node graph; deeper graphs are treated as cyclic.
const MAX_GRAPH_DEPTH: usize = 64;

/// The only ray-generation entry point.
pub const PINHOLE_ENTRY: u32 = 0;

struct GeometryObject {
    kind: PrimitiveKind,
    primitive_count: u32,
    prototype: Arc<dyn Hittable>,
}

struct InstanceObject {
    geometry: GeometryId,
    material: Option<MaterialId>,
    params: HashMap<String, ParamValue>,
}

struct GroupObject {
    accel: AccelKind,
    children: Vec<NodeRef>,
    dirty: bool,
    /// Clock value of the last build; 0 if never built.
    stamp: u64,
    built: Option<Arc<dyn Hittable>>,
}

struct TransformObject {
    child: NodeRef,
    matrix: Mat4,
    inverse: Mat4,
    /// Clock value of the last matrix change.
    stamp: u64,
}

/// Progressive path tracer running on the CPU.
pub struct CpuEngine {
    settings: RenderSettings,
    registry: ProgramRegistry,
    next_id: u32,
    clock: u64,
    programs: HashMap<ProgramId, Routine>,
    geometries: HashMap<GeometryId, GeometryObject>,
    instances: HashMap<InstanceId, InstanceObject>,
    materials: HashMap<MaterialId, MaterialKind>,
    groups: HashMap<GroupId, GroupObject>,
    transforms: HashMap<TransformId, TransformObject>,
    top: Option<GroupId>,
    camera: PinholeCamera,
    frame: u32,
    launches: u64,
    output: Accumulator,
}

impl Default for CpuEngine {
    fn default() -> Self {
        Self::new(RenderSettings::default())
    }
}

impl CpuEngine {
    pub fn new(settings: RenderSettings) -> Self {
        info!(
            "CPU engine: {} samples/pixel/launch, max depth {}",
            settings.samples_per_pixel(),
            settings.max_depth
        );
        Self {
            settings,
            registry: ProgramRegistry::builtin(),
            next_id: 0,
            clock: 0,
            programs: HashMap::new(),
            geometries: HashMap::new(),
            instances: HashMap::new(),
            materials: HashMap::new(),
            groups: HashMap::new(),
            transforms: HashMap::new(),
            top: None,
            camera: PinholeCamera::new(Vec3::new(0.0, 0.0, 1.0), Vec3::ZERO, Vec3::Y, 35.0, 35.0),
            frame: 0,
            launches: 0,
            output: Accumulator::default(),
        }
    }

    pub fn with_registry(mut self, registry: ProgramRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    pub fn frame_number(&self) -> u32 {
        self.frame
    }

    pub fn launch_count(&self) -> u64 {
        self.launches
    }

    /// The linear running average behind the displayed output.
    pub fn accumulated(&self) -> &[Color] {
        self.output.linear()
    }

    pub fn is_live(&self, object: ObjectRef) -> bool {
        match object {
            ObjectRef::Program(id) => self.programs.contains_key(&id),
            ObjectRef::Geometry(id) => self.geometries.contains_key(&id),
            ObjectRef::Instance(id) => self.instances.contains_key(&id),
            ObjectRef::Group(id) => self.groups.contains_key(&id),
            ObjectRef::Transform(id) => self.transforms.contains_key(&id),
            ObjectRef::Material(id) => self.materials.contains_key(&id),
        }
    }

    pub fn object_count(&self) -> usize {
        self.programs.len()
            + self.geometries.len()
            + self.instances.len()
            + self.groups.len()
            + self.transforms.len()
            + self.materials.len()
    }

    /// Kind and primitive count of a live geometry.
    pub fn geometry_info(&self, geometry: GeometryId) -> Option<(PrimitiveKind, u32)> {
        self.geometries
            .get(&geometry)
            .map(|g| (g.kind, g.primitive_count))
    }

    pub fn is_group_dirty(&self, group: GroupId) -> Option<bool> {
        self.groups.get(&group).map(|g| g.dirty)
    }

    fn next_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn tick_clock(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn group(&self, id: GroupId) -> Result<&GroupObject, BackendError> {
        self.groups
            .get(&id)
            .ok_or(BackendError::UnknownObject(ObjectRef::Group(id)))
    }

    fn group_mut(&mut self, id: GroupId) -> Result<&mut GroupObject, BackendError> {
        self.groups
            .get_mut(&id)
            .ok_or(BackendError::UnknownObject(ObjectRef::Group(id)))
    }

    fn instance_mut(&mut self, id: InstanceId) -> Result<&mut InstanceObject, BackendError> {
        self.instances
            .get_mut(&id)
            .ok_or(BackendError::UnknownObject(ObjectRef::Instance(id)))
    }

    fn routine(&self, id: ProgramId) -> Result<Routine, BackendError> {
        self.programs
            .get(&id)
            .copied()
            .ok_or(BackendError::UnknownObject(ObjectRef::Program(id)))
    }

    fn require_node(&self, node: NodeRef) -> Result<(), BackendError> {
        if self.is_live(node.into()) {
            Ok(())
        } else {
            Err(BackendError::UnknownObject(node.into()))
        }
    }

    /// Object-space primitives of a shape, behind one hittable.
    fn prototype(shape: &ShapeData) -> Arc<dyn Hittable> {
        match shape {
            ShapeData::Sphere { sphere } => Arc::new(Sphere::from_vec4(*sphere)),
            ShapeData::Parallelogram {
                plane,
                anchor,
                v1,
                v2,
            } => Arc::new(Parallelogram::new(*plane, *anchor, *v1, *v2)),
            ShapeData::Mesh(mesh) => Arc::new(BvhNode::new(mesh_triangles(mesh))),
        }
    }

    /// Compile a node into a hittable, reusing built child groups.
    fn compile(&self, node: NodeRef, depth: usize) -> Result<Arc<dyn Hittable>, BackendError> {
        if depth > MAX_GRAPH_DEPTH {
            return Err(BackendError::Validation(format!(
                "node graph below {} is cyclic or too deep",
                ObjectRef::from(node)
            )));
        }

        match node {
            NodeRef::Instance(id) => {
                let instance = self
                    .instances
                    .get(&id)
                    .ok_or(BackendError::UnknownObject(ObjectRef::Instance(id)))?;
                let geometry = self.geometries.get(&instance.geometry).ok_or(
                    BackendError::UnknownObject(ObjectRef::Geometry(instance.geometry)),
                )?;
                Ok(Arc::new(InstanceHittable::new(
                    id,
                    Arc::clone(&geometry.prototype),
                )))
            }
            NodeRef::Group(id) => {
                let group = self.group(id)?;
                match &group.built {
                    Some(built) => Ok(Arc::clone(built)),
                    None => self.compile_group(group, depth),
                }
            }
            NodeRef::Transform(id) => {
                let transform = self
                    .transforms
                    .get(&id)
                    .ok_or(BackendError::UnknownObject(ObjectRef::Transform(id)))?;
                let child = self.compile(transform.child, depth + 1)?;
                Ok(Arc::new(TransformedHittable::new(
                    child,
                    transform.matrix,
                    transform.inverse,
                )))
            }
        }
    }

    fn compile_group(&self, group: &GroupObject, depth: usize) -> Result<Arc<dyn Hittable>, BackendError> {
        let children = group
            .children
            .iter()
            .map(|&child| self.compile(child, depth + 1))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(match group.accel {
            AccelKind::Bvh => Arc::new(BvhNode::new(children)),
            AccelKind::NoAccel => Arc::new(children.into_iter().collect::<HittableList>()),
        })
    }

    /// Rebuild every group below `node` that is dirty or holds a stale copy
    /// of something that changed after it was built. Returns the newest
    /// change stamp in the subtree.
    fn refresh(&mut self, node: NodeRef, depth: usize) -> Result<u64, BackendError> {
        if depth > MAX_GRAPH_DEPTH {
            return Err(BackendError::Validation(format!(
                "node graph below {} is cyclic or too deep",
                ObjectRef::from(node)
            )));
        }

        match node {
            NodeRef::Instance(_) => Ok(0),
            NodeRef::Transform(id) => {
                let transform = self
                    .transforms
                    .get(&id)
                    .ok_or(BackendError::UnknownObject(ObjectRef::Transform(id)))?;
                let (child, stamp) = (transform.child, transform.stamp);
                Ok(stamp.max(self.refresh(child, depth + 1)?))
            }
            NodeRef::Group(id) => {
                let children = self.group(id)?.children.clone();
                let mut newest = 0;
                for child in children {
                    newest = newest.max(self.refresh(child, depth + 1)?);
                }

                let group = self.group(id)?;
                if group.dirty || group.built.is_none() || newest > group.stamp {
                    self.rebuild_acceleration(id)?;
                }
                Ok(self.group(id)?.stamp)
            }
        }
    }

    /// Check every node reachable from `node` exists.
    fn check_reachable(&self, node: NodeRef, depth: usize) -> Result<(), BackendError> {
        if depth > MAX_GRAPH_DEPTH {
            return Err(BackendError::Validation(format!(
                "node graph below {} is cyclic or too deep",
                ObjectRef::from(node)
            )));
        }

        match node {
            NodeRef::Instance(id) => {
                let instance = self
                    .instances
                    .get(&id)
                    .ok_or(BackendError::UnknownObject(ObjectRef::Instance(id)))?;
                if !self.geometries.contains_key(&instance.geometry) {
                    return Err(BackendError::Validation(format!(
                        "{} refers to released {}",
                        ObjectRef::Instance(id),
                        ObjectRef::Geometry(instance.geometry)
                    )));
                }
                if let Some(material) = instance.material {
                    if !self.materials.contains_key(&material) {
                        return Err(BackendError::Validation(format!(
                            "{} refers to released {}",
                            ObjectRef::Instance(id),
                            ObjectRef::Material(material)
                        )));
                    }
                }
                Ok(())
            }
            NodeRef::Group(id) => {
                for &child in &self.group(id)?.children {
                    self.check_reachable(child, depth + 1)?;
                }
                Ok(())
            }
            NodeRef::Transform(id) => {
                let transform = self
                    .transforms
                    .get(&id)
                    .ok_or(BackendError::UnknownObject(ObjectRef::Transform(id)))?;
                self.check_reachable(transform.child, depth + 1)
            }
        }
    }

    /// Shading response of every instance, resolved once per launch.
    fn surfaces(&self) -> HashMap<InstanceId, Surface> {
        self.instances
            .iter()
            .map(|(&id, instance)| {
                let kind = instance
                    .material
                    .and_then(|m| self.materials.get(&m).copied());
                (id, Surface::resolve(kind, &instance.params))
            })
            .collect()
    }
}

/// Decode 16 floats into a matrix; row-major unless `transpose` is set.
fn decode_matrix(m: &[f32; 16], transpose: bool) -> Mat4 {
    let stored = Mat4::from_cols_array(m);
    if transpose {
        stored
    } else {
        stored.transpose()
    }
}

/// Per-row seed so every launch draws fresh, reproducible samples.
fn row_seed(frame: u32, row: u32) -> u64 {
    (u64::from(frame) << 32) ^ u64::from(row) ^ 0x9E37_79B9_7F4A_7C15
}

impl RayTracingBackend for CpuEngine {
    fn create_program(&mut self, source: &ProgramSource) -> Result<ProgramId, BackendError> {
        let routine = self.registry.resolve(source)?;
        let id = ProgramId(self.next_id());
        self.programs.insert(id, routine);
        debug!("{}: {}:{} -> {:?}", ObjectRef::Program(id), source.path, source.entry, routine);
        Ok(id)
    }

    fn create_geometry(
        &mut self,
        programs: PrimitivePrograms,
        primitive_count: u32,
        shape: &ShapeData,
    ) -> Result<GeometryId, BackendError> {
        let kind = shape.kind();
        let intersect = self.routine(programs.intersection)?;
        let bounds = self.routine(programs.bounds)?;
        if intersect != Routine::Intersect(kind) || bounds != Routine::Bounds(kind) {
            return Err(BackendError::InvalidShape(format!(
                "{kind} data bound to {intersect:?}/{bounds:?}"
            )));
        }
        if primitive_count != shape.primitive_count() {
            return Err(BackendError::InvalidShape(format!(
                "{kind} has {} primitives, {primitive_count} requested",
                shape.primitive_count()
            )));
        }

        let id = GeometryId(self.next_id());
        self.geometries.insert(
            id,
            GeometryObject {
                kind,
                primitive_count,
                prototype: Self::prototype(shape),
            },
        );
        debug!("{}: {kind}, {primitive_count} primitives", ObjectRef::Geometry(id));
        Ok(id)
    }

    fn create_instance(&mut self, geometry: GeometryId) -> Result<InstanceId, BackendError> {
        if !self.geometries.contains_key(&geometry) {
            return Err(BackendError::UnknownObject(ObjectRef::Geometry(geometry)));
        }
        let id = InstanceId(self.next_id());
        self.instances.insert(
            id,
            InstanceObject {
                geometry,
                material: None,
                params: HashMap::new(),
            },
        );
        Ok(id)
    }

    fn create_material(&mut self, kind: MaterialKind) -> Result<MaterialId, BackendError> {
        let id = MaterialId(self.next_id());
        self.materials.insert(id, kind);
        debug!("{}: {kind:?}", ObjectRef::Material(id));
        Ok(id)
    }

    fn set_instance_material(
        &mut self,
        instance: InstanceId,
        material: MaterialId,
    ) -> Result<(), BackendError> {
        if !self.materials.contains_key(&material) {
            return Err(BackendError::UnknownObject(ObjectRef::Material(material)));
        }
        self.instance_mut(instance)?.material = Some(material);
        Ok(())
    }

    fn set_instance_param(
        &mut self,
        instance: InstanceId,
        name: &str,
        value: ParamValue,
    ) -> Result<(), BackendError> {
        self.instance_mut(instance)?
            .params
            .insert(name.to_string(), value);
        Ok(())
    }

    fn create_group(&mut self, accel: AccelKind) -> Result<GroupId, BackendError> {
        let id = GroupId(self.next_id());
        self.groups.insert(
            id,
            GroupObject {
                accel,
                children: Vec::new(),
                dirty: true,
                stamp: 0,
                built: None,
            },
        );
        Ok(id)
    }

    fn add_child(&mut self, group: GroupId, child: NodeRef) -> Result<(), BackendError> {
        self.group(group)?;
        self.require_node(child)?;
        if child == NodeRef::Group(group) {
            return Err(BackendError::InvalidChild {
                parent: ObjectRef::Group(group),
                child: child.into(),
            });
        }
        let entry = self.group_mut(group)?;
        entry.children.push(child);
        entry.dirty = true;
        Ok(())
    }

    fn remove_child(&mut self, group: GroupId, child: NodeRef) -> Result<(), BackendError> {
        let entry = self.group_mut(group)?;
        let index = entry
            .children
            .iter()
            .position(|&c| c == child)
            .ok_or(BackendError::InvalidChild {
                parent: ObjectRef::Group(group),
                child: child.into(),
            })?;
        entry.children.remove(index);
        entry.dirty = true;
        Ok(())
    }

    fn create_transform(&mut self, child: NodeRef) -> Result<TransformId, BackendError> {
        self.require_node(child)?;
        let id = TransformId(self.next_id());
        let stamp = self.tick_clock();
        self.transforms.insert(
            id,
            TransformObject {
                child,
                matrix: Mat4::IDENTITY,
                inverse: Mat4::IDENTITY,
                stamp,
            },
        );
        Ok(id)
    }

    fn set_transform(
        &mut self,
        transform: TransformId,
        matrix: &[f32; 16],
        inverse: Option<&[f32; 16]>,
        transpose: bool,
    ) -> Result<(), BackendError> {
        if !self.transforms.contains_key(&transform) {
            return Err(BackendError::UnknownObject(ObjectRef::Transform(transform)));
        }
        let matrix = decode_matrix(matrix, transpose);
        let inverse = match inverse {
            Some(inverse) => decode_matrix(inverse, transpose),
            None => matrix.inverse(),
        };
        let stamp = self.tick_clock();
        if let Some(entry) = self.transforms.get_mut(&transform) {
            entry.matrix = matrix;
            entry.inverse = inverse;
            entry.stamp = stamp;
        }
        Ok(())
    }

    fn mark_acceleration_dirty(&mut self, group: GroupId) -> Result<(), BackendError> {
        self.group_mut(group)?.dirty = true;
        Ok(())
    }

    fn rebuild_acceleration(&mut self, group: GroupId) -> Result<(), BackendError> {
        let built = self.compile_group(self.group(group)?, 0)?;
        let stamp = self.tick_clock();
        let entry = self.group_mut(group)?;
        entry.built = Some(built);
        entry.dirty = false;
        entry.stamp = stamp;
        debug!(
            "{}: rebuilt {:?} over {} children",
            ObjectRef::Group(group),
            entry.accel,
            entry.children.len()
        );
        Ok(())
    }

    fn set_top_object(&mut self, group: GroupId) -> Result<(), BackendError> {
        self.group(group)?;
        self.top = Some(group);
        Ok(())
    }

    fn validate(&mut self) -> Result<(), BackendError> {
        let top = self
            .top
            .ok_or_else(|| BackendError::Validation("no top object set".to_string()))?;
        self.check_reachable(NodeRef::Group(top), 0)
    }

    fn set_camera(&mut self, camera: &PinholeCamera) {
        self.camera = *camera;
    }

    fn set_frame_number(&mut self, frame: u32) {
        self.frame = frame;
    }

    fn resize_output(&mut self, width: u32, height: u32) -> Result<(), BackendError> {
        if width == 0 || height == 0 {
            return Err(BackendError::InvalidOutputSize { width, height });
        }
        if (width, height) != (self.output.width(), self.output.height()) {
            debug!("Output resized to {width}x{height}");
            self.output = Accumulator::new(width, height);
        }
        Ok(())
    }

    fn launch(&mut self, entry_point: u32, width: u32, height: u32) -> Result<(), BackendError> {
        if entry_point != PINHOLE_ENTRY {
            return Err(BackendError::Validation(format!(
                "no ray generation program at entry point {entry_point}"
            )));
        }
        if width == 0
            || height == 0
            || (width, height) != (self.output.width(), self.output.height())
        {
            return Err(BackendError::InvalidOutputSize { width, height });
        }
        let top = self
            .top
            .ok_or_else(|| BackendError::Validation("no top object set".to_string()))?;

        self.refresh(NodeRef::Group(top), 0)?;
        let world = self
            .group(top)?
            .built
            .clone()
            .ok_or_else(|| BackendError::Validation(format!("{} was never built", ObjectRef::Group(top))))?;
        let surfaces = self.surfaces();
        let scene = SceneView {
            world: world.as_ref(),
            surfaces: &surfaces,
        };

        let frame = self.frame;
        let camera = self.camera;
        let settings = &self.settings;
        let mut samples = vec![Color::ZERO; width as usize * height as usize];
        samples
            .par_chunks_mut(width as usize)
            .enumerate()
            .for_each(|(y, row)| {
                let y = y as u32;
                let mut rng = StdRng::seed_from_u64(row_seed(frame, y));
                for (x, pixel) in row.iter_mut().enumerate() {
                    *pixel = render_pixel(
                        &scene,
                        &camera,
                        (x as u32, y),
                        (width, height),
                        settings,
                        &mut rng,
                    );
                }
            });

        self.output.blend(&samples, frame);
        self.launches += 1;
        debug!("Launched frame {frame} at {width}x{height}");
        Ok(())
    }

    fn output(&self) -> OutputView<'_> {
        OutputView {
            width: self.output.width(),
            height: self.output.height(),
            pixels: self.output.display(),
        }
    }

    fn destroy(&mut self, object: ObjectRef) {
        let removed = match object {
            ObjectRef::Program(id) => self.programs.remove(&id).is_some(),
            ObjectRef::Geometry(id) => self.geometries.remove(&id).is_some(),
            ObjectRef::Instance(id) => self.instances.remove(&id).is_some(),
            ObjectRef::Group(id) => {
                if self.top == Some(id) {
                    self.top = None;
                }
                self.groups.remove(&id).is_some()
            }
            ObjectRef::Transform(id) => self.transforms.remove(&id).is_some(),
            ObjectRef::Material(id) => self.materials.remove(&id).is_some(),
        };
        if removed {
            debug!("Destroyed {object}");
        }
    }
}

impl std::fmt::Debug for CpuEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CpuEngine")
            .field("settings", &self.settings)
            .field("objects", &self.object_count())
            .field("top", &self.top)
            .field("frame", &self.frame)
            .field("size", &(self.output.width(), self.output.height()))
            .finish()
    }
}
