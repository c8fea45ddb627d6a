//! The seam between the scene graph and a ray-tracing engine.
//!
//! The scene graph never traces rays itself. It drives an engine through
//! [`RayTracingBackend`]: create shape containers, instances, groups and
//! transforms, keep their matrices current, mark acceleration structures
//! dirty and ask for rebuilds, then launch frames into an output buffer.
//! Objects are referred to by small copyable ids the backend hands out.

use std::fmt;

use pathview_math::{PinholeCamera, Vec3, Vec4};
use thiserror::Error;

use crate::primitive::ShapeData;

macro_rules! object_ids {
    ($($(#[$meta:meta])* $name:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
            pub struct $name(pub u32);
        )*
    };
}

object_ids! {
    /// A compiled intersection, bounding-box or shading routine.
    ProgramId,
    /// A shape container: primitive data plus its two routines.
    GeometryId,
    /// A shape container bound to a material and shading parameters.
    InstanceId,
    /// A list of children with its own acceleration structure.
    GroupId,
    /// A matrix pair applied to exactly one child.
    TransformId,
    /// A surface response (closest-hit / any-hit pair).
    MaterialId,
}

/// Anything that can hang below a group or a transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeRef {
    Instance(InstanceId),
    Group(GroupId),
    Transform(TransformId),
}

/// Any backend object, for release and error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectRef {
    Program(ProgramId),
    Geometry(GeometryId),
    Instance(InstanceId),
    Group(GroupId),
    Transform(TransformId),
    Material(MaterialId),
}

impl From<NodeRef> for ObjectRef {
    fn from(node: NodeRef) -> Self {
        match node {
            NodeRef::Instance(id) => ObjectRef::Instance(id),
            NodeRef::Group(id) => ObjectRef::Group(id),
            NodeRef::Transform(id) => ObjectRef::Transform(id),
        }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectRef::Program(id) => write!(f, "program #{}", id.0),
            ObjectRef::Geometry(id) => write!(f, "geometry #{}", id.0),
            ObjectRef::Instance(id) => write!(f, "instance #{}", id.0),
            ObjectRef::Group(id) => write!(f, "group #{}", id.0),
            ObjectRef::Transform(id) => write!(f, "transform #{}", id.0),
            ObjectRef::Material(id) => write!(f, "material #{}", id.0),
        }
    }
}

/// Where a device program lives: a module path and an entry-point name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProgramSource {
    pub path: String,
    pub entry: String,
}

impl ProgramSource {
    pub fn new(path: impl Into<String>, entry: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            entry: entry.into(),
        }
    }
}

/// The routine pair every shape container needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrimitivePrograms {
    pub intersection: ProgramId,
    pub bounds: ProgramId,
}

/// Acceleration structure builder requested for a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccelKind {
    /// Children are tested linearly; nothing to build.
    NoAccel,
    /// Bounding volume hierarchy over the children's bounds.
    Bvh,
}

/// Built-in surface responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MaterialKind {
    Diffuse,
    Reflection,
    DiffuseEmitter,
}

/// A named per-instance shading value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamValue {
    Float(f32),
    Float3(Vec3),
    Float4(Vec4),
    Int(i32),
    UInt(u32),
}

impl ParamValue {
    /// The value as a colour/vector, if it is one.
    pub fn as_vec3(&self) -> Option<Vec3> {
        match *self {
            ParamValue::Float3(v) => Some(v),
            ParamValue::Float4(v) => Some(v.truncate()),
            _ => None,
        }
    }
}

/// Read access to the shared RGBA float output buffer.
///
/// Row 0 is the bottom of the image, matching the launch index of the
/// ray-generation program.
#[derive(Debug, Clone, Copy)]
pub struct OutputView<'a> {
    pub width: u32,
    pub height: u32,
    pub pixels: &'a [Vec4],
}

/// Errors reported by a ray-tracing engine.
///
/// Any of these leaves the engine in a state the scene graph cannot reason
/// about, so they surface as resource errors and end the session.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    #[error("program '{entry}' not found in '{path}'")]
    ProgramNotFound { path: String, entry: String },

    #[error("unknown {0}")]
    UnknownObject(ObjectRef),

    #[error("{child} cannot be attached below {parent}")]
    InvalidChild { parent: ObjectRef, child: ObjectRef },

    #[error("invalid output size {width}x{height}")]
    InvalidOutputSize { width: u32, height: u32 },

    #[error("shape data rejected: {0}")]
    InvalidShape(String),

    #[error("context validation failed: {0}")]
    Validation(String),
}

/// Operations the scene graph consumes from a ray-tracing engine.
///
/// Matrices are passed as 16 floats, row-major unless `transpose` is set.
/// A missing inverse asks the engine to invert the matrix itself.
pub trait RayTracingBackend {
    /// Compile (or look up) a device program.
    fn create_program(&mut self, source: &ProgramSource) -> Result<ProgramId, BackendError>;

    /// Create a shape container holding `shape` with `primitive_count` primitives.
    fn create_geometry(
        &mut self,
        programs: PrimitivePrograms,
        primitive_count: u32,
        shape: &ShapeData,
    ) -> Result<GeometryId, BackendError>;

    fn create_instance(&mut self, geometry: GeometryId) -> Result<InstanceId, BackendError>;

    fn create_material(&mut self, kind: MaterialKind) -> Result<MaterialId, BackendError>;

    /// Bind `material` to slot 0 of an instance, replacing any previous one.
    fn set_instance_material(
        &mut self,
        instance: InstanceId,
        material: MaterialId,
    ) -> Result<(), BackendError>;

    fn set_instance_param(
        &mut self,
        instance: InstanceId,
        name: &str,
        value: ParamValue,
    ) -> Result<(), BackendError>;

    fn create_group(&mut self, accel: AccelKind) -> Result<GroupId, BackendError>;

    fn add_child(&mut self, group: GroupId, child: NodeRef) -> Result<(), BackendError>;

    fn remove_child(&mut self, group: GroupId, child: NodeRef) -> Result<(), BackendError>;

    /// Create a transform over `child`, initialised to identity.
    fn create_transform(&mut self, child: NodeRef) -> Result<TransformId, BackendError>;

    fn set_transform(
        &mut self,
        transform: TransformId,
        matrix: &[f32; 16],
        inverse: Option<&[f32; 16]>,
        transpose: bool,
    ) -> Result<(), BackendError>;

    /// Flag a group's acceleration structure for rebuilding.
    fn mark_acceleration_dirty(&mut self, group: GroupId) -> Result<(), BackendError>;

    /// Rebuild a group's acceleration structure from its current children.
    fn rebuild_acceleration(&mut self, group: GroupId) -> Result<(), BackendError>;

    /// Make `group` the root every launched ray starts from.
    fn set_top_object(&mut self, group: GroupId) -> Result<(), BackendError>;

    /// Check the whole node graph is consistent and ready to launch.
    fn validate(&mut self) -> Result<(), BackendError>;

    fn set_camera(&mut self, camera: &PinholeCamera);

    /// Sample index the next launch blends in; 0 restarts accumulation.
    fn set_frame_number(&mut self, frame: u32);

    fn resize_output(&mut self, width: u32, height: u32) -> Result<(), BackendError>;

    /// Trace one frame. Blocks until the frame is in the output buffer.
    fn launch(&mut self, entry_point: u32, width: u32, height: u32) -> Result<(), BackendError>;

    fn output(&self) -> OutputView<'_>;

    /// Release an object. Unknown ids are ignored.
    fn destroy(&mut self, object: ObjectRef);
}
