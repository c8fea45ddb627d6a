//! Renderable geometry nodes.
//!
//! A bound node owns a small backend subtree:
//!
//! ```text
//! transform ── group (Bvh) ── instance ── geometry (shared)
//! ```
//!
//! The transform is the attachment point the scene graph hangs under its
//! global group. The geometry is reference counted between a node and all of
//! its instances, and only destroyed when the last of them is released.

use std::collections::BTreeMap;
use std::rc::Rc;

use pathview_math::{to_row_major, Mat4, Pose, Vec3};

use crate::accel::AccelerationState;
use crate::backend::{
    AccelKind, GeometryId, InstanceId, MaterialId, NodeRef, ObjectRef, ParamValue,
    TransformId,
};
use crate::context::RenderContext;
use crate::error::{Result, SceneError};
use crate::primitive::{PrimitiveKind, ShapeData};

/// Backend shape container plus the data it was created from.
#[derive(Debug)]
pub struct SharedGeometry {
    id: GeometryId,
    shape: ShapeData,
}

impl SharedGeometry {
    pub fn id(&self) -> GeometryId {
        self.id
    }

    pub fn shape(&self) -> &ShapeData {
        &self.shape
    }
}

/// A backend instance referring to shared geometry.
#[derive(Debug)]
pub struct GeometryInstance {
    geometry: Rc<SharedGeometry>,
    id: InstanceId,
}

impl GeometryInstance {
    pub fn id(&self) -> InstanceId {
        self.id
    }

    pub fn geometry(&self) -> &SharedGeometry {
        &self.geometry
    }

    pub fn shares_geometry_with(&self, other: &GeometryInstance) -> bool {
        Rc::ptr_eq(&self.geometry, &other.geometry)
    }

    /// Number of live instances using the same geometry.
    pub fn sharers(&self) -> usize {
        Rc::strong_count(&self.geometry)
    }
}

#[derive(Debug)]
struct NodeBinding {
    instance: GeometryInstance,
    group: AccelerationState,
    transform: TransformId,
}

/// One renderable object with its own pose.
#[derive(Debug)]
pub struct GeometryNode {
    kind: PrimitiveKind,
    primitive_count: u32,
    pose: Pose,
    matrix: Mat4,
    inverse: Mat4,
    material: Option<MaterialId>,
    params: BTreeMap<String, ParamValue>,
    binding: Option<NodeBinding>,
    parent: Option<AccelerationState>,
}

impl GeometryNode {
    /// Upload `shape` into a new shape container and build the node's subtree.
    pub fn new(ctx: &mut RenderContext, shape: ShapeData) -> Result<Self> {
        let kind = shape.kind();
        let primitive_count = shape.primitive_count();
        let programs = ctx.programs(kind)?;
        let id = ctx
            .backend_mut()
            .create_geometry(programs, primitive_count, &shape)?;
        log::debug!("Created {} geometry with {} primitives", kind, primitive_count);

        Self::bind(ctx, Rc::new(SharedGeometry { id, shape }), Pose::default())
    }

    /// A node with no rendering context. It keeps a pose but owns no backend
    /// objects, so it cannot be attached or instanced.
    pub fn inert(shape: &ShapeData) -> Self {
        Self {
            kind: shape.kind(),
            primitive_count: shape.primitive_count(),
            pose: Pose::default(),
            matrix: Mat4::IDENTITY,
            inverse: Mat4::IDENTITY,
            material: None,
            params: BTreeMap::new(),
            binding: None,
            parent: None,
        }
    }

    fn bind(ctx: &mut RenderContext, geometry: Rc<SharedGeometry>, pose: Pose) -> Result<Self> {
        let backend = ctx.backend_mut();
        let instance = backend.create_instance(geometry.id)?;
        let group = backend.create_group(AccelKind::Bvh)?;
        backend.add_child(group, NodeRef::Instance(instance))?;
        let transform = backend.create_transform(NodeRef::Group(group))?;

        let group = AccelerationState::new(group, AccelKind::Bvh);
        backend.mark_acceleration_dirty(group.group())?;

        let identity = to_row_major(&Mat4::IDENTITY);
        backend.set_transform(transform, &identity, Some(&identity), false)?;

        let mut node = Self {
            kind: geometry.shape.kind(),
            primitive_count: geometry.shape.primitive_count(),
            pose: Pose::default(),
            matrix: Mat4::IDENTITY,
            inverse: Mat4::IDENTITY,
            material: None,
            params: BTreeMap::new(),
            binding: Some(NodeBinding {
                instance: GeometryInstance { geometry, id: instance },
                group,
                transform,
            }),
            parent: None,
        };
        if pose != Pose::default() {
            node.pose = pose;
            node.apply_pose(ctx)?;
        }
        Ok(node)
    }

    /// A new node sharing this node's geometry, with a copy of its pose and
    /// its own instance, group and transform.
    pub fn instance(&self, ctx: &mut RenderContext) -> Result<GeometryNode> {
        let Some(binding) = &self.binding else {
            return Err(SceneError::Configuration(format!(
                "cannot instance an inert {} node: it has no rendering context",
                self.kind
            )));
        };
        let node = Self::bind(ctx, Rc::clone(&binding.instance.geometry), self.pose)?;
        log::debug!(
            "Instanced {} geometry ({} sharers)",
            self.kind,
            binding.instance.sharers()
        );
        Ok(node)
    }

    pub fn kind(&self) -> PrimitiveKind {
        self.kind
    }

    pub fn primitive_count(&self) -> u32 {
        self.primitive_count
    }

    pub fn is_inert(&self) -> bool {
        self.binding.is_none()
    }

    pub fn pose(&self) -> Pose {
        self.pose
    }

    pub fn position(&self) -> Vec3 {
        self.pose.position
    }

    /// Euler rotation in degrees.
    pub fn rotation(&self) -> Vec3 {
        self.pose.rotation_degrees
    }

    pub fn scale(&self) -> Vec3 {
        self.pose.scale
    }

    pub fn matrix(&self) -> Mat4 {
        self.matrix
    }

    pub fn inverse_matrix(&self) -> Mat4 {
        self.inverse
    }

    pub fn material(&self) -> Option<MaterialId> {
        self.material
    }

    pub fn param(&self, name: &str) -> Option<ParamValue> {
        self.params.get(name).copied()
    }

    pub fn params(&self) -> impl Iterator<Item = (&str, ParamValue)> {
        self.params.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn geometry_instance(&self) -> Option<&GeometryInstance> {
        self.binding.as_ref().map(|b| &b.instance)
    }

    /// Acceleration handle of the node's own group.
    pub fn group(&self) -> Option<&AccelerationState> {
        self.binding.as_ref().map(|b| &b.group)
    }

    /// The subtree root a parent group holds.
    pub fn transform_id(&self) -> Option<TransformId> {
        self.binding.as_ref().map(|b| b.transform)
    }

    pub fn is_attached(&self) -> bool {
        self.parent.is_some()
    }

    pub(crate) fn set_parent(&mut self, parent: Option<AccelerationState>) {
        self.parent = parent;
    }

    pub fn set_pose(
        &mut self,
        ctx: &mut RenderContext,
        position: Vec3,
        rotation_degrees: Vec3,
        scale: Vec3,
    ) -> Result<()> {
        self.pose = Pose::new(position, rotation_degrees, scale);
        self.apply_pose(ctx)
    }

    pub fn set_position(&mut self, ctx: &mut RenderContext, position: Vec3) -> Result<()> {
        self.pose.position = position;
        self.apply_pose(ctx)
    }

    pub fn set_rotation(&mut self, ctx: &mut RenderContext, rotation_degrees: Vec3) -> Result<()> {
        self.pose.rotation_degrees = rotation_degrees;
        self.apply_pose(ctx)
    }

    pub fn set_scale(&mut self, ctx: &mut RenderContext, scale: Vec3) -> Result<()> {
        self.pose.scale = scale;
        self.apply_pose(ctx)
    }

    fn apply_pose(&mut self, ctx: &mut RenderContext) -> Result<()> {
        self.matrix = self.pose.matrix();
        self.inverse = self.pose.inverse_matrix();
        let matrix = to_row_major(&self.matrix);
        let inverse = to_row_major(&self.inverse);
        self.push_transform(ctx, &matrix, Some(&inverse), false)
    }

    /// Set the matrix directly, bypassing the pose. `matrix` is row-major
    /// unless `transpose` is set. Without `inverse` the backend inverts it.
    ///
    /// The stored pose is left as it was and no longer describes the matrix.
    pub fn set_transform(
        &mut self,
        ctx: &mut RenderContext,
        matrix: &[f32; 16],
        inverse: Option<&[f32; 16]>,
        transpose: bool,
    ) -> Result<()> {
        let decode = |m: &[f32; 16]| {
            let stored = Mat4::from_cols_array(m);
            if transpose {
                stored
            } else {
                stored.transpose()
            }
        };
        self.matrix = decode(matrix);
        self.inverse = match inverse {
            Some(inv) => decode(inv),
            None => self.matrix.inverse(),
        };
        self.push_transform(ctx, matrix, inverse, transpose)
    }

    fn push_transform(
        &mut self,
        ctx: &mut RenderContext,
        matrix: &[f32; 16],
        inverse: Option<&[f32; 16]>,
        transpose: bool,
    ) -> Result<()> {
        let Some(binding) = &self.binding else {
            return Ok(());
        };
        let backend = ctx.backend_mut();
        backend.set_transform(binding.transform, matrix, inverse, transpose)?;
        if let Some(parent) = &self.parent {
            parent.mark(backend)?;
        }
        Ok(())
    }

    /// Bind a material to the node's single material slot, replacing any
    /// previous one.
    pub fn set_material(&mut self, ctx: &mut RenderContext, material: MaterialId) -> Result<()> {
        self.material = Some(material);
        if let Some(binding) = &self.binding {
            ctx.backend_mut()
                .set_instance_material(binding.instance.id, material)?;
        }
        Ok(())
    }

    pub fn set_param(
        &mut self,
        ctx: &mut RenderContext,
        name: &str,
        value: ParamValue,
    ) -> Result<()> {
        self.params.insert(name.to_string(), value);
        if let Some(binding) = &self.binding {
            ctx.backend_mut()
                .set_instance_param(binding.instance.id, name, value)?;
        }
        Ok(())
    }

    /// Destroy the node's backend objects. The shared geometry goes too if no
    /// other node still uses it.
    ///
    /// A node still attached to a graph is handed back untouched; detach it
    /// first.
    pub fn release(self, ctx: &mut RenderContext) -> std::result::Result<(), GeometryNode> {
        if self.parent.is_some() {
            log::warn!("Refusing to release a {} node that is still attached", self.kind);
            return Err(self);
        }
        let Some(binding) = self.binding else {
            return Ok(());
        };
        let backend = ctx.backend_mut();
        backend.destroy(ObjectRef::Transform(binding.transform));
        backend.destroy(ObjectRef::Group(binding.group.group()));
        backend.destroy(ObjectRef::Instance(binding.instance.id));

        if let Ok(geometry) = Rc::try_unwrap(binding.instance.geometry) {
            log::debug!("Last {} sharer released, destroying geometry", self.kind);
            backend.destroy(ObjectRef::Geometry(geometry.id));
        }
        Ok(())
    }
}
