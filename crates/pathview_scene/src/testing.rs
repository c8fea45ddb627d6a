//! A backend double that records every call, for asserting backend traffic
//! in unit tests.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet};
use std::rc::Rc;

use pathview_math::{PinholeCamera, Vec4};

use crate::backend::{
    AccelKind, BackendError, GeometryId, GroupId, InstanceId, MaterialId, MaterialKind, NodeRef,
    ObjectRef, OutputView, ParamValue, PrimitivePrograms, ProgramId, ProgramSource,
    RayTracingBackend, TransformId,
};
use crate::primitive::{PrimitiveKind, ShapeData};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CreateProgram(ProgramSource),
    CreateGeometry {
        id: GeometryId,
        kind: PrimitiveKind,
        primitive_count: u32,
    },
    CreateInstance(InstanceId, GeometryId),
    CreateMaterial(MaterialKind),
    SetMaterial(InstanceId, MaterialId),
    SetParam(InstanceId, String, ParamValue),
    CreateGroup(GroupId, AccelKind),
    AddChild(GroupId, NodeRef),
    RemoveChild(GroupId, NodeRef),
    CreateTransform(TransformId, NodeRef),
    SetTransform {
        id: TransformId,
        matrix: [f32; 16],
        inverse: Option<[f32; 16]>,
        transpose: bool,
    },
    MarkDirty(GroupId),
    RebuildAcceleration(GroupId),
    SetTopObject(GroupId),
    Validate,
    SetCamera(PinholeCamera),
    SetFrameNumber(u32),
    Resize(u32, u32),
    Launch {
        entry: u32,
        width: u32,
        height: u32,
    },
    Destroy(ObjectRef),
}

#[derive(Debug, Default)]
struct State {
    calls: Vec<Call>,
    next_id: u32,
    children: BTreeMap<GroupId, Vec<NodeRef>>,
    live: HashSet<ObjectRef>,
    rejected_entries: HashSet<String>,
    fail_rebuilds: bool,
    fail_materials: bool,
    fail_removals: bool,
}

/// Shared view on what a [`RecordingBackend`] has seen. Survives the backend
/// being boxed into a render context.
#[derive(Debug, Clone, Default)]
pub struct RecordingLog {
    state: Rc<RefCell<State>>,
}

impl RecordingLog {
    pub fn calls(&self) -> Vec<Call> {
        self.state.borrow().calls.clone()
    }

    pub fn clear(&self) {
        self.state.borrow_mut().calls.clear();
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.state.borrow().calls.iter().filter(|c| pred(c)).count()
    }

    pub fn program_creations(&self) -> usize {
        self.count(|c| matches!(c, Call::CreateProgram(_)))
    }

    pub fn children(&self, group: GroupId) -> Vec<NodeRef> {
        self.state
            .borrow()
            .children
            .get(&group)
            .cloned()
            .unwrap_or_default()
    }

    pub fn is_live(&self, object: ObjectRef) -> bool {
        self.state.borrow().live.contains(&object)
    }

    /// Most recent matrix pair pushed to `id`.
    pub fn last_transform(&self, id: TransformId) -> Option<([f32; 16], Option<[f32; 16]>)> {
        self.state.borrow().calls.iter().rev().find_map(|c| match c {
            Call::SetTransform {
                id: t,
                matrix,
                inverse,
                ..
            } if *t == id => Some((*matrix, *inverse)),
            _ => None,
        })
    }

    pub fn last_frame_number(&self) -> Option<u32> {
        self.state.borrow().calls.iter().rev().find_map(|c| match c {
            Call::SetFrameNumber(n) => Some(*n),
            _ => None,
        })
    }

    /// Make `create_program` fail with `ProgramNotFound` for this entry point.
    pub fn reject_entry(&self, entry: &str) {
        self.state
            .borrow_mut()
            .rejected_entries
            .insert(entry.to_string());
    }

    pub fn allow_entry(&self, entry: &str) {
        self.state.borrow_mut().rejected_entries.remove(entry);
    }

    pub fn fail_rebuilds(&self, fail: bool) {
        self.state.borrow_mut().fail_rebuilds = fail;
    }

    pub fn fail_materials(&self, fail: bool) {
        self.state.borrow_mut().fail_materials = fail;
    }

    pub fn fail_removals(&self, fail: bool) {
        self.state.borrow_mut().fail_removals = fail;
    }
}

/// Records calls, hands out sequential ids and fills the output with a
/// gradient on launch.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    log: RecordingLog,
    width: u32,
    height: u32,
    output: Vec<Vec4>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> RecordingLog {
        self.log.clone()
    }

    fn record(&self, call: Call) {
        self.log.state.borrow_mut().calls.push(call);
    }

    fn next_id(&self, make: impl FnOnce(u32) -> ObjectRef) -> u32 {
        let mut state = self.log.state.borrow_mut();
        let id = state.next_id;
        state.next_id += 1;
        state.live.insert(make(id));
        id
    }

    fn check(&self, object: ObjectRef) -> Result<(), BackendError> {
        if self.log.is_live(object) {
            Ok(())
        } else {
            Err(BackendError::UnknownObject(object))
        }
    }
}

impl RayTracingBackend for RecordingBackend {
    fn create_program(&mut self, source: &ProgramSource) -> Result<ProgramId, BackendError> {
        self.record(Call::CreateProgram(source.clone()));
        if self
            .log
            .state
            .borrow()
            .rejected_entries
            .contains(&source.entry)
        {
            return Err(BackendError::ProgramNotFound {
                path: source.path.clone(),
                entry: source.entry.clone(),
            });
        }
        Ok(ProgramId(self.next_id(|id| {
            ObjectRef::Program(ProgramId(id))
        })))
    }

    fn create_geometry(
        &mut self,
        programs: PrimitivePrograms,
        primitive_count: u32,
        shape: &ShapeData,
    ) -> Result<GeometryId, BackendError> {
        self.check(ObjectRef::Program(programs.intersection))?;
        self.check(ObjectRef::Program(programs.bounds))?;
        let id = GeometryId(self.next_id(|id| ObjectRef::Geometry(GeometryId(id))));
        self.record(Call::CreateGeometry {
            id,
            kind: shape.kind(),
            primitive_count,
        });
        Ok(id)
    }

    fn create_instance(&mut self, geometry: GeometryId) -> Result<InstanceId, BackendError> {
        self.check(ObjectRef::Geometry(geometry))?;
        let id = InstanceId(self.next_id(|id| ObjectRef::Instance(InstanceId(id))));
        self.record(Call::CreateInstance(id, geometry));
        Ok(id)
    }

    fn create_material(&mut self, kind: MaterialKind) -> Result<MaterialId, BackendError> {
        self.record(Call::CreateMaterial(kind));
        if self.log.state.borrow().fail_materials {
            return Err(BackendError::Validation(format!("{kind:?} material failed")));
        }
        Ok(MaterialId(self.next_id(|id| {
            ObjectRef::Material(MaterialId(id))
        })))
    }

    fn set_instance_material(
        &mut self,
        instance: InstanceId,
        material: MaterialId,
    ) -> Result<(), BackendError> {
        self.check(ObjectRef::Instance(instance))?;
        self.record(Call::SetMaterial(instance, material));
        Ok(())
    }

    fn set_instance_param(
        &mut self,
        instance: InstanceId,
        name: &str,
        value: ParamValue,
    ) -> Result<(), BackendError> {
        self.check(ObjectRef::Instance(instance))?;
        self.record(Call::SetParam(instance, name.to_string(), value));
        Ok(())
    }

    fn create_group(&mut self, accel: AccelKind) -> Result<GroupId, BackendError> {
        let id = GroupId(self.next_id(|id| ObjectRef::Group(GroupId(id))));
        self.log.state.borrow_mut().children.insert(id, Vec::new());
        self.record(Call::CreateGroup(id, accel));
        Ok(id)
    }

    fn add_child(&mut self, group: GroupId, child: NodeRef) -> Result<(), BackendError> {
        self.check(ObjectRef::Group(group))?;
        self.check(child.into())?;
        self.log
            .state
            .borrow_mut()
            .children
            .entry(group)
            .or_default()
            .push(child);
        self.record(Call::AddChild(group, child));
        Ok(())
    }

    fn remove_child(&mut self, group: GroupId, child: NodeRef) -> Result<(), BackendError> {
        self.check(ObjectRef::Group(group))?;
        if self.log.state.borrow().fail_removals {
            return Err(BackendError::Validation(format!(
                "removal from group #{} failed",
                group.0
            )));
        }
        {
            let mut state = self.log.state.borrow_mut();
            let children = state.children.entry(group).or_default();
            let Some(pos) = children.iter().position(|c| *c == child) else {
                return Err(BackendError::UnknownObject(child.into()));
            };
            children.remove(pos);
        }
        self.record(Call::RemoveChild(group, child));
        Ok(())
    }

    fn create_transform(&mut self, child: NodeRef) -> Result<TransformId, BackendError> {
        self.check(child.into())?;
        let id = TransformId(self.next_id(|id| ObjectRef::Transform(TransformId(id))));
        self.record(Call::CreateTransform(id, child));
        Ok(id)
    }

    fn set_transform(
        &mut self,
        transform: TransformId,
        matrix: &[f32; 16],
        inverse: Option<&[f32; 16]>,
        transpose: bool,
    ) -> Result<(), BackendError> {
        self.check(ObjectRef::Transform(transform))?;
        self.record(Call::SetTransform {
            id: transform,
            matrix: *matrix,
            inverse: inverse.copied(),
            transpose,
        });
        Ok(())
    }

    fn mark_acceleration_dirty(&mut self, group: GroupId) -> Result<(), BackendError> {
        self.record(Call::MarkDirty(group));
        Ok(())
    }

    fn rebuild_acceleration(&mut self, group: GroupId) -> Result<(), BackendError> {
        if self.log.state.borrow().fail_rebuilds {
            return Err(BackendError::Validation(format!(
                "rebuild of group #{} failed",
                group.0
            )));
        }
        self.record(Call::RebuildAcceleration(group));
        Ok(())
    }

    fn set_top_object(&mut self, group: GroupId) -> Result<(), BackendError> {
        self.check(ObjectRef::Group(group))?;
        self.record(Call::SetTopObject(group));
        Ok(())
    }

    fn validate(&mut self) -> Result<(), BackendError> {
        self.record(Call::Validate);
        Ok(())
    }

    fn set_camera(&mut self, camera: &PinholeCamera) {
        self.record(Call::SetCamera(*camera));
    }

    fn set_frame_number(&mut self, frame: u32) {
        self.record(Call::SetFrameNumber(frame));
    }

    fn resize_output(&mut self, width: u32, height: u32) -> Result<(), BackendError> {
        if width == 0 || height == 0 {
            return Err(BackendError::InvalidOutputSize { width, height });
        }
        self.width = width;
        self.height = height;
        self.output = vec![Vec4::ZERO; (width * height) as usize];
        self.record(Call::Resize(width, height));
        Ok(())
    }

    fn launch(&mut self, entry: u32, width: u32, height: u32) -> Result<(), BackendError> {
        if width != self.width || height != self.height {
            return Err(BackendError::InvalidOutputSize { width, height });
        }
        // Red ramps with x, green with the row index.
        for y in 0..height {
            for x in 0..width {
                self.output[(y * width + x) as usize] = Vec4::new(
                    x as f32 / width as f32,
                    y as f32 / height as f32,
                    0.0,
                    1.0,
                );
            }
        }
        self.record(Call::Launch {
            entry,
            width,
            height,
        });
        Ok(())
    }

    fn output(&self) -> OutputView<'_> {
        OutputView {
            width: self.width,
            height: self.height,
            pixels: &self.output,
        }
    }

    fn destroy(&mut self, object: ObjectRef) {
        self.log.state.borrow_mut().live.remove(&object);
        self.record(Call::Destroy(object));
    }
}
