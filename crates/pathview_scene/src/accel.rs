//! Dirty tracking for acceleration structures.
//!
//! Each group in the node graph owns one acceleration structure. Its state is
//! a pair of counters: `generation` advances on every mutation that
//! invalidates the structure, `built` records the generation the last rebuild
//! started from. The structure is dirty while they differ.
//!
//! Handles are cheap clones sharing the same counters, so a geometry node can
//! dirty the group it hangs under without knowing anything about the graph.

use std::cell::Cell;
use std::rc::Rc;

use crate::backend::{AccelKind, BackendError, GroupId, RayTracingBackend};

#[derive(Debug, Default)]
struct Counters {
    generation: Cell<u64>,
    built: Cell<u64>,
}

/// Shared handle on one group's acceleration structure.
#[derive(Debug, Clone)]
pub struct AccelerationState {
    group: GroupId,
    kind: AccelKind,
    counters: Rc<Counters>,
}

impl AccelerationState {
    /// A freshly created structure has never been built, so it starts dirty.
    pub fn new(group: GroupId, kind: AccelKind) -> Self {
        let counters = Counters::default();
        counters.generation.set(1);
        Self {
            group,
            kind,
            counters: Rc::new(counters),
        }
    }

    pub fn group(&self) -> GroupId {
        self.group
    }

    pub fn kind(&self) -> AccelKind {
        self.kind
    }

    pub fn generation(&self) -> u64 {
        self.counters.generation.get()
    }

    pub fn is_dirty(&self) -> bool {
        self.counters.generation.get() != self.counters.built.get()
    }

    /// Invalidate the structure and tell the backend.
    pub fn mark(&self, backend: &mut dyn RayTracingBackend) -> Result<(), BackendError> {
        self.counters.generation.set(self.counters.generation.get() + 1);
        backend.mark_acceleration_dirty(self.group)
    }

    /// Rebuild if dirty. Returns whether a rebuild was issued.
    ///
    /// The generation is snapshotted before the backend call, so a mutation
    /// that lands while the build runs leaves the structure dirty.
    pub fn rebuild(&self, backend: &mut dyn RayTracingBackend) -> Result<bool, BackendError> {
        if !self.is_dirty() {
            return Ok(false);
        }
        let snapshot = self.counters.generation.get();
        backend.rebuild_acceleration(self.group)?;
        self.counters.built.set(snapshot);
        Ok(true)
    }

    /// Whether two handles refer to the same structure.
    pub fn same_as(&self, other: &AccelerationState) -> bool {
        Rc::ptr_eq(&self.counters, &other.counters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Call, RecordingBackend};

    #[test]
    fn test_new_structure_is_dirty() {
        let accel = AccelerationState::new(GroupId(3), AccelKind::Bvh);
        assert!(accel.is_dirty());
        assert_eq!(accel.group(), GroupId(3));
        assert_eq!(accel.kind(), AccelKind::Bvh);
    }

    #[test]
    fn test_rebuild_clears_and_is_idempotent() {
        let mut backend = RecordingBackend::new();
        let accel = AccelerationState::new(GroupId(0), AccelKind::Bvh);

        assert!(accel.rebuild(&mut backend).unwrap());
        assert!(!accel.is_dirty());
        assert!(!accel.rebuild(&mut backend).unwrap());

        let rebuilds = backend
            .log()
            .calls()
            .iter()
            .filter(|c| matches!(c, Call::RebuildAcceleration(_)))
            .count();
        assert_eq!(rebuilds, 1);
    }

    #[test]
    fn test_mark_after_rebuild_redirties() {
        let mut backend = RecordingBackend::new();
        let accel = AccelerationState::new(GroupId(0), AccelKind::Bvh);
        accel.rebuild(&mut backend).unwrap();

        let other = accel.clone();
        other.mark(&mut backend).unwrap();

        assert!(accel.is_dirty());
        assert!(accel.same_as(&other));
        assert!(backend
            .log()
            .calls()
            .contains(&Call::MarkDirty(GroupId(0))));
    }

    #[test]
    fn test_failed_rebuild_stays_dirty() {
        let mut backend = RecordingBackend::new();
        backend.log().fail_rebuilds(true);
        let accel = AccelerationState::new(GroupId(0), AccelKind::Bvh);

        assert!(accel.rebuild(&mut backend).is_err());
        assert!(accel.is_dirty());
    }
}
