//! The scene hierarchy and its acceleration bookkeeping.
//!
//! ```text
//! top group (NoAccel)
//!   └─ global transform
//!        └─ global group (Bvh)
//!             ├─ node transform ─ node group ─ instance
//!             └─ ...
//! ```
//!
//! The graph mirrors the backend hierarchy in an index-based arena so it can
//! walk it bottom-up when rebuilding. It does not own geometry nodes, only
//! their attachment.

use std::collections::HashMap;

use pathview_math::{to_row_major, Mat4};

use crate::accel::AccelerationState;
use crate::backend::{AccelKind, GroupId, InstanceId, NodeRef, ObjectRef, TransformId};
use crate::context::RenderContext;
use crate::error::Result;
use crate::node::GeometryNode;

#[derive(Debug)]
enum TreeNode {
    Leaf {
        instance: InstanceId,
    },
    Group {
        accel: AccelerationState,
        children: Vec<usize>,
    },
    Transform {
        transform: TransformId,
        child: usize,
    },
}

/// Slots with a free list, so indices stay stable across removals.
#[derive(Debug, Default)]
struct Arena {
    slots: Vec<Option<TreeNode>>,
    free: Vec<usize>,
}

impl Arena {
    fn insert(&mut self, node: TreeNode) -> usize {
        match self.free.pop() {
            Some(index) => {
                self.slots[index] = Some(node);
                index
            }
            None => {
                self.slots.push(Some(node));
                self.slots.len() - 1
            }
        }
    }

    fn get(&self, index: usize) -> Option<&TreeNode> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    fn get_mut(&mut self, index: usize) -> Option<&mut TreeNode> {
        self.slots.get_mut(index).and_then(Option::as_mut)
    }

    /// Remove `index` and everything below it.
    fn remove_subtree(&mut self, index: usize) {
        let Some(node) = self.slots.get_mut(index).and_then(Option::take) else {
            return;
        };
        self.free.push(index);
        match node {
            TreeNode::Leaf { .. } => {}
            TreeNode::Group { children, .. } => {
                for child in children {
                    self.remove_subtree(child);
                }
            }
            TreeNode::Transform { child, .. } => self.remove_subtree(child),
        }
    }

    fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    fn groups(&self) -> impl Iterator<Item = &AccelerationState> {
        self.slots.iter().filter_map(|slot| match slot {
            Some(TreeNode::Group { accel, .. }) => Some(accel),
            _ => None,
        })
    }
}

/// The top-level hierarchy every launched ray traverses.
#[derive(Debug)]
pub struct SceneGraph {
    arena: Arena,
    root: usize,
    global_index: usize,
    top: AccelerationState,
    global: AccelerationState,
    global_transform: TransformId,
    global_matrix: Mat4,
    global_inverse: Mat4,
    attached: HashMap<TransformId, usize>,
}

impl SceneGraph {
    /// Build the empty hierarchy, make it the backend's top object and bring
    /// it to a clean state.
    pub fn new(ctx: &mut RenderContext) -> Result<Self> {
        let backend = ctx.backend_mut();
        let global_group = backend.create_group(AccelKind::Bvh)?;
        let global_transform = backend.create_transform(NodeRef::Group(global_group))?;
        let identity = to_row_major(&Mat4::IDENTITY);
        backend.set_transform(global_transform, &identity, Some(&identity), false)?;
        let top_group = backend.create_group(AccelKind::NoAccel)?;
        backend.add_child(top_group, NodeRef::Transform(global_transform))?;
        backend.set_top_object(top_group)?;

        let top = AccelerationState::new(top_group, AccelKind::NoAccel);
        let global = AccelerationState::new(global_group, AccelKind::Bvh);

        let mut arena = Arena::default();
        let global_index = arena.insert(TreeNode::Group {
            accel: global.clone(),
            children: Vec::new(),
        });
        let transform_index = arena.insert(TreeNode::Transform {
            transform: global_transform,
            child: global_index,
        });
        let root = arena.insert(TreeNode::Group {
            accel: top.clone(),
            children: vec![transform_index],
        });

        let mut graph = Self {
            arena,
            root,
            global_index,
            top,
            global,
            global_transform,
            global_matrix: Mat4::IDENTITY,
            global_inverse: Mat4::IDENTITY,
            attached: HashMap::new(),
        };
        graph.rebuild(ctx)?;
        log::info!("Scene graph created");
        Ok(graph)
    }

    /// Hang `node` under the global group.
    ///
    /// Returns `Ok(false)` without touching anything when the node is inert
    /// or already attached.
    pub fn attach(&mut self, ctx: &mut RenderContext, node: &mut GeometryNode) -> Result<bool> {
        let (Some(transform), Some(group), Some(instance)) = (
            node.transform_id(),
            node.group().cloned(),
            node.geometry_instance().map(|i| i.id()),
        ) else {
            log::warn!("Cannot attach an inert {} node", node.kind());
            return Ok(false);
        };
        if self.attached.contains_key(&transform) {
            log::warn!("{} node is already attached, ignoring", node.kind());
            return Ok(false);
        }

        let backend = ctx.backend_mut();
        backend.add_child(self.global.group(), NodeRef::Transform(transform))?;

        let leaf = self.arena.insert(TreeNode::Leaf { instance });
        let group_index = self.arena.insert(TreeNode::Group {
            accel: group,
            children: vec![leaf],
        });
        let index = self.arena.insert(TreeNode::Transform {
            transform,
            child: group_index,
        });
        if let Some(TreeNode::Group { children, .. }) = self.arena.get_mut(self.global_index) {
            children.push(index);
        }
        self.attached.insert(transform, index);

        node.set_parent(Some(self.global.clone()));
        self.global.mark(backend)?;
        log::debug!("Attached {} node ({} attached)", node.kind(), self.attached.len());
        Ok(true)
    }

    /// Remove `node` from the global group.
    ///
    /// Detaching a node that is not attached is a no-op returning `Ok(false)`.
    pub fn detach(&mut self, ctx: &mut RenderContext, node: &mut GeometryNode) -> Result<bool> {
        let Some((transform, index)) = node
            .transform_id()
            .and_then(|t| self.attached.get(&t).map(|i| (t, *i)))
        else {
            log::warn!("{} node is not attached, nothing to detach", node.kind());
            return Ok(false);
        };

        let backend = ctx.backend_mut();
        backend.remove_child(self.global.group(), NodeRef::Transform(transform))?;

        if let Some(TreeNode::Group { children, .. }) = self.arena.get_mut(self.global_index) {
            children.retain(|&c| c != index);
        }
        self.arena.remove_subtree(index);
        self.attached.remove(&transform);

        node.set_parent(None);
        self.global.mark(backend)?;
        log::debug!("Detached {} node ({} attached)", node.kind(), self.attached.len());
        Ok(true)
    }

    /// Whether `node`'s subtree hangs below the global group.
    pub fn contains(&self, node: &GeometryNode) -> bool {
        let (Some(transform), Some(instance)) = (
            node.transform_id(),
            node.geometry_instance().map(|i| i.id()),
        ) else {
            return false;
        };
        self.attached
            .get(&transform)
            .is_some_and(|&index| self.leaf_instance(index, transform) == Some(instance))
    }

    /// Instances of every attached node, read from the arena.
    pub fn attached_instances(&self) -> Vec<InstanceId> {
        self.attached
            .iter()
            .filter_map(|(&transform, &index)| self.leaf_instance(index, transform))
            .collect()
    }

    /// The instance at the bottom of the node subtree rooted at `index`,
    /// provided that subtree is the one for `transform`.
    fn leaf_instance(&self, index: usize, transform: TransformId) -> Option<InstanceId> {
        let Some(TreeNode::Transform { transform: t, child }) = self.arena.get(index) else {
            return None;
        };
        if *t != transform {
            return None;
        }
        let Some(TreeNode::Group { children, .. }) = self.arena.get(*child) else {
            return None;
        };
        children.iter().find_map(|&c| match self.arena.get(c) {
            Some(TreeNode::Leaf { instance }) => Some(*instance),
            _ => None,
        })
    }

    pub fn attached_count(&self) -> usize {
        self.attached.len()
    }

    /// Whether any acceleration structure in the hierarchy needs a rebuild.
    pub fn is_dirty(&self) -> bool {
        self.arena.groups().any(AccelerationState::is_dirty)
    }

    /// Monotonic counter that moves whenever the hierarchy changes shape or
    /// any transform in it changes.
    pub fn revision(&self) -> u64 {
        self.top.generation() + self.global.generation()
    }

    /// Rebuild every dirty acceleration structure, children before parents,
    /// then validate. Returns how many structures were rebuilt.
    pub fn rebuild(&mut self, ctx: &mut RenderContext) -> Result<usize> {
        let mut order = Vec::with_capacity(self.arena.len());
        self.post_order(self.root, &mut order);

        let backend = ctx.backend_mut();
        let mut rebuilt = 0;
        for accel in order {
            if accel.rebuild(backend)? {
                rebuilt += 1;
            }
        }
        if rebuilt > 0 {
            backend.validate()?;
            log::debug!("Rebuilt {} acceleration structures", rebuilt);
        }
        Ok(rebuilt)
    }

    fn post_order(&self, index: usize, out: &mut Vec<AccelerationState>) {
        match self.arena.get(index) {
            Some(TreeNode::Group { accel, children }) => {
                for &child in children {
                    self.post_order(child, out);
                }
                out.push(accel.clone());
            }
            Some(TreeNode::Transform { child, .. }) => self.post_order(*child, out),
            Some(TreeNode::Leaf { .. }) | None => {}
        }
    }

    /// Replace the transform above every attached node. Without `inverse`
    /// the matrix is inverted here.
    pub fn set_global_transform(
        &mut self,
        ctx: &mut RenderContext,
        matrix: Mat4,
        inverse: Option<Mat4>,
    ) -> Result<()> {
        self.global_matrix = matrix;
        self.global_inverse = inverse.unwrap_or_else(|| matrix.inverse());

        let backend = ctx.backend_mut();
        backend.set_transform(
            self.global_transform,
            &to_row_major(&self.global_matrix),
            Some(&to_row_major(&self.global_inverse)),
            false,
        )?;
        self.top.mark(backend)?;
        Ok(())
    }

    pub fn global_matrix(&self) -> Mat4 {
        self.global_matrix
    }

    pub fn global_inverse(&self) -> Mat4 {
        self.global_inverse
    }

    /// Force the global structure to rebuild on the next pass.
    pub fn request_rebuild(&mut self, ctx: &mut RenderContext) -> Result<()> {
        self.global.mark(ctx.backend_mut())?;
        Ok(())
    }

    pub fn top_group(&self) -> GroupId {
        self.top.group()
    }

    pub fn global_group(&self) -> GroupId {
        self.global.group()
    }

    /// Destroy the root objects. Attached nodes must be detached and released
    /// by their owner.
    pub fn release(self, ctx: &mut RenderContext) {
        if !self.attached.is_empty() {
            log::warn!("Releasing scene graph with {} nodes attached", self.attached.len());
        }
        let backend = ctx.backend_mut();
        backend.destroy(ObjectRef::Group(self.top.group()));
        backend.destroy(ObjectRef::Transform(self.global_transform));
        backend.destroy(ObjectRef::Group(self.global.group()));
    }
}
