//! Retained scene graph that effect representations are attached to.
//!
//! Nodes live in an arena owned by the graph. Effects keep the [`NodeId`] of
//! their representation and reach it through the graph, so the renderer and
//! the effect never hold competing owning references.

use std::collections::HashMap;

use glam::Vec3;

use crate::geometry::Geometry;
use crate::gpu::backend::{GeometryHandle, MaterialHandle};
use crate::material::Material;

/// Unique identifier for scene nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

/// Transform component for scene nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Vec3, // Euler angles in radians
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    pub fn with_uniform_scale(mut self, scale: f32) -> Self {
        self.scale = Vec3::splat(scale);
        self
    }
}

/// Geometry + material pair the renderer draws, together with the GPU
/// handles the pair was uploaded under.
#[derive(Debug, Clone)]
pub struct Representation {
    pub geometry: Geometry,
    pub material: Material,
    pub geometry_handle: GeometryHandle,
    pub material_handle: MaterialHandle,
}

/// What a node draws, if anything.
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// Pure grouping node.
    Group,
    /// Point sprites, one per vertex.
    Points(Representation),
    /// Indexed triangle mesh.
    Mesh(Representation),
}

/// A single node of the graph.
#[derive(Debug, Clone)]
pub struct SceneNode {
    pub name: String,
    pub kind: NodeKind,
    pub transform: Transform,
    pub visible: bool,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl SceneNode {
    fn new(name: String, kind: NodeKind) -> Self {
        Self {
            name,
            kind,
            transform: Transform::default(),
            visible: true,
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn representation(&self) -> Option<&Representation> {
        match &self.kind {
            NodeKind::Group => None,
            NodeKind::Points(rep) | NodeKind::Mesh(rep) => Some(rep),
        }
    }

    pub fn representation_mut(&mut self) -> Option<&mut Representation> {
        match &mut self.kind {
            NodeKind::Group => None,
            NodeKind::Points(rep) | NodeKind::Mesh(rep) => Some(rep),
        }
    }

    /// Get the material, if this node draws something.
    pub fn material(&self) -> Option<&Material> {
        self.representation().map(|rep| &rep.material)
    }

    pub fn material_mut(&mut self) -> Option<&mut Material> {
        self.representation_mut().map(|rep| &mut rep.material)
    }
}

/// The scene graph. Created with a single root group.
#[derive(Debug)]
pub struct SceneGraph {
    nodes: HashMap<NodeId, SceneNode>,
    root: NodeId,
    next_id: u64,
}

impl SceneGraph {
    pub fn new() -> Self {
        let root = NodeId(1);
        let mut nodes = HashMap::new();
        nodes.insert(root, SceneNode::new("root".to_string(), NodeKind::Group));
        Self {
            nodes,
            root,
            next_id: 2,
        }
    }

    fn new_id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Create a detached node and return its ID.
    /// The node is NOT attached to anything automatically.
    pub fn create_node(&mut self, name: impl Into<String>, kind: NodeKind) -> NodeId {
        let id = self.new_id();
        self.nodes.insert(id, SceneNode::new(name.into(), kind));
        id
    }

    pub fn create_group(&mut self, name: impl Into<String>) -> NodeId {
        self.create_node(name, NodeKind::Group)
    }

    /// Attach `child` under `parent`, moving it if it already has a parent.
    /// Returns false if either node is missing or the move would form a cycle.
    pub fn attach(&mut self, parent: NodeId, child: NodeId) -> bool {
        if parent == child || !self.exists(parent) || !self.exists(child) {
            return false;
        }
        if self.is_ancestor(child, parent) {
            return false;
        }
        self.detach(child);

        if let Some(node) = self.nodes.get_mut(&child) {
            node.parent = Some(parent);
        }
        if let Some(node) = self.nodes.get_mut(&parent) {
            node.children.push(child);
        }
        true
    }

    /// Remove `child` from its parent. The node still exists and can be re-attached.
    /// Returns false if the node had no parent.
    pub fn detach(&mut self, child: NodeId) -> bool {
        let Some(parent) = self.nodes.get_mut(&child).and_then(|n| n.parent.take()) else {
            return false;
        };
        if let Some(node) = self.nodes.get_mut(&parent) {
            node.children.retain(|&c| c != child);
        }
        true
    }

    /// Destroy a node, returning it so the caller can release whatever it owned.
    /// Children are detached, not destroyed. The root cannot be destroyed.
    pub fn destroy(&mut self, id: NodeId) -> Option<SceneNode> {
        if id == self.root {
            return None;
        }
        self.detach(id);
        let node = self.nodes.remove(&id)?;
        for child in &node.children {
            if let Some(c) = self.nodes.get_mut(child) {
                c.parent = None;
            }
        }
        Some(node)
    }

    /// True if `ancestor` is `node` or one of its parents.
    fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut cursor = Some(node);
        while let Some(id) = cursor {
            if id == ancestor {
                return true;
            }
            cursor = self.nodes.get(&id).and_then(|n| n.parent);
        }
        false
    }

    pub fn get(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(&id)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        self.nodes.get_mut(&id)
    }

    pub fn exists(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Check if a node is reachable from the root.
    pub fn is_in_scene(&self, id: NodeId) -> bool {
        self.exists(id) && self.is_ancestor(self.root, id)
    }

    /// Visible along the whole path to the root.
    pub fn is_world_visible(&self, id: NodeId) -> bool {
        let mut cursor = Some(id);
        let mut reached_root = false;
        while let Some(cur) = cursor {
            let Some(node) = self.nodes.get(&cur) else {
                return false;
            };
            if !node.visible {
                return false;
            }
            reached_root = cur == self.root;
            cursor = node.parent;
        }
        reached_root
    }

    /// Every drawable node that is in the scene and visible, sorted by ID so
    /// iteration order is stable between frames.
    pub fn renderables(&self) -> Vec<(NodeId, &Representation)> {
        let mut out: Vec<_> = self
            .nodes
            .iter()
            .filter(|(&id, _)| self.is_world_visible(id))
            .filter_map(|(&id, node)| node.representation().map(|rep| (id, rep)))
            .collect();
        out.sort_by_key(|(id, _)| *id);
        out
    }
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}
