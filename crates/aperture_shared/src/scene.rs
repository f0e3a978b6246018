use std::fmt;
use std::ops::{Index, IndexMut};

use glam::{Mat3, Mat4, Quat, Vec3};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneGraphError {
    UnknownNode(NodeId),
    RootNode,
    AlreadyParented { child: NodeId, parent: NodeId },
    Cycle { parent: NodeId, child: NodeId },
    HasChildren(NodeId),
}

impl fmt::Display for SceneGraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownNode(id) => write!(f, "node {} does not exist", id.0),
            Self::RootNode => write!(f, "the root node cannot be re-parented or removed"),
            Self::AlreadyParented { child, parent } => {
                write!(f, "node {} is already a child of node {}", child.0, parent.0)
            }
            Self::Cycle { parent, child } => write!(
                f,
                "attaching node {} under node {} would create a cycle",
                child.0, parent.0
            ),
            Self::HasChildren(id) => {
                write!(f, "node {} still has children attached", id.0)
            }
        }
    }
}

impl std::error::Error for SceneGraphError {}

#[derive(Debug, Clone)]
pub struct Node {
    pub position: Vec3,
    pub orientation: Quat,
    world_transform: Mat4,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    fn new(position: Vec3, orientation: Quat) -> Self {
        Self {
            position,
            orientation,
            world_transform: Mat4::IDENTITY,
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn local_transform(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.orientation, self.position)
    }

    /// Only valid after [`SceneGraph::propagate`] has run for the current frame.
    pub fn world_transform(&self) -> Mat4 {
        self.world_transform
    }

    pub fn global_position(&self) -> Vec3 {
        self.world_transform.w_axis.truncate()
    }

    pub fn global_orientation_matrix(&self) -> Mat3 {
        Mat3::from_mat4(self.world_transform)
    }

    pub fn global_orientation(&self) -> Quat {
        Quat::from_mat3(&self.global_orientation_matrix()).normalize()
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    pub fn set_orientation(&mut self, orientation: Quat) {
        self.orientation = orientation.normalize();
    }

    pub fn translate(&mut self, translation: Vec3) {
        self.position += translation;
    }

    /// Rotates about `axis` expressed in the node's own frame.
    pub fn rotate(&mut self, axis: Vec3, angle: f32) {
        let Some(axis) = axis.try_normalize() else {
            return;
        };
        self.orientation = (self.orientation * Quat::from_axis_angle(axis, angle)).normalize();
    }

    /// Applies yaw (y), then pitch (x), then roll (z) on top of the current orientation.
    pub fn rotate_euler(&mut self, euler: Vec3) {
        let rotation = Quat::from_rotation_y(euler.y)
            * Quat::from_rotation_x(euler.x)
            * Quat::from_rotation_z(euler.z);
        self.orientation = (self.orientation * rotation).normalize();
    }
}

/// Arena owning every transform node. Children are referenced by index, the
/// root always lives at slot 0.
#[derive(Debug, Clone)]
pub struct SceneGraph {
    nodes: Vec<Option<Node>>,
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneGraph {
    pub fn new() -> Self {
        Self {
            nodes: vec![Some(Node::new(Vec3::ZERO, Quat::IDENTITY))],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index()).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.index()).and_then(Option::as_mut)
    }

    /// Creates a detached node. It takes no part in propagation until it is
    /// attached somewhere below the root.
    pub fn add_node(&mut self, position: Vec3, orientation: Quat) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Some(Node::new(position, orientation)));
        id
    }

    pub fn spawn(
        &mut self,
        parent: NodeId,
        position: Vec3,
        orientation: Quat,
    ) -> Result<NodeId, SceneGraphError> {
        if !self.contains(parent) {
            return Err(SceneGraphError::UnknownNode(parent));
        }
        let id = self.add_node(position, orientation);
        self.add_child(parent, id)?;
        Ok(id)
    }

    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), SceneGraphError> {
        if child == self.root() {
            return Err(SceneGraphError::RootNode);
        }
        if !self.contains(parent) {
            return Err(SceneGraphError::UnknownNode(parent));
        }
        let Some(child_node) = self.get(child) else {
            return Err(SceneGraphError::UnknownNode(child));
        };
        if let Some(existing) = child_node.parent {
            return Err(SceneGraphError::AlreadyParented {
                child,
                parent: existing,
            });
        }

        let mut cursor = Some(parent);
        while let Some(ancestor) = cursor {
            if ancestor == child {
                return Err(SceneGraphError::Cycle { parent, child });
            }
            cursor = self.get(ancestor).and_then(|node| node.parent);
        }

        self[child].parent = Some(parent);
        self[parent].children.push(child);
        Ok(())
    }

    pub fn detach(&mut self, child: NodeId) -> Result<(), SceneGraphError> {
        if child == self.root() {
            return Err(SceneGraphError::RootNode);
        }
        let Some(node) = self.get_mut(child) else {
            return Err(SceneGraphError::UnknownNode(child));
        };
        if let Some(parent) = node.parent.take() {
            if let Some(parent_node) = self.get_mut(parent) {
                parent_node.children.retain(|&id| id != child);
            }
        }
        Ok(())
    }

    /// Removes a leaf node. Children have to be detached or removed first.
    pub fn remove(&mut self, id: NodeId) -> Result<Node, SceneGraphError> {
        if id == self.root() {
            return Err(SceneGraphError::RootNode);
        }
        let Some(node) = self.get(id) else {
            return Err(SceneGraphError::UnknownNode(id));
        };
        if !node.children.is_empty() {
            return Err(SceneGraphError::HasChildren(id));
        }
        self.detach(id)?;
        self.nodes[id.index()]
            .take()
            .ok_or(SceneGraphError::UnknownNode(id))
    }

    /// Recomputes every world transform top-down from the root. Must run once
    /// per frame before anything reads global poses.
    pub fn propagate(&mut self) {
        self.propagate_from(self.root(), Mat4::IDENTITY);
    }

    pub fn propagate_from(&mut self, start: NodeId, parent_world: Mat4) {
        let mut stack = vec![(start, parent_world)];
        while let Some((id, parent_world)) = stack.pop() {
            let Some(node) = self.get_mut(id) else {
                continue;
            };
            let world = parent_world * node.local_transform();
            node.world_transform = world;
            stack.extend(node.children.iter().rev().map(|&child| (child, world)));
        }
    }

    pub fn parent_world_transform(&self, id: NodeId) -> Mat4 {
        self.get(id)
            .and_then(|node| node.parent)
            .and_then(|parent| self.get(parent))
            .map_or(Mat4::IDENTITY, Node::world_transform)
    }

    /// Converts a world-space point into the frame `id`'s local position lives in.
    pub fn world_to_parent_local(&self, id: NodeId, world_point: Vec3) -> Vec3 {
        self.parent_world_transform(id)
            .inverse()
            .transform_point3(world_point)
    }

    pub fn translate_world(&mut self, id: NodeId, displacement: Vec3) {
        let local = self
            .parent_world_transform(id)
            .inverse()
            .transform_vector3(displacement);
        if let Some(node) = self.get_mut(id) {
            node.translate(local);
        }
    }

    pub fn set_world_position(&mut self, id: NodeId, world_point: Vec3) {
        let local = self.world_to_parent_local(id, world_point);
        if let Some(node) = self.get_mut(id) {
            node.position = local;
        }
    }
}

impl Index<NodeId> for SceneGraph {
    type Output = Node;

    fn index(&self, id: NodeId) -> &Self::Output {
        match self.get(id) {
            Some(node) => node,
            None => panic!("scene graph has no node {}", id.0),
        }
    }
}

impl IndexMut<NodeId> for SceneGraph {
    fn index_mut(&mut self, id: NodeId) -> &mut Self::Output {
        match self.get_mut(id) {
            Some(node) => node,
            None => panic!("scene graph has no node {}", id.0),
        }
    }
}
