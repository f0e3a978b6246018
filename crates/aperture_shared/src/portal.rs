use std::f32::consts::PI;

use glam::{Mat3, Mat4, Quat, Vec2, Vec3, Vec4};
use tracing::debug;

use crate::camera::Camera;
use crate::physics::{Plane, RayHit};
use crate::scene::{NodeId, SceneGraph};

pub const PORTAL_SURFACE_OFFSET: f32 = 0.01;
/// Past this the cross product is too short to give a usable axis.
const DEGENERATE_ALIGNMENT_DOT: f32 = 0.9999;
const OBLIQUE_DENOM_EPSILON: f32 = 1.0e-5;
const UP_PROJECTION_EPSILON: f32 = 1.0e-3;

const PORTAL_BLUE: [f32; 3] = [0.0, 130.0 / 255.0, 1.0];
const PORTAL_ORANGE: [f32; 3] = [1.0, 165.0 / 255.0, 0.0];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortalColor {
    Blue,
    Orange,
}

impl PortalColor {
    /// Fixed processing order used everywhere a pair is walked.
    pub const ALL: [PortalColor; 2] = [PortalColor::Blue, PortalColor::Orange];

    pub fn index(self) -> usize {
        match self {
            Self::Blue => 0,
            Self::Orange => 1,
        }
    }

    pub fn other(self) -> Self {
        match self {
            Self::Blue => Self::Orange,
            Self::Orange => Self::Blue,
        }
    }

    pub fn rgb(self) -> Vec3 {
        match self {
            Self::Blue => Vec3::from_array(PORTAL_BLUE),
            Self::Orange => Vec3::from_array(PORTAL_ORANGE),
        }
    }
}

/// Anything a portal can move: it needs a node to reposition and a way to
/// absorb the change of heading.
pub trait Traveller {
    fn node(&self) -> NodeId;
    fn turn(&mut self, graph: &mut SceneGraph, delta_yaw: f32, delta_pitch: f32, rotation: Quat);
}

impl Traveller for Camera {
    fn node(&self) -> NodeId {
        self.node
    }

    fn turn(&mut self, graph: &mut SceneGraph, delta_yaw: f32, delta_pitch: f32, _rotation: Quat) {
        self.direct(graph, delta_yaw, delta_pitch);
    }
}

impl Traveller for NodeId {
    fn node(&self) -> NodeId {
        *self
    }

    fn turn(&mut self, graph: &mut SceneGraph, _delta_yaw: f32, _delta_pitch: f32, rotation: Quat) {
        if let Some(node) = graph.get_mut(*self) {
            node.orientation = (rotation * node.orientation).normalize();
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PortalCrossing {
    /// Parametric position of the plane crossing along this frame's displacement.
    pub t: f32,
    pub planar: Vec2,
    pub position: Vec3,
    pub rotation: Quat,
    pub delta_yaw: f32,
    pub delta_pitch: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PortalPlacement {
    pub position: Vec3,
    pub normal: Vec3,
    pub up: Vec3,
}

/// An elliptical opening in the local XY plane, front face along local +Z.
/// `dimensions` holds the full width (along local X) and height (along local Y).
#[derive(Debug, Clone)]
pub struct Portal {
    pub node: NodeId,
    pub dimensions: Vec2,
    pub color: PortalColor,
}

impl Portal {
    pub fn new(node: NodeId, dimensions: Vec2, color: PortalColor) -> Self {
        Self {
            node,
            dimensions,
            color,
        }
    }

    pub fn partner(&self) -> PortalColor {
        self.color.other()
    }

    pub fn position(&self, graph: &SceneGraph) -> Vec3 {
        graph[self.node].global_position()
    }

    pub fn normal(&self, graph: &SceneGraph) -> Vec3 {
        (graph[self.node].global_orientation_matrix() * Vec3::Z).normalize_or_zero()
    }

    pub fn up(&self, graph: &SceneGraph) -> Vec3 {
        (graph[self.node].global_orientation_matrix() * Vec3::Y).normalize_or_zero()
    }

    pub fn right(&self, graph: &SceneGraph) -> Vec3 {
        (graph[self.node].global_orientation_matrix() * Vec3::X).normalize_or_zero()
    }

    /// The infinite plane the portal disk lies in, facing out of the front.
    pub fn plane(&self, graph: &SceneGraph) -> Plane {
        Plane::new(self.position(graph), self.normal(graph))
    }

    /// Orients the portal flush against a surface. `position`, `normal` and
    /// `up` are expressed in the frame of the portal node's parent.
    pub fn place(&self, graph: &mut SceneGraph, position: Vec3, normal: Vec3, up: Vec3) {
        let target_normal = normal.try_normalize().unwrap_or(Vec3::Z);
        let target_up = (up - target_normal * up.dot(target_normal))
            .try_normalize()
            .unwrap_or_else(|| target_normal.any_orthonormal_vector());

        // Normal first, then twist around it: one rotation cannot fix both.
        let mut orientation = alignment_rotation(Vec3::Z, target_normal, target_up);
        let current_up = orientation * Vec3::Y;
        orientation = alignment_rotation(current_up, target_up, target_normal) * orientation;

        if let Some(node) = graph.get_mut(self.node) {
            node.position = position;
            node.orientation = orientation.normalize();
        }
        debug!(
            "Placed {:?} portal at {position} facing {target_normal}",
            self.color
        );
    }

    /// View matrix looking out of `destination` with the same relative view
    /// the camera has into this portal.
    pub fn view_through(&self, graph: &SceneGraph, view: Mat4, destination: &Portal) -> Mat4 {
        view * graph[self.node].world_transform()
            * Mat4::from_rotation_y(PI)
            * graph[destination.node].world_transform().inverse()
    }

    /// Shears `projection` so its near plane lies on this portal's plane.
    /// Returns the input untouched when the plane is not in front of the camera.
    pub fn oblique_projection(&self, graph: &SceneGraph, projection: Mat4, view: Mat4) -> Mat4 {
        let normal = self.normal(graph);
        let distance = -normal.dot(self.position(graph));
        let clip_plane = view.inverse().transpose() * normal.extend(distance);
        if clip_plane.w >= 0.0 {
            return projection;
        }
        apply_oblique_clip(projection, clip_plane)
    }

    /// Coordinates of `world_point` along the portal's right and up axes,
    /// relative to its centre.
    pub fn planar_coordinates(&self, graph: &SceneGraph, world_point: Vec3) -> Vec2 {
        let basis = Mat3::from_cols(self.right(graph), self.up(graph), self.normal(graph));
        let local = basis.transpose() * (world_point - self.position(graph));
        local.truncate()
    }

    pub fn contains_planar_point(&self, planar: Vec2) -> bool {
        if self.dimensions.x <= 0.0 || self.dimensions.y <= 0.0 {
            return false;
        }
        let u = 2.0 * planar.x / self.dimensions.x;
        let v = 2.0 * planar.y / self.dimensions.y;
        u * u + v * v <= 1.0
    }

    /// Works out where a node at `position` moving by `displacement` this frame
    /// would come out of `destination`, or `None` if it does not go through.
    pub fn crossing(
        &self,
        graph: &SceneGraph,
        position: Vec3,
        displacement: Vec3,
        destination: &Portal,
    ) -> Option<PortalCrossing> {
        let normal = self.normal(graph);
        let normal_dot_dir = normal.dot(displacement);
        // Entry is only possible through the front face.
        if normal_dot_dir >= 0.0 {
            return None;
        }

        let portal_position = self.position(graph);
        let t = self.plane(graph).signed_distance(position) / -normal_dot_dir;
        if !(t > 0.0 && t < 1.0) {
            return None;
        }

        let planar = self.planar_coordinates(graph, position + displacement * t);
        if !self.contains_planar_point(planar) {
            return None;
        }

        let source_rotation = graph[self.node].global_orientation();
        let destination_rotation = graph[destination.node].global_orientation();

        let local = source_rotation.inverse() * (position + displacement - portal_position);
        let mirrored = Vec3::new(-local.x, local.y, -local.z);
        let exit_position = destination.position(graph) + destination_rotation * mirrored;
        let rotation =
            destination_rotation * Quat::from_rotation_y(PI) * source_rotation.inverse();

        let destination_normal = destination.normal(graph);
        let delta_yaw = if normal.length_squared() == 0.0 || destination_normal.length_squared() == 0.0
        {
            0.0
        } else {
            destination_normal.x.atan2(destination_normal.z) - normal.x.atan2(normal.z) + PI
        };
        let delta_pitch = destination_normal.y.clamp(-1.0, 1.0).asin()
            + normal.y.clamp(-1.0, 1.0).asin();

        Some(PortalCrossing {
            t,
            planar,
            position: exit_position,
            rotation,
            delta_yaw,
            delta_pitch,
        })
    }

    /// Teleports `traveller` to `destination` if this frame's displacement
    /// carries it through the portal. The caller applies the displacement
    /// itself when this returns `false`.
    pub fn passthrough<T: Traveller>(
        &self,
        graph: &mut SceneGraph,
        traveller: &mut T,
        displacement: Vec3,
        destination: &Portal,
    ) -> bool {
        let node = traveller.node();
        let Some(position) = graph.get(node).map(|node| node.global_position()) else {
            return false;
        };
        let Some(crossing) = self.crossing(graph, position, displacement, destination) else {
            return false;
        };

        graph.set_world_position(node, crossing.position);
        traveller.turn(graph, crossing.delta_yaw, crossing.delta_pitch, crossing.rotation);
        debug!(
            "{:?} portal moved node {} to {}",
            self.color,
            node.index(),
            crossing.position
        );
        true
    }
}

/// Derives a flush placement from a ray hit. Walls keep world up; floors and
/// ceilings take their up from the horizontal view direction.
pub fn placement_from_hit(hit: &RayHit, view_forward: Vec3) -> PortalPlacement {
    let normal = hit.normal.try_normalize().unwrap_or(Vec3::Z);
    let projected_up = Vec3::Y - normal * normal.y;
    let up = if projected_up.length() > UP_PROJECTION_EPSILON {
        projected_up.normalize()
    } else {
        let flat = Vec3::new(view_forward.x, 0.0, view_forward.z);
        flat.try_normalize().unwrap_or(Vec3::NEG_Z)
    };

    PortalPlacement {
        position: hit.point + normal * PORTAL_SURFACE_OFFSET,
        normal,
        up,
    }
}

fn alignment_rotation(from: Vec3, to: Vec3, fallback_axis: Vec3) -> Quat {
    let dot = from.dot(to).clamp(-1.0, 1.0);
    if dot > DEGENERATE_ALIGNMENT_DOT {
        return Quat::IDENTITY;
    }
    if dot < -DEGENERATE_ALIGNMENT_DOT {
        return Quat::from_axis_angle(fallback_axis, PI);
    }
    Quat::from_axis_angle(from.cross(to).normalize(), dot.acos())
}

/// Oblique near-plane clipping for an OpenGL-style projection (z in [-1, 1]).
/// `clip_plane` is in camera space.
pub fn apply_oblique_clip(projection: Mat4, clip_plane: Vec4) -> Mat4 {
    let q = Vec4::new(
        (sign(clip_plane.x) + projection.z_axis.x) / projection.x_axis.x,
        (sign(clip_plane.y) + projection.z_axis.y) / projection.y_axis.y,
        -1.0,
        (1.0 + projection.z_axis.z) / projection.w_axis.z,
    );
    let denom = clip_plane.dot(q);
    if denom.abs() < OBLIQUE_DENOM_EPSILON {
        return projection;
    }

    let c = clip_plane * (2.0 / denom);
    let row3 = projection.row(3);
    let mut clipped = projection;
    clipped.x_axis.z = c.x - row3.x;
    clipped.y_axis.z = c.y - row3.y;
    clipped.z_axis.z = c.z - row3.z;
    clipped.w_axis.z = c.w - row3.w;
    clipped
}

fn sign(value: f32) -> f32 {
    if value > 0.0 {
        1.0
    } else if value < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// The linked pair. Index order follows [`PortalColor::ALL`].
#[derive(Debug, Clone)]
pub struct PortalPair {
    portals: [Portal; 2],
}

impl PortalPair {
    pub fn new(blue: Portal, orange: Portal) -> Self {
        let blue = Portal {
            color: PortalColor::Blue,
            ..blue
        };
        let orange = Portal {
            color: PortalColor::Orange,
            ..orange
        };
        Self {
            portals: [blue, orange],
        }
    }

    pub fn get(&self, color: PortalColor) -> &Portal {
        &self.portals[color.index()]
    }

    pub fn get_mut(&mut self, color: PortalColor) -> &mut Portal {
        &mut self.portals[color.index()]
    }

    pub fn partner_of(&self, color: PortalColor) -> &Portal {
        self.get(color.other())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Portal> {
        self.portals.iter()
    }

    /// Tries blue then orange and stops at the first teleport, so a traveller
    /// is never moved twice in one frame.
    pub fn passthrough<T: Traveller>(
        &self,
        graph: &mut SceneGraph,
        traveller: &mut T,
        displacement: Vec3,
    ) -> Option<PortalColor> {
        PortalColor::ALL.into_iter().find(|&color| {
            self.get(color)
                .passthrough(graph, traveller, displacement, self.partner_of(color))
        })
    }
}
