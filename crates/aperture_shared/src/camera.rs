use std::f32::consts::{FRAC_PI_2, PI, TAU};

use glam::{Mat4, Quat, Vec3};

use crate::scene::{NodeId, SceneGraph};

pub const PITCH_MARGIN: f32 = 0.1;
pub const MAX_PITCH: f32 = FRAC_PI_2 - PITCH_MARGIN;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Falls back to 1 when either side is zero, e.g. a minimised window.
    pub fn aspect_ratio(&self) -> f32 {
        if self.width == 0 || self.height == 0 {
            return 1.0;
        }
        self.width as f32 / self.height as f32
    }
}

/// First-person camera bound to a scene graph node. Orientation is owned by
/// the camera: it is rebuilt from yaw and pitch on every [`Camera::direct`].
#[derive(Debug, Clone)]
pub struct Camera {
    pub node: NodeId,
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    yaw: f32,
    pitch: f32,
}

impl Camera {
    pub fn new(node: NodeId, fov: f32, near: f32, far: f32) -> Self {
        let near = near.max(0.0001);
        Self {
            node,
            fov,
            near,
            far: far.max(near + 0.0001),
            yaw: 0.0,
            pitch: 0.0,
        }
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn orientation(&self) -> Quat {
        Quat::from_rotation_y(self.yaw) * Quat::from_rotation_x(self.pitch)
    }

    pub fn direct(&mut self, graph: &mut SceneGraph, delta_yaw: f32, delta_pitch: f32) {
        self.yaw = wrap_angle(self.yaw + delta_yaw);
        self.pitch = (self.pitch + delta_pitch).clamp(-MAX_PITCH, MAX_PITCH);
        if let Some(node) = graph.get_mut(self.node) {
            node.orientation = self.orientation();
        }
    }

    pub fn projection_matrix(&self, viewport: Viewport) -> Mat4 {
        Mat4::perspective_rh_gl(self.fov, viewport.aspect_ratio(), self.near, self.far)
    }

    pub fn view_matrix(&self, graph: &SceneGraph) -> Mat4 {
        graph
            .get(self.node)
            .map_or(Mat4::IDENTITY, |node| node.world_transform().inverse())
    }

    pub fn looking_vector_3d(&self) -> Vec3 {
        self.orientation() * Vec3::NEG_Z
    }

    pub fn up_vector(&self) -> Vec3 {
        self.orientation() * Vec3::Y
    }

    /// Forward direction flattened onto the horizon. Undefined (NaN) when the
    /// camera looks straight up or down, which the pitch clamp rules out.
    pub fn looking_vector_2d(&self) -> Vec3 {
        let mut look = self.looking_vector_3d();
        look.y = 0.0;
        look.normalize()
    }

    /// Maps `[right, up, forward]` input onto a horizon-locked world displacement.
    pub fn camera_translation(&self, input: Vec3) -> Vec3 {
        let forward = self.looking_vector_2d();
        let right = forward.cross(Vec3::Y);
        input.x * right + input.y * Vec3::Y + input.z * forward
    }

    pub fn translate_camera(&self, graph: &mut SceneGraph, input: Vec3) {
        let displacement = self.camera_translation(input);
        graph.translate_world(self.node, displacement);
    }
}

fn wrap_angle(angle: f32) -> f32 {
    (angle + PI).rem_euclid(TAU) - PI
}
