pub mod pipeline;
pub mod portal_renderer;
pub mod recording;
pub mod uniforms;

use aperture_shared::mesh::MeshData;
use aperture_shared::portal::{PortalColor, PortalPair};
use aperture_shared::scene::SceneGraph;
use bitflags::bitflags;
use glam::{Mat4, Vec3};

pub use crate::renderer::portal_renderer::{PortalPassStats, PortalRenderer};

/// Full 8-bit stencil mask.
pub const STENCIL_MASK_ALL: u8 = 0xFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareFunction {
    Never,
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

impl CompareFunction {
    /// Evaluates `reference OP value`, the order stencil tests use.
    pub fn passes(self, reference: u8, value: u8) -> bool {
        match self {
            Self::Never => false,
            Self::Less => reference < value,
            Self::Equal => reference == value,
            Self::LessEqual => reference <= value,
            Self::Greater => reference > value,
            Self::NotEqual => reference != value,
            Self::GreaterEqual => reference >= value,
            Self::Always => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StencilOp {
    Keep,
    Zero,
    Replace,
    IncrementClamp,
    DecrementClamp,
    IncrementWrap,
    DecrementWrap,
    Invert,
}

impl StencilOp {
    pub fn apply(self, value: u8, reference: u8) -> u8 {
        match self {
            Self::Keep => value,
            Self::Zero => 0,
            Self::Replace => reference,
            Self::IncrementClamp => value.saturating_add(1),
            Self::DecrementClamp => value.saturating_sub(1),
            Self::IncrementWrap => value.wrapping_add(1),
            Self::DecrementWrap => value.wrapping_sub(1),
            Self::Invert => !value,
        }
    }

    pub fn inverse(self) -> Self {
        match self {
            Self::IncrementWrap => Self::DecrementWrap,
            Self::DecrementWrap => Self::IncrementWrap,
            Self::IncrementClamp => Self::DecrementClamp,
            Self::DecrementClamp => Self::IncrementClamp,
            other => other,
        }
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ColorMask: u8 {
        const RED = 1 << 0;
        const GREEN = 1 << 1;
        const BLUE = 1 << 2;
        const ALPHA = 1 << 3;
        const ALL = Self::RED.bits() | Self::GREEN.bits() | Self::BLUE.bits() | Self::ALPHA.bits();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UniformLocation(pub u32);

impl UniformLocation {
    /// Element `index` of a uniform array whose first element lives here.
    pub fn offset(self, index: usize) -> Self {
        Self(self.0 + index as u32)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Mat4(Mat4),
    Vec3(Vec3),
    I32(i32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshHandle(pub u32);

/// Fixed-function state the portal renderer drives. Mirrors the classic
/// OpenGL stencil/depth/color-mask controls.
pub trait Rasterizer {
    fn set_stencil_test(&mut self, enabled: bool);
    fn stencil_func(&mut self, compare: CompareFunction, reference: u8, mask: u8);
    fn stencil_op(&mut self, fail: StencilOp, depth_fail: StencilOp, pass: StencilOp);
    fn stencil_write_mask(&mut self, mask: u8);
    fn color_mask(&mut self, mask: ColorMask);
    fn depth_mask(&mut self, enabled: bool);
    fn set_depth_test(&mut self, enabled: bool);
    fn depth_func(&mut self, compare: CompareFunction);
    fn clear_depth(&mut self);
    fn clear_stencil(&mut self);
}

pub trait ShaderProgram {
    fn uniform_location(&mut self, name: &str) -> Option<UniformLocation>;
    fn attribute_location(&mut self, name: &str) -> Option<u32>;
    fn set_uniform(&mut self, location: UniformLocation, value: UniformValue);
}

pub trait GraphicsDevice: Rasterizer + ShaderProgram {
    fn upload_mesh(&mut self, mesh: &MeshData) -> MeshHandle;
    /// Draws with whatever uniforms and raster state are currently bound.
    fn draw_mesh(&mut self, mesh: MeshHandle);
}

/// Locations of the uniforms every object draw binds. A missing location is
/// skipped, the way GL ignores location -1.
#[derive(Debug, Clone, Copy, Default)]
pub struct SceneUniforms {
    pub view: Option<UniformLocation>,
    pub proj: Option<UniformLocation>,
    pub model: Option<UniformLocation>,
    pub is_portal: Option<UniformLocation>,
    pub portal_color: Option<UniformLocation>,
    pub light_positions: Option<UniformLocation>,
    pub light_colors: Option<UniformLocation>,
}

impl SceneUniforms {
    pub fn resolve<S: ShaderProgram + ?Sized>(shader: &mut S) -> Self {
        Self {
            view: shader.uniform_location("view"),
            proj: shader.uniform_location("proj"),
            model: shader.uniform_location("model"),
            is_portal: shader.uniform_location("u_is_portal"),
            portal_color: shader.uniform_location("u_portal_color"),
            light_positions: shader.uniform_location("u_light_positions"),
            light_colors: shader.uniform_location("u_light_colors"),
        }
    }

    pub fn bind_camera<S: ShaderProgram + ?Sized>(&self, shader: &mut S, view: Mat4, projection: Mat4) {
        set(shader, self.view, UniformValue::Mat4(view));
        set(shader, self.proj, UniformValue::Mat4(projection));
    }

    pub fn bind_object<S: ShaderProgram + ?Sized>(&self, shader: &mut S, model: Mat4) {
        set(shader, self.model, UniformValue::Mat4(model));
        set(shader, self.is_portal, UniformValue::I32(0));
    }

    pub fn bind_portal<S: ShaderProgram + ?Sized>(&self, shader: &mut S, model: Mat4, color: Vec3) {
        set(shader, self.model, UniformValue::Mat4(model));
        set(shader, self.is_portal, UniformValue::I32(1));
        set(shader, self.portal_color, UniformValue::Vec3(color));
    }

    pub fn bind_light<S: ShaderProgram + ?Sized>(
        &self,
        shader: &mut S,
        index: usize,
        position: Vec3,
        color: Vec3,
    ) {
        set(
            shader,
            self.light_positions.map(|base| base.offset(index)),
            UniformValue::Vec3(position),
        );
        set(
            shader,
            self.light_colors.map(|base| base.offset(index)),
            UniformValue::Vec3(color),
        );
    }
}

fn set<S: ShaderProgram + ?Sized>(shader: &mut S, location: Option<UniformLocation>, value: UniformValue) {
    if let Some(location) = location {
        shader.set_uniform(location, value);
    }
}

/// What the portal renderer needs from the world it draws.
pub trait PortalScene {
    fn graph(&self) -> &SceneGraph;
    fn portals(&self) -> &PortalPair;
    /// Draws every non-portal object with the given camera.
    fn render_world<G: GraphicsDevice>(&self, gfx: &mut G, view: Mat4, projection: Mat4);
    /// Draws the silhouette of one portal with the given camera.
    fn render_portal<G: GraphicsDevice>(
        &self,
        gfx: &mut G,
        color: PortalColor,
        view: Mat4,
        projection: Mat4,
    );
}
