use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3, Vec4};

/// Remaps GL clip depth `[-w, w]` onto the `[0, w]` range wgpu expects.
/// Applied after the oblique shear so the shear math stays in GL terms.
pub const GL_TO_WGPU_DEPTH: Mat4 = Mat4::from_cols_array(&[
    1.0, 0.0, 0.0, 0.0, //
    0.0, 1.0, 0.0, 0.0, //
    0.0, 0.0, 0.5, 0.0, //
    0.0, 0.0, 0.5, 1.0,
]);

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct CameraUniform {
    pub view: [[f32; 4]; 4],
    pub proj: [[f32; 4]; 4],
}

impl CameraUniform {
    pub fn new(view: Mat4, projection: Mat4) -> Self {
        Self {
            view: view.to_cols_array_2d(),
            proj: (GL_TO_WGPU_DEPTH * projection).to_cols_array_2d(),
        }
    }
}

impl Default for CameraUniform {
    fn default() -> Self {
        Self::new(Mat4::IDENTITY, Mat4::IDENTITY)
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct PortalParamsUniform {
    pub model: [[f32; 4]; 4],
    pub color: [f32; 4],
    pub is_portal: u32,
    pub _padding: [u32; 3],
}

impl PortalParamsUniform {
    pub fn new(model: Mat4, color: Vec3, is_portal: bool) -> Self {
        Self {
            model: model.to_cols_array_2d(),
            color: color.extend(1.0).to_array(),
            is_portal: u32::from(is_portal),
            _padding: [0; 3],
        }
    }
}

impl Default for PortalParamsUniform {
    fn default() -> Self {
        Self::new(Mat4::IDENTITY, Vec3::ONE, false)
    }
}

/// Depth the wgpu pipeline would see for a GL clip-space position.
pub fn wgpu_ndc_depth(gl_clip: Vec4) -> f32 {
    let remapped = GL_TO_WGPU_DEPTH * gl_clip;
    remapped.z / remapped.w
}
