use aperture_shared::light::MAX_LIGHTS;
use aperture_shared::mesh::MeshData;
use glam::{Mat4, Vec3};
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::renderer::pipeline::{PipelineCache, RasterState};
use crate::renderer::uniforms::{CameraUniform, PortalParamsUniform};
use crate::renderer::{
    ColorMask, CompareFunction, GraphicsDevice, MeshHandle, Rasterizer, ShaderProgram, StencilOp,
    UniformLocation, UniformValue,
};

/// Uniforms the world shader declares, with their array lengths.
const DECLARED_UNIFORMS: [(&str, usize); 7] = [
    ("view", 1),
    ("proj", 1),
    ("model", 1),
    ("u_is_portal", 1),
    ("u_portal_color", 1),
    ("u_light_positions", MAX_LIGHTS),
    ("u_light_colors", MAX_LIGHTS),
];
const DECLARED_ATTRIBUTES: [&str; 3] = ["position", "normal", "uv"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshInfo {
    pub vertices: usize,
    pub triangles: usize,
}

/// Everything a draw would have sent to the GPU.
#[derive(Debug, Clone, Copy)]
pub struct DrawCall {
    pub mesh: MeshHandle,
    pub state: RasterState,
    pub view: Mat4,
    pub projection: Mat4,
    pub model: Mat4,
    pub is_portal: bool,
    pub camera: CameraUniform,
    pub params: PortalParamsUniform,
}

#[derive(Debug, Clone, Copy)]
pub enum GpuCommand {
    SetStencilTest(bool),
    StencilFunc {
        compare: CompareFunction,
        reference: u8,
        mask: u8,
    },
    StencilOp {
        fail: StencilOp,
        depth_fail: StencilOp,
        pass: StencilOp,
    },
    StencilWriteMask(u8),
    ColorMask(ColorMask),
    DepthMask(bool),
    SetDepthTest(bool),
    DepthFunc(CompareFunction),
    ClearDepth,
    ClearStencil,
    SetUniform {
        location: UniformLocation,
        value: UniformValue,
    },
    Draw(DrawCall),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameSummary {
    pub commands: usize,
    pub draws: usize,
    pub pipelines: usize,
    pub uniform_bytes: u64,
}

/// Graphics device that keeps a log of every call instead of talking to a GPU.
/// Raster state is tracked the way a GL context would and resolved into
/// wgpu pipeline state on each draw.
#[derive(Debug)]
pub struct RecordingDevice {
    commands: Vec<GpuCommand>,
    state: RasterState,
    locations: FxHashMap<&'static str, UniformLocation>,
    values: FxHashMap<UniformLocation, UniformValue>,
    meshes: Vec<MeshInfo>,
    pipelines: PipelineCache,
    uniform_bytes: u64,
}

impl RecordingDevice {
    pub fn new() -> Self {
        let mut locations = FxHashMap::default();
        let mut next = 0u32;
        for (name, len) in DECLARED_UNIFORMS {
            locations.insert(name, UniformLocation(next));
            next += len as u32;
        }

        Self {
            commands: Vec::new(),
            state: RasterState::default(),
            locations,
            values: FxHashMap::default(),
            meshes: Vec::new(),
            pipelines: PipelineCache::default(),
            uniform_bytes: 0,
        }
    }

    pub fn commands(&self) -> &[GpuCommand] {
        &self.commands
    }

    pub fn draws(&self) -> impl Iterator<Item = &DrawCall> {
        self.commands.iter().filter_map(|command| match command {
            GpuCommand::Draw(draw) => Some(draw),
            _ => None,
        })
    }

    pub fn state(&self) -> &RasterState {
        &self.state
    }

    pub fn uniform_value(&self, location: UniformLocation) -> Option<UniformValue> {
        self.values.get(&location).copied()
    }

    pub fn mesh(&self, handle: MeshHandle) -> Option<MeshInfo> {
        self.meshes.get(handle.0 as usize).copied()
    }

    pub fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }

    /// Ends the frame: reports what was recorded and clears the log. Uniform
    /// values and uploaded meshes persist, as they would on a real device.
    pub fn present(&mut self) -> FrameSummary {
        let summary = FrameSummary {
            commands: self.commands.len(),
            draws: self.draws().count(),
            pipelines: self.pipelines.len(),
            uniform_bytes: self.uniform_bytes,
        };
        self.commands.clear();
        self.uniform_bytes = 0;
        summary
    }

    fn mat4(&self, name: &str) -> Mat4 {
        match self.named_value(name) {
            Some(UniformValue::Mat4(matrix)) => matrix,
            _ => Mat4::IDENTITY,
        }
    }

    fn named_value(&self, name: &str) -> Option<UniformValue> {
        let location = self.locations.get(name)?;
        self.values.get(location).copied()
    }
}

impl Default for RecordingDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl Rasterizer for RecordingDevice {
    fn set_stencil_test(&mut self, enabled: bool) {
        self.state.stencil_test = enabled;
        self.commands.push(GpuCommand::SetStencilTest(enabled));
    }

    fn stencil_func(&mut self, compare: CompareFunction, reference: u8, mask: u8) {
        self.state.stencil_compare = compare;
        self.state.stencil_reference = reference;
        self.state.stencil_read_mask = mask;
        self.commands.push(GpuCommand::StencilFunc {
            compare,
            reference,
            mask,
        });
    }

    fn stencil_op(&mut self, fail: StencilOp, depth_fail: StencilOp, pass: StencilOp) {
        self.state.stencil_fail = fail;
        self.state.stencil_depth_fail = depth_fail;
        self.state.stencil_pass = pass;
        self.commands.push(GpuCommand::StencilOp {
            fail,
            depth_fail,
            pass,
        });
    }

    fn stencil_write_mask(&mut self, mask: u8) {
        self.state.stencil_write_mask = mask;
        self.commands.push(GpuCommand::StencilWriteMask(mask));
    }

    fn color_mask(&mut self, mask: ColorMask) {
        self.state.color_mask = mask;
        self.commands.push(GpuCommand::ColorMask(mask));
    }

    fn depth_mask(&mut self, enabled: bool) {
        self.state.depth_write = enabled;
        self.commands.push(GpuCommand::DepthMask(enabled));
    }

    fn set_depth_test(&mut self, enabled: bool) {
        self.state.depth_test = enabled;
        self.commands.push(GpuCommand::SetDepthTest(enabled));
    }

    fn depth_func(&mut self, compare: CompareFunction) {
        self.state.depth_compare = compare;
        self.commands.push(GpuCommand::DepthFunc(compare));
    }

    fn clear_depth(&mut self) {
        self.commands.push(GpuCommand::ClearDepth);
    }

    fn clear_stencil(&mut self) {
        self.commands.push(GpuCommand::ClearStencil);
    }
}

impl ShaderProgram for RecordingDevice {
    /// Accepts plain names and `name[index]` for array elements.
    fn uniform_location(&mut self, name: &str) -> Option<UniformLocation> {
        let (base, index) = match name.split_once('[') {
            Some((base, rest)) => {
                let index = rest.strip_suffix(']')?.parse::<usize>().ok()?;
                (base, index)
            }
            None => (name, 0),
        };
        let (_, len) = DECLARED_UNIFORMS
            .iter()
            .find(|(declared, _)| *declared == base)?;
        if index >= *len {
            return None;
        }
        self.locations
            .get(base)
            .map(|location| location.offset(index))
    }

    fn attribute_location(&mut self, name: &str) -> Option<u32> {
        DECLARED_ATTRIBUTES
            .iter()
            .position(|attribute| *attribute == name)
            .map(|index| index as u32)
    }

    fn set_uniform(&mut self, location: UniformLocation, value: UniformValue) {
        self.values.insert(location, value);
        self.commands.push(GpuCommand::SetUniform { location, value });
    }
}

impl GraphicsDevice for RecordingDevice {
    fn upload_mesh(&mut self, mesh: &MeshData) -> MeshHandle {
        let handle = MeshHandle(self.meshes.len() as u32);
        self.meshes.push(MeshInfo {
            vertices: mesh.vertex_count(),
            triangles: mesh.triangle_count(),
        });
        debug!(
            "Uploaded mesh {} ({} vertices, {} triangles)",
            handle.0,
            mesh.vertex_count(),
            mesh.triangle_count()
        );
        handle
    }

    fn draw_mesh(&mut self, mesh: MeshHandle) {
        let view = self.mat4("view");
        let projection = self.mat4("proj");
        let model = self.mat4("model");
        let is_portal = matches!(self.named_value("u_is_portal"), Some(UniformValue::I32(v)) if v != 0);
        let color = match self.named_value("u_portal_color") {
            Some(UniformValue::Vec3(color)) => color,
            _ => Vec3::ONE,
        };

        let camera = CameraUniform::new(view, projection);
        let params = PortalParamsUniform::new(model, color, is_portal);
        self.uniform_bytes += (bytemuck::bytes_of(&camera).len() + bytemuck::bytes_of(&params).len()) as u64;
        self.pipelines.get_or_insert(&self.state);

        self.commands.push(GpuCommand::Draw(DrawCall {
            mesh,
            state: self.state,
            view,
            projection,
            model,
            is_portal,
            camera,
            params,
        }));
    }
}

#[cfg(test)]
mod tests {
    use aperture_shared::mesh::MeshKind;
    use glam::{Mat4, Vec3};

    use super::{GpuCommand, RecordingDevice};
    use crate::renderer::{
        CompareFunction, GraphicsDevice, Rasterizer, SceneUniforms, ShaderProgram, UniformValue,
    };

    #[test]
    fn locations_follow_declared_arrays() {
        let mut gfx = RecordingDevice::new();
        let base = gfx.uniform_location("u_light_positions").unwrap();
        assert_eq!(gfx.uniform_location("u_light_positions[3]"), Some(base.offset(3)));
        assert_eq!(gfx.uniform_location("u_light_positions[8]"), None);
        assert_eq!(gfx.uniform_location("model[1]"), None);
        assert_eq!(gfx.uniform_location("u_missing"), None);
        assert_eq!(gfx.attribute_location("normal"), Some(1));
        assert_eq!(gfx.attribute_location("tangent"), None);
    }

    #[test]
    fn draw_snapshots_bound_state() {
        let mut gfx = RecordingDevice::new();
        let uniforms = SceneUniforms::resolve(&mut gfx);
        let mesh = gfx.upload_mesh(
            &MeshKind::Cube {
                dimensions: Vec3::ONE,
                inside: false,
            }
            .build(),
        );
        assert_eq!(gfx.mesh(mesh).map(|info| info.triangles), Some(12));

        let model = Mat4::from_translation(Vec3::new(0.0, 0.0, -2.0));
        uniforms.bind_camera(&mut gfx, Mat4::IDENTITY, Mat4::IDENTITY);
        uniforms.bind_portal(&mut gfx, model, Vec3::new(1.0, 0.5, 0.0));
        gfx.set_stencil_test(true);
        gfx.stencil_func(CompareFunction::Equal, 7, 0xFF);
        gfx.draw_mesh(mesh);

        let draw = gfx.draws().next().copied().unwrap();
        assert_eq!(draw.model, model);
        assert!(draw.is_portal);
        assert_eq!(draw.params.color, [1.0, 0.5, 0.0, 1.0]);
        assert_eq!(draw.state.stencil_reference, 7);
        assert_eq!(gfx.pipeline_count(), 1);

        let summary = gfx.present();
        assert_eq!(summary.draws, 1);
        assert_eq!(summary.uniform_bytes, 128 + 96);
        assert!(gfx.commands().is_empty());
        // Bound values survive the frame boundary.
        assert!(matches!(
            gfx.uniform_value(uniforms.model.unwrap()),
            Some(UniformValue::Mat4(_))
        ));
    }

    #[test]
    fn light_uniforms_are_indexed_from_the_array_base() {
        let mut gfx = RecordingDevice::new();
        let uniforms = SceneUniforms::resolve(&mut gfx);
        uniforms.bind_light(&mut gfx, 2, Vec3::new(1.0, 2.0, 3.0), Vec3::ONE);

        let slot = gfx.uniform_location("u_light_positions[2]").unwrap();
        assert_eq!(
            gfx.uniform_value(slot),
            Some(UniformValue::Vec3(Vec3::new(1.0, 2.0, 3.0)))
        );
        assert!(gfx
            .commands()
            .iter()
            .all(|command| matches!(command, GpuCommand::SetUniform { .. })));
    }
}
