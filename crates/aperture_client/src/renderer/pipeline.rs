use rustc_hash::FxHashMap;

use crate::renderer::{ColorMask, CompareFunction, StencilOp, STENCIL_MASK_ALL};

pub const DEPTH_STENCIL_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24PlusStencil8;

/// Snapshot of every rasterizer setting that affects a draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RasterState {
    pub stencil_test: bool,
    pub stencil_compare: CompareFunction,
    pub stencil_reference: u8,
    pub stencil_read_mask: u8,
    pub stencil_fail: StencilOp,
    pub stencil_depth_fail: StencilOp,
    pub stencil_pass: StencilOp,
    pub stencil_write_mask: u8,
    pub color_mask: ColorMask,
    pub depth_test: bool,
    pub depth_write: bool,
    pub depth_compare: CompareFunction,
}

impl Default for RasterState {
    fn default() -> Self {
        Self {
            stencil_test: false,
            stencil_compare: CompareFunction::Always,
            stencil_reference: 0,
            stencil_read_mask: STENCIL_MASK_ALL,
            stencil_fail: StencilOp::Keep,
            stencil_depth_fail: StencilOp::Keep,
            stencil_pass: StencilOp::Keep,
            stencil_write_mask: STENCIL_MASK_ALL,
            color_mask: ColorMask::ALL,
            depth_test: false,
            depth_write: true,
            depth_compare: CompareFunction::Less,
        }
    }
}

impl RasterState {
    /// Depth writes only happen while the depth test is on, as in GL.
    pub fn writes_depth(&self) -> bool {
        self.depth_test && self.depth_write
    }

    pub fn depth_stencil_state(&self, format: wgpu::TextureFormat) -> wgpu::DepthStencilState {
        let depth_compare = if self.depth_test {
            self.depth_compare.into()
        } else {
            wgpu::CompareFunction::Always
        };

        let stencil = if self.stencil_test {
            let face = wgpu::StencilFaceState {
                compare: self.stencil_compare.into(),
                fail_op: self.stencil_fail.into(),
                depth_fail_op: self.stencil_depth_fail.into(),
                pass_op: self.stencil_pass.into(),
            };
            wgpu::StencilState {
                front: face,
                back: face,
                read_mask: u32::from(self.stencil_read_mask),
                write_mask: u32::from(self.stencil_write_mask),
            }
        } else {
            wgpu::StencilState::default()
        };

        wgpu::DepthStencilState {
            format,
            depth_write_enabled: self.writes_depth(),
            depth_compare,
            stencil,
            bias: wgpu::DepthBiasState::default(),
        }
    }

    pub fn color_writes(&self) -> wgpu::ColorWrites {
        self.color_mask.into()
    }

    /// Set per draw with `RenderPass::set_stencil_reference`.
    pub fn stencil_reference(&self) -> u32 {
        if self.stencil_test {
            u32::from(self.stencil_reference)
        } else {
            0
        }
    }

    /// The reference is dynamic state, so it does not split pipelines.
    pub fn pipeline_key(&self) -> RasterState {
        RasterState {
            stencil_reference: 0,
            ..*self
        }
    }
}

impl From<CompareFunction> for wgpu::CompareFunction {
    fn from(compare: CompareFunction) -> Self {
        match compare {
            CompareFunction::Never => wgpu::CompareFunction::Never,
            CompareFunction::Less => wgpu::CompareFunction::Less,
            CompareFunction::Equal => wgpu::CompareFunction::Equal,
            CompareFunction::LessEqual => wgpu::CompareFunction::LessEqual,
            CompareFunction::Greater => wgpu::CompareFunction::Greater,
            CompareFunction::NotEqual => wgpu::CompareFunction::NotEqual,
            CompareFunction::GreaterEqual => wgpu::CompareFunction::GreaterEqual,
            CompareFunction::Always => wgpu::CompareFunction::Always,
        }
    }
}

impl From<StencilOp> for wgpu::StencilOperation {
    fn from(op: StencilOp) -> Self {
        match op {
            StencilOp::Keep => wgpu::StencilOperation::Keep,
            StencilOp::Zero => wgpu::StencilOperation::Zero,
            StencilOp::Replace => wgpu::StencilOperation::Replace,
            StencilOp::IncrementClamp => wgpu::StencilOperation::IncrementClamp,
            StencilOp::DecrementClamp => wgpu::StencilOperation::DecrementClamp,
            StencilOp::IncrementWrap => wgpu::StencilOperation::IncrementWrap,
            StencilOp::DecrementWrap => wgpu::StencilOperation::DecrementWrap,
            StencilOp::Invert => wgpu::StencilOperation::Invert,
        }
    }
}

impl From<ColorMask> for wgpu::ColorWrites {
    fn from(mask: ColorMask) -> Self {
        let mut writes = wgpu::ColorWrites::empty();
        if mask.contains(ColorMask::RED) {
            writes |= wgpu::ColorWrites::RED;
        }
        if mask.contains(ColorMask::GREEN) {
            writes |= wgpu::ColorWrites::GREEN;
        }
        if mask.contains(ColorMask::BLUE) {
            writes |= wgpu::ColorWrites::BLUE;
        }
        if mask.contains(ColorMask::ALPHA) {
            writes |= wgpu::ColorWrites::ALPHA;
        }
        writes
    }
}

/// What a render pipeline has to be built with for one raster state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineState {
    pub depth_stencil: wgpu::DepthStencilState,
    pub color_writes: wgpu::ColorWrites,
}

/// One entry per distinct pipeline key; portal passes only ever need a handful.
#[derive(Debug)]
pub struct PipelineCache {
    depth_format: wgpu::TextureFormat,
    states: FxHashMap<RasterState, PipelineState>,
}

impl PipelineCache {
    pub fn new(depth_format: wgpu::TextureFormat) -> Self {
        Self {
            depth_format,
            states: FxHashMap::default(),
        }
    }

    pub fn get_or_insert(&mut self, state: &RasterState) -> &PipelineState {
        let depth_format = self.depth_format;
        self.states
            .entry(state.pipeline_key())
            .or_insert_with(|| PipelineState {
                depth_stencil: state.depth_stencil_state(depth_format),
                color_writes: state.color_writes(),
            })
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

impl Default for PipelineCache {
    fn default() -> Self {
        Self::new(DEPTH_STENCIL_FORMAT)
    }
}
