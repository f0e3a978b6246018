use aperture_shared::portal::PortalColor;
use glam::Mat4;
use tracing::warn;

use crate::renderer::{
    ColorMask, CompareFunction, GraphicsDevice, PortalScene, StencilOp, STENCIL_MASK_ALL,
};

/// Deepest supported nesting. Chain 0 counts up from 0 and chain 1 counts down
/// from 256, so past 127 the two ranges would meet in an 8-bit stencil.
pub const MAX_RECURSION_DEPTH: u32 = 127;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PortalPassStats {
    pub world_draws: u32,
    pub stencil_marks: u32,
    pub marked_levels: u32,
    pub portal_paints: u32,
    pub deepest_level: u32,
}

#[derive(Debug, Clone, Copy)]
struct ViewChain {
    view: Mat4,
    projection: Mat4,
}

/// Draws the world plus nested views through both portals, partitioning the
/// screen with the stencil buffer.
#[derive(Debug, Clone)]
pub struct PortalRenderer {
    max_depth: u32,
}

impl PortalRenderer {
    pub fn new(max_depth: u32) -> Self {
        if max_depth > MAX_RECURSION_DEPTH {
            warn!("Portal recursion depth {max_depth} clamped to {MAX_RECURSION_DEPTH}");
        }
        Self {
            max_depth: max_depth.min(MAX_RECURSION_DEPTH),
        }
    }

    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    pub fn render_frame<G, S>(
        &self,
        gfx: &mut G,
        scene: &S,
        view: Mat4,
        projection: Mat4,
    ) -> PortalPassStats
    where
        G: GraphicsDevice,
        S: PortalScene,
    {
        gfx.depth_mask(true);
        gfx.stencil_write_mask(STENCIL_MASK_ALL);
        gfx.clear_depth();
        gfx.clear_stencil();
        gfx.set_depth_test(true);
        gfx.depth_func(CompareFunction::Less);
        gfx.set_stencil_test(true);

        let camera = ViewChain { view, projection };
        let mut stats = PortalPassStats::default();
        self.render_level(gfx, scene, projection, [camera; 2], 0, &mut stats);

        gfx.set_stencil_test(false);
        gfx.stencil_write_mask(STENCIL_MASK_ALL);
        gfx.stencil_op(StencilOp::Keep, StencilOp::Keep, StencilOp::Keep);
        gfx.color_mask(ColorMask::ALL);
        gfx.depth_mask(true);
        gfx.depth_func(CompareFunction::Less);

        stats
    }

    fn render_level<G, S>(
        &self,
        gfx: &mut G,
        scene: &S,
        base_projection: Mat4,
        chains: [ViewChain; 2],
        depth: u32,
        stats: &mut PortalPassStats,
    ) where
        G: GraphicsDevice,
        S: PortalScene,
    {
        stats.deepest_level = stats.deepest_level.max(depth);
        let levels = stencil_levels(depth);

        gfx.color_mask(ColorMask::ALL);
        gfx.set_depth_test(true);
        gfx.depth_func(CompareFunction::Less);
        gfx.depth_mask(true);
        gfx.stencil_write_mask(0);
        gfx.stencil_op(StencilOp::Keep, StencilOp::Keep, StencilOp::Keep);

        // Both chains still share the camera at the top level.
        let world_passes = if depth == 0 { 1 } else { chains.len() };
        for (chain, &level) in chains.iter().zip(levels.iter()).take(world_passes) {
            gfx.stencil_func(CompareFunction::Equal, level, STENCIL_MASK_ALL);
            scene.render_world(gfx, chain.view, chain.projection);
            stats.world_draws += 1;
        }

        if depth >= self.max_depth {
            gfx.clear_depth();
            return;
        }

        gfx.color_mask(ColorMask::empty());
        gfx.depth_mask(false);
        gfx.stencil_write_mask(STENCIL_MASK_ALL);
        for color in PortalColor::ALL {
            let i = color.index();
            gfx.stencil_func(CompareFunction::Equal, levels[i], STENCIL_MASK_ALL);
            gfx.stencil_op(StencilOp::Keep, StencilOp::Keep, mark_op(color));
            // Tested against the depth this level's world pass just wrote, so
            // it has to share that pass's projection.
            scene.render_portal(gfx, color, chains[i].view, chains[i].projection);
            stats.stencil_marks += 1;
        }
        stats.marked_levels += 1;
        gfx.clear_depth();

        let graph = scene.graph();
        let portals = scene.portals();
        let next = PortalColor::ALL.map(|color| {
            let chain = chains[color.index()];
            let source = portals.get(color);
            let destination = portals.partner_of(color);
            let view = source.view_through(graph, chain.view, destination);
            ViewChain {
                view,
                projection: destination.oblique_projection(graph, base_projection, view),
            }
        });
        self.render_level(gfx, scene, base_projection, next, depth + 1, stats);

        let next_levels = stencil_levels(depth + 1);
        gfx.color_mask(ColorMask::ALL);
        gfx.stencil_write_mask(STENCIL_MASK_ALL);
        if depth == 0 {
            // Outermost surfaces land in the depth buffer regardless of what
            // the nested views left there.
            gfx.set_depth_test(true);
            gfx.depth_func(CompareFunction::Always);
            gfx.depth_mask(true);
        } else {
            gfx.set_depth_test(false);
            gfx.depth_mask(false);
        }
        for color in PortalColor::ALL {
            let i = color.index();
            gfx.stencil_func(CompareFunction::Equal, next_levels[i], STENCIL_MASK_ALL);
            gfx.stencil_op(StencilOp::Keep, StencilOp::Keep, mark_op(color).inverse());
            scene.render_portal(gfx, color, chains[i].view, base_projection);
            stats.portal_paints += 1;
        }
        if depth == 0 {
            gfx.depth_func(CompareFunction::Less);
        }
    }
}

/// Stencil value each chain owns at `depth`: `+depth` for blue, `-depth`
/// (mod 256) for orange.
pub fn stencil_levels(depth: u32) -> [u8; 2] {
    let level = depth.min(MAX_RECURSION_DEPTH + 1) as u8;
    [level, level.wrapping_neg()]
}

fn mark_op(color: PortalColor) -> StencilOp {
    match color {
        PortalColor::Blue => StencilOp::IncrementWrap,
        PortalColor::Orange => StencilOp::DecrementWrap,
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::FRAC_PI_2;

    use aperture_shared::mesh::{MeshData, MeshKind};
    use aperture_shared::portal::{Portal, PortalColor, PortalPair};
    use aperture_shared::scene::SceneGraph;
    use glam::{Mat4, Quat, Vec2, Vec3};

    use super::{stencil_levels, PortalRenderer, MAX_RECURSION_DEPTH};
    use crate::renderer::recording::{GpuCommand, RecordingDevice};
    use crate::renderer::{
        CompareFunction, GraphicsDevice, MeshHandle, PortalScene, SceneUniforms, StencilOp,
    };

    struct TwoPortals {
        graph: SceneGraph,
        portals: PortalPair,
        uniforms: SceneUniforms,
        world_mesh: MeshHandle,
        portal_mesh: MeshHandle,
    }

    impl TwoPortals {
        fn new(gfx: &mut RecordingDevice) -> Self {
            let mut graph = SceneGraph::new();
            let root = graph.root();
            let blue = graph
                .spawn(root, Vec3::new(-10.0, 0.0, 0.0), Quat::from_rotation_y(FRAC_PI_2))
                .unwrap();
            let orange = graph
                .spawn(root, Vec3::new(10.0, 0.0, 0.0), Quat::from_rotation_y(-FRAC_PI_2))
                .unwrap();
            graph.propagate();

            let dimensions = Vec2::new(5.0, 10.0);
            let portals = PortalPair::new(
                Portal::new(blue, dimensions, PortalColor::Blue),
                Portal::new(orange, dimensions, PortalColor::Orange),
            );
            let world_mesh = gfx.upload_mesh(&MeshData::default());
            let portal_mesh = gfx.upload_mesh(
                &MeshKind::Disk {
                    dimensions,
                    segments: 16,
                }
                .build(),
            );
            Self {
                graph,
                portals,
                uniforms: SceneUniforms::resolve(gfx),
                world_mesh,
                portal_mesh,
            }
        }
    }

    impl PortalScene for TwoPortals {
        fn graph(&self) -> &SceneGraph {
            &self.graph
        }

        fn portals(&self) -> &PortalPair {
            &self.portals
        }

        fn render_world<G: GraphicsDevice>(&self, gfx: &mut G, view: Mat4, projection: Mat4) {
            self.uniforms.bind_camera(gfx, view, projection);
            self.uniforms.bind_object(gfx, Mat4::IDENTITY);
            gfx.draw_mesh(self.world_mesh);
        }

        fn render_portal<G: GraphicsDevice>(
            &self,
            gfx: &mut G,
            color: PortalColor,
            view: Mat4,
            projection: Mat4,
        ) {
            let portal = self.portals.get(color);
            self.uniforms.bind_camera(gfx, view, projection);
            self.uniforms.bind_portal(
                gfx,
                self.graph[portal.node].world_transform(),
                color.rgb(),
            );
            gfx.draw_mesh(self.portal_mesh);
        }
    }

    fn camera() -> (Mat4, Mat4) {
        let view = Mat4::look_to_rh(Vec3::ZERO, Vec3::NEG_X, Vec3::Y);
        let projection = Mat4::perspective_rh_gl(FRAC_PI_2, 1.0, 0.1, 200.0);
        (view, projection)
    }

    /// Replays the stencil effect of every draw on a pixel that all
    /// silhouettes cover and that always passes the depth test.
    fn covered_pixel_trace(gfx: &RecordingDevice) -> Vec<u8> {
        let mut value = 0u8;
        let mut trace = Vec::new();
        for command in gfx.commands() {
            match command {
                GpuCommand::ClearStencil => value = 0,
                GpuCommand::Draw(draw) => {
                    let state = draw.state;
                    if !state.stencil_test {
                        continue;
                    }
                    let passes = state.stencil_compare.passes(
                        state.stencil_reference & state.stencil_read_mask,
                        value & state.stencil_read_mask,
                    );
                    let op = if passes { state.stencil_pass } else { state.stencil_fail };
                    let written = op.apply(value, state.stencil_reference);
                    value = (value & !state.stencil_write_mask) | (written & state.stencil_write_mask);
                    trace.push(value);
                }
                _ => {}
            }
        }
        trace
    }

    #[test]
    fn levels_of_the_two_chains_stay_disjoint() {
        assert_eq!(stencil_levels(0), [0, 0]);
        assert_eq!(stencil_levels(1), [1, 255]);
        assert_eq!(stencil_levels(5), [5, 251]);
        let [up, down] = stencil_levels(MAX_RECURSION_DEPTH);
        assert!(up < down);
        assert_eq!(PortalRenderer::new(500).max_depth(), MAX_RECURSION_DEPTH);
    }

    #[test]
    fn depth_k_marks_exactly_k_levels() {
        for max_depth in [0, 1, 3, 5] {
            let mut gfx = RecordingDevice::new();
            let scene = TwoPortals::new(&mut gfx);
            let (view, projection) = camera();

            let stats = PortalRenderer::new(max_depth).render_frame(&mut gfx, &scene, view, projection);
            assert_eq!(stats.marked_levels, max_depth);
            assert_eq!(stats.stencil_marks, 2 * max_depth);
            assert_eq!(stats.portal_paints, 2 * max_depth);
            assert_eq!(stats.world_draws, 1 + 2 * max_depth);
            assert_eq!(stats.deepest_level, max_depth);
        }
    }

    #[test]
    fn stencil_returns_to_zero_after_frame() {
        let mut gfx = RecordingDevice::new();
        let scene = TwoPortals::new(&mut gfx);
        let (view, projection) = camera();
        PortalRenderer::new(4).render_frame(&mut gfx, &scene, view, projection);

        let trace = covered_pixel_trace(&gfx);
        assert_eq!(trace.iter().copied().max(), Some(4));
        assert_eq!(trace.last(), Some(&0));
        assert!(!gfx.state().stencil_test);
        assert_eq!(gfx.state().depth_compare, CompareFunction::Less);
    }

    #[test]
    fn marks_use_wrapping_ops_per_chain() {
        let mut gfx = RecordingDevice::new();
        let scene = TwoPortals::new(&mut gfx);
        let (view, projection) = camera();
        PortalRenderer::new(2).render_frame(&mut gfx, &scene, view, projection);

        let marks: Vec<_> = gfx
            .draws()
            .filter(|draw| draw.state.color_mask.is_empty())
            .map(|draw| (draw.state.stencil_reference, draw.state.stencil_pass))
            .collect();
        assert_eq!(
            marks,
            vec![
                (0, StencilOp::IncrementWrap),
                (0, StencilOp::DecrementWrap),
                (1, StencilOp::IncrementWrap),
                (255, StencilOp::DecrementWrap),
            ]
        );
        assert!(gfx
            .draws()
            .filter(|draw| draw.state.color_mask.is_empty())
            .all(|draw| !draw.state.writes_depth()));
    }

    #[test]
    fn always_depth_is_only_used_for_outermost_paint() {
        let mut gfx = RecordingDevice::new();
        let scene = TwoPortals::new(&mut gfx);
        let (view, projection) = camera();
        PortalRenderer::new(3).render_frame(&mut gfx, &scene, view, projection);

        let always: Vec<_> = gfx
            .draws()
            .filter(|draw| draw.state.depth_test && draw.state.depth_compare == CompareFunction::Always)
            .map(|draw| (draw.state.stencil_reference, draw.state.stencil_pass))
            .collect();
        assert_eq!(
            always,
            vec![(1, StencilOp::DecrementWrap), (255, StencilOp::IncrementWrap)]
        );
    }

    #[test]
    fn nested_views_use_oblique_projections() {
        let mut gfx = RecordingDevice::new();
        let scene = TwoPortals::new(&mut gfx);
        let (view, projection) = camera();
        PortalRenderer::new(1).render_frame(&mut gfx, &scene, view, projection);

        let world_draws: Vec<_> = gfx
            .draws()
            .filter(|draw| draw.mesh == scene.world_mesh)
            .collect();
        assert_eq!(world_draws.len(), 3);
        assert_eq!(world_draws[0].projection, projection);

        // Blue's chain looks out of orange, which faces -X from x = 10.
        let blue_view = world_draws[1].view;
        let eye = blue_view.inverse().transform_point3(Vec3::ZERO);
        assert!((eye - Vec3::new(20.0, 0.0, 0.0)).length() < 1e-3);
        assert_ne!(world_draws[1].projection, projection);

        // Marks match the depth of their level, paints use the outer projection.
        let silhouettes: Vec<_> = gfx
            .draws()
            .filter(|draw| draw.mesh == scene.portal_mesh)
            .collect();
        assert_eq!(silhouettes.len(), 4);
        for draw in &silhouettes {
            // Oblique clipping only rewrites the depth row, so coverage agrees.
            for row in [0, 1, 3] {
                assert_eq!(draw.projection.row(row), projection.row(row));
            }
        }
        assert!(silhouettes
            .iter()
            .filter(|draw| !draw.state.color_mask.is_empty())
            .all(|draw| draw.projection == projection));
    }
}
