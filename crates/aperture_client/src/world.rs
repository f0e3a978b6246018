use std::f32::consts::FRAC_PI_2;

use aperture_shared::camera::{Camera, Viewport};
use aperture_shared::light::LightSet;
use aperture_shared::mesh::{MeshKind, DEFAULT_DISK_SEGMENTS};
use aperture_shared::physics::{Plane, Ray, RayHit, AABB};
use aperture_shared::portal::{placement_from_hit, Portal, PortalColor, PortalPair};
use aperture_shared::scene::{NodeId, SceneGraph, SceneGraphError};
use glam::{Mat4, Quat, Vec2, Vec3};
use tracing::{debug, info};

use crate::input::InputState;
use crate::renderer::{GraphicsDevice, MeshHandle, PortalScene, SceneUniforms};
use crate::settings::ClientSettings;

const CHAMBER_SIZE: f32 = 30.0;
const PORTAL_OFFSET_X: f32 = 10.0;
const CUBE_POSITION: Vec3 = Vec3::new(0.0, 0.0, -2.0);
const CUBE_SPIN_PER_FRAME: f32 = 0.01;
/// Height of the floor panel above the chamber floor.
const FLOOR_LIFT: f32 = 0.05;
const MAX_PLACEMENT_DISTANCE: f32 = 100.0;

#[derive(Debug, Clone)]
pub struct SceneObject {
    pub node: NodeId,
    pub kind: MeshKind,
    /// Radians about local Y applied every update.
    pub spin: f32,
    mesh: Option<MeshHandle>,
}

impl SceneObject {
    pub fn new(node: NodeId, kind: MeshKind) -> Self {
        Self {
            node,
            kind,
            spin: 0.0,
            mesh: None,
        }
    }
}

/// Surfaces a placement ray can land on.
#[derive(Debug, Clone, Copy)]
pub enum Collider {
    Box(AABB),
    Plane(Plane),
}

impl Collider {
    pub fn ray_intersection(&self, ray: &Ray, max_distance: f32) -> Option<RayHit> {
        match self {
            Collider::Box(aabb) => aabb.ray_intersection(ray, max_distance),
            Collider::Plane(plane) => plane.ray_intersection(ray, max_distance),
        }
    }
}

/// The demo chamber: a room with a floor panel, a cube, two lights, a portal
/// on each side wall and the player camera in the middle.
#[derive(Debug)]
pub struct World {
    pub graph: SceneGraph,
    pub camera: Camera,
    pub portals: PortalPair,
    pub lights: LightSet,
    objects: Vec<SceneObject>,
    colliders: Vec<Collider>,
    portal_meshes: [Option<MeshHandle>; 2],
    uniforms: SceneUniforms,
}

impl World {
    pub fn demo(settings: &ClientSettings) -> Result<Self, SceneGraphError> {
        let mut graph = SceneGraph::new();
        let root = graph.root();

        let chamber = graph.spawn(root, Vec3::ZERO, Quat::IDENTITY)?;
        let cube = graph.spawn(root, CUBE_POSITION, Quat::IDENTITY)?;
        let floor_height = -CHAMBER_SIZE * 0.5 + FLOOR_LIFT;
        let floor = graph.spawn(
            root,
            Vec3::new(0.0, floor_height, 0.0),
            Quat::from_rotation_x(-FRAC_PI_2),
        )?;
        let blue = graph.spawn(
            root,
            Vec3::new(-PORTAL_OFFSET_X, 0.0, 0.0),
            Quat::from_rotation_y(FRAC_PI_2),
        )?;
        let orange = graph.spawn(
            root,
            Vec3::new(PORTAL_OFFSET_X, 0.0, 0.0),
            Quat::from_rotation_y(-FRAC_PI_2),
        )?;
        let camera_node = graph.spawn(root, Vec3::ZERO, Quat::IDENTITY)?;
        graph.propagate();

        let camera = Camera::new(
            camera_node,
            settings.fov_radians(),
            settings.near_plane,
            settings.far_plane,
        );
        let portals = PortalPair::new(
            Portal::new(blue, settings.portal_dimensions, PortalColor::Blue),
            Portal::new(orange, settings.portal_dimensions, PortalColor::Orange),
        );

        let mut spinning_cube = SceneObject::new(
            cube,
            MeshKind::Cube {
                dimensions: Vec3::ONE,
                inside: false,
            },
        );
        spinning_cube.spin = CUBE_SPIN_PER_FRAME;
        let objects = vec![
            SceneObject::new(
                chamber,
                MeshKind::Cube {
                    dimensions: Vec3::splat(CHAMBER_SIZE),
                    inside: true,
                },
            ),
            SceneObject::new(
                floor,
                MeshKind::Plane {
                    dimensions: Vec2::splat(CHAMBER_SIZE),
                },
            ),
            spinning_cube,
        ];
        let colliders = vec![
            Collider::Box(AABB::from_center(Vec3::ZERO, Vec3::splat(CHAMBER_SIZE))),
            Collider::Plane(Plane::new(Vec3::new(0.0, floor_height, 0.0), Vec3::Y)),
            Collider::Box(AABB::from_center(CUBE_POSITION, Vec3::ONE)),
        ];

        let mut lights = LightSet::default();
        lights.add(Vec3::new(0.0, 12.0, 0.0), Vec3::splat(1.0));
        lights.add(Vec3::new(0.0, 4.0, 12.0), Vec3::new(1.0, 0.9, 0.8));

        info!(
            "Built demo world with {} objects, {} lights and {:?} portals",
            objects.len(),
            lights.len(),
            settings.portal_dimensions
        );

        Ok(Self {
            graph,
            camera,
            portals,
            lights,
            objects,
            colliders,
            portal_meshes: [None; 2],
            uniforms: SceneUniforms::default(),
        })
    }

    pub fn objects(&self) -> &[SceneObject] {
        &self.objects
    }

    /// Uploads every mesh and the light table. Call once per device.
    pub fn upload<G: GraphicsDevice>(&mut self, gfx: &mut G) {
        self.uniforms = SceneUniforms::resolve(gfx);
        for object in &mut self.objects {
            object.mesh = Some(gfx.upload_mesh(&object.kind.build()));
        }
        for color in PortalColor::ALL {
            let disk = MeshKind::Disk {
                dimensions: self.portals.get(color).dimensions,
                segments: DEFAULT_DISK_SEGMENTS,
            };
            self.portal_meshes[color.index()] = Some(gfx.upload_mesh(&disk.build()));
        }
        for light in self.lights.iter() {
            self.uniforms
                .bind_light(gfx, light.id.index(), light.position, light.color);
        }
    }

    /// One frame of simulation: look, animate, move (teleporting if a portal
    /// is crossed) and place portals on click.
    pub fn update(&mut self, input: &mut InputState, settings: &ClientSettings) -> Option<PortalColor> {
        let (delta_yaw, delta_pitch) = input.look_delta(settings.mouse_sensitivity);
        if delta_yaw != 0.0 || delta_pitch != 0.0 {
            self.camera.direct(&mut self.graph, delta_yaw, delta_pitch);
        }

        for object in &self.objects {
            if object.spin != 0.0 {
                if let Some(node) = self.graph.get_mut(object.node) {
                    node.rotate(Vec3::Y, object.spin);
                }
            }
        }

        let displacement = self
            .camera
            .camera_translation(input.movement_input() * settings.move_speed);
        let teleported = self.apply_movement(displacement);

        if input.consume_left_click() {
            self.place_portal(PortalColor::Blue);
        }
        if input.consume_right_click() {
            self.place_portal(PortalColor::Orange);
        }
        input.clear_frame();

        teleported
    }

    /// Moves the camera by `displacement`, going through at most one portal.
    pub fn apply_movement(&mut self, displacement: Vec3) -> Option<PortalColor> {
        self.graph.propagate();
        let teleported = self
            .portals
            .passthrough(&mut self.graph, &mut self.camera, displacement);
        match teleported {
            Some(color) => {
                self.graph.propagate();
                info!(
                    "Camera went through the {:?} portal to {}",
                    color,
                    self.graph[self.camera.node].global_position()
                );
            }
            None => {
                self.graph.translate_world(self.camera.node, displacement);
                self.graph.propagate();
            }
        }
        teleported
    }

    /// Casts a ray along the view direction and moves `color` onto the
    /// nearest surface it hits.
    pub fn place_portal(&mut self, color: PortalColor) -> bool {
        self.graph.propagate();
        let origin = self.graph[self.camera.node].global_position();
        let forward = self.camera.looking_vector_3d();
        let Some(hit) = self.raycast(&Ray::new(origin, forward)) else {
            debug!("No surface in range for the {color:?} portal");
            return false;
        };

        let placement = placement_from_hit(&hit, forward);
        self.portals
            .get(color)
            .place(&mut self.graph, placement.position, placement.normal, placement.up);
        self.graph.propagate();
        info!("Placed {color:?} portal at {}", placement.position);
        true
    }

    pub fn raycast(&self, ray: &Ray) -> Option<RayHit> {
        self.colliders
            .iter()
            .filter_map(|collider| collider.ray_intersection(ray, MAX_PLACEMENT_DISTANCE))
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
    }

    pub fn view_projection(&self, viewport: Viewport) -> (Mat4, Mat4) {
        (
            self.camera.view_matrix(&self.graph),
            self.camera.projection_matrix(viewport),
        )
    }
}

impl PortalScene for World {
    fn graph(&self) -> &SceneGraph {
        &self.graph
    }

    fn portals(&self) -> &PortalPair {
        &self.portals
    }

    fn render_world<G: GraphicsDevice>(&self, gfx: &mut G, view: Mat4, projection: Mat4) {
        self.uniforms.bind_camera(gfx, view, projection);
        for object in &self.objects {
            let Some(mesh) = object.mesh else {
                continue;
            };
            self.uniforms
                .bind_object(gfx, self.graph[object.node].world_transform());
            gfx.draw_mesh(mesh);
        }
    }

    fn render_portal<G: GraphicsDevice>(
        &self,
        gfx: &mut G,
        color: PortalColor,
        view: Mat4,
        projection: Mat4,
    ) {
        let Some(mesh) = self.portal_meshes[color.index()] else {
            return;
        };
        let portal = self.portals.get(color);
        self.uniforms.bind_camera(gfx, view, projection);
        self.uniforms
            .bind_portal(gfx, self.graph[portal.node].world_transform(), color.rgb());
        gfx.draw_mesh(mesh);
    }
}

#[cfg(test)]
mod tests {
    use aperture_shared::portal::PortalColor;
    use glam::Vec3;
    use winit::keyboard::KeyCode;

    use super::World;
    use crate::input::InputState;
    use crate::renderer::recording::RecordingDevice;
    use crate::renderer::{PortalRenderer, ShaderProgram, UniformValue};
    use crate::settings::ClientSettings;

    fn position(world: &World) -> Vec3 {
        world.graph[world.camera.node].global_position()
    }

    #[test]
    fn walking_into_a_portal_teleports_once() {
        let settings = ClientSettings::default();
        let mut world = World::demo(&settings).unwrap();
        // Face the blue portal on the -X wall.
        world.camera.direct(&mut world.graph, std::f32::consts::FRAC_PI_2, 0.0);

        let step = Vec3::new(-3.0, 0.0, 0.0);
        let mut teleports = Vec::new();
        for _ in 0..4 {
            teleports.push(world.apply_movement(step));
        }

        assert_eq!(teleports.iter().flatten().count(), 1);
        assert_eq!(teleports[3], Some(PortalColor::Blue));
        // The last step ends 2 units past the blue plane, so 2 units in front
        // of orange.
        assert!((position(&world) - Vec3::new(8.0, 0.0, 0.0)).length() < 1e-3);
        assert!((world.camera.looking_vector_3d() - Vec3::NEG_X).length() < 1e-4);
    }

    #[test]
    fn update_reads_keyboard_and_mouse() {
        let settings = ClientSettings::default();
        let mut world = World::demo(&settings).unwrap();
        let mut input = InputState::default();
        input.press_key(KeyCode::KeyW);

        let teleported = world.update(&mut input, &settings);
        assert!(teleported.is_none());
        assert!((position(&world) - Vec3::new(0.0, 0.0, -0.2)).length() < 1e-5);

        input.release_key(KeyCode::KeyW);
        input.add_mouse_delta(glam::Vec2::new(-500.0, 0.0));
        world.update(&mut input, &settings);
        assert!((world.camera.yaw() - 1.0).abs() < 1e-5);
        assert_eq!(input.mouse_delta, glam::Vec2::ZERO);
    }

    #[test]
    fn clicking_places_portal_on_the_facing_wall() {
        let settings = ClientSettings::default();
        let mut world = World::demo(&settings).unwrap();
        world.camera.direct(&mut world.graph, std::f32::consts::PI, 0.0);

        let mut input = InputState::default();
        input.right_click = true;
        world.update(&mut input, &settings);

        let orange = world.portals.get(PortalColor::Orange);
        let position = orange.position(&world.graph);
        assert!((position.z - 14.99).abs() < 1e-3);
        assert!((orange.normal(&world.graph) - Vec3::NEG_Z).length() < 1e-4);
        assert!((orange.up(&world.graph) - Vec3::Y).length() < 1e-4);
    }

    #[test]
    fn raycast_prefers_the_nearest_surface() {
        let settings = ClientSettings::default();
        let world = World::demo(&settings).unwrap();
        let hit = world
            .raycast(&aperture_shared::physics::Ray::new(Vec3::ZERO, Vec3::NEG_Z))
            .unwrap();
        assert!((hit.distance - 1.5).abs() < 1e-5);
        assert_eq!(hit.normal, Vec3::Z);
    }

    #[test]
    fn looking_down_places_portal_on_the_floor_panel() {
        let settings = ClientSettings::default();
        let mut world = World::demo(&settings).unwrap();
        world.camera.direct(&mut world.graph, 0.0, -1.4);

        assert!(world.place_portal(PortalColor::Blue));
        let blue = world.portals.get(PortalColor::Blue);
        let floor = -15.0 + super::FLOOR_LIFT + aperture_shared::portal::PORTAL_SURFACE_OFFSET;
        assert!((blue.position(&world.graph).y - floor).abs() < 1e-3);
        assert!((blue.normal(&world.graph) - Vec3::Y).length() < 1e-4);
        // Up follows the flattened view direction.
        assert!((blue.up(&world.graph) - Vec3::NEG_Z).length() < 1e-4);
    }

    #[test]
    fn upload_binds_lights_by_id() {
        let settings = ClientSettings::default();
        let mut world = World::demo(&settings).unwrap();
        let mut gfx = RecordingDevice::new();
        world.upload(&mut gfx);

        let slot = gfx.uniform_location("u_light_positions[1]").unwrap();
        assert_eq!(
            gfx.uniform_value(slot),
            Some(UniformValue::Vec3(Vec3::new(0.0, 4.0, 12.0)))
        );

        let (view, projection) = world.view_projection(settings.viewport());
        let stats = PortalRenderer::new(2).render_frame(&mut gfx, &world, view, projection);
        assert_eq!(stats.world_draws, 5);
        let draws = gfx.present().draws;
        assert_eq!(draws, 5 * world.objects().len() + 4 + 4);
    }
}
