use std::f32::consts::TAU;

use glam::{Vec2, Vec3};

pub const MIN_DISK_SEGMENTS: u32 = 3;
pub const DEFAULT_DISK_SEGMENTS: u32 = 64;

// normal, u, v with u x v = normal so the quads wind counter-clockwise from outside.
const CUBE_FACES: [(Vec3, Vec3, Vec3); 6] = [
    (Vec3::X, Vec3::NEG_Z, Vec3::Y),
    (Vec3::NEG_X, Vec3::Z, Vec3::Y),
    (Vec3::Y, Vec3::X, Vec3::NEG_Z),
    (Vec3::NEG_Y, Vec3::X, Vec3::Z),
    (Vec3::Z, Vec3::X, Vec3::Y),
    (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
];
const QUAD_CORNERS: [(f32, f32); 4] = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)];

/// CPU-side geometry in the node's local frame, ready for upload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub uvs: Vec<[f32; 2]>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    fn push_vertex(&mut self, position: Vec3, normal: Vec3, uv: Vec2) -> u32 {
        let index = self.positions.len() as u32;
        self.positions.push(position.to_array());
        self.normals.push(normal.to_array());
        self.uvs.push(uv.to_array());
        index
    }
}

/// The procedural shapes a scene object can be drawn with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MeshKind {
    /// Axis-aligned box centred on the origin. `inside` turns the faces inwards
    /// so the box can be used as a room.
    Cube { dimensions: Vec3, inside: bool },
    /// Quad in the local XY plane facing +Z.
    Plane { dimensions: Vec2 },
    /// Ellipse in the local XY plane facing +Z; `dimensions` are the full axes.
    Disk { dimensions: Vec2, segments: u32 },
}

impl MeshKind {
    pub fn build(&self) -> MeshData {
        match *self {
            MeshKind::Cube { dimensions, inside } => build_cube(dimensions, inside),
            MeshKind::Plane { dimensions } => build_plane(dimensions),
            MeshKind::Disk {
                dimensions,
                segments,
            } => build_disk(dimensions, segments),
        }
    }
}

fn build_cube(dimensions: Vec3, inside: bool) -> MeshData {
    let half = dimensions.abs() * 0.5;
    let mut mesh = MeshData::default();

    for (normal, u, v) in CUBE_FACES {
        let shown_normal = if inside { -normal } else { normal };
        let base = mesh.positions.len() as u32;
        for (su, sv) in QUAD_CORNERS {
            let position = (normal + u * su + v * sv) * half;
            let uv = Vec2::new((su + 1.0) * 0.5, (sv + 1.0) * 0.5);
            mesh.push_vertex(position, shown_normal, uv);
        }
        if inside {
            mesh.indices
                .extend_from_slice(&[base, base + 2, base + 1, base, base + 3, base + 2]);
        } else {
            mesh.indices
                .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }
    }

    mesh
}

fn build_plane(dimensions: Vec2) -> MeshData {
    let half = dimensions.abs() * 0.5;
    let mut mesh = MeshData::default();
    for (su, sv) in QUAD_CORNERS {
        let position = Vec3::new(su * half.x, sv * half.y, 0.0);
        let uv = Vec2::new((su + 1.0) * 0.5, (sv + 1.0) * 0.5);
        mesh.push_vertex(position, Vec3::Z, uv);
    }
    mesh.indices.extend_from_slice(&[0, 1, 2, 0, 2, 3]);
    mesh
}

fn build_disk(dimensions: Vec2, segments: u32) -> MeshData {
    let segments = segments.max(MIN_DISK_SEGMENTS);
    let half = dimensions.abs() * 0.5;
    let mut mesh = MeshData::default();

    let center = mesh.push_vertex(Vec3::ZERO, Vec3::Z, Vec2::splat(0.5));
    for i in 0..segments {
        let angle = TAU * i as f32 / segments as f32;
        let (sin, cos) = angle.sin_cos();
        let position = Vec3::new(half.x * cos, half.y * sin, 0.0);
        let uv = Vec2::new(0.5 + 0.5 * cos, 0.5 + 0.5 * sin);
        mesh.push_vertex(position, Vec3::Z, uv);
    }
    for i in 0..segments {
        let current = center + 1 + i;
        let next = center + 1 + (i + 1) % segments;
        mesh.indices.extend_from_slice(&[center, current, next]);
    }

    mesh
}

#[cfg(test)]
mod tests {
    use glam::{Vec2, Vec3};

    use super::{MeshData, MeshKind, MIN_DISK_SEGMENTS};

    fn triangle_normal(mesh: &MeshData, triangle: usize) -> Vec3 {
        let corner = |k: usize| Vec3::from_array(mesh.positions[mesh.indices[triangle * 3 + k] as usize]);
        let (a, b, c) = (corner(0), corner(1), corner(2));
        (b - a).cross(c - a).normalize()
    }

    #[test]
    fn cube_has_four_vertices_per_face() {
        let mesh = MeshKind::Cube {
            dimensions: Vec3::splat(2.0),
            inside: false,
        }
        .build();
        assert_eq!(mesh.vertex_count(), 24);
        assert_eq!(mesh.triangle_count(), 12);
        assert!(mesh.indices.iter().all(|&i| (i as usize) < mesh.vertex_count()));
        assert!(mesh
            .positions
            .iter()
            .all(|p| p.iter().all(|c| (c.abs() - 1.0).abs() < 1e-6)));
    }

    #[test]
    fn cube_winding_matches_normals() {
        for inside in [false, true] {
            let mesh = MeshKind::Cube {
                dimensions: Vec3::new(30.0, 30.0, 30.0),
                inside,
            }
            .build();
            for triangle in 0..mesh.triangle_count() {
                let vertex = mesh.indices[triangle * 3] as usize;
                let stored = Vec3::from_array(mesh.normals[vertex]);
                let position = Vec3::from_array(mesh.positions[vertex]);
                assert!((triangle_normal(&mesh, triangle) - stored).length() < 1e-5);
                // Outward faces point away from the centre, room faces towards it.
                assert_eq!(stored.dot(position) > 0.0, !inside);
            }
        }
    }

    #[test]
    fn plane_faces_positive_z() {
        let mesh = MeshKind::Plane {
            dimensions: Vec2::new(4.0, 2.0),
        }
        .build();
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.triangle_count(), 2);
        assert!((triangle_normal(&mesh, 0) - Vec3::Z).length() < 1e-6);
        assert_eq!(mesh.positions[2], [2.0, 1.0, 0.0]);
    }

    #[test]
    fn disk_rim_lies_on_the_ellipse() {
        let dimensions = Vec2::new(5.0, 10.0);
        let mesh = MeshKind::Disk {
            dimensions,
            segments: 32,
        }
        .build();
        assert_eq!(mesh.vertex_count(), 33);
        assert_eq!(mesh.triangle_count(), 32);

        for position in &mesh.positions[1..] {
            let u = 2.0 * position[0] / dimensions.x;
            let v = 2.0 * position[1] / dimensions.y;
            assert!((u * u + v * v - 1.0).abs() < 1e-5);
        }
        for triangle in 0..mesh.triangle_count() {
            assert!((triangle_normal(&mesh, triangle) - Vec3::Z).length() < 1e-5);
        }
    }

    #[test]
    fn disk_segment_count_has_a_floor() {
        let mesh = MeshKind::Disk {
            dimensions: Vec2::ONE,
            segments: 0,
        }
        .build();
        assert_eq!(mesh.triangle_count(), MIN_DISK_SEGMENTS as usize);
    }
}
