use glam::Vec3;

const RAY_EPSILON: f32 = 1.0e-6;

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct AABB {
    pub min: Vec3,
    pub max: Vec3,
}

impl AABB {
    pub fn from_center(center: Vec3, size: Vec3) -> Self {
        let half = size.abs() * 0.5;
        Self {
            min: center - half,
            max: center + half,
        }
    }

    /// Slab test. From outside the box the hit is the entry face with its
    /// outward normal; from inside it is the exit face with the normal turned
    /// back towards the ray origin, i.e. the wall as seen from inside a room.
    pub fn ray_intersection(&self, ray: &Ray, max_distance: f32) -> Option<RayHit> {
        let mut t_enter = f32::NEG_INFINITY;
        let mut t_exit = f32::INFINITY;
        let mut enter_face = Face::NegY;
        let mut exit_face = Face::PosY;

        for axis in 0..3 {
            let origin = ray.origin[axis];
            let direction = ray.direction[axis];
            let (min, max) = (self.min[axis], self.max[axis]);

            if direction.abs() < RAY_EPSILON {
                if origin < min || origin > max {
                    return None;
                }
                continue;
            }

            let t_min = (min - origin) / direction;
            let t_max = (max - origin) / direction;
            let (near, far, near_face, far_face) = if t_min <= t_max {
                (t_min, t_max, Face::negative(axis), Face::positive(axis))
            } else {
                (t_max, t_min, Face::positive(axis), Face::negative(axis))
            };

            if near > t_enter {
                t_enter = near;
                enter_face = near_face;
            }
            if far < t_exit {
                t_exit = far;
                exit_face = far_face;
            }
            if t_enter > t_exit {
                return None;
            }
        }

        let (distance, normal) = if t_enter >= 0.0 {
            (t_enter, enter_face.normal())
        } else if t_exit >= 0.0 {
            (t_exit, -exit_face.normal())
        } else {
            return None;
        };

        if distance > max_distance {
            return None;
        }

        Some(RayHit {
            distance,
            point: ray.at(distance),
            normal,
        })
    }
}

#[derive(Debug, Copy, Clone)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize_or_zero(),
        }
    }

    pub fn at(&self, distance: f32) -> Vec3 {
        self.origin + self.direction * distance
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct RayHit {
    pub distance: f32,
    pub point: Vec3,
    pub normal: Vec3,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Plane {
    pub normal: Vec3,
    pub point: Vec3,
}

impl Plane {
    pub fn new(point: Vec3, normal: Vec3) -> Self {
        Self {
            normal: normal.normalize_or_zero(),
            point,
        }
    }

    pub fn signed_distance(&self, point: Vec3) -> f32 {
        self.normal.dot(point - self.point)
    }

    /// Only front-facing hits count: the ray has to travel against the normal.
    pub fn ray_intersection(&self, ray: &Ray, max_distance: f32) -> Option<RayHit> {
        let denom = self.normal.dot(ray.direction);
        if denom > -RAY_EPSILON {
            return None;
        }
        let distance = self.normal.dot(self.point - ray.origin) / denom;
        if !(0.0..=max_distance).contains(&distance) {
            return None;
        }
        Some(RayHit {
            distance,
            point: ray.at(distance),
            normal: self.normal,
        })
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Face {
    PosX,
    NegX,
    PosY,
    NegY,
    PosZ,
    NegZ,
}

impl Face {
    pub fn normal(&self) -> Vec3 {
        match self {
            Face::PosX => Vec3::X,
            Face::NegX => Vec3::NEG_X,
            Face::PosY => Vec3::Y,
            Face::NegY => Vec3::NEG_Y,
            Face::PosZ => Vec3::Z,
            Face::NegZ => Vec3::NEG_Z,
        }
    }

    fn positive(axis: usize) -> Self {
        match axis {
            0 => Face::PosX,
            1 => Face::PosY,
            _ => Face::PosZ,
        }
    }

    fn negative(axis: usize) -> Self {
        match axis {
            0 => Face::NegX,
            1 => Face::NegY,
            _ => Face::NegZ,
        }
    }
}
