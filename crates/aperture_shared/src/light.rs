use glam::Vec3;
use tracing::{debug, warn};

/// Size of the light arrays the world shader declares.
pub const MAX_LIGHTS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LightId(u32);

impl LightId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Hands out dense light ids for one world. Ids are never reused.
#[derive(Debug, Clone)]
pub struct LightIdAllocator {
    next: u32,
    capacity: u32,
}

impl LightIdAllocator {
    pub fn new(capacity: usize) -> Self {
        Self {
            next: 0,
            capacity: capacity.min(u32::MAX as usize) as u32,
        }
    }

    pub fn allocate(&mut self) -> Option<LightId> {
        if self.next >= self.capacity {
            return None;
        }
        let id = LightId(self.next);
        self.next += 1;
        Some(id)
    }

    pub fn allocated(&self) -> usize {
        self.next as usize
    }
}

impl Default for LightIdAllocator {
    fn default() -> Self {
        Self::new(MAX_LIGHTS)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Light {
    pub id: LightId,
    pub position: Vec3,
    pub color: Vec3,
}

#[derive(Debug, Clone, Default)]
pub struct LightSet {
    allocator: LightIdAllocator,
    lights: Vec<Light>,
}

impl LightSet {
    pub fn add(&mut self, position: Vec3, color: Vec3) -> Option<LightId> {
        let Some(id) = self.allocator.allocate() else {
            warn!("Light limit of {MAX_LIGHTS} reached; ignoring light at {position}");
            return None;
        };
        debug!("Registered light {} at {position}", id.index());
        self.lights.push(Light {
            id,
            position,
            color,
        });
        Some(id)
    }

    pub fn get(&self, id: LightId) -> Option<&Light> {
        self.lights.iter().find(|light| light.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Light> {
        self.lights.iter()
    }

    pub fn len(&self) -> usize {
        self.lights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lights.is_empty()
    }
}
