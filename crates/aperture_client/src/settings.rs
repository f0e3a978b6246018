use std::fs;
use std::io;
use std::path::Path;

use aperture_shared::camera::Viewport;
use glam::Vec2;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::renderer::portal_renderer::MAX_RECURSION_DEPTH;

pub const SETTINGS_PATH: &str = "settings.toml";
const MIN_FOV_DEGREES: f32 = 30.0;
const MAX_FOV_DEGREES: f32 = 150.0;
const MIN_NEAR_PLANE: f32 = 0.001;
const MAX_NEAR_PLANE: f32 = 10.0;
const MAX_FAR_PLANE: f32 = 10_000.0;
const MIN_MOUSE_SENSITIVITY: f32 = 0.0001;
const MAX_MOUSE_SENSITIVITY: f32 = 0.05;
const MAX_MOVE_SPEED: f32 = 5.0;
const MIN_PORTAL_AXIS: f32 = 0.1;
const MAX_PORTAL_AXIS: f32 = 100.0;
const MIN_VIEWPORT_SIDE: u32 = 1;
const MAX_VIEWPORT_SIDE: u32 = 16_384;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientSettings {
    #[serde(default = "default_recursion_depth")]
    pub recursion_depth: u32,
    #[serde(default = "default_fov_degrees")]
    pub fov_degrees: f32,
    #[serde(default = "default_near_plane")]
    pub near_plane: f32,
    #[serde(default = "default_far_plane")]
    pub far_plane: f32,
    #[serde(default = "default_mouse_sensitivity")]
    pub mouse_sensitivity: f32,
    #[serde(default = "default_move_speed")]
    pub move_speed: f32,
    #[serde(default = "default_portal_dimensions")]
    pub portal_dimensions: Vec2,
    #[serde(default = "default_viewport_width")]
    pub viewport_width: u32,
    #[serde(default = "default_viewport_height")]
    pub viewport_height: u32,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            recursion_depth: default_recursion_depth(),
            fov_degrees: default_fov_degrees(),
            near_plane: default_near_plane(),
            far_plane: default_far_plane(),
            mouse_sensitivity: default_mouse_sensitivity(),
            move_speed: default_move_speed(),
            portal_dimensions: default_portal_dimensions(),
            viewport_width: default_viewport_width(),
            viewport_height: default_viewport_height(),
        }
    }
}

impl ClientSettings {
    pub fn sanitize(mut self) -> Self {
        self.recursion_depth = self.recursion_depth.min(MAX_RECURSION_DEPTH);
        self.fov_degrees = finite_or(self.fov_degrees, default_fov_degrees())
            .clamp(MIN_FOV_DEGREES, MAX_FOV_DEGREES);
        self.near_plane = finite_or(self.near_plane, default_near_plane())
            .clamp(MIN_NEAR_PLANE, MAX_NEAR_PLANE);
        self.far_plane = finite_or(self.far_plane, default_far_plane())
            .clamp(self.near_plane * 2.0, MAX_FAR_PLANE);
        self.mouse_sensitivity = finite_or(self.mouse_sensitivity, default_mouse_sensitivity())
            .clamp(MIN_MOUSE_SENSITIVITY, MAX_MOUSE_SENSITIVITY);
        self.move_speed = finite_or(self.move_speed, default_move_speed()).clamp(0.0, MAX_MOVE_SPEED);
        self.portal_dimensions = if self.portal_dimensions.is_finite() {
            self.portal_dimensions
                .clamp(Vec2::splat(MIN_PORTAL_AXIS), Vec2::splat(MAX_PORTAL_AXIS))
        } else {
            default_portal_dimensions()
        };
        self.viewport_width = self.viewport_width.clamp(MIN_VIEWPORT_SIDE, MAX_VIEWPORT_SIDE);
        self.viewport_height = self.viewport_height.clamp(MIN_VIEWPORT_SIDE, MAX_VIEWPORT_SIDE);
        self
    }

    pub fn fov_radians(&self) -> f32 {
        self.fov_degrees.to_radians()
    }

    pub fn viewport(&self) -> Viewport {
        Viewport::new(self.viewport_width, self.viewport_height)
    }

    pub fn load(path: &Path) -> io::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let parsed = toml::from_str::<Self>(&contents).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("failed to deserialize settings: {e}"),
            )
        })?;
        Ok(parsed.sanitize())
    }

    pub fn save(&self, path: &Path) -> io::Result<()> {
        let settings = self.clone().sanitize();
        let serialized = toml::to_string_pretty(&settings).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("failed to serialize settings: {e}"),
            )
        })?;
        fs::write(path, serialized)
    }
}

fn finite_or(value: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}

fn default_recursion_depth() -> u32 {
    5
}

fn default_fov_degrees() -> f32 {
    90.0
}

fn default_near_plane() -> f32 {
    0.1
}

fn default_far_plane() -> f32 {
    200.0
}

fn default_mouse_sensitivity() -> f32 {
    0.002
}

fn default_move_speed() -> f32 {
    0.2
}

fn default_portal_dimensions() -> Vec2 {
    Vec2::new(5.0, 10.0)
}

fn default_viewport_width() -> u32 {
    900
}

fn default_viewport_height() -> u32 {
    900
}

pub fn load_or_create_settings(path: &Path) -> ClientSettings {
    match ClientSettings::load(path) {
        Ok(settings) => settings,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            let settings = ClientSettings::default();
            if let Err(save_err) = settings.save(path) {
                warn!(
                    "Failed to create default settings at {}: {save_err}",
                    path.display()
                );
            }
            settings
        }
        Err(err) => {
            warn!("Failed to load settings from {}: {err}", path.display());
            let settings = ClientSettings::default();
            if let Err(save_err) = settings.save(path) {
                warn!(
                    "Failed to overwrite settings at {}: {save_err}",
                    path.display()
                );
            }
            settings
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use glam::Vec2;

    use super::{load_or_create_settings, ClientSettings};
    use crate::renderer::portal_renderer::MAX_RECURSION_DEPTH;

    fn scratch_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("aperture-{}-{name}.toml", std::process::id()))
    }

    #[test]
    fn missing_fields_take_defaults() {
        let parsed: ClientSettings = toml::from_str("recursion_depth = 2\n").unwrap();
        assert_eq!(parsed.recursion_depth, 2);
        assert_eq!(parsed.portal_dimensions, Vec2::new(5.0, 10.0));
        assert_eq!(parsed.viewport_width, 900);
    }

    #[test]
    fn sanitize_clamps_out_of_range_values() {
        let settings = ClientSettings {
            recursion_depth: 10_000,
            fov_degrees: f32::NAN,
            near_plane: 5.0,
            far_plane: 1.0,
            viewport_width: 0,
            portal_dimensions: Vec2::new(-1.0, 1_000.0),
            ..ClientSettings::default()
        }
        .sanitize();

        assert_eq!(settings.recursion_depth, MAX_RECURSION_DEPTH);
        assert_eq!(settings.fov_degrees, 90.0);
        assert!(settings.far_plane > settings.near_plane);
        assert_eq!(settings.viewport_width, 1);
        assert_eq!(settings.portal_dimensions, Vec2::new(0.1, 100.0));
    }

    #[test]
    fn missing_file_is_created_with_defaults() {
        let path = scratch_path("missing");
        let _ = fs::remove_file(&path);

        let settings = load_or_create_settings(&path);
        assert_eq!(settings, ClientSettings::default());
        assert_eq!(ClientSettings::load(&path).unwrap(), settings);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn unreadable_file_falls_back_to_defaults() {
        let path = scratch_path("broken");
        fs::write(&path, "recursion_depth = \"deep\"").unwrap();

        let settings = load_or_create_settings(&path);
        assert_eq!(settings, ClientSettings::default());
        let _ = fs::remove_file(&path);
    }
}
