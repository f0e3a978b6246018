pub mod camera;
pub mod light;
pub mod mesh;
pub mod physics;
pub mod portal;
pub mod scene;
