pub mod app;
pub mod input;
pub mod renderer;
pub mod settings;
pub mod world;
