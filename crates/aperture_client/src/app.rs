use std::f32::consts::FRAC_PI_2;
use std::fmt;
use std::path::PathBuf;
use std::process::ExitCode;

use aperture_shared::portal::PortalColor;
use aperture_shared::scene::SceneGraphError;
use tracing::{debug, info};
use winit::keyboard::KeyCode;

use crate::input::InputState;
use crate::renderer::recording::{FrameSummary, RecordingDevice};
use crate::renderer::{PortalPassStats, PortalRenderer};
use crate::settings::{load_or_create_settings, ClientSettings, SETTINGS_PATH};
use crate::world::World;

const DEFAULT_FRAMES: u32 = 120;
/// Towards the blue portal, a little off-axis so the walk does not land
/// exactly on the portal plane.
const SCRIPTED_HEADING: f32 = FRAC_PI_2 + 0.1;
const USAGE: &str = "\
Usage: aperture [OPTIONS]

Walks the camera through the demo chamber and renders every frame with a
recording graphics device.

Options:
  --frames <N>        number of frames to simulate (default 120)
  --settings <PATH>   settings file to load or create (default settings.toml)
  --depth <N>         override the portal recursion depth
  -h, --help          print this message";

#[derive(Debug, Clone, PartialEq)]
pub struct AppOptions {
    pub frames: u32,
    pub settings_path: PathBuf,
    pub depth: Option<u32>,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            frames: DEFAULT_FRAMES,
            settings_path: PathBuf::from(SETTINGS_PATH),
            depth: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Run(AppOptions),
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgsError {
    MissingValue(&'static str),
    InvalidNumber { flag: &'static str, value: String },
    UnknownFlag(String),
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingValue(flag) => write!(f, "{flag} expects a value"),
            Self::InvalidNumber { flag, value } => {
                write!(f, "{flag} expects a non-negative integer, got {value:?}")
            }
            Self::UnknownFlag(flag) => write!(f, "unknown argument {flag:?}"),
        }
    }
}

impl std::error::Error for ArgsError {}

pub fn parse_args<I>(args: I) -> Result<Command, ArgsError>
where
    I: IntoIterator<Item = String>,
{
    let mut options = AppOptions::default();
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(Command::Help),
            "--frames" => options.frames = parse_number("--frames", args.next())?,
            "--depth" => options.depth = Some(parse_number("--depth", args.next())?),
            "--settings" => {
                let path = args.next().ok_or(ArgsError::MissingValue("--settings"))?;
                options.settings_path = PathBuf::from(path);
            }
            _ => return Err(ArgsError::UnknownFlag(arg)),
        }
    }
    Ok(Command::Run(options))
}

fn parse_number(flag: &'static str, value: Option<String>) -> Result<u32, ArgsError> {
    let value = value.ok_or(ArgsError::MissingValue(flag))?;
    value
        .parse()
        .map_err(|_| ArgsError::InvalidNumber { flag, value })
}

#[derive(Debug, Clone, Copy)]
pub struct FrameReport {
    pub frame: u32,
    pub teleported: Option<PortalColor>,
    pub stats: PortalPassStats,
    pub summary: FrameSummary,
}

/// The per-frame loop without a window: scripted input, simulation, portal
/// rendering into a recording device, present.
pub struct HeadlessApp {
    settings: ClientSettings,
    world: World,
    renderer: PortalRenderer,
    gfx: RecordingDevice,
    input: InputState,
    frame: u32,
}

impl HeadlessApp {
    pub fn new(settings: ClientSettings) -> Result<Self, SceneGraphError> {
        let mut world = World::demo(&settings)?;
        let mut gfx = RecordingDevice::new();
        world.upload(&mut gfx);
        world
            .camera
            .direct(&mut world.graph, SCRIPTED_HEADING, 0.0);

        let mut input = InputState::default();
        input.press_key(KeyCode::KeyW);

        Ok(Self {
            renderer: PortalRenderer::new(settings.recursion_depth),
            settings,
            world,
            gfx,
            input,
            frame: 0,
        })
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn step(&mut self) -> FrameReport {
        let teleported = self.world.update(&mut self.input, &self.settings);
        let (view, projection) = self.world.view_projection(self.settings.viewport());
        let stats = self
            .renderer
            .render_frame(&mut self.gfx, &self.world, view, projection);
        let summary = self.gfx.present();

        let report = FrameReport {
            frame: self.frame,
            teleported,
            stats,
            summary,
        };
        debug!(
            "Frame {}: {} draws, {} world passes, {} stencil marks, depth {}, {} pipelines",
            report.frame,
            summary.draws,
            stats.world_draws,
            stats.stencil_marks,
            stats.deepest_level,
            summary.pipelines
        );
        self.frame += 1;
        report
    }
}

pub fn run() -> ExitCode {
    let _ = tracing_subscriber::fmt().with_target(false).try_init();

    let options = match parse_args(std::env::args().skip(1)) {
        Ok(Command::Run(options)) => options,
        Ok(Command::Help) => {
            println!("{USAGE}");
            return ExitCode::SUCCESS;
        }
        Err(err) => {
            eprintln!("{err}\n\n{USAGE}");
            return ExitCode::from(2);
        }
    };

    let mut settings = load_or_create_settings(&options.settings_path);
    if let Some(depth) = options.depth {
        settings.recursion_depth = depth;
        settings = settings.sanitize();
    }
    info!(
        "Aperture starting: {} frames, recursion depth {}",
        options.frames, settings.recursion_depth
    );

    let mut app = match HeadlessApp::new(settings) {
        Ok(app) => app,
        Err(err) => {
            eprintln!("Failed to build the demo world: {err}");
            return ExitCode::FAILURE;
        }
    };

    let mut teleports = 0u32;
    let mut draws = 0usize;
    for _ in 0..options.frames {
        let report = app.step();
        draws += report.summary.draws;
        if let Some(color) = report.teleported {
            teleports += 1;
            info!("Frame {}: teleported through {color:?}", report.frame);
        }
    }

    let position = app.world().graph[app.world().camera.node].global_position();
    info!(
        "Finished {} frames: {teleports} teleports, {draws} draws, camera at {position}",
        options.frames
    );
    ExitCode::SUCCESS
}
