use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use clap::Parser;
use scene::topology::{DEFAULT_K_NEIGHBORS, DEFAULT_LINK_MAX_M, LinkMode};
use tracing::warn;
use view::grid::GridConfig;
use view::viewport::ViewConfig;

#[derive(Parser, Debug)]
#[command(author, version, about = "Headless mesh network situational display")]
pub struct Args {
    /// Newline-delimited JSON node reports (default: stdin)
    #[arg(long, short)]
    pub input: Option<PathBuf>,

    /// Stop after this many frames
    #[arg(long)]
    pub frames: Option<u64>,

    /// Stop once the input is exhausted and fully drained
    #[arg(long)]
    pub exit_on_eof: bool,

    /// Print the last frame as JSON on exit
    #[arg(long)]
    pub dump: bool,

    /// Debug-level logging unless RUST_LOG is set
    #[arg(long, short)]
    pub verbose: bool,

    /// Tick rate in frames per second
    #[arg(long)]
    pub fps: Option<f64>,

    /// Plot width in pixels
    #[arg(long)]
    pub width: Option<f64>,

    /// Plot height in pixels
    #[arg(long)]
    pub height: Option<f64>,

    /// Initial link mode: mst_knn, mst or knn
    #[arg(long)]
    pub link_mode: Option<LinkMode>,
}

impl Args {
    /// Command-line values win over the environment.
    pub fn apply(&self, config: &mut DisplayConfig) {
        if let Some(fps) = self.fps {
            config.fps = fps;
        }
        if let Some(width) = self.width {
            config.width = width;
        }
        if let Some(height) = self.height {
            config.height = height;
        }
        if let Some(mode) = self.link_mode {
            config.link_mode = mode;
        }
    }
}

/// Highest accepted tick rate.
pub const MAX_FPS: f64 = 1000.0;

/// Runtime tunables for the display loop.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayConfig {
    pub fps: f64,
    /// Nodes older than this are dimmed, and hidden while hide-stale is on.
    pub stale_after_s: f64,
    /// Records applied per frame at most.
    pub drain_budget: u32,
    pub k_neighbors: usize,
    pub link_max_m: f64,
    pub link_mode: LinkMode,
    pub width: f64,
    pub height: f64,
    /// Frames between periodic log summaries; 0 disables them.
    pub summary_every: u64,
    pub view: ViewConfig,
    pub grid: GridConfig,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            fps: 20.0,
            stale_after_s: 300.0,
            drain_budget: 512,
            k_neighbors: DEFAULT_K_NEIGHBORS,
            link_max_m: DEFAULT_LINK_MAX_M,
            link_mode: LinkMode::default(),
            width: 1280.0,
            height: 720.0,
            summary_every: 100,
            view: ViewConfig::default(),
            grid: GridConfig::default(),
        }
    }
}

impl DisplayConfig {
    /// Defaults overridden by `MESHPLOT_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let d = Self::default();
        let mut config = Self {
            fps: env_var_f64(&lookup, "MESHPLOT_FPS", d.fps),
            stale_after_s: env_var_f64(&lookup, "MESHPLOT_STALE_SEC", d.stale_after_s),
            drain_budget: env_var_u32(&lookup, "MESHPLOT_DRAIN_BUDGET", d.drain_budget),
            k_neighbors: env_var_usize(&lookup, "MESHPLOT_K_NEIGHBORS", d.k_neighbors),
            link_max_m: env_var_f64(&lookup, "MESHPLOT_LINK_MAX_M", d.link_max_m),
            link_mode: env_var(&lookup, "MESHPLOT_LINK_MODE", d.link_mode),
            width: env_var_f64(&lookup, "MESHPLOT_WIDTH", d.width),
            height: env_var_f64(&lookup, "MESHPLOT_HEIGHT", d.height),
            summary_every: env_var_u64(&lookup, "MESHPLOT_SUMMARY_EVERY", d.summary_every),
            view: ViewConfig {
                zoom_step: env_var_f64(&lookup, "MESHPLOT_ZOOM_STEP", d.view.zoom_step),
                pan_accel: env_var_f64(&lookup, "MESHPLOT_PAN_ACCEL", d.view.pan_accel),
                friction: env_var_f64(&lookup, "MESHPLOT_FRICTION", d.view.friction),
                min_fit_radius_m: env_var_f64(
                    &lookup,
                    "MESHPLOT_MIN_FIT_RADIUS_M",
                    d.view.min_fit_radius_m,
                ),
                margin_factor: env_var_f64(&lookup, "MESHPLOT_MARGIN", d.view.margin_factor),
                ..d.view
            },
            grid: GridConfig {
                max_lines: env_var_u64(&lookup, "MESHPLOT_GRID_MAX_LINES", d.grid.max_lines),
                ..d.grid
            },
        };
        config.sanitize();
        config
    }

    /// Replaces values that would stall or invert the display with defaults.
    pub fn sanitize(&mut self) {
        let d = Self::default();
        if !(self.fps > 0.0 && self.fps.is_finite()) {
            warn!(fps = self.fps, "fps must be positive; using default");
            self.fps = d.fps;
        } else if self.fps > MAX_FPS {
            warn!(fps = self.fps, max = MAX_FPS, "fps too high; clamping");
            self.fps = MAX_FPS;
        }
        if !(self.view.zoom_step > 1.0 && self.view.zoom_step.is_finite()) {
            warn!(zoom_step = self.view.zoom_step, "zoom step must exceed 1; using default");
            self.view.zoom_step = d.view.zoom_step;
        }
        if !(self.view.min_fit_radius_m > 0.0) {
            warn!(
                min_fit_radius_m = self.view.min_fit_radius_m,
                "fit radius must be positive; using default"
            );
            self.view.min_fit_radius_m = d.view.min_fit_radius_m;
        }
        if self.drain_budget == 0 {
            warn!("drain budget of 0 would never ingest; using default");
            self.drain_budget = d.drain_budget;
        }
    }

    pub fn frame_interval_s(&self) -> f64 {
        1.0 / self.fps
    }
}

fn env_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    let Some(raw) = lookup(key) else {
        return default;
    };
    match raw.trim().parse() {
        Ok(value) => value,
        Err(_) => {
            warn!(key, value = %raw, "ignoring unparsable environment value");
            default
        }
    }
}

fn env_var_u32(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: u32) -> u32 {
    env_var(lookup, key, default)
}

fn env_var_u64(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: u64) -> u64 {
    env_var(lookup, key, default)
}

fn env_var_usize(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: usize) -> usize {
    env_var(lookup, key, default)
}

fn env_var_f64(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: f64) -> f64 {
    env_var(lookup, key, default)
}
