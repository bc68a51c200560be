use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use tilebrot_core::tile::{DEFAULT_COLS, DEFAULT_ROWS};
use tilebrot_core::ViewState;
use tilebrot_render::{default_worker_count, RenderConfig};

use crate::error::AppError;

/// Tunables for rendering and interaction, loaded from `config.json`.
///
/// Every field has a default, so a partial file is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_tile_rows")]
    pub tile_rows: u32,
    #[serde(default = "default_tile_cols")]
    pub tile_cols: u32,
    /// Worker threads; `None` uses one per logical CPU.
    #[serde(default)]
    pub workers: Option<usize>,
    #[serde(default = "default_resize_debounce_ms")]
    pub resize_debounce_ms: u64,
    #[serde(default = "default_max_iterations")]
    pub default_max_iterations: u32,
    /// Multiplier applied by the iteration up/down actions.
    #[serde(default = "default_iteration_step")]
    pub iteration_step: f64,
    #[serde(default = "default_keyboard_zoom_factor")]
    pub keyboard_zoom_factor: f64,
    #[serde(default = "default_click_zoom_factor")]
    pub click_zoom_factor: f64,
    /// A gesture moving further than this on either axis is a drag.
    #[serde(default = "default_drag_threshold_px")]
    pub drag_threshold_px: f64,
    /// A gesture lasting longer than this is a drag.
    #[serde(default = "default_drag_threshold_ms")]
    pub drag_threshold_ms: u64,
    /// Fraction of the output dimension moved per nudge.
    #[serde(default = "default_nudge_fraction")]
    pub nudge_fraction: f64,
    #[serde(default = "default_max_history")]
    pub max_history: usize,
}

/// Longest accepted resize debounce.
pub const MAX_RESIZE_DEBOUNCE_MS: u64 = 10_000;

fn default_width() -> u32 {
    640
}
fn default_height() -> u32 {
    480
}
fn default_tile_rows() -> u32 {
    DEFAULT_ROWS
}
fn default_tile_cols() -> u32 {
    DEFAULT_COLS
}
fn default_resize_debounce_ms() -> u64 {
    200
}
fn default_max_iterations() -> u32 {
    ViewState::DEFAULT_MAX_ITERATIONS
}
fn default_iteration_step() -> f64 {
    1.5
}
fn default_keyboard_zoom_factor() -> f64 {
    1.2
}
fn default_click_zoom_factor() -> f64 {
    2.0
}
fn default_drag_threshold_px() -> f64 {
    10.0
}
fn default_drag_threshold_ms() -> u64 {
    500
}
fn default_nudge_fraction() -> f64 {
    0.05
}
fn default_max_history() -> usize {
    200
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            tile_rows: default_tile_rows(),
            tile_cols: default_tile_cols(),
            workers: None,
            resize_debounce_ms: default_resize_debounce_ms(),
            default_max_iterations: default_max_iterations(),
            iteration_step: default_iteration_step(),
            keyboard_zoom_factor: default_keyboard_zoom_factor(),
            click_zoom_factor: default_click_zoom_factor(),
            drag_threshold_px: default_drag_threshold_px(),
            drag_threshold_ms: default_drag_threshold_ms(),
            nudge_fraction: default_nudge_fraction(),
            max_history: default_max_history(),
        }
    }
}

impl AppConfig {
    /// `config.json` in the platform config directory.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "tilebrot").map(|dirs| dirs.config_dir().join("config.json"))
    }

    /// Load from `path`, or from [`default_path`](Self::default_path) when
    /// `None`. Never fails: a missing file yields defaults, and an
    /// unreadable or malformed one is logged and yields defaults.
    pub fn load(path: Option<&Path>) -> Self {
        let path = match path.map(Path::to_path_buf).or_else(Self::default_path) {
            Some(path) => path,
            None => {
                debug!("No config directory available; using defaults");
                return Self::default();
            }
        };
        if !path.exists() {
            debug!("No config file at {}", path.display());
            return Self::default();
        }
        match Self::read(&path) {
            Ok(config) => {
                info!("Loaded config from {}", path.display());
                config
            }
            Err(e) => {
                error!("{e}; using defaults");
                Self::default()
            }
        }
    }

    /// Read and parse `path`, then repair out-of-range values.
    pub fn read(path: &Path) -> crate::Result<Self> {
        let json = fs::read_to_string(path).map_err(|source| AppError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&json).map_err(|source| AppError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(config.sanitized())
    }

    /// Replace values that would break rendering or interaction with their
    /// defaults.
    pub fn sanitized(mut self) -> Self {
        fn fix<T: Copy + std::fmt::Debug>(name: &str, value: &mut T, valid: impl Fn(T) -> bool, default: T) {
            if !valid(*value) {
                warn!(field = name, value = ?*value, "Config value out of range; using default");
                *value = default;
            }
        }
        let factor = |v: f64| v.is_finite() && v > 1.0;

        fix("width", &mut self.width, |v| v > 0, default_width());
        fix("height", &mut self.height, |v| v > 0, default_height());
        fix("tile_rows", &mut self.tile_rows, |v| v > 0, default_tile_rows());
        fix("tile_cols", &mut self.tile_cols, |v| v > 0, default_tile_cols());
        fix(
            "default_max_iterations",
            &mut self.default_max_iterations,
            |v| v > 0,
            default_max_iterations(),
        );
        fix("iteration_step", &mut self.iteration_step, factor, default_iteration_step());
        fix(
            "keyboard_zoom_factor",
            &mut self.keyboard_zoom_factor,
            factor,
            default_keyboard_zoom_factor(),
        );
        fix(
            "click_zoom_factor",
            &mut self.click_zoom_factor,
            factor,
            default_click_zoom_factor(),
        );
        fix(
            "drag_threshold_px",
            &mut self.drag_threshold_px,
            |v| v.is_finite() && v >= 0.0,
            default_drag_threshold_px(),
        );
        fix(
            "nudge_fraction",
            &mut self.nudge_fraction,
            |v| v.is_finite() && v > 0.0,
            default_nudge_fraction(),
        );
        fix(
            "resize_debounce_ms",
            &mut self.resize_debounce_ms,
            |v| v <= MAX_RESIZE_DEBOUNCE_MS,
            default_resize_debounce_ms(),
        );
        fix("max_history", &mut self.max_history, |v| v > 0, default_max_history());
        if self.workers == Some(0) {
            warn!("Config requests zero workers; using automatic count");
            self.workers = None;
        }
        self
    }

    pub fn render_config(&self) -> RenderConfig {
        RenderConfig {
            rows: self.tile_rows,
            cols: self.tile_cols,
            workers: self.workers.unwrap_or_else(default_worker_count),
        }
    }

    pub fn resize_debounce(&self) -> Duration {
        Duration::from_millis(self.resize_debounce_ms)
    }

    pub fn drag_threshold(&self) -> Duration {
        Duration::from_millis(self.drag_threshold_ms)
    }

    /// Default view for an output `height` pixels tall.
    pub fn default_view(&self, height: u32) -> ViewState {
        ViewState {
            max_iterations: self.default_max_iterations.max(1),
            ..ViewState::default_for_height(height)
        }
    }
}
