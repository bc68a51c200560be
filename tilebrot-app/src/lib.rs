pub mod config;
pub mod controller;
pub mod error;
pub mod headless;
pub mod history;
pub mod input;

pub use config::AppConfig;
pub use controller::Controller;
pub use error::{AppError, Result};
pub use headless::{run_script, SessionSummary};
pub use history::{SessionHistory, StatePublisher};
pub use input::{Direction, InputEvent, ScriptStep};
