//! Scripted, windowless session: the controller driven by a list of
//! [`ScriptStep`]s, rendering into a [`RenderBuffer`].

use std::path::Path;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use tilebrot_core::ViewState;
use tilebrot_render::{export_png, FrameOutcome, FrameReport, RenderBuffer, RenderPipeline};

use crate::config::AppConfig;
use crate::controller::Controller;
use crate::error::AppError;
use crate::history::SessionHistory;
use crate::input::{InputEvent, ScriptStep};

/// Simulated time between script steps.
const STEP_INTERVAL: Duration = Duration::from_millis(16);

/// Outcome of a scripted session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub view: ViewState,
    pub frames: usize,
    pub history_len: usize,
}

fn log_reports(reports: &[FrameReport]) {
    for report in reports {
        if let FrameOutcome::Superseded = report.outcome {
            info!(frame = report.frame, "Frame superseded by resize");
        }
    }
}

/// Run `steps` against a fresh controller, wait for the last frame and
/// optionally export it.
///
/// Fails if the final frame could not be rendered.
pub fn run_script(
    config: &AppConfig,
    initial: Option<&str>,
    steps: &[ScriptStep],
    output: Option<&Path>,
) -> crate::Result<SessionSummary> {
    if config.width == 0 || config.height == 0 {
        return Err(AppError::InvalidSize {
            width: config.width,
            height: config.height,
        });
    }
    let pipeline = RenderPipeline::from_config(&config.render_config(), config.width, config.height)?;
    let surface = RenderBuffer::new(config.width, config.height);
    let history = SessionHistory::new(config.max_history);
    let mut controller = Controller::new(config.clone(), pipeline, surface, history, initial);

    let mut clock = Instant::now();
    let mut frames = Vec::new();
    for step in steps {
        match *step {
            ScriptStep::Input(event) => controller.handle(event, clock),
            ScriptStep::Drag { dx, dy } => {
                let (width, height) = controller.size();
                let elapsed = config.drag_threshold() + STEP_INTERVAL;
                controller.handle(
                    InputEvent::PanStart {
                        x: width as f64 / 2.0,
                        y: height as f64 / 2.0,
                    },
                    clock,
                );
                controller.handle(
                    InputEvent::PanMove {
                        dx: dx / 2.0,
                        dy: dy / 2.0,
                        elapsed: elapsed / 2,
                    },
                    clock,
                );
                controller.handle(InputEvent::PanEnd { dx, dy, elapsed }, clock);
            }
            ScriptStep::Back => match controller.publisher_mut().back() {
                Some(state) => controller.navigate(state),
                None => warn!("No earlier view in history"),
            },
            ScriptStep::Forward => match controller.publisher_mut().forward() {
                Some(state) => controller.navigate(state),
                None => warn!("No later view in history"),
            },
        }
        clock += STEP_INTERVAL;
        frames.extend(controller.tick(clock));
    }
    frames.extend(controller.settle());
    log_reports(&frames);

    let view = controller.view();
    let summary = SessionSummary {
        view,
        frames: frames.len(),
        history_len: controller.publisher().len(),
    };

    match frames.pop().map(|report| report.outcome) {
        Some(FrameOutcome::Aborted(e)) => return Err(e.into()),
        Some(_) => {}
        None => warn!("Script finished without rendering a frame"),
    }

    if let Some(path) = output {
        export_png(controller.surface(), &view, path)?;
        info!(path = %path.display(), query = %view, "Image written");
    }
    controller.dispose();
    Ok(summary)
}
