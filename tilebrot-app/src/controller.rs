use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use tilebrot_core::ViewState;
use tilebrot_render::{FrameReport, RenderPhase, RenderPipeline, Surface};

use crate::config::AppConfig;
use crate::history::StatePublisher;
use crate::input::InputEvent;

/// Pointer gesture in progress.
#[derive(Debug, Clone, Copy)]
struct Gesture {
    x: f64,
    y: f64,
    /// View when the gesture began; live pans are relative to it.
    base: ViewState,
    dragging: bool,
}

#[derive(Debug, Clone, Copy)]
struct PendingResize {
    width: u32,
    height: u32,
    deadline: Instant,
}

/// Turns input events into view-state changes and keeps the surface in
/// step with the view.
///
/// User-driven changes re-render and are published; externally driven
/// navigation re-renders only. Resizes are debounced: a burst of resize
/// events applies once, `resize_debounce` after the last of them.
pub struct Controller<S: Surface, P: StatePublisher> {
    config: AppConfig,
    view: ViewState,
    pipeline: RenderPipeline,
    surface: S,
    publisher: P,
    gesture: Option<Gesture>,
    pending_resize: Option<PendingResize>,
}

impl<S: Surface, P: StatePublisher> Controller<S, P> {
    /// Load the initial view from `initial` (falling back to the configured
    /// default), record it with the publisher and start the first frame.
    pub fn new(
        config: AppConfig,
        pipeline: RenderPipeline,
        mut surface: S,
        mut publisher: P,
        initial: Option<&str>,
    ) -> Self {
        let (width, height) = pipeline.size();
        surface.resize(width, height);
        let view = ViewState::load_or(initial, config.default_view(height));
        publisher.replace(&view);
        info!(query = %view, width, height, "Controller ready");

        let mut controller = Self {
            config,
            view,
            pipeline,
            surface,
            publisher,
            gesture: None,
            pending_resize: None,
        };
        controller.pipeline.render(&controller.view);
        controller
    }

    pub fn view(&self) -> ViewState {
        self.view
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// Size the pipeline is currently tiled for.
    pub fn size(&self) -> (u32, u32) {
        self.pipeline.size()
    }

    pub fn phase(&self) -> RenderPhase {
        self.pipeline.phase()
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    pub fn publisher_mut(&mut self) -> &mut P {
        &mut self.publisher
    }

    pub fn has_pending_resize(&self) -> bool {
        self.pending_resize.is_some()
    }

    pub fn handle(&mut self, event: InputEvent, now: Instant) {
        let (width, height) = self.pipeline.size();
        let (cx, cy) = (width as f64 / 2.0, height as f64 / 2.0);

        match event {
            InputEvent::PanStart { x, y } => {
                self.gesture = Some(Gesture {
                    x,
                    y,
                    base: self.view,
                    dragging: false,
                });
            }
            InputEvent::PanMove { dx, dy, elapsed } => {
                let drag = self.is_drag(dx, dy, elapsed);
                let Some(gesture) = self.gesture.as_mut() else {
                    return;
                };
                gesture.dragging |= drag;
                if gesture.dragging {
                    let next = gesture.base.panned(dx, dy);
                    self.show(next);
                }
            }
            InputEvent::PanEnd { dx, dy, elapsed } => {
                let drag = self.is_drag(dx, dy, elapsed);
                let Some(gesture) = self.gesture.take() else {
                    return;
                };
                if gesture.dragging || drag {
                    // Live moves may already show the final view; compare
                    // against where the gesture started.
                    self.commit_from(gesture.base, gesture.base.panned(dx, dy));
                    return;
                }
                let next = gesture.base.zoomed_at(
                    gesture.x + dx,
                    gesture.y + dy,
                    width,
                    height,
                    self.config.click_zoom_factor,
                );
                self.commit(next);
            }
            InputEvent::PanBy { dx, dy } => self.commit(self.view.panned(dx, dy)),
            InputEvent::ZoomAt { x, y } => self.commit(self.view.zoomed_at(
                x,
                y,
                width,
                height,
                self.config.click_zoom_factor,
            )),
            InputEvent::ZoomIn => self.commit(self.view.zoomed_at(
                cx,
                cy,
                width,
                height,
                self.config.keyboard_zoom_factor,
            )),
            InputEvent::ZoomOut => self.commit(self.view.zoomed_at(
                cx,
                cy,
                width,
                height,
                1.0 / self.config.keyboard_zoom_factor,
            )),
            InputEvent::IterationsUp => {
                self.commit(self.view.with_iterations_scaled(self.config.iteration_step))
            }
            InputEvent::IterationsDown => {
                self.commit(self.view.with_iterations_scaled(1.0 / self.config.iteration_step))
            }
            InputEvent::Nudge(direction) => {
                let (ux, uy) = direction.unit();
                let fraction = self.config.nudge_fraction;
                self.commit(self.view.shifted(
                    ux * width as f64 * fraction,
                    uy * height as f64 * fraction,
                ));
            }
            InputEvent::Reset => self.commit(self.config.default_view(height)),
            InputEvent::Resize { width, height } => self.schedule_resize(width, height, now),
        }
    }

    /// Show a state that came from outside (history navigation). Not
    /// published.
    pub fn navigate(&mut self, state: ViewState) {
        self.gesture = None;
        debug!(query = %state, "Navigating");
        self.show(state);
    }

    /// Apply a due resize and collect finished frames without blocking.
    pub fn tick(&mut self, now: Instant) -> Vec<FrameReport> {
        if let Some(pending) = self.pending_resize {
            if now >= pending.deadline {
                self.apply_resize(pending.width, pending.height);
            }
        }
        self.pipeline.poll(&mut self.surface, &self.view)
    }

    /// Apply any pending resize immediately and block until the pipeline
    /// is idle.
    pub fn settle(&mut self) -> Vec<FrameReport> {
        if let Some(pending) = self.pending_resize {
            self.apply_resize(pending.width, pending.height);
        }
        self.pipeline.wait(&mut self.surface, &self.view)
    }

    pub fn dispose(&mut self) {
        self.pending_resize = None;
        self.pipeline.dispose();
    }

    fn is_drag(&self, dx: f64, dy: f64, elapsed: Duration) -> bool {
        let threshold = self.config.drag_threshold_px;
        dx.abs() > threshold || dy.abs() > threshold || elapsed > self.config.drag_threshold()
    }

    fn show(&mut self, next: ViewState) {
        self.view = next;
        self.pipeline.render(&self.view);
    }

    fn commit(&mut self, next: ViewState) {
        self.commit_from(self.view, next);
    }

    /// Show `next` and publish it unless it equals `before`, the state the
    /// user-driven change started from.
    fn commit_from(&mut self, before: ViewState, next: ViewState) {
        if next != self.view {
            self.show(next);
        }
        if next == before {
            debug!("View unchanged; nothing to publish");
            return;
        }
        self.publisher.publish(&self.view);
    }

    fn schedule_resize(&mut self, width: u32, height: u32, now: Instant) {
        if width == 0 || height == 0 {
            warn!(width, height, "Ignoring resize to an empty surface");
            return;
        }
        match now.checked_add(self.config.resize_debounce()) {
            Some(deadline) => {
                self.pending_resize = Some(PendingResize {
                    width,
                    height,
                    deadline,
                });
            }
            None => {
                warn!(
                    debounce_ms = self.config.resize_debounce_ms,
                    "Resize debounce out of range; resizing now"
                );
                self.apply_resize(width, height);
            }
        }
    }

    fn apply_resize(&mut self, width: u32, height: u32) {
        self.pending_resize = None;
        if (width, height) == self.pipeline.size() {
            return;
        }
        if let Err(e) = self.pipeline.resize(width, height) {
            error!(width, height, "Resize failed: {e}");
            return;
        }
        self.surface.resize(width, height);
        debug!(width, height, "Applied resize");
        self.pipeline.render(&self.view);
    }
}
