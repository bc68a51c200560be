use std::time::{Duration, Instant};

use rayon::prelude::*;
use tracing::{debug, error, info};

use tilebrot_core::tile::{DEFAULT_COLS, DEFAULT_ROWS};
use tilebrot_core::{tile_grid, Tile, ViewState, WorkItem, WorkResult};

use crate::color::ColorTable;
use crate::error::RenderError;
use crate::pool::{default_worker_count, TaskFuture, WorkerPool};
use crate::surface::Surface;

// ---------------------------------------------------------------------------
// Configuration & reporting
// ---------------------------------------------------------------------------

/// Tiling grid and pool size for a [`RenderPipeline`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderConfig {
    pub rows: u32,
    pub cols: u32,
    pub workers: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            rows: DEFAULT_ROWS,
            cols: DEFAULT_COLS,
            workers: default_worker_count(),
        }
    }
}

/// Coarse pipeline state as seen by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderPhase {
    Idle,
    Running,
    /// Running, and one more frame will start when this one ends.
    RunningWithPendingRefresh,
}

/// What [`RenderPipeline::render`] did with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderRequest {
    Started { frame: u64 },
    /// A frame is already running; a single follow-up is scheduled.
    Coalesced,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameStats {
    pub tiles: usize,
    pub min_iterations: u32,
    pub max_iterations: u32,
    pub elapsed: Duration,
}

#[derive(Debug)]
pub enum FrameOutcome {
    /// All tiles were colored and written to the surface.
    Composited(FrameStats),
    /// A tile failed; the surface was not touched.
    Aborted(RenderError),
    /// The output size changed while the frame was running; its results
    /// were discarded and a fresh frame scheduled.
    Superseded,
}

#[derive(Debug)]
pub struct FrameReport {
    pub frame: u64,
    pub view: ViewState,
    pub outcome: FrameOutcome,
}

impl FrameReport {
    pub fn is_composited(&self) -> bool {
        matches!(self.outcome, FrameOutcome::Composited(_))
    }
}

// ---------------------------------------------------------------------------
// In-flight frame
// ---------------------------------------------------------------------------

struct InFlight {
    frame: u64,
    view: ViewState,
    size: (u32, u32),
    started: Instant,
    pending: Vec<TaskFuture>,
    results: Vec<WorkResult>,
}

impl InFlight {
    /// Collect finished tiles.
    ///
    /// Returns `None` while tiles are outstanding, `Some(Ok(()))` once all
    /// have arrived, and the first error as soon as one is seen. Tiles may
    /// finish in any order; each result is checked against the submission
    /// it answers.
    fn gather(&mut self, blocking: bool) -> Option<Result<(), RenderError>> {
        let mut still_pending = Vec::new();
        for fut in std::mem::take(&mut self.pending) {
            let tile = fut.tile();
            let outcome = if blocking {
                fut.wait()
            } else {
                match fut.try_wait() {
                    Some(outcome) => outcome,
                    None => {
                        still_pending.push(fut);
                        continue;
                    }
                }
            };
            match outcome.and_then(|result| self.check(tile, result)) {
                Ok(result) => self.results.push(result),
                Err(e) => return Some(Err(e)),
            }
        }
        self.pending = still_pending;
        self.pending.is_empty().then_some(Ok(()))
    }

    fn check(&self, tile: Tile, result: WorkResult) -> Result<WorkResult, RenderError> {
        let reason = if result.frame != self.frame {
            Some(format!("tagged for frame {}", result.frame))
        } else if result.tile != tile {
            Some(format!("answers tile {:?}", result.tile))
        } else if result.pixels.len() != tile.pixel_count() {
            Some(format!(
                "{} pixels for a {}-pixel tile",
                result.pixels.len(),
                tile.pixel_count()
            ))
        } else if result.min_iterations > result.max_iterations
            || result.max_iterations > self.view.max_iterations
        {
            Some(format!(
                "bounds {}..={} outside cap {}",
                result.min_iterations, result.max_iterations, self.view.max_iterations
            ))
        } else {
            None
        };

        match reason {
            None => Ok(result),
            Some(reason) => Err(RenderError::MalformedResult {
                frame: self.frame,
                tile,
                reason,
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Renders frames through a [`WorkerPool`] and composites them onto a
/// [`Surface`].
///
/// At most one frame runs at a time. Requests that arrive while a frame is
/// running are coalesced into a single follow-up that renders whatever view
/// is current when the running frame ends.
pub struct RenderPipeline {
    pool: WorkerPool,
    rows: u32,
    cols: u32,
    width: u32,
    height: u32,
    tiles: Vec<Tile>,
    color_table: ColorTable,
    next_frame: u64,
    in_flight: Option<InFlight>,
    refresh_pending: bool,
}

impl RenderPipeline {
    pub fn new(pool: WorkerPool, rows: u32, cols: u32, width: u32, height: u32) -> crate::Result<Self> {
        let tiles = tile_grid(width, height, rows, cols)?;
        debug!(tiles = tiles.len(), width, height, "Tiling computed");
        Ok(Self {
            pool,
            rows,
            cols,
            width,
            height,
            tiles,
            color_table: ColorTable::new(),
            next_frame: 1,
            in_flight: None,
            refresh_pending: false,
        })
    }

    /// Build a pipeline with its own escape-time pool.
    pub fn from_config(config: &RenderConfig, width: u32, height: u32) -> crate::Result<Self> {
        Self::new(
            WorkerPool::new(config.workers),
            config.rows,
            config.cols,
            width,
            height,
        )
    }

    pub fn phase(&self) -> RenderPhase {
        match (&self.in_flight, self.refresh_pending) {
            (None, _) => RenderPhase::Idle,
            (Some(_), false) => RenderPhase::Running,
            (Some(_), true) => RenderPhase::RunningWithPendingRefresh,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.in_flight.is_none()
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Recompute the tiling for a new output size.
    ///
    /// A frame already running for the old size will be discarded when it
    /// completes and replaced by a fresh one.
    pub fn resize(&mut self, width: u32, height: u32) -> crate::Result<()> {
        if (width, height) == (self.width, self.height) {
            return Ok(());
        }
        self.tiles = tile_grid(width, height, self.rows, self.cols)?;
        self.width = width;
        self.height = height;
        debug!(tiles = self.tiles.len(), width, height, "Tiling recomputed");
        if self.in_flight.is_some() {
            self.refresh_pending = true;
        }
        Ok(())
    }

    /// Request a frame for `view`.
    pub fn render(&mut self, view: &ViewState) -> RenderRequest {
        if self.in_flight.is_some() {
            if !self.refresh_pending {
                debug!("Frame in flight; coalescing render request");
            }
            self.refresh_pending = true;
            return RenderRequest::Coalesced;
        }
        RenderRequest::Started {
            frame: self.dispatch(view),
        }
    }

    /// Advance without blocking. `current` is the view used if a follow-up
    /// frame has to start.
    pub fn poll<S: Surface>(&mut self, surface: &mut S, current: &ViewState) -> Vec<FrameReport> {
        self.advance(surface, current, false)
    }

    /// Block until the pipeline is idle, including any follow-up frame.
    pub fn wait<S: Surface>(&mut self, surface: &mut S, current: &ViewState) -> Vec<FrameReport> {
        self.advance(surface, current, true)
    }

    /// Stop the workers and forget the running frame.
    pub fn dispose(&mut self) {
        self.pool.dispose();
        self.in_flight = None;
        self.refresh_pending = false;
    }

    fn dispatch(&mut self, view: &ViewState) -> u64 {
        let frame = self.next_frame;
        self.next_frame += 1;

        let pending: Vec<TaskFuture> = self
            .tiles
            .iter()
            .map(|&tile| {
                self.pool.submit(WorkItem {
                    frame,
                    tile,
                    origin: view.pixel_to_complex(tile.x as f64, tile.y as f64, self.width, self.height),
                    step: view.scale,
                    max_iterations: view.max_iterations,
                })
            })
            .collect();

        debug!(
            frame,
            tiles = pending.len(),
            scale = view.scale,
            max_iter = view.max_iterations,
            "Dispatching frame"
        );

        self.in_flight = Some(InFlight {
            frame,
            view: *view,
            size: (self.width, self.height),
            started: Instant::now(),
            results: Vec::with_capacity(pending.len()),
            pending,
        });
        frame
    }

    fn advance<S: Surface>(
        &mut self,
        surface: &mut S,
        current: &ViewState,
        blocking: bool,
    ) -> Vec<FrameReport> {
        let mut reports = Vec::new();
        loop {
            let gathered = match self.in_flight.as_mut() {
                Some(frame) => frame.gather(blocking),
                None => break,
            };
            let Some(gathered) = gathered else {
                break;
            };
            let Some(frame) = self.in_flight.take() else {
                break;
            };
            reports.push(self.finish(frame, gathered, surface));

            if self.refresh_pending {
                self.refresh_pending = false;
                self.dispatch(current);
            }
        }
        reports
    }

    fn finish<S: Surface>(
        &mut self,
        frame: InFlight,
        gathered: Result<(), RenderError>,
        surface: &mut S,
    ) -> FrameReport {
        let InFlight {
            frame: id,
            view,
            size,
            started,
            mut results,
            ..
        } = frame;

        if let Err(e) = gathered {
            error!(frame = id, tile = ?e.tile(), "Frame aborted: {e}");
            return FrameReport {
                frame: id,
                view,
                outcome: FrameOutcome::Aborted(e),
            };
        }

        if size != (self.width, self.height) {
            debug!(frame = id, ?size, "Discarding frame rendered for a stale size");
            self.refresh_pending = true;
            return FrameReport {
                frame: id,
                view,
                outcome: FrameOutcome::Superseded,
            };
        }

        if surface.size() != size {
            let e = RenderError::SurfaceMismatch {
                expected: size,
                actual: surface.size(),
            };
            error!(frame = id, "Frame aborted: {e}");
            return FrameReport {
                frame: id,
                view,
                outcome: FrameOutcome::Aborted(e),
            };
        }

        // Coloring: one table for the whole frame.
        let min = results.iter().map(|r| r.min_iterations).min().unwrap_or(0);
        let max = results.iter().map(|r| r.max_iterations).max().unwrap_or(0);
        self.color_table.rebuild(min, max, view.max_iterations);
        let table = &self.color_table;
        results
            .par_iter_mut()
            .for_each(|r| table.apply(&mut r.pixels));

        // Compositing.
        for r in &results {
            surface.put_pixels(r.tile, &r.pixels);
        }

        let elapsed = started.elapsed();
        info!(
            frame = id,
            tiles = results.len(),
            min,
            max,
            elapsed_ms = elapsed.as_millis(),
            "Frame composited"
        );

        FrameReport {
            frame: id,
            view,
            outcome: FrameOutcome::Composited(FrameStats {
                tiles: results.len(),
                min_iterations: min,
                max_iterations: max,
                elapsed,
            }),
        }
    }
}
