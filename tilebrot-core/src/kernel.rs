use std::sync::Arc;

use crate::complex::Complex;
use crate::work::{WorkItem, WorkResult};

/// Squared bailout radius: an orbit has escaped once `|z|² > 4`.
pub const ESCAPE_RADIUS_SQ: f64 = 4.0;

/// Computes a [`WorkResult`] for a [`WorkItem`].
///
/// This is the seam the worker pool runs on its threads. Implementations
/// must only touch their own output buffer so they can run on any worker
/// without synchronization.
pub trait TileKernel: Send + Sync + 'static {
    fn compute(&self, item: &WorkItem) -> crate::Result<WorkResult>;
}

impl<K: TileKernel + ?Sized> TileKernel for Arc<K> {
    fn compute(&self, item: &WorkItem) -> crate::Result<WorkResult> {
        (**self).compute(item)
    }
}

/// The escape-time Mandelbrot kernel.
#[derive(Debug, Clone, Copy, Default)]
pub struct EscapeTime;

impl TileKernel for EscapeTime {
    fn compute(&self, item: &WorkItem) -> crate::Result<WorkResult> {
        compute_tile(item)
    }
}

/// Returns `true` if `c` lies inside the main cardioid.
#[inline]
fn in_cardioid(re: f64, im: f64) -> bool {
    let im2 = im * im;
    let q = (re - 0.25) * (re - 0.25) + im2;
    q * (q + (re - 0.25)) <= 0.25 * im2
}

/// Returns `true` if `c` lies inside the period-2 bulb.
#[inline]
fn in_period2_bulb(re: f64, im: f64) -> bool {
    (re + 1.0) * (re + 1.0) + im * im <= 0.0625
}

/// Escape count of `c` under `z ← z² + c`, capped at `max_iterations`.
///
/// The orbit starts at `z₁ = c`; the count is the number of further steps
/// taken before `|z|² > 4`. Points that never escape return the cap.
#[inline]
pub fn escape_time(c: Complex, max_iterations: u32) -> u32 {
    // Closed-form interior checks skip the full cap for the two largest
    // components of the set.
    if in_cardioid(c.re, c.im) || in_period2_bulb(c.re, c.im) {
        return max_iterations;
    }

    let mut z = c;
    for n in 0..max_iterations {
        if z.norm_sq() > ESCAPE_RADIUS_SQ {
            return n;
        }
        z = z.square_add(c);
    }
    max_iterations
}

/// Compute escape counts for every pixel of a tile.
///
/// Pixel `(col, row)` maps to `origin + (col, row) × step`. Fails fast on a
/// malformed item without computing anything.
pub fn compute_tile(item: &WorkItem) -> crate::Result<WorkResult> {
    item.validate()?;

    let tile = item.tile;
    let cap = item.max_iterations;
    let mut pixels = Vec::with_capacity(tile.pixel_count());
    let mut min = cap;
    let mut max = 0;

    for row in 0..tile.height {
        let im = item.origin.im + row as f64 * item.step;
        for col in 0..tile.width {
            let re = item.origin.re + col as f64 * item.step;
            let n = escape_time(Complex::new(re, im), cap);
            min = min.min(n);
            max = max.max(n);
            pixels.push(n);
        }
    }

    Ok(WorkResult {
        frame: item.frame,
        tile,
        pixels,
        min_iterations: min,
        max_iterations: max,
    })
}
