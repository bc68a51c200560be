//! Per-frame mapping from escape counts to packed pixels.
//!
//! Pixels are packed little-endian RGBA in a `u32`, so `to_le_bytes()`
//! yields `[r, g, b, a]`. The log-scaled weight lives in the most
//! significant (alpha) byte over a black base.

/// Fill used when every pixel of a frame hit the iteration cap.
pub const NEVER_ESCAPED_COLOR: u32 = 0xff2f_fbe0;

/// Fill used when every pixel of a frame escaped after the same count.
pub const BACKGROUND_COLOR: u32 = 0x0000_0000;

/// Weight in `0..=255` for escape count `n` within a frame spanning
/// `min..=max` (`min < max`).
///
/// Logarithmic so that low counts, where most pixels of a frame sit, get
/// more distinct bands than a linear ramp would give them.
#[inline]
pub fn log_weight(n: u32, min: u32, max: u32) -> u8 {
    debug_assert!(min < max);
    let n = n.clamp(min, max);
    let span = (1.0 + (max - min) as f64).ln();
    let t = (1.0 + (n - min) as f64).ln() / span;
    (t * 255.0).ceil().clamp(0.0, 255.0) as u8
}

/// Lookup table from escape count to packed color, one entry per count in
/// `0..=max_iterations`.
///
/// The table is kept between frames and only reallocated when the
/// iteration cap changes.
#[derive(Debug, Clone, Default)]
pub struct ColorTable {
    entries: Vec<u32>,
}

impl ColorTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild for a frame whose counts span `min..=max` under `max_iterations`.
    pub fn rebuild(&mut self, min: u32, max: u32, max_iterations: u32) {
        let len = max_iterations as usize + 1;
        if self.entries.len() != len {
            self.entries = vec![BACKGROUND_COLOR; len];
        }
        let max = max.min(max_iterations);
        let min = min.min(max);

        if min == max {
            self.entries[min as usize] = if min == max_iterations {
                NEVER_ESCAPED_COLOR
            } else {
                BACKGROUND_COLOR
            };
            return;
        }

        for n in min..=max {
            self.entries[n as usize] = (log_weight(n, min, max) as u32) << 24;
        }
    }

    /// Color for escape count `n`.
    #[inline]
    pub fn get(&self, n: u32) -> u32 {
        self.entries
            .get(n as usize)
            .copied()
            .unwrap_or(BACKGROUND_COLOR)
    }

    /// Replace every escape count in `pixels` with its color.
    pub fn apply(&self, pixels: &mut [u32]) {
        for p in pixels.iter_mut() {
            *p = self.get(*p);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weight_spans_full_range() {
        assert_eq!(log_weight(5, 5, 100), 0);
        assert_eq!(log_weight(100, 5, 100), 255);
    }

    #[test]
    fn weight_is_monotonic_and_log_shaped() {
        let (min, max) = (0, 1000);
        let weights: Vec<u8> = (min..=max).map(|n| log_weight(n, min, max)).collect();
        assert!(weights.windows(2).all(|w| w[0] <= w[1]));
        // A linear ramp would put count 100 at ~26; log scaling lifts it well above.
        assert!(weights[100] > 150, "got {}", weights[100]);
    }

    #[test]
    fn table_sized_to_cap_and_reallocated_on_change() {
        let mut table = ColorTable::new();
        assert!(table.is_empty());
        table.rebuild(0, 10, 10);
        assert_eq!(table.len(), 11);
        table.rebuild(3, 40, 50);
        assert_eq!(table.len(), 51);
    }

    #[test]
    fn weight_goes_in_high_byte() {
        let mut table = ColorTable::new();
        table.rebuild(2, 9, 20);
        assert_eq!(table.get(2), 0);
        assert_eq!(table.get(9), 0xff00_0000);
        let mid = table.get(5);
        assert_eq!(mid & 0x00ff_ffff, 0);
        assert!(mid > 0 && mid < 0xff00_0000);
        assert_eq!(table.get(9).to_le_bytes(), [0, 0, 0, 255]);
    }

    #[test]
    fn uniform_frame_inside_set_uses_never_escaped_color() {
        let mut table = ColorTable::new();
        table.rebuild(64, 64, 64);
        assert_eq!(table.get(64), NEVER_ESCAPED_COLOR);
    }

    #[test]
    fn uniform_frame_outside_set_uses_background() {
        let mut table = ColorTable::new();
        table.rebuild(0, 10, 64);
        table.rebuild(3, 3, 64);
        assert_eq!(table.get(3), BACKGROUND_COLOR);
    }

    #[test]
    fn apply_recolors_in_place() {
        let mut table = ColorTable::new();
        table.rebuild(0, 4, 4);
        let mut pixels = vec![0, 4, 2, 4, 0];
        table.apply(&mut pixels);
        assert_eq!(pixels[0], 0);
        assert_eq!(pixels[1], 0xff00_0000);
        assert_eq!(pixels[1], pixels[3]);
        assert_eq!(pixels[2], table.get(2));
    }

    #[test]
    fn out_of_range_count_maps_to_background() {
        let mut table = ColorTable::new();
        table.rebuild(0, 4, 4);
        assert_eq!(table.get(99), BACKGROUND_COLOR);
    }
}
