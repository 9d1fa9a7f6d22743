//! GC-content metrics: single substrings and a sliding-window profile.
//!
//! Values are percentages in `0.0..=100.0`. Every character counts towards the
//! denominator, so ambiguity codes dilute the GC percentage rather than being
//! skipped.

use serde::Serialize;

/// Default sliding-window length for [`gc_window_series`].
pub const DEFAULT_WINDOW: usize = 20;

/// Percentage of `G`/`C` (either case) in `seq`.
///
/// An empty slice returns `0.0`.
///
/// # Examples
/// ```
/// assert_eq!(taqpick::gc::gc_fraction("GCGC"), 100.0);
/// assert_eq!(taqpick::gc::gc_fraction("acgt"), 50.0);
/// assert_eq!(taqpick::gc::gc_fraction(""), 0.0);
/// ```
#[inline]
pub fn gc_fraction(seq: &str) -> f64 {
    gc_fraction_bytes(seq.as_bytes())
}

#[inline]
fn gc_fraction_bytes(seq: &[u8]) -> f64 {
    if seq.is_empty() {
        return 0.0;
    }
    let gc = seq
        .iter()
        .filter(|&&c| matches!(c, b'G' | b'C' | b'g' | b'c'))
        .count();
    100.0 * gc as f64 / seq.len() as f64
}

/// Per-window GC percentages across a whole sequence.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct GcSeries {
    window: usize,
    values: Vec<f64>,
}

impl GcSeries {
    #[inline(always)]
    pub fn window(&self) -> usize { self.window }

    /// One value per window start position, in order.
    #[inline(always)]
    pub fn values(&self) -> &[f64] { &self.values }

    pub fn len(&self) -> usize { self.values.len() }

    pub fn is_empty(&self) -> bool { self.values.is_empty() }

    pub fn min(&self) -> Option<f64> { self.values.iter().copied().reduce(f64::min) }

    pub fn max(&self) -> Option<f64> { self.values.iter().copied().reduce(f64::max) }

    pub fn mean(&self) -> Option<f64> {
        if self.values.is_empty() { return None; }
        Some(self.values.iter().sum::<f64>() / self.values.len() as f64)
    }
}

/// GC percentage of every `window`-long substring, start positions `0..=len-window`.
///
/// Shorter sequences (and `window == 0`) give an empty series.
///
/// # Examples
/// ```
/// use taqpick::gc::gc_window_series;
/// assert_eq!(gc_window_series("GGAA", 2).values(), &[100.0, 50.0, 0.0]);
/// assert!(gc_window_series("ACG", 20).is_empty());
/// ```
pub fn gc_window_series(seq: &str, window: usize) -> GcSeries {
    let bytes = seq.as_bytes();
    let values = if window == 0 || bytes.len() < window {
        Vec::new()
    } else {
        bytes.windows(window).map(gc_fraction_bytes).collect()
    };
    GcSeries { window, values }
}
