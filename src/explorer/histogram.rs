//! "Nice" histogram binning.
//!
//! Bin boundaries snap to 1, 2 or 5 times a power of ten, with at most
//! [`MAX_BINS`] bins. Values are assigned to half-open bins `[start, end)`,
//! except that the maximum always lands in the last bin.

use serde::Serialize;

pub const MAX_BINS: usize = 10;
const BASE: f64 = 10.0;
const DIVIDE: [f64; 2] = [5.0, 2.0];
const EPSILON: f64 = 1e-14;

/// Bin layout covering `[start, stop]` in increments of `step`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BinSpec {
    pub start: f64,
    pub stop: f64,
    pub step: f64,
}

impl BinSpec {
    /// Choose nice bins for the extent `[min, max]`.
    ///
    /// Returns `None` when the extent is not finite or its width overflows.
    /// Extents too narrow for a normal step collapse to a single bin.
    pub fn nice(min: f64, max: f64, max_bins: usize) -> Option<Self> {
        if !min.is_finite() || !max.is_finite() {
            return None;
        }
        let max_bins = max_bins.max(1) as f64;
        let log_base = BASE.ln();
        let span = match max - min {
            s if s != 0.0 => s,
            _ if min != 0.0 => min.abs(),
            _ => 1.0,
        };
        if !span.is_finite() {
            return None;
        }

        let level = (max_bins.ln() / log_base).ceil();
        let mut step = BASE.powf((span.ln() / log_base).round() - level);
        if !step.is_normal() {
            return Some(Self::single(min, span));
        }
        while (span / step).ceil() > max_bins {
            step *= BASE;
        }
        if !step.is_normal() {
            return Some(Self::single(min, span));
        }
        for div in DIVIDE {
            let candidate = step / div;
            if span / candidate <= max_bins {
                step = candidate;
            }
        }

        let v = step.ln();
        let precision = if v >= 0.0 {
            0.0
        } else {
            (-v / log_base).trunc() + 1.0
        };
        let eps = BASE.powf(-precision - 1.0);

        let snapped = (min / step + eps).floor() * step;
        let start = if min < snapped { snapped - step } else { snapped };
        let stop = (max / step).ceil() * step;
        let stop = if stop == start { start + step } else { stop };
        if !start.is_finite() || !stop.is_finite() {
            return Some(Self::single(min, span));
        }

        Some(Self { start, stop, step })
    }

    fn single(min: f64, span: f64) -> Self {
        Self {
            start: min,
            stop: min + span,
            step: span,
        }
    }

    pub fn bin_count(&self) -> usize {
        (((self.stop - self.start) / self.step).round() as usize).max(1)
    }

    /// Index of the bin holding `value`. Out-of-range values are clamped.
    pub fn index_of(&self, value: f64) -> usize {
        let v = value.min(self.stop - self.step).max(self.start);
        let idx = (EPSILON + (v - self.start) / self.step).floor() as usize;
        idx.min(self.bin_count() - 1)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramBin {
    pub start: f64,
    pub end: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Histogram {
    pub column: String,
    pub step: f64,
    pub bins: Vec<HistogramBin>,
}

impl Histogram {
    /// Bin `values`. Returns `None` when there is nothing to plot or the
    /// values span more than an `f64` can hold.
    pub fn build(column: impl Into<String>, values: &[f64]) -> Option<Self> {
        let (min, max) = values
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(None, |acc: Option<(f64, f64)>, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })?;

        let spec = BinSpec::nice(min, max, MAX_BINS)?;
        let mut counts = vec![0usize; spec.bin_count()];
        for v in values.iter().copied().filter(|v| v.is_finite()) {
            counts[spec.index_of(v)] += 1;
        }

        let bins = counts
            .into_iter()
            .enumerate()
            .map(|(i, count)| HistogramBin {
                start: spec.start + spec.step * i as f64,
                end: spec.start + spec.step * (i + 1) as f64,
                count,
            })
            .collect();

        Some(Self {
            column: column.into(),
            step: spec.step,
            bins,
        })
    }

    pub fn total(&self) -> usize {
        self.bins.iter().map(|b| b.count).sum()
    }
}
