// src/range/mod.rs

//! Histogram-based percentile clipping and linear+gamma remapping into the
//! 16-bit output range.
//!
//! Values are bucketed as `u16`. The cumulative table holds, per bucket, the
//! percentage of samples at or below it. Clip bounds come from the
//! cumulative table, from absolute index overrides, or from a [`Hint`]
//! carried over from another run; the resulting [`RangeMap`] stretches
//! `[lo, hi]` onto `[0, FULL_SCALE]`.
//!
//! [`Remap`] chains the steps from a [`Field`] to an output channel:
//! quantize one part, clip and stretch, then optionally run a formula over
//! every sample and draw contour lines.

pub mod channel;
pub mod lines;
pub mod transform;

#[cfg(test)]
mod tests;

use crate::error::{Error, Result};
use crate::grid::{Field, Part};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Top of the output range.
pub const FULL_SCALE: u16 = 0xffff;

const BUCKETS: usize = 1 << 16;

pub use channel::{map_channel, map_field, quantize_field, Channel};
pub use lines::{ContourLines, Fill, MAX_LINES};
pub use transform::{ArgCache, ChannelFormula, MAX_CACHE_LEVEL};

/// Sample counts per 16-bit bucket.
#[derive(Clone, PartialEq, Eq)]
pub struct Histogram {
    counts: Vec<u64>,
    total: u64,
    min: u16,
    max: u16,
}

impl fmt::Debug for Histogram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Histogram")
            .field("total", &self.total)
            .field("min", &self.min)
            .field("max", &self.max)
            .finish()
    }
}

impl Default for Histogram {
    fn default() -> Self {
        Histogram {
            counts: vec![0; BUCKETS],
            total: 0,
            min: u16::MAX,
            max: 0,
        }
    }
}

impl Histogram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_samples<I: IntoIterator<Item = u16>>(samples: I) -> Self {
        let mut hist = Histogram::new();
        for s in samples {
            hist.add(s);
        }
        hist
    }

    /// Histogram of a scalar field quantized over `[min, max]`.
    pub fn from_values<I: IntoIterator<Item = f64>>(values: I, min: f64, max: f64) -> Self {
        Self::from_samples(values.into_iter().map(|v| quantize(v, min, max)))
    }

    #[inline]
    pub fn add(&mut self, sample: u16) {
        self.counts[sample as usize] += 1;
        self.total += 1;
        self.min = self.min.min(sample);
        self.max = self.max.max(sample);
    }

    pub fn count(&self, bucket: u16) -> u64 {
        self.counts[bucket as usize]
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// Lowest and highest occupied bucket, if any sample was added.
    pub fn span(&self) -> Option<(u16, u16)> {
        (self.total > 0).then_some((self.min, self.max))
    }

    /// Running percentage of samples at or below each bucket, scanning all
    /// 65536 buckets in increasing order.
    pub fn cumulative(&self) -> Cumulative {
        let mut percent = Vec::with_capacity(BUCKETS);
        let mut sum = 0u64;
        let all = self.total.max(1) as f64;
        for &count in &self.counts {
            sum += count;
            percent.push((sum as f64 * 100.0) / all);
        }
        Cumulative { percent }
    }
}

/// Nonzero buckets as `bucket => count` lines.
impl fmt::Display for Histogram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (bucket, &count) in self.counts.iter().enumerate() {
            if count > 0 {
                writeln!(f, "{} => {}", bucket, count)?;
            }
        }
        Ok(())
    }
}

/// Cumulative percentage per bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct Cumulative {
    percent: Vec<f64>,
}

impl Cumulative {
    pub fn percent(&self, bucket: u16) -> f64 {
        self.percent[bucket as usize]
    }

    /// Smallest bucket `i >= 1` whose step from `i-1` to `i` reaches
    /// `threshold`, i.e. the first bucket with cumulative percent
    /// `>= threshold`. Buckets already past the threshold at the start of
    /// the scan resolve to 1.
    pub fn straddle(&self, threshold: f64) -> Option<u16> {
        (1..BUCKETS)
            .find(|&i| self.percent[i] >= threshold)
            .map(|i| i as u16)
    }
}

/// Buckets where the percentage changes, as `bucket => pct%` lines.
impl fmt::Display for Cumulative {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut prev = -1.0;
        for (bucket, &v) in self.percent.iter().enumerate() {
            if v > 0.00001 && v < 99.99999 && (v - prev).abs() > 0.00001 {
                writeln!(f, "{} => {:.5}%", bucket, v)?;
            }
            prev = v;
        }
        Ok(())
    }
}

/// Maps `value` linearly from `[min, max]` into `0..=FULL_SCALE`.
pub fn quantize(value: f64, min: f64, max: f64) -> u16 {
    if !(max > min) || !value.is_finite() {
        return 0;
    }
    let scaled = (value - min) / (max - min) * FULL_SCALE as f64;
    scaled.clamp(0.0, FULL_SCALE as f64) as u16
}

/// Clip bounds as bucket indices. Only [`Bounds::new`] builds one, so
/// `lo < hi` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Bounds {
    lo: u16,
    hi: u16,
}

impl Bounds {
    pub fn new(lo: u16, hi: u16) -> Result<Self> {
        if lo >= hi {
            return Err(Error::EmptyRange { lo, hi });
        }
        Ok(Bounds { lo, hi })
    }

    pub fn lo(&self) -> u16 {
        self.lo
    }

    pub fn hi(&self) -> u16 {
        self.hi
    }

    /// Number of buckets the stretch spreads over, never zero.
    pub fn width(&self) -> u16 {
        self.hi - self.lo
    }
}

/// Derives clip bounds from the cumulative histogram.
///
/// `hi_percent` is the share discarded from the top, so the effective upper
/// threshold is `100 - hi_percent`.
pub fn derive_bounds(histogram: &Histogram, lo_percent: f64, hi_percent: f64) -> Result<Bounds> {
    check_percent("lo", lo_percent)?;
    check_percent("hi", hi_percent)?;
    let high = 100.0 - hi_percent;
    let cumulative = histogram.cumulative();
    let lo = cumulative.straddle(lo_percent).unwrap_or(0);
    let hi = cumulative.straddle(high).unwrap_or(0);
    debug!(
        "Percentile bounds {}% - {}% -> {:04x}-{:04x}",
        lo_percent, high, lo, hi
    );
    Bounds::new(lo, hi)
}

fn check_percent(name: &str, v: f64) -> Result<()> {
    if !(0.0..=100.0).contains(&v) {
        return Err(Error::InvalidParameter(format!(
            "{} must be from 0-100 range, got {}",
            name, v
        )));
    }
    Ok(())
}

/// Per-channel bounds carried between runs to keep a sequence of frames
/// mapped consistently.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hint {
    #[serde(rename = "LoIdx", alias = "lo_idx")]
    pub lo_idx: Vec<u16>,
    #[serde(rename = "HiIdx", alias = "hi_idx")]
    pub hi_idx: Vec<u16>,
}

impl Hint {
    /// Bounds for `channel`, if present and non-empty.
    pub fn bounds(&self, channel: usize) -> Option<Bounds> {
        let lo = *self.lo_idx.get(channel)?;
        let hi = *self.hi_idx.get(channel)?;
        Bounds::new(lo, hi).ok()
    }
}

/// How one channel's clip bounds and gamma are chosen.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClipSpec {
    /// Percent of samples discarded from the bottom.
    pub lo_percent: f64,
    /// Percent of samples discarded from the top.
    pub hi_percent: f64,
    /// Absolute low bucket, 1..=0xFFFF; overrides the percentile bound.
    pub lo_index: Option<u16>,
    /// Absolute high bucket, 0..=0xFFFE; overrides the percentile bound.
    pub hi_index: Option<u16>,
    /// Exponent applied after the linear stretch; `None` keeps it linear.
    pub gamma: Option<f64>,
}

impl Default for ClipSpec {
    fn default() -> Self {
        ClipSpec {
            lo_percent: 0.0,
            hi_percent: 0.0,
            lo_index: None,
            hi_index: None,
            gamma: None,
        }
    }
}

impl ClipSpec {
    pub fn validate(&self) -> Result<()> {
        check_percent("lo", self.lo_percent)?;
        check_percent("hi", self.hi_percent)?;
        let high = 100.0 - self.hi_percent;
        if self.lo_percent >= high {
            return Err(Error::InvalidParameter(format!(
                "invalid lo-hi range: {}% - {}%",
                self.lo_percent, high
            )));
        }
        if self.lo_index == Some(0) {
            return Err(Error::InvalidParameter(
                "lo index must be from 0001-FFFF range".to_string(),
            ));
        }
        if self.hi_index == Some(0xffff) {
            return Err(Error::InvalidParameter(
                "hi index must be from 0000-FFFE range".to_string(),
            ));
        }
        if let Some(g) = self.gamma {
            if !g.is_finite() {
                return Err(Error::InvalidParameter(format!("gamma must be finite, got {}", g)));
            }
        }
        Ok(())
    }

    /// True when both absolute indices are given, so no histogram is needed.
    pub fn is_absolute(&self) -> bool {
        self.lo_index.is_some() && self.hi_index.is_some()
    }

    /// Resolves the clip bounds. A valid `hint` wins outright; otherwise
    /// absolute indices override whichever percentile bound they replace.
    pub fn bounds(&self, histogram: Option<&Histogram>, hint: Option<Bounds>) -> Result<Bounds> {
        if let Some(hint) = hint {
            debug!("Using hint scale: {:04x}-{:04x}", hint.lo, hint.hi);
            return Ok(hint);
        }
        if let (Some(lo), Some(hi)) = (self.lo_index, self.hi_index) {
            return Bounds::new(lo, hi);
        }
        let histogram = histogram.ok_or_else(|| {
            Error::InvalidParameter("percentile bounds need a histogram".to_string())
        })?;
        check_percent("lo", self.lo_percent)?;
        check_percent("hi", self.hi_percent)?;
        let cumulative = histogram.cumulative();
        let mut lo = cumulative.straddle(self.lo_percent).unwrap_or(0);
        let mut hi = cumulative.straddle(100.0 - self.hi_percent).unwrap_or(0);
        if let Some(loi) = self.lo_index {
            if loi != lo {
                debug!("Overwriting low index: {:04x} -> {:04x}", lo, loi);
                lo = loi;
            }
        }
        if let Some(hii) = self.hi_index {
            if hii != hi {
                debug!("Overwriting high index: {:04x} -> {:04x}", hi, hii);
                hi = hii;
            }
        }
        Bounds::new(lo, hi)
    }

    /// Bounds plus gamma, ready to remap samples.
    pub fn range_map(&self, histogram: Option<&Histogram>, hint: Option<Bounds>) -> Result<RangeMap> {
        let bounds = self.bounds(histogram, hint)?;
        let map = RangeMap::new(bounds, self.gamma);
        info!(
            "idx range: {:04x}-{:04x}, multiplier: {}, gamma: {:?}",
            bounds.lo, bounds.hi, map.multiplier, self.gamma
        );
        Ok(map)
    }
}

/// Linear stretch of `[lo, hi]` onto `[0, FULL_SCALE]` with optional gamma.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeMap {
    bounds: Bounds,
    multiplier: f64,
    gamma: Option<f64>,
}

impl RangeMap {
    pub fn new(bounds: Bounds, gamma: Option<f64>) -> Self {
        RangeMap {
            bounds,
            multiplier: FULL_SCALE as f64 / bounds.width() as f64,
            gamma,
        }
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    /// Output units per input bucket.
    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    pub fn gamma(&self) -> Option<f64> {
        self.gamma
    }

    /// Remaps as a float in `[0, FULL_SCALE]`.
    pub fn remap_f64(&self, value: u16) -> f64 {
        let full = FULL_SCALE as f64;
        let shifted = (value as i64 - self.bounds.lo as i64).max(0);
        let mut v = (shifted as f64 * self.multiplier).min(full);
        if let Some(gamma) = self.gamma {
            v = ((v / full).powf(gamma) * full).clamp(0.0, full);
        }
        v
    }

    pub fn remap(&self, value: u16) -> u16 {
        self.remap_f64(value) as u16
    }
}

/// Histogram of raw 16-bit samples.
pub fn build_histogram<I: IntoIterator<Item = u16>>(values: I) -> Histogram {
    Histogram::from_samples(values)
}

/// One-off remap of `value` through `bounds` and optional `gamma`.
pub fn remap(value: u16, bounds: Bounds, gamma: Option<f64>) -> u16 {
    RangeMap::new(bounds, gamma).remap(value)
}

/// Field-to-channel pass.
#[derive(Debug, Default)]
pub struct Remap {
    pub clip: ClipSpec,
    pub formula: Option<ChannelFormula>,
    pub lines: Option<ContourLines>,
}

impl Remap {
    /// Renders `part` of `field`. `workers` bounds the formula pass.
    pub fn render(&self, field: &Field, part: Part, hint: Option<Bounds>, workers: usize) -> Result<Channel> {
        let raw = quantize_field(field, part);
        let mut out = map_channel(&raw, &self.clip, hint)?;
        if let Some(formula) = &self.formula {
            out = formula.apply(&out, &raw, workers)?;
        }
        if let Some(lines) = &self.lines {
            out = lines.draw(&out)?;
        }
        Ok(out)
    }
}
