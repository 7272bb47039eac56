// src/range/channel.rs

//! 16-bit channels cut from a [`Field`] and pushed through a [`RangeMap`].

use super::{quantize, Bounds, ClipSpec, Histogram, RangeMap};
use crate::error::{Error, Result};
use crate::grid::{Field, Part};
use log::debug;

/// `width` x `height` samples in the 16-bit bucket space, column-major like
/// [`Field`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    width: usize,
    height: usize,
    samples: Vec<u16>,
}

impl Channel {
    pub fn new(width: usize, height: usize, samples: Vec<u16>) -> Result<Self> {
        if width == 0 || height == 0 || samples.len() != width * height {
            return Err(Error::InvalidParameter(format!(
                "channel shape mismatch: {} samples for {}x{}",
                samples.len(),
                width,
                height
            )));
        }
        Ok(Channel {
            width,
            height,
            samples,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn get(&self, column: usize, row: usize) -> u16 {
        self.samples[column * self.height + row]
    }

    pub fn column(&self, column: usize) -> &[u16] {
        &self.samples[column * self.height..(column + 1) * self.height]
    }

    pub fn samples(&self) -> &[u16] {
        &self.samples
    }

    pub fn histogram(&self) -> Histogram {
        Histogram::from_samples(self.samples.iter().copied())
    }

    /// Applies `map` to every sample.
    pub fn remapped(&self, map: &RangeMap) -> Channel {
        Channel {
            width: self.width,
            height: self.height,
            samples: self.samples.iter().map(|&v| map.remap(v)).collect(),
        }
    }
}

/// Quantizes one part of every sample over that part's range in the field.
pub fn quantize_field(field: &Field, part: Part) -> Channel {
    let extrema = field.extrema();
    let (min, max) = (extrema.min(part), extrema.max(part));
    Channel {
        width: field.width(),
        height: field.height(),
        samples: field
            .values()
            .iter()
            .map(|&z| quantize(part.of(z), min, max))
            .collect(),
    }
}

/// Clips and stretches `raw` per `clip`. A hint wins over the histogram;
/// the histogram is only built when the bounds are not absolute.
pub fn map_channel(raw: &Channel, clip: &ClipSpec, hint: Option<Bounds>) -> Result<Channel> {
    clip.validate()?;
    let histogram = (hint.is_none() && !clip.is_absolute()).then(|| raw.histogram());
    let map = clip.range_map(histogram.as_ref(), hint)?;
    Ok(raw.remapped(&map))
}

/// [`quantize_field`] followed by [`map_channel`].
pub fn map_field(field: &Field, part: Part, clip: &ClipSpec, hint: Option<Bounds>) -> Result<Channel> {
    let raw = quantize_field(field, part);
    debug!(
        "Mapping {:?} part of {}x{} field",
        part,
        raw.width(),
        raw.height()
    );
    map_channel(&raw, clip, hint)
}
