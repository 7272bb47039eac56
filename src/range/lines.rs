// src/range/lines.rs

//! Contour lines drawn on a remapped channel.
//!
//! `count` thresholds split the output range evenly. A sample whose left
//! and right neighbours, or whose upper and lower neighbours, straddle a
//! threshold is on an edge; every other sample is surface. Neighbours are
//! clamped to the channel, and all tests read the channel before drawing.

use super::{Channel, FULL_SCALE};
use crate::error::{Error, Result};
use log::debug;
use serde::{Deserialize, Serialize};

/// Most lines one channel may carry.
pub const MAX_LINES: u16 = 0x3fff;

/// What an edge or surface sample becomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fill {
    Zero,
    Full,
    Original,
    Inverted,
}

impl Fill {
    #[inline]
    pub fn apply(self, v: u16) -> u16 {
        match self {
            Fill::Zero => 0,
            Fill::Full => FULL_SCALE,
            Fill::Original => v,
            Fill::Inverted => FULL_SCALE - v,
        }
    }
}

impl TryFrom<u8> for Fill {
    type Error = Error;

    /// Numeric modes 0-3: zero, full, original, inverted.
    fn try_from(mode: u8) -> Result<Self> {
        match mode {
            0 => Ok(Fill::Zero),
            1 => Ok(Fill::Full),
            2 => Ok(Fill::Original),
            3 => Ok(Fill::Inverted),
            _ => Err(Error::InvalidParameter(format!(
                "fill mode must be from [0, 1, 2, 3], got {}",
                mode
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContourLines {
    /// Number of thresholds, 1..=MAX_LINES.
    pub count: u16,
    pub edge: Fill,
    pub surface: Fill,
}

impl Default for ContourLines {
    fn default() -> Self {
        ContourLines {
            count: 8,
            edge: Fill::Full,
            surface: Fill::Zero,
        }
    }
}

fn crosses(a: u16, b: u16, t: u16) -> bool {
    (a < t && b >= t) || (a > t && b <= t)
}

impl ContourLines {
    pub fn validate(&self) -> Result<()> {
        if self.count == 0 || self.count > MAX_LINES {
            return Err(Error::InvalidParameter(format!(
                "contour line count must be from 0001-3FFF range, got {}",
                self.count
            )));
        }
        Ok(())
    }

    /// `t * FULL_SCALE / (count + 1)` for `t` in `1..=count`.
    pub fn thresholds(&self) -> Vec<u16> {
        let parts = self.count as u32 + 1;
        (1..parts)
            .map(|t| (t * FULL_SCALE as u32 / parts) as u16)
            .collect()
    }

    pub fn draw(&self, channel: &Channel) -> Result<Channel> {
        self.validate()?;
        let thresholds = self.thresholds();
        let (width, height) = (channel.width(), channel.height());
        let mut samples = Vec::with_capacity(width * height);
        let mut edges = 0usize;
        for i in 0..width {
            let (i1, i2) = (i.saturating_sub(1), (i + 1).min(width - 1));
            for j in 0..height {
                let (j1, j2) = (j.saturating_sub(1), (j + 1).min(height - 1));
                let (di1, di2) = (channel.get(i1, j), channel.get(i2, j));
                let (dj1, dj2) = (channel.get(i, j1), channel.get(i, j2));
                let edge = thresholds
                    .iter()
                    .any(|&t| crosses(di1, di2, t) || crosses(dj1, dj2, t));
                let v = channel.get(i, j);
                samples.push(if edge {
                    edges += 1;
                    self.edge.apply(v)
                } else {
                    self.surface.apply(v)
                });
            }
        }
        debug!(
            "{} contour lines: {} of {} samples on edges",
            self.count,
            edges,
            width * height
        );
        Channel::new(width, height, samples)
    }
}
