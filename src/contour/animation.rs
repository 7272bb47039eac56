// src/contour/animation.rs

//! User-defined contour sets that drift from frame to frame.
//!
//! An animation is written as `n;item;item;...` where each item is
//! `src,part,v,R:G:B:A,vinc,ri:gi:bi:ai`:
//! - `src` is `fz` for the function values or `z` for the coordinate plane,
//! - `part` is `r`, `i` or `m`,
//! - frame `f` draws the level `v + f * vinc` in color `RGBA + f * inc`,
//!   each channel saturating at 0 and 255.

use super::HitGrid;
use crate::color::Rgba;
use crate::error::{Error, Result};
use crate::grid::{Field, Part};
use log::debug;
use std::str::FromStr;

/// Which field an animated contour is traced on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Function,
    Plane,
}

/// One animated contour.
#[derive(Debug, Clone, PartialEq)]
pub struct ContourSpec {
    pub source: Source,
    pub part: Part,
    pub value: f64,
    pub color: Rgba,
    pub value_step: f64,
    pub color_step: [f64; 4],
}

impl ContourSpec {
    /// Level and color drawn at `frame`.
    pub fn at_frame(&self, frame: usize) -> (f64, Rgba) {
        let f = frame as f64;
        (
            self.value + f * self.value_step,
            self.color.stepped(self.color_step, f),
        )
    }
}

fn invalid(item: &str, message: String) -> Error {
    Error::InvalidParameter(format!("contour '{}': {}", item, message))
}

impl FromStr for ContourSpec {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let item = s.trim();
        let fields: Vec<&str> = item.split(',').map(str::trim).collect();
        if fields.len() != 6 {
            return Err(invalid(
                item,
                format!("must have 6 ',' values: fz,r,v,col,vinc,cinc, got {}", fields.len()),
            ));
        }
        let source = match fields[0] {
            "fz" => Source::Function,
            "z" => Source::Plane,
            other => return Err(invalid(item, format!("'{}' must be 'z' or 'fz'", other))),
        };
        let part = match fields[1] {
            "r" => Part::Real,
            "i" => Part::Imag,
            "m" => Part::Modulus,
            other => return Err(invalid(item, format!("'{}' must be 'r', 'i' or 'm'", other))),
        };
        let number = |text: &str, what: &str| {
            text.parse::<f64>()
                .map_err(|e| invalid(item, format!("{} '{}': {}", what, text, e)))
        };
        let value = number(fields[2], "value")?;
        let color = fields[3].parse::<Rgba>().map_err(|e| invalid(item, e))?;
        let value_step = number(fields[4], "value increment")?;
        let steps: Vec<&str> = fields[5].split(':').map(str::trim).collect();
        if steps.len() != 4 {
            return Err(invalid(
                item,
                format!("color increment '{}' must be 4 float values ':' separated", fields[5]),
            ));
        }
        let mut color_step = [0.0; 4];
        for (slot, text) in color_step.iter_mut().zip(&steps) {
            *slot = number(text, "color increment")?;
        }
        Ok(ContourSpec {
            source,
            part,
            value,
            color,
            value_step,
            color_step,
        })
    }
}

/// A frame count and the contours drawn on every frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Animation {
    frames: usize,
    contours: Vec<ContourSpec>,
}

impl Animation {
    pub fn new(frames: usize, contours: Vec<ContourSpec>) -> Result<Self> {
        if frames == 0 || contours.is_empty() {
            return Err(Error::InvalidParameter(
                "animation needs at least one frame and one contour".to_string(),
            ));
        }
        Ok(Animation { frames, contours })
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn contours(&self) -> &[ContourSpec] {
        &self.contours
    }

    /// Hits of every contour at `frame`, in definition order.
    pub fn render_frame(&self, frame: usize, function: &Field, plane: &Field) -> Result<HitGrid> {
        let mut grid = HitGrid::new(function.width(), function.height());
        for contour in &self.contours {
            let (level, color) = contour.at_frame(frame);
            let field = match contour.source {
                Source::Function => function,
                Source::Plane => plane,
            };
            grid.record_crossings(field, contour.part, level, color)?;
        }
        debug!(
            "Frame {}/{}: {} hits",
            frame + 1,
            self.frames,
            grid.total_hits()
        );
        Ok(grid)
    }
}

impl FromStr for Animation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let items: Vec<&str> = s.trim().split(';').collect();
        if items.len() < 2 {
            return Err(Error::InvalidParameter(format!(
                "required at least two elements separated by ';': {}",
                s
            )));
        }
        let frames = items[0].trim().parse::<usize>().map_err(|e| {
            Error::InvalidParameter(format!("frame count '{}': {}", items[0].trim(), e))
        })?;
        let contours = items[1..]
            .iter()
            .map(|item| item.parse::<ContourSpec>())
            .collect::<Result<Vec<_>>>()?;
        Animation::new(frames, contours)
    }
}
