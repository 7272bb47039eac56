// src/contour/mod.rs

//! Level-set detection over complex fields.
//!
//! A threshold level is "hit" at a cell when the chosen part of the field
//! crosses it between that cell and its predecessor along either grid axis.
//! Hits are collected per cell and per [`Part`] in a [`HitGrid`], which the
//! compositor later flattens into pixels.

pub mod animation;
pub mod composite;


use crate::color::Rgba;
use crate::error::{Error, Result};
use crate::grid::{Field, Part, Parts};
use log::debug;

pub use animation::{Animation, ContourSpec, Source};
pub use composite::{composite, Composite, Image};

/// Default distance between successive level indices.
pub const DEFAULT_INCREMENT: u8 = 0x10;

/// Top level index; levels are spread over `0..=TOP_LEVEL`.
pub const TOP_LEVEL: u16 = 0xff;

/// One threshold of a level set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Level {
    /// Position on the `0..=255` ramp; `None` for the appended maximum.
    pub index: Option<u8>,
    pub value: f64,
}

/// Thresholds evenly spaced between `min` and `max`: one every `increment`
/// steps of `(max - min) / 255`. When stepping does not land on 255 the true
/// maximum is appended so the extremum is always drawn.
pub fn levels(min: f64, max: f64, increment: u8) -> Result<Vec<Level>> {
    if increment == 0 {
        return Err(Error::InvalidParameter(
            "contour increment must be from 1-255 range".to_string(),
        ));
    }
    let step = (max - min) / TOP_LEVEL as f64;
    let mut out = Vec::with_capacity(TOP_LEVEL as usize / increment as usize + 2);
    let mut last = false;
    for k in (0..=TOP_LEVEL).step_by(increment as usize) {
        out.push(Level {
            index: Some(k as u8),
            value: min + k as f64 * step,
        });
        if k == TOP_LEVEL {
            last = true;
        }
    }
    if !last {
        out.push(Level {
            index: None,
            value: max,
        });
    }
    debug!("{} levels over [{}, {}] every {}", out.len(), min, max, increment);
    Ok(out)
}

/// True when a level `t` lies between two neighbouring samples. Equality is
/// accepted on one side only, so a flat run sitting exactly on `t` does not
/// fire.
#[inline]
pub fn crosses(prev: f64, cur: f64, t: f64) -> bool {
    (prev <= t && cur > t) || (prev >= t && cur < t)
}

/// Fixed color ramp of one part: minimum to maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ramp {
    pub part: Part,
}

impl Ramp {
    pub fn new(part: Part) -> Self {
        Ramp { part }
    }

    /// Real: red to cyan, imaginary: blue to yellow, modulus: green to pink.
    pub fn color(&self, level: &Level) -> Rgba {
        match (self.part, level.index) {
            (Part::Real, Some(k)) => Rgba::opaque(0xff - k, k, k),
            (Part::Imag, Some(k)) => Rgba::opaque(k, k, 0xff - k),
            (Part::Modulus, Some(k)) => Rgba::opaque(k, 0xff - k, k),
            (Part::Real, None) => Rgba::opaque(0, 0xff, 0xff),
            (Part::Imag, None) => Rgba::opaque(0xff, 0xff, 0),
            (Part::Modulus, None) => Rgba::opaque(0xff, 0, 0xff),
        }
    }

    /// Marker for the part being exactly zero.
    pub fn zero_color(&self) -> Rgba {
        match self.part {
            Part::Real => Rgba::opaque(0x80, 0, 0),
            Part::Imag => Rgba::opaque(0, 0, 0x80),
            Part::Modulus => Rgba::opaque(0, 0x80, 0),
        }
    }
}

#[derive(Debug, Clone, Default)]
struct Cell {
    hits: [Vec<Rgba>; 3],
    // Last pass that hit this cell.
    stamp: u32,
}

/// Colors recorded per cell and per part, in insertion order.
#[derive(Debug, Clone)]
pub struct HitGrid {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
    pass: u32,
}

impl HitGrid {
    pub fn new(width: usize, height: usize) -> Self {
        HitGrid {
            width,
            height,
            cells: vec![Cell::default(); width * height],
            pass: 0,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Hits of one part at a cell.
    pub fn hits(&self, column: usize, row: usize, part: Part) -> &[Rgba] {
        &self.cells[column * self.height + row].hits[part.index()]
    }

    /// All hits at a cell, real first, then imaginary, then modulus.
    pub fn all_hits(&self, column: usize, row: usize) -> impl Iterator<Item = &Rgba> {
        self.cells[column * self.height + row].hits.iter().flatten()
    }

    pub fn total_hits(&self) -> usize {
        self.cells
            .iter()
            .map(|c| c.hits.iter().map(Vec::len).sum::<usize>())
            .sum()
    }

    /// Records `color` at every cell where `part` of `field` crosses `level`
    /// along either axis. A cell is recorded at most once per call. Returns
    /// the number of cells hit.
    pub fn record_crossings(&mut self, field: &Field, part: Part, level: f64, color: Rgba) -> Result<usize> {
        if field.width() != self.width || field.height() != self.height {
            return Err(Error::InvalidParameter(format!(
                "field is {}x{} but hit grid is {}x{}",
                field.width(),
                field.height(),
                self.width,
                self.height
            )));
        }
        self.pass = self.pass.wrapping_add(1);
        let mut count = 0;
        for i in 0..self.width {
            for j in 1..self.height {
                if crosses(part.of(field.get(i, j - 1)), part.of(field.get(i, j)), level) {
                    count += self.mark(i, j, part, color) as usize;
                }
            }
        }
        for j in 0..self.height {
            for i in 1..self.width {
                if crosses(part.of(field.get(i - 1, j)), part.of(field.get(i, j)), level) {
                    count += self.mark(i, j, part, color) as usize;
                }
            }
        }
        Ok(count)
    }

    fn mark(&mut self, column: usize, row: usize, part: Part, color: Rgba) -> bool {
        let pass = self.pass;
        let cell = &mut self.cells[column * self.height + row];
        if cell.stamp == pass {
            return false;
        }
        cell.stamp = pass;
        cell.hits[part.index()].push(color);
        true
    }
}

/// Hits of `part` of `field` for every level, colored by `color`.
pub fn detect<F>(field: &Field, part: Part, levels: &[Level], color: F) -> Result<HitGrid>
where
    F: Fn(&Level) -> Rgba,
{
    let mut grid = HitGrid::new(field.width(), field.height());
    for level in levels {
        grid.record_crossings(field, part, level.value, color(level))?;
    }
    Ok(grid)
}

/// The standard chart of `f(z)`: level sets of the selected `parts`, their
/// zero markers, and the axes and unit circle of the coordinate plane.
pub fn chart(function: &Field, plane: &Field, increment: u8, parts: Parts) -> Result<HitGrid> {
    let mut grid = HitGrid::new(function.width(), function.height());
    let extrema = function.extrema();
    let selected = move || Part::ALL.into_iter().filter(move |&p| parts.has(p));
    for part in selected() {
        let ramp = Ramp::new(part);
        for level in levels(extrema.min(part), extrema.max(part), increment)? {
            grid.record_crossings(function, part, level.value, ramp.color(&level))?;
        }
    }
    for part in selected() {
        grid.record_crossings(function, part, 0.0, Ramp::new(part).zero_color())?;
    }
    grid.record_crossings(plane, Part::Real, 0.0, Rgba::BLACK)?;
    grid.record_crossings(plane, Part::Imag, 0.0, Rgba::BLACK)?;
    grid.record_crossings(plane, Part::Modulus, 1.0, Rgba::BLACK)?;
    debug!("Chart recorded {} hits", grid.total_hits());
    Ok(grid)
}
