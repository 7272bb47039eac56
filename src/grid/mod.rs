// src/grid/mod.rs

//! Grids of complex samples and the parallel pass that fills them.

pub mod pool;
pub mod scheduler;


use crate::error::{Error, Result};
use bitflags::bitflags;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

pub use pool::{ContextPool, Lease};
pub use scheduler::{evaluate_plane, run_grid, worker_count};

/// Which scalar of a complex sample a level set or histogram looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Part {
    Real,
    Imag,
    Modulus,
}

impl Part {
    pub const ALL: [Part; 3] = [Part::Real, Part::Imag, Part::Modulus];

    #[inline]
    pub fn of(self, z: Complex64) -> f64 {
        match self {
            Part::Real => z.re,
            Part::Imag => z.im,
            Part::Modulus => z.norm(),
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

bitflags! {
    /// A set of [`Part`]s, e.g. the level sets a chart draws.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct Parts: u8 {
        const REAL = 1 << 0;
        const IMAG = 1 << 1;
        const MODULUS = 1 << 2;
    }
}

impl Default for Parts {
    fn default() -> Self {
        Parts::all()
    }
}

impl From<Part> for Parts {
    fn from(part: Part) -> Self {
        Parts::from_bits_truncate(1 << part.index())
    }
}

impl Parts {
    pub fn has(self, part: Part) -> bool {
        self.contains(Parts::from(part))
    }
}

/// Rectangle of the complex plane sampled by a grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Plane {
    pub r0: f64,
    pub r1: f64,
    pub i0: f64,
    pub i1: f64,
}

impl Default for Plane {
    fn default() -> Self {
        Plane {
            r0: -1.0,
            r1: 1.0,
            i0: -1.0,
            i1: 1.0,
        }
    }
}

fn axis(lo: f64, hi: f64, index: usize, count: usize) -> f64 {
    if count < 2 {
        return lo;
    }
    lo + (index as f64 / (count - 1) as f64) * (hi - lo)
}

impl Plane {
    pub fn new(r0: f64, r1: f64, i0: f64, i1: f64) -> Result<Self> {
        let plane = Plane { r0, r1, i0, i1 };
        plane.validate()?;
        Ok(plane)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.r0 < self.r1) {
            return Err(Error::InvalidParameter(format!(
                "r0 must be less than r1: r0={} r1={}",
                self.r0, self.r1
            )));
        }
        if !(self.i0 < self.i1) {
            return Err(Error::InvalidParameter(format!(
                "i0 must be less than i1: i0={} i1={}",
                self.i0, self.i1
            )));
        }
        Ok(())
    }

    /// Coordinate of sample `(column, row)`; both ends of each axis are
    /// sampled. A single-sample axis sits at the lower bound.
    pub fn coordinate(&self, column: usize, row: usize, width: usize, height: usize) -> Complex64 {
        Complex64::new(
            axis(self.r0, self.r1, column, width),
            axis(self.i0, self.i1, row, height),
        )
    }

    /// The coordinate grid itself, used to draw axes and the unit circle.
    pub fn field(&self, width: usize, height: usize) -> Field {
        let mut values = Vec::with_capacity(width * height);
        let mut extrema = Extrema::default();
        for column in 0..width {
            for row in 0..height {
                let z = self.coordinate(column, row, width, height);
                extrema.observe(z);
                values.push(z);
            }
        }
        Field {
            width,
            height,
            values,
            extrema,
        }
    }
}

/// Running min/max of the real part, imaginary part and modulus.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extrema {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

impl Default for Extrema {
    fn default() -> Self {
        Extrema {
            min: [f64::MAX; 3],
            max: [-f64::MAX; 3],
        }
    }
}

impl Extrema {
    pub fn observe(&mut self, z: Complex64) {
        for part in Part::ALL {
            let v = part.of(z);
            let i = part.index();
            if v < self.min[i] {
                self.min[i] = v;
            }
            if v > self.max[i] {
                self.max[i] = v;
            }
        }
    }

    /// Combines two extrema; commutative and associative.
    pub fn merge(&mut self, other: &Extrema) {
        for i in 0..3 {
            self.min[i] = self.min[i].min(other.min[i]);
            self.max[i] = self.max[i].max(other.max[i]);
        }
    }

    pub fn min(&self, part: Part) -> f64 {
        self.min[part.index()]
    }

    pub fn max(&self, part: Part) -> f64 {
        self.max[part.index()]
    }

    /// True until at least one sample has been observed.
    pub fn is_empty(&self) -> bool {
        self.min[0] > self.max[0]
    }
}

/// `width` columns by `height` rows of complex samples, stored column-major.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    width: usize,
    height: usize,
    values: Vec<Complex64>,
    extrema: Extrema,
}

impl Field {
    /// Builds a field from whole columns.
    pub fn from_columns(width: usize, height: usize, columns: Vec<Vec<Complex64>>) -> Result<Self> {
        if columns.len() != width || columns.iter().any(|c| c.len() != height) {
            return Err(Error::InvalidParameter(format!(
                "field shape mismatch: expected {} columns of {} samples",
                width, height
            )));
        }
        let mut extrema = Extrema::default();
        let mut values = Vec::with_capacity(width * height);
        for column in columns {
            for z in column {
                extrema.observe(z);
                values.push(z);
            }
        }
        Ok(Field {
            width,
            height,
            values,
            extrema,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn get(&self, column: usize, row: usize) -> Complex64 {
        self.values[column * self.height + row]
    }

    pub fn column(&self, column: usize) -> &[Complex64] {
        &self.values[column * self.height..(column + 1) * self.height]
    }

    pub fn extrema(&self) -> &Extrema {
        &self.extrema
    }

    pub fn values(&self) -> &[Complex64] {
        &self.values
    }
}
