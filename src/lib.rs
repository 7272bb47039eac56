// src/lib.rs

//! Formula evaluation over grids of complex numbers.
//!
//! A user formula is compiled once into a [`Formula`], evaluated in parallel
//! over every sample of a grid by [`run_grid`], and the resulting [`Field`]
//! is turned into pixels either through histogram-based range mapping
//! ([`range`]) or through level-set detection and compositing ([`contour`]).

pub mod color;
pub mod config;
pub mod contour;
pub mod error;
pub mod expr;
pub mod grid;
pub mod native;
pub mod range;

pub use color::Rgba;
pub use config::Config;
pub use error::{Error, Result};
pub use expr::{Context, Formula, Mode};
pub use grid::{evaluate_plane, run_grid, Field, Part, Parts, Plane};
pub use native::{Builtins, FunctionProvider, Layered, NativeLibrary};
