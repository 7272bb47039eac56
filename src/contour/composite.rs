// src/contour/composite.rs

//! Flattening per-cell hit lists into an image.

use super::HitGrid;
use crate::color::Rgba;
use serde::{Deserialize, Serialize};

/// How several hits on one cell become a pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Composite {
    /// Integer mean of every non-transparent hit.
    #[default]
    Average,
    /// First non-transparent hit, real before imaginary before modulus.
    FirstHit,
}

/// Row-major RGBA pixels. Row 0 is the highest imaginary coordinate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    width: usize,
    height: usize,
    pixels: Vec<Rgba>,
}

impl Image {
    pub fn new(width: usize, height: usize, fill: Rgba) -> Self {
        Image {
            width,
            height,
            pixels: vec![fill; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> Rgba {
        self.pixels[y * self.width + x]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, color: Rgba) {
        self.pixels[y * self.width + x] = color;
    }

    pub fn pixels(&self) -> &[Rgba] {
        &self.pixels
    }

    /// Packed `r, g, b, a` bytes, row by row.
    pub fn to_rgba_bytes(&self) -> Vec<u8> {
        self.pixels.iter().flat_map(Rgba::to_bytes).collect()
    }
}

fn first_hit<'a>(hits: impl Iterator<Item = &'a Rgba>) -> Rgba {
    hits.copied()
        .find(|c| !c.is_transparent())
        .unwrap_or(Rgba::WHITE)
}

fn average<'a>(hits: impl Iterator<Item = &'a Rgba>) -> Rgba {
    let mut sum = [0u32; 4];
    let mut n = 0u32;
    for c in hits.filter(|c| !c.is_transparent()) {
        for (s, v) in sum.iter_mut().zip(c.to_bytes()) {
            *s += v as u32;
        }
        n += 1;
    }
    if n == 0 {
        return Rgba::WHITE;
    }
    let [r, g, b, a] = sum.map(|s| (s / n) as u8);
    Rgba::new(r, g, b, a)
}

/// Turns `grid` into pixels. Cells with no usable hit stay white. Grid row
/// `j` lands on image row `height - j - 1`.
pub fn composite(grid: &HitGrid, policy: Composite) -> Image {
    let (width, height) = (grid.width(), grid.height());
    let mut image = Image::new(width, height, Rgba::WHITE);
    for i in 0..width {
        for j in 0..height {
            let hits = grid.all_hits(i, j);
            let color = match policy {
                Composite::FirstHit => first_hit(hits),
                Composite::Average => average(hits),
            };
            image.set(i, height - j - 1, color);
        }
    }
    image
}
