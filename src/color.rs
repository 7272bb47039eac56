// src/color.rs

//! RGBA colors used by contour hits and the compositor.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// RGBA color in 32-bit format (8 bits per channel)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const WHITE: Rgba = Rgba::opaque(0xff, 0xff, 0xff);
    pub const BLACK: Rgba = Rgba::opaque(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub fn is_transparent(&self) -> bool {
        self.a == 0
    }

    /// Convert to RGBA byte array
    pub fn to_bytes(&self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// Adds `steps * increment[c]` to every channel, saturating at 0 and 255.
    pub fn stepped(&self, increment: [f64; 4], steps: f64) -> Rgba {
        let channel = |base: u8, inc: f64| (base as f64 + steps * inc).clamp(0.0, 255.0) as u8;
        Rgba {
            r: channel(self.r, increment[0]),
            g: channel(self.g, increment[1]),
            b: channel(self.b, increment[2]),
            a: channel(self.a, increment[3]),
        }
    }
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}:{}", self.r, self.g, self.b, self.a)
    }
}

/// Parses `R:G:B:A`, each 0-255.
impl FromStr for Rgba {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').map(str::trim).collect();
        if parts.len() != 4 {
            return Err(format!("'{}' must be 4 0-255 uint8 values ':' separated", s));
        }
        let mut channels = [0u8; 4];
        for (slot, part) in channels.iter_mut().zip(&parts) {
            *slot = part
                .parse::<u8>()
                .map_err(|_| format!("'{}': all r,g,b,a values must be from 0-255 range", s))?;
        }
        Ok(Rgba::new(channels[0], channels[1], channels[2], channels[3]))
    }
}
