// src/config.rs

//! Run configuration for a grid evaluation.
//!
//! The structs deserialize from JSON with every field optional; missing
//! sections and fields fall back to their defaults. Range checks live in
//! [`Config::validate`] so that a configuration built in code goes through
//! the same checks as one read from a file.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::contour::{Composite, DEFAULT_INCREMENT};
use crate::error::{Error, Result};
use crate::expr::{Formula, Mode};
use crate::grid::{worker_count, Field, Part, Parts, Plane};
use crate::native::FunctionProvider;
use crate::range::{Bounds, Channel, ChannelFormula, ClipSpec, ContourLines, Remap, MAX_CACHE_LEVEL};

// --- Top-Level Configuration Structure ---

/// Complete configuration of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Grid size, plane bounds and parallelism.
    pub grid: GridConfig,
    /// Percentile clipping, index overrides and gamma.
    pub range: ClipSpec,
    /// Contour levels and compositing.
    pub contour: ContourConfig,
    /// Post-processing of remapped channels.
    pub remap: RemapConfig,
}

// --- Grid Configuration ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Number of columns, 1..=65535.
    pub width: usize,
    /// Number of rows, 1..=65535.
    pub height: usize,
    /// Sampled rectangle of the complex plane.
    pub plane: Plane,
    /// Worker threads; `None` uses the available hardware parallelism.
    pub workers: Option<usize>,
}

impl Default for GridConfig {
    fn default() -> Self {
        GridConfig {
            width: 1000,
            height: 1000,
            plane: Plane::default(),
            workers: None,
        }
    }
}

// --- Contour Configuration ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContourConfig {
    /// Distance between level indices on the 0-255 ramp.
    pub increment: u8,
    /// How several hits on one cell are merged.
    pub composite: Composite,
    /// Level sets drawn by the standard chart.
    pub parts: Parts,
}

impl Default for ContourConfig {
    fn default() -> Self {
        ContourConfig {
            increment: DEFAULT_INCREMENT,
            composite: Composite::default(),
            parts: Parts::all(),
        }
    }
}

// --- Remap Configuration ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RemapConfig {
    /// Formula run over every remapped sample, see [`ChannelFormula`].
    pub formula: Option<String>,
    /// Keep the imaginary part of the formula result.
    pub imag: bool,
    /// Leading arguments that key the formula cache, 0 disables it.
    pub cache: usize,
    /// Contour lines drawn on the final channel.
    pub lines: Option<ContourLines>,
}

impl Config {
    /// Parses a JSON document; missing fields take their defaults. The result
    /// is validated.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(text)
            .map_err(|e| Error::InvalidParameter(format!("config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let grid = &self.grid;
        for (name, v) in [("width", grid.width), ("height", grid.height)] {
            if v == 0 || v > 0xffff {
                return Err(Error::InvalidParameter(format!(
                    "{} must be from 1-65535 range, got {}",
                    name, v
                )));
            }
        }
        grid.plane.validate()?;
        if grid.workers == Some(0) {
            return Err(Error::InvalidParameter(
                "workers must be positive when set".to_string(),
            ));
        }
        self.range.validate()?;
        if self.contour.increment == 0 {
            return Err(Error::InvalidParameter(
                "contour increment must be from 1-255 range".to_string(),
            ));
        }
        let remap = &self.remap;
        if remap.cache > MAX_CACHE_LEVEL {
            return Err(Error::InvalidParameter(format!(
                "cache level must be from 0-{} range, got {}",
                MAX_CACHE_LEVEL, remap.cache
            )));
        }
        if remap.formula.as_deref().is_some_and(|f| f.trim().is_empty()) {
            return Err(Error::InvalidParameter("remap formula is empty".to_string()));
        }
        if let Some(lines) = &remap.lines {
            lines.validate()?;
        }
        Ok(())
    }

    /// Builds the field-to-channel pass, compiling and validating the remap
    /// formula against `provider`.
    pub fn remap_pass(&self, provider: Option<Arc<dyn FunctionProvider>>) -> Result<Remap> {
        let formula = match &self.remap.formula {
            Some(text) => Some(ChannelFormula::new(
                Formula::compile(text, Mode::Complex, provider)?,
                self.remap.imag,
                self.remap.cache,
            )?),
            None => None,
        };
        Ok(Remap {
            clip: self.range,
            formula,
            lines: self.remap.lines,
        })
    }

    /// Renders `part` of `field` with this configuration.
    pub fn render_channel(
        &self,
        field: &Field,
        part: Part,
        provider: Option<Arc<dyn FunctionProvider>>,
        hint: Option<Bounds>,
    ) -> Result<Channel> {
        self.remap_pass(provider)?.render(field, part, hint, self.workers())
    }

    /// Worker threads to run with.
    pub fn workers(&self) -> usize {
        worker_count(self.grid.workers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_log::test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.grid.width, 1000);
        assert_eq!(config.contour.increment, 16);
        assert_eq!(config.contour.parts, Parts::all());
        assert!(config.workers() >= 1);
    }

    #[test_log::test]
    fn test_partial_json_keeps_defaults() {
        let config = Config::from_json_str(
            r#"{
                "grid": { "width": 64, "plane": { "r0": -2.0 }, "workers": 3 },
                "range": { "lo_percent": 1.5, "gamma": 0.8 },
                "contour": { "composite": "first_hit" }
            }"#,
        )
        .unwrap();
        assert_eq!(config.grid.width, 64);
        assert_eq!(config.grid.height, 1000);
        assert_eq!(config.grid.plane, Plane::new(-2.0, 1.0, -1.0, 1.0).unwrap());
        assert_eq!(config.workers(), 3);
        assert_eq!(config.range.lo_percent, 1.5);
        assert_eq!(config.range.gamma, Some(0.8));
        assert_eq!(config.contour.composite, Composite::FirstHit);
        assert_eq!(config.contour.increment, DEFAULT_INCREMENT);
    }

    #[test_log::test]
    fn test_out_of_range_values_rejected() {
        for text in [
            r#"{ "grid": { "width": 0 } }"#,
            r#"{ "grid": { "height": 70000 } }"#,
            r#"{ "grid": { "plane": { "i0": 2.0 } } }"#,
            r#"{ "grid": { "workers": 0 } }"#,
            r#"{ "range": { "hi_percent": 120 } }"#,
            r#"{ "range": { "lo_index": 0 } }"#,
            r#"{ "contour": { "increment": 0 } }"#,
            r#"{ "contour": { "increment": 300 } }"#,
            r#"{ "grid": "wide" }"#,
            r#"{ "remap": { "cache": 5 } }"#,
            r#"{ "remap": { "formula": "  " } }"#,
            r#"{ "remap": { "lines": { "count": 0 } } }"#,
            r#"{ "remap": { "lines": { "count": 20000 } } }"#,
        ] {
            assert!(
                matches!(Config::from_json_str(text), Err(Error::InvalidParameter(_))),
                "{} should be rejected",
                text
            );
        }
    }

    #[test_log::test]
    fn test_round_trip_through_json() {
        let mut config = Config::default();
        config.contour.parts = Parts::REAL | Parts::MODULUS;
        config.range.hi_index = Some(0x8000);
        config.remap.formula = Some("csin(x1)".to_string());
        config.remap.lines = Some(ContourLines::default());
        let text = serde_json::to_string(&config).unwrap();
        assert_eq!(Config::from_json_str(&text).unwrap(), config);
    }

    #[test_log::test]
    fn test_remap_section() {
        let config = Config::from_json_str(
            r#"{ "remap": { "formula": "1-x1", "imag": true, "cache": 1,
                            "lines": { "count": 3, "edge": "inverted" } } }"#,
        )
        .unwrap();
        let lines = config.remap.lines.unwrap();
        assert_eq!(lines.count, 3);
        assert_eq!(lines.edge, crate::range::Fill::Inverted);
        assert_eq!(lines.surface, crate::range::Fill::Zero);

        let provider: Arc<dyn FunctionProvider> = Arc::new(crate::native::Builtins);
        let remap = config.remap_pass(Some(provider)).unwrap();
        let formula = remap.formula.as_ref().unwrap();
        assert_eq!(formula.formula().source(), "1-x1");
        assert_eq!(formula.cache().level(), 1);
        assert!(Config::default().remap_pass(None).unwrap().formula.is_none());
    }

    #[test_log::test]
    fn test_remap_formula_is_validated() {
        let mut config = Config::default();
        config.remap.formula = Some("nosuch(x1)".to_string());
        let provider: Arc<dyn FunctionProvider> = Arc::new(crate::native::Builtins);
        let err = config.remap_pass(Some(provider)).unwrap_err();
        assert_eq!(err.function(), Some("nosuch"));
    }
}
