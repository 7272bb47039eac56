// src/range/transform.rs

//! A formula applied to every remapped sample of a channel.
//!
//! Each sample is evaluated with:
//! - `x1`: the remapped sample scaled to `0..1`;
//! - `x2`: the sample position, `column / width + (row / height)i`;
//! - `x3`: the raw sample before clipping, scaled to `0..1`;
//! - `x4`: the previous result down the same column, `1` on the first row.
//!
//! The real part of the result, or the imaginary part when asked for, is
//! scaled back to `0..=FULL_SCALE` and clamped.

use super::{Channel, FULL_SCALE};
use crate::error::{Error, Result};
use crate::expr::{Context, Formula};
use crate::grid::run_grid;
use crate::native::MAX_ARITY;
use log::debug;
use num_complex::Complex64;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

/// Highest cache level: every argument is part of the key.
pub const MAX_CACHE_LEVEL: usize = MAX_ARITY;

type CacheKey = [u64; 2 * MAX_ARITY];

/// Results memoised by the bit patterns of their first `level` arguments.
///
/// Level 0 disables the cache. A hit returns whatever was computed first
/// for that key, so a level below the number of arguments the formula reads
/// ignores the remaining ones.
pub struct ArgCache {
    level: usize,
    entries: RwLock<HashMap<CacheKey, Complex64>>,
    hits: AtomicUsize,
}

impl fmt::Debug for ArgCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArgCache")
            .field("level", &self.level)
            .field("entries", &self.len())
            .field("hits", &self.hits())
            .finish()
    }
}

impl ArgCache {
    pub fn new(level: usize) -> Result<Self> {
        if level > MAX_CACHE_LEVEL {
            return Err(Error::InvalidParameter(format!(
                "cache level must be from 0-{} range, got {}",
                MAX_CACHE_LEVEL, level
            )));
        }
        Ok(ArgCache {
            level,
            entries: RwLock::new(HashMap::new()),
            hits: AtomicUsize::new(0),
        })
    }

    pub fn level(&self) -> usize {
        self.level
    }

    /// Number of memoised results.
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Lookups answered without evaluating.
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::Relaxed)
    }

    fn key(&self, args: &[Complex64]) -> CacheKey {
        let mut key = [0u64; 2 * MAX_ARITY];
        for (i, z) in args.iter().take(self.level).enumerate() {
            key[2 * i] = z.re.to_bits();
            key[2 * i + 1] = z.im.to_bits();
        }
        key
    }

    /// Looks `args` up, evaluating through `ctx` on a miss.
    pub fn evaluate(&self, ctx: &mut Context, args: &[Complex64]) -> Result<Complex64> {
        if self.level == 0 {
            return ctx.evaluate(args);
        }
        let key = self.key(args);
        if let Ok(entries) = self.entries.read() {
            if let Some(&value) = entries.get(&key) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(value);
            }
        }
        let value = ctx.evaluate(args)?;
        if let Ok(mut entries) = self.entries.write() {
            entries.entry(key).or_insert(value);
        }
        Ok(value)
    }
}

/// A validated four-argument formula run over every sample of a channel.
#[derive(Debug)]
pub struct ChannelFormula {
    formula: Arc<Formula>,
    use_imag: bool,
    cache: ArgCache,
}

impl ChannelFormula {
    pub fn new(formula: Arc<Formula>, use_imag: bool, cache_level: usize) -> Result<Self> {
        let cache = ArgCache::new(cache_level)?;
        Context::new(Arc::clone(&formula)).validate(MAX_ARITY)?;
        Ok(ChannelFormula {
            formula,
            use_imag,
            cache,
        })
    }

    pub fn formula(&self) -> &Arc<Formula> {
        &self.formula
    }

    pub fn cache(&self) -> &ArgCache {
        &self.cache
    }

    /// Evaluates the formula for every sample of `mapped`, with `raw` the
    /// same channel before clipping.
    pub fn apply(&self, mapped: &Channel, raw: &Channel, workers: usize) -> Result<Channel> {
        let (width, height) = (mapped.width(), mapped.height());
        if (raw.width(), raw.height()) != (width, height) {
            return Err(Error::InvalidParameter(format!(
                "raw channel is {}x{}, mapped channel is {}x{}",
                raw.width(),
                raw.height(),
                width,
                height
            )));
        }
        let full = FULL_SCALE as f64;
        // One column is scanned by one worker, top to bottom.
        let traces: Vec<AtomicU64> = (0..width).map(|_| AtomicU64::new(1f64.to_bits())).collect();

        let field = run_grid(&self.formula, width, height, workers, |ctx, column, row| {
            let trace = &traces[column];
            let args = [
                Complex64::new(mapped.get(column, row) as f64 / full, 0.0),
                Complex64::new(column as f64 / width as f64, row as f64 / height as f64),
                Complex64::new(raw.get(column, row) as f64 / full, 0.0),
                Complex64::new(f64::from_bits(trace.load(Ordering::Relaxed)), 0.0),
            ];
            let z = self.cache.evaluate(ctx, &args)?;
            let v = if self.use_imag { z.im } else { z.re };
            trace.store(v.to_bits(), Ordering::Relaxed);
            Ok(Complex64::new((v * full).clamp(0.0, full), 0.0))
        })?;

        debug!(
            "Channel formula '{}': {} cache hits, {} entries",
            self.formula.source(),
            self.cache.hits(),
            self.cache.len()
        );
        let samples = field.values().iter().map(|z| z.re as u16).collect();
        Channel::new(width, height, samples)
    }
}
