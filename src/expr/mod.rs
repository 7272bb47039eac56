// src/expr/mod.rs

//! Formula compilation and evaluation.
//!
//! A [`Formula`] is the immutable, normalised text of a user expression plus
//! the provider it calls into. A [`Context`] is a cursor over one formula and
//! is the unit of exclusivity: only one evaluation may run on a context at a
//! time, which the `&mut self` receivers enforce. Parallel evaluation clones
//! one context per worker; clones share the formula and its symbol cache.
//!
//! ```text
//! expression := term ( ('+'|'-') term )*
//! term       := exponential ( ('*'|'/') exponential )*
//! exponential:= factor ( '^' exponential )?
//! factor     := sign* ( number | '(' expression ')' | identifier call? )
//! call       := '(' expression (',' expression){0,3} ')'
//! ```

mod parser;


use crate::error::{Error, Result, Status, STATUS_NOT_OPEN};
use crate::native::{FunctionProvider, Symbol, MAX_ARITY};
use log::{debug, trace};
use num_complex::Complex64;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

/// Marks the end of a normalised formula.
pub(crate) const SENTINEL: u8 = b';';

/// Deepest nesting of parentheses, calls and exponents one evaluation
/// accepts. Deeper input is a parse error instead of a stack overflow.
pub const MAX_DEPTH: usize = 128;

// Resolved symbols of one name, indexed by arity.
type Overloads = [Option<Symbol>; MAX_ARITY + 1];

/// Number domain of an evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Full complex arithmetic.
    #[default]
    Complex,
    /// Imaginary parts of arguments, calls and powers are forced to zero.
    Real,
}

/// Compiled, immutable representation of an expression.
pub struct Formula {
    source: String,
    buffer: Vec<u8>,
    mode: Mode,
    provider: Option<Arc<dyn FunctionProvider>>,
    // Filled during validation, read-only once parallel work begins.
    symbols: RwLock<HashMap<String, Overloads>>,
}

impl fmt::Debug for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Formula")
            .field("source", &self.source)
            .field("mode", &self.mode)
            .field("has_provider", &self.provider.is_some())
            .finish()
    }
}

impl Formula {
    /// Normalises `text` (drops `;`, lowercases, appends the end marker).
    ///
    /// Syntax is not checked here; run [`Context::validate`] for that.
    pub fn compile(
        text: &str,
        mode: Mode,
        provider: Option<Arc<dyn FunctionProvider>>,
    ) -> Result<Arc<Formula>> {
        let source: String = text.chars().filter(|&c| c != ';').collect();
        if source.trim().is_empty() {
            return Err(Error::Parse {
                message: "empty function definition".to_string(),
                position: "''".to_string(),
            });
        }
        let mut buffer = source.to_lowercase().into_bytes();
        buffer.push(SENTINEL);
        debug!("Compiled formula '{}' ({:?} mode)", source, mode);
        Ok(Arc::new(Formula {
            source,
            buffer,
            mode,
            provider,
            symbols: RwLock::new(HashMap::new()),
        }))
    }

    /// The text as given, without `;` characters.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Number of distinct `(name, arity)` pairs resolved so far.
    pub fn cached_symbols(&self) -> usize {
        self.symbols
            .read()
            .map(|s| s.values().flatten().filter(|o| o.is_some()).count())
            .unwrap_or(0)
    }

    pub(crate) fn bytes(&self) -> &[u8] {
        &self.buffer
    }

    fn resolve(&self, name: &str, arity: usize) -> std::result::Result<Symbol, Status> {
        if let Ok(symbols) = self.symbols.read() {
            if let Some(symbol) = symbols.get(name).and_then(|o| o.get(arity).copied().flatten()) {
                return Ok(symbol);
            }
        }
        let provider = self.provider.as_ref().ok_or(STATUS_NOT_OPEN)?;
        let symbol = provider.resolve(name, arity)?;
        if let Ok(mut symbols) = self.symbols.write() {
            let overloads = symbols.entry(name.to_string()).or_default();
            if let Some(slot) = overloads.get_mut(arity) {
                *slot = Some(symbol);
                trace!("added '{}'/{} to symbol cache", name, arity);
            }
        }
        Ok(symbol)
    }

    pub(crate) fn dispatch(&self, name: &str, args: &[Complex64]) -> std::result::Result<Complex64, Status> {
        let symbol = self.resolve(name, args.len())?;
        let provider = self.provider.as_ref().ok_or(STATUS_NOT_OPEN)?;
        provider.call(symbol, args)
    }
}

/// Mutable evaluation state bound to one [`Formula`].
pub struct Context {
    formula: Arc<Formula>,
    position: usize,
    ch: u8,
    args: [Complex64; MAX_ARITY],
    nargs: usize,
    depth: usize,
}

impl Context {
    pub fn new(formula: Arc<Formula>) -> Self {
        Self {
            formula,
            position: 0,
            ch: 0,
            args: [Complex64::new(0.0, 0.0); MAX_ARITY],
            nargs: 0,
            depth: 0,
        }
    }

    /// Compiles `text` and wraps it in a fresh context.
    pub fn compile(
        text: &str,
        mode: Mode,
        provider: Option<Arc<dyn FunctionProvider>>,
    ) -> Result<Self> {
        Ok(Self::new(Formula::compile(text, mode, provider)?))
    }

    pub fn formula(&self) -> &Arc<Formula> {
        &self.formula
    }

    /// Evaluates the formula with `args` bound to `x1..x4`.
    pub fn evaluate(&mut self, args: &[Complex64]) -> Result<Complex64> {
        if args.len() > MAX_ARITY {
            return Err(Error::InvalidParameter(format!(
                "maximum {} arguments are allowed, got {}",
                MAX_ARITY,
                args.len()
            )));
        }
        self.nargs = args.len();
        for (slot, arg) in self.args.iter_mut().zip(args) {
            *slot = match self.formula.mode {
                Mode::Complex => *arg,
                Mode::Real => Complex64::new(arg.re, 0.0),
            };
        }
        self.position = 0;
        self.ch = 0;
        self.depth = 0;
        let value = self.expression()?;
        if self.ch != SENTINEL {
            return Err(self.parse_error("garbage in function expression"));
        }
        Ok(value)
    }

    /// Real-valued convenience wrapper around [`Context::evaluate`].
    pub fn evaluate_real(&mut self, args: &[f64]) -> Result<f64> {
        let z: Vec<Complex64> = args.iter().map(|&a| Complex64::new(a, 0.0)).collect();
        self.evaluate(&z).map(|v| v.re)
    }

    /// Checks the formula for `arity` bound arguments by evaluating it once
    /// with all arguments zero. Every function call site is dispatched, so
    /// missing native symbols surface here and the symbol cache is complete
    /// afterwards.
    pub fn validate(&mut self, arity: usize) -> Result<Complex64> {
        if arity < 1 || arity > MAX_ARITY {
            return Err(Error::InvalidParameter(format!(
                "argument count must be from 1-{} range, got {}",
                MAX_ARITY, arity
            )));
        }
        let zeros = [Complex64::new(0.0, 0.0); MAX_ARITY];
        let result = self.evaluate(&zeros[..arity]);
        match &result {
            Ok(v) => debug!("'{}' validated: f(0) = {}", self.formula.source, v),
            Err(e) => debug!("'{}' failed validation: {}", self.formula.source, e),
        }
        result
    }

    /// Renders the cursor as `'before;after' (pos/len,ch=c)`.
    pub(crate) fn describe_position(&self) -> String {
        let bytes = self.formula.bytes();
        let before = if self.position > 0 {
            String::from_utf8_lossy(&bytes[..self.position - 1]).into_owned()
        } else {
            String::new()
        };
        let after = if self.position < bytes.len() {
            String::from_utf8_lossy(&bytes[self.position..]).into_owned()
        } else {
            String::new()
        };
        let ch = if self.ch == 0 { String::new() } else { (self.ch as char).to_string() };
        format!("'{};{}' ({}/{},ch={})", before, after, self.position, bytes.len(), ch)
    }

    pub(crate) fn parse_error(&self, message: impl Into<String>) -> Error {
        Error::Parse {
            message: message.into(),
            position: self.describe_position(),
        }
    }
}

/// A clone shares the formula and its symbol cache, and starts with a fresh
/// cursor and argument vector.
impl Clone for Context {
    fn clone(&self) -> Self {
        Self::new(Arc::clone(&self.formula))
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("formula", &self.formula.source)
            .field("position", &self.position)
            .finish()
    }
}
