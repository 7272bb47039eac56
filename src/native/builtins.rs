// src/native/builtins.rs

//! In-process complex functions available to every formula.

use super::{FunctionProvider, Symbol, MAX_ARITY};
use crate::error::{Status, STATUS_NOT_FOUND};
use log::trace;
use num_complex::Complex64;
use once_cell::sync::Lazy;
use std::collections::HashMap;

type BuiltinFn = fn(&[Complex64]) -> Complex64;

struct Builtin {
    name: &'static str,
    arity: usize,
    func: BuiltinFn,
}

const fn builtin(name: &'static str, arity: usize, func: BuiltinFn) -> Builtin {
    Builtin { name, arity, func }
}

fn real(v: f64) -> Complex64 {
    Complex64::new(v, 0.0)
}

/// Complex power that stays exact for small integral exponents and maps a
/// zero base to zero for any exponent with a positive real part.
pub fn cpow(base: Complex64, exp: Complex64) -> Complex64 {
    if exp.im == 0.0 && exp.re.fract() == 0.0 && exp.re.abs() <= i32::MAX as f64 {
        return base.powi(exp.re as i32);
    }
    if base.re == 0.0 && base.im == 0.0 && exp.re > 0.0 {
        return Complex64::new(0.0, 0.0);
    }
    base.powc(exp)
}

fn saturate(a: &[Complex64]) -> Complex64 {
    let clamp = |v: f64, lo: f64, hi: f64| v.max(lo).min(hi);
    Complex64::new(
        clamp(a[0].re, a[1].re, a[2].re),
        clamp(a[0].im, a[1].im, a[2].im),
    )
}

fn toon(a: &[Complex64]) -> Complex64 {
    let steps = a[0] * (a[1] + 1.0);
    Complex64::new(steps.re.trunc(), steps.im.trunc()) / a[1]
}

fn alpha(a: &[Complex64]) -> Complex64 {
    cpow(((a[1] * a[0] + a[2]).cos() + 1.0) * 0.5, a[3])
}

static TABLE: [Builtin; 26] = [
    builtin("csin", 1, |a| a[0].sin()),
    builtin("ccos", 1, |a| a[0].cos()),
    builtin("ctan", 1, |a| a[0].tan()),
    builtin("cexp", 1, |a| a[0].exp()),
    builtin("clog", 1, |a| a[0].ln()),
    builtin("csqrt", 1, |a| a[0].sqrt()),
    builtin("cabs", 1, |a| real(a[0].norm())),
    builtin("carg", 1, |a| real(a[0].arg())),
    builtin("creal", 1, |a| real(a[0].re)),
    builtin("cimag", 1, |a| real(a[0].im)),
    builtin("conj", 1, |a| a[0].conj()),
    builtin("cpow", 2, |a| cpow(a[0], a[1])),
    builtin("complex", 2, |a| Complex64::new(a[0].re, a[1].re)),
    builtin("sin", 1, |a| a[0].sin()),
    builtin("cos", 1, |a| a[0].cos()),
    builtin("tan", 1, |a| a[0].tan()),
    builtin("exp", 1, |a| a[0].exp()),
    builtin("log", 1, |a| a[0].ln()),
    builtin("sqrt", 1, |a| a[0].sqrt()),
    builtin("abs", 1, |a| real(a[0].norm())),
    builtin("pow", 2, |a| cpow(a[0], a[1])),
    builtin("min", 2, |a| real(a[0].re.min(a[1].re))),
    builtin("max", 2, |a| real(a[0].re.max(a[1].re))),
    builtin("saturate", 3, saturate),
    builtin("toon", 2, toon),
    builtin("alpha", 4, alpha),
];

// name -> table index per arity
static INDEX: Lazy<HashMap<&'static str, [Option<usize>; MAX_ARITY + 1]>> = Lazy::new(|| {
    let mut index: HashMap<&'static str, [Option<usize>; MAX_ARITY + 1]> = HashMap::new();
    for (idx, b) in TABLE.iter().enumerate() {
        index.entry(b.name).or_default()[b.arity] = Some(idx);
    }
    index
});

/// Provider backed by a fixed table of Rust functions.
#[derive(Debug, Clone, Copy, Default)]
pub struct Builtins;

impl Builtins {
    /// Names and arities of every builtin, in table order.
    pub fn names() -> impl Iterator<Item = (&'static str, usize)> {
        TABLE.iter().map(|b| (b.name, b.arity))
    }
}

impl FunctionProvider for Builtins {
    fn resolve(&self, name: &str, arity: usize) -> Result<Symbol, Status> {
        let found = INDEX
            .get(name)
            .and_then(|by_arity| by_arity.get(arity).copied().flatten());
        trace!("builtin resolve {}/{} -> {:?}", name, arity, found);
        found.map(Symbol).ok_or(STATUS_NOT_FOUND)
    }

    fn call(&self, symbol: Symbol, args: &[Complex64]) -> Result<Complex64, Status> {
        let entry = TABLE.get(symbol.0).ok_or(STATUS_NOT_FOUND)?;
        if args.len() != entry.arity {
            return Err(STATUS_NOT_FOUND);
        }
        Ok((entry.func)(args))
    }
}
