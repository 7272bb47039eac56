// src/native/mod.rs

//! Native function provider boundary.
//!
//! The expression engine never calls a function directly. Every identifier
//! that is not an argument slot is resolved through a [`FunctionProvider`]
//! into an opaque [`Symbol`], and later invoked through the same provider.
//! Providers own their lifecycle: a [`NativeLibrary`] is unloaded when it is
//! dropped, and the core holds it only behind an `Arc`.
//!
//! Status codes mirror the C shim the tool grew up with:
//! 1 = library not open, 2 = function table full, 3 = function not found.
//! A [`FunctionProvider`] implementation may return other nonzero codes from
//! `call`. Functions loaded by [`NativeLibrary`] return only a value and
//! never report a status of their own.

pub mod builtins;
pub mod library;


use crate::error::{Status, STATUS_NOT_FOUND};
use num_complex::Complex64;

pub use builtins::Builtins;
pub use library::{Abi, NativeLibrary, DEFAULT_MAX_FUNCTIONS};

/// Largest number of arguments a provider function may take.
pub const MAX_ARITY: usize = 4;

/// Opaque handle to a resolved function. Only meaningful to the provider
/// that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Symbol(pub usize);

/// A source of callable functions, looked up by `(name, arity)`.
pub trait FunctionProvider: Send + Sync {
    /// Resolves `name` taking `arity` arguments into a symbol handle.
    fn resolve(&self, name: &str, arity: usize) -> Result<Symbol, Status>;

    /// Calls a previously resolved symbol. `args.len()` equals the arity the
    /// symbol was resolved with.
    fn call(&self, symbol: Symbol, args: &[Complex64]) -> Result<Complex64, Status>;
}

/// Consults `first`, falling back to `second` for names `first` does not know.
///
/// Used to put a native library underneath the builtins so that a loaded
/// library only needs to export what the builtins lack.
pub struct Layered<A, B> {
    first: A,
    second: B,
}

impl<A: FunctionProvider, B: FunctionProvider> Layered<A, B> {
    pub fn new(first: A, second: B) -> Self {
        Self { first, second }
    }
}

// The low bit of a layered symbol selects the layer.
impl<A: FunctionProvider, B: FunctionProvider> FunctionProvider for Layered<A, B> {
    fn resolve(&self, name: &str, arity: usize) -> Result<Symbol, Status> {
        match self.first.resolve(name, arity) {
            Ok(Symbol(id)) => Ok(Symbol(id << 1)),
            Err(STATUS_NOT_FOUND) => self
                .second
                .resolve(name, arity)
                .map(|Symbol(id)| Symbol((id << 1) | 1)),
            Err(status) => Err(status),
        }
    }

    fn call(&self, symbol: Symbol, args: &[Complex64]) -> Result<Complex64, Status> {
        let inner = Symbol(symbol.0 >> 1);
        if symbol.0 & 1 == 0 {
            self.first.call(inner, args)
        } else {
            self.second.call(inner, args)
        }
    }
}

impl<P: FunctionProvider + ?Sized> FunctionProvider for std::sync::Arc<P> {
    fn resolve(&self, name: &str, arity: usize) -> Result<Symbol, Status> {
        (**self).resolve(name, arity)
    }

    fn call(&self, symbol: Symbol, args: &[Complex64]) -> Result<Complex64, Status> {
        (**self).call(symbol, args)
    }
}
