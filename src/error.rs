// src/error.rs

//! Error type shared by every part of the core.

use thiserror::Error;

/// Status reported by a function provider when a call or lookup fails.
pub type Status = i32;

/// Provider status: no library is open.
pub const STATUS_NOT_OPEN: Status = 1;
/// Provider status: the bounded function table has no free slot.
pub const STATUS_TABLE_FULL: Status = 2;
/// Provider status: the symbol is unknown to the provider.
pub const STATUS_NOT_FOUND: Status = 3;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("parse error: {message}: position: {position}")]
    Parse { message: String, position: String },

    #[error("error {status} calling {arity} argument function {function}({args}): position: {position}")]
    Eval {
        function: String,
        arity: usize,
        args: String,
        status: Status,
        position: String,
    },

    #[error("calculated integer range is empty: {lo:#06x}-{hi:#06x}")]
    EmptyRange { lo: u16, hi: u16 },

    #[error("no context copy available for unit {unit}")]
    PoolExhausted { unit: usize },

    #[error("failed to load {what}: {reason}")]
    Load { what: String, reason: String },

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

impl Error {
    /// Name of the native function that failed, for `Eval` errors.
    pub fn function(&self) -> Option<&str> {
        match self {
            Error::Eval { function, .. } => Some(function),
            _ => None,
        }
    }

    pub fn is_parse(&self) -> bool {
        matches!(self, Error::Parse { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
