// src/expr/parser.rs

//! Recursive-descent evaluator.
//!
//! The cursor holds the current character in `ch`. Every `factor` starts by
//! reading the next character, which is how operators, `(` and `,` get
//! consumed by the operand that follows them.

use super::{Context, Mode, MAX_DEPTH, SENTINEL};
use crate::error::{Error, Result};
use crate::native::{builtins, MAX_ARITY};
use log::trace;
use num_complex::Complex64;

fn is_digit(ch: u8) -> bool {
    ch.is_ascii_digit() || ch == b'.'
}

fn is_alpha(ch: u8) -> bool {
    ch.is_ascii_alphabetic() || ch == b'_'
}

fn render_args(args: &[Complex64]) -> String {
    args.iter()
        .map(|z| z.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl Context {
    fn read_next_char(&mut self) {
        let bytes = self.formula.bytes();
        if self.position < bytes.len() && self.ch != SENTINEL {
            self.ch = bytes[self.position];
            self.position += 1;
        }
    }

    fn skip_blanks(&mut self) {
        let len = self.formula.bytes().len();
        while self.ch.is_ascii_whitespace() && self.ch != SENTINEL && self.position < len {
            self.read_next_char();
        }
    }

    fn read_number(&mut self) -> Result<f64> {
        let mut digits = String::new();
        while is_digit(self.ch) {
            digits.push(self.ch as char);
            self.read_next_char();
        }
        digits
            .parse::<f64>()
            .map_err(|e| self.parse_error(format!("invalid number '{}': {}", digits, e)))
    }

    fn read_ident(&mut self) -> Result<String> {
        self.skip_blanks();
        if !is_alpha(self.ch) {
            return Err(self.parse_error("expected function name or variable"));
        }
        let mut ident = String::new();
        while is_alpha(self.ch) || self.ch.is_ascii_digit() {
            ident.push(self.ch as char);
            self.read_next_char();
        }
        self.skip_blanks();
        Ok(ident)
    }

    /// `x<k>` with `1 <= k <= bound arguments`.
    fn arg_value(&self, ident: &str) -> Option<Complex64> {
        let k: usize = ident.strip_prefix('x')?.parse().ok()?;
        if k >= 1 && k <= self.nargs {
            Some(self.args[k - 1])
        } else {
            None
        }
    }

    /// Runs `f` one nesting level deeper.
    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.depth >= MAX_DEPTH {
            return Err(self.parse_error(format!(
                "expression nested too deeply (limit {})",
                MAX_DEPTH
            )));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn call_function(&mut self, ident: &str) -> Result<Complex64> {
        self.skip_blanks();
        if self.ch != b'(' {
            return Err(self.parse_error(format!("expected '(' after {}", ident)));
        }
        let mut args = [Complex64::new(0.0, 0.0); MAX_ARITY];
        let mut arity = 0;
        loop {
            args[arity] = self.nested(Self::expression)?;
            arity += 1;
            self.skip_blanks();
            match self.ch {
                b')' => break,
                b',' if arity < MAX_ARITY => continue,
                _ => {
                    return Err(self.parse_error(format!(
                        "expected: ')' after {} argument(s) function {}({}",
                        arity,
                        ident,
                        render_args(&args[..arity])
                    )))
                }
            }
        }
        let args = &args[..arity];
        let value = self.formula.dispatch(ident, args).map_err(|status| Error::Eval {
            function: ident.to_string(),
            arity,
            args: render_args(args),
            status,
            position: self.describe_position(),
        })?;
        trace!("{}({}) -> {}", ident, render_args(args), value);
        self.read_next_char();
        self.skip_blanks();
        Ok(match self.formula.mode {
            Mode::Complex => value,
            Mode::Real => Complex64::new(value.re, 0.0),
        })
    }

    fn factor(&mut self) -> Result<Complex64> {
        let mut negative = false;
        self.read_next_char();
        self.skip_blanks();
        while self.ch == b'+' || self.ch == b'-' {
            if self.ch == b'-' {
                negative = !negative;
            }
            self.read_next_char();
            self.skip_blanks();
        }
        let value = if is_digit(self.ch) {
            let v = self.read_number()?;
            self.skip_blanks();
            Complex64::new(v, 0.0)
        } else if self.ch == b'(' {
            let v = self.nested(Self::expression)?;
            self.skip_blanks();
            if self.ch != b')' {
                return Err(self.parse_error("expected: ')'"));
            }
            self.read_next_char();
            self.skip_blanks();
            v
        } else {
            let ident = self.read_ident()?;
            match self.arg_value(&ident) {
                Some(v) => v,
                None => self.call_function(&ident)?,
            }
        };
        self.skip_blanks();
        Ok(if negative { -value } else { value })
    }

    fn exponential(&mut self) -> Result<Complex64> {
        let base = self.factor()?;
        if self.ch != b'^' {
            return Ok(base);
        }
        let exp = self.nested(Self::exponential)?;
        Ok(match self.formula.mode {
            Mode::Complex => builtins::cpow(base, exp),
            Mode::Real => Complex64::new(base.re.powf(exp.re), 0.0),
        })
    }

    fn term(&mut self) -> Result<Complex64> {
        let mut value = self.exponential()?;
        loop {
            match self.ch {
                b'*' => value *= self.exponential()?,
                b'/' => {
                    let divisor = self.exponential()?;
                    value = match self.formula.mode {
                        Mode::Complex => value / divisor,
                        // keeps x/0 = inf instead of the complex NaN
                        Mode::Real => Complex64::new(value.re / divisor.re, 0.0),
                    };
                }
                _ => return Ok(value),
            }
        }
    }

    pub(super) fn expression(&mut self) -> Result<Complex64> {
        let mut value = self.term()?;
        loop {
            match self.ch {
                b'+' => value += self.term()?,
                b'-' => value -= self.term()?,
                _ => return Ok(value),
            }
        }
    }
}
