// src/native/library.rs

//! Functions loaded from a shared library with `dlopen`/`dlsym`.

use super::{FunctionProvider, Symbol, MAX_ARITY};
use crate::error::{Error, Result, Status, STATUS_NOT_FOUND, STATUS_NOT_OPEN, STATUS_TABLE_FULL};
use log::{debug, info, warn};
use num_complex::Complex64;
use std::ffi::{c_void, CStr, CString};
use std::sync::RwLock;

/// Default capacity of the per-library function table.
pub const DEFAULT_MAX_FUNCTIONS: usize = 128;

/// Calling convention of the exported functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Abi {
    /// `double f(double, ...)`; only real parts are passed, the result is real.
    Real,
    /// `double complex f(double complex, ...)`.
    Complex,
}

type Real1 = extern "C" fn(f64) -> f64;
type Real2 = extern "C" fn(f64, f64) -> f64;
type Real3 = extern "C" fn(f64, f64, f64) -> f64;
type Real4 = extern "C" fn(f64, f64, f64, f64) -> f64;
// `Complex<f64>` is `repr(C)` with the layout of C99 `double complex`.
type Complex1 = extern "C" fn(Complex64) -> Complex64;
type Complex2 = extern "C" fn(Complex64, Complex64) -> Complex64;
type Complex3 = extern "C" fn(Complex64, Complex64, Complex64) -> Complex64;
type Complex4 = extern "C" fn(Complex64, Complex64, Complex64, Complex64) -> Complex64;

struct Entry {
    name: String,
    arity: usize,
    // Address returned by dlsym, never null.
    addr: usize,
}

/// An open shared library plus a bounded table of resolved functions.
pub struct NativeLibrary {
    handle: *mut c_void,
    path: String,
    abi: Abi,
    max_functions: usize,
    table: RwLock<Vec<Entry>>,
}

// The handle is only used for dlsym/dlclose, both thread safe; the table is
// behind a lock.
unsafe impl Send for NativeLibrary {}
unsafe impl Sync for NativeLibrary {}

fn last_dl_error() -> String {
    // SAFETY: dlerror returns either null or a valid C string owned by libc.
    unsafe {
        let msg = libc::dlerror();
        if msg.is_null() {
            "unknown dlopen error".to_string()
        } else {
            CStr::from_ptr(msg).to_string_lossy().into_owned()
        }
    }
}

impl NativeLibrary {
    /// Loads the library at `path`. `max_functions` bounds the number of
    /// distinct `(name, arity)` pairs that may be resolved.
    pub fn open(path: &str, abi: Abi, max_functions: usize) -> Result<Self> {
        if max_functions == 0 || max_functions > 0xffff {
            return Err(Error::InvalidParameter(format!(
                "function table size must be from 1-65535 range, got {}",
                max_functions
            )));
        }
        let c_path = CString::new(path).map_err(|e| Error::Load {
            what: path.to_string(),
            reason: e.to_string(),
        })?;
        // SAFETY: c_path is a valid NUL-terminated string.
        let handle = unsafe { libc::dlopen(c_path.as_ptr(), libc::RTLD_LAZY) };
        if handle.is_null() {
            let reason = last_dl_error();
            warn!("{} load failed: {}", path, reason);
            return Err(Error::Load {
                what: path.to_string(),
                reason,
            });
        }
        info!("Loaded native library {} ({:?} ABI)", path, abi);
        Ok(Self {
            handle,
            path: path.to_string(),
            abi,
            max_functions,
            table: RwLock::new(Vec::new()),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn abi(&self) -> Abi {
        self.abi
    }

    /// Number of functions resolved so far.
    pub fn resolved(&self) -> usize {
        self.table.read().map(|t| t.len()).unwrap_or(0)
    }

    fn lookup(&self, name: &str, arity: usize) -> Result<usize> {
        let c_name = CString::new(name).map_err(|e| Error::Load {
            what: name.to_string(),
            reason: e.to_string(),
        })?;
        // SAFETY: handle is a live dlopen handle and c_name is NUL-terminated.
        let addr = unsafe { libc::dlsym(self.handle, c_name.as_ptr()) };
        if addr.is_null() {
            return Err(Error::Load {
                what: format!("{}/{} in {}", name, arity, self.path),
                reason: "function not found".to_string(),
            });
        }
        Ok(addr as usize)
    }
}

impl FunctionProvider for NativeLibrary {
    fn resolve(&self, name: &str, arity: usize) -> std::result::Result<Symbol, Status> {
        if self.handle.is_null() {
            return Err(STATUS_NOT_OPEN);
        }
        if arity == 0 || arity > MAX_ARITY {
            return Err(STATUS_NOT_FOUND);
        }
        if let Ok(table) = self.table.read() {
            if let Some(idx) = table.iter().position(|e| e.arity == arity && e.name == name) {
                return Ok(Symbol(idx));
            }
        }
        let mut table = self.table.write().map_err(|_| STATUS_NOT_OPEN)?;
        // Another thread may have resolved it between the two locks.
        if let Some(idx) = table.iter().position(|e| e.arity == arity && e.name == name) {
            return Ok(Symbol(idx));
        }
        if table.len() >= self.max_functions {
            warn!("{}/{}: function table full", name, arity);
            return Err(STATUS_TABLE_FULL);
        }
        let addr = self.lookup(name, arity).map_err(|e| {
            debug!("{}", e);
            STATUS_NOT_FOUND
        })?;
        table.push(Entry {
            name: name.to_string(),
            arity,
            addr,
        });
        debug!("Resolved native {}/{} at {:#x}", name, arity, addr);
        Ok(Symbol(table.len() - 1))
    }

    fn call(&self, symbol: Symbol, args: &[Complex64]) -> std::result::Result<Complex64, Status> {
        let (addr, arity) = {
            let table = self.table.read().map_err(|_| STATUS_NOT_OPEN)?;
            let entry = table.get(symbol.0).ok_or(STATUS_NOT_FOUND)?;
            (entry.addr, entry.arity)
        };
        if args.len() != arity {
            return Err(STATUS_NOT_FOUND);
        }
        let a = args;
        // SAFETY: addr came from dlsym for this name; the caller chose the ABI
        // matching how the library declares its exports.
        let value = unsafe {
            match (self.abi, arity) {
                (Abi::Real, 1) => Complex64::new(std::mem::transmute::<usize, Real1>(addr)(a[0].re), 0.0),
                (Abi::Real, 2) => Complex64::new(std::mem::transmute::<usize, Real2>(addr)(a[0].re, a[1].re), 0.0),
                (Abi::Real, 3) => Complex64::new(
                    std::mem::transmute::<usize, Real3>(addr)(a[0].re, a[1].re, a[2].re),
                    0.0,
                ),
                (Abi::Real, 4) => Complex64::new(
                    std::mem::transmute::<usize, Real4>(addr)(a[0].re, a[1].re, a[2].re, a[3].re),
                    0.0,
                ),
                (Abi::Complex, 1) => std::mem::transmute::<usize, Complex1>(addr)(a[0]),
                (Abi::Complex, 2) => std::mem::transmute::<usize, Complex2>(addr)(a[0], a[1]),
                (Abi::Complex, 3) => std::mem::transmute::<usize, Complex3>(addr)(a[0], a[1], a[2]),
                (Abi::Complex, 4) => std::mem::transmute::<usize, Complex4>(addr)(a[0], a[1], a[2], a[3]),
                _ => return Err(STATUS_NOT_FOUND),
            }
        };
        Ok(value)
    }
}

impl Drop for NativeLibrary {
    fn drop(&mut self) {
        if self.handle.is_null() {
            return;
        }
        // SAFETY: handle came from dlopen and is closed exactly once.
        let rc = unsafe { libc::dlclose(self.handle) };
        if rc != 0 {
            warn!("dlclose {} failed: {}", self.path, last_dl_error());
        } else {
            debug!("Unloaded native library {}", self.path);
        }
        self.handle = std::ptr::null_mut();
    }
}
