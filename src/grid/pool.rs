// src/grid/pool.rs

//! Pre-cloned evaluation contexts handed out one per unit of work.

use crate::error::{Error, Result};
use crate::expr::{Context, Formula};
use log::trace;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex};

/// Fixed set of contexts cloned from one formula.
///
/// A slot holding `None` is in use. The lock is held only to pick or return
/// a slot, never while evaluating.
pub struct ContextPool {
    slots: Mutex<Vec<Option<Context>>>,
}

impl ContextPool {
    /// Clones `size` contexts from `formula`.
    pub fn new(formula: &Arc<Formula>, size: usize) -> Result<Self> {
        if size == 0 {
            return Err(Error::InvalidParameter("context pool size must be positive".to_string()));
        }
        let prototype = Context::new(Arc::clone(formula));
        let slots = (0..size).map(|_| Some(prototype.clone())).collect();
        Ok(Self {
            slots: Mutex::new(slots),
        })
    }

    pub fn size(&self) -> usize {
        self.slots.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Number of contexts not currently leased.
    pub fn available(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|s| s.is_some())
            .count()
    }

    /// Takes the first free context for `unit`.
    pub fn acquire(&self, unit: usize) -> Result<Lease<'_>> {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        let index = slots
            .iter()
            .position(Option::is_some)
            .ok_or(Error::PoolExhausted { unit })?;
        let context = slots[index].take();
        trace!("unit {} leased context {}", unit, index);
        Ok(Lease {
            pool: self,
            index,
            context,
        })
    }

    fn release(&self, index: usize, context: Context) {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots[index] = Some(context);
    }
}

/// Exclusive use of one pooled context; returned to the pool on drop.
pub struct Lease<'a> {
    pool: &'a ContextPool,
    index: usize,
    context: Option<Context>,
}

impl Lease<'_> {
    pub fn index(&self) -> usize {
        self.index
    }
}

impl Deref for Lease<'_> {
    type Target = Context;

    fn deref(&self) -> &Context {
        // Only emptied in drop.
        self.context.as_ref().unwrap_or_else(|| unreachable!("lease used after release"))
    }
}

impl DerefMut for Lease<'_> {
    fn deref_mut(&mut self) -> &mut Context {
        self.context.as_mut().unwrap_or_else(|| unreachable!("lease used after release"))
    }
}

impl Drop for Lease<'_> {
    fn drop(&mut self) {
        if let Some(context) = self.context.take() {
            self.pool.release(self.index, context);
        }
    }
}
