// src/grid/scheduler.rs

//! Bounded fan-out of per-column work across a fixed set of workers.
//!
//! Threading model:
//! - `workers` scoped threads pull column indices from a shared queue.
//! - Each unit leases a context from the [`ContextPool`] for its whole column.
//! - The orchestrator keeps at most `workers` units in flight and only submits
//!   a new one after consuming a finished result, so the queue never grows.
//! - The first failed unit stops submission; units still in flight are
//!   drained and their results discarded before the error is returned.

use super::{ContextPool, Extrema, Field, Plane};
use crate::error::{Error, Result};
use crate::expr::{Context, Formula};
use log::{debug, info, warn};
use num_complex::Complex64;
use std::sync::mpsc::{channel, sync_channel, Receiver};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Instant;

/// One finished column.
struct Scanline {
    column: usize,
    line: Vec<Complex64>,
    extrema: Extrema,
}

/// `configured`, or the available hardware parallelism, at least 1.
pub fn worker_count(configured: Option<usize>) -> usize {
    match configured {
        Some(n) if n > 0 => n,
        _ => thread::available_parallelism().map(|n| n.get()).unwrap_or(1),
    }
}

fn scan_column<F>(pool: &ContextPool, column: usize, height: usize, cell: &F) -> Result<Scanline>
where
    F: Fn(&mut Context, usize, usize) -> Result<Complex64>,
{
    let mut lease = pool.acquire(column)?;
    let mut line = Vec::with_capacity(height);
    let mut extrema = Extrema::default();
    for row in 0..height {
        let z = cell(&mut *lease, column, row)?;
        extrema.observe(z);
        line.push(z);
    }
    Ok(Scanline {
        column,
        line,
        extrema,
    })
}

fn next_result(results: &Receiver<Result<Scanline>>, column: usize) -> Result<Scanline> {
    // Disconnection means every worker is gone; nothing can complete the pass.
    results
        .recv()
        .unwrap_or(Err(Error::PoolExhausted { unit: column }))
}

/// Evaluates `cell(context, column, row)` for every sample of a
/// `width` x `height` grid using `workers` cloned contexts.
///
/// Columns land at their own index, so the result does not depend on the
/// order in which units complete.
pub fn run_grid<F>(
    formula: &Arc<Formula>,
    width: usize,
    height: usize,
    workers: usize,
    cell: F,
) -> Result<Field>
where
    F: Fn(&mut Context, usize, usize) -> Result<Complex64> + Sync,
{
    if width == 0 || height == 0 {
        return Err(Error::InvalidParameter(format!(
            "grid must be at least 1x1, got {}x{}",
            width, height
        )));
    }
    let workers = workers.max(1);
    let pool = ContextPool::new(formula, workers)?;
    let started = Instant::now();
    debug!(
        "Grid pass '{}': {}x{} on {} workers",
        formula.source(),
        width,
        height,
        workers
    );

    let (job_tx, job_rx) = sync_channel::<usize>(workers);
    let job_rx = Mutex::new(job_rx);
    let (result_tx, result_rx) = channel::<Result<Scanline>>();

    let mut columns: Vec<Vec<Complex64>> = vec![Vec::new(); width];
    let mut extrema = Extrema::default();

    let outcome = thread::scope(|s| {
        for _ in 0..workers {
            let result_tx = result_tx.clone();
            let job_rx = &job_rx;
            let pool = &pool;
            let cell = &cell;
            s.spawn(move || loop {
                let job = job_rx.lock().unwrap_or_else(|e| e.into_inner()).recv();
                let Ok(column) = job else { break };
                if result_tx.send(scan_column(pool, column, height, cell)).is_err() {
                    break;
                }
            });
        }
        drop(result_tx);

        let mut absorb = |scanline: Scanline| {
            extrema.merge(&scanline.extrema);
            columns[scanline.column] = scanline.line;
        };

        let mut in_flight = 0usize;
        let mut failure: Option<Error> = None;
        for column in 0..width {
            if in_flight == workers {
                in_flight -= 1;
                match next_result(&result_rx, column) {
                    Ok(scanline) => absorb(scanline),
                    Err(e) => {
                        failure = Some(e);
                        break;
                    }
                }
            }
            if job_tx.send(column).is_err() {
                failure = Some(Error::PoolExhausted { unit: column });
                break;
            }
            in_flight += 1;
        }
        // Workers exit once the queue is closed and empty.
        drop(job_tx);

        while in_flight > 0 {
            in_flight -= 1;
            match next_result(&result_rx, width) {
                Ok(scanline) if failure.is_none() => absorb(scanline),
                Ok(_) => {}
                Err(e) => {
                    if failure.is_none() {
                        failure = Some(e);
                    }
                }
            }
        }
        failure
    });

    if let Some(e) = outcome {
        warn!("Grid pass '{}' aborted: {}", formula.source(), e);
        return Err(e);
    }

    let elapsed = started.elapsed();
    let samples = (width * height) as f64;
    info!(
        "Processed {}x{} in {:?}, MPPS: {:.3}, threads: {}",
        width,
        height,
        elapsed,
        (samples / elapsed.as_secs_f64().max(f64::EPSILON)) / 1048576.0,
        workers
    );

    let values = columns.into_iter().flatten().collect();
    Ok(Field {
        width,
        height,
        values,
        extrema,
    })
}

/// Validates a one-argument formula, then evaluates `f(z)` over every
/// coordinate of `plane`.
pub fn evaluate_plane(
    formula: &Arc<Formula>,
    plane: &Plane,
    width: usize,
    height: usize,
    workers: usize,
) -> Result<Field> {
    plane.validate()?;
    Context::new(Arc::clone(formula)).validate(1)?;
    let plane = *plane;
    let field = run_grid(formula, width, height, workers, |ctx, column, row| {
        ctx.evaluate(&[plane.coordinate(column, row, width, height)])
    })?;
    let e = field.extrema();
    info!(
        "Values range: {}+{}i - {}+{}i, modulo range: {} - {}",
        e.min[0], e.min[1], e.max[0], e.max[1], e.min[2], e.max[2]
    );
    Ok(field)
}
