// src/main.rs

//! Command line evaluator: `fparplot '<formula>' [arg1 [arg2 [arg3 [arg4]]]]`.
//!
//! Every argument is itself a formula evaluated once with `x1 = 0`, so
//! `'complex(1, -2)'` or `'cexp(1)'` work as inputs. `LIB` names a shared
//! library whose exports extend the builtins, `NF` bounds its function table
//! and `ABI` (`real` or `complex`) selects its calling convention.

use std::env;
use std::sync::Arc;

use anyhow::{bail, Context as _};
use log::{debug, info};
use num_complex::Complex64;

use fparplot::native::{Abi, DEFAULT_MAX_FUNCTIONS};
use fparplot::{Builtins, Context, FunctionProvider, Layered, Mode, NativeLibrary};

const USAGE: &str = "usage: fparplot '<formula>' [arg1 [arg2 [arg3 [arg4]]]]\n\
    example: LIB=libm.so.6 fparplot 'csin(x1)*ccos(x2)*cpow(x3, x4)' 1 -2 3 'complex(0, 4)'";

fn provider() -> anyhow::Result<Arc<dyn FunctionProvider>> {
    let Ok(path) = env::var("LIB") else {
        return Ok(Arc::new(Builtins));
    };
    let max_functions = match env::var("NF") {
        Ok(s) => s
            .parse::<usize>()
            .with_context(|| format!("NF must be a number, got '{}'", s))?,
        Err(_) => DEFAULT_MAX_FUNCTIONS,
    };
    let abi = match env::var("ABI").as_deref() {
        Ok("complex") => Abi::Complex,
        Ok("real") | Err(_) => Abi::Real,
        Ok(other) => bail!("ABI must be 'real' or 'complex', got '{}'", other),
    };
    let library = NativeLibrary::open(&path, abi, max_functions)
        .with_context(|| format!("LIB init failed for: {}", path))?;
    Ok(Arc::new(Layered::new(Builtins, library)))
}

fn render(z: Complex64) -> String {
    format!("{}+{}i", z.re, z.im)
}

fn run(formula: &str, inputs: &[String]) -> anyhow::Result<()> {
    if inputs.len() > 4 {
        bail!("maximum 4 arguments are allowed");
    }
    let provider = provider()?;

    let mut f = Context::compile(formula, Mode::Complex, Some(Arc::clone(&provider)))?;
    f.validate(4).with_context(|| format!("formula '{}'", formula))?;

    let mut args = [Complex64::new(0.0, 0.0); 4];
    for (slot, input) in args.iter_mut().zip(inputs) {
        let mut ctx = Context::compile(input, Mode::Complex, Some(Arc::clone(&provider)))?;
        *slot = ctx
            .validate(1)
            .with_context(|| format!("argument '{}'", input))?;
        debug!("argument '{}' = {}", input, slot);
    }

    let fz = f.evaluate(&args)?;
    let shown = &args[..inputs.len()];
    println!(
        "f({}) = {}",
        shown.iter().map(|&z| render(z)).collect::<Vec<_>>().join(", "),
        render(fz)
    );
    println!("|'{}'({})| = {}", formula, inputs.join(", "), fz.norm());

    let mut csv: Vec<String> = shown
        .iter()
        .map(|z| format!("{},{},{}", z.re, z.im, z.norm()))
        .collect();
    csv.push(format!("{},{},{}", fz.re, fz.im, fz.norm()));
    eprintln!("{}", csv.join(","));
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_micros()
        .init();

    let argv: Vec<String> = env::args().collect();
    let Some(formula) = argv.get(1) else {
        println!("{}", USAGE);
        return Ok(());
    };
    info!("Evaluating '{}' with {} argument(s)", formula, argv.len() - 2);
    run(formula, &argv[2..])
}
