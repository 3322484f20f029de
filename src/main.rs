use std::process::ExitCode;

use anyhow::{Context, Result};
use env_logger::Env;
use log::{error, info};

use cachesim_coherence::regression;
use cachesim_coherence::{Protocol, System, SystemSpec};

const SELECTORS: [&str; 6] = ["NONE", "VI", "MSI", "MESI", "MOSI", "MOESI"];

fn parse_arg<T: std::str::FromStr>(args: &[String], i: usize, name: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match args.get(i) {
        Some(a) => a.parse().with_context(|| format!("invalid {}: {}", name, a)),
        None => Ok(default),
    }
}

/// spec for one selector, the remaining arguments override the defaults
fn spec_from_args(selector: &str, args: &[String]) -> Result<SystemSpec> {
    let protocol = Protocol::from_selector(selector)?;
    let mut spec = regression::default_spec(protocol);
    spec.num_cpus = parse_arg(args, 1, "cpu count", spec.num_cpus)?;
    spec.cache_lines = parse_arg(args, 2, "cache lines", spec.cache_lines)?;
    let memory_lines = spec.memory_lines();
    spec.offset_bits = parse_arg(args, 3, "offset bits", spec.offset_bits)?;
    let memory_lines = parse_arg(args, 4, "memory lines", memory_lines)?;
    Ok(spec.with_memory_lines(memory_lines)?)
}

fn run(spec: SystemSpec) -> Result<bool> {
    let mut system = System::new(spec.clone()).with_context(|| format!("cannot build {:?}", spec))?;
    let report = regression::run(&mut system, &regression::default_script());
    println!(" ");
    println!("{}", report);
    if !report.passed() {
        error!("{}: {} failed steps", report.title, report.failures());
    }
    Ok(report.passed())
}

fn main() -> Result<ExitCode> {
    // logging
    let env = Env::default()
        .filter_or("CACHESIM_LOG", "info")
        .write_style_or("CACHESIM_LOG_STYLE", "always");
    env_logger::init_from_env(env);

    let args: Vec<String> = std::env::args().skip(1).collect();
    let specs = match args.first() {
        Some(selector) => vec![spec_from_args(selector, &args)?],
        None => SELECTORS
            .iter()
            .map(|s| spec_from_args(s, &args))
            .collect::<Result<Vec<_>>>()?,
    };

    let mut passed = true;
    for spec in specs {
        passed &= run(spec)?;
    }
    if passed {
        info!("all regression runs passed");
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
