use anyhow::Context;
use bcov::coverage::collector::Collector;
use bcov::debugger::LoggingMode;
use clap::Parser;
use log::{error, info};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

/// Line coverage collector for native programs.
/// Every source line of a program (and optionally of shared libraries) is marked by
/// a breakpoint, lines reached while program runs are written into a report file.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Coverage output file
    #[arg(short = 'o', value_name = "DUMP", env = "BCOV_OUTPUT", default_value = ".bcovdump")]
    output: PathBuf,

    /// Extra library to cover as well
    #[arg(short = 'l', value_name = "LIBRARY")]
    libraries: Vec<PathBuf>,

    /// Catch SIGUSR1 and SIGUSR2 to enable and disable logging, disabled at start
    #[arg(short = 's')]
    signal_gated: bool,

    /// Program and its arguments
    #[arg(required = true, trailing_var_arg = true, num_args = 1..)]
    command: Vec<String>,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            // help and version included
            _ = e.print();
            return ExitCode::FAILURE;
        }
    };

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    let libraries = args
        .libraries
        .iter()
        .map(|lib| {
            fs::canonicalize(lib).with_context(|| format!("unable to resolve {}", lib.display()))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let (program, program_args) = args
        .command
        .split_first()
        .context("command is not specified")?;

    let logging = if args.signal_gated {
        LoggingMode::SignalGated { active: false }
    } else {
        LoggingMode::AlwaysActive
    };

    let coverage = Collector::new(program, program_args.to_vec())
        .with_modules(libraries)
        .with_logging(logging)
        .collect()
        .with_context(|| format!("unable to cover {program}"))?;

    coverage
        .dump(&args.output)
        .with_context(|| format!("unable to write {}", args.output.display()))?;
    info!("coverage info written to {}", args.output.display());

    Ok(())
}
