mod common;

mod coverage;
mod multithreaded;
mod signal;

use crate::common::TestHooks;
use bcov::debugger::{Debugger, Error, LoggingMode, NopHook, ProcessExit};
use nix::sys::signal::Signal;
use serial_test::serial;
use std::mem;
use std::path::Path;

const CALC_APP: &str = env!("CARGO_BIN_EXE_calc");
const MT_APP: &str = env!("CARGO_BIN_EXE_mt");
const SIGNALS_APP: &str = env!("CARGO_BIN_EXE_signals");
const BCOV_APP: &str = env!("CARGO_BIN_EXE_bcov");

fn launch(app: &str, args: &[&str], logging: LoggingMode) -> Debugger<TestHooks> {
    launch_with_hooks(app, args, logging, TestHooks::default())
}

fn launch_with_hooks(
    app: &str,
    args: &[&str],
    logging: LoggingMode,
    hooks: TestHooks,
) -> Debugger<TestHooks> {
    let args: Vec<String> = args.iter().map(ToString::to_string).collect();
    Debugger::launch(Path::new(app), &args, logging, hooks).unwrap()
}

#[test]
#[serial]
fn test_launch_not_executable() {
    let err = Debugger::launch(
        Path::new("/definitely/not/exists"),
        &[],
        LoggingMode::AlwaysActive,
        NopHook,
    )
    .err()
    .unwrap();
    assert!(matches!(err, Error::ProgramNotExecutable(_)));
    assert!(err.is_fatal());
}

#[test]
#[serial]
fn test_exit_code() {
    let mut debugger = launch(SIGNALS_APP, &["exit", "3"], LoggingMode::AlwaysActive);
    let pid = debugger.pid().unwrap();

    assert_eq!(debugger.run().unwrap(), ProcessExit::Code(3));
    assert_eq!(debugger.pid(), None);
    mem::drop(debugger);

    assert_no_proc!(pid);
}

#[test]
#[serial]
fn test_exit_by_signal() {
    let mut debugger = launch(SIGNALS_APP, &["abort"], LoggingMode::AlwaysActive);
    assert_eq!(
        debugger.run().unwrap(),
        ProcessExit::Signal(Signal::SIGABRT)
    );
}

#[test]
#[serial]
fn test_close_running_program() {
    let mut debugger = launch(MT_APP, &[], LoggingMode::AlwaysActive);
    let pid = debugger.pid().unwrap();
    debugger.close();
    // second close is a no-op
    debugger.close();
    assert_eq!(debugger.pid(), None);

    assert_no_proc!(pid);
}

#[test]
#[serial]
fn test_graceful_shutdown_multithreaded() {
    let mut debugger = launch(MT_APP, &[], LoggingMode::AlwaysActive);
    let pid = debugger.pid().unwrap();

    let bases = debugger.module_bases().unwrap();
    let base = common::program_base(MT_APP, &bases);
    let line = common::marker_line("mt.rs", "work");
    let addresses = common::line_addresses(MT_APP, base, "mt.rs", line);
    debugger.install_breakpoints(addresses).unwrap();

    // stop in a spawned thread
    let progress = debugger.advance().unwrap();
    assert!(matches!(progress, bcov::debugger::Progress::Breakpoint(_, _)));
    mem::drop(debugger);

    assert_no_proc!(pid);
}

#[test]
#[serial]
fn test_cli_usage_errors() {
    let status = std::process::Command::new(BCOV_APP)
        .arg("--help")
        .status()
        .unwrap();
    assert_eq!(status.code(), Some(1));

    let status = std::process::Command::new(BCOV_APP)
        .arg("--version")
        .status()
        .unwrap();
    assert_eq!(status.code(), Some(1));

    let status = std::process::Command::new(BCOV_APP).status().unwrap();
    assert_eq!(status.code(), Some(1));

    let status = std::process::Command::new(BCOV_APP)
        .arg("/definitely/not/exists")
        .status()
        .unwrap();
    assert_eq!(status.code(), Some(1));
}

#[test]
#[serial]
fn test_cli_writes_report() {
    let output = std::env::temp_dir().join("bcov-cli-test.bcovdump");
    _ = std::fs::remove_file(&output);

    let status = std::process::Command::new(BCOV_APP)
        .arg("-o")
        .arg(&output)
        .arg(CALC_APP)
        .arg("an arg")
        .status()
        .unwrap();
    assert_eq!(status.code(), Some(0));

    let dump = std::fs::read_to_string(&output).unwrap();
    let mut lines = dump.lines();
    assert_eq!(
        lines.next().unwrap(),
        format!("command {}", CALC_APP.replace(' ', "\\ "))
    );
    assert_eq!(lines.next().unwrap(), "args an\\ arg");
    assert!(lines.next().unwrap().starts_with("date "));

    let calc_src = common::source_path("calc.rs");
    assert!(dump
        .lines()
        .any(|l| l == format!("file {}", calc_src.display())));

    _ = std::fs::remove_file(&output);
}
