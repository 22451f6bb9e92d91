use crate::coverage::dump::{self, RunInfo};
use crate::coverage::{build_report, collect_addresses, CoverageReport, SourceLineMap};
use crate::debugger::address::RemoteAddress;
use crate::debugger::dwarf::DebugInformation;
use crate::debugger::{Debugger, Error, EventHook, LoggingMode, ProcessExit, Resolution};
use log::{debug, error, info, warn};
use nix::unistd::Pid;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Collected coverage of a single program run.
#[derive(Debug)]
pub struct Coverage {
    pub run: RunInfo,
    pub report: CoverageReport,
    /// Program exit status, `None` if tracing stopped by an error.
    pub exit: Option<ProcessExit>,
}

impl Coverage {
    /// Write coverage report into a file.
    pub fn dump(&self, path: &Path) -> io::Result<()> {
        dump::dump(path, &self.run, &self.report)
    }
}

struct CoverageHook;

impl EventHook for CoverageHook {
    fn on_breakpoint(&self, addr: RemoteAddress, resolution: Resolution) {
        debug!(target: "coverage", "breakpoint at {addr} resolved: {resolution:?}");
    }

    fn on_foreign_trap(&self, pid: Pid) {
        debug!(target: "coverage", "unknown trap in thread {pid}, ignored");
    }

    fn on_exit(&self, exit: ProcessExit) {
        info!(target: "coverage", "program terminated: {exit:?}");
    }
}

/// Line coverage collector. Launch a program under tracing, set breakpoints at every source
/// line and count reached lines until the program terminates.
pub struct Collector {
    program: PathBuf,
    args: Vec<String>,
    modules: Vec<PathBuf>,
    logging: LoggingMode,
}

impl Collector {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            modules: vec![],
            logging: LoggingMode::AlwaysActive,
        }
    }

    /// Cover shared libraries too.
    ///
    /// # Arguments
    ///
    /// * `modules`: absolute paths of shared libraries
    pub fn with_modules(self, modules: Vec<PathBuf>) -> Self {
        Self { modules, ..self }
    }

    pub fn with_logging(self, logging: LoggingMode) -> Self {
        Self { logging, ..self }
    }

    /// Run a program to completion.
    /// Errors of launch, debug information reading or breakpoint installation are returned,
    /// an error while program runs only stops tracing, coverage gathered so far is kept.
    pub fn collect(self) -> Result<Coverage, Error> {
        let run = RunInfo::new(self.program.to_string_lossy(), self.args.clone());

        let mut debugger = Debugger::launch(&self.program, &self.args, self.logging, CoverageHook)?;

        info!(target: "coverage", "probing debug information for {} ...", self.program.display());
        let debug_info = DebugInformation::load(&self.program)?;
        let base = if debug_info.is_relocatable() {
            let exe = fs::canonicalize(&self.program)?;
            debugger.module_bases()?.base_of(&exe)?
        } else {
            0
        };
        let mut lines = debug_info.source_lines(base);
        info!(target: "coverage", "found active lines in {} source files", lines.len());

        let installed = debugger.install_breakpoints(collect_addresses(&lines))?;
        info!(target: "coverage", "set {installed} breakpoints");

        let mut exit = None;
        let mut stopped = false;
        if !self.modules.is_empty() {
            // shared libraries are mapped by the time of a first trap
            match debugger.dispatch() {
                Ok(Some(e)) => {
                    exit = Some(e);
                    stopped = true;
                }
                Err(e) if e.is_fatal() => {
                    error!(target: "coverage", "error encountered while tracing: {e:#}");
                    stopped = true;
                }
                res => {
                    if let Err(e) = res {
                        warn!(target: "coverage", "{e:#}");
                    }

                    let module_lines = self.probe_modules(&debugger)?;
                    let installed =
                        debugger.install_breakpoints(collect_addresses(&module_lines))?;
                    info!(target: "coverage", "set {installed} more breakpoints");
                    lines.merge(module_lines);
                }
            }
        }

        if !stopped {
            match debugger.run() {
                Ok(e) => exit = Some(e),
                Err(e) => error!(target: "coverage", "error encountered while tracing: {e:#}"),
            }
        }
        debugger.close();

        Ok(Coverage {
            run,
            report: build_report(&lines, debugger.breakpoints()),
            exit,
        })
    }

    fn probe_modules(&self, debugger: &Debugger<CoverageHook>) -> Result<SourceLineMap, Error> {
        let bases = debugger.module_bases()?;
        let mut module_lines = SourceLineMap::default();

        for module in &self.modules {
            let base = match bases.base_of(module) {
                Ok(base) => base,
                Err(e) => {
                    warn!(target: "coverage", "module skipped: {e:#}");
                    continue;
                }
            };

            info!(
                target: "coverage",
                "probing debug information for {} loaded at {base:#x} ...",
                module.display()
            );
            let lines = DebugInformation::load(module)?.source_lines(base);
            info!(target: "coverage", "found active lines in {} source files", lines.len());
            module_lines.merge(lines);
        }

        Ok(module_lines)
    }
}
