pub mod address;
pub mod breakpoint;
pub mod debugee;
pub mod dwarf;
pub mod error;
pub mod memory;
pub mod process;
pub mod register;

pub use breakpoint::{BreakpointTable, Resolution};
pub use debugee::tracer::{LoggingMode, ProcessExit};
pub use debugee::ModuleBaseTable;
pub use error::Error;

use crate::debugger::address::RemoteAddress;
use crate::debugger::debugee::tracer::{StopReason, Tracer};
use crate::debugger::process::{Child, Installed};
use crate::weak_error;
use log::{debug, warn};
use nix::unistd::Pid;
use std::path::Path;

/// Observer of a traced run.
pub trait EventHook {
    /// Tracee reached a breakpoint, breakpoint already resolved.
    fn on_breakpoint(&self, addr: RemoteAddress, resolution: Resolution);
    /// Tracee trapped not at a breakpoint (explicit `int3` or `SIGTRAP` raised by a program).
    fn on_foreign_trap(&self, pid: Pid);
    /// Primary process terminated.
    fn on_exit(&self, exit: ProcessExit);
}

/// Hook that ignores all events.
pub struct NopHook;

impl EventHook for NopHook {
    fn on_breakpoint(&self, _: RemoteAddress, _: Resolution) {}
    fn on_foreign_trap(&self, _: Pid) {}
    fn on_exit(&self, _: ProcessExit) {}
}

/// Result of a single [`Debugger::advance`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    Breakpoint(RemoteAddress, Resolution),
    ForeignTrap(Pid),
    Exited(ProcessExit),
}

/// Single traced run: a traced process, its events dispatcher and its breakpoints.
pub struct Debugger<H: EventHook> {
    process: Child<Installed>,
    tracer: Tracer,
    breakpoints: BreakpointTable,
    hooks: H,
}

impl<H: EventHook> Debugger<H> {
    /// Launch a program stopped before its first instruction.
    ///
    /// # Arguments
    ///
    /// * `program`: path to executable
    /// * `args`: program arguments
    /// * `logging`: initial coverage logging mode
    /// * `hooks`: run observer
    pub fn launch(
        program: &Path,
        args: &[String],
        logging: LoggingMode,
        hooks: H,
    ) -> Result<Self, Error> {
        let process = Child::new(program, args.iter().cloned()).install()?;
        let pid = process.pid().ok_or(Error::ProcessNotStarted)?;

        Ok(Self {
            process,
            tracer: Tracer::new(pid, logging),
            breakpoints: BreakpointTable::default(),
            hooks,
        })
    }

    /// Return primary process pid, `None` if process terminated or closed.
    pub fn pid(&self) -> Option<Pid> {
        self.process.pid()
    }

    pub fn breakpoints(&self) -> &BreakpointTable {
        &self.breakpoints
    }

    /// Return load addresses of modules mapped into a traced process.
    pub fn module_bases(&self) -> Result<ModuleBaseTable, Error> {
        self.process.module_bases()
    }

    /// Set breakpoints at addresses, the last reported thread is used for memory access.
    /// Return number of new breakpoints.
    pub fn install_breakpoints(
        &mut self,
        addresses: impl IntoIterator<Item = RemoteAddress>,
    ) -> Result<usize, Error> {
        let pid = self.stopped_thread()?;
        self.breakpoints.install(pid, addresses)
    }

    /// Restore original code at all armed breakpoints.
    pub fn remove_breakpoints(&mut self) -> Result<(), Error> {
        let pid = self.stopped_thread()?;
        self.breakpoints.remove(pid)
    }

    /// Read a byte of traced process memory.
    pub fn read_byte(&self, addr: RemoteAddress) -> Result<u8, Error> {
        memory::read_byte(self.stopped_thread()?, addr)
    }

    fn stopped_thread(&self) -> Result<Pid, Error> {
        if self.tracer.exited().is_some() || self.process.pid().is_none() {
            return Err(Error::ProcessNotStarted);
        }
        Ok(self.tracer.tracee_ctl().tracee_in_focus())
    }

    /// Continue execution until the next trap or primary process exit.
    /// A trap at a breakpoint is resolved before return: with active coverage logging
    /// breakpoint is disarmed and counted, otherwise it rearmed.
    pub fn advance(&mut self) -> Result<Progress, Error> {
        match self.tracer.resume()? {
            StopReason::DebugeeExit(exit) => {
                debug!(target: "debugger", "program exit: {exit:?}");
                self.process.release();
                Ok(Progress::Exited(exit))
            }
            StopReason::Trap(pid) => {
                let resolution = if self.tracer.logging().is_active() {
                    Resolution::Disarm
                } else {
                    Resolution::Rearm
                };

                let progress = match self
                    .breakpoints
                    .resolve_hit(&mut self.tracer, pid, resolution)?
                {
                    Some(addr) => Progress::Breakpoint(addr, resolution),
                    None => Progress::ForeignTrap(pid),
                };
                Ok(progress)
            }
        }
    }

    /// Like [`Debugger::advance`] but notify hooks about progress.
    /// Return exit status if primary process terminated.
    pub fn dispatch(&mut self) -> Result<Option<ProcessExit>, Error> {
        match self.advance()? {
            Progress::Breakpoint(addr, resolution) => {
                self.hooks.on_breakpoint(addr, resolution);
                Ok(None)
            }
            Progress::ForeignTrap(pid) => {
                self.hooks.on_foreign_trap(pid);
                Ok(None)
            }
            Progress::Exited(exit) => {
                self.hooks.on_exit(exit);
                Ok(Some(exit))
            }
        }
    }

    /// Dispatch events until primary process terminated.
    /// Non fatal errors are logged and tracing goes on.
    pub fn run(&mut self) -> Result<ProcessExit, Error> {
        loop {
            match self.dispatch() {
                Ok(Some(exit)) => return Ok(exit),
                Ok(None) => {}
                Err(e) if !e.is_fatal() => {
                    warn!(target: "debugger", "{e:#}");
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Kill traced process if it still alive, breakpoints removed before that.
    pub fn close(&mut self) {
        if self.process.pid().is_none() {
            return;
        }
        if self.tracer.exited().is_some() {
            self.process.release();
            return;
        }

        weak_error!(self.remove_breakpoints(), "remove breakpoints:");
        self.process.close();
    }
}

impl<H: EventHook> Drop for Debugger<H> {
    fn drop(&mut self) {
        self.close();
    }
}
