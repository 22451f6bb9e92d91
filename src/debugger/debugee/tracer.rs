use crate::debugger::debugee::tracee::TraceeCtl;
use crate::debugger::error::Error;
use crate::debugger::error::Error::{Ptrace, Waitpid};
use log::{debug, info, warn};
use nix::errno::Errno;
use nix::libc::pid_t;
use nix::sys::signal::Signal;
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;
use nix::{libc, sys};

/// Signal that turns coverage logging on in signal-gated mode.
pub const ENABLE_LOGGING_SIGNAL: Signal = Signal::SIGUSR1;
/// Signal that turns coverage logging off in signal-gated mode.
pub const DISABLE_LOGGING_SIGNAL: Signal = Signal::SIGUSR2;

/// Coverage logging mode of a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoggingMode {
    /// Every reached breakpoint is counted, toggle signals are delivered to the tracee as is.
    AlwaysActive,
    /// Logging switched on and off by [`ENABLE_LOGGING_SIGNAL`] and [`DISABLE_LOGGING_SIGNAL`],
    /// these signals are never delivered to the tracee.
    SignalGated { active: bool },
}

impl LoggingMode {
    pub fn is_active(&self) -> bool {
        match self {
            LoggingMode::AlwaysActive => true,
            LoggingMode::SignalGated { active } => *active,
        }
    }

    /// Apply a tracee stop signal to the mode.
    /// Return true if signal is consumed as a logging toggle.
    fn toggle(&mut self, signal: Signal) -> bool {
        let LoggingMode::SignalGated { active } = self else {
            return false;
        };

        match signal {
            ENABLE_LOGGING_SIGNAL => {
                info!(target: "tracer", "coverage logging on");
                *active = true;
                true
            }
            DISABLE_LOGGING_SIGNAL => {
                info!(target: "tracer", "coverage logging off");
                *active = false;
                true
            }
            _ => false,
        }
    }
}

/// How the primary traced process terminates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProcessExit {
    /// Exited with code.
    Code(i32),
    /// Killed by signal.
    Signal(Signal),
}

#[derive(Debug, PartialEq)]
pub enum StopReason {
    /// Tracee stopped by a trap signal, it stays stopped until the next [`Tracer::resume`].
    Trap(Pid),
    /// Primary process terminated, tracing is over.
    DebugeeExit(ProcessExit),
}

/// Ptrace event dispatcher. Serializes events of all traced threads through a single wait loop.
pub struct Tracer {
    pub(super) tracee_ctl: TraceeCtl,

    logging: LoggingMode,
    exit: Option<ProcessExit>,
}

impl Tracer {
    pub fn new(proc_pid: Pid, logging: LoggingMode) -> Self {
        Self {
            tracee_ctl: TraceeCtl::new(proc_pid),
            logging,
            exit: None,
        }
    }

    pub fn tracee_ctl(&self) -> &TraceeCtl {
        &self.tracee_ctl
    }

    /// Return current logging mode.
    pub fn logging(&self) -> LoggingMode {
        self.logging
    }

    /// Return primary process exit status, if it already terminated.
    pub fn exited(&self) -> Option<ProcessExit> {
        self.exit
    }

    /// Continue the most recently reported tracee and wait until trap or primary process exit.
    pub fn resume(&mut self) -> Result<StopReason, Error> {
        if let Some(exit) = self.exit {
            return Ok(StopReason::DebugeeExit(exit));
        }

        let tid = self.tracee_ctl.tracee_in_focus();
        self.cont(tid, None)?;
        self.wait()
    }

    /// Wait for events of any traced thread until trap or primary process exit.
    /// Events that are not a trap are handled here and a reporting thread is resumed.
    pub fn wait(&mut self) -> Result<StopReason, Error> {
        loop {
            debug!(target: "tracer", "wait for updates");
            let status = waitpid(Pid::from_raw(-1), Some(WaitPidFlag::__WALL)).map_err(Waitpid)?;
            debug!(target: "tracer", "received new thread status: {status:?}");

            if let Some(stop) = self.apply_new_status(status)? {
                debug!(target: "tracer", "tracee stopped, reason: {stop:?}");
                return Ok(stop);
            }
        }
    }

    fn cont(&mut self, tid: Pid, signal: Option<Signal>) -> Result<(), Error> {
        match self.tracee_ctl.tracee_ensure_mut(tid).r#continue(signal) {
            Ok(()) => Ok(()),
            // thread will be removed later, on exit event
            Err(Errno::ESRCH) => {
                warn!(target: "tracer", "thread {tid} not found, ESRCH");
                Ok(())
            }
            Err(e) => Err(Ptrace(e)),
        }
    }

    /// Handle a ptrace event stop, tracee stays stopped.
    fn apply_ptrace_event(&mut self, pid: Pid, code: i32) -> Result<(), Error> {
        self.tracee_ctl.tracee_ensure_mut(pid).set_stop();
        if code == libc::PTRACE_EVENT_CLONE {
            // fire just before new thread created
            let new_thread_id = Pid::from_raw(sys::ptrace::getevent(pid).map_err(Ptrace)? as pid_t);
            self.tracee_ctl.add_created(new_thread_id);
        } else {
            warn!(target: "tracer", "unsupported (ignored) ptrace event, code: {code}");
        }
        Ok(())
    }

    /// Handle status returned by `waitpid`.
    /// If a trap or a primary process exit detected - returns a stop reason,
    /// otherwise reporting thread is resumed.
    ///
    /// # Arguments
    ///
    /// * `status`: new status returned by `waitpid`.
    fn apply_new_status(&mut self, status: WaitStatus) -> Result<Option<StopReason>, Error> {
        if let Some(pid) = status.pid() {
            self.tracee_ctl.set_tracee_to_focus(pid);
        }

        match status {
            WaitStatus::Stopped(pid, signal) => {
                if self.logging.toggle(signal) {
                    self.tracee_ctl.tracee_ensure_mut(pid).set_stop();
                    self.cont(pid, None)?;
                    return Ok(None);
                }

                if signal == Signal::SIGTRAP {
                    self.tracee_ctl.tracee_ensure_mut(pid).set_stop();
                    return Ok(Some(StopReason::Trap(pid)));
                }

                if signal == Signal::SIGSTOP && self.tracee_ctl.is_starting(pid) {
                    // new thread started, it traced implicitly
                    debug!(target: "tracer", "new thread {pid} started");
                    self.tracee_ctl.tracee_ensure_mut(pid).set_stop();
                    self.cont(pid, None)?;
                    return Ok(None);
                }

                // signal addressed to a tracee, deliver it as is
                self.tracee_ctl.tracee_ensure_mut(pid).set_stop();
                self.cont(pid, Some(signal))?;
                Ok(None)
            }
            WaitStatus::Exited(pid, code) => Ok(self.on_exit(pid, ProcessExit::Code(code))),
            WaitStatus::Signaled(pid, signal, _) => {
                Ok(self.on_exit(pid, ProcessExit::Signal(signal)))
            }
            WaitStatus::PtraceEvent(pid, _signal, code) => {
                self.apply_ptrace_event(pid, code)?;
                self.cont(pid, None)?;
                Ok(None)
            }
            _ => {
                warn!(target: "tracer", "unexpected wait status: {status:?}");
                Ok(None)
            }
        }
    }

    fn on_exit(&mut self, pid: Pid, exit: ProcessExit) -> Option<StopReason> {
        self.tracee_ctl.remove(pid);
        if pid == self.tracee_ctl.proc_pid() {
            self.exit = Some(exit);
            return Some(StopReason::DebugeeExit(exit));
        }
        // secondary thread exit, keep tracing
        None
    }

    /// Execute next instruction of a stopped tracee, tracee stays stopped after that.
    /// Events of other threads are left for the next [`Tracer::wait`].
    ///
    /// returns: `true` if step done, `false` if tracee terminated while stepping.
    ///
    /// # Arguments
    ///
    /// * `pid`: stopped tracee thread id
    pub fn single_step(&mut self, pid: Pid) -> Result<bool, Error> {
        let initial_pc = self
            .tracee_ctl
            .tracee_ensure_mut(pid)
            .pc()
            .map_err(Ptrace)?;
        let mut signal = None;

        loop {
            let tracee = self.tracee_ctl.tracee_ensure_mut(pid);
            tracee.step(signal.take()).map_err(Ptrace)?;
            let status = tracee.wait_one().map_err(Waitpid)?;

            match status {
                WaitStatus::Stopped(_, Signal::SIGTRAP) => {
                    tracee.set_stop();
                    // check that we are not on original pc value
                    if tracee.pc().map_err(Ptrace)? == initial_pc {
                        continue;
                    }
                    return Ok(true);
                }
                WaitStatus::Stopped(_, sig) => {
                    tracee.set_stop();
                    if !self.logging.toggle(sig) {
                        // instruction not executed yet, inject signal at next step
                        signal = Some(sig);
                    }
                }
                WaitStatus::PtraceEvent(_, _, code) => {
                    self.apply_ptrace_event(pid, code)?;
                }
                WaitStatus::Exited(_, _) | WaitStatus::Signaled(_, _, _) => {
                    self.apply_new_status(status)?;
                    return Ok(false);
                }
                _ => {
                    warn!(target: "tracer", "unexpected wait status while stepping: {status:?}");
                    return Ok(false);
                }
            }
        }
    }
}
