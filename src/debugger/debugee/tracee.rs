use crate::debugger::address::RemoteAddress;
use crate::debugger::debugee::tracee::TraceeStatus::{Created, Running, Stopped};
use crate::debugger::register::RegisterMap;
use log::debug;
use nix::sys;
use nix::sys::signal::Signal;
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;
use std::collections::HashMap;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TraceeStatus {
    /// Thread announced by a clone event, its creation stop not observed yet.
    Created,
    Stopped,
    Running,
}

/// Tracee is a thread attached to tracer with ptrace.
#[derive(Clone, Debug, PartialEq)]
pub struct Tracee {
    /// Tracee thread id.
    pub pid: Pid,
    /// Tracee current status.
    pub status: TraceeStatus,
}

impl Tracee {
    /// Wait for change of tracee status.
    pub fn wait_one(&self) -> nix::Result<WaitStatus> {
        debug!(target: "tracer", "wait for tracee status, thread {pid}", pid = self.pid);
        let status = waitpid(self.pid, Some(WaitPidFlag::__WALL))?;
        debug!(target: "tracer", "receive tracee status, thread {pid}, status: {status:?}", pid = self.pid);
        Ok(status)
    }

    fn update_status(&mut self, status: TraceeStatus) {
        debug!(
            target: "tracer",
            "tracee accept new status ({status:?}), thread: {pid}",
            pid = self.pid
        );
        self.status = status
    }

    /// Resume tracee, if signal is some - inject signal at resuming.
    pub fn r#continue(&mut self, sig: Option<Signal>) -> nix::Result<()> {
        debug!(
            target: "tracer",
            "continue tracee execution with signal {sig:?}, thread: {pid}",
            pid = self.pid,
        );

        sys::ptrace::cont(self.pid, sig).map(|ok| {
            self.update_status(Running);
            ok
        })
    }

    /// Execute exactly one instruction, if signal is some - inject signal at resuming.
    pub fn step(&mut self, sig: Option<Signal>) -> nix::Result<()> {
        sys::ptrace::step(self.pid, sig).map(|ok| {
            self.update_status(Running);
            ok
        })
    }

    /// Set tracee status into stop.
    ///
    /// Note: this function does not actually stop the tracee.
    pub fn set_stop(&mut self) {
        self.update_status(Stopped);
    }

    /// Returns true if tracee in stopping status.
    pub fn is_stopped(&self) -> bool {
        self.status == Stopped
    }

    /// Get current program counter value.
    pub fn pc(&self) -> nix::Result<RemoteAddress> {
        RegisterMap::current(self.pid).map(|reg_map| reg_map.pc())
    }

    /// Set new program counter value.
    pub fn set_pc(&self, value: RemoteAddress) -> nix::Result<()> {
        let mut map = RegisterMap::current(self.pid)?;
        map.set_pc(value);
        map.persist(self.pid)
    }
}

/// Registry of traced process threads.
pub struct TraceeCtl {
    process_pid: Pid,
    in_focus_tid: Pid,
    threads_state: HashMap<Pid, Tracee>,
}

impl TraceeCtl {
    pub fn new(proc_pid: Pid) -> TraceeCtl {
        Self {
            process_pid: proc_pid,
            in_focus_tid: proc_pid,
            threads_state: HashMap::from([(
                proc_pid,
                Tracee {
                    pid: proc_pid,
                    status: Stopped,
                },
            )]),
        }
    }

    pub(crate) fn tracee(&self, pid: Pid) -> Option<&Tracee> {
        self.threads_state.get(&pid)
    }

    /// Return tracee with thread id `pid`, register it first if thread is unknown.
    pub(crate) fn tracee_ensure_mut(&mut self, pid: Pid) -> &mut Tracee {
        self.threads_state.entry(pid).or_insert_with(|| {
            debug!(target: "tracer", "register unseen tracee, thread: {pid}");
            Tracee {
                pid,
                status: Stopped,
            }
        })
    }

    /// Return pid of traced process main thread.
    pub fn proc_pid(&self) -> Pid {
        self.process_pid
    }

    /// Set tracee into focus.
    pub fn set_tracee_to_focus(&mut self, tid: Pid) {
        self.in_focus_tid = tid
    }

    /// Return the most recently reported tracee.
    pub fn tracee_in_focus(&self) -> Pid {
        self.in_focus_tid
    }

    /// Adds thread in `created` status.
    /// `created` actual for PTRACE_EVENT_CLONE, when we known about new thread but
    /// its creation stop not received yet.
    pub fn add_created(&mut self, pid: Pid) {
        debug!(target: "tracer", "add new tracee, thread: {pid}");
        self.threads_state.entry(pid).or_insert(Tracee {
            pid,
            status: Created,
        });
    }

    /// Returns true if thread is unknown or announced by clone event and not started yet.
    pub fn is_starting(&self, pid: Pid) -> bool {
        self.threads_state
            .get(&pid)
            .map(|t| t.status == Created)
            .unwrap_or(true)
    }

    /// Remove thread from registry.
    pub fn remove(&mut self, pid: Pid) -> Option<Tracee> {
        debug!(target: "tracer", "remove tracee, thread: {pid}");
        self.threads_state.remove(&pid)
    }
}
