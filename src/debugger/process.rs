use crate::debugger::debugee::ModuleBaseTable;
use crate::debugger::error::Error;
use crate::debugger::error::Error::{Ptrace, Waitpid};
use crate::muted_error;
use log::debug;
use nix::errno::Errno;
use nix::sys;
use nix::sys::ptrace::Options;
use nix::sys::signal::{self, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{access, AccessFlags, Pid};
use std::io;
use std::marker::PhantomData;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Process state.
pub trait State {}

/// Process running and traced with `ptrace` system call.
pub struct Installed;

impl State for Installed {}

/// Process prepared for launch.
pub struct Template;

impl State for Template {}

/// Process traced by this tracer.
pub struct Child<S: State> {
    program: PathBuf,
    args: Vec<String>,
    pid: Option<Pid>,
    _p: PhantomData<S>,
}

impl Child<Template> {
    /// Create new process, but dont start it.
    ///
    /// # Arguments
    ///
    /// * `program`: path to executable, `PATH` is not searched
    /// * `args`: program arguments
    pub fn new<ARGS: IntoIterator<Item = I>, I: Into<String>>(
        program: impl Into<PathBuf>,
        args: ARGS,
    ) -> Child<Template> {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            pid: None,
            _p: PhantomData,
        }
    }

    /// Spawn the program traced from its very first instruction.
    /// After installation process stopped at `exec` and automatic tracing
    /// of new threads is enabled.
    pub fn install(&self) -> Result<Child<Installed>, Error> {
        access(&self.program, AccessFlags::X_OK)
            .map_err(|_| Error::ProgramNotExecutable(self.program.clone()))?;

        let mut debugee_cmd = Command::new(exec_path(&self.program));
        debugee_cmd.args(&self.args);
        unsafe {
            debugee_cmd.pre_exec(|| sys::ptrace::traceme().map_err(io::Error::from));
        }

        let child = debugee_cmd.spawn().map_err(Error::Spawn)?;
        let pid = Pid::from_raw(child.id() as i32);

        let mut installed = Child {
            program: self.program.clone(),
            args: self.args.clone(),
            pid: Some(pid),
            _p: PhantomData,
        };

        match waitpid(pid, Some(WaitPidFlag::__WALL)) {
            Ok(WaitStatus::Stopped(_, _)) => {}
            Ok(status) => {
                installed.close();
                return Err(Error::InitialStop(status));
            }
            Err(e) => {
                installed.close();
                return Err(Waitpid(e));
            }
        }

        if let Err(e) = sys::ptrace::setoptions(pid, Options::PTRACE_O_TRACECLONE) {
            installed.close();
            return Err(Ptrace(e));
        }

        debug!(target: "debugger", "process {pid} stopped at exec");
        Ok(installed)
    }
}

impl Child<Installed> {
    /// Return traced process pid, `None` if process is closed.
    pub fn pid(&self) -> Option<Pid> {
        self.pid
    }

    /// Scan memory map of running process for module load addresses.
    pub fn module_bases(&self) -> Result<ModuleBaseTable, Error> {
        let pid = self.pid.ok_or(Error::ProcessNotStarted)?;
        ModuleBaseTable::discover(pid)
    }

    /// Forget a process that already terminated and reaped by a tracer.
    pub fn release(&mut self) {
        self.pid = None;
    }

    /// Terminate process if it still alive. Calling `close` more than once is a no-op.
    pub fn close(&mut self) {
        let Some(pid) = self.pid.take() else {
            return;
        };

        match signal::kill(pid, Signal::SIGKILL) {
            // already reaped
            Err(Errno::ESRCH) => return,
            res => {
                muted_error!(
                    res.map_err(|e| Error::Syscall("kill", e)),
                    "kill traced process:"
                );
            }
        }

        // collect zombies, threads must be reaped before the main one is reported
        loop {
            match waitpid(Pid::from_raw(-1), Some(WaitPidFlag::__WALL)) {
                Ok(WaitStatus::Exited(p, _)) | Ok(WaitStatus::Signaled(p, _, _)) if p == pid => {
                    break
                }
                Ok(_) => continue,
                Err(_) => break,
            }
        }
        debug!(target: "debugger", "process {pid} closed");
    }
}

/// `Command` searches `PATH` for a bare program name, prefix it with a current dir
/// so that exactly checked file is launched.
fn exec_path(program: &Path) -> PathBuf {
    if program.components().count() == 1 && program.is_relative() {
        return Path::new(".").join(program);
    }
    program.to_path_buf()
}
