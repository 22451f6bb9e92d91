use nix::errno::Errno;
use nix::sys::wait::WaitStatus;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    // --------------------------------- generic errors --------------------------------------------
    #[error(transparent)]
    IO(#[from] std::io::Error),

    // --------------------------------- launch errors ---------------------------------------------
    #[error("program `{0}` not found or not executable")]
    ProgramNotExecutable(PathBuf),
    #[error("spawn traced process: {0}")]
    Spawn(std::io::Error),
    #[error("traced process not stopped after launch, wait status: {0:?}")]
    InitialStop(WaitStatus),
    #[error("program is not being started")]
    ProcessNotStarted,

    // --------------------------------- syscall errors --------------------------------------------
    #[error("waitpid syscall error: {0}")]
    Waitpid(nix::Error),
    #[error("ptrace syscall error: {0}")]
    Ptrace(nix::Error),
    #[error("{0} syscall error: {1}")]
    Syscall(&'static str, nix::Error),

    // --------------------------------- parsing errors --------------------------------------------
    #[error("dwarf file parsing error: {0}")]
    DwarfParsing(#[from] gimli::Error),
    #[error("object file parsing error: {0}")]
    ObjParsing(#[from] object::Error),

    // --------------------------------- memory map errors -----------------------------------------
    #[error("memory region not found for a file: {0}")]
    MappingNotFound(String),
}

impl Error {
    /// Return a hint to the run loop - continue tracing after error or stop it.
    pub fn is_fatal(&self) -> bool {
        match self {
            // tracee thread gone between its stop report and our request
            Error::Ptrace(Errno::ESRCH) => false,
            Error::MappingNotFound(_) => false,

            Error::IO(_) => true,
            Error::ProgramNotExecutable(_) => true,
            Error::Spawn(_) => true,
            Error::InitialStop(_) => true,
            Error::ProcessNotStarted => true,
            Error::Waitpid(_) => true,
            Error::Ptrace(_) => true,
            Error::Syscall(_, _) => true,
            Error::DwarfParsing(_) => true,
            Error::ObjParsing(_) => true,
        }
    }
}

#[macro_export]
macro_rules! _error {
    ($log_fn: path, $res: expr) => {
        match $res {
            Ok(value) => Some(value),
            Err(e) => {
                $log_fn!(target: "debugger", "{:#}", e);
                None
            }
        }
    };
    ($log_fn: path, $res: expr, $msg: tt) => {
        match $res {
            Ok(value) => Some(value),
            Err(e) => {
                $log_fn!(target: "debugger", concat!($msg, " {:#}"), e);
                None
            }
        }
    };
}

/// Transforms `Result` into `Option` and logs an error if it occurs.
#[macro_export]
macro_rules! weak_error {
    ($res: expr) => {
        $crate::_error!(log::warn, $res)
    };
    ($res: expr, $msg: tt) => {
        $crate::_error!(log::warn, $res, $msg)
    };
}

/// Transforms `Result` into `Option` and put error into debug logs if it occurs.
#[macro_export]
macro_rules! muted_error {
    ($res: expr) => {
        $crate::_error!(log::debug, $res)
    };
    ($res: expr, $msg: tt) => {
        $crate::_error!(log::debug, $res, $msg)
    };
}
