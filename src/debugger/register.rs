use crate::debugger::address::RemoteAddress;
use nix::libc::user_regs_struct;
use nix::sys;
use nix::unistd::Pid;

/// General purpose registers of a stopped tracee.
pub struct RegisterMap(user_regs_struct);

impl RegisterMap {
    pub fn current(pid: Pid) -> nix::Result<Self> {
        let regs = sys::ptrace::getregs(pid)?;
        Ok(RegisterMap(regs))
    }

    /// Program counter value.
    pub fn pc(&self) -> RemoteAddress {
        RemoteAddress::from(self.0.rip)
    }

    pub fn set_pc(&mut self, value: RemoteAddress) {
        self.0.rip = value.as_u64();
    }

    pub fn persist(self, pid: Pid) -> nix::Result<()> {
        sys::ptrace::setregs(pid, self.0)
    }
}
