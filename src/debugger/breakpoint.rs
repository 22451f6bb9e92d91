use crate::debugger::address::RemoteAddress;
use crate::debugger::debugee::tracer::Tracer;
use crate::debugger::error::Error;
use crate::debugger::error::Error::Ptrace;
use crate::debugger::memory;
use log::debug;
use nix::unistd::Pid;
use std::collections::HashMap;

/// `int3` instruction.
pub const TRAP_OPCODE: u8 = 0xCC;
/// Size of a trap instruction, program counter points right after it when a trap fires.
pub const TRAP_WIDTH: i64 = 1;

/// Breakpoint representation.
#[derive(Debug, Clone, PartialEq)]
pub struct Breakpoint {
    saved_data: u8,
    armed: bool,
    hits: u32,
}

impl Breakpoint {
    /// Number of times the breakpoint was counted.
    pub fn hits(&self) -> u32 {
        self.hits
    }

    /// True if trap instruction currently written at breakpoint address.
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    #[cfg(test)]
    pub(crate) fn counted(hits: u32) -> Self {
        Self {
            saved_data: 0x90,
            armed: hits == 0,
            hits,
        }
    }
}

/// What to do with a breakpoint when tracee stops on it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// Count the hit and restore original code forever.
    Disarm,
    /// Execute original instruction and write the trap again, hit not counted.
    Rearm,
}

/// Set of line breakpoints of a traced process.
#[derive(Default)]
pub struct BreakpointTable {
    breakpoints: HashMap<RemoteAddress, Breakpoint>,
}

impl BreakpointTable {
    /// Write trap instruction at every address. Address already in table is skipped.
    /// Return number of new breakpoints.
    ///
    /// # Arguments
    ///
    /// * `pid`: stopped tracee
    /// * `addresses`: breakpoint addresses
    pub fn install(
        &mut self,
        pid: Pid,
        addresses: impl IntoIterator<Item = RemoteAddress>,
    ) -> Result<usize, Error> {
        let mut installed = 0;
        for addr in addresses {
            if self.breakpoints.contains_key(&addr) {
                debug!(target: "debugger", "breakpoint at {addr} already installed");
                continue;
            }

            let saved_data = memory::read_byte(pid, addr)?;
            memory::write_byte(pid, addr, TRAP_OPCODE)?;
            self.breakpoints.insert(
                addr,
                Breakpoint {
                    saved_data,
                    armed: true,
                    hits: 0,
                },
            );
            installed += 1;
        }
        Ok(installed)
    }

    /// Restore original code at all armed breakpoints.
    /// Hit counters are kept.
    ///
    /// # Arguments
    ///
    /// * `pid`: stopped tracee
    pub fn remove(&mut self, pid: Pid) -> Result<(), Error> {
        for (addr, brkpt) in self.breakpoints.iter_mut().filter(|(_, b)| b.armed) {
            memory::write_byte(pid, *addr, brkpt.saved_data)?;
            brkpt.armed = false;
        }
        Ok(())
    }

    pub fn get(&self, addr: RemoteAddress) -> Option<&Breakpoint> {
        self.breakpoints.get(&addr)
    }

    /// Resolve a trap of tracee stopped after executing a trap instruction.
    /// If the trap is not a breakpoint from this table - nothing changed, `None` returned.
    /// Otherwise program counter moved back to breakpoint address and breakpoint resolved
    /// according to `resolution`.
    ///
    /// A trap of already disarmed breakpoint (several threads reach it at the same time)
    /// only moves program counter back.
    ///
    /// # Arguments
    ///
    /// * `tracer`: tracer, used for single step at [`Resolution::Rearm`]
    /// * `pid`: trapped tracee
    /// * `resolution`: resolution for armed breakpoint
    pub fn resolve_hit(
        &mut self,
        tracer: &mut Tracer,
        pid: Pid,
        resolution: Resolution,
    ) -> Result<Option<RemoteAddress>, Error> {
        let tracee = tracer.tracee_ctl().tracee(pid).ok_or(Error::ProcessNotStarted)?;
        let pc = tracee.pc().map_err(Ptrace)?;
        let addr = pc.offset(-TRAP_WIDTH);

        let Some(brkpt) = self.breakpoints.get_mut(&addr) else {
            debug!(target: "debugger", "foreign trap at {pc}, thread: {pid}");
            return Ok(None);
        };

        tracee.set_pc(addr).map_err(Ptrace)?;
        if !brkpt.armed {
            debug!(target: "debugger", "stale trap at {addr}, thread: {pid}");
            return Ok(Some(addr));
        }

        memory::write_byte(pid, addr, brkpt.saved_data)?;
        match resolution {
            Resolution::Disarm => {
                brkpt.armed = false;
                brkpt.hits += 1;
            }
            Resolution::Rearm => {
                if tracer.single_step(pid)? {
                    memory::write_byte(pid, addr, TRAP_OPCODE)?;
                } else {
                    brkpt.armed = false;
                }
            }
        }

        Ok(Some(addr))
    }
}

#[cfg(test)]
impl FromIterator<(RemoteAddress, Breakpoint)> for BreakpointTable {
    fn from_iter<T: IntoIterator<Item = (RemoteAddress, Breakpoint)>>(iter: T) -> Self {
        Self {
            breakpoints: iter.into_iter().collect(),
        }
    }
}
