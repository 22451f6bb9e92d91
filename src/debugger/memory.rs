//! Byte access to a traced process memory.
//!
//! `PTRACE_PEEKDATA`/`PTRACE_POKEDATA` transfer a whole machine word, so a single byte is read
//! from its enclosing aligned word, and written by splicing it into a freshly read copy of
//! that word.

use crate::debugger::address::RemoteAddress;
use crate::debugger::error::Error;
use crate::debugger::error::Error::Ptrace;
use nix::libc::{c_long, c_void};
use nix::sys;
use nix::unistd::Pid;
use std::mem;

const WORD_SIZE: u64 = mem::size_of::<c_long>() as u64;

/// Return aligned address of a word containing `addr` and byte position inside this word.
fn word_of(addr: RemoteAddress) -> (u64, usize) {
    let addr = addr.as_u64();
    let aligned = addr - addr % WORD_SIZE;
    (aligned, (addr - aligned) as usize)
}

fn splice_byte(word: c_long, pos: usize, byte: u8) -> c_long {
    let mut bytes = word.to_ne_bytes();
    bytes[pos] = byte;
    c_long::from_ne_bytes(bytes)
}

fn peek_word(pid: Pid, aligned: u64) -> Result<c_long, Error> {
    sys::ptrace::read(pid, aligned as *mut c_void).map_err(Ptrace)
}

/// Read a single byte from tracee memory.
///
/// # Arguments
///
/// * `pid`: stopped tracee (any thread of the traced process)
/// * `addr`: remote address
pub fn read_byte(pid: Pid, addr: RemoteAddress) -> Result<u8, Error> {
    let (aligned, pos) = word_of(addr);
    let word = peek_word(pid, aligned)?;
    Ok(word.to_ne_bytes()[pos])
}

/// Write a single byte into tracee memory, other bytes of the enclosing word are kept.
///
/// # Arguments
///
/// * `pid`: stopped tracee (any thread of the traced process)
/// * `addr`: remote address
/// * `byte`: new value
pub fn write_byte(pid: Pid, addr: RemoteAddress, byte: u8) -> Result<(), Error> {
    let (aligned, pos) = word_of(addr);
    // word must be read right before write, neighbours may be patched breakpoints
    let word = peek_word(pid, aligned)?;
    let patched = splice_byte(word, pos, byte);
    unsafe { sys::ptrace::write(pid, aligned as *mut c_void, patched as *mut c_void) }
        .map_err(Ptrace)
}
