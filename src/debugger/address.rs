use std::fmt::{Display, Formatter};
use std::ops::Range;

/// Represent address in the traced process virtual address space.
/// Tracer never maps this memory, so the address is an opaque number, not a pointer.
/// Remote address is a `GlobalAddress` + module load base.
#[derive(Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Debug, Default)]
pub struct RemoteAddress(u64);

impl RemoteAddress {
    pub fn offset(self, offset: i64) -> RemoteAddress {
        RemoteAddress(self.0.wrapping_add_signed(offset))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl From<u64> for RemoteAddress {
    fn from(addr: u64) -> Self {
        RemoteAddress(addr)
    }
}

impl From<RemoteAddress> for u64 {
    fn from(addr: RemoteAddress) -> Self {
        addr.0
    }
}

impl Display for RemoteAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&format!("{:#016X}", self.0))
    }
}

/// Represent address in object files.
/// This address unique per object file but not per process.
#[derive(Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Debug, Default)]
pub struct GlobalAddress(u64);

impl GlobalAddress {
    pub fn relocate(self, base: u64) -> RemoteAddress {
        RemoteAddress(self.0 + base)
    }

    pub fn in_range(self, range: &Range<u64>) -> bool {
        range.contains(&self.0)
    }
}

impl From<u64> for GlobalAddress {
    fn from(addr: u64) -> Self {
        GlobalAddress(addr)
    }
}

impl From<GlobalAddress> for u64 {
    fn from(addr: GlobalAddress) -> Self {
        addr.0
    }
}

impl Display for GlobalAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&format!("{:#016X}", self.0))
    }
}
