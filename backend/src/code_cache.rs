//! Bounded arena for lowered code.

use crate::portable::insn::Insn;

/// Default cache size, in lowered instructions.
pub const DEFAULT_CACHE_SIZE: usize = 1 << 20;

/// Address of a lowered instruction inside the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CodeAddr(pub u32);

impl CodeAddr {
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Size-bounded code region.
///
/// Units are appended whole; there is no per-unit eviction. When the
/// region fills up the owner flushes everything and starts over.
pub struct CodeCache {
    insns: Vec<Insn>,
    capacity: usize,
    units: usize,
}

impl CodeCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            insns: Vec::with_capacity(capacity.min(DEFAULT_CACHE_SIZE)),
            capacity,
            units: 0,
        }
    }

    /// Allocate with the default size.
    pub fn with_default_size() -> Self {
        Self::new(DEFAULT_CACHE_SIZE)
    }

    /// Address the next appended instruction will get.
    #[inline]
    pub fn offset(&self) -> CodeAddr {
        CodeAddr(self.insns.len() as u32)
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn used(&self) -> usize {
        self.insns.len()
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.capacity - self.insns.len()
    }

    pub fn units(&self) -> usize {
        self.units
    }

    /// Append a fully lowered unit. The caller has already checked
    /// that it fits.
    pub fn append(&mut self, code: Vec<Insn>) -> CodeAddr {
        assert!(code.len() <= self.remaining(), "code cache overflow");
        let start = self.offset();
        self.insns.extend(code);
        self.units += 1;
        start
    }

    #[inline]
    pub fn get(&self, addr: CodeAddr) -> Insn {
        self.insns[addr.index()]
    }

    /// Drop all code.
    pub fn reset(&mut self) {
        self.insns.clear();
        self.units = 0;
    }
}
