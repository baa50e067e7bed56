//! Recompiler backend: lowers portable IR into cache-resident code
//! and runs it.
//!
//! The [`Backend`] trait is the seam between the guest frontend and
//! whatever turns IR into executable form. It owns the bounded code
//! cache, the hashed dispatch map keyed by (mode, pc), the named
//! handle table and the registered host helpers. [`PortableBackend`]
//! is the reference implementation: it lowers ops to a compact
//! instruction form and interprets them.

pub mod code_cache;
pub mod dispatch;
pub mod portable;
pub mod translate;

pub use code_cache::{CodeAddr, CodeCache};
pub use dispatch::{DispatchMap, HandleTable};
pub use portable::PortableBackend;

use drc_core::{BlockKey, Context, Handle, HelperId, RegSet};
use thiserror::Error;

/// Host register holding the machine-state pointer while generated
/// code runs.
pub const REG_ENV: u8 = 0;
/// Number of internal scratch registers reserved for handler
/// calling conventions.
pub const NUM_INTERNAL_REGS: usize = 4;

/// Errors surfaced while emitting code.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("code cache full: unit needs {needed} slots, {remaining} remaining")]
    CacheFull { needed: usize, remaining: usize },
    #[error("label L{0} is referenced but never placed")]
    UndefinedLabel(u32),
    #[error("handle '{0}' is defined twice")]
    HandleRedefined(String),
    #[error("op '{0}' writes to a constant")]
    ConstOutput(&'static str),
    #[error("helper #{0} is not registered")]
    UnknownHelper(u32),
}

/// Why a logical address has no physical counterpart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranslateFault {
    /// No valid mapping exists.
    NotFound,
    /// A mapping exists but forbids this access.
    Protected,
}

impl TranslateFault {
    /// Value a `Translate` op yields for this fault. Every fault code
    /// is at or above `1 << 32`, out of reach of a 32-bit address.
    pub const fn code(self) -> u64 {
        match self {
            TranslateFault::NotFound => u64::MAX,
            TranslateFault::Protected => u64::MAX - 1,
        }
    }
}

/// The surrounding system as seen by generated code: the machine
/// state it addresses, the memory bus and the address translation
/// facility.
pub trait Machine {
    /// Pointer to the state block that global temps are offsets into.
    fn env_ptr(&mut self) -> *mut u8;

    /// Bus read of `size` bytes (1, 2, 4 or 8) at a physical address.
    fn read(&mut self, addr: u32, size: u32) -> u64;

    /// Bus write of `size` bytes at a physical address.
    fn write(&mut self, addr: u32, size: u32, value: u64);

    fn read_masked(&mut self, addr: u32, size: u32, mask: u64) -> u64 {
        self.read(addr, size) & mask
    }

    /// Write only the bits selected by `mask`.
    fn write_masked(&mut self, addr: u32, size: u32, value: u64, mask: u64) {
        let old = self.read(addr, size);
        self.write(addr, size, (old & !mask) | (value & mask));
    }

    /// Translate a logical address.
    fn translate(&mut self, _intention: u32, addr: u32) -> Result<u32, TranslateFault> {
        Ok(addr)
    }
}

/// A host helper callable from generated code with up to four
/// arguments.
pub type Helper<M> = fn(&mut M, &[u64]) -> u64;

/// Result of running generated code until it executes `Exit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitStatus {
    pub code: u32,
}

/// Host register conventions reported to the frontend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterInfo {
    /// Register holding the state pointer.
    pub env: u8,
    /// Internal registers used to pass parameters to handlers.
    pub internal: [u8; NUM_INTERNAL_REGS],
    /// Registers free for the frontend to bind guest state to.
    pub spare: RegSet,
}

/// Occupancy snapshot of the code cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub used: usize,
    pub capacity: usize,
    pub hash_entries: usize,
    pub handles: usize,
    pub units: usize,
}

/// A code generator plus the cache it manages.
pub trait Backend<M: Machine> {
    /// Discard all compiled code, dispatch entries and handles.
    /// Registered helpers survive.
    fn reset(&mut self);

    /// Host register conventions.
    fn register_info(&self) -> RegisterInfo;

    /// Allocate a named handle. It may be referenced immediately and
    /// defined by a later unit.
    fn alloc_handle(&mut self, name: &str) -> Handle;

    /// Name a handle was allocated with.
    fn handle_name(&self, handle: Handle) -> &str;

    /// Whether `handle` has a committed definition.
    fn handle_defined(&self, handle: Handle) -> bool;

    /// Register a helper for `Call` ops.
    fn register_helper(&mut self, name: &'static str, f: Helper<M>) -> HelperId;

    /// Lower and commit one unit. On error nothing from the unit is
    /// visible: no hash entries, no handle definitions.
    fn compile(&mut self, ctx: &Context) -> Result<(), BackendError>;

    /// Whether a dispatch entry exists for `key`.
    fn hash_exists(&self, key: BlockKey) -> bool;

    /// Run generated code starting at `entry` until it exits.
    ///
    /// # Safety
    /// `machine.env_ptr()` must point to a live state block laid out
    /// the way the compiled units' globals expect, and every host
    /// pointer baked into compiled code must still be valid.
    unsafe fn execute(&mut self, entry: Handle, machine: &mut M) -> ExitStatus;

    fn stats(&self) -> CacheStats;
}
