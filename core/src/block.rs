//! Identifiers shared between the frontend and the backend: dispatch
//! keys, named entry points, helpers and recoverable map variables.

use std::fmt;

/// Key of a hashed dispatch entry: guest operating mode plus guest PC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockKey {
    pub mode: u32,
    pub pc: u32,
}

impl BlockKey {
    pub const fn new(mode: u32, pc: u32) -> Self {
        Self { mode, pc }
    }
}

impl fmt::Display for BlockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:08x}", self.mode, self.pc)
    }
}

/// Opaque, backend-assigned symbolic branch target.
///
/// A handle is allocated by name first and defined later by a
/// `Handle` op in some compiled unit; code may reference it before
/// the definition exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(pub u32);

/// Index of a host helper function registered with the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HelperId(pub u32);

/// Values recorded with `MapVar` and read back with `Recover`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum MapVar {
    /// Guest PC of the instruction being executed.
    Pc = 0,
    /// Cycles accumulated since the last commit, including the
    /// current instruction.
    Cycles = 1,
}

pub const MAPVAR_COUNT: usize = 2;

impl MapVar {
    pub const fn from_raw(raw: u32) -> Option<MapVar> {
        match raw {
            0 => Some(MapVar::Pc),
            1 => Some(MapVar::Cycles),
            _ => None,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            MapVar::Pc => "pc",
            MapVar::Cycles => "cycles",
        }
    }
}

/// Codes returned by `Exit` ops to the dispatch loop.
pub mod exit {
    /// The cycle budget is exhausted; the guest PC is in the state.
    pub const OUT_OF_CYCLES: u32 = 0;
    /// No code is compiled for the (mode, pc) stored in the state.
    pub const MISSING_CODE: u32 = 1;
    /// The guest PC has no valid code mapping.
    pub const UNMAPPED_CODE: u32 = 2;
    /// Compiled code is stale; flush and regenerate.
    pub const RESET_CACHE: u32 = 3;
    /// The opcode at the stored PC is not implemented.
    pub const UNIMPLEMENTED: u32 = 4;
}
