//! PowerPC guest for the dynamic recompiler.
//!
//! Architectural state, instruction fields, the analyzer, the static
//! handler library, the opcode translator and the block compiler
//! that ties them to a [`drc_backend::Backend`].

pub mod analyzer;
pub mod compiler;
pub mod config;
pub mod cpu;
pub mod flags;
pub mod handlers;
pub mod helpers;
pub mod insn;
pub mod mmu;
pub mod regmap;
pub mod timebase;
pub mod translate;

pub use analyzer::{Analyzer, CodeFetch, DescFlags, Descriptor, Fetch, PpcAnalyzer};
pub use compiler::{CompileError, Drc, FastRam, Hotspot, MAX_FASTRAM, MAX_HOTSPOTS};
pub use config::{Capabilities, DrcConfig, DrcOptions, Flavor};
pub use cpu::{Exception, PpcState};
pub use mmu::MmuStrategy;

use drc_backend::Machine;

/// The embedding system as seen by generated PowerPC code and by the
/// host helpers it calls.
pub trait PpcMachine: Machine {
    fn state(&mut self) -> &mut PpcState;

    /// The external interrupt is being taken.
    fn irq_ack(&mut self);

    /// `tlbia`: drop every translation.
    fn tlb_flush(&mut self);

    /// `tlbie`: drop translations for the page holding `ea`.
    fn tlb_invalidate(&mut self, ea: u32);

    /// `tlbld` / `tlbli`: load a TLB entry from RPA and the compare
    /// register the miss handler prepared.
    fn tlb_load(&mut self, ea: u32, rpa: u32, cmp: u32, instruction: bool);
}
