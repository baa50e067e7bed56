//! Host helpers called from generated code.
//!
//! Everything that needs host-side state (the timebase, the
//! interrupt controller, the TLB) goes through these. Arguments
//! arrive as `u64` cells; the `pending` argument is the cycle cost
//! the running sequence has not committed yet.

use drc_backend::Backend;
use drc_core::HelperId;

use crate::cpu::spr;
use crate::timebase;
use crate::PpcMachine;

/// Helper ids as registered with one backend.
#[derive(Clone, Copy, Debug)]
pub struct HelperIds {
    pub irq_ack: HelperId,
    pub tb_read: HelperId,
    pub tb_write: HelperId,
    pub dec_read: HelperId,
    pub dec_write: HelperId,
    pub tlbie: HelperId,
    pub tlbia: HelperId,
    pub tlb_load: HelperId,
}

impl HelperIds {
    pub fn register<M: PpcMachine, B: Backend<M>>(backend: &mut B) -> Self {
        Self {
            irq_ack: backend.register_helper("irq_ack", irq_ack::<M>),
            tb_read: backend.register_helper("tb_read", tb_read::<M>),
            tb_write: backend.register_helper("tb_write", tb_write::<M>),
            dec_read: backend.register_helper("dec_read", dec_read::<M>),
            dec_write: backend.register_helper("dec_write", dec_write::<M>),
            tlbie: backend.register_helper("tlbie", tlbie::<M>),
            tlbia: backend.register_helper("tlbia", tlbia::<M>),
            tlb_load: backend.register_helper("tlb_load", tlb_load::<M>),
        }
    }
}

fn arg(args: &[u64], n: usize) -> u64 {
    args.get(n).copied().unwrap_or(0)
}

/// Acknowledge the external interrupt with the embedder. The line
/// is level triggered; the embedder drops it.
pub fn irq_ack<M: PpcMachine>(m: &mut M, _args: &[u64]) -> u64 {
    m.irq_ack();
    0
}

/// `[upper, pending]` -> one half of the timebase.
pub fn tb_read<M: PpcMachine>(m: &mut M, args: &[u64]) -> u64 {
    let state = m.state();
    let now = timebase::now(state, arg(args, 1) as u32);
    let tb = timebase::read_timebase(state, now);
    if arg(args, 0) != 0 {
        tb >> 32
    } else {
        tb & 0xffff_ffff
    }
}

/// `[upper, value, pending]`
pub fn tb_write<M: PpcMachine>(m: &mut M, args: &[u64]) -> u64 {
    let state = m.state();
    let now = timebase::now(state, arg(args, 2) as u32);
    let old = timebase::read_timebase(state, now);
    let value = arg(args, 1) & 0xffff_ffff;
    let tb = if arg(args, 0) != 0 {
        (old & 0xffff_ffff) | (value << 32)
    } else {
        (old & !0xffff_ffff) | value
    };
    timebase::write_timebase(state, now, tb);
    0
}

/// `[pending]`
pub fn dec_read<M: PpcMachine>(m: &mut M, args: &[u64]) -> u64 {
    let state = m.state();
    let now = timebase::now(state, arg(args, 0) as u32);
    timebase::read_decrementer(state, now) as u64
}

/// `[value, pending]`. Reloading may bring the next interrupt inside
/// the running slice; the slice is shortened so the dispatch loop
/// gets control back in time.
pub fn dec_write<M: PpcMachine>(m: &mut M, args: &[u64]) -> u64 {
    let pending = arg(args, 1) as u32;
    let state = m.state();
    let now = timebase::now(state, pending);
    timebase::write_decrementer(state, now, arg(args, 0) as u32);
    timebase::clamp_slice(state, now, pending);
    0
}

/// `[ea]`
pub fn tlbie<M: PpcMachine>(m: &mut M, args: &[u64]) -> u64 {
    m.tlb_invalidate(arg(args, 0) as u32);
    0
}

pub fn tlbia<M: PpcMachine>(m: &mut M, _args: &[u64]) -> u64 {
    m.tlb_flush();
    0
}

/// `[ea, instruction]`: 603 software reload from RPA and I/DCMP.
pub fn tlb_load<M: PpcMachine>(m: &mut M, args: &[u64]) -> u64 {
    let instruction = arg(args, 1) != 0;
    let state = m.state();
    let rpa = state.spr[spr::RPA as usize];
    let cmp = if instruction {
        state.spr[spr::ICMP as usize]
    } else {
        state.spr[spr::DCMP as usize]
    };
    m.tlb_load(arg(args, 0) as u32, rpa, cmp, instruction);
    0
}
