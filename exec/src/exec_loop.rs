use drc_backend::Backend;
use drc_core::exit;
use ppc_frontend::cpu::irq;
use ppc_frontend::{timebase, Drc};

use crate::system::{Bus, System, Tlb};
use crate::ExecError;

/// Run compiled code until it reports out-of-cycles, compiling on
/// misses and flushing on request.
///
/// # Safety
/// Every fast-RAM region registered with `drc` must be live.
pub unsafe fn dispatch_loop<Bu, T, B>(
    drc: &mut Drc<System<Bu, T>, B>,
    sys: &mut System<Bu, T>,
) -> Result<(), ExecError>
where
    Bu: Bus,
    T: Tlb,
    B: Backend<System<Bu, T>>,
{
    loop {
        let code = drc.run(sys)?;
        match code {
            exit::OUT_OF_CYCLES => return Ok(()),
            exit::MISSING_CODE => {
                let (mode, pc) = (sys.state.mode, sys.state.pc);
                drc.compile(sys, mode, pc)?;
            }
            exit::RESET_CACHE => drc.flush(),
            exit::UNMAPPED_CODE => {
                let pc = sys.state.pc;
                log::error!("execution reached unmapped address {pc:08x}");
                return Err(ExecError::UnmappedCode { pc });
            }
            exit::UNIMPLEMENTED => {
                let (pc, opcode) = (sys.state.pc, sys.state.fault_opcode);
                log::error!("unimplemented opcode {opcode:08x} at {pc:08x}");
                return Err(ExecError::Unimplemented { pc, opcode });
            }
            other => {
                log::error!("generated code exited with unknown code {other}");
                return Err(ExecError::BadExit(other));
            }
        }
    }
}

/// Run `budget` cycles in slices that end at the next decrementer
/// interrupt. Returns the cycles actually consumed, which may exceed
/// the budget by the cost of the last sequence.
///
/// # Safety
/// As for [`dispatch_loop`].
pub unsafe fn run_budget<Bu, T, B>(
    drc: &mut Drc<System<Bu, T>, B>,
    sys: &mut System<Bu, T>,
    budget: u32,
    decrementer: bool,
) -> Result<u64, ExecError>
where
    Bu: Bus,
    T: Tlb,
    B: Backend<System<Bu, T>>,
{
    let mut consumed = 0u64;
    while consumed < budget as u64 {
        let state = &mut *sys.state;
        let now = state.cycles_base;
        if decrementer && state.dec_next_fire <= now {
            state.irq_pending |= irq::DECREMENTER;
            state.dec_next_fire = state.dec_next_fire.wrapping_add(timebase::dec_period(state));
        }
        let mut slice = budget as u64 - consumed;
        if decrementer {
            slice = slice.min(state.dec_next_fire.saturating_sub(now));
        }
        let slice = slice.clamp(1, i32::MAX as u64) as i32;
        state.icount = slice;
        state.slice_budget = slice;

        let result = dispatch_loop(drc, sys);

        let state = &mut *sys.state;
        let used = (state.slice_budget as i64 - state.icount as i64).max(0) as u64;
        state.cycles_base = state.cycles_base.wrapping_add(used);
        state.icount = 0;
        state.slice_budget = 0;
        consumed += used;
        result?;
    }
    Ok(consumed)
}
