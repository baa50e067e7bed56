//! PowerPC processor built on the recompiler.
//!
//! [`Processor`] owns the architectural state, the recompiler and the
//! embedder's bus and TLB. `execute` drives the dispatch loop:
//! compiled code runs until it exits, missing code is compiled,
//! cache-reset requests flush, and only an exhausted cycle budget
//! returns to the caller.

pub mod exec_loop;
pub mod symbols;
pub mod system;

pub use exec_loop::{dispatch_loop, run_budget};
pub use symbols::SymbolSink;
pub use drc_backend::TranslateFault;
pub use system::{Bus, IrqAck, NoTlb, System, Tlb};

use drc_backend::{Backend, CacheStats, PortableBackend};
use ppc_frontend::cpu::{irq, PpcState};
use ppc_frontend::{
    flags, timebase, Capabilities, CompileError, Drc, DrcConfig, FastRam, Flavor, Hotspot,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("no code mapping at pc {pc:08x}")]
    UnmappedCode { pc: u32 },
    #[error("unimplemented opcode {opcode:08x} at pc {pc:08x}")]
    Unimplemented { pc: u32, opcode: u32 },
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error("generated code returned unknown exit code {0}")]
    BadExit(u32),
}

impl From<drc_backend::BackendError> for ExecError {
    fn from(e: drc_backend::BackendError) -> Self {
        ExecError::Compile(CompileError::Backend(e))
    }
}

/// One emulated PowerPC core.
pub struct Processor<Bu, T = NoTlb, B = PortableBackend<System<Bu, T>>>
where
    Bu: Bus,
    T: Tlb,
    B: Backend<System<Bu, T>>,
{
    drc: Drc<System<Bu, T>, B>,
    sys: System<Bu, T>,
    flavor: Flavor,
    caps: Capabilities,
    /// Configuration hooks are closed once execution starts.
    started: bool,
}

impl<Bu: Bus, T: Tlb> Processor<Bu, T> {
    /// Processor on the portable backend.
    pub fn new(
        flavor: Flavor,
        caps: Capabilities,
        tb_divisor: u32,
        irq_ack: Option<IrqAck>,
        bus: Bu,
        tlb: T,
        config: DrcConfig,
    ) -> Self {
        let backend = PortableBackend::with_spare_registers(config.cache_size, config.spare_registers);
        Self::with_backend(backend, flavor, caps, tb_divisor, irq_ack, bus, tlb, config)
    }
}

impl<Bu, T, B> Processor<Bu, T, B>
where
    Bu: Bus,
    T: Tlb,
    B: Backend<System<Bu, T>>,
{
    #[allow(clippy::too_many_arguments)]
    pub fn with_backend(
        backend: B,
        flavor: Flavor,
        caps: Capabilities,
        tb_divisor: u32,
        irq_ack: Option<IrqAck>,
        bus: Bu,
        tlb: T,
        config: DrcConfig,
    ) -> Self {
        let drc = Drc::new(backend, flavor, caps, config.options);
        let mut sys = System::new(bus, tlb, irq_ack);
        flags::init_tables(&mut sys.state);
        sys.state.tb_divisor = tb_divisor.max(1);
        log::info!("{flavor:?} processor, timebase divisor {}", sys.state.tb_divisor);
        let mut cpu = Self {
            drc,
            sys,
            flavor,
            caps,
            started: false,
        };
        cpu.reset();
        cpu
    }

    /// Power-on register values; compiled code is discarded.
    pub fn reset(&mut self) {
        let mask = self.drc.mmu().mode_mask();
        let state = &mut *self.sys.state;
        state.reset(self.flavor.pvr(), mask);
        let now = state.cycles_base;
        timebase::write_timebase(state, now, 0);
        if self.caps.contains(Capabilities::DECREMENTER) {
            timebase::write_decrementer(state, now, u32::MAX);
        }
        self.drc.flush();
        log::info!("{:?} reset, pc {:08x}", self.flavor, state.pc);
    }

    /// Run for `budget` cycles; returns the cycles consumed.
    pub fn execute(&mut self, budget: u32) -> Result<u64, ExecError> {
        self.started = true;
        let decrementer = self.caps.contains(Capabilities::DECREMENTER);
        // SAFETY: the state block is boxed and owned by `self.sys`,
        // and fast-RAM regions are valid per the `add_fastram`
        // contract.
        unsafe { run_budget(&mut self.drc, &mut self.sys, budget, decrementer) }
    }

    /// Release compiled code.
    pub fn shutdown(&mut self) {
        let stats = self.drc.stats();
        log::info!("shutdown: {} units, {}/{} cache used", stats.units, stats.used, stats.capacity);
        self.drc.flush();
    }

    /// Drive the external interrupt input.
    pub fn set_irq_line(&mut self, asserted: bool) {
        let state = &mut self.sys.state;
        if asserted {
            state.irq_pending |= irq::EXTERNAL;
        } else {
            state.irq_pending &= !irq::EXTERNAL;
        }
    }

    fn config_open(&self, what: &str) -> bool {
        if self.started {
            log::warn!("{what} ignored: processor already running");
        }
        !self.started
    }

    /// Let generated code access `start..=end` directly at `base`.
    ///
    /// # Safety
    /// `base` must point to `end - start + 1` bytes, holding guest
    /// memory in big-endian order, that stay valid and are not
    /// accessed elsewhere while the processor runs.
    pub unsafe fn add_fastram(&mut self, start: u32, end: u32, readonly: bool, base: *mut u8) {
        if !self.config_open("fast RAM region") {
            return;
        }
        let region = FastRam {
            start,
            end,
            readonly,
            base,
        };
        if !self.drc.add_fastram(region) {
            log::warn!("fast RAM table full, {start:08x}-{end:08x} ignored");
        }
    }

    /// Credit `cycles` extra whenever `opcode` executes at `pc`.
    pub fn add_hotspot(&mut self, pc: u32, opcode: u32, cycles: u32) {
        if !self.config_open("hotspot") {
            return;
        }
        if !self.drc.add_hotspot(Hotspot { pc, opcode, cycles }) {
            log::warn!("hotspot table full, {pc:08x} ignored");
        }
    }

    /// Page permissions or contents changed behind the recompiler's
    /// back.
    pub fn invalidate_cache(&mut self) {
        self.drc.flush();
    }

    pub fn register_symbols(&self, sink: &mut dyn SymbolSink) {
        symbols::register(sink);
    }

    pub fn state(&self) -> &PpcState {
        &self.sys.state
    }

    pub fn state_mut(&mut self) -> &mut PpcState {
        &mut self.sys.state
    }

    pub fn system(&self) -> &System<Bu, T> {
        &self.sys
    }

    pub fn system_mut(&mut self) -> &mut System<Bu, T> {
        &mut self.sys
    }

    pub fn drc(&self) -> &Drc<System<Bu, T>, B> {
        &self.drc
    }

    /// Compile the group at the current (mode, pc) without running it.
    pub fn compile_current(&mut self) -> Result<(), ExecError> {
        let (mode, pc) = (self.sys.state.mode, self.sys.state.pc);
        self.drc.compile(&mut self.sys, mode, pc)?;
        Ok(())
    }

    pub fn stats(&self) -> CacheStats {
        self.drc.stats()
    }
}
