//! Block compiler: turns one analyzed group into a compiled unit.
//!
//! A group is split into dispatch sequences at `END_SEQUENCE`. Each
//! sequence gets, in order, a hash entry, an optional checksum of
//! its instruction words, a label when something in the group
//! branches to it, the translated instructions, and a cycle commit
//! followed by a jump to its successor.
//!
//! Backend failures flush the cache, regenerate the static handlers
//! and retry the whole group once.

use std::collections::{HashMap, HashSet};
use std::marker::PhantomData;

use drc_backend::{Backend, BackendError, CacheStats};
use drc_core::{exit, BlockKey, Cond, Context, Handle, MapVar, Type};
use thiserror::Error;

use crate::analyzer::{Analyzer, CodeFetch, DescFlags, Descriptor, PpcAnalyzer};
use crate::config::{Capabilities, DrcOptions, Flavor};
use crate::cpu::{program, Exception};
use crate::handlers::{self, HandlerEnv, Handles};
use crate::helpers::HelperIds;
use crate::mmu::{self, MmuStrategy};
use crate::regmap::{self, RegMap};
use crate::translate::Translator;
use crate::PpcMachine;

/// Capacity of the fast-RAM table.
pub const MAX_FASTRAM: usize = 16;
/// Capacity of the hotspot table.
pub const MAX_HOTSPOTS: usize = 16;

/// SRR1 bit an ISI reports for a fetch translation miss.
const ISI_NOT_FOUND: u32 = 0x4000_0000;

/// Host memory generated code may access directly. `base` maps
/// guest physical `start`; the range is inclusive.
#[derive(Clone, Copy, Debug)]
pub struct FastRam {
    pub start: u32,
    pub end: u32,
    pub readonly: bool,
    pub base: *mut u8,
}

/// Idle-loop credit: when `opcode` sits at `pc`, executing it costs
/// `cycles` extra.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Hotspot {
    pub pc: u32,
    pub opcode: u32,
    pub cycles: u32,
}

#[derive(Debug, Error)]
pub enum CompileError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("compiling {mode}:{pc:08x} failed again after a cache reset: {source}")]
    RetryFailed {
        mode: u32,
        pc: u32,
        #[source]
        source: BackendError,
    },
}

/// The PowerPC recompiler for one processor instance.
pub struct Drc<M, B> {
    backend: B,
    ir: Context,
    regs: RegMap,
    analyzer: Box<dyn Analyzer>,
    mmu: Box<dyn MmuStrategy>,
    helpers: HelperIds,
    handles: Option<Handles>,
    flavor: Flavor,
    caps: Capabilities,
    options: DrcOptions,
    fastram: Vec<FastRam>,
    hotspots: Vec<Hotspot>,
    _machine: PhantomData<fn(&mut M)>,
}

impl<M: PpcMachine, B: Backend<M>> Drc<M, B> {
    pub fn new(mut backend: B, flavor: Flavor, caps: Capabilities, options: DrcOptions) -> Self {
        let mut ir = Context::new();
        let regs = RegMap::new(&mut ir, &backend.register_info());
        let helpers = HelperIds::register::<M, B>(&mut backend);
        let mmu = mmu::strategy_for(caps);
        let analyzer = Box::new(PpcAnalyzer::new(caps, options.window, mmu.flush_on_remap()));
        log::debug!(
            "{flavor:?}: caps {:#x}, mmu '{}', {} host-resident gprs",
            caps.bits(),
            mmu.name(),
            (0..regmap::HOST_RESIDENT).filter(|&n| regs.is_mapped(n)).count()
        );
        Self {
            backend,
            ir,
            regs,
            analyzer,
            mmu,
            helpers,
            handles: None,
            flavor,
            caps,
            options,
            fastram: Vec::new(),
            hotspots: Vec::new(),
            _machine: PhantomData,
        }
    }

    /// Replace the analyzer; the cache is flushed so nothing compiled
    /// from the old one survives.
    pub fn set_analyzer(&mut self, analyzer: Box<dyn Analyzer>) {
        self.analyzer = analyzer;
        self.flush();
    }

    pub fn flavor(&self) -> Flavor {
        self.flavor
    }

    pub fn caps(&self) -> Capabilities {
        self.caps
    }

    pub fn options(&self) -> DrcOptions {
        self.options
    }

    pub fn mmu(&self) -> &dyn MmuStrategy {
        self.mmu.as_ref()
    }

    pub fn regs(&self) -> &RegMap {
        &self.regs
    }

    pub fn fastram(&self) -> &[FastRam] {
        &self.fastram
    }

    pub fn hotspots(&self) -> &[Hotspot] {
        &self.hotspots
    }

    pub fn stats(&self) -> CacheStats {
        self.backend.stats()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// IR of the most recently compiled unit.
    pub fn last_unit(&self) -> &Context {
        &self.ir
    }

    /// Add a fast-RAM region. Returns `false` when the table is full.
    /// Compiled accessors only see regions present when the static
    /// handlers were generated.
    pub fn add_fastram(&mut self, region: FastRam) -> bool {
        if self.fastram.len() >= MAX_FASTRAM {
            return false;
        }
        self.fastram.push(region);
        self.flush();
        true
    }

    /// Add a hotspot rule. Returns `false` when the table is full.
    pub fn add_hotspot(&mut self, rule: Hotspot) -> bool {
        if self.hotspots.len() >= MAX_HOTSPOTS {
            return false;
        }
        self.hotspots.push(rule);
        self.flush();
        true
    }

    /// Drop all compiled code. Handlers are regenerated lazily.
    pub fn flush(&mut self) {
        if self.handles.take().is_some() {
            log::info!("flushing code cache ({} units)", self.backend.stats().units);
        }
        self.backend.reset();
    }

    /// Static handlers, generating them if the cache was flushed.
    pub fn handles(&mut self) -> Result<&Handles, BackendError> {
        let h = match self.handles.take() {
            Some(h) => h,
            None => {
                let env = HandlerEnv {
                    regs: &self.regs,
                    mmu: self.mmu.as_ref(),
                    options: self.options,
                    fastram: &self.fastram,
                    helpers: self.helpers,
                };
                handlers::generate::<M, B>(&mut self.backend, &mut self.ir, &env)?
            }
        };
        Ok(&*self.handles.insert(h))
    }

    /// Entry trampoline handle.
    pub fn entry(&mut self) -> Result<Handle, BackendError> {
        Ok(self.handles()?.entry)
    }

    /// Run compiled code until it exits.
    ///
    /// # Safety
    /// See [`Backend::execute`]: the machine's state block and every
    /// registered fast-RAM region must be live.
    pub unsafe fn run(&mut self, machine: &mut M) -> Result<u32, CompileError> {
        let entry = self.entry()?;
        Ok(self.backend.execute(entry, machine).code)
    }

    /// Compile the group at (`mode`, `pc`). On a backend error the
    /// cache is flushed and the group retried once.
    pub fn compile(&mut self, fetch: &mut dyn CodeFetch, mode: u32, pc: u32) -> Result<(), CompileError> {
        match self.try_compile(fetch, mode, pc) {
            Ok(()) => Ok(()),
            Err(e) => {
                log::info!("compile of {mode}:{pc:08x} failed ({e}); resetting cache");
                self.flush();
                self.try_compile(fetch, mode, pc)
                    .map_err(|source| CompileError::RetryFailed { mode, pc, source })
            }
        }
    }

    fn try_compile(&mut self, fetch: &mut dyn CodeFetch, mode: u32, pc: u32) -> Result<(), BackendError> {
        let handles = self.handles()?.clone();
        let descs = self.analyzer.analyze(fetch, mode, pc);
        let existing: HashSet<u32> = descs
            .iter()
            .map(|d| d.pc)
            .filter(|&p| self.backend.hash_exists(BlockKey::new(mode, p)))
            .collect();

        let Self {
            backend,
            ir,
            regs,
            mmu,
            helpers,
            caps,
            options,
            hotspots,
            ..
        } = self;

        ir.reset();
        let labels: HashMap<u32, u32> = descs
            .iter()
            .filter(|d| d.flags.contains(DescFlags::IS_BRANCH_TARGET))
            .map(|d| (d.pc, ir.new_label()))
            .collect();

        let mut t = Translator {
            regs,
            handles: &handles,
            helpers: *helpers,
            mmu: &**mmu,
            options: *options,
            caps: *caps,
            mode,
            labels: &labels,
            cycles: 0,
            fpu_checked: false,
        };
        let mut group = Group {
            existing: &existing,
            hotspots,
            mode,
            override_hash: false,
        };

        let mut rest = &descs[..];
        let mut first = true;
        while !rest.is_empty() {
            let len = rest
                .iter()
                .position(|d| d.flags.contains(DescFlags::END_SEQUENCE))
                .map_or(rest.len(), |n| n + 1);
            let (seq, tail) = rest.split_at(len);
            let next_start = tail.first().map(|d| d.pc);
            group.sequence(ir, &mut t, seq, first, next_start);
            rest = tail;
            first = false;
        }

        log::debug!(
            "compiled {mode}:{pc:08x}: {} instructions, {} ops",
            descs.len(),
            ir.num_ops()
        );
        backend.compile(ir)
    }
}

/// Per-group compilation state.
struct Group<'a> {
    /// PCs that already had a hash entry for this mode.
    existing: &'a HashSet<u32>,
    hotspots: &'a [Hotspot],
    mode: u32,
    /// Set when the group's first entry already existed: every later
    /// sequence then redefines its entry too.
    override_hash: bool,
}

impl Group<'_> {
    fn sequence(
        &mut self,
        ir: &mut Context,
        t: &mut Translator<'_>,
        seq: &[Descriptor],
        first: bool,
        next_start: Option<u32>,
    ) {
        let head = &seq[0];
        let last = &seq[seq.len() - 1];
        t.cycles = 0;
        t.fpu_checked = false;

        if self.override_hash || !self.existing.contains(&head.pc) {
            ir.gen_hash(self.mode, head.pc);
        } else if first {
            self.override_hash = true;
            ir.gen_hash(self.mode, head.pc);
        } else {
            // compiled before by another group; reuse that code
            if let Some(&label) = t.labels.get(&head.pc) {
                ir.gen_set_label(label);
            }
            let m = ir.const_i32(self.mode);
            let p = ir.const_i32(head.pc);
            ir.gen_hashjmp(m, p, t.handles.nocode);
            return;
        }

        if head.flags.contains(DescFlags::CODE_WRITABLE) {
            gen_checksum(ir, t, seq);
        }
        if let Some(&label) = t.labels.get(&head.pc) {
            ir.gen_set_label(label);
        }

        for (n, d) in seq.iter().enumerate() {
            self.instruction(ir, t, d, n == 0);
        }

        if last.flags.contains(DescFlags::IS_UNCONDITIONAL_BRANCH) {
            return;
        }
        let next = last.pc.wrapping_add(4);
        let next_t = ir.const_i32(next);
        t.update_cycles(ir, next_t, true);
        if last.flags.intersects(DescFlags::REDISPATCH | DescFlags::CAN_CHANGE_MODES) {
            ir.gen_hashjmp(t.regs.mode, next_t, t.handles.nocode);
        } else if next_start == Some(next) {
            // falls into the next sequence of this group
        } else {
            let m = ir.const_i32(self.mode);
            ir.gen_hashjmp(m, next_t, t.handles.nocode);
        }
    }

    fn instruction(&self, ir: &mut Context, t: &mut Translator<'_>, d: &Descriptor, first: bool) {
        let credit = self
            .hotspots
            .iter()
            .filter(|h| h.pc == d.pc && h.opcode == d.opcode)
            .map(|h| h.cycles)
            .sum::<u32>();
        t.cycles += d.cycles + credit;

        ir.gen_insn_start(d.pc);
        ir.gen_mapvar(MapVar::Pc, d.pc);
        ir.gen_mapvar(MapVar::Cycles, t.cycles);

        let pc = ir.const_i32(d.pc);
        if first {
            handlers::gen_interrupt_check(ir, t.regs, t.handles.interrupt, pc);
        }

        if d.flags.contains(DescFlags::COMPILER_UNMAPPED) {
            t.update_cycles(ir, pc, false);
            ir.gen_mov(Type::I32, t.regs.pc, pc);
            t.regs.gen_spill(ir);
            ir.gen_exiti(exit::UNMAPPED_CODE);
        } else if d.flags.contains(DescFlags::COMPILER_PAGE_FAULT) {
            ir.gen_movi(Type::I32, t.regs.i[1], ISI_NOT_FOUND as u64);
            ir.gen_exh(t.handles.exception(t.mmu.code_miss()), pc);
        } else if d.flags.contains(DescFlags::INVALID_OPCODE) {
            ir.gen_movi(Type::I32, t.regs.i[1], program::ILLEGAL as u64);
            ir.gen_exh(t.handles.exception(Exception::Program), pc);
        } else if d.flags.contains(DescFlags::VIRTUAL_NOOP) {
            // no code
        } else if !t.translate(ir, d) {
            log::debug!("unimplemented opcode {:08x} at {:08x}", d.opcode, d.pc);
            t.update_cycles(ir, pc, false);
            ir.gen_mov(Type::I32, t.regs.pc, pc);
            ir.gen_movi(Type::I32, t.regs.fault_opcode, d.opcode as u64);
            t.regs.gen_spill(ir);
            ir.gen_exiti(exit::UNIMPLEMENTED);
        }
    }
}

/// Compare the sequence's instruction words against their values at
/// compile time; a mismatch reports missing code for the head PC.
fn gen_checksum(ir: &mut Context, t: &Translator<'_>, seq: &[Descriptor]) {
    let head = &seq[0];
    let ok = ir.new_label();
    if !t.options.strict_verify || seq.len() == 1 {
        let v = ir.new_temp(Type::I32);
        let addr = ir.const_i32(head.physpc);
        ir.gen_read(Type::I32, v, addr, 4);
        ir.gen_brcondi(Type::I32, v, head.opcode as u64, Cond::Eq, ok);
    } else {
        let sum = ir.new_temp(Type::I32);
        ir.gen_movi(Type::I32, sum, 0);
        let word = ir.new_temp(Type::I32);
        let mut expect = 0u32;
        for d in seq.iter().filter(|d| !d.flags.contains(DescFlags::VIRTUAL_NOOP)) {
            let addr = ir.const_i32(d.physpc);
            ir.gen_read(Type::I32, word, addr, 4);
            ir.gen_add(Type::I32, sum, sum, word);
            expect = expect.wrapping_add(d.opcode);
        }
        ir.gen_brcondi(Type::I32, sum, expect as u64, Cond::Eq, ok);
    }
    let pc = ir.const_i32(head.pc);
    ir.gen_exh(t.handles.nocode, pc);
    ir.gen_set_label(ok);
}
