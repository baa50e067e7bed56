//! Static handler library.
//!
//! Regenerated after every cache flush, before any guest code is
//! compiled. Each routine is its own compiled unit reached only
//! through a [`Handle`].
//!
//! Calling convention: `i0` carries the address, `i1` the 32-bit
//! store data (`d1` for 64-bit), `i2` the byte mask of masked
//! accesses. Loads return in `i0` / `d0`. Program and ISI handlers
//! take their extra SRR1 bits in `i1`. Internal registers are shared
//! by every frame, so anything needed across a nested handler call
//! is first copied into a frame-local temp.

use drc_backend::{Backend, BackendError, Machine, TranslateFault};
use drc_core::{exit, Cond, Context, Handle, MapVar, TempIdx, Type};

use crate::compiler::FastRam;
use crate::config::DrcOptions;
use crate::cpu::{self, dsisr, irq, mode, msr, spr, Exception};
use crate::helpers::HelperIds;
use crate::mmu::{intention, MmuStrategy};
use crate::regmap::RegMap;

/// Number of accessor families: LE, DT and USER mode bits.
pub const ACCESSOR_MODES: usize = 8;

type Family = [Handle; ACCESSOR_MODES];

/// Handles of every static routine, valid until the next flush.
#[derive(Clone, Debug)]
pub struct Handles {
    pub entry: Handle,
    pub nocode: Handle,
    pub out_of_cycles: Handle,
    /// Dispatches a pending interrupt; parameter is the resume PC.
    pub interrupt: Handle,
    read8: Family,
    read16: Family,
    read32: Family,
    read32mask: Family,
    read64: Family,
    write8: Family,
    write16: Family,
    write32: Family,
    write32mask: Family,
    write64: Family,
    exception: [Handle; Exception::ALL.len()],
    /// Entry points that do not recover cycles from the caller.
    interrupt_norecover: Handle,
    decrementer_norecover: Handle,
}

fn family<M: Machine, B: Backend<M>>(backend: &mut B, name: &str) -> Family {
    std::array::from_fn(|m| backend.alloc_handle(&format!("{name}_m{m}")))
}

impl Handles {
    fn alloc<M: Machine, B: Backend<M>>(backend: &mut B) -> Self {
        Self {
            entry: backend.alloc_handle("entry"),
            nocode: backend.alloc_handle("nocode"),
            out_of_cycles: backend.alloc_handle("out_of_cycles"),
            interrupt: backend.alloc_handle("interrupt"),
            read8: family::<M, B>(backend, "read8"),
            read16: family::<M, B>(backend, "read16"),
            read32: family::<M, B>(backend, "read32"),
            read32mask: family::<M, B>(backend, "read32mask"),
            read64: family::<M, B>(backend, "read64"),
            write8: family::<M, B>(backend, "write8"),
            write16: family::<M, B>(backend, "write16"),
            write32: family::<M, B>(backend, "write32"),
            write32mask: family::<M, B>(backend, "write32mask"),
            write64: family::<M, B>(backend, "write64"),
            exception: std::array::from_fn(|n| backend.alloc_handle(Exception::ALL[n].name())),
            interrupt_norecover: backend.alloc_handle("interrupt_norecover"),
            decrementer_norecover: backend.alloc_handle("decrementer_norecover"),
        }
    }

    /// Load accessor for `size` bytes in operating mode `m`.
    pub fn read(&self, size: u32, masked: bool, m: u32) -> Handle {
        let m = (m & mode::ACCESSOR_MASK) as usize;
        match (size, masked) {
            (1, _) => self.read8[m],
            (2, _) => self.read16[m],
            (4, false) => self.read32[m],
            (4, true) => self.read32mask[m],
            _ => self.read64[m],
        }
    }

    /// Store accessor for `size` bytes in operating mode `m`.
    pub fn write(&self, size: u32, masked: bool, m: u32) -> Handle {
        let m = (m & mode::ACCESSOR_MASK) as usize;
        match (size, masked) {
            (1, _) => self.write8[m],
            (2, _) => self.write16[m],
            (4, false) => self.write32[m],
            (4, true) => self.write32mask[m],
            _ => self.write64[m],
        }
    }

    /// Exception handler that recovers the checkpointed cycles.
    pub fn exception(&self, exc: Exception) -> Handle {
        self.exception[exc as usize]
    }
}

/// Everything the handler generator reads.
pub struct HandlerEnv<'a> {
    pub regs: &'a RegMap,
    pub mmu: &'a dyn MmuStrategy,
    pub options: DrcOptions,
    pub fastram: &'a [FastRam],
    pub helpers: HelperIds,
}

/// Allocate every handle and compile the whole library.
pub fn generate<M: Machine, B: Backend<M>>(
    backend: &mut B,
    ir: &mut Context,
    env: &HandlerEnv<'_>,
) -> Result<Handles, BackendError> {
    let h = Handles::alloc::<M, B>(backend);
    let gen = Gen { env, h: &h };
    let mut units = 0usize;
    let mut emit = |ir: &mut Context, f: &dyn Fn(&mut Context)| -> Result<(), BackendError> {
        ir.reset();
        f(ir);
        units += 1;
        backend.compile(ir)
    };

    emit(ir, &|ir: &mut Context| gen.entry(ir))?;
    emit(ir, &|ir: &mut Context| gen.exit_stub(ir, h.nocode, exit::MISSING_CODE))?;
    emit(ir, &|ir: &mut Context| gen.exit_stub(ir, h.out_of_cycles, exit::OUT_OF_CYCLES))?;
    emit(ir, &|ir: &mut Context| gen.interrupt_dispatch(ir))?;

    for m in 0..ACCESSOR_MODES as u32 {
        for size in [1, 2, 4, 8] {
            emit(ir, &|ir: &mut Context| gen.read(ir, m, size, false))?;
            emit(ir, &|ir: &mut Context| gen.write(ir, m, size, false))?;
        }
        emit(ir, &|ir: &mut Context| gen.read(ir, m, 4, true))?;
        emit(ir, &|ir: &mut Context| gen.write(ir, m, 4, true))?;
    }

    for exc in Exception::ALL {
        if env.mmu.has_exception(exc) {
            emit(ir, &|ir: &mut Context| gen.exception(ir, exc, h.exception(exc), true))?;
        }
    }
    emit(ir, &|ir: &mut Context| gen.exception(ir, Exception::Interrupt, h.interrupt_norecover, false))?;
    emit(ir, &|ir: &mut Context| gen.exception(ir, Exception::Decrementer, h.decrementer_norecover, false))?;

    log::info!(
        "static handlers generated: {units} units, mmu '{}'",
        env.mmu.name()
    );
    Ok(h)
}

/// Branch to the interrupt dispatcher when an interrupt is pending
/// and MSR[EE] is set; `resume` becomes SRR0.
pub fn gen_interrupt_check(ir: &mut Context, regs: &RegMap, interrupt: Handle, resume: TempIdx) {
    let skip = ir.new_label();
    ir.gen_brcondi(Type::I32, regs.irq_pending, 0, Cond::Eq, skip);
    ir.gen_brcondi(Type::I32, regs.msr, msr::EE as u64, Cond::TstEq, skip);
    ir.gen_exh(interrupt, resume);
    ir.gen_set_label(skip);
}

/// `mode = compute_mode(msr) & mask`, in generated code.
pub fn gen_compute_mode(ir: &mut Context, regs: &RegMap, msr_t: TempIdx, mask: u32) {
    let m = ir.new_temp(Type::I32);
    let t = ir.new_temp(Type::I32);
    let c = ir.const_i32(msr::LE);
    ir.gen_and(Type::I32, m, msr_t, c);
    for (bit, shift) in [(msr::DR, 3), (msr::PR, 12), (msr::IR, 2)] {
        let b = ir.const_i32(bit);
        ir.gen_and(Type::I32, t, msr_t, b);
        let sh = ir.const_i32(shift);
        ir.gen_shr(Type::I32, t, t, sh);
        ir.gen_or(Type::I32, m, m, t);
    }
    let c = ir.const_i32(mask);
    ir.gen_and(Type::I32, regs.mode, m, c);
}

/// Swap r0-r3 with the shadow registers through the state block.
pub fn gen_swap_tgpr(ir: &mut Context, regs: &RegMap) {
    regs.gen_spill(ir);
    let a = ir.new_temp(Type::I32);
    let b = ir.new_temp(Type::I32);
    for n in 0..4 {
        ir.gen_ld32u(Type::I32, a, regs.env, cpu::r_offset(n));
        ir.gen_ld32u(Type::I32, b, regs.env, cpu::tgpr_offset(n));
        ir.gen_st32(Type::I32, a, regs.env, cpu::tgpr_offset(n));
        ir.gen_st32(Type::I32, b, regs.env, cpu::r_offset(n));
    }
    regs.gen_restore(ir);
}

struct Gen<'a> {
    env: &'a HandlerEnv<'a>,
    h: &'a Handles,
}

impl Gen<'_> {
    fn entry(&self, ir: &mut Context) {
        let r = self.env.regs;
        ir.gen_handle(self.h.entry);
        r.gen_restore(ir);
        gen_interrupt_check(ir, r, self.h.interrupt, r.pc);
        ir.gen_hashjmp(r.mode, r.pc, self.h.nocode);
    }

    fn exit_stub(&self, ir: &mut Context, handle: Handle, code: u32) {
        let r = self.env.regs;
        ir.gen_handle(handle);
        ir.gen_getexp(r.pc);
        r.gen_spill(ir);
        ir.gen_exiti(code);
    }

    fn interrupt_dispatch(&self, ir: &mut Context) {
        let r = self.env.regs;
        ir.gen_handle(self.h.interrupt);
        let resume = ir.new_temp(Type::I32);
        ir.gen_getexp(resume);

        let external = ir.new_label();
        ir.gen_brcondi(
            Type::I32,
            r.irq_pending,
            irq::DECREMENTER as u64,
            Cond::TstEq,
            external,
        );
        ir.gen_exh(self.h.decrementer_norecover, resume);

        ir.gen_set_label(external);
        let ignored = ir.new_temp(Type::I32);
        ir.gen_call(ignored, self.env.helpers.irq_ack, &[]);
        ir.gen_exh(self.h.interrupt_norecover, resume);
    }

    fn exception(&self, ir: &mut Context, exc: Exception, handle: Handle, recover: bool) {
        let r = self.env.regs;
        let mmu = self.env.mmu;
        ir.gen_handle(handle);

        let srr0 = ir.new_temp(Type::I32);
        ir.gen_getexp(srr0);
        if recover {
            let cycles = ir.new_temp(Type::I32);
            ir.gen_recover(cycles, MapVar::Cycles);
            ir.gen_sub(Type::I32, r.icount, r.icount, cycles);
        }
        r.gen_store_spr(ir, srr0, spr::SRR0);

        let old = ir.new_temp(Type::I32);
        ir.gen_mov(Type::I32, old, r.msr);
        let srr1 = ir.new_temp(Type::I32);
        let c = ir.const_i32(msr::SRR1_MASK);
        ir.gen_and(Type::I32, srr1, old, c);
        match exc {
            Exception::Program | Exception::Isi => {
                ir.gen_or(Type::I32, srr1, srr1, r.i[1]);
            }
            e if e.is_tlb_miss() => {
                let t = ir.new_temp(Type::I32);
                let sh = ir.const_i32(28);
                ir.gen_shl(Type::I32, t, r.cr[0], sh);
                ir.gen_or(Type::I32, srr1, srr1, t);
            }
            _ => {}
        }
        r.gen_store_spr(ir, srr1, spr::SRR1);

        if exc == Exception::Decrementer {
            let c = ir.const_i32(!irq::DECREMENTER);
            ir.gen_and(Type::I32, r.irq_pending, r.irq_pending, c);
        }

        // New MSR: keep IP, ME and ILE; LE follows ILE.
        let new = ir.new_temp(Type::I32);
        let c = ir.const_i32(msr::IP | msr::ME | msr::ILE);
        ir.gen_and(Type::I32, new, old, c);
        let le = ir.new_temp(Type::I32);
        let c = ir.const_i32(msr::ILE);
        ir.gen_and(Type::I32, le, old, c);
        let sh = ir.const_i32(16);
        ir.gen_shr(Type::I32, le, le, sh);
        ir.gen_or(Type::I32, new, new, le);

        let swap = mmu.swaps_tgpr() && exc.is_tlb_miss();
        if swap {
            let c = ir.const_i32(msr::TGPR);
            ir.gen_or(Type::I32, new, new, c);
        }
        ir.gen_mov(Type::I32, r.msr, new);
        if swap {
            let done = ir.new_label();
            ir.gen_brcondi(Type::I32, old, msr::TGPR as u64, Cond::TstNe, done);
            gen_swap_tgpr(ir, r);
            ir.gen_set_label(done);
        }
        gen_compute_mode(ir, r, r.msr, mmu.mode_mask());

        // Vector base is 0xfff00000 with MSR[IP], else 0.
        let target = ir.new_temp(Type::I32);
        let c = ir.const_i32(msr::IP);
        ir.gen_and(Type::I32, target, new, c);
        let sh = ir.const_i32(6);
        ir.gen_shr(Type::I32, target, target, sh);
        let zero = ir.const_i32(0);
        ir.gen_sub(Type::I32, target, zero, target);
        let c = ir.const_i32(cpu::HIGH_VECTOR_BASE);
        ir.gen_and(Type::I32, target, target, c);
        let c = ir.const_i32(exc.vector());
        ir.gen_or(Type::I32, target, target, c);

        let out = ir.new_label();
        ir.gen_brcondi(Type::I32, r.icount, 0, Cond::Lt, out);
        ir.gen_hashjmp(r.mode, target, self.h.nocode);
        ir.gen_set_label(out);
        ir.gen_exh(self.h.out_of_cycles, target);
    }

    // -- Memory accessors ------------------------------------

    fn read(&self, ir: &mut Context, m: u32, size: u32, masked: bool) {
        let r = self.env.regs;
        ir.gen_handle(self.h.read(size, masked, m));

        let ty = if size == 8 { Type::I64 } else { Type::I32 };
        let dst = if size == 8 { r.d[0] } else { r.i[0] };
        let ea = ir.new_temp(Type::I32);
        ir.gen_mov(Type::I32, ea, r.i[0]);
        let mask = ir.new_temp(Type::I32);
        if masked {
            ir.gen_mov(Type::I32, mask, r.i[2]);
        }

        let mut faults = Faults::default();
        self.gen_alignment(ir, m, size, ea, &mut faults, |ir| {
            self.split_read(ir, m, size, masked, ea, mask)
        });
        let pa = self.gen_translate(ir, m, size, ea, false, &mut faults);

        for region in self.env.fastram {
            let next = ir.new_label();
            let host = gen_fastram_ptr(ir, region, pa, size, next);
            match size {
                1 => ir.gen_ld8u(ty, dst, host, 0),
                2 => ir.gen_ld16u(ty, dst, host, 0),
                4 => ir.gen_ld32u(ty, dst, host, 0),
                _ => ir.gen_ld(ty, dst, host, 0),
            };
            gen_guest_order(ir, ty, dst, size);
            if masked {
                ir.gen_and(Type::I32, dst, dst, mask);
            }
            ir.gen_ret();
            ir.gen_set_label(next);
        }

        if masked {
            let m64 = ir.new_temp(Type::I64);
            ir.gen_extu_i32_i64(m64, mask);
            ir.gen_readm(ty, dst, pa, m64, size);
        } else {
            ir.gen_read(ty, dst, pa, size);
        }
        ir.gen_ret();

        self.gen_faults(ir, ea, false, faults);
    }

    fn write(&self, ir: &mut Context, m: u32, size: u32, masked: bool) {
        let r = self.env.regs;
        ir.gen_handle(self.h.write(size, masked, m));

        let ty = if size == 8 { Type::I64 } else { Type::I32 };
        let ea = ir.new_temp(Type::I32);
        ir.gen_mov(Type::I32, ea, r.i[0]);
        let data = ir.new_temp(ty);
        ir.gen_mov(ty, data, if size == 8 { r.d[1] } else { r.i[1] });
        let mask = ir.new_temp(Type::I32);
        if masked {
            ir.gen_mov(Type::I32, mask, r.i[2]);
        }

        let mut faults = Faults::default();
        self.gen_alignment(ir, m, size, ea, &mut faults, |ir| {
            self.split_write(ir, m, size, masked, ea, data, mask)
        });
        let pa = self.gen_translate(ir, m, size, ea, true, &mut faults);

        for region in self.env.fastram.iter().filter(|f| !f.readonly) {
            let next = ir.new_label();
            let host = gen_fastram_ptr(ir, region, pa, size, next);
            let v = ir.new_temp(ty);
            if masked {
                let old = ir.new_temp(Type::I32);
                ir.gen_ld32u(Type::I32, old, host, 0);
                gen_guest_order(ir, Type::I32, old, 4);
                ir.gen_andc(Type::I32, old, old, mask);
                ir.gen_and(Type::I32, v, data, mask);
                ir.gen_or(Type::I32, v, v, old);
            } else {
                ir.gen_mov(ty, v, data);
            }
            gen_guest_order(ir, ty, v, size);
            match size {
                1 => ir.gen_st8(ty, v, host, 0),
                2 => ir.gen_st16(ty, v, host, 0),
                4 => ir.gen_st32(ty, v, host, 0),
                _ => ir.gen_st(ty, v, host, 0),
            }
            ir.gen_ret();
            ir.gen_set_label(next);
        }

        if masked {
            let m64 = ir.new_temp(Type::I64);
            ir.gen_extu_i32_i64(m64, mask);
            ir.gen_writem(ty, pa, data, m64, size);
        } else {
            ir.gen_write(ty, pa, data, size);
        }
        ir.gen_ret();

        self.gen_faults(ir, ea, true, faults);
    }

    /// Little-endian mode faults on any misalignment; big-endian
    /// splits into smaller accesses when allowed. `split` emits the
    /// complete split path, ending in `Ret`.
    fn gen_alignment(
        &self,
        ir: &mut Context,
        m: u32,
        size: u32,
        ea: TempIdx,
        faults: &mut Faults,
        split: impl FnOnce(&mut Context),
    ) {
        if size == 1 {
            return;
        }
        let align = (size - 1) as u64;
        if m & mode::LE != 0 || !self.env.options.split_unaligned {
            let l = ir.new_label();
            ir.gen_brcondi(Type::I32, ea, align, Cond::TstNe, l);
            faults.alignment = Some(l);
        } else {
            let aligned = ir.new_label();
            ir.gen_brcondi(Type::I32, ea, align, Cond::TstEq, aligned);
            split(ir);
            ir.gen_set_label(aligned);
        }
    }

    /// Physical address for `ea` in accessor mode `m`: little-endian
    /// address munge, then translation when the mode translates.
    fn gen_translate(
        &self,
        ir: &mut Context,
        m: u32,
        size: u32,
        ea: TempIdx,
        write: bool,
        faults: &mut Faults,
    ) -> TempIdx {
        let pa = ir.new_temp(Type::I32);
        if m & mode::LE != 0 && size < 8 {
            let c = ir.const_i32(8 - size);
            ir.gen_xor(Type::I32, pa, ea, c);
        } else {
            ir.gen_mov(Type::I32, pa, ea);
        }

        if self.env.mmu.translates_data(m) {
            let mut how = if write { intention::WRITE } else { intention::READ };
            if m & mode::USER != 0 {
                how |= intention::USER;
            }
            let t = ir.new_temp_unit(Type::I64);
            ir.gen_translate(t, pa, how);
            let miss = ir.new_label();
            ir.gen_brcondi(Type::I64, t, 1 << 32, Cond::Geu, miss);
            ir.gen_extrl_i64_i32(pa, t);
            faults.miss = Some((miss, t));
        }
        pa
    }

    /// Out-of-line fault paths of an accessor.
    fn gen_faults(&self, ir: &mut Context, ea: TempIdx, write: bool, faults: Faults) {
        let r = self.env.regs;
        let mmu = self.env.mmu;
        let pc = ir.new_temp(Type::I32);

        if let Some(l) = faults.alignment {
            ir.gen_set_label(l);
            r.gen_store_spr(ir, ea, spr::DAR);
            ir.gen_recover(pc, MapVar::Pc);
            ir.gen_exh(self.h.exception(Exception::Alignment), pc);
        }

        if let Some((l, fault)) = faults.miss {
            ir.gen_set_label(l);
            let exc = mmu.data_miss(write);
            if exc.is_tlb_miss() {
                r.gen_store_spr(ir, ea, spr::DMISS);
            } else {
                r.gen_store_spr(ir, ea, spr::DAR);
                let store = if write { dsisr::STORE } else { 0 };
                let bits = ir.new_temp_unit(Type::I32);
                let found = ir.new_label();
                ir.gen_movi(Type::I32, bits, (dsisr::PROTECTED | store) as u64);
                ir.gen_brcondi(Type::I64, fault, TranslateFault::NotFound.code(), Cond::Ne, found);
                ir.gen_movi(Type::I32, bits, (dsisr::NOT_FOUND | store) as u64);
                ir.gen_set_label(found);
                r.gen_store_spr(ir, bits, spr::DSISR);
            }
            ir.gen_recover(pc, MapVar::Pc);
            ir.gen_exh(self.h.exception(exc), pc);
        }
    }

    /// Unaligned big-endian load assembled from smaller loads.
    fn split_read(
        &self,
        ir: &mut Context,
        m: u32,
        size: u32,
        masked: bool,
        ea: TempIdx,
        mask: TempIdx,
    ) {
        let r = self.env.regs;
        let addr = ir.new_temp(Type::I32);
        let eight = ir.const_i32(8);

        if size == 8 {
            let hi = ir.new_temp(Type::I32);
            ir.gen_mov(Type::I32, r.i[0], ea);
            ir.gen_callh(self.h.read(4, false, m));
            ir.gen_mov(Type::I32, hi, r.i[0]);
            let four = ir.const_i32(4);
            ir.gen_add(Type::I32, addr, ea, four);
            ir.gen_mov(Type::I32, r.i[0], addr);
            ir.gen_callh(self.h.read(4, false, m));
            let lo64 = ir.new_temp(Type::I64);
            ir.gen_extu_i32_i64(lo64, r.i[0]);
            let hi64 = ir.new_temp(Type::I64);
            ir.gen_extu_i32_i64(hi64, hi);
            let sh = ir.const_i64(32);
            ir.gen_shl(Type::I64, hi64, hi64, sh);
            ir.gen_or(Type::I64, r.d[0], hi64, lo64);
            ir.gen_ret();
            return;
        }

        let acc = ir.new_temp(Type::I32);
        ir.gen_movi(Type::I32, acc, 0);
        for k in 0..size {
            let off = ir.const_i32(k);
            ir.gen_add(Type::I32, addr, ea, off);
            ir.gen_mov(Type::I32, r.i[0], addr);
            ir.gen_callh(self.h.read(1, false, m));
            ir.gen_shl(Type::I32, acc, acc, eight);
            ir.gen_or(Type::I32, acc, acc, r.i[0]);
        }
        if masked {
            ir.gen_and(Type::I32, acc, acc, mask);
        }
        ir.gen_mov(Type::I32, r.i[0], acc);
        ir.gen_ret();
    }

    /// Unaligned big-endian store split into smaller stores. Masked
    /// stores skip bytes whose mask byte is clear.
    #[allow(clippy::too_many_arguments)]
    fn split_write(
        &self,
        ir: &mut Context,
        m: u32,
        size: u32,
        masked: bool,
        ea: TempIdx,
        data: TempIdx,
        mask: TempIdx,
    ) {
        let r = self.env.regs;
        let addr = ir.new_temp(Type::I32);

        if size == 8 {
            let half = ir.new_temp(Type::I32);
            ir.gen_extrh_i64_i32(half, data);
            ir.gen_mov(Type::I32, r.i[0], ea);
            ir.gen_mov(Type::I32, r.i[1], half);
            ir.gen_callh(self.h.write(4, false, m));
            ir.gen_extrl_i64_i32(half, data);
            let four = ir.const_i32(4);
            ir.gen_add(Type::I32, addr, ea, four);
            ir.gen_mov(Type::I32, r.i[0], addr);
            ir.gen_mov(Type::I32, r.i[1], half);
            ir.gen_callh(self.h.write(4, false, m));
            ir.gen_ret();
            return;
        }

        let byte = ir.new_temp(Type::I32);
        let ff = ir.const_i32(0xff);
        for k in 0..size {
            let shift = ir.const_i32(8 * (size - 1 - k));
            let skip = ir.new_label();
            if masked {
                ir.gen_shr(Type::I32, byte, mask, shift);
                ir.gen_brcondi(Type::I32, byte, 0xff, Cond::TstEq, skip);
            }
            ir.gen_shr(Type::I32, byte, data, shift);
            ir.gen_and(Type::I32, byte, byte, ff);
            let off = ir.const_i32(k);
            ir.gen_add(Type::I32, addr, ea, off);
            ir.gen_mov(Type::I32, r.i[0], addr);
            ir.gen_mov(Type::I32, r.i[1], byte);
            ir.gen_callh(self.h.write(1, false, m));
            ir.gen_set_label(skip);
        }
        ir.gen_ret();
    }
}

/// Labels of the out-of-line fault paths an accessor needs.
#[derive(Default)]
struct Faults {
    alignment: Option<u32>,
    /// Miss label and the temp holding the fault code.
    miss: Option<(u32, TempIdx)>,
}

/// Host pointer into `region` for `pa`, or a branch to `next` when
/// the access does not fit inside the region.
fn gen_fastram_ptr(
    ir: &mut Context,
    region: &FastRam,
    pa: TempIdx,
    size: u32,
    next: u32,
) -> TempIdx {
    ir.gen_brcondi(Type::I32, pa, region.start as u64, Cond::Ltu, next);
    let last = region.end.wrapping_sub(size - 1);
    ir.gen_brcondi(Type::I32, pa, last as u64, Cond::Gtu, next);
    let off = ir.new_temp(Type::I32);
    let start = ir.const_i32(region.start);
    ir.gen_sub(Type::I32, off, pa, start);
    let host = ir.new_temp(Type::I64);
    ir.gen_extu_i32_i64(host, off);
    let base = ir.const_i64(region.base as u64);
    ir.gen_add(Type::I64, host, host, base);
    host
}

/// Fast RAM holds guest (big-endian) byte order.
fn gen_guest_order(ir: &mut Context, ty: Type, v: TempIdx, size: u32) {
    if cfg!(target_endian = "big") {
        return;
    }
    match size {
        2 => {
            ir.gen_bswap16(ty, v, v);
        }
        4 => {
            ir.gen_bswap32(ty, v, v);
        }
        8 => {
            ir.gen_bswap64(v, v);
        }
        _ => {}
    }
}
