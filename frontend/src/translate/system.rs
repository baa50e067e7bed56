//! Supervisor-level instructions: MSR, SPR and segment register
//! moves, traps, `rfi` and TLB maintenance.

use drc_core::{exit, Cond, Context, TempIdx, Type};

use super::Translator;
use crate::analyzer::{DescFlags, Descriptor};
use crate::config::Capabilities;
use crate::cpu::{self, msr, program, spr, Exception};
use crate::handlers::{gen_compute_mode, gen_swap_tgpr};
use crate::insn::*;

/// SPR numbers with bit 4 set are supervisor-only.
const fn spr_privileged(n: u32) -> bool {
    n & 0x10 != 0
}

impl Translator<'_> {
    // -- Traps -----------------------------------------------------

    fn gen_trap(&self, ir: &mut Context, d: &Descriptor, b: TempIdx) {
        let op = d.opcode;
        let to = to(op);
        if to == 0 {
            return;
        }
        let a = self.gpr(ra(op));
        let skip = ir.new_label();
        if to != 0x1f {
            let trap = ir.new_label();
            for (bit, cond) in [
                (0x10, Cond::Lt),
                (0x08, Cond::Gt),
                (0x04, Cond::Eq),
                (0x02, Cond::Ltu),
                (0x01, Cond::Gtu),
            ] {
                if to & bit != 0 {
                    ir.gen_brcond(Type::I32, a, b, cond, trap);
                }
            }
            ir.gen_br(skip);
            ir.gen_set_label(trap);
        }
        self.gen_exception(ir, Exception::Program, d.pc, Some(program::TRAP));
        ir.gen_set_label(skip);
    }

    pub(super) fn trans_twi(&mut self, ir: &mut Context, d: &Descriptor) -> bool {
        let b = self.imm(ir, simm(d.opcode) as u32);
        self.gen_trap(ir, d, b);
        true
    }

    pub(super) fn trans_tw(&mut self, ir: &mut Context, d: &Descriptor) -> bool {
        let b = self.gpr(rb(d.opcode));
        self.gen_trap(ir, d, b);
        true
    }

    // -- MSR -------------------------------------------------------

    pub(super) fn trans_mfmsr(&mut self, ir: &mut Context, d: &Descriptor) -> bool {
        if self.gen_privileged(ir, d) {
            return true;
        }
        ir.gen_mov(Type::I32, self.gpr(rd(d.opcode)), self.regs.msr);
        true
    }

    /// The group ends after `mtmsr`; the block compiler redispatches
    /// through the new mode.
    pub(super) fn trans_mtmsr(&mut self, ir: &mut Context, d: &Descriptor) -> bool {
        if self.gen_privileged(ir, d) {
            return true;
        }
        let r = self.regs;
        ir.gen_mov(Type::I32, r.msr, r.r[rs(d.opcode)]);
        gen_compute_mode(ir, r, r.msr, self.mmu.mode_mask());
        true
    }

    pub(super) fn trans_rfi(&mut self, ir: &mut Context, d: &Descriptor) -> bool {
        if self.gen_privileged(ir, d) {
            return true;
        }
        let r = self.regs;
        if self.mmu.swaps_tgpr() {
            let keep = ir.new_label();
            ir.gen_brcondi(Type::I32, r.msr, msr::TGPR as u64, Cond::TstEq, keep);
            gen_swap_tgpr(ir, r);
            ir.gen_set_label(keep);
        }
        let srr1 = ir.new_temp(Type::I32);
        r.gen_load_spr(ir, srr1, spr::SRR1);
        let mask = self.imm(ir, msr::SRR1_MASK);
        ir.gen_and(Type::I32, srr1, srr1, mask);
        let keep = self.imm(ir, !msr::SRR1_MASK & !msr::TGPR);
        ir.gen_and(Type::I32, r.msr, r.msr, keep);
        ir.gen_or(Type::I32, r.msr, r.msr, srr1);
        gen_compute_mode(ir, r, r.msr, self.mmu.mode_mask());

        let target = ir.new_temp(Type::I32);
        r.gen_load_spr(ir, target, spr::SRR0);
        let align = self.imm(ir, !3);
        ir.gen_and(Type::I32, target, target, align);
        self.gen_goto_dynamic(ir, target, r.mode);
        true
    }

    // -- SPRs ------------------------------------------------------

    pub(super) fn trans_mfspr(&mut self, ir: &mut Context, d: &Descriptor) -> bool {
        let op = d.opcode;
        let n = spr(op);
        if spr_privileged(n) && self.gen_privileged(ir, d) {
            return true;
        }
        let r = self.regs;
        let dst = r.r[rd(op)];
        match n {
            spr::XER => {
                ir.gen_mov(Type::I32, dst, r.xer);
            }
            spr::LR => {
                ir.gen_mov(Type::I32, dst, r.lr);
            }
            spr::CTR => {
                ir.gen_mov(Type::I32, dst, r.ctr);
            }
            spr::DEC if self.caps.contains(Capabilities::DECREMENTER) => {
                let pending = self.imm(ir, self.cycles);
                ir.gen_call(dst, self.helpers.dec_read, &[pending]);
            }
            spr::TBL_R | spr::TBU_R if self.caps.contains(Capabilities::TIMEBASE) => {
                self.gen_read_timebase(ir, dst, n == spr::TBU_R);
            }
            _ => {
                r.gen_load_spr(ir, dst, n);
            }
        }
        true
    }

    pub(super) fn trans_mftb(&mut self, ir: &mut Context, d: &Descriptor) -> bool {
        let op = d.opcode;
        let n = spr(op);
        if n != spr::TBL_R && n != spr::TBU_R {
            return self.gen_illegal(ir, d);
        }
        self.gen_read_timebase(ir, self.gpr(rd(op)), n == spr::TBU_R);
        true
    }

    fn gen_read_timebase(&self, ir: &mut Context, dst: TempIdx, upper: bool) {
        let half = self.imm(ir, upper as u32);
        let pending = self.imm(ir, self.cycles);
        ir.gen_call(dst, self.helpers.tb_read, &[half, pending]);
    }

    pub(super) fn trans_mtspr(&mut self, ir: &mut Context, d: &Descriptor) -> bool {
        let op = d.opcode;
        let n = spr(op);
        if spr_privileged(n) && self.gen_privileged(ir, d) {
            return true;
        }
        let r = self.regs;
        let src = r.r[rs(op)];
        match n {
            spr::XER => {
                let m = self.imm(ir, 0xe000_007f);
                ir.gen_and(Type::I32, r.xer, src, m);
            }
            spr::LR => {
                ir.gen_mov(Type::I32, r.lr, src);
            }
            spr::CTR => {
                ir.gen_mov(Type::I32, r.ctr, src);
            }
            spr::PVR => {}
            spr::DEC if self.caps.contains(Capabilities::DECREMENTER) => {
                let pending = self.imm(ir, self.cycles);
                let sink = ir.new_temp(Type::I32);
                ir.gen_call(sink, self.helpers.dec_write, &[src, pending]);
            }
            spr::TBL_W | spr::TBU_W if self.caps.contains(Capabilities::TIMEBASE) => {
                let half = self.imm(ir, (n == spr::TBU_W) as u32);
                let pending = self.imm(ir, self.cycles);
                let sink = ir.new_temp(Type::I32);
                ir.gen_call(sink, self.helpers.tb_write, &[half, src, pending]);
            }
            _ => {
                r.gen_store_spr(ir, src, n);
            }
        }
        self.gen_flush_exit(ir, d);
        true
    }

    // -- Segment registers -------------------------------------------

    /// mtsr / mtsrin
    pub(super) fn trans_mtsr(&mut self, ir: &mut Context, d: &Descriptor) -> bool {
        if self.gen_privileged(ir, d) {
            return true;
        }
        let op = d.opcode;
        let r = self.regs;
        let src = r.r[rs(op)];
        if xo10(op) == 210 {
            ir.gen_st32(Type::I32, src, r.env, cpu::sr_offset(sr(op)));
        } else {
            let slot = self.gen_sr_slot(ir, r.r[rb(op)]);
            ir.gen_st32(Type::I32, src, slot, cpu::sr_offset(0));
        }
        self.gen_flush_exit(ir, d);
        true
    }

    /// mfsr / mfsrin
    pub(super) fn trans_mfsr(&mut self, ir: &mut Context, d: &Descriptor) -> bool {
        if self.gen_privileged(ir, d) {
            return true;
        }
        let op = d.opcode;
        let r = self.regs;
        let dst = r.r[rd(op)];
        if xo10(op) == 595 {
            ir.gen_ld32u(Type::I32, dst, r.env, cpu::sr_offset(sr(op)));
        } else {
            let slot = self.gen_sr_slot(ir, r.r[rb(op)]);
            ir.gen_ld32u(Type::I32, dst, slot, cpu::sr_offset(0));
        }
        true
    }

    /// `env + (ea >> 28) * 4`
    fn gen_sr_slot(&self, ir: &mut Context, ea: TempIdx) -> TempIdx {
        let idx = ir.new_temp(Type::I32);
        let c28 = self.imm(ir, 28);
        ir.gen_shr(Type::I32, idx, ea, c28);
        let slot = ir.new_temp(Type::I64);
        ir.gen_extu_i32_i64(slot, idx);
        let two = ir.const_i64(2);
        ir.gen_shl(Type::I64, slot, slot, two);
        ir.gen_add(Type::I64, slot, slot, self.regs.env);
        slot
    }

    // -- TLB ---------------------------------------------------------

    /// tlbie, tlbia, tlbsync
    pub(super) fn trans_tlb(&mut self, ir: &mut Context, d: &Descriptor) -> bool {
        if self.gen_privileged(ir, d) {
            return true;
        }
        let op = d.opcode;
        let sink = ir.new_temp(Type::I32);
        match xo10(op) {
            306 => {
                ir.gen_call(sink, self.helpers.tlbie, &[self.regs.r[rb(op)]]);
            }
            370 => {
                ir.gen_call(sink, self.helpers.tlbia, &[]);
            }
            _ => {}
        }
        self.gen_flush_exit(ir, d);
        true
    }

    /// tlbld / tlbli
    pub(super) fn trans_tlb_load(&mut self, ir: &mut Context, d: &Descriptor) -> bool {
        if self.gen_privileged(ir, d) {
            return true;
        }
        let op = d.opcode;
        let instruction = self.imm(ir, (xo10(op) == 1010) as u32);
        let sink = ir.new_temp(Type::I32);
        ir.gen_call(sink, self.helpers.tlb_load, &[self.regs.r[rb(op)], instruction]);
        true
    }

    /// Leave generated code so the dispatch loop can drop the cache
    /// after a mapping change.
    fn gen_flush_exit(&mut self, ir: &mut Context, d: &Descriptor) {
        if !d.flags.contains(DescFlags::FLUSHES_CACHE) {
            return;
        }
        let r = self.regs;
        let next = self.imm(ir, d.pc.wrapping_add(4));
        self.update_cycles(ir, next, false);
        ir.gen_mov(Type::I32, r.pc, next);
        r.gen_spill(ir);
        ir.gen_exiti(exit::RESET_CACHE);
    }
}

