//! Opcode translator: one decoded instruction in, IR out.
//!
//! Dispatch is by primary opcode, then by the secondary field of
//! groups 19, 31, 59 and 63. Every `trans_*` returns `false` when the
//! instruction needs behaviour this 32-bit core does not implement;
//! the block compiler turns that into a run-time unimplemented exit.
//!
//! The block compiler records the PC/cycle checkpoint of each
//! instruction before calling in here, so anything below may fault.

mod alu;
mod branch;
mod fpu;
mod mem;
mod system;

use std::collections::HashMap;

use drc_core::{Cond, Context, Flags, TempIdx, Type};

use crate::analyzer::Descriptor;
use crate::config::{Capabilities, DrcOptions};
use crate::cpu::{self, msr, program, xer, Exception};
use crate::handlers::Handles;
use crate::helpers::HelperIds;
use crate::insn::*;
use crate::mmu::MmuStrategy;
use crate::regmap::RegMap;

type BinOp = fn(&mut Context, Type, TempIdx, TempIdx, TempIdx) -> TempIdx;

/// Per-group translation state.
pub struct Translator<'a> {
    pub regs: &'a RegMap,
    pub handles: &'a Handles,
    pub helpers: HelperIds,
    pub mmu: &'a dyn MmuStrategy,
    pub options: DrcOptions,
    pub caps: Capabilities,
    /// Operating mode the group is compiled for.
    pub mode: u32,
    /// Labels of branch targets inside the group, by PC.
    pub labels: &'a HashMap<u32, u32>,
    /// Cycles accumulated since the last commit.
    pub cycles: u32,
    /// MSR[FP] already tested in this sequence.
    pub fpu_checked: bool,
}

/// Which XER / CR0 results an integer op must produce.
#[derive(Clone, Copy, Debug, Default)]
struct FlagUpdate {
    cr0: bool,
    ca: bool,
    /// Subtract-style carry: CA is the complement of the borrow.
    ca_inverted: bool,
    ov: bool,
}

impl FlagUpdate {
    fn mask(self) -> Flags {
        let mut f = Flags::NONE;
        if self.cr0 {
            f = f.union(Flags::Z).union(Flags::S);
        }
        if self.ca {
            f = f.union(Flags::C);
        }
        if self.ov {
            f = f.union(Flags::V);
        }
        f
    }

    fn any(self) -> bool {
        self.cr0 || self.ca || self.ov
    }
}

impl<'a> Translator<'a> {
    pub fn translate(&mut self, ir: &mut Context, d: &Descriptor) -> bool {
        let op = d.opcode;
        match opcd(op) {
            3 => self.trans_twi(ir, d),
            7 => self.trans_mulli(ir, d),
            8 => self.trans_subfic(ir, d),
            10 | 11 => self.trans_cmp_imm(ir, d),
            12 | 13 => self.trans_addic(ir, d),
            14 | 15 => self.trans_addi(ir, d),
            16 => self.trans_bc(ir, d),
            17 => self.trans_sc(ir, d),
            18 => self.trans_b(ir, d),
            19 => self.trans_group19(ir, d),
            20 | 21 | 23 => self.trans_rotate(ir, d),
            24..=29 => self.trans_logic_imm(ir, d),
            31 => self.trans_group31(ir, d),
            32..=45 => self.trans_load_store_d(ir, d),
            46 | 47 => self.trans_multiple(ir, d),
            48..=55 => self.trans_fp_load_store(ir, d),
            59 => self.trans_group59(ir, d),
            63 => self.trans_group63(ir, d),
            _ => false,
        }
    }

    fn trans_group19(&mut self, ir: &mut Context, d: &Descriptor) -> bool {
        match xo10(d.opcode) {
            0 => self.trans_mcrf(ir, d),
            16 => self.trans_bclr(ir, d),
            528 => self.trans_bcctr(ir, d),
            50 => self.trans_rfi(ir, d),
            150 => true,
            33 | 129 | 193 | 225 | 257 | 289 | 417 | 449 => self.trans_cr_logic(ir, d),
            _ => self.gen_illegal(ir, d),
        }
    }

    fn trans_group31(&mut self, ir: &mut Context, d: &Descriptor) -> bool {
        let op = d.opcode;
        match xo10(op) {
            0 | 32 => self.trans_cmp_reg(ir, d),
            4 => self.trans_tw(ir, d),
            11 | 75 => self.trans_mulh(ir, d),
            19 => self.trans_mfcr(ir, d),
            144 => self.trans_mtcrf(ir, d),
            512 => self.trans_mcrxr(ir, d),
            24 | 536 => self.trans_shift(ir, d),
            792 => self.trans_sraw(ir, d),
            824 => self.trans_srawi(ir, d),
            26 | 922 | 954 => self.trans_unary_logic(ir, d),
            28 | 60 | 124 | 284 | 316 | 412 | 444 | 476 => self.trans_logic_reg(ir, d),
            83 => self.trans_mfmsr(ir, d),
            146 => self.trans_mtmsr(ir, d),
            339 => self.trans_mfspr(ir, d),
            467 => self.trans_mtspr(ir, d),
            371 => self.trans_mftb(ir, d),
            210 | 242 => self.trans_mtsr(ir, d),
            595 | 659 => self.trans_mfsr(ir, d),
            306 | 370 | 566 => self.trans_tlb(ir, d),
            978 | 1010 => self.trans_tlb_load(ir, d),
            54 | 86 | 246 | 278 | 598 | 854 | 982 => true,
            470 => {
                self.gen_privileged(ir, d);
                true
            }
            20 => self.trans_lwarx(ir, d),
            150 => self.trans_stwcx(ir, d),
            23 | 55 | 87 | 119 | 279 | 311 | 343 | 375 | 151 | 183 | 215 | 247 | 407 | 439
            | 310 | 438 => self.trans_load_store_x(ir, d),
            534 | 790 | 662 | 918 => self.trans_byte_reversed(ir, d),
            597 | 725 => self.trans_string_imm(ir, d),
            533 | 661 => self.trans_string_reg(ir, d),
            1014 => self.trans_dcbz(ir, d),
            535 | 567 | 599 | 631 | 663 | 695 | 727 | 759 | 983 => {
                self.trans_fp_load_store_x(ir, d)
            }
            9 | 21 | 27 | 53 | 58 | 68 | 73 | 84 | 149 | 181 | 214 | 233 | 341 | 373
            | 434 | 457 | 489 | 498 | 539 | 794 | 826 | 827 | 986 => false,
            _ => match xo9(op) {
                8 | 10 | 40 | 104 | 136 | 138 | 200 | 202 | 232 | 234 | 266 => {
                    self.trans_arith(ir, d)
                }
                235 | 459 | 491 => self.trans_mul_div(ir, d),
                9 | 73 | 233 | 457 | 489 => false,
                _ => self.gen_illegal(ir, d),
            },
        }
    }

    // -- Operands ----------------------------------------------

    /// `rA`, or the constant zero when the field is 0.
    fn ra_or_zero(&self, ir: &mut Context, n: usize) -> TempIdx {
        if n == 0 {
            ir.const_i32(0)
        } else {
            self.regs.r[n]
        }
    }

    fn gpr(&self, n: usize) -> TempIdx {
        self.regs.r[n]
    }

    fn imm(&self, ir: &mut Context, v: u32) -> TempIdx {
        ir.const_i32(v)
    }

    // -- Flags ---------------------------------------------------

    fn flag_update(&self, d: &Descriptor, rc: bool, ca: bool, ov: bool) -> FlagUpdate {
        FlagUpdate {
            cr0: rc && d.cr0_live(),
            ca: ca && d.ca_live,
            ca_inverted: false,
            ov,
        }
    }

    /// Turn the host flags of the preceding op into XER and CR0
    /// updates. Must directly follow the flag-producing op.
    fn gen_flag_results(&self, ir: &mut Context, fu: FlagUpdate) {
        if !fu.any() {
            return;
        }
        let r = self.regs;
        let f = ir.new_temp(Type::I32);
        ir.gen_getflags(f, Flags::ALL);

        if fu.ca {
            let c = ir.new_temp(Type::I32);
            let one = self.imm(ir, Flags::C.bits() as u32);
            ir.gen_and(Type::I32, c, f, one);
            if fu.ca_inverted {
                let one = self.imm(ir, 1);
                ir.gen_xor(Type::I32, c, c, one);
            }
            let sh = self.imm(ir, xer::CA_BIT);
            ir.gen_shl(Type::I32, c, c, sh);
            let m = self.imm(ir, xer::CA);
            ir.gen_andc(Type::I32, r.xer, r.xer, m);
            ir.gen_or(Type::I32, r.xer, r.xer, c);
        }
        if fu.ov {
            let e = self.gen_table_lookup(ir, f, cpu::OV_XER_OFFSET);
            let m = self.imm(ir, xer::OV);
            ir.gen_andc(Type::I32, r.xer, r.xer, m);
            ir.gen_or(Type::I32, r.xer, r.xer, e);
        }
        if fu.cr0 {
            self.gen_cr_from_flags(ir, f, 0, cpu::SZ_CR_OFFSET, true);
        }
    }

    /// `table[flags]` from the state block.
    fn gen_table_lookup(&self, ir: &mut Context, f: TempIdx, table: i64) -> TempIdx {
        let idx = ir.new_temp(Type::I64);
        ir.gen_extu_i32_i64(idx, f);
        let two = ir.const_i64(2);
        ir.gen_shl(Type::I64, idx, idx, two);
        ir.gen_add(Type::I64, idx, idx, self.regs.env);
        let v = ir.new_temp(Type::I32);
        ir.gen_ld32u(Type::I32, v, idx, table);
        v
    }

    /// `cr[field] = table[flags]`, plus XER[SO] for integer tables.
    fn gen_cr_from_flags(&self, ir: &mut Context, f: TempIdx, field: usize, table: i64, so: bool) {
        let v = self.gen_table_lookup(ir, f, table);
        if so {
            let s = ir.new_temp(Type::I32);
            let sh = self.imm(ir, 31);
            ir.gen_shr(Type::I32, s, self.regs.xer, sh);
            ir.gen_or(Type::I32, v, v, s);
        }
        ir.gen_mov(Type::I32, self.regs.cr[field], v);
    }

    /// CR0 from a finished result.
    fn gen_record(&self, ir: &mut Context, d: &Descriptor, result: TempIdx) {
        if !(rc(d.opcode) && d.cr0_live()) {
            return;
        }
        ir.gen_test(Type::I32, result, result, Flags::Z.union(Flags::S));
        let f = ir.new_temp(Type::I32);
        ir.gen_getflags(f, Flags::ALL);
        self.gen_cr_from_flags(ir, f, 0, cpu::SZ_CR_OFFSET, true);
    }

    /// Load XER[CA] into the host carry flag.
    fn gen_carry_in(&self, ir: &mut Context) {
        ir.gen_setcarry(Type::I32, self.regs.xer, xer::CA_BIT);
    }

    // -- Cycles and exceptions ---------------------------------

    /// Commit the accumulated cycles. With `check`, a negative count
    /// leaves through the out-of-cycles stub with `resume` as the
    /// next PC.
    pub fn update_cycles(&mut self, ir: &mut Context, resume: TempIdx, check: bool) {
        if self.cycles > 0 {
            let c = self.imm(ir, self.cycles);
            ir.gen_sub(Type::I32, self.regs.icount, self.regs.icount, c);
            self.cycles = 0;
        }
        if check {
            let ok = ir.new_label();
            ir.gen_brcondi(Type::I32, self.regs.icount, 0, Cond::Ge, ok);
            ir.gen_exh(self.handles.out_of_cycles, resume);
            ir.gen_set_label(ok);
        }
    }

    /// Raise `exc` with SRR0 = `srr0`. `srr1` bits go in `i1` for the
    /// handlers that take them.
    fn gen_exception(&self, ir: &mut Context, exc: Exception, srr0: u32, srr1: Option<u32>) {
        if let Some(bits) = srr1 {
            ir.gen_movi(Type::I32, self.regs.i[1], bits as u64);
        }
        let pc = self.imm(ir, srr0);
        ir.gen_exh(self.handles.exception(exc), pc);
    }

    pub fn gen_illegal(&self, ir: &mut Context, d: &Descriptor) -> bool {
        self.gen_exception(ir, Exception::Program, d.pc, Some(program::ILLEGAL));
        true
    }

    /// Raise the privileged-instruction exception when compiling for
    /// user mode. Returns whether it was raised.
    fn gen_privileged(&self, ir: &mut Context, d: &Descriptor) -> bool {
        if !self.is_user() {
            return false;
        }
        self.gen_exception(ir, Exception::Program, d.pc, Some(program::PRIVILEGED));
        true
    }

    fn is_user(&self) -> bool {
        self.mode & cpu::mode::USER != 0
    }

    /// MSR[FP] test, once per sequence.
    fn gen_fpu_check(&mut self, ir: &mut Context, d: &Descriptor) {
        if self.fpu_checked {
            return;
        }
        self.fpu_checked = true;
        let ok = ir.new_label();
        ir.gen_brcondi(Type::I32, self.regs.msr, msr::FP as u64, Cond::TstNe, ok);
        self.gen_exception(ir, Exception::FpUnavailable, d.pc, None);
        ir.gen_set_label(ok);
    }

    // -- Memory ---------------------------------------------------

    /// Call the load accessor for the compiled mode; the result is
    /// copied out of the parameter register.
    fn gen_read(&self, ir: &mut Context, size: u32, ea: TempIdx, mask: Option<TempIdx>) -> TempIdx {
        let r = self.regs;
        ir.gen_mov(Type::I32, r.i[0], ea);
        if let Some(m) = mask {
            ir.gen_mov(Type::I32, r.i[2], m);
        }
        ir.gen_callh(self.handles.read(size, mask.is_some(), self.mode));
        if size == 8 {
            let v = ir.new_temp(Type::I64);
            ir.gen_mov(Type::I64, v, r.d[0]);
            v
        } else {
            let v = ir.new_temp(Type::I32);
            ir.gen_mov(Type::I32, v, r.i[0]);
            v
        }
    }

    fn gen_write(&self, ir: &mut Context, size: u32, ea: TempIdx, data: TempIdx, mask: Option<TempIdx>) {
        let r = self.regs;
        ir.gen_mov(Type::I32, r.i[0], ea);
        if size == 8 {
            ir.gen_mov(Type::I64, r.d[1], data);
        } else {
            ir.gen_mov(Type::I32, r.i[1], data);
        }
        if let Some(m) = mask {
            ir.gen_mov(Type::I32, r.i[2], m);
        }
        ir.gen_callh(self.handles.write(size, mask.is_some(), self.mode));
    }

    /// `(rA|0) + d`
    fn gen_ea_d(&self, ir: &mut Context, op: u32) -> TempIdx {
        let base = self.ra_or_zero(ir, ra(op));
        let disp = self.imm(ir, simm(op) as u32);
        let ea = ir.new_temp(Type::I32);
        ir.gen_add(Type::I32, ea, base, disp);
        ea
    }

    /// `(rA|0) + rB`
    fn gen_ea_x(&self, ir: &mut Context, op: u32) -> TempIdx {
        let base = self.ra_or_zero(ir, ra(op));
        let ea = ir.new_temp(Type::I32);
        ir.gen_add(Type::I32, ea, base, self.regs.r[rb(op)]);
        ea
    }

    // -- Control transfer ----------------------------------------

    /// Commit cycles and go to a static target: a label inside the
    /// group, otherwise the hash table.
    fn gen_goto(&mut self, ir: &mut Context, target: u32) {
        let t = self.imm(ir, target);
        self.update_cycles(ir, t, true);
        match self.labels.get(&target) {
            Some(&label) => ir.gen_br(label),
            None => {
                let m = self.imm(ir, self.mode);
                ir.gen_hashjmp(m, t, self.handles.nocode);
            }
        }
    }

    /// Commit cycles and dispatch to a run-time target.
    fn gen_goto_dynamic(&mut self, ir: &mut Context, target: TempIdx, mode_t: TempIdx) {
        self.update_cycles(ir, target, true);
        ir.gen_hashjmp(mode_t, target, self.handles.nocode);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_mask_follows_requested_results() {
        let fu = FlagUpdate {
            cr0: true,
            ca: false,
            ca_inverted: false,
            ov: true,
        };
        assert_eq!(fu.mask(), Flags::Z.union(Flags::S).union(Flags::V));
        assert!(!FlagUpdate::default().any());
    }
}
