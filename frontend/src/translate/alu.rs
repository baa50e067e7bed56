//! Integer arithmetic, logic, rotate/shift, compare and CR ops.

use drc_core::{Cond, Context, Flags, Opcode, TempIdx, Type};

use super::{BinOp, Translator};
use crate::analyzer::Descriptor;
use crate::cpu::{self, xer};
use crate::insn::*;

impl Translator<'_> {
    // -- Immediate forms -----------------------------------------

    pub(super) fn trans_addi(&mut self, ir: &mut Context, d: &Descriptor) -> bool {
        let op = d.opcode;
        let mut v = simm(op) as u32;
        if opcd(op) == 15 {
            v <<= 16;
        }
        let base = self.ra_or_zero(ir, ra(op));
        let imm = self.imm(ir, v);
        ir.gen_add(Type::I32, self.gpr(rd(op)), base, imm);
        true
    }

    /// addic / addic.
    pub(super) fn trans_addic(&mut self, ir: &mut Context, d: &Descriptor) -> bool {
        let op = d.opcode;
        let fu = self.flag_update(d, opcd(op) == 13, true, false);
        let imm = self.imm(ir, simm(op) as u32);
        ir.gen_binop(Opcode::Add, Type::I32, self.gpr(rd(op)), self.gpr(ra(op)), imm, fu.mask());
        self.gen_flag_results(ir, fu);
        true
    }

    pub(super) fn trans_subfic(&mut self, ir: &mut Context, d: &Descriptor) -> bool {
        let op = d.opcode;
        let mut fu = self.flag_update(d, false, true, false);
        fu.ca_inverted = true;
        let imm = self.imm(ir, simm(op) as u32);
        ir.gen_binop(Opcode::Sub, Type::I32, self.gpr(rd(op)), imm, self.gpr(ra(op)), fu.mask());
        self.gen_flag_results(ir, fu);
        true
    }

    pub(super) fn trans_mulli(&mut self, ir: &mut Context, d: &Descriptor) -> bool {
        let op = d.opcode;
        let imm = self.imm(ir, simm(op) as u32);
        ir.gen_mul(Type::I32, self.gpr(rd(op)), self.gpr(ra(op)), imm);
        true
    }

    /// ori, oris, xori, xoris, andi., andis.
    pub(super) fn trans_logic_imm(&mut self, ir: &mut Context, d: &Descriptor) -> bool {
        let op = d.opcode;
        let (f, shifted): (BinOp, bool) = match opcd(op) {
            24 => (Context::gen_or, false),
            25 => (Context::gen_or, true),
            26 => (Context::gen_xor, false),
            27 => (Context::gen_xor, true),
            28 => (Context::gen_and, false),
            _ => (Context::gen_and, true),
        };
        let v = if shifted { uimm(op) << 16 } else { uimm(op) };
        let imm = self.imm(ir, v);
        let dst = self.gpr(ra(op));
        f(ir, Type::I32, dst, self.gpr(rs(op)), imm);
        // andi. and andis. always record
        if opcd(op) >= 28 && d.cr0_live() {
            self.gen_record_always(ir, dst);
        }
        true
    }

    fn gen_record_always(&self, ir: &mut Context, result: TempIdx) {
        ir.gen_test(Type::I32, result, result, Flags::Z | Flags::S);
        let f = ir.new_temp(Type::I32);
        ir.gen_getflags(f, Flags::ALL);
        self.gen_cr_from_flags(ir, f, 0, cpu::SZ_CR_OFFSET, true);
    }

    // -- Compare ---------------------------------------------------

    fn gen_compare(&self, ir: &mut Context, d: &Descriptor, a: TempIdx, b: TempIdx, logical: bool) {
        let field = crfd(d.opcode);
        if !d.cr_field_live(field) {
            return;
        }
        let (mask, table) = if logical {
            (Flags::Z | Flags::C, cpu::CMPL_CR_OFFSET)
        } else {
            (Flags::Z | Flags::S | Flags::V, cpu::CMP_CR_OFFSET)
        };
        ir.gen_cmp(Type::I32, a, b, mask);
        let f = ir.new_temp(Type::I32);
        ir.gen_getflags(f, Flags::ALL);
        self.gen_cr_from_flags(ir, f, field, table, true);
    }

    /// cmpi / cmpli
    pub(super) fn trans_cmp_imm(&mut self, ir: &mut Context, d: &Descriptor) -> bool {
        let op = d.opcode;
        if cmp_l(op) {
            return false;
        }
        let logical = opcd(op) == 10;
        let v = if logical { uimm(op) } else { simm(op) as u32 };
        let imm = self.imm(ir, v);
        self.gen_compare(ir, d, self.gpr(ra(op)), imm, logical);
        true
    }

    /// cmp / cmpl
    pub(super) fn trans_cmp_reg(&mut self, ir: &mut Context, d: &Descriptor) -> bool {
        let op = d.opcode;
        if cmp_l(op) {
            return false;
        }
        let logical = xo10(op) == 32;
        self.gen_compare(ir, d, self.gpr(ra(op)), self.gpr(rb(op)), logical);
        true
    }

    // -- XO-form arithmetic ----------------------------------------

    pub(super) fn trans_arith(&mut self, ir: &mut Context, d: &Descriptor) -> bool {
        let op = d.opcode;
        let (dst, a, b) = (self.gpr(rd(op)), self.gpr(ra(op)), self.gpr(rb(op)));
        let rc = rc(op);
        let oe = oe(op);
        match xo9(op) {
            // add
            266 => {
                let fu = self.flag_update(d, rc, false, oe);
                ir.gen_binop(Opcode::Add, Type::I32, dst, a, b, fu.mask());
                self.gen_flag_results(ir, fu);
            }
            // addc
            10 => {
                let fu = self.flag_update(d, rc, true, oe);
                ir.gen_binop(Opcode::Add, Type::I32, dst, a, b, fu.mask());
                self.gen_flag_results(ir, fu);
            }
            // subf
            40 => {
                let fu = self.flag_update(d, rc, false, oe);
                ir.gen_binop(Opcode::Sub, Type::I32, dst, b, a, fu.mask());
                self.gen_flag_results(ir, fu);
            }
            // subfc
            8 => {
                let mut fu = self.flag_update(d, rc, true, oe);
                fu.ca_inverted = true;
                ir.gen_binop(Opcode::Sub, Type::I32, dst, b, a, fu.mask());
                self.gen_flag_results(ir, fu);
            }
            // neg
            104 => {
                let fu = self.flag_update(d, rc, false, oe);
                let zero = self.imm(ir, 0);
                ir.gen_binop(Opcode::Sub, Type::I32, dst, zero, a, fu.mask());
                self.gen_flag_results(ir, fu);
            }
            // adde, addme, addze
            138 | 234 | 202 => {
                let rhs = match xo9(op) {
                    138 => b,
                    234 => self.imm(ir, 0xffff_ffff),
                    _ => self.imm(ir, 0),
                };
                self.gen_add_extended(ir, d, dst, a, rhs);
            }
            // subfe, subfme, subfze
            _ => {
                let rhs = match xo9(op) {
                    136 => b,
                    232 => self.imm(ir, 0xffff_ffff),
                    _ => self.imm(ir, 0),
                };
                let na = ir.new_temp(Type::I32);
                ir.gen_not(Type::I32, na, a);
                self.gen_add_extended(ir, d, dst, na, rhs);
            }
        }
        true
    }

    /// `dst = a + b + CA`, producing CA and the optional OV/CR0.
    fn gen_add_extended(&self, ir: &mut Context, d: &Descriptor, dst: TempIdx, a: TempIdx, b: TempIdx) {
        let op = d.opcode;
        let fu = self.flag_update(d, rc(op), true, oe(op));
        self.gen_carry_in(ir);
        ir.gen_addc(Type::I32, dst, a, b, fu.mask());
        self.gen_flag_results(ir, fu);
    }

    /// mullw, divw, divwu
    pub(super) fn trans_mul_div(&mut self, ir: &mut Context, d: &Descriptor) -> bool {
        let op = d.opcode;
        let opc = match xo9(op) {
            235 => Opcode::Mul,
            491 => Opcode::DivS,
            _ => Opcode::DivU,
        };
        let fu = self.flag_update(d, rc(op), false, oe(op));
        ir.gen_binop(opc, Type::I32, self.gpr(rd(op)), self.gpr(ra(op)), self.gpr(rb(op)), fu.mask());
        self.gen_flag_results(ir, fu);
        true
    }

    /// mulhw, mulhwu
    pub(super) fn trans_mulh(&mut self, ir: &mut Context, d: &Descriptor) -> bool {
        let op = d.opcode;
        let f: BinOp = if xo9(op) == 75 {
            Context::gen_mulsh
        } else {
            Context::gen_muluh
        };
        let dst = self.gpr(rd(op));
        f(ir, Type::I32, dst, self.gpr(ra(op)), self.gpr(rb(op)));
        self.gen_record(ir, d, dst);
        true
    }

    // -- Logic -----------------------------------------------------

    /// and, andc, or, orc, xor, nor, nand, eqv
    pub(super) fn trans_logic_reg(&mut self, ir: &mut Context, d: &Descriptor) -> bool {
        let op = d.opcode;
        let opc = match xo10(op) {
            28 => Opcode::And,
            60 => Opcode::AndC,
            444 => Opcode::Or,
            412 => Opcode::OrC,
            316 => Opcode::Xor,
            124 => Opcode::Nor,
            476 => Opcode::Nand,
            _ => Opcode::Eqv,
        };
        let fu = self.flag_update(d, rc(op), false, false);
        ir.gen_binop(opc, Type::I32, self.gpr(ra(op)), self.gpr(rs(op)), self.gpr(rb(op)), fu.mask());
        self.gen_flag_results(ir, fu);
        true
    }

    /// cntlzw, extsb, extsh
    pub(super) fn trans_unary_logic(&mut self, ir: &mut Context, d: &Descriptor) -> bool {
        let op = d.opcode;
        let (dst, src) = (self.gpr(ra(op)), self.gpr(rs(op)));
        match xo10(op) {
            26 => {
                ir.gen_clz(Type::I32, dst, src);
            }
            954 => {
                ir.gen_sext(Type::I32, dst, src, 8);
            }
            _ => {
                ir.gen_sext(Type::I32, dst, src, 16);
            }
        }
        self.gen_record(ir, d, dst);
        true
    }

    // -- Rotate and shift ------------------------------------------

    /// rlwimi, rlwinm, rlwnm
    pub(super) fn trans_rotate(&mut self, ir: &mut Context, d: &Descriptor) -> bool {
        let op = d.opcode;
        let mask = rot_mask(mb(op), me(op));
        let rot = ir.new_temp(Type::I32);
        if opcd(op) == 23 {
            let amt = ir.new_temp(Type::I32);
            let m = self.imm(ir, 31);
            ir.gen_and(Type::I32, amt, self.gpr(rb(op)), m);
            ir.gen_rotl(Type::I32, rot, self.gpr(rs(op)), amt);
        } else {
            let amt = self.imm(ir, sh(op));
            ir.gen_rotl(Type::I32, rot, self.gpr(rs(op)), amt);
        }
        let m = self.imm(ir, mask);
        ir.gen_and(Type::I32, rot, rot, m);
        let dst = self.gpr(ra(op));
        if opcd(op) == 20 {
            ir.gen_andc(Type::I32, dst, dst, m);
            ir.gen_or(Type::I32, dst, dst, rot);
        } else {
            ir.gen_mov(Type::I32, dst, rot);
        }
        self.gen_record(ir, d, dst);
        true
    }

    /// slw, srw: shift amounts of 32..63 give zero.
    pub(super) fn trans_shift(&mut self, ir: &mut Context, d: &Descriptor) -> bool {
        let op = d.opcode;
        let f: BinOp = if xo10(op) == 24 {
            Context::gen_shl
        } else {
            Context::gen_shr
        };
        let b = self.gpr(rb(op));
        let amt = ir.new_temp(Type::I32);
        let m31 = self.imm(ir, 31);
        ir.gen_and(Type::I32, amt, b, m31);
        let res = ir.new_temp(Type::I32);
        f(ir, Type::I32, res, self.gpr(rs(op)), amt);

        // all ones when bit 5 of rB is set
        let big = ir.new_temp(Type::I32);
        let c26 = self.imm(ir, 26);
        ir.gen_shl(Type::I32, big, b, c26);
        ir.gen_sar(Type::I32, big, big, m31);
        let dst = self.gpr(ra(op));
        ir.gen_andc(Type::I32, dst, res, big);
        self.gen_record(ir, d, dst);
        true
    }

    pub(super) fn trans_sraw(&mut self, ir: &mut Context, d: &Descriptor) -> bool {
        let op = d.opcode;
        let src = self.gpr(rs(op));
        let amt = ir.new_temp_unit(Type::I32);
        let m63 = self.imm(ir, 0x3f);
        ir.gen_and(Type::I32, amt, self.gpr(rb(op)), m63);

        let res = ir.new_temp_unit(Type::I32);
        let lost = ir.new_temp_unit(Type::I32);
        let big = ir.new_label();
        let done = ir.new_label();
        ir.gen_brcondi(Type::I32, amt, 31, Cond::Gtu, big);
        ir.gen_sar(Type::I32, res, src, amt);
        let ones = self.imm(ir, 0xffff_ffff);
        let keep = ir.new_temp(Type::I32);
        ir.gen_shl(Type::I32, keep, ones, amt);
        ir.gen_andc(Type::I32, lost, src, keep);
        ir.gen_br(done);

        ir.gen_set_label(big);
        let c31 = self.imm(ir, 31);
        ir.gen_sar(Type::I32, res, src, c31);
        ir.gen_mov(Type::I32, lost, src);
        ir.gen_set_label(done);

        self.gen_sra_carry(ir, d, src, lost);
        let dst = self.gpr(ra(op));
        ir.gen_mov(Type::I32, dst, res);
        self.gen_record(ir, d, dst);
        true
    }

    pub(super) fn trans_srawi(&mut self, ir: &mut Context, d: &Descriptor) -> bool {
        let op = d.opcode;
        let n = sh(op);
        let src = self.gpr(rs(op));
        let lost = ir.new_temp(Type::I32);
        let m = self.imm(ir, (1u32 << n).wrapping_sub(1));
        ir.gen_and(Type::I32, lost, src, m);
        self.gen_sra_carry(ir, d, src, lost);
        let amt = self.imm(ir, n);
        let dst = self.gpr(ra(op));
        ir.gen_sar(Type::I32, dst, src, amt);
        self.gen_record(ir, d, dst);
        true
    }

    /// CA = negative source with one-bits shifted out.
    fn gen_sra_carry(&self, ir: &mut Context, d: &Descriptor, src: TempIdx, lost: TempIdx) {
        if !d.ca_live {
            return;
        }
        let zero = self.imm(ir, 0);
        let neg = ir.new_temp(Type::I32);
        ir.gen_setcond(Type::I32, neg, src, zero, Cond::Lt);
        let nz = ir.new_temp(Type::I32);
        ir.gen_setcond(Type::I32, nz, lost, zero, Cond::Ne);
        ir.gen_and(Type::I32, neg, neg, nz);
        let sh = self.imm(ir, xer::CA_BIT);
        ir.gen_shl(Type::I32, neg, neg, sh);
        let ca = self.imm(ir, xer::CA);
        let r = self.regs;
        ir.gen_andc(Type::I32, r.xer, r.xer, ca);
        ir.gen_or(Type::I32, r.xer, r.xer, neg);
    }

    // -- Condition register ----------------------------------------

    pub(super) fn trans_mfcr(&mut self, ir: &mut Context, d: &Descriptor) -> bool {
        let dst = ir.new_temp(Type::I32);
        ir.gen_mov(Type::I32, dst, self.regs.cr[0]);
        let four = self.imm(ir, 4);
        for field in 1..cpu::NUM_CR_FIELDS {
            ir.gen_shl(Type::I32, dst, dst, four);
            ir.gen_or(Type::I32, dst, dst, self.regs.cr[field]);
        }
        ir.gen_mov(Type::I32, self.gpr(rd(d.opcode)), dst);
        true
    }

    pub(super) fn trans_mtcrf(&mut self, ir: &mut Context, d: &Descriptor) -> bool {
        let op = d.opcode;
        let mask = crm(op);
        let src = self.gpr(rs(op));
        let nibble = self.imm(ir, 0xf);
        for field in 0..cpu::NUM_CR_FIELDS {
            if mask & (0x80 >> field) == 0 {
                continue;
            }
            let t = ir.new_temp(Type::I32);
            let amt = self.imm(ir, 28 - 4 * field as u32);
            ir.gen_shr(Type::I32, t, src, amt);
            ir.gen_and(Type::I32, self.regs.cr[field], t, nibble);
        }
        true
    }

    pub(super) fn trans_mcrxr(&mut self, ir: &mut Context, d: &Descriptor) -> bool {
        let r = self.regs;
        let c28 = self.imm(ir, 28);
        ir.gen_shr(Type::I32, r.cr[crfd(d.opcode)], r.xer, c28);
        let m = self.imm(ir, 0x0fff_ffff);
        ir.gen_and(Type::I32, r.xer, r.xer, m);
        true
    }

    pub(super) fn trans_mcrf(&mut self, ir: &mut Context, d: &Descriptor) -> bool {
        let op = d.opcode;
        ir.gen_mov(Type::I32, self.regs.cr[crfd(op)], self.regs.cr[crfs(op)]);
        true
    }

    /// crand, cror, crxor, crnand, crnor, creqv, crandc, crorc
    pub(super) fn trans_cr_logic(&mut self, ir: &mut Context, d: &Descriptor) -> bool {
        let op = d.opcode;
        let opc = match xo10(op) {
            257 => Opcode::And,
            449 => Opcode::Or,
            193 => Opcode::Xor,
            225 => Opcode::Nand,
            33 => Opcode::Nor,
            289 => Opcode::Eqv,
            129 => Opcode::AndC,
            _ => Opcode::OrC,
        };
        let a = self.gen_cr_bit(ir, crba(op));
        let b = self.gen_cr_bit(ir, crbb(op));
        let res = ir.new_temp(Type::I32);
        ir.gen_binop(opc, Type::I32, res, a, b, Flags::NONE);
        let one = self.imm(ir, 1);
        ir.gen_and(Type::I32, res, res, one);

        let bd = crbd(op);
        let pos = 3 - (bd & 3);
        let amt = self.imm(ir, pos);
        ir.gen_shl(Type::I32, res, res, amt);
        let field = self.regs.cr[(bd >> 2) as usize];
        let clear = self.imm(ir, 1 << pos);
        ir.gen_andc(Type::I32, field, field, clear);
        ir.gen_or(Type::I32, field, field, res);
        true
    }

    /// CR bit `n` (0 = CR0[LT]) in bit 0 of a temp.
    fn gen_cr_bit(&self, ir: &mut Context, n: u32) -> TempIdx {
        let t = ir.new_temp(Type::I32);
        let amt = self.imm(ir, 3 - (n & 3));
        ir.gen_shr(Type::I32, t, self.regs.cr[(n >> 2) as usize], amt);
        t
    }
}
