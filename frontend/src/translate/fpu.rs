//! Floating-point arithmetic, compares and FPSCR moves.
//!
//! FPRs hold raw f64 bit patterns. Only the rounding-mode field and
//! the FPCC nibble of the FPSCR are modelled; exception status bits
//! are left alone.

use drc_core::{Cond, Context, Flags, Opcode, TempIdx, Type};

use super::Translator;
use crate::analyzer::Descriptor;
use crate::cpu;
use crate::insn::*;

const SIGN: u64 = 1 << 63;

/// Upper word `mffs` places above the FPSCR.
const MFFS_HIGH: u64 = 0xfff8_0000_0000_0000;

/// Sign handling of the fused multiply-add family.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Fused {
    Add,
    Sub,
    NegAdd,
    NegSub,
}

impl Translator<'_> {
    pub(super) fn trans_group63(&mut self, ir: &mut Context, d: &Descriptor) -> bool {
        self.gen_fpu_check(ir, d);
        let op = d.opcode;
        let handled = match xo5(op) {
            18 => self.gen_farith(ir, d, Opcode::FDiv, false),
            20 => self.gen_farith(ir, d, Opcode::FSub, false),
            21 => self.gen_farith(ir, d, Opcode::FAdd, false),
            22 => self.gen_funary(ir, d, Opcode::FSqrt, false),
            23 => self.gen_fsel(ir, d),
            25 => self.gen_fmul(ir, d, false),
            26 => self.gen_funary(ir, d, Opcode::FRsqrt, false),
            28 => self.gen_fused(ir, d, Fused::Sub, false),
            29 => self.gen_fused(ir, d, Fused::Add, false),
            30 => self.gen_fused(ir, d, Fused::NegSub, false),
            31 => self.gen_fused(ir, d, Fused::NegAdd, false),
            _ => match xo10(op) {
                0 | 32 => self.gen_fcmp_cr(ir, d),
                12 => self.gen_funary(ir, d, Opcode::FRsp, false),
                14 | 15 => self.gen_fctiw(ir, d),
                38 | 70 => self.gen_mtfsb(ir, d),
                40 | 72 | 136 | 264 => self.gen_fsign(ir, d),
                64 => self.gen_mcrfs(ir, d),
                134 => self.gen_mtfsfi(ir, d),
                583 => self.gen_mffs(ir, d),
                711 => self.gen_mtfsf(ir, d),
                814 | 815 | 846 => return false,
                _ => return self.gen_illegal(ir, d),
            },
        };
        if handled {
            self.gen_fp_record(ir, d);
        }
        handled
    }

    pub(super) fn trans_group59(&mut self, ir: &mut Context, d: &Descriptor) -> bool {
        self.gen_fpu_check(ir, d);
        let handled = match xo5(d.opcode) {
            18 => self.gen_farith(ir, d, Opcode::FDiv, true),
            20 => self.gen_farith(ir, d, Opcode::FSub, true),
            21 => self.gen_farith(ir, d, Opcode::FAdd, true),
            22 => self.gen_funary(ir, d, Opcode::FSqrt, true),
            24 => self.gen_fres(ir, d),
            25 => self.gen_fmul(ir, d, true),
            28 => self.gen_fused(ir, d, Fused::Sub, true),
            29 => self.gen_fused(ir, d, Fused::Add, true),
            30 => self.gen_fused(ir, d, Fused::NegSub, true),
            31 => self.gen_fused(ir, d, Fused::NegAdd, true),
            _ => return self.gen_illegal(ir, d),
        };
        if handled {
            self.gen_fp_record(ir, d);
        }
        handled
    }

    fn fpr(&self, n: usize) -> TempIdx {
        self.regs.f[n]
    }

    /// CR1 = FPSCR[FX, FEX, VX, OX] for record forms.
    fn gen_fp_record(&self, ir: &mut Context, d: &Descriptor) {
        if !rc(d.opcode) || !d.cr_field_live(1) {
            return;
        }
        let c28 = self.imm(ir, 28);
        ir.gen_shr(Type::I32, self.regs.cr[1], self.regs.fpscr, c28);
    }

    fn gen_round_single(&self, ir: &mut Context, dst: TempIdx, single: bool) {
        if single && self.options.accurate_singles {
            ir.gen_funop(Opcode::FRsp, dst, dst);
        }
    }

    // -- Arithmetic --------------------------------------------------

    fn gen_farith(&self, ir: &mut Context, d: &Descriptor, opc: Opcode, single: bool) -> bool {
        let op = d.opcode;
        let dst = self.fpr(rd(op));
        ir.gen_fbinop(opc, dst, self.fpr(ra(op)), self.fpr(rb(op)));
        self.gen_round_single(ir, dst, single);
        true
    }

    /// `frD = frA * frC`
    fn gen_fmul(&self, ir: &mut Context, d: &Descriptor, single: bool) -> bool {
        let op = d.opcode;
        let dst = self.fpr(rd(op));
        ir.gen_fbinop(Opcode::FMul, dst, self.fpr(ra(op)), self.fpr(rc_reg(op)));
        self.gen_round_single(ir, dst, single);
        true
    }

    fn gen_funary(&self, ir: &mut Context, d: &Descriptor, opc: Opcode, single: bool) -> bool {
        let op = d.opcode;
        let dst = self.fpr(rd(op));
        ir.gen_funop(opc, dst, self.fpr(rb(op)));
        self.gen_round_single(ir, dst, single);
        true
    }

    /// fres always produces a single.
    fn gen_fres(&self, ir: &mut Context, d: &Descriptor) -> bool {
        let op = d.opcode;
        let dst = self.fpr(rd(op));
        ir.gen_funop(Opcode::FRecip, dst, self.fpr(rb(op)));
        ir.gen_funop(Opcode::FRsp, dst, dst);
        true
    }

    fn gen_fused(&self, ir: &mut Context, d: &Descriptor, kind: Fused, single: bool) -> bool {
        let op = d.opcode;
        let sign = ir.const_i64(SIGN);
        let addend = if matches!(kind, Fused::Sub | Fused::NegSub) {
            let t = ir.new_temp(Type::I64);
            ir.gen_xor(Type::I64, t, self.fpr(rb(op)), sign);
            t
        } else {
            self.fpr(rb(op))
        };
        let dst = self.fpr(rd(op));
        ir.gen_fmadd(dst, self.fpr(ra(op)), self.fpr(rc_reg(op)), addend);
        if matches!(kind, Fused::NegAdd | Fused::NegSub) {
            ir.gen_xor(Type::I64, dst, dst, sign);
        }
        self.gen_round_single(ir, dst, single);
        true
    }

    /// `frD = frA >= 0.0 ? frC : frB`; NaN selects frB.
    fn gen_fsel(&self, ir: &mut Context, d: &Descriptor) -> bool {
        let op = d.opcode;
        let zero = ir.const_i64(0);
        ir.gen_fcmp(self.fpr(ra(op)), zero, Flags::C | Flags::U);
        let f = ir.new_temp(Type::I32);
        ir.gen_getflags(f, Flags::C | Flags::U);
        let res = ir.new_temp_unit(Type::I64);
        ir.gen_mov(Type::I64, res, self.fpr(rc_reg(op)));
        let done = ir.new_label();
        ir.gen_brcondi(Type::I32, f, 0, Cond::Eq, done);
        ir.gen_mov(Type::I64, res, self.fpr(rb(op)));
        ir.gen_set_label(done);
        ir.gen_mov(Type::I64, self.fpr(rd(op)), res);
        true
    }

    /// fneg, fmr, fnabs, fabs
    fn gen_fsign(&self, ir: &mut Context, d: &Descriptor) -> bool {
        let op = d.opcode;
        let (dst, src) = (self.fpr(rd(op)), self.fpr(rb(op)));
        let sign = ir.const_i64(SIGN);
        match xo10(op) {
            40 => {
                ir.gen_xor(Type::I64, dst, src, sign);
            }
            72 => {
                ir.gen_mov(Type::I64, dst, src);
            }
            136 => {
                ir.gen_or(Type::I64, dst, src, sign);
            }
            _ => {
                ir.gen_andc(Type::I64, dst, src, sign);
            }
        }
        true
    }

    /// fctiw uses the FPSCR rounding mode, fctiwz truncates.
    fn gen_fctiw(&self, ir: &mut Context, d: &Descriptor) -> bool {
        let op = d.opcode;
        let rmode = if xo10(op) == 15 {
            self.imm(ir, 1)
        } else {
            let t = ir.new_temp(Type::I32);
            let m = self.imm(ir, 3);
            ir.gen_and(Type::I32, t, self.regs.fpscr, m);
            t
        };
        ir.gen_fcti(self.fpr(rd(op)), self.fpr(rb(op)), rmode);
        true
    }

    // -- Compare -----------------------------------------------------

    /// fcmpu / fcmpo: CR field and FPSCR[FPCC].
    fn gen_fcmp_cr(&self, ir: &mut Context, d: &Descriptor) -> bool {
        let op = d.opcode;
        let field = crfd(op);
        ir.gen_fcmp(self.fpr(ra(op)), self.fpr(rb(op)), Flags::C | Flags::Z | Flags::U);
        let f = ir.new_temp(Type::I32);
        ir.gen_getflags(f, Flags::ALL);
        self.gen_cr_from_flags(ir, f, field, cpu::FCMP_CR_OFFSET, false);

        let r = self.regs;
        let fpcc = ir.new_temp(Type::I32);
        let c12 = self.imm(ir, 12);
        ir.gen_shl(Type::I32, fpcc, r.cr[field], c12);
        let m = self.imm(ir, 0xf000);
        ir.gen_andc(Type::I32, r.fpscr, r.fpscr, m);
        ir.gen_or(Type::I32, r.fpscr, r.fpscr, fpcc);
        true
    }

    // -- FPSCR -------------------------------------------------------

    /// mtfsb0 / mtfsb1
    fn gen_mtfsb(&self, ir: &mut Context, d: &Descriptor) -> bool {
        let op = d.opcode;
        let bit = self.imm(ir, 0x8000_0000 >> crbd(op));
        let fpscr = self.regs.fpscr;
        if xo10(op) == 38 {
            ir.gen_or(Type::I32, fpscr, fpscr, bit);
        } else {
            ir.gen_andc(Type::I32, fpscr, fpscr, bit);
        }
        true
    }

    fn gen_mcrfs(&self, ir: &mut Context, d: &Descriptor) -> bool {
        let op = d.opcode;
        let t = ir.new_temp(Type::I32);
        let amt = self.imm(ir, 28 - 4 * crfs(op) as u32);
        ir.gen_shr(Type::I32, t, self.regs.fpscr, amt);
        let m = self.imm(ir, 0xf);
        ir.gen_and(Type::I32, self.regs.cr[crfd(op)], t, m);
        true
    }

    fn gen_mtfsfi(&self, ir: &mut Context, d: &Descriptor) -> bool {
        let op = d.opcode;
        let shift = 28 - 4 * crfd(op) as u32;
        let fpscr = self.regs.fpscr;
        let m = self.imm(ir, 0xf << shift);
        ir.gen_andc(Type::I32, fpscr, fpscr, m);
        let v = self.imm(ir, fpimm(op) << shift);
        ir.gen_or(Type::I32, fpscr, fpscr, v);
        true
    }

    fn gen_mffs(&self, ir: &mut Context, d: &Descriptor) -> bool {
        let dst = self.fpr(rd(d.opcode));
        ir.gen_extu_i32_i64(dst, self.regs.fpscr);
        let high = ir.const_i64(MFFS_HIGH);
        ir.gen_or(Type::I64, dst, dst, high);
        true
    }

    fn gen_mtfsf(&self, ir: &mut Context, d: &Descriptor) -> bool {
        let op = d.opcode;
        let fields = fm(op);
        let mask = (0..8)
            .filter(|i| fields & (0x80 >> i) != 0)
            .fold(0u32, |m, i| m | (0xf << (28 - 4 * i)));
        let v = ir.new_temp(Type::I32);
        ir.gen_extrl_i64_i32(v, self.fpr(rb(op)));
        let m = self.imm(ir, mask);
        ir.gen_and(Type::I32, v, v, m);
        let fpscr = self.regs.fpscr;
        ir.gen_andc(Type::I32, fpscr, fpscr, m);
        ir.gen_or(Type::I32, fpscr, fpscr, v);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mffs_high_word_is_a_quiet_nan_pattern() {
        assert!(f64::from_bits(MFFS_HIGH).is_nan());
        assert_eq!(MFFS_HIGH & SIGN, SIGN);
    }
}
