//! Branches and system call.

use drc_core::{Cond, Context, TempIdx, Type};

use super::Translator;
use crate::analyzer::Descriptor;
use crate::cpu::Exception;
use crate::insn::*;

impl Translator<'_> {
    pub(super) fn trans_b(&mut self, ir: &mut Context, d: &Descriptor) -> bool {
        let op = d.opcode;
        let disp = li(op) as u32;
        let target = if aa(op) { disp } else { d.pc.wrapping_add(disp) };
        if lk(op) {
            ir.gen_movi(Type::I32, self.regs.lr, d.pc.wrapping_add(4) as u64);
        }
        self.gen_goto(ir, target);
        true
    }

    /// Emit the BO tests; control reaches the following code only
    /// when the branch is taken.
    fn gen_branch_condition(&self, ir: &mut Context, op: u32, skip: u32) {
        let bo = bo(op);
        let r = self.regs;
        if bo & 0x04 == 0 {
            let one = self.imm(ir, 1);
            ir.gen_sub(Type::I32, r.ctr, r.ctr, one);
            let cond = if bo & 0x02 != 0 { Cond::Ne } else { Cond::Eq };
            ir.gen_brcondi(Type::I32, r.ctr, 0, cond, skip);
        }
        if bo & 0x10 == 0 {
            let bi = bi(op);
            let bit = 1u64 << (3 - (bi & 3));
            let cond = if bo & 0x08 != 0 { Cond::TstEq } else { Cond::TstNe };
            ir.gen_brcondi(Type::I32, r.cr[(bi >> 2) as usize], bit, cond, skip);
        }
    }

    fn always_taken(op: u32) -> bool {
        let bo = bo(op);
        bo & 0x14 == 0x14
    }

    /// Run `taken` behind the BO tests with its own copy of the
    /// pending cycles; the fall-through path keeps the original count.
    fn gen_conditional(&mut self, ir: &mut Context, op: u32, taken: impl FnOnce(&mut Self, &mut Context)) {
        if Self::always_taken(op) {
            taken(self, ir);
            return;
        }
        let skip = ir.new_label();
        self.gen_branch_condition(ir, op, skip);
        let saved = self.cycles;
        taken(self, ir);
        self.cycles = saved;
        ir.gen_set_label(skip);
    }

    pub(super) fn trans_bc(&mut self, ir: &mut Context, d: &Descriptor) -> bool {
        let op = d.opcode;
        let disp = bd(op) as u32;
        let target = if aa(op) { disp } else { d.pc.wrapping_add(disp) };
        if lk(op) {
            ir.gen_movi(Type::I32, self.regs.lr, d.pc.wrapping_add(4) as u64);
        }
        self.gen_conditional(ir, op, |t, ir| t.gen_goto(ir, target));
        true
    }

    /// bclr / bcctr. The target is captured before LR is rewritten.
    fn gen_branch_indirect(&mut self, ir: &mut Context, d: &Descriptor, src: TempIdx) {
        let op = d.opcode;
        let target = ir.new_temp_unit(Type::I32);
        let align = self.imm(ir, !3);
        ir.gen_and(Type::I32, target, src, align);
        if lk(op) {
            ir.gen_movi(Type::I32, self.regs.lr, d.pc.wrapping_add(4) as u64);
        }
        let mode = self.imm(ir, self.mode);
        self.gen_conditional(ir, op, |t, ir| t.gen_goto_dynamic(ir, target, mode));
    }

    pub(super) fn trans_bclr(&mut self, ir: &mut Context, d: &Descriptor) -> bool {
        self.gen_branch_indirect(ir, d, self.regs.lr);
        true
    }

    pub(super) fn trans_bcctr(&mut self, ir: &mut Context, d: &Descriptor) -> bool {
        // decrementing CTR while branching to it is invalid
        if bo(d.opcode) & 0x04 == 0 {
            return self.gen_illegal(ir, d);
        }
        self.gen_branch_indirect(ir, d, self.regs.ctr);
        true
    }

    pub(super) fn trans_sc(&mut self, ir: &mut Context, d: &Descriptor) -> bool {
        self.gen_exception(ir, Exception::Syscall, d.pc.wrapping_add(4), None);
        true
    }
}
