//! Loads and stores through the per-mode accessor handles.

use drc_core::{Cond, Context, TempIdx, Type};

use super::Translator;
use crate::analyzer::Descriptor;
use crate::cpu::{self, cr, xer};
use crate::insn::*;

/// Integer access shape.
#[derive(Clone, Copy)]
struct Access {
    size: u32,
    store: bool,
    signed: bool,
    update: bool,
}

impl Access {
    const fn load(size: u32) -> Self {
        Self {
            size,
            store: false,
            signed: false,
            update: false,
        }
    }

    const fn store(size: u32) -> Self {
        Self {
            store: true,
            ..Self::load(size)
        }
    }

    const fn signed(self) -> Self {
        Self {
            signed: true,
            ..self
        }
    }

    const fn update(self) -> Self {
        Self {
            update: true,
            ..self
        }
    }
}

impl Translator<'_> {
    fn gen_access(&self, ir: &mut Context, op: u32, ea: TempIdx, acc: Access) {
        if acc.store {
            self.gen_write(ir, acc.size, ea, self.gpr(rs(op)), None);
        } else {
            let v = self.gen_read(ir, acc.size, ea, None);
            if acc.signed {
                ir.gen_sext(Type::I32, v, v, 16);
            }
            ir.gen_mov(Type::I32, self.gpr(rd(op)), v);
        }
        if acc.update {
            ir.gen_mov(Type::I32, self.gpr(ra(op)), ea);
        }
    }

    /// D-form integer loads and stores, opcodes 32-45.
    pub(super) fn trans_load_store_d(&mut self, ir: &mut Context, d: &Descriptor) -> bool {
        let op = d.opcode;
        let acc = match opcd(op) {
            32 => Access::load(4),
            33 => Access::load(4).update(),
            34 => Access::load(1),
            35 => Access::load(1).update(),
            36 => Access::store(4),
            37 => Access::store(4).update(),
            38 => Access::store(1),
            39 => Access::store(1).update(),
            40 => Access::load(2),
            41 => Access::load(2).update(),
            42 => Access::load(2).signed(),
            43 => Access::load(2).signed().update(),
            44 => Access::store(2),
            _ => Access::store(2).update(),
        };
        let ea = self.gen_ea_d(ir, op);
        self.gen_access(ir, op, ea, acc);
        true
    }

    /// X-form integer loads and stores.
    pub(super) fn trans_load_store_x(&mut self, ir: &mut Context, d: &Descriptor) -> bool {
        let op = d.opcode;
        let acc = match xo10(op) {
            23 | 310 => Access::load(4),
            55 => Access::load(4).update(),
            87 => Access::load(1),
            119 => Access::load(1).update(),
            279 => Access::load(2),
            311 => Access::load(2).update(),
            343 => Access::load(2).signed(),
            375 => Access::load(2).signed().update(),
            151 | 438 => Access::store(4),
            183 => Access::store(4).update(),
            215 => Access::store(1),
            247 => Access::store(1).update(),
            407 => Access::store(2),
            _ => Access::store(2).update(),
        };
        let ea = self.gen_ea_x(ir, op);
        self.gen_access(ir, op, ea, acc);
        true
    }

    /// lwbrx, lhbrx, stwbrx, sthbrx
    pub(super) fn trans_byte_reversed(&mut self, ir: &mut Context, d: &Descriptor) -> bool {
        let op = d.opcode;
        let ea = self.gen_ea_x(ir, op);
        let (size, store) = match xo10(op) {
            534 => (4, false),
            790 => (2, false),
            662 => (4, true),
            _ => (2, true),
        };
        let swap = |ir: &mut Context, dst: TempIdx, src: TempIdx| {
            if size == 4 {
                ir.gen_bswap32(Type::I32, dst, src);
            } else {
                ir.gen_bswap16(Type::I32, dst, src);
            }
        };
        if store {
            let v = ir.new_temp(Type::I32);
            swap(ir, v, self.gpr(rs(op)));
            self.gen_write(ir, size, ea, v, None);
        } else {
            let v = self.gen_read(ir, size, ea, None);
            swap(ir, self.gpr(rd(op)), v);
        }
        true
    }

    /// lmw / stmw
    pub(super) fn trans_multiple(&mut self, ir: &mut Context, d: &Descriptor) -> bool {
        let op = d.opcode;
        let ea = self.gen_ea_d(ir, op);
        let store = opcd(op) == 47;
        let four = self.imm(ir, 4);
        for n in rd(op)..cpu::NUM_GPRS {
            if store {
                self.gen_write(ir, 4, ea, self.gpr(n), None);
            } else {
                let v = self.gen_read(ir, 4, ea, None);
                ir.gen_mov(Type::I32, self.gpr(n), v);
            }
            ir.gen_add(Type::I32, ea, ea, four);
        }
        true
    }

    /// lswi / stswi: byte count known at translation time. The tail
    /// word goes through the masked accessor.
    pub(super) fn trans_string_imm(&mut self, ir: &mut Context, d: &Descriptor) -> bool {
        let op = d.opcode;
        let store = xo10(op) == 725;
        let mut remaining = nb(op);
        let base = self.ra_or_zero(ir, ra(op));
        let ea = ir.new_temp(Type::I32);
        ir.gen_mov(Type::I32, ea, base);
        let four = self.imm(ir, 4);
        let mut reg = rd(op);
        while remaining > 0 {
            let mask = if remaining >= 4 {
                None
            } else {
                Some(self.imm(ir, !0u32 << (32 - 8 * remaining)))
            };
            if store {
                self.gen_write(ir, 4, ea, self.gpr(reg), mask);
            } else {
                let v = self.gen_read(ir, 4, ea, mask);
                if let Some(m) = mask {
                    ir.gen_and(Type::I32, v, v, m);
                }
                ir.gen_mov(Type::I32, self.gpr(reg), v);
            }
            ir.gen_add(Type::I32, ea, ea, four);
            reg = (reg + 1) % cpu::NUM_GPRS;
            remaining = remaining.saturating_sub(4);
        }
        true
    }

    /// lswx / stswx: the count lives in XER, so registers are walked
    /// through the state block at run time. Host-resident registers
    /// are reloaded after every word so a fault sees them current.
    pub(super) fn trans_string_reg(&mut self, ir: &mut Context, d: &Descriptor) -> bool {
        let op = d.opcode;
        let store = xo10(op) == 661;
        let r = self.regs;

        let count = ir.new_temp_unit(Type::I32);
        let cm = self.imm(ir, xer::COUNT_MASK);
        ir.gen_and(Type::I32, count, r.xer, cm);
        let ea = ir.new_temp_unit(Type::I32);
        let base = self.ra_or_zero(ir, ra(op));
        ir.gen_add(Type::I32, ea, base, r.r[rb(op)]);
        let reg = ir.new_temp_unit(Type::I32);
        ir.gen_movi(Type::I32, reg, rd(op) as u64);
        r.gen_spill(ir);

        let top = ir.new_label();
        let done = ir.new_label();
        let full = ir.new_label();
        let have = ir.new_label();
        let mask = ir.new_temp_unit(Type::I32);
        ir.gen_set_label(top);
        ir.gen_brcondi(Type::I32, count, 0, Cond::Le, done);

        ir.gen_movi(Type::I32, mask, 0xffff_ffff);
        ir.gen_brcondi(Type::I32, count, 4, Cond::Ge, full);
        let sh = ir.new_temp(Type::I32);
        let c3 = self.imm(ir, 3);
        ir.gen_shl(Type::I32, sh, count, c3);
        let c32 = self.imm(ir, 32);
        ir.gen_sub(Type::I32, sh, c32, sh);
        ir.gen_shl(Type::I32, mask, mask, sh);
        ir.gen_br(have);
        ir.gen_set_label(full);
        ir.gen_set_label(have);

        // &state.r[reg]
        let slot = ir.new_temp_unit(Type::I64);
        ir.gen_extu_i32_i64(slot, reg);
        let two = ir.const_i64(2);
        ir.gen_shl(Type::I64, slot, slot, two);
        ir.gen_add(Type::I64, slot, slot, r.env);

        ir.gen_mov(Type::I32, r.i[0], ea);
        ir.gen_mov(Type::I32, r.i[2], mask);
        if store {
            ir.gen_ld32u(Type::I32, r.i[1], slot, cpu::r_offset(0));
            ir.gen_callh(self.handles.write(4, true, self.mode));
        } else {
            ir.gen_callh(self.handles.read(4, true, self.mode));
            let v = ir.new_temp(Type::I32);
            ir.gen_and(Type::I32, v, r.i[0], mask);
            ir.gen_st32(Type::I32, v, slot, cpu::r_offset(0));
            r.gen_restore(ir);
        }

        let four = self.imm(ir, 4);
        ir.gen_add(Type::I32, ea, ea, four);
        ir.gen_sub(Type::I32, count, count, four);
        let one = self.imm(ir, 1);
        ir.gen_add(Type::I32, reg, reg, one);
        let m31 = self.imm(ir, 31);
        ir.gen_and(Type::I32, reg, reg, m31);
        ir.gen_br(top);

        ir.gen_set_label(done);
        true
    }

    pub(super) fn trans_lwarx(&mut self, ir: &mut Context, d: &Descriptor) -> bool {
        let op = d.opcode;
        let ea = self.gen_ea_x(ir, op);
        let v = self.gen_read(ir, 4, ea, None);
        let r = self.regs;
        ir.gen_mov(Type::I32, r.r[rd(op)], v);
        ir.gen_movi(Type::I32, r.reserve, 1);
        ir.gen_mov(Type::I32, r.reserve_addr, ea);
        true
    }

    /// stwcx.: store only while the reservation holds; CR0[EQ]
    /// reports success.
    pub(super) fn trans_stwcx(&mut self, ir: &mut Context, d: &Descriptor) -> bool {
        let op = d.opcode;
        let r = self.regs;
        let ea = ir.new_temp_unit(Type::I32);
        let base = self.ra_or_zero(ir, ra(op));
        ir.gen_add(Type::I32, ea, base, r.r[rb(op)]);

        let res = ir.new_temp_unit(Type::I32);
        let c31 = self.imm(ir, 31);
        ir.gen_shr(Type::I32, res, r.xer, c31);
        let fail = ir.new_label();
        ir.gen_brcondi(Type::I32, r.reserve, 0, Cond::Eq, fail);
        self.gen_write(ir, 4, ea, r.r[rs(op)], None);
        ir.gen_movi(Type::I32, r.reserve, 0);
        let eq = self.imm(ir, cr::EQ);
        ir.gen_or(Type::I32, res, res, eq);
        ir.gen_set_label(fail);
        ir.gen_mov(Type::I32, r.cr[0], res);
        true
    }

    /// dcbz: eight zero words over the aligned 32-byte block.
    pub(super) fn trans_dcbz(&mut self, ir: &mut Context, d: &Descriptor) -> bool {
        let ea = self.gen_ea_x(ir, d.opcode);
        let align = self.imm(ir, !31);
        ir.gen_and(Type::I32, ea, ea, align);
        let zero = self.imm(ir, 0);
        let four = self.imm(ir, 4);
        for _ in 0..8 {
            self.gen_write(ir, 4, ea, zero, None);
            ir.gen_add(Type::I32, ea, ea, four);
        }
        true
    }

    // -- Floating-point memory -------------------------------------

    fn gen_fp_access(&mut self, ir: &mut Context, d: &Descriptor, ea: TempIdx, kind: FpAccess, update: bool) {
        let op = d.opcode;
        let r = self.regs;
        match kind {
            FpAccess::LoadSingle => {
                let v = self.gen_read(ir, 4, ea, None);
                let w = ir.new_temp(Type::I64);
                ir.gen_extu_i32_i64(w, v);
                ir.gen_funop(drc_core::Opcode::FS2D, r.f[rd(op)], w);
            }
            FpAccess::LoadDouble => {
                let v = self.gen_read(ir, 8, ea, None);
                ir.gen_mov(Type::I64, r.f[rd(op)], v);
            }
            FpAccess::StoreSingle => {
                let w = ir.new_temp(Type::I64);
                ir.gen_funop(drc_core::Opcode::FD2S, w, r.f[rs(op)]);
                let v = ir.new_temp(Type::I32);
                ir.gen_extrl_i64_i32(v, w);
                self.gen_write(ir, 4, ea, v, None);
            }
            FpAccess::StoreDouble => {
                self.gen_write(ir, 8, ea, r.f[rs(op)], None);
            }
            FpAccess::StoreWord => {
                let v = ir.new_temp(Type::I32);
                ir.gen_extrl_i64_i32(v, r.f[rs(op)]);
                self.gen_write(ir, 4, ea, v, None);
            }
        }
        if update {
            ir.gen_mov(Type::I32, r.r[ra(op)], ea);
        }
    }

    /// lfs, lfsu, lfd, lfdu, stfs, stfsu, stfd, stfdu
    pub(super) fn trans_fp_load_store(&mut self, ir: &mut Context, d: &Descriptor) -> bool {
        self.gen_fpu_check(ir, d);
        let op = d.opcode;
        let kind = match opcd(op) {
            48 | 49 => FpAccess::LoadSingle,
            50 | 51 => FpAccess::LoadDouble,
            52 | 53 => FpAccess::StoreSingle,
            _ => FpAccess::StoreDouble,
        };
        let ea = self.gen_ea_d(ir, op);
        self.gen_fp_access(ir, d, ea, kind, opcd(op) & 1 != 0);
        true
    }

    /// X-form floating-point loads and stores, including stfiwx.
    pub(super) fn trans_fp_load_store_x(&mut self, ir: &mut Context, d: &Descriptor) -> bool {
        self.gen_fpu_check(ir, d);
        let op = d.opcode;
        let (kind, update) = match xo10(op) {
            535 => (FpAccess::LoadSingle, false),
            567 => (FpAccess::LoadSingle, true),
            599 => (FpAccess::LoadDouble, false),
            631 => (FpAccess::LoadDouble, true),
            663 => (FpAccess::StoreSingle, false),
            695 => (FpAccess::StoreSingle, true),
            727 => (FpAccess::StoreDouble, false),
            759 => (FpAccess::StoreDouble, true),
            _ => (FpAccess::StoreWord, false),
        };
        let ea = self.gen_ea_x(ir, op);
        self.gen_fp_access(ir, d, ea, kind, update);
        true
    }
}

#[derive(Clone, Copy)]
enum FpAccess {
    LoadSingle,
    LoadDouble,
    StoreSingle,
    StoreDouble,
    StoreWord,
}
