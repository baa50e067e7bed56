//! Interpreter loop for lowered code.

use drc_core::{BlockKey, Flags, Handle, MapVar, Opcode, Type, MAX_CALL_ARGS};

use super::insn::{Insn, Operand, Snapshot};
use super::NUM_HOST_REGS;
use crate::code_cache::{CodeAddr, CodeCache};
use crate::dispatch::{DispatchMap, HandleTable};
use crate::{ExitStatus, Helper, Machine, REG_ENV};

pub(super) struct Interp<'a, M: Machine> {
    pub cache: &'a CodeCache,
    pub dispatch: &'a DispatchMap,
    pub handles: &'a HandleTable,
    pub helpers: &'a [(&'static str, Helper<M>)],
    pub max_slots: usize,
}

/// One activation: the base frame, or a handle call.
struct Frame {
    ret: CodeAddr,
    slots: Vec<u64>,
    /// Map variables at the call site that created this frame.
    snapshot: Snapshot,
}

struct Regs {
    host: [u64; NUM_HOST_REGS],
    flags: u8,
    exp: u32,
}

impl Regs {
    #[inline]
    unsafe fn get(&self, slots: &[u64], op: Operand) -> u64 {
        match op {
            Operand::Slot(n) => slots[n as usize],
            Operand::Host(r) => self.host[r as usize],
            Operand::Imm(v) => v,
            Operand::Env { offset, ty } => {
                let p = (self.host[REG_ENV as usize] as *const u8)
                    .offset(offset as isize);
                load(p, ty.size_bytes() as u8)
            }
        }
    }

    #[inline]
    unsafe fn set(&mut self, slots: &mut [u64], op: Operand, ty: Type, v: u64) {
        let v = v & ty.mask();
        match op {
            Operand::Slot(n) => slots[n as usize] = v,
            Operand::Host(r) => self.host[r as usize] = v,
            Operand::Env { offset, ty: field } => {
                let p = (self.host[REG_ENV as usize] as *mut u8)
                    .offset(offset as isize);
                store(p, field.size_bytes() as u8, v);
            }
            Operand::Imm(_) => {}
        }
    }
}

#[inline]
unsafe fn load(p: *const u8, size: u8) -> u64 {
    match size {
        1 => p.read() as u64,
        2 => (p as *const u16).read_unaligned() as u64,
        4 => (p as *const u32).read_unaligned() as u64,
        _ => (p as *const u64).read_unaligned(),
    }
}

#[inline]
unsafe fn store(p: *mut u8, size: u8, v: u64) {
    match size {
        1 => p.write(v as u8),
        2 => (p as *mut u16).write_unaligned(v as u16),
        4 => (p as *mut u32).write_unaligned(v as u32),
        _ => (p as *mut u64).write_unaligned(v),
    }
}

fn sext(ty: Type, v: u64) -> i64 {
    match ty {
        Type::I32 => v as u32 as i32 as i64,
        Type::I64 => v as i64,
    }
}

fn zs_flags(ty: Type, r: u64) -> u8 {
    let mut f = 0;
    if r & ty.mask() == 0 {
        f |= Flags::Z.bits();
    }
    if r & ty.sign_bit() != 0 {
        f |= Flags::S.bits();
    }
    f
}

/// Evaluate a two-input integer op. Returns the result and the
/// carry/overflow flags it produced.
fn alu(opc: Opcode, ty: Type, a: u64, b: u64, carry_in: bool) -> (u64, u8) {
    let m = ty.mask();
    let sign = ty.sign_bit();
    let bits = ty.size_bits();
    let (a, b) = (a & m, b & m);
    let c = Flags::C.bits();
    let v = Flags::V.bits();
    let flag = |cond: bool, f: u8| if cond { f } else { 0 };

    match opc {
        Opcode::Add => {
            let r = a.wrapping_add(b) & m;
            let ovf = (a ^ r) & (b ^ r) & sign != 0;
            (r, flag(r < a, c) | flag(ovf, v))
        }
        Opcode::AddC => {
            let wide = a as u128 + b as u128 + carry_in as u128;
            let r = (wide as u64) & m;
            let cout = (wide >> bits) & 1 != 0;
            let ovf = (a ^ r) & (b ^ r) & sign != 0;
            (r, flag(cout, c) | flag(ovf, v))
        }
        Opcode::Sub | Opcode::Cmp => {
            let r = a.wrapping_sub(b) & m;
            let ovf = (a ^ b) & (a ^ r) & sign != 0;
            (r, flag(a < b, c) | flag(ovf, v))
        }
        Opcode::Mul => {
            let r = a.wrapping_mul(b) & m;
            let wide = sext(ty, a) as i128 * sext(ty, b) as i128;
            (r, flag(wide != sext(ty, r) as i128, v))
        }
        Opcode::MulSH => {
            let wide = sext(ty, a) as i128 * sext(ty, b) as i128;
            (((wide >> bits) as u64) & m, 0)
        }
        Opcode::MulUH => {
            let wide = a as u128 * b as u128;
            (((wide >> bits) as u64) & m, 0)
        }
        Opcode::DivS => {
            let (sa, sb) = (sext(ty, a), sext(ty, b));
            let min = sext(ty, sign);
            if sb == 0 || (sa == min && sb == -1) {
                (if sa < 0 { m } else { 0 }, v)
            } else {
                ((sa / sb) as u64 & m, 0)
            }
        }
        Opcode::DivU => {
            if b == 0 {
                (0, v)
            } else {
                (a / b, 0)
            }
        }
        Opcode::And | Opcode::Test => (a & b, 0),
        Opcode::Or => (a | b, 0),
        Opcode::Xor => (a ^ b, 0),
        Opcode::AndC => (a & !b & m, 0),
        Opcode::OrC => ((a | !b) & m, 0),
        Opcode::Eqv => (!(a ^ b) & m, 0),
        Opcode::Nand => (!(a & b) & m, 0),
        Opcode::Nor => (!(a | b) & m, 0),
        Opcode::Shl => ((a << (b & (bits as u64 - 1))) & m, 0),
        Opcode::Shr => (a >> (b & (bits as u64 - 1)), 0),
        Opcode::Sar => {
            let s = b & (bits as u64 - 1);
            ((sext(ty, a) >> s) as u64 & m, 0)
        }
        Opcode::RotL => {
            let r = match ty {
                Type::I32 => (a as u32).rotate_left(b as u32 & 31) as u64,
                Type::I64 => a.rotate_left(b as u32 & 63),
            };
            (r, 0)
        }
        _ => (0, 0),
    }
}

fn unary(opc: Opcode, ty: Type, a: u64) -> u64 {
    let m = ty.mask();
    match opc {
        Opcode::Not => !a & m,
        Opcode::Clz => match ty {
            Type::I32 => (a as u32).leading_zeros() as u64,
            Type::I64 => a.leading_zeros() as u64,
        },
        Opcode::Bswap16 => (a as u16).swap_bytes() as u64,
        Opcode::Bswap32 => (a as u32).swap_bytes() as u64,
        Opcode::Bswap64 => a.swap_bytes(),
        Opcode::ExtUI32I64 | Opcode::ExtrlI64I32 => a & 0xffff_ffff,
        Opcode::ExtrhI64I32 => a >> 32,
        _ => a,
    }
}

/// Result bits of a float -> int32 conversion; the upper word is
/// the fixed pattern PowerPC-style FPUs leave behind.
fn fcti(v: f64, rmode: u64) -> u64 {
    let r = match rmode & 3 {
        0 => v.round_ties_even(),
        1 => v.trunc(),
        2 => v.ceil(),
        _ => v.floor(),
    };
    let i = if v.is_nan() || r <= i32::MIN as f64 {
        i32::MIN
    } else if r >= i32::MAX as f64 {
        i32::MAX
    } else {
        r as i32
    };
    0xfff8_0000_0000_0000 | (i as u32 as u64)
}

/// Single to double by bit pattern, so NaN payloads (signaling ones
/// included) survive the widening.
fn single_to_double(s: u32) -> u64 {
    let v = f32::from_bits(s);
    if !v.is_nan() {
        return (v as f64).to_bits();
    }
    let sign = ((s >> 31) as u64) << 63;
    let frac = ((s & 0x007f_ffff) as u64) << 29;
    sign | 0x7ff0_0000_0000_0000 | frac
}

/// Double to single by bit pattern; NaNs keep the top of their
/// payload instead of being quieted.
fn double_to_single(d: u64) -> u32 {
    let v = f64::from_bits(d);
    if !v.is_nan() {
        return (v as f32).to_bits();
    }
    let sign = ((d >> 63) as u32) << 31;
    let frac = ((d >> 29) & 0x007f_ffff) as u32;
    sign | 0x7f80_0000 | frac
}

fn float(opc: Opcode, a: u64, b: u64, c: u64) -> u64 {
    let (fa, fb, fc) = (f64::from_bits(a), f64::from_bits(b), f64::from_bits(c));
    match opc {
        Opcode::FAdd => (fa + fb).to_bits(),
        Opcode::FSub => (fa - fb).to_bits(),
        Opcode::FMul => (fa * fb).to_bits(),
        Opcode::FDiv => (fa / fb).to_bits(),
        Opcode::FMadd => fa.mul_add(fb, fc).to_bits(),
        Opcode::FSqrt => fa.sqrt().to_bits(),
        Opcode::FRecip => (1.0 / fa).to_bits(),
        Opcode::FRsqrt => (1.0 / fa.sqrt()).to_bits(),
        Opcode::FRsp => (fa as f32 as f64).to_bits(),
        Opcode::FS2D => single_to_double(a as u32),
        Opcode::FD2S => double_to_single(a) as u64,
        Opcode::FCti => fcti(fa, b),
        _ => a,
    }
}

fn fcmp_flags(a: u64, b: u64) -> u8 {
    let (fa, fb) = (f64::from_bits(a), f64::from_bits(b));
    if fa.is_nan() || fb.is_nan() {
        Flags::U.bits()
    } else if fa < fb {
        Flags::C.bits()
    } else if fa == fb {
        Flags::Z.bits()
    } else {
        0
    }
}

impl<'a, M: Machine> Interp<'a, M> {
    fn resolve(&self, handle: Handle) -> CodeAddr {
        match self.handles.resolve(handle) {
            Some(addr) => addr,
            None => panic!(
                "generated code referenced undefined handle '{}'",
                self.handles.name(handle)
            ),
        }
    }

    fn frame(&self, pool: &mut Vec<Vec<u64>>, ret: CodeAddr, snapshot: Snapshot) -> Frame {
        let mut slots = pool.pop().unwrap_or_default();
        slots.clear();
        slots.resize(self.max_slots, 0);
        Frame {
            ret,
            slots,
            snapshot,
        }
    }

    /// Run from `entry` until an `Exit` op.
    pub(super) unsafe fn run(&mut self, entry: Handle, machine: &mut M) -> ExitStatus {
        let mut regs = Regs {
            host: [0; NUM_HOST_REGS],
            flags: 0,
            exp: 0,
        };
        regs.host[REG_ENV as usize] = machine.env_ptr() as u64;

        let mut pool: Vec<Vec<u64>> = Vec::new();
        let mut frames = vec![self.frame(&mut pool, CodeAddr(0), [None; 2])];
        let mut pc = self.resolve(entry);

        loop {
            let insn = self.cache.get(pc);
            pc = CodeAddr(pc.0 + 1);
            let top = frames.len() - 1;
            let slots = &mut frames[top].slots;

            match insn {
                Insn::Mov { ty, d, s } => {
                    let v = regs.get(slots, s);
                    regs.set(slots, d, ty, v);
                }
                Insn::Binary {
                    opc,
                    ty,
                    flags,
                    d,
                    a,
                    b,
                } => {
                    let (va, vb) = (regs.get(slots, a), regs.get(slots, b));
                    let cin = regs.flags & Flags::C.bits() != 0;
                    let (r, cv) = alu(opc, ty, va, vb, cin);
                    if !flags.is_empty() {
                        regs.flags = (cv | zs_flags(ty, r)) & flags.bits();
                    }
                    regs.set(slots, d, ty, r);
                }
                Insn::Unary {
                    opc,
                    ty,
                    flags,
                    d,
                    s,
                } => {
                    let r = unary(opc, ty, regs.get(slots, s));
                    if !flags.is_empty() {
                        regs.flags = zs_flags(ty, r) & flags.bits();
                    }
                    regs.set(slots, d, ty, r);
                }
                Insn::Sext { ty, d, s, bits } => {
                    let sh = 64 - bits.clamp(1, 64);
                    let v = ((regs.get(slots, s) << sh) as i64 >> sh) as u64;
                    regs.set(slots, d, ty, v);
                }
                Insn::SetCond { ty, cond, d, a, b } => {
                    let (va, vb) = (regs.get(slots, a), regs.get(slots, b));
                    regs.set(slots, d, ty, cond.eval(ty, va, vb) as u64);
                }
                Insn::Compare {
                    opc,
                    ty,
                    flags,
                    a,
                    b,
                } => {
                    let (va, vb) = (regs.get(slots, a), regs.get(slots, b));
                    let (r, cv) = alu(opc, ty, va, vb, false);
                    regs.flags = (cv | zs_flags(ty, r)) & flags.bits();
                }
                Insn::GetFlags { d, mask } => {
                    let v = (regs.flags & mask.bits()) as u64;
                    regs.set(slots, d, Type::I32, v);
                }
                Insn::SetCarry { s, bit } => {
                    let v = (regs.get(slots, s) >> bit) & 1;
                    regs.flags = (regs.flags & !Flags::C.bits()) | v as u8;
                }
                Insn::Float { opc, d, a, b, c } => {
                    let r = float(
                        opc,
                        regs.get(slots, a),
                        regs.get(slots, b),
                        regs.get(slots, c),
                    );
                    regs.set(slots, d, Type::I64, r);
                }
                Insn::FCmp { flags, a, b } => {
                    let f = fcmp_flags(regs.get(slots, a), regs.get(slots, b));
                    regs.flags = f & flags.bits();
                }
                Insn::Load {
                    size,
                    ty,
                    d,
                    base,
                    offset,
                } => {
                    let p = (regs.get(slots, base) as *const u8)
                        .offset(offset as isize);
                    let v = load(p, size);
                    regs.set(slots, d, ty, v);
                }
                Insn::Store {
                    size,
                    s,
                    base,
                    offset,
                } => {
                    let p = (regs.get(slots, base) as *mut u8)
                        .offset(offset as isize);
                    store(p, size, regs.get(slots, s));
                }
                Insn::Read {
                    ty,
                    size,
                    d,
                    addr,
                    mask,
                } => {
                    let a = regs.get(slots, addr) as u32;
                    let v = match mask {
                        Some(m) => {
                            let m = regs.get(slots, m);
                            machine.read_masked(a, size as u32, m)
                        }
                        None => machine.read(a, size as u32),
                    };
                    regs.set(slots, d, ty, v);
                }
                Insn::Write {
                    size,
                    addr,
                    v,
                    mask,
                } => {
                    let a = regs.get(slots, addr) as u32;
                    let val = regs.get(slots, v);
                    match mask {
                        Some(m) => {
                            let m = regs.get(slots, m);
                            machine.write_masked(a, size as u32, val, m);
                        }
                        None => machine.write(a, size as u32, val),
                    }
                }
                Insn::Translate { d, addr, intention } => {
                    let a = regs.get(slots, addr) as u32;
                    let v = match machine.translate(intention, a) {
                        Ok(p) => p as u64,
                        Err(fault) => fault.code(),
                    };
                    regs.set(slots, d, Type::I64, v);
                }
                Insn::Call {
                    ty,
                    d,
                    helper,
                    args,
                    nargs,
                } => {
                    let mut vals = [0u64; MAX_CALL_ARGS];
                    for (v, &a) in vals.iter_mut().zip(args.iter()) {
                        *v = regs.get(slots, a);
                    }
                    let f = self.helpers[helper.0 as usize].1;
                    let r = f(machine, &vals[..nargs as usize]);
                    let top = frames.len() - 1;
                    regs.set(&mut frames[top].slots, d, ty, r);
                }
                Insn::Jmp { target } => pc = target,
                Insn::BrCond {
                    ty,
                    cond,
                    a,
                    b,
                    target,
                } => {
                    let (va, vb) = (regs.get(slots, a), regs.get(slots, b));
                    if cond.eval(ty, va, vb) {
                        pc = target;
                    }
                }
                Insn::HashJmp { mode, pc: target, nocode } => {
                    let mode = regs.get(slots, mode) as u32;
                    let target = regs.get(slots, target) as u32;
                    while frames.len() > 1 {
                        if let Some(f) = frames.pop() {
                            pool.push(f.slots);
                        }
                    }
                    let key = BlockKey::new(mode, target);
                    match self.dispatch.lookup(key) {
                        Some(addr) => pc = addr,
                        None => {
                            regs.exp = target;
                            let f = self.frame(&mut pool, pc, [None; 2]);
                            frames.push(f);
                            pc = self.resolve(nocode);
                        }
                    }
                }
                Insn::CallH { handle, snapshot } => {
                    let f = self.frame(&mut pool, pc, snapshot);
                    frames.push(f);
                    pc = self.resolve(handle);
                }
                Insn::Exh {
                    handle,
                    param,
                    snapshot,
                } => {
                    regs.exp = regs.get(slots, param) as u32;
                    let f = self.frame(&mut pool, pc, snapshot);
                    frames.push(f);
                    pc = self.resolve(handle);
                }
                Insn::Ret => {
                    assert!(frames.len() > 1, "return from the base frame");
                    if let Some(f) = frames.pop() {
                        pc = f.ret;
                        pool.push(f.slots);
                    }
                }
                Insn::GetExp { d } => {
                    let v = regs.exp as u64;
                    regs.set(slots, d, Type::I32, v);
                }
                Insn::Recover { d, var } => {
                    let v = recover(&frames, var);
                    let top = frames.len() - 1;
                    regs.set(&mut frames[top].slots, d, Type::I32, v as u64);
                }
                Insn::Exit { code } => {
                    let code = regs.get(slots, code) as u32;
                    return ExitStatus { code };
                }
            }
        }
    }
}

/// Newest recorded value of `var` along the call chain.
fn recover(frames: &[Frame], var: MapVar) -> u32 {
    frames
        .iter()
        .rev()
        .find_map(|f| f.snapshot[var as usize])
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use drc_core::Cond;

    #[test]
    fn single_precision_moves_keep_nan_payloads() {
        // signaling NaN with a low payload bit
        let snan = 0x7f80_0001u32;
        let d = float(Opcode::FS2D, snan as u64, 0, 0);
        assert_eq!(d, 0x7ff0_0000_2000_0000);
        assert_eq!(float(Opcode::FD2S, d, 0, 0), snan as u64);

        assert_eq!(float(Opcode::FS2D, 0x3fc0_0000, 0, 0), 1.5f64.to_bits());
        assert_eq!(float(Opcode::FD2S, (-2.0f64).to_bits(), 0, 0), 0xc000_0000);
    }

    #[test]
    fn add_sets_carry_and_overflow() {
        let (r, cv) = alu(Opcode::Add, Type::I32, 0xffff_ffff, 1, false);
        assert_eq!(r, 0);
        assert_eq!(cv, Flags::C.bits());
        let (r, cv) = alu(Opcode::Add, Type::I32, 0x7fff_ffff, 1, false);
        assert_eq!(r, 0x8000_0000);
        assert_eq!(cv, Flags::V.bits());
    }

    #[test]
    fn sub_borrow() {
        let (r, cv) = alu(Opcode::Sub, Type::I32, 1, 2, false);
        assert_eq!(r, 0xffff_ffff);
        assert_eq!(cv & Flags::C.bits(), Flags::C.bits());
        assert_eq!(zs_flags(Type::I32, r), Flags::S.bits());
    }

    #[test]
    fn addc_uses_carry_in() {
        let (r, cv) = alu(Opcode::AddC, Type::I32, 0xffff_ffff, 0, true);
        assert_eq!(r, 0);
        assert_eq!(cv, Flags::C.bits());
    }

    #[test]
    fn signed_division_overflow() {
        let (r, cv) = alu(Opcode::DivS, Type::I32, 0x8000_0000, 0xffff_ffff, false);
        assert_eq!(r, 0xffff_ffff);
        assert_eq!(cv, Flags::V.bits());
        let (r, _) = alu(Opcode::DivS, Type::I32, (-7i32) as u32 as u64, 2, false);
        assert_eq!(r, (-3i32) as u32 as u64);
    }

    #[test]
    fn fcti_saturates_and_rounds() {
        assert_eq!(fcti(2.5, 0) as u32, 2);
        assert_eq!(fcti(2.5, 2) as u32, 3);
        assert_eq!(fcti(-2.5, 1) as u32 as i32, -2);
        assert_eq!(fcti(1e12, 1) as u32, i32::MAX as u32);
        assert_eq!(fcti(f64::NAN, 1) as u32, i32::MIN as u32);
    }

    #[test]
    fn fcmp_unordered() {
        let nan = f64::NAN.to_bits();
        assert_eq!(fcmp_flags(nan, 1.0f64.to_bits()), Flags::U.bits());
        assert_eq!(
            fcmp_flags(1.0f64.to_bits(), 2.0f64.to_bits()),
            Flags::C.bits()
        );
    }

    #[test]
    fn cond_eval_is_width_aware() {
        assert!(Cond::Lt.eval(Type::I32, 0xffff_ffff, 0));
        assert!(!Cond::Ltu.eval(Type::I32, 0xffff_ffff, 0));
    }
}
