//! Lowering of an IR unit into portable instructions.

use drc_core::{
    BlockKey, Cond, Context, Handle, HelperId, Label, MapVar, Op, Opcode,
    TempIdx, TempKind, MAX_CALL_ARGS,
};

use crate::code_cache::CodeAddr;
use crate::portable::insn::{Insn, Operand, Snapshot};
use crate::BackendError;

/// A unit lowered against a base address, not yet committed.
#[derive(Debug, Default)]
pub struct LoweredUnit {
    pub code: Vec<Insn>,
    /// Handles defined by this unit.
    pub handles: Vec<(Handle, CodeAddr)>,
    /// Hashed entry points defined by this unit, in emission order.
    pub hashes: Vec<(BlockKey, CodeAddr)>,
    /// Helpers referenced by `Call` ops.
    pub helpers: Vec<HelperId>,
    /// Scratch slots a frame needs to run this unit.
    pub nb_slots: usize,
}

fn operand(ctx: &Context, idx: TempIdx) -> Operand {
    let t = ctx.temp(idx);
    match t.kind {
        TempKind::Const => Operand::Imm(t.val),
        TempKind::Fixed => Operand::Host(t.reg.unwrap_or(0)),
        TempKind::Global => Operand::Env {
            offset: t.mem_offset as i32,
            ty: t.ty,
        },
        TempKind::Ebb | TempKind::Unit => {
            Operand::Slot(idx.0 - ctx.nb_globals())
        }
    }
}

fn out_operand(ctx: &Context, op: &Op, idx: TempIdx) -> Result<Operand, BackendError> {
    match operand(ctx, idx) {
        Operand::Imm(_) => Err(BackendError::ConstOutput(op.opc.def().name)),
        o => Ok(o),
    }
}

fn cond_of(raw: u32) -> Cond {
    Cond::from_raw(raw).unwrap_or(Cond::Never)
}

/// Lower every op of `ctx` into code that will live at `base`.
///
/// Map variables are resolved positionally: a call site sees the last
/// `MapVar` emitted before it in op order.
pub fn lower(ctx: &Context, base: CodeAddr) -> Result<LoweredUnit, BackendError> {
    let mut unit = LoweredUnit {
        nb_slots: (ctx.nb_temps() - ctx.nb_globals()) as usize,
        ..Default::default()
    };
    let mut labels: Vec<Label> = ctx.labels().to_vec();
    let mut snapshot: Snapshot = Default::default();
    let here = |code: &Vec<Insn>| CodeAddr(base.0 + code.len() as u32);

    for op in ctx.ops() {
        let o = |n: usize| out_operand(ctx, op, op.oargs()[n]);
        let i = |n: usize| operand(ctx, op.iargs()[n]);
        let ty = op.op_type;
        let insn = match op.opc {
            Opcode::InsnStart => continue,
            Opcode::SetLabel => {
                let at = here(&unit.code);
                labels[op.carg(0) as usize].place(at.index());
                continue;
            }
            Opcode::Handle => {
                unit.handles.push((Handle(op.carg(0)), here(&unit.code)));
                continue;
            }
            Opcode::Hash => {
                let key = BlockKey::new(op.carg(0), op.carg(1));
                unit.hashes.push((key, here(&unit.code)));
                continue;
            }
            Opcode::MapVar => {
                if let Some(var) = MapVar::from_raw(op.carg(0)) {
                    snapshot[var as usize] = Some(op.carg(1));
                }
                continue;
            }
            Opcode::Mov => Insn::Mov { ty, d: o(0)?, s: i(0) },
            Opcode::Add
            | Opcode::AddC
            | Opcode::Sub
            | Opcode::Mul
            | Opcode::MulSH
            | Opcode::MulUH
            | Opcode::DivS
            | Opcode::DivU
            | Opcode::And
            | Opcode::Or
            | Opcode::Xor
            | Opcode::AndC
            | Opcode::OrC
            | Opcode::Eqv
            | Opcode::Nand
            | Opcode::Nor
            | Opcode::Shl
            | Opcode::Shr
            | Opcode::Sar
            | Opcode::RotL => Insn::Binary {
                opc: op.opc,
                ty,
                flags: op.flags,
                d: o(0)?,
                a: i(0),
                b: i(1),
            },
            Opcode::Not
            | Opcode::Clz
            | Opcode::Bswap16
            | Opcode::Bswap32
            | Opcode::Bswap64
            | Opcode::ExtUI32I64
            | Opcode::ExtrlI64I32
            | Opcode::ExtrhI64I32 => Insn::Unary {
                opc: op.opc,
                ty,
                flags: op.flags,
                d: o(0)?,
                s: i(0),
            },
            Opcode::Sext => Insn::Sext {
                ty,
                d: o(0)?,
                s: i(0),
                bits: op.carg(0),
            },
            Opcode::SetCond => Insn::SetCond {
                ty,
                cond: cond_of(op.carg(0)),
                d: o(0)?,
                a: i(0),
                b: i(1),
            },
            Opcode::Cmp | Opcode::Test => Insn::Compare {
                opc: op.opc,
                ty,
                flags: op.flags,
                a: i(0),
                b: i(1),
            },
            Opcode::GetFlags => Insn::GetFlags {
                d: o(0)?,
                mask: drc_core::Flags::from_bits(op.carg(0) as u8),
            },
            Opcode::SetCarry => Insn::SetCarry {
                s: i(0),
                bit: op.carg(0),
            },
            Opcode::FAdd
            | Opcode::FSub
            | Opcode::FMul
            | Opcode::FDiv
            | Opcode::FCti => Insn::Float {
                opc: op.opc,
                d: o(0)?,
                a: i(0),
                b: i(1),
                c: Operand::Imm(0),
            },
            Opcode::FMadd => Insn::Float {
                opc: op.opc,
                d: o(0)?,
                a: i(0),
                b: i(1),
                c: i(2),
            },
            Opcode::FSqrt
            | Opcode::FRecip
            | Opcode::FRsqrt
            | Opcode::FRsp
            | Opcode::FS2D
            | Opcode::FD2S => Insn::Float {
                opc: op.opc,
                d: o(0)?,
                a: i(0),
                b: Operand::Imm(0),
                c: Operand::Imm(0),
            },
            Opcode::FCmp => Insn::FCmp {
                flags: op.flags,
                a: i(0),
                b: i(1),
            },
            Opcode::Ld8U | Opcode::Ld16U | Opcode::Ld32U | Opcode::Ld => {
                let size = match op.opc {
                    Opcode::Ld8U => 1,
                    Opcode::Ld16U => 2,
                    Opcode::Ld32U => 4,
                    _ => ty.size_bytes() as u8,
                };
                Insn::Load {
                    size,
                    ty,
                    d: o(0)?,
                    base: i(0),
                    offset: op.carg(0) as i32,
                }
            }
            Opcode::St8 | Opcode::St16 | Opcode::St32 | Opcode::St => {
                let size = match op.opc {
                    Opcode::St8 => 1,
                    Opcode::St16 => 2,
                    Opcode::St32 => 4,
                    _ => ty.size_bytes() as u8,
                };
                Insn::Store {
                    size,
                    s: i(0),
                    base: i(1),
                    offset: op.carg(0) as i32,
                }
            }
            Opcode::Read => Insn::Read {
                ty,
                size: op.carg(0) as u8,
                d: o(0)?,
                addr: i(0),
                mask: None,
            },
            Opcode::ReadM => Insn::Read {
                ty,
                size: op.carg(0) as u8,
                d: o(0)?,
                addr: i(0),
                mask: Some(i(1)),
            },
            Opcode::Write => Insn::Write {
                size: op.carg(0) as u8,
                addr: i(0),
                v: i(1),
                mask: None,
            },
            Opcode::WriteM => Insn::Write {
                size: op.carg(0) as u8,
                addr: i(0),
                v: i(1),
                mask: Some(i(2)),
            },
            Opcode::Translate => Insn::Translate {
                d: o(0)?,
                addr: i(0),
                intention: op.carg(0),
            },
            Opcode::Call => {
                let helper = HelperId(op.carg(0));
                unit.helpers.push(helper);
                let mut args = [Operand::Imm(0); MAX_CALL_ARGS];
                for (n, a) in args.iter_mut().enumerate() {
                    *a = i(n);
                }
                Insn::Call {
                    ty,
                    d: o(0)?,
                    helper,
                    args,
                    nargs: op.carg(1) as u8,
                }
            }
            Opcode::Br => {
                let at = unit.code.len();
                labels[op.carg(0) as usize].refer(at);
                Insn::Jmp {
                    target: Insn::UNRESOLVED,
                }
            }
            Opcode::BrCond => {
                let at = unit.code.len();
                labels[op.carg(1) as usize].refer(at);
                Insn::BrCond {
                    ty,
                    cond: cond_of(op.carg(0)),
                    a: i(0),
                    b: i(1),
                    target: Insn::UNRESOLVED,
                }
            }
            Opcode::HashJmp => Insn::HashJmp {
                mode: i(0),
                pc: i(1),
                nocode: Handle(op.carg(0)),
            },
            Opcode::CallH => Insn::CallH {
                handle: Handle(op.carg(0)),
                snapshot,
            },
            Opcode::Exh => Insn::Exh {
                handle: Handle(op.carg(0)),
                param: i(0),
                snapshot,
            },
            Opcode::Ret => Insn::Ret,
            Opcode::GetExp => Insn::GetExp { d: o(0)? },
            Opcode::Recover => Insn::Recover {
                d: o(0)?,
                var: MapVar::from_raw(op.carg(0)).unwrap_or(MapVar::Pc),
            },
            Opcode::Exit => Insn::Exit { code: i(0) },
            Opcode::Count => continue,
        };
        unit.code.push(insn);
    }

    for label in labels.iter().filter(|l| !l.fixups.is_empty()) {
        let target = label.target.ok_or(BackendError::UndefinedLabel(label.id))?;
        for &at in &label.fixups {
            unit.code[at].set_target(CodeAddr(target as u32));
        }
    }
    Ok(unit)
}
