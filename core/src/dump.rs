//! Text dump of an op stream, for logs and the irdump tool.

use std::fmt::Write as FmtWrite;
use std::io::Write;

use crate::block::MapVar;
use crate::context::Context;
use crate::op::Op;
use crate::opcode::Opcode;
use crate::temp::{TempIdx, TempKind};
use crate::types::{Cond, Flags, Type};

/// Format a condition code as a short name.
fn cond_name(c: u32) -> &'static str {
    match Cond::from_raw(c) {
        Some(Cond::Never) => "never",
        Some(Cond::Always) => "always",
        Some(Cond::Eq) => "eq",
        Some(Cond::Ne) => "ne",
        Some(Cond::Lt) => "lt",
        Some(Cond::Ge) => "ge",
        Some(Cond::Le) => "le",
        Some(Cond::Gt) => "gt",
        Some(Cond::Ltu) => "ltu",
        Some(Cond::Geu) => "geu",
        Some(Cond::Leu) => "leu",
        Some(Cond::Gtu) => "gtu",
        Some(Cond::TstEq) => "tsteq",
        Some(Cond::TstNe) => "tstne",
        None => "???",
    }
}

/// Format a temp reference for display.
fn fmt_temp(ctx: &Context, idx: TempIdx, buf: &mut String) {
    let i = idx.0 as usize;
    if i >= ctx.nb_temps() as usize {
        let v = idx.0;
        let _ = write!(buf, "$0x{v:x}");
        return;
    }
    let t = ctx.temp(idx);
    match t.kind {
        TempKind::Const => {
            let v = t.val;
            let _ = write!(buf, "$0x{v:x}");
        }
        TempKind::Global => match t.name {
            Some(name) => buf.push_str(name),
            None => {
                let _ = write!(buf, "g{i}");
            }
        },
        TempKind::Fixed => match t.name {
            Some(name) => buf.push_str(name),
            None => {
                let r = t.reg.unwrap_or(0);
                let _ = write!(buf, "fixed({r})");
            }
        },
        TempKind::Ebb | TempKind::Unit => {
            let local = i as u32 - ctx.nb_globals();
            let _ = write!(buf, "tmp{local}");
        }
    }
}

/// Build the opcode name with type suffix for polymorphic ops.
fn op_name(op: &Op) -> String {
    let def = op.opc.def();
    let mut name = if op.opc.is_int_polymorphic() {
        let suffix = match op.op_type {
            Type::I32 => "_i32",
            Type::I64 => "_i64",
        };
        format!("{}{suffix}", def.name)
    } else {
        def.name.to_string()
    };
    if !op.flags.is_empty() {
        let _ = write!(name, ".{:?}", op.flags);
    }
    name
}

/// Dump all IR ops in `ctx` to the given writer.
pub fn dump_ops(ctx: &Context, w: &mut impl Write) -> std::io::Result<()> {
    dump_ops_with(ctx, w, |_, _| Ok(()))
}

/// Dump IR ops with an annotation callback for `InsnStart`.
///
/// `insn_anno` is called at each guest instruction boundary with
/// `(pc, writer)`, e.g. to print the raw opcode word on the
/// `---- 0x...` header line.
pub fn dump_ops_with(
    ctx: &Context,
    w: &mut impl Write,
    insn_anno: impl Fn(u32, &mut dyn Write) -> std::io::Result<()>,
) -> std::io::Result<()> {
    let mut buf = String::with_capacity(128);

    for op in ctx.ops() {
        buf.clear();
        match op.opc {
            Opcode::InsnStart => {
                let pc = op.carg(0);
                write!(w, " ---- 0x{pc:08x}")?;
                insn_anno(pc, w)?;
                writeln!(w)?;
                continue;
            }
            Opcode::SetLabel => {
                writeln!(w, " L{}:", op.carg(0))?;
                continue;
            }
            Opcode::Handle => {
                writeln!(w, " handle#{}:", op.carg(0))?;
                continue;
            }
            Opcode::Hash => {
                writeln!(w, " hash {}:{:08x}:", op.carg(0), op.carg(1))?;
                continue;
            }
            _ => {}
        }

        let name = op_name(op);
        write!(w, " {name}")?;

        let oargs = op.oargs();
        let iargs = op.iargs();
        for (i, &a) in oargs.iter().chain(iargs.iter()).enumerate() {
            if i > 0 {
                write!(w, ",")?;
            }
            write!(w, " ")?;
            buf.clear();
            fmt_temp(ctx, a, &mut buf);
            write!(w, "{buf}")?;
        }
        let has_prev = !oargs.is_empty() || !iargs.is_empty();
        let sep = if has_prev { ", " } else { " " };

        let cargs = op.cargs();
        match op.opc {
            Opcode::BrCond => {
                let cond = cond_name(cargs[0].0);
                write!(w, "{sep}{cond}, L{}", cargs[1].0)?;
            }
            Opcode::SetCond => {
                write!(w, "{sep}{}", cond_name(cargs[0].0))?;
            }
            Opcode::Br => write!(w, " L{}", cargs[0].0)?,
            Opcode::GetFlags => {
                let mask = Flags::from_bits(cargs[0].0 as u8);
                write!(w, "{sep}{mask:?}")?;
            }
            Opcode::CallH | Opcode::Exh | Opcode::HashJmp => {
                write!(w, "{sep}handle#{}", cargs[0].0)?;
            }
            Opcode::Call => {
                write!(w, "{sep}helper#{}", cargs[0].0)?;
            }
            Opcode::MapVar | Opcode::Recover => {
                let var = MapVar::from_raw(cargs[0].0)
                    .map(MapVar::name)
                    .unwrap_or("?");
                write!(w, "{sep}{var}")?;
                if op.opc == Opcode::MapVar {
                    write!(w, ", $0x{:x}", cargs[1].0)?;
                }
            }
            _ => {
                for (i, &c) in cargs.iter().enumerate() {
                    let s = if has_prev || i > 0 { ", " } else { " " };
                    write!(w, "{s}$0x{:x}", c.0)?;
                }
            }
        }

        writeln!(w)?;
    }
    Ok(())
}
