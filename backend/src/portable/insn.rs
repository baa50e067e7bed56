//! Lowered instruction form executed by the portable backend.

use drc_core::{Cond, Flags, Handle, HelperId, MapVar, Opcode, Type, MAPVAR_COUNT, MAX_CALL_ARGS};

use crate::code_cache::CodeAddr;

/// Where an operand lives at run time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    /// Per-frame scratch slot.
    Slot(u32),
    /// Host register.
    Host(u8),
    /// Field of the machine state, `offset` bytes from the env pointer.
    Env { offset: i32, ty: Type },
    /// Immediate.
    Imm(u64),
}

/// Values of the map variables in effect at a call site.
pub type Snapshot = [Option<u32>; MAPVAR_COUNT];

#[derive(Debug, Clone, Copy)]
pub enum Insn {
    Mov {
        ty: Type,
        d: Operand,
        s: Operand,
    },
    /// Any two-input integer op.
    Binary {
        opc: Opcode,
        ty: Type,
        flags: Flags,
        d: Operand,
        a: Operand,
        b: Operand,
    },
    /// Any one-input integer op, including conversions.
    Unary {
        opc: Opcode,
        ty: Type,
        flags: Flags,
        d: Operand,
        s: Operand,
    },
    Sext {
        ty: Type,
        d: Operand,
        s: Operand,
        bits: u32,
    },
    SetCond {
        ty: Type,
        cond: Cond,
        d: Operand,
        a: Operand,
        b: Operand,
    },
    /// `Cmp` or `Test`: flags only.
    Compare {
        opc: Opcode,
        ty: Type,
        flags: Flags,
        a: Operand,
        b: Operand,
    },
    GetFlags {
        d: Operand,
        mask: Flags,
    },
    SetCarry {
        s: Operand,
        bit: u32,
    },
    Float {
        opc: Opcode,
        d: Operand,
        a: Operand,
        b: Operand,
        c: Operand,
    },
    FCmp {
        flags: Flags,
        a: Operand,
        b: Operand,
    },
    Load {
        size: u8,
        ty: Type,
        d: Operand,
        base: Operand,
        offset: i32,
    },
    Store {
        size: u8,
        s: Operand,
        base: Operand,
        offset: i32,
    },
    Read {
        ty: Type,
        size: u8,
        d: Operand,
        addr: Operand,
        mask: Option<Operand>,
    },
    Write {
        size: u8,
        addr: Operand,
        v: Operand,
        mask: Option<Operand>,
    },
    Translate {
        d: Operand,
        addr: Operand,
        intention: u32,
    },
    Call {
        ty: Type,
        d: Operand,
        helper: HelperId,
        args: [Operand; MAX_CALL_ARGS],
        nargs: u8,
    },
    Jmp {
        target: CodeAddr,
    },
    BrCond {
        ty: Type,
        cond: Cond,
        a: Operand,
        b: Operand,
        target: CodeAddr,
    },
    HashJmp {
        mode: Operand,
        pc: Operand,
        nocode: Handle,
    },
    CallH {
        handle: Handle,
        snapshot: Snapshot,
    },
    Exh {
        handle: Handle,
        param: Operand,
        snapshot: Snapshot,
    },
    Ret,
    GetExp {
        d: Operand,
    },
    Recover {
        d: Operand,
        var: MapVar,
    },
    Exit {
        code: Operand,
    },
}

impl Insn {
    /// Placeholder target used before labels are resolved.
    pub const UNRESOLVED: CodeAddr = CodeAddr(u32::MAX);

    /// Redirect a branch to `target`.
    pub fn set_target(&mut self, new: CodeAddr) {
        match self {
            Insn::Jmp { target } | Insn::BrCond { target, .. } => {
                *target = new;
            }
            _ => {}
        }
    }
}
