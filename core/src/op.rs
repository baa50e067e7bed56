use crate::opcode::Opcode;
use crate::temp::TempIdx;
use crate::types::{Flags, Type};

pub const MAX_OP_ARGS: usize = 10;

/// One micro-op.
///
/// Arguments are laid out outputs first, then inputs, then constant
/// args; the split comes from the opcode's `OpDef`. Constant args
/// (label ids, handles, condition codes) are stored as raw values in
/// a `TempIdx`.
#[derive(Debug, Clone)]
pub struct Op {
    pub opc: Opcode,
    /// Operand width of polymorphic ops.
    pub op_type: Type,
    /// Condition flags the op must leave behind for a later
    /// `GetFlags`.
    pub flags: Flags,
    pub args: [TempIdx; MAX_OP_ARGS],
    pub nargs: u8,
}

impl Op {
    pub fn new(opc: Opcode, op_type: Type, flags: Flags, args: &[TempIdx]) -> Self {
        debug_assert!(args.len() <= MAX_OP_ARGS, "{}: too many args", opc.def().name);
        let n = args.len().min(MAX_OP_ARGS);
        let mut buf = [TempIdx(0); MAX_OP_ARGS];
        buf[..n].copy_from_slice(&args[..n]);
        Self {
            opc,
            op_type,
            flags,
            args: buf,
            nargs: n as u8,
        }
    }

    fn span(&self, from: u8, len: u8) -> &[TempIdx] {
        &self.args[from as usize..(from + len) as usize]
    }

    pub fn oargs(&self) -> &[TempIdx] {
        self.span(0, self.opc.def().nb_oargs)
    }

    pub fn iargs(&self) -> &[TempIdx] {
        let def = self.opc.def();
        self.span(def.nb_oargs, def.nb_iargs)
    }

    pub fn cargs(&self) -> &[TempIdx] {
        let def = self.opc.def();
        self.span(def.nb_oargs + def.nb_iargs, def.nb_cargs)
    }

    /// Constant arg `n` as its raw value.
    pub fn carg(&self, n: usize) -> u32 {
        self.cargs()[n].0
    }
}
