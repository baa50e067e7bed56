use crate::types::Type;

/// IR opcodes.
///
/// Integer ops (marked with `OpFlags::INT`) work on both I32 and I64;
/// the actual type is carried in `Op::op_type`. The tail of the list
/// is the recompiler control set: entry points, hashed dispatch,
/// handle calls and state recovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    // -- Data movement --
    Mov = 0,

    // -- Arithmetic --
    Add,
    AddC, // add with carry in
    Sub,
    Mul,
    MulSH, // signed multiply high
    MulUH, // unsigned multiply high
    DivS,
    DivU,

    // -- Logic --
    And,
    Or,
    Xor,
    Not,
    AndC, // a & ~b
    OrC, // a | ~b
    Eqv, // ~(a ^ b)
    Nand,
    Nor,

    // -- Shift/rotate --
    Shl,
    Shr,
    Sar,
    RotL,

    // -- Bit manipulation --
    Clz, // count leading zeros
    Bswap16,
    Bswap32,
    Bswap64,
    Sext, // sign-extend from carg bits

    // -- Type conversion --
    ExtUI32I64, // zero-extend i32 -> i64
    ExtrlI64I32, // truncate i64 -> i32 (low)
    ExtrhI64I32, // extract i64 -> i32 (high)

    // -- Compare / flags --
    SetCond,
    Cmp, // flags of a - b, no result
    Test, // flags of a & b, no result
    GetFlags, // dst = flags & mask
    SetCarry, // C = bit n of src

    // -- Floating point (f64 bit patterns) --
    FAdd,
    FSub,
    FMul,
    FDiv,
    FMadd, // fused a * b + c
    FSqrt,
    FRecip,
    FRsqrt,
    FRsp, // round to single precision
    FS2D, // f32 bits -> f64 bits
    FD2S, // f64 bits -> f32 bits
    FCti, // f64 -> i32 with rounding mode input
    FCmp,

    // -- Host memory load/store (base temp + offset) --
    Ld8U,
    Ld16U,
    Ld32U,
    Ld, // native-width load
    St8,
    St16,
    St32,
    St, // native-width store

    // -- Guest bus access --
    Read, // bus read, carg = size in bytes
    ReadM, // masked bus read
    Write,
    WriteM, // masked bus write
    Translate, // logical -> physical, u64::MAX on miss

    // -- Calls --
    Call, // host helper, cargs = (helper, nargs)

    // -- Control flow --
    Br, // branch to label
    BrCond,
    SetLabel,
    Handle, // define a named entry point
    Hash, // define a (mode, pc) entry point
    HashJmp, // dispatch through the (mode, pc) map
    CallH, // call a handle
    Exh, // call a handle with an exception parameter
    Ret,
    GetExp, // read the exception parameter

    // -- Recovery --
    MapVar, // record a recoverable value at this point
    Recover, // read a caller's recorded value
    Exit, // leave generated code

    // -- Misc --
    InsnStart, // marks guest instruction boundary

    // Must stay last.
    Count,
}

/// Flags describing properties of an opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpFlags(u16);

impl OpFlags {
    pub const NONE: OpFlags = OpFlags(0);
    /// Leaves generated code or jumps away for good.
    pub const BB_EXIT: OpFlags = OpFlags(0x01);
    /// Ends a basic block (next op starts a new BB).
    pub const BB_END: OpFlags = OpFlags(0x02);
    /// Clobbers the condition flags and may re-enter generated code.
    pub const CALL_CLOBBER: OpFlags = OpFlags(0x04);
    /// Has side effects beyond its outputs.
    pub const SIDE_EFFECTS: OpFlags = OpFlags(0x08);
    /// Operands may be I32 or I64 (type-polymorphic).
    pub const INT: OpFlags = OpFlags(0x10);
    /// Produces no executable code of its own.
    pub const NOT_PRESENT: OpFlags = OpFlags(0x20);
    /// Operates on f64 bit patterns.
    pub const FLOAT: OpFlags = OpFlags(0x40);
    /// Conditional branch (may or may not be taken).
    pub const COND_BRANCH: OpFlags = OpFlags(0x80);
    /// May update the flags register when given a flag mask.
    pub const SETS_FLAGS: OpFlags = OpFlags(0x100);
    /// Consumes the carry flag.
    pub const CARRY_IN: OpFlags = OpFlags(0x200);
    /// Reads the flags register.
    pub const READS_FLAGS: OpFlags = OpFlags(0x400);

    pub const fn bits(self) -> u16 {
        self.0
    }

    pub const fn contains(self, other: OpFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn union(self, other: OpFlags) -> Self {
        Self(self.0 | other.0)
    }
}

/// Argument counts and properties of one opcode.
#[derive(Debug, Clone, Copy)]
pub struct OpDef {
    pub name: &'static str,
    pub nb_oargs: u8,
    pub nb_iargs: u8,
    pub nb_cargs: u8,
    pub flags: OpFlags,
}

impl OpDef {
    pub const fn nb_args(&self) -> u8 {
        self.nb_oargs + self.nb_iargs + self.nb_cargs
    }
}

// Helpers to combine flags in const context.
const fn f(a: OpFlags, b: OpFlags) -> OpFlags {
    OpFlags(a.0 | b.0)
}

const fn f3(a: OpFlags, b: OpFlags, c: OpFlags) -> OpFlags {
    OpFlags(a.0 | b.0 | c.0)
}

const INT: OpFlags = OpFlags::INT;
const NP: OpFlags = OpFlags::NOT_PRESENT;
const SE: OpFlags = OpFlags::SIDE_EFFECTS;
const CC: OpFlags = OpFlags::CALL_CLOBBER;
const BE: OpFlags = OpFlags::BB_END;
const BX: OpFlags = OpFlags::BB_EXIT;
const CB: OpFlags = OpFlags::COND_BRANCH;
const FL: OpFlags = OpFlags::SETS_FLAGS;
const CI: OpFlags = OpFlags::CARRY_IN;
const RF: OpFlags = OpFlags::READS_FLAGS;
const FP: OpFlags = OpFlags::FLOAT;
const N: OpFlags = OpFlags::NONE;

/// Static opcode definition table, indexed by `Opcode as usize`.
pub static OPCODE_DEFS: [OpDef; Opcode::Count as usize] = [
    // Mov
    OpDef {
        name: "mov",
        nb_oargs: 1,
        nb_iargs: 1,
        nb_cargs: 0,
        flags: INT,
    },
    // Add
    OpDef {
        name: "add",
        nb_oargs: 1,
        nb_iargs: 2,
        nb_cargs: 0,
        flags: f(INT, FL),
    },
    // AddC
    OpDef {
        name: "addc",
        nb_oargs: 1,
        nb_iargs: 2,
        nb_cargs: 0,
        flags: f3(INT, FL, CI),
    },
    // Sub
    OpDef {
        name: "sub",
        nb_oargs: 1,
        nb_iargs: 2,
        nb_cargs: 0,
        flags: f(INT, FL),
    },
    // Mul
    OpDef {
        name: "mul",
        nb_oargs: 1,
        nb_iargs: 2,
        nb_cargs: 0,
        flags: f(INT, FL),
    },
    // MulSH
    OpDef {
        name: "mulsh",
        nb_oargs: 1,
        nb_iargs: 2,
        nb_cargs: 0,
        flags: INT,
    },
    // MulUH
    OpDef {
        name: "muluh",
        nb_oargs: 1,
        nb_iargs: 2,
        nb_cargs: 0,
        flags: INT,
    },
    // DivS
    OpDef {
        name: "divs",
        nb_oargs: 1,
        nb_iargs: 2,
        nb_cargs: 0,
        flags: f(INT, FL),
    },
    // DivU
    OpDef {
        name: "divu",
        nb_oargs: 1,
        nb_iargs: 2,
        nb_cargs: 0,
        flags: f(INT, FL),
    },
    // And
    OpDef {
        name: "and",
        nb_oargs: 1,
        nb_iargs: 2,
        nb_cargs: 0,
        flags: f(INT, FL),
    },
    // Or
    OpDef {
        name: "or",
        nb_oargs: 1,
        nb_iargs: 2,
        nb_cargs: 0,
        flags: f(INT, FL),
    },
    // Xor
    OpDef {
        name: "xor",
        nb_oargs: 1,
        nb_iargs: 2,
        nb_cargs: 0,
        flags: f(INT, FL),
    },
    // Not
    OpDef {
        name: "not",
        nb_oargs: 1,
        nb_iargs: 1,
        nb_cargs: 0,
        flags: f(INT, FL),
    },
    // AndC
    OpDef {
        name: "andc",
        nb_oargs: 1,
        nb_iargs: 2,
        nb_cargs: 0,
        flags: f(INT, FL),
    },
    // OrC
    OpDef {
        name: "orc",
        nb_oargs: 1,
        nb_iargs: 2,
        nb_cargs: 0,
        flags: f(INT, FL),
    },
    // Eqv
    OpDef {
        name: "eqv",
        nb_oargs: 1,
        nb_iargs: 2,
        nb_cargs: 0,
        flags: f(INT, FL),
    },
    // Nand
    OpDef {
        name: "nand",
        nb_oargs: 1,
        nb_iargs: 2,
        nb_cargs: 0,
        flags: f(INT, FL),
    },
    // Nor
    OpDef {
        name: "nor",
        nb_oargs: 1,
        nb_iargs: 2,
        nb_cargs: 0,
        flags: f(INT, FL),
    },
    // Shl
    OpDef {
        name: "shl",
        nb_oargs: 1,
        nb_iargs: 2,
        nb_cargs: 0,
        flags: f(INT, FL),
    },
    // Shr
    OpDef {
        name: "shr",
        nb_oargs: 1,
        nb_iargs: 2,
        nb_cargs: 0,
        flags: f(INT, FL),
    },
    // Sar
    OpDef {
        name: "sar",
        nb_oargs: 1,
        nb_iargs: 2,
        nb_cargs: 0,
        flags: f(INT, FL),
    },
    // RotL
    OpDef {
        name: "rotl",
        nb_oargs: 1,
        nb_iargs: 2,
        nb_cargs: 0,
        flags: f(INT, FL),
    },
    // Clz
    OpDef {
        name: "clz",
        nb_oargs: 1,
        nb_iargs: 1,
        nb_cargs: 0,
        flags: INT,
    },
    // Bswap16
    OpDef {
        name: "bswap16",
        nb_oargs: 1,
        nb_iargs: 1,
        nb_cargs: 0,
        flags: INT,
    },
    // Bswap32
    OpDef {
        name: "bswap32",
        nb_oargs: 1,
        nb_iargs: 1,
        nb_cargs: 0,
        flags: INT,
    },
    // Bswap64
    OpDef {
        name: "bswap64",
        nb_oargs: 1,
        nb_iargs: 1,
        nb_cargs: 0,
        flags: N,
    },
    // Sext
    OpDef {
        name: "sext",
        nb_oargs: 1,
        nb_iargs: 1,
        nb_cargs: 1,
        flags: INT,
    },
    // ExtUI32I64
    OpDef {
        name: "extu_i32_i64",
        nb_oargs: 1,
        nb_iargs: 1,
        nb_cargs: 0,
        flags: N,
    },
    // ExtrlI64I32
    OpDef {
        name: "extrl_i64_i32",
        nb_oargs: 1,
        nb_iargs: 1,
        nb_cargs: 0,
        flags: N,
    },
    // ExtrhI64I32
    OpDef {
        name: "extrh_i64_i32",
        nb_oargs: 1,
        nb_iargs: 1,
        nb_cargs: 0,
        flags: N,
    },
    // SetCond
    OpDef {
        name: "setcond",
        nb_oargs: 1,
        nb_iargs: 2,
        nb_cargs: 1,
        flags: INT,
    },
    // Cmp
    OpDef {
        name: "cmp",
        nb_oargs: 0,
        nb_iargs: 2,
        nb_cargs: 0,
        flags: f(INT, FL),
    },
    // Test
    OpDef {
        name: "test",
        nb_oargs: 0,
        nb_iargs: 2,
        nb_cargs: 0,
        flags: f(INT, FL),
    },
    // GetFlags
    OpDef {
        name: "getflags",
        nb_oargs: 1,
        nb_iargs: 0,
        nb_cargs: 1,
        flags: RF,
    },
    // SetCarry
    OpDef {
        name: "setcarry",
        nb_oargs: 0,
        nb_iargs: 1,
        nb_cargs: 1,
        flags: INT,
    },
    // FAdd
    OpDef {
        name: "fadd",
        nb_oargs: 1,
        nb_iargs: 2,
        nb_cargs: 0,
        flags: FP,
    },
    // FSub
    OpDef {
        name: "fsub",
        nb_oargs: 1,
        nb_iargs: 2,
        nb_cargs: 0,
        flags: FP,
    },
    // FMul
    OpDef {
        name: "fmul",
        nb_oargs: 1,
        nb_iargs: 2,
        nb_cargs: 0,
        flags: FP,
    },
    // FDiv
    OpDef {
        name: "fdiv",
        nb_oargs: 1,
        nb_iargs: 2,
        nb_cargs: 0,
        flags: FP,
    },
    // FMadd
    OpDef {
        name: "fmadd",
        nb_oargs: 1,
        nb_iargs: 3,
        nb_cargs: 0,
        flags: FP,
    },
    // FSqrt
    OpDef {
        name: "fsqrt",
        nb_oargs: 1,
        nb_iargs: 1,
        nb_cargs: 0,
        flags: FP,
    },
    // FRecip
    OpDef {
        name: "frecip",
        nb_oargs: 1,
        nb_iargs: 1,
        nb_cargs: 0,
        flags: FP,
    },
    // FRsqrt
    OpDef {
        name: "frsqrt",
        nb_oargs: 1,
        nb_iargs: 1,
        nb_cargs: 0,
        flags: FP,
    },
    // FRsp
    OpDef {
        name: "frsp",
        nb_oargs: 1,
        nb_iargs: 1,
        nb_cargs: 0,
        flags: FP,
    },
    // FS2D
    OpDef {
        name: "fs2d",
        nb_oargs: 1,
        nb_iargs: 1,
        nb_cargs: 0,
        flags: FP,
    },
    // FD2S
    OpDef {
        name: "fd2s",
        nb_oargs: 1,
        nb_iargs: 1,
        nb_cargs: 0,
        flags: FP,
    },
    // FCti
    OpDef {
        name: "fcti",
        nb_oargs: 1,
        nb_iargs: 2,
        nb_cargs: 0,
        flags: FP,
    },
    // FCmp
    OpDef {
        name: "fcmp",
        nb_oargs: 0,
        nb_iargs: 2,
        nb_cargs: 0,
        flags: f(FP, FL),
    },
    // Ld8U
    OpDef {
        name: "ld8u",
        nb_oargs: 1,
        nb_iargs: 1,
        nb_cargs: 1,
        flags: INT,
    },
    // Ld16U
    OpDef {
        name: "ld16u",
        nb_oargs: 1,
        nb_iargs: 1,
        nb_cargs: 1,
        flags: INT,
    },
    // Ld32U
    OpDef {
        name: "ld32u",
        nb_oargs: 1,
        nb_iargs: 1,
        nb_cargs: 1,
        flags: INT,
    },
    // Ld
    OpDef {
        name: "ld",
        nb_oargs: 1,
        nb_iargs: 1,
        nb_cargs: 1,
        flags: INT,
    },
    // St8
    OpDef {
        name: "st8",
        nb_oargs: 0,
        nb_iargs: 2,
        nb_cargs: 1,
        flags: f(INT, SE),
    },
    // St16
    OpDef {
        name: "st16",
        nb_oargs: 0,
        nb_iargs: 2,
        nb_cargs: 1,
        flags: f(INT, SE),
    },
    // St32
    OpDef {
        name: "st32",
        nb_oargs: 0,
        nb_iargs: 2,
        nb_cargs: 1,
        flags: f(INT, SE),
    },
    // St
    OpDef {
        name: "st",
        nb_oargs: 0,
        nb_iargs: 2,
        nb_cargs: 1,
        flags: f(INT, SE),
    },
    // Read
    OpDef {
        name: "read",
        nb_oargs: 1,
        nb_iargs: 1,
        nb_cargs: 1,
        flags: f(SE, CC),
    },
    // ReadM
    OpDef {
        name: "readm",
        nb_oargs: 1,
        nb_iargs: 2,
        nb_cargs: 1,
        flags: f(SE, CC),
    },
    // Write
    OpDef {
        name: "write",
        nb_oargs: 0,
        nb_iargs: 2,
        nb_cargs: 1,
        flags: f(SE, CC),
    },
    // WriteM
    OpDef {
        name: "writem",
        nb_oargs: 0,
        nb_iargs: 3,
        nb_cargs: 1,
        flags: f(SE, CC),
    },
    // Translate
    OpDef {
        name: "translate",
        nb_oargs: 1,
        nb_iargs: 1,
        nb_cargs: 1,
        flags: f(SE, CC),
    },
    // Call
    OpDef {
        name: "call",
        nb_oargs: 1,
        nb_iargs: 4,
        nb_cargs: 2,
        flags: f(SE, CC),
    },
    // Br
    OpDef {
        name: "br",
        nb_oargs: 0,
        nb_iargs: 0,
        nb_cargs: 1,
        flags: BE,
    },
    // BrCond
    OpDef {
        name: "brcond",
        nb_oargs: 0,
        nb_iargs: 2,
        nb_cargs: 2,
        flags: f3(INT, BE, CB),
    },
    // SetLabel
    OpDef {
        name: "set_label",
        nb_oargs: 0,
        nb_iargs: 0,
        nb_cargs: 1,
        flags: f(BE, NP),
    },
    // Handle
    OpDef {
        name: "handle",
        nb_oargs: 0,
        nb_iargs: 0,
        nb_cargs: 1,
        flags: f(BE, NP),
    },
    // Hash
    OpDef {
        name: "hash",
        nb_oargs: 0,
        nb_iargs: 0,
        nb_cargs: 2,
        flags: f(BE, NP),
    },
    // HashJmp
    OpDef {
        name: "hashjmp",
        nb_oargs: 0,
        nb_iargs: 2,
        nb_cargs: 1,
        flags: f(BE, BX),
    },
    // CallH
    OpDef {
        name: "callh",
        nb_oargs: 0,
        nb_iargs: 0,
        nb_cargs: 1,
        flags: CC,
    },
    // Exh
    OpDef {
        name: "exh",
        nb_oargs: 0,
        nb_iargs: 1,
        nb_cargs: 1,
        flags: CC,
    },
    // Ret
    OpDef {
        name: "ret",
        nb_oargs: 0,
        nb_iargs: 0,
        nb_cargs: 0,
        flags: f(BE, BX),
    },
    // GetExp
    OpDef {
        name: "getexp",
        nb_oargs: 1,
        nb_iargs: 0,
        nb_cargs: 0,
        flags: N,
    },
    // MapVar
    OpDef {
        name: "mapvar",
        nb_oargs: 0,
        nb_iargs: 0,
        nb_cargs: 2,
        flags: NP,
    },
    // Recover
    OpDef {
        name: "recover",
        nb_oargs: 1,
        nb_iargs: 0,
        nb_cargs: 1,
        flags: N,
    },
    // Exit
    OpDef {
        name: "exit",
        nb_oargs: 0,
        nb_iargs: 1,
        nb_cargs: 0,
        flags: f(BE, BX),
    },
    // InsnStart
    OpDef {
        name: "insn_start",
        nb_oargs: 0,
        nb_iargs: 0,
        nb_cargs: 1,
        flags: NP,
    },
];

impl Opcode {
    /// Look up the static definition for this opcode.
    pub fn def(self) -> &'static OpDef {
        &OPCODE_DEFS[self as usize]
    }

    /// Return the fixed IR type this opcode operates on, if not
    /// type-polymorphic.
    pub fn fixed_type(self) -> Option<Type> {
        match self {
            Opcode::ExtUI32I64 | Opcode::Bswap64 => Some(Type::I64),
            Opcode::ExtrlI64I32 | Opcode::ExtrhI64I32 => Some(Type::I32),
            _ if self.is_float() => Some(Type::I64),
            _ => None,
        }
    }

    /// Whether this opcode is type-polymorphic (works on I32 or I64).
    pub fn is_int_polymorphic(self) -> bool {
        self.def().flags.contains(OpFlags::INT)
    }

    pub fn is_float(self) -> bool {
        self.def().flags.contains(OpFlags::FLOAT)
    }

    /// Whether this opcode honours a non-empty flag mask.
    pub fn sets_flags(self) -> bool {
        self.def().flags.contains(OpFlags::SETS_FLAGS)
    }
}
