/// IR value types.
///
/// Floating-point values travel through the IR as `I64` bit patterns;
/// the float opcodes reinterpret them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Type {
    I32 = 0,
    I64 = 1,
}

pub const TYPE_COUNT: usize = 2;

impl Type {
    pub const fn size_bits(self) -> u32 {
        match self {
            Type::I32 => 32,
            Type::I64 => 64,
        }
    }

    pub const fn size_bytes(self) -> u32 {
        self.size_bits() / 8
    }

    /// All-ones mask covering the width of this type.
    pub const fn mask(self) -> u64 {
        match self {
            Type::I32 => 0xffff_ffff,
            Type::I64 => u64::MAX,
        }
    }

    /// Sign bit of this type.
    pub const fn sign_bit(self) -> u64 {
        1u64 << (self.size_bits() - 1)
    }
}

/// Comparison conditions for `BrCond` / `SetCond`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Cond {
    Never = 0,
    Always = 1,
    Eq = 8,
    Ne = 9,
    // Signed
    Lt = 10,
    Ge = 11,
    Le = 12,
    Gt = 13,
    // Unsigned
    Ltu = 14,
    Geu = 15,
    Leu = 16,
    Gtu = 17,
    // Test (AND then compare vs 0)
    TstEq = 18,
    TstNe = 19,
}

impl Cond {
    /// Return the inverted condition.
    pub const fn invert(self) -> Cond {
        match self {
            Cond::Never => Cond::Always,
            Cond::Always => Cond::Never,
            Cond::Eq => Cond::Ne,
            Cond::Ne => Cond::Eq,
            Cond::Lt => Cond::Ge,
            Cond::Ge => Cond::Lt,
            Cond::Le => Cond::Gt,
            Cond::Gt => Cond::Le,
            Cond::Ltu => Cond::Geu,
            Cond::Geu => Cond::Ltu,
            Cond::Leu => Cond::Gtu,
            Cond::Gtu => Cond::Leu,
            Cond::TstEq => Cond::TstNe,
            Cond::TstNe => Cond::TstEq,
        }
    }

    /// Decode a condition previously encoded as a constant arg.
    pub const fn from_raw(raw: u32) -> Option<Cond> {
        Some(match raw {
            0 => Cond::Never,
            1 => Cond::Always,
            8 => Cond::Eq,
            9 => Cond::Ne,
            10 => Cond::Lt,
            11 => Cond::Ge,
            12 => Cond::Le,
            13 => Cond::Gt,
            14 => Cond::Ltu,
            15 => Cond::Geu,
            16 => Cond::Leu,
            17 => Cond::Gtu,
            18 => Cond::TstEq,
            19 => Cond::TstNe,
            _ => return None,
        })
    }

    /// Evaluate the condition on two values of width `ty`.
    pub fn eval(self, ty: Type, a: u64, b: u64) -> bool {
        let m = ty.mask();
        let (a, b) = (a & m, b & m);
        let sext = |v: u64| -> i64 {
            match ty {
                Type::I32 => v as u32 as i32 as i64,
                Type::I64 => v as i64,
            }
        };
        match self {
            Cond::Never => false,
            Cond::Always => true,
            Cond::Eq => a == b,
            Cond::Ne => a != b,
            Cond::Lt => sext(a) < sext(b),
            Cond::Ge => sext(a) >= sext(b),
            Cond::Le => sext(a) <= sext(b),
            Cond::Gt => sext(a) > sext(b),
            Cond::Ltu => a < b,
            Cond::Geu => a >= b,
            Cond::Leu => a <= b,
            Cond::Gtu => a > b,
            Cond::TstEq => a & b == 0,
            Cond::TstNe => a & b != 0,
        }
    }
}

/// Condition flags produced by flag-setting ops.
///
/// Ops only touch the flags register when their flag mask is
/// non-zero; the mask is the set of flags the frontend intends to
/// read back with `GetFlags`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Flags(u8);

impl Flags {
    pub const NONE: Flags = Flags(0);
    /// Carry (add) or borrow (subtract/compare).
    pub const C: Flags = Flags(0x01);
    /// Signed overflow.
    pub const V: Flags = Flags(0x02);
    /// Zero.
    pub const Z: Flags = Flags(0x04);
    /// Sign.
    pub const S: Flags = Flags(0x08);
    /// Unordered (floating compare).
    pub const U: Flags = Flags(0x10);
    pub const ALL: Flags = Flags(0x1f);

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & 0x1f)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: Flags) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn union(self, other: Flags) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for Flags {
    type Output = Flags;

    fn bitor(self, rhs: Flags) -> Flags {
        self.union(rhs)
    }
}

impl std::fmt::Debug for Flags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names = [
            (Flags::C, 'C'),
            (Flags::V, 'V'),
            (Flags::Z, 'Z'),
            (Flags::S, 'S'),
            (Flags::U, 'U'),
        ];
        let mut s = String::new();
        for (flag, ch) in names {
            if self.contains(flag) {
                s.push(ch);
            }
        }
        if s.is_empty() {
            s.push('-');
        }
        write!(f, "Flags({s})")
    }
}

/// Bitmap of host registers.
///
/// Supports up to 64 registers.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegSet(u64);

impl RegSet {
    pub const EMPTY: RegSet = RegSet(0);

    pub const fn set(self, reg: u8) -> Self {
        Self(self.0 | (1u64 << reg))
    }

    pub const fn clear(self, reg: u8) -> Self {
        Self(self.0 & !(1u64 << reg))
    }

    pub const fn contains(self, reg: u8) -> bool {
        self.0 & (1u64 << reg) != 0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn count(self) -> u32 {
        self.0.count_ones()
    }

    /// Return the lowest set register, or None.
    pub const fn first(self) -> Option<u8> {
        if self.0 == 0 {
            None
        } else {
            Some(self.0.trailing_zeros() as u8)
        }
    }

    pub fn iter(self) -> impl Iterator<Item = u8> {
        (0..64u8).filter(move |&r| self.contains(r))
    }
}

impl Default for RegSet {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl std::fmt::Debug for RegSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RegSet(0x{:016x})", self.0)
    }
}
