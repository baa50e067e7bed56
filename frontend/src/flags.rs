//! Condition lookup tables.
//!
//! Generated code reads the host flags produced by a compare or an
//! arithmetic op with `GetFlags`, giving a 5-bit index, and loads the
//! guest condition nibble (or XER bits) from one of these tables in a
//! single step. The index bits are the IR flag bits: C=1, V=2, Z=4,
//! S=8, U=16.

use drc_core::Flags;

use crate::cpu::{cr, xer, PpcState};

const C: u32 = Flags::C.bits() as u32;
const V: u32 = Flags::V.bits() as u32;
const Z: u32 = Flags::Z.bits() as u32;
const S: u32 = Flags::S.bits() as u32;
const U: u32 = Flags::U.bits() as u32;

/// Signed compare (`cmp`, `cmpi`): flags of `a - b`.
pub fn cmp_entry(f: u32) -> u32 {
    if f & Z != 0 {
        cr::EQ
    } else if ((f & S != 0) as u32) ^ ((f & V != 0) as u32) != 0 {
        cr::LT
    } else {
        cr::GT
    }
}

/// Unsigned compare (`cmpl`, `cmpli`): C is the borrow of `a - b`.
pub fn cmpl_entry(f: u32) -> u32 {
    if f & Z != 0 {
        cr::EQ
    } else if f & C != 0 {
        cr::LT
    } else {
        cr::GT
    }
}

/// Record form of a result: sign and zero of the value itself.
pub fn sz_entry(f: u32) -> u32 {
    if f & Z != 0 {
        cr::EQ
    } else if f & S != 0 {
        cr::LT
    } else {
        cr::GT
    }
}

/// Floating compare: U is unordered, C is less-than, Z is equal.
pub fn fcmp_entry(f: u32) -> u32 {
    if f & U != 0 {
        cr::SO
    } else if f & C != 0 {
        cr::LT
    } else if f & Z != 0 {
        cr::EQ
    } else {
        cr::GT
    }
}

/// XER bits set by an OE=1 operation.
pub fn ov_xer_entry(f: u32) -> u32 {
    if f & V != 0 {
        xer::OV | xer::SO
    } else {
        0
    }
}

/// Fill every lookup table in the state block.
pub fn init_tables(state: &mut PpcState) {
    for f in 0..32u32 {
        let i = f as usize;
        state.cmp_cr[i] = cmp_entry(f);
        state.cmpl_cr[i] = cmpl_entry(f);
        state.sz_cr[i] = sz_entry(f);
        state.fcmp_cr[i] = fcmp_entry(f);
        state.ov_xer[i] = ov_xer_entry(f);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_entry_sets_one_bit() {
        for f in 0..32 {
            for v in [cmp_entry(f), cmpl_entry(f), sz_entry(f), fcmp_entry(f)] {
                assert_eq!(v.count_ones(), 1, "flags {f:#x}");
            }
        }
    }

    #[test]
    fn signed_overflow_flips_sign() {
        // 0x8000_0000 - 1 overflows: S clear, V set, but a < b.
        assert_eq!(cmp_entry(V), cr::LT);
        assert_eq!(cmp_entry(S | V), cr::GT);
    }
}
