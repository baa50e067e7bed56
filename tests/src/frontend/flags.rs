//! Lookup tables against a direct evaluation of the comparisons.

use drc_core::Flags;
use ppc_frontend::cpu::{cr, xer};
use ppc_frontend::flags::{cmp_entry, cmpl_entry, ov_xer_entry, sz_entry};

const SAMPLES: [u32; 9] = [
    0,
    1,
    2,
    0x7fff_ffff,
    0x8000_0000,
    0x8000_0001,
    0xffff_fffe,
    0xffff_ffff,
    0x1234_5678,
];

/// Host flags of `a - b`: borrow, signed overflow, zero, sign.
fn sub_flags(a: u32, b: u32) -> u32 {
    let r = a.wrapping_sub(b);
    let mut f = 0u8;
    if a < b {
        f |= Flags::C.bits();
    }
    if (a as i32).checked_sub(b as i32).is_none() {
        f |= Flags::V.bits();
    }
    if r == 0 {
        f |= Flags::Z.bits();
    }
    if (r as i32) < 0 {
        f |= Flags::S.bits();
    }
    f as u32
}

fn expect(ord: std::cmp::Ordering) -> u32 {
    match ord {
        std::cmp::Ordering::Less => cr::LT,
        std::cmp::Ordering::Greater => cr::GT,
        std::cmp::Ordering::Equal => cr::EQ,
    }
}

#[test]
fn signed_compare_table() {
    for a in SAMPLES {
        for b in SAMPLES {
            let got = cmp_entry(sub_flags(a, b));
            assert_eq!(got, expect((a as i32).cmp(&(b as i32))), "{a:#x} vs {b:#x}");
        }
    }
}

#[test]
fn unsigned_compare_table() {
    for a in SAMPLES {
        for b in SAMPLES {
            let got = cmpl_entry(sub_flags(a, b));
            assert_eq!(got, expect(a.cmp(&b)), "{a:#x} vs {b:#x}");
        }
    }
}

#[test]
fn record_table_follows_result_sign() {
    for v in SAMPLES {
        let mut f = 0u32;
        if v == 0 {
            f |= Flags::Z.bits() as u32;
        }
        if (v as i32) < 0 {
            f |= Flags::S.bits() as u32;
        }
        assert_eq!(sz_entry(f), expect((v as i32).cmp(&0)), "{v:#x}");
    }
}

#[test]
fn overflow_sets_summary_overflow() {
    assert_eq!(ov_xer_entry(Flags::V.bits() as u32), xer::OV | xer::SO);
    assert_eq!(ov_xer_entry(Flags::C.bits() as u32), 0);
}
