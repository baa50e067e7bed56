use drc_core::{BlockKey, Cond, Flags, MapVar, RegSet, Type};

#[test]
fn type_masks() {
    assert_eq!(Type::I32.mask(), 0xffff_ffff);
    assert_eq!(Type::I64.mask(), u64::MAX);
    assert_eq!(Type::I32.size_bytes(), 4);
    assert_eq!(Type::I64.size_bits(), 64);
}

#[test]
fn cond_invert_is_an_involution() {
    let all = [
        Cond::Never,
        Cond::Always,
        Cond::Eq,
        Cond::Ne,
        Cond::Lt,
        Cond::Ge,
        Cond::Le,
        Cond::Gt,
        Cond::Ltu,
        Cond::Geu,
        Cond::Leu,
        Cond::Gtu,
        Cond::TstEq,
        Cond::TstNe,
    ];
    for c in all {
        assert_eq!(c.invert().invert(), c);
        assert_eq!(Cond::from_raw(c as u32), Some(c));
    }
}

#[test]
fn cond_eval_masks_to_width() {
    assert!(Cond::Eq.eval(Type::I32, 0x1_0000_0005, 5));
    assert!(!Cond::Eq.eval(Type::I64, 0x1_0000_0005, 5));
    assert!(Cond::TstNe.eval(Type::I32, 0x8000_0000, 0x8000_0000));
    assert!(Cond::TstEq.eval(Type::I32, 0x8000_0000, 1));
    assert!(Cond::Gtu.eval(Type::I32, 0x8000_0000, 1));
    assert!(!Cond::Gt.eval(Type::I32, 0x8000_0000, 1));
}

#[test]
fn flags_compose() {
    let f = Flags::Z | Flags::S;
    assert!(f.contains(Flags::Z));
    assert!(!f.contains(Flags::C));
    assert_eq!(f.bits(), 0x0c);
    assert!(Flags::NONE.is_empty());
    assert_eq!(Flags::ALL.bits(), 0x1f);
}

#[test]
fn regset_iterates_in_order() {
    let s = RegSet::EMPTY.set(5).set(1).set(9);
    assert_eq!(s.count(), 3);
    assert_eq!(s.first(), Some(1));
    assert_eq!(s.iter().collect::<Vec<_>>(), vec![1, 5, 9]);
    assert!(!s.clear(5).contains(5));
}

#[test]
fn block_key_display() {
    assert_eq!(BlockKey::new(3, 0x1000).to_string(), "3:00001000");
    assert_ne!(BlockKey::new(0, 0x1000), BlockKey::new(1, 0x1000));
}

#[test]
fn mapvar_raw_values() {
    assert_eq!(MapVar::from_raw(0), Some(MapVar::Pc));
    assert_eq!(MapVar::from_raw(1), Some(MapVar::Cycles));
    assert_eq!(MapVar::from_raw(2), None);
    assert_eq!(MapVar::Cycles.name(), "cycles");
}
