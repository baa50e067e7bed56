use drc_core::dump::dump_ops;
use drc_core::{Context, Handle, MapVar, Opcode, TempKind, Type};

fn with_globals() -> Context {
    let mut ctx = Context::new();
    ctx.new_global(Type::I32, 0, "r0");
    ctx.new_global(Type::I32, 4, "r1");
    ctx
}

#[test]
fn constants_are_deduplicated_per_type() {
    let mut ctx = with_globals();
    let a = ctx.const_i32(7);
    let b = ctx.const_i32(7);
    let c = ctx.const_i64(7);
    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_eq!(ctx.temp(a).kind, TempKind::Const);
    // values are masked to the type width
    let d = ctx.new_const(Type::I32, 0x1_0000_0007);
    assert_eq!(d, a);
}

#[test]
fn reset_keeps_globals_only() {
    let mut ctx = with_globals();
    let t = ctx.new_temp(Type::I32);
    ctx.gen_movi(Type::I32, t, 1);
    ctx.new_label();
    assert_eq!(ctx.nb_temps(), 3);

    ctx.reset();
    assert_eq!(ctx.nb_temps(), 2);
    assert_eq!(ctx.nb_globals(), 2);
    assert_eq!(ctx.num_ops(), 0);
    assert!(ctx.labels().is_empty());
    assert_eq!(ctx.global_by_name("r1").map(|t| t.0), Some(1));
}

#[test]
fn clear_drops_globals() {
    let mut ctx = with_globals();
    ctx.clear();
    assert_eq!(ctx.nb_globals(), 0);
    assert!(ctx.global_by_name("r0").is_none());
}

#[test]
fn control_ops_carry_their_constants() {
    let mut ctx = with_globals();
    ctx.gen_handle(Handle(5));
    ctx.gen_hash(2, 0x1000);
    ctx.gen_mapvar(MapVar::Cycles, 9);
    ctx.gen_exiti(3);

    let ops = ctx.ops();
    assert_eq!(ops[0].opc, Opcode::Handle);
    assert_eq!(ops[0].carg(0), 5);
    assert_eq!(ops[1].opc, Opcode::Hash);
    assert_eq!((ops[1].carg(0), ops[1].carg(1)), (2, 0x1000));
    assert_eq!(ops[2].opc, Opcode::MapVar);
    assert_eq!(ops[2].carg(1), 9);
    assert_eq!(ops[3].opc, Opcode::Exit);
}

#[test]
fn dump_names_globals_and_labels() {
    let mut ctx = with_globals();
    let r0 = ctx.global_by_name("r0").unwrap();
    let r1 = ctx.global_by_name("r1").unwrap();
    let l = ctx.new_label();
    ctx.gen_insn_start(0x100);
    ctx.gen_add(Type::I32, r0, r0, r1);
    ctx.gen_set_label(l);

    let mut out = Vec::new();
    dump_ops(&ctx, &mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("---- 0x00000100"));
    assert!(text.contains("add_i32"));
    assert!(text.contains("r1"));
    assert!(text.contains("L0:"));
}

#[test]
fn labels_collect_fixups_until_placed() {
    let mut ctx = Context::new();
    let id = ctx.new_label();
    let mut label = ctx.labels()[id as usize].clone();
    assert!(!label.is_placed());
    label.refer(3);
    label.refer(7);
    label.place(12);
    assert!(label.is_placed());
    assert_eq!(label.target, Some(12));
    assert_eq!(label.fixups, vec![3, 7]);
}
