use drc_core::{OpFlags, Opcode, Type, MAX_OP_ARGS, OPCODE_DEFS};

#[test]
fn every_opcode_fits_an_op() {
    for def in OPCODE_DEFS.iter() {
        assert!(
            def.nb_args() as usize <= MAX_OP_ARGS,
            "{} takes {} args",
            def.name,
            def.nb_args()
        );
    }
}

#[test]
fn table_is_indexed_by_opcode() {
    assert_eq!(Opcode::Mov.def().name, "mov");
    assert_eq!(Opcode::Add.def().name, "add");
    assert_eq!(Opcode::Br.def().name, "br");
    assert_eq!(Opcode::HashJmp.def().name, "hashjmp");
    assert_eq!(Opcode::Exit.def().name, "exit");
}

#[test]
fn flag_producers_and_consumers() {
    assert!(Opcode::Add.sets_flags());
    assert!(Opcode::AddC.def().flags.contains(OpFlags::CARRY_IN));
    assert!(!Opcode::MulSH.sets_flags());
    assert!(Opcode::GetFlags.def().flags.contains(OpFlags::READS_FLAGS));
}

#[test]
fn control_flow_properties() {
    let br = Opcode::Br.def().flags;
    assert!(br.contains(OpFlags::BB_END));
    assert!(!br.contains(OpFlags::COND_BRANCH));
    assert!(Opcode::BrCond.def().flags.contains(OpFlags::COND_BRANCH));
    for opc in [Opcode::Exit, Opcode::HashJmp] {
        assert!(opc.def().flags.contains(OpFlags::BB_EXIT));
    }
    assert!(Opcode::Handle.def().flags.contains(OpFlags::NOT_PRESENT));
    assert!(Opcode::Call.def().flags.contains(OpFlags::CALL_CLOBBER));
    assert!(Opcode::St.def().flags.contains(OpFlags::SIDE_EFFECTS));
}

#[test]
fn operand_types() {
    assert!(Opcode::Add.is_int_polymorphic());
    assert_eq!(Opcode::Add.fixed_type(), None);
    assert!(Opcode::FAdd.is_float());
    assert!(!Opcode::FAdd.is_int_polymorphic());
    assert_eq!(Opcode::FAdd.fixed_type(), Some(Type::I64));
    assert_eq!(Opcode::ExtrlI64I32.fixed_type(), Some(Type::I32));
    assert_eq!(Opcode::ExtUI32I64.fixed_type(), Some(Type::I64));
}
