//! Block compiler output, inspected at the IR level.

mod flags;

use drc_backend::{Backend, BackendError, PortableBackend};
use drc_core::{BlockKey, Context, Opcode};
use ppc_exec::{NoTlb, System};
use ppc_frontend::{flags as tables, Capabilities, CompileError, Drc, DrcOptions, Flavor, Hotspot};

use crate::asm::*;
use crate::bus::{TestBus, BRANCH_SELF};

type Sys = System<TestBus, NoTlb>;
type TestDrc = Drc<Sys, PortableBackend<Sys>>;

fn setup(options: DrcOptions) -> (TestDrc, Sys) {
    setup_with_cache(options, 1 << 18)
}

fn setup_with_cache(options: DrcOptions, cache_size: usize) -> (TestDrc, Sys) {
    let _ = env_logger::builder().is_test(true).try_init();
    let drc = Drc::new(
        PortableBackend::new(cache_size),
        Flavor::Ppc604,
        Capabilities::FPU,
        options,
    );
    let mut sys = System::new(TestBus::new(), NoTlb, None);
    tables::init_tables(sys.state_mut());
    (drc, sys)
}

fn count(ctx: &Context, opc: Opcode) -> usize {
    ctx.ops().iter().filter(|op| op.opc == opc).count()
}

#[test]
fn dead_record_update_reads_no_flags() {
    let (mut drc, mut sys) = setup(DrcOptions::DEFAULT);
    sys.bus_mut()
        .load(0x1000, &[add_rc(3, 3, 4), add_rc(5, 5, 6), BRANCH_SELF]);
    drc.compile(&mut sys, 0, 0x1000).unwrap();
    assert_eq!(count(drc.last_unit(), Opcode::GetFlags), 1);
}

#[test]
fn one_hash_entry_per_sequence() {
    let (mut drc, mut sys) = setup(DrcOptions::DEFAULT);
    sys.bus_mut().load(0x1000, &[li(3, 1), li(4, 2), BRANCH_SELF]);
    drc.compile(&mut sys, 0, 0x1000).unwrap();
    assert_eq!(count(drc.last_unit(), Opcode::Hash), 2);
    assert!(drc.backend().hash_exists(BlockKey::new(0, 0x1000)));
    assert!(drc.backend().hash_exists(BlockKey::new(0, 0x1008)));
    assert!(!drc.backend().hash_exists(BlockKey::new(0, 0x1004)));
}

#[test]
fn strict_checksum_reads_every_word() {
    let (mut drc, mut sys) = setup(DrcOptions::DEFAULT);
    sys.bus_mut()
        .load(0x1000, &[li(3, 1), 0x6000_0000, li(4, 2), BRANCH_SELF]);
    drc.compile(&mut sys, 0, 0x1000).unwrap();
    // the nop is skipped, plus one word for the branch sequence
    assert_eq!(count(drc.last_unit(), Opcode::Read), 3);
}

#[test]
fn fast_checksum_reads_first_word_only() {
    let (mut drc, mut sys) = setup(DrcOptions::FAST);
    sys.bus_mut().load(0x1000, &[li(3, 1), li(4, 2), BRANCH_SELF]);
    drc.compile(&mut sys, 0, 0x1000).unwrap();
    assert_eq!(count(drc.last_unit(), Opcode::Read), 2);
}

#[test]
fn read_only_code_is_not_checksummed() {
    let (mut drc, mut sys) = setup(DrcOptions::DEFAULT);
    sys.bus_mut().rom = true;
    sys.bus_mut().load(0x1000, &[li(3, 1), li(4, 2), BRANCH_SELF]);
    drc.compile(&mut sys, 0, 0x1000).unwrap();
    assert_eq!(count(drc.last_unit(), Opcode::Read), 0);
}

#[test]
fn later_sequence_reuses_existing_code() {
    let (mut drc, mut sys) = setup(DrcOptions::DEFAULT);
    // li ; beq +8 ; li ; b .
    sys.bus_mut()
        .load(0x1000, &[li(3, 1), 0x4182_0008, li(4, 2), BRANCH_SELF]);
    drc.compile(&mut sys, 0, 0x100c).unwrap();
    drc.compile(&mut sys, 0, 0x1000).unwrap();
    // 0x100c already had code, so only the head sequence is hashed
    assert_eq!(count(drc.last_unit(), Opcode::Hash), 1);
    assert_eq!(drc.stats().hash_entries, 2);
}

#[test]
fn recompiling_the_head_redefines_the_group() {
    let (mut drc, mut sys) = setup(DrcOptions::DEFAULT);
    sys.bus_mut().load(0x1000, &[li(3, 1), li(4, 2), BRANCH_SELF]);
    drc.compile(&mut sys, 0, 0x1000).unwrap();
    drc.compile(&mut sys, 0, 0x1000).unwrap();
    assert_eq!(count(drc.last_unit(), Opcode::Hash), 2);
    assert_eq!(drc.stats().hash_entries, 2);
}

#[test]
fn hotspot_credit_is_folded_into_cycles() {
    let (mut drc, mut sys) = setup(DrcOptions::DEFAULT);
    assert!(drc.add_hotspot(Hotspot {
        pc: 0x1000,
        opcode: BRANCH_SELF,
        cycles: 50,
    }));
    sys.bus_mut().load(0x1000, &[BRANCH_SELF]);
    drc.compile(&mut sys, 0, 0x1000).unwrap();
    let unit = drc.last_unit();
    let credited = unit.ops().iter().any(|op| {
        op.opc == Opcode::MapVar && op.carg(0) == 1 && op.carg(1) == 51
    });
    assert!(credited);
}

#[test]
fn unimplemented_opcode_exits_at_run_time() {
    let (mut drc, mut sys) = setup(DrcOptions::DEFAULT);
    sys.bus_mut().load(0x1000, &[tdi(4, 3, 0)]);
    drc.compile(&mut sys, 0, 0x1000).unwrap();
    assert_eq!(count(drc.last_unit(), Opcode::Exit), 1);
}

#[test]
fn tables_are_full_after_handler_generation() {
    let (mut drc, _sys) = setup(DrcOptions::DEFAULT);
    let h = drc.handles().unwrap().clone();
    assert!(drc.backend().handle_defined(h.entry));
    assert!(drc.backend().handle_defined(h.nocode));
    assert!(drc.backend().handle_defined(h.interrupt));
    drc.flush();
    assert_eq!(drc.stats().units, 0);
}

/// Cache slots taken by the handler library and by the groups at
/// 0x1000 and 0x2000, each compiled into a fresh cache.
fn measure_units(sys: &mut Sys) -> (usize, usize, usize, usize) {
    let (mut drc, _) = setup(DrcOptions::DEFAULT);
    drc.handles().unwrap();
    let handlers = drc.stats().used;
    let handler_units = drc.stats().units;
    drc.compile(sys, 0, 0x1000).unwrap();
    let first = drc.stats().used - handlers;
    drc.compile(sys, 0, 0x2000).unwrap();
    let second = drc.stats().used - handlers - first;
    (handlers, handler_units, first, second)
}

fn two_groups() -> Sys {
    let mut sys = System::new(TestBus::new(), NoTlb, None);
    tables::init_tables(sys.state_mut());
    sys.bus_mut().load(0x1000, &[li(3, 1), add(3, 3, 3), BRANCH_SELF]);
    sys.bus_mut().load(0x2000, &[li(4, 2), add(4, 4, 4), BRANCH_SELF]);
    sys
}

#[test]
fn full_cache_is_flushed_and_the_group_retried() {
    let mut sys = two_groups();
    let (handlers, handler_units, first, second) = measure_units(&mut sys);

    // Room for the handlers and the first group, one slot short of
    // the second.
    let (mut drc, _) = setup_with_cache(DrcOptions::DEFAULT, handlers + first + second - 1);
    drc.compile(&mut sys, 0, 0x1000).unwrap();
    drc.compile(&mut sys, 0, 0x2000).unwrap();

    let stats = drc.stats();
    assert_eq!(stats.used, handlers + second);
    assert_eq!(stats.units, handler_units + 1);
    assert!(!drc.backend().hash_exists(BlockKey::new(0, 0x1000)));
    assert!(drc.backend().hash_exists(BlockKey::new(0, 0x2000)));
    let h = drc.handles().unwrap().clone();
    assert!(drc.backend().handle_defined(h.entry));
}

#[test]
fn group_larger_than_an_empty_cache_fails_after_retry() {
    let mut sys = two_groups();
    let (handlers, _, first, _) = measure_units(&mut sys);

    let (mut drc, _) = setup_with_cache(DrcOptions::DEFAULT, handlers + first - 1);
    match drc.compile(&mut sys, 0, 0x1000) {
        Err(CompileError::RetryFailed {
            mode,
            pc,
            source: BackendError::CacheFull { needed, remaining },
        }) => {
            assert_eq!((mode, pc), (0, 0x1000));
            assert_eq!(needed, first);
            assert_eq!(remaining, first - 1);
        }
        other => panic!("expected a failed retry, got {other:?}"),
    }
}

#[test]
fn handler_library_that_cannot_fit_fails_after_retry() {
    let (mut drc, mut sys) = setup_with_cache(DrcOptions::DEFAULT, 16);
    sys.bus_mut().load(0x1000, &[BRANCH_SELF]);
    let err = drc.compile(&mut sys, 0, 0x1000).unwrap_err();
    assert!(
        matches!(err, CompileError::RetryFailed { pc: 0x1000, source: BackendError::CacheFull { .. }, .. }),
        "{err:?}"
    );
}
