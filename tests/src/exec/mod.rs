//! Integration tests for the processor and its dispatch loop.

use std::cell::Cell;
use std::rc::Rc;

use ppc_exec::{ExecError, IrqAck, NoTlb, Processor, SymbolSink, Tlb, TranslateFault};
use ppc_frontend::cpu::{cr, dsisr, mode, msr, program, spr, xer, PpcState};
use ppc_frontend::mmu::intention;
use ppc_frontend::{timebase, Capabilities, DrcConfig, Flavor};

use crate::asm::*;
use crate::bus::{TestBus, BRANCH_SELF};

const CODE: u32 = 0x1000;

fn processor_with(bus: TestBus, caps: Capabilities, irq_ack: Option<IrqAck>) -> Processor<TestBus> {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut cpu = Processor::new(Flavor::Ppc604, caps, 1, irq_ack, bus, NoTlb, DrcConfig::DEFAULT);
    // Low vectors, big-endian, real mode.
    let s = cpu.state_mut();
    s.msr = 0;
    s.mode = 0;
    s.pc = CODE;
    cpu
}

/// Processor with data translation on, running from `CODE`.
fn translated<T: Tlb>(flavor: Flavor, caps: Capabilities, bus: TestBus, tlb: T) -> Processor<TestBus, T> {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut cpu = Processor::new(flavor, caps, 1, None, bus, tlb, DrcConfig::DEFAULT);
    let s = cpu.state_mut();
    s.msr = msr::DR;
    s.mode = mode::DT;
    s.pc = CODE;
    cpu
}

fn processor(words: &[u32]) -> Processor<TestBus> {
    let mut bus = TestBus::new();
    bus.load(CODE, words);
    processor_with(bus, Capabilities::FPU, None)
}

#[test]
fn reset_starts_at_the_high_reset_vector() {
    let mut cpu = processor_with(TestBus::new(), Capabilities::FPU, None);
    cpu.reset();
    assert_eq!(cpu.state().pc, 0xfff0_0100);
    assert_eq!(cpu.state().msr, msr::IP);
    assert_eq!(cpu.state().spr[spr::PVR as usize], Flavor::Ppc604.pvr());
}

#[test]
fn straight_line_code_commits_its_cycles() {
    let mut cpu = processor(&[lwz(3, 0, 0x2000), add(3, 3, 3), stw(3, 0, 0x2004), BRANCH_SELF]);
    cpu.system_mut().bus_mut().set_word(0x2000, 21);

    assert_eq!(cpu.execute(1).unwrap(), 3);
    assert_eq!(cpu.state().pc, CODE + 12);
    assert_eq!(cpu.state().r[3], 42);
    assert_eq!(cpu.system().bus().word(0x2004), 42);
}

#[test]
fn budget_spans_loop_iterations() {
    let mut cpu = processor(&[BRANCH_SELF]);
    // Each pass costs one cycle; the pass that goes negative still
    // counts.
    assert_eq!(cpu.execute(10).unwrap(), 11);
    assert_eq!(cpu.state().pc, CODE);
    assert_eq!(cpu.state().cycles_base, 11);
}

#[test]
fn budget_stops_at_sequence_boundaries() {
    let mut cpu = processor(&[b(0x100)]);
    cpu.system_mut().bus_mut().load(CODE + 0x100, &[BRANCH_SELF]);

    assert_eq!(cpu.execute(1).unwrap(), 2);
    assert_eq!(cpu.state().pc, CODE + 0x100);
}

#[test]
fn little_endian_misaligned_load_raises_alignment() {
    let mut bus = TestBus::new();
    bus.load_le(CODE, &[li(4, 5), lhz(3, 0, 0x2001), BRANCH_SELF]);
    bus.load(0x600, &[BRANCH_SELF]);
    let mut cpu = processor_with(bus, Capabilities::FPU, None);
    let s = cpu.state_mut();
    s.msr = msr::LE;
    s.mode = mode::LE;

    // The faulting load is charged along with the one before it.
    assert_eq!(cpu.execute(1).unwrap(), 2);
    let s = cpu.state();
    assert_eq!(s.pc, 0x600);
    assert_eq!(s.r[4], 5);
    assert_eq!(s.spr[spr::SRR0 as usize], CODE + 4);
    assert_eq!(s.spr[spr::SRR1 as usize], msr::LE);
    assert_eq!(s.spr[spr::DAR as usize], 0x2001);
    assert_eq!(s.msr, 0);
    assert_eq!(s.mode, 0);
}

#[test]
fn modified_code_is_retranslated() {
    let mut cpu = processor(&[li(3, 1), BRANCH_SELF]);
    cpu.execute(5).unwrap();
    assert_eq!(cpu.state().r[3], 1);

    cpu.system_mut().bus_mut().set_word(CODE, li(3, 2));
    cpu.state_mut().pc = CODE;
    cpu.execute(5).unwrap();
    assert_eq!(cpu.state().r[3], 2);
}

#[test]
fn read_only_code_needs_an_explicit_invalidate() {
    let mut bus = TestBus::new();
    bus.rom = true;
    bus.load(CODE, &[li(3, 1), BRANCH_SELF]);
    let mut cpu = processor_with(bus, Capabilities::FPU, None);
    cpu.execute(5).unwrap();

    cpu.system_mut().bus_mut().set_word(CODE, li(3, 2));
    cpu.state_mut().pc = CODE;
    cpu.execute(5).unwrap();
    assert_eq!(cpu.state().r[3], 1);

    cpu.invalidate_cache();
    cpu.state_mut().pc = CODE;
    cpu.execute(5).unwrap();
    assert_eq!(cpu.state().r[3], 2);
}

#[test]
fn rerun_after_flush_matches() {
    let program = [lwz(3, 0, 0x2000), add(3, 3, 3), stw(3, 0, 0x2004), BRANCH_SELF];
    let mut cpu = processor(&program);
    cpu.system_mut().bus_mut().set_word(0x2000, 7);
    let first = cpu.execute(1).unwrap();
    assert!(cpu.stats().units > 0);

    cpu.invalidate_cache();
    assert_eq!(cpu.stats().hash_entries, 0);
    cpu.system_mut().bus_mut().set_word(0x2004, 0);
    cpu.state_mut().pc = CODE;
    cpu.state_mut().r[3] = 0;
    let second = cpu.execute(1).unwrap();

    assert_eq!(first, second);
    assert_eq!(cpu.state().r[3], 14);
    assert_eq!(cpu.system().bus().word(0x2004), 14);
}

#[test]
fn hotspot_cycles_are_charged() {
    let mut cpu = processor(&[li(3, 1), BRANCH_SELF]);
    cpu.add_hotspot(CODE + 4, BRANCH_SELF, 100);
    assert_eq!(cpu.execute(10).unwrap(), 102);
}

#[test]
fn hotspot_is_ignored_once_running() {
    let mut cpu = processor(&[BRANCH_SELF]);
    cpu.execute(1).unwrap();
    cpu.add_hotspot(CODE, BRANCH_SELF, 100);
    cpu.invalidate_cache();
    assert_eq!(cpu.execute(1).unwrap(), 2);
}

#[test]
fn unimplemented_opcode_is_reported() {
    let mut cpu = processor(&[tdi(0, 0, 0)]);
    match cpu.execute(10) {
        Err(ExecError::Unimplemented { pc, opcode }) => {
            assert_eq!(pc, CODE);
            assert_eq!(opcode, tdi(0, 0, 0));
        }
        other => panic!("expected unimplemented, got {other:?}"),
    }
}

#[test]
fn unmapped_code_is_reported() {
    let mut cpu = processor(&[]);
    cpu.state_mut().pc = 0x2_0000;
    match cpu.execute(10) {
        Err(ExecError::UnmappedCode { pc }) => assert_eq!(pc, 0x2_0000),
        other => panic!("expected unmapped code, got {other:?}"),
    }
}

#[test]
fn compares_set_the_condition_field() {
    let cases: &[(u32, u32, u32, u32)] = &[
        (1, 2, cr::LT, cr::LT),
        (2, 1, cr::GT, cr::GT),
        (5, 5, cr::EQ, cr::EQ),
        (0xffff_ffff, 1, cr::LT, cr::GT),
        (0x8000_0000, 0x7fff_ffff, cr::LT, cr::GT),
    ];
    for &(a, bv, signed, unsigned) in cases {
        let mut cpu = processor(&[cmpw(1, 3, 4), cmplw(2, 3, 4), BRANCH_SELF]);
        cpu.state_mut().r[3] = a;
        cpu.state_mut().r[4] = bv;
        cpu.execute(1).unwrap();
        assert_eq!(cpu.state().cr[1], signed, "cmpw {a:#x}, {bv:#x}");
        assert_eq!(cpu.state().cr[2], unsigned, "cmplw {a:#x}, {bv:#x}");
    }
}

#[test]
fn summary_overflow_is_copied_into_compares() {
    let mut cpu = processor(&[cmpw(0, 3, 4), BRANCH_SELF]);
    cpu.state_mut().xer = xer::SO;
    cpu.state_mut().r[3] = 3;
    cpu.state_mut().r[4] = 3;
    cpu.execute(1).unwrap();
    assert_eq!(cpu.state().cr[0], cr::EQ | cr::SO);
}

#[test]
fn subfc_sets_carry_when_no_borrow() {
    let mut cpu = processor(&[subfc(5, 3, 4), BRANCH_SELF]);
    cpu.state_mut().r[3] = 1;
    cpu.state_mut().r[4] = 2;
    cpu.execute(1).unwrap();
    assert_eq!(cpu.state().r[5], 1);
    assert_ne!(cpu.state().xer & xer::CA, 0);

    let mut cpu = processor(&[subfc(5, 3, 4), BRANCH_SELF]);
    cpu.state_mut().r[3] = 2;
    cpu.state_mut().r[4] = 1;
    cpu.execute(1).unwrap();
    assert_eq!(cpu.state().r[5], 0xffff_ffff);
    assert_eq!(cpu.state().xer & xer::CA, 0);
}

#[test]
fn record_form_add_updates_cr0() {
    let mut cpu = processor(&[add_rc(5, 3, 4), BRANCH_SELF]);
    cpu.state_mut().r[3] = 0xffff_fffe;
    cpu.state_mut().r[4] = 1;
    cpu.execute(1).unwrap();
    assert_eq!(cpu.state().r[5], 0xffff_ffff);
    assert_eq!(cpu.state().cr[0], cr::LT);
}

#[test]
fn spr_moves_round_trip() {
    let mut cpu = processor(&[li(3, 0x123), mtspr(spr::SPRG0, 3), mfspr(4, spr::SPRG0), BRANCH_SELF]);
    cpu.execute(1).unwrap();
    assert_eq!(cpu.state().spr[spr::SPRG0 as usize], 0x123);
    assert_eq!(cpu.state().r[4], 0x123);
}

#[test]
fn external_interrupt_is_taken_when_enabled() {
    let acks = Rc::new(Cell::new(0u32));
    let seen = Rc::clone(&acks);
    let ack: IrqAck = Box::new(move || seen.set(seen.get() + 1));

    let mut bus = TestBus::new();
    bus.load(CODE, &[BRANCH_SELF]);
    bus.load(0x500, &[BRANCH_SELF]);
    let mut cpu = processor_with(bus, Capabilities::FPU, Some(ack));

    // Masked: the line is ignored.
    cpu.set_irq_line(true);
    cpu.execute(3).unwrap();
    assert_eq!(cpu.state().pc, CODE);
    assert_eq!(acks.get(), 0);

    cpu.state_mut().msr = msr::EE;
    cpu.execute(3).unwrap();
    let s = cpu.state();
    assert_eq!(s.pc, 0x500);
    assert_eq!(s.spr[spr::SRR0 as usize], CODE);
    assert_eq!(s.spr[spr::SRR1 as usize], msr::EE);
    assert_eq!(s.msr & msr::EE, 0);
    assert_eq!(acks.get(), 1);
}

#[test]
fn decrementer_interrupt_fires_on_schedule() {
    let mut bus = TestBus::new();
    bus.load(CODE, &[BRANCH_SELF]);
    bus.load(0x900, &[BRANCH_SELF]);
    let caps = Capabilities::FPU | Capabilities::TIMEBASE | Capabilities::DECREMENTER;
    let mut cpu = processor_with(bus, caps, None);
    let s = cpu.state_mut();
    s.msr = msr::EE;
    let now = s.cycles_base;
    timebase::write_decrementer(s, now, 10);

    let used = cpu.execute(100).unwrap();
    assert!(used >= 100);
    let s = cpu.state();
    assert_eq!(s.pc, 0x900);
    assert_eq!(s.spr[spr::SRR0 as usize], CODE);
    assert_eq!(s.irq_pending, 0);
    assert_eq!(s.msr & msr::EE, 0);
}

#[test]
fn fast_ram_bypasses_the_bus() {
    let mut cpu = processor(&[lwz(3, 0, 0x2000), add(3, 3, 3), stw(3, 0, 0x2004), BRANCH_SELF]);
    cpu.system_mut().bus_mut().set_word(0x2000, 99);
    let mut ram = vec![0u8; 0x1000];
    ram[0..4].copy_from_slice(&7u32.to_be_bytes());
    // SAFETY: `ram` outlives every `execute` below.
    unsafe { cpu.add_fastram(0x2000, 0x2fff, false, ram.as_mut_ptr()) };

    cpu.execute(1).unwrap();
    assert_eq!(cpu.state().r[3], 14);
    assert_eq!(&ram[4..8], &14u32.to_be_bytes());
    assert_eq!(cpu.system().bus().word(0x2004), 0);
}

#[derive(Default)]
struct Names(Vec<(String, usize)>);

impl SymbolSink for Names {
    fn symbol(&mut self, name: &str, offset: usize, _size: usize) {
        self.0.push((name.to_string(), offset));
    }
}

#[test]
fn symbols_cover_registers_and_sprs() {
    let cpu = processor(&[]);
    let mut names = Names::default();
    cpu.register_symbols(&mut names);
    for wanted in ["r0", "r31", "f31", "cr7", "srr0", "dec_next_fire", "pc", "msr"] {
        assert!(names.0.iter().any(|(n, _)| n == wanted), "missing {wanted}");
    }
    let mut offsets: Vec<_> = names.0.iter().map(|e| e.1).collect();
    offsets.sort_unstable();
    offsets.dedup();
    assert_eq!(offsets.len(), names.0.len());
}

/// Identity translation except for addresses from `from` up, which
/// fault with `fault`.
struct FaultingTlb {
    from: u32,
    fault: TranslateFault,
    /// Faults left to report before the page counts as loaded;
    /// `None` faults forever.
    remaining: Option<u32>,
    seen: Vec<(u32, u32)>,
}

impl FaultingTlb {
    fn new(from: u32, fault: TranslateFault) -> Self {
        Self {
            from,
            fault,
            remaining: None,
            seen: Vec::new(),
        }
    }
}

impl Tlb for FaultingTlb {
    fn translate(&mut self, _state: &PpcState, intention: u32, addr: u32) -> Result<u32, TranslateFault> {
        self.seen.push((intention, addr));
        if addr < self.from {
            return Ok(addr);
        }
        match self.remaining.as_mut() {
            Some(0) => Ok(addr),
            Some(n) => {
                *n -= 1;
                Err(self.fault)
            }
            None => Err(self.fault),
        }
    }
}

#[test]
fn data_miss_recovers_the_faulting_instruction() {
    let mut bus = TestBus::new();
    bus.load(CODE, &[li(4, 5), li(5, 6), lwz(3, 0, 0x3000), BRANCH_SELF]);
    bus.load(0x300, &[BRANCH_SELF]);
    let tlb = FaultingTlb::new(0x3000, TranslateFault::NotFound);
    let mut cpu = translated(Flavor::Ppc604, Capabilities::FPU | Capabilities::MMU_PAGED, bus, tlb);
    cpu.add_hotspot(0x300, BRANCH_SELF, 9);

    // Three cycles up to the load, then ten per pass of the handler
    // loop: 97 -> -3.
    assert_eq!(cpu.execute(100).unwrap(), 103);
    let s = cpu.state();
    assert_eq!(s.pc, 0x300);
    assert_eq!(s.r[4], 5);
    assert_eq!(s.r[5], 6);
    assert_eq!(s.r[3], 0);
    assert_eq!(s.spr[spr::SRR0 as usize], CODE + 8);
    assert_eq!(s.spr[spr::SRR1 as usize], msr::DR);
    assert_eq!(s.spr[spr::DAR as usize], 0x3000);
    assert_eq!(s.spr[spr::DSISR as usize], dsisr::NOT_FOUND);
    assert_eq!(s.msr, 0);
    assert_eq!(s.mode, 0);
    assert!(cpu.system_mut().tlb_mut().seen.contains(&(intention::READ, 0x3000)));
}

#[test]
fn protected_store_reports_protection_in_dsisr() {
    let mut bus = TestBus::new();
    bus.load(CODE, &[li(3, 7), stw(3, 0, 0x3004), BRANCH_SELF]);
    bus.load(0x300, &[BRANCH_SELF]);
    let tlb = FaultingTlb::new(0x3000, TranslateFault::Protected);
    let mut cpu = translated(Flavor::Ppc604, Capabilities::FPU | Capabilities::MMU_PAGED, bus, tlb);

    cpu.execute(10).unwrap();
    let s = cpu.state();
    assert_eq!(s.pc, 0x300);
    assert_eq!(s.spr[spr::SRR0 as usize], CODE + 4);
    assert_eq!(s.spr[spr::DAR as usize], 0x3004);
    assert_eq!(s.spr[spr::DSISR as usize], dsisr::PROTECTED | dsisr::STORE);
    assert_eq!(cpu.system().bus().word(0x3004), 0);
    assert!(cpu.system_mut().tlb_mut().seen.contains(&(intention::WRITE, 0x3004)));
}

#[test]
fn tlb_miss_swaps_shadow_registers_until_rfi() {
    let mut bus = TestBus::new();
    bus.load(CODE, &[li(4, 5), lwz(6, 0, 0x3000), BRANCH_SELF]);
    bus.set_word(0x3000, 0xcafe);
    // The miss handler writes r0 while the shadow set is active.
    bus.load(0x1100, &[li(0, 99), RFI]);
    let mut tlb = FaultingTlb::new(0x3000, TranslateFault::NotFound);
    tlb.remaining = Some(1);
    let caps = Capabilities::FPU | Capabilities::MMU_PAGED | Capabilities::MMU_SOFT_TLB;
    let mut cpu = translated(Flavor::Ppc603, caps, bus, tlb);
    let s = cpu.state_mut();
    s.r[..4].copy_from_slice(&[10, 11, 12, 13]);
    s.tgpr = [20, 21, 22, 23];

    cpu.execute(50).unwrap();
    let s = cpu.state();
    assert_eq!(s.pc, CODE + 8);
    assert_eq!(s.r[6], 0xcafe);
    assert_eq!(s.r[4], 5);
    assert_eq!(&s.r[..4], &[10, 11, 12, 13]);
    assert_eq!(s.tgpr, [99, 21, 22, 23]);
    assert_eq!(s.spr[spr::DMISS as usize], 0x3000);
    assert_eq!(s.spr[spr::SRR0 as usize], CODE + 4);
    assert_eq!(s.spr[spr::SRR1 as usize], msr::DR);
    assert_eq!(s.msr, msr::DR);
    assert_eq!(s.mode, mode::DT);
}

#[test]
fn unaligned_big_endian_accesses_are_split() {
    let mut cpu = processor(&[lwz(3, 0, 0x2002), stw(4, 0, 0x2101), BRANCH_SELF]);
    let bus = cpu.system_mut().bus_mut();
    bus.set_word(0x2000, 0x1122_3344);
    bus.set_word(0x2004, 0x5566_7788);
    cpu.state_mut().r[4] = 0xaabb_ccdd;

    cpu.execute(1).unwrap();
    assert_eq!(cpu.state().r[3], 0x3344_5566);
    assert_eq!(cpu.system().bus().word(0x2100), 0x00aa_bbcc);
    assert_eq!(cpu.system().bus().word(0x2104), 0xdd00_0000);
}

#[test]
fn immediate_string_moves_handle_a_partial_tail() {
    // Seven bytes starting at r31 wrap around into r0.
    let mut cpu = processor(&[lswi(31, 10, 7), stswi(31, 11, 7), BRANCH_SELF]);
    let bus = cpu.system_mut().bus_mut();
    bus.set_word(0x2000, 0x1122_3344);
    bus.set_word(0x2004, 0x5566_7788);
    bus.set_word(0x2100, 0xffff_ffff);
    bus.set_word(0x2104, 0xffff_ffff);
    cpu.state_mut().r[10] = 0x2000;
    cpu.state_mut().r[11] = 0x2100;

    cpu.execute(1).unwrap();
    assert_eq!(cpu.state().r[31], 0x1122_3344);
    assert_eq!(cpu.state().r[0], 0x5566_7700);
    assert_eq!(cpu.system().bus().word(0x2100), 0x1122_3344);
    assert_eq!(cpu.system().bus().word(0x2104), 0x5566_77ff);
}

#[test]
fn indexed_string_moves_take_the_count_from_xer() {
    let mut cpu = processor(&[lswx(5, 10, 12), stswx(5, 11, 12), BRANCH_SELF]);
    let bus = cpu.system_mut().bus_mut();
    bus.set_word(0x2000, 0x1122_3344);
    bus.set_word(0x2004, 0x5566_7788);
    bus.set_word(0x2100, 0xffff_ffff);
    bus.set_word(0x2104, 0xffff_ffff);
    let s = cpu.state_mut();
    s.r[10] = 0x2000;
    s.r[11] = 0x2100;
    s.r[12] = 0;
    s.r[7] = 0x7777;
    s.xer = 6;

    cpu.execute(1).unwrap();
    let s = cpu.state();
    assert_eq!(s.r[5], 0x1122_3344);
    assert_eq!(s.r[6], 0x5566_0000);
    assert_eq!(s.r[7], 0x7777);
    assert_eq!(cpu.system().bus().word(0x2100), 0x1122_3344);
    assert_eq!(cpu.system().bus().word(0x2104), 0x5566_ffff);
}

#[test]
fn store_conditional_needs_the_reservation() {
    let mut cpu = processor(&[lwarx(3, 0, 10), stwcx(4, 0, 10), mfcr(7), stwcx(5, 0, 10), BRANCH_SELF]);
    cpu.system_mut().bus_mut().set_word(0x2000, 0x1122_3344);
    let s = cpu.state_mut();
    s.r[10] = 0x2000;
    s.r[4] = 0x1234;
    s.r[5] = 0x5678;

    cpu.execute(1).unwrap();
    let s = cpu.state();
    assert_eq!(s.r[3], 0x1122_3344);
    // The first store succeeds and uses up the reservation.
    assert_eq!(s.r[7] >> 28, cr::EQ);
    assert_eq!(s.cr[0], 0);
    assert_eq!(s.reserve, 0);
    assert_eq!(cpu.system().bus().word(0x2000), 0x1234);
}

#[test]
fn bdnz_runs_the_loop_ctr_times() {
    let mut cpu = processor(&[li(3, 0), li(4, 5), mtspr(spr::CTR, 4), addi(3, 3, 1), bdnz(-4), BRANCH_SELF]);
    cpu.execute(100).unwrap();
    let s = cpu.state();
    assert_eq!(s.r[3], 5);
    assert_eq!(s.ctr, 0);
    assert_eq!(s.pc, CODE + 20);
}

#[test]
fn trap_conditions_compare_signed_and_unsigned() {
    let mut bus = TestBus::new();
    bus.load(
        CODE,
        &[
            li(3, 7),
            li(4, -1),
            // 7 == 8 and 7 < -1 do not hold; 7 <u 0xffffffff does.
            twi(0x04, 3, 8),
            tw(0x10, 3, 4),
            tw(0x02, 3, 4),
            BRANCH_SELF,
        ],
    );
    bus.load(0x700, &[BRANCH_SELF]);
    let mut cpu = processor_with(bus, Capabilities::FPU, None);

    cpu.execute(10).unwrap();
    let s = cpu.state();
    assert_eq!(s.pc, 0x700);
    assert_eq!(s.spr[spr::SRR0 as usize], CODE + 16);
    assert_eq!(s.spr[spr::SRR1 as usize], program::TRAP);
}

#[test]
fn fadd_uses_the_fprs() {
    let mut cpu = processor(&[fadd(3, 1, 2), BRANCH_SELF]);
    let s = cpu.state_mut();
    s.msr = msr::FP;
    s.f[1] = 1.5f64.to_bits();
    s.f[2] = 2.25f64.to_bits();

    cpu.execute(1).unwrap();
    assert_eq!(f64::from_bits(cpu.state().f[3]), 3.75);
    assert_eq!(cpu.state().pc, CODE + 4);
}

#[test]
fn fpu_disabled_raises_fp_unavailable() {
    let mut bus = TestBus::new();
    bus.load(CODE, &[li(3, 1), fadd(3, 1, 2), BRANCH_SELF]);
    bus.load(0x800, &[BRANCH_SELF]);
    let mut cpu = processor_with(bus, Capabilities::FPU, None);
    cpu.state_mut().f[1] = 1.0f64.to_bits();

    cpu.execute(10).unwrap();
    let s = cpu.state();
    assert_eq!(s.pc, 0x800);
    assert_eq!(s.r[3], 1);
    assert_eq!(s.f[3], 0);
    assert_eq!(s.spr[spr::SRR0 as usize], CODE + 4);
}

#[test]
fn fp_record_form_copies_the_fpscr_summary_into_cr1() {
    let mut cpu = processor(&[fadd_rc(3, 1, 2), BRANCH_SELF]);
    let s = cpu.state_mut();
    s.msr = msr::FP;
    // FX and VX set, FEX and OX clear.
    s.fpscr = 0xa000_0000;
    s.f[1] = 1.0f64.to_bits();
    s.f[2] = 1.0f64.to_bits();

    cpu.execute(1).unwrap();
    let s = cpu.state();
    assert_eq!(f64::from_bits(s.f[3]), 2.0);
    assert_eq!(s.cr[1], 0xa);
    assert_eq!(s.fpscr, 0xa000_0000);
}
