//! PowerPC architectural state.
//!
//! Layout is `#[repr(C)]`: compiled code addresses every field as a
//! byte offset from the state pointer, so the offsets below are the
//! contract between the translator, the handlers and the host.

use std::mem::offset_of;

pub const NUM_GPRS: usize = 32;
pub const NUM_FPRS: usize = 32;
pub const NUM_CR_FIELDS: usize = 8;
pub const NUM_SPRS: usize = 1024;
pub const NUM_SRS: usize = 16;

/// PowerPC architectural state plus the run-time bookkeeping that
/// generated code reads and writes.
#[repr(C)]
pub struct PpcState {
    pub r: [u32; NUM_GPRS],
    /// Floating registers as IEEE-754 double bit patterns.
    pub f: [u64; NUM_FPRS],
    /// One nibble per field: LT, GT, EQ, SO from bit 3 down.
    pub cr: [u32; NUM_CR_FIELDS],
    pub xer: u32,
    pub lr: u32,
    pub ctr: u32,
    pub msr: u32,
    pub pc: u32,
    /// Operating mode derived from the MSR; see [`mode`].
    pub mode: u32,
    pub fpscr: u32,
    /// Cycles left in the current slice; negative once overrun.
    pub icount: i32,
    /// Pending interrupt lines, see [`irq`].
    pub irq_pending: u32,
    /// Set by `lwarx`, cleared by `stwcx.`.
    pub reserve: u32,
    pub reserve_addr: u32,
    /// Raw opcode word of the last instruction reported as
    /// unimplemented.
    pub fault_opcode: u32,
    pub sr: [u32; NUM_SRS],
    /// Shadow r0-r3 of 603-class cores.
    pub tgpr: [u32; 4],
    pub spr: [u32; NUM_SPRS],

    // -- Timebase / decrementer bookkeeping --
    /// Total cycles executed before the current slice.
    pub cycles_base: u64,
    /// Budget the current slice started with.
    pub slice_budget: i32,
    /// Cycles per timebase tick.
    pub tb_divisor: u32,
    /// Cycle count at which the timebase read zero.
    pub tb_zero_cycles: u64,
    /// Cycle count at which the decrementer reads zero.
    pub dec_zero_cycles: u64,
    /// Cycle count of the next decrementer interrupt.
    pub dec_next_fire: u64,

    // -- Flag lookup tables, indexed by host flags --
    pub cmp_cr: [u32; 32],
    pub cmpl_cr: [u32; 32],
    pub sz_cr: [u32; 32],
    pub fcmp_cr: [u32; 32],
    pub ov_xer: [u32; 32],
}

// ── Field offsets ────────────────────────────────────────────────

pub const fn r_offset(n: usize) -> i64 {
    (offset_of!(PpcState, r) + n * 4) as i64
}

pub const fn f_offset(n: usize) -> i64 {
    (offset_of!(PpcState, f) + n * 8) as i64
}

pub const fn cr_offset(n: usize) -> i64 {
    (offset_of!(PpcState, cr) + n * 4) as i64
}

pub const fn spr_offset(n: usize) -> i64 {
    (offset_of!(PpcState, spr) + n * 4) as i64
}

pub const fn sr_offset(n: usize) -> i64 {
    (offset_of!(PpcState, sr) + n * 4) as i64
}

pub const fn tgpr_offset(n: usize) -> i64 {
    (offset_of!(PpcState, tgpr) + n * 4) as i64
}

pub const XER_OFFSET: i64 = offset_of!(PpcState, xer) as i64;
pub const LR_OFFSET: i64 = offset_of!(PpcState, lr) as i64;
pub const CTR_OFFSET: i64 = offset_of!(PpcState, ctr) as i64;
pub const MSR_OFFSET: i64 = offset_of!(PpcState, msr) as i64;
pub const PC_OFFSET: i64 = offset_of!(PpcState, pc) as i64;
pub const MODE_OFFSET: i64 = offset_of!(PpcState, mode) as i64;
pub const FPSCR_OFFSET: i64 = offset_of!(PpcState, fpscr) as i64;
pub const ICOUNT_OFFSET: i64 = offset_of!(PpcState, icount) as i64;
pub const IRQ_PENDING_OFFSET: i64 = offset_of!(PpcState, irq_pending) as i64;
pub const RESERVE_OFFSET: i64 = offset_of!(PpcState, reserve) as i64;
pub const RESERVE_ADDR_OFFSET: i64 = offset_of!(PpcState, reserve_addr) as i64;
pub const FAULT_OPCODE_OFFSET: i64 = offset_of!(PpcState, fault_opcode) as i64;
pub const CMP_CR_OFFSET: i64 = offset_of!(PpcState, cmp_cr) as i64;
pub const CMPL_CR_OFFSET: i64 = offset_of!(PpcState, cmpl_cr) as i64;
pub const SZ_CR_OFFSET: i64 = offset_of!(PpcState, sz_cr) as i64;
pub const FCMP_CR_OFFSET: i64 = offset_of!(PpcState, fcmp_cr) as i64;
pub const OV_XER_OFFSET: i64 = offset_of!(PpcState, ov_xer) as i64;

// ── Register bits ────────────────────────────────────────────────

/// Condition register field bits.
pub mod cr {
    pub const LT: u32 = 8;
    pub const GT: u32 = 4;
    pub const EQ: u32 = 2;
    pub const SO: u32 = 1;
}

/// Fixed-point exception register bits.
pub mod xer {
    pub const SO: u32 = 0x8000_0000;
    pub const OV: u32 = 0x4000_0000;
    pub const CA: u32 = 0x2000_0000;
    /// Bit number of CA counted from the LSB.
    pub const CA_BIT: u32 = 29;
    /// String instruction byte count.
    pub const COUNT_MASK: u32 = 0x7f;
}

/// Machine state register bits.
pub mod msr {
    pub const POW: u32 = 0x0004_0000;
    /// 603: r0-r3 are replaced by the shadow set.
    pub const TGPR: u32 = 0x0002_0000;
    pub const ILE: u32 = 0x0001_0000;
    pub const EE: u32 = 0x0000_8000;
    pub const PR: u32 = 0x0000_4000;
    pub const FP: u32 = 0x0000_2000;
    pub const ME: u32 = 0x0000_1000;
    pub const FE0: u32 = 0x0000_0800;
    pub const SE: u32 = 0x0000_0400;
    pub const BE: u32 = 0x0000_0200;
    pub const FE1: u32 = 0x0000_0100;
    pub const IP: u32 = 0x0000_0040;
    pub const IR: u32 = 0x0000_0020;
    pub const DR: u32 = 0x0000_0010;
    pub const RI: u32 = 0x0000_0002;
    pub const LE: u32 = 0x0000_0001;

    /// Bits of the MSR copied into SRR1 on an exception.
    pub const SRR1_MASK: u32 = 0x87c0_ffff;
}

/// Operating-mode bits; the low three select an accessor family.
pub mod mode {
    pub const LE: u32 = 1;
    /// Data translation enabled.
    pub const DT: u32 = 2;
    pub const USER: u32 = 4;
    /// Instruction translation enabled.
    pub const IT: u32 = 8;
    pub const ACCESSOR_MASK: u32 = 7;
    pub const COUNT: usize = 16;
}

/// Interrupt lines tracked in `irq_pending`.
pub mod irq {
    pub const EXTERNAL: u32 = 1;
    pub const DECREMENTER: u32 = 2;
}

/// Extra SRR1 bits for program exceptions.
pub mod program {
    pub const FP: u32 = 0x0010_0000;
    pub const ILLEGAL: u32 = 0x0008_0000;
    pub const PRIVILEGED: u32 = 0x0004_0000;
    pub const TRAP: u32 = 0x0002_0000;
}

/// DSISR bits.
pub mod dsisr {
    pub const NOT_FOUND: u32 = 0x4000_0000;
    pub const PROTECTED: u32 = 0x0800_0000;
    pub const STORE: u32 = 0x0200_0000;
}

/// Special-purpose register numbers.
pub mod spr {
    pub const XER: u32 = 1;
    pub const LR: u32 = 8;
    pub const CTR: u32 = 9;
    pub const DSISR: u32 = 18;
    pub const DAR: u32 = 19;
    pub const DEC: u32 = 22;
    pub const SDR1: u32 = 25;
    pub const SRR0: u32 = 26;
    pub const SRR1: u32 = 27;
    pub const TBL_R: u32 = 268;
    pub const TBU_R: u32 = 269;
    pub const SPRG0: u32 = 272;
    pub const SPRG3: u32 = 275;
    pub const EAR: u32 = 282;
    pub const TBL_W: u32 = 284;
    pub const TBU_W: u32 = 285;
    pub const PVR: u32 = 287;
    pub const IBAT0U: u32 = 528;
    pub const DBAT3L: u32 = 543;
    pub const DMISS: u32 = 976;
    pub const DCMP: u32 = 977;
    pub const HASH1: u32 = 978;
    pub const HASH2: u32 = 979;
    pub const IMISS: u32 = 980;
    pub const ICMP: u32 = 981;
    pub const RPA: u32 = 982;
    pub const HID0: u32 = 1008;
    pub const HID1: u32 = 1009;
    pub const IABR: u32 = 1010;
    pub const DABR: u32 = 1013;

    pub const fn is_bat(n: u32) -> bool {
        n >= IBAT0U && n <= DBAT3L
    }
}

// ── Exceptions ───────────────────────────────────────────────────

/// Guest exception classes, one static handler each.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Exception {
    Reset,
    MachineCheck,
    Dsi,
    Isi,
    Interrupt,
    Alignment,
    Program,
    FpUnavailable,
    Decrementer,
    Syscall,
    Trace,
    FpAssist,
    /// 603 instruction TLB miss.
    ItlbMiss,
    /// 603 data TLB miss on a load.
    DtlbMissLoad,
    /// 603 data TLB miss on a store.
    DtlbMissStore,
}

impl Exception {
    pub const ALL: [Exception; 15] = [
        Exception::Reset,
        Exception::MachineCheck,
        Exception::Dsi,
        Exception::Isi,
        Exception::Interrupt,
        Exception::Alignment,
        Exception::Program,
        Exception::FpUnavailable,
        Exception::Decrementer,
        Exception::Syscall,
        Exception::Trace,
        Exception::FpAssist,
        Exception::ItlbMiss,
        Exception::DtlbMissLoad,
        Exception::DtlbMissStore,
    ];

    /// Vector offset from the exception base.
    pub const fn vector(self) -> u32 {
        match self {
            Exception::Reset => 0x0100,
            Exception::MachineCheck => 0x0200,
            Exception::Dsi => 0x0300,
            Exception::Isi => 0x0400,
            Exception::Interrupt => 0x0500,
            Exception::Alignment => 0x0600,
            Exception::Program => 0x0700,
            Exception::FpUnavailable => 0x0800,
            Exception::Decrementer => 0x0900,
            Exception::Syscall => 0x0c00,
            Exception::Trace => 0x0d00,
            Exception::FpAssist => 0x0e00,
            Exception::ItlbMiss => 0x1000,
            Exception::DtlbMissLoad => 0x1100,
            Exception::DtlbMissStore => 0x1200,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Exception::Reset => "reset",
            Exception::MachineCheck => "machine_check",
            Exception::Dsi => "dsi",
            Exception::Isi => "isi",
            Exception::Interrupt => "interrupt",
            Exception::Alignment => "alignment",
            Exception::Program => "program",
            Exception::FpUnavailable => "fpu_unavailable",
            Exception::Decrementer => "decrementer",
            Exception::Syscall => "syscall",
            Exception::Trace => "trace",
            Exception::FpAssist => "fp_assist",
            Exception::ItlbMiss => "itlb_miss",
            Exception::DtlbMissLoad => "dtlb_miss_load",
            Exception::DtlbMissStore => "dtlb_miss_store",
        }
    }

    pub const fn is_tlb_miss(self) -> bool {
        matches!(
            self,
            Exception::ItlbMiss
                | Exception::DtlbMissLoad
                | Exception::DtlbMissStore
        )
    }
}

/// Exception base when MSR[IP] is set.
pub const HIGH_VECTOR_BASE: u32 = 0xfff0_0000;
/// PC after reset.
pub const RESET_PC: u32 = HIGH_VECTOR_BASE | 0x0100;

/// Mode derived from an MSR value; `mask` drops bits the MMU
/// strategy does not honour.
pub const fn compute_mode(msr_val: u32, mask: u32) -> u32 {
    let m = (msr_val & msr::LE)
        | ((msr_val & msr::DR) >> 3)
        | ((msr_val & msr::PR) >> 12)
        | ((msr_val & msr::IR) >> 2);
    m & mask
}

impl PpcState {
    pub fn new() -> Self {
        Self {
            r: [0; NUM_GPRS],
            f: [0; NUM_FPRS],
            cr: [0; NUM_CR_FIELDS],
            xer: 0,
            lr: 0,
            ctr: 0,
            msr: 0,
            pc: 0,
            mode: 0,
            fpscr: 0,
            icount: 0,
            irq_pending: 0,
            reserve: 0,
            reserve_addr: 0,
            fault_opcode: 0,
            sr: [0; NUM_SRS],
            tgpr: [0; 4],
            spr: [0; NUM_SPRS],
            cycles_base: 0,
            slice_budget: 0,
            tb_divisor: 1,
            tb_zero_cycles: 0,
            dec_zero_cycles: 0,
            dec_next_fire: u64::MAX,
            cmp_cr: [0; 32],
            cmpl_cr: [0; 32],
            sz_cr: [0; 32],
            fcmp_cr: [0; 32],
            ov_xer: [0; 32],
        }
    }

    /// Restore power-on register values. Flag tables, the timebase
    /// divisor and the cycle bookkeeping survive.
    pub fn reset(&mut self, pvr: u32, mode_mask: u32) {
        self.r = [0; NUM_GPRS];
        self.f = [0; NUM_FPRS];
        self.cr = [0; NUM_CR_FIELDS];
        self.xer = 0;
        self.lr = 0;
        self.ctr = 0;
        self.fpscr = 0;
        self.irq_pending = 0;
        self.reserve = 0;
        self.fault_opcode = 0;
        self.sr = [0; NUM_SRS];
        self.tgpr = [0; 4];
        self.spr = [0; NUM_SPRS];
        self.spr[spr::PVR as usize] = pvr;
        self.msr = msr::IP;
        self.mode = compute_mode(self.msr, mode_mask);
        self.pc = RESET_PC;
        self.dec_next_fire = u64::MAX;
    }

    /// The condition register as one 32-bit word.
    pub fn cr_word(&self) -> u32 {
        self.cr
            .iter()
            .fold(0, |acc, &field| (acc << 4) | (field & 0xf))
    }

    pub fn set_cr_word(&mut self, val: u32) {
        for (n, field) in self.cr.iter_mut().enumerate() {
            *field = (val >> (28 - 4 * n)) & 0xf;
        }
    }

    pub fn fpr(&self, n: usize) -> f64 {
        f64::from_bits(self.f[n])
    }

    pub fn set_fpr(&mut self, n: usize, v: f64) {
        self.f[n] = v.to_bits();
    }
}

impl Default for PpcState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cr_word_round_trip() {
        let mut s = PpcState::new();
        s.set_cr_word(0x1234_5678);
        assert_eq!(s.cr[0], 1);
        assert_eq!(s.cr[7], 8);
        assert_eq!(s.cr_word(), 0x1234_5678);
    }

    #[test]
    fn mode_from_msr() {
        let m = compute_mode(msr::LE | msr::DR | msr::PR | msr::IR, 0xf);
        assert_eq!(m, mode::LE | mode::DT | mode::USER | mode::IT);
        assert_eq!(compute_mode(msr::DR | msr::IR, mode::LE | mode::USER), 0);
    }

    #[test]
    fn offsets_are_in_bounds() {
        assert_eq!(r_offset(0), 0);
        assert!(spr_offset(NUM_SPRS - 1) < std::mem::size_of::<PpcState>() as i64);
        assert_eq!(f_offset(1) - f_offset(0), 8);
    }
}
