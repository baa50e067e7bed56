//! Basic-block analysis.
//!
//! Decodes a bounded window of guest instructions starting at a PC
//! and annotates each with the control-flow, exception and
//! register-usage facts the block compiler needs. The [`Analyzer`]
//! trait is the seam; [`PpcAnalyzer`] is the stock implementation.

use std::collections::BTreeSet;
use std::ops::{BitOr, BitOrAssign};

use crate::config::Capabilities;
use crate::cpu::{self, mode};
use crate::insn::*;

// ── Descriptor flags ─────────────────────────────────────────────

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DescFlags(u32);

impl DescFlags {
    pub const NONE: Self = Self(0);
    /// Last instruction of a dispatch sequence.
    pub const END_SEQUENCE: Self = Self(1 << 0);
    /// Control never falls through to the next instruction.
    pub const IS_UNCONDITIONAL_BRANCH: Self = Self(1 << 1);
    pub const IS_CONDITIONAL_BRANCH: Self = Self(1 << 2);
    /// Some decoded branch targets this instruction.
    pub const IS_BRANCH_TARGET: Self = Self(1 << 3);
    /// Branch whose static target lies inside the decoded window.
    pub const INTRABLOCK_BRANCH: Self = Self(1 << 4);
    pub const CAN_CAUSE_EXCEPTION: Self = Self(1 << 5);
    /// Architecturally a no-op (`ori 0,0,0`, `b .+4`).
    pub const VIRTUAL_NOOP: Self = Self(1 << 6);
    pub const CAN_CHANGE_MODES: Self = Self(1 << 7);
    /// Successor must be dispatched through the hash table with the
    /// run-time mode.
    pub const REDISPATCH: Self = Self(1 << 8);
    /// Fetch hit an address with no mapping at all.
    pub const COMPILER_UNMAPPED: Self = Self(1 << 9);
    /// Fetch raised a translation fault.
    pub const COMPILER_PAGE_FAULT: Self = Self(1 << 10);
    pub const INVALID_OPCODE: Self = Self(1 << 11);
    pub const PRIVILEGED: Self = Self(1 << 12);
    pub const READS_MEMORY: Self = Self(1 << 13);
    pub const WRITES_MEMORY: Self = Self(1 << 14);
    /// The instruction word lives in writable memory.
    pub const CODE_WRITABLE: Self = Self(1 << 15);
    pub const FLOATING_POINT: Self = Self(1 << 16);
    /// Remaps memory; compiled code must be discarded afterwards.
    pub const FLUSHES_CACHE: Self = Self(1 << 17);

    #[inline]
    pub const fn bits(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    #[inline]
    pub const fn intersects(self, other: Self) -> bool {
        (self.0 & other.0) != 0
    }

    #[inline]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

impl BitOr for DescFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl BitOrAssign for DescFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// All eight CR fields.
pub const CR_ALL: u8 = 0xff;

const fn cr_field_bit(field: usize) -> u8 {
    1 << field
}

// ── Descriptor ───────────────────────────────────────────────────

/// One decoded instruction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Descriptor {
    pub pc: u32,
    pub physpc: u32,
    pub opcode: u32,
    pub flags: DescFlags,
    pub cycles: u32,
    /// Static branch target, when there is one.
    pub target: Option<u32>,
    /// CR fields read / written by this instruction.
    pub cr_read: u8,
    pub cr_write: u8,
    pub ca_read: bool,
    pub ca_write: bool,
    /// CR fields whose value after this instruction may be observed.
    pub cr_live: u8,
    /// Whether XER[CA] after this instruction may be observed.
    pub ca_live: bool,
}

impl Descriptor {
    fn new(pc: u32, physpc: u32, opcode: u32) -> Self {
        Self {
            pc,
            physpc,
            opcode,
            flags: DescFlags::NONE,
            cycles: 1,
            target: None,
            cr_read: 0,
            cr_write: 0,
            ca_read: false,
            ca_write: false,
            cr_live: CR_ALL,
            ca_live: true,
        }
    }

    fn fault(pc: u32, flag: DescFlags) -> Self {
        let mut d = Self::new(pc, pc, 0);
        d.flags = flag | DescFlags::CAN_CAUSE_EXCEPTION;
        d
    }

    pub fn is_branch(&self) -> bool {
        self.flags.intersects(
            DescFlags::IS_UNCONDITIONAL_BRANCH | DescFlags::IS_CONDITIONAL_BRANCH,
        )
    }

    /// Whether the record-form CR0 update of this instruction is
    /// observable.
    pub fn cr0_live(&self) -> bool {
        self.cr_field_live(0)
    }

    /// Whether CR `field` is read before being overwritten.
    pub fn cr_field_live(&self, field: usize) -> bool {
        self.cr_live & cr_field_bit(field) != 0
    }
}

// ── Fetch interface ──────────────────────────────────────────────

/// Result of fetching one instruction word.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fetch {
    Ok { opcode: u32, phys: u32 },
    /// Translation miss or protection fault on fetch.
    PageFault,
    /// No memory at the physical address.
    Unmapped,
}

/// Instruction memory as seen by the analyzer.
pub trait CodeFetch {
    /// Fetch the word at logical `addr` under operating mode `m`.
    fn fetch(&mut self, m: u32, addr: u32) -> Fetch;

    /// Whether guest code could overwrite `phys`.
    fn is_writable(&mut self, phys: u32) -> bool;
}

pub trait Analyzer {
    /// Decode the group starting at `pc`. The last descriptor always
    /// carries `END_SEQUENCE`.
    fn analyze(&mut self, fetch: &mut dyn CodeFetch, m: u32, pc: u32) -> Vec<Descriptor>;
}

// ── PowerPC analyzer ─────────────────────────────────────────────

pub struct PpcAnalyzer {
    caps: Capabilities,
    window: u32,
    flush_on_remap: bool,
}

impl PpcAnalyzer {
    pub fn new(caps: Capabilities, window: u32, flush_on_remap: bool) -> Self {
        Self {
            caps,
            window: window.max(1),
            flush_on_remap,
        }
    }

    /// Classify one instruction.
    pub fn describe(&self, m: u32, pc: u32, physpc: u32, op: u32) -> Descriptor {
        let mut d = Descriptor::new(pc, physpc, op);
        match opcd(op) {
            3 => d.flags |= DescFlags::CAN_CAUSE_EXCEPTION,
            7 => d.cycles = 4,
            8 | 12 => d.ca_write = true,
            13 => {
                d.ca_write = true;
                d.cr_write = 1;
            }
            10 | 11 => {
                if cmp_l(op) {
                    d.flags |= DescFlags::INVALID_OPCODE;
                }
                d.cr_write = cr_field_bit(crfd(op));
            }
            24 if op == 0x6000_0000 => d.flags |= DescFlags::VIRTUAL_NOOP,
            14 | 15 | 24..=27 => {}
            28 | 29 => d.cr_write = 1,
            16 => self.describe_bc(&mut d, bo(op), bi(op), true),
            17 => {
                d.flags |= DescFlags::IS_UNCONDITIONAL_BRANCH
                    | DescFlags::CAN_CAUSE_EXCEPTION
                    | DescFlags::CAN_CHANGE_MODES;
            }
            18 => {
                if op == 0x4800_0004 {
                    d.flags |= DescFlags::VIRTUAL_NOOP;
                } else {
                    let disp = li(op) as u32;
                    let base = if aa(op) { 0 } else { pc };
                    d.target = Some(base.wrapping_add(disp));
                    d.flags |= DescFlags::IS_UNCONDITIONAL_BRANCH;
                }
            }
            19 => self.describe_19(&mut d),
            20 | 21 | 23 => {
                if rc(op) {
                    d.cr_write = 1;
                }
            }
            31 => self.describe_31(&mut d),
            32..=47 => {
                d.flags |= DescFlags::CAN_CAUSE_EXCEPTION;
                d.flags |= if matches!(opcd(op), 36..=39 | 44 | 45 | 47) {
                    DescFlags::WRITES_MEMORY
                } else {
                    DescFlags::READS_MEMORY
                };
                if matches!(opcd(op), 46 | 47) {
                    d.cycles = 32 - rd(op) as u32;
                }
            }
            48..=55 => {
                if self.fpu() {
                    d.flags |= DescFlags::CAN_CAUSE_EXCEPTION
                        | DescFlags::FLOATING_POINT
                        | if opcd(op) >= 52 {
                            DescFlags::WRITES_MEMORY
                        } else {
                            DescFlags::READS_MEMORY
                        };
                } else {
                    d.flags |= DescFlags::INVALID_OPCODE;
                }
            }
            59 => self.describe_59(&mut d),
            63 => self.describe_63(&mut d),
            // 64-bit only: reported as unimplemented at run time.
            2 | 30 | 58 | 62 => d.flags |= DescFlags::CAN_CAUSE_EXCEPTION,
            _ => d.flags |= DescFlags::INVALID_OPCODE,
        }

        if d.flags.contains(DescFlags::PRIVILEGED) && m & mode::USER != 0 {
            d.flags |= DescFlags::CAN_CAUSE_EXCEPTION;
        }
        if d.flags.contains(DescFlags::INVALID_OPCODE) {
            d.flags |= DescFlags::CAN_CAUSE_EXCEPTION;
        }
        d
    }

    fn fpu(&self) -> bool {
        self.caps.contains(Capabilities::FPU)
    }

    fn describe_bc(&self, d: &mut Descriptor, bo: u32, bi: u32, static_target: bool) {
        if bo & 0x14 == 0x14 {
            d.flags |= DescFlags::IS_UNCONDITIONAL_BRANCH;
        } else {
            d.flags |= DescFlags::IS_CONDITIONAL_BRANCH;
        }
        if bo & 0x10 == 0 {
            d.cr_read = cr_field_bit((bi / 4) as usize);
        }
        if static_target {
            let disp = bd(d.opcode) as u32;
            let base = if aa(d.opcode) { 0 } else { d.pc };
            d.target = Some(base.wrapping_add(disp));
        }
    }

    fn describe_19(&self, d: &mut Descriptor) {
        let op = d.opcode;
        match xo10(op) {
            0 => {
                d.cr_read = cr_field_bit(crfs(op));
                d.cr_write = cr_field_bit(crfd(op));
            }
            16 => self.describe_bc(d, bo(op), bi(op), false),
            528 => {
                if bo(op) & 4 == 0 {
                    d.flags |= DescFlags::INVALID_OPCODE;
                } else {
                    self.describe_bc(d, bo(op), bi(op), false);
                }
            }
            50 => {
                d.flags |= DescFlags::IS_UNCONDITIONAL_BRANCH
                    | DescFlags::PRIVILEGED
                    | DescFlags::CAN_CHANGE_MODES;
            }
            150 => {}
            33 | 129 | 193 | 225 | 257 | 289 | 417 | 449 => {
                let field = |b: u32| cr_field_bit((b / 4) as usize);
                d.cr_read = field(crba(op)) | field(crbb(op)) | field(crbd(op));
                d.cr_write = field(crbd(op));
            }
            _ => d.flags |= DescFlags::INVALID_OPCODE,
        }
    }

    fn describe_31(&self, d: &mut Descriptor) {
        let op = d.opcode;
        let load = DescFlags::READS_MEMORY | DescFlags::CAN_CAUSE_EXCEPTION;
        let store = DescFlags::WRITES_MEMORY | DescFlags::CAN_CAUSE_EXCEPTION;
        let record = |d: &mut Descriptor| {
            if rc(op) {
                d.cr_write |= 1;
            }
        };

        match xo10(op) {
            0 | 32 => d.cr_write = cr_field_bit(crfd(op)),
            4 => d.flags |= DescFlags::CAN_CAUSE_EXCEPTION,
            11 | 75 => {
                d.cycles = 5;
                record(d);
            }
            19 => d.cr_read = CR_ALL,
            144 => {
                let crm = crm(op);
                d.cr_write = (0..8)
                    .filter(|n| crm & (0x80 >> n) != 0)
                    .fold(0, |acc, n| acc | cr_field_bit(n as usize));
            }
            512 => {
                d.cr_write = cr_field_bit(crfd(op));
                d.ca_read = true;
                d.ca_write = true;
            }
            24 | 26 | 28 | 60 | 124 | 284 | 316 | 412 | 444 | 476 | 536 | 922
            | 954 => record(d),
            792 | 824 => {
                d.ca_write = true;
                record(d);
            }
            83 => d.flags |= DescFlags::PRIVILEGED,
            146 => {
                d.flags |= DescFlags::PRIVILEGED
                    | DescFlags::CAN_CHANGE_MODES
                    | DescFlags::REDISPATCH;
            }
            339 => {
                let n = spr(op);
                if n & 0x10 != 0 {
                    d.flags |= DescFlags::PRIVILEGED;
                }
                if n == cpu::spr::XER {
                    d.ca_read = true;
                }
            }
            467 => {
                let n = spr(op);
                if n & 0x10 != 0 {
                    d.flags |= DescFlags::PRIVILEGED;
                }
                if n == cpu::spr::XER {
                    d.ca_write = true;
                }
                if self.flush_on_remap && (cpu::spr::is_bat(n) || n == cpu::spr::SDR1) {
                    d.flags |= DescFlags::FLUSHES_CACHE;
                }
            }
            371 => {
                if !self.caps.contains(Capabilities::TIMEBASE) {
                    d.flags |= DescFlags::INVALID_OPCODE;
                }
            }
            210 | 242 | 306 | 370 => {
                d.flags |= DescFlags::PRIVILEGED;
                if self.flush_on_remap {
                    d.flags |= DescFlags::FLUSHES_CACHE;
                }
            }
            595 | 659 | 470 | 566 => d.flags |= DescFlags::PRIVILEGED,
            978 | 1010 => {
                if self.caps.contains(Capabilities::MMU_SOFT_TLB) {
                    d.flags |= DescFlags::PRIVILEGED;
                } else {
                    d.flags |= DescFlags::INVALID_OPCODE;
                }
            }
            54 | 86 | 246 | 278 | 598 | 854 | 982 => {}
            20 | 23 | 55 | 87 | 119 | 279 | 311 | 343 | 375 | 534 | 790 | 310 => {
                d.flags |= load;
            }
            533 | 597 => {
                d.flags |= load;
                d.cycles = if xo10(op) == 597 { 1 + (nb(op) + 3) / 4 } else { 4 };
            }
            150 => {
                d.flags |= store;
                d.cr_write = 1;
            }
            151 | 183 | 215 | 247 | 407 | 439 | 662 | 918 | 438 => d.flags |= store,
            661 | 725 => {
                d.flags |= store;
                d.cycles = if xo10(op) == 725 { 1 + (nb(op) + 3) / 4 } else { 4 };
            }
            1014 => {
                d.flags |= store;
                d.cycles = 8;
            }
            535 | 567 | 599 | 631 => {
                if self.fpu() {
                    d.flags |= load | DescFlags::FLOATING_POINT;
                } else {
                    d.flags |= DescFlags::INVALID_OPCODE;
                }
            }
            663 | 695 | 727 | 759 | 983 => {
                if self.fpu() {
                    d.flags |= store | DescFlags::FLOATING_POINT;
                } else {
                    d.flags |= DescFlags::INVALID_OPCODE;
                }
            }
            // 64-bit only.
            9 | 21 | 27 | 53 | 58 | 68 | 73 | 84 | 149 | 181 | 214 | 233 | 341
            | 373 | 434 | 457 | 489 | 498 | 539 | 794 | 826 | 827 | 986 => {
                d.flags |= DescFlags::CAN_CAUSE_EXCEPTION;
            }
            _ => match xo9(op) {
                8 | 10 | 40 | 104 | 266 => {
                    if matches!(xo9(op), 8 | 10) {
                        d.ca_write = true;
                    }
                    record(d);
                }
                136 | 138 | 200 | 202 | 232 | 234 => {
                    d.ca_read = true;
                    d.ca_write = true;
                    record(d);
                }
                235 => {
                    d.cycles = 4;
                    record(d);
                }
                459 | 491 => {
                    d.cycles = 20;
                    record(d);
                }
                9 | 73 | 233 | 457 | 489 => d.flags |= DescFlags::CAN_CAUSE_EXCEPTION,
                _ => d.flags |= DescFlags::INVALID_OPCODE,
            },
        }
    }

    fn describe_59(&self, d: &mut Descriptor) {
        let op = d.opcode;
        if !self.fpu() {
            d.flags |= DescFlags::INVALID_OPCODE;
            return;
        }
        match xo5(op) {
            18 => d.cycles = 17,
            22 => d.cycles = 20,
            20 | 21 | 24 | 25 | 28..=31 => {}
            _ => {
                d.flags |= DescFlags::INVALID_OPCODE;
                return;
            }
        }
        d.flags |= DescFlags::FLOATING_POINT | DescFlags::CAN_CAUSE_EXCEPTION;
        if rc(op) {
            d.cr_write = cr_field_bit(1);
        }
    }

    fn describe_63(&self, d: &mut Descriptor) {
        let op = d.opcode;
        if !self.fpu() {
            d.flags |= DescFlags::INVALID_OPCODE;
            return;
        }
        if xo10(op) & 0x10 != 0 {
            match xo5(op) {
                18 => d.cycles = 18,
                22 => d.cycles = 20,
                20 | 21 | 23 | 25 | 26 | 28..=31 => {}
                _ => {
                    d.flags |= DescFlags::INVALID_OPCODE;
                    return;
                }
            }
        } else {
            match xo10(op) {
                0 | 32 => d.cr_write = cr_field_bit(crfd(op)),
                64 => d.cr_write = cr_field_bit(crfd(op)),
                12 | 14 | 15 | 38 | 40 | 70 | 72 | 134 | 136 | 264 | 583 | 711 => {}
                // 64-bit conversions.
                814 | 815 | 846 => {}
                _ => {
                    d.flags |= DescFlags::INVALID_OPCODE;
                    return;
                }
            }
        }
        d.flags |= DescFlags::FLOATING_POINT | DescFlags::CAN_CAUSE_EXCEPTION;
        if rc(op) {
            d.cr_write |= cr_field_bit(1);
        }
    }
}

impl Analyzer for PpcAnalyzer {
    fn analyze(&mut self, fetch: &mut dyn CodeFetch, m: u32, start: u32) -> Vec<Descriptor> {
        let mut out: Vec<Descriptor> = Vec::new();
        let mut forward: BTreeSet<u32> = BTreeSet::new();
        let mut pc = start;

        while (out.len() as u32) < self.window {
            let d = match fetch.fetch(m, pc) {
                Fetch::Ok { opcode, phys } => {
                    let mut d = self.describe(m, pc, phys, opcode);
                    if fetch.is_writable(phys) {
                        d.flags |= DescFlags::CODE_WRITABLE;
                    }
                    d
                }
                Fetch::PageFault => Descriptor::fault(pc, DescFlags::COMPILER_PAGE_FAULT),
                Fetch::Unmapped => Descriptor::fault(pc, DescFlags::COMPILER_UNMAPPED),
            };
            if let Some(t) = d.target {
                if t > pc {
                    forward.insert(t);
                }
            }
            let stop = d.flags.intersects(
                DescFlags::IS_UNCONDITIONAL_BRANCH
                    | DescFlags::REDISPATCH
                    | DescFlags::FLUSHES_CACHE
                    | DescFlags::COMPILER_UNMAPPED
                    | DescFlags::COMPILER_PAGE_FAULT
                    | DescFlags::INVALID_OPCODE,
            );
            out.push(d);
            pc = pc.wrapping_add(4);
            if stop && !forward.contains(&pc) {
                break;
            }
        }

        mark_sequences(&mut out);
        compute_liveness(&mut out);
        out
    }
}

/// Mark branch targets and sequence ends.
fn mark_sequences(descs: &mut [Descriptor]) {
    let pcs: BTreeSet<u32> = descs.iter().map(|d| d.pc).collect();
    let targets: BTreeSet<u32> = descs
        .iter()
        .filter(|d| d.is_branch())
        .filter_map(|d| d.target)
        .filter(|t| pcs.contains(t))
        .collect();

    for n in 0..descs.len() {
        if targets.contains(&descs[n].pc) {
            descs[n].flags |= DescFlags::IS_BRANCH_TARGET;
            if n > 0 {
                descs[n - 1].flags |= DescFlags::END_SEQUENCE;
            }
        }
        if let Some(t) = descs[n].target {
            if descs[n].is_branch() && pcs.contains(&t) {
                descs[n].flags |= DescFlags::INTRABLOCK_BRANCH;
            }
        }
        if descs[n].flags.intersects(
            DescFlags::IS_UNCONDITIONAL_BRANCH
                | DescFlags::REDISPATCH
                | DescFlags::FLUSHES_CACHE
                | DescFlags::COMPILER_UNMAPPED
                | DescFlags::COMPILER_PAGE_FAULT
                | DescFlags::INVALID_OPCODE,
        ) {
            descs[n].flags |= DescFlags::END_SEQUENCE;
        }
    }
    if let Some(last) = descs.last_mut() {
        last.flags |= DescFlags::END_SEQUENCE;
    }
}

/// Backward liveness of CR fields and XER[CA]. Everything is live
/// at sequence ends, across branches and wherever an exception can
/// observe the state.
fn compute_liveness(descs: &mut [Descriptor]) {
    let mut cr_live = CR_ALL;
    let mut ca_live = true;
    for d in descs.iter_mut().rev() {
        if d.flags.contains(DescFlags::END_SEQUENCE) || d.is_branch() {
            cr_live = CR_ALL;
            ca_live = true;
        }
        d.cr_live = cr_live;
        d.ca_live = ca_live;

        if d.flags.contains(DescFlags::CAN_CAUSE_EXCEPTION) {
            cr_live = CR_ALL;
            ca_live = true;
        } else {
            cr_live = (cr_live & !d.cr_write) | d.cr_read;
            ca_live = (ca_live && !d.ca_write) || d.ca_read;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Words(Vec<u32>);

    impl CodeFetch for Words {
        fn fetch(&mut self, _m: u32, addr: u32) -> Fetch {
            match self.0.get((addr / 4) as usize) {
                Some(&opcode) => Fetch::Ok { opcode, phys: addr },
                None => Fetch::Unmapped,
            }
        }

        fn is_writable(&mut self, _phys: u32) -> bool {
            false
        }
    }

    fn analyzer() -> PpcAnalyzer {
        PpcAnalyzer::new(Capabilities::FPU, 64, false)
    }

    #[test]
    fn stops_at_unconditional_branch() {
        // addi r3,r3,1 ; b -4 ; addi r4,r4,1
        let mut code = Words(vec![0x3863_0001, 0x4bff_fffc, 0x3884_0001]);
        let d = analyzer().analyze(&mut code, 0, 0);
        assert_eq!(d.len(), 2);
        assert!(d[0].flags.contains(DescFlags::IS_BRANCH_TARGET));
        assert!(d[1].flags.contains(DescFlags::INTRABLOCK_BRANCH | DescFlags::END_SEQUENCE));
        assert_eq!(d[1].target, Some(0));
    }

    #[test]
    fn continues_to_forward_target() {
        // beq +8 ; b +8 ; nop ; addi r3,r3,1 ; blr
        let mut code = Words(vec![
            0x4182_0008,
            0x4800_0008,
            0x6000_0000,
            0x3863_0001,
            0x4e80_0020,
        ]);
        let d = analyzer().analyze(&mut code, 0, 0);
        assert_eq!(d.len(), 5);
        assert!(d[2].flags.contains(DescFlags::IS_BRANCH_TARGET | DescFlags::VIRTUAL_NOOP));
        assert!(d[1].flags.contains(DescFlags::END_SEQUENCE));
        assert!(d[3].flags.contains(DescFlags::IS_BRANCH_TARGET));
        assert!(d[4].flags.contains(DescFlags::END_SEQUENCE));
    }

    #[test]
    fn dead_cr0_update_is_not_live() {
        // add. r3,r3,r4 ; add. r5,r5,r6 ; blr
        let mut code = Words(vec![0x7c63_2215, 0x7ca5_3215, 0x4e80_0020]);
        let d = analyzer().analyze(&mut code, 0, 0);
        assert!(!d[0].cr0_live());
        assert!(d[1].cr0_live());
    }

    #[test]
    fn unmapped_fetch_ends_group() {
        let mut code = Words(vec![0x3863_0001]);
        let d = analyzer().analyze(&mut code, 0, 0);
        assert_eq!(d.len(), 2);
        assert!(d[1].flags.contains(DescFlags::COMPILER_UNMAPPED | DescFlags::END_SEQUENCE));
    }

    #[test]
    fn privileged_in_user_mode_can_fault() {
        // mtmsr r3
        let a = analyzer();
        let d = a.describe(mode::USER, 0, 0, 0x7c60_0124);
        assert!(d.flags.contains(DescFlags::PRIVILEGED | DescFlags::CAN_CAUSE_EXCEPTION));
        let d = a.describe(0, 0, 0, 0x7c60_0124);
        assert!(!d.flags.contains(DescFlags::CAN_CAUSE_EXCEPTION));
    }
}
