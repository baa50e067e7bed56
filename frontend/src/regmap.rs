//! Guest register residency.
//!
//! Decided once per processor from the backend's spare host register
//! count: r0-r2 live in host registers when at least three spares
//! exist, everything else is addressed in the state block.

use drc_backend::RegisterInfo;
use drc_core::{Context, TempIdx, Type};

use crate::cpu::*;

/// Guest registers that become host-resident when enough spares exist.
pub const HOST_RESIDENT: usize = 3;

const GPR_NAMES: [&str; NUM_GPRS] = [
    "r0", "r1", "r2", "r3", "r4", "r5", "r6", "r7", "r8", "r9", "r10", "r11",
    "r12", "r13", "r14", "r15", "r16", "r17", "r18", "r19", "r20", "r21",
    "r22", "r23", "r24", "r25", "r26", "r27", "r28", "r29", "r30", "r31",
];

const FPR_NAMES: [&str; NUM_FPRS] = [
    "f0", "f1", "f2", "f3", "f4", "f5", "f6", "f7", "f8", "f9", "f10", "f11",
    "f12", "f13", "f14", "f15", "f16", "f17", "f18", "f19", "f20", "f21",
    "f22", "f23", "f24", "f25", "f26", "f27", "f28", "f29", "f30", "f31",
];

const CR_NAMES: [&str; NUM_CR_FIELDS] =
    ["cr0", "cr1", "cr2", "cr3", "cr4", "cr5", "cr6", "cr7"];

/// IR temps for every piece of guest state the translator touches.
pub struct RegMap {
    /// State pointer (host register).
    pub env: TempIdx,
    /// 32-bit views of the internal parameter registers.
    pub i: [TempIdx; 4],
    /// 64-bit views of the first two internal registers.
    pub d: [TempIdx; 2],
    pub r: [TempIdx; NUM_GPRS],
    pub f: [TempIdx; NUM_FPRS],
    pub cr: [TempIdx; NUM_CR_FIELDS],
    pub xer: TempIdx,
    pub lr: TempIdx,
    pub ctr: TempIdx,
    pub msr: TempIdx,
    pub pc: TempIdx,
    pub mode: TempIdx,
    pub fpscr: TempIdx,
    pub icount: TempIdx,
    pub irq_pending: TempIdx,
    pub reserve: TempIdx,
    pub reserve_addr: TempIdx,
    pub fault_opcode: TempIdx,
    /// Host registers of r0-r2, when resident.
    host: [Option<u8>; HOST_RESIDENT],
}

impl RegMap {
    /// Register all globals and fixed temps with a fresh context.
    pub fn new(ctx: &mut Context, info: &RegisterInfo) -> Self {
        let env = ctx.new_fixed(Type::I64, info.env, "env");
        let i = [
            ctx.new_fixed(Type::I32, info.internal[0], "i0"),
            ctx.new_fixed(Type::I32, info.internal[1], "i1"),
            ctx.new_fixed(Type::I32, info.internal[2], "i2"),
            ctx.new_fixed(Type::I32, info.internal[3], "i3"),
        ];
        let d = [
            ctx.new_fixed(Type::I64, info.internal[0], "d0"),
            ctx.new_fixed(Type::I64, info.internal[1], "d1"),
        ];

        let spare: Vec<u8> = info.spare.iter().collect();
        let mut host = [None; HOST_RESIDENT];
        if spare.len() >= HOST_RESIDENT {
            for (n, slot) in host.iter_mut().enumerate() {
                *slot = Some(spare[n]);
            }
        }
        let r = std::array::from_fn(|n| match host.get(n).copied().flatten() {
            Some(reg) => ctx.new_fixed(Type::I32, reg, GPR_NAMES[n]),
            None => ctx.new_global(Type::I32, r_offset(n), GPR_NAMES[n]),
        });
        let f = std::array::from_fn(|n| ctx.new_global(Type::I64, f_offset(n), FPR_NAMES[n]));
        let cr = std::array::from_fn(|n| ctx.new_global(Type::I32, cr_offset(n), CR_NAMES[n]));

        let mapped = host.iter().filter(|h| h.is_some()).count();
        log::debug!("register map: {mapped} of r0-r2 host resident");

        Self {
            env,
            i,
            d,
            r,
            f,
            cr,
            xer: ctx.new_global(Type::I32, XER_OFFSET, "xer"),
            lr: ctx.new_global(Type::I32, LR_OFFSET, "lr"),
            ctr: ctx.new_global(Type::I32, CTR_OFFSET, "ctr"),
            msr: ctx.new_global(Type::I32, MSR_OFFSET, "msr"),
            pc: ctx.new_global(Type::I32, PC_OFFSET, "pc"),
            mode: ctx.new_global(Type::I32, MODE_OFFSET, "mode"),
            fpscr: ctx.new_global(Type::I32, FPSCR_OFFSET, "fpscr"),
            icount: ctx.new_global(Type::I32, ICOUNT_OFFSET, "icount"),
            irq_pending: ctx.new_global(Type::I32, IRQ_PENDING_OFFSET, "irq_pending"),
            reserve: ctx.new_global(Type::I32, RESERVE_OFFSET, "reserve"),
            reserve_addr: ctx.new_global(Type::I32, RESERVE_ADDR_OFFSET, "reserve_addr"),
            fault_opcode: ctx.new_global(Type::I32, FAULT_OPCODE_OFFSET, "fault_opcode"),
            host,
        }
    }

    /// Whether `n` lives in a host register.
    pub fn is_mapped(&self, n: usize) -> bool {
        n < HOST_RESIDENT && self.host[n].is_some()
    }

    /// Host register of guest register `n`, if resident.
    pub fn host_reg(&self, n: usize) -> Option<u8> {
        self.host.get(n).copied().flatten()
    }

    /// Write host-resident registers back to the state block.
    pub fn gen_spill(&self, ctx: &mut Context) {
        for n in 0..HOST_RESIDENT {
            if self.is_mapped(n) {
                ctx.gen_st32(Type::I32, self.r[n], self.env, r_offset(n));
            }
        }
    }

    /// Reload host-resident registers from the state block.
    pub fn gen_restore(&self, ctx: &mut Context) {
        for n in 0..HOST_RESIDENT {
            if self.is_mapped(n) {
                ctx.gen_ld32u(Type::I32, self.r[n], self.env, r_offset(n));
            }
        }
    }

    /// Load SPR `n` from the state block into `dst`.
    pub fn gen_load_spr(&self, ctx: &mut Context, dst: TempIdx, n: u32) -> TempIdx {
        ctx.gen_ld32u(Type::I32, dst, self.env, spr_offset(n as usize))
    }

    /// Store `src` into SPR `n`.
    pub fn gen_store_spr(&self, ctx: &mut Context, src: TempIdx, n: u32) {
        ctx.gen_st32(Type::I32, src, self.env, spr_offset(n as usize));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drc_core::{RegSet, TempKind};

    fn info(spare: u32) -> RegisterInfo {
        let mut set = RegSet::EMPTY;
        for r in 0..spare {
            set = set.set(5 + r as u8);
        }
        RegisterInfo {
            env: 0,
            internal: [1, 2, 3, 4],
            spare: set,
        }
    }

    #[test]
    fn three_spares_map_r0_to_r2() {
        let mut ctx = Context::new();
        let map = RegMap::new(&mut ctx, &info(3));
        for n in 0..3 {
            assert!(map.is_mapped(n));
            assert_eq!(ctx.temp(map.r[n]).kind, TempKind::Fixed);
        }
        assert!(!map.is_mapped(3));
        assert_eq!(ctx.temp(map.r[3]).kind, TempKind::Global);
        assert_eq!(map.host_reg(0), Some(5));
    }

    #[test]
    fn too_few_spares_keep_everything_in_memory() {
        let mut ctx = Context::new();
        let map = RegMap::new(&mut ctx, &info(2));
        assert!((0..NUM_GPRS).all(|n| !map.is_mapped(n)));
        assert_eq!(ctx.temp(map.r[0]).kind, TempKind::Global);
        map.gen_spill(&mut ctx);
        assert_eq!(ctx.num_ops(), 0);
    }
}
