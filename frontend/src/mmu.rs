//! Address-translation strategies.
//!
//! The MMU capability of a core decides which accessor variants
//! translate, which exceptions a translation miss raises and which
//! exception handlers exist at all. The choice is made once when the
//! processor is constructed.

use std::fmt;

use crate::config::Capabilities;
use crate::cpu::{mode, Exception};

/// Access intention passed to `Machine::translate`.
pub mod intention {
    pub const READ: u32 = 0;
    pub const WRITE: u32 = 1;
    pub const FETCH: u32 = 2;
    pub const TYPE_MASK: u32 = 3;
    /// Set for user-mode accesses.
    pub const USER: u32 = 4;
}

pub trait MmuStrategy: fmt::Debug {
    fn name(&self) -> &'static str;

    /// Mode bits this MMU honours; the rest are forced to zero.
    fn mode_mask(&self) -> u32 {
        mode::LE | mode::DT | mode::USER | mode::IT
    }

    /// Whether accessors for `mode` translate data addresses.
    fn translates_data(&self, m: u32) -> bool {
        m & mode::DT != 0
    }

    /// Whether instruction fetch in `mode` translates.
    fn translates_code(&self, m: u32) -> bool {
        m & mode::IT != 0
    }

    /// Exception for a data translation miss.
    fn data_miss(&self, write: bool) -> Exception;

    /// Exception for an instruction translation miss.
    fn code_miss(&self) -> Exception;

    /// Whether a handler for `exc` is generated.
    fn has_exception(&self, exc: Exception) -> bool {
        !exc.is_tlb_miss()
    }

    /// Whether changes to segment registers, BATs or the TLB make
    /// compiled code stale.
    fn flush_on_remap(&self) -> bool {
        false
    }

    /// Whether TLB-miss exceptions swap in the shadow r0-r3.
    fn swaps_tgpr(&self) -> bool {
        false
    }
}

/// Real-mode only: translation bits of the MSR are ignored.
#[derive(Debug, Default)]
pub struct NoMmu;

impl MmuStrategy for NoMmu {
    fn name(&self) -> &'static str {
        "none"
    }

    fn mode_mask(&self) -> u32 {
        mode::LE | mode::USER
    }

    fn translates_data(&self, _m: u32) -> bool {
        false
    }

    fn translates_code(&self, _m: u32) -> bool {
        false
    }

    fn data_miss(&self, _write: bool) -> Exception {
        Exception::Dsi
    }

    fn code_miss(&self) -> Exception {
        Exception::Isi
    }
}

/// 4xx protection-only translation.
#[derive(Debug, Default)]
pub struct ProtectionMmu;

impl MmuStrategy for ProtectionMmu {
    fn name(&self) -> &'static str {
        "protection"
    }

    fn data_miss(&self, _write: bool) -> Exception {
        Exception::Dsi
    }

    fn code_miss(&self) -> Exception {
        Exception::Isi
    }
}

/// Segmented, hashed page table walked by hardware.
#[derive(Debug, Default)]
pub struct HashedMmu;

impl MmuStrategy for HashedMmu {
    fn name(&self) -> &'static str {
        "hashed"
    }

    fn data_miss(&self, _write: bool) -> Exception {
        Exception::Dsi
    }

    fn code_miss(&self) -> Exception {
        Exception::Isi
    }

    fn flush_on_remap(&self) -> bool {
        true
    }
}

/// 603-style: misses trap to software which reloads the TLB.
#[derive(Debug, Default)]
pub struct SoftTlbMmu;

impl MmuStrategy for SoftTlbMmu {
    fn name(&self) -> &'static str {
        "soft-tlb"
    }

    fn data_miss(&self, write: bool) -> Exception {
        if write {
            Exception::DtlbMissStore
        } else {
            Exception::DtlbMissLoad
        }
    }

    fn code_miss(&self) -> Exception {
        Exception::ItlbMiss
    }

    fn has_exception(&self, _exc: Exception) -> bool {
        true
    }

    fn flush_on_remap(&self) -> bool {
        true
    }

    fn swaps_tgpr(&self) -> bool {
        true
    }
}

/// Pick the strategy matching a capability set.
pub fn strategy_for(caps: Capabilities) -> Box<dyn MmuStrategy> {
    if caps.contains(Capabilities::MMU_SOFT_TLB) {
        Box::new(SoftTlbMmu)
    } else if caps.contains(Capabilities::MMU_PAGED) {
        Box::new(HashedMmu)
    } else if caps.contains(Capabilities::MMU_PROTECTION) {
        Box::new(ProtectionMmu)
    } else {
        Box::new(NoMmu)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_selection() {
        let soft = strategy_for(Capabilities::MMU_PAGED | Capabilities::MMU_SOFT_TLB);
        assert_eq!(soft.name(), "soft-tlb");
        assert_eq!(soft.data_miss(true), Exception::DtlbMissStore);
        assert!(soft.has_exception(Exception::ItlbMiss));

        let none = strategy_for(Capabilities::EMPTY);
        assert_eq!(none.mode_mask(), mode::LE | mode::USER);
        assert!(!none.translates_data(mode::DT));
        assert!(!none.has_exception(Exception::DtlbMissLoad));
    }
}
