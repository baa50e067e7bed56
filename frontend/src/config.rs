//! Processor flavor, capability flags and recompiler options.
//!
//! All configuration is plain `Copy` data with `const` profiles; the
//! chosen values are fixed for the lifetime of a processor instance.

// ── Capability bitmask ───────────────────────────────────────────

/// Optional hardware features of a PowerPC core.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Capabilities(u32);

impl Capabilities {
    pub const EMPTY: Self = Self(0);
    /// Floating-point unit.
    pub const FPU: Self = Self(1 << 0);
    /// Segment registers, BATs and a hashed page table.
    pub const MMU_PAGED: Self = Self(1 << 1);
    /// TLB misses are reported to software (603-style).
    pub const MMU_SOFT_TLB: Self = Self(1 << 2);
    /// Protection-only translation (4xx-style).
    pub const MMU_PROTECTION: Self = Self(1 << 3);
    /// Readable timebase.
    pub const TIMEBASE: Self = Self(1 << 4);
    /// Decrementer register and interrupt.
    pub const DECREMENTER: Self = Self(1 << 5);

    #[inline]
    pub const fn bits(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn from_bits_truncate(bits: u32) -> Self {
        Self(bits & 0x3f)
    }

    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    #[inline]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

impl std::ops::BitOr for Capabilities {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

// ── Flavors ──────────────────────────────────────────────────────

/// PowerPC core family.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flavor {
    /// Embedded 4xx core, protection-only MMU, no FPU.
    Ppc403,
    Ppc601,
    /// Software TLB reload with shadow r0-r3.
    Ppc603,
    /// Hardware hashed page table walk.
    Ppc604,
}

impl Flavor {
    /// Processor version register value.
    pub const fn pvr(self) -> u32 {
        match self {
            Flavor::Ppc403 => 0x0020_0000,
            Flavor::Ppc601 => 0x0001_0001,
            Flavor::Ppc603 => 0x0003_0001,
            Flavor::Ppc604 => 0x0004_0001,
        }
    }

    /// Capabilities a stock part of this flavor provides.
    pub const fn default_caps(self) -> Capabilities {
        match self {
            Flavor::Ppc403 => Capabilities(
                Capabilities::MMU_PROTECTION.0 | Capabilities::TIMEBASE.0,
            ),
            Flavor::Ppc601 => Capabilities(
                Capabilities::FPU.0
                    | Capabilities::MMU_PAGED.0
                    | Capabilities::DECREMENTER.0,
            ),
            Flavor::Ppc603 => Capabilities(
                Capabilities::FPU.0
                    | Capabilities::MMU_PAGED.0
                    | Capabilities::MMU_SOFT_TLB.0
                    | Capabilities::TIMEBASE.0
                    | Capabilities::DECREMENTER.0,
            ),
            Flavor::Ppc604 => Capabilities(
                Capabilities::FPU.0
                    | Capabilities::MMU_PAGED.0
                    | Capabilities::TIMEBASE.0
                    | Capabilities::DECREMENTER.0,
            ),
        }
    }
}

// ── Recompiler options ───────────────────────────────────────────

/// Translation policy switches.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DrcOptions {
    /// Checksum every instruction word of a writable sequence, not
    /// just the first.
    pub strict_verify: bool,
    /// Split unaligned big-endian half/word accesses instead of
    /// raising an alignment exception.
    pub split_unaligned: bool,
    /// Round single-precision results to single precision.
    pub accurate_singles: bool,
    /// Maximum instructions the analyzer decodes per group.
    pub window: u32,
}

impl DrcOptions {
    pub const DEFAULT: Self = Self {
        strict_verify: true,
        split_unaligned: true,
        accurate_singles: true,
        window: 512,
    };

    /// Trades exactness for speed: first-word checksums only and
    /// unrounded singles.
    pub const FAST: Self = Self {
        strict_verify: false,
        split_unaligned: true,
        accurate_singles: false,
        window: 512,
    };
}

impl Default for DrcOptions {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Per-instance configuration handed to the recompiler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DrcConfig {
    /// Code cache capacity in lowered instructions.
    pub cache_size: usize,
    /// Spare host registers the backend should report.
    pub spare_registers: u32,
    pub options: DrcOptions,
}

impl DrcConfig {
    pub const DEFAULT: Self = Self {
        cache_size: 1 << 20,
        spare_registers: 3,
        options: DrcOptions::DEFAULT,
    };
}

impl Default for DrcConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flavor_caps() {
        let c = Flavor::Ppc603.default_caps();
        assert!(c.contains(Capabilities::MMU_SOFT_TLB | Capabilities::FPU));
        assert!(!Flavor::Ppc403.default_caps().contains(Capabilities::FPU));
    }

    #[test]
    fn truncate_drops_unknown_bits() {
        assert_eq!(Capabilities::from_bits_truncate(0xffff_ffff).bits(), 0x3f);
    }
}
