use crate::types::Type;

/// Where a temporary lives and how long.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TempKind {
    /// Scratch value, dead at the next label.
    Ebb,
    /// Scratch value that survives labels within the unit.
    Unit,
    /// A field of the machine state at a fixed byte offset.
    Global,
    /// Pinned to a host register for the processor's lifetime.
    Fixed,
    Const,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TempIdx(pub u32);

/// An IR temporary. Which of `val`, `mem_offset` and `reg` means
/// anything depends on `kind`.
#[derive(Debug, Clone)]
pub struct Temp {
    pub ty: Type,
    pub kind: TempKind,
    pub val: u64,
    pub mem_offset: i64,
    pub reg: Option<u8>,
    /// Name shown in IR dumps ("r3", "icount").
    pub name: Option<&'static str>,
}

impl Temp {
    fn with_kind(ty: Type, kind: TempKind) -> Self {
        Self {
            ty,
            kind,
            val: 0,
            mem_offset: 0,
            reg: None,
            name: None,
        }
    }

    pub fn scratch(ty: Type, kind: TempKind) -> Self {
        debug_assert!(matches!(kind, TempKind::Ebb | TempKind::Unit));
        Self::with_kind(ty, kind)
    }

    pub fn constant(ty: Type, val: u64) -> Self {
        Self {
            val: val & ty.mask(),
            ..Self::with_kind(ty, TempKind::Const)
        }
    }

    pub fn global(ty: Type, offset: i64, name: &'static str) -> Self {
        Self {
            mem_offset: offset,
            name: Some(name),
            ..Self::with_kind(ty, TempKind::Global)
        }
    }

    pub fn fixed(ty: Type, reg: u8, name: &'static str) -> Self {
        Self {
            reg: Some(reg),
            name: Some(name),
            ..Self::with_kind(ty, TempKind::Fixed)
        }
    }

    /// Local to the unit being built.
    pub fn is_scratch(&self) -> bool {
        matches!(self.kind, TempKind::Ebb | TempKind::Unit)
    }
}
