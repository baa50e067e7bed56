//! The embedding system: state block, bus, TLB and interrupt
//! acknowledge, wired into the traits the recompiler calls.

use drc_backend::{Machine, TranslateFault};
use ppc_frontend::cpu::{mode, PpcState};
use ppc_frontend::mmu::intention;
use ppc_frontend::{CodeFetch, Fetch, PpcMachine};

/// The surrounding memory bus. Values are numeric, in guest
/// (big-endian) significance: a 4-byte read at `a` returns
/// `mem[a] << 24 | ... | mem[a + 3]`.
pub trait Bus {
    fn read(&mut self, addr: u32, size: u32) -> u64;

    fn write(&mut self, addr: u32, size: u32, value: u64);

    /// Whether `addr` is backed by anything instructions can be
    /// fetched from.
    fn is_mapped(&self, _addr: u32) -> bool {
        true
    }

    /// Whether guest stores can reach `addr`.
    fn is_writable(&self, _addr: u32) -> bool {
        true
    }
}

/// Address translation facility of the embedding system.
pub trait Tlb {
    /// Logical to physical.
    fn translate(&mut self, state: &PpcState, intention: u32, addr: u32) -> Result<u32, TranslateFault>;

    fn flush(&mut self) {}

    fn invalidate(&mut self, _ea: u32) {}

    /// 603 software reload.
    fn load(&mut self, _ea: u32, _rpa: u32, _cmp: u32, _instruction: bool) {}
}

/// Identity translation for systems without an MMU.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTlb;

impl Tlb for NoTlb {
    fn translate(&mut self, _state: &PpcState, _intention: u32, addr: u32) -> Result<u32, TranslateFault> {
        Ok(addr)
    }
}

/// Called when the external interrupt is taken.
pub type IrqAck = Box<dyn FnMut()>;

pub struct System<Bu, T> {
    pub(crate) state: Box<PpcState>,
    pub(crate) bus: Bu,
    pub(crate) tlb: T,
    pub(crate) irq_ack: Option<IrqAck>,
}

impl<Bu: Bus, T: Tlb> System<Bu, T> {
    pub fn new(bus: Bu, tlb: T, irq_ack: Option<IrqAck>) -> Self {
        Self {
            state: Box::new(PpcState::new()),
            bus,
            tlb,
            irq_ack,
        }
    }

    pub fn state(&self) -> &PpcState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut PpcState {
        &mut self.state
    }

    pub fn bus(&self) -> &Bu {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut Bu {
        &mut self.bus
    }

    pub fn tlb_mut(&mut self) -> &mut T {
        &mut self.tlb
    }
}

const fn size_mask(size: u32) -> u64 {
    if size >= 8 {
        u64::MAX
    } else {
        (1u64 << (size * 8)) - 1
    }
}

impl<Bu: Bus, T: Tlb> Machine for System<Bu, T> {
    fn env_ptr(&mut self) -> *mut u8 {
        (&mut *self.state as *mut PpcState).cast()
    }

    fn read(&mut self, addr: u32, size: u32) -> u64 {
        self.bus.read(addr, size) & size_mask(size)
    }

    fn write(&mut self, addr: u32, size: u32, value: u64) {
        self.bus.write(addr, size, value & size_mask(size));
    }

    fn translate(&mut self, intention: u32, addr: u32) -> Result<u32, TranslateFault> {
        self.tlb.translate(&self.state, intention, addr)
    }
}

impl<Bu: Bus, T: Tlb> PpcMachine for System<Bu, T> {
    fn state(&mut self) -> &mut PpcState {
        &mut self.state
    }

    fn irq_ack(&mut self) {
        if let Some(ack) = self.irq_ack.as_mut() {
            ack();
        }
    }

    fn tlb_flush(&mut self) {
        self.tlb.flush();
    }

    fn tlb_invalidate(&mut self, ea: u32) {
        self.tlb.invalidate(ea);
    }

    fn tlb_load(&mut self, ea: u32, rpa: u32, cmp: u32, instruction: bool) {
        self.tlb.load(ea, rpa, cmp, instruction);
    }
}

impl<Bu: Bus, T: Tlb> CodeFetch for System<Bu, T> {
    fn fetch(&mut self, m: u32, addr: u32) -> Fetch {
        let mut phys = addr;
        if m & mode::IT != 0 {
            let mut intent = intention::FETCH;
            if m & mode::USER != 0 {
                intent |= intention::USER;
            }
            match self.tlb.translate(&self.state, intent, addr) {
                Ok(pa) => phys = pa,
                Err(_) => return Fetch::PageFault,
            }
        }
        // little-endian mode swaps the words of each doubleword
        if m & mode::LE != 0 {
            phys ^= 4;
        }
        if !self.bus.is_mapped(phys) {
            return Fetch::Unmapped;
        }
        let opcode = self.bus.read(phys, 4) as u32;
        Fetch::Ok { opcode, phys }
    }

    fn is_writable(&mut self, phys: u32) -> bool {
        self.bus.is_writable(phys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_masks() {
        assert_eq!(size_mask(1), 0xff);
        assert_eq!(size_mask(2), 0xffff);
        assert_eq!(size_mask(4), 0xffff_ffff);
        assert_eq!(size_mask(8), u64::MAX);
    }
}
