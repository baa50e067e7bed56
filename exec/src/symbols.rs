//! Named-field export for debuggers and memory watchers.

use std::mem::{offset_of, size_of};

use ppc_frontend::cpu::{self, spr, PpcState, NUM_CR_FIELDS, NUM_FPRS, NUM_GPRS, NUM_SRS};

/// Receives one entry per exported field. Offsets are relative to
/// the state block.
pub trait SymbolSink {
    fn symbol(&mut self, name: &str, offset: usize, size: usize);
}

const NAMED_SPRS: &[(&str, u32)] = &[
    ("dsisr", spr::DSISR),
    ("dar", spr::DAR),
    ("sdr1", spr::SDR1),
    ("srr0", spr::SRR0),
    ("srr1", spr::SRR1),
    ("sprg0", spr::SPRG0),
    ("sprg1", spr::SPRG0 + 1),
    ("sprg2", spr::SPRG0 + 2),
    ("sprg3", spr::SPRG3),
    ("ear", spr::EAR),
    ("pvr", spr::PVR),
    ("hid0", spr::HID0),
    ("hid1", spr::HID1),
    ("iabr", spr::IABR),
    ("dabr", spr::DABR),
    ("dmiss", spr::DMISS),
    ("dcmp", spr::DCMP),
    ("hash1", spr::HASH1),
    ("hash2", spr::HASH2),
    ("imiss", spr::IMISS),
    ("icmp", spr::ICMP),
    ("rpa", spr::RPA),
];

/// Report every architectural and bookkeeping field of the state.
pub fn register(sink: &mut dyn SymbolSink) {
    for n in 0..NUM_GPRS {
        sink.symbol(&format!("r{n}"), cpu::r_offset(n) as usize, 4);
    }
    for n in 0..NUM_FPRS {
        sink.symbol(&format!("f{n}"), cpu::f_offset(n) as usize, 8);
    }
    for n in 0..NUM_CR_FIELDS {
        sink.symbol(&format!("cr{n}"), cpu::cr_offset(n) as usize, 4);
    }
    for n in 0..NUM_SRS {
        sink.symbol(&format!("sr{n}"), cpu::sr_offset(n) as usize, 4);
    }
    for n in 0..4 {
        sink.symbol(&format!("tgpr{n}"), cpu::tgpr_offset(n) as usize, 4);
    }
    for n in 0..4 {
        sink.symbol(&format!("ibat{n}u"), cpu::spr_offset((spr::IBAT0U + 2 * n) as usize) as usize, 4);
        sink.symbol(&format!("ibat{n}l"), cpu::spr_offset((spr::IBAT0U + 2 * n + 1) as usize) as usize, 4);
        sink.symbol(&format!("dbat{n}u"), cpu::spr_offset((spr::IBAT0U + 8 + 2 * n) as usize) as usize, 4);
        sink.symbol(&format!("dbat{n}l"), cpu::spr_offset((spr::IBAT0U + 9 + 2 * n) as usize) as usize, 4);
    }
    for &(name, n) in NAMED_SPRS {
        sink.symbol(name, cpu::spr_offset(n as usize) as usize, 4);
    }

    macro_rules! field {
        ($($name:ident),* $(,)?) => {
            $(sink.symbol(
                stringify!($name),
                offset_of!(PpcState, $name),
                size_of_field(|s: &PpcState| &s.$name),
            );)*
        };
    }
    field!(
        xer, lr, ctr, msr, pc, mode, fpscr, icount, irq_pending, reserve, reserve_addr,
        fault_opcode, cycles_base, slice_budget, tb_divisor, tb_zero_cycles,
        dec_zero_cycles, dec_next_fire, cmp_cr, cmpl_cr, sz_cr, fcmp_cr, ov_xer,
    );
}

fn size_of_field<F, T>(_f: F) -> usize
where
    F: Fn(&PpcState) -> &T,
{
    size_of::<T>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Collect(Vec<(String, usize, usize)>);

    impl SymbolSink for Collect {
        fn symbol(&mut self, name: &str, offset: usize, size: usize) {
            self.0.push((name.to_string(), offset, size));
        }
    }

    #[test]
    fn fields_fit_in_state() {
        let mut c = Collect::default();
        register(&mut c);
        let total = size_of::<PpcState>();
        assert!(c.0.iter().all(|(_, off, size)| off + size <= total));
        let lookup = |name: &str| c.0.iter().find(|(n, _, _)| n == name).cloned();
        assert_eq!(lookup("r3").map(|e| e.1), Some(cpu::r_offset(3) as usize));
        assert_eq!(lookup("cmp_cr").map(|e| e.2), Some(128));
        assert_eq!(lookup("srr0").map(|e| e.1), Some(cpu::spr_offset(spr::SRR0 as usize) as usize));
    }
}
