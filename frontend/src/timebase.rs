//! Timebase and decrementer.
//!
//! Neither counter is stored directly. Both derive from the running
//! cycle count: the timebase from the cycle at which it read zero,
//! the decrementer from the cycle at which it reaches zero. One tick
//! is `tb_divisor` cycles.

use crate::cpu::PpcState;

/// Cycles between two decrementer interrupts when nothing reloads it.
pub fn dec_period(state: &PpcState) -> u64 {
    divisor(state) << 32
}

fn divisor(state: &PpcState) -> u64 {
    state.tb_divisor.max(1) as u64
}

/// Current cycle count. `pending` is the not yet committed cost of
/// the running sequence.
pub fn now(state: &PpcState, pending: u32) -> u64 {
    let elapsed = state.slice_budget as i64 - state.icount as i64 + pending as i64;
    state.cycles_base.wrapping_add_signed(elapsed)
}

pub fn read_timebase(state: &PpcState, now: u64) -> u64 {
    now.wrapping_sub(state.tb_zero_cycles) / divisor(state)
}

pub fn write_timebase(state: &mut PpcState, now: u64, value: u64) {
    state.tb_zero_cycles = now.wrapping_sub(value.wrapping_mul(divisor(state)));
}

/// Decrementer value, rounded so that it reads zero for the whole
/// tick before it wraps.
pub fn read_decrementer(state: &PpcState, now: u64) -> u32 {
    let diff = state.dec_zero_cycles as i128 - now as i128;
    let div = divisor(state) as i128;
    let ticks = -((-diff).div_euclid(div));
    ticks as u32
}

/// Reload the decrementer and schedule its next interrupt.
pub fn write_decrementer(state: &mut PpcState, now: u64, value: u32) {
    let div = divisor(state);
    state.dec_zero_cycles = now.wrapping_add(value as u64 * div);
    state.dec_next_fire = state.dec_zero_cycles.wrapping_add(div);
}

/// Shorten the running slice so that execution stops by the next
/// decrementer interrupt. `pending` cycles are already spent.
pub fn clamp_slice(state: &mut PpcState, now: u64, pending: u32) {
    let remaining = state.icount as i64 - pending as i64;
    if remaining <= 0 || state.dec_next_fire <= now {
        return;
    }
    let until = state.dec_next_fire - now;
    if until < remaining as u64 {
        let delta = (remaining as u64 - until) as i32;
        state.icount -= delta;
        state.slice_budget -= delta;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(div: u32) -> PpcState {
        let mut s = PpcState::new();
        s.tb_divisor = div;
        s
    }

    #[test]
    fn now_counts_consumed_and_pending() {
        let mut s = state(1);
        s.cycles_base = 1000;
        s.slice_budget = 100;
        s.icount = 40;
        assert_eq!(now(&s, 0), 1060);
        assert_eq!(now(&s, 5), 1065);
    }

    #[test]
    fn timebase_ticks_per_divisor() {
        let mut s = state(4);
        write_timebase(&mut s, 100, 10);
        assert_eq!(read_timebase(&s, 100), 10);
        assert_eq!(read_timebase(&s, 103), 10);
        assert_eq!(read_timebase(&s, 104), 11);
    }

    #[test]
    fn decrementer_counts_down_and_wraps() {
        let mut s = state(4);
        write_decrementer(&mut s, 0, 2);
        assert_eq!(read_decrementer(&s, 0), 2);
        assert_eq!(read_decrementer(&s, 1), 2);
        assert_eq!(read_decrementer(&s, 4), 1);
        assert_eq!(read_decrementer(&s, 8), 0);
        assert_eq!(read_decrementer(&s, 11), 0);
        assert_eq!(read_decrementer(&s, 12), 0xffff_ffff);
        assert_eq!(s.dec_next_fire, 12);
    }

    #[test]
    fn clamp_stops_slice_at_fire_point() {
        let mut s = state(1);
        s.slice_budget = 1000;
        s.icount = 1000;
        write_decrementer(&mut s, 0, 9);
        clamp_slice(&mut s, 0, 0);
        assert_eq!(s.icount, 10);
        assert_eq!(s.slice_budget, 10);
        assert_eq!(now(&s, 0), 0);
    }
}
