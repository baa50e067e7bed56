//! Instruction word field extraction.
//!
//! Bit numbering follows the architecture books: bit 0 is the MSB.
//! `field(op, start, len)` extracts bits `start..start+len`.

#[inline]
const fn field(op: u32, start: u32, len: u32) -> u32 {
    (op >> (32 - start - len)) & ((1 << len) - 1)
}

/// Primary opcode.
pub const fn opcd(op: u32) -> u32 {
    field(op, 0, 6)
}

/// Extended opcode of X/XL/XFX forms (bits 21..30).
pub const fn xo10(op: u32) -> u32 {
    field(op, 21, 10)
}

/// Extended opcode of XO forms (bits 22..30).
pub const fn xo9(op: u32) -> u32 {
    field(op, 22, 9)
}

/// Extended opcode of A forms (bits 26..30).
pub const fn xo5(op: u32) -> u32 {
    field(op, 26, 5)
}

pub const fn rd(op: u32) -> usize {
    field(op, 6, 5) as usize
}

pub const fn rs(op: u32) -> usize {
    rd(op)
}

pub const fn ra(op: u32) -> usize {
    field(op, 11, 5) as usize
}

pub const fn rb(op: u32) -> usize {
    field(op, 16, 5) as usize
}

pub const fn rc_reg(op: u32) -> usize {
    field(op, 21, 5) as usize
}

/// Record bit.
pub const fn rc(op: u32) -> bool {
    op & 1 != 0
}

/// Overflow-enable bit of XO forms.
pub const fn oe(op: u32) -> bool {
    op & 0x400 != 0
}

pub const fn simm(op: u32) -> i32 {
    op as u16 as i16 as i32
}

pub const fn uimm(op: u32) -> u32 {
    op & 0xffff
}

/// Sign-extended branch displacement of I-form branches.
pub const fn li(op: u32) -> i32 {
    ((op & 0x03ff_fffc) << 6) as i32 >> 6
}

/// Sign-extended displacement of B-form branches.
pub const fn bd(op: u32) -> i32 {
    (op & 0xfffc) as u16 as i16 as i32
}

pub const fn aa(op: u32) -> bool {
    op & 2 != 0
}

pub const fn lk(op: u32) -> bool {
    op & 1 != 0
}

pub const fn bo(op: u32) -> u32 {
    field(op, 6, 5)
}

pub const fn bi(op: u32) -> u32 {
    field(op, 11, 5)
}

/// CR bit operands of XL-form CR logic.
pub const fn crbd(op: u32) -> u32 {
    field(op, 6, 5)
}

pub const fn crba(op: u32) -> u32 {
    field(op, 11, 5)
}

pub const fn crbb(op: u32) -> u32 {
    field(op, 16, 5)
}

pub const fn crfd(op: u32) -> usize {
    field(op, 6, 3) as usize
}

pub const fn crfs(op: u32) -> usize {
    field(op, 11, 3) as usize
}

/// Compare L bit; must be clear on 32-bit cores.
pub const fn cmp_l(op: u32) -> bool {
    field(op, 10, 1) != 0
}

pub const fn sh(op: u32) -> u32 {
    field(op, 16, 5)
}

pub const fn mb(op: u32) -> u32 {
    field(op, 21, 5)
}

pub const fn me(op: u32) -> u32 {
    field(op, 26, 5)
}

/// Trap condition bits.
pub const fn to(op: u32) -> u32 {
    field(op, 6, 5)
}

/// Byte count of `lswi`/`stswi`; zero means 32.
pub const fn nb(op: u32) -> u32 {
    match field(op, 16, 5) {
        0 => 32,
        n => n,
    }
}

/// SPR number with the two 5-bit halves swapped back.
pub const fn spr(op: u32) -> u32 {
    let f = field(op, 11, 10);
    ((f & 0x1f) << 5) | (f >> 5)
}

pub const fn sr(op: u32) -> usize {
    field(op, 12, 4) as usize
}

/// Field mask of `mtcrf`.
pub const fn crm(op: u32) -> u32 {
    field(op, 12, 8)
}

/// Field mask of `mtfsf`.
pub const fn fm(op: u32) -> u32 {
    field(op, 7, 8)
}

/// Immediate of `mtfsfi`.
pub const fn fpimm(op: u32) -> u32 {
    field(op, 16, 4)
}

/// Rotate mask for `rlw*`: ones from bit `mb` through bit `me`,
/// wrapping when `mb > me`.
pub const fn rot_mask(mb: u32, me: u32) -> u32 {
    let begin = 0xffff_ffffu32 >> mb;
    let end = 0xffff_ffffu32 << (31 - me);
    if mb <= me {
        begin & end
    } else {
        begin | end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_fields() {
        // addi r3, r1, -8
        let op = 0x3861_fff8;
        assert_eq!(opcd(op), 14);
        assert_eq!(rd(op), 3);
        assert_eq!(ra(op), 1);
        assert_eq!(simm(op), -8);
        // mflr r0
        let op = 0x7c08_02a6;
        assert_eq!(opcd(op), 31);
        assert_eq!(xo10(op), 339);
        assert_eq!(spr(op), 8);
    }

    #[test]
    fn branch_displacements() {
        // b -4
        assert_eq!(li(0x4bff_fffc), -4);
        // bne cr0, +8
        let op = 0x4082_0008;
        assert_eq!(bo(op), 4);
        assert_eq!(bi(op), 2);
        assert_eq!(bd(op), 8);
    }

    #[test]
    fn masks() {
        assert_eq!(rot_mask(0, 31), 0xffff_ffff);
        assert_eq!(rot_mask(16, 31), 0x0000_ffff);
        assert_eq!(rot_mask(30, 1), 0xc000_0003);
    }
}
