//! Minimal PowerPC instruction encoder for test programs.

fn d_form(op: u32, rd: u32, ra: u32, imm: i32) -> u32 {
    (op << 26) | (rd << 21) | (ra << 16) | (imm as u32 & 0xffff)
}

fn x_form(rd: u32, ra: u32, rb: u32, xo: u32, rc: bool) -> u32 {
    (31 << 26) | (rd << 21) | (ra << 16) | (rb << 11) | (xo << 1) | rc as u32
}

pub fn addi(rd: u32, ra: u32, imm: i32) -> u32 {
    d_form(14, rd, ra, imm)
}

pub fn li(rd: u32, imm: i32) -> u32 {
    addi(rd, 0, imm)
}

pub fn lwz(rd: u32, ra: u32, disp: i32) -> u32 {
    d_form(32, rd, ra, disp)
}

pub fn stw(rs: u32, ra: u32, disp: i32) -> u32 {
    d_form(36, rs, ra, disp)
}

pub fn lhz(rd: u32, ra: u32, disp: i32) -> u32 {
    d_form(40, rd, ra, disp)
}

pub fn add(rd: u32, ra: u32, rb: u32) -> u32 {
    x_form(rd, ra, rb, 266, false)
}

pub fn add_rc(rd: u32, ra: u32, rb: u32) -> u32 {
    x_form(rd, ra, rb, 266, true)
}

pub fn subfc(rd: u32, ra: u32, rb: u32) -> u32 {
    x_form(rd, ra, rb, 8, false)
}

pub fn cmpw(crf: u32, ra: u32, rb: u32) -> u32 {
    x_form(crf << 2, ra, rb, 0, false)
}

pub fn cmplw(crf: u32, ra: u32, rb: u32) -> u32 {
    x_form(crf << 2, ra, rb, 32, false)
}

/// `mtspr spr, rs`
pub fn mtspr(spr: u32, rs: u32) -> u32 {
    let field = ((spr & 0x1f) << 5) | (spr >> 5);
    (31 << 26) | (rs << 21) | (field << 11) | (467 << 1)
}

/// `mfspr rd, spr`
pub fn mfspr(rd: u32, spr: u32) -> u32 {
    let field = ((spr & 0x1f) << 5) | (spr >> 5);
    (31 << 26) | (rd << 21) | (field << 11) | (339 << 1)
}

/// Relative branch by `offset` bytes.
pub fn b(offset: i32) -> u32 {
    (18 << 26) | (offset as u32 & 0x03ff_fffc)
}

/// `tdi`: 64-bit only, never implemented by a 32-bit core.
pub fn tdi(to: u32, ra: u32, imm: i32) -> u32 {
    d_form(2, to, ra, imm)
}

/// Conditional branch by `offset` bytes.
pub fn bc(bo: u32, bi: u32, offset: i32) -> u32 {
    (16 << 26) | (bo << 21) | (bi << 16) | (offset as u32 & 0xfffc)
}

/// `bdnz`: decrement CTR, branch while it is non-zero.
pub fn bdnz(offset: i32) -> u32 {
    bc(16, 0, offset)
}

pub fn lswi(rd: u32, ra: u32, nb: u32) -> u32 {
    x_form(rd, ra, nb, 597, false)
}

pub fn stswi(rs: u32, ra: u32, nb: u32) -> u32 {
    x_form(rs, ra, nb, 725, false)
}

pub fn lswx(rd: u32, ra: u32, rb: u32) -> u32 {
    x_form(rd, ra, rb, 533, false)
}

pub fn stswx(rs: u32, ra: u32, rb: u32) -> u32 {
    x_form(rs, ra, rb, 661, false)
}

pub fn lwarx(rd: u32, ra: u32, rb: u32) -> u32 {
    x_form(rd, ra, rb, 20, false)
}

/// `stwcx.`: always the record form.
pub fn stwcx(rs: u32, ra: u32, rb: u32) -> u32 {
    x_form(rs, ra, rb, 150, true)
}

pub fn mfcr(rd: u32) -> u32 {
    x_form(rd, 0, 0, 19, false)
}

pub fn tw(to: u32, ra: u32, rb: u32) -> u32 {
    x_form(to, ra, rb, 4, false)
}

pub fn twi(to: u32, ra: u32, imm: i32) -> u32 {
    d_form(3, to, ra, imm)
}

pub const RFI: u32 = 0x4c00_0064;

fn a_form(op: u32, frd: u32, fra: u32, frb: u32, xo: u32, rc: bool) -> u32 {
    (op << 26) | (frd << 21) | (fra << 16) | (frb << 11) | (xo << 1) | rc as u32
}

pub fn fadd(frd: u32, fra: u32, frb: u32) -> u32 {
    a_form(63, frd, fra, frb, 21, false)
}

/// `fadd.`: CR1 receives the FPSCR exception summary.
pub fn fadd_rc(frd: u32, fra: u32, frb: u32) -> u32 {
    a_form(63, frd, fra, frb, 21, true)
}
