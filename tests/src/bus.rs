//! Flat big-endian memory shared by the frontend and exec tests.

use ppc_exec::Bus;

pub const MEM_SIZE: usize = 0x10000;

/// `b .`
pub const BRANCH_SELF: u32 = 0x4800_0000;

pub struct TestBus {
    pub mem: Vec<u8>,
    /// Code cannot be written by the guest; disables checksums.
    pub rom: bool,
}

impl TestBus {
    pub fn new() -> Self {
        Self {
            mem: vec![0; MEM_SIZE],
            rom: false,
        }
    }

    /// Store instruction words from `addr` on, big-endian.
    pub fn load(&mut self, addr: u32, words: &[u32]) {
        for (n, w) in words.iter().enumerate() {
            self.set_word(addr + 4 * n as u32, *w);
        }
    }

    /// Store instruction words the way a little-endian-mode guest
    /// fetches them: each word swapped with its doubleword partner.
    pub fn load_le(&mut self, addr: u32, words: &[u32]) {
        for (n, w) in words.iter().enumerate() {
            self.set_word((addr + 4 * n as u32) ^ 4, *w);
        }
    }

    pub fn set_word(&mut self, addr: u32, w: u32) {
        let a = addr as usize;
        self.mem[a..a + 4].copy_from_slice(&w.to_be_bytes());
    }

    pub fn word(&self, addr: u32) -> u32 {
        let a = addr as usize;
        u32::from_be_bytes([self.mem[a], self.mem[a + 1], self.mem[a + 2], self.mem[a + 3]])
    }
}

impl Bus for TestBus {
    fn read(&mut self, addr: u32, size: u32) -> u64 {
        (0..size).fold(0, |acc, k| {
            let b = self.mem.get((addr + k) as usize).copied().unwrap_or(0);
            (acc << 8) | b as u64
        })
    }

    fn write(&mut self, addr: u32, size: u32, value: u64) {
        for k in 0..size {
            if let Some(b) = self.mem.get_mut((addr + k) as usize) {
                *b = (value >> (8 * (size - 1 - k))) as u8;
            }
        }
    }

    fn is_mapped(&self, addr: u32) -> bool {
        (addr as usize) < MEM_SIZE
    }

    fn is_writable(&self, addr: u32) -> bool {
        !self.rom && (addr as usize) < MEM_SIZE
    }
}
