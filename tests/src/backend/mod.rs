//! Portable backend: unit commit rules, dispatch and execution.

use drc_backend::{Backend, BackendError, Machine, PortableBackend};
use drc_core::{BlockKey, Context, MapVar, TempIdx, Type};

/// Eight 32-bit state words and a small flat memory.
struct TestMachine {
    state: Box<[u32; 8]>,
    mem: Vec<u8>,
}

impl TestMachine {
    fn new() -> Self {
        Self {
            state: Box::new([0; 8]),
            mem: vec![0; 256],
        }
    }
}

impl Machine for TestMachine {
    fn env_ptr(&mut self) -> *mut u8 {
        self.state.as_mut_ptr().cast()
    }

    fn read(&mut self, addr: u32, size: u32) -> u64 {
        let a = addr as usize;
        self.mem[a..a + size as usize]
            .iter()
            .fold(0, |acc, &b| (acc << 8) | b as u64)
    }

    fn write(&mut self, addr: u32, size: u32, value: u64) {
        let a = addr as usize;
        for k in 0..size as usize {
            self.mem[a + k] = (value >> (8 * (size as usize - 1 - k))) as u8;
        }
    }
}

fn double(_m: &mut TestMachine, args: &[u64]) -> u64 {
    args[0] * 2
}

struct Fixture {
    be: PortableBackend<TestMachine>,
    ctx: Context,
    g: [TempIdx; 4],
}

fn fixture() -> Fixture {
    let mut ctx = Context::new();
    let g = [
        ctx.new_global(Type::I32, 0, "g0"),
        ctx.new_global(Type::I32, 4, "g1"),
        ctx.new_global(Type::I32, 8, "g2"),
        ctx.new_global(Type::I32, 12, "g3"),
    ];
    Fixture {
        be: PortableBackend::new(4096),
        ctx,
        g,
    }
}

#[test]
fn handle_runs_until_exit() {
    let Fixture { mut be, mut ctx, g } = fixture();
    let entry = be.alloc_handle("entry");
    ctx.reset();
    ctx.gen_handle(entry);
    ctx.gen_add(Type::I32, g[0], g[0], g[1]);
    ctx.gen_exiti(7);
    be.compile(&ctx).unwrap();
    assert!(be.handle_defined(entry));
    assert_eq!(be.handle_name(entry), "entry");

    let mut m = TestMachine::new();
    m.state[0] = 3;
    m.state[1] = 4;
    let st = unsafe { be.execute(entry, &mut m) };
    assert_eq!(st.code, 7);
    assert_eq!(m.state[0], 7);
}

#[test]
fn hash_miss_calls_nocode_with_pc() {
    let Fixture { mut be, mut ctx, g } = fixture();
    let entry = be.alloc_handle("entry");
    let nocode = be.alloc_handle("nocode");

    ctx.reset();
    ctx.gen_handle(nocode);
    ctx.gen_getexp(g[1]);
    ctx.gen_exiti(1);
    be.compile(&ctx).unwrap();

    ctx.reset();
    ctx.gen_handle(entry);
    let mode = ctx.const_i32(0);
    let pc = ctx.const_i32(0x40);
    ctx.gen_hashjmp(mode, pc, nocode);
    be.compile(&ctx).unwrap();

    let mut m = TestMachine::new();
    let st = unsafe { be.execute(entry, &mut m) };
    assert_eq!(st.code, 1);
    assert_eq!(m.state[1], 0x40);

    ctx.reset();
    ctx.gen_hash(0, 0x40);
    ctx.gen_movi(Type::I32, g[0], 99);
    ctx.gen_exiti(0);
    be.compile(&ctx).unwrap();
    assert!(be.hash_exists(BlockKey::new(0, 0x40)));
    assert!(!be.hash_exists(BlockKey::new(1, 0x40)));

    let st = unsafe { be.execute(entry, &mut m) };
    assert_eq!(st.code, 0);
    assert_eq!(m.state[0], 99);
}

#[test]
fn hash_entries_may_be_redefined() {
    let Fixture { mut be, mut ctx, g } = fixture();
    let entry = be.alloc_handle("entry");
    ctx.reset();
    ctx.gen_handle(entry);
    let mode = ctx.const_i32(0);
    let pc = ctx.const_i32(0x80);
    ctx.gen_hashjmp(mode, pc, entry);
    be.compile(&ctx).unwrap();

    for value in [1, 2] {
        ctx.reset();
        ctx.gen_hash(0, 0x80);
        ctx.gen_movi(Type::I32, g[2], value);
        ctx.gen_exiti(0);
        be.compile(&ctx).unwrap();
    }

    let mut m = TestMachine::new();
    unsafe { be.execute(entry, &mut m) };
    assert_eq!(m.state[2], 2);
    assert_eq!(be.stats().hash_entries, 1);
}

#[test]
fn failed_unit_commits_nothing() {
    let Fixture { mut be, mut ctx, .. } = fixture();
    let h = be.alloc_handle("twice");
    ctx.reset();
    ctx.gen_handle(h);
    ctx.gen_exiti(0);
    be.compile(&ctx).unwrap();
    let before = be.stats();

    ctx.reset();
    ctx.gen_hash(0, 0x100);
    ctx.gen_handle(h);
    ctx.gen_exiti(0);
    let err = be.compile(&ctx).unwrap_err();
    assert!(matches!(err, BackendError::HandleRedefined(ref n) if n == "twice"));
    assert!(!be.hash_exists(BlockKey::new(0, 0x100)));
    assert_eq!(be.stats(), before);
}

#[test]
fn unplaced_label_is_an_error() {
    let Fixture { mut be, mut ctx, .. } = fixture();
    ctx.reset();
    let l = ctx.new_label();
    ctx.gen_br(l);
    assert!(matches!(
        be.compile(&ctx),
        Err(BackendError::UndefinedLabel(0))
    ));
}

#[test]
fn writing_a_constant_is_an_error() {
    let Fixture { mut be, mut ctx, g } = fixture();
    ctx.reset();
    let c = ctx.const_i32(1);
    ctx.gen_mov(Type::I32, c, g[0]);
    assert!(matches!(be.compile(&ctx), Err(BackendError::ConstOutput(_))));
}

#[test]
fn cache_full_reports_sizes() {
    let mut ctx = Context::new();
    let g = ctx.new_global(Type::I32, 0, "g0");
    let mut be: PortableBackend<TestMachine> = PortableBackend::new(4);
    ctx.reset();
    for _ in 0..8 {
        ctx.gen_movi(Type::I32, g, 1);
    }
    match be.compile(&ctx) {
        Err(BackendError::CacheFull { needed, remaining }) => {
            assert_eq!(needed, 8);
            assert_eq!(remaining, 4);
        }
        other => panic!("expected CacheFull, got {other:?}"),
    }
    assert_eq!(be.stats().used, 0);
}

#[test]
fn reset_drops_code_but_keeps_helpers() {
    let Fixture { mut be, mut ctx, g } = fixture();
    let id = be.register_helper("double", double);
    let entry = be.alloc_handle("entry");
    ctx.reset();
    ctx.gen_handle(entry);
    ctx.gen_hash(0, 0);
    ctx.gen_exiti(0);
    be.compile(&ctx).unwrap();
    be.reset();
    let s = be.stats();
    assert_eq!((s.used, s.hash_entries, s.handles, s.units), (0, 0, 0, 0));

    let entry = be.alloc_handle("entry");
    ctx.reset();
    ctx.gen_handle(entry);
    ctx.gen_call(g[3], id, &[g[0]]);
    ctx.gen_exiti(0);
    be.compile(&ctx).unwrap();

    let mut m = TestMachine::new();
    m.state[0] = 21;
    unsafe { be.execute(entry, &mut m) };
    assert_eq!(m.state[3], 42);
}

#[test]
fn unknown_helper_is_rejected() {
    let Fixture { mut be, mut ctx, g } = fixture();
    ctx.reset();
    ctx.gen_call(g[0], drc_core::HelperId(3), &[]);
    assert!(matches!(be.compile(&ctx), Err(BackendError::UnknownHelper(3))));
}

#[test]
fn recover_reads_the_calling_checkpoint() {
    let Fixture { mut be, mut ctx, g } = fixture();
    let entry = be.alloc_handle("entry");
    let fault = be.alloc_handle("fault");

    ctx.reset();
    ctx.gen_handle(fault);
    ctx.gen_recover(g[1], MapVar::Pc);
    ctx.gen_recover(g[2], MapVar::Cycles);
    ctx.gen_getexp(g[3]);
    ctx.gen_exiti(2);
    be.compile(&ctx).unwrap();

    ctx.reset();
    ctx.gen_handle(entry);
    ctx.gen_mapvar(MapVar::Pc, 0x1000);
    ctx.gen_mapvar(MapVar::Cycles, 1);
    ctx.gen_mapvar(MapVar::Pc, 0x1004);
    ctx.gen_mapvar(MapVar::Cycles, 2);
    let p = ctx.const_i32(0x55);
    ctx.gen_exh(fault, p);
    be.compile(&ctx).unwrap();

    let mut m = TestMachine::new();
    let st = unsafe { be.execute(entry, &mut m) };
    assert_eq!(st.code, 2);
    assert_eq!(m.state[1], 0x1004);
    assert_eq!(m.state[2], 2);
    assert_eq!(m.state[3], 0x55);
}

#[test]
fn bus_ops_reach_the_machine() {
    let Fixture { mut be, mut ctx, g } = fixture();
    let entry = be.alloc_handle("entry");
    ctx.reset();
    ctx.gen_handle(entry);
    let a = ctx.const_i32(0x10);
    ctx.gen_read(Type::I32, g[0], a, 4);
    let b = ctx.const_i32(0x20);
    ctx.gen_write(Type::I32, b, g[0], 2);
    ctx.gen_exiti(0);
    be.compile(&ctx).unwrap();

    let mut m = TestMachine::new();
    m.mem[0x10..0x14].copy_from_slice(&[0x12, 0x34, 0x56, 0x78]);
    unsafe { be.execute(entry, &mut m) };
    assert_eq!(m.state[0], 0x1234_5678);
    assert_eq!(&m.mem[0x20..0x22], &[0x56, 0x78]);
}
