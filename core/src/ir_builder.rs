use crate::block::{Handle, HelperId, MapVar};
use crate::context::Context;
use crate::op::Op;
use crate::opcode::Opcode;
use crate::temp::TempIdx;
use crate::types::{Cond, Flags, Type};

// Constant args are encoded as TempIdx(raw_value as u32).
fn carg(val: u32) -> TempIdx {
    TempIdx(val)
}

/// Maximum number of arguments passed to a helper by `Call`.
pub const MAX_CALL_ARGS: usize = 4;

impl Context {
    // -- Internal helpers --

    fn emit(&mut self, opc: Opcode, ty: Type, args: &[TempIdx]) {
        self.emit_op(Op::new(opc, ty, Flags::NONE, args));
    }

    fn emit_flags(
        &mut self,
        opc: Opcode,
        ty: Type,
        flags: Flags,
        args: &[TempIdx],
    ) {
        self.emit_op(Op::new(opc, ty, flags, args));
    }

    /// Emit any two-input, one-output op, optionally updating flags.
    pub fn gen_binop(
        &mut self,
        opc: Opcode,
        ty: Type,
        d: TempIdx,
        a: TempIdx,
        b: TempIdx,
        flags: Flags,
    ) -> TempIdx {
        self.emit_flags(opc, ty, flags, &[d, a, b]);
        d
    }

    /// Emit any one-input, one-output op, optionally updating flags.
    pub fn gen_unop(
        &mut self,
        opc: Opcode,
        ty: Type,
        d: TempIdx,
        s: TempIdx,
        flags: Flags,
    ) -> TempIdx {
        self.emit_flags(opc, ty, flags, &[d, s]);
        d
    }

    // -- Binary ALU (1 oarg, 2 iargs) --

    pub fn gen_add(
        &mut self,
        ty: Type,
        d: TempIdx,
        a: TempIdx,
        b: TempIdx,
    ) -> TempIdx {
        self.gen_binop(Opcode::Add, ty, d, a, b, Flags::NONE)
    }

    /// d = a + b + C
    pub fn gen_addc(
        &mut self,
        ty: Type,
        d: TempIdx,
        a: TempIdx,
        b: TempIdx,
        flags: Flags,
    ) -> TempIdx {
        self.gen_binop(Opcode::AddC, ty, d, a, b, flags)
    }

    pub fn gen_sub(
        &mut self,
        ty: Type,
        d: TempIdx,
        a: TempIdx,
        b: TempIdx,
    ) -> TempIdx {
        self.gen_binop(Opcode::Sub, ty, d, a, b, Flags::NONE)
    }

    pub fn gen_mul(
        &mut self,
        ty: Type,
        d: TempIdx,
        a: TempIdx,
        b: TempIdx,
    ) -> TempIdx {
        self.gen_binop(Opcode::Mul, ty, d, a, b, Flags::NONE)
    }

    pub fn gen_and(
        &mut self,
        ty: Type,
        d: TempIdx,
        a: TempIdx,
        b: TempIdx,
    ) -> TempIdx {
        self.gen_binop(Opcode::And, ty, d, a, b, Flags::NONE)
    }

    pub fn gen_or(
        &mut self,
        ty: Type,
        d: TempIdx,
        a: TempIdx,
        b: TempIdx,
    ) -> TempIdx {
        self.gen_binop(Opcode::Or, ty, d, a, b, Flags::NONE)
    }

    pub fn gen_xor(
        &mut self,
        ty: Type,
        d: TempIdx,
        a: TempIdx,
        b: TempIdx,
    ) -> TempIdx {
        self.gen_binop(Opcode::Xor, ty, d, a, b, Flags::NONE)
    }

    pub fn gen_shl(
        &mut self,
        ty: Type,
        d: TempIdx,
        a: TempIdx,
        b: TempIdx,
    ) -> TempIdx {
        self.gen_binop(Opcode::Shl, ty, d, a, b, Flags::NONE)
    }

    pub fn gen_shr(
        &mut self,
        ty: Type,
        d: TempIdx,
        a: TempIdx,
        b: TempIdx,
    ) -> TempIdx {
        self.gen_binop(Opcode::Shr, ty, d, a, b, Flags::NONE)
    }

    pub fn gen_sar(
        &mut self,
        ty: Type,
        d: TempIdx,
        a: TempIdx,
        b: TempIdx,
    ) -> TempIdx {
        self.gen_binop(Opcode::Sar, ty, d, a, b, Flags::NONE)
    }

    pub fn gen_rotl(
        &mut self,
        ty: Type,
        d: TempIdx,
        a: TempIdx,
        b: TempIdx,
    ) -> TempIdx {
        self.gen_binop(Opcode::RotL, ty, d, a, b, Flags::NONE)
    }

    pub fn gen_andc(
        &mut self,
        ty: Type,
        d: TempIdx,
        a: TempIdx,
        b: TempIdx,
    ) -> TempIdx {
        self.gen_binop(Opcode::AndC, ty, d, a, b, Flags::NONE)
    }

    pub fn gen_mulsh(
        &mut self,
        ty: Type,
        d: TempIdx,
        a: TempIdx,
        b: TempIdx,
    ) -> TempIdx {
        self.gen_binop(Opcode::MulSH, ty, d, a, b, Flags::NONE)
    }

    pub fn gen_muluh(
        &mut self,
        ty: Type,
        d: TempIdx,
        a: TempIdx,
        b: TempIdx,
    ) -> TempIdx {
        self.gen_binop(Opcode::MulUH, ty, d, a, b, Flags::NONE)
    }

    // -- Unary --

    pub fn gen_mov(&mut self, ty: Type, d: TempIdx, s: TempIdx) -> TempIdx {
        if d != s {
            self.emit(Opcode::Mov, ty, &[d, s]);
        }
        d
    }

    /// d = constant
    pub fn gen_movi(&mut self, ty: Type, d: TempIdx, val: u64) -> TempIdx {
        let c = self.new_const(ty, val);
        self.gen_mov(ty, d, c)
    }

    pub fn gen_not(&mut self, ty: Type, d: TempIdx, s: TempIdx) -> TempIdx {
        self.gen_unop(Opcode::Not, ty, d, s, Flags::NONE)
    }

    pub fn gen_clz(&mut self, ty: Type, d: TempIdx, s: TempIdx) -> TempIdx {
        self.gen_unop(Opcode::Clz, ty, d, s, Flags::NONE)
    }

    pub fn gen_bswap16(
        &mut self,
        ty: Type,
        d: TempIdx,
        s: TempIdx,
    ) -> TempIdx {
        self.gen_unop(Opcode::Bswap16, ty, d, s, Flags::NONE)
    }

    pub fn gen_bswap32(
        &mut self,
        ty: Type,
        d: TempIdx,
        s: TempIdx,
    ) -> TempIdx {
        self.gen_unop(Opcode::Bswap32, ty, d, s, Flags::NONE)
    }

    pub fn gen_bswap64(&mut self, d: TempIdx, s: TempIdx) -> TempIdx {
        self.gen_unop(Opcode::Bswap64, Type::I64, d, s, Flags::NONE)
    }

    /// Sign-extend the low `bits` bits of `s`.
    pub fn gen_sext(
        &mut self,
        ty: Type,
        d: TempIdx,
        s: TempIdx,
        bits: u32,
    ) -> TempIdx {
        self.emit(Opcode::Sext, ty, &[d, s, carg(bits)]);
        d
    }

    // -- Type conversion --

    pub fn gen_extu_i32_i64(&mut self, d: TempIdx, s: TempIdx) -> TempIdx {
        self.emit(Opcode::ExtUI32I64, Type::I64, &[d, s]);
        d
    }

    pub fn gen_extrl_i64_i32(&mut self, d: TempIdx, s: TempIdx) -> TempIdx {
        self.emit(Opcode::ExtrlI64I32, Type::I32, &[d, s]);
        d
    }

    pub fn gen_extrh_i64_i32(&mut self, d: TempIdx, s: TempIdx) -> TempIdx {
        self.emit(Opcode::ExtrhI64I32, Type::I32, &[d, s]);
        d
    }

    // -- Compare / flags --

    /// d = (a cond b) ? 1 : 0
    pub fn gen_setcond(
        &mut self,
        ty: Type,
        d: TempIdx,
        a: TempIdx,
        b: TempIdx,
        cond: Cond,
    ) -> TempIdx {
        self.emit(Opcode::SetCond, ty, &[d, a, b, carg(cond as u32)]);
        d
    }

    /// Set flags from `a - b` without producing a result.
    pub fn gen_cmp(&mut self, ty: Type, a: TempIdx, b: TempIdx, flags: Flags) {
        self.emit_flags(Opcode::Cmp, ty, flags, &[a, b]);
    }

    /// Set flags from `a & b` without producing a result.
    pub fn gen_test(
        &mut self,
        ty: Type,
        a: TempIdx,
        b: TempIdx,
        flags: Flags,
    ) {
        self.emit_flags(Opcode::Test, ty, flags, &[a, b]);
    }

    /// d = flags & mask, as a 5-bit table index.
    pub fn gen_getflags(&mut self, d: TempIdx, mask: Flags) -> TempIdx {
        self.emit(Opcode::GetFlags, Type::I32, &[d, carg(mask.bits() as u32)]);
        d
    }

    /// Load the carry flag from bit `bit` of `src`.
    pub fn gen_setcarry(&mut self, ty: Type, src: TempIdx, bit: u32) {
        self.emit(Opcode::SetCarry, ty, &[src, carg(bit)]);
    }

    // -- Floating point --

    pub fn gen_fbinop(
        &mut self,
        opc: Opcode,
        d: TempIdx,
        a: TempIdx,
        b: TempIdx,
    ) -> TempIdx {
        self.emit(opc, Type::I64, &[d, a, b]);
        d
    }

    pub fn gen_funop(&mut self, opc: Opcode, d: TempIdx, s: TempIdx) -> TempIdx {
        self.emit(opc, Type::I64, &[d, s]);
        d
    }

    /// d = a * b + c, rounded once.
    pub fn gen_fmadd(
        &mut self,
        d: TempIdx,
        a: TempIdx,
        b: TempIdx,
        c: TempIdx,
    ) -> TempIdx {
        self.emit(Opcode::FMadd, Type::I64, &[d, a, b, c]);
        d
    }

    /// d = f64 -> i32 conversion of `s`; `rmode` holds the rounding
    /// mode (0 nearest, 1 toward zero, 2 up, 3 down).
    pub fn gen_fcti(
        &mut self,
        d: TempIdx,
        s: TempIdx,
        rmode: TempIdx,
    ) -> TempIdx {
        self.emit(Opcode::FCti, Type::I64, &[d, s, rmode]);
        d
    }

    pub fn gen_fcmp(&mut self, a: TempIdx, b: TempIdx, flags: Flags) {
        self.emit_flags(Opcode::FCmp, Type::I64, flags, &[a, b]);
    }

    // -- Host Ld/St (machine state and fast memory) --

    fn emit_sized_load(
        &mut self,
        opc: Opcode,
        ty: Type,
        dst: TempIdx,
        base: TempIdx,
        offset: i64,
    ) -> TempIdx {
        self.emit(opc, ty, &[dst, base, carg(offset as u32)]);
        dst
    }

    /// Load: dst = *(base + offset), width of `ty`.
    pub fn gen_ld(
        &mut self,
        ty: Type,
        dst: TempIdx,
        base: TempIdx,
        offset: i64,
    ) -> TempIdx {
        self.emit_sized_load(Opcode::Ld, ty, dst, base, offset)
    }

    /// Load unsigned byte: dst = *(u8*)(base + offset)
    pub fn gen_ld8u(
        &mut self,
        ty: Type,
        dst: TempIdx,
        base: TempIdx,
        offset: i64,
    ) -> TempIdx {
        self.emit_sized_load(Opcode::Ld8U, ty, dst, base, offset)
    }

    /// Load unsigned halfword: dst = *(u16*)(base + offset)
    pub fn gen_ld16u(
        &mut self,
        ty: Type,
        dst: TempIdx,
        base: TempIdx,
        offset: i64,
    ) -> TempIdx {
        self.emit_sized_load(Opcode::Ld16U, ty, dst, base, offset)
    }

    /// Load unsigned word: dst = *(u32*)(base + offset)
    pub fn gen_ld32u(
        &mut self,
        ty: Type,
        dst: TempIdx,
        base: TempIdx,
        offset: i64,
    ) -> TempIdx {
        self.emit_sized_load(Opcode::Ld32U, ty, dst, base, offset)
    }

    fn emit_sized_store(
        &mut self,
        opc: Opcode,
        ty: Type,
        src: TempIdx,
        base: TempIdx,
        offset: i64,
    ) {
        self.emit(opc, ty, &[src, base, carg(offset as u32)]);
    }

    /// Store: *(base + offset) = src, width of `ty`.
    pub fn gen_st(&mut self, ty: Type, src: TempIdx, base: TempIdx, offset: i64) {
        self.emit_sized_store(Opcode::St, ty, src, base, offset);
    }

    /// Store byte: *(u8*)(base + offset) = src
    pub fn gen_st8(
        &mut self,
        ty: Type,
        src: TempIdx,
        base: TempIdx,
        offset: i64,
    ) {
        self.emit_sized_store(Opcode::St8, ty, src, base, offset);
    }

    /// Store halfword: *(u16*)(base + offset) = src
    pub fn gen_st16(
        &mut self,
        ty: Type,
        src: TempIdx,
        base: TempIdx,
        offset: i64,
    ) {
        self.emit_sized_store(Opcode::St16, ty, src, base, offset);
    }

    /// Store word: *(u32*)(base + offset) = src
    pub fn gen_st32(
        &mut self,
        ty: Type,
        src: TempIdx,
        base: TempIdx,
        offset: i64,
    ) {
        self.emit_sized_store(Opcode::St32, ty, src, base, offset);
    }

    // -- Guest bus --

    /// Bus read of `size` bytes at physical `addr`.
    pub fn gen_read(
        &mut self,
        ty: Type,
        dst: TempIdx,
        addr: TempIdx,
        size: u32,
    ) -> TempIdx {
        self.emit(Opcode::Read, ty, &[dst, addr, carg(size)]);
        dst
    }

    pub fn gen_readm(
        &mut self,
        ty: Type,
        dst: TempIdx,
        addr: TempIdx,
        mask: TempIdx,
        size: u32,
    ) -> TempIdx {
        self.emit(Opcode::ReadM, ty, &[dst, addr, mask, carg(size)]);
        dst
    }

    pub fn gen_write(
        &mut self,
        ty: Type,
        addr: TempIdx,
        val: TempIdx,
        size: u32,
    ) {
        self.emit(Opcode::Write, ty, &[addr, val, carg(size)]);
    }

    pub fn gen_writem(
        &mut self,
        ty: Type,
        addr: TempIdx,
        val: TempIdx,
        mask: TempIdx,
        size: u32,
    ) {
        self.emit(Opcode::WriteM, ty, &[addr, val, mask, carg(size)]);
    }

    /// dst (I64) = physical address of logical `addr`, or a fault code
    /// at or above `1 << 32` when the translation facility refuses.
    pub fn gen_translate(
        &mut self,
        dst: TempIdx,
        addr: TempIdx,
        intention: u32,
    ) -> TempIdx {
        self.emit(Opcode::Translate, Type::I64, &[dst, addr, carg(intention)]);
        dst
    }

    // -- Calls --

    /// Call a host helper: dst = helper(args[..4]).
    pub fn gen_call(
        &mut self,
        dst: TempIdx,
        helper: HelperId,
        args: &[TempIdx],
    ) -> TempIdx {
        assert!(args.len() <= MAX_CALL_ARGS, "too many helper args");
        let zero = self.new_const(Type::I32, 0);
        let mut full_args = Vec::with_capacity(1 + MAX_CALL_ARGS + 2);
        full_args.push(dst);
        for i in 0..MAX_CALL_ARGS {
            full_args.push(args.get(i).copied().unwrap_or(zero));
        }
        full_args.push(carg(helper.0));
        full_args.push(carg(args.len() as u32));
        let ty = self.temp(dst).ty;
        self.emit(Opcode::Call, ty, &full_args);
        dst
    }

    // -- Control flow --

    /// Unconditional branch to label.
    /// Br: 0 oargs, 0 iargs, 1 carg (label_id)
    pub fn gen_br(&mut self, label_id: u32) {
        self.emit(Opcode::Br, Type::I32, &[carg(label_id)]);
    }

    /// Conditional branch.
    /// BrCond: 0 oargs, 2 iargs, 2 cargs (cond, label_id)
    pub fn gen_brcond(
        &mut self,
        ty: Type,
        a: TempIdx,
        b: TempIdx,
        cond: Cond,
        label_id: u32,
    ) {
        self.emit(
            Opcode::BrCond,
            ty,
            &[a, b, carg(cond as u32), carg(label_id)],
        );
    }

    /// Conditional branch against an immediate.
    pub fn gen_brcondi(
        &mut self,
        ty: Type,
        a: TempIdx,
        imm: u64,
        cond: Cond,
        label_id: u32,
    ) {
        let b = self.new_const(ty, imm);
        self.gen_brcond(ty, a, b, cond, label_id);
    }

    /// Define label position.
    pub fn gen_set_label(&mut self, label_id: u32) {
        self.emit(Opcode::SetLabel, Type::I32, &[carg(label_id)]);
    }

    // -- Entry points and dispatch --

    /// Define `handle` at this position.
    pub fn gen_handle(&mut self, handle: Handle) {
        self.emit(Opcode::Handle, Type::I32, &[carg(handle.0)]);
    }

    /// Define the hashed entry point for (mode, pc) at this position.
    pub fn gen_hash(&mut self, mode: u32, pc: u32) {
        self.emit(Opcode::Hash, Type::I32, &[carg(mode), carg(pc)]);
    }

    /// Jump through the dispatch map; a miss calls `nocode` with the
    /// PC as exception parameter.
    pub fn gen_hashjmp(&mut self, mode: TempIdx, pc: TempIdx, nocode: Handle) {
        self.emit(Opcode::HashJmp, Type::I32, &[mode, pc, carg(nocode.0)]);
    }

    pub fn gen_callh(&mut self, handle: Handle) {
        self.emit(Opcode::CallH, Type::I32, &[carg(handle.0)]);
    }

    /// Call `handle` with `param` readable through `GetExp`.
    pub fn gen_exh(&mut self, handle: Handle, param: TempIdx) {
        self.emit(Opcode::Exh, Type::I32, &[param, carg(handle.0)]);
    }

    pub fn gen_ret(&mut self) {
        self.emit(Opcode::Ret, Type::I32, &[]);
    }

    pub fn gen_getexp(&mut self, d: TempIdx) -> TempIdx {
        self.emit(Opcode::GetExp, Type::I32, &[d]);
        d
    }

    // -- Recovery --

    pub fn gen_mapvar(&mut self, var: MapVar, value: u32) {
        self.emit(Opcode::MapVar, Type::I32, &[carg(var as u32), carg(value)]);
    }

    pub fn gen_recover(&mut self, d: TempIdx, var: MapVar) -> TempIdx {
        self.emit(Opcode::Recover, Type::I32, &[d, carg(var as u32)]);
        d
    }

    /// Leave generated code, returning `code` to the caller of
    /// `execute`.
    pub fn gen_exit(&mut self, code: TempIdx) {
        self.emit(Opcode::Exit, Type::I32, &[code]);
    }

    pub fn gen_exiti(&mut self, code: u32) {
        let c = self.const_i32(code);
        self.gen_exit(c);
    }

    // -- Boundary --

    /// InsnStart: 0 oargs, 0 iargs, 1 carg (pc)
    pub fn gen_insn_start(&mut self, pc: u32) {
        self.emit(Opcode::InsnStart, Type::I32, &[carg(pc)]);
    }
}
