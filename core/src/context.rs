use std::collections::HashMap;

use crate::label::Label;
use crate::op::Op;
use crate::temp::{Temp, TempIdx, TempKind};
use crate::types::{Type, TYPE_COUNT};

/// The unit under construction.
///
/// One context is reused for every unit a recompiler emits: the
/// static handler library after a flush, then one unit per compiled
/// group. Globals and fixed-register temps sit at the front of the
/// temp pool and survive `reset`; everything after them belongs to
/// the current unit.
pub struct Context {
    temps: Vec<Temp>,
    ops: Vec<Op>,
    labels: Vec<Label>,
    nb_globals: u32,
    /// Constant temps of the current unit, per type.
    consts: [HashMap<u64, TempIdx>; TYPE_COUNT],
    names: HashMap<&'static str, TempIdx>,
}

impl Context {
    pub fn new() -> Self {
        Self {
            temps: Vec::with_capacity(256),
            ops: Vec::with_capacity(1024),
            labels: Vec::new(),
            nb_globals: 0,
            consts: Default::default(),
            names: HashMap::new(),
        }
    }

    /// Start a new unit, keeping globals.
    pub fn reset(&mut self) {
        self.temps.truncate(self.nb_globals as usize);
        self.ops.clear();
        self.labels.clear();
        self.consts.iter_mut().for_each(HashMap::clear);
    }

    /// Start over, globals included.
    pub fn clear(&mut self) {
        self.nb_globals = 0;
        self.names.clear();
        self.temps.clear();
        self.reset();
    }

    pub fn nb_globals(&self) -> u32 {
        self.nb_globals
    }

    pub fn nb_temps(&self) -> u32 {
        self.temps.len() as u32
    }

    fn push_temp(&mut self, t: Temp) -> TempIdx {
        let idx = TempIdx(self.temps.len() as u32);
        self.temps.push(t);
        idx
    }

    pub fn new_temp(&mut self, ty: Type) -> TempIdx {
        self.push_temp(Temp::scratch(ty, TempKind::Ebb))
    }

    /// A temp whose value must survive `SetLabel`.
    pub fn new_temp_unit(&mut self, ty: Type) -> TempIdx {
        self.push_temp(Temp::scratch(ty, TempKind::Unit))
    }

    /// Constant temp, shared by every use of the same value and type.
    pub fn new_const(&mut self, ty: Type, val: u64) -> TempIdx {
        let val = val & ty.mask();
        if let Some(&idx) = self.consts[ty as usize].get(&val) {
            return idx;
        }
        let idx = self.push_temp(Temp::constant(ty, val));
        self.consts[ty as usize].insert(val, idx);
        idx
    }

    pub fn const_i32(&mut self, val: u32) -> TempIdx {
        self.new_const(Type::I32, val as u64)
    }

    pub fn const_i64(&mut self, val: u64) -> TempIdx {
        self.new_const(Type::I64, val)
    }

    fn push_global(&mut self, t: Temp, name: &'static str) -> TempIdx {
        assert_eq!(
            self.temps.len() as u32,
            self.nb_globals,
            "global '{name}' registered after unit temps"
        );
        let idx = self.push_temp(t);
        self.nb_globals += 1;
        self.names.insert(name, idx);
        idx
    }

    /// Bind a temp to `offset` bytes into the machine state.
    pub fn new_global(&mut self, ty: Type, offset: i64, name: &'static str) -> TempIdx {
        self.push_global(Temp::global(ty, offset, name), name)
    }

    /// Bind a temp to host register `reg`.
    pub fn new_fixed(&mut self, ty: Type, reg: u8, name: &'static str) -> TempIdx {
        self.push_global(Temp::fixed(ty, reg, name), name)
    }

    pub fn global_by_name(&self, name: &str) -> Option<TempIdx> {
        self.names.get(name).copied()
    }

    pub fn temp(&self, idx: TempIdx) -> &Temp {
        &self.temps[idx.0 as usize]
    }

    pub fn emit_op(&mut self, op: Op) {
        self.ops.push(op);
    }

    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    pub fn num_ops(&self) -> usize {
        self.ops.len()
    }

    pub fn new_label(&mut self) -> u32 {
        let id = self.labels.len() as u32;
        self.labels.push(Label::new(id));
        id
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
