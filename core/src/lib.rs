//! Portable micro-op IR for the dynamic recompiler.
//!
//! The frontend emits ops into a [`Context`]; a backend lowers and
//! executes them. Besides ordinary data-processing ops the IR carries
//! the recompiler control set: named entry points ([`Handle`]),
//! hashed dispatch keyed by [`BlockKey`], handle calls with an
//! exception parameter, and [`MapVar`] checkpoints that fault
//! handlers recover.

pub mod block;
pub mod context;
pub mod dump;
pub mod ir_builder;
pub mod label;
pub mod op;
pub mod opcode;
pub mod temp;
pub mod types;

pub use block::{exit, BlockKey, Handle, HelperId, MapVar, MAPVAR_COUNT};
pub use context::Context;
pub use ir_builder::MAX_CALL_ARGS;
pub use label::Label;
pub use op::{Op, MAX_OP_ARGS};
pub use opcode::{OpDef, OpFlags, Opcode, OPCODE_DEFS};
pub use temp::{Temp, TempIdx, TempKind};
pub use types::{Cond, Flags, RegSet, Type, TYPE_COUNT};
