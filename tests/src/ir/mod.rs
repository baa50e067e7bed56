mod context;
mod opcode;
mod types;
