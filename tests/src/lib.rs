//! Cross-crate tests for the recompiler workspace.

#[cfg(test)]
mod asm;
#[cfg(test)]
mod backend;
#[cfg(test)]
mod bus;
#[cfg(test)]
mod exec;
#[cfg(test)]
mod frontend;
#[cfg(test)]
mod ir;
