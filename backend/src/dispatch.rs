//! Hashed dispatch map and named handle table.

use std::collections::HashMap;

use drc_core::{BlockKey, Handle};

use crate::code_cache::CodeAddr;
use crate::BackendError;

/// Map from (mode, pc) to the code that implements it.
#[derive(Default)]
pub struct DispatchMap {
    entries: HashMap<BlockKey, CodeAddr>,
}

impl DispatchMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, key: BlockKey) -> Option<CodeAddr> {
        self.entries.get(&key).copied()
    }

    pub fn contains(&self, key: BlockKey) -> bool {
        self.entries.contains_key(&key)
    }

    /// Insert or redefine an entry.
    pub fn insert(&mut self, key: BlockKey, addr: CodeAddr) {
        self.entries.insert(key, addr);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Named symbolic branch targets.
///
/// A handle is allocated first, referenced by any number of units,
/// and defined exactly once. Resolution is a plain lookup, so it can
/// be repeated freely.
#[derive(Default)]
pub struct HandleTable {
    names: Vec<String>,
    addrs: Vec<Option<CodeAddr>>,
}

impl HandleTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, name: &str) -> Handle {
        let h = Handle(self.names.len() as u32);
        self.names.push(name.to_string());
        self.addrs.push(None);
        h
    }

    pub fn name(&self, handle: Handle) -> &str {
        self.names
            .get(handle.0 as usize)
            .map(String::as_str)
            .unwrap_or("<invalid>")
    }

    pub fn is_defined(&self, handle: Handle) -> bool {
        self.resolve(handle).is_some()
    }

    pub fn resolve(&self, handle: Handle) -> Option<CodeAddr> {
        self.addrs.get(handle.0 as usize).copied().flatten()
    }

    /// Bind `handle` to `addr`.
    pub fn define(
        &mut self,
        handle: Handle,
        addr: CodeAddr,
    ) -> Result<(), BackendError> {
        let slot = &mut self.addrs[handle.0 as usize];
        if slot.is_some() {
            return Err(BackendError::HandleRedefined(
                self.names[handle.0 as usize].clone(),
            ));
        }
        *slot = Some(addr);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn clear(&mut self) {
        self.names.clear();
        self.addrs.clear();
    }
}
