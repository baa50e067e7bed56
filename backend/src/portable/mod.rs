//! Portable reference backend.
//!
//! Units are lowered to [`insn::Insn`] and interpreted. Host
//! registers are a small array of 64-bit cells; register 0 carries the
//! state pointer and registers 1..=4 are the internal scratch
//! registers handlers use to pass parameters.

pub mod insn;
mod interp;

use std::marker::PhantomData;

use drc_core::{BlockKey, Context, Handle, HelperId, RegSet};

use crate::code_cache::{CodeCache, DEFAULT_CACHE_SIZE};
use crate::dispatch::{DispatchMap, HandleTable};
use crate::translate::lower;
use crate::{
    Backend, BackendError, CacheStats, ExitStatus, Helper, Machine,
    RegisterInfo, NUM_INTERNAL_REGS, REG_ENV,
};

/// Number of emulated host registers.
pub const NUM_HOST_REGS: usize = 16;
const FIRST_SPARE_REG: u8 = 1 + NUM_INTERNAL_REGS as u8;

pub struct PortableBackend<M: Machine> {
    cache: CodeCache,
    dispatch: DispatchMap,
    handles: HandleTable,
    helpers: Vec<(&'static str, Helper<M>)>,
    /// Largest frame any committed unit needs.
    max_slots: usize,
    spare: RegSet,
    _machine: PhantomData<fn(&mut M)>,
}

impl<M: Machine> PortableBackend<M> {
    /// Create a backend whose cache holds `cache_size` lowered
    /// instructions, reporting three spare host registers.
    pub fn new(cache_size: usize) -> Self {
        Self::with_spare_registers(cache_size, 3)
    }

    /// Create a backend reporting `spare` free host registers.
    pub fn with_spare_registers(cache_size: usize, spare: u32) -> Self {
        let max = NUM_HOST_REGS as u32 - FIRST_SPARE_REG as u32;
        let mut set = RegSet::EMPTY;
        for r in 0..spare.min(max) {
            set = set.set(FIRST_SPARE_REG + r as u8);
        }
        Self {
            cache: CodeCache::new(cache_size),
            dispatch: DispatchMap::new(),
            handles: HandleTable::new(),
            helpers: Vec::new(),
            max_slots: 0,
            spare: set,
            _machine: PhantomData,
        }
    }
}

impl<M: Machine> Default for PortableBackend<M> {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_SIZE)
    }
}

impl<M: Machine> Backend<M> for PortableBackend<M> {
    fn reset(&mut self) {
        log::info!(
            "code cache flush: {} units, {}/{} slots, {} hash entries",
            self.cache.units(),
            self.cache.used(),
            self.cache.capacity(),
            self.dispatch.len()
        );
        self.cache.reset();
        self.dispatch.clear();
        self.handles.clear();
        self.max_slots = 0;
    }

    fn register_info(&self) -> RegisterInfo {
        let mut internal = [0u8; NUM_INTERNAL_REGS];
        for (n, r) in internal.iter_mut().enumerate() {
            *r = 1 + n as u8;
        }
        RegisterInfo {
            env: REG_ENV,
            internal,
            spare: self.spare,
        }
    }

    fn alloc_handle(&mut self, name: &str) -> Handle {
        self.handles.alloc(name)
    }

    fn handle_name(&self, handle: Handle) -> &str {
        self.handles.name(handle)
    }

    fn handle_defined(&self, handle: Handle) -> bool {
        self.handles.is_defined(handle)
    }

    fn register_helper(&mut self, name: &'static str, f: Helper<M>) -> HelperId {
        let id = HelperId(self.helpers.len() as u32);
        self.helpers.push((name, f));
        id
    }

    fn compile(&mut self, ctx: &Context) -> Result<(), BackendError> {
        let base = self.cache.offset();
        let unit = lower(ctx, base)?;

        if unit.code.len() > self.cache.remaining() {
            return Err(BackendError::CacheFull {
                needed: unit.code.len(),
                remaining: self.cache.remaining(),
            });
        }
        for &helper in &unit.helpers {
            if helper.0 as usize >= self.helpers.len() {
                return Err(BackendError::UnknownHelper(helper.0));
            }
        }
        for (n, &(h, _)) in unit.handles.iter().enumerate() {
            let dup = unit.handles[..n].iter().any(|&(o, _)| o == h);
            if dup || self.handles.is_defined(h) {
                return Err(BackendError::HandleRedefined(
                    self.handles.name(h).to_string(),
                ));
            }
        }

        // Commit.
        let len = unit.code.len();
        self.cache.append(unit.code);
        for (h, addr) in unit.handles {
            self.handles.define(h, addr)?;
        }
        for (key, addr) in unit.hashes {
            self.dispatch.insert(key, addr);
        }
        self.max_slots = self.max_slots.max(unit.nb_slots);
        log::debug!(
            "compiled unit at {}: {} insns, {} slots, cache {}/{}",
            base.0,
            len,
            unit.nb_slots,
            self.cache.used(),
            self.cache.capacity()
        );
        Ok(())
    }

    fn hash_exists(&self, key: BlockKey) -> bool {
        self.dispatch.contains(key)
    }

    unsafe fn execute(&mut self, entry: Handle, machine: &mut M) -> ExitStatus {
        let mut vm = interp::Interp {
            cache: &self.cache,
            dispatch: &self.dispatch,
            handles: &self.handles,
            helpers: &self.helpers,
            max_slots: self.max_slots,
        };
        vm.run(entry, machine)
    }

    fn stats(&self) -> CacheStats {
        CacheStats {
            used: self.cache.used(),
            capacity: self.cache.capacity(),
            hash_entries: self.dispatch.len(),
            handles: self.handles.len(),
            units: self.cache.units(),
        }
    }
}
