//! Heap and collector core.
//!
//! A single `Heap` owns the bump arena, an intrusive singly-linked list of
//! every live object, and a fixed-capacity root array. `collect()` marks
//! from the roots, then sweeps the object list, unlinking anything left
//! unmarked.
//!
//! The bump pointer is never reset after a sweep: resetting it is unsound
//! without a relocating collector, which this crate deliberately does not
//! implement.

use crate::allocator::BumpAllocator;
use crate::config::HeapConfig;
use crate::error::{GcError, Result};
use crate::object::{data_start, header_at, ObjType, ObjectHeader, HEADER_SIZE, OBJECT_ALIGNMENT};
use log::{debug, trace, warn};

/// A registered GC root: a pointer to a `Value`-sized slot the collector
/// must treat as reachable and must be able to trace through.
///
pub type RootSlot = *const u64;

/// The heap: arena, live-object list, and root set.
///
/// Not `Send`/`Sync` - owned exclusively by a single `Runtime`, matching
/// the single-threaded resource model.
pub struct Heap {
    config: HeapConfig,
    arena: Vec<u8>,
    allocator: BumpAllocator,
    /// Head of the intrusive live-object list.
    objects: *mut ObjectHeader,
    roots: Vec<RootSlot>,
    allocations: usize,
    collections: usize,
}

impl Heap {
    pub fn new(config: HeapConfig) -> Result<Self> {
        config.validate()?;
        let mut arena = vec![0u8; config.arena_size];
        let allocator = unsafe {
            BumpAllocator::new(arena.as_mut_ptr(), arena.len(), OBJECT_ALIGNMENT.max(config.align))
        };
        debug!("heap initialized: {} byte arena, {} max roots", config.arena_size, config.max_roots);
        Ok(Heap {
            config,
            arena,
            allocator,
            objects: std::ptr::null_mut(),
            roots: Vec::with_capacity(config.max_roots),
            allocations: 0,
            collections: 0,
        })
    }

    pub fn config(&self) -> &HeapConfig {
        &self.config
    }

    pub fn allocations(&self) -> usize {
        self.allocations
    }

    pub fn collections(&self) -> usize {
        self.collections
    }

    pub fn bytes_used(&self) -> usize {
        self.allocator.used()
    }

    /// Allocate `size` bytes for an object of kind `obj_type`, initialize
    /// its header, and link it into the live-object list.
    ///
    /// Retries once after a collection if the arena is exhausted, then
    /// fails rather than growing the arena.
    pub fn allocate(&mut self, obj_type: ObjType, size: usize) -> Result<usize> {
        let total = HEADER_SIZE + size;
        let addr = match self.allocator.allocate(total) {
            Ok(addr) => addr,
            Err(GcError::HeapExhausted { .. }) => {
                warn!("arena exhausted at {} bytes used, forcing collection", self.bytes_used());
                self.collect();
                self.allocator.allocate(total)?
            }
            Err(other) => return Err(other),
        };
        unsafe {
            let header = header_at(addr);
            (*header).obj_type = obj_type;
            (*header).marked = false;
            (*header).next = self.objects;
            (*header).size = total;
            self.objects = header;
        }
        self.allocations += 1;
        Ok(data_start(addr as *mut ObjectHeader))
    }

    /// Register a root slot. The collector will trace through it on every
    /// collection until [`Heap::unregister_root`] is called with the same
    /// pointer.
    pub fn register_root(&mut self, slot: RootSlot) -> Result<()> {
        if self.roots.len() >= self.config.max_roots {
            return Err(GcError::RootSetFull { max: self.config.max_roots });
        }
        self.roots.push(slot);
        Ok(())
    }

    /// Unregister a previously-registered root.
    ///
    /// Swap-remove: root order is not meaningful, so the last root takes
    /// the removed slot's place instead of shifting the whole vector.
    pub fn unregister_root(&mut self, slot: RootSlot) -> Result<()> {
        let pos = self
            .roots
            .iter()
            .rposition(|&s| s == slot)
            .ok_or(GcError::UnknownRoot { address: slot as usize })?;
        self.roots.swap_remove(pos);
        Ok(())
    }

    pub fn root_count(&self) -> usize {
        self.roots.len()
    }

    /// Run one mark-and-sweep collection cycle.
    pub fn collect(&mut self) {
        trace!("collection {} starting, {} roots, {} bytes used", self.collections + 1, self.roots.len(), self.bytes_used());
        self.mark();
        let freed = self.sweep();
        self.collections += 1;
        debug!("collection {} done, {} objects freed", self.collections, freed);
    }

    fn mark(&mut self) {
        let roots = self.roots.clone();
        for root in roots {
            unsafe {
                self.mark_value(*root);
            }
        }
    }

    /// Mark the object a NaN-boxed `Value` points to, if it is a pointer,
    /// recursing into struct fields (the only object kind with outgoing
    /// references).
    ///
    /// # Safety
    /// `value` must be a valid `Value` bit pattern.
    unsafe fn mark_value(&self, value: u64) {
        let Some(header) = crate::value_to_object(value) else { return };
        self.mark_object(header);
    }

    unsafe fn mark_object(&self, header: *mut ObjectHeader) {
        if header.is_null() || (*header).marked {
            return;
        }
        (*header).marked = true;
        if (*header).obj_type == ObjType::Struct {
            let s = header as *mut crate::object::ObjStruct;
            for &field in crate::object::ObjStruct::fields_mut(s).iter() {
                self.mark_value(field);
            }
        }
    }

    /// Unlink and drop every unmarked object, clearing the mark bit on
    /// survivors. Does not touch the bump pointer.
    fn sweep(&mut self) -> usize {
        let mut freed = 0;
        let mut prev: *mut ObjectHeader = std::ptr::null_mut();
        let mut cur = self.objects;
        unsafe {
            while !cur.is_null() {
                let next = (*cur).next;
                if (*cur).marked {
                    (*cur).marked = false;
                    prev = cur;
                } else {
                    freed += 1;
                    if prev.is_null() {
                        self.objects = next;
                    } else {
                        (*prev).next = next;
                    }
                }
                cur = next;
            }
        }
        freed
    }
}
