//! Allocator module - bump-pointer allocation over a single mapped arena.
//!
//! A single region, a single pointer, no per-object free. There is no TLAB,
//! no generational split, no dedicated large-object path - every
//! allocation advances the same pointer.

mod bump;

pub use bump::BumpAllocator;
