//! Shared infrastructure used by every stage of the toolchain: interned
//! symbols, source spans, and diagnostics.
//!
//! Nothing in this crate is specific to lexing, parsing, or code generation -
//! it is the common vocabulary the other crates build on.

pub mod diagnostic;
pub mod span;
pub mod symbol;

pub use diagnostic::{Diagnostic, DiagnosticBuilder, DiagnosticCode, Handler, Level};
pub use span::{FileId, Span};
pub use symbol::Symbol;

pub use rustc_hash::FxHashMap;
pub use rustc_hash::FxHashSet;
