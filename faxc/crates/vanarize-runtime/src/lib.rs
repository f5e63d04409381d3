//! Runtime support linked into every compiled program: the `Value`
//! representation and the host callbacks emitted machine code calls back
//! into.
//!
//! This crate builds as a `staticlib`/`cdylib` as well as an `rlib` - the
//! `extern "C"` functions in [`gc`] are also reachable by address from
//! outside Rust's own linkage, which is exactly how `vanarize-gen` calls
//! them from JIT'd machine code.

mod gc;
mod ops;
mod value;

pub use gc::{
    vanarize_last_error, GC_Allocate, GC_Collect, GC_RegisterRoot, GC_UnregisterRoot, Native_Print,
    Runtime_Add, Runtime_Equal, Runtime_GetField, Runtime_IndexGet, Runtime_IndexSet,
    Runtime_NewStringLiteral, Runtime_NewStruct, Runtime_SetField,
};
pub use ops::{
    Runtime_Div, Runtime_Greater, Runtime_GreaterEq, Runtime_Less, Runtime_LessEq, Runtime_Mul,
    Runtime_Negate, Runtime_Not, Runtime_NotEqual, Runtime_Sub,
};
pub use value::{Value, QNAN, SIGN_BIT, TAG_FALSE, TAG_NIL, TAG_TRUE, VAL_FALSE, VAL_NIL, VAL_TRUE};
