//! Arithmetic, comparison and unary host callbacks.
//!
//! `Runtime_Add`/`Runtime_Equal` in [`crate::gc`] already cover `+` and `==`;
//! the rest of the binary/unary operator set lives here so `vanarize-gen`
//! never has to emit raw integer arithmetic on a NaN-boxed bit pattern - the
//! assembler has no floating-point instructions, and integer `ADD`/`SUB` on
//! an IEEE-754 bit pattern does not compute the sum of the two doubles it
//! represents. Every operator that touches a number decodes through
//! [`crate::value::Value::as_f64`] here instead.

#![allow(non_snake_case)]

use crate::value::{Value, VAL_FALSE, VAL_NIL, VAL_TRUE};

fn set_last_error(message: &str) {
    crate::gc::set_last_error(message);
}

fn numeric_binop(name: &str, a: Value, b: Value, f: impl FnOnce(f64, f64) -> f64) -> Value {
    if a.is_number() && b.is_number() {
        return Value::from_f64(f(a.as_f64(), b.as_f64()));
    }
    set_last_error(&format!("{name}: operands are not both numbers"));
    VAL_NIL
}

fn numeric_cmp(name: &str, a: Value, b: Value, f: impl FnOnce(f64, f64) -> bool) -> Value {
    if a.is_number() && b.is_number() {
        return Value::from_bool(f(a.as_f64(), b.as_f64()));
    }
    set_last_error(&format!("{name}: operands are not both numbers"));
    VAL_NIL
}

/// `-`.
#[no_mangle]
pub extern "C" fn Runtime_Sub(a: Value, b: Value) -> Value {
    numeric_binop("Runtime_Sub", a, b, |x, y| x - y)
}

/// `*`.
#[no_mangle]
pub extern "C" fn Runtime_Mul(a: Value, b: Value) -> Value {
    numeric_binop("Runtime_Mul", a, b, |x, y| x * y)
}

/// `/`. Division by zero follows IEEE-754 (`inf`/`-inf`/`NaN`), not a trap.
#[no_mangle]
pub extern "C" fn Runtime_Div(a: Value, b: Value) -> Value {
    numeric_binop("Runtime_Div", a, b, |x, y| x / y)
}

/// Unary `-`.
#[no_mangle]
pub extern "C" fn Runtime_Negate(v: Value) -> Value {
    if v.is_number() {
        return Value::from_f64(-v.as_f64());
    }
    set_last_error("Runtime_Negate: operand is not a number");
    VAL_NIL
}

/// Unary `!`. Defined only over the two boolean singletons.
#[no_mangle]
pub extern "C" fn Runtime_Not(v: Value) -> Value {
    if v == VAL_TRUE {
        return VAL_FALSE;
    }
    if v == VAL_FALSE {
        return VAL_TRUE;
    }
    set_last_error("Runtime_Not: operand is not a boolean");
    VAL_NIL
}

/// `!=`. The logical complement of `Runtime_Equal`, kept as its own callback
/// so the code generator never has to invert a boxed boolean in emitted code.
#[no_mangle]
pub extern "C" fn Runtime_NotEqual(a: Value, b: Value) -> Value {
    Value::from_bool(a != b)
}

/// `<`.
#[no_mangle]
pub extern "C" fn Runtime_Less(a: Value, b: Value) -> Value {
    numeric_cmp("Runtime_Less", a, b, |x, y| x < y)
}

/// `<=`.
#[no_mangle]
pub extern "C" fn Runtime_LessEq(a: Value, b: Value) -> Value {
    numeric_cmp("Runtime_LessEq", a, b, |x, y| x <= y)
}

/// `>`.
#[no_mangle]
pub extern "C" fn Runtime_Greater(a: Value, b: Value) -> Value {
    numeric_cmp("Runtime_Greater", a, b, |x, y| x > y)
}

/// `>=`.
#[no_mangle]
pub extern "C" fn Runtime_GreaterEq(a: Value, b: Value) -> Value {
    numeric_cmp("Runtime_GreaterEq", a, b, |x, y| x >= y)
}
