//! Host callbacks available to JIT-compiled code.
//!
//! Every `#[no_mangle] extern "C"` function here is called by baking its
//! absolute address into a `MOV imm64; CALL reg` sequence at code-generation
//! time - there is no dynamic symbol resolution at the call site, so the
//! signatures here are the ABI `vanarize-gen` must emit against.
//!
//! The heap lives in thread-local storage rather than behind a `Mutex`:
//! compilation, collection, and execution of emitted code all happen on one
//! OS thread, so a
//! lock would only cost time without buying safety.

#![allow(non_snake_case)] // host callback names match the ABI contract, not Rust style

use crate::value::{Value, VAL_FALSE, VAL_NIL, VAL_TRUE};
use std::cell::{Cell, RefCell};
use std::ffi::{c_char, CString};
use vgc::{Heap, HeapConfig, ObjType};

thread_local! {
    static HEAP: RefCell<Heap> = RefCell::new(
        Heap::new(HeapConfig::default()).expect("default heap configuration is always valid")
    );
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

pub(crate) fn set_last_error(message: &str) {
    let c = CString::new(message).unwrap_or_else(|_| {
        CString::new("<error message contained a NUL byte>").expect("literal has no NUL byte")
    });
    LAST_ERROR.with(|slot| *slot.borrow_mut() = Some(c));
}

/// The last runtime error set by a host callback, or a null pointer if none
/// has occurred since the process started (or since the last call that
/// cleared it). The pointer stays valid until the next runtime error.
#[no_mangle]
pub extern "C" fn vanarize_last_error() -> *const c_char {
    LAST_ERROR.with(|slot| slot.borrow().as_ref().map_or(std::ptr::null(), |c| c.as_ptr()))
}

/// Allocate `payload_size` bytes on the GC heap for an object of kind
/// `obj_type` (0 = string, 1 = function, 2 = struct) and return it boxed as
/// a `Value`.
///
/// This collector tags an object's kind at allocation time rather than
/// after the fact (`vgc::Heap::allocate` requires it), so the type tag
/// travels as a second immediate argument at the call site.
#[no_mangle]
pub extern "C" fn GC_Allocate(obj_type: u8, payload_size: usize) -> Value {
    let kind = match obj_type {
        0 => ObjType::String,
        1 => ObjType::Function,
        2 => ObjType::Struct,
        _ => {
            set_last_error("GC_Allocate: unknown object type tag");
            return VAL_NIL;
        }
    };
    HEAP.with(|heap| match heap.borrow_mut().allocate(kind, payload_size) {
        Ok(data_addr) => {
            let header = unsafe { vgc::header_of(data_addr) };
            Value::from_obj_ptr(header)
        }
        Err(err) => {
            set_last_error(&format!("GC_Allocate: {err}"));
            VAL_NIL
        }
    })
}

/// Register a GC root: a pointer to a `Value`-sized slot (a local variable's
/// stack location, typically) that must be traced on every collection until
/// unregistered.
#[no_mangle]
pub extern "C" fn GC_RegisterRoot(slot: *const u64) -> bool {
    HEAP.with(|heap| heap.borrow_mut().register_root(slot).is_ok())
}

/// Unregister a previously-registered root.
#[no_mangle]
pub extern "C" fn GC_UnregisterRoot(slot: *const u64) -> bool {
    HEAP.with(|heap| heap.borrow_mut().unregister_root(slot).is_ok())
}

/// Force a collection cycle outside of the normal "arena exhausted" trigger.
#[no_mangle]
pub extern "C" fn GC_Collect() {
    HEAP.with(|heap| heap.borrow_mut().collect());
}

/// Copy a Rust string onto the heap as a new `ObjString`, mirroring the
/// source's `NewString`.
fn allocate_string(s: &str) -> Value {
    let payload = std::mem::size_of::<usize>() + s.len();
    HEAP.with(|heap| match heap.borrow_mut().allocate(ObjType::String, payload) {
        Ok(data_addr) => unsafe {
            *(data_addr as *mut usize) = s.len();
            let bytes = (data_addr + std::mem::size_of::<usize>()) as *mut u8;
            std::ptr::copy_nonoverlapping(s.as_ptr(), bytes, s.len());
            Value::from_obj_ptr(vgc::header_of(data_addr))
        },
        Err(err) => {
            set_last_error(&format!("string allocation failed: {err}"));
            VAL_NIL
        }
    })
}

/// # Safety
/// `header` must point to a live `ObjString` (checked by the caller via
/// `obj_type` before this is reached).
unsafe fn as_str<'a>(header: *mut vgc::ObjectHeader) -> &'a str {
    vgc::ObjString::as_str(header as *const vgc::ObjString)
}

/// Approximates C's `%.14g` closely enough for print/concat output: the
/// shortest decimal that round-trips, same as Rust's default `f64` display.
fn format_number(n: f64) -> String {
    format!("{n}")
}

/// `print` statement support: numbers bare, `nil`/booleans by name, strings
/// without surrounding quotes.
#[no_mangle]
pub extern "C" fn Native_Print(value: Value) {
    if value.is_number() {
        println!("{}", format_number(value.as_f64()));
    } else if value.is_nil() {
        println!("nil");
    } else if value.is_bool() {
        println!("{}", value.as_bool());
    } else if let Some(header) = value.as_obj_ptr() {
        unsafe {
            match (*header).obj_type {
                ObjType::String => println!("{}", as_str(header)),
                ObjType::Function => println!("<function>"),
                ObjType::Struct => println!("<struct>"),
            }
        }
    } else {
        println!("nil");
    }
}

/// `+`. Numbers add; any combination involving a string concatenates (the
/// non-string side is stringified the same way `print` renders it). Any
/// other combination is a type mismatch: returns `VAL_NIL` and records a
/// last error rather than falling through undefined.
#[no_mangle]
pub extern "C" fn Runtime_Add(a: Value, b: Value) -> Value {
    if a.is_number() && b.is_number() {
        return Value::from_f64(a.as_f64() + b.as_f64());
    }
    if a.is_string() && b.is_string() {
        let (ha, hb) = (a.as_obj_ptr().unwrap(), b.as_obj_ptr().unwrap());
        let mut out = String::new();
        unsafe {
            out.push_str(as_str(ha));
            out.push_str(as_str(hb));
        }
        return allocate_string(&out);
    }
    if a.is_string() && b.is_number() {
        let mut out = unsafe { as_str(a.as_obj_ptr().unwrap()).to_string() };
        out.push_str(&format_number(b.as_f64()));
        return allocate_string(&out);
    }
    if a.is_number() && b.is_string() {
        let mut out = format_number(a.as_f64());
        unsafe { out.push_str(as_str(b.as_obj_ptr().unwrap())) };
        return allocate_string(&out);
    }
    set_last_error("Runtime_Add: incompatible operand types");
    VAL_NIL
}

/// `==`. Bit-exact `Value` equality - deliberately not structural: two
/// distinct string objects with the same text are unequal.
#[no_mangle]
pub extern "C" fn Runtime_Equal(a: Value, b: Value) -> Value {
    if a == b {
        VAL_TRUE
    } else {
        VAL_FALSE
    }
}

/// Allocate a zero-initialized (all fields nil) `ObjStruct` with
/// `field_count` slots. Used both for genuine `struct` literals and for
/// array literals, which this runtime represents as structs indexed by
/// position rather than by field name.
#[no_mangle]
pub extern "C" fn Runtime_NewStruct(field_count: u64) -> Value {
    let field_count = field_count as usize;
    let payload = std::mem::size_of::<usize>() + field_count * std::mem::size_of::<u64>();
    HEAP.with(|heap| match heap.borrow_mut().allocate(ObjType::Struct, payload) {
        Ok(data_addr) => unsafe {
            *(data_addr as *mut usize) = field_count;
            let header = vgc::header_of(data_addr);
            let fields = vgc::ObjStruct::fields_mut(header as *mut vgc::ObjStruct);
            fields.fill(VAL_NIL.0);
            Value::from_obj_ptr(header)
        },
        Err(err) => {
            set_last_error(&format!("Runtime_NewStruct: {err}"));
            VAL_NIL
        }
    })
}

/// Store `value` at `index` of a previously-allocated struct/array object.
/// Out-of-range `index` or a non-struct `obj` is a type error: the write is
/// dropped and the last-error slot is set, matching `Runtime_Add`'s
/// fall-through-to-nil policy for runtime type mismatches.
#[no_mangle]
pub extern "C" fn Runtime_SetField(obj: Value, index: u64, value: Value) {
    let Some(header) = obj.as_obj_ptr() else {
        set_last_error("Runtime_SetField: not an object");
        return;
    };
    unsafe {
        if (*header).obj_type != ObjType::Struct {
            set_last_error("Runtime_SetField: not a struct");
            return;
        }
        let fields = vgc::ObjStruct::fields_mut(header as *mut vgc::ObjStruct);
        if index as usize >= fields.len() {
            set_last_error("Runtime_SetField: index out of range");
            return;
        }
        fields[index as usize] = value.0;
    }
}

/// Read the field/element at `index`. Returns `VAL_NIL` (and records a last
/// error) for a non-struct receiver or an out-of-range index.
#[no_mangle]
pub extern "C" fn Runtime_GetField(obj: Value, index: u64) -> Value {
    let Some(header) = obj.as_obj_ptr() else {
        set_last_error("Runtime_GetField: not an object");
        return VAL_NIL;
    };
    unsafe {
        if (*header).obj_type != ObjType::Struct {
            set_last_error("Runtime_GetField: not a struct");
            return VAL_NIL;
        }
        let fields = vgc::ObjStruct::fields_mut(header as *mut vgc::ObjStruct);
        if index as usize >= fields.len() {
            set_last_error("Runtime_GetField: index out of range");
            return VAL_NIL;
        }
        Value(fields[index as usize])
    }
}

/// `obj[index]` read where `index` is itself a runtime `Value` (a boxed
/// number produced by an arbitrary expression, as opposed to the
/// compile-time-constant field offsets `Runtime_GetField` serves for `.name`
/// access). A non-number index is a type error.
#[no_mangle]
pub extern "C" fn Runtime_IndexGet(obj: Value, index: Value) -> Value {
    if !index.is_number() {
        set_last_error("Runtime_IndexGet: index is not a number");
        return VAL_NIL;
    }
    Runtime_GetField(obj, index.as_f64() as u64)
}

/// `obj[index] = value` where `index` is a runtime `Value`. See
/// `Runtime_IndexGet`.
#[no_mangle]
pub extern "C" fn Runtime_IndexSet(obj: Value, index: Value, value: Value) {
    if !index.is_number() {
        set_last_error("Runtime_IndexSet: index is not a number");
        return;
    }
    Runtime_SetField(obj, index.as_f64() as u64, value)
}

/// Copy the `len` bytes at `ptr` (a pointer into the JIT's own code/data
/// page - string literals are emitted as inert bytes alongside the
/// instructions that reference them) onto the heap as a new `ObjString`.
///
/// # Safety
/// `ptr` must point to at least `len` readable bytes of valid UTF-8.
#[no_mangle]
pub unsafe extern "C" fn Runtime_NewStringLiteral(ptr: *const u8, len: u64) -> Value {
    let bytes = std::slice::from_raw_parts(ptr, len as usize);
    let s = match std::str::from_utf8(bytes) {
        Ok(s) => s,
        Err(_) => {
            set_last_error("Runtime_NewStringLiteral: invalid UTF-8");
            return VAL_NIL;
        }
    };
    allocate_string(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_numbers() {
        let r = Runtime_Add(Value::from_f64(2.0), Value::from_f64(3.5));
        assert_eq!(r.as_f64(), 5.5);
    }

    #[test]
    fn add_strings_concatenates() {
        let a = allocate_string("foo");
        let b = allocate_string("bar");
        let r = Runtime_Add(a, b);
        assert!(r.is_string());
        unsafe {
            assert_eq!(as_str(r.as_obj_ptr().unwrap()), "foobar");
        }
    }

    #[test]
    fn add_string_and_number_stringifies_the_number() {
        let a = allocate_string("count: ");
        let r = Runtime_Add(a, Value::from_f64(3.0));
        unsafe {
            assert_eq!(as_str(r.as_obj_ptr().unwrap()), "count: 3");
        }
    }

    #[test]
    fn add_incompatible_types_is_nil_and_records_error() {
        let r = Runtime_Add(Value::from_bool(true), Value::from_f64(1.0));
        assert!(r.is_nil());
        assert!(!vanarize_last_error().is_null());
    }

    #[test]
    fn equal_is_bitwise_not_structural() {
        let a = allocate_string("x");
        let b = allocate_string("x");
        assert_eq!(Runtime_Equal(a, b), VAL_FALSE);
        assert_eq!(Runtime_Equal(a, a), VAL_TRUE);
        assert_eq!(Runtime_Equal(Value::from_f64(1.0), Value::from_f64(1.0)), VAL_TRUE);
    }

    #[test]
    fn gc_allocate_unknown_tag_is_nil() {
        let r = GC_Allocate(99, 8);
        assert!(r.is_nil());
    }

    #[test]
    fn register_and_unregister_root_round_trip() {
        let slot: u64 = 0;
        assert!(GC_RegisterRoot(&slot as *const u64));
        assert!(GC_UnregisterRoot(&slot as *const u64));
    }

    #[test]
    fn new_struct_fields_start_nil() {
        let s = Runtime_NewStruct(2);
        assert_eq!(Runtime_GetField(s, 0), VAL_NIL);
        assert_eq!(Runtime_GetField(s, 1), VAL_NIL);
    }

    #[test]
    fn set_then_get_field_round_trips() {
        let s = Runtime_NewStruct(2);
        Runtime_SetField(s, 0, Value::from_f64(10.0));
        Runtime_SetField(s, 1, Value::from_f64(20.0));
        assert_eq!(Runtime_GetField(s, 0).as_f64(), 10.0);
        assert_eq!(Runtime_GetField(s, 1).as_f64(), 20.0);
    }

    #[test]
    fn get_field_out_of_range_is_nil() {
        let s = Runtime_NewStruct(1);
        assert!(Runtime_GetField(s, 5).is_nil());
    }

    #[test]
    fn new_string_literal_copies_bytes() {
        let bytes = b"hello";
        let s = unsafe { Runtime_NewStringLiteral(bytes.as_ptr(), bytes.len() as u64) };
        assert!(s.is_string());
        unsafe { assert_eq!(as_str(s.as_obj_ptr().unwrap()), "hello") };
    }

    #[test]
    fn index_get_set_round_trip_with_boxed_index() {
        let arr = Runtime_NewStruct(3);
        Runtime_IndexSet(arr, Value::from_f64(1.0), Value::from_f64(99.0));
        assert_eq!(Runtime_IndexGet(arr, Value::from_f64(1.0)).as_f64(), 99.0);
    }

    #[test]
    fn index_get_with_non_number_index_is_nil() {
        let arr = Runtime_NewStruct(1);
        assert!(Runtime_IndexGet(arr, VAL_NIL).is_nil());
    }
}
