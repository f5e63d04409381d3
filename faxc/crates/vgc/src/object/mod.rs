//! GC-managed object model.

pub mod header;

pub use header::{
    data_start, header_at, header_of, ObjFunction, ObjString, ObjStruct, ObjType, ObjectHeader,
    HEADER_SIZE, OBJECT_ALIGNMENT,
};
