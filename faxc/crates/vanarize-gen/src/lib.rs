//! x86-64 code generation: a byte-level instruction encoder, an executable
//! memory allocator, and the AST-to-machine-code lowering pass that ties
//! them together into a callable, JIT-compiled program.

pub mod asm;
pub mod codegen;
pub mod error;
pub mod exec;

pub use asm::{Assembler, Cond, Reg};
pub use codegen::{compile, CompiledProgram};
pub use error::{AsmError, CodeGenError, JitError, Result};
pub use exec::{ExecBuffer, JitConfig};
