//! Error types for the assembler, the executable-memory allocator, and the
//! code generator.

use thiserror::Error;

/// Errors from the byte-level x86-64 encoder.
#[derive(Debug, Error)]
pub enum AsmError {
    /// Encoding R8-R15 requires REX.R/REX.B, which this encoder does not
    /// emit; only RAX..RDI are addressable.
    #[error("register {0} requires a REX.R/REX.B extended encoding, which this assembler does not emit")]
    ExtendedRegisterUnsupported(u8),

    /// The caller-supplied buffer ran out of room mid-instruction.
    #[error("instruction buffer overflow at offset {0}")]
    BufferOverflow(usize),

    /// A `Patch32`/`patch64` target offset does not point at a
    /// previously-reserved placeholder.
    #[error("invalid patch offset {0} (buffer is {1} bytes)")]
    InvalidPatchOffset(usize, usize),
}

/// Errors from the executable-memory allocator.
#[derive(Debug, Error)]
pub enum JitError {
    #[error("mmap failed allocating {0} bytes of executable memory")]
    MmapFailed(usize),

    #[error("mprotect failed changing protection on {0} bytes")]
    MprotectFailed(usize),

    #[error("JIT configuration error: {0}")]
    Configuration(String),
}

/// Errors from lowering an AST into machine code.
#[derive(Debug, Error)]
pub enum CodeGenError {
    #[error("undefined variable '{0}'")]
    UndefinedVariable(String),

    #[error("undefined function '{0}'")]
    UndefinedFunction(String),

    #[error("unknown struct type '{0}'")]
    UnknownStruct(String),

    #[error("struct '{0}' has no field named '{1}'")]
    UnknownField(String, String),

    #[error("function '{0}' declared with too many parameters ({1}) for this assembler's register set (max 4)")]
    TooManyParameters(String, usize),

    #[error("async/await is not supported by this code generator yet")]
    UnsupportedAsync,

    #[error("unsupported construct: {0}")]
    Unsupported(String),

    #[error("assembler error: {0}")]
    Asm(#[from] AsmError),

    #[error("executable memory error: {0}")]
    Jit(#[from] JitError),
}

pub type Result<T, E = CodeGenError> = std::result::Result<T, E>;
