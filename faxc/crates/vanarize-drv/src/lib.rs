//! Compiler driver: wires the lexer, parser and code generator into one
//! pipeline that reads a source file, compiles it, and runs it in process.
//!
//! vanarize programs have no linking step and no standalone output artifact
//! - `compile_and_run` JIT-compiles a program into an executable page and
//! calls straight into it, returning whatever its top level returned.

use std::path::{Path, PathBuf};

use vanarize_gen::CodeGenError;
use vanarize_runtime::Value;
use vanarize_util::diagnostic::Handler;

/// Everything that can send this driver to a non-zero exit code.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("could not read '{path}': {source}")]
    Io { path: PathBuf, #[source] source: std::io::Error },

    #[error("{0}")]
    Parse(String),

    #[error("{0}")]
    CodeGen(#[from] CodeGenError),
}

/// Read, parse and compile `path`, then run it and return its result.
///
/// The source buffer is leaked for the process's lifetime: the AST
/// `compile` walks, and the tokens it was built from, borrow string slices
/// out of it, and nothing in this pipeline runs long enough for that to be
/// a real leak.
pub fn compile_and_run(path: &Path) -> Result<Value, DriverError> {
    let source = std::fs::read_to_string(path).map_err(|e| DriverError::Io { path: path.to_path_buf(), source: e })?;
    let source: &'static str = Box::leak(source.into_boxed_str());

    let base_dir = path.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();
    let handler = Handler::new();

    let program = vanarize_par::parse(source, &base_dir, &handler).map_err(|()| {
        let messages: Vec<String> = handler.diagnostics().iter().map(|d| d.message.clone()).collect();
        DriverError::Parse(messages.join("\n"))
    })?;

    let compiled = vanarize_gen::compile(&program)?;
    Ok(compiled.call())
}
