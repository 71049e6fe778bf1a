//! `ccomp` — an ahead-of-time compiler from a strict subset of C to x86-64
//! System V AT&T-syntax assembly text, structured as a nine-pass pipeline:
//! lexer, parser, variable resolver, type checker, loop labeler, TACKY IR
//! emitter, assembly lowering, pseudo-register allocation/legalization, and
//! AT&T text emission.
//!
//! # Extending the driver
//!
//! Callers that need a non-default host toolchain or want to keep
//! intermediate files can go through [`CompilerConfig`]:
//!
//! ```rust,ignore
//! use ccomp::{CompilerConfig, compile_file_with_config};
//! use ccomp::driver::Stage;
//! use std::path::Path;
//!
//! let config = CompilerConfig::new().with_cc_path("clang");
//! compile_file_with_config(Path::new("prog.c"), Path::new("prog"), false, Stage::All, &config)?;
//! # Ok::<(), String>(())
//! ```

pub mod asm;
pub mod ast;
pub mod config;
pub mod context;
pub mod driver;
pub mod error;
pub mod ir_emitter;
pub mod lexer;
pub mod loop_labeler;
pub mod parser;
pub mod resolver;
pub mod symbols;
pub mod tacky;
pub mod typechecker;
pub mod types;

pub use config::CompilerConfig;
pub use driver::Stage;
pub use error::{CResult, CompileError};

use std::path::Path;

/// Compile a C source file all the way to a linked executable, using the
/// default [`CompilerConfig`].
pub fn compile_file(input: &Path, output: &Path, keep_intermediate: bool) -> Result<(), String> {
    let config = CompilerConfig::new().with_keep_intermediate(keep_intermediate);
    compile_file_with_config(input, output, Stage::All, &config)
}

/// Compile a C source file with a custom [`CompilerConfig`], stopping at the
/// requested pipeline [`Stage`]. Stages before [`Stage::Codegen`] write
/// nothing to `output` — they exist for the CLI's `--lex`/`--parse`/
/// `--validate`/`--tacky` flags, which only check that the corresponding
/// pass accepts the input.
pub fn compile_file_with_config(input: &Path, output: &Path, stage: Stage, config: &CompilerConfig) -> Result<(), String> {
    let asm_text = driver::compile_file(input, stage, config).map_err(|e| e.to_string())?;
    let Some(asm_text) = asm_text else { return Ok(()) };
    if stage == Stage::Codegen {
        std::fs::write(output.with_extension("s"), asm_text).map_err(|e| e.to_string())?;
        return Ok(());
    }
    driver::assemble_and_link(&asm_text, output, false, config).map_err(|e| e.to_string())
}

/// Compile a C source string straight through to assembly text, without
/// touching the filesystem or invoking a host toolchain. Used by tests and
/// by callers that only want the emitted assembly.
pub fn compile_to_assembly(source: &str) -> Result<String, String> {
    driver::compile_source(source, Stage::All).map_err(|e| e.to_string())?.ok_or_else(|| {
        "internal error: Stage::All produced no assembly text".to_string()
    })
}
