//! Pipeline orchestration (`spec.md` §6): runs the nine passes in order,
//! shells out to the host `cc` for preprocessing and for assembling/linking
//! the emitted text, and exposes the stage-stopping entry points the CLI's
//! `--lex`/`--parse`/`--validate`/`--tacky`/`--codegen` flags need.

use crate::asm;
use crate::config::CompilerConfig;
use crate::context::Context;
use crate::error::{CResult, CompileError};
use crate::ir_emitter;
use crate::lexer;
use crate::loop_labeler;
use crate::parser::Parser;
use crate::resolver;
use crate::typechecker::TypeChecker;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Which stage to stop after. Mirrors the CLI's stage flags 1:1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Lex,
    Parse,
    Validate,
    Tacky,
    Codegen,
    All,
}

/// Preprocess `input` with `cc -E -P` into a temporary `.i` file, run it
/// through every requested pipeline stage, and return the emitted assembly
/// text (`None` if `stage` stops before code generation). The preprocessed
/// file is removed on both success and failure (`spec.md` §5).
pub fn compile_file(input: &Path, stage: Stage, config: &CompilerConfig) -> CResult<Option<String>> {
    let preprocessed_path = input.with_extension("i");
    preprocess(input, &preprocessed_path, config)?;
    let source = fs::read_to_string(&preprocessed_path).map_err(|e| {
        CompileError::Internal(format!("failed to read preprocessed file '{}': {e}", preprocessed_path.display()))
    });
    let result = source.and_then(|source| compile_source(&source, stage));
    if !config.keep_intermediate {
        fs::remove_file(&preprocessed_path).ok();
    }
    result
}

fn preprocess(input: &Path, out: &Path, config: &CompilerConfig) -> CResult<()> {
    tracing::debug!(input = %input.display(), "preprocessing");
    let status = Command::new(&config.cc_path)
        .arg("-E")
        .arg("-P")
        .arg(input)
        .arg("-o")
        .arg(out)
        .status()
        .map_err(|e| CompileError::Internal(format!("failed to run '{}': {e}", config.cc_path.display())))?;
    if !status.success() {
        return Err(CompileError::Internal(format!("preprocessing '{}' failed", input.display())));
    }
    Ok(())
}

/// Runs the in-memory part of the pipeline (lexer through code emission)
/// over already-preprocessed source text. Exposed separately from
/// [`compile_file`] so unit/integration tests can exercise the pipeline
/// without a `cc` on `PATH`.
pub fn compile_source(source: &str, stage: Stage) -> CResult<Option<String>> {
    tracing::debug!("lexing");
    lexer::lex(source).map_err(CompileError::Lex)?;
    if stage == Stage::Lex {
        return Ok(None);
    }

    tracing::debug!("parsing");
    let mut parser = Parser::new(source).map_err(CompileError::Syntax)?;
    let program = parser.parse_program().map_err(CompileError::Syntax)?;
    if stage == Stage::Parse {
        return Ok(None);
    }

    let mut ctx = Context::new();
    tracing::debug!("resolving");
    let program = resolver::resolve_program(&mut ctx, program)?;
    tracing::debug!("typechecking");
    let program = TypeChecker::new(&mut ctx).check_program(program)?;
    tracing::debug!("loop_labeling");
    let program = loop_labeler::label_program(&mut ctx, program)?;
    if stage == Stage::Validate {
        return Ok(None);
    }

    tracing::debug!("emitting_tacky");
    let ir = ir_emitter::emit_program(&mut ctx, program);
    if stage == Stage::Tacky {
        return Ok(None);
    }

    tracing::debug!("lowering_asm");
    let (asm_program, backend) = asm::lower::lower_program(&ctx, ir);
    tracing::debug!("allocating");
    let asm_program = asm::allocate::allocate_program(&backend, asm_program);
    let asm_program = asm::legalize::legalize_program(asm_program);
    tracing::debug!("emitting_asm");
    let text = asm::emit::emit_program(&asm_program, &backend);

    if stage == Stage::Codegen {
        return Ok(None);
    }
    Ok(Some(text))
}

/// Lexes `source` and returns the token stream, for the CLI's `--lex` flag.
pub fn lex_source(source: &str) -> CResult<Vec<lexer::Token>> {
    lexer::lex(source).map_err(CompileError::Lex)
}

/// Parses `source` into a C AST, for the CLI's `--parse` flag.
pub fn parse_source(source: &str) -> CResult<crate::ast::Program> {
    let mut parser = Parser::new(source).map_err(CompileError::Syntax)?;
    parser.parse_program().map_err(CompileError::Syntax)
}

/// Parses and runs variable resolution, type checking, and loop labeling,
/// for the CLI's `--validate` flag.
pub fn validate_source(source: &str) -> CResult<crate::ast::Program> {
    let program = parse_source(source)?;
    let mut ctx = Context::new();
    let program = resolver::resolve_program(&mut ctx, program)?;
    let program = TypeChecker::new(&mut ctx).check_program(program)?;
    loop_labeler::label_program(&mut ctx, program)
}

/// Runs the pipeline through TACKY emission, for the CLI's `--tacky` flag.
pub fn tacky_source(source: &str) -> CResult<crate::tacky::IRProgram> {
    let mut ctx = Context::new();
    let program = parse_source(source)?;
    let program = resolver::resolve_program(&mut ctx, program)?;
    let program = TypeChecker::new(&mut ctx).check_program(program)?;
    let program = loop_labeler::label_program(&mut ctx, program)?;
    Ok(ir_emitter::emit_program(&mut ctx, program))
}

/// Runs the pipeline through assembly lowering, allocation, and
/// legalization (but not text emission), for the CLI's `--codegen` flag.
pub fn codegen_source(source: &str) -> CResult<asm::Program> {
    let mut ctx = Context::new();
    let program = parse_source(source)?;
    let program = resolver::resolve_program(&mut ctx, program)?;
    let program = TypeChecker::new(&mut ctx).check_program(program)?;
    let program = loop_labeler::label_program(&mut ctx, program)?;
    let ir = ir_emitter::emit_program(&mut ctx, program);
    let (asm_program, backend) = asm::lower::lower_program(&ctx, ir);
    let asm_program = asm::allocate::allocate_program(&backend, asm_program);
    Ok(asm::legalize::legalize_program(asm_program))
}

/// Assembles and links `asm_text` into `output` via the host `cc`, matching
/// `spec.md` §6: `{cc_path} {extra_args} {input.s} -o {output}`, or with
/// `-c` to stop at a relocatable object instead of a linked executable.
pub fn assemble_and_link(asm_text: &str, output: &Path, object_only: bool, config: &CompilerConfig) -> CResult<()> {
    let asm_path = output.with_extension("s");
    fs::write(&asm_path, asm_text)
        .map_err(|e| CompileError::Internal(format!("failed to write '{}': {e}", asm_path.display())))?;

    let mut cc = Command::new(&config.cc_path);
    cc.args(&config.extra_cc_args);
    if object_only {
        cc.arg("-c");
    }
    cc.arg(&asm_path).arg("-o").arg(output);
    let status =
        cc.status().map_err(|e| CompileError::Internal(format!("failed to run '{}': {e}", config.cc_path.display())))?;

    if !config.keep_intermediate {
        fs::remove_file(&asm_path).ok();
    }
    if !status.success() {
        return Err(CompileError::Internal(format!("assembling '{}' failed", asm_path.display())));
    }
    Ok(())
}

/// Default output path for an input file: same stem, no extension (an
/// executable) or `.o` when `object_only` is set.
pub fn default_output_path(input: &Path, object_only: bool) -> PathBuf {
    let stem = input.file_stem().unwrap_or_default();
    let mut out = PathBuf::from(stem);
    if object_only {
        out.set_extension("o");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lex_stage_stops_before_parsing() {
        let result = compile_source("int main(void) { return 0; }", Stage::Lex);
        assert_eq!(result, Ok(None));
    }

    #[test]
    fn all_stage_produces_assembly_text() {
        let result = compile_source("int main(void) { return 2; }", Stage::All).expect("should compile");
        let text = result.expect("assembly text");
        assert!(text.contains("main:"));
        assert!(text.contains("ret"));
    }

    #[test]
    fn loop_escape_error_surfaces_from_validate_stage() {
        let result = compile_source("int main(void) { break; }", Stage::Validate);
        assert!(matches!(result, Err(CompileError::Loop(_))));
    }

    #[test]
    fn default_output_path_strips_extension() {
        assert_eq!(default_output_path(Path::new("foo.c"), false), PathBuf::from("foo"));
        assert_eq!(default_output_path(Path::new("foo.c"), true), PathBuf::from("foo.o"));
    }
}
