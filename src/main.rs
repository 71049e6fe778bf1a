//! `ccomp` CLI — compiles one or more C source files to x86-64 assembly and
//! (unless a stage flag asks otherwise) on through to a linked executable.

use ccomp::config::CompilerConfig;
use ccomp::driver::{self, Stage};
use clap::Parser as ClapParser;
use std::path::PathBuf;
use std::process;

#[derive(ClapParser)]
#[command(name = "ccomp")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Compile a strict subset of C to x86-64 assembly", long_about = None)]
struct Cli {
    /// Input C source file(s)
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Print tokens and stop
    #[arg(long, group = "stage")]
    lex: bool,

    /// Print the parsed AST and stop
    #[arg(long, group = "stage")]
    parse: bool,

    /// Print the semantically analyzed AST and stop
    #[arg(long, group = "stage")]
    validate: bool,

    /// Print TACKY IR and stop
    #[arg(long, group = "stage")]
    tacky: bool,

    /// Print assembly AST and stop
    #[arg(long, group = "stage")]
    codegen: bool,

    /// Full pipeline, assemble to an executable (the default)
    #[arg(long, group = "stage")]
    all: bool,

    /// Full pipeline, printing every intermediate form along the way
    #[arg(long, group = "stage")]
    testall: bool,

    /// Assemble to a relocatable object instead of linking an executable
    #[arg(short = 'c', group = "stage")]
    object_only: bool,

    /// Output path (only meaningful with a single input file)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Raise the tracing filter to `debug`
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = CompilerConfig::new();
    for file in &cli.files {
        if let Err(message) = run_one(&cli, file, &config) {
            eprintln!("error: {message}");
            process::exit(1);
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into());
    tracing_subscriber::fmt().with_env_filter(filter).without_time().init();
}

fn run_one(cli: &Cli, file: &std::path::Path, config: &CompilerConfig) -> Result<(), String> {
    if cli.lex || cli.parse || cli.validate || cli.tacky || cli.codegen || cli.testall {
        return run_print_stage(cli, file);
    }

    let output = cli.output.clone().unwrap_or_else(|| driver::default_output_path(file, cli.object_only));
    let asm_text = driver::compile_file(file, Stage::All, config).map_err(|e| e.to_string())?;
    let asm_text = asm_text.ok_or_else(|| "internal error: full pipeline produced no assembly".to_string())?;
    driver::assemble_and_link(&asm_text, &output, cli.object_only, config).map_err(|e| e.to_string())?;
    println!("{} -> {}", file.display(), output.display());
    Ok(())
}

fn run_print_stage(cli: &Cli, file: &std::path::Path) -> Result<(), String> {
    let source = std::fs::read_to_string(file).map_err(|e| format!("failed to read '{}': {e}", file.display()))?;

    if cli.testall {
        println!("=== tokens ===");
        println!("{:#?}", driver::lex_source(&source).map_err(|e| e.to_string())?);
        println!("=== ast ===");
        println!("{:#?}", driver::parse_source(&source).map_err(|e| e.to_string())?);
        println!("=== validated ast ===");
        println!("{:#?}", driver::validate_source(&source).map_err(|e| e.to_string())?);
        println!("=== tacky ===");
        println!("{:#?}", driver::tacky_source(&source).map_err(|e| e.to_string())?);
        println!("=== asm ===");
        println!("{:#?}", driver::codegen_source(&source).map_err(|e| e.to_string())?);
        return Ok(());
    }

    if cli.lex {
        println!("{:#?}", driver::lex_source(&source).map_err(|e| e.to_string())?);
    } else if cli.parse {
        println!("{:#?}", driver::parse_source(&source).map_err(|e| e.to_string())?);
    } else if cli.validate {
        println!("{:#?}", driver::validate_source(&source).map_err(|e| e.to_string())?);
    } else if cli.tacky {
        println!("{:#?}", driver::tacky_source(&source).map_err(|e| e.to_string())?);
    } else if cli.codegen {
        println!("{:#?}", driver::codegen_source(&source).map_err(|e| e.to_string())?);
    }
    Ok(())
}
