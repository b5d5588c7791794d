//! Phase orchestration: source file in, linked executable out. The pipeline
//! stages hand whole values to each other; the first failing stage aborts
//! the run with a tagged, single-line error. Progress and pass diagnostics
//! go through `tracing`; the binary installs a subscriber for `--verbose`.

use crate::ast::Program;
use crate::error::SourceMetadata;
use crate::grammar::Parser;
use crate::lexer::Lexer;
use crate::target::Target;
use crate::{codegen, semantic};
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("could not read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("lex error: {0}")]
    Lex(crate::lexer::LexError),
    #[error("parse error: {0}")]
    Parse(crate::grammar::ParseError),
    #[error("semantic error: {0}")]
    Semantic(crate::semantic::SemanticError),
    #[error("codegen error: {0}")]
    Codegen(#[from] codegen::CodegenError),
    #[error("toolchain error: could not run `{tool}`: {source}")]
    ToolchainSpawn {
        tool: String,
        source: std::io::Error,
    },
    /// The assembler's or linker's own output, forwarded verbatim.
    #[error("toolchain error: `{tool}` failed:\n{output}")]
    Toolchain { tool: String, output: String },
}

#[derive(Debug)]
pub struct Options {
    pub input: PathBuf,
    pub output: Option<PathBuf>,
    pub keep_asm: bool,
    pub target: Option<Target>,
}

/// Compile one source file to an executable; returns the executable path.
pub fn compile(options: &Options) -> Result<PathBuf, CompileError> {
    let target = options.target.unwrap_or_else(Target::detect);
    if options.input.extension().map_or(true, |ext| ext != "lc") {
        eprintln!(
            "lcc: warning: input file `{}` should end in .lc",
            options.input.display()
        );
    }

    let source = fs::read_to_string(&options.input).map_err(|source| CompileError::Io {
        path: options.input.clone(),
        source,
    })?;
    let meta = SourceMetadata::new(&source).with_file(options.input.clone());

    tracing::info!(target: "driver", "compiling {} for {target}", options.input.display());
    tracing::info!(target: "lex", "lexing");
    let tokens = Lexer::new(&meta).tokenize().map_err(CompileError::Lex)?;
    tracing::debug!(target: "lex", "{} tokens", tokens.len());
    tracing::info!(target: "parse", "parsing");
    let mut program: Program = Parser::new(tokens, &meta)
        .parse()
        .map_err(CompileError::Parse)?;
    tracing::info!(target: "semantic", "checking");
    let registry = semantic::analyze(&mut program, &meta).map_err(CompileError::Semantic)?;
    tracing::info!(target: "codegen", "generating {target} assembly");
    let asm = codegen::generate(&program, &registry, target)?;
    tracing::debug!(target: "codegen", "{} bytes of assembly", asm.len());

    let output = options
        .output
        .clone()
        .unwrap_or_else(|| options.input.with_extension(""));
    let asm_path = options.input.with_extension("s");
    let object_path = output.with_extension("o");

    fs::write(&asm_path, asm).map_err(|source| CompileError::Write {
        path: asm_path.clone(),
        source,
    })?;

    let result = assemble_and_link(target, &asm_path, &object_path, &output);

    // intermediate-file hygiene happens on failure too
    let _ = fs::remove_file(&object_path);
    if !options.keep_asm {
        let _ = fs::remove_file(&asm_path);
    }
    result?;

    tracing::info!(target: "driver", "wrote {}", output.display());
    Ok(output)
}

fn assemble_and_link(
    target: Target,
    asm_path: &std::path::Path,
    object_path: &std::path::Path,
    output: &std::path::Path,
) -> Result<(), CompileError> {
    tracing::info!(target: "toolchain", "assembling with `{}`", target.assembler());
    let mut assembler = Command::new(target.assembler());
    assembler
        .args(target.assembler_args())
        .arg("-o")
        .arg(object_path)
        .arg(asm_path);
    run_tool(target.assembler(), &mut assembler)?;

    tracing::info!(target: "toolchain", "linking with `{}`", target.linker());
    let mut linker = Command::new(target.linker());
    linker.arg(object_path).arg("-o").arg(output);
    run_tool(target.linker(), &mut linker)
}

fn run_tool(tool: &str, command: &mut Command) -> Result<(), CompileError> {
    let output = command
        .output()
        .map_err(|source| CompileError::ToolchainSpawn {
            tool: tool.to_string(),
            source,
        })?;
    if output.status.success() {
        return Ok(());
    }
    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    Err(CompileError::Toolchain {
        tool: tool.to_string(),
        output: text,
    })
}

/// Library-level shorthand used by the integration tests: run the pipeline
/// up to assembly text without touching the filesystem or toolchain.
pub fn compile_to_assembly(source: &str, target: Target) -> Result<String, CompileError> {
    let meta = SourceMetadata::new(source);
    let tokens = Lexer::new(&meta).tokenize().map_err(CompileError::Lex)?;
    let mut program: Program = Parser::new(tokens, &meta)
        .parse()
        .map_err(CompileError::Parse)?;
    let registry = semantic::analyze(&mut program, &meta).map_err(CompileError::Semantic)?;
    Ok(codegen::generate(&program, &registry, target)?)
}
