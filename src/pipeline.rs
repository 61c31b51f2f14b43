//! Pipeline orchestration.
//!
//! Include resolution and newline normalization, then the six stages in
//! order: lex, parse, analyze, generate IR, optimize, emit. Each stage's
//! diagnostics are batched and rendered at its boundary; the next stage
//! runs only when no errors were produced. Intermediate outputs stay in
//! memory unless a dump stage is requested.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::analyzer;
use crate::ast::SourceMap;
use crate::diag::{self, Diagnostic};
use crate::emit;
use crate::grammar::{GrammarError, GrammarInfo};
use crate::ir;
use crate::lexer::Lexer;
use crate::parser::Parser;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DumpStage {
    Tokens,
    Ast,
    Ir,
    OptimizedIr,
}

#[derive(Error, Debug)]
pub enum CompileError {
    #[error("{0}")]
    Config(#[from] GrammarError),
    #[error("cannot read {}: {}", path.display(), source)]
    Io {
        path: PathBuf,
        source: io::Error,
    },
    /// Diagnostics were already rendered; the payload is the full batch.
    #[error("{rendered}")]
    Compile { rendered: String },
}

/// Successful compilation: emitted C plus any warnings (already rendered).
#[derive(Debug)]
pub struct CompileOutput {
    pub code: String,
    pub warnings: Vec<String>,
}

// ============================================================================
// Include resolution
// ============================================================================

/// Textually resolve `#include "file.btrc"` directives, each file at most
/// once per compilation. Paths resolve relative to the including file;
/// `\r\n` is normalized on read.
pub fn resolve_includes(
    source: &str,
    source_path: &Path,
    included: &mut HashSet<PathBuf>,
) -> Result<String, CompileError> {
    let abs = source_path
        .canonicalize()
        .unwrap_or_else(|_| source_path.to_path_buf());
    if !included.insert(abs.clone()) {
        return Ok(String::new());
    }
    let dir = abs.parent().map(Path::to_path_buf).unwrap_or_default();

    let mut out = Vec::new();
    for line in source.replace("\r\n", "\n").lines() {
        match parse_include_line(line) {
            Some(include_path) => {
                let full = dir.join(include_path);
                let text = fs::read_to_string(&full).map_err(|e| CompileError::Io {
                    path: full.clone(),
                    source: e,
                })?;
                out.push(resolve_includes(&text, &full, included)?);
            }
            None => out.push(line.to_string()),
        }
    }
    Ok(out.join("\n"))
}

fn parse_include_line(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    let rest = trimmed.strip_prefix("#include")?.trim();
    let inner = rest.strip_prefix('"')?.strip_suffix('"')?;
    if inner.ends_with(".btrc") {
        Some(inner)
    } else {
        None
    }
}

// ============================================================================
// Stage driving
// ============================================================================

fn render_batch(
    diags: &[Diagnostic],
    map: &SourceMap,
    filename: &str,
) -> Result<Vec<String>, CompileError> {
    let warnings = diags
        .iter()
        .filter(|d| !d.is_error())
        .map(|d| d.render(map, filename))
        .collect();
    if diag::has_errors(diags) {
        return Err(CompileError::Compile {
            rendered: diag::render_all(diags, map, filename),
        });
    }
    Ok(warnings)
}

/// Run the whole pipeline on preprocessed source.
pub fn compile_source(
    source: &str,
    filename: &str,
    grammar: &GrammarInfo,
) -> Result<CompileOutput, CompileError> {
    let source = source.replace("\r\n", "\n");
    let map = SourceMap::new(&source);
    let mut warnings = Vec::new();

    let (tokens, lex_diags) = Lexer::new(&source, grammar).tokenize();
    warnings.extend(render_batch(&lex_diags, &map, filename)?);

    let (program, parse_diags) = Parser::new(tokens, grammar).parse_program();
    warnings.extend(render_batch(&parse_diags, &map, filename)?);

    let (analysis, sema_diags) = analyzer::analyze(program);
    warnings.extend(render_batch(&sema_diags, &map, filename)?);

    let mut module = ir::generate(&analysis);
    ir::optimize(&mut module);
    let code = emit::emit(&module);

    Ok(CompileOutput { code, warnings })
}

/// Produce the requested stage dump instead of C output.
pub fn dump_stage(
    source: &str,
    filename: &str,
    grammar: &GrammarInfo,
    stage: DumpStage,
) -> Result<String, CompileError> {
    let source = source.replace("\r\n", "\n");
    let map = SourceMap::new(&source);

    let (tokens, lex_diags) = Lexer::new(&source, grammar).tokenize();
    render_batch(&lex_diags, &map, filename)?;
    if stage == DumpStage::Tokens {
        return Ok(tokens
            .iter()
            .map(|t| t.to_string())
            .collect::<Vec<_>>()
            .join("\n"));
    }

    let (program, parse_diags) = Parser::new(tokens, grammar).parse_program();
    render_batch(&parse_diags, &map, filename)?;
    if stage == DumpStage::Ast {
        return Ok(format!("{:#?}", program));
    }

    let (analysis, sema_diags) = analyzer::analyze(program);
    render_batch(&sema_diags, &map, filename)?;

    let mut module = ir::generate(&analysis);
    if stage == DumpStage::Ir {
        return Ok(format!("{:#?}", module));
    }
    ir::optimize(&mut module);
    Ok(format!("{:#?}", module))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(src: &str) -> CompileOutput {
        let grammar = GrammarInfo::bundled().unwrap();
        compile_source(src, "test.btrc", &grammar).expect("compilation failed")
    }

    #[test]
    fn hello_world_end_to_end() {
        let out = compile("int main() { print(\"hi\"); return 0; }");
        assert!(out.code.contains("int main(void) {"));
        assert!(out.code.contains("printf(\"%s\\n\", \"hi\");"));
    }

    #[test]
    fn compile_errors_stop_the_pipeline() {
        let grammar = GrammarInfo::bundled().unwrap();
        let err = compile_source(
            "int main() { return missing_name; }",
            "test.btrc",
            &grammar,
        )
        .unwrap_err();
        match err {
            CompileError::Compile { rendered } => {
                assert!(rendered.contains("unknown identifier"));
            }
            other => panic!("expected compile error, got {:?}", other),
        }
    }

    #[test]
    fn include_lines_are_detected() {
        assert_eq!(parse_include_line("#include \"lib.btrc\""), Some("lib.btrc"));
        assert_eq!(parse_include_line("  #include \"a/b.btrc\"  "), Some("a/b.btrc"));
        assert_eq!(parse_include_line("#include <stdio.h>"), None);
        assert_eq!(parse_include_line("int x = 1;"), None);
    }
}
