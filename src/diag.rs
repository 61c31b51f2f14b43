//! Diagnostics.
//!
//! Recoverable problems (lexer, parser, analyzer) are not Rust errors: each
//! stage accumulates `Diagnostic`s and the pipeline renders the whole batch
//! at the stage boundary. Rendering includes the source line and a caret
//! underline, driven by the `SourceMap`.

use std::fmt;

use crate::ast::{SourceMap, Span};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Lexer,
    Parser,
    Analyzer,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Lexer => write!(f, "lex"),
            Stage::Parser => write!(f, "parse"),
            Stage::Analyzer => write!(f, "semantic"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub stage: Stage,
    pub message: String,
    pub span: Span,
}

impl Diagnostic {
    pub fn error(stage: Stage, message: String, span: Span) -> Self {
        Diagnostic {
            severity: Severity::Error,
            stage,
            message,
            span,
        }
    }

    pub fn warning(stage: Stage, message: String, span: Span) -> Self {
        Diagnostic {
            severity: Severity::Warning,
            stage,
            message,
            span,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Render with location, source line and caret underline:
    ///
    /// ```text
    /// main.btrc:3:9: parse error: expected `;`
    ///     int x = 1
    ///         ^
    /// ```
    pub fn render(&self, map: &SourceMap, filename: &str) -> String {
        let (line, col) = map.position(self.span.start);
        let sev = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        let mut out = format!(
            "{}:{}:{}: {} {}: {}\n",
            filename, line, col, self.stage, sev, self.message
        );
        let text = map.line_text(line);
        if !text.is_empty() {
            let width = (self.span.end.saturating_sub(self.span.start)).max(1);
            let width = width.min(text.len().saturating_sub(col as usize - 1).max(1));
            out.push_str(&format!("    {}\n", text));
            out.push_str(&format!("    {}{}", " ".repeat(col as usize - 1), "^".repeat(width)));
        }
        out
    }
}

/// True if any diagnostic in the batch is an error.
pub fn has_errors(diags: &[Diagnostic]) -> bool {
    diags.iter().any(Diagnostic::is_error)
}

/// Render a whole batch, one entry per diagnostic.
pub fn render_all(diags: &[Diagnostic], map: &SourceMap, filename: &str) -> String {
    diags
        .iter()
        .map(|d| d.render(map, filename))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_includes_caret() {
        let map = SourceMap::new("int x = @;\n");
        let d = Diagnostic::error(Stage::Lexer, "unexpected character `@`".into(), Span::new(8, 9));
        let rendered = d.render(&map, "t.btrc");
        assert!(rendered.contains("t.btrc:1:9"));
        assert!(rendered.contains("int x = @;"));
        assert!(rendered.lines().last().unwrap().trim_end().ends_with('^'));
    }

    #[test]
    fn error_detection() {
        let w = Diagnostic::warning(Stage::Analyzer, "w".into(), Span::default());
        let e = Diagnostic::error(Stage::Parser, "e".into(), Span::default());
        assert!(!has_errors(&[w.clone()]));
        assert!(has_errors(&[w, e]));
    }
}
