//! Abstract syntax for btrc.
//!
//! The node definitions themselves live in [`nodes`], generated from
//! `spec/ast.asdl` by the `asdl-gen` binary; this module carries the
//! hand-maintained support types (spans, source maps, node ids) and the
//! helper impls the rest of the compiler leans on.

pub mod nodes;

pub use nodes::*;

// ============================================================================
// Spans and node identity
// ============================================================================

/// Byte range in the preprocessed source, for error reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn merge(&self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

/// Identity of an expression node, assigned by the parser. The analyzer
/// keys its type table on these instead of holding back-references into the
/// tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct NodeId(pub u32);

/// Hands out fresh node ids during parsing.
#[derive(Debug, Default)]
pub struct NodeIdGen {
    next: u32,
}

impl NodeIdGen {
    pub fn new() -> Self {
        Self { next: 0 }
    }

    pub fn fresh(&mut self) -> NodeId {
        let id = NodeId(self.next);
        self.next += 1;
        id
    }
}

// ============================================================================
// Source map
// ============================================================================

/// Maps byte offsets back to 1-based line/column pairs and line text.
#[derive(Debug, Clone)]
pub struct SourceMap {
    src: String,
    line_starts: Vec<usize>,
}

impl SourceMap {
    pub fn new(src: &str) -> Self {
        let mut line_starts = vec![0];
        for (i, b) in src.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(i + 1);
            }
        }
        SourceMap {
            src: src.to_string(),
            line_starts,
        }
    }

    /// 1-based (line, column) of a byte offset.
    pub fn position(&self, offset: usize) -> (u32, u32) {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        let col = offset - self.line_starts[line] + 1;
        (line as u32 + 1, col as u32)
    }

    /// Text of a 1-based line, without its newline.
    pub fn line_text(&self, line: u32) -> &str {
        let idx = (line as usize).saturating_sub(1);
        let start = match self.line_starts.get(idx) {
            Some(&s) => s,
            None => return "",
        };
        let end = self
            .line_starts
            .get(idx + 1)
            .map(|&e| e.saturating_sub(1))
            .unwrap_or(self.src.len());
        &self.src[start..end.max(start)]
    }
}

// ============================================================================
// Convenience constructors and queries
// ============================================================================

impl Expr {
    pub fn new(kind: ExprKind, id: NodeId, span: Span) -> Self {
        Expr { kind, id, span }
    }

    /// The identifier name if this is a plain variable reference.
    pub fn as_ident(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Ident { name } => Some(name),
            _ => None,
        }
    }
}

impl Stmt {
    pub fn new(kind: StmtKind, span: Span) -> Self {
        Stmt { kind, span }
    }
}

impl TypeExpr {
    pub fn new(kind: TypeExprKind, span: Span) -> Self {
        TypeExpr { kind, span }
    }

    pub fn named(name: &str, span: Span) -> Self {
        TypeExpr {
            kind: TypeExprKind::Named {
                name: name.to_string(),
                args: Vec::new(),
            },
            span,
        }
    }

    /// The bare name if this is an unparameterized named type.
    pub fn as_plain_name(&self) -> Option<&str> {
        match &self.kind {
            TypeExprKind::Named { name, args } if args.is_empty() => Some(name),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_merge() {
        let a = Span::new(4, 10);
        let b = Span::new(7, 15);
        assert_eq!(a.merge(b), Span::new(4, 15));
    }

    #[test]
    fn source_map_positions() {
        let map = SourceMap::new("ab\ncdef\ng");
        assert_eq!(map.position(0), (1, 1));
        assert_eq!(map.position(3), (2, 1));
        assert_eq!(map.position(6), (2, 4));
        assert_eq!(map.position(8), (3, 1));
        assert_eq!(map.line_text(2), "cdef");
    }
}
