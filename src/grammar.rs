//! EBNF grammar loader.
//!
//! Reads `spec/grammar.ebnf` and extracts the lexical inventory: the keyword
//! set and the operator list (sorted longest-first), each mapped to its
//! `TokenKind`. The grammar file is the single source of truth for which
//! tokens exist — the lexer builds its lookup tables from `GrammarInfo`, and
//! a kind name that does not resolve to a `TokenKind` is a fatal
//! configuration error. The `@syntax` section is documentation; it is only
//! checked for brace balance.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::lexer::TokenKind;

/// The bundled grammar, compiled into the binary. `--grammar` overrides it.
const BUNDLED_GRAMMAR: &str = include_str!("../spec/grammar.ebnf");

#[derive(Error, Debug)]
pub enum GrammarError {
    #[error("cannot read grammar file: {0}")]
    Io(#[from] std::io::Error),
    #[error("grammar has no {0} section")]
    MissingSection(&'static str),
    #[error("unbalanced braces in {0} section")]
    Unbalanced(&'static str),
    #[error("keyword `{keyword}` maps to kind `{kind}`, which TokenKind does not define")]
    UnknownKeywordKind { keyword: String, kind: String },
    #[error("operator `{op}` maps to kind `{kind}`, which TokenKind does not define")]
    UnknownOperatorKind { op: String, kind: String },
    #[error("no character name for `{ch}` in operator `{op}`")]
    UnnamedChar { ch: char, op: String },
}

/// Lexical information extracted from the grammar file.
#[derive(Debug, Clone)]
pub struct GrammarInfo {
    keywords: Vec<(String, TokenKind)>,
    /// Longest-first, so the lexer's prefix match is greedy.
    operators: Vec<(String, TokenKind)>,
}

impl GrammarInfo {
    /// Parse grammar text into lexical tables.
    pub fn parse(text: &str) -> Result<Self, GrammarError> {
        let lexical = extract_brace_block(text, "@lexical")
            .ok_or(GrammarError::MissingSection("@lexical"))?;
        // @syntax is not required to exist, but if present it must balance.
        if text.contains("@syntax") && extract_brace_block(text, "@syntax").is_none() {
            return Err(GrammarError::Unbalanced("@syntax"));
        }

        let kw_body = extract_brace_block(&lexical, "@keywords")
            .ok_or(GrammarError::MissingSection("@keywords"))?;
        let op_body = extract_brace_block(&lexical, "@operators")
            .ok_or(GrammarError::MissingSection("@operators"))?;

        let mut keywords = Vec::new();
        for word in extract_words(&kw_body) {
            let kind_name = word.to_uppercase();
            let kind = TokenKind::from_name(&kind_name).ok_or_else(|| {
                GrammarError::UnknownKeywordKind {
                    keyword: word.clone(),
                    kind: kind_name.clone(),
                }
            })?;
            keywords.push((word, kind));
        }

        let mut operators = Vec::new();
        for op in extract_quoted(&op_body) {
            let kind_name = operator_kind_name(&op)?;
            let kind = TokenKind::from_name(&kind_name).ok_or_else(|| {
                GrammarError::UnknownOperatorKind {
                    op: op.clone(),
                    kind: kind_name.clone(),
                }
            })?;
            operators.push((op, kind));
        }
        // Longest-first for greedy matching, then lexicographic for stability.
        operators.sort_by(|(a, _), (b, _)| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

        Ok(GrammarInfo { keywords, operators })
    }

    /// Parse a grammar file from disk.
    pub fn load(path: &Path) -> Result<Self, GrammarError> {
        Self::parse(&fs::read_to_string(path)?)
    }

    /// Parse the grammar bundled into the binary.
    pub fn bundled() -> Result<Self, GrammarError> {
        Self::parse(BUNDLED_GRAMMAR)
    }

    /// Look up the kind of a keyword, if `ident` is one.
    pub fn keyword_kind(&self, ident: &str) -> Option<TokenKind> {
        self.keywords
            .iter()
            .find(|(kw, _)| kw == ident)
            .map(|(_, k)| *k)
    }

    /// Operators with their kinds, longest-first.
    pub fn operators(&self) -> &[(String, TokenKind)] {
        &self.operators
    }

    /// All keyword spellings.
    pub fn keywords(&self) -> impl Iterator<Item = &str> {
        self.keywords.iter().map(|(kw, _)| kw.as_str())
    }

    /// Whether a token kind is declared by the grammar (or is structural).
    /// Used by the grammar-closure invariant tests.
    pub fn declares(&self, kind: TokenKind) -> bool {
        kind.is_structural()
            || self.keywords.iter().any(|(_, k)| *k == kind)
            || self.operators.iter().any(|(_, k)| *k == kind)
    }
}

// ============================================================================
// Kind-name derivation
// ============================================================================

fn char_name(ch: char) -> Option<&'static str> {
    Some(match ch {
        '+' => "PLUS",
        '-' => "MINUS",
        '*' => "STAR",
        '/' => "SLASH",
        '%' => "PERCENT",
        '=' => "EQ",
        '<' => "LT",
        '>' => "GT",
        '!' => "BANG",
        '&' => "AMP",
        '|' => "PIPE",
        '^' => "CARET",
        '~' => "TILDE",
        '?' => "QUESTION",
        '.' => "DOT",
        ',' => "COMMA",
        ';' => "SEMICOLON",
        ':' => "COLON",
        '(' => "LPAREN",
        ')' => "RPAREN",
        '[' => "LBRACKET",
        ']' => "RBRACKET",
        '{' => "LBRACE",
        '}' => "RBRACE",
        _ => return None,
    })
}

/// Derive a TokenKind name from an operator spelling.
///
/// Single characters use the name table directly (`+` → `PLUS`); multi-char
/// operators join character names with `_` (`+=` → `PLUS_EQ`). `->` and `=>`
/// have conventional names.
fn operator_kind_name(op: &str) -> Result<String, GrammarError> {
    match op {
        "->" => return Ok("ARROW".into()),
        "=>" => return Ok("FAT_ARROW".into()),
        _ => {}
    }
    let mut parts = Vec::new();
    for ch in op.chars() {
        let name = char_name(ch).ok_or_else(|| GrammarError::UnnamedChar {
            ch,
            op: op.to_string(),
        })?;
        parts.push(name);
    }
    Ok(parts.join("_"))
}

// ============================================================================
// Section extraction
// ============================================================================

/// Extract the content between `{ }` following `marker`, honoring nested
/// braces, `--` line comments, `(* *)` block comments, and quoted strings.
/// A marker mentioned in prose (the file's header comment) does not count:
/// only whitespace may separate the marker from its opening brace.
fn extract_brace_block(text: &str, marker: &str) -> Option<String> {
    let mut search_from = 0;
    while let Some(rel) = text[search_from..].find(marker) {
        let at = search_from + rel;
        let rest = &text[at + marker.len()..];
        if let Some(open) = rest.find('{') {
            if rest[..open].chars().all(char::is_whitespace) {
                return scan_braced_body(&rest[open + 1..]);
            }
        }
        search_from = at + marker.len();
    }
    None
}

fn scan_braced_body(body: &str) -> Option<String> {
    let bytes: Vec<char> = body.chars().collect();
    let mut depth = 1usize;
    let mut i = 0usize;
    while i < bytes.len() {
        match bytes[i] {
            '-' if bytes.get(i + 1) == Some(&'-') => {
                while i < bytes.len() && bytes[i] != '\n' {
                    i += 1;
                }
            }
            '(' if bytes.get(i + 1) == Some(&'*') => {
                i += 2;
                while i + 1 < bytes.len() && !(bytes[i] == '*' && bytes[i + 1] == ')') {
                    i += 1;
                }
                i += 2;
            }
            '"' => {
                i += 1;
                while i < bytes.len() && bytes[i] != '"' {
                    if bytes[i] == '\\' {
                        i += 1;
                    }
                    i += 1;
                }
                i += 1;
            }
            '{' => {
                depth += 1;
                i += 1;
            }
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(bytes[..i].iter().collect());
                }
                i += 1;
            }
            _ => i += 1,
        }
    }
    None
}

/// All identifier-shaped words in a section body, comments stripped.
fn extract_words(body: &str) -> Vec<String> {
    let mut words = Vec::new();
    for line in body.lines() {
        let line = match line.find("--") {
            Some(pos) => &line[..pos],
            None => line,
        };
        let mut current = String::new();
        for ch in line.chars() {
            if ch.is_ascii_alphanumeric() || ch == '_' {
                current.push(ch);
            } else if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
        }
        if !current.is_empty() {
            words.push(current);
        }
    }
    words
}

/// All double-quoted strings in a section body. Comments are skipped by
/// character scan — a quoted `"--"` is the decrement operator, not a
/// comment start.
fn extract_quoted(body: &str) -> Vec<String> {
    let mut out = Vec::new();
    let chars: Vec<char> = body.chars().collect();
    let mut i = 0usize;
    while i < chars.len() {
        match chars[i] {
            '"' => {
                let mut s = String::new();
                i += 1;
                while i < chars.len() && chars[i] != '"' {
                    s.push(chars[i]);
                    i += 1;
                }
                i += 1;
                if !s.is_empty() {
                    out.push(s);
                }
            }
            '-' if chars.get(i + 1) == Some(&'-') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            _ => i += 1,
        }
    }
    out
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_grammar_parses() {
        let gi = GrammarInfo::bundled().unwrap();
        assert!(gi.keyword_kind("class").is_some());
        assert!(gi.keyword_kind("while").is_some());
        assert!(gi.keyword_kind("not_a_keyword").is_none());
    }

    #[test]
    fn operators_are_longest_first() {
        let gi = GrammarInfo::bundled().unwrap();
        let ops = gi.operators();
        for pair in ops.windows(2) {
            assert!(pair[0].0.len() >= pair[1].0.len());
        }
        // `<<=` must come before `<<` which must come before `<`.
        let pos = |s: &str| ops.iter().position(|(op, _)| op == s).unwrap();
        assert!(pos("<<=") < pos("<<"));
        assert!(pos("<<") < pos("<"));
    }

    #[test]
    fn kind_name_derivation() {
        assert_eq!(operator_kind_name("+").unwrap(), "PLUS");
        assert_eq!(operator_kind_name("+=").unwrap(), "PLUS_EQ");
        assert_eq!(operator_kind_name("->").unwrap(), "ARROW");
        assert_eq!(operator_kind_name("?.").unwrap(), "QUESTION_DOT");
        assert_eq!(operator_kind_name("<<=").unwrap(), "LT_LT_EQ");
    }

    #[test]
    fn unknown_kind_is_fatal() {
        let text = r#"@lexical { @keywords { zorble } @operators { "+" } }"#;
        let err = GrammarInfo::parse(text).unwrap_err();
        assert!(matches!(err, GrammarError::UnknownKeywordKind { .. }));
    }

    #[test]
    fn comments_are_stripped() {
        let text = "@lexical { @keywords { if -- else is commented out\n while } @operators { \"+\" -- \"-\"\n } }";
        let gi = GrammarInfo::parse(text).unwrap();
        assert!(gi.keyword_kind("if").is_some());
        assert!(gi.keyword_kind("while").is_some());
        assert!(gi.keyword_kind("else").is_none());
        assert_eq!(gi.operators().len(), 1);
    }
}
