//! Grammar-driven lexer.
//!
//! A single-pass scanner over UTF-8 source. Keyword and operator recognition
//! is table-driven from [`GrammarInfo`]; only the structural token classes
//! (identifiers, the literal families, EOF) are built in. Lexical errors are
//! collected as diagnostics and scanning resumes one character later, so a
//! whole file's worth of problems is reported in one run.

use std::fmt;

use crate::ast::Span;
use crate::diag::{Diagnostic, Stage};
use crate::grammar::GrammarInfo;

// ============================================================================
// Token kinds
// ============================================================================

/// Defines `TokenKind` together with the kind-name mapping used to validate
/// the grammar file. A grammar keyword `class` resolves to the kind named
/// `CLASS`; an operator `+=` resolves to `PLUS_EQ` (see `grammar.rs`).
macro_rules! token_kinds {
    ( $( $variant:ident => $name:literal, )+ ) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum TokenKind {
            $( $variant, )+
        }

        impl TokenKind {
            /// Resolve a grammar kind name (e.g. `"PLUS_EQ"`) to a kind.
            pub fn from_name(name: &str) -> Option<TokenKind> {
                match name {
                    $( $name => Some(TokenKind::$variant), )+
                    _ => None,
                }
            }

            /// The grammar-facing name of this kind.
            pub fn name(self) -> &'static str {
                match self {
                    $( TokenKind::$variant => $name, )+
                }
            }
        }
    };
}

token_kinds! {
    // Structural kinds (not declared by the grammar)
    IntLit => "INT_LIT",
    FloatLit => "FLOAT_LIT",
    StringLit => "STRING_LIT",
    CharLit => "CHAR_LIT",
    FStringLit => "FSTRING_LIT",
    Ident => "IDENT",
    Eof => "EOF",

    // C keywords
    Auto => "AUTO",
    Break => "BREAK",
    Case => "CASE",
    Char => "CHAR",
    Const => "CONST",
    Continue => "CONTINUE",
    Default => "DEFAULT",
    Do => "DO",
    Double => "DOUBLE",
    Else => "ELSE",
    Enum => "ENUM",
    Extern => "EXTERN",
    Float => "FLOAT",
    For => "FOR",
    Goto => "GOTO",
    If => "IF",
    Int => "INT",
    Long => "LONG",
    Register => "REGISTER",
    Return => "RETURN",
    Short => "SHORT",
    Signed => "SIGNED",
    Sizeof => "SIZEOF",
    Static => "STATIC",
    Struct => "STRUCT",
    Switch => "SWITCH",
    Typedef => "TYPEDEF",
    Union => "UNION",
    Unsigned => "UNSIGNED",
    Void => "VOID",
    Volatile => "VOLATILE",
    While => "WHILE",

    // btrc keywords
    Abstract => "ABSTRACT",
    Bool => "BOOL",
    Catch => "CATCH",
    Class => "CLASS",
    Delete => "DELETE",
    Extends => "EXTENDS",
    False => "FALSE",
    Finally => "FINALLY",
    Function => "FUNCTION",
    Implements => "IMPLEMENTS",
    In => "IN",
    Interface => "INTERFACE",
    Keep => "KEEP",
    New => "NEW",
    Null => "NULL",
    Override => "OVERRIDE",
    Private => "PRIVATE",
    Public => "PUBLIC",
    Release => "RELEASE",
    SelfKw => "SELF",
    Spawn => "SPAWN",
    String => "STRING",
    Super => "SUPER",
    Throw => "THROW",
    True => "TRUE",
    Try => "TRY",
    Var => "VAR",

    // Operators and delimiters
    Plus => "PLUS",
    Minus => "MINUS",
    Star => "STAR",
    Slash => "SLASH",
    Percent => "PERCENT",
    Eq => "EQ",
    EqEq => "EQ_EQ",
    BangEq => "BANG_EQ",
    Lt => "LT",
    Gt => "GT",
    LtEq => "LT_EQ",
    GtEq => "GT_EQ",
    AmpAmp => "AMP_AMP",
    PipePipe => "PIPE_PIPE",
    Bang => "BANG",
    Amp => "AMP",
    Pipe => "PIPE",
    Caret => "CARET",
    Tilde => "TILDE",
    LtLt => "LT_LT",
    GtGt => "GT_GT",
    PlusEq => "PLUS_EQ",
    MinusEq => "MINUS_EQ",
    StarEq => "STAR_EQ",
    SlashEq => "SLASH_EQ",
    PercentEq => "PERCENT_EQ",
    AmpEq => "AMP_EQ",
    PipeEq => "PIPE_EQ",
    CaretEq => "CARET_EQ",
    LtLtEq => "LT_LT_EQ",
    GtGtEq => "GT_GT_EQ",
    PlusPlus => "PLUS_PLUS",
    MinusMinus => "MINUS_MINUS",
    Arrow => "ARROW",
    FatArrow => "FAT_ARROW",
    Dot => "DOT",
    Question => "QUESTION",
    QuestionDot => "QUESTION_DOT",
    QuestionQuestion => "QUESTION_QUESTION",
    Colon => "COLON",
    Comma => "COMMA",
    Semicolon => "SEMICOLON",
    LParen => "LPAREN",
    RParen => "RPAREN",
    LBracket => "LBRACKET",
    RBracket => "RBRACKET",
    LBrace => "LBRACE",
    RBrace => "RBRACE",
}

impl TokenKind {
    /// Structural kinds exist independently of the grammar file.
    pub fn is_structural(self) -> bool {
        matches!(
            self,
            TokenKind::IntLit
                | TokenKind::FloatLit
                | TokenKind::StringLit
                | TokenKind::CharLit
                | TokenKind::FStringLit
                | TokenKind::Ident
                | TokenKind::Eof
        )
    }
}

// ============================================================================
// Tokens
// ============================================================================

/// A single token with its lexeme and source coordinates.
///
/// String, char and f-string lexemes keep their escape sequences raw (and
/// drop the surrounding quotes); numeric lexemes keep prefixes and suffixes.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub line: u32,
    pub col: u32,
    pub offset: usize,
}

impl Token {
    pub fn span(&self) -> Span {
        Span::new(self.offset, self.offset + self.text.len().max(1))
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} {} {:?}", self.line, self.col, self.kind.name(), self.text)
    }
}

// ============================================================================
// Lexer
// ============================================================================

pub struct Lexer<'a> {
    src: &'a str,
    grammar: &'a GrammarInfo,
    pos: usize,
    line: u32,
    col: u32,
    diags: Vec<Diagnostic>,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str, grammar: &'a GrammarInfo) -> Self {
        Lexer {
            src,
            grammar,
            pos: 0,
            line: 1,
            col: 1,
            diags: Vec::new(),
        }
    }

    /// Scan the whole input. Always returns a token stream ending in `Eof`;
    /// lexical problems come back as diagnostics alongside it.
    pub fn tokenize(mut self) -> (Vec<Token>, Vec<Diagnostic>) {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia();
            if self.at_end() {
                let (line, col, pos) = (self.line, self.col, self.pos);
                tokens.push(Token {
                    kind: TokenKind::Eof,
                    text: String::new(),
                    line,
                    col,
                    offset: pos,
                });
                break;
            }
            let (line, col, start) = (self.line, self.col, self.pos);
            match self.next_token() {
                Some((kind, text)) => {
                    tokens.push(Token { kind, text, line, col, offset: start });
                }
                None => {
                    let bad = self.peek().unwrap_or('\0');
                    self.diags.push(Diagnostic::error(
                        Stage::Lexer,
                        format!("unexpected character `{}`", bad.escape_default()),
                        Span::new(start, start + bad.len_utf8()),
                    ));
                    self.bump();
                }
            }
        }
        (tokens, self.diags)
    }

    // ------------------------------------------------------------------
    // Character primitives
    // ------------------------------------------------------------------

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn peek2(&self) -> Option<char> {
        let mut it = self.src[self.pos..].chars();
        it.next();
        it.next()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(ch)
    }

    fn starts_with(&self, s: &str) -> bool {
        self.src[self.pos..].starts_with(s)
    }

    // ------------------------------------------------------------------
    // Trivia
    // ------------------------------------------------------------------

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('/') if self.peek2() == Some('/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                // Block comments do not nest, as in C.
                Some('/') if self.peek2() == Some('*') => {
                    let start = self.pos;
                    self.bump();
                    self.bump();
                    loop {
                        if self.at_end() {
                            self.diags.push(Diagnostic::error(
                                Stage::Lexer,
                                "unterminated block comment".to_string(),
                                Span::new(start, self.pos),
                            ));
                            break;
                        }
                        if self.starts_with("*/") {
                            self.bump();
                            self.bump();
                            break;
                        }
                        self.bump();
                    }
                }
                _ => break,
            }
        }
    }

    // ------------------------------------------------------------------
    // Token dispatch
    // ------------------------------------------------------------------

    fn next_token(&mut self) -> Option<(TokenKind, String)> {
        let ch = self.peek()?;

        // f-string prefix must win over plain identifiers.
        if ch == 'f' && self.peek2() == Some('"') {
            return self.lex_fstring();
        }
        if ch == '"' {
            return self.lex_string();
        }
        if ch == '\'' {
            return self.lex_char();
        }
        if ch.is_ascii_digit() {
            return self.lex_number();
        }
        // `.5` is a float, not DOT followed by an integer.
        if ch == '.' && self.peek2().is_some_and(|c| c.is_ascii_digit()) {
            return self.lex_number();
        }
        if ch.is_ascii_alphabetic() || ch == '_' {
            return Some(self.lex_ident());
        }

        // Longest operator prefix from the grammar's longest-first list.
        for (op, kind) in self.grammar.operators() {
            if self.starts_with(op) {
                let kind = *kind;
                let text = op.clone();
                for _ in 0..op.chars().count() {
                    self.bump();
                }
                return Some((kind, text));
            }
        }
        None
    }

    fn lex_ident(&mut self) -> (TokenKind, String) {
        let mut s = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                s.push(c);
                self.bump();
            } else {
                break;
            }
        }
        match self.grammar.keyword_kind(&s) {
            Some(kind) => (kind, s),
            None => (TokenKind::Ident, s),
        }
    }

    fn lex_number(&mut self) -> Option<(TokenKind, String)> {
        let start = self.pos;
        let mut s = String::new();
        let mut is_float = false;

        // Base-prefixed integers: 0x, 0b, 0o.
        if self.peek() == Some('0')
            && matches!(self.peek2(), Some('x' | 'X' | 'b' | 'B' | 'o' | 'O'))
        {
            s.push(self.bump()?);
            let base = self.bump()?;
            s.push(base);
            let valid = |c: char| match base {
                'x' | 'X' => c.is_ascii_hexdigit(),
                'b' | 'B' => c == '0' || c == '1',
                _ => ('0'..='7').contains(&c),
            };
            let mut digits = 0;
            while let Some(c) = self.peek() {
                if valid(c) {
                    s.push(c);
                    self.bump();
                    digits += 1;
                } else {
                    break;
                }
            }
            if digits == 0 {
                self.diags.push(Diagnostic::error(
                    Stage::Lexer,
                    format!("invalid integer literal `{}`", s),
                    Span::new(start, self.pos),
                ));
            }
            self.take_int_suffix(&mut s);
            return Some((TokenKind::IntLit, s));
        }

        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                s.push(c);
                self.bump();
            } else {
                break;
            }
        }

        // Fraction: `d.d` and `d.`, but not `1.toString`.
        if self.peek() == Some('.')
            && !self.peek2().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        {
            is_float = true;
            s.push('.');
            self.bump();
            while let Some(c) = self.peek() {
                if c.is_ascii_digit() {
                    s.push(c);
                    self.bump();
                } else {
                    break;
                }
            }
        }

        // Exponent.
        if matches!(self.peek(), Some('e' | 'E')) {
            let mut lookahead = self.src[self.pos..].chars().skip(1);
            let next = lookahead.next();
            let after_sign = lookahead.next();
            let has_exp = match next {
                Some(d) if d.is_ascii_digit() => true,
                Some('+' | '-') => after_sign.is_some_and(|c| c.is_ascii_digit()),
                _ => false,
            };
            if has_exp {
                is_float = true;
                s.push(self.bump()?);
                if matches!(self.peek(), Some('+' | '-')) {
                    s.push(self.bump()?);
                }
                while let Some(c) = self.peek() {
                    if c.is_ascii_digit() {
                        s.push(c);
                        self.bump();
                    } else {
                        break;
                    }
                }
            }
        }

        if matches!(self.peek(), Some('f' | 'F')) {
            // `2f` and `1.5f` are both float literals.
            s.push(self.bump()?);
            return Some((TokenKind::FloatLit, s));
        }
        if is_float {
            Some((TokenKind::FloatLit, s))
        } else {
            self.take_int_suffix(&mut s);
            Some((TokenKind::IntLit, s))
        }
    }

    fn take_int_suffix(&mut self, s: &mut String) {
        while matches!(self.peek(), Some('u' | 'U' | 'l' | 'L')) {
            if let Some(c) = self.bump() {
                s.push(c);
            }
        }
    }

    fn lex_string(&mut self) -> Option<(TokenKind, String)> {
        let start = self.pos;
        self.bump(); // opening quote
        let mut s = String::new();
        loop {
            match self.peek() {
                None | Some('\n') => {
                    self.diags.push(Diagnostic::error(
                        Stage::Lexer,
                        "unterminated string literal".to_string(),
                        Span::new(start, self.pos),
                    ));
                    return Some((TokenKind::StringLit, s));
                }
                Some('"') => {
                    self.bump();
                    return Some((TokenKind::StringLit, s));
                }
                Some('\\') => {
                    s.push(self.bump()?);
                    if let Some(c) = self.bump() {
                        s.push(c);
                    }
                }
                Some(c) => {
                    s.push(c);
                    self.bump();
                }
            }
        }
    }

    fn lex_char(&mut self) -> Option<(TokenKind, String)> {
        let start = self.pos;
        self.bump(); // opening quote
        let mut s = String::new();
        match self.peek() {
            Some('\\') => {
                s.push(self.bump()?);
                if let Some(c) = self.bump() {
                    s.push(c);
                }
            }
            Some(c) if c != '\'' => {
                s.push(c);
                self.bump();
            }
            _ => {}
        }
        if self.peek() == Some('\'') {
            self.bump();
        } else {
            self.diags.push(Diagnostic::error(
                Stage::Lexer,
                "unterminated char literal".to_string(),
                Span::new(start, self.pos),
            ));
        }
        Some((TokenKind::CharLit, s))
    }

    /// Scan `f"..."`, returning the raw body. Brace depth is tracked so that
    /// quotes inside `{...}` chunks (e.g. `f"{m["k"]}"`) do not end the
    /// literal; splitting the body into text and expression chunks is the
    /// parser's job.
    fn lex_fstring(&mut self) -> Option<(TokenKind, String)> {
        let start = self.pos;
        self.bump(); // f
        self.bump(); // opening quote
        let mut s = String::new();
        let mut depth = 0usize;
        loop {
            match self.peek() {
                None => {
                    self.diags.push(Diagnostic::error(
                        Stage::Lexer,
                        "unterminated f-string".to_string(),
                        Span::new(start, self.pos),
                    ));
                    return Some((TokenKind::FStringLit, s));
                }
                Some('"') if depth == 0 => {
                    self.bump();
                    return Some((TokenKind::FStringLit, s));
                }
                Some('"') => {
                    // Nested plain string inside an expression chunk.
                    s.push(self.bump()?);
                    loop {
                        match self.peek() {
                            None | Some('\n') => break,
                            Some('\\') => {
                                s.push(self.bump()?);
                                if let Some(c) = self.bump() {
                                    s.push(c);
                                }
                            }
                            Some('"') => {
                                s.push(self.bump()?);
                                break;
                            }
                            Some(c) => {
                                s.push(c);
                                self.bump();
                            }
                        }
                    }
                }
                Some('\\') => {
                    s.push(self.bump()?);
                    if let Some(c) = self.bump() {
                        s.push(c);
                    }
                }
                Some('{') if self.peek2() == Some('{') && depth == 0 => {
                    s.push(self.bump()?);
                    s.push(self.bump()?);
                }
                Some('}') if self.peek2() == Some('}') && depth == 0 => {
                    s.push(self.bump()?);
                    s.push(self.bump()?);
                }
                Some('{') => {
                    depth += 1;
                    s.push(self.bump()?);
                }
                Some('}') => {
                    depth = depth.saturating_sub(1);
                    s.push(self.bump()?);
                }
                Some(c) => {
                    s.push(c);
                    self.bump();
                }
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        let grammar = GrammarInfo::bundled().unwrap();
        let (tokens, diags) = Lexer::new(input, &grammar).tokenize();
        assert!(diags.is_empty(), "unexpected diagnostics: {:?}", diags);
        tokens.into_iter().map(|t| t.kind).collect()
    }

    fn texts(input: &str) -> Vec<String> {
        let grammar = GrammarInfo::bundled().unwrap();
        let (tokens, _) = Lexer::new(input, &grammar).tokenize();
        tokens.into_iter().map(|t| t.text).collect()
    }

    #[test]
    fn keywords_and_idents() {
        assert_eq!(
            kinds("class Counter extends Base"),
            vec![
                TokenKind::Class,
                TokenKind::Ident,
                TokenKind::Extends,
                TokenKind::Ident,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn longest_operator_wins() {
        assert_eq!(
            kinds("a <<= b << c < d"),
            vec![
                TokenKind::Ident,
                TokenKind::LtLtEq,
                TokenKind::Ident,
                TokenKind::LtLt,
                TokenKind::Ident,
                TokenKind::Lt,
                TokenKind::Ident,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn question_operators() {
        assert_eq!(
            kinds("a ?. b ?? c ? d : e"),
            vec![
                TokenKind::Ident,
                TokenKind::QuestionDot,
                TokenKind::Ident,
                TokenKind::QuestionQuestion,
                TokenKind::Ident,
                TokenKind::Question,
                TokenKind::Ident,
                TokenKind::Colon,
                TokenKind::Ident,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn integer_bases_and_suffixes() {
        assert_eq!(
            texts("0x1F 0b1010 0o17 42u 7l"),
            vec!["0x1F", "0b1010", "0o17", "42u", "7l", ""]
        );
        assert_eq!(
            kinds("0x1F 0b1010 0o17"),
            vec![TokenKind::IntLit, TokenKind::IntLit, TokenKind::IntLit, TokenKind::Eof]
        );
    }

    #[test]
    fn float_forms() {
        assert_eq!(
            kinds("1.5 .5 2. 1e10 1.5e-3 2f"),
            vec![
                TokenKind::FloatLit,
                TokenKind::FloatLit,
                TokenKind::FloatLit,
                TokenKind::FloatLit,
                TokenKind::FloatLit,
                TokenKind::FloatLit,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn member_access_after_int() {
        // `1.toString` must not lex as a float.
        assert_eq!(
            kinds("1.toString"),
            vec![TokenKind::IntLit, TokenKind::Dot, TokenKind::Ident, TokenKind::Eof]
        );
    }

    #[test]
    fn string_keeps_escapes_raw() {
        assert_eq!(texts(r#""a\nb""#), vec![r"a\nb", ""]);
    }

    #[test]
    fn fstring_raw_body() {
        assert_eq!(kinds(r#"f"x = {x}""#), vec![TokenKind::FStringLit, TokenKind::Eof]);
        assert_eq!(texts(r#"f"x = {x:.2f}""#), vec!["x = {x:.2f}", ""]);
    }

    #[test]
    fn fstring_nested_quotes_in_chunk() {
        assert_eq!(texts(r#"f"v={m["k"]}""#), vec![r#"v={m["k"]}"#, ""]);
    }

    #[test]
    fn comments() {
        assert_eq!(
            kinds("a // trailing\nb /* block\n comment */ c"),
            vec![TokenKind::Ident, TokenKind::Ident, TokenKind::Ident, TokenKind::Eof]
        );
    }

    #[test]
    fn error_recovery_continues() {
        let grammar = GrammarInfo::bundled().unwrap();
        let (tokens, diags) = Lexer::new("a ` b", &grammar).tokenize();
        assert_eq!(diags.len(), 1);
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(kinds, vec![TokenKind::Ident, TokenKind::Ident, TokenKind::Eof]);
    }

    #[test]
    fn coordinates() {
        let grammar = GrammarInfo::bundled().unwrap();
        let (tokens, _) = Lexer::new("ab\n  cd", &grammar).tokenize();
        assert_eq!((tokens[0].line, tokens[0].col, tokens[0].offset), (1, 1, 0));
        assert_eq!((tokens[1].line, tokens[1].col, tokens[1].offset), (2, 3, 5));
    }
}
