//! Property tests for the front end: the lexer must terminate with EOF and
//! never panic on arbitrary input, coordinates must be monotone, and the
//! parser must survive anything the lexer hands it.

use proptest::prelude::*;

use btrc::{GrammarInfo, Lexer, Parser};

fn grammar() -> GrammarInfo {
    GrammarInfo::bundled().unwrap()
}

proptest! {
    #[test]
    fn lexer_never_panics_and_ends_with_eof(input in ".{0,200}") {
        let gi = grammar();
        let (tokens, _diags) = Lexer::new(&input, &gi).tokenize();
        prop_assert!(!tokens.is_empty());
        prop_assert_eq!(tokens.last().unwrap().kind, btrc::lexer::TokenKind::Eof);
    }

    #[test]
    fn token_offsets_are_monotone(input in "[ -~]{0,200}") {
        let gi = grammar();
        let (tokens, _) = Lexer::new(&input, &gi).tokenize();
        for pair in tokens.windows(2) {
            prop_assert!(pair[0].offset <= pair[1].offset);
        }
    }

    #[test]
    fn lexemes_of_clean_input_reassemble(input in "[a-z ]{0,80}") {
        // Identifier-and-space input: concatenating lexemes gives the
        // input with whitespace dropped.
        let gi = grammar();
        let (tokens, diags) = Lexer::new(&input, &gi).tokenize();
        prop_assert!(diags.is_empty());
        let joined: String = tokens.iter().map(|t| t.text.as_str()).collect();
        let expected: String = input.chars().filter(|c| !c.is_whitespace()).collect();
        prop_assert_eq!(joined, expected);
    }

    #[test]
    fn parser_never_panics(input in "[ -~]{0,150}") {
        let gi = grammar();
        let (tokens, _) = Lexer::new(&input, &gi).tokenize();
        // Errors are fine; panics are not.
        let _ = Parser::new(tokens, &gi).parse_program();
    }
}
