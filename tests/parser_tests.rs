//! Parser unit tests: declaration shapes, the precedence ladder, and the
//! documented disambiguations.

use btrc::ast::{
    DeclKind, ExprKind, FStringPart, LambdaBody, Member, MemberOp, Program, StmtKind,
    TypeExprKind,
};
use btrc::{GrammarInfo, Lexer, Parser};

// ============================================================================
// Helpers
// ============================================================================

fn parse(input: &str) -> Program {
    let grammar = GrammarInfo::bundled().unwrap();
    let (tokens, lex_diags) = Lexer::new(input, &grammar).tokenize();
    assert!(lex_diags.is_empty(), "lex diagnostics: {:?}", lex_diags);
    let (program, diags) = Parser::new(tokens, &grammar).parse_program();
    assert!(diags.is_empty(), "parse diagnostics: {:?}", diags);
    program
}

fn parse_lenient(input: &str) -> (Program, usize) {
    let grammar = GrammarInfo::bundled().unwrap();
    let (tokens, _) = Lexer::new(input, &grammar).tokenize();
    let (program, diags) = Parser::new(tokens, &grammar).parse_program();
    (program, diags.len())
}

/// First statement of the first function in the program.
fn first_stmt(input: &str) -> StmtKind {
    let program = parse(input);
    for decl in program.decls {
        if let DeclKind::Function { func } = decl.kind {
            let body = func.body.expect("function body");
            return body.stmts.into_iter().next().expect("statement").kind;
        }
    }
    panic!("no function in program");
}

fn first_expr(input: &str) -> ExprKind {
    match first_stmt(input) {
        StmtKind::ExprStmt { value } => value.kind,
        StmtKind::Return { value } => value.expect("return value").kind,
        StmtKind::VarDecl { init, .. } => init.expect("initializer").kind,
        other => panic!("expected expression statement, got {:?}", other),
    }
}

// ============================================================================
// Declarations
// ============================================================================

mod declarations {
    use super::*;

    #[test]
    fn class_members_are_classified() {
        let program = parse(
            "class Point {\n\
             private int x;\n\
             public int y = 0;\n\
             public Point(int x) { self.x = x; }\n\
             ~Point() { }\n\
             public int getX() { return self.x; }\n\
             public int magnitude { get { return self.x * self.x; } }\n\
             }",
        );
        let class = match &program.decls[0].kind {
            DeclKind::Class { class } => class,
            other => panic!("expected class, got {:?}", other),
        };
        let mut fields = 0;
        let mut methods = 0;
        let mut ctors = 0;
        let mut dtors = 0;
        let mut props = 0;
        for m in &class.members {
            match m {
                Member::Field { .. } => fields += 1,
                Member::Method { .. } => methods += 1,
                Member::Ctor { .. } => ctors += 1,
                Member::Dtor { .. } => dtors += 1,
                Member::Property { .. } => props += 1,
            }
        }
        assert_eq!((fields, methods, ctors, dtors, props), (2, 1, 1, 1, 1));
    }

    #[test]
    fn inheritance_clauses() {
        let program = parse(
            "interface Speaker { string speak(); }\n\
             abstract class Animal { public abstract string speak(); }\n\
             class Dog extends Animal implements Speaker {\n\
             public override string speak() { return \"Woof\"; }\n\
             }",
        );
        match &program.decls[2].kind {
            DeclKind::Class { class } => {
                assert_eq!(class.parent.as_deref(), Some("Animal"));
                assert_eq!(class.interfaces, vec!["Speaker".to_string()]);
                assert!(!class.is_abstract);
            }
            other => panic!("expected class, got {:?}", other),
        }
        match &program.decls[1].kind {
            DeclKind::Class { class } => assert!(class.is_abstract),
            other => panic!("expected abstract class, got {:?}", other),
        }
    }

    #[test]
    fn enum_with_payload_variants() {
        let program = parse("enum Shape { Circle(double r), Rect(double w, double h), Dot }");
        match &program.decls[0].kind {
            DeclKind::Enum { enumeration } => {
                assert_eq!(enumeration.variants.len(), 3);
                assert_eq!(enumeration.variants[0].fields.len(), 1);
                assert_eq!(enumeration.variants[1].fields.len(), 2);
                assert!(enumeration.variants[2].fields.is_empty());
            }
            other => panic!("expected enum, got {:?}", other),
        }
    }

    #[test]
    fn keep_annotations() {
        let program = parse(
            "class Container {\n\
             public void store(keep Container other) { }\n\
             }\n\
             keep Container make() { return new Container(); }",
        );
        match &program.decls[0].kind {
            DeclKind::Class { class } => match &class.members[0] {
                Member::Method { method } => assert!(method.params[0].keep),
                other => panic!("expected method, got {:?}", other),
            },
            other => panic!("expected class, got {:?}", other),
        }
        match &program.decls[1].kind {
            DeclKind::Function { func } => assert!(func.keep_return),
            other => panic!("expected function, got {:?}", other),
        }
    }
}

// ============================================================================
// Precedence and operators
// ============================================================================

mod precedence {
    use super::*;

    #[test]
    fn multiplication_binds_tighter() {
        match first_expr("int f(int a, int b, int c) { return a + b * c; }") {
            ExprKind::Binary { op, right, .. } => {
                assert_eq!(op, "+");
                assert!(matches!(right.kind, ExprKind::Binary { ref op, .. } if op == "*"));
            }
            other => panic!("expected binary, got {:?}", other),
        }
    }

    #[test]
    fn comparison_is_not_generic_args() {
        // `a < b` in expression position stays a comparison.
        match first_expr("bool f(int a, int b) { return a < b; }") {
            ExprKind::Binary { op, .. } => assert_eq!(op, "<"),
            other => panic!("expected comparison, got {:?}", other),
        }
    }

    #[test]
    fn coalesce_is_looser_than_ternary() {
        match first_expr("string f(string a) { return a ?? \"x\"; }") {
            ExprKind::Coalesce { .. } => {}
            other => panic!("expected coalesce, got {:?}", other),
        }
    }

    #[test]
    fn null_safe_member() {
        match first_expr("void f(string s) { s?.len; }") {
            ExprKind::Member { op, .. } => assert_eq!(op, MemberOp::Question),
            other => panic!("expected member, got {:?}", other),
        }
    }
}

// ============================================================================
// Disambiguations
// ============================================================================

mod disambiguation {
    use super::*;

    #[test]
    fn cast_vs_grouping() {
        // Builtin type followed by unary start is a cast.
        match first_expr("int f(double d) { return (int)d; }") {
            ExprKind::Cast { .. } => {}
            other => panic!("expected cast, got {:?}", other),
        }
        // A parenthesized expression followed by an operator is grouping.
        match first_expr("int f(int a, int b) { return (a) - b; }") {
            ExprKind::Binary { op, .. } => assert_eq!(op, "-"),
            other => panic!("expected subtraction, got {:?}", other),
        }
    }

    #[test]
    fn for_vs_for_in() {
        assert!(matches!(
            first_stmt("void f() { for (int i = 0; i < 3; i++) { } }"),
            StmtKind::For { .. }
        ));
        assert!(matches!(
            first_stmt("void f(Vector<int> v) { for x in v { } }"),
            StmtKind::ForIn { .. }
        ));
        assert!(matches!(
            first_stmt("void f(Map<string, int> m) { for k, v in m { } }"),
            StmtKind::ForIn { binding2: Some(_), .. }
        ));
    }

    #[test]
    fn tuple_type_vs_grouping() {
        let program = parse("(int, string) pair() { return (1, \"a\"); }");
        match &program.decls[0].kind {
            DeclKind::Function { func } => {
                let ret = func.ret.as_ref().expect("return type");
                assert!(matches!(ret.kind, TypeExprKind::Tuple { ref items } if items.len() == 2));
            }
            other => panic!("expected function, got {:?}", other),
        }
    }

    #[test]
    fn lambda_forms() {
        match first_expr("void f() { var g = (int x) => x + 1; }") {
            ExprKind::Lambda { params, ret, body } => {
                assert_eq!(params.len(), 1);
                assert!(ret.is_none());
                assert!(matches!(*body, LambdaBody::ExprBody { .. }));
            }
            other => panic!("expected lambda, got {:?}", other),
        }
        match first_expr("void f() { var g = (int x) => { return x + 1; }; }") {
            ExprKind::Lambda { body, .. } => {
                assert!(matches!(*body, LambdaBody::BlockBody { .. }))
            }
            other => panic!("expected lambda, got {:?}", other),
        }
        match first_expr("void f() { var g = int function(int x) { return x + 1; }; }") {
            ExprKind::Lambda { ret, body, .. } => {
                assert!(ret.is_some());
                assert!(matches!(*body, LambdaBody::BlockBody { .. }));
            }
            other => panic!("expected verbose lambda, got {:?}", other),
        }
    }

    #[test]
    fn nested_generics_close() {
        assert!(matches!(
            first_stmt("void f() { Map<string, Vector<int>> m = {}; }"),
            StmtKind::VarDecl { .. }
        ));
    }
}

// ============================================================================
// F-strings
// ============================================================================

mod fstrings {
    use super::*;

    #[test]
    fn text_and_chunks() {
        match first_expr("void f(int x) { f\"x = {x}!\"; }") {
            ExprKind::FString { parts } => {
                assert_eq!(parts.len(), 3);
                assert!(matches!(&parts[0], FStringPart::Text { text } if text == "x = "));
                assert!(matches!(&parts[1], FStringPart::Chunk { format: None, .. }));
                assert!(matches!(&parts[2], FStringPart::Text { text } if text == "!"));
            }
            other => panic!("expected f-string, got {:?}", other),
        }
    }

    #[test]
    fn format_specifier() {
        match first_expr("void f(double x) { f\"{x:.2f}\"; }") {
            ExprKind::FString { parts } => {
                assert!(matches!(
                    &parts[0],
                    FStringPart::Chunk { format: Some(spec), .. } if spec == ".2f"
                ));
            }
            other => panic!("expected f-string, got {:?}", other),
        }
    }

    #[test]
    fn escaped_braces() {
        match first_expr("void f() { f\"{{literal}}\"; }") {
            ExprKind::FString { parts } => {
                assert!(matches!(&parts[0], FStringPart::Text { text } if text == "{literal}"));
            }
            other => panic!("expected f-string, got {:?}", other),
        }
    }

    #[test]
    fn ternary_colon_is_not_a_spec() {
        match first_expr("void f(int a) { f\"{a > 0 ? 1 : 2}\"; }") {
            ExprKind::FString { parts } => {
                assert!(matches!(
                    &parts[0],
                    FStringPart::Chunk { format: None, value, .. }
                        if matches!(value.kind, ExprKind::Ternary { .. })
                ));
            }
            other => panic!("expected f-string, got {:?}", other),
        }
    }

    #[test]
    fn nested_fstring_is_rejected() {
        let (_, errors) = parse_lenient("void f() { f\"{f\"inner\"}\"; }");
        assert!(errors > 0);
    }
}

// ============================================================================
// Recovery
// ============================================================================

mod recovery {
    use super::*;

    #[test]
    fn statement_recovery_keeps_going() {
        let (program, errors) = parse_lenient(
            "void f() { int x = ; int y = 2; }\nint g() { return 3; }",
        );
        assert!(errors > 0);
        // Both declarations survive.
        assert_eq!(program.decls.len(), 2);
    }

    #[test]
    fn decl_recovery_skips_to_next_decl() {
        let (program, errors) = parse_lenient("class { }\nint ok() { return 1; }");
        assert!(errors > 0);
        assert!(program
            .decls
            .iter()
            .any(|d| matches!(&d.kind, DeclKind::Function { func } if func.name == "ok")));
    }
}
