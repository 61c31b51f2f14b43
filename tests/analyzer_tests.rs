//! Analyzer tests: diagnostics, inheritance validation, generic instance
//! collection, and the vtable layout.

use btrc::analyzer::{self, Analysis};
use btrc::diag::{Diagnostic, Severity};
use btrc::{GrammarInfo, Lexer, Parser};

// ============================================================================
// Helpers
// ============================================================================

fn analyze(input: &str) -> (Analysis, Vec<Diagnostic>) {
    let grammar = GrammarInfo::bundled().unwrap();
    let (tokens, lex_diags) = Lexer::new(input, &grammar).tokenize();
    assert!(lex_diags.is_empty(), "lex diagnostics: {:?}", lex_diags);
    let (program, parse_diags) = Parser::new(tokens, &grammar).parse_program();
    assert!(parse_diags.is_empty(), "parse diagnostics: {:?}", parse_diags);
    analyzer::analyze(program)
}

fn error_messages(input: &str) -> Vec<String> {
    let (_, diags) = analyze(input);
    diags
        .iter()
        .filter(|d| d.severity == Severity::Error)
        .map(|d| d.message.clone())
        .collect()
}

fn assert_clean(input: &str) -> Analysis {
    let (analysis, diags) = analyze(input);
    let errors: Vec<_> = diags.iter().filter(|d| d.is_error()).collect();
    assert!(errors.is_empty(), "unexpected errors: {:?}", errors);
    analysis
}

fn assert_error_containing(input: &str, needle: &str) {
    let messages = error_messages(input);
    assert!(
        messages.iter().any(|m| m.contains(needle)),
        "no error containing {:?} in {:?}",
        needle,
        messages
    );
}

// ============================================================================
// Name and type errors
// ============================================================================

mod errors {
    use super::*;

    #[test]
    fn unknown_identifier() {
        assert_error_containing("int main() { return missing; }", "unknown identifier");
    }

    #[test]
    fn unknown_type() {
        assert_error_containing("Widget w() { return null; }", "unknown type");
    }

    #[test]
    fn var_requires_initializer() {
        assert_error_containing("void f() { var x; }", "requires an initializer");
    }

    #[test]
    fn assignment_type_mismatch() {
        assert_error_containing(
            "void f() { int x = 0; x = \"text\"; }",
            "cannot assign",
        );
    }

    #[test]
    fn return_type_mismatch() {
        assert_error_containing("int f() { return \"nope\"; }", "does not match");
    }

    #[test]
    fn arity_mismatch() {
        assert_error_containing(
            "int add(int a, int b) { return a + b; }\nint main() { return add(1); }",
            "argument",
        );
    }

    #[test]
    fn default_arguments_fill_trailing() {
        assert_clean(
            "int add(int a, int b = 10) { return a + b; }\nint main() { return add(1); }",
        );
    }

    #[test]
    fn nullable_requires_reference() {
        assert_error_containing("void f(int? x) { }", "nullable requires a reference type");
    }

    #[test]
    fn throw_requires_string() {
        assert_error_containing("void f() { throw 42; }", "string");
    }

    #[test]
    fn break_outside_loop() {
        assert_error_containing("void f() { break; }", "outside");
    }

    #[test]
    fn generic_functions_are_rejected() {
        assert_error_containing(
            "T identity<T>(T x) { return x; }",
            "generic functions are not supported",
        );
    }
}

// ============================================================================
// Classes and inheritance
// ============================================================================

mod classes {
    use super::*;

    const ANIMALS: &str = "\
        abstract class Animal {\n\
            public abstract string speak();\n\
            public string name() { return \"?\"; }\n\
        }\n\
        class Dog extends Animal {\n\
            public override string speak() { return \"Woof\"; }\n\
        }\n";

    #[test]
    fn vtable_layout_is_monotone() {
        let analysis = assert_clean(ANIMALS);
        let animal = &analysis.classes["Animal"].vtable;
        let dog = &analysis.classes["Dog"].vtable;
        assert!(dog.len() >= animal.len());
        for (i, slot) in animal.iter().enumerate() {
            assert_eq!(dog[i].name, slot.name, "slot {} changed position", i);
        }
        // The override keeps the introducing class on the slot.
        let speak = dog.iter().find(|s| s.name == "speak").unwrap();
        assert_eq!(speak.introduced_in, "Animal");
    }

    #[test]
    fn missing_abstract_impl() {
        assert_error_containing(
            "abstract class Animal { public abstract string speak(); }\n\
             class Fish extends Animal { }",
            "does not implement abstract method",
        );
    }

    #[test]
    fn override_requires_matching_signature() {
        assert_error_containing(
            "class Base { public int get() { return 1; } }\n\
             class Derived extends Base { public override int get(int x) { return x; } }",
            "parameter types",
        );
    }

    #[test]
    fn override_marker_must_match_parent() {
        assert_error_containing(
            "class Base { }\n\
             class Derived extends Base { public override int get() { return 1; } }",
            "overrides nothing",
        );
    }

    #[test]
    fn hiding_without_override_is_an_error() {
        assert_error_containing(
            "class Base { public int get() { return 1; } }\n\
             class Derived extends Base { public int get() { return 2; } }",
            "mark it override",
        );
    }

    #[test]
    fn inheritance_cycle() {
        assert_error_containing(
            "class A extends B { }\nclass B extends A { }",
            "inheritance cycle",
        );
    }

    #[test]
    fn abstract_instantiation() {
        assert_error_containing(
            "abstract class Animal { public abstract string speak(); }\n\
             void f() { var a = new Animal(); }",
            "abstract",
        );
    }

    #[test]
    fn private_field_access() {
        assert_error_containing(
            "class Counter { private int count = 0; }\n\
             int main() { Counter c = new Counter(); return c.count; }",
            "private",
        );
    }

    #[test]
    fn interface_satisfaction() {
        assert_error_containing(
            "interface Speaker { string speak(); }\n\
             class Mime implements Speaker { }",
            "does not implement",
        );
        assert_clean(
            "interface Speaker { string speak(); }\n\
             class Dog implements Speaker { public string speak() { return \"Woof\"; } }",
        );
    }

    #[test]
    fn operator_overload_resolution() {
        assert_clean(
            "class Vec2 {\n\
                 public int x = 0;\n\
                 public Vec2 __add__(Vec2 other) { return new Vec2(); }\n\
             }\n\
             void f() { Vec2 a = new Vec2(); Vec2 b = new Vec2(); var c = a + b; }",
        );
        assert_error_containing(
            "class Vec2 { public int x = 0; }\n\
             void f() { Vec2 a = new Vec2(); Vec2 b = new Vec2(); var c = a + b; }",
            "__add__",
        );
    }

    #[test]
    fn cycle_capability_by_type_graph() {
        let analysis = assert_clean(
            "class Node { public Node? next = null; }\n\
             class Leaf { public int value = 0; }",
        );
        assert!(analysis.classes["Node"].is_cyclable);
        assert!(!analysis.classes["Leaf"].is_cyclable);
    }

    #[test]
    fn indirect_cycles_are_detected() {
        let analysis = assert_clean(
            "class A { public B? b = null; }\n\
             class B { public A? a = null; }\n\
             class C { public A? a = null; }",
        );
        assert!(analysis.classes["A"].is_cyclable);
        assert!(analysis.classes["B"].is_cyclable);
        // C points into the cycle but cannot be reached back.
        assert!(!analysis.classes["C"].is_cyclable);
    }
}

// ============================================================================
// Generics
// ============================================================================

mod generics {
    use super::*;

    #[test]
    fn instances_are_collected_and_deduplicated() {
        let analysis = assert_clean(
            "void f() {\n\
                 Vector<int> a = [1];\n\
                 Vector<int> b = [2];\n\
                 Vector<string> c = [\"x\"];\n\
                 Map<string, int> m = {};\n\
             }",
        );
        let vectors: Vec<_> = analysis
            .instances
            .iter()
            .filter(|i| i.base == "Vector")
            .collect();
        assert_eq!(vectors.len(), 2, "Vector<int> must be deduplicated");
        assert!(analysis.instances.iter().any(|i| i.base == "Map"));
    }

    #[test]
    fn generic_arity_is_checked() {
        assert_error_containing("void f(Map<int> m) { }", "type argument");
    }

    #[test]
    fn user_generic_instances() {
        let analysis = assert_clean(
            "class Box<T> {\n\
                 private T item;\n\
                 public Box(T item) { self.item = item; }\n\
                 public T get() { return self.item; }\n\
             }\n\
             void f() { Box<int> b = new Box<int>(5); int x = b.get(); }",
        );
        assert!(analysis
            .instances
            .iter()
            .any(|i| i.base == "Box"));
    }
}

// ============================================================================
// Nullability and warnings
// ============================================================================

mod nullability {
    use super::*;

    #[test]
    fn unchecked_deref_warns_but_does_not_block() {
        let (_, diags) = analyze(
            "class Node { public int value = 0; }\n\
             int f(Node? n) { return n.value; }",
        );
        assert!(diags.iter().any(|d| d.severity == Severity::Warning));
        assert!(!diags.iter().any(|d| d.is_error()));
    }

    #[test]
    fn null_safe_member_makes_result_nullable() {
        assert_clean(
            "class Node { public Node? next = null; }\n\
             Node? f(Node? n) { return n?.next; }",
        );
    }

    #[test]
    fn coalesce_unwraps() {
        assert_clean("string f(string? s) { return s ?? \"fallback\"; }");
    }
}

// ============================================================================
// Type totality
// ============================================================================

mod totality {
    use super::*;

    #[test]
    fn every_expression_gets_a_type() {
        // A program touching most expression forms; after a clean
        // analysis, every recorded node has a type (the table is keyed by
        // node id, so presence is the invariant).
        let analysis = assert_clean(
            "class P {\n\
                 public int x = 0;\n\
                 public P(int x) { self.x = x; }\n\
                 public int get() { return self.x; }\n\
             }\n\
             int main() {\n\
                 P p = new P(3);\n\
                 int a = p.get() + 1;\n\
                 string s = f\"a = {a}\";\n\
                 Vector<int> v = [1, 2, 3];\n\
                 int total = 0;\n\
                 for item in v { total = total + item; }\n\
                 bool flag = a > 2 && total < 100;\n\
                 var t = (a, s);\n\
                 return flag ? total : 0;\n\
             }",
        );
        assert!(!analysis.expr_types.is_empty());
        assert!(analysis
            .expr_types
            .values()
            .all(|ty| !matches!(ty, btrc::analyzer::Ty::Error)));
    }
}
