//! End-to-end filter compile+eval scenarios (spec.md §8) plus property
//! tests over the shunting-yard compiler's output invariants.

use proptest::prelude::*;
use vecindex::filter::{compile, eval, Resolver, Value};

fn truthy(v: &Value) -> bool {
    match v {
        Value::Number(n) => *n != 0.0,
        Value::Str(s) => !s.is_empty(),
        Value::Tuple(t) => !t.is_empty(),
    }
}

struct MapResolver(Vec<(&'static str, Value)>);

impl Resolver for MapResolver {
    fn resolve(&self, path: &str) -> Option<Value> {
        self.0
            .iter()
            .find(|(k, _)| *k == path)
            .map(|(_, v)| v.clone())
    }
}

#[test]
fn compiles_and_evaluates_a_compound_expression() {
    let program = compile(".price < 500 and .category == \"gpu\"").unwrap();
    let resolver = MapResolver(vec![
        (".price", Value::Number(399.0)),
        (".category", Value::Str("gpu".into())),
    ]);
    let result = eval(&program, &resolver).unwrap();
    assert!(truthy(&result));
}

#[test]
fn or_short_circuits_on_truthiness_not_evaluation_order() {
    let program = compile(".featured or .price < 10").unwrap();
    let resolver = MapResolver(vec![
        (".featured", Value::Number(1.0)),
        (".price", Value::Number(999.0)),
    ]);
    let result = eval(&program, &resolver).unwrap();
    assert!(truthy(&result));
}

#[test]
fn unresolved_selector_is_an_eval_error() {
    let program = compile(".missing == 1").unwrap();
    let resolver = MapResolver(vec![]);
    let err = eval(&program, &resolver).unwrap_err();
    assert!(matches!(err, vecindex::filter::EvalError::UnresolvedSelector(_)));
}

#[test]
fn exponent_is_left_associative_end_to_end() {
    // 2 ** 3 ** 2 == (2 ** 3) ** 2 == 64, not 2 ** (3 ** 2) == 512.
    let program = compile("2 ** 3 ** 2").unwrap();
    let resolver = MapResolver(vec![]);
    let result = eval(&program, &resolver).unwrap();
    assert_eq!(result, Value::Number(64.0));
}

#[test]
fn tuple_literal_syntax_does_not_compile() {
    let err = compile(".x in [1, 2, 3]").unwrap_err();
    assert!(matches!(
        err.kind,
        vecindex::filter::SyntaxErrorKind::UnexpectedChar
    ));
}

#[test]
fn ampersand_and_pipe_spellings_match_keyword_spellings() {
    let glyph = compile(".a > 1 && .b > 1").unwrap();
    let keyword = compile(".a > 1 and .b > 1").unwrap();
    assert_eq!(glyph.tokens().len(), keyword.tokens().len());
}

proptest! {
    #[test]
    fn compile_never_panics_on_arbitrary_ascii(s in "[ -~]{0,64}") {
        let _ = compile(&s);
    }

    #[test]
    fn parenthesizing_a_comparison_does_not_change_its_truth_value(
        a in -1000.0f64..1000.0,
        b in -1000.0f64..1000.0,
    ) {
        let bare = compile(&format!("{a} < {b}")).unwrap();
        let parens = compile(&format!("(({a}) < ({b}))")).unwrap();
        let resolver = MapResolver(vec![]);
        let bare_result = eval(&bare, &resolver).unwrap();
        let parens_result = eval(&parens, &resolver).unwrap();
        prop_assert_eq!(bare_result, parens_result);
    }
}
