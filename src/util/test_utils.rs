use crate::{parser, util::fmt::tree::debug_string_indented};

/// Each variant contains the input.
pub enum Test {
    Script(&'static str),
    Expr(&'static str),
    Statements(&'static str),
}

pub enum Assertion {
    TreeOk(&'static str),
    ExpectedError(&'static str),
}

/// Parses the input, returning either the indented tree or the formatted
/// error.
pub fn run_pipeline(test: Test) -> Result<String, String> {
    let result = match test {
        Test::Script(src) => parser::parse_script(src).map(|s| debug_string_indented(&s, 0)),
        Test::Expr(src) => parser::parse_expr(src).map(|e| debug_string_indented(&e, 0)),
        Test::Statements(src) => {
            parser::parse_statements(src).map(|s| debug_string_indented(&s, 0))
        }
    };
    result.map_err(|e| e.to_string())
}

#[track_caller]
pub fn run_assertion(assertion: Assertion, actual: &Result<String, String>) {
    match (assertion, actual) {
        (Assertion::TreeOk(expected_tree), Ok(tree)) => {
            ::pretty_assertions::assert_eq!(tree.trim(), expected_tree.trim());
        }
        (Assertion::TreeOk(_), Err(error)) => panic!("expected a tree, but got error: {error}"),
        (Assertion::ExpectedError(expected_error), Err(error)) => {
            ::pretty_assertions::assert_eq!(error, expected_error);
        }
        (Assertion::ExpectedError(_), Ok(tree)) => {
            panic!("expected an error, but got tree:\n{tree}")
        }
    }
}

macro_rules! tree_tests {
    (
        $(
            fn $test_name:ident() {
                let $source_kind:ident = $source:expr;
                $($assertions_tt:tt)*
            }
        )*
    ) => {
        $(
            #[test]
            fn $test_name() {
                let test: crate::util::test_utils::Test =
                    tree_tests!(@@get_test($source_kind), $source);
                let actual = crate::util::test_utils::run_pipeline(test);
                tree_tests!(@@expand_assertions, &actual, [$($assertions_tt)*]);
            }
        )*
    };

    (@@expand_assertions, $actual:expr, []) => {};
    (@@expand_assertions, $actual:expr, [
        let $assertion:ident = $assertion_expected:expr;
        $($rest_assertions_tt:tt)*
    ]) => {
        crate::util::test_utils::run_assertion(
            tree_tests!(@@assertion, $assertion, $assertion_expected),
            $actual,
        );
        tree_tests!(@@expand_assertions, $actual, [$($rest_assertions_tt)*]);
    };

    (@@assertion, tree_ok, $expected:expr) => {
        crate::util::test_utils::Assertion::TreeOk(::indoc::indoc! { $expected })
    };
    (@@assertion, expected_error, $expected:expr) => {
        crate::util::test_utils::Assertion::ExpectedError($expected)
    };

    (@@get_test(script), $source:expr) => {
        crate::util::test_utils::Test::Script($source)
    };
    (@@get_test(expr), $source:expr) => {
        crate::util::test_utils::Test::Expr($source)
    };
    (@@get_test(statements), $source:expr) => {
        crate::util::test_utils::Test::Statements($source)
    };
}
pub(crate) use tree_tests;
