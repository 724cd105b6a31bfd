use proptest::prelude::*;
use sandbox::Sandbox;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn silent_programs_print_nothing(values in proptest::collection::vec(-1000i32..1000, 0..12)) {
        let list = values.iter().map(i32::to_string).collect::<Vec<_>>().join(", ");
        let source = format!("let total = 0;\nfor (const v of [{list}]) {{ total += v; }}");
        let output = Sandbox::default().run(&source);
        prop_assert!(output.is_success());
        prop_assert_eq!(output.text(), "");
    }

    #[test]
    fn thrown_errors_surface_as_error_lines(message in "[A-Za-z0-9 ]{1,24}") {
        let source = format!("throw new Error('{message}');");
        let text = Sandbox::default().run(&source).text();
        prop_assert!(text.starts_with("Error:"));
        prop_assert_eq!(text, format!("Error: {message}\n"));
    }

    #[test]
    fn integer_arithmetic_matches_native(a in -100_000i64..100_000, b in -100_000i64..100_000) {
        let source = format!("console.log({a} + {b}, {a} * {b}, {a} - {b});");
        let expected = format!("{} {} {}\n", a + b, a * b, a - b);
        prop_assert_eq!(Sandbox::default().run(&source).text(), expected);
    }
}
