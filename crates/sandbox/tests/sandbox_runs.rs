use std::time::{Duration, Instant};

use sandbox::{ExecutionError, Sandbox, SandboxConfig};

fn run(source: &str) -> String {
    Sandbox::default().run(source).text()
}

#[test]
fn prints_lesson_one_sum() {
    let source = "let a = 5;\nlet b = 10;\nconsole.log(\"Sum: \" + (a + b));";
    assert_eq!(run(source), "Sum: 15\n");
}

#[test]
fn joins_arguments_with_single_space() {
    assert_eq!(run("console.log('a', 1, true, null, undefined);"), "a 1 true null undefined\n");
}

#[test]
fn objects_and_arrays_print_as_json() {
    let source = "const person = { name: 'Ada', langs: ['en', 'fr'] };\nconsole.log(person);\nconsole.log([1, 'two', [3]]);";
    assert_eq!(
        run(source),
        "{\"name\":\"Ada\",\"langs\":[\"en\",\"fr\"]}\n[1,\"two\",[3]]\n"
    );
}

#[test]
fn program_without_output_yields_empty_text() {
    assert_eq!(run("let x = 1 + 1;"), "");
}

#[test]
fn uncaught_throw_becomes_error_line_after_partial_output() {
    let source = "console.log('start');\nthrow new Error('Something failed');\nconsole.log('never');";
    assert_eq!(run(source), "start\nError: Something failed\n");
}

#[test]
fn thrown_strings_use_their_text() {
    assert_eq!(run("throw 'plain';"), "Error: plain\n");
}

#[test]
fn undefined_variable_reports_reference_error() {
    assert_eq!(run("console.log(missing);"), "Error: missing is not defined\n");
}

#[test]
fn syntax_error_reports_engine_message() {
    assert_eq!(run("let fullName = ;"), "Error: Unexpected token ';'\n");
}

#[test]
fn redeclared_let_is_rejected_before_running() {
    let source = "console.log('first');\nlet x = 1;\nlet x = 2;";
    assert_eq!(run(source), "Error: Identifier 'x' has already been declared\n");
}

#[test]
fn const_reassignment_is_a_type_error() {
    let output = Sandbox::default().run("const pi = 3.14;\npi = 3;");
    assert_eq!(output.text(), "Error: Assignment to constant variable.\n");
    assert!(matches!(
        output.error(),
        Some(ExecutionError::Uncaught { name, .. }) if name == "TypeError"
    ));
}

#[test]
fn runs_do_not_leak_state_or_output() {
    let sandbox = Sandbox::default();
    let first = sandbox.run("var shared = 'x';\nconsole.log('one');");
    let second = sandbox.run("console.log(typeof shared);");
    assert_eq!(first.text(), "one\n");
    assert_eq!(second.text(), "undefined\n");
}

#[test]
fn infinite_loop_hits_the_time_budget() {
    let sandbox = Sandbox::new(
        SandboxConfig::default()
            .with_timeout(Duration::from_millis(50))
            .with_max_steps(u64::MAX),
    );
    let started = Instant::now();
    let output = sandbox.run("console.log('go');\nwhile (true) {}");
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(matches!(output.error(), Some(ExecutionError::TimedOut { limit_ms: 50 })));
    assert_eq!(output.text(), "go\nError: Execution timed out after 50ms\n");
}

#[test]
fn unbounded_recursion_is_a_catchable_range_error() {
    let source = "function f() { return f(); }\ntry { f(); } catch (e) { console.log(e.name, e.message); }";
    assert_eq!(run(source), "RangeError Maximum call stack size exceeded\n");
}

#[test]
fn deeply_nested_source_is_rejected() {
    let source = format!("console.log({}1{});", "(".repeat(5_000), ")".repeat(5_000));
    assert_eq!(run(&source), "Error: Maximum nesting depth exceeded\n");
}

#[test]
fn budget_halts_cannot_be_caught() {
    let sandbox = Sandbox::new(SandboxConfig::default().with_max_steps(10_000));
    let output = sandbox.run("try { for (;;) {} } catch (e) { console.log('caught'); }");
    assert!(matches!(output.error(), Some(ExecutionError::StepLimit { .. })));
    assert_eq!(output.captured(), "");
}

#[test]
fn output_cap_stops_runaway_printing() {
    let sandbox = Sandbox::new(SandboxConfig::default().with_max_output_bytes(32));
    let output = sandbox.run("for (let i = 0; i < 100; i++) { console.log('line ' + i); }");
    assert!(output.captured().len() <= 32);
    assert!(output.text().ends_with("Error: Output limit exceeded\n"));
}

#[test]
fn console_error_is_not_captured() {
    assert_eq!(run("console.error('oops');\nconsole.log('ok');"), "ok\n");
}

#[test]
fn try_run_separates_success_from_fault() {
    let sandbox = Sandbox::default();
    assert_eq!(sandbox.try_run("console.log(2 ** 10);"), Ok("1024\n".to_owned()));
    let err = sandbox.try_run("null.x;").unwrap_err();
    assert_eq!(err.to_string(), "Cannot read properties of null (reading 'x')");
}

#[test]
fn lesson_programs_behave_like_a_browser() {
    let cases = [
        ("console.log(typeof null, typeof 42, typeof 'hi', typeof undefined);", "object number string undefined\n"),
        ("console.log(0.1 + 0.2);", "0.30000000000000004\n"),
        ("console.log((3.14159).toFixed(2));", "3.14\n"),
        ("console.log(10 / 3 > 3 ? 'big' : 'small');", "big\n"),
        ("let age = 20;\nif (age >= 18 && age < 65) { console.log('adult'); } else { console.log('other'); }", "adult\n"),
        ("console.log(null ?? 'fallback', 0 || 'zero', '' && 'never');", "fallback zero \n"),
        ("const name = 'World';\nconsole.log(`Hello, ${name}!`);", "Hello, World!\n"),
        ("console.log([3, 1, 2].sort().map(n => n * 2));", "[2,4,6]\n"),
        ("console.log([1, 2, 3, 4].reduce((sum, n) => sum + n, 0));", "10\n"),
        ("console.log('a-b-c'.split('-').reverse().join('+'));", "c+b+a\n"),
        ("console.log(Math.max(3, 7, 2), Math.round(4.5), Math.floor(-1.5));", "7 5 -2\n"),
        ("console.log(5 == '5', 5 === '5', null == undefined);", "true false true\n"),
        ("console.log(String(123) + 1, Number('42') + 1, parseInt('08'));", "1231 43 8\n"),
        ("console.log(Object.keys({a: 1, b: 2}), JSON.stringify({x: [1, {y: null}]}));", "[\"a\",\"b\"] {\"x\":[1,{\"y\":null}]}\n"),
        ("let i = 0;\ndo { i++; } while (i < 5);\nconsole.log(i);", "5\n"),
        ("for (const ch of 'hey') { console.log(ch.toUpperCase()); }", "H\nE\nY\n"),
        ("console.log('abc'.padStart(5, '*'), 'x'.repeat(3), ' hi '.trim());", "**abc xxx hi\n"),
        ("const counter = (() => { let n = 0; return () => ++n; })();\ncounter();\nconsole.log(counter());", "2\n"),
    ];
    for (source, expected) in cases {
        assert_eq!(run(source), expected, "program: {source}");
    }
}

#[test]
fn doubling_a_string_stops_at_the_length_cap() {
    let sources = [
        "let s = 'a';\nfor (let i = 0; i < 40; i++) { s = s + s; }\nconsole.log(s.length);",
        "let s = 'a';\nwhile (true) { s += s; }",
        "let t = 'a';\nfor (let i = 0; i < 40; i++) { t = `${t}${t}`; }",
        "let c = 'a';\nfor (let i = 0; i < 40; i++) { c = c.concat(c); }",
    ];
    for source in sources {
        assert_eq!(run(source), "Error: Invalid string length\n", "program: {source}");
    }
}

#[test]
fn string_length_errors_are_catchable() {
    let source = "try { let s = 'a'; while (true) { s += s; } } catch (e) { console.log(e.name + ': ' + e.message); }\nconsole.log('after');";
    assert_eq!(run(source), "RangeError: Invalid string length\nafter\n");
}

#[test]
fn oversized_string_builders_throw_before_allocating() {
    let cases = [
        "'a'.repeat(268435456).split('');",
        "const chunk = 'x'.repeat(1048576);\nconst parts = [];\nfor (let i = 0; i < 32; i++) { parts.push(chunk); }\nparts.join('');",
        "'a'.repeat(4194304).replaceAll('a', 'bbbbb');",
        "const big = 'x'.repeat(10000000);\nJSON.stringify([big, big]);",
        "'ab'.padEnd(20000000, 'c');",
    ];
    for source in cases {
        assert_eq!(run(source), "Error: Invalid string length\n", "program: {source}");
    }
}

#[test]
fn doubling_an_array_hits_the_memory_budget() {
    let sandbox = Sandbox::new(SandboxConfig::default().with_max_alloc_bytes(16 << 20));
    let output = sandbox.run(
        "let a = [1];\nfor (let i = 0; i < 40; i++) { a = a.concat(a); }\nconsole.log(a.length);",
    );
    assert!(matches!(
        output.error(),
        Some(ExecutionError::MemoryLimit { limit_bytes }) if *limit_bytes == 16 << 20
    ));
    assert!(output.error().is_some_and(ExecutionError::is_budget_exceeded));
    assert_eq!(output.text(), "Error: Memory limit exceeded\n");
}

#[test]
fn splitting_a_huge_string_hits_the_memory_budget() {
    let output = Sandbox::default().run("const parts = 'ab'.repeat(8388608).split('');");
    assert!(matches!(output.error(), Some(ExecutionError::MemoryLimit { .. })));
}

#[test]
fn mapping_a_sparse_array_is_charged() {
    let sandbox = Sandbox::new(SandboxConfig::default().with_max_alloc_bytes(1 << 20));
    let output = sandbox.run(
        "const a = [];\na.length = 30000;\nconsole.log('sized');\nconst b = a.map(x => 1);\nconsole.log('mapped');",
    );
    assert_eq!(output.text(), "sized\nError: Memory limit exceeded\n");
}

#[test]
fn memory_budget_halts_cannot_be_caught() {
    let sandbox = Sandbox::new(SandboxConfig::default().with_max_alloc_bytes(1 << 20));
    let output = sandbox.run(
        "try { const rows = []; while (true) { rows.push({ id: rows.length }); } } catch (e) { console.log('caught'); }",
    );
    assert!(matches!(output.error(), Some(ExecutionError::MemoryLimit { .. })));
    assert_eq!(output.captured(), "");
}

#[test]
fn self_referencing_values_still_print_and_compare() {
    let source = "const o = { name: 'loop' };\no.me = o;\nconst a = [1];\na.push(a);\nconsole.log(o.me.me.name, String(a), a[1] === a);";
    assert_eq!(run(source), "loop 1, true\n");
}
