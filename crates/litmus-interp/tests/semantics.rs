// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! End-to-end language semantics: snippets evaluated in one context, the
//! way consecutive blocks of a document share state.

use std::sync::Arc;

use litmus_interp::{
    display, error_parts, Capability, CapabilitySet, Halt, Interpreter, InterruptReason, Outcome,
    SandboxConfig,
};

/// What one snippet produced, rendered so it can leave the worker thread.
#[derive(Debug, PartialEq)]
enum Rendered {
    Completed(String),
    Thrown(String, String),
    Halted(Halt),
}

struct Run {
    outcome: Rendered,
    output: Vec<String>,
    soft_failures: Vec<String>,
}

/// Evaluate `snippets` in order in one context on a thread with a roomy
/// stack, rendering every result there.
fn run_with(config: SandboxConfig, snippets: &[&str]) -> Vec<Run> {
    let snippets: Vec<String> = snippets.iter().map(|s| s.to_string()).collect();
    std::thread::Builder::new()
        .stack_size(64 * 1024 * 1024)
        .spawn(move || {
            let mut interp = Interpreter::new(config);
            snippets
                .iter()
                .map(|src| {
                    let eval = interp.eval(src);
                    let outcome = match eval.outcome {
                        Outcome::Completed(v) => Rendered::Completed(display(&v)),
                        Outcome::Thrown(v) => {
                            let (name, message) = error_parts(&v);
                            Rendered::Thrown(name, message)
                        }
                        Outcome::Halted(h) => Rendered::Halted(h),
                    };
                    Run {
                        outcome,
                        output: eval.output,
                        soft_failures: eval.soft_failures,
                    }
                })
                .collect()
        })
        .unwrap()
        .join()
        .unwrap()
}

fn run(snippets: &[&str]) -> Vec<Run> {
    run_with(SandboxConfig::default(), snippets)
}

/// Completion value of the last snippet.
fn value_of(snippets: &[&str]) -> String {
    match run(snippets).pop().unwrap().outcome {
        Rendered::Completed(v) => v,
        other => panic!("expected completion, got {:?}", other),
    }
}

fn allowing(caps: &[Capability]) -> SandboxConfig {
    let mut all = vec![Capability::Print, Capability::Assert];
    all.extend_from_slice(caps);
    SandboxConfig {
        capabilities: Arc::new(CapabilitySet::new(all)),
        ..SandboxConfig::default()
    }
}

fn thrown(src: &str) -> (String, String) {
    match run(&[src]).pop().unwrap().outcome {
        Rendered::Thrown(name, message) => (name, message),
        other => panic!("expected a throw, got {:?}", other),
    }
}

// ---------------------------------------------------------------------------
// Carried state
// ---------------------------------------------------------------------------

#[test]
fn carried_context_accumulates_across_snippets() {
    let result = value_of(&[
        "var sum = 0;",
        "for (const n of [1, 2, 3, 4]) { sum += n; }",
        "sum",
    ]);
    assert_eq!(result, "10");
}

#[test]
fn top_level_let_can_be_redeclared_by_a_later_snippet() {
    assert_eq!(value_of(&["let k = 1;", "let k = 2; k"]), "2");
}

#[test]
fn redeclaration_within_one_snippet_is_a_syntax_error() {
    let (name, message) = thrown("let dup = 1; let dup = 2;");
    assert_eq!(name, "SyntaxError");
    assert_eq!(message, "Identifier 'dup' has already been declared");
}

#[test]
fn a_throw_keeps_earlier_side_effects() {
    let runs = run(&[
        "var a = 1; console.log('before'); a = 2; throw new Error('boom'); a = 3;",
        "a",
    ]);
    assert_eq!(runs[0].output, vec!["before"]);
    assert_eq!(
        runs[0].outcome,
        Rendered::Thrown("Error".into(), "boom".into())
    );
    assert_eq!(runs[1].outcome, Rendered::Completed("2".into()));
}

// ---------------------------------------------------------------------------
// Calls
// ---------------------------------------------------------------------------

#[test]
fn later_defaults_see_earlier_parameters() {
    let src = "function multiply(a, b = a) { return a * b; }";
    assert_eq!(value_of(&[src, "multiply(5)"]), "25");
    assert_eq!(value_of(&[src, "multiply(3, 4)"]), "12");
}

#[test]
fn arguments_holds_every_passed_value() {
    let src = "function f(a, b = 2) { return arguments.length + ':' + b; }";
    assert_eq!(value_of(&[src, "f(1)"]), "1:2");
    assert_eq!(value_of(&[src, "f(1, 5, 9)"]), "3:5");
}

#[test]
fn closures_capture_their_scope() {
    let src = "
        function counter() {
            let n = 0;
            return () => ++n;
        }
        const next = counter();
        next(); next();
        next()
    ";
    assert_eq!(value_of(&[src]), "3");
}

#[test]
fn runaway_recursion_is_a_range_error() {
    let (name, message) = thrown("function r() { return r(); } r();");
    assert_eq!(name, "RangeError");
    assert_eq!(message, "Maximum call stack size exceeded");
}

#[test]
fn flattening_a_cyclic_array_is_a_range_error() {
    let src = "let a = [1]; a.push(a); a.flat(Infinity)";
    let (name, message) = thrown(src);
    assert_eq!(name, "RangeError");
    assert_eq!(message, "Maximum call stack size exceeded");

    // Without a step budget the call depth alone ends it.
    let unbudgeted = SandboxConfig {
        max_steps: None,
        ..SandboxConfig::default()
    };
    let runs = run_with(unbudgeted, &[src, "[1, [2, [3, [4]]]].flat(Infinity).length"]);
    assert!(matches!(&runs[0].outcome, Rendered::Thrown(name, _) if name == "RangeError"));
    assert!(matches!(&runs[1].outcome, Rendered::Completed(v) if v == "4"));
}

// ---------------------------------------------------------------------------
// Scoping
// ---------------------------------------------------------------------------

#[test]
fn let_shadows_without_overwriting() {
    assert_eq!(value_of(&["let x = 1; { let x = 2; } x"]), "1");
}

#[test]
fn var_is_shared_across_nested_blocks() {
    assert_eq!(value_of(&["var y = 1; { var y = 2; } y"]), "2");
    let src = "function g() { var v = 1; if (true) { var v = 2; } return v; } g()";
    assert_eq!(value_of(&[src]), "2");
}

#[test]
fn let_is_uninitialized_before_its_declaration() {
    let (name, message) = thrown("{ console.log(z); let z = 1; }");
    assert_eq!(name, "ReferenceError");
    assert_eq!(message, "Cannot access 'z' before initialization");
}

#[test]
fn assigning_a_const_is_a_type_error() {
    let (name, message) = thrown("const c = 1; c = 2;");
    assert_eq!(name, "TypeError");
    assert_eq!(message, "Assignment to constant variable.");
}

// ---------------------------------------------------------------------------
// Coercion and member access
// ---------------------------------------------------------------------------

#[test]
fn mixed_type_operators_coerce() {
    assert_eq!(value_of(&["'5' + 1"]), "51");
    assert_eq!(value_of(&["'5' - 1"]), "4");
    assert_eq!(value_of(&["[] + {}"]), "[object Object]");
    assert_eq!(value_of(&["null == undefined"]), "true");
    assert_eq!(value_of(&["0 == ''"]), "true");
    assert_eq!(value_of(&["null === undefined"]), "false");
}

#[test]
fn absent_members_read_as_undefined() {
    assert_eq!(value_of(&["const o = { a: 1 }; o.b"]), "undefined");
    assert_eq!(value_of(&["const p = {}; p?.q?.r"]), "undefined");
}

#[test]
fn reading_a_member_of_null_throws() {
    let src = "try { null.x } catch (e) { e.name + ': ' + e.message }";
    assert_eq!(
        value_of(&[src]),
        "TypeError: Cannot read properties of null (reading 'x')"
    );
}

// ---------------------------------------------------------------------------
// Output and assertions
// ---------------------------------------------------------------------------

#[test]
fn print_primitives_capture_one_line_each() {
    let runs = run(&["console.log('a', 1, [1, 2]); print('b'); console.error('c');"]);
    assert_eq!(runs[0].output, vec!["a 1 [ 1, 2 ]", "b", "c"]);
}

#[test]
fn rerunning_yields_identical_output() {
    let src = "for (let i = 0; i < 3; i++) console.log(i * 2, { i });";
    let first = run(&[src]).pop().unwrap().output;
    let second = run(&[src]).pop().unwrap().output;
    assert_eq!(first, second);
    assert_eq!(first[2], "4 { i: 2 }");
}

#[test]
fn console_assert_records_a_soft_failure_and_continues() {
    let runs = run(&["console.assert(1 === 2, 'math'); console.log('still here');"]);
    assert_eq!(runs[0].soft_failures, vec!["Assertion failed: math"]);
    assert_eq!(runs[0].output, vec!["Assertion failed: math", "still here"]);
}

#[test]
fn assert_throws_an_assertion_error() {
    let (name, _) = thrown("assert.strictEqual(1, 2);");
    assert_eq!(name, "AssertionError");
    let (name, message) = thrown("assert(false, 'nope');");
    assert_eq!((name.as_str(), message.as_str()), ("AssertionError", "nope"));
}

// ---------------------------------------------------------------------------
// Sandbox
// ---------------------------------------------------------------------------

#[test]
fn step_budget_halts_infinite_loops() {
    let config = SandboxConfig {
        max_steps: Some(1_000),
        ..SandboxConfig::default()
    };
    let runs = run_with(config, &["while (true) {}"]);
    assert_eq!(runs[0].outcome, Rendered::Halted(Halt::StepBudget(1_000)));
}

#[test]
fn halts_are_not_catchable() {
    let config = SandboxConfig {
        max_steps: Some(500),
        ..SandboxConfig::default()
    };
    let runs = run_with(config, &["try { for (;;) {} } catch (e) { 'caught' }"]);
    assert_eq!(runs[0].outcome, Rendered::Halted(Halt::StepBudget(500)));
}

#[test]
fn an_interrupt_stops_evaluation() {
    let config = SandboxConfig::default();
    config.interrupt.trigger(InterruptReason::Timeout);
    let runs = run_with(config, &["let i = 0; while (true) { i++; }"]);
    assert_eq!(runs[0].outcome, Rendered::Halted(Halt::Timeout));
}

#[test]
fn denied_capabilities_halt() {
    let runs = run(&["Math.random()", "require('fs')", "Date.now()", "setTimeout(() => {}, 1)"]);
    let reasons: Vec<Rendered> = runs.into_iter().map(|r| r.outcome).collect();
    assert_eq!(
        reasons,
        vec![
            Rendered::Halted(Halt::CapabilityDenied(Capability::Random)),
            Rendered::Halted(Halt::CapabilityDenied(Capability::Fs)),
            Rendered::Halted(Halt::CapabilityDenied(Capability::Clock)),
            Rendered::Halted(Halt::CapabilityDenied(Capability::Timers)),
        ]
    );
}

#[test]
fn print_can_be_denied() {
    let config = SandboxConfig {
        capabilities: Arc::new(CapabilitySet::new([Capability::Assert])),
        ..SandboxConfig::default()
    };
    let runs = run_with(config, &["1 + 1;", "console.log('hi')"]);
    assert_eq!(runs[0].outcome, Rendered::Completed("2".into()));
    assert_eq!(
        runs[1].outcome,
        Rendered::Halted(Halt::CapabilityDenied(Capability::Print))
    );
}

#[test]
fn output_limit_halts() {
    let config = SandboxConfig {
        max_output_bytes: Some(10),
        ..SandboxConfig::default()
    };
    let runs = run_with(config, &["for (let i = 0; i < 100; i++) console.log('line');"]);
    assert_eq!(runs[0].outcome, Rendered::Halted(Halt::OutputLimit(10)));
    assert_eq!(runs[0].output, vec!["line", "line"]);
}

#[test]
fn seeded_random_is_reproducible() {
    let src = "[Math.random(), Math.random()].join(',')";
    let a = run_with(allowing(&[Capability::Random]), &[src]);
    let b = run_with(allowing(&[Capability::Random]), &[src]);
    assert_eq!(a[0].outcome, b[0].outcome);
}

#[test]
fn timers_fire_on_a_virtual_clock() {
    let src = "
        setTimeout(() => console.log('later'), 10);
        setTimeout(() => console.log('sooner'), 0);
        const id = setTimeout(() => console.log('never'), 5);
        clearTimeout(id);
        console.log('now');
    ";
    let runs = run_with(allowing(&[Capability::Timers]), &[src]);
    assert_eq!(runs[0].output, vec!["now", "sooner", "later"]);
}

#[test]
fn intervals_run_until_cleared() {
    let src = "
        let ticks = 0;
        const h = setInterval(() => {
            ticks++;
            if (ticks === 3) clearInterval(h);
        }, 100);
    ";
    let runs = run_with(allowing(&[Capability::Timers]), &[src, "ticks"]);
    assert_eq!(runs[1].outcome, Rendered::Completed("3".into()));
}

#[test]
fn unknown_modules_throw() {
    let (name, message) = thrown("require('left-pad')");
    assert_eq!(name, "Error");
    assert_eq!(message, "Cannot find module 'left-pad'");
}

// ---------------------------------------------------------------------------
// Builtins
// ---------------------------------------------------------------------------

#[test]
fn common_builtins() {
    assert_eq!(value_of(&["[3, 1, 2].sort().map(n => n * 2).join('-')"]), "2-4-6");
    assert_eq!(value_of(&["'a,b,c'.split(',').reverse().join('')"]), "cba");
    assert_eq!(value_of(&["(1.005).toFixed(2)"]), "1.00");
    assert_eq!(value_of(&["JSON.stringify({ a: [1, 'x'], b: undefined })"]), "{\"a\":[1,\"x\"]}");
    assert_eq!(value_of(&["Object.keys({ z: 1, a: 2 }).join()"]), "z,a");
    assert_eq!(value_of(&["parseInt('42px') + Number('8')"]), "50");
    assert_eq!(value_of(&["new Date(0).toISOString()"]), "1970-01-01T00:00:00.000Z");
}

#[test]
fn dates_are_utc_and_fields_carry_over() {
    assert_eq!(
        value_of(&["new Date(2024, 0, 32).toUTCString()"]),
        "Thu, 01 Feb 2024 00:00:00 GMT"
    );
    assert_eq!(value_of(&["Date.parse('2024-01-02T03:04:05+01:00')"]), "1704161045000");
    assert_eq!(
        value_of(&["let d = new Date(Date.UTC(2024, 1, 29)); d.setUTCFullYear(2025); d.toISOString()"]),
        "2025-03-01T00:00:00.000Z"
    );
    assert_eq!(value_of(&["String(new Date('not a date'))"]), "Invalid Date");
}

#[test]
fn user_errors_and_instanceof() {
    let src = "
        let caught;
        try { throw new TypeError('bad', { cause: 1 }); } catch (e) { caught = e; }
        [caught instanceof TypeError, caught instanceof Error, caught.cause, String(caught)].join('|')
    ";
    assert_eq!(value_of(&[src]), "true|true|1|TypeError: bad");
}

#[test]
fn non_error_throws_are_uncaught_values() {
    let (name, message) = thrown("throw { code: 7 };");
    assert_eq!(name, "Uncaught");
    assert_eq!(message, "{ code: 7 }");
}
