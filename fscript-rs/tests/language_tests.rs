/// Language behaviour tests: whole scripts run through the public API.
///
/// Each test loads a script, runs it, and checks variables, return values,
/// host interaction or the reported error.
use std::cell::RefCell;
use std::rc::Rc;

use fscript::script::scope::Scope;
use fscript::{
    Config, ErrorKind, Extensions, HostBridge, HostError, HostValue, Interpreter, LoadError,
    MapStore, ScriptError, ScriptSource, Value,
};
use pretty_assertions::assert_eq;

// ── Helpers ───────────────────────────────────────────────────────────────────

fn load(src: &str) -> Interpreter {
    let mut it = Interpreter::new();
    it.load_str(src).expect("load failed");
    it
}

fn run(src: &str) -> Interpreter {
    let mut it = load(src);
    it.run().expect("run failed");
    it
}

fn run_err(src: &str) -> ScriptError {
    load(src).run().expect_err("expected failure")
}

fn eval(it: &mut Interpreter, expr: &str) -> Value {
    it.run_line(&format!("return {expr}"))
        .expect("eval failed")
        .expect("no value")
}

fn truthy(src: &str) -> bool {
    eval(&mut Interpreter::new(), src) == Value::Int(1)
}

/// Host bridge that counts calls of `tick()` and records their order.
#[derive(Default)]
struct Recorder {
    calls: Vec<String>,
}

impl HostBridge for Recorder {
    fn call(
        &mut self,
        name: &str,
        args: &[Value],
        _scope: &mut Scope,
    ) -> Result<Option<Value>, HostError> {
        match name {
            "tick" => {
                let label = args.first().map(Value::to_string).unwrap_or_default();
                self.calls.push(label);
                Ok(Some(Value::Int(1)))
            }
            "nothing" => Ok(None),
            _ => Err(HostError::UnresolvedFunction(name.to_owned())),
        }
    }
}

// ── Expressions ───────────────────────────────────────────────────────────────

#[test]
fn precedence() {
    assert!(truthy("1 + 2 * 3 == 7"));
    assert!(truthy("(1 + 2) * 3 == 9"));
}

#[test]
fn concatenation() {
    assert!(truthy("\"a\" + 1 == \"a1\""));
    assert!(truthy("1 + \"a\" == \"1a\""));
}

#[test]
fn division() {
    assert!(truthy("7 / 2 == 3"));
    assert!(truthy("7.0 / 2 == 3.5"));
}

#[test]
fn logical_not() {
    assert!(truthy("!0 == 1"));
    let e = Interpreter::new().run_line("return !\"s\"").unwrap_err();
    assert_eq!(e.kind, ErrorKind::Semantic);
    assert!(e.message.contains("!"), "{}", e.message);
}

#[test]
fn no_short_circuit() {
    let recorder = Rc::new(RefCell::new(Recorder::default()));
    let mut it = Interpreter::new().with_host(recorder.clone());
    assert_eq!(
        it.run_line("return tick(\"a\") - 1 && tick(\"b\")").unwrap(),
        Some(Value::Int(0))
    );
    assert_eq!(
        it.run_line("return tick(\"c\") || tick(\"d\")").unwrap(),
        Some(Value::Int(1))
    );
    assert_eq!(recorder.borrow().calls, vec!["a", "b", "c", "d"]);
}

#[test]
fn integer_overflow_wraps() {
    let mut it = Interpreter::new();
    assert_eq!(
        eval(&mut it, "9223372036854775807 + 1"),
        Value::Int(i64::MIN)
    );
}

// ── Variables ─────────────────────────────────────────────────────────────────

#[test]
fn redeclaration_is_semantic_error() {
    let e = run_err("int x\nint x");
    assert_eq!(e.kind, ErrorKind::Semantic);
    assert_eq!(e.line(), Some(2));
}

#[test]
fn declared_type_is_enforced() {
    let e = run_err("int x\nx = \"s\"");
    assert_eq!(e.kind, ErrorKind::Semantic);
    assert!(e.message.starts_with("Incompatible types"));
}

#[test]
fn object_pins_first_assigned_type() {
    let mut it = run("object o\no = \"first\"\no = \"second\"");
    assert_eq!(
        it.get_var("o").unwrap(),
        Value::object(HostValue::Str("second".into()))
    );
    let e = run_err("object o\no = \"first\"\no = 2");
    assert!(e.message.starts_with("Incompatible types"));
    assert_eq!(e.line(), Some(3));
}

#[test]
fn void_host_result_cannot_be_assigned() {
    let mut it = load("int x\nx = nothing()").with_host(Recorder::default());
    let e = it.run().unwrap_err();
    assert_eq!(e.message, "set variable x with null value");
}

// ── Control flow ──────────────────────────────────────────────────────────────

#[test]
fn while_runs_body_exactly_three_times() {
    let recorder = Rc::new(RefCell::new(Recorder::default()));
    let mut it = load("int i = 0\nwhile i < 3\ntick(i)\ni = i + 1\nendwhile")
        .with_host(recorder.clone());
    it.run().unwrap();
    assert_eq!(it.get_var("i").unwrap(), Value::Int(3));
    assert_eq!(recorder.borrow().calls, vec!["0", "1", "2"]);
}

#[test]
fn single_line_if_needs_no_endif() {
    let mut it = run("int r\nif 1 then r = 4\nr = r + 1");
    assert_eq!(it.get_var("r").unwrap(), Value::Int(5));
}

#[test]
fn missing_terminators() {
    let e = run_err("int x = 1\nif x\nx = 2");
    assert_eq!((e.kind, e.message.as_str()), (ErrorKind::Structural, "can't find endif"));
    let e = run_err("int x = 1\nwhile x < 3\nx = x + 1");
    assert_eq!((e.kind, e.message.as_str()), (ErrorKind::Structural, "can't find endwhile"));
}

// ── Functions ─────────────────────────────────────────────────────────────────

#[test]
fn wrong_argument_count() {
    let e = run_err("function f(int a)\nreturn a\nendfunction\nint r = f(1, 2)");
    assert_eq!(e.kind, ErrorKind::Semantic);
    assert_eq!(e.message, "Expected 1 parameters, Found 2");
}

#[test]
fn endfunction_yields_one() {
    let mut it = run("function f()\nendfunction\nint r = f()");
    assert_eq!(it.get_var("r").unwrap(), Value::Int(1));
}

#[test]
fn nested_calls_fall_back_to_true_globals() {
    let src = "\
string who = \"global\"
function inner()
return who
endfunction
function middle()
string who = \"middle\"
return inner()
endfunction
function outer()
string who = \"outer\"
return middle()
endfunction
string r = outer()";
    let mut it = run(src);
    assert_eq!(it.get_var("r").unwrap(), Value::Str("global".into()));
}

#[test]
fn nested_calls_update_true_globals() {
    let src = "\
int counter = 0
function leaf()
counter = counter + 1
endfunction
function branch()
int counter = 100
leaf()
return counter
endfunction
int local_seen = branch()";
    let mut it = run(src);
    assert_eq!(it.get_var("counter").unwrap(), Value::Int(1));
    assert_eq!(it.get_var("local_seen").unwrap(), Value::Int(100));
}

#[test]
fn position_restored_after_call_mid_expression() {
    let src = "\
function two()
int unused = 0
return 2
endfunction
int r = 1 + two() * 3 + two()";
    let mut it = run(src);
    assert_eq!(it.get_var("r").unwrap(), Value::Int(9));
}

#[test]
fn call_inside_loop_condition() {
    let src = "\
int i = 0
function below(int n, int limit)
return n < limit
endfunction
while below(i, 4)
i = i + 1
endwhile";
    let mut it = run(src);
    assert_eq!(it.get_var("i").unwrap(), Value::Int(4));
}

// ── Host bridge ───────────────────────────────────────────────────────────────

#[test]
fn host_variables_and_functions() {
    let mut ext = Extensions::new();
    ext.register_var("limit", Value::Int(10));
    ext.register_fn("double_it", |args, _scope| match args {
        [Value::Int(n)] => Ok(Some(Value::Int(n * 2))),
        _ => Err(HostError::Failed("double_it expects one int".into())),
    });
    let mut it = load("int r = double_it(limit)\nlimit = 3").with_host(ext);
    it.run().unwrap();
    assert_eq!(it.get_var("r").unwrap(), Value::Int(20));
    assert_eq!(it.get_var("limit").unwrap(), Value::Int(3));
}

#[test]
fn host_failure_is_delegation_error() {
    let mut ext = Extensions::new();
    ext.register_fn("fail", |_args, _scope| Err(HostError::Failed("disk on fire".into())));
    let mut it = load("int a\nfail()").with_host(ext);
    let e = it.run().unwrap_err();
    assert_eq!(e.kind, ErrorKind::Delegation);
    assert_eq!(e.message, "disk on fire");
    assert_eq!(e.line(), Some(2));
}

#[test]
fn unknown_function_is_delegation_error() {
    let e = run_err("missing(1)");
    assert_eq!(e.kind, ErrorKind::Delegation);
    assert_eq!(e.message, "Unrecognised function missing");
}

#[test]
fn host_callback_sees_innermost_frame() {
    let mut ext = Extensions::new();
    ext.register_fn("peek", |args, scope| {
        let name = args[0].to_string();
        Ok(Some(scope.get(&name).cloned().unwrap_or(Value::null())))
    });
    let src = "\
int x = 1
function f()
int x = 2
return peek(\"x\")
endfunction
int r = f()
int top = peek(\"x\")";
    let mut it = load(src).with_host(ext);
    it.run().unwrap();
    assert_eq!(it.get_var("r").unwrap(), Value::Int(2));
    assert_eq!(it.get_var("top").unwrap(), Value::Int(1));
}

#[test]
fn host_callback_can_write_script_variables() {
    let mut ext = Extensions::new();
    ext.register_fn("set_total", |args, scope| {
        scope
            .assign("total", args[0].clone())
            .map(|_| None)
            .map_err(|e| HostError::Failed(e.to_string()))
    });
    let mut it = load("int total\nset_total(41)\ntotal = total + 1").with_host(ext);
    it.run().unwrap();
    assert_eq!(it.get_var("total").unwrap(), Value::Int(42));
}

// ── Indexed store ─────────────────────────────────────────────────────────────

#[test]
fn indexed_store_delegation() {
    let store = Rc::new(RefCell::new(MapStore::new()));
    let src = "\
int i = 0
while i < 4
squares[i] = i * i
i = i + 1
endwhile
int r = squares[3] + squares[\"2\"]";
    let mut it = load(src).with_store(store.clone());
    it.run().unwrap();
    assert_eq!(it.get_var("r").unwrap(), Value::Int(13));
    assert_eq!(store.borrow().len("squares"), 4);
    assert_eq!(store.borrow().get("squares", &Value::Int(1)), Some(&Value::Int(1)));
}

#[test]
fn indexed_read_of_missing_element() {
    let mut it = load("int r = a[0]").with_store(MapStore::new());
    let e = it.run().unwrap_err();
    assert_eq!(e.kind, ErrorKind::Delegation);
}

// ── Embedding API ─────────────────────────────────────────────────────────────

#[test]
fn run_line_after_script() {
    let mut it = run("int base = 40\nfunction add(int n)\nreturn base + n\nendfunction");
    assert_eq!(it.run_line("return add(2)").unwrap(), Some(Value::Int(42)));
    it.run_line("base = 0").unwrap();
    assert_eq!(it.call_function("add", &[Value::Int(5)]).unwrap(), Some(Value::Int(5)));
}

#[test]
fn run_line_rejects_unbalanced_text() {
    let e = Interpreter::new().run_line("f(1").unwrap_err();
    assert_eq!(e.kind, ErrorKind::Syntax);
}

#[test]
fn run_line_cannot_open_blocks() {
    let e = Interpreter::new().run_line("while 1").unwrap_err();
    assert_eq!(e.message, "can't find endwhile");
}

#[test]
fn reset_keeps_functions() {
    let mut it = run("int x = 3\nfunction one()\nreturn 1\nendfunction");
    it.reset();
    assert!(!it.has_var("x"));
    assert_eq!(it.functions(), vec!["one".to_owned()]);
    it.run().unwrap();
    assert_eq!(it.get_var("x").unwrap(), Value::Int(3));
}

#[test]
fn load_file_and_validation() {
    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().join("good.fs");
    std::fs::write(&good, "int x = 2\nreturn x * x\n").unwrap();
    let mut it = Interpreter::new();
    it.load_file(&good).unwrap();
    assert_eq!(it.run().unwrap(), Some(Value::Int(4)));

    let bad = dir.path().join("bad.fs");
    std::fs::write(&bad, "int x\nx = (1 + 2\n").unwrap();
    let mut it = Interpreter::new();
    match it.load_file(&bad) {
        Err(LoadError::Unbalanced { line, .. }) => assert_eq!(line, 2),
        other => panic!("unexpected {other:?}"),
    }

    let missing = dir.path().join("missing.fs");
    assert!(matches!(it.load_file(&missing), Err(LoadError::Io(_))));
}

#[test]
fn custom_line_cursor() {
    let source = ScriptSource::from_text("int a = 1\nwhile a < 100\na = a * 3\nendwhile\nreturn a");
    let mut it = Interpreter::with_source(source).with_config(Config::new().with_context_lines(1));
    assert_eq!(it.run().unwrap(), Some(Value::Int(243)));
}

#[test]
fn error_report_is_readable() {
    let e = run_err("int a = 1\nint b = 2\nb = a + \"x\" - 1\nint c");
    let report = e.report();
    assert!(report.starts_with("semantic error: Type mismatch for operator -"), "{report}");
    assert!(report.contains(">    3 | b = a + \"x\" - 1"), "{report}");
    assert!(report.contains("a = 1 (int)"), "{report}");
}
