//! End-to-end tests: source text through scan → parse → resolve → interpret,
//! with `print` output captured through a shared buffer.

use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

use rlox::interpreter::Interpreter;
use rlox::parser::Parser;
use rlox::resolver::Resolver;
use rlox::scanner::Scanner;
use rlox::token::Token;

#[derive(Clone, Default)]
struct SharedBuf(Rc<RefCell<Vec<u8>>>);

impl SharedBuf {
    fn contents(&self) -> String {
        String::from_utf8(self.0.borrow().clone()).expect("print output is UTF-8")
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Run a program that must be statically clean; returns captured print
/// output and the interpreter verdict (`Err` is the runtime diagnostic).
fn run(source: &str) -> (String, Result<(), String>) {
    let tokens: Vec<Token<'_>> = Scanner::new(source.as_bytes())
        .collect::<Result<Vec<_>, _>>()
        .expect("source should scan cleanly");

    let mut parser = Parser::new(&tokens);
    let statements = parser.parse();
    assert!(
        parser.errors().is_empty(),
        "unexpected parse errors: {:?}",
        parser.errors()
    );

    let buf = SharedBuf::default();
    let mut interpreter = Interpreter::with_output(Box::new(buf.clone()));

    let resolve_errors = Resolver::new(&mut interpreter).resolve(&statements);
    assert!(
        resolve_errors.is_empty(),
        "unexpected resolve errors: {:?}",
        resolve_errors
    );

    let verdict = interpreter
        .interpret(&statements)
        .map_err(|e| e.to_string());

    (buf.contents(), verdict)
}

fn run_ok(source: &str) -> String {
    let (output, verdict) = run(source);
    verdict.expect("program should run cleanly");
    output
}

fn run_err(source: &str) -> (String, String) {
    let (output, verdict) = run(source);
    (output, verdict.expect_err("program should hit a runtime error"))
}

/// Resolver diagnostics only; interpretation is skipped.
fn static_errors(source: &str) -> Vec<String> {
    let tokens: Vec<Token<'_>> = Scanner::new(source.as_bytes())
        .collect::<Result<Vec<_>, _>>()
        .expect("source should scan cleanly");

    let mut parser = Parser::new(&tokens);
    let statements = parser.parse();
    assert!(parser.errors().is_empty());

    let mut interpreter = Interpreter::with_output(Box::new(SharedBuf::default()));

    Resolver::new(&mut interpreter)
        .resolve(&statements)
        .iter()
        .map(|e| e.to_string())
        .collect()
}

// ───────────────────────── expressions & printing ────────────────────────

#[test]
fn arithmetic_follows_precedence() {
    assert_eq!(run_ok("print 1 + 2 * 3;"), "7\n");
    assert_eq!(run_ok("print (1 + 2) * 3;"), "9\n");
    assert_eq!(run_ok("print 10 - 4 - 3;"), "3\n");
}

#[test]
fn stringify_rules() {
    assert_eq!(
        run_ok("print 3.0; print 2.5; print nil; print true; print \"hi\";"),
        "3\n2.5\nnil\ntrue\nhi\n"
    );
}

#[test]
fn string_concatenation() {
    assert_eq!(run_ok("print \"foo\" + \"bar\";"), "foobar\n");
}

#[test]
fn truthiness() {
    // only nil and false are falsy; 0 and "" are truthy
    assert_eq!(
        run_ok("print !nil; print !false; print !0; print !\"\";"),
        "true\ntrue\nfalse\nfalse\n"
    );
}

#[test]
fn equality_has_no_cross_kind_coercion() {
    assert_eq!(run_ok("print nil == nil;"), "true\n");
    assert_eq!(run_ok("print 1 == \"1\";"), "false\n");
    assert_eq!(run_ok("print \"a\" == \"a\";"), "true\n");
    assert_eq!(run_ok("print nil == false;"), "false\n");
    assert_eq!(run_ok("print 1 != 2;"), "true\n");
}

#[test]
fn logical_operators_short_circuit() {
    // `and`/`or` return an operand, not a coerced boolean
    assert_eq!(run_ok("print \"hi\" or 2;"), "hi\n");
    assert_eq!(run_ok("print nil or \"fallback\";"), "fallback\n");
    assert_eq!(run_ok("print nil and boom();"), "nil\n");

    let src = "var a = 0; false and (a = 1); print a; true or (a = 2); print a;";
    assert_eq!(run_ok(src), "0\n0\n");
}

#[test]
fn assignment_yields_the_assigned_value() {
    assert_eq!(run_ok("var a; print a = 5;"), "5\n");
}

#[test]
fn division_by_zero_is_infinity() {
    assert_eq!(run_ok("print 1 / 0;"), "inf\n");
}

// ─────────────────────────── scoping & variables ─────────────────────────

#[test]
fn assigning_undeclared_variable_fails() {
    let (_, err) = run_err("x = 1;");
    assert_eq!(err, "Undefined variable 'x'.\n[line 1]");
}

#[test]
fn declare_then_assign_is_visible_in_nested_scope() {
    assert_eq!(
        run_ok("var x = 1; x = 2; { print x; x = 3; } print x;"),
        "2\n3\n"
    );
}

#[test]
fn block_locals_do_not_leak() {
    let (output, err) = run_err("{ var x = 1; print x; } print x;");
    assert_eq!(output, "1\n");
    assert!(err.contains("Undefined variable 'x'."));
}

#[test]
fn shadowing_inside_block() {
    assert_eq!(
        run_ok("var a = \"outer\"; { var a = \"inner\"; print a; } print a;"),
        "inner\nouter\n"
    );
}

#[test]
fn global_redeclaration_is_allowed() {
    assert_eq!(run_ok("var a = 1; var a = 2; print a;"), "2\n");
}

#[test]
fn resolved_reference_is_stable_across_later_shadowing() {
    // the classic resolver test: both calls must see the global, even
    // though a shadowing local appears between them
    let src = r#"
var a = "global";
{
  fun show() {
    print a;
  }

  show();
  var a = "block";
  show();
}
"#;

    assert_eq!(run_ok(src), "global\nglobal\n");
}

// ────────────────────────── functions & closures ─────────────────────────

#[test]
fn function_returns_nil_without_return() {
    assert_eq!(run_ok("fun f() {} print f();"), "nil\n");
}

#[test]
fn closures_capture_definition_environment() {
    let src = r#"
fun makeCounter() {
  var i = 0;
  fun count() {
    i = i + 1;
    print i;
  }
  return count;
}

var c1 = makeCounter();
var c2 = makeCounter();
c1();
c1();
c2();
"#;

    // two calls to makeCounter produce independent state
    assert_eq!(run_ok(src), "1\n2\n1\n");
}

#[test]
fn recursion_terminates_with_correct_value() {
    let src = r#"
fun fib(n) {
  if (n < 2) return n;
  return fib(n - 1) + fib(n - 2);
}

print fib(10);
"#;

    assert_eq!(run_ok(src), "55\n");
}

#[test]
fn return_unwinds_nested_blocks_and_loops() {
    let src = r#"
fun find() {
  var i = 0;
  while (true) {
    {
      if (i == 2) {
        return i;
      }
    }
    i = i + 1;
  }
}

print find();
print "after";
"#;

    // the statements after the early return inside the loop never run,
    // but execution continues normally at the call site
    assert_eq!(run_ok(src), "2\nafter\n");
}

#[test]
fn callable_display_forms() {
    assert_eq!(run_ok("fun f() {} print f; print clock;"), "<fn f>\n<native fn clock>\n");
}

#[test]
fn clock_returns_a_positive_number() {
    assert_eq!(run_ok("print clock() > 0;"), "true\n");
}

// ────────────────────────────── control flow ─────────────────────────────

#[test]
fn if_executes_exactly_one_branch() {
    assert_eq!(run_ok("if (1 < 2) print \"yes\"; else print \"no\";"), "yes\n");
    assert_eq!(run_ok("if (nil) print \"yes\"; else print \"no\";"), "no\n");
}

#[test]
fn while_reevaluates_condition() {
    assert_eq!(run_ok("var i = 3; while (i > 0) { print i; i = i - 1; }"), "3\n2\n1\n");
}

#[test]
fn for_loop_prints_each_iteration() {
    assert_eq!(
        run_ok("for (var i = 0; i < 3; i = i + 1) print i;"),
        "0\n1\n2\n"
    );
}

// ─────────────────────────────── errors ──────────────────────────────────

#[test]
fn comparison_requires_numbers() {
    let (_, err) = run_err("print 1 < \"a\";");
    assert!(err.starts_with("Operands must be numbers."));
}

#[test]
fn plus_rejects_mixed_operands() {
    let (_, err) = run_err("print 1 + \"a\";");
    assert!(err.starts_with("Operands must be two numbers or two strings."));
}

#[test]
fn unary_minus_requires_a_number() {
    let (_, err) = run_err("print -\"a\";");
    assert!(err.starts_with("Operand must be a number."));
}

#[test]
fn calling_a_non_callable_fails() {
    let (_, err) = run_err("123();");
    assert!(err.starts_with("Can only call functions."));
}

#[test]
fn arity_mismatch_names_both_counts() {
    let (_, err) = run_err("fun f(a, b) {} f(1);");
    assert!(err.starts_with("Expected 2 arguments but got 1."));
}

#[test]
fn runtime_error_halts_the_rest_of_the_run() {
    let (output, err) = run_err("print 1; nosuch; print 2;");

    assert_eq!(output, "1\n");
    assert_eq!(err, "Undefined variable 'nosuch'.\n[line 1]");
}

#[test]
fn runtime_error_reports_the_offending_line() {
    let (_, err) = run_err("var ok = 1;\nprint ok;\nprint missing;");
    assert!(err.ends_with("[line 3]"), "got: {}", err);
}

// ─────────────────────────── resolver errors ─────────────────────────────

#[test]
fn reading_local_in_its_own_initializer_is_static_error() {
    let errors = static_errors("var a = 1; { var a = a; }");

    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("own initializer"));
}

#[test]
fn top_level_return_is_static_error() {
    let errors = static_errors("return 1;");

    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("Cannot return from top-level code"));
}

#[test]
fn local_redeclaration_is_static_error() {
    let errors = static_errors("{ var a = 1; var a = 2; }");

    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("Already a variable with this name"));
}

#[test]
fn return_inside_nested_function_is_fine() {
    assert!(static_errors("fun f() { fun g() { return 1; } return g(); }").is_empty());
}
