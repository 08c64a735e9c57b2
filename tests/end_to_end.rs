use std::cell::RefCell;
use std::rc::Rc;

use tsalox::error::Error;
use tsalox::interpreter::{ClockSource, Sink};

struct FixedClock(f64);

impl ClockSource for FixedClock {
    fn now_millis(&self) -> f64 {
        self.0
    }
}

#[derive(Default)]
struct CapturingSink {
    lines: RefCell<Vec<String>>,
}

impl Sink for CapturingSink {
    fn print_line(&self, line: &str) {
        self.lines.borrow_mut().push(line.to_string());
    }
}

fn run(source: &str) -> (Vec<String>, Vec<Error>) {
    let sink = Rc::new(CapturingSink::default());
    let errors = tsalox::run_with(source, Rc::new(FixedClock(1_000.0)), Rc::clone(&sink) as Rc<dyn Sink>);
    (sink.lines.borrow().clone(), errors)
}

#[test]
fn arithmetic_and_print() {
    let (lines, errors) = run("let a = 1; let b = 2; print(a + b);");
    assert!(errors.is_empty(), "{errors:?}");
    assert_eq!(lines, vec!["3"]);
}

#[test]
fn function_call_and_return() {
    let (lines, errors) = run("function add(x, y) { return x + y; } print(add(40, 2));");
    assert!(errors.is_empty(), "{errors:?}");
    assert_eq!(lines, vec!["42"]);
}

#[test]
fn closure_captures_live_variable_not_a_snapshot() {
    let source = r#"
        function mk() {
            let x = 10;
            function get() { return x; }
            x = x + 1;
            return get;
        }
        print(mk()());
    "#;
    let (lines, errors) = run(source);
    assert!(errors.is_empty(), "{errors:?}");
    assert_eq!(lines, vec!["11"]);
}

#[test]
fn method_binding_and_construction() {
    let source = r#"
        class Car {
            constructor(name) { this.name = name; }
            name() { return this.name; }
        }
        let r = new Car("F1");
        print(r.name());
    "#;
    let (lines, errors) = run(source);
    assert!(errors.is_empty(), "{errors:?}");
    assert_eq!(lines, vec!["F1"]);
}

#[test]
fn inheritance_and_super_call() {
    let source = r#"
        class A { greet() { return "A"; } }
        class B extends A { greet() { return super.greet() + "B"; } }
        print(new B().greet());
    "#;
    let (lines, errors) = run(source);
    assert!(errors.is_empty(), "{errors:?}");
    assert_eq!(lines, vec!["AB"]);
}

#[test]
fn while_loop_and_shadowing() {
    let source = r#"
        let i = 0;
        while (i < 3) { print(i); i = i + 1; }
        { let i = 99; print(i); }
        print(i);
    "#;
    let (lines, errors) = run(source);
    assert!(errors.is_empty(), "{errors:?}");
    assert_eq!(lines, vec!["0", "1", "2", "99", "3"]);
}

#[test]
fn clock_reads_the_injected_source_not_the_system_clock() {
    let (lines, errors) = run("print(clock());");
    assert!(errors.is_empty(), "{errors:?}");
    assert_eq!(lines, vec!["1000"]);
}

#[test]
fn undefined_variable_read_is_reported_as_runtime_error() {
    let (lines, errors) = run("print(z);");
    assert!(lines.is_empty());
    assert_eq!(errors.len(), 1);
    assert!(matches!(&errors[0], Error::Runtime { message, .. } if message.contains("undefined variable 'z'")));
}

#[test]
fn self_referential_initializer_is_reported_as_syntax_error_before_running() {
    let (lines, errors) = run("{ let a = a; }");
    assert!(lines.is_empty());
    assert_eq!(errors.len(), 1);
    assert!(matches!(&errors[0], Error::Syntax { .. }));
}

#[test]
fn a_runtime_error_in_one_top_level_statement_does_not_stop_the_next() {
    let source = r#"
        print(1);
        print(missing);
        print(2);
    "#;
    let (lines, errors) = run(source);
    assert_eq!(lines, vec!["1", "2"]);
    assert_eq!(errors.len(), 1);
}

#[test]
fn instantiating_with_the_wrong_constructor_arity_is_a_runtime_error() {
    let source = r#"
        class Car { constructor(name) { this.name = name; } }
        new Car();
    "#;
    let (lines, errors) = run(source);
    assert!(lines.is_empty());
    assert_eq!(errors.len(), 1);
    assert!(matches!(&errors[0], Error::Runtime { message, .. } if message.contains("expected 1 arguments but got 0")));
}
