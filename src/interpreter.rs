use std::rc::Rc;

use log::{debug, trace};

use crate::class::{Class, Instance};
use crate::environment::Environment;
use crate::error::Error;
use crate::function::Callable;
use crate::syntax::{Expr, LiteralValue, Stmt};
use crate::token::Token;
use crate::value::Value;

/// Source of the `clock()` built-in's wall-time reading. The core crate
/// never touches `std::time` directly -- the shipped binary wires in
/// `SystemClock`, tests wire in a deterministic fake (§4.5, §9).
pub trait ClockSource {
    fn now_millis(&self) -> f64;
}

/// Destination of the `print()` built-in's output. The core crate never
/// touches `std::io` directly -- the shipped binary wires in `StdoutSink`,
/// tests wire in an in-memory fake (§4.5, §9).
pub trait Sink {
    fn print_line(&self, line: &str);
}

/// The evaluator. Grounded on the teacher's `interpreter.rs` (`evaluate`/
/// `stringify`/`is_truthy`/`is_equal` shape), generalized from its
/// expression-only subset to the full statement/closure/class/`super`
/// semantics of §4.4, and rewritten to thread the environment as an explicit
/// parameter rather than mutable interpreter state (§9).
pub struct Interpreter {
    global: Rc<Environment>,
    #[allow(dead_code)]
    clock: Rc<dyn ClockSource>,
    #[allow(dead_code)]
    sink: Rc<dyn Sink>,
}

impl Interpreter {
    pub fn new(clock: Rc<dyn ClockSource>, sink: Rc<dyn Sink>) -> Self {
        let global = Environment::new_global();

        let clock_for_native = Rc::clone(&clock);
        global.define(
            "clock",
            Value::Callable(Callable::native("clock", 0, move |_args| Ok(Value::Number(clock_for_native.now_millis())))),
        );

        let sink_for_native = Rc::clone(&sink);
        global.define(
            "print",
            Value::Callable(Callable::native("print", 1, move |args| {
                sink_for_native.print_line(&args[0].to_string());
                Ok(Value::None)
            })),
        );

        Self { global, clock, sink }
    }

    pub fn global(&self) -> &Rc<Environment> {
        &self.global
    }

    /// Best-effort top-level execution (§7): each statement runs
    /// independently, a runtime error during one is collected rather than
    /// aborting the remaining statements. A `Return` that escapes every
    /// frame (i.e. a bare top-level `return`) is converted to a Runtime
    /// error at the `return` token's location.
    pub fn interpret(&self, statements: &[Stmt]) -> Vec<Error> {
        let mut errors = Vec::new();
        for stmt in statements {
            if let Err(err) = self.execute_stmt(stmt, &self.global) {
                errors.push(err.escaped_return());
            }
        }
        errors
    }

    pub fn execute_block(&self, statements: &[Stmt], env: &Rc<Environment>) -> Result<(), Error> {
        for stmt in statements {
            self.execute_stmt(stmt, env)?;
        }
        Ok(())
    }

    fn bind_name(&self, env: &Rc<Environment>, name: &Token, value: Value) -> Result<(), Error> {
        if env.is_global() {
            env.define(name.lexeme.clone(), value);
            Ok(())
        } else {
            env.declare(&name.lexeme, value, name.row, name.col)
        }
    }

    fn execute_stmt(&self, stmt: &Stmt, env: &Rc<Environment>) -> Result<(), Error> {
        trace!("execute_stmt {stmt:?}");
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr, env)?;
                Ok(())
            }
            Stmt::VarDecl(bindings) => {
                for binding in bindings {
                    let value = match &binding.initializer {
                        Some(init) => self.evaluate(init, env)?,
                        None => Value::None,
                    };
                    self.bind_name(env, &binding.name, value)?;
                }
                Ok(())
            }
            Stmt::Block(statements) => {
                let inner = Environment::child_of(env);
                self.execute_block(statements, &inner)
            }
            Stmt::If { cond, then_branch, else_branch } => {
                if self.evaluate(cond, env)?.is_truthy() {
                    self.execute_stmt(then_branch, env)
                } else if let Some(else_branch) = else_branch {
                    self.execute_stmt(else_branch, env)
                } else {
                    Ok(())
                }
            }
            Stmt::While { cond, body } => {
                while self.evaluate(cond, env)?.is_truthy() {
                    self.execute_stmt(body, env)?;
                }
                Ok(())
            }
            Stmt::FunctionDecl(decl) => {
                debug!("defining function {}", decl.name.lexeme);
                let callable = Value::Callable(Callable::user(Rc::clone(decl), Rc::clone(env)));
                self.bind_name(env, &decl.name, callable)
            }
            Stmt::Return { keyword, value } => {
                let value = match value {
                    Some(expr) => self.evaluate(expr, env)?,
                    None => Value::None,
                };
                Err(Error::Return { token: keyword.clone(), value })
            }
            Stmt::ClassDecl { name, superclass, methods } => {
                let superclass = match superclass {
                    Some(sc) => {
                        let value = env.get(&sc.name.lexeme, sc.hops.get(), sc.name.row, sc.name.col)?;
                        match value {
                            Value::Class(class) => Some(class),
                            _ => {
                                return Err(Error::runtime(
                                    sc.name.row,
                                    sc.name.col,
                                    format!("superclass '{}' is not a class", sc.name.lexeme),
                                ))
                            }
                        }
                    }
                    None => None,
                };
                let mut method_map = std::collections::HashMap::new();
                for method in methods {
                    debug!("defining method {}.{}", name.lexeme, method.name.lexeme);
                    method_map.insert(method.name.lexeme.clone(), Callable::user(Rc::clone(method), Rc::clone(env)));
                }
                let class = Rc::new(Class { name: name.lexeme.clone(), methods: method_map, superclass });
                self.bind_name(env, name, Value::Class(class))
            }
        }
    }

    fn evaluate(&self, expr: &Expr, env: &Rc<Environment>) -> Result<Value, Error> {
        match expr {
            Expr::Literal(literal) => Ok(literal_value(literal)),
            Expr::Variable(v) => env.get(&v.name.lexeme, v.hops.get(), v.name.row, v.name.col),
            Expr::Grouping(inner) => self.evaluate(inner, env),
            Expr::Unary { op, operand, is_postfix } => self.evaluate_unary(op, operand, *is_postfix, env),
            Expr::Binary { left, op, right } => {
                let left = self.evaluate(left, env)?;
                let right = self.evaluate(right, env)?;
                evaluate_binary(op, left, right)
            }
            Expr::Ternary { cond, then_branch, else_branch } => {
                if self.evaluate(cond, env)?.is_truthy() {
                    self.evaluate(then_branch, env)
                } else {
                    self.evaluate(else_branch, env)
                }
            }
            Expr::Assignment { lvalue, op, rvalue } => self.evaluate_assignment(lvalue, op.as_ref(), rvalue, env),
            Expr::Call { callee, args, paren } => self.evaluate_call(callee, args, paren, env),
            Expr::InstanceGet { instance, property } => {
                let value = self.evaluate(instance, env)?;
                match value {
                    Value::Instance(instance) => Instance::get(&instance, &property.lexeme, property.row, property.col),
                    other => Err(Error::runtime(
                        property.row,
                        property.col,
                        format!("cannot read property '{}' of {}", property.lexeme, other.type_name()),
                    )),
                }
            }
            Expr::ClassInstantiation { call } => self.evaluate_instantiation(call, env),
            Expr::This(this) => env.get("this", this.hops.get(), this.keyword.row, this.keyword.col),
            Expr::Super(sup) => self.evaluate_super(sup, env),
        }
    }

    fn evaluate_unary(&self, op: &Token, operand: &Expr, is_postfix: bool, env: &Rc<Environment>) -> Result<Value, Error> {
        use crate::token::TokenKind::*;
        match &op.kind {
            PlusPlus | MinusMinus => {
                let Expr::Variable(v) = operand else {
                    return Err(Error::runtime(op.row, op.col, "'++'/'--' require a variable operand"));
                };
                let old = env.get(&v.name.lexeme, v.hops.get(), v.name.row, v.name.col)?;
                let old_n = as_number(&old, op.row, op.col)?;
                let new_n = if matches!(op.kind, PlusPlus) { old_n + 1.0 } else { old_n - 1.0 };
                let new_value = Value::Number(new_n);
                env.assign(&v.name.lexeme, new_value.clone(), v.hops.get(), v.name.row, v.name.col)?;
                Ok(if is_postfix { old } else { new_value })
            }
            Minus => {
                let value = self.evaluate(operand, env)?;
                Ok(Value::Number(-as_number(&value, op.row, op.col)?))
            }
            Plus => {
                let value = self.evaluate(operand, env)?;
                Ok(Value::Number(as_number(&value, op.row, op.col)?))
            }
            Bang => {
                let value = self.evaluate(operand, env)?;
                Ok(Value::Bool(!value.is_truthy()))
            }
            other => unreachable!("parser never produces a unary op of kind {other:?}"),
        }
    }

    /// `op` is the compound operator (`+`/`-`/`*`/`/`) when this assignment
    /// came from `x op= e`; the lvalue's current value is then read exactly
    /// once and combined with the freshly evaluated `rvalue` before the
    /// single write -- `instance` (for an `InstanceGet` lvalue) is likewise
    /// evaluated exactly once regardless of `op`, since `rvalue` no longer
    /// embeds a second copy of it (see `Expr::Assignment`'s doc comment).
    fn evaluate_assignment(&self, lvalue: &Expr, op: Option<&Token>, rvalue: &Expr, env: &Rc<Environment>) -> Result<Value, Error> {
        match lvalue {
            Expr::Variable(v) => {
                let value = match op {
                    Some(op) => {
                        let old = env.get(&v.name.lexeme, v.hops.get(), v.name.row, v.name.col)?;
                        let rhs = self.evaluate(rvalue, env)?;
                        evaluate_binary(op, old, rhs)?
                    }
                    None => self.evaluate(rvalue, env)?,
                };
                env.assign(&v.name.lexeme, value.clone(), v.hops.get(), v.name.row, v.name.col)?;
                Ok(value)
            }
            Expr::InstanceGet { instance, property } => {
                let target = self.evaluate(instance, env)?;
                let Value::Instance(instance) = target else {
                    return Err(Error::runtime(
                        property.row,
                        property.col,
                        format!("cannot set property '{}' on {}", property.lexeme, target.type_name()),
                    ));
                };
                let value = match op {
                    Some(op) => {
                        let old = Instance::get(&instance, &property.lexeme, property.row, property.col)?;
                        let rhs = self.evaluate(rvalue, env)?;
                        evaluate_binary(op, old, rhs)?
                    }
                    None => self.evaluate(rvalue, env)?,
                };
                instance.borrow_mut().set(&property.lexeme, value.clone());
                Ok(value)
            }
            other => {
                let (row, col) = other.loc();
                Err(Error::runtime(row, col, "invalid assignment target"))
            }
        }
    }

    fn evaluate_call(&self, callee: &Expr, args: &[Expr], paren: &Token, env: &Rc<Environment>) -> Result<Value, Error> {
        let callee_value = self.evaluate(callee, env)?;
        match callee_value {
            Value::Callable(callable) => {
                if callable.arity() != args.len() {
                    return Err(Error::runtime(
                        paren.row,
                        paren.col,
                        format!("expected {} arguments but got {}", callable.arity(), args.len()),
                    ));
                }
                let mut arguments = Vec::with_capacity(args.len());
                for arg in args {
                    arguments.push(self.evaluate(arg, env)?);
                }
                callable.call(self, &arguments)
            }
            Value::Class(_) => Err(Error::runtime(paren.row, paren.col, "can only be instantiated using the 'new' operator")),
            other => Err(Error::runtime(paren.row, paren.col, format!("{} is not callable", other.type_name()))),
        }
    }

    fn evaluate_instantiation(&self, call: &Expr, env: &Rc<Environment>) -> Result<Value, Error> {
        let Expr::Call { callee, args, paren } = call else {
            unreachable!("parser only ever wraps a Call expression in ClassInstantiation");
        };
        let class_value = self.evaluate(callee, env)?;
        let Value::Class(class) = class_value else {
            return Err(Error::runtime(paren.row, paren.col, format!("{} is not a class", class_value.type_name())));
        };
        if args.len() != class.constructor_arity() {
            return Err(Error::runtime(
                paren.row,
                paren.col,
                format!("expected {} arguments but got {}", class.constructor_arity(), args.len()),
            ));
        }
        let mut arguments = Vec::with_capacity(args.len());
        for arg in args {
            arguments.push(self.evaluate(arg, env)?);
        }
        let instance = Instance::new(Rc::clone(&class));
        if let Some(constructor) = class.find_method("constructor") {
            let bound = constructor.bind(Rc::clone(&instance));
            bound.call(self, &arguments)?;
        }
        Ok(Value::Instance(instance))
    }

    fn evaluate_super(&self, sup: &crate::syntax::SuperExpr, env: &Rc<Environment>) -> Result<Value, Error> {
        let this = env.get("this", sup.hops.get(), sup.keyword.row, sup.keyword.col)?;
        let Value::Instance(instance) = this else {
            return Err(Error::runtime(sup.keyword.row, sup.keyword.col, "'super' used outside a method"));
        };
        let class = Rc::clone(&instance.borrow().class);
        let superclass = class
            .superclass
            .as_ref()
            .ok_or_else(|| Error::runtime(sup.keyword.row, sup.keyword.col, "class has no superclass"))?;
        let method = superclass.find_method(&sup.method.lexeme).ok_or_else(|| {
            Error::runtime(sup.method.row, sup.method.col, format!("undefined property '{}'", sup.method.lexeme))
        })?;
        Ok(Value::Callable(method.bind(instance)))
    }
}

fn literal_value(literal: &LiteralValue) -> Value {
    match literal {
        LiteralValue::Number(n) => Value::Number(*n),
        LiteralValue::String(s) => Value::String(Rc::clone(s)),
        LiteralValue::Bool(b) => Value::Bool(*b),
        LiteralValue::None => Value::None,
    }
}

fn as_number(value: &Value, row: u32, col: u32) -> Result<f64, Error> {
    match value {
        Value::Number(n) => Ok(*n),
        other => Err(Error::runtime(row, col, format!("expected a number, found {}", other.type_name()))),
    }
}

fn evaluate_binary(op: &Token, left: Value, right: Value) -> Result<Value, Error> {
    use crate::token::TokenKind::*;
    match &op.kind {
        Plus => match (&left, &right) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
            (Value::String(a), Value::String(b)) => Ok(Value::String(Rc::from(format!("{a}{b}")))),
            _ => Err(Error::runtime(op.row, op.col, format!("cannot add {} and {}", left.type_name(), right.type_name()))),
        },
        Minus => Ok(Value::Number(as_number(&left, op.row, op.col)? - as_number(&right, op.row, op.col)?)),
        Star => Ok(Value::Number(as_number(&left, op.row, op.col)? * as_number(&right, op.row, op.col)?)),
        Slash => Ok(Value::Number(as_number(&left, op.row, op.col)? / as_number(&right, op.row, op.col)?)),
        Caret => Ok(Value::Number(as_number(&left, op.row, op.col)?.powf(as_number(&right, op.row, op.col)?))),
        Less => Ok(Value::Bool(as_number(&left, op.row, op.col)? < as_number(&right, op.row, op.col)?)),
        LessEqual => Ok(Value::Bool(as_number(&left, op.row, op.col)? <= as_number(&right, op.row, op.col)?)),
        Greater => Ok(Value::Bool(as_number(&left, op.row, op.col)? > as_number(&right, op.row, op.col)?)),
        GreaterEqual => Ok(Value::Bool(as_number(&left, op.row, op.col)? >= as_number(&right, op.row, op.col)?)),
        EqualEqual => Ok(Value::Bool(left.equals(&right))),
        BangEqual => Ok(Value::Bool(!left.equals(&right))),
        other => unreachable!("parser never produces a binary op of kind {other:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use crate::parser::Parser;
    use crate::resolver::Resolver;
    use std::cell::RefCell as StdRefCell;

    struct FixedClock(f64);
    impl ClockSource for FixedClock {
        fn now_millis(&self) -> f64 {
            self.0
        }
    }

    struct CapturingSink {
        lines: StdRefCell<Vec<String>>,
    }
    impl Sink for CapturingSink {
        fn print_line(&self, line: &str) {
            self.lines.borrow_mut().push(line.to_string());
        }
    }

    fn run(source: &str) -> Vec<String> {
        let (tokens, lex_errors) = Lexer::new(source).scan_tokens();
        assert!(lex_errors.is_empty(), "{lex_errors:?}");
        let (statements, parse_errors) = Parser::new(tokens).parse();
        assert!(parse_errors.is_empty(), "{parse_errors:?}");
        let resolve_errors = Resolver::new().resolve(&statements);
        assert!(resolve_errors.is_empty(), "{resolve_errors:?}");

        let sink = Rc::new(CapturingSink { lines: StdRefCell::new(Vec::new()) });
        let interpreter = Interpreter::new(Rc::new(FixedClock(1000.0)), Rc::clone(&sink) as Rc<dyn Sink>);
        let errors = interpreter.interpret(&statements);
        assert!(errors.is_empty(), "{errors:?}");
        sink.lines.borrow().clone()
    }

    #[test]
    fn arithmetic_and_print() {
        assert_eq!(run("let a = 1; let b = 2; print(a + b);"), vec!["3"]);
    }

    #[test]
    fn function_call() {
        assert_eq!(run("function add(x,y){ return x+y; } print(add(40,2));"), vec!["42"]);
    }

    #[test]
    fn closure_captures_live_variable() {
        let source = "let c = 0; function mk(){ let x = 10; function get(){ return x; } x = x + 1; return get; } print(mk()());";
        assert_eq!(run(source), vec!["11"]);
    }

    #[test]
    fn method_binding_and_construction() {
        let source = r#"class Car { constructor(n){ this.n = n; } name(){ return this.n; } } let r = new Car("F1"); print(r.name());"#;
        assert_eq!(run(source), vec!["F1"]);
    }

    #[test]
    fn inheritance_and_super() {
        let source = r#"class A { greet(){ return "A"; } } class B extends A { greet(){ return super.greet() + "B"; } } print(new B().greet());"#;
        assert_eq!(run(source), vec!["AB"]);
    }

    #[test]
    fn while_loop_prints_each_iteration() {
        assert_eq!(run("let i = 0; while (i < 3) { print(i); i = i + 1; }"), vec!["0", "1", "2"]);
    }

    #[test]
    fn shadowing_prints_inner_then_outer() {
        assert_eq!(run("{ let a=1; { let a=2; print(a); } print(a); }"), vec!["2", "1"]);
    }

    #[test]
    fn assignment_expression_evaluates_to_assigned_value() {
        assert_eq!(run("let a=0; print(a=5);"), vec!["5"]);
    }

    #[test]
    fn clock_reads_injected_source() {
        assert_eq!(run("print(clock());"), vec!["1000"]);
    }

    #[test]
    fn undefined_global_read_is_runtime_error() {
        let (tokens, _) = Lexer::new("print(z);").scan_tokens();
        let (statements, _) = Parser::new(tokens).parse();
        Resolver::new().resolve(&statements);
        let sink = Rc::new(CapturingSink { lines: StdRefCell::new(Vec::new()) });
        let interpreter = Interpreter::new(Rc::new(FixedClock(0.0)), sink);
        let errors = interpreter.interpret(&statements);
        assert_eq!(errors.len(), 1);
        assert!(matches!(&errors[0], Error::Runtime { message, .. } if message.contains("undefined variable 'z'")));
    }

    #[test]
    fn arity_mismatch_is_runtime_error_and_skips_body() {
        let sink = Rc::new(CapturingSink { lines: StdRefCell::new(Vec::new()) });
        let (tokens, _) = Lexer::new("function f(x){ print(x); } f();").scan_tokens();
        let (statements, _) = Parser::new(tokens).parse();
        Resolver::new().resolve(&statements);
        let interpreter = Interpreter::new(Rc::new(FixedClock(0.0)), Rc::clone(&sink) as Rc<dyn Sink>);
        let errors = interpreter.interpret(&statements);
        assert_eq!(errors.len(), 1);
        assert!(sink.lines.borrow().is_empty());
    }

    #[test]
    fn instantiating_a_class_without_new_is_runtime_error() {
        let (tokens, _) = Lexer::new("class A {} A();").scan_tokens();
        let (statements, _) = Parser::new(tokens).parse();
        Resolver::new().resolve(&statements);
        let sink = Rc::new(CapturingSink { lines: StdRefCell::new(Vec::new()) });
        let interpreter = Interpreter::new(Rc::new(FixedClock(0.0)), sink);
        let errors = interpreter.interpret(&statements);
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn constructor_arity_mismatch_is_runtime_error_and_skips_construction() {
        let source = r#"class Car { constructor(n) { this.n = n; } } new Car();"#;
        let (tokens, _) = Lexer::new(source).scan_tokens();
        let (statements, _) = Parser::new(tokens).parse();
        Resolver::new().resolve(&statements);
        let sink = Rc::new(CapturingSink { lines: StdRefCell::new(Vec::new()) });
        let interpreter = Interpreter::new(Rc::new(FixedClock(0.0)), sink);
        let errors = interpreter.interpret(&statements);
        assert_eq!(errors.len(), 1);
        assert!(matches!(&errors[0], Error::Runtime { message, .. } if message.contains("expected 1 arguments but got 0")));
    }

    #[test]
    fn class_call_without_new_does_not_evaluate_arguments() {
        let source = "class A {} print(A(z));";
        let (tokens, _) = Lexer::new(source).scan_tokens();
        let (statements, _) = Parser::new(tokens).parse();
        Resolver::new().resolve(&statements);
        let sink = Rc::new(CapturingSink { lines: StdRefCell::new(Vec::new()) });
        let interpreter = Interpreter::new(Rc::new(FixedClock(0.0)), Rc::clone(&sink) as Rc<dyn Sink>);
        let errors = interpreter.interpret(&statements);
        assert_eq!(errors.len(), 1);
        assert!(
            matches!(&errors[0], Error::Runtime { message, .. } if message.contains("can only be instantiated using the 'new' operator"))
        );
        assert!(sink.lines.borrow().is_empty());
    }

    #[test]
    fn function_arity_mismatch_does_not_evaluate_arguments() {
        let source = "function f(x) { return x; } f(print(1), print(2));";
        let (tokens, _) = Lexer::new(source).scan_tokens();
        let (statements, _) = Parser::new(tokens).parse();
        Resolver::new().resolve(&statements);
        let sink = Rc::new(CapturingSink { lines: StdRefCell::new(Vec::new()) });
        let interpreter = Interpreter::new(Rc::new(FixedClock(0.0)), Rc::clone(&sink) as Rc<dyn Sink>);
        let errors = interpreter.interpret(&statements);
        assert_eq!(errors.len(), 1);
        assert!(sink.lines.borrow().is_empty());
    }

    #[test]
    fn compound_assignment_on_instance_field_evaluates_instance_once() {
        let source = r#"
            let calls = 0;
            function make() { calls = calls + 1; let o = new Counter(); return o; }
            class Counter { constructor() { this.n = 10; } }
            make().n += 5;
            print(calls);
        "#;
        assert_eq!(run(source), vec!["1"]);
    }
}
