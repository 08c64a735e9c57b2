use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::class::Instance;
use crate::environment::Environment;
use crate::error::Error;
use crate::interpreter::Interpreter;
use crate::syntax::FunctionDecl;
use crate::value::Value;

/// `Callable::{Native, User}`, grounded on the teacher's `Function` enum
/// (`call`/`bind`/`arity`/`Display` shape). `Native` carries an
/// `Rc<dyn Fn(&[Value]) -> Result<Value, Error>>` instead of a bare function
/// pointer so `clock`/`print` can close over an injected `ClockSource`/`Sink`
/// (§4.5) rather than reaching for `SystemTime`/`stdout` directly.
#[derive(Clone)]
pub enum Callable {
    Native { name: &'static str, arity: usize, func: Rc<dyn Fn(&[Value]) -> Result<Value, Error>> },
    User { decl: Rc<FunctionDecl>, closure: Rc<Environment> },
}

impl Callable {
    pub fn native(
        name: &'static str,
        arity: usize,
        func: impl Fn(&[Value]) -> Result<Value, Error> + 'static,
    ) -> Self {
        Callable::Native { name, arity, func: Rc::new(func) }
    }

    pub fn user(decl: Rc<FunctionDecl>, closure: Rc<Environment>) -> Self {
        Callable::User { decl, closure }
    }

    pub fn arity(&self) -> usize {
        match self {
            Callable::Native { arity, .. } => *arity,
            Callable::User { decl, .. } => decl.params.len(),
        }
    }

    /// Invokes the callable. For a user function, a fresh call-frame
    /// environment is created as a child of the closure captured at creation
    /// (or bind) time, each parameter is defined there, and the body runs
    /// against it -- `interpreter.execute_block` takes the environment
    /// explicitly rather than mutating any process-wide "current" register
    /// (§4.4, §9).
    pub fn call(&self, interpreter: &Interpreter, arguments: &[Value]) -> Result<Value, Error> {
        match self {
            Callable::Native { func, .. } => func(arguments),
            Callable::User { decl, closure } => {
                let call_env = Environment::child_of(closure);
                for (param, arg) in decl.params.iter().zip(arguments.iter()) {
                    call_env.define(param.lexeme.clone(), arg.clone());
                }
                match interpreter.execute_block(&decl.body, &call_env) {
                    Err(Error::Return { value, .. }) => Ok(value),
                    Err(other) => Err(other),
                    Ok(()) => Ok(Value::None),
                }
            }
        }
    }

    /// Produces a method bound to `instance`: a thin environment holding
    /// `this`, layered once between the method's closure and each call
    /// frame created when the bound method is subsequently invoked (§4.4).
    pub fn bind(&self, instance: Rc<RefCell<Instance>>) -> Self {
        match self {
            Callable::Native { .. } => unreachable!("native functions are never bound to an instance"),
            Callable::User { decl, closure } => {
                let this_env = Environment::child_of(closure);
                this_env.define("this", Value::Instance(instance));
                Callable::User { decl: Rc::clone(decl), closure: this_env }
            }
        }
    }

    pub fn same_identity(&self, other: &Callable) -> bool {
        match (self, other) {
            (Callable::Native { func: a, .. }, Callable::Native { func: b, .. }) => Rc::ptr_eq(a, b),
            (Callable::User { decl: a, closure: ca }, Callable::User { decl: b, closure: cb }) => {
                Rc::ptr_eq(a, b) && Rc::ptr_eq(ca, cb)
            }
            _ => false,
        }
    }
}

impl fmt::Display for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callable::Native { name, .. } => write!(f, "<native fn {name}>"),
            Callable::User { decl, .. } => write!(f, "<fn {}>", decl.name.lexeme),
        }
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}
