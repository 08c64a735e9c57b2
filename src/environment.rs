use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::Error;
use crate::value::Value;

/// A single link in the lexical scope chain. Grounded on the teacher's
/// `Rc<RefCell<Environment>>`/`from`/`define`/`get`/`assign` shape, with the
/// `RefCell` pushed down to the value map (see DESIGN.md) so multiple `Rc`
/// holders -- closures, bound methods, in-flight call frames -- can share a
/// node without wrapping the whole struct in a second layer of interior
/// mutability.
pub struct Environment {
    values: RefCell<HashMap<String, Value>>,
    parent: Option<Rc<Environment>>,
}

impl Environment {
    pub fn new_global() -> Rc<Self> {
        Rc::new(Self { values: RefCell::new(HashMap::new()), parent: None })
    }

    pub fn child_of(parent: &Rc<Environment>) -> Rc<Self> {
        Rc::new(Self { values: RefCell::new(HashMap::new()), parent: Some(Rc::clone(parent)) })
    }

    /// Binds `name` in this environment, unconditionally overwriting any
    /// existing binding of the same name in this scope. Used for the global
    /// scope's built-ins and for a fresh declaration whose no-redeclare check
    /// (`declare`) has already passed.
    pub fn define(&self, name: impl Into<String>, value: Value) {
        self.values.borrow_mut().insert(name.into(), value);
    }

    /// Declares `name` in this (non-global) scope, rejecting a redeclaration
    /// of an already-bound name -- the runtime half of the no-shadowing
    /// invariant from §3 (the resolver's `declare`/`define` bookkeeping only
    /// catches self-referential initializers, not this).
    pub fn declare(&self, name: &str, value: Value, row: u32, col: u32) -> Result<(), Error> {
        if self.values.borrow().contains_key(name) {
            return Err(Error::runtime(row, col, format!("redeclaration of variable '{name}'")));
        }
        self.values.borrow_mut().insert(name.to_string(), value);
        Ok(())
    }

    /// Whether this node is the root of its chain -- used by the evaluator
    /// to decide between `Environment::define` (global scope: silently
    /// overwrites, since re-running/re-declaring a top-level name is not an
    /// error) and `Environment::declare` (every other scope: rejects
    /// redeclaration per §3).
    pub fn is_global(&self) -> bool {
        self.parent.is_none()
    }

    fn ancestor(&self, hops: u32) -> &Environment {
        let mut env = self;
        for _ in 0..hops {
            env = env.parent.as_deref().expect("resolver-recorded hops outran the live chain");
        }
        env
    }

    fn root(&self) -> &Environment {
        let mut env = self;
        while let Some(parent) = env.parent.as_deref() {
            env = parent;
        }
        env
    }

    /// Reads `name`, honoring a resolver-recorded `hops` count if given,
    /// otherwise walking straight to the root (global) scope, per §4.4.
    pub fn get(&self, name: &str, hops: Option<u32>, row: u32, col: u32) -> Result<Value, Error> {
        let target = match hops {
            Some(hops) => self.ancestor(hops),
            None => self.root(),
        };
        target
            .values
            .borrow()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::runtime(row, col, format!("undefined variable '{name}'")))
    }

    /// Writes `name`, honoring `hops` exactly as `get` does. Assigning a
    /// name that isn't bound at the target scope is a Runtime error, even if
    /// it happens to be bound somewhere else in the chain -- the node's
    /// `hops` (or lack thereof) commits to a single scope.
    pub fn assign(&self, name: &str, value: Value, hops: Option<u32>, row: u32, col: u32) -> Result<(), Error> {
        let target = match hops {
            Some(hops) => self.ancestor(hops),
            None => self.root(),
        };
        let mut values = target.values.borrow_mut();
        if values.contains_key(name) {
            values.insert(name.to_string(), value);
            Ok(())
        } else {
            Err(Error::runtime(row, col, format!("undefined variable '{name}'")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_reads_through_parent() {
        let global = Environment::new_global();
        global.define("x", Value::Number(1.0));
        let child = Environment::child_of(&global);
        assert!(matches!(child.get("x", None, 0, 0), Ok(Value::Number(n)) if n == 1.0));
    }

    #[test]
    fn assign_with_hops_targets_exact_ancestor() {
        let global = Environment::new_global();
        global.define("x", Value::Number(1.0));
        let child = Environment::child_of(&global);
        child.define("x", Value::Number(2.0));
        child.assign("x", Value::Number(3.0), Some(1), 0, 0).unwrap();
        assert!(matches!(child.get("x", Some(0), 0, 0), Ok(Value::Number(n)) if n == 2.0));
        assert!(matches!(global.get("x", None, 0, 0), Ok(Value::Number(n)) if n == 3.0));
    }

    #[test]
    fn declare_rejects_redeclaration_in_same_scope() {
        let global = Environment::new_global();
        global.define("x", Value::Number(1.0));
        assert!(global.declare("x", Value::Number(2.0), 1, 1).is_err());
    }

    #[test]
    fn assigning_unbound_global_is_undefined_variable_error() {
        let global = Environment::new_global();
        let err = global.assign("z", Value::Number(1.0), None, 3, 4).unwrap_err();
        assert!(matches!(err, Error::Runtime { row: 3, col: 4, .. }));
    }
}
