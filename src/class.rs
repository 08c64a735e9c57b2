use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::error::Error;
use crate::function::Callable;
use crate::value::Value;

/// A class value: an ordered list of methods plus an optional superclass.
/// Grounded on the teacher's `LoxClass` (`find_method` shape), extended with
/// the `superclass` link and transitive lookup required by §4.4.
#[derive(Debug)]
pub struct Class {
    pub name: String,
    pub methods: HashMap<String, Callable>,
    pub superclass: Option<Rc<Class>>,
}

impl Class {
    /// Looks up `name` in this class's own methods, falling through to the
    /// superclass chain if absent.
    pub fn find_method(&self, name: &str) -> Option<&Callable> {
        self.methods.get(name).or_else(|| self.superclass.as_ref().and_then(|sc| sc.find_method(name)))
    }

    /// Arity of the constructor method (named `constructor`), or 0 if the
    /// class has none.
    pub fn constructor_arity(&self) -> usize {
        self.find_method("constructor").map(Callable::arity).unwrap_or(0)
    }
}

impl fmt::Display for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<class {}>", self.name)
    }
}

/// An instance's per-value field map plus a reference to its class. The
/// instance stores state; the class stores behavior (teacher's own
/// `class.rs` comment, kept verbatim as the organizing idea here).
#[derive(Debug)]
pub struct Instance {
    pub class: Rc<Class>,
    fields: HashMap<String, Value>,
}

impl Instance {
    pub fn new(class: Rc<Class>) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self { class, fields: HashMap::new() }))
    }

    /// Fields shadow methods: an instance field named the same as a method
    /// is returned before any method lookup is attempted.
    pub fn get(self_rc: &Rc<RefCell<Self>>, name: &str, row: u32, col: u32) -> Result<Value, Error> {
        let this = self_rc.borrow();
        if let Some(field) = this.fields.get(name) {
            return Ok(field.clone());
        }
        if let Some(method) = this.class.find_method(name) {
            return Ok(Value::Callable(method.bind(Rc::clone(self_rc))));
        }
        Err(Error::runtime(row, col, format!("undefined property '{name}'")))
    }

    /// Lox instances admit freely creating new fields, so `set` never checks
    /// for a prior binding.
    pub fn set(&mut self, name: &str, value: Value) {
        self.fields.insert(name.to_string(), value);
    }
}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<instance {}>", self.class.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_class(name: &str, superclass: Option<Rc<Class>>) -> Rc<Class> {
        Rc::new(Class { name: name.to_string(), methods: HashMap::new(), superclass })
    }

    #[test]
    fn find_method_falls_through_to_superclass() {
        let base = empty_class("A", None);
        let derived = empty_class("B", Some(base));
        assert!(derived.find_method("missing").is_none());
    }

    #[test]
    fn constructor_arity_defaults_to_zero() {
        let class = empty_class("A", None);
        assert_eq!(class.constructor_arity(), 0);
    }

    #[test]
    fn unknown_field_and_method_is_undefined_property_error() {
        let class = empty_class("A", None);
        let instance = Instance::new(class);
        let err = Instance::get(&instance, "missing", 5, 6).unwrap_err();
        assert!(matches!(err, Error::Runtime { row: 5, col: 6, .. }));
    }
}
