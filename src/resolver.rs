use std::collections::HashMap;

use log::trace;

use crate::error::Error;
use crate::syntax::{Expr, Stmt, VariableExpr};

/// Tracks whether the code currently being resolved is inside a function body
/// (and whether that function is a method), so `return` placement and future
/// diagnostics can take context into account. Mirrors the teacher's own
/// `FunctionType` enum shape.
#[derive(Debug, Clone, Copy, PartialEq)]
enum FunctionType {
    None,
    Function,
    Method,
}

/// Scope-stack walker. Each scope maps name -> defined. Grounded on the
/// teacher's `declare`/`define`/`begin_scope`/`end_scope`/`resolve_local`
/// shape, combined with `exicx-rlox`'s in-node depth storage (realized here as
/// `Cell` writes on the AST node rather than a `&mut` tree walk).
pub struct Resolver {
    scopes: Vec<HashMap<String, bool>>,
    current_function: FunctionType,
    errors: Vec<Error>,
}

impl Resolver {
    pub fn new() -> Self {
        Self { scopes: Vec::new(), current_function: FunctionType::None, errors: Vec::new() }
    }

    pub fn resolve(mut self, statements: &[Stmt]) -> Vec<Error> {
        for stmt in statements {
            self.resolve_stmt(stmt);
        }
        self.errors
    }

    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn end_scope(&mut self) {
        self.scopes.pop();
    }

    fn declare(&mut self, name: &str) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), false);
        }
    }

    fn define(&mut self, name: &str) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), true);
        }
    }

    /// Records `hops` on the reference node if a defining scope is found;
    /// leaves it `None` otherwise, meaning "resolve against the global scope"
    /// at evaluation time. The error location is a placeholder (0, 0); callers
    /// relocate it to the reference token's actual position via `relocate`.
    fn resolve_local(
        &self,
        hops_slot: &std::cell::Cell<Option<u32>>,
        name: &str,
    ) -> Result<(), Error> {
        if let Some(top) = self.scopes.last() {
            if top.get(name) == Some(&false) {
                return Err(Error::syntax(0, 0, "cannot use same variable for initialization"));
            }
        }
        for (depth, scope) in self.scopes.iter().rev().enumerate() {
            if scope.get(name) == Some(&true) {
                hops_slot.set(Some(depth as u32));
                return Ok(());
            }
        }
        Ok(())
    }

    fn resolve_stmt(&mut self, stmt: &Stmt) {
        trace!("resolve_stmt {stmt:?}");
        match stmt {
            Stmt::Expression(expr) => self.resolve_expr(expr),
            Stmt::VarDecl(bindings) => {
                for binding in bindings {
                    self.declare(&binding.name.lexeme);
                    if let Some(init) = &binding.initializer {
                        self.resolve_expr(init);
                    }
                    self.define(&binding.name.lexeme);
                }
            }
            Stmt::Block(statements) => {
                self.begin_scope();
                for s in statements {
                    self.resolve_stmt(s);
                }
                self.end_scope();
            }
            Stmt::If { cond, then_branch, else_branch } => {
                self.resolve_expr(cond);
                self.resolve_stmt(then_branch);
                if let Some(else_branch) = else_branch {
                    self.resolve_stmt(else_branch);
                }
            }
            Stmt::While { cond, body } => {
                self.resolve_expr(cond);
                self.resolve_stmt(body);
            }
            Stmt::FunctionDecl(decl) => {
                self.define(&decl.name.lexeme);
                self.resolve_function(&decl.params, &decl.body, FunctionType::Function);
            }
            Stmt::Return { keyword: _, value } => {
                if let Some(value) = value {
                    self.resolve_expr(value);
                }
            }
            Stmt::ClassDecl { name, superclass, methods } => {
                self.define(&name.lexeme);
                if let Some(superclass) = superclass {
                    self.resolve_variable(superclass);
                }
                self.begin_scope();
                self.define("this");
                for method in methods {
                    self.resolve_function(&method.params, &method.body, FunctionType::Method);
                }
                self.end_scope();
            }
        }
    }

    fn resolve_function(&mut self, params: &[crate::token::Token], body: &[Stmt], kind: FunctionType) {
        let enclosing = self.current_function;
        self.current_function = kind;
        self.begin_scope();
        for param in params {
            self.define(&param.lexeme);
        }
        for stmt in body {
            self.resolve_stmt(stmt);
        }
        self.end_scope();
        self.current_function = enclosing;
    }

    fn resolve_variable(&mut self, variable: &VariableExpr) {
        if let Err(err) = self.resolve_local(&variable.hops, &variable.name.lexeme) {
            self.errors.push(relocate(err, variable.name.row, variable.name.col));
        }
    }

    fn resolve_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Literal(_) => {}
            Expr::Variable(v) => self.resolve_variable(v),
            Expr::Grouping(inner) => self.resolve_expr(inner),
            Expr::Unary { operand, .. } => self.resolve_expr(operand),
            Expr::Binary { left, right, .. } => {
                self.resolve_expr(left);
                self.resolve_expr(right);
            }
            Expr::Ternary { cond, then_branch, else_branch } => {
                self.resolve_expr(cond);
                self.resolve_expr(then_branch);
                self.resolve_expr(else_branch);
            }
            Expr::Assignment { lvalue, rvalue, .. } => {
                match lvalue.as_ref() {
                    Expr::Variable(v) => self.resolve_variable(v),
                    Expr::InstanceGet { instance, .. } => self.resolve_expr(instance),
                    _ => {}
                }
                self.resolve_expr(rvalue);
            }
            Expr::Call { callee, args, .. } => {
                self.resolve_expr(callee);
                for arg in args {
                    self.resolve_expr(arg);
                }
            }
            Expr::InstanceGet { instance, .. } => self.resolve_expr(instance),
            Expr::ClassInstantiation { call } => self.resolve_expr(call),
            Expr::This(this) => {
                if let Err(err) = self.resolve_local(&this.hops, "this") {
                    self.errors.push(relocate(err, this.keyword.row, this.keyword.col));
                }
            }
            Expr::Super(sup) => {
                if let Err(err) = self.resolve_local(&sup.hops, "this") {
                    self.errors.push(relocate(err, sup.keyword.row, sup.keyword.col));
                }
            }
        }
    }
}

fn relocate(err: Error, row: u32, col: u32) -> Error {
    match err {
        Error::Syntax { message, .. } => Error::syntax(row, col, message),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use crate::parser::Parser;

    fn resolve(source: &str) -> Vec<Error> {
        let (tokens, _) = Lexer::new(source).scan_tokens();
        let (stmts, _) = Parser::new(tokens).parse();
        Resolver::new().resolve(&stmts)
    }

    #[test]
    fn shadowed_variable_resolves_to_nearest_scope() {
        let source = "{ let a = 1; { let a = 2; print(a); } print(a); }";
        let errors = resolve(source);
        assert!(errors.is_empty(), "{errors:?}");
    }

    #[test]
    fn self_initialization_is_rejected() {
        let errors = resolve("{ let a = a; }");
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], Error::Syntax { .. }));
    }

    #[test]
    fn function_can_reference_itself_recursively() {
        let errors = resolve("function fact(n) { return fact(n); }");
        assert!(errors.is_empty(), "{errors:?}");
    }

    #[test]
    fn super_resolves_through_this_slot() {
        let source = "class A { m() { return 1; } } class B extends A { m() { return super.m(); } }";
        let errors = resolve(source);
        assert!(errors.is_empty(), "{errors:?}");
    }
}
