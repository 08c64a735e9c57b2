use std::rc::Rc;

use crate::error::Error;
use crate::syntax::{
    Expr, FunctionDecl, LiteralValue, Stmt, SuperExpr, ThisExpr, VarBinding, VariableExpr,
};
use crate::token::{Token, TokenKind};

/// Recursive-descent parser, grounded on the teacher's `parser.rs` helper shape
/// (`matches!`/`consume`/`check`/`advance`/`synchronize`) with the grammar
/// re-derived for this language's ternary/power precedence levels and
/// `let`/`function`/`class ... extends`/`new` productions.
pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    errors: Vec<Error>,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, current: 0, errors: Vec::new() }
    }

    pub fn had_error(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn errors(&self) -> &[Error] {
        &self.errors
    }

    pub fn parse(mut self) -> (Vec<Stmt>, Vec<Error>) {
        let mut statements = Vec::new();
        while !self.is_at_end() {
            match self.statement() {
                Ok(stmt) => statements.push(stmt),
                Err(err) => {
                    self.errors.push(err);
                    self.synchronize();
                }
            }
        }
        (statements, self.errors)
    }

    // --- statements ---

    fn statement(&mut self) -> Result<Stmt, Error> {
        if self.matches(&[TokenKind::Class]) {
            return self.class_decl();
        }
        if self.matches(&[TokenKind::Function]) {
            return self.function_decl();
        }
        if self.matches(&[TokenKind::Return]) {
            return self.return_stmt();
        }
        if self.matches(&[TokenKind::While]) {
            return self.while_stmt();
        }
        if self.matches(&[TokenKind::If]) {
            return self.if_stmt();
        }
        if self.matches(&[TokenKind::LeftBrace]) {
            return Ok(Stmt::Block(self.block()?));
        }
        if self.matches(&[TokenKind::Let]) {
            return self.var_decl();
        }
        self.expr_stmt()
    }

    fn class_decl(&mut self) -> Result<Stmt, Error> {
        let name = self.consume_identifier("expected class name")?;
        let superclass = if self.matches(&[TokenKind::Extends]) {
            let super_name = self.consume_identifier("expected superclass name")?;
            Some(VariableExpr::new(super_name))
        } else {
            None
        };
        self.consume(TokenKind::LeftBrace, "expected '{' before class body")?;
        let mut methods = Vec::new();
        while !self.check(&TokenKind::RightBrace) && !self.is_at_end() {
            methods.push(Rc::new(self.method()?));
        }
        self.consume(TokenKind::RightBrace, "expected '}' after class body")?;
        Ok(Stmt::ClassDecl { name, superclass, methods })
    }

    fn method(&mut self) -> Result<FunctionDecl, Error> {
        let name = self.consume_identifier("expected method name")?;
        self.finish_function_decl(name)
    }

    fn function_decl(&mut self) -> Result<Stmt, Error> {
        let name = self.consume_identifier("expected function name")?;
        Ok(Stmt::FunctionDecl(Rc::new(self.finish_function_decl(name)?)))
    }

    fn finish_function_decl(&mut self, name: Token) -> Result<FunctionDecl, Error> {
        self.consume(TokenKind::LeftParen, "expected '(' after name")?;
        let mut params = Vec::new();
        if !self.check(&TokenKind::RightParen) {
            loop {
                params.push(self.consume_identifier("expected parameter name")?);
                if !self.matches(&[TokenKind::Comma]) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightParen, "expected ')' after parameters")?;
        self.consume(TokenKind::LeftBrace, "expected '{' before body")?;
        let body = self.block()?;
        Ok(FunctionDecl { name, params, body })
    }

    fn return_stmt(&mut self) -> Result<Stmt, Error> {
        let keyword = self.previous().clone();
        let value = if !self.check(&TokenKind::Semicolon) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(TokenKind::Semicolon, "expected ';' after return value")?;
        Ok(Stmt::Return { keyword, value })
    }

    fn while_stmt(&mut self) -> Result<Stmt, Error> {
        self.consume(TokenKind::LeftParen, "expected '(' after 'while'")?;
        let cond = self.expression()?;
        self.consume(TokenKind::RightParen, "expected ')' after condition")?;
        let body = Box::new(self.statement()?);
        Ok(Stmt::While { cond, body })
    }

    fn if_stmt(&mut self) -> Result<Stmt, Error> {
        self.consume(TokenKind::LeftParen, "expected '(' after 'if'")?;
        let cond = self.expression()?;
        self.consume(TokenKind::RightParen, "expected ')' after condition")?;
        let then_branch = Box::new(self.statement()?);
        let else_branch = if self.matches(&[TokenKind::Else]) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };
        Ok(Stmt::If { cond, then_branch, else_branch })
    }

    fn block(&mut self) -> Result<Vec<Stmt>, Error> {
        let mut statements = Vec::new();
        while !self.check(&TokenKind::RightBrace) && !self.is_at_end() {
            statements.push(self.statement()?);
        }
        self.consume(TokenKind::RightBrace, "expected '}' after block")?;
        Ok(statements)
    }

    fn var_decl(&mut self) -> Result<Stmt, Error> {
        let mut bindings = Vec::new();
        loop {
            let name = self.consume_identifier("expected variable name")?;
            let initializer = if self.matches(&[TokenKind::Equal]) {
                Some(self.expression()?)
            } else {
                None
            };
            bindings.push(VarBinding { name, initializer });
            if !self.matches(&[TokenKind::Comma]) {
                break;
            }
        }
        self.consume(TokenKind::Semicolon, "expected ';' after variable declaration")?;
        Ok(Stmt::VarDecl(bindings))
    }

    fn expr_stmt(&mut self) -> Result<Stmt, Error> {
        let expr = self.expression()?;
        self.consume(TokenKind::Semicolon, "expected ';' after expression")?;
        Ok(Stmt::Expression(expr))
    }

    // --- expressions ---

    fn expression(&mut self) -> Result<Expr, Error> {
        self.assignment()
    }

    fn assignment(&mut self) -> Result<Expr, Error> {
        let lvalue = self.ternary()?;

        if let Some(op_kind) = self.peek_compound_assign_kind() {
            let op_token = self.advance().clone();
            self.require_assignable(&lvalue, &op_token)?;
            let rvalue = self.assignment()?;
            let (row, col) = rvalue.loc();
            let binary_op = Token::synthetic(op_kind, op_token.lexeme.clone(), row, col + 1);
            return Ok(Expr::Assignment { lvalue: Box::new(lvalue), op: Some(binary_op), rvalue: Box::new(rvalue) });
        }

        if self.matches(&[TokenKind::Equal]) {
            let equals = self.previous().clone();
            self.require_assignable(&lvalue, &equals)?;
            let rvalue = self.assignment()?;
            return Ok(Expr::Assignment { lvalue: Box::new(lvalue), op: None, rvalue: Box::new(rvalue) });
        }

        Ok(lvalue)
    }

    fn require_assignable(&self, lvalue: &Expr, at: &Token) -> Result<(), Error> {
        match lvalue {
            Expr::Variable(_) | Expr::InstanceGet { .. } => Ok(()),
            _ => Err(Error::syntax(at.row, at.col, "invalid assignment target")),
        }
    }

    /// `+=`/`-=`/`*=`/`/=` desugar to the underlying `Binary` operator kind.
    fn peek_compound_assign_kind(&self) -> Option<TokenKind> {
        match self.peek().kind {
            TokenKind::PlusEqual => Some(TokenKind::Plus),
            TokenKind::MinusEqual => Some(TokenKind::Minus),
            TokenKind::StarEqual => Some(TokenKind::Star),
            TokenKind::SlashEqual => Some(TokenKind::Slash),
            _ => None,
        }
    }

    fn ternary(&mut self) -> Result<Expr, Error> {
        let cond = self.equality()?;
        if self.matches(&[TokenKind::Question]) {
            let then_branch = self.ternary()?;
            self.consume(TokenKind::Colon, "expected ':' in ternary expression")?;
            let else_branch = self.ternary()?;
            return Ok(Expr::Ternary {
                cond: Box::new(cond),
                then_branch: Box::new(then_branch),
                else_branch: Box::new(else_branch),
            });
        }
        Ok(cond)
    }

    fn equality(&mut self) -> Result<Expr, Error> {
        self.left_assoc_binary(&[TokenKind::BangEqual, TokenKind::EqualEqual], Self::comparison)
    }

    fn comparison(&mut self) -> Result<Expr, Error> {
        self.left_assoc_binary(
            &[TokenKind::Greater, TokenKind::GreaterEqual, TokenKind::Less, TokenKind::LessEqual],
            Self::term,
        )
    }

    fn term(&mut self) -> Result<Expr, Error> {
        self.left_assoc_binary(&[TokenKind::Plus, TokenKind::Minus], Self::factor)
    }

    fn factor(&mut self) -> Result<Expr, Error> {
        self.left_assoc_binary(&[TokenKind::Star, TokenKind::Slash], Self::power)
    }

    fn power(&mut self) -> Result<Expr, Error> {
        self.left_assoc_binary(&[TokenKind::Caret], Self::unary)
    }

    fn left_assoc_binary(
        &mut self,
        kinds: &[TokenKind],
        mut operand: impl FnMut(&mut Self) -> Result<Expr, Error>,
    ) -> Result<Expr, Error> {
        let mut expr = operand(self)?;
        while self.matches(kinds) {
            let op = self.previous().clone();
            let right = operand(self)?;
            expr = Expr::Binary { left: Box::new(expr), op, right: Box::new(right) };
        }
        Ok(expr)
    }

    fn unary(&mut self) -> Result<Expr, Error> {
        if self.matches(&[TokenKind::PlusPlus, TokenKind::MinusMinus]) {
            let op = self.previous().clone();
            let operand = self.unary()?;
            if !matches!(operand, Expr::Variable(_)) {
                return Err(Error::syntax(op.row, op.col, "prefix '++'/'--' require a variable operand"));
            }
            return Ok(Expr::Unary { op, operand: Box::new(operand), is_postfix: false });
        }
        if self.matches(&[TokenKind::Minus, TokenKind::Plus, TokenKind::Bang]) {
            let op = self.previous().clone();
            let operand = self.unary()?;
            return Ok(Expr::Unary { op, operand: Box::new(operand), is_postfix: false });
        }
        self.class_instantiation()
    }

    fn class_instantiation(&mut self) -> Result<Expr, Error> {
        if self.matches(&[TokenKind::New]) {
            let call = self.call()?;
            if !matches!(call, Expr::Call { .. }) {
                let (row, col) = call.loc();
                return Err(Error::syntax(row, col, "'new' must be followed by a call"));
            }
            return Ok(Expr::ClassInstantiation { call: Box::new(call) });
        }
        self.call()
    }

    fn call(&mut self) -> Result<Expr, Error> {
        let mut expr = self.postfix_primary()?;
        loop {
            if self.matches(&[TokenKind::LeftParen]) {
                expr = self.finish_call(expr)?;
            } else if self.matches(&[TokenKind::Dot]) {
                let property = self.consume_identifier("expected property name after '.'")?;
                expr = Expr::InstanceGet { instance: Box::new(expr), property };
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn finish_call(&mut self, callee: Expr) -> Result<Expr, Error> {
        let mut args = Vec::new();
        if !self.check(&TokenKind::RightParen) {
            loop {
                args.push(self.expression()?);
                if !self.matches(&[TokenKind::Comma]) {
                    break;
                }
            }
        }
        let paren = self.consume(TokenKind::RightParen, "expected ')' after arguments")?.clone();
        Ok(Expr::Call { callee: Box::new(callee), args, paren })
    }

    /// `ident ("++"|"--")` postfix is handled here, one level below `call`, so
    /// `x++()` etc. are never mis-parsed as a postfix on a call result.
    fn postfix_primary(&mut self) -> Result<Expr, Error> {
        let expr = self.primary()?;
        if matches!(expr, Expr::Variable(_)) && self.check_any(&[TokenKind::PlusPlus, TokenKind::MinusMinus]) {
            let op = self.advance().clone();
            return Ok(Expr::Unary { op, operand: Box::new(expr), is_postfix: true });
        }
        Ok(expr)
    }

    fn primary(&mut self) -> Result<Expr, Error> {
        if self.matches(&[TokenKind::True]) {
            return Ok(Expr::Literal(LiteralValue::Bool(true)));
        }
        if self.matches(&[TokenKind::False]) {
            return Ok(Expr::Literal(LiteralValue::Bool(false)));
        }
        if self.matches(&[TokenKind::None]) {
            return Ok(Expr::Literal(LiteralValue::None));
        }
        if let TokenKind::Number { literal } = &self.peek().kind {
            let literal = *literal;
            self.advance();
            return Ok(Expr::Literal(LiteralValue::Number(literal)));
        }
        if let TokenKind::String { literal } = &self.peek().kind {
            let literal = literal.clone();
            self.advance();
            return Ok(Expr::Literal(LiteralValue::String(Rc::from(literal.as_str()))));
        }
        if self.matches(&[TokenKind::This]) {
            let keyword = self.previous().clone();
            return Ok(Expr::This(ThisExpr { keyword, hops: std::cell::Cell::new(None) }));
        }
        if self.matches(&[TokenKind::Super]) {
            let keyword = self.previous().clone();
            self.consume(TokenKind::Dot, "expected '.' after 'super'")?;
            let method = self.consume_identifier("expected superclass method name")?;
            return Ok(Expr::Super(SuperExpr { keyword, method, hops: std::cell::Cell::new(None) }));
        }
        if self.matches(&[TokenKind::Identifier]) {
            let name = self.previous().clone();
            return Ok(Expr::Variable(VariableExpr::new(name)));
        }
        if self.matches(&[TokenKind::LeftParen]) {
            let inner = self.expression()?;
            self.consume(TokenKind::RightParen, "expected ')' after expression")?;
            return Ok(Expr::Grouping(Box::new(inner)));
        }
        let tok = self.peek();
        Err(Error::syntax(tok.row, tok.col, format!("unexpected token '{}'", tok.lexeme)))
    }

    // --- token stream helpers ---

    fn matches(&mut self, kinds: &[TokenKind]) -> bool {
        if self.check_any(kinds) {
            self.advance();
            return true;
        }
        false
    }

    fn check_any(&self, kinds: &[TokenKind]) -> bool {
        kinds.iter().any(|k| self.check(k))
    }

    fn check(&self, kind: &TokenKind) -> bool {
        !self.is_at_end() && std::mem::discriminant(&self.peek().kind) == std::mem::discriminant(kind)
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }

    fn is_at_end(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Eof)
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current - 1]
    }

    fn consume(&mut self, kind: TokenKind, message: &str) -> Result<&Token, Error> {
        if self.check(&kind) {
            return Ok(self.advance());
        }
        let tok = self.peek();
        Err(Error::syntax(tok.row, tok.col, message))
    }

    fn consume_identifier(&mut self, message: &str) -> Result<Token, Error> {
        self.consume(TokenKind::Identifier, message).cloned()
    }

    fn synchronize(&mut self) {
        while !self.is_at_end() {
            let was_boundary = matches!(self.peek().kind, TokenKind::Semicolon | TokenKind::RightBrace);
            self.advance();
            if was_boundary {
                return;
            }
        }
    }
}
