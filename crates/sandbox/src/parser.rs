//! Recursive-descent parser producing the statement tree the interpreter walks.

use std::collections::HashSet;
use std::rc::Rc;

use crate::ast::{
    BinaryOp, DeclKind, Expr, FunctionBody, FunctionDef, LogicalOp, Param, PropKey, Stmt,
    SwitchCase, UnaryOp,
};
use crate::error::SyntaxError;
use crate::lexer::{Lexer, TemplatePart, Tok, Token};
use crate::value::number_to_string;

const MAX_NESTING: usize = 256;

const RESERVED: &[&str] = &[
    "break", "case", "catch", "class", "const", "continue", "debugger", "default", "delete", "do",
    "else", "enum", "export", "extends", "false", "finally", "for", "function", "if", "import",
    "in", "instanceof", "new", "null", "return", "super", "switch", "this", "throw", "true", "try",
    "typeof", "var", "void", "while", "with", "yield",
];

/// Parse a whole program.
pub fn parse_program(source: &str) -> Result<Vec<Stmt>, SyntaxError> {
    let tokens = Lexer::new(source).tokenize()?;
    let mut parser = Parser::new(tokens);
    let mut body = Vec::new();
    while !parser.at_eof() {
        body.push(parser.statement()?);
    }
    check_lexical(&body, parser.line())?;
    Ok(body)
}

fn is_reserved(name: &str) -> bool {
    RESERVED.contains(&name)
}

/// Reject `let`/`const` names declared twice in one scope, or clashing with `var`.
fn check_lexical<'a>(stmts: impl IntoIterator<Item = &'a Stmt>, line: usize) -> Result<(), SyntaxError> {
    let mut lexical = HashSet::new();
    let mut vars = HashSet::new();
    for stmt in stmts {
        if let Stmt::Decl { kind, decls } = stmt {
            for (name, _) in decls {
                let clash = match kind {
                    DeclKind::Var => {
                        vars.insert(name.clone());
                        lexical.contains(name)
                    }
                    DeclKind::Let | DeclKind::Const => {
                        vars.contains(name) || !lexical.insert(name.clone())
                    }
                };
                if clash {
                    return Err(SyntaxError::new(
                        format!("Identifier '{name}' has already been declared"),
                        line,
                    ));
                }
            }
        }
    }
    Ok(())
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    nesting: usize,
    function_depth: usize,
    loop_depth: usize,
    switch_depth: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            nesting: 0,
            function_depth: 0,
            loop_depth: 0,
            switch_depth: 0,
        }
    }

    // ─── token helpers ────────────────────────────────────────────────────────

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_nth(&self, n: usize) -> &Tok {
        &self.tokens[(self.pos + n).min(self.tokens.len() - 1)].tok
    }

    fn line(&self) -> usize {
        self.peek().line
    }

    fn at_eof(&self) -> bool {
        matches!(self.peek().tok, Tok::Eof)
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn is_punct(&self, punct: &str) -> bool {
        matches!(&self.peek().tok, Tok::Punct(p) if *p == punct)
    }

    fn eat_punct(&mut self, punct: &str) -> bool {
        if self.is_punct(punct) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, punct: &str) -> Result<(), SyntaxError> {
        if self.eat_punct(punct) {
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn is_keyword(&self, keyword: &str) -> bool {
        matches!(&self.peek().tok, Tok::Ident(name) if name == keyword)
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.is_keyword(keyword) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn unexpected(&self) -> SyntaxError {
        let token = self.peek();
        let message = match &token.tok {
            Tok::Eof => "Unexpected end of input".to_owned(),
            Tok::Num(_) => "Unexpected number".to_owned(),
            Tok::Str(_) => "Unexpected string".to_owned(),
            Tok::Template(_) => "Unexpected template string".to_owned(),
            Tok::Ident(name) if is_reserved(name) => format!("Unexpected token '{name}'"),
            Tok::Ident(name) => format!("Unexpected identifier '{name}'"),
            Tok::Punct(p) => format!("Unexpected token '{p}'"),
        };
        SyntaxError::new(message, token.line)
    }

    fn binding_name(&mut self) -> Result<String, SyntaxError> {
        match &self.peek().tok {
            Tok::Ident(name) if !is_reserved(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected()),
        }
    }

    fn consume_semicolon(&mut self) -> Result<(), SyntaxError> {
        if self.eat_punct(";") {
            return Ok(());
        }
        let token = self.peek();
        if token.newline_before || matches!(token.tok, Tok::Eof | Tok::Punct("}")) {
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn enter(&mut self) -> Result<(), SyntaxError> {
        self.nesting += 1;
        if self.nesting > MAX_NESTING {
            return Err(SyntaxError::new("Maximum nesting depth exceeded", self.line()));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.nesting -= 1;
    }

    // ─── statements ───────────────────────────────────────────────────────────

    fn statement(&mut self) -> Result<Stmt, SyntaxError> {
        self.enter()?;
        let stmt = self.statement_inner()?;
        self.leave();
        Ok(stmt)
    }

    fn statement_inner(&mut self) -> Result<Stmt, SyntaxError> {
        if self.is_punct("{") {
            return Ok(Stmt::Block(self.block()?));
        }
        if self.eat_punct(";") {
            return Ok(Stmt::Empty);
        }

        let keyword = match &self.peek().tok {
            Tok::Ident(name) => name.clone(),
            _ => String::new(),
        };
        match keyword.as_str() {
            "let" | "const" | "var" => {
                let kind = self.decl_kind();
                let stmt = self.declaration(kind)?;
                self.consume_semicolon()?;
                Ok(stmt)
            }
            "function" => {
                self.advance();
                let name = self.binding_name()?;
                let def = self.function_rest(Some(name))?;
                Ok(Stmt::Function(Rc::new(def)))
            }
            "if" => self.if_statement(),
            "while" => {
                self.advance();
                self.expect_punct("(")?;
                let test = self.expression()?;
                self.expect_punct(")")?;
                let body = self.loop_body()?;
                Ok(Stmt::While { test, body })
            }
            "do" => {
                self.advance();
                let body = self.loop_body()?;
                if !self.eat_keyword("while") {
                    return Err(self.unexpected());
                }
                self.expect_punct("(")?;
                let test = self.expression()?;
                self.expect_punct(")")?;
                self.eat_punct(";");
                Ok(Stmt::DoWhile { body, test })
            }
            "for" => self.for_statement(),
            "return" => {
                let line = self.line();
                self.advance();
                if self.function_depth == 0 {
                    return Err(SyntaxError::new("Illegal return statement", line));
                }
                let token = self.peek();
                let value = if token.newline_before
                    || matches!(token.tok, Tok::Eof | Tok::Punct(";" | "}"))
                {
                    None
                } else {
                    Some(self.expression()?)
                };
                self.consume_semicolon()?;
                Ok(Stmt::Return(value))
            }
            "break" => {
                let line = self.line();
                self.advance();
                if self.loop_depth == 0 && self.switch_depth == 0 {
                    return Err(SyntaxError::new("Illegal break statement", line));
                }
                self.consume_semicolon()?;
                Ok(Stmt::Break)
            }
            "continue" => {
                let line = self.line();
                self.advance();
                if self.loop_depth == 0 {
                    return Err(SyntaxError::new(
                        "Illegal continue statement: no surrounding iteration statement",
                        line,
                    ));
                }
                self.consume_semicolon()?;
                Ok(Stmt::Continue)
            }
            "switch" => self.switch_statement(),
            "throw" => {
                let line = self.line();
                self.advance();
                if self.peek().newline_before {
                    return Err(SyntaxError::new("Illegal newline after throw", line));
                }
                let value = self.expression()?;
                self.consume_semicolon()?;
                Ok(Stmt::Throw(value))
            }
            "try" => self.try_statement(),
            _ => {
                let expr = self.expression()?;
                self.consume_semicolon()?;
                Ok(Stmt::Expr(expr))
            }
        }
    }

    fn decl_kind(&mut self) -> DeclKind {
        match &self.advance().tok {
            Tok::Ident(name) if name == "let" => DeclKind::Let,
            Tok::Ident(name) if name == "const" => DeclKind::Const,
            _ => DeclKind::Var,
        }
    }

    fn declaration(&mut self, kind: DeclKind) -> Result<Stmt, SyntaxError> {
        let mut decls = Vec::new();
        loop {
            let name = self.binding_name()?;
            let init = if self.eat_punct("=") {
                Some(self.assignment()?)
            } else {
                None
            };
            if kind == DeclKind::Const && init.is_none() {
                return Err(SyntaxError::new(
                    "Missing initializer in const declaration",
                    self.line(),
                ));
            }
            decls.push((name, init));
            if !self.eat_punct(",") {
                break;
            }
        }
        Ok(Stmt::Decl { kind, decls })
    }

    fn block(&mut self) -> Result<Vec<Stmt>, SyntaxError> {
        self.expect_punct("{")?;
        let mut body = Vec::new();
        while !self.is_punct("}") {
            if self.at_eof() {
                return Err(self.unexpected());
            }
            body.push(self.statement()?);
        }
        let line = self.line();
        self.advance();
        check_lexical(&body, line)?;
        Ok(body)
    }

    fn loop_body(&mut self) -> Result<Box<Stmt>, SyntaxError> {
        self.loop_depth += 1;
        let body = self.statement();
        self.loop_depth -= 1;
        Ok(Box::new(body?))
    }

    fn if_statement(&mut self) -> Result<Stmt, SyntaxError> {
        self.advance();
        self.expect_punct("(")?;
        let test = self.expression()?;
        self.expect_punct(")")?;
        let consequent = Box::new(self.statement()?);
        let alternate = if self.eat_keyword("else") {
            Some(Box::new(self.statement()?))
        } else {
            None
        };
        Ok(Stmt::If {
            test,
            consequent,
            alternate,
        })
    }

    fn for_statement(&mut self) -> Result<Stmt, SyntaxError> {
        self.advance();
        self.expect_punct("(")?;

        let mut init = None;
        if self.is_keyword("let") || self.is_keyword("const") || self.is_keyword("var") {
            let is_for_of = matches!(self.peek_nth(1), Tok::Ident(_))
                && matches!(self.peek_nth(2), Tok::Ident(word) if word == "of");
            let kind = self.decl_kind();
            if is_for_of {
                let name = self.binding_name()?;
                self.advance();
                let iterable = self.assignment()?;
                self.expect_punct(")")?;
                let body = self.loop_body()?;
                return Ok(Stmt::ForOf {
                    kind,
                    name,
                    iterable,
                    body,
                });
            }
            let mut decls = Vec::new();
            loop {
                let name = self.binding_name()?;
                let value = if self.eat_punct("=") {
                    Some(self.assignment()?)
                } else {
                    None
                };
                if kind == DeclKind::Const && value.is_none() {
                    return Err(SyntaxError::new(
                        "Missing initializer in const declaration",
                        self.line(),
                    ));
                }
                decls.push((name, value));
                if !self.eat_punct(",") {
                    break;
                }
            }
            init = Some(Box::new(Stmt::Decl { kind, decls }));
        } else if !self.is_punct(";") {
            init = Some(Box::new(Stmt::Expr(self.expression()?)));
        }
        self.expect_punct(";")?;

        let test = if self.is_punct(";") {
            None
        } else {
            Some(self.expression()?)
        };
        self.expect_punct(";")?;

        let update = if self.is_punct(")") {
            None
        } else {
            Some(self.expression()?)
        };
        self.expect_punct(")")?;

        let body = self.loop_body()?;
        Ok(Stmt::For {
            init,
            test,
            update,
            body,
        })
    }

    fn switch_statement(&mut self) -> Result<Stmt, SyntaxError> {
        self.advance();
        self.expect_punct("(")?;
        let discriminant = self.expression()?;
        self.expect_punct(")")?;
        self.expect_punct("{")?;

        self.switch_depth += 1;
        let mut cases = Vec::new();
        let mut seen_default = false;
        while !self.eat_punct("}") {
            let test = if self.eat_keyword("case") {
                Some(self.expression()?)
            } else if self.is_keyword("default") {
                if seen_default {
                    return Err(SyntaxError::new(
                        "More than one default clause in switch statement",
                        self.line(),
                    ));
                }
                self.advance();
                seen_default = true;
                None
            } else {
                return Err(self.unexpected());
            };
            self.expect_punct(":")?;

            let mut body = Vec::new();
            while !self.is_keyword("case") && !self.is_keyword("default") && !self.is_punct("}") {
                if self.at_eof() {
                    return Err(self.unexpected());
                }
                body.push(self.statement()?);
            }
            cases.push(SwitchCase { test, body });
        }
        self.switch_depth -= 1;

        check_lexical(cases.iter().flat_map(|case| case.body.iter()), self.line())?;
        Ok(Stmt::Switch {
            discriminant,
            cases,
        })
    }

    fn try_statement(&mut self) -> Result<Stmt, SyntaxError> {
        self.advance();
        let block = self.block()?;
        let mut param = None;
        let mut handler = None;
        if self.eat_keyword("catch") {
            if self.eat_punct("(") {
                param = Some(self.binding_name()?);
                self.expect_punct(")")?;
            }
            handler = Some(self.block()?);
        }
        let finalizer = if self.eat_keyword("finally") {
            Some(self.block()?)
        } else {
            None
        };
        if handler.is_none() && finalizer.is_none() {
            return Err(SyntaxError::new("Missing catch or finally after try", self.line()));
        }
        Ok(Stmt::Try {
            block,
            param,
            handler,
            finalizer,
        })
    }

    // ─── functions ────────────────────────────────────────────────────────────

    /// Parameter list and body after `function name?`.
    fn function_rest(&mut self, name: Option<String>) -> Result<FunctionDef, SyntaxError> {
        let params = self.params()?;
        let body = self.function_block()?;
        Ok(FunctionDef {
            name,
            params,
            body: FunctionBody::Block(body),
        })
    }

    fn params(&mut self) -> Result<Vec<Param>, SyntaxError> {
        self.expect_punct("(")?;
        let mut params = Vec::new();
        while !self.eat_punct(")") {
            let name = self.binding_name()?;
            let default = if self.eat_punct("=") {
                Some(self.assignment()?)
            } else {
                None
            };
            params.push(Param { name, default });
            if !self.eat_punct(",") {
                self.expect_punct(")")?;
                break;
            }
        }
        Ok(params)
    }

    fn function_block(&mut self) -> Result<Vec<Stmt>, SyntaxError> {
        let saved = (self.loop_depth, self.switch_depth);
        self.loop_depth = 0;
        self.switch_depth = 0;
        self.function_depth += 1;
        let body = self.block();
        self.function_depth -= 1;
        (self.loop_depth, self.switch_depth) = saved;
        body
    }

    fn arrow_ahead(&self) -> bool {
        // `(` ... matching `)` followed by `=>`
        let mut depth = 0_usize;
        let mut index = self.pos;
        while let Some(token) = self.tokens.get(index) {
            match &token.tok {
                Tok::Punct("(" | "[" | "{") => depth += 1,
                Tok::Punct(")" | "]" | "}") => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return matches!(
                            self.tokens.get(index + 1).map(|t| &t.tok),
                            Some(Tok::Punct("=>"))
                        );
                    }
                }
                Tok::Eof => return false,
                _ => {}
            }
            index += 1;
        }
        false
    }

    fn arrow_body(&mut self, params: Vec<Param>) -> Result<Expr, SyntaxError> {
        self.expect_punct("=>")?;
        let body = if self.is_punct("{") {
            FunctionBody::Block(self.function_block()?)
        } else {
            FunctionBody::Expr(self.assignment()?)
        };
        Ok(Expr::Function(Rc::new(FunctionDef {
            name: None,
            params,
            body,
        })))
    }

    // ─── expressions ──────────────────────────────────────────────────────────

    fn expression(&mut self) -> Result<Expr, SyntaxError> {
        self.assignment()
    }

    fn assignment(&mut self) -> Result<Expr, SyntaxError> {
        self.enter()?;
        let expr = self.assignment_inner()?;
        self.leave();
        Ok(expr)
    }

    fn assignment_inner(&mut self) -> Result<Expr, SyntaxError> {
        if let Tok::Ident(name) = &self.peek().tok {
            if !is_reserved(name) && matches!(self.peek_nth(1), Tok::Punct("=>")) {
                let name = name.clone();
                self.advance();
                return self.arrow_body(vec![Param {
                    name,
                    default: None,
                }]);
            }
        }
        if self.is_punct("(") && self.arrow_ahead() {
            let params = self.params()?;
            return self.arrow_body(params);
        }

        let target = self.conditional()?;
        let op = match &self.peek().tok {
            Tok::Punct("=") => None,
            Tok::Punct("+=") => Some(BinaryOp::Add),
            Tok::Punct("-=") => Some(BinaryOp::Sub),
            Tok::Punct("*=") => Some(BinaryOp::Mul),
            Tok::Punct("/=") => Some(BinaryOp::Div),
            Tok::Punct("%=") => Some(BinaryOp::Rem),
            Tok::Punct("**=") => Some(BinaryOp::Pow),
            _ => return Ok(target),
        };
        if !is_assignable(&target) {
            return Err(SyntaxError::new(
                "Invalid left-hand side in assignment",
                self.line(),
            ));
        }
        self.advance();
        let value = self.assignment()?;
        Ok(Expr::Assign {
            op,
            target: Box::new(target),
            value: Box::new(value),
        })
    }

    fn conditional(&mut self) -> Result<Expr, SyntaxError> {
        let test = self.binary(1)?;
        if !self.eat_punct("?") {
            return Ok(test);
        }
        let consequent = self.assignment()?;
        self.expect_punct(":")?;
        let alternate = self.assignment()?;
        Ok(Expr::Conditional {
            test: Box::new(test),
            consequent: Box::new(consequent),
            alternate: Box::new(alternate),
        })
    }

    fn binary(&mut self, min_prec: u8) -> Result<Expr, SyntaxError> {
        let mut left = self.unary()?;
        loop {
            let Tok::Punct(punct) = self.peek().tok else {
                return Ok(left);
            };
            let Some((prec, kind)) = binary_operator(punct) else {
                return Ok(left);
            };
            if prec < min_prec {
                return Ok(left);
            }
            self.advance();
            // `**` is right-associative
            let next = if punct == "**" { prec } else { prec + 1 };
            let right = self.binary(next)?;
            left = match kind {
                OpKind::Binary(op) => Expr::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                OpKind::Logical(op) => Expr::Logical {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
            };
        }
    }

    fn unary(&mut self) -> Result<Expr, SyntaxError> {
        self.enter()?;
        let expr = self.unary_inner()?;
        self.leave();
        Ok(expr)
    }

    fn unary_inner(&mut self) -> Result<Expr, SyntaxError> {
        let op = match &self.peek().tok {
            Tok::Punct("!") => Some(UnaryOp::Not),
            Tok::Punct("-") => Some(UnaryOp::Neg),
            Tok::Punct("+") => Some(UnaryOp::Plus),
            Tok::Ident(name) if name == "typeof" => Some(UnaryOp::TypeOf),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let arg = self.unary()?;
            return Ok(Expr::Unary {
                op,
                arg: Box::new(arg),
            });
        }

        if self.is_punct("++") || self.is_punct("--") {
            let increment = self.is_punct("++");
            self.advance();
            let target = self.unary()?;
            if !is_assignable(&target) {
                return Err(SyntaxError::new(
                    "Invalid left-hand side expression in prefix operation",
                    self.line(),
                ));
            }
            return Ok(Expr::Update {
                increment,
                prefix: true,
                target: Box::new(target),
            });
        }

        let expr = self.call_member()?;
        let token = self.peek();
        if !token.newline_before && matches!(token.tok, Tok::Punct("++" | "--")) {
            let increment = matches!(token.tok, Tok::Punct("++"));
            if !is_assignable(&expr) {
                return Err(SyntaxError::new(
                    "Invalid left-hand side expression in postfix operation",
                    token.line,
                ));
            }
            self.advance();
            return Ok(Expr::Update {
                increment,
                prefix: false,
                target: Box::new(expr),
            });
        }
        Ok(expr)
    }

    fn call_member(&mut self) -> Result<Expr, SyntaxError> {
        let mut expr = if self.eat_keyword("new") {
            let mut callee = self.primary()?;
            loop {
                if self.eat_punct(".") {
                    let property = self.property_name()?;
                    callee = Expr::Member {
                        object: Box::new(callee),
                        property,
                    };
                } else {
                    break;
                }
            }
            let args = if self.is_punct("(") {
                self.arguments()?
            } else {
                Vec::new()
            };
            Expr::New {
                callee: Box::new(callee),
                args,
            }
        } else {
            self.primary()?
        };

        loop {
            if self.eat_punct(".") {
                let property = self.property_name()?;
                expr = Expr::Member {
                    object: Box::new(expr),
                    property,
                };
            } else if self.eat_punct("[") {
                let index = self.expression()?;
                self.expect_punct("]")?;
                expr = Expr::Index {
                    object: Box::new(expr),
                    index: Box::new(index),
                };
            } else if self.is_punct("(") {
                let args = self.arguments()?;
                expr = Expr::Call {
                    callee: Box::new(expr),
                    args,
                };
            } else {
                return Ok(expr);
            }
        }
    }

    fn property_name(&mut self) -> Result<String, SyntaxError> {
        match &self.peek().tok {
            Tok::Ident(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected()),
        }
    }

    fn arguments(&mut self) -> Result<Vec<Expr>, SyntaxError> {
        self.expect_punct("(")?;
        let mut args = Vec::new();
        while !self.eat_punct(")") {
            args.push(self.assignment()?);
            if !self.eat_punct(",") {
                self.expect_punct(")")?;
                break;
            }
        }
        Ok(args)
    }

    fn primary(&mut self) -> Result<Expr, SyntaxError> {
        let token = self.peek().clone();
        match token.tok {
            Tok::Num(n) => {
                self.advance();
                Ok(Expr::Num(n))
            }
            Tok::Str(s) => {
                self.advance();
                Ok(Expr::Str(s.into()))
            }
            Tok::Template(parts) => {
                self.advance();
                template(parts)
            }
            Tok::Ident(name) => match name.as_str() {
                "true" => {
                    self.advance();
                    Ok(Expr::Bool(true))
                }
                "false" => {
                    self.advance();
                    Ok(Expr::Bool(false))
                }
                "null" => {
                    self.advance();
                    Ok(Expr::Null)
                }
                "function" => {
                    self.advance();
                    let name = match &self.peek().tok {
                        Tok::Ident(n) if !is_reserved(n) => {
                            let n = n.clone();
                            self.advance();
                            Some(n)
                        }
                        _ => None,
                    };
                    Ok(Expr::Function(Rc::new(self.function_rest(name)?)))
                }
                _ if is_reserved(&name) => Err(self.unexpected()),
                _ => {
                    self.advance();
                    Ok(Expr::Ident(name))
                }
            },
            Tok::Punct("(") => {
                self.advance();
                let expr = self.expression()?;
                self.expect_punct(")")?;
                Ok(expr)
            }
            Tok::Punct("[") => {
                self.advance();
                let mut items = Vec::new();
                while !self.eat_punct("]") {
                    if self.is_punct(",") {
                        self.advance();
                        items.push(Expr::Ident("undefined".into()));
                        continue;
                    }
                    items.push(self.assignment()?);
                    if !self.eat_punct(",") {
                        self.expect_punct("]")?;
                        break;
                    }
                }
                Ok(Expr::Array(items))
            }
            Tok::Punct("{") => self.object_literal(),
            _ => Err(self.unexpected()),
        }
    }

    fn object_literal(&mut self) -> Result<Expr, SyntaxError> {
        self.expect_punct("{")?;
        let mut props = Vec::new();
        while !self.eat_punct("}") {
            let key = match self.peek().tok.clone() {
                Tok::Ident(name) | Tok::Str(name) => {
                    self.advance();
                    PropKey::Named(name)
                }
                Tok::Num(n) => {
                    self.advance();
                    PropKey::Named(number_to_string(n))
                }
                Tok::Punct("[") => {
                    self.advance();
                    let key = self.expression()?;
                    self.expect_punct("]")?;
                    PropKey::Computed(key)
                }
                _ => return Err(self.unexpected()),
            };

            let value = if self.eat_punct(":") {
                self.assignment()?
            } else if self.is_punct("(") {
                let name = match &key {
                    PropKey::Named(name) => Some(name.clone()),
                    PropKey::Computed(_) => None,
                };
                Expr::Function(Rc::new(self.function_rest(name)?))
            } else {
                match &key {
                    PropKey::Named(name) if !is_reserved(name) => Expr::Ident(name.clone()),
                    _ => return Err(self.unexpected()),
                }
            };
            props.push((key, value));

            if !self.eat_punct(",") {
                self.expect_punct("}")?;
                break;
            }
        }
        Ok(Expr::Object(props))
    }
}

enum OpKind {
    Binary(BinaryOp),
    Logical(LogicalOp),
}

fn binary_operator(punct: &str) -> Option<(u8, OpKind)> {
    let entry = match punct {
        "||" => (1, OpKind::Logical(LogicalOp::Or)),
        "??" => (1, OpKind::Logical(LogicalOp::Nullish)),
        "&&" => (2, OpKind::Logical(LogicalOp::And)),
        "==" => (3, OpKind::Binary(BinaryOp::Eq)),
        "!=" => (3, OpKind::Binary(BinaryOp::NotEq)),
        "===" => (3, OpKind::Binary(BinaryOp::StrictEq)),
        "!==" => (3, OpKind::Binary(BinaryOp::StrictNotEq)),
        "<" => (4, OpKind::Binary(BinaryOp::Lt)),
        ">" => (4, OpKind::Binary(BinaryOp::Gt)),
        "<=" => (4, OpKind::Binary(BinaryOp::LtEq)),
        ">=" => (4, OpKind::Binary(BinaryOp::GtEq)),
        "+" => (5, OpKind::Binary(BinaryOp::Add)),
        "-" => (5, OpKind::Binary(BinaryOp::Sub)),
        "*" => (6, OpKind::Binary(BinaryOp::Mul)),
        "/" => (6, OpKind::Binary(BinaryOp::Div)),
        "%" => (6, OpKind::Binary(BinaryOp::Rem)),
        "**" => (7, OpKind::Binary(BinaryOp::Pow)),
        _ => return None,
    };
    Some(entry)
}

fn is_assignable(expr: &Expr) -> bool {
    matches!(expr, Expr::Ident(_) | Expr::Member { .. } | Expr::Index { .. })
}

fn template(parts: Vec<TemplatePart>) -> Result<Expr, SyntaxError> {
    let mut quasis = Vec::new();
    let mut exprs = Vec::new();
    for part in parts {
        match part {
            TemplatePart::Text(text) => quasis.push(text),
            TemplatePart::Expr { source, line } => {
                let tokens = Lexer::starting_at(&source, line).tokenize()?;
                let mut parser = Parser::new(tokens);
                if parser.at_eof() {
                    return Err(SyntaxError::new("Unexpected token '}'", line));
                }
                let expr = parser.expression()?;
                if !parser.at_eof() {
                    return Err(parser.unexpected());
                }
                exprs.push(expr);
            }
        }
    }
    Ok(Expr::Template { quasis, exprs })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_err(source: &str) -> String {
        parse_program(source).unwrap_err().message().to_owned()
    }

    #[test]
    fn parses_declarations_and_calls() {
        let program = parse_program("let a = 1, b = 2\nconsole.log(a + b)").unwrap();
        assert_eq!(program.len(), 2);
        assert!(matches!(
            &program[0],
            Stmt::Decl { kind: DeclKind::Let, decls } if decls.len() == 2
        ));
        assert!(matches!(&program[1], Stmt::Expr(Expr::Call { .. })));
    }

    #[test]
    fn reports_missing_initializer_expression() {
        assert_eq!(parse_err("let fullName = ;"), "Unexpected token ';'");
    }

    #[test]
    fn reports_unexpected_identifier() {
        assert_eq!(parse_err("let a = 1 b"), "Unexpected identifier 'b'");
    }

    #[test]
    fn reports_unexpected_end() {
        assert_eq!(parse_err("if (x > 1) {"), "Unexpected end of input");
    }

    #[test]
    fn rejects_redeclared_let() {
        assert_eq!(
            parse_err("let x = 1;\nlet x = 2;"),
            "Identifier 'x' has already been declared"
        );
        assert!(parse_program("var y = 1; var y = 2;").is_ok());
    }

    #[test]
    fn rejects_misplaced_control_flow() {
        assert_eq!(parse_err("return 1;"), "Illegal return statement");
        assert_eq!(parse_err("break;"), "Illegal break statement");
        assert!(parse_program("while (true) { break; }").is_ok());
    }

    #[test]
    fn rejects_const_without_initializer() {
        assert_eq!(parse_err("const a;"), "Missing initializer in const declaration");
    }

    #[test]
    fn exponent_is_right_associative() {
        let program = parse_program("2 ** 3 ** 2").unwrap();
        let Stmt::Expr(Expr::Binary { op, right, .. }) = &program[0] else {
            panic!("expected binary expression");
        };
        assert_eq!(*op, BinaryOp::Pow);
        assert!(matches!(**right, Expr::Binary { op: BinaryOp::Pow, .. }));
    }

    #[test]
    fn parses_arrow_functions() {
        let program = parse_program("const f = (a, b = 2) => a * b;\nconst g = x => { return x; };").unwrap();
        assert_eq!(program.len(), 2);
    }

    #[test]
    fn parses_switch_with_fallthrough() {
        let program = parse_program(
            "switch (d) { case 1: case 2: x = 'a'; break; default: x = 'b'; }",
        )
        .unwrap();
        let Stmt::Switch { cases, .. } = &program[0] else {
            panic!("expected switch");
        };
        assert_eq!(cases.len(), 3);
        assert!(cases[0].body.is_empty());
        assert!(cases[2].test.is_none());
    }

    #[test]
    fn rejects_invalid_assignment_target() {
        assert_eq!(parse_err("1 = 2"), "Invalid left-hand side in assignment");
    }
}
