//! Static scope resolution.
//!
//! One AST walk that (1) maintains a stack of lexical scopes mirroring
//! exactly the environment frames the interpreter will create at run time,
//! (2) records, for every `Variable`/`Assign` occurrence found in a local
//! scope, how many frames outward its binding lives — via
//! [`Interpreter::note_local`] — and (3) reports the static errors the
//! grammar cannot catch: reading a local inside its own initializer,
//! `return` outside a function, and redeclaring a name in the same local
//! scope.
//!
//! References not found in any scope are left unrecorded and resolve as
//! globals by name.  Since `for` loops are desugared before this pass runs,
//! only blocks and function bodies ever open scopes, which is precisely the
//! set of places the interpreter pushes frames.

use crate::error::LoxError;
use crate::interpreter::Interpreter;
use crate::parser::{Expr, Stmt};
use crate::token::Token;
use log::{debug, info};
use std::collections::HashMap;

/// Are we inside a user function?  Validates `return` placement.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum FunctionType {
    None,
    Function,
}

pub struct Resolver<'a, 'i> {
    interpreter: &'i mut Interpreter<'a>,

    /// Innermost scope last.  `false` = declared but not yet defined (its
    /// initializer is still being resolved).
    scopes: Vec<HashMap<&'a str, bool>>,

    current_function: FunctionType,

    /// Static errors are collected, not fatal individually: the whole tree
    /// is always walked so one bad declaration does not hide the next.
    errors: Vec<LoxError>,
}

impl<'a, 'i> Resolver<'a, 'i> {
    pub fn new(interpreter: &'i mut Interpreter<'a>) -> Self {
        Resolver {
            interpreter,
            scopes: Vec::new(),
            current_function: FunctionType::None,
            errors: Vec::new(),
        }
    }

    /// Walk all top-level statements; returns every static error found.
    /// An empty vector means the program is safe to interpret.
    pub fn resolve(mut self, statements: &[Stmt<'a>]) -> Vec<LoxError> {
        info!("resolving {} top-level statement(s)", statements.len());

        for stmt in statements {
            self.resolve_stmt(stmt);
        }

        self.errors
    }

    // ─────────────────────────── statements ──────────────────────────────

    fn resolve_stmt(&mut self, stmt: &Stmt<'a>) {
        match stmt {
            Stmt::Block(statements) => {
                self.begin_scope();

                for s in statements {
                    self.resolve_stmt(s);
                }

                self.end_scope();
            }

            // declare → resolve initializer → define, so the initializer
            // sees the *outer* binding of the same name, and a direct
            // self-reference is caught in resolve_expr.
            Stmt::Var { name, initializer } => {
                self.declare(name);

                if let Some(expr) = initializer {
                    self.resolve_expr(expr);
                }

                self.define(name);
            }

            // The function's own name is defined eagerly in the enclosing
            // scope so the body can recurse into it.
            Stmt::Function { name, params, body } => {
                self.declare(name);
                self.define(name);

                self.resolve_function(params, body);
            }

            Stmt::Expression(expr) | Stmt::Print(expr) => {
                self.resolve_expr(expr);
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(condition);
                self.resolve_stmt(then_branch);

                if let Some(eb) = else_branch.as_deref() {
                    self.resolve_stmt(eb);
                }
            }

            Stmt::While { condition, body } => {
                self.resolve_expr(condition);
                self.resolve_stmt(body);
            }

            Stmt::Return { keyword, value } => {
                if self.current_function == FunctionType::None {
                    self.errors.push(LoxError::resolve(
                        keyword,
                        "Cannot return from top-level code",
                    ));
                }

                if let Some(expr) = value {
                    self.resolve_expr(expr);
                }
            }
        }
    }

    // ─────────────────────────── expressions ─────────────────────────────

    fn resolve_expr(&mut self, expr: &Expr<'a>) {
        match expr {
            Expr::Literal(_) => {}

            Expr::Grouping(inner) => self.resolve_expr(inner),

            Expr::Unary { right, .. } => self.resolve_expr(right),

            Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                self.resolve_expr(left);
                self.resolve_expr(right);
            }

            Expr::Variable { id, name } => {
                if let Some(scope) = self.scopes.last() {
                    if scope.get(name.lexeme) == Some(&false) {
                        self.errors.push(LoxError::resolve(
                            name,
                            "Cannot read local variable in its own initializer",
                        ));
                    }
                }

                self.resolve_local(*id, name);
            }

            Expr::Assign { id, name, value } => {
                // RHS first, then bind the target.
                self.resolve_expr(value);
                self.resolve_local(*id, name);
            }

            Expr::Call {
                callee, arguments, ..
            } => {
                self.resolve_expr(callee);

                for arg in arguments {
                    self.resolve_expr(arg);
                }
            }
        }
    }

    /// A fresh scope for parameters + body, mirroring the single frame the
    /// interpreter chains onto the closure at call time.
    fn resolve_function(&mut self, params: &[&'a Token<'a>], body: &[Stmt<'a>]) {
        let enclosing = self.current_function;
        self.current_function = FunctionType::Function;

        self.begin_scope();

        for param in params {
            self.declare(param);
            self.define(param);
        }

        for stmt in body {
            self.resolve_stmt(stmt);
        }

        self.end_scope();

        self.current_function = enclosing;
    }

    // ──────────────────────────── scopes ─────────────────────────────────

    #[inline]
    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    #[inline]
    fn end_scope(&mut self) {
        self.scopes.pop();
    }

    fn declare(&mut self, name: &Token<'a>) {
        if let Some(scope) = self.scopes.last_mut() {
            if scope.contains_key(name.lexeme) {
                self.errors.push(LoxError::resolve(
                    name,
                    "Already a variable with this name in this scope",
                ));
            }

            scope.insert(name.lexeme, false);
        }
        // no scope ⇒ global declaration, nothing to track
    }

    fn define(&mut self, name: &Token<'a>) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.lexeme, true);
        }
    }

    /// Count hops innermost → outermost; first hit wins.  No hit means the
    /// reference is (presumed) global and stays out of the table.
    fn resolve_local(&mut self, id: usize, name: &Token<'a>) {
        for (depth, scope) in self.scopes.iter().rev().enumerate() {
            if scope.contains_key(name.lexeme) {
                debug!("'{}' resolved at depth {}", name.lexeme, depth);

                self.interpreter.note_local(id, depth);
                return;
            }
        }

        debug!("'{}' resolved as global", name.lexeme);
    }
}
