//! Tree-walking evaluator.
//!
//! Executes statements depth-first against the current [`Environment`]
//! chain.  Two non-error invariants keep scoping honest:
//!
//! * every block pushes a fresh child frame and restores the previous one on
//!   **every** exit path (normal completion, early `return`, runtime error);
//! * a user function call chains its new frame onto the function's captured
//!   closure frame, never onto the caller's frame — which is what makes
//!   closures lexically rather than dynamically scoped.
//!
//! `return` travels as [`InterpretError::Return`], a signal distinct from
//! runtime errors: it unwinds through any number of nested blocks and loops
//! and is caught only at the function-call boundary.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{self, Write};
use std::rc::Rc;

use chrono::Utc;
use log::{debug, info};
use thiserror::Error;

use crate::environment::Environment;
use crate::error::LoxError;
use crate::parser::{Expr, LiteralValue, Stmt};
use crate::token::{Token, TokenType};
use crate::value::Value;

/// Why statement execution stopped early.  `Runtime` is a genuine error;
/// `Return` is ordinary control flow riding the same channel so it can
/// unwind nested statements without bespoke plumbing.
#[derive(Debug, Error)]
pub enum InterpretError<'a> {
    #[error(transparent)]
    Runtime(#[from] LoxError),

    #[error("return signal")]
    Return(Value<'a>),
}

type IResult<'a, T> = Result<T, InterpretError<'a>>;

pub struct Interpreter<'a> {
    /// The root frame.  Persists across REPL lines.
    globals: Rc<RefCell<Environment<'a>>>,

    /// Frame currently in scope; always reachable-from `globals` via
    /// parent links.
    environment: Rc<RefCell<Environment<'a>>>,

    /// Resolution table: expression id → lexical hop count, populated by
    /// the resolver.  Ids absent here are globals, looked up by name at the
    /// root frame.
    locals: HashMap<usize, usize>,

    /// Where `print` writes.  Stdout normally; tests inject a buffer.
    output: Box<dyn Write>,
}

impl<'a> Interpreter<'a> {
    /// A fresh interpreter printing to stdout, with the native `clock`
    /// function pre-registered in the global frame.
    pub fn new() -> Self {
        Self::with_output(Box::new(io::stdout()))
    }

    pub fn with_output(output: Box<dyn Write>) -> Self {
        info!("initializing interpreter");

        let globals = Rc::new(RefCell::new(Environment::new()));

        globals.borrow_mut().define(
            "clock",
            Value::NativeFunction {
                name: "clock",
                arity: 0,
                func: |_args| Ok(Value::Number(Utc::now().timestamp_micros() as f64 / 1e6)),
            },
        );

        Self {
            environment: Rc::clone(&globals),
            globals,
            locals: HashMap::new(),
            output,
        }
    }

    /// Resolver callback: pin expression `id` to the frame `depth` hops out.
    pub fn note_local(&mut self, id: usize, depth: usize) {
        debug!("expr #{} resolved at depth {}", id, depth);

        self.locals.insert(id, depth);
    }

    /// Execute top-level statements in order.  The first runtime error
    /// halts the run and is handed back for reporting; subsequent calls
    /// (REPL lines) start clean against the same globals.
    pub fn interpret(&mut self, statements: &[Stmt<'a>]) -> crate::error::Result<()> {
        debug!("interpreting {} statement(s)", statements.len());

        for stmt in statements {
            match self.execute(stmt) {
                Ok(()) => {}

                // The resolver rejects top-level `return`; if one slips
                // through anyway, treat it as end-of-run.
                Err(InterpretError::Return(_)) => return Ok(()),

                Err(InterpretError::Runtime(e)) => return Err(e),
            }
        }

        Ok(())
    }

    // ──────────────────────── statement execution ────────────────────────

    fn execute(&mut self, stmt: &Stmt<'a>) -> IResult<'a, ()> {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;
                Ok(())
            }

            Stmt::Print(expr) => {
                let value = self.evaluate(expr)?;

                writeln!(self.output, "{}", value).map_err(LoxError::from)?;

                Ok(())
            }

            Stmt::Var { name, initializer } => {
                let value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };

                debug!("var '{}' = {}", name.lexeme, value);

                self.environment.borrow_mut().define(name.lexeme, value);

                Ok(())
            }

            Stmt::Block(statements) => {
                let enclosing = Rc::clone(&self.environment);
                self.execute_block(statements, Environment::with_enclosing(enclosing))
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if is_truthy(&self.evaluate(condition)?) {
                    self.execute(then_branch)
                } else if let Some(else_stmt) = else_branch {
                    self.execute(else_stmt)
                } else {
                    Ok(())
                }
            }

            Stmt::While { condition, body } => {
                while is_truthy(&self.evaluate(condition)?) {
                    self.execute(body)?;
                }

                Ok(())
            }

            Stmt::Function { name, params, body } => {
                // The closure is the frame current *now*, at declaration.
                let function = Value::Function {
                    name: name.lexeme.to_string(),
                    params: Rc::clone(params),
                    body: Rc::clone(body),
                    closure: Rc::clone(&self.environment),
                };

                debug!("defined fn '{}' ({} params)", name.lexeme, params.len());

                self.environment.borrow_mut().define(name.lexeme, function);

                Ok(())
            }

            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };

                Err(InterpretError::Return(value))
            }
        }
    }

    /// Run `statements` inside `environment`, restoring the previous frame
    /// no matter how execution leaves the block.
    fn execute_block(
        &mut self,
        statements: &[Stmt<'a>],
        environment: Environment<'a>,
    ) -> IResult<'a, ()> {
        let previous = std::mem::replace(
            &mut self.environment,
            Rc::new(RefCell::new(environment)),
        );

        let mut result = Ok(());

        for stmt in statements {
            result = self.execute(stmt);

            if result.is_err() {
                break;
            }
        }

        self.environment = previous;

        result
    }

    // ──────────────────────── expression evaluation ──────────────────────

    pub fn evaluate(&mut self, expr: &Expr<'a>) -> IResult<'a, Value<'a>> {
        match expr {
            Expr::Literal(lit) => Ok(literal_value(lit)),

            Expr::Grouping(inner) => self.evaluate(inner),

            Expr::Unary { operator, right } => self.evaluate_unary(operator, right),

            Expr::Binary {
                left,
                operator,
                right,
            } => self.evaluate_binary(left, operator, right),

            Expr::Logical {
                left,
                operator,
                right,
            } => self.evaluate_logical(left, operator, right),

            Expr::Variable { id, name } => self.look_up_variable(*id, name),

            Expr::Assign { id, name, value } => {
                let value = self.evaluate(value)?;

                match self.locals.get(id) {
                    Some(&distance) => Environment::assign_at(
                        &self.environment,
                        distance,
                        name.lexeme,
                        value.clone(),
                        name.line,
                    )?,

                    None => self.globals.borrow_mut().assign(
                        name.lexeme,
                        value.clone(),
                        name.line,
                    )?,
                }

                // Assignment is an expression; it yields the assigned value.
                Ok(value)
            }

            Expr::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee = self.evaluate(callee)?;

                let mut args = Vec::with_capacity(arguments.len());
                for arg in arguments {
                    args.push(self.evaluate(arg)?);
                }

                self.call_value(callee, paren, args)
            }
        }
    }

    fn evaluate_unary(
        &mut self,
        operator: &Token<'a>,
        right: &Expr<'a>,
    ) -> IResult<'a, Value<'a>> {
        let right = self.evaluate(right)?;

        match operator.token_type {
            TokenType::MINUS => match right {
                Value::Number(n) => Ok(Value::Number(-n)),

                _ => Err(LoxError::runtime(operator.line, "Operand must be a number.").into()),
            },

            TokenType::BANG => Ok(Value::Bool(!is_truthy(&right))),

            _ => Err(LoxError::runtime(operator.line, "Invalid unary operator.").into()),
        }
    }

    fn evaluate_binary(
        &mut self,
        left: &Expr<'a>,
        operator: &Token<'a>,
        right: &Expr<'a>,
    ) -> IResult<'a, Value<'a>> {
        let left = self.evaluate(left)?;
        let right = self.evaluate(right)?;

        match operator.token_type {
            TokenType::PLUS => match (left, right) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),

                (Value::Str(a), Value::Str(b)) => Ok(Value::Str(a + &b)),

                _ => Err(LoxError::runtime(
                    operator.line,
                    "Operands must be two numbers or two strings.",
                )
                .into()),
            },

            TokenType::MINUS => {
                let (a, b) = number_operands(operator, left, right)?;
                Ok(Value::Number(a - b))
            }

            TokenType::STAR => {
                let (a, b) = number_operands(operator, left, right)?;
                Ok(Value::Number(a * b))
            }

            // IEEE-754 semantics; dividing by zero yields an infinity, not
            // an error.
            TokenType::SLASH => {
                let (a, b) = number_operands(operator, left, right)?;
                Ok(Value::Number(a / b))
            }

            TokenType::GREATER => {
                let (a, b) = number_operands(operator, left, right)?;
                Ok(Value::Bool(a > b))
            }

            TokenType::GREATER_EQUAL => {
                let (a, b) = number_operands(operator, left, right)?;
                Ok(Value::Bool(a >= b))
            }

            TokenType::LESS => {
                let (a, b) = number_operands(operator, left, right)?;
                Ok(Value::Bool(a < b))
            }

            TokenType::LESS_EQUAL => {
                let (a, b) = number_operands(operator, left, right)?;
                Ok(Value::Bool(a <= b))
            }

            // Equality works across all value kinds; `Value::eq` encodes
            // the no-coercion rule.
            TokenType::EQUAL_EQUAL => Ok(Value::Bool(left == right)),

            TokenType::BANG_EQUAL => Ok(Value::Bool(left != right)),

            _ => Err(LoxError::runtime(operator.line, "Invalid binary operator.").into()),
        }
    }

    /// `and` / `or` evaluate the left operand and return it unevaluated-right
    /// if it already decides the result by truthiness.
    fn evaluate_logical(
        &mut self,
        left: &Expr<'a>,
        operator: &Token<'a>,
        right: &Expr<'a>,
    ) -> IResult<'a, Value<'a>> {
        let left = self.evaluate(left)?;

        let short_circuits = match operator.token_type {
            TokenType::OR => is_truthy(&left),
            _ => !is_truthy(&left), // AND
        };

        if short_circuits {
            Ok(left)
        } else {
            self.evaluate(right)
        }
    }

    fn look_up_variable(&self, id: usize, name: &Token<'a>) -> IResult<'a, Value<'a>> {
        let value = match self.locals.get(&id) {
            Some(&distance) => {
                Environment::get_at(&self.environment, distance, name.lexeme, name.line)?
            }

            None => self.globals.borrow().get(name.lexeme, name.line)?,
        };

        Ok(value)
    }

    // ───────────────────────────── calls ─────────────────────────────────

    fn call_value(
        &mut self,
        callee: Value<'a>,
        paren: &Token<'a>,
        args: Vec<Value<'a>>,
    ) -> IResult<'a, Value<'a>> {
        match callee {
            Value::NativeFunction { name, arity, func } => {
                check_arity(arity, args.len(), paren)?;

                debug!("calling native fn '{}'", name);

                func(&args)
                    .map_err(|msg| LoxError::runtime(paren.line, msg).into())
            }

            Value::Function {
                name,
                params,
                body,
                closure,
            } => {
                check_arity(params.len(), args.len(), paren)?;

                debug!("calling fn '{}'", name);

                // Parameters live in a frame chained onto the *closure*,
                // not onto the caller's frame.
                let mut environment = Environment::with_enclosing(closure);

                for (param, arg) in params.iter().zip(args) {
                    environment.define(param.lexeme, arg);
                }

                match self.execute_block(&body, environment) {
                    Ok(()) => Ok(Value::Nil),

                    Err(InterpretError::Return(value)) => Ok(value),

                    Err(e) => Err(e),
                }
            }

            _ => Err(LoxError::runtime(paren.line, "Can only call functions.").into()),
        }
    }
}

impl<'a> Default for Interpreter<'a> {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────── helpers ─────────────────────────────────

fn literal_value<'a>(lit: &LiteralValue) -> Value<'a> {
    match lit {
        LiteralValue::Number(n) => Value::Number(*n),
        LiteralValue::Str(s) => Value::Str(s.clone()),
        LiteralValue::True => Value::Bool(true),
        LiteralValue::False => Value::Bool(false),
        LiteralValue::Nil => Value::Nil,
    }
}

/// `nil` and `false` are falsy; everything else, including `0` and `""`,
/// is truthy.
fn is_truthy(value: &Value<'_>) -> bool {
    !matches!(value, Value::Nil | Value::Bool(false))
}

fn number_operands<'a>(
    operator: &Token<'_>,
    left: Value<'a>,
    right: Value<'a>,
) -> IResult<'a, (f64, f64)> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok((a, b)),

        _ => Err(LoxError::runtime(operator.line, "Operands must be numbers.").into()),
    }
}

fn check_arity<'a>(expected: usize, got: usize, paren: &Token<'_>) -> IResult<'a, ()> {
    if expected != got {
        return Err(LoxError::runtime(
            paren.line,
            format!("Expected {} arguments but got {}.", expected, got),
        )
        .into());
    }

    Ok(())
}
