use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::environment::Environment;
use crate::parser::Stmt;
use crate::token::Token;

/// A runtime value: the five kinds the language knows about, with both
/// callable flavours folded in as variants (the callable set is closed, so
/// an open trait object buys nothing over exhaustive matching).
///
/// `Function` is created when a `fun` declaration executes; it shares the
/// declaration's parameter list and body via `Rc` and captures the
/// environment frame that was current at that moment — its closure.
#[derive(Debug, Clone)]
pub enum Value<'a> {
    Nil,

    Bool(bool),

    Number(f64),

    Str(String),

    /// User-defined function plus its defining-time environment.
    Function {
        name: String,
        params: Rc<Vec<&'a Token<'a>>>,
        body: Rc<Vec<Stmt<'a>>>,
        closure: Rc<RefCell<Environment<'a>>>,
    },

    /// Host-implemented function with a fixed arity.
    NativeFunction {
        name: &'static str,
        arity: usize,
        func: fn(&[Value<'a>]) -> Result<Value<'a>, String>,
    },
}

impl<'a> PartialEq for Value<'a> {
    /// Value equality as the language defines it: `nil` equals only `nil`,
    /// no cross-kind coercion, and functions are equal only to themselves.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,

            (Value::Bool(a), Value::Bool(b)) => a == b,

            (Value::Number(a), Value::Number(b)) => a == b,

            (Value::Str(a), Value::Str(b)) => a == b,

            (
                Value::Function { body: a, .. },
                Value::Function { body: b, .. },
            ) => Rc::ptr_eq(a, b),

            (
                Value::NativeFunction {
                    name: a, func: fa, ..
                },
                Value::NativeFunction {
                    name: b, func: fb, ..
                },
            ) => a == b && fa == fb,

            _ => false,
        }
    }
}

impl<'a> fmt::Display for Value<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),

            Value::Bool(b) => write!(f, "{}", b),

            // Mathematically integral numbers print without a trailing `.0`.
            Value::Number(n) => {
                if n.fract() == 0.0 {
                    write!(f, "{:.0}", n)
                } else {
                    write!(f, "{}", n)
                }
            }

            Value::Str(s) => write!(f, "{}", s),

            Value::Function { name, .. } => write!(f, "<fn {}>", name),

            Value::NativeFunction { name, .. } => write!(f, "<native fn {}>", name),
        }
    }
}
