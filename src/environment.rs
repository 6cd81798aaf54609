//! The runtime realization of lexical scope: a chain of mutable binding
//! frames linked child-to-parent.  Frames are shared (`Rc<RefCell<..>>`)
//! because any number of closures may capture the same frame and mutation
//! through one must be visible through all.  Links only ever point outward,
//! so reference counting cannot leak a cycle.

use crate::error::{LoxError, Result};
use crate::value::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

#[derive(Debug, Default)]
pub struct Environment<'a> {
    values: HashMap<&'a str, Value<'a>>,
    enclosing: Option<Rc<RefCell<Environment<'a>>>>,
}

impl<'a> Environment<'a> {
    /// The global frame: no parent.
    pub fn new() -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: None,
        }
    }

    /// A fresh frame nested inside `enclosing` (block entry, function call).
    pub fn with_enclosing(enclosing: Rc<RefCell<Environment<'a>>>) -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        }
    }

    /// Bind `name` in *this* frame, silently overwriting any existing
    /// binding — redeclaration with `var` is legal at runtime.
    pub fn define(&mut self, name: &'a str, value: Value<'a>) {
        self.values.insert(name, value);
    }

    /// Read `name`, walking outward through parent frames.
    pub fn get(&self, name: &str, line: usize) -> Result<Value<'a>> {
        if let Some(value) = self.values.get(name) {
            Ok(value.clone())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow().get(name, line)
        } else {
            Err(undefined(name, line))
        }
    }

    /// Mutate the nearest existing binding of `name`.  Assignment never
    /// creates a binding; that is `define`'s job.
    pub fn assign(&mut self, name: &str, value: Value<'a>, line: usize) -> Result<()> {
        if let Some(slot) = self.values.get_mut(name) {
            *slot = value;
            Ok(())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow_mut().assign(name, value, line)
        } else {
            Err(undefined(name, line))
        }
    }

    /// Read `name` from the frame exactly `distance` hops out.  Used by the
    /// interpreter for references the resolver pinned to a local binding;
    /// intermediate frames are not searched.
    pub fn get_at(
        env: &Rc<RefCell<Environment<'a>>>,
        distance: usize,
        name: &str,
        line: usize,
    ) -> Result<Value<'a>> {
        let frame = Self::ancestor(env, distance);
        let value = frame.borrow().values.get(name).cloned();

        value.ok_or_else(|| undefined(name, line))
    }

    /// Counterpart of [`Environment::get_at`] for assignment.
    pub fn assign_at(
        env: &Rc<RefCell<Environment<'a>>>,
        distance: usize,
        name: &str,
        value: Value<'a>,
        line: usize,
    ) -> Result<()> {
        let frame = Self::ancestor(env, distance);
        let mut frame = frame.borrow_mut();

        match frame.values.get_mut(name) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }

            None => Err(undefined(name, line)),
        }
    }

    /// Walk `distance` parent links.  The resolver guarantees the chain is
    /// deep enough; if it is not, the subsequent name lookup fails with an
    /// ordinary undefined-variable error rather than a panic.
    fn ancestor(
        env: &Rc<RefCell<Environment<'a>>>,
        distance: usize,
    ) -> Rc<RefCell<Environment<'a>>> {
        let mut frame = Rc::clone(env);

        for _ in 0..distance {
            let parent = frame.borrow().enclosing.clone();

            match parent {
                Some(p) => frame = p,
                None => break,
            }
        }

        frame
    }
}

fn undefined(name: &str, line: usize) -> LoxError {
    LoxError::runtime(line, format!("Undefined variable '{}'.", name))
}
