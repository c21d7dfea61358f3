//! Environment frames and the call transaction.
//!
//! A frame is a flat name → value map shared by reference. Calling a
//! closure never writes to the closure's captured frame directly: the
//! call runs against a [`Transaction`]'s working copy, and only
//! [`Transaction::commit`] writes the bindings back. Dropping a
//! transaction without committing discards every write made during the
//! call.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::value::Value;

#[derive(Clone, Default)]
pub struct Environment {
    frame: Rc<RefCell<HashMap<String, Value>>>,
}

impl Environment {
    pub fn new() -> Self {
        Environment::default()
    }

    pub fn from_bindings(bindings: impl IntoIterator<Item = (String, Value)>) -> Self {
        Environment {
            frame: Rc::new(RefCell::new(bindings.into_iter().collect())),
        }
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.frame.borrow().get(name).cloned()
    }

    /// Like [`Environment::get`], but an absent name is `Value::Nothing`.
    pub fn lookup(&self, name: &str) -> Value {
        self.get(name).unwrap_or_default()
    }

    pub fn set(&self, name: impl Into<String>, value: Value) {
        self.frame.borrow_mut().insert(name.into(), value);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.frame.borrow().contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.frame.borrow().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.frame.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when both handles refer to the same frame.
    pub fn same_frame(&self, other: &Environment) -> bool {
        Rc::ptr_eq(&self.frame, &other.frame)
    }

    /// Independent shallow copy: bindings are copied, but arrays and
    /// objects they hold stay shared.
    pub fn snapshot(&self) -> Environment {
        Environment {
            frame: Rc::new(RefCell::new(self.frame.borrow().clone())),
        }
    }

    /// Open a transaction whose working frame starts as a copy of `self`.
    pub fn begin(&self) -> Transaction<'_> {
        Transaction {
            target: self,
            working: self.snapshot(),
        }
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("names", &self.names())
            .finish()
    }
}

/// A working frame that is merged back into its target only on commit.
#[must_use = "a transaction that is dropped rolls back"]
pub struct Transaction<'a> {
    target: &'a Environment,
    working: Environment,
}

impl Transaction<'_> {
    pub fn working(&self) -> &Environment {
        &self.working
    }

    /// Copy every binding of the working frame onto the target.
    pub fn commit(self) {
        let working = self.working.frame.borrow();
        let mut target = self.target.frame.borrow_mut();
        for (name, value) in working.iter() {
            target.insert(name.clone(), value.clone());
        }
    }
}
