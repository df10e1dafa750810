//! Name-to-function lookup for building call expressions.

use std::collections::HashMap;

use reticle_foundation::{Error, Result, Value};

use super::native::BUILTINS;
use super::{Expr, NativeFn};

/// Registered functions, seeded with the builtins.
#[derive(Clone, Debug)]
pub struct FunctionRegistry {
    functions: HashMap<&'static str, NativeFn>,
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FunctionRegistry {
    /// Creates a registry holding every builtin.
    #[must_use]
    pub fn new() -> Self {
        Self {
            functions: BUILTINS.iter().map(|f| (f.name, *f)).collect(),
        }
    }

    /// Registers a function, replacing any previous one of the same name.
    pub fn register(&mut self, name: &'static str, func: fn(&[Value]) -> Result<Value>) {
        self.functions.insert(name, NativeFn::new(name, func));
    }

    /// Looks up a function.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<NativeFn> {
        self.functions.get(name).copied()
    }

    /// Returns true if a function with this name is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Builds a call expression.
    ///
    /// # Errors
    ///
    /// Returns `UndefinedFunction` for unknown names.
    pub fn call(&self, name: &str, args: Vec<Expr>) -> Result<Expr> {
        self.get(name)
            .map(|f| Expr::Call(f, args))
            .ok_or_else(|| Error::undefined_function(name))
    }

    /// Returns the number of registered functions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// Returns true if no functions are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}
