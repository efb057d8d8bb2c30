//! Chained, mutable variable scopes.
//!
//! Scopes are shared through `Rc<RefCell<_>>`: a block or call owns its scope
//! while it runs, and any closure created inside keeps it alive afterwards.
//! Every holder sees the same bindings, so a mutation through one closure is
//! visible through all of them.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use log::debug;

use crate::ast::Ident;
use crate::error::RuntimeError;
use crate::value::Value;

/// Shared handle to one scope in the chain.
pub type EnvRef = Rc<RefCell<Environment>>;

#[derive(Debug, Default)]
pub struct Environment {
    values: HashMap<String, Value>,
    enclosing: Option<EnvRef>,
}

impl Environment {
    /// A fresh root scope.
    pub fn new() -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: None,
        }
    }

    pub fn with_enclosing(enclosing: EnvRef) -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        }
    }

    /// Wrap `self` in the shared handle the interpreter passes around.
    pub fn into_ref(self) -> EnvRef {
        Rc::new(RefCell::new(self))
    }

    pub fn enclosing(&self) -> Option<&EnvRef> {
        self.enclosing.as_ref()
    }

    /// Bind `name` in this scope, overwriting any local binding of the same name.
    pub fn define(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    /// Nearest binding of `name`, searching outward to the root.
    pub fn get(&self, name: &Ident) -> Result<Value, RuntimeError> {
        if let Some(value) = self.values.get(&name.name) {
            Ok(value.clone())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow().get(name)
        } else {
            Err(RuntimeError::undefined(&name.name, name.line))
        }
    }

    /// Overwrite the nearest existing binding of `name`.  Never creates one.
    pub fn assign(&mut self, name: &Ident, value: Value) -> Result<(), RuntimeError> {
        if let Some(slot) = self.values.get_mut(&name.name) {
            *slot = value;
            Ok(())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow_mut().assign(name, value)
        } else {
            Err(RuntimeError::undefined(&name.name, name.line))
        }
    }

    /// The scope exactly `distance` links up from `env`.
    ///
    /// # Panics
    ///
    /// If the chain is shorter than `distance`.  Distances come from the
    /// resolver, so a short chain means the two passes disagree about scoping.
    pub fn ancestor(env: &EnvRef, distance: usize) -> EnvRef {
        let mut current: EnvRef = Rc::clone(env);

        for _ in 0..distance {
            let parent: EnvRef = match current.borrow().enclosing.as_ref() {
                Some(parent) => Rc::clone(parent),
                None => panic!("resolved distance {} exceeds environment depth", distance),
            };
            current = parent;
        }

        current
    }

    /// Read `name` from the scope `distance` links up, without searching.
    ///
    /// # Panics
    ///
    /// If that scope has no binding for `name`; see [`Environment::ancestor`].
    pub fn get_at(env: &EnvRef, distance: usize, name: &Ident) -> Value {
        let scope: EnvRef = Self::ancestor(env, distance);
        let scope = scope.borrow();

        debug!("get_at({}, '{}')", distance, name.name);

        match scope.values.get(&name.name) {
            Some(value) => value.clone(),
            None => panic!(
                "resolved variable '{}' missing at distance {}",
                name.name, distance
            ),
        }
    }

    /// Overwrite `name` in the scope `distance` links up, without searching.
    pub fn assign_at(env: &EnvRef, distance: usize, name: &Ident, value: Value) {
        debug!("assign_at({}, '{}')", distance, name.name);

        Self::ancestor(env, distance)
            .borrow_mut()
            .values
            .insert(name.name.clone(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(name: &str) -> Ident {
        Ident::new(name, 1)
    }

    #[test]
    fn get_walks_outward_to_the_nearest_binding() {
        let global: EnvRef = Environment::new().into_ref();
        global.borrow_mut().define("a", Value::Number(1.0));

        let local: EnvRef = Environment::with_enclosing(Rc::clone(&global)).into_ref();

        assert_eq!(local.borrow().get(&ident("a")).unwrap(), Value::Number(1.0));

        local.borrow_mut().define("a", Value::Number(2.0));
        assert_eq!(local.borrow().get(&ident("a")).unwrap(), Value::Number(2.0));
        assert_eq!(global.borrow().get(&ident("a")).unwrap(), Value::Number(1.0));
    }

    #[test]
    fn assign_mutates_the_owning_scope_and_never_defines() {
        let global: EnvRef = Environment::new().into_ref();
        global.borrow_mut().define("a", Value::Nil);

        let local: EnvRef = Environment::with_enclosing(Rc::clone(&global)).into_ref();
        local
            .borrow_mut()
            .assign(&ident("a"), Value::Bool(true))
            .unwrap();

        assert_eq!(global.borrow().get(&ident("a")).unwrap(), Value::Bool(true));

        let err = local
            .borrow_mut()
            .assign(&ident("missing"), Value::Nil)
            .unwrap_err();
        assert!(matches!(err, RuntimeError::UndefinedVariable { ref name, .. } if name == "missing"));
        assert!(local.borrow().get(&ident("missing")).is_err());
    }

    #[test]
    fn distance_access_skips_shadowing_scopes() {
        let outer: EnvRef = Environment::new().into_ref();
        outer.borrow_mut().define("x", Value::Number(1.0));

        let inner: EnvRef = Environment::with_enclosing(Rc::clone(&outer)).into_ref();
        inner.borrow_mut().define("x", Value::Number(2.0));

        assert_eq!(Environment::get_at(&inner, 0, &ident("x")), Value::Number(2.0));
        assert_eq!(Environment::get_at(&inner, 1, &ident("x")), Value::Number(1.0));

        Environment::assign_at(&inner, 1, &ident("x"), Value::Number(3.0));
        assert_eq!(Environment::get_at(&outer, 0, &ident("x")), Value::Number(3.0));
        assert_eq!(Environment::get_at(&inner, 0, &ident("x")), Value::Number(2.0));
    }

    #[test]
    #[should_panic(expected = "exceeds environment depth")]
    fn distance_past_the_root_is_a_defect() {
        let root: EnvRef = Environment::new().into_ref();
        Environment::ancestor(&root, 1);
    }
}
