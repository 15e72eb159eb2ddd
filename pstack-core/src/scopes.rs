//! The dictionary stack: an ordered chain of nested lookup scopes.
//!
//! The chain is seeded with two scopes — a bottom "system" scope and a top
//! "user" scope — and never shrinks below that floor. `begin` pushes a
//! dictionary *value* as the innermost scope (the dictionary object itself,
//! so definitions made while it is current mutate it), `end` pops.
//!
//! A [`Snapshot`] is an independent copy of the whole chain: each scope's
//! name-to-value map is copied, the values inside are shared. Swapping the
//! live chain for a snapshot and back is the mechanism behind lexical
//! capture.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::{ErrorKind, EvalError, EvalResult};
use crate::value::{DictMap, DictRef, Value};

/// The two seed scopes that can never be popped.
const FLOOR: usize = 2;

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

/// A captured copy of a scope chain.
///
/// The mapping structure of every scope is copied at capture time; later
/// mutation of the live chain cannot affect a snapshot. Values held inside
/// the scopes are shared, not cloned.
#[derive(Debug, Clone)]
pub struct Snapshot {
    scopes: Vec<DictRef>,
}

impl Snapshot {
    /// Fresh scope handles with copied maps, suitable for installing as a
    /// live chain without exposing the snapshot itself to mutation.
    #[must_use]
    pub fn duplicate(&self) -> Vec<DictRef> {
        self.scopes.iter().map(copy_scope).collect()
    }
}

fn copy_scope(scope: &DictRef) -> DictRef {
    Rc::new(RefCell::new(scope.borrow().clone()))
}

// ---------------------------------------------------------------------------
// Scope chain
// ---------------------------------------------------------------------------

/// The dictionary stack. Bottom is the outermost scope, top the innermost.
#[derive(Debug)]
pub struct ScopeChain {
    scopes: Vec<DictRef>,
}

impl ScopeChain {
    /// Create a chain with its two seed scopes (system below, user above).
    #[must_use]
    pub fn new() -> Self {
        Self {
            scopes: vec![new_scope(), new_scope()],
        }
    }

    /// Number of scopes on the chain.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// The base user scope: the scope sitting directly on the floor, where
    /// operator registration publishes introspectable bindings.
    #[must_use]
    pub fn base_user_scope(&self) -> &DictRef {
        &self.scopes[1]
    }

    /// The innermost scope.
    #[must_use]
    pub fn top(&self) -> &DictRef {
        self.scopes.last().expect("chain never drops below floor")
    }

    /// Insert or overwrite `name` in the topmost scope only.
    pub fn define(&mut self, name: &str, value: Value) {
        self.top().borrow_mut().insert(name.to_owned(), value);
    }

    /// Overwrite `name` in the nearest scope that already binds it.
    ///
    /// Unlike `define`, this never creates a new binding: an unbound name
    /// fails with `undefined`.
    pub fn store(&mut self, name: &str, value: Value) -> EvalResult<()> {
        for scope in self.scopes.iter().rev() {
            let mut map = scope.borrow_mut();
            if map.contains_key(name) {
                map.insert(name.to_owned(), value);
                return Ok(());
            }
        }
        Err(EvalError::new(ErrorKind::Undefined, name))
    }

    /// The nearest scope binding `name`, searching top to bottom.
    ///
    /// Absence is not an error; callers branch on it.
    #[must_use]
    pub fn where_defined(&self, name: &str) -> Option<DictRef> {
        self.scopes
            .iter()
            .rev()
            .find(|scope| scope.borrow().contains_key(name))
            .cloned()
    }

    /// Resolve `name` top to bottom, returning the first match.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<Value> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.borrow().get(name).cloned())
    }

    /// Push a dictionary as the new innermost scope.
    pub fn begin(&mut self, scope: DictRef) {
        self.scopes.push(scope);
    }

    /// Pop the innermost scope. The two seed scopes are never removed.
    pub fn end(&mut self) -> EvalResult<()> {
        if self.scopes.len() <= FLOOR {
            return Err(EvalError::new(
                ErrorKind::DictStackUnderflow,
                "cannot pop a seed scope",
            ));
        }
        self.scopes.pop();
        Ok(())
    }

    /// Capture an independent copy of the whole chain.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            scopes: self.scopes.iter().map(copy_scope).collect(),
        }
    }

    /// Substitute the entire live chain, returning the displaced scopes so
    /// the caller can restore them.
    pub fn replace(&mut self, scopes: Vec<DictRef>) -> Vec<DictRef> {
        std::mem::replace(&mut self.scopes, scopes)
    }
}

impl Default for ScopeChain {
    fn default() -> Self {
        Self::new()
    }
}

fn new_scope() -> DictRef {
    Rc::new(RefCell::new(DictMap::default()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn starts_with_two_scopes() {
        let chain = ScopeChain::new();
        assert_eq!(chain.depth(), 2);
    }

    #[test]
    fn define_targets_innermost_scope() {
        let mut chain = ScopeChain::new();
        chain.define("x", Value::Integer(1));
        chain.begin(new_scope());
        chain.define("x", Value::Integer(2));
        assert_eq!(chain.lookup("x"), Some(Value::Integer(2)));
        chain.end().unwrap();
        assert_eq!(chain.lookup("x"), Some(Value::Integer(1)));
    }

    #[test]
    fn store_updates_nearest_existing_binding() {
        let mut chain = ScopeChain::new();
        chain.define("x", Value::Integer(1));
        chain.begin(new_scope());
        chain.store("x", Value::Integer(9)).unwrap();
        // The inner scope must not have gained a binding.
        assert!(!chain.top().borrow().contains_key("x"));
        chain.end().unwrap();
        assert_eq!(chain.lookup("x"), Some(Value::Integer(9)));
    }

    #[test]
    fn store_unbound_name_is_undefined() {
        let mut chain = ScopeChain::new();
        let err = chain.store("ghost", Value::Null).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Undefined);
    }

    #[test]
    fn where_defined_finds_nearest_scope() {
        let mut chain = ScopeChain::new();
        chain.define("x", Value::Integer(1));
        chain.begin(new_scope());
        chain.define("x", Value::Integer(2));
        let scope = chain.where_defined("x").unwrap();
        assert!(Rc::ptr_eq(&scope, chain.top()));
        assert!(chain.where_defined("ghost").is_none());
    }

    #[test]
    fn end_at_floor_underflows() {
        let mut chain = ScopeChain::new();
        let err = chain.end().unwrap_err();
        assert_eq!(err.kind, ErrorKind::DictStackUnderflow);
        assert_eq!(chain.depth(), 2, "floor scopes must survive");
    }

    #[test]
    fn snapshot_is_independent_of_later_mutation() {
        let mut chain = ScopeChain::new();
        chain.define("x", Value::Integer(1));
        let snap = chain.snapshot();
        chain.define("x", Value::Integer(2));

        let live = chain.replace(snap.duplicate());
        assert_eq!(chain.lookup("x"), Some(Value::Integer(1)));
        chain.replace(live);
        assert_eq!(chain.lookup("x"), Some(Value::Integer(2)));
    }

    #[test]
    fn duplicate_shields_snapshot_from_installed_chain() {
        let mut chain = ScopeChain::new();
        chain.define("x", Value::Integer(1));
        let snap = chain.snapshot();

        // Mutate an installed duplicate, then install a second duplicate:
        // the second must still see the capture-time binding.
        let live = chain.replace(snap.duplicate());
        chain.define("x", Value::Integer(99));
        chain.replace(snap.duplicate());
        assert_eq!(chain.lookup("x"), Some(Value::Integer(1)));
        chain.replace(live);
    }

    #[test]
    fn begin_shares_the_dictionary_object() {
        let mut chain = ScopeChain::new();
        let dict = new_scope();
        chain.begin(Rc::clone(&dict));
        chain.define("k", Value::Integer(5));
        // Defining while the dict is current mutates the dict value itself.
        assert_eq!(dict.borrow().get("k"), Some(&Value::Integer(5)));
    }
}
