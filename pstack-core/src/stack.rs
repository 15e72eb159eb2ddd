//! The operand stack.
//!
//! A LIFO sequence of [`Value`]s with the typed-pop accessors every operator
//! uses. Typed pops fail with `typecheck` when the popped value has the
//! wrong variant; plain pops fail with `stackunderflow` when the stack is
//! empty. There is no upper bound other than host memory.

use std::rc::Rc;

use crate::error::{ErrorKind, EvalError, EvalResult};
use crate::value::{ArrayRef, DictRef, Name, Procedure, StringRef, Value};

/// The operand stack, owned exclusively by one engine instance.
#[derive(Debug, Default)]
pub struct OperandStack {
    values: Vec<Value>,
}

impl OperandStack {
    /// Create an empty stack.
    #[must_use]
    pub const fn new() -> Self {
        Self { values: Vec::new() }
    }

    /// Push a value.
    pub fn push(&mut self, value: Value) {
        self.values.push(value);
    }

    /// Remove and return the top value.
    pub fn pop(&mut self) -> EvalResult<Value> {
        self.values
            .pop()
            .ok_or_else(|| EvalError::new(ErrorKind::StackUnderflow, "operand stack is empty"))
    }

    /// Return the top value without removing it.
    pub fn peek(&self) -> EvalResult<&Value> {
        self.values
            .last()
            .ok_or_else(|| EvalError::new(ErrorKind::StackUnderflow, "operand stack is empty"))
    }

    /// Remove all values.
    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// Number of values on the stack.
    #[must_use]
    pub fn count(&self) -> usize {
        self.values.len()
    }

    /// Whether the stack is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The values bottom-to-top, as the stack-shuffling operators see them.
    #[must_use]
    pub fn as_slice(&self) -> &[Value] {
        &self.values
    }

    /// Iterate the values top-to-bottom.
    pub fn iter_top_down(&self) -> impl Iterator<Item = &Value> {
        self.values.iter().rev()
    }

    // =======================================================================
    // Typed pops
    // =======================================================================

    /// Pop a numeric operand as a float.
    pub fn pop_number(&mut self) -> EvalResult<f64> {
        let v = self.pop()?;
        v.as_number()
            .ok_or_else(|| type_mismatch("number", &v))
    }

    /// Pop an integral operand. Reals are truncated toward zero.
    pub fn pop_integer(&mut self) -> EvalResult<i64> {
        match self.pop()? {
            Value::Integer(i) => Ok(i),
            Value::Real(r) => Ok(r as i64),
            other => Err(type_mismatch("integer", &other)),
        }
    }

    /// Pop a boolean operand.
    pub fn pop_boolean(&mut self) -> EvalResult<bool> {
        let v = self.pop()?;
        v.as_boolean().ok_or_else(|| type_mismatch("boolean", &v))
    }

    /// Pop a name operand, literal or executable.
    pub fn pop_name(&mut self) -> EvalResult<Name> {
        match self.pop()? {
            Value::Name(n) => Ok(n),
            other => Err(type_mismatch("name", &other)),
        }
    }

    /// Pop a string operand.
    pub fn pop_string(&mut self) -> EvalResult<StringRef> {
        match self.pop()? {
            Value::String(s) => Ok(s),
            other => Err(type_mismatch("string", &other)),
        }
    }

    /// Pop an array operand.
    pub fn pop_array(&mut self) -> EvalResult<ArrayRef> {
        match self.pop()? {
            Value::Array(a) => Ok(a),
            other => Err(type_mismatch("array", &other)),
        }
    }

    /// Pop a dictionary operand.
    pub fn pop_dict(&mut self) -> EvalResult<DictRef> {
        match self.pop()? {
            Value::Dict(d) => Ok(d),
            other => Err(type_mismatch("dict", &other)),
        }
    }

    /// Pop a procedure operand.
    pub fn pop_procedure(&mut self) -> EvalResult<Rc<Procedure>> {
        match self.pop()? {
            Value::Procedure(p) => Ok(p),
            other => Err(type_mismatch("procedure", &other)),
        }
    }

    // =======================================================================
    // Numeric combinator
    // =======================================================================

    /// Pop two numeric operands, apply a binary float operation, and push
    /// the result re-promoted to an integer when it is exactly integral.
    ///
    /// This preserves integer-in/integer-out arithmetic while allowing
    /// mixed integer/real operands.
    pub fn binary_numeric<F>(&mut self, op: F) -> EvalResult<()>
    where
        F: FnOnce(f64, f64) -> f64,
    {
        let b = self.pop_number()?;
        let a = self.pop_number()?;
        self.push(Value::promoted(op(a, b)));
        Ok(())
    }
}

fn type_mismatch(expected: &str, got: &Value) -> EvalError {
    EvalError::new(
        ErrorKind::TypeCheck,
        format!("expected {expected}, got {}", got.ty()),
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
