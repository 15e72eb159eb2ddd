//! The operator library.
//!
//! Every native operator is a plain function over the engine, registered by
//! name at engine construction. Operators are uniform: pop operands, act,
//! push results; failures surface as tagged errors and are never retried.

use std::io::Write;
use std::rc::Rc;

use crate::error::{ErrorKind, EvalError, EvalResult};
use crate::interpreter::{control, Interpreter, OperatorFn, ScopingMode};
use crate::value::{DictMap, Value};

/// Install the full operator library.
pub(super) fn install(interp: &mut Interpreter) {
    let table: &[(&str, OperatorFn)] = &[
        // Arithmetic
        ("add", op_add),
        ("sub", op_sub),
        ("mul", op_mul),
        ("div", op_div),
        ("idiv", op_idiv),
        ("mod", op_mod),
        ("neg", op_neg),
        ("abs", op_abs),
        ("sqrt", op_sqrt),
        ("ceiling", op_ceiling),
        ("floor", op_floor),
        ("round", op_round),
        // Comparison and logic
        ("eq", op_eq),
        ("ne", op_ne),
        ("gt", op_gt),
        ("lt", op_lt),
        ("ge", op_ge),
        ("le", op_le),
        ("and", op_and),
        ("or", op_or),
        ("not", op_not),
        // Operand stack
        ("dup", op_dup),
        ("pop", op_pop),
        ("exch", op_exch),
        ("clear", op_clear),
        ("count", op_count),
        ("copy", op_copy),
        ("index", op_index),
        // Dictionaries and scopes
        ("dict", op_dict),
        ("begin", op_begin),
        ("end", op_end),
        ("def", op_def),
        ("store", op_store),
        ("load", op_load),
        ("where", op_where),
        ("known", op_known),
        // Composite values
        ("array", op_array),
        ("string", op_string),
        ("length", op_length),
        ("get", op_get),
        ("put", op_put),
        ("getinterval", op_getinterval),
        ("putinterval", op_putinterval),
        ("aload", op_aload),
        ("null", op_null),
        // Control flow
        ("if", control::op_if),
        ("ifelse", control::op_ifelse),
        ("repeat", control::op_repeat),
        ("for", control::op_for),
        ("forall", control::op_forall),
        ("exec", control::op_exec),
        ("quit", control::op_quit),
        // Output
        ("print", op_print),
        ("=", op_show),
        ("==", op_show),
        ("pstack", op_pstack),
    ];
    for (name, op) in table {
        interp.register_operator(name, *op);
    }
}

// ===========================================================================
// Arithmetic
// ===========================================================================

fn op_add(interp: &mut Interpreter) -> EvalResult<()> {
    interp.stack_mut().binary_numeric(|a, b| a + b)
}

fn op_sub(interp: &mut Interpreter) -> EvalResult<()> {
    interp.stack_mut().binary_numeric(|a, b| a - b)
}

fn op_mul(interp: &mut Interpreter) -> EvalResult<()> {
    interp.stack_mut().binary_numeric(|a, b| a * b)
}

fn op_div(interp: &mut Interpreter) -> EvalResult<()> {
    let b = interp.stack_mut().pop_number()?;
    let a = interp.stack_mut().pop_number()?;
    if b == 0.0 {
        return Err(EvalError::new(ErrorKind::RangeCheck, "division by zero"));
    }
    interp.stack_mut().push(Value::promoted(a / b));
    Ok(())
}

fn op_idiv(interp: &mut Interpreter) -> EvalResult<()> {
    let b = interp.stack_mut().pop_integer()?;
    let a = interp.stack_mut().pop_integer()?;
    let quotient = a
        .checked_div(b)
        .ok_or_else(|| EvalError::new(ErrorKind::RangeCheck, "division by zero"))?;
    interp.stack_mut().push(Value::Integer(quotient));
    Ok(())
}

fn op_mod(interp: &mut Interpreter) -> EvalResult<()> {
    let b = interp.stack_mut().pop_integer()?;
    let a = interp.stack_mut().pop_integer()?;
    let remainder = a
        .checked_rem(b)
        .ok_or_else(|| EvalError::new(ErrorKind::RangeCheck, "division by zero"))?;
    interp.stack_mut().push(Value::Integer(remainder));
    Ok(())
}

fn op_neg(interp: &mut Interpreter) -> EvalResult<()> {
    let v = match interp.stack_mut().pop()? {
        Value::Integer(i) => Value::Integer(
            i.checked_neg()
                .ok_or_else(|| EvalError::new(ErrorKind::RangeCheck, "integer overflow"))?,
        ),
        Value::Real(r) => Value::Real(-r),
        other => return Err(numeric_mismatch(&other)),
    };
    interp.stack_mut().push(v);
    Ok(())
}

fn op_abs(interp: &mut Interpreter) -> EvalResult<()> {
    let v = match interp.stack_mut().pop()? {
        Value::Integer(i) => Value::Integer(
            i.checked_abs()
                .ok_or_else(|| EvalError::new(ErrorKind::RangeCheck, "integer overflow"))?,
        ),
        Value::Real(r) => Value::Real(r.abs()),
        other => return Err(numeric_mismatch(&other)),
    };
    interp.stack_mut().push(v);
    Ok(())
}

fn op_sqrt(interp: &mut Interpreter) -> EvalResult<()> {
    let n = interp.stack_mut().pop_number()?;
    if n < 0.0 {
        return Err(EvalError::new(
            ErrorKind::RangeCheck,
            "square root of a negative number",
        ));
    }
    interp.stack_mut().push(Value::promoted(n.sqrt()));
    Ok(())
}

fn op_ceiling(interp: &mut Interpreter) -> EvalResult<()> {
    rounding(interp, f64::ceil)
}

fn op_floor(interp: &mut Interpreter) -> EvalResult<()> {
    rounding(interp, f64::floor)
}

fn op_round(interp: &mut Interpreter) -> EvalResult<()> {
    rounding(interp, f64::round)
}

fn rounding(interp: &mut Interpreter, f: fn(f64) -> f64) -> EvalResult<()> {
    let v = match interp.stack_mut().pop()? {
        v @ Value::Integer(_) => v,
        Value::Real(r) => Value::promoted(f(r)),
        other => return Err(numeric_mismatch(&other)),
    };
    interp.stack_mut().push(v);
    Ok(())
}

// ===========================================================================
// Comparison and logic
// ===========================================================================

fn op_eq(interp: &mut Interpreter) -> EvalResult<()> {
    let b = interp.stack_mut().pop()?;
    let a = interp.stack_mut().pop()?;
    interp.stack_mut().push(Value::Boolean(a == b));
    Ok(())
}

fn op_ne(interp: &mut Interpreter) -> EvalResult<()> {
    let b = interp.stack_mut().pop()?;
    let a = interp.stack_mut().pop()?;
    interp.stack_mut().push(Value::Boolean(a != b));
    Ok(())
}

fn op_gt(interp: &mut Interpreter) -> EvalResult<()> {
    numeric_compare(interp, |a, b| a > b)
}

fn op_lt(interp: &mut Interpreter) -> EvalResult<()> {
    numeric_compare(interp, |a, b| a < b)
}

fn op_ge(interp: &mut Interpreter) -> EvalResult<()> {
    numeric_compare(interp, |a, b| a >= b)
}

fn op_le(interp: &mut Interpreter) -> EvalResult<()> {
    numeric_compare(interp, |a, b| a <= b)
}

fn numeric_compare(interp: &mut Interpreter, cmp: fn(f64, f64) -> bool) -> EvalResult<()> {
    let b = interp.stack_mut().pop_number()?;
    let a = interp.stack_mut().pop_number()?;
    interp.stack_mut().push(Value::Boolean(cmp(a, b)));
    Ok(())
}

fn op_and(interp: &mut Interpreter) -> EvalResult<()> {
    let b = interp.stack_mut().pop_boolean()?;
    let a = interp.stack_mut().pop_boolean()?;
    interp.stack_mut().push(Value::Boolean(a && b));
    Ok(())
}

fn op_or(interp: &mut Interpreter) -> EvalResult<()> {
    let b = interp.stack_mut().pop_boolean()?;
    let a = interp.stack_mut().pop_boolean()?;
    interp.stack_mut().push(Value::Boolean(a || b));
    Ok(())
}

fn op_not(interp: &mut Interpreter) -> EvalResult<()> {
    let b = interp.stack_mut().pop_boolean()?;
    interp.stack_mut().push(Value::Boolean(!b));
    Ok(())
}

// ===========================================================================
// Operand stack
// ===========================================================================

fn op_dup(interp: &mut Interpreter) -> EvalResult<()> {
    let top = interp.stack().peek()?.clone();
    interp.stack_mut().push(top);
    Ok(())
}

fn op_pop(interp: &mut Interpreter) -> EvalResult<()> {
    interp.stack_mut().pop()?;
    Ok(())
}

fn op_exch(interp: &mut Interpreter) -> EvalResult<()> {
    let y = interp.stack_mut().pop()?;
    let x = interp.stack_mut().pop()?;
    interp.stack_mut().push(y);
    interp.stack_mut().push(x);
    Ok(())
}

fn op_clear(interp: &mut Interpreter) -> EvalResult<()> {
    interp.stack_mut().clear();
    Ok(())
}

fn op_count(interp: &mut Interpreter) -> EvalResult<()> {
    let n = interp.stack().count();
    interp.stack_mut().push(Value::Integer(n as i64));
    Ok(())
}

fn op_copy(interp: &mut Interpreter) -> EvalResult<()> {
    let n = interp.stack_mut().pop_integer()?;
    if n < 0 {
        return Err(EvalError::new(ErrorKind::RangeCheck, "negative count"));
    }
    let n = n as usize;
    let depth = interp.stack().count();
    if n > depth {
        return Err(EvalError::new(
            ErrorKind::StackUnderflow,
            "not enough operands to copy",
        ));
    }
    let copies: Vec<Value> = interp.stack().as_slice()[depth - n..].to_vec();
    for v in copies {
        interp.stack_mut().push(v);
    }
    Ok(())
}

fn op_index(interp: &mut Interpreter) -> EvalResult<()> {
    let n = interp.stack_mut().pop_integer()?;
    if n < 0 {
        return Err(EvalError::new(ErrorKind::RangeCheck, "negative index"));
    }
    let depth = interp.stack().count();
    let n = n as usize;
    if n >= depth {
        return Err(EvalError::new(
            ErrorKind::StackUnderflow,
            "index past the bottom of the stack",
        ));
    }
    let v = interp.stack().as_slice()[depth - 1 - n].clone();
    interp.stack_mut().push(v);
    Ok(())
}

// ===========================================================================
// Dictionaries and scopes
// ===========================================================================

fn op_dict(interp: &mut Interpreter) -> EvalResult<()> {
    let n = interp.stack_mut().pop_integer()?;
    if n < 0 {
        return Err(EvalError::new(ErrorKind::RangeCheck, "negative capacity"));
    }
    let map = DictMap::with_capacity_and_hasher(n as usize, Default::default());
    interp
        .stack_mut()
        .push(Value::Dict(Rc::new(std::cell::RefCell::new(map))));
    Ok(())
}

fn op_begin(interp: &mut Interpreter) -> EvalResult<()> {
    let dict = interp.stack_mut().pop_dict()?;
    interp.scopes_mut().begin(dict);
    Ok(())
}

fn op_end(interp: &mut Interpreter) -> EvalResult<()> {
    interp.scopes_mut().end()
}

/// `/name value def` — bind in the innermost scope.
///
/// Under lexical scoping this is also the capture point: a procedure bound
/// here is stamped with a snapshot of the current chain, once.
fn op_def(interp: &mut Interpreter) -> EvalResult<()> {
    let value = interp.stack_mut().pop()?;
    let key = interp.stack_mut().pop_name()?;
    if interp.mode() == ScopingMode::Lexical {
        if let Value::Procedure(proc) = &value {
            if proc.captured.borrow().is_none() {
                *proc.captured.borrow_mut() = Some(interp.scopes().snapshot());
            }
        }
    }
    interp.scopes_mut().define(key.text(), value);
    Ok(())
}

/// `/name value store` — overwrite the nearest existing binding.
fn op_store(interp: &mut Interpreter) -> EvalResult<()> {
    let value = interp.stack_mut().pop()?;
    let key = interp.stack_mut().pop_name()?;
    interp.scopes_mut().store(key.text(), value)
}

fn op_load(interp: &mut Interpreter) -> EvalResult<()> {
    let key = interp.stack_mut().pop_name()?;
    match interp.scopes().lookup(key.text()) {
        Some(value) => {
            interp.stack_mut().push(value);
            Ok(())
        }
        None => Err(EvalError::new(ErrorKind::Undefined, key.text())),
    }
}

/// `/name where` — `dict true` for the nearest scope binding the name,
/// `false` when unbound. Absence is not an error.
fn op_where(interp: &mut Interpreter) -> EvalResult<()> {
    let key = interp.stack_mut().pop_name()?;
    match interp.scopes().where_defined(key.text()) {
        Some(scope) => {
            interp.stack_mut().push(Value::Dict(scope));
            interp.stack_mut().push(Value::Boolean(true));
        }
        None => interp.stack_mut().push(Value::Boolean(false)),
    }
    Ok(())
}

/// `dict /name known` — whether the dictionary binds the key.
fn op_known(interp: &mut Interpreter) -> EvalResult<()> {
    let key = key_text(&interp.stack_mut().pop()?)?;
    let dict = interp.stack_mut().pop_dict()?;
    let known = dict.borrow().contains_key(&key);
    interp.stack_mut().push(Value::Boolean(known));
    Ok(())
}

// ===========================================================================
// Composite values
// ===========================================================================

fn op_array(interp: &mut Interpreter) -> EvalResult<()> {
    let n = interp.stack_mut().pop_integer()?;
    if n < 0 {
        return Err(EvalError::new(ErrorKind::RangeCheck, "negative length"));
    }
    interp.stack_mut().push(Value::array_of_len(n as usize));
    Ok(())
}

fn op_string(interp: &mut Interpreter) -> EvalResult<()> {
    let n = interp.stack_mut().pop_integer()?;
    if n < 0 {
        return Err(EvalError::new(ErrorKind::RangeCheck, "negative length"));
    }
    interp.stack_mut().push(Value::string_of_len(n as usize));
    Ok(())
}

fn op_length(interp: &mut Interpreter) -> EvalResult<()> {
    let len = match interp.stack_mut().pop()? {
        Value::String(s) => s.borrow().chars.len(),
        Value::Array(a) => a.borrow().len(),
        Value::Dict(d) => d.borrow().len(),
        Value::Name(n) => n.text().chars().count(),
        other => {
            return Err(EvalError::new(
                ErrorKind::TypeCheck,
                format!("{} has no length", other.ty()),
            ));
        }
    };
    interp.stack_mut().push(Value::Integer(len as i64));
    Ok(())
}

fn op_get(interp: &mut Interpreter) -> EvalResult<()> {
    let key = interp.stack_mut().pop()?;
    let result = match interp.stack_mut().pop()? {
        Value::Array(array) => {
            let idx = element_index(&key, array.borrow().len())?;
            array.borrow()[idx].clone()
        }
        Value::String(string) => {
            let idx = element_index(&key, string.borrow().chars.len())?;
            Value::Integer(string.borrow().chars[idx] as i64)
        }
        Value::Dict(dict) => {
            let key = key_text(&key)?;
            dict.borrow()
                .get(&key)
                .cloned()
                .ok_or_else(|| EvalError::new(ErrorKind::Undefined, key))?
        }
        other => {
            return Err(EvalError::new(
                ErrorKind::TypeCheck,
                format!("cannot get from {}", other.ty()),
            ));
        }
    };
    interp.stack_mut().push(result);
    Ok(())
}

fn op_put(interp: &mut Interpreter) -> EvalResult<()> {
    let value = interp.stack_mut().pop()?;
    let key = interp.stack_mut().pop()?;
    match interp.stack_mut().pop()? {
        Value::Array(array) => {
            let idx = element_index(&key, array.borrow().len())?;
            array.borrow_mut()[idx] = value;
            Ok(())
        }
        Value::String(string) => {
            let code = match value {
                Value::Integer(code) => code,
                other => {
                    return Err(EvalError::new(
                        ErrorKind::TypeCheck,
                        format!("expected integer, got {}", other.ty()),
                    ));
                }
            };
            let c = u32::try_from(code)
                .ok()
                .and_then(char::from_u32)
                .ok_or_else(|| EvalError::new(ErrorKind::RangeCheck, "invalid character code"))?;
            let idx = element_index(&key, string.borrow().chars.len())?;
            let mut buf = string.borrow_mut();
            if !buf.writable {
                return Err(EvalError::new(
                    ErrorKind::InvalidAccess,
                    "string is read-only",
                ));
            }
            buf.chars[idx] = c;
            Ok(())
        }
        Value::Dict(dict) => {
            let key = key_text(&key)?;
            dict.borrow_mut().insert(key, value);
            Ok(())
        }
        other => Err(EvalError::new(
            ErrorKind::TypeCheck,
            format!("cannot put into {}", other.ty()),
        )),
    }
}

/// `collection index count getinterval` — an independent copy of a
/// sub-range. Element values are shared for arrays.
fn op_getinterval(interp: &mut Interpreter) -> EvalResult<()> {
    let count = interp.stack_mut().pop_integer()?;
    let index = interp.stack_mut().pop_integer()?;
    let result = match interp.stack_mut().pop()? {
        Value::Array(array) => {
            let range = interval(index, count, array.borrow().len())?;
            let slice: Vec<Value> = array.borrow()[range].to_vec();
            Value::Array(Rc::new(std::cell::RefCell::new(slice)))
        }
        Value::String(string) => {
            let buf = string.borrow();
            let range = interval(index, count, buf.chars.len())?;
            let copy = crate::value::StringBuf {
                chars: buf.chars[range].to_vec(),
                writable: buf.writable,
            };
            Value::String(Rc::new(std::cell::RefCell::new(copy)))
        }
        other => {
            return Err(EvalError::new(
                ErrorKind::TypeCheck,
                format!("cannot take an interval of {}", other.ty()),
            ));
        }
    };
    interp.stack_mut().push(result);
    Ok(())
}

fn op_putinterval(interp: &mut Interpreter) -> EvalResult<()> {
    let source = interp.stack_mut().pop()?;
    let index = interp.stack_mut().pop_integer()?;
    match (interp.stack_mut().pop()?, source) {
        (Value::Array(dest), Value::Array(src)) => {
            let items: Vec<Value> = src.borrow().clone();
            let range = interval(index, items.len() as i64, dest.borrow().len())?;
            dest.borrow_mut()[range].clone_from_slice(&items);
            Ok(())
        }
        (Value::String(dest), Value::String(src)) => {
            let chars: Vec<char> = src.borrow().chars.clone();
            let range = interval(index, chars.len() as i64, dest.borrow().chars.len())?;
            let mut buf = dest.borrow_mut();
            if !buf.writable {
                return Err(EvalError::new(
                    ErrorKind::InvalidAccess,
                    "string is read-only",
                ));
            }
            buf.chars[range].clone_from_slice(&chars);
            Ok(())
        }
        (dest, src) => Err(EvalError::new(
            ErrorKind::TypeCheck,
            format!("cannot put a {} interval into {}", src.ty(), dest.ty()),
        )),
    }
}

/// `array aload` — push every element, then the array itself.
fn op_aload(interp: &mut Interpreter) -> EvalResult<()> {
    let array = interp.stack_mut().pop_array()?;
    let elements: Vec<Value> = array.borrow().clone();
    for v in elements {
        interp.stack_mut().push(v);
    }
    interp.stack_mut().push(Value::Array(array));
    Ok(())
}

fn op_null(interp: &mut Interpreter) -> EvalResult<()> {
    interp.stack_mut().push(Value::Null);
    Ok(())
}

// ===========================================================================
// Output
// ===========================================================================

/// `string print` — write the string's contents, no newline.
fn op_print(interp: &mut Interpreter) -> EvalResult<()> {
    let s = interp.stack_mut().pop_string()?;
    print!("{}", s.borrow().to_text());
    let _ = std::io::stdout().flush();
    Ok(())
}

/// `value =` / `value ==` — pop and print the canonical rendering.
fn op_show(interp: &mut Interpreter) -> EvalResult<()> {
    let v = interp.stack_mut().pop()?;
    println!("{v}");
    Ok(())
}

/// `pstack` — print the whole stack top-to-bottom, non-destructively.
fn op_pstack(interp: &mut Interpreter) -> EvalResult<()> {
    for v in interp.stack().iter_top_down() {
        println!("{v}");
    }
    Ok(())
}

// ===========================================================================
// Operand helpers
// ===========================================================================

fn numeric_mismatch(got: &Value) -> EvalError {
    EvalError::new(
        ErrorKind::TypeCheck,
        format!("expected number, got {}", got.ty()),
    )
}

/// A dictionary key: the text of a name or string operand.
fn key_text(v: &Value) -> EvalResult<String> {
    match v {
        Value::Name(n) => Ok(n.text().to_owned()),
        Value::String(s) => Ok(s.borrow().to_text()),
        other => Err(EvalError::new(
            ErrorKind::TypeCheck,
            format!("expected name or string key, got {}", other.ty()),
        )),
    }
}

/// An element index: an integer operand within `0..len`.
fn element_index(v: &Value, len: usize) -> EvalResult<usize> {
    let Value::Integer(idx) = v else {
        return Err(EvalError::new(
            ErrorKind::TypeCheck,
            format!("expected integer index, got {}", v.ty()),
        ));
    };
    if *idx < 0 || *idx as usize >= len {
        return Err(EvalError::new(
            ErrorKind::RangeCheck,
            format!("index {idx} out of bounds for length {len}"),
        ));
    }
    Ok(*idx as usize)
}

/// A sub-range `index..index+count` within `0..=len`.
fn interval(index: i64, count: i64, len: usize) -> EvalResult<std::ops::Range<usize>> {
    if index < 0 || count < 0 {
        return Err(EvalError::new(
            ErrorKind::RangeCheck,
            "negative index or count",
        ));
    }
    let (start, n) = (index as usize, count as usize);
    let end = start
        .checked_add(n)
        .filter(|&end| end <= len)
        .ok_or_else(|| {
            EvalError::new(
                ErrorKind::RangeCheck,
                format!("interval {index}+{count} out of bounds for length {len}"),
            )
        })?;
    Ok(start..end)
}
