//! Control-flow operators.
//!
//! All of these re-enter the engine's procedure executor. Procedures popped
//! from the operand stack run under the live chain (the dynamic path);
//! lexical-environment substitution happens only when a procedure is
//! invoked through name resolution.

use crate::error::{ErrorKind, EvalError, EvalResult};
use crate::interpreter::Interpreter;
use crate::value::{Name, Value};

/// `bool proc if` — execute `proc` when `bool` is true.
pub(super) fn op_if(interp: &mut Interpreter) -> EvalResult<()> {
    let proc = interp.stack_mut().pop_procedure()?;
    let cond = interp.stack_mut().pop_boolean()?;
    if cond {
        interp.exec_procedure(&proc)?;
    }
    Ok(())
}

/// `bool proc1 proc2 ifelse` — execute exactly one of the two.
pub(super) fn op_ifelse(interp: &mut Interpreter) -> EvalResult<()> {
    let alt = interp.stack_mut().pop_procedure()?;
    let cons = interp.stack_mut().pop_procedure()?;
    let cond = interp.stack_mut().pop_boolean()?;
    interp.exec_procedure(if cond { &cons } else { &alt })
}

/// `n proc repeat` — execute `proc` n times, no loop variable.
///
/// A real count truncates toward zero; a negative count performs zero
/// iterations rather than failing.
pub(super) fn op_repeat(interp: &mut Interpreter) -> EvalResult<()> {
    let proc = interp.stack_mut().pop_procedure()?;
    let count = interp.stack_mut().pop_number()? as i64;
    for _ in 0..count.max(0) {
        if interp.quit_requested() {
            break;
        }
        interp.exec_procedure(&proc)?;
    }
    Ok(())
}

/// `initial increment limit proc for` — counted loop, pushing the loop
/// variable before each body run.
///
/// The comparison direction follows the increment's sign; a zero increment
/// is a `rangecheck`. The loop variable stays an integer when initial,
/// increment, and limit are all integers.
pub(super) fn op_for(interp: &mut Interpreter) -> EvalResult<()> {
    let proc = interp.stack_mut().pop_procedure()?;
    let limit_v = interp.stack_mut().pop()?;
    let incr_v = interp.stack_mut().pop()?;
    let init_v = interp.stack_mut().pop()?;

    let integral = matches!(init_v, Value::Integer(_))
        && matches!(incr_v, Value::Integer(_))
        && matches!(limit_v, Value::Integer(_));

    let limit = numeric_operand(&limit_v)?;
    let incr = numeric_operand(&incr_v)?;
    let mut current = numeric_operand(&init_v)?;

    if incr == 0.0 {
        return Err(EvalError::new(ErrorKind::RangeCheck, "zero increment"));
    }

    // The comparison direction flips with the increment's sign.
    let keep_going: fn(f64, f64) -> bool = if incr > 0.0 {
        |cur, lim| cur <= lim
    } else {
        |cur, lim| cur >= lim
    };

    while keep_going(current, limit) {
        if interp.quit_requested() {
            break;
        }
        let var = if integral {
            Value::Integer(current as i64)
        } else {
            Value::Real(current)
        };
        interp.stack_mut().push(var);
        interp.exec_procedure(&proc)?;
        current += incr;
    }
    Ok(())
}

/// `collection proc forall` — iterate an array (element, body) or a
/// dictionary (key as literal name, value, body). Other collection types
/// are a `typecheck`.
///
/// Dictionary enumeration order follows the underlying map and is not
/// committed to.
pub(super) fn op_forall(interp: &mut Interpreter) -> EvalResult<()> {
    let proc = interp.stack_mut().pop_procedure()?;
    match interp.stack_mut().pop()? {
        Value::Array(array) => {
            // Iterate a snapshot of the elements so the body may mutate
            // the array without invalidating the iteration.
            let elements: Vec<Value> = array.borrow().clone();
            for element in elements {
                if interp.quit_requested() {
                    break;
                }
                interp.stack_mut().push(element);
                interp.exec_procedure(&proc)?;
            }
            Ok(())
        }
        Value::Dict(dict) => {
            let entries: Vec<(String, Value)> = dict
                .borrow()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            for (key, value) in entries {
                if interp.quit_requested() {
                    break;
                }
                interp.stack_mut().push(Value::Name(Name::literal(&key)));
                interp.stack_mut().push(value);
                interp.exec_procedure(&proc)?;
            }
            Ok(())
        }
        other => Err(EvalError::new(
            ErrorKind::TypeCheck,
            format!("cannot iterate {}", other.ty()),
        )),
    }
}

/// `value exec` — execute a procedure under the live chain, re-dispatch an
/// executable name, fail with `typecheck` otherwise.
///
/// This path deliberately never consults a captured snapshot.
pub(super) fn op_exec(interp: &mut Interpreter) -> EvalResult<()> {
    match interp.stack_mut().pop()? {
        Value::Procedure(proc) => interp.exec_procedure(&proc),
        Value::Name(name) if name.is_executable() => interp.eval_token(&Value::Name(name)),
        other => Err(EvalError::new(
            ErrorKind::TypeCheck,
            format!("cannot exec {}", other.ty()),
        )),
    }
}

/// `quit` — request cooperative termination.
pub(super) fn op_quit(interp: &mut Interpreter) -> EvalResult<()> {
    interp.request_quit();
    Ok(())
}

fn numeric_operand(v: &Value) -> EvalResult<f64> {
    v.as_number().ok_or_else(|| {
        EvalError::new(
            ErrorKind::TypeCheck,
            format!("expected number, got {}", v.ty()),
        )
    })
}
