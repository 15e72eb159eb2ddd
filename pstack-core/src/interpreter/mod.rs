//! The `pstack` evaluation engine.
//!
//! This is the central module that ties together the scanner, operand
//! stack, scope chain, and operator registry. It implements the language's
//! direct-dispatch model: every token either pushes itself as data or, for
//! executable names, resolves registry-first and runs.
//!
//! # Scoping disciplines
//!
//! The engine is constructed in one of two modes, fixed for its lifetime:
//!
//! - **Dynamic**: a procedure body resolves free names against the scope
//!   chain live at call time.
//! - **Lexical**: `def` stamps a procedure with a snapshot of the chain;
//!   invoking the procedure *through its name* swaps the live chain for an
//!   independent copy of that snapshot for the duration of the body, with
//!   the previous chain restored on every exit path.
//!
//! Direct invocation via `exec` never takes the lexical branch — only name
//! resolution does. That asymmetry is intentional.

mod control;
mod operators;
mod registry;

use tracing::{debug, trace};

use crate::error::{ErrorKind, EvalError, EvalResult};
use crate::reader::LineReader;
use crate::scanner::scan_line;
use crate::scopes::ScopeChain;
use crate::stack::OperandStack;
use crate::value::{Name, Procedure, Value};

pub use registry::{OperatorFn, OperatorRegistry};

// ---------------------------------------------------------------------------
// Scoping mode
// ---------------------------------------------------------------------------

/// How free names inside procedure bodies resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScopingMode {
    /// Resolve against the scope chain live at call time.
    #[default]
    Dynamic,
    /// Resolve against the chain captured when the procedure was defined.
    Lexical,
}

// ---------------------------------------------------------------------------
// Interpreter state
// ---------------------------------------------------------------------------

/// The evaluation engine. Owns its operand stack and scope chain
/// exclusively; independent sessions need independent instances.
pub struct Interpreter {
    /// The operand stack.
    stack: OperandStack,
    /// The dictionary stack.
    scopes: ScopeChain,
    /// Native operators, consulted before scope lookup.
    registry: OperatorRegistry,
    /// Name-resolution discipline, fixed at construction.
    mode: ScopingMode,
    /// Cooperative quit flag, polled between tokens and after each line.
    quit: bool,
}

impl Interpreter {
    /// Create an engine with the full operator library installed.
    #[must_use]
    pub fn new(mode: ScopingMode) -> Self {
        let mut interp = Self {
            stack: OperandStack::new(),
            scopes: ScopeChain::new(),
            registry: OperatorRegistry::new(),
            mode,
            quit: false,
        };
        operators::install(&mut interp);
        interp
    }

    /// The operand stack.
    #[must_use]
    pub fn stack(&self) -> &OperandStack {
        &self.stack
    }

    /// The operand stack, mutably.
    pub fn stack_mut(&mut self) -> &mut OperandStack {
        &mut self.stack
    }

    /// The scope chain.
    #[must_use]
    pub fn scopes(&self) -> &ScopeChain {
        &self.scopes
    }

    /// The scope chain, mutably.
    pub fn scopes_mut(&mut self) -> &mut ScopeChain {
        &mut self.scopes
    }

    /// The scoping mode this engine was built with.
    #[must_use]
    pub const fn mode(&self) -> ScopingMode {
        self.mode
    }

    /// Whether a `quit` has been requested.
    #[must_use]
    pub const fn quit_requested(&self) -> bool {
        self.quit
    }

    /// Request cooperative termination. Execution stops at the next poll
    /// point; the engine itself never terminates the process.
    pub fn request_quit(&mut self) {
        self.quit = true;
    }

    /// Register a native operator.
    ///
    /// Also publishes a non-executable name binding in the base user scope
    /// so scope-introspection operators discover native operators as
    /// ordinary bindings.
    pub fn register_operator(&mut self, name: &str, op: OperatorFn) {
        self.registry.register(name, op);
        self.scopes
            .base_user_scope()
            .borrow_mut()
            .insert(name.to_owned(), Value::Name(Name::literal(name)));
    }

    // =======================================================================
    // Dispatch
    // =======================================================================

    /// Evaluate one token.
    ///
    /// Literals (including procedure literals and non-executable names)
    /// push themselves; executable names resolve against the operator
    /// registry first, then the scope chain.
    pub fn eval_token(&mut self, token: &Value) -> EvalResult<()> {
        match token {
            Value::Name(name) if name.is_executable() => self.eval_name(name),
            literal => {
                self.stack.push(literal.clone());
                Ok(())
            }
        }
    }

    fn eval_name(&mut self, name: &Name) -> EvalResult<()> {
        if let Some(op) = self.registry.get(name.text()) {
            trace!(operator = name.text(), "dispatch native operator");
            return op(self);
        }
        match self.scopes.lookup(name.text()) {
            Some(Value::Procedure(proc)) => {
                debug!(name = name.text(), "invoke procedure");
                self.call_procedure(&proc)
            }
            Some(value) => {
                // Name bound to a non-procedure: implicit `load`.
                self.stack.push(value);
                Ok(())
            }
            None => Err(EvalError::new(ErrorKind::Undefined, name.text())),
        }
    }

    // =======================================================================
    // Procedure execution
    // =======================================================================

    /// Invoke a procedure reached through name resolution.
    ///
    /// In lexical mode a captured snapshot, when present, temporarily
    /// replaces the live chain; the previous chain is restored whether the
    /// body succeeds, fails, or requests quit.
    pub(crate) fn call_procedure(&mut self, proc: &Procedure) -> EvalResult<()> {
        if self.mode == ScopingMode::Lexical {
            let captured = proc.captured.borrow().as_ref().map(|s| s.duplicate());
            if let Some(scopes) = captured {
                debug!("entering captured environment");
                let saved = self.scopes.replace(scopes);
                let result = self.exec_procedure(proc);
                self.scopes.replace(saved);
                return result;
            }
        }
        self.exec_procedure(proc)
    }

    /// Run a procedure body under the live scope chain.
    ///
    /// Each body line is re-scanned on every execution (deferred parsing),
    /// so redefinitions between invocations take effect on the next run.
    /// The quit flag is polled between tokens and after each line.
    pub(crate) fn exec_procedure(&mut self, proc: &Procedure) -> EvalResult<()> {
        for line in &proc.lines {
            if self.quit {
                break;
            }
            self.run_line(line)?;
        }
        Ok(())
    }

    // =======================================================================
    // Driver entry points
    // =======================================================================

    /// Scan one logical line and evaluate its tokens.
    pub fn run_line(&mut self, line: &str) -> EvalResult<()> {
        for token in scan_line(line)? {
            if self.quit {
                break;
            }
            self.eval_token(&token)?;
        }
        Ok(())
    }

    /// Run a multi-line source text, stopping at the first failure.
    ///
    /// Drivers that want per-line error recovery feed a [`LineReader`]
    /// themselves and call [`run_line`](Self::run_line).
    pub fn run_source(&mut self, source: &str) -> EvalResult<()> {
        let mut reader = LineReader::new();
        for line in source.lines() {
            if let Some(logical) = reader.feed(line) {
                self.run_line(&logical)?;
            }
            if self.quit {
                break;
            }
        }
        Ok(())
    }
}
