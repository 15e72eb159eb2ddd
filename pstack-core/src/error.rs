//! Error types for the `pstack` evaluator.
//!
//! Every failure the engine can raise carries an [`ErrorKind`] that renders
//! as a short machine-readable reason code (`stackunderflow`, `typecheck`,
//! ...) plus a human-readable message. Failures are never retried: they
//! unwind the current procedure-execution recursion up to the driver, which
//! prints them and keeps accepting input.

use std::fmt;

// ---------------------------------------------------------------------------
// Error kinds
// ---------------------------------------------------------------------------

/// Categories of evaluator errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// An operation needs more operands than the operand stack holds.
    StackUnderflow,
    /// An operand is present but of the wrong variant.
    TypeCheck,
    /// An operand of the right type holds an out-of-domain value
    /// (negative size, zero increment, out-of-bounds index, division by zero).
    RangeCheck,
    /// A name has no native operator and no scope binding.
    Undefined,
    /// An attempt to pop the dictionary stack below its two-scope floor.
    DictStackUnderflow,
    /// A mutation attempted on a read-only string.
    InvalidAccess,
    /// Malformed source text (unterminated string, unmatched bracket).
    SyntaxError,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StackUnderflow => write!(f, "stackunderflow"),
            Self::TypeCheck => write!(f, "typecheck"),
            Self::RangeCheck => write!(f, "rangecheck"),
            Self::Undefined => write!(f, "undefined"),
            Self::DictStackUnderflow => write!(f, "dictstackunderflow"),
            Self::InvalidAccess => write!(f, "invalidaccess"),
            Self::SyntaxError => write!(f, "syntaxerror"),
        }
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// An error produced by the scanner or the evaluation engine.
#[derive(Debug, Clone)]
pub struct EvalError {
    /// What went wrong.
    pub kind: ErrorKind,
    /// Human-readable detail.
    pub message: String,
}

impl EvalError {
    /// Create a new error.
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}: {}", self.kind, self.message)
        }
    }
}

impl std::error::Error for EvalError {}

/// Convenience type alias for results using [`EvalError`].
pub type EvalResult<T> = Result<T, EvalError>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
