//! Runtime value types for the `pstack` evaluator.
//!
//! Every datum the engine manipulates is a [`Value`]. Composite values
//! (strings, arrays, dictionaries) are heap-allocated behind `Rc<RefCell>`
//! so that several stack slots or scope bindings can alias one object:
//! mutation through any alias is visible through all of them.
//!
//! Procedures keep their bodies as **unparsed token-lines**. A body line is
//! re-scanned every time the procedure runs, so redefining what a bare word
//! means between two invocations changes behavior on the next run.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::scopes::Snapshot;

/// The map type backing a dictionary value.
pub type DictMap = FxHashMap<String, Value>;
/// A shared, mutable dictionary.
pub type DictRef = Rc<RefCell<DictMap>>;
/// A shared, mutable, fixed-length array.
pub type ArrayRef = Rc<RefCell<Vec<Value>>>;
/// A shared, mutable string buffer.
pub type StringRef = Rc<RefCell<StringBuf>>;

// ---------------------------------------------------------------------------
// Type codes
// ---------------------------------------------------------------------------

/// The type of a runtime value, used in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Type {
    Integer,
    Real,
    Boolean,
    String,
    Name,
    Array,
    Dict,
    Procedure,
    Null,
}

impl Type {
    /// Whether values of this type participate in arithmetic.
    #[must_use]
    pub const fn is_numeric(self) -> bool {
        matches!(self, Self::Integer | Self::Real)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer => write!(f, "integer"),
            Self::Real => write!(f, "real"),
            Self::Boolean => write!(f, "boolean"),
            Self::String => write!(f, "string"),
            Self::Name => write!(f, "name"),
            Self::Array => write!(f, "array"),
            Self::Dict => write!(f, "dict"),
            Self::Procedure => write!(f, "procedure"),
            Self::Null => write!(f, "null"),
        }
    }
}

// ---------------------------------------------------------------------------
// String buffers
// ---------------------------------------------------------------------------

/// A mutable character buffer with a writability flag.
///
/// Scanner-produced string literals are read-only; buffers made by the
/// `string` operator are writable. In-place writes to a read-only buffer
/// fail with `invalidaccess`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringBuf {
    /// The characters of the string.
    pub chars: Vec<char>,
    /// Whether in-place writes are permitted.
    pub writable: bool,
}

impl StringBuf {
    /// A read-only buffer holding the given text.
    #[must_use]
    pub fn literal(text: &str) -> Self {
        Self {
            chars: text.chars().collect(),
            writable: false,
        }
    }

    /// A writable buffer of `len` NUL characters.
    #[must_use]
    pub fn filled(len: usize) -> Self {
        Self {
            chars: vec!['\0'; len],
            writable: true,
        }
    }

    /// The buffer contents as an owned `String`.
    #[must_use]
    pub fn to_text(&self) -> String {
        self.chars.iter().collect()
    }
}

// ---------------------------------------------------------------------------
// Names
// ---------------------------------------------------------------------------

/// A name token. The executable flag is fixed at construction: `/foo`
/// scans as a non-executable (literal) name, bare `foo` as an executable one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Name {
    text: Rc<str>,
    executable: bool,
}

impl Name {
    /// A literal (non-executable) name.
    #[must_use]
    pub fn literal(text: &str) -> Self {
        Self {
            text: Rc::from(text),
            executable: false,
        }
    }

    /// An executable name.
    #[must_use]
    pub fn executable(text: &str) -> Self {
        Self {
            text: Rc::from(text),
            executable: true,
        }
    }

    /// The name's text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Whether this name is looked up and invoked rather than pushed as data.
    #[must_use]
    pub const fn is_executable(&self) -> bool {
        self.executable
    }
}

// ---------------------------------------------------------------------------
// Procedures
// ---------------------------------------------------------------------------

/// A procedure body: deferred token-lines plus an optional captured
/// scope-chain snapshot.
///
/// `captured` is set at most once, by `def` while the engine is in lexical
/// mode. The stored snapshot is never installed directly at call time;
/// invocation runs under an independent copy, so definitions made inside the
/// body cannot alter the captured environment.
#[derive(Debug)]
pub struct Procedure {
    /// Unparsed body lines, re-scanned on every execution.
    pub lines: Vec<String>,
    /// Scope-chain snapshot taken at definition time under lexical scoping.
    pub captured: RefCell<Option<Snapshot>>,
}

impl Procedure {
    /// Create a procedure from its raw body lines.
    #[must_use]
    pub fn new(lines: Vec<String>) -> Self {
        Self {
            lines,
            captured: RefCell::new(None),
        }
    }
}

// ---------------------------------------------------------------------------
// Values
// ---------------------------------------------------------------------------

/// A runtime value.
#[derive(Debug, Clone)]
pub enum Value {
    /// 64-bit signed integer.
    Integer(i64),
    /// 64-bit float.
    Real(f64),
    /// Boolean.
    Boolean(bool),
    /// Shared mutable character buffer.
    String(StringRef),
    /// A name, literal or executable.
    Name(Name),
    /// Shared fixed-length array.
    Array(ArrayRef),
    /// Shared dictionary.
    Dict(DictRef),
    /// Deferred procedure body.
    Procedure(Rc<Procedure>),
    /// The empty value.
    Null,
}

impl Value {
    /// Get the type of this value.
    #[must_use]
    pub const fn ty(&self) -> Type {
        match self {
            Self::Integer(_) => Type::Integer,
            Self::Real(_) => Type::Real,
            Self::Boolean(_) => Type::Boolean,
            Self::String(_) => Type::String,
            Self::Name(_) => Type::Name,
            Self::Array(_) => Type::Array,
            Self::Dict(_) => Type::Dict,
            Self::Procedure(_) => Type::Procedure,
            Self::Null => Type::Null,
        }
    }

    /// A read-only string value holding the given text.
    #[must_use]
    pub fn string_literal(text: &str) -> Self {
        Self::String(Rc::new(RefCell::new(StringBuf::literal(text))))
    }

    /// A writable string value of `len` NUL characters.
    #[must_use]
    pub fn string_of_len(len: usize) -> Self {
        Self::String(Rc::new(RefCell::new(StringBuf::filled(len))))
    }

    /// An array of `len` null values.
    #[must_use]
    pub fn array_of_len(len: usize) -> Self {
        Self::Array(Rc::new(RefCell::new(vec![Self::Null; len])))
    }

    /// An empty dictionary.
    #[must_use]
    pub fn empty_dict() -> Self {
        Self::Dict(Rc::new(RefCell::new(DictMap::default())))
    }

    /// An integer if `n` is exactly integral (and in `i64` range), else a real.
    ///
    /// This is the re-promotion rule used by arithmetic: integer operands
    /// stay integer, while any fractional result becomes real.
    #[must_use]
    pub fn promoted(n: f64) -> Self {
        if n.is_finite() && n.fract() == 0.0 && (i64::MIN as f64..=i64::MAX as f64).contains(&n) {
            Self::Integer(n as i64)
        } else {
            Self::Real(n)
        }
    }

    /// Try to view this value as a float.
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Real(r) => Some(*r),
            _ => None,
        }
    }

    /// Try to extract a boolean.
    #[must_use]
    pub const fn as_boolean(&self) -> Option<bool> {
        if let Self::Boolean(b) = self {
            Some(*b)
        } else {
            None
        }
    }

    /// Try to extract a name.
    #[must_use]
    pub const fn as_name(&self) -> Option<&Name> {
        if let Self::Name(n) = self {
            Some(n)
        } else {
            None
        }
    }

    /// Whether this value is a numeric scalar.
    #[must_use]
    pub const fn is_numeric(&self) -> bool {
        self.ty().is_numeric()
    }
}

impl PartialEq for Value {
    /// Equality as the `eq` operator sees it: numerics compare by value
    /// across the integer/real split, strings by contents, and composite
    /// values (arrays, dicts, procedures) by object identity.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Integer(a), Self::Integer(b)) => a == b,
            (Self::Real(a), Self::Real(b)) => a == b,
            (Self::Integer(a), Self::Real(b)) | (Self::Real(b), Self::Integer(a)) => {
                (*a as f64) == *b
            }
            (Self::Boolean(a), Self::Boolean(b)) => a == b,
            (Self::String(a), Self::String(b)) => a.borrow().chars == b.borrow().chars,
            (Self::Name(a), Self::Name(b)) => a.text() == b.text(),
            (Self::Array(a), Self::Array(b)) => Rc::ptr_eq(a, b),
            (Self::Dict(a), Self::Dict(b)) => Rc::ptr_eq(a, b),
            (Self::Procedure(a), Self::Procedure(b)) => Rc::ptr_eq(a, b),
            (Self::Null, Self::Null) => true,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    /// The canonical textual rendering used by the print/inspect operators.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(i) => write!(f, "{i}"),
            Self::Real(r) => {
                // Integral reals print without a trailing `.0`.
                if r.is_finite() && r.fract() == 0.0 && r.abs() < 9.0e18 {
                    write!(f, "{}", *r as i64)
                } else {
                    write!(f, "{r}")
                }
            }
            Self::Boolean(b) => write!(f, "{}", if *b { "true" } else { "false" }),
            Self::String(s) => write!(f, "({})", s.borrow().to_text()),
            Self::Name(n) => {
                if n.is_executable() {
                    write!(f, "{}", n.text())
                } else {
                    write!(f, "/{}", n.text())
                }
            }
            Self::Array(a) => {
                write!(f, "[")?;
                for (i, v) in a.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "]")
            }
            Self::Dict(d) => {
                write!(f, "<<")?;
                for (k, v) in d.borrow().iter() {
                    write!(f, " /{k} {v}")?;
                }
                write!(f, " >>")
            }
            Self::Procedure(p) => {
                write!(f, "{{")?;
                for (i, line) in p.lines.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{line}")?;
                }
                write!(f, "}}")
            }
            Self::Null => write!(f, "null"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
