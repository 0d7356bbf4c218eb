use std::fmt;

use crate::Symbol;

/// Parameter count a method accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arity {
    pub required: usize,
    pub variadic: bool,
}

impl Arity {
    pub const fn exact(required: usize) -> Self {
        Self {
            required,
            variadic: false,
        }
    }

    pub const fn at_least(required: usize) -> Self {
        Self {
            required,
            variadic: true,
        }
    }

    pub fn accepts(self, count: usize) -> bool {
        if self.variadic {
            count >= self.required
        } else {
            count == self.required
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.variadic {
            write!(f, "at least {}", self.required)
        } else {
            write!(f, "{}", self.required)
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum RuntimeError {
    #[error("selector `{selector}` not found in {receiver}")]
    SelectorNotFound { selector: Symbol, receiver: String },

    #[error("duplicate slot `{selector}`")]
    DuplicateSlot { selector: Symbol },

    #[error("`{selector}` expects {expected} argument(s), got {got}")]
    ArityMismatch {
        selector: Symbol,
        expected: Arity,
        got: usize,
    },

    #[error("illegal operation: {message}")]
    IllegalOperation { message: String },

    #[error("illegal argument: {message}")]
    IllegalArgument { message: String },

    #[error("internal error: {message}")]
    Internal { message: String },
}

pub type RuntimeResult<T> = Result<T, RuntimeError>;

impl RuntimeError {
    pub fn illegal_operation(message: impl Into<String>) -> Self {
        Self::IllegalOperation {
            message: message.into(),
        }
    }

    pub fn illegal_argument(message: impl Into<String>) -> Self {
        Self::IllegalArgument {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}
