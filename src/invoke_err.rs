use std::error::Error;
use std::fmt::{Display, Formatter};
use strum::IntoStaticStr;

/// A failure raised while invoking a compiled expression against live data.
#[derive(Debug, Clone, PartialEq, IntoStaticStr)]
pub enum InvokeError {
    InvalidBindingMember {
        type_name: String,
        member: String,
    },
    NullReference {
        member: String,
    },
    InvalidCast {
        from: String,
        to: String,
    },
    InvalidOperation {
        operation: &'static str,
        operands: String,
    },
    DivideByZero,
    IndexOutOfRange {
        index: i64,
        len: usize,
    },
    ArgumentCountMismatch {
        expected: usize,
        actual: usize,
    },
    MissingArgument {
        index: usize,
    },
    NotAssignable,
    MaximumDepth {
        limit: usize,
    },
    Host(String),
}

impl InvokeError {
    pub fn kind(&self) -> &'static str {
        self.into()
    }
}

impl Display for InvokeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            InvokeError::InvalidBindingMember { type_name, member } => {
                write!(f, "invalid binding member: {type_name} has no member {member}")
            }
            InvokeError::NullReference { member } => {
                write!(f, "cannot access {member} on a null value")
            }
            InvokeError::InvalidCast { from, to } => {
                write!(f, "cannot convert value of type {from} to {to}")
            }
            InvokeError::InvalidOperation {
                operation,
                operands,
            } => write!(f, "operation {operation} is not defined for {operands}"),
            InvokeError::DivideByZero => write!(f, "division by zero"),
            InvokeError::IndexOutOfRange { index, len } => {
                write!(f, "index {index} is out of range for length {len}")
            }
            InvokeError::ArgumentCountMismatch { expected, actual } => {
                write!(f, "expected {expected} arguments, got {actual}")
            }
            InvokeError::MissingArgument { index } => {
                write!(f, "binding argument {index} was not supplied")
            }
            InvokeError::NotAssignable => write!(f, "expression is not assignable"),
            InvokeError::MaximumDepth { limit } => {
                write!(f, "maximum invocation depth of {limit} exceeded")
            }
            InvokeError::Host(message) => write!(f, "{message}"),
        }
    }
}

impl Error for InvokeError {}
