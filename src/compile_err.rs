use crate::btype::BType;
use crate::node::{BinaryToken, NodeRef, UnaryToken};
use itertools::Itertools;
use std::error::Error;
use std::fmt::{Display, Formatter};
use strum::IntoStaticStr;

#[derive(Debug, Clone, PartialEq, IntoStaticStr)]
pub enum CompilationError {
    UnsupportedBinaryOperator {
        token: BinaryToken,
    },
    UnsupportedUnaryOperator {
        token: UnaryToken,
    },
    IncompatibleOperands {
        token: String,
        left: BType,
        right: BType,
    },
    InvalidOperand {
        token: String,
        operand: BType,
    },
    IncompatibleBranches {
        if_true: BType,
        if_false: BType,
    },
    ConditionNotBoolean {
        actual_type: BType,
    },
    MemberNotFound {
        owner: BType,
        name: String,
    },
    NoOverload {
        owner: BType,
        name: String,
        arg_types: Vec<String>,
        failures: Vec<String>,
    },
    TypeInferenceFailed {
        name: String,
        generic: String,
    },
    UnknownTypeArgument {
        name: String,
    },
    LambdaWithoutDelegateType {
        parameter_count: usize,
    },
    LambdaParameterCountMismatch {
        expected: usize,
        actual: usize,
    },
    LambdaReturnTypeMismatch {
        expected: BType,
        actual: BType,
    },
    UnknownParameter {
        name: String,
    },
    CannotBuild {
        kind: &'static str,
    },
}

impl CompilationError {
    pub fn kind(&self) -> &'static str {
        self.into()
    }
}

impl Display for CompilationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnsupportedBinaryOperator { token } => {
                write!(f, "cannot compile binary expression for operator {token}")
            }
            Self::UnsupportedUnaryOperator { token } => {
                write!(f, "cannot compile unary expression for operator {token}")
            }
            Self::IncompatibleOperands { token, left, right } => write!(
                f,
                "operator {token} cannot be applied to operands of type {left} and {right}"
            ),
            Self::InvalidOperand { token, operand } => write!(
                f,
                "operator {token} cannot be applied to an operand of type {operand}"
            ),
            Self::IncompatibleBranches { if_true, if_false } => write!(
                f,
                "no implicit conversion between conditional branches of type {if_true} and {if_false}"
            ),
            Self::ConditionNotBoolean { actual_type } => {
                write!(f, "condition must be bool, got {actual_type}")
            }
            Self::MemberNotFound { owner, name } => {
                write!(f, "type {owner} has no member {name}")
            }
            Self::NoOverload {
                owner,
                name,
                arg_types,
                failures,
            } => {
                write!(
                    f,
                    "no overload of {owner}.{name} accepts arguments ({})",
                    arg_types.iter().join(", ")
                )?;
                if !failures.is_empty() {
                    write!(f, ", candidates: {}", failures.iter().join("; "))?;
                }
                Ok(())
            }
            Self::TypeInferenceFailed { name, generic } => write!(
                f,
                "type argument {generic} of method {name} cannot be inferred from the usage"
            ),
            Self::UnknownTypeArgument { name } => write!(f, "unknown type {name}"),
            Self::LambdaWithoutDelegateType { parameter_count } => write!(
                f,
                "lambda with {parameter_count} parameters has no expected delegate type"
            ),
            Self::LambdaParameterCountMismatch { expected, actual } => write!(
                f,
                "lambda expected to have {expected} parameters, got {actual}"
            ),
            Self::LambdaReturnTypeMismatch { expected, actual } => write!(
                f,
                "lambda body of type {actual} cannot be returned as {expected}"
            ),
            Self::UnknownParameter { name } => write!(f, "unknown lambda parameter {name}"),
            Self::CannotBuild { kind } => write!(f, "no builder can compile a {kind} node"),
        }
    }
}

/// A compilation error tied to the node that caused it.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub node: NodeRef,
    pub error: CompilationError,
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {{{}}} [{}]",
            self.error,
            self.node,
            self.error.kind()
        )
    }
}

#[derive(Debug, Clone)]
pub struct CompileErrors(pub Vec<Diagnostic>);

impl CompileErrors {
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Display for CompileErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.iter().join("\n"))
    }
}

impl Error for CompileErrors {}
