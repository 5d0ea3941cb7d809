use crate::btype::BType;
use crate::bvalue::Value;
use itertools::Itertools;
use std::borrow::Cow;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use strum::IntoStaticStr;

pub type NodeRef = Arc<Node>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BinaryToken(Cow<'static, str>);

impl BinaryToken {
    pub const ADD: Self = Self(Cow::Borrowed("+"));
    pub const SUBTRACT: Self = Self(Cow::Borrowed("-"));
    pub const MULTIPLY: Self = Self(Cow::Borrowed("*"));
    pub const DIVIDE: Self = Self(Cow::Borrowed("/"));
    pub const REMAINDER: Self = Self(Cow::Borrowed("%"));
    pub const BIT_AND: Self = Self(Cow::Borrowed("&"));
    pub const BIT_OR: Self = Self(Cow::Borrowed("|"));
    pub const EXCLUSIVE_OR: Self = Self(Cow::Borrowed("^"));
    pub const LEFT_SHIFT: Self = Self(Cow::Borrowed("<<"));
    pub const RIGHT_SHIFT: Self = Self(Cow::Borrowed(">>"));
    pub const AND: Self = Self(Cow::Borrowed("&&"));
    pub const OR: Self = Self(Cow::Borrowed("||"));
    pub const EQUALITY: Self = Self(Cow::Borrowed("=="));
    pub const NOT_EQUAL: Self = Self(Cow::Borrowed("!="));
    pub const LESS_THAN: Self = Self(Cow::Borrowed("<"));
    pub const LESS_THAN_OR_EQUAL: Self = Self(Cow::Borrowed("<="));
    pub const GREATER_THAN: Self = Self(Cow::Borrowed(">"));
    pub const GREATER_THAN_OR_EQUAL: Self = Self(Cow::Borrowed(">="));
    pub const NULL_COALESCING: Self = Self(Cow::Borrowed("??"));

    pub fn new(token: impl Into<String>) -> Self {
        Self(Cow::Owned(token.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for BinaryToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UnaryToken(Cow<'static, str>);

impl UnaryToken {
    pub const MINUS: Self = Self(Cow::Borrowed("-"));
    pub const PLUS: Self = Self(Cow::Borrowed("+"));
    pub const NOT: Self = Self(Cow::Borrowed("!"));
    pub const BIT_NOT: Self = Self(Cow::Borrowed("~"));

    pub fn new(token: impl Into<String>) -> Self {
        Self(Cow::Owned(token.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for UnaryToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A leaf that reads one of the binding arguments supplied at invocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BindingNode {
    pub index: usize,
    pub path: Arc<str>,
    pub ty: BType,
    /// the value currently bound, never read by compiled code
    pub value: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, IntoStaticStr)]
pub enum Node {
    Constant {
        value: Value,
        ty: BType,
    },
    Binding(BindingNode),
    TypeAccess(BType),
    Parameter(Arc<str>),
    Member {
        target: Option<NodeRef>,
        name: Arc<str>,
    },
    Index {
        target: Option<NodeRef>,
        args: Vec<NodeRef>,
    },
    MethodCall {
        target: Option<NodeRef>,
        name: Arc<str>,
        args: Vec<NodeRef>,
        type_args: Vec<Arc<str>>,
    },
    Unary {
        token: UnaryToken,
        operand: NodeRef,
    },
    Binary {
        token: BinaryToken,
        left: NodeRef,
        right: NodeRef,
    },
    Conditional {
        condition: NodeRef,
        if_true: NodeRef,
        if_false: NodeRef,
    },
    Lambda {
        parameters: Vec<Arc<str>>,
        body: NodeRef,
    },
    NullConditionalMember {
        target: NodeRef,
    },
}

impl Node {
    pub fn constant(value: impl Into<Value>) -> NodeRef {
        let value = value.into();
        let ty = value.runtime_type();
        Arc::new(Node::Constant { value, ty })
    }

    pub fn typed_constant(value: impl Into<Value>, ty: BType) -> NodeRef {
        Arc::new(Node::Constant {
            value: value.into(),
            ty,
        })
    }

    pub fn binding(index: usize, path: &str) -> NodeRef {
        Self::typed_binding(index, path, BType::Object)
    }

    pub fn typed_binding(index: usize, path: &str, ty: BType) -> NodeRef {
        Arc::new(Node::Binding(BindingNode {
            index,
            path: path.into(),
            ty,
            value: None,
        }))
    }

    pub fn bound_value(index: usize, path: &str, ty: BType, value: impl Into<Value>) -> NodeRef {
        Arc::new(Node::Binding(BindingNode {
            index,
            path: path.into(),
            ty,
            value: Some(value.into()),
        }))
    }

    pub fn type_access(ty: BType) -> NodeRef {
        Arc::new(Node::TypeAccess(ty))
    }

    pub fn parameter(name: &str) -> NodeRef {
        Arc::new(Node::Parameter(name.into()))
    }

    /// a member of the invocation target
    pub fn target_member(name: &str) -> NodeRef {
        Arc::new(Node::Member {
            target: None,
            name: name.into(),
        })
    }

    pub fn target_call(name: &str, args: Vec<NodeRef>) -> NodeRef {
        Arc::new(Node::MethodCall {
            target: None,
            name: name.into(),
            args,
            type_args: vec![],
        })
    }

    pub fn unary(token: UnaryToken, operand: NodeRef) -> NodeRef {
        Arc::new(Node::Unary { token, operand })
    }

    pub fn binary(token: BinaryToken, left: NodeRef, right: NodeRef) -> NodeRef {
        Arc::new(Node::Binary { token, left, right })
    }

    pub fn conditional(condition: NodeRef, if_true: NodeRef, if_false: NodeRef) -> NodeRef {
        Arc::new(Node::Conditional {
            condition,
            if_true,
            if_false,
        })
    }

    pub fn lambda(parameters: &[&str], body: NodeRef) -> NodeRef {
        Arc::new(Node::Lambda {
            parameters: parameters.iter().map(|p| Arc::from(*p)).collect(),
            body,
        })
    }

    pub fn kind(&self) -> &'static str {
        self.into()
    }

    /// the node a member, index or call is applied to
    pub fn target(&self) -> Option<&NodeRef> {
        match self {
            Node::Member { target, .. }
            | Node::Index { target, .. }
            | Node::MethodCall { target, .. } => target.as_ref(),
            Node::NullConditionalMember { target } => Some(target),
            _ => None,
        }
    }
}

/// Fluent construction of member chains.
pub trait NodeExt {
    fn member(&self, name: &str) -> NodeRef;
    fn call(&self, name: &str, args: Vec<NodeRef>) -> NodeRef;
    fn generic_call(&self, name: &str, type_args: &[&str], args: Vec<NodeRef>) -> NodeRef;
    fn index(&self, args: Vec<NodeRef>) -> NodeRef;
    fn null_conditional(&self) -> NodeRef;
}

impl NodeExt for NodeRef {
    fn member(&self, name: &str) -> NodeRef {
        Arc::new(Node::Member {
            target: Some(self.clone()),
            name: name.into(),
        })
    }

    fn call(&self, name: &str, args: Vec<NodeRef>) -> NodeRef {
        self.generic_call(name, &[], args)
    }

    fn generic_call(&self, name: &str, type_args: &[&str], args: Vec<NodeRef>) -> NodeRef {
        Arc::new(Node::MethodCall {
            target: Some(self.clone()),
            name: name.into(),
            args,
            type_args: type_args.iter().map(|t| Arc::from(*t)).collect(),
        })
    }

    fn index(&self, args: Vec<NodeRef>) -> NodeRef {
        Arc::new(Node::Index {
            target: Some(self.clone()),
            args,
        })
    }

    fn null_conditional(&self) -> NodeRef {
        Arc::new(Node::NullConditionalMember {
            target: self.clone(),
        })
    }
}

fn write_target(f: &mut Formatter<'_>, target: &Option<NodeRef>) -> std::fmt::Result {
    match target.as_deref() {
        Some(t @ Node::NullConditionalMember { .. }) => write!(f, "{t}"),
        Some(t) => write!(f, "{t}."),
        None => Ok(()),
    }
}

impl Display for Node {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Node::Constant {
                value: Value::Str(s),
                ..
            } => write!(f, "{s:?}"),
            Node::Constant {
                value: Value::Null, ..
            } => write!(f, "null"),
            Node::Constant { value, .. } => write!(f, "{value}"),
            Node::Binding(b) if b.path.is_empty() => write!(f, "${}", b.index),
            Node::Binding(b) => write!(f, "{}", b.path),
            Node::TypeAccess(t) => write!(f, "{t}"),
            Node::Parameter(name) => write!(f, "{name}"),
            Node::Member { target, name } => {
                write_target(f, target)?;
                write!(f, "{name}")
            }
            Node::Index { target, args } => {
                if let Some(t) = target {
                    write!(f, "{t}")?;
                }
                write!(f, "[{}]", args.iter().join(", "))
            }
            Node::MethodCall {
                target,
                name,
                args,
                type_args,
            } => {
                write_target(f, target)?;
                write!(f, "{name}")?;
                if !type_args.is_empty() {
                    write!(f, "<{}>", type_args.iter().join(", "))?;
                }
                write!(f, "({})", args.iter().join(", "))
            }
            Node::Unary { token, operand } => write!(f, "{token}{operand}"),
            Node::Binary { token, left, right } => write!(f, "({left} {token} {right})"),
            Node::Conditional {
                condition,
                if_true,
                if_false,
            } => write!(f, "({condition} ? {if_true} : {if_false})"),
            Node::Lambda { parameters, body } => {
                write!(f, "({}) => {body}", parameters.iter().join(", "))
            }
            Node::NullConditionalMember { target } => write!(f, "{target}?."),
        }
    }
}
