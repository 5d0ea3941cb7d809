use crate::btype::{BType, DelegateSpec};
use crate::bvalue::{ArrayValue, Delegate, Metadata, Value};
use crate::dynamic::{DynamicInvoker, DynamicMember};
use crate::invoke_err::InvokeError;
use crate::members::MemberDescriptor;
use crate::options::InvokeLimits;
use crate::services::ValueConverter;
use derivative::Derivative;
use derive_more::{Display, From, Into};
use std::cell::Cell;
use std::cmp::Ordering;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;
use strum::IntoStaticStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, From, Into, Display)]
pub struct LocalId(usize);

impl LocalId {
    fn next() -> Self {
        static COUNTER: AtomicUsize = AtomicUsize::new(0);
        LocalId(COUNTER.fetch_add(1, AtomicOrdering::Relaxed))
    }
}

/// A lambda parameter or block temporary.
#[derive(Debug, Clone, PartialEq)]
pub struct Local {
    pub id: LocalId,
    pub ty: BType,
}

impl Local {
    pub fn new(ty: BType) -> Self {
        Self {
            id: LocalId::next(),
            ty,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoStaticStr)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    And,
    Or,
    ExclusiveOr,
    LeftShift,
    RightShift,
    AndAlso,
    OrElse,
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    Coalesce,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoStaticStr)]
pub enum UnaryOp {
    Negate,
    UnaryPlus,
    Not,
    OnesComplement,
}

#[derive(Debug)]
pub struct HostLambda {
    pub params: Vec<Local>,
    pub body: HostExpr,
    pub spec: Arc<DelegateSpec>,
}

#[derive(Derivative, Clone)]
#[derivative(Debug)]
pub enum HostExpr {
    Constant(Value, BType),
    Target(BType),
    Argument {
        index: usize,
        ty: BType,
    },
    MetadataRef,
    Local(Local),
    Convert(Box<HostExpr>, BType),
    Unary(UnaryOp, Box<HostExpr>, BType),
    Binary(BinaryOp, Box<HostExpr>, Box<HostExpr>, BType),
    Concat(Box<HostExpr>, Box<HostExpr>),
    DynamicEquals {
        left: Box<HostExpr>,
        right: Box<HostExpr>,
        negate: bool,
    },
    Conditional {
        condition: Box<HostExpr>,
        if_true: Box<HostExpr>,
        if_false: Box<HostExpr>,
        ty: BType,
    },
    IsNull(Box<HostExpr>),
    Block {
        temp: Local,
        init: Box<HostExpr>,
        body: Box<HostExpr>,
    },
    Property {
        target: Option<Box<HostExpr>>,
        member: Arc<MemberDescriptor>,
    },
    Call {
        target: Option<Box<HostExpr>>,
        method: Arc<MemberDescriptor>,
        args: Vec<HostExpr>,
        type_args: Vec<BType>,
        ty: BType,
    },
    ArrayIndex {
        array: Box<HostExpr>,
        index: Box<HostExpr>,
        ty: BType,
    },
    NewArray {
        element_type: BType,
        items: Vec<HostExpr>,
    },
    Lambda(Arc<HostLambda>),
    DynamicMember(#[derivative(Debug = "ignore")] Arc<DynamicMember>),
    DynamicCall(#[derivative(Debug = "ignore")] Arc<DynamicInvoker>),
}

pub(crate) fn binary_type(op: BinaryOp, left: &BType, right: &BType) -> Option<BType> {
    let dynamic = *left == BType::Object || *right == BType::Object;
    let lifted = matches!(left, BType::Nullable(_)) || matches!(right, BType::Nullable(_));
    let lift = |t: BType| if lifted { BType::nullable(t) } else { t };
    let (l, r) = (left.underlying(), right.underlying());
    match op {
        BinaryOp::Add
        | BinaryOp::Subtract
        | BinaryOp::Multiply
        | BinaryOp::Divide
        | BinaryOp::Modulo => {
            if dynamic {
                Some(BType::Object)
            } else if l.is_numeric() && r.is_numeric() {
                if *l == BType::Double || *r == BType::Double {
                    Some(lift(BType::Double))
                } else {
                    Some(lift(BType::Int))
                }
            } else {
                None
            }
        }
        BinaryOp::And | BinaryOp::Or | BinaryOp::ExclusiveOr => match (l, r) {
            _ if dynamic => Some(BType::Object),
            (BType::Int, BType::Int) => Some(lift(BType::Int)),
            (BType::Bool, BType::Bool) => Some(lift(BType::Bool)),
            _ => None,
        },
        BinaryOp::LeftShift | BinaryOp::RightShift => match (l, r) {
            _ if dynamic => Some(BType::Object),
            (BType::Int, BType::Int) => Some(lift(BType::Int)),
            _ => None,
        },
        BinaryOp::AndAlso | BinaryOp::OrElse => {
            let logical = |t: &BType| matches!(t, BType::Bool | BType::Object);
            (logical(left) && logical(right)).then_some(BType::Bool)
        }
        BinaryOp::LessThan
        | BinaryOp::LessThanOrEqual
        | BinaryOp::GreaterThan
        | BinaryOp::GreaterThanOrEqual => {
            let comparable = dynamic
                || (l.is_numeric() && r.is_numeric())
                || (l == r && matches!(l, BType::Enum(_)));
            comparable.then_some(BType::Bool)
        }
        BinaryOp::Equal | BinaryOp::NotEqual => {
            let equatable = dynamic
                || l == r
                || (l.is_numeric() && r.is_numeric())
                || (!l.is_value_type()
                    && !r.is_value_type()
                    && (l.is_assignable_to(r) || r.is_assignable_to(l)));
            equatable.then_some(BType::Bool)
        }
        BinaryOp::Coalesce => {
            if !left.is_nullable() {
                None
            } else if right.is_nullable() {
                left.common_type(right)
            } else {
                l.common_type(right)
            }
        }
    }
}

pub(crate) fn unary_type(op: UnaryOp, operand: &BType) -> Option<BType> {
    if *operand == BType::Object {
        return Some(BType::Object);
    }
    let valid = match op {
        UnaryOp::Negate | UnaryOp::UnaryPlus => operand.is_numeric(),
        UnaryOp::Not => *operand.underlying() == BType::Bool,
        UnaryOp::OnesComplement => *operand.underlying() == BType::Int,
    };
    valid.then(|| operand.clone())
}

impl HostExpr {
    pub fn ty(&self) -> BType {
        match self {
            HostExpr::Constant(_, t)
            | HostExpr::Target(t)
            | HostExpr::Argument { ty: t, .. }
            | HostExpr::Convert(_, t)
            | HostExpr::Unary(_, _, t)
            | HostExpr::Binary(_, _, _, t)
            | HostExpr::Conditional { ty: t, .. }
            | HostExpr::Call { ty: t, .. }
            | HostExpr::ArrayIndex { ty: t, .. } => t.clone(),
            HostExpr::MetadataRef => BType::Metadata,
            HostExpr::Local(l) => l.ty.clone(),
            HostExpr::Concat(..) => BType::String,
            HostExpr::DynamicEquals { .. } | HostExpr::IsNull(_) => BType::Bool,
            HostExpr::Block { body, .. } => body.ty(),
            HostExpr::Property { member, .. } => member.value_type(),
            HostExpr::NewArray { element_type, .. } => BType::array(element_type.clone()),
            HostExpr::Lambda(l) => BType::Delegate(l.spec.clone()),
            HostExpr::DynamicMember(_) | HostExpr::DynamicCall(_) => BType::Object,
        }
    }

    pub fn is_null_constant(&self) -> bool {
        matches!(self, HostExpr::Constant(Value::Null, _))
    }

    pub fn convert_to(self, to: &BType) -> HostExpr {
        if &self.ty() == to {
            self
        } else if self.is_null_constant() {
            HostExpr::Constant(Value::Null, to.clone())
        } else {
            HostExpr::Convert(Box::new(self), to.clone())
        }
    }

    /// a type checked operation, or `None` if the operands do not support it
    pub fn make_binary(op: BinaryOp, left: HostExpr, right: HostExpr) -> Option<HostExpr> {
        let ty = binary_type(op, &left.ty(), &right.ty())?;
        Some(HostExpr::Binary(op, Box::new(left), Box::new(right), ty))
    }

    pub fn make_unary(op: UnaryOp, operand: HostExpr) -> Option<HostExpr> {
        let ty = unary_type(op, &operand.ty())?;
        Some(HostExpr::Unary(op, Box::new(operand), ty))
    }

    pub(crate) fn children(&self) -> Vec<&HostExpr> {
        match self {
            HostExpr::Constant(..)
            | HostExpr::Target(_)
            | HostExpr::Argument { .. }
            | HostExpr::MetadataRef
            | HostExpr::Local(_) => vec![],
            HostExpr::Convert(e, _) | HostExpr::Unary(_, e, _) | HostExpr::IsNull(e) => vec![e],
            HostExpr::Binary(_, l, r, _)
            | HostExpr::Concat(l, r)
            | HostExpr::DynamicEquals {
                left: l, right: r, ..
            } => vec![l, r],
            HostExpr::Conditional {
                condition,
                if_true,
                if_false,
                ..
            } => vec![condition, if_true, if_false],
            HostExpr::Block { init, body, .. } => vec![init, body],
            HostExpr::Property { target, .. } => target.iter().map(AsRef::as_ref).collect(),
            HostExpr::Call { target, args, .. } => target
                .iter()
                .map(AsRef::as_ref)
                .chain(args.iter())
                .collect(),
            HostExpr::ArrayIndex { array, index, .. } => vec![array, index],
            HostExpr::NewArray { items, .. } => items.iter().collect(),
            HostExpr::Lambda(l) => vec![&l.body],
            HostExpr::DynamicMember(d) => vec![d.target()],
            HostExpr::DynamicCall(d) => d.built_parts(),
        }
    }

    /// rebuilds this expression with every direct child passed through `f`
    pub(crate) fn map_children(self, f: &mut impl FnMut(HostExpr) -> HostExpr) -> HostExpr {
        let mut boxed = |e: Box<HostExpr>| Box::new(f(*e));
        match self {
            HostExpr::Constant(..)
            | HostExpr::Target(_)
            | HostExpr::Argument { .. }
            | HostExpr::MetadataRef
            | HostExpr::Local(_) => self,
            HostExpr::Convert(e, t) => HostExpr::Convert(boxed(e), t),
            HostExpr::Unary(op, e, t) => HostExpr::Unary(op, boxed(e), t),
            HostExpr::IsNull(e) => HostExpr::IsNull(boxed(e)),
            HostExpr::Binary(op, l, r, t) => {
                let l = boxed(l);
                HostExpr::Binary(op, l, boxed(r), t)
            }
            HostExpr::Concat(l, r) => {
                let l = boxed(l);
                HostExpr::Concat(l, boxed(r))
            }
            HostExpr::DynamicEquals {
                left,
                right,
                negate,
            } => {
                let left = boxed(left);
                HostExpr::DynamicEquals {
                    left,
                    right: boxed(right),
                    negate,
                }
            }
            HostExpr::Conditional {
                condition,
                if_true,
                if_false,
                ty,
            } => {
                let condition = boxed(condition);
                let if_true = boxed(if_true);
                HostExpr::Conditional {
                    condition,
                    if_true,
                    if_false: boxed(if_false),
                    ty,
                }
            }
            HostExpr::Block { temp, init, body } => {
                let init = boxed(init);
                HostExpr::Block {
                    temp,
                    init,
                    body: boxed(body),
                }
            }
            HostExpr::Property { target, member } => HostExpr::Property {
                target: target.map(boxed),
                member,
            },
            HostExpr::Call {
                target,
                method,
                args,
                type_args,
                ty,
            } => {
                let target = target.map(&mut boxed);
                HostExpr::Call {
                    target,
                    method,
                    args: args.into_iter().map(&mut *f).collect(),
                    type_args,
                    ty,
                }
            }
            HostExpr::ArrayIndex { array, index, ty } => {
                let array = boxed(array);
                HostExpr::ArrayIndex {
                    array,
                    index: boxed(index),
                    ty,
                }
            }
            HostExpr::NewArray {
                element_type,
                items,
            } => HostExpr::NewArray {
                element_type,
                items: items.into_iter().map(&mut *f).collect(),
            },
            HostExpr::Lambda(l) => HostExpr::Lambda(Arc::new(HostLambda {
                params: l.params.clone(),
                body: f(l.body.clone()),
                spec: l.spec.clone(),
            })),
            HostExpr::DynamicMember(d) => HostExpr::DynamicMember(Arc::new(d.map_target(&mut *f))),
            HostExpr::DynamicCall(d) => HostExpr::DynamicCall(Arc::new(d.map_parts(&mut *f))),
        }
    }

    /// whether evaluating this expression depends on nothing supplied at invocation
    pub fn is_closed(&self) -> bool {
        self.closed_under(&mut Vec::new())
    }

    fn closed_under(&self, bound: &mut Vec<LocalId>) -> bool {
        match self {
            HostExpr::Constant(..) => true,
            HostExpr::Target(_) | HostExpr::Argument { .. } | HostExpr::MetadataRef => false,
            HostExpr::Local(l) => bound.contains(&l.id),
            HostExpr::Block { temp, init, body } => {
                if !init.closed_under(bound) {
                    return false;
                }
                bound.push(temp.id);
                let ret = body.closed_under(bound);
                bound.pop();
                ret
            }
            HostExpr::Lambda(l) => {
                let depth = bound.len();
                bound.extend(l.params.iter().map(|p| p.id));
                let ret = l.body.closed_under(bound);
                bound.truncate(depth);
                ret
            }
            HostExpr::DynamicCall(d) if d.has_unbuilt_lambdas() => false,
            _ => self.children().into_iter().all(|c| c.closed_under(bound)),
        }
    }

    pub fn eval(&self, scope: &Scope) -> Result<Value, InvokeError> {
        match self {
            HostExpr::Constant(v, _) => Ok(v.clone()),
            HostExpr::Target(_) => Ok(scope.frame.target.clone()),
            HostExpr::Argument { index, ty } => {
                let value = scope
                    .frame
                    .args
                    .get(*index)
                    .cloned()
                    .ok_or(InvokeError::MissingArgument { index: *index })?;
                scope.convert(value, ty)
            }
            HostExpr::MetadataRef => Ok(Value::Metadata(scope.frame.metadata.clone())),
            HostExpr::Local(l) => scope.local(l.id),
            HostExpr::Convert(e, ty) => scope.convert(e.eval(scope)?, ty),
            HostExpr::Unary(op, e, _) => eval_unary(*op, e.eval(scope)?),
            HostExpr::Binary(BinaryOp::AndAlso, l, r, _) => {
                if as_bool(l.eval(scope)?)? {
                    Ok(Value::Bool(as_bool(r.eval(scope)?)?))
                } else {
                    Ok(Value::Bool(false))
                }
            }
            HostExpr::Binary(BinaryOp::OrElse, l, r, _) => {
                if as_bool(l.eval(scope)?)? {
                    Ok(Value::Bool(true))
                } else {
                    Ok(Value::Bool(as_bool(r.eval(scope)?)?))
                }
            }
            HostExpr::Binary(BinaryOp::Coalesce, l, r, _) => match l.eval(scope)? {
                Value::Null => r.eval(scope),
                v => Ok(v),
            },
            HostExpr::Binary(op, l, r, _) => eval_binary(*op, l.eval(scope)?, r.eval(scope)?),
            HostExpr::Concat(l, r) => {
                Ok(Value::from(format!("{}{}", l.eval(scope)?, r.eval(scope)?)))
            }
            HostExpr::DynamicEquals {
                left,
                right,
                negate,
            } => Ok(Value::Bool((left.eval(scope)? == right.eval(scope)?) != *negate)),
            HostExpr::Conditional {
                condition,
                if_true,
                if_false,
                ..
            } => {
                if as_bool(condition.eval(scope)?)? {
                    if_true.eval(scope)
                } else {
                    if_false.eval(scope)
                }
            }
            HostExpr::IsNull(e) => Ok(Value::Bool(e.eval(scope)?.is_null())),
            HostExpr::Block { temp, init, body } => {
                let value = init.eval(scope)?;
                body.eval(&scope.with_local(temp.id, value))
            }
            HostExpr::Property { target, member } => {
                let target = eval_target(target, scope, &member.name)?;
                member.get(&target)
            }
            HostExpr::Call {
                target,
                method,
                args,
                type_args,
                ..
            } => {
                let target = eval_target(target, scope, &method.name)?;
                let args = args
                    .iter()
                    .map(|a| a.eval(scope))
                    .collect::<Result<Vec<_>, _>>()?;
                let _guard = DepthGuard::enter(scope.frame.limits.depth_limit)?;
                method.invoke(&target, &args, type_args)
            }
            HostExpr::ArrayIndex { array, index, .. } => {
                let array = array.eval(scope)?;
                let index = index.eval(scope)?;
                let array = match array {
                    Value::Null => {
                        return Err(InvokeError::NullReference {
                            member: "[]".to_string(),
                        })
                    }
                    Value::Array(a) => a,
                    other => {
                        return Err(InvokeError::InvalidCast {
                            from: other.type_name(),
                            to: "array".to_string(),
                        })
                    }
                };
                let i = index.as_int().ok_or_else(|| InvokeError::InvalidCast {
                    from: index.type_name(),
                    to: "int".to_string(),
                })?;
                usize::try_from(i)
                    .ok()
                    .and_then(|u| array.items.get(u))
                    .cloned()
                    .ok_or(InvokeError::IndexOutOfRange {
                        index: i,
                        len: array.items.len(),
                    })
            }
            HostExpr::NewArray {
                element_type,
                items,
            } => Ok(ArrayValue::new(
                element_type.clone(),
                items
                    .iter()
                    .map(|i| i.eval(scope))
                    .collect::<Result<_, _>>()?,
            )),
            HostExpr::Lambda(l) => Ok(Value::Delegate(Delegate::compiled(l.clone(), scope.clone()))),
            HostExpr::DynamicMember(d) => d.eval(scope),
            HostExpr::DynamicCall(d) => d.eval(scope),
        }
    }
}

fn eval_target(
    target: &Option<Box<HostExpr>>,
    scope: &Scope,
    member: &str,
) -> Result<Value, InvokeError> {
    match target {
        None => Ok(Value::Null),
        Some(t) => match t.eval(scope)? {
            Value::Null => Err(InvokeError::NullReference {
                member: member.to_string(),
            }),
            v => Ok(v),
        },
    }
}

impl HostLambda {
    pub(crate) fn invoke(&self, scope: &Scope, args: &[Value]) -> Result<Value, InvokeError> {
        let _guard = DepthGuard::enter(scope.frame.limits.depth_limit)?;
        let mut inner = scope.clone();
        for (param, arg) in self.params.iter().zip(args) {
            let arg = inner.convert(arg.clone(), &param.ty)?;
            inner = inner.with_local(param.id, arg);
        }
        self.body.eval(&inner)
    }
}

/// What a single invocation supplies to the compiled code.
pub(crate) struct Frame {
    pub(crate) target: Value,
    pub(crate) args: Vec<Value>,
    pub(crate) metadata: Arc<Metadata>,
    pub(crate) converter: Arc<dyn ValueConverter>,
    pub(crate) limits: InvokeLimits,
}

struct LocalSlot {
    id: LocalId,
    value: Value,
    parent: Option<Arc<LocalSlot>>,
}

#[derive(Clone)]
pub struct Scope {
    frame: Arc<Frame>,
    locals: Option<Arc<LocalSlot>>,
}

impl Scope {
    pub(crate) fn new(frame: Frame) -> Self {
        Self {
            frame: Arc::new(frame),
            locals: None,
        }
    }

    /// a scope with no target or arguments, for evaluating closed expressions
    pub(crate) fn detached(converter: Arc<dyn ValueConverter>) -> Self {
        Self::new(Frame {
            target: Value::Null,
            args: vec![],
            metadata: Arc::new(Metadata::new()),
            converter,
            limits: InvokeLimits::default(),
        })
    }

    pub(crate) fn metadata(&self) -> &Arc<Metadata> {
        &self.frame.metadata
    }

    pub(crate) fn with_local(&self, id: LocalId, value: Value) -> Self {
        Self {
            frame: self.frame.clone(),
            locals: Some(Arc::new(LocalSlot {
                id,
                value,
                parent: self.locals.clone(),
            })),
        }
    }

    fn local(&self, id: LocalId) -> Result<Value, InvokeError> {
        let mut current = self.locals.as_deref();
        while let Some(slot) = current {
            if slot.id == id {
                return Ok(slot.value.clone());
            }
            current = slot.parent.as_deref();
        }
        Err(InvokeError::Host(format!("local {id} is not bound")))
    }

    pub(crate) fn convert(&self, value: Value, ty: &BType) -> Result<Value, InvokeError> {
        if *ty == BType::Object {
            return Ok(value);
        }
        self.frame.converter.convert(value, ty, &self.frame.metadata)
    }
}

thread_local! {
    static DEPTH: Cell<usize> = Cell::new(0);
}

pub(crate) struct DepthGuard;

impl DepthGuard {
    pub(crate) fn enter(limit: Option<usize>) -> Result<Self, InvokeError> {
        DEPTH.with(|depth| {
            let next = depth.get() + 1;
            match limit {
                Some(limit) if next > limit => Err(InvokeError::MaximumDepth { limit }),
                _ => {
                    depth.set(next);
                    Ok(DepthGuard)
                }
            }
        })
    }
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)))
    }
}

fn as_bool(value: Value) -> Result<bool, InvokeError> {
    value.as_bool().ok_or_else(|| InvokeError::InvalidCast {
        from: value.type_name(),
        to: "bool".to_string(),
    })
}

fn invalid_operation(op: &'static str, operands: &[&Value]) -> InvokeError {
    InvokeError::InvalidOperation {
        operation: op,
        operands: operands
            .iter()
            .map(|v| v.type_name())
            .collect::<Vec<_>>()
            .join(" and "),
    }
}

fn loose_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Double(a), Value::Double(b)) => a == b,
        (Value::Int(_) | Value::Double(_), Value::Int(_) | Value::Double(_)) => {
            left.as_f64() == right.as_f64()
        }
        _ => left == right,
    }
}

fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::Int(_) | Value::Double(_), Value::Int(_) | Value::Double(_)) => {
            left.as_f64()?.partial_cmp(&right.as_f64()?)
        }
        (Value::Enum(s0, a), Value::Enum(s1, b)) if s0 == s1 => Some(a.cmp(b)),
        _ => None,
    }
}

pub(crate) fn eval_binary(op: BinaryOp, left: Value, right: Value) -> Result<Value, InvokeError> {
    let name: &'static str = op.into();
    match op {
        BinaryOp::Equal => return Ok(Value::Bool(loose_eq(&left, &right))),
        BinaryOp::NotEqual => return Ok(Value::Bool(!loose_eq(&left, &right))),
        BinaryOp::LessThan
        | BinaryOp::LessThanOrEqual
        | BinaryOp::GreaterThan
        | BinaryOp::GreaterThanOrEqual => {
            let ord = compare(&left, &right);
            return Ok(Value::Bool(match (op, ord) {
                (_, None) => false,
                (BinaryOp::LessThan, Some(o)) => o == Ordering::Less,
                (BinaryOp::LessThanOrEqual, Some(o)) => o != Ordering::Greater,
                (BinaryOp::GreaterThan, Some(o)) => o == Ordering::Greater,
                (_, Some(o)) => o != Ordering::Less,
            }));
        }
        BinaryOp::Coalesce => return Ok(if left.is_null() { right } else { left }),
        BinaryOp::Add if matches!(left, Value::Str(_)) || matches!(right, Value::Str(_)) => {
            return Ok(Value::from(format!("{left}{right}")));
        }
        _ => {}
    }
    if left.is_null() || right.is_null() {
        return Ok(Value::Null);
    }
    match (&left, &right) {
        (Value::Int(a), Value::Int(b)) => {
            let (a, b) = (*a, *b);
            Ok(Value::Int(match op {
                BinaryOp::Add => a.wrapping_add(b),
                BinaryOp::Subtract => a.wrapping_sub(b),
                BinaryOp::Multiply => a.wrapping_mul(b),
                BinaryOp::Divide | BinaryOp::Modulo if b == 0 => {
                    return Err(InvokeError::DivideByZero)
                }
                BinaryOp::Divide => a.wrapping_div(b),
                BinaryOp::Modulo => a.wrapping_rem(b),
                BinaryOp::And => a & b,
                BinaryOp::Or => a | b,
                BinaryOp::ExclusiveOr => a ^ b,
                BinaryOp::LeftShift => a.wrapping_shl(b as u32),
                BinaryOp::RightShift => a.wrapping_shr(b as u32),
                _ => return Err(invalid_operation(name, &[&left, &right])),
            }))
        }
        (Value::Int(_) | Value::Double(_), Value::Int(_) | Value::Double(_)) => {
            let (a, b) = match (left.as_f64(), right.as_f64()) {
                (Some(a), Some(b)) => (a, b),
                _ => return Err(invalid_operation(name, &[&left, &right])),
            };
            Ok(Value::Double(match op {
                BinaryOp::Add => a + b,
                BinaryOp::Subtract => a - b,
                BinaryOp::Multiply => a * b,
                BinaryOp::Divide => a / b,
                BinaryOp::Modulo => a % b,
                _ => return Err(invalid_operation(name, &[&left, &right])),
            }))
        }
        (Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(match op {
            BinaryOp::And | BinaryOp::AndAlso => *a && *b,
            BinaryOp::Or | BinaryOp::OrElse => *a || *b,
            BinaryOp::ExclusiveOr => a ^ b,
            _ => return Err(invalid_operation(name, &[&left, &right])),
        })),
        _ => Err(invalid_operation(name, &[&left, &right])),
    }
}

pub(crate) fn eval_unary(op: UnaryOp, operand: Value) -> Result<Value, InvokeError> {
    match (op, &operand) {
        (_, Value::Null) => Ok(Value::Null),
        (UnaryOp::Negate, Value::Int(i)) => Ok(Value::Int(i.wrapping_neg())),
        (UnaryOp::Negate, Value::Double(d)) => Ok(Value::Double(-d)),
        (UnaryOp::UnaryPlus, Value::Int(_) | Value::Double(_)) => Ok(operand),
        (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
        (UnaryOp::OnesComplement, Value::Int(i)) => Ok(Value::Int(!i)),
        _ => Err(invalid_operation(op.into(), &[&operand])),
    }
}
