use crate::btype::{BType, ClassSpec, DelegateSpec, EnumSpec};
use crate::host_expr::{HostLambda, Scope};
use crate::invoke_err::InvokeError;
use derivative::Derivative;
use itertools::Itertools;
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt::{Debug, Display, Formatter};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// An object owned by the host application.
pub trait HostObject: Any + Debug + Send + Sync {
    fn class(&self) -> Arc<ClassSpec>;
    fn as_any(&self) -> &dyn Any;
}

#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    Str(Arc<str>),
    Enum(Arc<EnumSpec>, usize),
    Array(Arc<ArrayValue>),
    Object(Arc<dyn HostObject>),
    Delegate(Arc<Delegate>),
    Metadata(Arc<Metadata>),
    Type(BType),
}

#[derive(Debug)]
pub struct ArrayValue {
    pub element_type: BType,
    pub items: Vec<Value>,
}

impl ArrayValue {
    pub fn new(element_type: BType, items: Vec<Value>) -> Value {
        Value::Array(Arc::new(Self {
            element_type,
            items,
        }))
    }
}

pub type NativeDelegate = Arc<dyn Fn(&[Value]) -> Result<Value, InvokeError> + Send + Sync>;

pub(crate) enum DelegateBody {
    Compiled { lambda: Arc<HostLambda>, scope: Scope },
    Native(NativeDelegate),
}

#[derive(Derivative)]
#[derivative(Debug)]
pub struct Delegate {
    pub spec: Arc<DelegateSpec>,
    #[derivative(Debug = "ignore")]
    body: DelegateBody,
}

impl Delegate {
    pub fn native(spec: Arc<DelegateSpec>, f: NativeDelegate) -> Arc<Self> {
        Arc::new(Self {
            spec,
            body: DelegateBody::Native(f),
        })
    }

    pub(crate) fn compiled(lambda: Arc<HostLambda>, scope: Scope) -> Arc<Self> {
        Arc::new(Self {
            spec: lambda.spec.clone(),
            body: DelegateBody::Compiled { lambda, scope },
        })
    }

    pub fn invoke(&self, args: &[Value]) -> Result<Value, InvokeError> {
        if args.len() != self.spec.params.len() {
            return Err(InvokeError::ArgumentCountMismatch {
                expected: self.spec.params.len(),
                actual: args.len(),
            });
        }
        match &self.body {
            DelegateBody::Compiled { lambda, scope } => lambda.invoke(scope, args),
            DelegateBody::Native(f) => f(args),
        }
    }
}

pub const TARGET_TYPE: &str = "TargetType";

/// Immutable bag of values passed alongside compilation and invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    entries: BTreeMap<String, Value>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    pub fn with_target_type(self, ty: BType) -> Self {
        self.with(TARGET_TYPE, Value::Type(ty))
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn target_type(&self) -> Option<&BType> {
        match self.get(TARGET_TYPE) {
            Some(Value::Type(t)) => Some(t),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Hash for Metadata {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for (k, v) in self.entries.iter() {
            k.hash(state);
            v.hash(state);
        }
    }
}

fn ptr_addr<T: ?Sized>(arc: &Arc<T>) -> usize {
    Arc::as_ptr(arc) as *const () as usize
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a.to_bits() == b.to_bits(),
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Enum(s0, a), Value::Enum(s1, b)) => s0 == s1 && a == b,
            (Value::Array(a), Value::Array(b)) => Arc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => ptr_addr(a) == ptr_addr(b),
            (Value::Delegate(a), Value::Delegate(b)) => Arc::ptr_eq(a, b),
            (Value::Metadata(a), Value::Metadata(b)) => a == b,
            (Value::Type(a), Value::Type(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Bool(b) => b.hash(state),
            Value::Int(i) => i.hash(state),
            Value::Double(d) => d.to_bits().hash(state),
            Value::Str(s) => s.hash(state),
            Value::Enum(spec, ordinal) => {
                spec.hash(state);
                ordinal.hash(state)
            }
            Value::Array(a) => ptr_addr(a).hash(state),
            Value::Object(o) => ptr_addr(o).hash(state),
            Value::Delegate(d) => ptr_addr(d).hash(state),
            Value::Metadata(m) => m.hash(state),
            Value::Type(t) => t.hash(state),
        }
    }
}

impl Value {
    pub fn str(s: &str) -> Self {
        Value::Str(s.into())
    }

    pub fn object(o: impl HostObject) -> Self {
        Value::Object(Arc::new(o))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// the most derived type of this value, null values report `Object`
    pub fn runtime_type(&self) -> BType {
        match self {
            Value::Null | Value::Type(_) => BType::Object,
            Value::Bool(_) => BType::Bool,
            Value::Int(_) => BType::Int,
            Value::Double(_) => BType::Double,
            Value::Str(_) => BType::String,
            Value::Enum(spec, _) => BType::Enum(spec.clone()),
            Value::Array(a) => BType::Array(Arc::new(a.element_type.clone())),
            Value::Object(o) => BType::Class(o.class()),
            Value::Delegate(d) => BType::Delegate(d.spec.clone()),
            Value::Metadata(_) => BType::Metadata,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Double(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Arc<ArrayValue>> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_delegate(&self) -> Option<&Arc<Delegate>> {
        match self {
            Value::Delegate(d) => Some(d),
            _ => None,
        }
    }

    pub fn downcast<T: HostObject>(&self) -> Option<&T> {
        match self {
            Value::Object(o) => o.as_any().downcast_ref(),
            _ => None,
        }
    }

    pub(crate) fn type_name(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            _ => self.runtime_type().to_string(),
        }
    }

    /// the standard coercion of a runtime value into a static type
    pub fn convert_to(self, to: &BType) -> Result<Value, InvokeError> {
        match (self, to) {
            (v, BType::Object | BType::Void | BType::Generic(_)) => Ok(v),
            (Value::Null, BType::Nullable(_)) => Ok(Value::Null),
            (v, BType::Nullable(inner)) => v.convert_to(inner),
            (Value::Null, _) if to.is_nullable() => Ok(Value::Null),
            (Value::Int(i), BType::Double) => Ok(Value::Double(i as f64)),
            (v, _) => {
                if v.runtime_type().is_assignable_to(to) {
                    Ok(v)
                } else {
                    Err(InvokeError::InvalidCast {
                        from: v.type_name(),
                        to: to.to_string(),
                    })
                }
            }
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Double(d) => write!(f, "{d}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::Enum(spec, ordinal) => match spec.variants.get(*ordinal) {
                Some(name) => write!(f, "{name}"),
                None => write!(f, "{ordinal}"),
            },
            Value::Array(a) => write!(f, "[{}]", a.items.iter().join(", ")),
            Value::Object(o) => write!(f, "{}", o.class().name),
            Value::Delegate(d) => write!(f, "{}", BType::Delegate(d.spec.clone())),
            Value::Metadata(_) => write!(f, "metadata"),
            Value::Type(t) => write!(f, "{t}"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Double(d)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s.into())
    }
}

impl From<BType> for Value {
    fn from(t: BType) -> Self {
        Value::Type(t)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(o: Option<T>) -> Self {
        o.map_or(Value::Null, Into::into)
    }
}
