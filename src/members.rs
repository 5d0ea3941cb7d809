use crate::btype::BType;
use crate::bvalue::{ArrayValue, Delegate, Metadata, Value};
use crate::invoke_err::InvokeError;
use dashmap::DashMap;
use derivative::Derivative;
use itertools::Itertools;
use std::fmt::{Display, Formatter};
use std::ops::BitOr;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberCategory {
    Accessor,
    Method,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MemberFlags(u8);

impl MemberFlags {
    pub const INSTANCE: Self = Self(1);
    pub const STATIC: Self = Self(2);
    pub const EXTENSION: Self = Self(4);
    pub const INSTANCE_ALL: Self = Self(1 | 4);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for MemberFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

pub type Getter = Arc<dyn Fn(&Value) -> Result<Value, InvokeError> + Send + Sync>;
pub type Setter = Arc<dyn Fn(&Value, Value) -> Result<(), InvokeError> + Send + Sync>;
pub type Invoker = Arc<dyn Fn(&Invocation<'_>) -> Result<Value, InvokeError> + Send + Sync>;

/// The arguments of a native method call, after conversion to the parameter types.
pub struct Invocation<'a> {
    pub target: &'a Value,
    pub args: &'a [Value],
    pub type_args: &'a [BType],
}

fn cast_error(value: &Value, to: &str) -> InvokeError {
    InvokeError::InvalidCast {
        from: value.type_name(),
        to: to.to_string(),
    }
}

impl<'a> Invocation<'a> {
    pub fn arg(&self, index: usize) -> Result<&'a Value, InvokeError> {
        self.args
            .get(index)
            .ok_or(InvokeError::ArgumentCountMismatch {
                expected: index + 1,
                actual: self.args.len(),
            })
    }

    pub fn int(&self, index: usize) -> Result<i64, InvokeError> {
        let v = self.arg(index)?;
        v.as_int().ok_or_else(|| cast_error(v, "int"))
    }

    pub fn double(&self, index: usize) -> Result<f64, InvokeError> {
        let v = self.arg(index)?;
        v.as_f64().ok_or_else(|| cast_error(v, "double"))
    }

    pub fn str(&self, index: usize) -> Result<&'a str, InvokeError> {
        let v = self.arg(index)?;
        v.as_str().ok_or_else(|| cast_error(v, "string"))
    }

    pub fn array(&self, index: usize) -> Result<&'a Arc<ArrayValue>, InvokeError> {
        let v = self.arg(index)?;
        v.as_array().ok_or_else(|| cast_error(v, "array"))
    }

    pub fn delegate(&self, index: usize) -> Result<&'a Arc<Delegate>, InvokeError> {
        let v = self.arg(index)?;
        v.as_delegate().ok_or_else(|| cast_error(v, "delegate"))
    }

    pub fn target_str(&self) -> Result<&'a str, InvokeError> {
        self.target
            .as_str()
            .ok_or_else(|| cast_error(self.target, "string"))
    }

    pub fn type_arg(&self, index: usize) -> BType {
        self.type_args.get(index).cloned().unwrap_or(BType::Object)
    }
}

#[derive(Derivative, Clone)]
#[derivative(Debug)]
pub struct AccessorSpec {
    pub ty: BType,
    #[derivative(Debug = "ignore")]
    pub getter: Getter,
    #[derivative(Debug = "ignore")]
    pub setter: Option<Setter>,
}

#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: Arc<str>,
    pub ty: BType,
    pub default: Option<Value>,
    pub is_params: bool,
}

impl ParamSpec {
    pub fn new(name: &str, ty: BType) -> Self {
        Self {
            name: name.into(),
            ty,
            default: None,
            is_params: false,
        }
    }

    pub fn with_default(name: &str, ty: BType, default: impl Into<Value>) -> Self {
        Self {
            default: Some(default.into()),
            ..Self::new(name, ty)
        }
    }

    /// a trailing variadic parameter of the given element type
    pub fn params(name: &str, element: BType) -> Self {
        Self {
            is_params: true,
            ..Self::new(name, BType::array(element))
        }
    }

    /// a parameter that receives the compilation metadata instead of an argument
    pub fn metadata(name: &str) -> Self {
        Self::new(name, BType::Metadata)
    }

    pub fn is_metadata(&self) -> bool {
        self.ty == BType::Metadata
    }
}

#[derive(Derivative, Clone)]
#[derivative(Debug)]
pub struct MethodSpec {
    pub generic_params: Vec<Arc<str>>,
    pub params: Vec<ParamSpec>,
    pub ret: BType,
    pub is_extension: bool,
    #[derivative(Debug = "ignore")]
    pub invoker: Invoker,
}

impl MethodSpec {
    pub fn new(
        params: Vec<ParamSpec>,
        ret: BType,
        invoker: impl Fn(&Invocation<'_>) -> Result<Value, InvokeError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            generic_params: vec![],
            params,
            ret,
            is_extension: false,
            invoker: Arc::new(invoker),
        }
    }

    pub fn generic(
        generic_params: &[&str],
        params: Vec<ParamSpec>,
        ret: BType,
        invoker: impl Fn(&Invocation<'_>) -> Result<Value, InvokeError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            generic_params: generic_params.iter().map(|g| Arc::from(*g)).collect(),
            ..Self::new(params, ret, invoker)
        }
    }

    pub fn has_params_array(&self) -> bool {
        self.params.last().map_or(false, |p| p.is_params)
    }
}

#[derive(Debug, Clone)]
pub enum MemberKind {
    Accessor(AccessorSpec),
    Method(MethodSpec),
}

#[derive(Debug)]
pub struct MemberDescriptor {
    pub name: Arc<str>,
    pub declaring_type: BType,
    pub is_static: bool,
    pub kind: MemberKind,
}

impl MemberDescriptor {
    pub fn category(&self) -> MemberCategory {
        match self.kind {
            MemberKind::Accessor(_) => MemberCategory::Accessor,
            MemberKind::Method(_) => MemberCategory::Method,
        }
    }

    pub fn accessor(&self) -> Option<&AccessorSpec> {
        match &self.kind {
            MemberKind::Accessor(a) => Some(a),
            MemberKind::Method(_) => None,
        }
    }

    pub fn method(&self) -> Option<&MethodSpec> {
        match &self.kind {
            MemberKind::Method(m) => Some(m),
            MemberKind::Accessor(_) => None,
        }
    }

    pub fn value_type(&self) -> BType {
        match &self.kind {
            MemberKind::Accessor(a) => a.ty.clone(),
            MemberKind::Method(m) => m.ret.clone(),
        }
    }

    pub(crate) fn get(&self, target: &Value) -> Result<Value, InvokeError> {
        match &self.kind {
            MemberKind::Accessor(a) => (a.getter)(target),
            MemberKind::Method(_) => Err(InvokeError::InvalidBindingMember {
                type_name: self.declaring_type.to_string(),
                member: self.name.to_string(),
            }),
        }
    }

    pub(crate) fn set(&self, target: &Value, value: Value) -> Result<(), InvokeError> {
        match self.accessor().and_then(|a| a.setter.as_ref()) {
            Some(setter) => setter(target, value),
            None => Err(InvokeError::NotAssignable),
        }
    }

    pub(crate) fn invoke(
        &self,
        target: &Value,
        args: &[Value],
        type_args: &[BType],
    ) -> Result<Value, InvokeError> {
        match &self.kind {
            MemberKind::Method(m) => (m.invoker)(&Invocation {
                target,
                args,
                type_args,
            }),
            MemberKind::Accessor(_) => Err(InvokeError::InvalidBindingMember {
                type_name: self.declaring_type.to_string(),
                member: self.name.to_string(),
            }),
        }
    }
}

impl Display for MemberDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            MemberKind::Accessor(a) => write!(f, "{} {}.{}", a.ty, self.declaring_type, self.name),
            MemberKind::Method(m) => {
                write!(f, "{}", self.name)?;
                if !m.generic_params.is_empty() {
                    write!(f, "<{}>", m.generic_params.iter().join(", "))?;
                }
                write!(
                    f,
                    "({})",
                    m.params
                        .iter()
                        .enumerate()
                        .map(|(i, p)| {
                            let prefix = if m.is_extension && i == 0 {
                                "this "
                            } else if p.is_params {
                                "params "
                            } else {
                                ""
                            };
                            format!("{prefix}{} {}", p.ty, p.name)
                        })
                        .join(", ")
                )
            }
        }
    }
}

/// Resolves named members of host types.
pub trait MemberProvider: Send + Sync {
    fn try_get_members(
        &self,
        ty: &BType,
        category: MemberCategory,
        flags: MemberFlags,
        name: &str,
        metadata: &Metadata,
    ) -> Vec<Arc<MemberDescriptor>>;

    fn try_get_member(
        &self,
        ty: &BType,
        category: MemberCategory,
        flags: MemberFlags,
        name: &str,
        metadata: &Metadata,
    ) -> Option<Arc<MemberDescriptor>> {
        self.try_get_members(ty, category, flags, name, metadata)
            .into_iter()
            .next()
    }
}

/// The default, thread safe [`MemberProvider`].
#[derive(Default)]
pub struct MemberRegistry {
    members: DashMap<(BType, Arc<str>), Vec<Arc<MemberDescriptor>>>,
    extensions: DashMap<Arc<str>, Vec<Arc<MemberDescriptor>>>,
}

pub(crate) fn canonical_owner(ty: &BType) -> BType {
    match ty {
        BType::Array(_) => BType::array(BType::Object),
        BType::Nullable(t) => t.as_ref().clone(),
        _ => ty.clone(),
    }
}

fn owner_chain(ty: &BType) -> Vec<BType> {
    let mut ret = vec![canonical_owner(ty)];
    if let BType::Class(c) = ty {
        let mut base = c.base.clone();
        while let Some(b) = base {
            base = b.base.clone();
            ret.push(BType::Class(b));
        }
    }
    if ty != &BType::Object {
        ret.push(BType::Object);
    }
    ret
}

impl MemberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn add(&self, member: MemberDescriptor) -> Arc<MemberDescriptor> {
        let member = Arc::new(member);
        self.members
            .entry((canonical_owner(&member.declaring_type), member.name.clone()))
            .or_default()
            .push(member.clone());
        member
    }

    pub fn add_accessor(
        &self,
        owner: BType,
        name: &str,
        ty: BType,
        getter: impl Fn(&Value) -> Result<Value, InvokeError> + Send + Sync + 'static,
    ) -> Arc<MemberDescriptor> {
        self.add(MemberDescriptor {
            name: name.into(),
            declaring_type: owner,
            is_static: false,
            kind: MemberKind::Accessor(AccessorSpec {
                ty,
                getter: Arc::new(getter),
                setter: None,
            }),
        })
    }

    pub fn add_property(
        &self,
        owner: BType,
        name: &str,
        ty: BType,
        getter: impl Fn(&Value) -> Result<Value, InvokeError> + Send + Sync + 'static,
        setter: impl Fn(&Value, Value) -> Result<(), InvokeError> + Send + Sync + 'static,
    ) -> Arc<MemberDescriptor> {
        self.add(MemberDescriptor {
            name: name.into(),
            declaring_type: owner,
            is_static: false,
            kind: MemberKind::Accessor(AccessorSpec {
                ty,
                getter: Arc::new(getter),
                setter: Some(Arc::new(setter)),
            }),
        })
    }

    pub fn add_static_accessor(
        &self,
        owner: BType,
        name: &str,
        ty: BType,
        getter: impl Fn() -> Result<Value, InvokeError> + Send + Sync + 'static,
    ) -> Arc<MemberDescriptor> {
        self.add(MemberDescriptor {
            name: name.into(),
            declaring_type: owner,
            is_static: true,
            kind: MemberKind::Accessor(AccessorSpec {
                ty,
                getter: Arc::new(move |_| getter()),
                setter: None,
            }),
        })
    }

    pub fn add_method(&self, owner: BType, name: &str, spec: MethodSpec) -> Arc<MemberDescriptor> {
        self.add(MemberDescriptor {
            name: name.into(),
            declaring_type: owner,
            is_static: false,
            kind: MemberKind::Method(spec),
        })
    }

    pub fn add_static_method(
        &self,
        owner: BType,
        name: &str,
        spec: MethodSpec,
    ) -> Arc<MemberDescriptor> {
        self.add(MemberDescriptor {
            name: name.into(),
            declaring_type: owner,
            is_static: true,
            kind: MemberKind::Method(spec),
        })
    }

    /// registers a static method whose first parameter is the receiver
    pub fn add_extension(&self, name: &str, mut spec: MethodSpec) -> Arc<MemberDescriptor> {
        spec.is_extension = true;
        let declaring_type = spec
            .params
            .first()
            .map_or(BType::Object, |p| p.ty.clone());
        let member = Arc::new(MemberDescriptor {
            name: name.into(),
            declaring_type,
            is_static: true,
            kind: MemberKind::Method(spec),
        });
        self.extensions
            .entry(member.name.clone())
            .or_default()
            .push(member.clone());
        member
    }
}

fn accepts_receiver(member: &MemberDescriptor, ty: &BType) -> bool {
    member
        .method()
        .and_then(|m| m.params.first())
        .map_or(false, |p| p.ty.bind_in_assignment(ty).is_some())
}

impl MemberProvider for MemberRegistry {
    fn try_get_members(
        &self,
        ty: &BType,
        category: MemberCategory,
        flags: MemberFlags,
        name: &str,
        _metadata: &Metadata,
    ) -> Vec<Arc<MemberDescriptor>> {
        let name: Arc<str> = name.into();
        let mut ret = vec![];
        for owner in owner_chain(ty) {
            if let Some(members) = self.members.get(&(owner, name.clone())) {
                ret.extend(
                    members
                        .iter()
                        .filter(|m| m.category() == category)
                        .filter(|m| {
                            if m.is_static {
                                flags.contains(MemberFlags::STATIC)
                            } else {
                                flags.contains(MemberFlags::INSTANCE)
                            }
                        })
                        .cloned(),
                );
            }
        }
        if category == MemberCategory::Method && flags.contains(MemberFlags::EXTENSION) {
            if let Some(extensions) = self.extensions.get(&name) {
                ret.extend(
                    extensions
                        .iter()
                        .filter(|m| accepts_receiver(m, ty))
                        .cloned(),
                );
            }
        }
        ret
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::btype::ClassSpec;

    #[test]
    fn test_base_chain_lookup() {
        let base = ClassSpec::new("Base");
        let derived = ClassSpec::derived("Derived", base.clone());
        let registry = MemberRegistry::new();
        registry.add_accessor(BType::Class(base), "Id", BType::Int, |_| Ok(Value::Int(1)));
        let found = registry.try_get_member(
            &BType::Class(derived),
            MemberCategory::Accessor,
            MemberFlags::INSTANCE,
            "Id",
            &Metadata::new(),
        );
        assert_eq!(found.unwrap().value_type(), BType::Int);
    }

    #[test]
    fn test_static_flags() {
        let registry = MemberRegistry::new();
        registry.add_static_accessor(BType::String, "Empty", BType::String, || Ok(Value::str("")));
        let md = Metadata::new();
        assert!(registry
            .try_get_member(&BType::String, MemberCategory::Accessor, MemberFlags::INSTANCE, "Empty", &md)
            .is_none());
        assert!(registry
            .try_get_member(&BType::String, MemberCategory::Accessor, MemberFlags::STATIC, "Empty", &md)
            .is_some());
    }

    #[test]
    fn test_extension_receiver_filter() {
        let registry = MemberRegistry::new();
        registry.add_extension(
            "Twice",
            MethodSpec::new(vec![ParamSpec::new("s", BType::String)], BType::String, |inv| {
                Ok(Value::from(inv.str(0)?.repeat(2)))
            }),
        );
        let md = Metadata::new();
        let found = |ty: &BType| {
            registry
                .try_get_members(ty, MemberCategory::Method, MemberFlags::INSTANCE_ALL, "Twice", &md)
                .len()
        };
        assert_eq!(found(&BType::String), 1);
        assert_eq!(found(&BType::Int), 0);
    }
}
