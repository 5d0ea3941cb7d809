use itertools::Itertools;
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BType {
    Void,
    Object,
    Bool,
    Int,
    Double,
    String,
    Metadata,
    Nullable(Arc<BType>),
    Enum(Arc<EnumSpec>),
    Array(Arc<BType>),
    Class(Arc<ClassSpec>),
    Delegate(Arc<DelegateSpec>),
    Generic(Arc<str>),
}

#[derive(Debug)]
pub struct EnumSpec {
    pub name: String,
    pub variants: Vec<String>,
}

impl EnumSpec {
    pub fn new(name: impl Into<String>, variants: impl IntoIterator<Item = impl Into<String>>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            variants: variants.into_iter().map(Into::into).collect(),
        })
    }

    pub fn ordinal(&self, variant: &str) -> Option<usize> {
        self.variants.iter().position(|v| v == variant)
    }
}

impl PartialEq for EnumSpec {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for EnumSpec {}

impl Hash for EnumSpec {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state)
    }
}

/// A named host reference type. Classes are identified by name.
#[derive(Debug)]
pub struct ClassSpec {
    pub name: String,
    pub base: Option<Arc<ClassSpec>>,
    /// sealed classes never hold instances of a more derived runtime type
    pub sealed: bool,
}

impl ClassSpec {
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            base: None,
            sealed: false,
        })
    }

    pub fn sealed(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            base: None,
            sealed: true,
        })
    }

    pub fn derived(name: impl Into<String>, base: Arc<ClassSpec>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            base: Some(base),
            sealed: false,
        })
    }

    pub fn is_subclass_of(&self, other: &ClassSpec) -> bool {
        let mut current = Some(self);
        while let Some(c) = current {
            if c == other {
                return true;
            }
            current = c.base.as_deref();
        }
        false
    }
}

impl PartialEq for ClassSpec {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for ClassSpec {}

impl Hash for ClassSpec {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DelegateSpec {
    pub params: Vec<BType>,
    pub ret: BType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conversion {
    Identity,
    Implicit,
    Boxing,
    Unsafe,
}

#[derive(Debug, Eq, PartialEq, Clone, Default)]
pub struct Bind {
    bound_generics: HashMap<Arc<str>, BType>,
}

impl Bind {
    pub fn new() -> Self {
        Bind {
            bound_generics: HashMap::new(),
        }
    }

    pub fn single(name: Arc<str>, ty: BType) -> Self {
        Bind {
            bound_generics: HashMap::from([(name, ty)]),
        }
    }

    pub fn from_iter(bound_generics: impl IntoIterator<Item = (Arc<str>, BType)>) -> Self {
        Bind {
            bound_generics: bound_generics.into_iter().collect(),
        }
    }

    pub fn mix(mut self, other: &Bind) -> Option<Self> {
        for (k, v) in other.bound_generics.iter() {
            if let Some(existing) = self.bound_generics.get(k) {
                let new_bind = existing.common_type(v)?;
                self.bound_generics.insert(k.clone(), new_bind);
            } else {
                self.bound_generics.insert(k.clone(), v.clone());
            }
        }
        Some(self)
    }

    pub fn get(&self, name: &str) -> Option<&BType> {
        self.bound_generics.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Arc<str>, &BType)> {
        self.bound_generics.iter()
    }
}

impl BType {
    /// wraps value types in `Nullable`, reference types are returned as is
    pub fn nullable(inner: BType) -> BType {
        if inner.is_value_type() {
            BType::Nullable(Arc::new(inner))
        } else {
            inner
        }
    }

    pub fn array(element: BType) -> BType {
        BType::Array(Arc::new(element))
    }

    pub fn delegate(params: Vec<BType>, ret: BType) -> BType {
        BType::Delegate(Arc::new(DelegateSpec { params, ret }))
    }

    pub fn generic(name: &str) -> BType {
        BType::Generic(name.into())
    }

    pub fn is_value_type(&self) -> bool {
        matches!(self, BType::Bool | BType::Int | BType::Double | BType::Enum(_))
    }

    /// whether a value of this type may be null
    pub fn is_nullable(&self) -> bool {
        !self.is_value_type() && !matches!(self, BType::Void)
    }

    pub fn underlying(&self) -> &BType {
        match self {
            BType::Nullable(inner) => inner,
            _ => self,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self.underlying(), BType::Int | BType::Double)
    }

    pub fn is_late_bound(&self) -> bool {
        match self {
            BType::Object | BType::Generic(_) => true,
            BType::Class(c) => !c.sealed,
            _ => false,
        }
    }

    pub fn has_generics(&self) -> bool {
        match self {
            BType::Generic(_) => true,
            BType::Nullable(t) | BType::Array(t) => t.has_generics(),
            BType::Delegate(d) => d.params.iter().any(BType::has_generics) || d.ret.has_generics(),
            _ => false,
        }
    }

    pub fn element_type(&self) -> Option<&BType> {
        match self {
            BType::Array(t) => Some(t),
            _ => None,
        }
    }

    pub fn conversion_to(&self, to: &BType) -> Option<Conversion> {
        if self == to {
            return Some(Conversion::Identity);
        }
        match (self, to) {
            (BType::Void, _) | (_, BType::Void) => None,
            (_, BType::Object) => {
                if self.is_value_type() || matches!(self, BType::Nullable(_)) {
                    Some(Conversion::Boxing)
                } else {
                    Some(Conversion::Implicit)
                }
            }
            (BType::Object, _) | (BType::Generic(_), _) | (_, BType::Generic(_)) => {
                Some(Conversion::Unsafe)
            }
            (BType::Int, BType::Double) => Some(Conversion::Implicit),
            (BType::Nullable(a), BType::Nullable(b)) => match a.conversion_to(b)? {
                Conversion::Identity | Conversion::Implicit => Some(Conversion::Implicit),
                _ => None,
            },
            (_, BType::Nullable(b)) => match self.conversion_to(b)? {
                Conversion::Identity | Conversion::Implicit => Some(Conversion::Implicit),
                _ => None,
            },
            (BType::Class(a), BType::Class(b)) => {
                if a.is_subclass_of(b) {
                    Some(Conversion::Implicit)
                } else if b.is_subclass_of(a) {
                    Some(Conversion::Unsafe)
                } else {
                    None
                }
            }
            (BType::Array(a), BType::Array(b)) => {
                if a.is_value_type() {
                    return None;
                }
                match a.conversion_to(b)? {
                    Conversion::Identity | Conversion::Implicit => Some(Conversion::Implicit),
                    Conversion::Unsafe => Some(Conversion::Unsafe),
                    Conversion::Boxing => None,
                }
            }
            _ => None,
        }
    }

    pub fn is_assignable_to(&self, to: &BType) -> bool {
        matches!(
            self.conversion_to(to),
            Some(Conversion::Identity | Conversion::Implicit | Conversion::Boxing)
        )
    }

    /// matches `self` (a parameter type, possibly generic) against the type of an argument
    pub fn bind_in_assignment(&self, other: &BType) -> Option<Bind> {
        match (self, other) {
            (BType::Generic(name), _) => Some(Bind::single(name.clone(), other.clone())),
            (BType::Array(a), BType::Array(b)) if self.has_generics() => a.bind_in_assignment(b),
            (BType::Nullable(a), BType::Nullable(b)) if self.has_generics() => {
                a.bind_in_assignment(b)
            }
            (BType::Nullable(a), _) if self.has_generics() => a.bind_in_assignment(other),
            (BType::Delegate(a), BType::Delegate(b)) if self.has_generics() => {
                if a.params.len() != b.params.len() {
                    return None;
                }
                let mut total_binds = Bind::new();
                for (a_type, b_type) in a.params.iter().zip(b.params.iter()) {
                    total_binds = total_binds.mix(&a_type.bind_in_assignment(b_type)?)?;
                }
                total_binds.mix(&a.ret.bind_in_assignment(&b.ret)?)
            }
            _ if !self.has_generics() => other.conversion_to(self).map(|_| Bind::new()),
            _ => None,
        }
    }

    pub fn resolve_bind(&self, bind: &Bind) -> BType {
        match self {
            BType::Generic(name) => bind.get(name).cloned().unwrap_or_else(|| self.clone()),
            BType::Nullable(t) => BType::nullable(t.resolve_bind(bind)),
            BType::Array(t) => BType::array(t.resolve_bind(bind)),
            BType::Delegate(d) => BType::delegate(
                d.params.iter().map(|p| p.resolve_bind(bind)).collect(),
                d.ret.resolve_bind(bind),
            ),
            _ => self.clone(),
        }
    }

    /// the type both operands implicitly convert to, if any
    pub fn common_type(&self, other: &BType) -> Option<BType> {
        if self == other {
            return Some(self.clone());
        }
        match (self, other) {
            (BType::Object, _) | (_, BType::Object) => Some(BType::Object),
            (BType::Int, BType::Double) | (BType::Double, BType::Int) => Some(BType::Double),
            _ if self.is_numeric() && other.is_numeric() => {
                let inner = self.underlying().common_type(other.underlying())?;
                Some(BType::nullable(inner))
            }
            _ => {
                if self.conversion_to(other) == Some(Conversion::Implicit) {
                    Some(other.clone())
                } else if other.conversion_to(self) == Some(Conversion::Implicit) {
                    Some(self.clone())
                } else {
                    None
                }
            }
        }
    }
}

impl Display for BType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            BType::Void => write!(f, "void"),
            BType::Object => write!(f, "object"),
            BType::Bool => write!(f, "bool"),
            BType::Int => write!(f, "int"),
            BType::Double => write!(f, "double"),
            BType::String => write!(f, "string"),
            BType::Metadata => write!(f, "metadata"),
            BType::Nullable(t) => write!(f, "{t}?"),
            BType::Enum(e) => write!(f, "{}", e.name),
            BType::Array(t) => write!(f, "{t}[]"),
            BType::Class(c) => write!(f, "{}", c.name),
            BType::Delegate(d) => write!(
                f,
                "Func<{}>",
                d.params.iter().chain(std::iter::once(&d.ret)).join(", ")
            ),
            BType::Generic(name) => write!(f, "{name}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_widening() {
        assert_eq!(BType::Int.conversion_to(&BType::Double), Some(Conversion::Implicit));
        assert_eq!(BType::Double.conversion_to(&BType::Int), None);
        assert_eq!(BType::Int.conversion_to(&BType::Object), Some(Conversion::Boxing));
        assert_eq!(BType::Object.conversion_to(&BType::Int), Some(Conversion::Unsafe));
    }

    #[test]
    fn test_class_chain() {
        let animal = ClassSpec::new("Animal");
        let dog = ClassSpec::derived("Dog", animal.clone());
        let dog_t = BType::Class(dog);
        let animal_t = BType::Class(animal);
        assert_eq!(dog_t.conversion_to(&animal_t), Some(Conversion::Implicit));
        assert_eq!(animal_t.conversion_to(&dog_t), Some(Conversion::Unsafe));
        assert_eq!(
            BType::array(dog_t).conversion_to(&BType::array(animal_t)),
            Some(Conversion::Implicit)
        );
    }

    #[test]
    fn test_common_type() {
        assert_eq!(BType::Int.common_type(&BType::Double), Some(BType::Double));
        let nullable_int = BType::nullable(BType::Int);
        assert_eq!(BType::Int.common_type(&nullable_int), Some(nullable_int.clone()));
        assert_eq!(
            nullable_int.common_type(&BType::Double),
            Some(BType::nullable(BType::Double))
        );
        assert_eq!(BType::String.common_type(&BType::Int), None);
    }

    #[test]
    fn test_bind_delegate() {
        let param = BType::delegate(vec![BType::generic("T")], BType::generic("R"));
        let arg = BType::delegate(vec![BType::Int], BType::String);
        let bind = param.bind_in_assignment(&arg).unwrap();
        assert_eq!(bind.get("T"), Some(&BType::Int));
        assert_eq!(bind.get("R"), Some(&BType::String));
        assert_eq!(
            BType::array(BType::generic("R")).resolve_bind(&bind),
            BType::array(BType::String)
        );
    }

    #[test]
    fn test_bind_mix_unifies() {
        let a = Bind::single("T".into(), BType::Int);
        let b = Bind::single("T".into(), BType::Double);
        assert_eq!(a.mix(&b).unwrap().get("T"), Some(&BType::Double));
        let c = Bind::single("T".into(), BType::String);
        assert!(Bind::single("T".into(), BType::Int).mix(&c).is_none());
    }
}
