use crate::btype::BType;
use crate::bvalue::{Metadata, Value};
use crate::invoke_err::InvokeError;
use crate::members::MemberProvider;
use dashmap::DashMap;
use std::sync::Arc;

/// Maps textual type names to host types.
pub trait TypeResolver: Send + Sync {
    fn try_resolve_type(&self, name: &str) -> Option<BType>;
}

pub struct TypeTable {
    types: DashMap<String, BType>,
}

impl Default for TypeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeTable {
    pub fn new() -> Self {
        let types = DashMap::new();
        for (name, ty) in [
            ("object", BType::Object),
            ("bool", BType::Bool),
            ("int", BType::Int),
            ("double", BType::Double),
            ("string", BType::String),
            ("String", BType::String),
        ] {
            types.insert(name.to_string(), ty);
        }
        Self { types }
    }

    pub fn add(&self, name: &str, ty: BType) {
        self.types.insert(name.to_string(), ty);
    }
}

impl TypeResolver for TypeTable {
    fn try_resolve_type(&self, name: &str) -> Option<BType> {
        if let Some(element) = name.strip_suffix("[]") {
            return self.try_resolve_type(element).map(BType::array);
        }
        if let Some(inner) = name.strip_suffix('?') {
            return self.try_resolve_type(inner).map(BType::nullable);
        }
        self.types.get(name).map(|t| t.value().clone())
    }
}

/// Coerces runtime values to the static types compiled code expects.
pub trait ValueConverter: Send + Sync {
    fn convert(&self, value: Value, to: &BType, metadata: &Metadata) -> Result<Value, InvokeError>;
}

#[derive(Debug, Default)]
pub struct DefaultValueConverter;

impl ValueConverter for DefaultValueConverter {
    fn convert(&self, value: Value, to: &BType, _metadata: &Metadata) -> Result<Value, InvokeError> {
        value.convert_to(to)
    }
}

/// The collaborators a compiler resolves members, types and conversions through.
#[derive(Clone)]
pub struct Services {
    pub members: Arc<dyn MemberProvider>,
    pub types: Arc<dyn TypeResolver>,
    pub converter: Arc<dyn ValueConverter>,
}

impl Services {
    pub fn new(members: Arc<dyn MemberProvider>, types: Arc<dyn TypeResolver>) -> Self {
        Self {
            members,
            types,
            converter: Arc::new(DefaultValueConverter),
        }
    }

    pub fn with_converter(mut self, converter: Arc<dyn ValueConverter>) -> Self {
        self.converter = converter;
        self
    }
}
