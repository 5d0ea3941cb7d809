pub mod array;
pub mod enumerable;
pub mod math;
pub mod object;
pub mod str;

use crate::members::MemberRegistry;
use crate::services::TypeTable;
use std::sync::Arc;

/// registers a native instance method of `$owner`
#[macro_export]
macro_rules! add_method {
    ($fn_name:ident, $owner:expr, $name:literal, [$($param:expr),* $(,)?], $ret:expr, $func:expr) => {
        pub fn $fn_name(registry: &$crate::members::MemberRegistry) {
            registry.add_method(
                $owner,
                $name,
                $crate::members::MethodSpec::new(vec![$($param),*], $ret, $func),
            );
        }
    };
}

/// registers a native static method of `$owner`
#[macro_export]
macro_rules! add_static_method {
    ($fn_name:ident, $owner:expr, $name:literal, [$($param:expr),* $(,)?], $ret:expr, $func:expr) => {
        pub fn $fn_name(registry: &$crate::members::MemberRegistry) {
            registry.add_static_method(
                $owner,
                $name,
                $crate::members::MethodSpec::new(vec![$($param),*], $ret, $func),
            );
        }
    };
}

/// the members a binding host provides out of the box
pub fn std_members() -> Arc<MemberRegistry> {
    let registry = MemberRegistry::new();
    object::add_object_members(&registry);
    str::add_str_members(&registry);
    array::add_array_members(&registry);
    math::add_math_members(&registry);
    enumerable::add_enumerable_members(&registry);
    Arc::new(registry)
}

/// the primitive type names plus the static classes of [`std_members`]
pub fn std_types() -> Arc<TypeTable> {
    let types = TypeTable::new();
    types.add("Math", math::MATH.clone());
    Arc::new(types)
}
