use crate::btype::BType;
use crate::bvalue::Value;
use crate::members::{MemberRegistry, ParamSpec};
use crate::add_method;

add_method!(add_object_to_string, BType::Object, "ToString", [], BType::String, |inv| Ok(
    Value::from(inv.target.to_string())
));

add_method!(
    add_object_equals,
    BType::Object,
    "Equals",
    [ParamSpec::new("other", BType::Object)],
    BType::Bool,
    |inv| Ok(Value::Bool(inv.target == inv.arg(0)?))
);

pub fn add_object_members(registry: &MemberRegistry) {
    add_object_to_string(registry);
    add_object_equals(registry);
}
