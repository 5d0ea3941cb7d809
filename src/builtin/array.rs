use crate::btype::BType;
use crate::bvalue::Value;
use crate::invoke_err::InvokeError;
use crate::members::{MemberRegistry, ParamSpec};
use crate::add_method;

fn not_an_array(value: &Value) -> InvokeError {
    InvokeError::InvalidCast {
        from: value.type_name(),
        to: "array".to_string(),
    }
}

pub fn add_array_length(registry: &MemberRegistry) {
    registry.add_accessor(BType::array(BType::Object), "Length", BType::Int, |target| {
        let arr = target.as_array().ok_or_else(|| not_an_array(target))?;
        Ok(Value::Int(arr.items.len() as i64))
    });
}

// statically typed arrays are indexed directly, this serves late-bound receivers
add_method!(
    add_array_get_item,
    BType::array(BType::Object),
    "get_Item",
    [ParamSpec::new("index", BType::Int)],
    BType::Object,
    |inv| {
        let arr = inv.target.as_array().ok_or_else(|| not_an_array(inv.target))?;
        let index = inv.int(0)?;
        usize::try_from(index)
            .ok()
            .and_then(|i| arr.items.get(i))
            .cloned()
            .ok_or(InvokeError::IndexOutOfRange {
                index,
                len: arr.items.len(),
            })
    }
);

pub fn add_array_members(registry: &MemberRegistry) {
    add_array_length(registry);
    add_array_get_item(registry);
}
