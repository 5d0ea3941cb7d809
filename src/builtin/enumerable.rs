use crate::btype::BType;
use crate::bvalue::{ArrayValue, Value};
use crate::invoke_err::InvokeError;
use crate::members::{Invocation, MemberRegistry, MethodSpec, ParamSpec};

fn t() -> BType {
    BType::generic("T")
}

fn source() -> ParamSpec {
    ParamSpec::new("source", BType::array(t()))
}

fn predicate() -> ParamSpec {
    ParamSpec::new("predicate", BType::delegate(vec![t()], BType::Bool))
}

fn test(inv: &Invocation<'_>, item: &Value) -> Result<bool, InvokeError> {
    let ret = inv.delegate(1)?.invoke(std::slice::from_ref(item))?;
    ret.as_bool().ok_or_else(|| InvokeError::InvalidCast {
        from: ret.type_name(),
        to: "bool".to_string(),
    })
}

pub fn add_enumerable_count(registry: &MemberRegistry) {
    registry.add_extension(
        "Count",
        MethodSpec::generic(&["T"], vec![source()], BType::Int, |inv| {
            Ok(Value::Int(inv.array(0)?.items.len() as i64))
        }),
    );
    registry.add_extension(
        "Count",
        MethodSpec::generic(&["T"], vec![source(), predicate()], BType::Int, |inv| {
            let mut count = 0;
            for item in inv.array(0)?.items.iter() {
                if test(inv, item)? {
                    count += 1;
                }
            }
            Ok(Value::Int(count))
        }),
    );
}

pub fn add_enumerable_any(registry: &MemberRegistry) {
    registry.add_extension(
        "Any",
        MethodSpec::generic(&["T"], vec![source()], BType::Bool, |inv| {
            Ok(Value::Bool(!inv.array(0)?.items.is_empty()))
        }),
    );
    registry.add_extension(
        "Any",
        MethodSpec::generic(&["T"], vec![source(), predicate()], BType::Bool, |inv| {
            for item in inv.array(0)?.items.iter() {
                if test(inv, item)? {
                    return Ok(Value::Bool(true));
                }
            }
            Ok(Value::Bool(false))
        }),
    );
}

pub fn add_enumerable_where(registry: &MemberRegistry) {
    registry.add_extension(
        "Where",
        MethodSpec::generic(
            &["T"],
            vec![source(), predicate()],
            BType::array(t()),
            |inv| {
                let mut items = vec![];
                for item in inv.array(0)?.items.iter() {
                    if test(inv, item)? {
                        items.push(item.clone());
                    }
                }
                Ok(ArrayValue::new(inv.type_arg(0), items))
            },
        ),
    );
}

pub fn add_enumerable_select(registry: &MemberRegistry) {
    registry.add_extension(
        "Select",
        MethodSpec::generic(
            &["T", "R"],
            vec![
                source(),
                ParamSpec::new(
                    "selector",
                    BType::delegate(vec![t()], BType::generic("R")),
                ),
            ],
            BType::array(BType::generic("R")),
            |inv| {
                let selector = inv.delegate(1)?;
                let items = inv
                    .array(0)?
                    .items
                    .iter()
                    .map(|item| selector.invoke(std::slice::from_ref(item)))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(ArrayValue::new(inv.type_arg(1), items))
            },
        ),
    );
}

pub fn add_enumerable_contains(registry: &MemberRegistry) {
    registry.add_extension(
        "Contains",
        MethodSpec::generic(
            &["T"],
            vec![source(), ParamSpec::new("value", t())],
            BType::Bool,
            |inv| {
                let value = inv.arg(1)?;
                Ok(Value::Bool(inv.array(0)?.items.contains(value)))
            },
        ),
    );
}

pub fn add_enumerable_sum(registry: &MemberRegistry) {
    registry.add_extension(
        "Sum",
        MethodSpec::new(
            vec![ParamSpec::new("source", BType::array(BType::Int))],
            BType::Int,
            |inv| {
                let mut total: i64 = 0;
                for item in inv.array(0)?.items.iter() {
                    let v = item.as_int().ok_or_else(|| InvokeError::InvalidCast {
                        from: item.type_name(),
                        to: "int".to_string(),
                    })?;
                    total = total.wrapping_add(v);
                }
                Ok(Value::Int(total))
            },
        ),
    );
    registry.add_extension(
        "Sum",
        MethodSpec::new(
            vec![ParamSpec::new("source", BType::array(BType::Double))],
            BType::Double,
            |inv| {
                let mut total = 0.0;
                for item in inv.array(0)?.items.iter() {
                    total += item.as_f64().ok_or_else(|| InvokeError::InvalidCast {
                        from: item.type_name(),
                        to: "double".to_string(),
                    })?;
                }
                Ok(Value::Double(total))
            },
        ),
    );
}

pub fn add_enumerable_members(registry: &MemberRegistry) {
    add_enumerable_count(registry);
    add_enumerable_any(registry);
    add_enumerable_where(registry);
    add_enumerable_select(registry);
    add_enumerable_contains(registry);
    add_enumerable_sum(registry);
}
