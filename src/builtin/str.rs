use crate::btype::BType;
use crate::bvalue::Value;
use crate::invoke_err::InvokeError;
use crate::members::{MemberRegistry, ParamSpec};
use crate::{add_method, add_static_method};
use regex::Regex;

fn char_len(s: &str) -> i64 {
    s.chars().count() as i64
}

/// the char offset of `byte_idx` inside `s`
fn char_offset(s: &str, byte_idx: usize) -> i64 {
    char_len(&s[..byte_idx])
}

fn out_of_range(index: i64, len: i64) -> InvokeError {
    InvokeError::IndexOutOfRange {
        index,
        len: len as usize,
    }
}

fn substring(s: &str, start: i64, length: Option<i64>) -> Result<Value, InvokeError> {
    let len = char_len(s);
    if start < 0 || start > len {
        return Err(out_of_range(start, len));
    }
    let length = length.unwrap_or(len - start);
    if length < 0 || length > len - start {
        return Err(out_of_range(start.saturating_add(length), len));
    }
    Ok(Value::from(
        s.chars()
            .skip(start as usize)
            .take(length as usize)
            .collect::<String>(),
    ))
}

pub fn add_str_length_accessor(registry: &MemberRegistry) {
    registry.add_accessor(BType::String, "Length", BType::Int, |target| {
        let s = target.as_str().ok_or(InvokeError::InvalidCast {
            from: target.type_name(),
            to: "string".to_string(),
        })?;
        Ok(Value::Int(char_len(s)))
    });
}

add_method!(
    add_str_get_item,
    BType::String,
    "get_Item",
    [ParamSpec::new("index", BType::Int)],
    BType::String,
    |inv| {
        let s = inv.target_str()?;
        let index = inv.int(0)?;
        let c = usize::try_from(index)
            .ok()
            .and_then(|i| s.chars().nth(i))
            .ok_or_else(|| out_of_range(index, char_len(s)))?;
        Ok(Value::from(c.to_string()))
    }
);

add_method!(add_str_to_upper, BType::String, "ToUpper", [], BType::String, |inv| Ok(
    Value::from(inv.target_str()?.to_uppercase())
));

add_method!(add_str_to_lower, BType::String, "ToLower", [], BType::String, |inv| Ok(
    Value::from(inv.target_str()?.to_lowercase())
));

add_method!(add_str_trim, BType::String, "Trim", [], BType::String, |inv| Ok(
    Value::from(inv.target_str()?.trim())
));

add_method!(
    add_str_contains,
    BType::String,
    "Contains",
    [ParamSpec::new("value", BType::String)],
    BType::Bool,
    |inv| Ok(Value::Bool(inv.target_str()?.contains(inv.str(0)?)))
);

add_method!(
    add_str_starts_with,
    BType::String,
    "StartsWith",
    [ParamSpec::new("value", BType::String)],
    BType::Bool,
    |inv| Ok(Value::Bool(inv.target_str()?.starts_with(inv.str(0)?)))
);

add_method!(
    add_str_ends_with,
    BType::String,
    "EndsWith",
    [ParamSpec::new("value", BType::String)],
    BType::Bool,
    |inv| Ok(Value::Bool(inv.target_str()?.ends_with(inv.str(0)?)))
);

add_method!(
    add_str_index_of,
    BType::String,
    "IndexOf",
    [ParamSpec::new("value", BType::String)],
    BType::Int,
    |inv| {
        let s = inv.target_str()?;
        Ok(Value::Int(
            s.find(inv.str(0)?).map_or(-1, |i| char_offset(s, i)),
        ))
    }
);

add_method!(
    add_str_index_of_from,
    BType::String,
    "IndexOf",
    [
        ParamSpec::new("value", BType::String),
        ParamSpec::new("startIndex", BType::Int)
    ],
    BType::Int,
    |inv| {
        let s = inv.target_str()?;
        let start = inv.int(1)?;
        let len = char_len(s);
        if start < 0 || start > len {
            return Err(out_of_range(start, len));
        }
        let byte_start = s
            .char_indices()
            .nth(start as usize)
            .map_or(s.len(), |(i, _)| i);
        Ok(Value::Int(
            s[byte_start..]
                .find(inv.str(0)?)
                .map_or(-1, |i| char_offset(s, byte_start + i)),
        ))
    }
);

add_method!(
    add_str_substring,
    BType::String,
    "Substring",
    [ParamSpec::new("startIndex", BType::Int)],
    BType::String,
    |inv| substring(inv.target_str()?, inv.int(0)?, None)
);

add_method!(
    add_str_substring_len,
    BType::String,
    "Substring",
    [
        ParamSpec::new("startIndex", BType::Int),
        ParamSpec::new("length", BType::Int)
    ],
    BType::String,
    |inv| substring(inv.target_str()?, inv.int(0)?, Some(inv.int(1)?))
);

add_method!(
    add_str_replace,
    BType::String,
    "Replace",
    [
        ParamSpec::new("oldValue", BType::String),
        ParamSpec::new("newValue", BType::String)
    ],
    BType::String,
    |inv| {
        let old = inv.str(0)?;
        if old.is_empty() {
            return Err(InvokeError::InvalidOperation {
                operation: "Replace",
                operands: "an empty pattern".to_string(),
            });
        }
        Ok(Value::from(inv.target_str()?.replace(old, inv.str(1)?)))
    }
);

add_static_method!(
    add_str_is_null_or_empty,
    BType::String,
    "IsNullOrEmpty",
    [ParamSpec::new("value", BType::String)],
    BType::Bool,
    |inv| Ok(Value::Bool(inv.arg(0)?.as_str().map_or(true, str::is_empty)))
);

add_static_method!(
    add_str_concat,
    BType::String,
    "Concat",
    [ParamSpec::params("values", BType::Object)],
    BType::String,
    |inv| {
        let parts = inv.array(0)?;
        Ok(Value::from(
            parts.items.iter().map(|v| v.to_string()).collect::<String>(),
        ))
    }
);

lazy_static! {
    static ref FORMAT_ITEM: Regex = Regex::new(r"\{\{|\}\}|\{(\d+)\}").unwrap();
}

fn format(pattern: &str, args: &[Value]) -> Result<String, InvokeError> {
    let mut ret = String::with_capacity(pattern.len());
    let mut last = 0;
    for cap in FORMAT_ITEM.captures_iter(pattern) {
        let whole = cap.get(0).map_or(0..0, |m| m.range());
        ret.push_str(&pattern[last..whole.start]);
        last = whole.end;
        match cap.get(1) {
            None => ret.push_str(&pattern[whole.start..whole.start + 1]),
            Some(idx) => {
                let index = idx.as_str().parse::<usize>().map_err(|_| {
                    InvokeError::Host(format!("bad format item {{{}}}", idx.as_str()))
                })?;
                let value = args
                    .get(index)
                    .ok_or_else(|| out_of_range(index as i64, args.len() as i64))?;
                ret.push_str(&value.to_string());
            }
        }
    }
    ret.push_str(&pattern[last..]);
    Ok(ret)
}

add_static_method!(
    add_str_format,
    BType::String,
    "Format",
    [
        ParamSpec::new("format", BType::String),
        ParamSpec::params("args", BType::Object)
    ],
    BType::String,
    |inv| Ok(Value::from(format(inv.str(0)?, &inv.array(1)?.items)?))
);

pub fn add_str_members(registry: &MemberRegistry) {
    add_str_length_accessor(registry);
    add_str_get_item(registry);
    add_str_to_upper(registry);
    add_str_to_lower(registry);
    add_str_trim(registry);
    add_str_contains(registry);
    add_str_starts_with(registry);
    add_str_ends_with(registry);
    add_str_index_of(registry);
    add_str_index_of_from(registry);
    add_str_substring(registry);
    add_str_substring_len(registry);
    add_str_replace(registry);
    add_str_is_null_or_empty(registry);
    add_str_concat(registry);
    add_str_format(registry);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_items() {
        let args = [Value::Int(3), Value::str("x")];
        assert_eq!(format("{1}={0} {{0}}", &args).unwrap(), "x=3 {0}");
    }

    #[test]
    fn test_format_missing_arg() {
        assert!(matches!(
            format("{2}", &[Value::Int(1)]),
            Err(InvokeError::IndexOutOfRange { index: 2, len: 1 })
        ));
    }

    #[test]
    fn test_substring_bounds() {
        assert_eq!(substring("hello", 1, Some(3)).unwrap().to_string(), "ell");
        assert!(substring("hello", 4, Some(3)).is_err());
    }
}
