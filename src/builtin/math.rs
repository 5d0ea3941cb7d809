use crate::btype::{BType, ClassSpec};
use crate::bvalue::Value;
use crate::invoke_err::InvokeError;
use crate::members::{MemberRegistry, ParamSpec};
use crate::add_static_method;

lazy_static! {
    pub static ref MATH: BType = BType::Class(ClassSpec::sealed("Math"));
}

/// rounds half way values to the nearest even number
fn round_even(x: f64) -> f64 {
    let r = x.round();
    if (x - x.trunc()).abs() == 0.5 {
        2.0 * (x / 2.0).round()
    } else {
        r
    }
}

pub fn add_math_constants(registry: &MemberRegistry) {
    registry.add_static_accessor(MATH.clone(), "PI", BType::Double, || {
        Ok(Value::Double(std::f64::consts::PI))
    });
    registry.add_static_accessor(MATH.clone(), "E", BType::Double, || {
        Ok(Value::Double(std::f64::consts::E))
    });
}

macro_rules! add_binfunc {
    ($fn_name:ident, $name:literal, $ty:expr, $getter:ident, $ret_ctor:path, $func:expr) => {
        add_static_method!(
            $fn_name,
            MATH.clone(),
            $name,
            [ParamSpec::new("a", $ty), ParamSpec::new("b", $ty)],
            $ty,
            |inv| Ok($ret_ctor($func(inv.$getter(0)?, inv.$getter(1)?)))
        );
    };
}

add_binfunc!(add_math_max_int, "Max", BType::Int, int, Value::Int, i64::max);
add_binfunc!(add_math_max_double, "Max", BType::Double, double, Value::Double, f64::max);
add_binfunc!(add_math_min_int, "Min", BType::Int, int, Value::Int, i64::min);
add_binfunc!(add_math_min_double, "Min", BType::Double, double, Value::Double, f64::min);
add_binfunc!(add_math_pow, "Pow", BType::Double, double, Value::Double, f64::powf);

add_static_method!(
    add_math_abs_int,
    MATH.clone(),
    "Abs",
    [ParamSpec::new("value", BType::Int)],
    BType::Int,
    |inv| {
        let v = inv.int(0)?;
        v.checked_abs()
            .map(Value::Int)
            .ok_or(InvokeError::InvalidOperation {
                operation: "Abs",
                operands: v.to_string(),
            })
    }
);

add_static_method!(
    add_math_abs_double,
    MATH.clone(),
    "Abs",
    [ParamSpec::new("value", BType::Double)],
    BType::Double,
    |inv| Ok(Value::Double(inv.double(0)?.abs()))
);

add_static_method!(
    add_math_sqrt,
    MATH.clone(),
    "Sqrt",
    [ParamSpec::new("value", BType::Double)],
    BType::Double,
    |inv| Ok(Value::Double(inv.double(0)?.sqrt()))
);

add_static_method!(
    add_math_round,
    MATH.clone(),
    "Round",
    [ParamSpec::new("value", BType::Double)],
    BType::Double,
    |inv| Ok(Value::Double(round_even(inv.double(0)?)))
);

add_static_method!(
    add_math_round_digits,
    MATH.clone(),
    "Round",
    [
        ParamSpec::new("value", BType::Double),
        ParamSpec::new("digits", BType::Int)
    ],
    BType::Double,
    |inv| {
        let digits = inv.int(1)?;
        if !(0..=15).contains(&digits) {
            return Err(InvokeError::IndexOutOfRange {
                index: digits,
                len: 16,
            });
        }
        let scale = 10f64.powi(digits as i32);
        Ok(Value::Double(round_even(inv.double(0)? * scale) / scale))
    }
);

pub fn add_math_members(registry: &MemberRegistry) {
    add_math_constants(registry);
    add_math_max_int(registry);
    add_math_max_double(registry);
    add_math_min_int(registry);
    add_math_min_double(registry);
    add_math_pow(registry);
    add_math_abs_int(registry);
    add_math_abs_double(registry);
    add_math_sqrt(registry);
    add_math_round(registry);
    add_math_round_digits(registry);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_even() {
        assert_eq!(round_even(2.5), 2.0);
        assert_eq!(round_even(3.5), 4.0);
        assert_eq!(round_even(-2.5), -2.0);
        assert_eq!(round_even(2.4), 2.0);
    }
}
