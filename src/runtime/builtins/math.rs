//! `Number`, `Boolean`, `Math` and the numeric global functions

use super::{arg, define_constructor, define_method, define_value, native};
use crate::error::messages;
use crate::runtime::interp::{EvalResult, Interpreter};
use crate::runtime::number::{
    number_to_string, parse_float, parse_int, to_fixed, to_integer, to_radix_string, to_uint32,
};
use crate::runtime::value::Value;

const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

fn this_number(interp: &Interpreter, this: &Value, method: &str) -> EvalResult<f64> {
    match this {
        Value::Number(n) => Ok(*n),
        _ => Err(interp.type_error(format!(
            "Number.prototype.{} requires that 'this' be a Number",
            method
        ))),
    }
}

/// `Number.prototype.toPrecision`
fn to_precision(value: f64, precision: usize) -> String {
    if !value.is_finite() {
        return number_to_string(value);
    }
    if value == 0.0 {
        return to_fixed(0.0, precision - 1);
    }
    // `{:e}` rounds the mantissa for us and settles the exponent after rounding
    let scientific = format!("{:.*e}", precision - 1, value);
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return scientific;
    };
    let exponent: i32 = exponent.parse().unwrap_or(0);
    if exponent < -6 || exponent >= precision as i32 {
        let sign = if exponent < 0 { '-' } else { '+' };
        return format!("{}e{}{}", mantissa, sign, exponent.abs());
    }
    to_fixed(value, (precision as i32 - 1 - exponent) as usize)
}

/// `Number.prototype.toLocaleString` for the `en-US` locale
fn to_locale_string(value: f64) -> String {
    if !value.is_finite() {
        return if value.is_nan() {
            "NaN".to_string()
        } else if value > 0.0 {
            "∞".to_string()
        } else {
            "-∞".to_string()
        };
    }
    let fixed = to_fixed(value.abs(), 3);
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((&fixed, ""));
    let frac_part = frac_part.trim_end_matches('0');

    let mut grouped = String::new();
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    let sign = if value < 0.0 && (int_part != "0" || !frac_part.is_empty()) {
        "-"
    } else {
        ""
    };
    if frac_part.is_empty() {
        format!("{}{}", sign, grouped)
    } else {
        format!("{}{}.{}", sign, grouped, frac_part)
    }
}

fn js_round(x: f64) -> f64 {
    if !x.is_finite() || x == 0.0 {
        return x;
    }
    if (-0.5..0.0).contains(&x) {
        return -0.0;
    }
    let floor = x.floor();
    if x - floor >= 0.5 {
        floor + 1.0
    } else {
        floor
    }
}

fn js_sign(x: f64) -> f64 {
    if x.is_nan() || x == 0.0 {
        x
    } else {
        x.signum()
    }
}

pub(super) fn register_number(interp: &mut Interpreter) {
    let prototype = interp.intrinsics.number_prototype.clone();

    // Number.prototype.toFixed
    define_method(interp, &prototype, "toFixed", 1, |interp, this, args| {
        let value = this_number(interp, this, "toFixed")?;
        let digits = to_integer(interp.to_number(&arg(args, 0))?);
        if !(0.0..=100.0).contains(&digits) {
            return Err(interp.range_error(messages::DIGITS_OUT_OF_RANGE));
        }
        Ok(Value::from(to_fixed(value, digits as usize)))
    });

    // Number.prototype.toString
    define_method(interp, &prototype, "toString", 1, |interp, this, args| {
        let value = this_number(interp, this, "toString")?;
        let radix = match arg(args, 0) {
            Value::Undefined => 10.0,
            other => to_integer(interp.to_number(&other)?),
        };
        if !(2.0..=36.0).contains(&radix) {
            return Err(interp.range_error(messages::RADIX_OUT_OF_RANGE));
        }
        Ok(Value::from(to_radix_string(value, radix as u32)))
    });

    // Number.prototype.toPrecision
    define_method(interp, &prototype, "toPrecision", 1, |interp, this, args| {
        let value = this_number(interp, this, "toPrecision")?;
        let precision = match arg(args, 0) {
            Value::Undefined => return Ok(Value::from(number_to_string(value))),
            other => to_integer(interp.to_number(&other)?),
        };
        if !(1.0..=100.0).contains(&precision) {
            return Err(interp.range_error("toPrecision() argument must be between 1 and 100"));
        }
        Ok(Value::from(to_precision(value, precision as usize)))
    });

    // Number.prototype.toLocaleString
    define_method(interp, &prototype, "toLocaleString", 0, |interp, this, _args| {
        let value = this_number(interp, this, "toLocaleString")?;
        Ok(Value::from(to_locale_string(value)))
    });

    // Number.prototype.valueOf
    define_method(interp, &prototype, "valueOf", 0, |interp, this, _args| {
        Ok(Value::Number(this_number(interp, this, "valueOf")?))
    });

    let number = define_constructor(
        interp,
        "Number",
        1,
        &prototype,
        native(|interp, _this, args| {
            if args.is_empty() {
                return Ok(Value::Number(0.0));
            }
            Ok(Value::Number(interp.to_number(&args[0])?))
        }),
        None,
    );

    // Number.isInteger
    define_method(interp, &number, "isInteger", 1, |_interp, _this, args| {
        Ok(Value::Boolean(matches!(
            arg(args, 0),
            Value::Number(n) if n.is_finite() && n.trunc() == n
        )))
    });

    // Number.isSafeInteger
    define_method(interp, &number, "isSafeInteger", 1, |_interp, _this, args| {
        Ok(Value::Boolean(matches!(
            arg(args, 0),
            Value::Number(n) if n.is_finite() && n.trunc() == n && n.abs() <= MAX_SAFE_INTEGER
        )))
    });

    // Number.isFinite
    define_method(interp, &number, "isFinite", 1, |_interp, _this, args| {
        Ok(Value::Boolean(matches!(arg(args, 0), Value::Number(n) if n.is_finite())))
    });

    // Number.isNaN
    define_method(interp, &number, "isNaN", 1, |_interp, _this, args| {
        Ok(Value::Boolean(matches!(arg(args, 0), Value::Number(n) if n.is_nan())))
    });

    // Number.parseFloat
    define_method(interp, &number, "parseFloat", 1, |interp, _this, args| {
        let text = interp.to_string(&arg(args, 0))?;
        Ok(Value::Number(parse_float(&text)))
    });

    // Number.parseInt
    define_method(interp, &number, "parseInt", 2, global_parse_int);

    for (name, value) in [
        ("MAX_SAFE_INTEGER", MAX_SAFE_INTEGER),
        ("MIN_SAFE_INTEGER", -MAX_SAFE_INTEGER),
        ("EPSILON", f64::EPSILON),
        ("MAX_VALUE", f64::MAX),
        ("MIN_VALUE", 5e-324),
        ("POSITIVE_INFINITY", f64::INFINITY),
        ("NEGATIVE_INFINITY", f64::NEG_INFINITY),
        ("NaN", f64::NAN),
    ] {
        define_value(&number, name, Value::Number(value));
    }
}

pub(super) fn register_boolean(interp: &mut Interpreter) {
    let prototype = interp.intrinsics.boolean_prototype.clone();

    // Boolean.prototype.toString
    define_method(interp, &prototype, "toString", 0, |interp, this, _args| match this {
        Value::Boolean(b) => Ok(Value::from(if *b { "true" } else { "false" })),
        _ => Err(interp.type_error("Boolean.prototype.toString requires that 'this' be a Boolean")),
    });

    // Boolean.prototype.valueOf
    define_method(interp, &prototype, "valueOf", 0, |interp, this, _args| match this {
        Value::Boolean(b) => Ok(Value::Boolean(*b)),
        _ => Err(interp.type_error("Boolean.prototype.valueOf requires that 'this' be a Boolean")),
    });

    define_constructor(
        interp,
        "Boolean",
        1,
        &prototype,
        native(|_interp, _this, args| Ok(Value::Boolean(arg(args, 0).to_boolean()))),
        None,
    );
}

pub(super) fn register_math(interp: &mut Interpreter) {
    let math = interp.new_object();

    let unary: [(&str, fn(f64) -> f64); 25] = [
        ("abs", f64::abs),
        ("ceil", f64::ceil),
        ("floor", f64::floor),
        ("round", js_round),
        ("trunc", f64::trunc),
        ("sign", js_sign),
        ("sqrt", f64::sqrt),
        ("cbrt", f64::cbrt),
        ("exp", f64::exp),
        ("expm1", f64::exp_m1),
        ("log", f64::ln),
        ("log2", f64::log2),
        ("log10", f64::log10),
        ("log1p", f64::ln_1p),
        ("sin", f64::sin),
        ("cos", f64::cos),
        ("tan", f64::tan),
        ("asin", f64::asin),
        ("acos", f64::acos),
        ("atan", f64::atan),
        ("sinh", f64::sinh),
        ("cosh", f64::cosh),
        ("tanh", f64::tanh),
        ("fround", |x| x as f32 as f64),
        ("clz32", |x| to_uint32(x).leading_zeros() as f64),
    ];
    for (name, op) in unary {
        define_method(interp, &math, name, 1, move |interp, _this, args| {
            Ok(Value::Number(op(interp.to_number(&arg(args, 0))?)))
        });
    }

    // Math.pow
    define_method(interp, &math, "pow", 2, |interp, _this, args| {
        let base = interp.to_number(&arg(args, 0))?;
        let exponent = interp.to_number(&arg(args, 1))?;
        Ok(Value::Number(crate::runtime::interp::js_pow(base, exponent)))
    });

    // Math.atan2
    define_method(interp, &math, "atan2", 2, |interp, _this, args| {
        let y = interp.to_number(&arg(args, 0))?;
        let x = interp.to_number(&arg(args, 1))?;
        Ok(Value::Number(y.atan2(x)))
    });

    // Math.imul
    define_method(interp, &math, "imul", 2, |interp, _this, args| {
        let a = to_uint32(interp.to_number(&arg(args, 0))?) as i32;
        let b = to_uint32(interp.to_number(&arg(args, 1))?) as i32;
        Ok(Value::Number(a.wrapping_mul(b) as f64))
    });

    // Math.hypot
    define_method(interp, &math, "hypot", 2, |interp, _this, args| {
        let mut sum = 0.0;
        let mut infinite = false;
        for value in args {
            let n = interp.to_number(value)?;
            infinite |= n.is_infinite();
            sum += n * n;
        }
        Ok(Value::Number(if infinite { f64::INFINITY } else { sum.sqrt() }))
    });

    // Math.max
    define_method(interp, &math, "max", 2, |interp, _this, args| {
        let mut result = f64::NEG_INFINITY;
        for value in args {
            let n = interp.to_number(value)?;
            if n.is_nan() || result.is_nan() {
                result = f64::NAN;
            } else if n > result || (n == 0.0 && result == 0.0 && result.is_sign_negative()) {
                result = n;
            }
        }
        Ok(Value::Number(result))
    });

    // Math.min
    define_method(interp, &math, "min", 2, |interp, _this, args| {
        let mut result = f64::INFINITY;
        for value in args {
            let n = interp.to_number(value)?;
            if n.is_nan() || result.is_nan() {
                result = f64::NAN;
            } else if n < result || (n == 0.0 && result == 0.0 && n.is_sign_negative()) {
                result = n;
            }
        }
        Ok(Value::Number(result))
    });

    // Math.random
    define_method(interp, &math, "random", 0, |interp, _this, _args| {
        use rand::Rng;
        Ok(Value::Number(interp.rng.gen::<f64>()))
    });

    for (name, value) in [
        ("PI", std::f64::consts::PI),
        ("E", std::f64::consts::E),
        ("LN2", std::f64::consts::LN_2),
        ("LN10", std::f64::consts::LN_10),
        ("LOG2E", std::f64::consts::LOG2_E),
        ("LOG10E", std::f64::consts::LOG10_E),
        ("SQRT2", std::f64::consts::SQRT_2),
        ("SQRT1_2", std::f64::consts::FRAC_1_SQRT_2),
    ] {
        define_value(&math, name, Value::Number(value));
    }

    interp.define_global("Math", Value::Object(math));
}

fn global_parse_int(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> EvalResult<Value> {
    let text = interp.to_string(&arg(args, 0))?;
    let radix = match arg(args, 1) {
        Value::Undefined => None,
        other => Some(to_uint32(interp.to_number(&other)?) as i32),
    };
    Ok(Value::Number(parse_int(&text, radix)))
}

pub(super) fn register_global_functions(interp: &mut Interpreter) {
    let parse_int_fn = interp.native_function("parseInt", 2, global_parse_int);
    interp.define_global("parseInt", parse_int_fn);

    let parse_float_fn = interp.native_function("parseFloat", 1, |interp, _this, args| {
        let text = interp.to_string(&arg(args, 0))?;
        Ok(Value::Number(parse_float(&text)))
    });
    interp.define_global("parseFloat", parse_float_fn);

    let is_nan = interp.native_function("isNaN", 1, |interp, _this, args| {
        Ok(Value::Boolean(interp.to_number(&arg(args, 0))?.is_nan()))
    });
    interp.define_global("isNaN", is_nan);

    let is_finite = interp.native_function("isFinite", 1, |interp, _this, args| {
        Ok(Value::Boolean(interp.to_number(&arg(args, 0))?.is_finite()))
    });
    interp.define_global("isFinite", is_finite);

    interp.define_global("NaN", Value::Number(f64::NAN));
    interp.define_global("Infinity", Value::Number(f64::INFINITY));
    interp.define_global("undefined", Value::Undefined);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::interp::Limits;

    fn eval(source: &str) -> Value {
        Interpreter::new(Limits::default(), 7).eval_script(source).unwrap()
    }

    #[test]
    fn test_to_precision() {
        assert_eq!(to_precision(123.456, 4), "123.5");
        assert_eq!(to_precision(0.000123, 2), "0.00012");
        assert_eq!(to_precision(123456.0, 2), "1.2e+5");
        assert_eq!(to_precision(0.0, 3), "0.00");
    }

    #[test]
    fn test_locale_string() {
        assert_eq!(to_locale_string(1234567.891), "1,234,567.891");
        assert_eq!(to_locale_string(-1000.0), "-1,000");
        assert_eq!(to_locale_string(0.5), "0.5");
    }

    #[test]
    fn test_number_methods() {
        assert_eq!(eval("(1.005).toFixed(2)"), Value::from("1.00"));
        assert_eq!(eval("(255).toString(16)"), Value::from("ff"));
        assert_eq!(eval("Number('  42 ')"), Value::Number(42.0));
        assert_eq!(eval("Number.isInteger(5) && !Number.isInteger(5.5)"), Value::Boolean(true));
        assert_eq!(
            eval("try { (1).toFixed(101) } catch (e) { e.name }"),
            Value::from("RangeError")
        );
    }

    #[test]
    fn test_math() {
        assert_eq!(eval("Math.round(2.5) + Math.round(-2.5)"), Value::Number(1.0));
        assert_eq!(eval("Math.max(1, 3, 2)"), Value::Number(3.0));
        assert_eq!(eval("Math.max()"), Value::Number(f64::NEG_INFINITY));
        assert!(matches!(eval("Math.min(1, NaN)"), Value::Number(n) if n.is_nan()));
        assert_eq!(eval("Math.hypot(3, 4)"), Value::Number(5.0));
        assert_eq!(eval("Math.sign(-3)"), Value::Number(-1.0));
        assert_eq!(eval("Math.trunc(-4.7)"), Value::Number(-4.0));
    }

    #[test]
    fn test_random_is_seeded() {
        let a = eval("Math.random()");
        let b = eval("Math.random()");
        assert_eq!(a, b);
        assert!(matches!(a, Value::Number(n) if (0.0..1.0).contains(&n)));
    }

    #[test]
    fn test_global_functions() {
        assert_eq!(eval("parseInt('42px')"), Value::Number(42.0));
        assert_eq!(eval("parseInt('ff', 16)"), Value::Number(255.0));
        assert_eq!(eval("parseFloat('3.14abc')"), Value::Number(3.14));
        assert_eq!(eval("isNaN('abc') && isFinite('12')"), Value::Boolean(true));
        assert_eq!(eval("typeof undefined"), Value::from("undefined"));
    }
}
