//! ECMAScript abstract operations and operator semantics.
//!
//! Everything here is the slow path behind the JIT's inline sequences: the
//! ToPrimitive/ToNumber/ToString conversion ladder and the full operator
//! algorithms. The arithmetic operators mirror the inline integer fast
//! path exactly — checked `i32` arithmetic while both operands carry the
//! Integer tag, double arithmetic as the overflow fallback — so compiled
//! code produces identical values whichever path it takes.

use crate::context::Context;
use crate::string::StringRef;
use crate::value::{Value, ValueKind};
use crate::JsResult;

const TWO_POW_32: f64 = 4294967296.0;

/// Preferred type for [`to_primitive`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreferredType {
    Default,
    Number,
    String,
}

/// ECMAScript ToBoolean. Never throws.
pub fn to_boolean(value: Value) -> bool {
    match value.kind() {
        ValueKind::Undefined | ValueKind::Null => false,
        ValueKind::Boolean(b) => b,
        ValueKind::Integer(i) => i != 0,
        ValueKind::Double(d) => d != 0.0 && !d.is_nan(),
        ValueKind::String(s) => !s.get().is_empty(),
        ValueKind::Object(_) => true,
    }
}

/// ECMAScript ToNumber.
pub fn to_number(ctx: &mut Context, value: Value) -> JsResult<f64> {
    match value.kind() {
        ValueKind::Undefined => Ok(f64::NAN),
        ValueKind::Null => Ok(0.0),
        ValueKind::Boolean(b) => Ok(if b { 1.0 } else { 0.0 }),
        ValueKind::Integer(i) => Ok(f64::from(i)),
        ValueKind::Double(d) => Ok(d),
        ValueKind::String(s) => Ok(string_to_number(&s.get().to_rust_string())),
        ValueKind::Object(_) => {
            let primitive = to_primitive(ctx, value, PreferredType::Number)?;
            to_number(ctx, primitive)
        }
    }
}

/// The ToNumber string grammar: optional whitespace, decimal or hex
/// literal, `Infinity` forms; anything else is NaN.
pub fn string_to_number(text: &str) -> f64 {
    let trimmed = text.trim_matches(|c: char| c.is_whitespace() || c == '\u{feff}');
    if trimmed.is_empty() {
        return 0.0;
    }
    match trimmed {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    if let Some(hex) = trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
        return match u64::from_str_radix(hex, 16) {
            Ok(n) => n as f64,
            Err(_) => f64::NAN,
        };
    }
    match fast_float::parse::<f64, _>(trimmed) {
        Ok(n) => n,
        Err(_) => f64::NAN,
    }
}

/// ECMAScript ToInt32 (modular).
pub fn f64_to_int32(number: f64) -> i32 {
    if !number.is_finite() || number == 0.0 {
        return 0;
    }
    let modulo = number.trunc().rem_euclid(TWO_POW_32);
    if modulo >= TWO_POW_32 / 2.0 {
        (modulo - TWO_POW_32) as i32
    } else {
        modulo as i32
    }
}

/// ECMAScript ToUint32 (modular).
pub fn f64_to_uint32(number: f64) -> u32 {
    if !number.is_finite() || number == 0.0 {
        return 0;
    }
    number.trunc().rem_euclid(TWO_POW_32) as u32
}

/// ECMAScript ToInteger: NaN becomes +0, infinities keep their sign,
/// everything else truncates toward zero.
pub fn to_integer(ctx: &mut Context, value: Value) -> JsResult<f64> {
    let number = to_number(ctx, value)?;
    Ok(if number.is_nan() { 0.0 } else { number.trunc() })
}

pub fn to_int32(ctx: &mut Context, value: Value) -> JsResult<i32> {
    if let Some(i) = value.as_int32() {
        return Ok(i);
    }
    Ok(f64_to_int32(to_number(ctx, value)?))
}

pub fn to_uint32(ctx: &mut Context, value: Value) -> JsResult<u32> {
    if let Some(i) = value.as_int32() {
        return Ok(i as u32);
    }
    Ok(f64_to_uint32(to_number(ctx, value)?))
}

/// ECMAScript ToString for a Number payload.
pub fn number_to_string(number: f64) -> String {
    if number as i32 as f64 == number && !(number == 0.0 && number.is_sign_negative()) {
        let mut buffer = itoa::Buffer::new();
        return buffer.format(number as i32).to_owned();
    }
    let mut buffer = ryu_js::Buffer::new();
    buffer.format(number).to_owned()
}

/// ECMAScript ToString.
pub fn to_string_value(ctx: &mut Context, value: Value) -> JsResult<StringRef> {
    match value.kind() {
        ValueKind::Undefined => Ok(ctx.engine().identifier("undefined")),
        ValueKind::Null => Ok(ctx.engine().identifier("null")),
        ValueKind::Boolean(b) => Ok(ctx.engine().identifier(if b { "true" } else { "false" })),
        ValueKind::Integer(i) => {
            let mut buffer = itoa::Buffer::new();
            let text = buffer.format(i).to_owned();
            Ok(ctx.engine().new_string(&text))
        }
        ValueKind::Double(d) => {
            let text = number_to_string(d);
            Ok(ctx.engine().new_string(&text))
        }
        ValueKind::String(s) => Ok(s),
        ValueKind::Object(_) => {
            let primitive = to_primitive(ctx, value, PreferredType::String)?;
            to_string_value(ctx, primitive)
        }
    }
}

/// ECMAScript ToPrimitive via the object's `valueOf`/`toString` methods.
pub fn to_primitive(ctx: &mut Context, value: Value, hint: PreferredType) -> JsResult<Value> {
    let Some(object) = value.as_object() else {
        return Ok(value);
    };

    let engine = ctx.engine();
    let hint = match hint {
        PreferredType::Default => {
            // Dates prefer the string hint by default.
            if matches!(object.get().kind, crate::object::ObjectKind::Date(_)) {
                PreferredType::String
            } else {
                PreferredType::Number
            }
        }
        other => other,
    };
    let (first, second) = if hint == PreferredType::String {
        (engine.names.to_string, engine.names.value_of)
    } else {
        (engine.names.value_of, engine.names.to_string)
    };

    for method_name in [first, second] {
        let method = object.get_property(ctx, method_name)?;
        if let Some(callable) = method.as_object().filter(|m| m.get().is_callable()) {
            let result = ctx.engine().invoke(callable, value, &[], ctx)?;
            if !result.is_object() {
                return Ok(result);
            }
        }
    }

    // Wrappers around primitives still convert when their prototype
    // methods are absent.
    if let Some(primitive) = object.get().primitive_value() {
        if !primitive.is_object() {
            return Ok(primitive);
        }
    }

    Err(ctx
        .engine()
        .type_error("cannot convert object to primitive value"))
}

/// ECMAScript ToObject: box primitives, reject null and undefined.
pub fn to_object(ctx: &mut Context, value: Value) -> JsResult<crate::object::ObjectRef> {
    let engine = ctx.engine();
    match value.kind() {
        ValueKind::Object(object) => Ok(object),
        ValueKind::Boolean(_) => Ok(engine.new_boolean_object(value)),
        ValueKind::Integer(_) | ValueKind::Double(_) => Ok(engine.new_number_object(value)),
        ValueKind::String(_) => Ok(engine.new_string_object(value)),
        ValueKind::Undefined | ValueKind::Null => {
            Err(engine.type_error("cannot convert undefined or null to object"))
        }
    }
}

/// The `typeof` operator.
pub fn type_of(ctx: &mut Context, value: Value) -> StringRef {
    let engine = ctx.engine();
    let text = match value.kind() {
        ValueKind::Undefined => "undefined",
        ValueKind::Null => "object",
        ValueKind::Boolean(_) => "boolean",
        ValueKind::Integer(_) | ValueKind::Double(_) => "number",
        ValueKind::String(_) => "string",
        ValueKind::Object(object) => {
            if object.get().is_callable() {
                "function"
            } else {
                "object"
            }
        }
    };
    engine.identifier(text)
}

// ---- operators ---------------------------------------------------------

/// `+`: string concatenation or numeric addition, with the integer fast
/// semantics in front.
pub fn add(ctx: &mut Context, left: Value, right: Value) -> JsResult<Value> {
    if let (Some(l), Some(r)) = (left.as_int32(), right.as_int32()) {
        return Ok(match l.checked_add(r) {
            Some(sum) => Value::from_int32(sum),
            None => Value::from_double(f64::from(l) + f64::from(r)),
        });
    }
    let lprim = to_primitive(ctx, left, PreferredType::Default)?;
    let rprim = to_primitive(ctx, right, PreferredType::Default)?;
    if lprim.is_string() || rprim.is_string() {
        let lstr = to_string_value(ctx, lprim)?;
        let rstr = to_string_value(ctx, rprim)?;
        let mut units = Vec::with_capacity(lstr.get().len() + rstr.get().len());
        units.extend_from_slice(lstr.get().units());
        units.extend_from_slice(rstr.get().units());
        let result = ctx.engine().new_string_from_units(units.into_boxed_slice());
        return Ok(Value::from_string(result));
    }
    let lnum = to_number(ctx, lprim)?;
    let rnum = to_number(ctx, rprim)?;
    Ok(Value::from_double(lnum + rnum))
}

pub fn sub(ctx: &mut Context, left: Value, right: Value) -> JsResult<Value> {
    if let (Some(l), Some(r)) = (left.as_int32(), right.as_int32()) {
        return Ok(match l.checked_sub(r) {
            Some(difference) => Value::from_int32(difference),
            None => Value::from_double(f64::from(l) - f64::from(r)),
        });
    }
    let lnum = to_number(ctx, left)?;
    let rnum = to_number(ctx, right)?;
    Ok(Value::from_double(lnum - rnum))
}

pub fn mul(ctx: &mut Context, left: Value, right: Value) -> JsResult<Value> {
    if let (Some(l), Some(r)) = (left.as_int32(), right.as_int32()) {
        return Ok(match l.checked_mul(r) {
            Some(product) => Value::from_int32(product),
            None => Value::from_double(f64::from(l) * f64::from(r)),
        });
    }
    let lnum = to_number(ctx, left)?;
    let rnum = to_number(ctx, right)?;
    Ok(Value::from_double(lnum * rnum))
}

pub fn div(ctx: &mut Context, left: Value, right: Value) -> JsResult<Value> {
    let lnum = to_number(ctx, left)?;
    let rnum = to_number(ctx, right)?;
    Ok(Value::from_double(lnum / rnum))
}

pub fn modulo(ctx: &mut Context, left: Value, right: Value) -> JsResult<Value> {
    let lnum = to_number(ctx, left)?;
    let rnum = to_number(ctx, right)?;
    Ok(Value::from_double(lnum % rnum))
}

pub fn bit_and(ctx: &mut Context, left: Value, right: Value) -> JsResult<Value> {
    Ok(Value::from_int32(
        to_int32(ctx, left)? & to_int32(ctx, right)?,
    ))
}

pub fn bit_or(ctx: &mut Context, left: Value, right: Value) -> JsResult<Value> {
    Ok(Value::from_int32(
        to_int32(ctx, left)? | to_int32(ctx, right)?,
    ))
}

pub fn bit_xor(ctx: &mut Context, left: Value, right: Value) -> JsResult<Value> {
    Ok(Value::from_int32(
        to_int32(ctx, left)? ^ to_int32(ctx, right)?,
    ))
}

/// `<<`; shift counts mask to five bits.
pub fn shl(ctx: &mut Context, left: Value, right: Value) -> JsResult<Value> {
    let l = to_int32(ctx, left)?;
    let count = to_uint32(ctx, right)? & 0x1f;
    Ok(Value::from_int32(l.wrapping_shl(count)))
}

/// `>>` (sign-propagating); shift counts mask to five bits.
pub fn shr(ctx: &mut Context, left: Value, right: Value) -> JsResult<Value> {
    let l = to_int32(ctx, left)?;
    let count = to_uint32(ctx, right)? & 0x1f;
    Ok(Value::from_int32(l.wrapping_shr(count)))
}

/// `>>>`; the result is unsigned and may exceed the int32 range.
pub fn ushr(ctx: &mut Context, left: Value, right: Value) -> JsResult<Value> {
    let l = to_uint32(ctx, left)?;
    let count = to_uint32(ctx, right)? & 0x1f;
    Ok(Value::number(f64::from(l.wrapping_shr(count))))
}

/// The abstract relational comparison; `None` means "undefined" (a NaN
/// was involved).
fn abstract_relational(
    ctx: &mut Context,
    left: Value,
    right: Value,
    left_first: bool,
) -> JsResult<Option<bool>> {
    let (lprim, rprim) = if left_first {
        let l = to_primitive(ctx, left, PreferredType::Number)?;
        let r = to_primitive(ctx, right, PreferredType::Number)?;
        (l, r)
    } else {
        let r = to_primitive(ctx, right, PreferredType::Number)?;
        let l = to_primitive(ctx, left, PreferredType::Number)?;
        (l, r)
    };
    if let (Some(l), Some(r)) = (lprim.as_string(), rprim.as_string()) {
        return Ok(Some(l.get().units() < r.get().units()));
    }
    let lnum = to_number(ctx, lprim)?;
    let rnum = to_number(ctx, rprim)?;
    if lnum.is_nan() || rnum.is_nan() {
        return Ok(None);
    }
    Ok(Some(lnum < rnum))
}

pub fn less_than(ctx: &mut Context, left: Value, right: Value) -> JsResult<bool> {
    Ok(abstract_relational(ctx, left, right, true)?.unwrap_or(false))
}

pub fn greater_than(ctx: &mut Context, left: Value, right: Value) -> JsResult<bool> {
    Ok(abstract_relational(ctx, right, left, false)?.unwrap_or(false))
}

pub fn less_equal(ctx: &mut Context, left: Value, right: Value) -> JsResult<bool> {
    Ok(!abstract_relational(ctx, right, left, false)?.unwrap_or(true))
}

pub fn greater_equal(ctx: &mut Context, left: Value, right: Value) -> JsResult<bool> {
    Ok(!abstract_relational(ctx, left, right, true)?.unwrap_or(true))
}

/// Strict equality (`===`). The Integer and Double tags are the same
/// Number type here.
pub fn strict_equals(left: Value, right: Value) -> bool {
    if let (Some(l), Some(r)) = (left.number_value(), right.number_value()) {
        return l == r;
    }
    match (left.kind(), right.kind()) {
        (ValueKind::Undefined, ValueKind::Undefined) | (ValueKind::Null, ValueKind::Null) => true,
        (ValueKind::Boolean(l), ValueKind::Boolean(r)) => l == r,
        (ValueKind::String(l), ValueKind::String(r)) => l.equals(r),
        (ValueKind::Object(l), ValueKind::Object(r)) => l == r,
        _ => false,
    }
}

/// Abstract equality (`==`).
pub fn abstract_equals(ctx: &mut Context, left: Value, right: Value) -> JsResult<bool> {
    if let (Some(l), Some(r)) = (left.number_value(), right.number_value()) {
        return Ok(l == r);
    }
    match (left.kind(), right.kind()) {
        (ValueKind::Undefined | ValueKind::Null, ValueKind::Undefined | ValueKind::Null) => {
            Ok(true)
        }
        (ValueKind::String(l), ValueKind::String(r)) => Ok(l.equals(r)),
        (ValueKind::Boolean(_), _) => {
            let l = Value::from_double(to_number(ctx, left)?);
            abstract_equals(ctx, l, right)
        }
        (_, ValueKind::Boolean(_)) => {
            let r = Value::from_double(to_number(ctx, right)?);
            abstract_equals(ctx, left, r)
        }
        (ValueKind::Integer(_) | ValueKind::Double(_), ValueKind::String(_)) => {
            let r = Value::from_double(to_number(ctx, right)?);
            abstract_equals(ctx, left, r)
        }
        (ValueKind::String(_), ValueKind::Integer(_) | ValueKind::Double(_)) => {
            let l = Value::from_double(to_number(ctx, left)?);
            abstract_equals(ctx, l, right)
        }
        (
            ValueKind::Integer(_) | ValueKind::Double(_) | ValueKind::String(_),
            ValueKind::Object(_),
        ) => {
            let r = to_primitive(ctx, right, PreferredType::Default)?;
            abstract_equals(ctx, left, r)
        }
        (
            ValueKind::Object(_),
            ValueKind::Integer(_) | ValueKind::Double(_) | ValueKind::String(_),
        ) => {
            let l = to_primitive(ctx, left, PreferredType::Default)?;
            abstract_equals(ctx, l, right)
        }
        (ValueKind::Object(l), ValueKind::Object(r)) => Ok(l == r),
        _ => Ok(false),
    }
}

/// `instanceof`.
pub fn instance_of(ctx: &mut Context, left: Value, right: Value) -> JsResult<bool> {
    let Some(constructor) = right.as_object() else {
        return Err(ctx
            .engine()
            .type_error("right-hand side of instanceof is not an object"));
    };
    constructor.has_instance(ctx, left)
}

/// `in`.
pub fn has_property_operator(ctx: &mut Context, left: Value, right: Value) -> JsResult<bool> {
    let Some(object) = right.as_object() else {
        return Err(ctx
            .engine()
            .type_error("right-hand side of in is not an object"));
    };
    let name = to_string_value(ctx, left)?;
    let name_text = name.get().to_rust_string();
    let interned = ctx.engine().identifier(&name_text);
    Ok(object.has_property(ctx, interned))
}

// ---- unary operators ---------------------------------------------------

pub fn logical_not(value: Value) -> Value {
    Value::from_boolean(!to_boolean(value))
}

pub fn unary_minus(ctx: &mut Context, value: Value) -> JsResult<Value> {
    if let Some(i) = value.as_int32() {
        if i != 0 {
            if let Some(negated) = i.checked_neg() {
                return Ok(Value::from_int32(negated));
            }
        }
    }
    Ok(Value::from_double(-to_number(ctx, value)?))
}

pub fn unary_plus(ctx: &mut Context, value: Value) -> JsResult<Value> {
    if value.is_number() {
        return Ok(value);
    }
    Ok(Value::from_double(to_number(ctx, value)?))
}

pub fn bitwise_not(ctx: &mut Context, value: Value) -> JsResult<Value> {
    Ok(Value::from_int32(!to_int32(ctx, value)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int32_conversion_is_modular() {
        assert_eq!(f64_to_int32(0.0), 0);
        assert_eq!(f64_to_int32(-0.0), 0);
        assert_eq!(f64_to_int32(3.9), 3);
        assert_eq!(f64_to_int32(-3.9), -3);
        assert_eq!(f64_to_int32(2147483648.0), -2147483648);
        assert_eq!(f64_to_int32(4294967296.0), 0);
        assert_eq!(f64_to_int32(4294967297.0), 1);
        assert_eq!(f64_to_int32(-1.0), -1);
        assert_eq!(f64_to_int32(f64::NAN), 0);
        assert_eq!(f64_to_int32(f64::INFINITY), 0);
    }

    #[test]
    fn uint32_conversion_is_modular() {
        assert_eq!(f64_to_uint32(-1.0), 4294967295);
        assert_eq!(f64_to_uint32(4294967296.0), 0);
        assert_eq!(f64_to_uint32(f64::NAN), 0);
    }

    #[test]
    fn string_to_number_grammar() {
        assert_eq!(string_to_number(""), 0.0);
        assert_eq!(string_to_number("  42 "), 42.0);
        assert_eq!(string_to_number("3.5"), 3.5);
        assert_eq!(string_to_number("0x10"), 16.0);
        assert_eq!(string_to_number("-Infinity"), f64::NEG_INFINITY);
        assert!(string_to_number("12abc").is_nan());
    }

    #[test]
    fn to_integer_follows_the_conversion_table() {
        let mut engine = crate::engine::ExecutionEngine::new();
        let ctx = unsafe { &mut *engine.root_context() };
        assert_eq!(to_integer(ctx, Value::from_double(f64::NAN)).unwrap(), 0.0);
        assert_eq!(to_integer(ctx, Value::undefined()).unwrap(), 0.0);
        assert_eq!(to_integer(ctx, Value::from_double(3.7)).unwrap(), 3.0);
        assert_eq!(to_integer(ctx, Value::from_double(-3.7)).unwrap(), -3.0);
        assert_eq!(to_integer(ctx, Value::from_int32(5)).unwrap(), 5.0);
        assert_eq!(
            to_integer(ctx, Value::from_double(f64::INFINITY)).unwrap(),
            f64::INFINITY
        );
        assert_eq!(
            to_integer(ctx, Value::from_double(f64::NEG_INFINITY)).unwrap(),
            f64::NEG_INFINITY
        );
    }

    #[test]
    fn parsed_doubles_are_bit_accurate() {
        use float_cmp::approx_eq;
        assert!(approx_eq!(f64, string_to_number("0.1"), 0.1, ulps = 1));
        assert!(approx_eq!(f64, string_to_number("1e300"), 1e300, ulps = 1));
        assert!(approx_eq!(
            f64,
            string_to_number("2.2250738585072014e-308"),
            2.2250738585072014e-308,
            ulps = 1
        ));
    }

    #[test]
    fn number_to_string_formats() {
        assert_eq!(number_to_string(3.0), "3");
        assert_eq!(number_to_string(-7.0), "-7");
        assert_eq!(number_to_string(0.5), "0.5");
        assert_eq!(number_to_string(-0.0), "0");
    }

    #[test]
    fn strict_equality_spans_number_tags() {
        assert!(strict_equals(
            Value::from_int32(3),
            Value::from_double(3.0)
        ));
        assert!(!strict_equals(
            Value::from_double(f64::NAN),
            Value::from_double(f64::NAN)
        ));
        assert!(strict_equals(Value::undefined(), Value::undefined()));
        assert!(!strict_equals(Value::undefined(), Value::null()));
    }
}
