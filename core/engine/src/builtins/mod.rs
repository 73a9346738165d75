//! Intrinsic objects installed on the global object.
//!
//! Each submodule wires one builtin: it creates the constructor function,
//! links it with the engine-owned prototype singleton, and fills the
//! prototype with the methods the core carries. Anything beyond that —
//! the long tail of the standard library — belongs to the embedding host.

use crate::context::Context;
use crate::engine::ExecutionEngine;
use crate::object::{NativeFn, ObjectRef};
use crate::property::{Attribute, PropertyDescriptor};
use crate::value::Value;

mod array;
mod error;
mod function;
mod math;
mod object;

/// Unwrap a `JsResult` inside a native function, converting a thrown value
/// into context exception state.
macro_rules! js_try {
    ($ctx:expr, $expr:expr) => {
        match $expr {
            Ok(value) => value,
            Err(thrown) => {
                $ctx.throw(thrown);
                return;
            }
        }
    };
}
pub(crate) use js_try;

/// Attributes of intrinsic properties: writable and configurable, but
/// invisible to `for-in`.
pub(crate) fn builtin_attributes() -> Attribute {
    Attribute::HAS_WRITABLE
        | Attribute::WRITABLE
        | Attribute::HAS_ENUMERABLE
        | Attribute::HAS_CONFIGURABLE
        | Attribute::CONFIGURABLE
}

/// Install a native function as a property of `target`.
pub(crate) fn add_function(
    engine: &mut ExecutionEngine,
    target: ObjectRef,
    name: &str,
    code: NativeFn,
) {
    let function = engine.new_native_function(name, code);
    let name = engine.identifier(name);
    target.get_mut().insert_property(
        name,
        PropertyDescriptor::with_attributes(Value::from_object(function), builtin_attributes()),
    );
}

/// Install an intrinsic data property.
pub(crate) fn add_value(
    engine: &mut ExecutionEngine,
    target: ObjectRef,
    name: &str,
    value: Value,
) {
    let name = engine.identifier(name);
    target
        .get_mut()
        .insert_property(name, PropertyDescriptor::with_attributes(value, builtin_attributes()));
}

/// Install a constructor on the global object, linked with its prototype
/// singleton both ways.
pub(crate) fn add_constructor(
    engine: &mut ExecutionEngine,
    name: &str,
    code: NativeFn,
    prototype: ObjectRef,
) -> ObjectRef {
    let constructor = engine.new_native_function(name, code);
    let prototype_name = engine.names.prototype;
    let constructor_name = engine.names.constructor;
    constructor.get_mut().insert_property(
        prototype_name,
        PropertyDescriptor::with_attributes(
            Value::from_object(prototype),
            Attribute::HAS_WRITABLE | Attribute::HAS_ENUMERABLE | Attribute::HAS_CONFIGURABLE,
        ),
    );
    prototype.get_mut().insert_property(
        constructor_name,
        PropertyDescriptor::with_attributes(
            Value::from_object(constructor),
            Attribute::HAS_WRITABLE
                | Attribute::WRITABLE
                | Attribute::HAS_ENUMERABLE
                | Attribute::HAS_CONFIGURABLE
                | Attribute::CONFIGURABLE,
        ),
    );
    let global = engine.global_object;
    add_value(engine, global, name, Value::from_object(constructor));
    constructor
}

/// Wire the global object.
pub(crate) fn init(engine: &mut ExecutionEngine) {
    let global = engine.global_object;
    let frozen = Attribute::HAS_WRITABLE | Attribute::HAS_ENUMERABLE | Attribute::HAS_CONFIGURABLE;
    let undefined_name = engine.identifier("undefined");
    global.get_mut().insert_property(
        undefined_name,
        PropertyDescriptor::with_attributes(Value::undefined(), frozen),
    );
    let nan_name = engine.identifier("NaN");
    global.get_mut().insert_property(
        nan_name,
        PropertyDescriptor::with_attributes(Value::from_double(f64::NAN), frozen),
    );
    let infinity_name = engine.identifier("Infinity");
    global.get_mut().insert_property(
        infinity_name,
        PropertyDescriptor::with_attributes(Value::from_double(f64::INFINITY), frozen),
    );

    object::init(engine);
    function::init(engine);
    array::init(engine);
    error::init(engine);
    math::init(engine);

    // The remaining wrappers need callable constructors plus the
    // unwrapping conversions ToPrimitive relies on; their prototype
    // singletons already exist for the object factories.
    let string_prototype = engine.string_prototype;
    add_constructor(engine, "String", string_constructor, string_prototype);
    add_function(engine, string_prototype, "valueOf", wrapper_value_of);
    add_function(engine, string_prototype, "toString", wrapper_to_string);
    let number_prototype = engine.number_prototype;
    add_constructor(engine, "Number", number_constructor, number_prototype);
    add_function(engine, number_prototype, "valueOf", wrapper_value_of);
    add_function(engine, number_prototype, "toString", wrapper_to_string);
    let boolean_prototype = engine.boolean_prototype;
    add_constructor(engine, "Boolean", boolean_constructor, boolean_prototype);
    add_function(engine, boolean_prototype, "valueOf", wrapper_value_of);
    add_function(engine, boolean_prototype, "toString", wrapper_to_string);
    let date_prototype = engine.date_prototype;
    add_constructor(engine, "Date", date_constructor, date_prototype);
    add_function(engine, date_prototype, "valueOf", wrapper_value_of);
    let regexp_prototype = engine.regexp_prototype;
    add_constructor(engine, "RegExp", regexp_constructor, regexp_prototype);
}

/// `valueOf` for the primitive wrappers: yield the wrapped value.
fn wrapper_value_of(ctx: &mut Context) {
    let this = ctx.this_object;
    ctx.result = this
        .as_object()
        .and_then(|o| o.get().primitive_value())
        .unwrap_or(this);
}

/// `toString` for the primitive wrappers.
fn wrapper_to_string(ctx: &mut Context) {
    let this = ctx.this_object;
    let value = this
        .as_object()
        .and_then(|o| o.get().primitive_value())
        .unwrap_or(this);
    if let Some(object) = value.as_object() {
        // Not a wrapper after all; avoid re-entering ToPrimitive.
        let text = format!("[object {}]", object.get().klass.get());
        let string = ctx.engine().new_string(&text);
        ctx.result = Value::from_string(string);
        return;
    }
    let string = js_try!(ctx, ops::to_string_value(ctx, value));
    ctx.result = Value::from_string(string);
}

use crate::runtime::operations as ops;

fn string_constructor(ctx: &mut Context) {
    let argument = ctx.argument(0);
    let string = if argument.is_undefined() && ctx.argument_count == 0 {
        ctx.engine().new_string("")
    } else {
        js_try!(ctx, ops::to_string_value(ctx, argument))
    };
    let value = Value::from_string(string);
    ctx.result = Value::from_object(ctx.engine().new_string_object(value));
}

fn number_constructor(ctx: &mut Context) {
    let argument = ctx.argument(0);
    let number = if ctx.argument_count == 0 {
        0.0
    } else {
        js_try!(ctx, ops::to_number(ctx, argument))
    };
    let value = Value::number(number);
    ctx.result = Value::from_object(ctx.engine().new_number_object(value));
}

fn boolean_constructor(ctx: &mut Context) {
    let value = Value::from_boolean(ops::to_boolean(ctx.argument(0)));
    ctx.result = Value::from_object(ctx.engine().new_boolean_object(value));
}

fn date_constructor(ctx: &mut Context) {
    // The core carries the object shape only; there is no clock here.
    let argument = ctx.argument(0);
    let time = if ctx.argument_count == 0 {
        0.0
    } else {
        js_try!(ctx, ops::to_number(ctx, argument))
    };
    let value = Value::number(time);
    ctx.result = Value::from_object(ctx.engine().new_date_object(value));
}

fn regexp_constructor(ctx: &mut Context) {
    use crate::object::RegExpFlags;

    let pattern_value = ctx.argument(0);
    let pattern = if pattern_value.is_undefined() {
        String::new()
    } else {
        js_try!(ctx, ops::to_string_value(ctx, pattern_value))
            .get()
            .to_rust_string()
    };
    let flags_value = ctx.argument(1);
    let mut flags = RegExpFlags::empty();
    if !flags_value.is_undefined() {
        let text = js_try!(ctx, ops::to_string_value(ctx, flags_value))
            .get()
            .to_rust_string();
        flags.set(RegExpFlags::GLOBAL, text.contains('g'));
        flags.set(RegExpFlags::IGNORE_CASE, text.contains('i'));
        flags.set(RegExpFlags::MULTILINE, text.contains('m'));
    }
    ctx.result = Value::from_object(ctx.engine().new_regexp_object(&pattern, flags));
}
