//! The `Object` constructor and `Object.prototype`.

use super::{add_constructor, add_function, js_try};
use crate::context::Context;
use crate::engine::ExecutionEngine;
use crate::runtime::operations as ops;
use crate::value::Value;

pub(crate) fn init(engine: &mut ExecutionEngine) {
    let prototype = engine.object_prototype;
    add_constructor(engine, "Object", constructor, prototype);
    add_function(engine, prototype, "hasOwnProperty", has_own_property);
    add_function(engine, prototype, "toString", to_string);
    add_function(engine, prototype, "valueOf", value_of);
}

fn constructor(ctx: &mut Context) {
    let argument = ctx.argument(0);
    ctx.result = if argument.is_null_or_undefined() {
        Value::from_object(ctx.engine().new_object())
    } else {
        Value::from_object(js_try!(ctx, ops::to_object(ctx, argument)))
    };
}

fn has_own_property(ctx: &mut Context) {
    let this = ctx.this_object;
    let key = ctx.argument(0);
    let object = js_try!(ctx, ops::to_object(ctx, this));
    let name = js_try!(ctx, ops::to_string_value(ctx, key));
    let text = name.get().to_rust_string();
    let interned = ctx.engine().identifier(&text);
    let owned = object.get_own_property(ctx, interned).is_some();
    ctx.result = Value::from_boolean(owned);
}

fn to_string(ctx: &mut Context) {
    let this = ctx.this_object;
    let text = match this.as_object() {
        Some(object) => format!("[object {}]", object.get().klass.get()),
        None if this.is_undefined() => "[object Undefined]".to_owned(),
        None if this.is_null() => "[object Null]".to_owned(),
        None => "[object Object]".to_owned(),
    };
    let string = ctx.engine().new_string(&text);
    ctx.result = Value::from_string(string);
}

fn value_of(ctx: &mut Context) {
    ctx.result = ctx.this_object;
}
