//! The `Error` constructor and `Error.prototype`.

use super::{add_constructor, add_function, js_try};
use crate::context::Context;
use crate::engine::ExecutionEngine;
use crate::runtime::operations as ops;
use crate::value::Value;

pub(crate) fn init(engine: &mut ExecutionEngine) {
    let prototype = engine.error_prototype;
    add_constructor(engine, "Error", constructor, prototype);
    add_function(engine, prototype, "toString", to_string);
}

fn constructor(ctx: &mut Context) {
    let message = ctx.argument(0);
    let message = if message.is_undefined() {
        Value::undefined()
    } else {
        let string = js_try!(ctx, ops::to_string_value(ctx, message));
        Value::from_string(string)
    };
    ctx.result = Value::from_object(ctx.engine().new_error_object("Error", message));
}

fn to_string(ctx: &mut Context) {
    let this = ctx.this_object;
    let Some(object) = this.as_object() else {
        let error = ctx.engine().type_error("Error.prototype.toString on a non-object");
        ctx.throw(error);
        return;
    };
    let name_key = ctx.engine().names.name;
    let name_value = js_try!(ctx, object.get_property(ctx, name_key));
    let name = if name_value.is_undefined() {
        "Error".to_owned()
    } else {
        js_try!(ctx, ops::to_string_value(ctx, name_value))
            .get()
            .to_rust_string()
    };
    let message_key = ctx.engine().names.message;
    let message_value = js_try!(ctx, object.get_property(ctx, message_key));
    let message = if message_value.is_undefined() {
        String::new()
    } else {
        js_try!(ctx, ops::to_string_value(ctx, message_value))
            .get()
            .to_rust_string()
    };
    let text = if message.is_empty() {
        name
    } else {
        format!("{name}: {message}")
    };
    let string = ctx.engine().new_string(&text);
    ctx.result = Value::from_string(string);
}
