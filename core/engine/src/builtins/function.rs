//! The `Function` constructor and `Function.prototype`.

use super::{add_constructor, add_function, js_try};
use crate::context::Context;
use crate::engine::ExecutionEngine;
use crate::runtime::operations as ops;
use crate::value::Value;

pub(crate) fn init(engine: &mut ExecutionEngine) {
    let prototype = engine.function_prototype;
    add_constructor(engine, "Function", constructor, prototype);
    add_function(engine, prototype, "call", call);
    add_function(engine, prototype, "apply", apply);
}

fn constructor(ctx: &mut Context) {
    // There is no runtime front-end; `new Function(source)` cannot work.
    let error = ctx
        .engine()
        .type_error("function bodies cannot be compiled at run time");
    ctx.throw(error);
}

fn call(ctx: &mut Context) {
    let callee = ctx.this_object;
    let Some(callee) = callee.as_object().filter(|o| o.get().is_callable()) else {
        let error = ctx.engine().type_error("Function.prototype.call on a non-function");
        ctx.throw(error);
        return;
    };
    let this = ctx.argument(0);
    let args: Vec<Value> = ctx.argument_slice().iter().skip(1).copied().collect();
    ctx.result = js_try!(ctx, {
        let engine = ctx.engine();
        engine.invoke(callee, this, &args, ctx)
    });
}

fn apply(ctx: &mut Context) {
    let callee = ctx.this_object;
    let Some(callee) = callee.as_object().filter(|o| o.get().is_callable()) else {
        let error = ctx.engine().type_error("Function.prototype.apply on a non-function");
        ctx.throw(error);
        return;
    };
    let this = ctx.argument(0);
    let argument_list = ctx.argument(1);
    let args: Vec<Value> = if argument_list.is_null_or_undefined() {
        Vec::new()
    } else {
        // Any array-like object works here (a real array, an `arguments`
        // object, ...): read `length`, then the indexed properties.
        let Some(list) = argument_list.as_object() else {
            let error = ctx
                .engine()
                .type_error("second argument to apply must be an array-like object");
            ctx.throw(error);
            return;
        };
        let length_name = ctx.engine().names.length;
        let length_value = js_try!(ctx, list.get_property(ctx, length_name));
        let length = js_try!(ctx, ops::to_uint32(ctx, length_value));
        let mut collected = Vec::with_capacity(length as usize);
        for index in 0..length {
            let mut buffer = itoa::Buffer::new();
            let key = ctx.engine().identifier(buffer.format(index));
            collected.push(js_try!(ctx, list.get_property(ctx, key)));
        }
        collected
    };
    ctx.result = js_try!(ctx, {
        let engine = ctx.engine();
        engine.invoke(callee, this, &args, ctx)
    });
}
