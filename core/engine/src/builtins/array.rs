//! The `Array` constructor and `Array.prototype`.

use super::{add_constructor, add_function, js_try};
use crate::context::Context;
use crate::engine::ExecutionEngine;
use crate::object::{Array, ObjectRef};
use crate::runtime::operations as ops;
use crate::value::Value;
use crate::JsResult;

pub(crate) fn init(engine: &mut ExecutionEngine) {
    let prototype = engine.array_prototype;
    add_constructor(engine, "Array", constructor, prototype);
    add_function(engine, prototype, "push", push);
    add_function(engine, prototype, "pop", pop);
    add_function(engine, prototype, "shift", shift);
    add_function(engine, prototype, "concat", concat);
    add_function(engine, prototype, "join", join);
    add_function(engine, prototype, "sort", sort);
    add_function(engine, prototype, "splice", splice);
}

fn this_array(ctx: &mut Context) -> JsResult<ObjectRef> {
    let this = ctx.this_object;
    match this.as_object().filter(|o| o.get().as_array().is_some()) {
        Some(object) => Ok(object),
        None => Err(ctx.engine().type_error("receiver is not an array")),
    }
}

fn constructor(ctx: &mut Context) {
    let mut array = Array::new();
    let first = ctx.argument(0);
    if ctx.argument_count == 1 && first.is_number() {
        let length = js_try!(ctx, ops::to_uint32(ctx, first));
        array.resize(length);
    } else {
        for value in ctx.argument_slice() {
            array.push(*value);
        }
    }
    ctx.result = Value::from_object(ctx.engine().new_array_object(array));
}

fn push(ctx: &mut Context) {
    let object = js_try!(ctx, this_array(ctx));
    let arguments: Vec<Value> = ctx.argument_slice().to_vec();
    let array = object.get_mut().as_array_mut().expect("array receiver");
    for value in arguments {
        array.push(value);
    }
    ctx.result = Value::number(f64::from(array.len()));
}

fn pop(ctx: &mut Context) {
    let object = js_try!(ctx, this_array(ctx));
    ctx.result = object.get_mut().as_array_mut().expect("array receiver").pop();
}

fn shift(ctx: &mut Context) {
    let object = js_try!(ctx, this_array(ctx));
    ctx.result = object
        .get_mut()
        .as_array_mut()
        .expect("array receiver")
        .take_first();
}

fn concat(ctx: &mut Context) {
    let object = js_try!(ctx, this_array(ctx));
    let mut combined = object.get().as_array().expect("array receiver").clone();
    for value in ctx.argument_slice() {
        match value.as_object().and_then(|o| o.get().as_array()) {
            Some(other) => combined.concat(other),
            None => combined.push(*value),
        }
    }
    ctx.result = Value::from_object(ctx.engine().new_array_object(combined));
}

fn join(ctx: &mut Context) {
    let object = js_try!(ctx, this_array(ctx));
    let separator = ctx.argument(0);
    let separator = if separator.is_undefined() {
        ",".to_owned()
    } else {
        js_try!(ctx, ops::to_string_value(ctx, separator))
            .get()
            .to_rust_string()
    };
    let length = object.get().as_array().expect("array receiver").len();
    let mut pieces = Vec::with_capacity(length as usize);
    for i in 0..length {
        let element = object.get().as_array().expect("array receiver").at(i);
        if element.is_null_or_undefined() {
            pieces.push(String::new());
        } else {
            pieces.push(
                js_try!(ctx, ops::to_string_value(ctx, element))
                    .get()
                    .to_rust_string(),
            );
        }
    }
    let joined = pieces.join(&separator);
    let string = ctx.engine().new_string(&joined);
    ctx.result = Value::from_string(string);
}

/// The sort ordering: the comparator (less-than through its sign), or
/// lexicographic ToString order when absent. Undefined elements sort last.
fn sort_less_than(
    ctx: &mut Context,
    comparator: Option<ObjectRef>,
    a: Value,
    b: Value,
) -> JsResult<bool> {
    if a.is_undefined() {
        return Ok(false);
    }
    if b.is_undefined() {
        return Ok(true);
    }
    match comparator {
        Some(comparator) => {
            let outcome = ctx
                .engine()
                .invoke(comparator, Value::undefined(), &[a, b], ctx)?;
            Ok(ops::to_number(ctx, outcome)? < 0.0)
        }
        None => {
            let a = ops::to_string_value(ctx, a)?;
            let b = ops::to_string_value(ctx, b)?;
            Ok(a.get().units() < b.get().units())
        }
    }
}

fn sort(ctx: &mut Context) {
    let object = js_try!(ctx, this_array(ctx));
    let comparator = ctx
        .argument(0)
        .as_object()
        .filter(|o| o.get().is_callable());

    let length = object.get().as_array().expect("array receiver").len() as usize;
    let mut values: Vec<Value> = (0..length as u32)
        .map(|i| object.get().as_array().expect("array receiver").at(i))
        .collect();

    // Insertion sort: the comparator can observe the array mid-sort, so
    // a simple stable in-place ordering is the predictable choice.
    for i in 1..values.len() {
        let key = values[i];
        let mut j = i;
        while j > 0 {
            let less = js_try!(ctx, sort_less_than(ctx, comparator, key, values[j - 1]));
            if !less {
                break;
            }
            values[j] = values[j - 1];
            j -= 1;
        }
        values[j] = key;
    }

    let array = object.get_mut().as_array_mut().expect("array receiver");
    for (i, value) in values.into_iter().enumerate() {
        array.assign(i as u32, value);
    }
    ctx.result = Value::from_object(object);
}

fn splice(ctx: &mut Context) {
    let object = js_try!(ctx, this_array(ctx));
    let start_value = ctx.argument(0);
    let start = js_try!(ctx, ops::to_integer(ctx, start_value));
    let delete_count = if ctx.argument_count >= 2 {
        let count_value = ctx.argument(1);
        js_try!(ctx, ops::to_integer(ctx, count_value))
    } else {
        f64::INFINITY
    };
    let items: Vec<Value> = ctx.argument_slice().iter().skip(2).copied().collect();

    let mut removed = Array::new();
    object
        .get_mut()
        .as_array_mut()
        .expect("array receiver")
        .splice(start, delete_count, &items, &mut removed);
    ctx.result = Value::from_object(ctx.engine().new_array_object(removed));
}
