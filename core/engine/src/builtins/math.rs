//! The `Math` object.
//!
//! Numeric helpers bound into the global object. Edge cases follow the
//! ECMAScript definitions rather than raw libm where the two differ
//! (`pow(±1, ±Infinity)` is NaN, `max()` with no arguments is -Infinity,
//! NaN contaminates min/max).

use super::{add_function, add_value, js_try};
use crate::context::Context;
use crate::engine::ExecutionEngine;
use crate::runtime::operations as ops;
use crate::value::Value;

pub(crate) fn init(engine: &mut ExecutionEngine) {
    let math = engine.new_object();

    add_value(engine, math, "E", Value::from_double(std::f64::consts::E));
    add_value(engine, math, "LN2", Value::from_double(std::f64::consts::LN_2));
    add_value(engine, math, "LN10", Value::from_double(std::f64::consts::LN_10));
    add_value(engine, math, "LOG2E", Value::from_double(std::f64::consts::LOG2_E));
    add_value(engine, math, "LOG10E", Value::from_double(std::f64::consts::LOG10_E));
    add_value(engine, math, "PI", Value::from_double(std::f64::consts::PI));
    add_value(engine, math, "SQRT1_2", Value::from_double(std::f64::consts::FRAC_1_SQRT_2));
    add_value(engine, math, "SQRT2", Value::from_double(std::f64::consts::SQRT_2));

    add_function(engine, math, "abs", abs);
    add_function(engine, math, "acos", acos);
    add_function(engine, math, "asin", asin);
    add_function(engine, math, "atan", atan);
    add_function(engine, math, "atan2", atan2);
    add_function(engine, math, "ceil", ceil);
    add_function(engine, math, "cos", cos);
    add_function(engine, math, "exp", exp);
    add_function(engine, math, "floor", floor);
    add_function(engine, math, "log", log);
    add_function(engine, math, "max", max);
    add_function(engine, math, "min", min);
    add_function(engine, math, "pow", pow);
    add_function(engine, math, "random", random);
    add_function(engine, math, "round", round);
    add_function(engine, math, "sin", sin);
    add_function(engine, math, "sqrt", sqrt);
    add_function(engine, math, "tan", tan);

    let global = engine.global_object;
    add_value(engine, global, "Math", Value::from_object(math));
}

fn number_argument(ctx: &mut Context, index: u32) -> Result<f64, Value> {
    let value = ctx.argument(index);
    ops::to_number(ctx, value)
}

macro_rules! unary_math {
    ($($name:ident => $compute:expr;)*) => {
        $(
            fn $name(ctx: &mut Context) {
                let x = js_try!(ctx, number_argument(ctx, 0));
                #[allow(clippy::redundant_closure_call)]
                let result: f64 = ($compute)(x);
                ctx.result = Value::number(result);
            }
        )*
    };
}

unary_math! {
    abs => f64::abs;
    acos => f64::acos;
    asin => f64::asin;
    atan => f64::atan;
    ceil => f64::ceil;
    cos => f64::cos;
    exp => f64::exp;
    floor => f64::floor;
    log => f64::ln;
    sin => f64::sin;
    sqrt => f64::sqrt;
    tan => f64::tan;
}

fn atan2(ctx: &mut Context) {
    let y = js_try!(ctx, number_argument(ctx, 0));
    let x = js_try!(ctx, number_argument(ctx, 1));
    ctx.result = Value::number(y.atan2(x));
}

fn max(ctx: &mut Context) {
    let mut best = f64::NEG_INFINITY;
    for index in 0..ctx.argument_count {
        let x = js_try!(ctx, number_argument(ctx, index));
        if x.is_nan() {
            ctx.result = Value::from_double(f64::NAN);
            return;
        }
        if x > best || (x == 0.0 && best == 0.0 && best.is_sign_negative()) {
            best = x;
        }
    }
    ctx.result = Value::number(best);
}

fn min(ctx: &mut Context) {
    let mut best = f64::INFINITY;
    for index in 0..ctx.argument_count {
        let x = js_try!(ctx, number_argument(ctx, index));
        if x.is_nan() {
            ctx.result = Value::from_double(f64::NAN);
            return;
        }
        if x < best || (x == 0.0 && best == 0.0 && x.is_sign_negative()) {
            best = x;
        }
    }
    ctx.result = Value::number(best);
}

fn pow(ctx: &mut Context) {
    let x = js_try!(ctx, number_argument(ctx, 0));
    let y = js_try!(ctx, number_argument(ctx, 1));
    let result = if y.is_infinite() && x.abs() == 1.0 {
        f64::NAN
    } else {
        x.powf(y)
    };
    ctx.result = Value::number(result);
}

fn random(ctx: &mut Context) {
    ctx.result = Value::from_double(rand::random::<f64>());
}

fn round(ctx: &mut Context) {
    let x = js_try!(ctx, number_argument(ctx, 0));
    let result = if x.is_nan() || x.is_infinite() || x == 0.0 {
        x
    } else {
        let rounded = (x + 0.5).floor();
        if rounded == 0.0 && x < 0.0 {
            -0.0
        } else {
            rounded
        }
    };
    ctx.result = Value::number(result);
}
