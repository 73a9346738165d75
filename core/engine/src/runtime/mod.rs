//! Runtime helpers called from generated code.
//!
//! These `extern "C"` functions are the slow paths behind every JIT
//! sequence: operators with full coercion, scope-chain access, property
//! and element access, calls and constructs, and the exception builtins.
//! The instruction selector embeds their addresses as absolute immediates.
//!
//! Conventions (the helper ABI):
//! - the first argument is always the current `*mut Context`, except for
//!   the pure value copy;
//! - operands arrive as `*const Value` pointers into context slots or the
//!   caller's frame, never as loose registers — the typed `_boolean` /
//!   `_number` / `_string` / `_closure` / `_value` variants exist so the
//!   selector can pass a known constant without materializing a slot;
//! - a helper that throws records the exception on the context and
//!   returns normally; the generated code checks the flag right after the
//!   call and branches to the handler block.
//!
//! # Safety
//!
//! Every pointer argument is produced by the instruction selector or by
//! [`ExecutionEngine::invoke`](crate::ExecutionEngine::invoke): contexts
//! are live for the duration of the call, value pointers target live
//! slots, string pointers are engine-interned. No helper is callable from
//! safe Rust without upholding exactly that.

pub mod operations;

use crate::context::Context;
use crate::ir;
use crate::object::ObjectRef;
use crate::string::{JsString, StringRef};
use crate::value::Value;
use crate::JsResult;
use operations as ops;
use std::ptr::NonNull;

/// Dispose of a thrown value by recording it on the context.
macro_rules! try_or_throw {
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

#[inline]
unsafe fn context<'a>(ctx: *mut Context) -> &'a mut Context {
    unsafe { &mut *ctx }
}

#[inline]
unsafe fn string_ref(name: *mut JsString) -> StringRef {
    StringRef::from_non_null(unsafe { NonNull::new_unchecked(name) })
}

#[inline]
unsafe fn store_result(result: *mut Value, value: Value) {
    if !result.is_null() {
        unsafe { *result = value };
    }
}

// ---- scope-chain resolution --------------------------------------------

/// Find `name` along the scope chain for a read. Also reports the base
/// object when the name resolved through a `with` scope, which becomes the
/// `this` binding of a call.
fn resolve_read(
    ctx: &mut Context,
    name: StringRef,
) -> JsResult<(Value, /* this for calls */ Value)> {
    let mut cursor: *mut Context = ctx;
    while !cursor.is_null() {
        let scope = unsafe { &mut *cursor };
        let withs: Vec<ObjectRef> = scope.with_stack.iter().rev().copied().collect();
        for object in withs {
            if object.has_property(scope, name) {
                let value = object.get_property(scope, name)?;
                return Ok((value, Value::from_object(object)));
            }
        }
        if let Some(slot) = scope.lookup_slot(name) {
            return Ok((*slot, Value::undefined()));
        }
        if let Some(activation) = scope.activation {
            if activation.get().members().is_some_and(|m| m.contains(name)) {
                let value = activation.get_property(scope, name)?;
                return Ok((value, Value::undefined()));
            }
        }
        if scope.function.is_some() && name.equals(scope.engine().names.arguments_) {
            let object = arguments_object(scope);
            return Ok((Value::from_object(object), Value::undefined()));
        }
        cursor = scope.outer;
    }

    let global = ctx.engine().global_object;
    if global.has_property(ctx, name) {
        let value = global.get_property(ctx, name)?;
        return Ok((value, Value::undefined()));
    }
    let message = format!("{} is not defined", name.get());
    Err(ctx.engine().reference_error(&message))
}

/// Find `name` along the scope chain for a write; an unresolved name is
/// created on the global object.
fn resolve_write(ctx: &mut Context, name: StringRef, value: Value) -> JsResult<()> {
    let mut cursor: *mut Context = ctx;
    while !cursor.is_null() {
        let scope = unsafe { &mut *cursor };
        let withs: Vec<ObjectRef> = scope.with_stack.iter().rev().copied().collect();
        for object in withs {
            if object.has_property(scope, name) {
                return object.set_property(scope, name, value);
            }
        }
        if let Some(slot) = scope.lookup_slot(name) {
            *slot = value;
            return Ok(());
        }
        if let Some(activation) = scope.activation {
            if activation.get().members().is_some_and(|m| m.contains(name)) {
                return activation.set_property(scope, name, value);
            }
        }
        cursor = scope.outer;
    }
    let global = ctx.engine().global_object;
    global.set_property(ctx, name, value)
}

/// The context's `arguments` object, materialized on first access.
fn arguments_object(scope: &mut Context) -> ObjectRef {
    if let Some(object) = scope.arguments_object {
        return object;
    }
    let scope_ptr: *mut Context = scope;
    let object = scope.engine().new_arguments_object(scope_ptr);
    scope.arguments_object = Some(object);
    object
}

// ---- element access ----------------------------------------------------

fn element_index(index: Value) -> Option<u32> {
    match index.as_int32() {
        Some(i) if i >= 0 => Some(i as u32),
        _ => index.as_double().and_then(|d| {
            (d.fract() == 0.0 && (0.0..f64::from(u32::MAX)).contains(&d)).then(|| d as u32)
        }),
    }
}

fn element_get(ctx: &mut Context, base: Value, index: Value) -> JsResult<Value> {
    if let (Some(object), Some(i)) = (base.as_object(), element_index(index)) {
        if let Some(array) = object.get().as_array() {
            return Ok(array.at(i));
        }
    }
    let object = ops::to_object(ctx, base)?;
    let name = property_name(ctx, index)?;
    object.get_property(ctx, name)
}

fn element_set(ctx: &mut Context, base: Value, index: Value, value: Value) -> JsResult<()> {
    if let (Some(object), Some(i)) = (base.as_object(), element_index(index)) {
        if let Some(array) = object.get_mut().as_array_mut() {
            array.assign(i, value);
            return Ok(());
        }
    }
    let object = ops::to_object(ctx, base)?;
    let name = property_name(ctx, index)?;
    object.set_property(ctx, name, value)
}

/// ToString an arbitrary key and intern it, so property tables only ever
/// see pointer-comparable names.
fn property_name(ctx: &mut Context, key: Value) -> JsResult<StringRef> {
    let text = ops::to_string_value(ctx, key)?.get().to_rust_string();
    Ok(ctx.engine().identifier(&text))
}

// ---- calls -------------------------------------------------------------

fn perform_call(
    ctx: &mut Context,
    result: *mut Value,
    callee: Value,
    this: Value,
    argv: *const Value,
    argc: u32,
) {
    let args: &[Value] = if argc == 0 {
        &[]
    } else {
        unsafe { std::slice::from_raw_parts(argv, argc as usize) }
    };
    let Some(object) = callee.as_object().filter(|o| o.get().is_callable()) else {
        let error = ctx.engine().type_error("value is not a function");
        ctx.throw(error);
        return;
    };
    match ctx.engine().invoke(object, this, args, ctx) {
        Ok(value) => unsafe { store_result(result, value) },
        Err(thrown) => ctx.throw(thrown),
    }
}

fn perform_construct(
    ctx: &mut Context,
    result: *mut Value,
    callee: Value,
    argv: *const Value,
    argc: u32,
) {
    let args: &[Value] = if argc == 0 {
        &[]
    } else {
        unsafe { std::slice::from_raw_parts(argv, argc as usize) }
    };
    let Some(object) = callee.as_object().filter(|o| o.get().is_callable()) else {
        let error = ctx.engine().type_error("value is not a constructor");
        ctx.throw(error);
        return;
    };
    match ctx.engine().construct(object, args, ctx) {
        Ok(value) => unsafe { store_result(result, value) },
        Err(thrown) => ctx.throw(thrown),
    }
}

// ---- value plumbing ----------------------------------------------------

/// Copy one value slot into another.
#[no_mangle]
pub unsafe extern "C" fn krait_rt_copy(target: *mut Value, source: *const Value) {
    unsafe { *target = *source };
}

/// Materialize a closure over `function` in the current scope.
#[no_mangle]
pub unsafe extern "C" fn krait_rt_init_closure(
    ctx: *mut Context,
    result: *mut Value,
    function: *const ir::Function,
) {
    let ctx = unsafe { context(ctx) };
    let object = ctx.engine().new_script_function(function, ctx);
    unsafe { store_result(result, Value::from_object(object)) };
}

// ---- scope access ------------------------------------------------------

#[no_mangle]
pub unsafe extern "C" fn krait_rt_get_activation_property(
    ctx: *mut Context,
    result: *mut Value,
    name: *mut JsString,
) {
    let ctx = unsafe { context(ctx) };
    let name = unsafe { string_ref(name) };
    let (value, _) = try_or_throw!(ctx, resolve_read(ctx, name));
    unsafe { store_result(result, value) };
}

#[no_mangle]
pub unsafe extern "C" fn krait_rt_set_activation_property(
    ctx: *mut Context,
    name: *mut JsString,
    value: *const Value,
) {
    let ctx = unsafe { context(ctx) };
    let name = unsafe { string_ref(name) };
    let value = unsafe { *value };
    try_or_throw!(ctx, resolve_write(ctx, name, value));
}

#[no_mangle]
pub unsafe extern "C" fn krait_rt_set_activation_property_boolean(
    ctx: *mut Context,
    name: *mut JsString,
    value: u32,
) {
    let ctx = unsafe { context(ctx) };
    let name = unsafe { string_ref(name) };
    try_or_throw!(ctx, resolve_write(ctx, name, Value::from_boolean(value != 0)));
}

#[no_mangle]
pub unsafe extern "C" fn krait_rt_set_activation_property_number(
    ctx: *mut Context,
    name: *mut JsString,
    value: f64,
) {
    let ctx = unsafe { context(ctx) };
    let name = unsafe { string_ref(name) };
    try_or_throw!(ctx, resolve_write(ctx, name, Value::number(value)));
}

#[no_mangle]
pub unsafe extern "C" fn krait_rt_set_activation_property_string(
    ctx: *mut Context,
    name: *mut JsString,
    value: *mut JsString,
) {
    let ctx = unsafe { context(ctx) };
    let name = unsafe { string_ref(name) };
    let value = Value::from_string(unsafe { string_ref(value) });
    try_or_throw!(ctx, resolve_write(ctx, name, value));
}

#[no_mangle]
pub unsafe extern "C" fn krait_rt_set_activation_property_closure(
    ctx: *mut Context,
    name: *mut JsString,
    function: *const ir::Function,
) {
    let ctx = unsafe { context(ctx) };
    let name = unsafe { string_ref(name) };
    let object = ctx.engine().new_script_function(function, ctx);
    try_or_throw!(ctx, resolve_write(ctx, name, Value::from_object(object)));
}

/// Scope write of an arbitrary constant, passed as raw value bits.
#[no_mangle]
pub unsafe extern "C" fn krait_rt_set_activation_property_value(
    ctx: *mut Context,
    name: *mut JsString,
    bits: u64,
) {
    let ctx = unsafe { context(ctx) };
    let name = unsafe { string_ref(name) };
    try_or_throw!(ctx, resolve_write(ctx, name, Value::from_bits(bits)));
}

#[no_mangle]
pub unsafe extern "C" fn krait_rt_copy_activation_property(
    ctx: *mut Context,
    target: *mut JsString,
    source: *mut JsString,
) {
    let ctx = unsafe { context(ctx) };
    let target = unsafe { string_ref(target) };
    let source = unsafe { string_ref(source) };
    let (value, _) = try_or_throw!(ctx, resolve_read(ctx, source));
    try_or_throw!(ctx, resolve_write(ctx, target, value));
}

#[no_mangle]
pub unsafe extern "C" fn krait_rt_get_this_object(ctx: *mut Context, result: *mut Value) {
    let ctx = unsafe { context(ctx) };
    unsafe { store_result(result, ctx.this_object) };
}

// ---- property access ---------------------------------------------------

#[no_mangle]
pub unsafe extern "C" fn krait_rt_get_property(
    ctx: *mut Context,
    result: *mut Value,
    base: *const Value,
    name: *mut JsString,
) {
    let ctx = unsafe { context(ctx) };
    let base = unsafe { *base };
    let name = unsafe { string_ref(name) };
    let object = try_or_throw!(ctx, ops::to_object(ctx, base));
    let value = try_or_throw!(ctx, object.get_property(ctx, name));
    unsafe { store_result(result, value) };
}

fn set_property_common(ctx: &mut Context, base: Value, name: StringRef, value: Value) {
    let object = try_or_throw!(ctx, ops::to_object(ctx, base));
    try_or_throw!(ctx, object.set_property(ctx, name, value));
}

#[no_mangle]
pub unsafe extern "C" fn krait_rt_set_property(
    ctx: *mut Context,
    base: *const Value,
    name: *mut JsString,
    value: *const Value,
) {
    let ctx = unsafe { context(ctx) };
    let (base, value) = unsafe { (*base, *value) };
    let name = unsafe { string_ref(name) };
    set_property_common(ctx, base, name, value);
}

#[no_mangle]
pub unsafe extern "C" fn krait_rt_set_property_boolean(
    ctx: *mut Context,
    base: *const Value,
    name: *mut JsString,
    value: u32,
) {
    let ctx = unsafe { context(ctx) };
    let base = unsafe { *base };
    let name = unsafe { string_ref(name) };
    set_property_common(ctx, base, name, Value::from_boolean(value != 0));
}

#[no_mangle]
pub unsafe extern "C" fn krait_rt_set_property_number(
    ctx: *mut Context,
    base: *const Value,
    name: *mut JsString,
    value: f64,
) {
    let ctx = unsafe { context(ctx) };
    let base = unsafe { *base };
    let name = unsafe { string_ref(name) };
    set_property_common(ctx, base, name, Value::number(value));
}

#[no_mangle]
pub unsafe extern "C" fn krait_rt_set_property_string(
    ctx: *mut Context,
    base: *const Value,
    name: *mut JsString,
    value: *mut JsString,
) {
    let ctx = unsafe { context(ctx) };
    let base = unsafe { *base };
    let name = unsafe { string_ref(name) };
    let value = Value::from_string(unsafe { string_ref(value) });
    set_property_common(ctx, base, name, value);
}

#[no_mangle]
pub unsafe extern "C" fn krait_rt_set_property_closure(
    ctx: *mut Context,
    base: *const Value,
    name: *mut JsString,
    function: *const ir::Function,
) {
    let ctx = unsafe { context(ctx) };
    let base = unsafe { *base };
    let name = unsafe { string_ref(name) };
    let object = ctx.engine().new_script_function(function, ctx);
    set_property_common(ctx, base, name, Value::from_object(object));
}

#[no_mangle]
pub unsafe extern "C" fn krait_rt_set_property_value(
    ctx: *mut Context,
    base: *const Value,
    name: *mut JsString,
    bits: u64,
) {
    let ctx = unsafe { context(ctx) };
    let base = unsafe { *base };
    let name = unsafe { string_ref(name) };
    set_property_common(ctx, base, name, Value::from_bits(bits));
}

// ---- element access ----------------------------------------------------

#[no_mangle]
pub unsafe extern "C" fn krait_rt_get_element(
    ctx: *mut Context,
    result: *mut Value,
    base: *const Value,
    index: *const Value,
) {
    let ctx = unsafe { context(ctx) };
    let (base, index) = unsafe { (*base, *index) };
    let value = try_or_throw!(ctx, element_get(ctx, base, index));
    unsafe { store_result(result, value) };
}

#[no_mangle]
pub unsafe extern "C" fn krait_rt_set_element(
    ctx: *mut Context,
    base: *const Value,
    index: *const Value,
    value: *const Value,
) {
    let ctx = unsafe { context(ctx) };
    let (base, index, value) = unsafe { (*base, *index, *value) };
    try_or_throw!(ctx, element_set(ctx, base, index, value));
}

#[no_mangle]
pub unsafe extern "C" fn krait_rt_set_element_number(
    ctx: *mut Context,
    base: *const Value,
    index: *const Value,
    value: f64,
) {
    let ctx = unsafe { context(ctx) };
    let (base, index) = unsafe { (*base, *index) };
    try_or_throw!(ctx, element_set(ctx, base, index, Value::number(value)));
}

#[no_mangle]
pub unsafe extern "C" fn krait_rt_set_element_value(
    ctx: *mut Context,
    base: *const Value,
    index: *const Value,
    bits: u64,
) {
    let ctx = unsafe { context(ctx) };
    let (base, index) = unsafe { (*base, *index) };
    try_or_throw!(ctx, element_set(ctx, base, index, Value::from_bits(bits)));
}

// ---- delete ------------------------------------------------------------

#[no_mangle]
pub unsafe extern "C" fn krait_rt_delete_member(
    ctx: *mut Context,
    result: *mut Value,
    base: *const Value,
    name: *mut JsString,
) {
    let ctx = unsafe { context(ctx) };
    let base = unsafe { *base };
    let name = unsafe { string_ref(name) };
    let object = try_or_throw!(ctx, ops::to_object(ctx, base));
    let deleted = object.delete_property(ctx, name);
    unsafe { store_result(result, Value::from_boolean(deleted)) };
}

#[no_mangle]
pub unsafe extern "C" fn krait_rt_delete_subscript(
    ctx: *mut Context,
    result: *mut Value,
    base: *const Value,
    index: *const Value,
) {
    let ctx = unsafe { context(ctx) };
    let (base, index) = unsafe { (*base, *index) };
    let object = try_or_throw!(ctx, ops::to_object(ctx, base));
    let name = try_or_throw!(ctx, property_name(ctx, index));
    let deleted = object.delete_property(ctx, name);
    unsafe { store_result(result, Value::from_boolean(deleted)) };
}

#[no_mangle]
pub unsafe extern "C" fn krait_rt_delete_name(
    ctx: *mut Context,
    result: *mut Value,
    name: *mut JsString,
) {
    let ctx = unsafe { context(ctx) };
    let name = unsafe { string_ref(name) };

    let mut deleted = true;
    let mut cursor: *mut Context = ctx;
    'walk: {
        while !cursor.is_null() {
            let scope = unsafe { &mut *cursor };
            let withs: Vec<ObjectRef> = scope.with_stack.iter().rev().copied().collect();
            for object in withs {
                if object.has_property(scope, name) {
                    deleted = object.delete_property(scope, name);
                    break 'walk;
                }
            }
            if scope.lookup_slot(name).is_some() {
                deleted = false;
                break 'walk;
            }
            if let Some(activation) = scope.activation {
                if activation.get().members().is_some_and(|m| m.contains(name)) {
                    deleted = activation.delete_property(scope, name);
                    break 'walk;
                }
            }
            cursor = scope.outer;
        }
        let global = ctx.engine().global_object;
        if global.has_property(ctx, name) {
            deleted = global.delete_property(ctx, name);
        }
    }
    unsafe { store_result(result, Value::from_boolean(deleted)) };
}

// ---- operators ---------------------------------------------------------

macro_rules! unop_helpers {
    ($($name:ident => $imp:expr;)*) => {
        $(
            #[no_mangle]
            pub unsafe extern "C" fn $name(
                ctx: *mut Context,
                result: *mut Value,
                value: *const Value,
            ) {
                let ctx = unsafe { context(ctx) };
                let value = unsafe { *value };
                #[allow(clippy::redundant_closure_call)]
                let outcome = try_or_throw!(ctx, ($imp)(ctx, value));
                unsafe { store_result(result, outcome) };
            }
        )*
    };
}

unop_helpers! {
    krait_rt_not => |_: &mut Context, v| Ok(ops::logical_not(v));
    krait_rt_uminus => ops::unary_minus;
    krait_rt_uplus => ops::unary_plus;
    krait_rt_compl => ops::bitwise_not;
}

macro_rules! binop_helpers {
    ($($name:ident => $imp:expr;)*) => {
        $(
            #[no_mangle]
            pub unsafe extern "C" fn $name(
                ctx: *mut Context,
                result: *mut Value,
                left: *const Value,
                right: *const Value,
            ) {
                let ctx = unsafe { context(ctx) };
                let (left, right) = unsafe { (*left, *right) };
                #[allow(clippy::redundant_closure_call)]
                let outcome = try_or_throw!(ctx, ($imp)(ctx, left, right));
                unsafe { store_result(result, outcome) };
            }
        )*
    };
}

binop_helpers! {
    krait_rt_bit_and => ops::bit_and;
    krait_rt_bit_or => ops::bit_or;
    krait_rt_bit_xor => ops::bit_xor;
    krait_rt_add => ops::add;
    krait_rt_sub => ops::sub;
    krait_rt_mul => ops::mul;
    krait_rt_div => ops::div;
    krait_rt_mod => ops::modulo;
    krait_rt_shl => ops::shl;
    krait_rt_shr => ops::shr;
    krait_rt_ushr => ops::ushr;
    krait_rt_gt => |ctx: &mut Context, l, r| ops::greater_than(ctx, l, r).map(Value::from_boolean);
    krait_rt_lt => |ctx: &mut Context, l, r| ops::less_than(ctx, l, r).map(Value::from_boolean);
    krait_rt_ge => |ctx: &mut Context, l, r| ops::greater_equal(ctx, l, r).map(Value::from_boolean);
    krait_rt_le => |ctx: &mut Context, l, r| ops::less_equal(ctx, l, r).map(Value::from_boolean);
    krait_rt_eq => |ctx: &mut Context, l, r| ops::abstract_equals(ctx, l, r).map(Value::from_boolean);
    krait_rt_ne => |ctx: &mut Context, l, r| ops::abstract_equals(ctx, l, r).map(|b| Value::from_boolean(!b));
    krait_rt_se => |_: &mut Context, l, r| Ok(Value::from_boolean(ops::strict_equals(l, r)));
    krait_rt_sne => |_: &mut Context, l, r| Ok(Value::from_boolean(!ops::strict_equals(l, r)));
    krait_rt_instanceof => |ctx: &mut Context, l, r| ops::instance_of(ctx, l, r).map(Value::from_boolean);
    krait_rt_in => |ctx: &mut Context, l, r| ops::has_property_operator(ctx, l, r).map(Value::from_boolean);
}

macro_rules! cmp_helpers {
    ($($name:ident => $imp:expr;)*) => {
        $(
            #[no_mangle]
            pub unsafe extern "C" fn $name(
                ctx: *mut Context,
                left: *const Value,
                right: *const Value,
            ) -> u32 {
                let ctx = unsafe { context(ctx) };
                let (left, right) = unsafe { (*left, *right) };
                #[allow(clippy::redundant_closure_call)]
                let outcome = ($imp)(ctx, left, right);
                match outcome {
                    Ok(holds) => holds as u32,
                    Err(thrown) => {
                        ctx.throw(thrown);
                        0
                    }
                }
            }
        )*
    };
}

cmp_helpers! {
    krait_rt_cmp_gt => ops::greater_than;
    krait_rt_cmp_lt => ops::less_than;
    krait_rt_cmp_ge => ops::greater_equal;
    krait_rt_cmp_le => ops::less_equal;
    krait_rt_cmp_eq => ops::abstract_equals;
    krait_rt_cmp_ne => |ctx: &mut Context, l, r| ops::abstract_equals(ctx, l, r).map(|b| !b);
    krait_rt_cmp_se => |_: &mut Context, l, r| Ok::<bool, Value>(ops::strict_equals(l, r));
    krait_rt_cmp_sne => |_: &mut Context, l, r| Ok::<bool, Value>(!ops::strict_equals(l, r));
    krait_rt_cmp_instanceof => ops::instance_of;
    krait_rt_cmp_in => ops::has_property_operator;
}

macro_rules! inplace_helpers {
    ($($name_op:ident, $element_op:ident, $member_op:ident => $imp:path;)*) => {
        $(
            #[no_mangle]
            pub unsafe extern "C" fn $name_op(
                ctx: *mut Context,
                name: *mut JsString,
                value: *const Value,
            ) {
                let ctx = unsafe { context(ctx) };
                let name = unsafe { string_ref(name) };
                let value = unsafe { *value };
                let (current, _) = try_or_throw!(ctx, resolve_read(ctx, name));
                let updated = try_or_throw!(ctx, $imp(ctx, current, value));
                try_or_throw!(ctx, resolve_write(ctx, name, updated));
            }

            #[no_mangle]
            pub unsafe extern "C" fn $element_op(
                ctx: *mut Context,
                base: *const Value,
                index: *const Value,
                value: *const Value,
            ) {
                let ctx = unsafe { context(ctx) };
                let (base, index, value) = unsafe { (*base, *index, *value) };
                let current = try_or_throw!(ctx, element_get(ctx, base, index));
                let updated = try_or_throw!(ctx, $imp(ctx, current, value));
                try_or_throw!(ctx, element_set(ctx, base, index, updated));
            }

            #[no_mangle]
            pub unsafe extern "C" fn $member_op(
                ctx: *mut Context,
                base: *const Value,
                name: *mut JsString,
                value: *const Value,
            ) {
                let ctx = unsafe { context(ctx) };
                let (base, value) = unsafe { (*base, *value) };
                let name = unsafe { string_ref(name) };
                let object = try_or_throw!(ctx, ops::to_object(ctx, base));
                let current = try_or_throw!(ctx, object.get_property(ctx, name));
                let updated = try_or_throw!(ctx, $imp(ctx, current, value));
                try_or_throw!(ctx, object.set_property(ctx, name, updated));
            }
        )*
    };
}

inplace_helpers! {
    krait_rt_inplace_bit_and_name, krait_rt_inplace_bit_and_element, krait_rt_inplace_bit_and_member => ops::bit_and;
    krait_rt_inplace_bit_or_name, krait_rt_inplace_bit_or_element, krait_rt_inplace_bit_or_member => ops::bit_or;
    krait_rt_inplace_bit_xor_name, krait_rt_inplace_bit_xor_element, krait_rt_inplace_bit_xor_member => ops::bit_xor;
    krait_rt_inplace_add_name, krait_rt_inplace_add_element, krait_rt_inplace_add_member => ops::add;
    krait_rt_inplace_sub_name, krait_rt_inplace_sub_element, krait_rt_inplace_sub_member => ops::sub;
    krait_rt_inplace_mul_name, krait_rt_inplace_mul_element, krait_rt_inplace_mul_member => ops::mul;
    krait_rt_inplace_div_name, krait_rt_inplace_div_element, krait_rt_inplace_div_member => ops::div;
    krait_rt_inplace_mod_name, krait_rt_inplace_mod_element, krait_rt_inplace_mod_member => ops::modulo;
    krait_rt_inplace_shl_name, krait_rt_inplace_shl_element, krait_rt_inplace_shl_member => ops::shl;
    krait_rt_inplace_shr_name, krait_rt_inplace_shr_element, krait_rt_inplace_shr_member => ops::shr;
    krait_rt_inplace_ushr_name, krait_rt_inplace_ushr_element, krait_rt_inplace_ushr_member => ops::ushr;
}

#[no_mangle]
pub unsafe extern "C" fn krait_rt_to_boolean(ctx: *mut Context, value: *const Value) -> u32 {
    let _ = ctx;
    let value = unsafe { *value };
    ops::to_boolean(value) as u32
}

// ---- calls and constructs ----------------------------------------------

#[no_mangle]
pub unsafe extern "C" fn krait_rt_call_activation_property(
    ctx: *mut Context,
    result: *mut Value,
    name: *mut JsString,
    argv: *const Value,
    argc: u32,
) {
    let ctx = unsafe { context(ctx) };
    let name = unsafe { string_ref(name) };
    let (callee, this) = try_or_throw!(ctx, resolve_read(ctx, name));
    perform_call(ctx, result, callee, this, argv, argc);
}

#[no_mangle]
pub unsafe extern "C" fn krait_rt_call_property(
    ctx: *mut Context,
    result: *mut Value,
    base: *const Value,
    name: *mut JsString,
    argv: *const Value,
    argc: u32,
) {
    let ctx = unsafe { context(ctx) };
    let base = unsafe { *base };
    let name = unsafe { string_ref(name) };
    let object = try_or_throw!(ctx, ops::to_object(ctx, base));
    let callee = try_or_throw!(ctx, object.get_property(ctx, name));
    perform_call(ctx, result, callee, Value::from_object(object), argv, argc);
}

#[no_mangle]
pub unsafe extern "C" fn krait_rt_call_value(
    ctx: *mut Context,
    result: *mut Value,
    value: *const Value,
    argv: *const Value,
    argc: u32,
) {
    let ctx = unsafe { context(ctx) };
    let callee = unsafe { *value };
    perform_call(ctx, result, callee, Value::undefined(), argv, argc);
}

#[no_mangle]
pub unsafe extern "C" fn krait_rt_construct_activation_property(
    ctx: *mut Context,
    result: *mut Value,
    name: *mut JsString,
    argv: *const Value,
    argc: u32,
) {
    let ctx = unsafe { context(ctx) };
    let name = unsafe { string_ref(name) };
    let (callee, _) = try_or_throw!(ctx, resolve_read(ctx, name));
    perform_construct(ctx, result, callee, argv, argc);
}

#[no_mangle]
pub unsafe extern "C" fn krait_rt_construct_property(
    ctx: *mut Context,
    result: *mut Value,
    base: *const Value,
    name: *mut JsString,
    argv: *const Value,
    argc: u32,
) {
    let ctx = unsafe { context(ctx) };
    let base = unsafe { *base };
    let name = unsafe { string_ref(name) };
    let object = try_or_throw!(ctx, ops::to_object(ctx, base));
    let callee = try_or_throw!(ctx, object.get_property(ctx, name));
    perform_construct(ctx, result, callee, argv, argc);
}

#[no_mangle]
pub unsafe extern "C" fn krait_rt_construct_value(
    ctx: *mut Context,
    result: *mut Value,
    value: *const Value,
    argv: *const Value,
    argc: u32,
) {
    let ctx = unsafe { context(ctx) };
    let callee = unsafe { *value };
    perform_construct(ctx, result, callee, argv, argc);
}

// ---- builtins ----------------------------------------------------------

#[no_mangle]
pub unsafe extern "C" fn krait_rt_builtin_typeof(
    ctx: *mut Context,
    result: *mut Value,
    value: *const Value,
) {
    let ctx = unsafe { context(ctx) };
    let value = unsafe { *value };
    let name = ops::type_of(ctx, value);
    unsafe { store_result(result, Value::from_string(name)) };
}

#[no_mangle]
pub unsafe extern "C" fn krait_rt_builtin_throw(ctx: *mut Context, value: *const Value) {
    let ctx = unsafe { context(ctx) };
    let value = unsafe { *value };
    ctx.throw(value);
}

/// Establish a try scope. Yields `false` into the result slot; a rethrow
/// into this scope is observed through the exception flag, not through a
/// non-local jump.
#[no_mangle]
pub unsafe extern "C" fn krait_rt_builtin_create_exception_handler(
    ctx: *mut Context,
    result: *mut Value,
) {
    let ctx = unsafe { context(ctx) };
    let ctx_ptr: *mut Context = ctx;
    ctx.engine().push_exception_handler(ctx_ptr);
    unsafe { store_result(result, Value::from_boolean(false)) };
}

#[no_mangle]
pub unsafe extern "C" fn krait_rt_builtin_delete_exception_handler(ctx: *mut Context) {
    let ctx = unsafe { context(ctx) };
    ctx.engine().pop_exception_handler();
}

/// Read and consume the pending exception (catch-clause entry).
#[no_mangle]
pub unsafe extern "C" fn krait_rt_builtin_get_exception(ctx: *mut Context, result: *mut Value) {
    let ctx = unsafe { context(ctx) };
    let value = ctx.take_exception();
    unsafe { store_result(result, value) };
}

#[no_mangle]
pub unsafe extern "C" fn krait_rt_builtin_foreach_iterator_object(
    ctx: *mut Context,
    result: *mut Value,
    value: *const Value,
) {
    let ctx = unsafe { context(ctx) };
    let value = unsafe { *value };
    let target = value.as_object();
    let iterator = ctx.engine().new_foreach_iterator_object(target);
    unsafe { store_result(result, Value::from_object(iterator)) };
}

/// Advance a for-in iterator; yields null when exhausted.
#[no_mangle]
pub unsafe extern "C" fn krait_rt_builtin_foreach_next_property_name(
    ctx: *mut Context,
    result: *mut Value,
    iterator: *const Value,
) {
    let _ = ctx;
    let iterator = unsafe { *iterator };
    let next = iterator
        .as_object()
        .and_then(|o| o.get_mut().as_foreach_iterator_mut())
        .and_then(|it| it.next_property_name());
    let value = match next {
        Some(name) => Value::from_string(name),
        None => Value::null(),
    };
    unsafe { store_result(result, value) };
}

#[no_mangle]
pub unsafe extern "C" fn krait_rt_builtin_push_with(ctx: *mut Context, value: *const Value) {
    let ctx = unsafe { context(ctx) };
    let value = unsafe { *value };
    let object = try_or_throw!(ctx, ops::to_object(ctx, value));
    ctx.push_with(object);
}

#[no_mangle]
pub unsafe extern "C" fn krait_rt_builtin_pop_with(ctx: *mut Context) {
    let ctx = unsafe { context(ctx) };
    ctx.pop_with();
}

/// Declare a var in the current variable scope: a no-op for names already
/// backed by slots, an activation-table entry when the function keeps an
/// activation, a global property at the top level.
#[no_mangle]
pub unsafe extern "C" fn krait_rt_builtin_declare_var(
    ctx: *mut Context,
    deletable: u32,
    name: *mut JsString,
) {
    use crate::property::{Attribute, PropertyDescriptor};

    let ctx = unsafe { context(ctx) };
    let name = unsafe { string_ref(name) };
    if ctx.declares(name) {
        return;
    }
    let mut attributes = Attribute::all_set();
    attributes.set(Attribute::CONFIGURABLE, deletable != 0);

    if ctx.function.is_some() {
        let ctx_ptr: *mut Context = ctx;
        let activation = match ctx.activation {
            Some(activation) => activation,
            None => {
                let activation = ctx.engine().new_activation_object(ctx_ptr);
                ctx.activation = Some(activation);
                activation
            }
        };
        let members = activation.get_mut().members_mut();
        if !members.contains(name) {
            *members.insert(name) =
                PropertyDescriptor::with_attributes(Value::undefined(), attributes);
        }
    } else {
        let global = ctx.engine().global_object;
        let members = global.get_mut().members_mut();
        if !members.contains(name) {
            *members.insert(name) =
                PropertyDescriptor::with_attributes(Value::undefined(), attributes);
        }
    }
}
