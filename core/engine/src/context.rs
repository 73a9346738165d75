//! Execution contexts (activation records).
//!
//! A `Context` carries everything a running function touches: the argument
//! and local slot arrays, the scope links, the result slot and the
//! exception state. The leading fields are ABI — generated code reads and
//! writes them at fixed byte offsets relative to the context register — so
//! the struct is `#[repr(C)]` and the instruction selector takes its
//! offsets from the single [`offsets`] table below.
//!
//! Contexts are created by the call prologue and released by the call
//! epilogue. A context whose function needs an activation (its locals are
//! captured by a closure, or it exposes `arguments`) survives the call and
//! stays alive until the engine is dropped.

use crate::engine::ExecutionEngine;
use crate::object::ObjectRef;
use crate::string::StringRef;
use crate::value::Value;

/// An activation record.
#[repr(C)]
#[derive(Debug)]
pub struct Context {
    /// Pointer to the local slots. Read by generated code.
    pub locals: *mut Value,
    /// Pointer to the argument slots. Read by generated code.
    pub arguments: *mut Value,
    /// Number of arguments the caller actually passed.
    pub argument_count: u32,
    /// Exception flag; the LSB is the only meaningful bit. Generated code
    /// tests this word after every helper call that can throw.
    pub has_uncaught_exception: u32,
    /// Return-value slot.
    pub result: Value,
    /// The thrown value while `has_uncaught_exception` is set.
    pub exception_value: Value,

    // Fields below are not part of the generated-code ABI.
    pub(crate) engine_ptr: *mut ExecutionEngine,
    /// Dynamic caller.
    pub parent: *mut Context,
    /// Lexical scope link.
    pub outer: *mut Context,
    pub this_object: Value,
    /// The activation object, materialized lazily.
    pub activation: Option<ObjectRef>,
    /// The `arguments` object, materialized lazily.
    pub arguments_object: Option<ObjectRef>,
    /// The function object being executed (`None` for the root context).
    pub function: Option<ObjectRef>,
    /// Objects pushed by `with`, innermost last.
    pub(crate) with_stack: Vec<ObjectRef>,
    local_storage: Box<[Value]>,
    argument_storage: Box<[Value]>,
}

/// Byte offsets of the JIT-visible context fields.
///
/// This table is the ABI contract between the instruction selector and the
/// runtime: both sides read it from here and nowhere else.
pub mod offsets {
    use super::Context;
    use std::mem::offset_of;

    pub const LOCALS: i32 = offset_of!(Context, locals) as i32;
    pub const ARGUMENTS: i32 = offset_of!(Context, arguments) as i32;
    pub const ARGUMENT_COUNT: i32 = offset_of!(Context, argument_count) as i32;
    pub const HAS_UNCAUGHT_EXCEPTION: i32 = offset_of!(Context, has_uncaught_exception) as i32;
    pub const RESULT: i32 = offset_of!(Context, result) as i32;
    pub const EXCEPTION_VALUE: i32 = offset_of!(Context, exception_value) as i32;
}

impl Context {
    /// Build a context with the given slot shapes. The slot pointers are
    /// wired by [`Context::fix_slot_pointers`] once the context has its
    /// final address.
    pub(crate) fn new(
        engine: *mut ExecutionEngine,
        parent: *mut Context,
        outer: *mut Context,
        this_object: Value,
        function: Option<ObjectRef>,
        args: &[Value],
        formal_count: usize,
        local_count: usize,
    ) -> Self {
        let mut argument_storage =
            vec![Value::undefined(); args.len().max(formal_count)].into_boxed_slice();
        argument_storage[..args.len()].copy_from_slice(args);
        Self {
            locals: std::ptr::null_mut(),
            arguments: std::ptr::null_mut(),
            argument_count: args.len() as u32,
            has_uncaught_exception: 0,
            result: Value::undefined(),
            exception_value: Value::undefined(),
            engine_ptr: engine,
            parent,
            outer,
            this_object,
            activation: None,
            arguments_object: None,
            function,
            with_stack: Vec::new(),
            local_storage: vec![Value::undefined(); local_count].into_boxed_slice(),
            argument_storage,
        }
    }

    /// Point the ABI slot pointers into the owned storage. Must run after
    /// the context has reached its final (boxed) address, and again is
    /// harmless.
    pub(crate) fn fix_slot_pointers(&mut self) {
        self.locals = self.local_storage.as_mut_ptr();
        self.arguments = self.argument_storage.as_mut_ptr();
    }

    /// The owning engine.
    ///
    /// The returned borrow is deliberately not tied to `self`: the engine
    /// outlives every context it created, and the single-threaded
    /// execution model keeps use sites from overlapping.
    #[inline]
    #[allow(clippy::mut_from_ref)]
    pub fn engine<'e>(&self) -> &'e mut ExecutionEngine {
        unsafe { &mut *self.engine_ptr }
    }

    #[inline]
    pub fn argument(&self, index: u32) -> Value {
        if index < self.argument_count {
            unsafe { *self.arguments.add(index as usize) }
        } else {
            Value::undefined()
        }
    }

    #[inline]
    pub fn set_argument(&mut self, index: u32, value: Value) {
        if index < self.argument_count {
            unsafe { *self.arguments.add(index as usize) = value };
        }
    }

    #[inline]
    pub fn local(&self, index: usize) -> Value {
        self.local_storage[index]
    }

    #[inline]
    pub fn set_local(&mut self, index: usize, value: Value) {
        self.local_storage[index] = value;
    }

    #[inline]
    pub fn local_count(&self) -> usize {
        self.local_storage.len()
    }

    /// All arguments the caller passed, as a slice.
    #[inline]
    pub fn argument_slice(&self) -> &[Value] {
        &self.argument_storage[..self.argument_count as usize]
    }

    /// The storage slot of a named formal or var, if this context's
    /// function declares one. Formals resolve into the argument slots
    /// (which is what makes the arguments object alias them), vars into
    /// the local slots.
    pub fn lookup_slot(&mut self, name: StringRef) -> Option<&mut Value> {
        let function = self.function?.get().as_function()?;
        if let Some(index) = function.formal_index(name) {
            return self.argument_storage.get_mut(index);
        }
        if let Some(index) = function.var_index(name) {
            return self.local_storage.get_mut(index);
        }
        None
    }

    /// Whether this context's function declares `name` at all.
    pub fn declares(&self, name: StringRef) -> bool {
        self.function
            .and_then(|f| {
                f.get()
                    .as_function()
                    .map(|d| d.formal_index(name).is_some() || d.var_index(name).is_some())
            })
            .unwrap_or(false)
    }

    /// Record a thrown value. Control transfer happens through the flag
    /// checks emitted after every throwing helper call.
    pub fn throw(&mut self, value: Value) {
        self.exception_value = value;
        self.has_uncaught_exception = 1;
    }

    /// Consume the pending exception (catch-clause entry).
    pub fn take_exception(&mut self) -> Value {
        self.has_uncaught_exception = 0;
        std::mem::replace(&mut self.exception_value, Value::undefined())
    }

    #[inline]
    pub fn has_exception(&self) -> bool {
        self.has_uncaught_exception & 1 != 0
    }

    pub fn push_with(&mut self, object: ObjectRef) {
        self.with_stack.push(object);
    }

    pub fn pop_with(&mut self) {
        self.with_stack.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jit_visible_fields_lead_the_struct() {
        assert_eq!(offsets::LOCALS, 0);
        assert_eq!(offsets::ARGUMENTS, 8);
        assert_eq!(offsets::ARGUMENT_COUNT, 16);
        assert_eq!(offsets::HAS_UNCAUGHT_EXCEPTION, 20);
        assert_eq!(offsets::RESULT, 24);
        assert_eq!(offsets::EXCEPTION_VALUE, 32);
    }
}
