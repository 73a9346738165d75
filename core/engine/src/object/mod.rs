//! The object model.
//!
//! Every JavaScript object is an [`Object`] record: a prototype link, a
//! class name, a lazily allocated property table, the extensibility flag,
//! and an [`ObjectKind`] discriminator carrying variant state. Behavior
//! that the reference semantics make polymorphic — property reads on
//! arrays, the live argument aliasing of `arguments`, scope resolution on
//! activations — dispatches on the kind inside the generic operations, and
//! the `as_*` downcasts are pattern tests returning optional references.
//!
//! Objects are owned by the engine in a slab of boxed allocations;
//! [`ObjectRef`] handles stay valid for the engine's lifetime. The
//! operations take the current [`Context`] because accessor properties can
//! re-enter JavaScript.

use crate::context::Context;
use crate::property::{Attribute, DescriptorKind, PropertyDescriptor, PropertyTable};
use crate::string::StringRef;
use crate::value::Value;
use crate::JsResult;
use bitflags::bitflags;
use std::fmt;
use std::ptr::NonNull;

mod array;
mod function;
mod iter;
#[cfg(test)]
mod tests;

pub use array::Array;
pub use function::{FunctionBody, FunctionData, NativeFn};
pub use iter::ForEachIteratorData;

bitflags! {
    /// Regular expression flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RegExpFlags: u8 {
        const GLOBAL = 0b001;
        const IGNORE_CASE = 0b010;
        const MULTILINE = 0b100;
    }
}

/// State of a regular expression object. Pattern evaluation is the host's
/// concern; the engine only carries the object shape.
#[derive(Debug)]
pub struct RegExpData {
    pub pattern: StringRef,
    pub flags: RegExpFlags,
    pub last_index: Value,
}

/// State of an activation object: a reflection of its context's named
/// formals and locals, plus an ordinary table for declared names.
#[derive(Debug)]
pub struct ActivationData {
    pub context: *mut Context,
}

/// State of an `arguments` object; indexed properties alias the live
/// argument slots of the owning context.
#[derive(Debug)]
pub struct ArgumentsData {
    pub context: *mut Context,
}

/// The variant field of an object.
#[derive(Debug)]
pub enum ObjectKind {
    Ordinary,
    Boolean(Value),
    Number(Value),
    String(Value),
    Date(Value),
    Error(Value),
    Array(Array),
    RegExp(RegExpData),
    Function(FunctionData),
    Activation(ActivationData),
    Arguments(ArgumentsData),
    ForEachIterator(ForEachIteratorData),
}

/// A JavaScript object.
#[derive(Debug)]
pub struct Object {
    pub prototype: Option<ObjectRef>,
    /// Class-name tag (`"Object"`, `"Array"`, …), interned.
    pub klass: StringRef,
    members: Option<Box<PropertyTable>>,
    pub extensible: bool,
    pub kind: ObjectKind,
}

impl Object {
    pub fn new(kind: ObjectKind, klass: StringRef, prototype: Option<ObjectRef>) -> Self {
        Self {
            prototype,
            klass,
            members: None,
            extensible: true,
            kind,
        }
    }

    /// The property table, if one has been allocated.
    #[inline]
    pub fn members(&self) -> Option<&PropertyTable> {
        self.members.as_deref()
    }

    /// The property table, allocating it on first use.
    #[inline]
    pub fn members_mut(&mut self) -> &mut PropertyTable {
        self.members.get_or_insert_with(Default::default)
    }

    pub fn as_array(&self) -> Option<&Array> {
        match &self.kind {
            ObjectKind::Array(array) => Some(array),
            _ => None,
        }
    }

    pub fn as_array_mut(&mut self) -> Option<&mut Array> {
        match &mut self.kind {
            ObjectKind::Array(array) => Some(array),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&FunctionData> {
        match &self.kind {
            ObjectKind::Function(function) => Some(function),
            _ => None,
        }
    }

    pub fn as_function_mut(&mut self) -> Option<&mut FunctionData> {
        match &mut self.kind {
            ObjectKind::Function(function) => Some(function),
            _ => None,
        }
    }

    pub fn as_regexp(&self) -> Option<&RegExpData> {
        match &self.kind {
            ObjectKind::RegExp(regexp) => Some(regexp),
            _ => None,
        }
    }

    pub fn as_foreach_iterator_mut(&mut self) -> Option<&mut ForEachIteratorData> {
        match &mut self.kind {
            ObjectKind::ForEachIterator(iterator) => Some(iterator),
            _ => None,
        }
    }

    #[inline]
    pub fn is_callable(&self) -> bool {
        matches!(self.kind, ObjectKind::Function(_))
    }

    /// The wrapped primitive of Boolean/Number/String/Date/Error objects.
    pub fn primitive_value(&self) -> Option<Value> {
        match &self.kind {
            ObjectKind::Boolean(v)
            | ObjectKind::Number(v)
            | ObjectKind::String(v)
            | ObjectKind::Date(v)
            | ObjectKind::Error(v) => Some(*v),
            _ => None,
        }
    }

    /// Insert (or overwrite) an own property without the `[[Put]]` checks;
    /// used when wiring up intrinsics.
    pub fn insert_property(&mut self, name: StringRef, descriptor: PropertyDescriptor) {
        *self.members_mut().insert(name) = descriptor;
    }
}

/// A non-owning handle to an engine-owned [`Object`].
///
/// Handles are freely copyable and must not outlive the engine. The
/// property operations hang off the handle rather than `&self` so that
/// chain walks and re-entrant accessor calls never hold long-lived
/// borrows of the object they started from.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectRef(NonNull<Object>);

impl ObjectRef {
    #[inline]
    pub fn from_non_null(ptr: NonNull<Object>) -> Self {
        Self(ptr)
    }

    #[inline]
    pub fn as_ptr(self) -> *mut Object {
        self.0.as_ptr()
    }

    /// Shared access.
    ///
    /// # Safety contract (module-internal)
    ///
    /// The engine is single-threaded and owns every object for its whole
    /// lifetime; callers scope the borrow to one dispatch step and never
    /// hold it across a re-entrant call.
    #[inline]
    pub fn get<'a>(self) -> &'a Object {
        unsafe { &*self.0.as_ptr() }
    }

    /// Exclusive access; same contract as [`ObjectRef::get`].
    #[inline]
    #[allow(clippy::mut_from_ref)]
    pub fn get_mut<'a>(self) -> &'a mut Object {
        unsafe { &mut *self.0.as_ptr() }
    }

    /// `[[Get]]`: the language-visible property read.
    pub fn get_property(self, ctx: &mut Context, name: StringRef) -> JsResult<Value> {
        let engine = ctx.engine();
        match &self.get().kind {
            ObjectKind::Array(array) => {
                if name.equals(engine.names.length) {
                    return Ok(Value::number(f64::from(array.len())));
                }
                if let Some(index) = name.get().as_array_index() {
                    if index < array.len() {
                        return Ok(array.at(index));
                    }
                }
            }
            ObjectKind::RegExp(regexp) => {
                let names = &engine.names;
                if name.equals(names.source) {
                    return Ok(Value::from_string(regexp.pattern));
                }
                if name.equals(names.global) {
                    return Ok(Value::from_boolean(regexp.flags.contains(RegExpFlags::GLOBAL)));
                }
                if name.equals(names.ignore_case) {
                    return Ok(Value::from_boolean(
                        regexp.flags.contains(RegExpFlags::IGNORE_CASE),
                    ));
                }
                if name.equals(names.multiline) {
                    return Ok(Value::from_boolean(
                        regexp.flags.contains(RegExpFlags::MULTILINE),
                    ));
                }
                if name.equals(names.last_index) {
                    return Ok(regexp.last_index);
                }
            }
            ObjectKind::Arguments(arguments) => {
                let owner = unsafe { &*arguments.context };
                if name.equals(engine.names.length) {
                    return Ok(Value::number(f64::from(owner.argument_count)));
                }
                if let Some(index) = name.get().as_array_index() {
                    if index < owner.argument_count {
                        return Ok(owner.argument(index));
                    }
                }
            }
            ObjectKind::String(value) => {
                if name.equals(engine.names.length) {
                    let len = value.as_string().map_or(0, |s| s.get().len());
                    return Ok(Value::number(len as f64));
                }
            }
            _ => {}
        }

        match self.get_property_descriptor(ctx, name) {
            Some(descriptor) => match descriptor.kind {
                DescriptorKind::Data(value) => Ok(value),
                DescriptorKind::Accessor { get: Some(getter), .. } => {
                    ctx.engine()
                        .invoke(getter, Value::from_object(self), &[], ctx)
                }
                DescriptorKind::Accessor { get: None, .. } | DescriptorKind::Generic => {
                    Ok(Value::undefined())
                }
            },
            None => Ok(Value::undefined()),
        }
    }

    /// `[[GetOwnProperty]]`, including the synthetic variant properties.
    pub fn get_own_property(self, ctx: &mut Context, name: StringRef) -> Option<PropertyDescriptor> {
        let engine = ctx.engine();
        match &self.get().kind {
            ObjectKind::Array(array) => {
                if name.equals(engine.names.length) {
                    return Some(PropertyDescriptor::with_attributes(
                        Value::number(f64::from(array.len())),
                        Attribute::HAS_WRITABLE
                            | Attribute::WRITABLE
                            | Attribute::HAS_ENUMERABLE
                            | Attribute::HAS_CONFIGURABLE,
                    ));
                }
                if let Some(index) = name.get().as_array_index() {
                    if index < array.len() {
                        return Some(PropertyDescriptor::from_value(array.at(index)));
                    }
                }
            }
            ObjectKind::Arguments(arguments) => {
                let owner = unsafe { &*arguments.context };
                if let Some(index) = name.get().as_array_index() {
                    if index < owner.argument_count {
                        return Some(PropertyDescriptor::from_value(owner.argument(index)));
                    }
                }
            }
            ObjectKind::Activation(activation) => {
                let owner = unsafe { &mut *activation.context };
                if let Some(slot) = owner.lookup_slot(name) {
                    return Some(PropertyDescriptor::with_attributes(
                        *slot,
                        Attribute::HAS_WRITABLE
                            | Attribute::WRITABLE
                            | Attribute::HAS_ENUMERABLE
                            | Attribute::HAS_CONFIGURABLE,
                    ));
                }
            }
            _ => {}
        }
        self.get().members().and_then(|m| m.find(name)).copied()
    }

    /// `[[GetProperty]]`: the first descriptor on the prototype chain.
    pub fn get_property_descriptor(
        self,
        ctx: &mut Context,
        name: StringRef,
    ) -> Option<PropertyDescriptor> {
        let mut cursor = Some(self);
        while let Some(object) = cursor {
            if let Some(descriptor) = object.get_own_property(ctx, name) {
                return Some(descriptor);
            }
            cursor = object.get().prototype;
        }
        None
    }

    pub fn has_property(self, ctx: &mut Context, name: StringRef) -> bool {
        self.get_property_descriptor(ctx, name).is_some()
    }

    /// Whether `[[Put]]` would be allowed to take effect.
    pub fn can_set_property(self, ctx: &mut Context, name: StringRef) -> bool {
        if let Some(own) = self.get_own_property(ctx, name) {
            return match own.kind {
                DescriptorKind::Accessor { set, .. } => set.is_some(),
                _ => own.is_writable(),
            };
        }
        match self
            .get()
            .prototype
            .and_then(|p| p.get_property_descriptor(ctx, name))
        {
            // An inherited setter works even on a non-extensible receiver;
            // anything that would create an own property does not.
            Some(inherited) => match inherited.kind {
                DescriptorKind::Accessor { set, .. } => set.is_some(),
                _ => self.get().extensible && inherited.is_writable(),
            },
            None => self.get().extensible,
        }
    }

    /// `[[Put]]`. A blocked write is silently ignored.
    pub fn set_property(self, ctx: &mut Context, name: StringRef, value: Value) -> JsResult<()> {
        let engine = ctx.engine();
        match &mut self.get_mut().kind {
            ObjectKind::Array(array) => {
                if name.equals(engine.names.length) {
                    let len = crate::runtime::operations::to_uint32(ctx, value)?;
                    self.get_mut()
                        .as_array_mut()
                        .expect("array kind")
                        .resize(len);
                    return Ok(());
                }
                if let Some(index) = name.get().as_array_index() {
                    array.assign(index, value);
                    return Ok(());
                }
            }
            ObjectKind::Arguments(arguments) => {
                let owner = unsafe { &mut *arguments.context };
                if let Some(index) = name.get().as_array_index() {
                    if index < owner.argument_count {
                        owner.set_argument(index, value);
                        return Ok(());
                    }
                }
            }
            ObjectKind::Activation(activation) => {
                let owner = unsafe { &mut *activation.context };
                if let Some(slot) = owner.lookup_slot(name) {
                    *slot = value;
                    return Ok(());
                }
            }
            ObjectKind::RegExp(regexp) => {
                if name.equals(engine.names.last_index) {
                    regexp.last_index = value;
                    return Ok(());
                }
            }
            _ => {}
        }

        if let Some(own) = self.get().members().and_then(|m| m.find(name)).copied() {
            match own.kind {
                DescriptorKind::Data(_) | DescriptorKind::Generic => {
                    if own.is_writable() {
                        if let Some(slot) = self.get_mut().members_mut().find_mut(name) {
                            slot.kind = DescriptorKind::Data(value);
                        }
                    }
                }
                DescriptorKind::Accessor { set, .. } => {
                    if let Some(setter) = set {
                        ctx.engine()
                            .invoke(setter, Value::from_object(self), &[value], ctx)?;
                    }
                }
            }
            return Ok(());
        }

        match self
            .get()
            .prototype
            .and_then(|p| p.get_property_descriptor(ctx, name))
        {
            Some(inherited) => match inherited.kind {
                DescriptorKind::Accessor { set, .. } => {
                    if let Some(setter) = set {
                        ctx.engine()
                            .invoke(setter, Value::from_object(self), &[value], ctx)?;
                    }
                    Ok(())
                }
                _ if !inherited.is_writable() => Ok(()),
                _ => {
                    self.create_own_data_property(name, value);
                    Ok(())
                }
            },
            None => {
                self.create_own_data_property(name, value);
                Ok(())
            }
        }
    }

    fn create_own_data_property(self, name: StringRef, value: Value) {
        let object = self.get_mut();
        if !object.extensible {
            return;
        }
        object.insert_property(name, PropertyDescriptor::from_value(value));
    }

    /// `[[Delete]]` (permissive: absent names delete successfully).
    pub fn delete_property(self, _ctx: &mut Context, name: StringRef) -> bool {
        let object = self.get_mut();
        let configurable = object
            .members()
            .and_then(|m| m.find(name))
            .map(PropertyDescriptor::is_configurable);
        match configurable {
            Some(false) => false,
            Some(true) => object.members_mut().remove(name),
            None => true,
        }
    }

    /// `[[DefineOwnProperty]]`, without the strict-mode throwing variants.
    pub fn define_own_property(
        self,
        _ctx: &mut Context,
        name: StringRef,
        descriptor: PropertyDescriptor,
    ) -> bool {
        let object = self.get_mut();
        let existing = object.members().and_then(|m| m.find(name)).copied();
        match existing {
            None => {
                if !object.extensible {
                    return false;
                }
                object.insert_property(name, descriptor);
                true
            }
            Some(current) if current.is_configurable() => {
                object.insert_property(name, merge_descriptors(current, descriptor));
                true
            }
            Some(current) => {
                // A non-configurable data property still accepts value
                // updates while writable.
                if current.is_writable() && current.is_data() && descriptor.is_data() {
                    if let Some(slot) = object.members_mut().find_mut(name) {
                        slot.kind = descriptor.kind;
                    }
                    return true;
                }
                false
            }
        }
    }

    /// ECMAScript `instanceof` for function objects.
    pub fn has_instance(self, ctx: &mut Context, value: Value) -> JsResult<bool> {
        if !self.get().is_callable() {
            return Err(ctx.engine().type_error("instanceof requires a function object"));
        }
        let Some(mut cursor) = value.as_object().and_then(|o| o.get().prototype) else {
            return Ok(false);
        };
        let prototype_name = ctx.engine().names.prototype;
        let prototype = self.get_property(ctx, prototype_name)?;
        let Some(target) = prototype.as_object() else {
            return Err(ctx
                .engine()
                .type_error("function has non-object prototype in instanceof check"));
        };
        loop {
            if cursor == target {
                return Ok(true);
            }
            match cursor.get().prototype {
                Some(next) => cursor = next,
                None => return Ok(false),
            }
        }
    }
}

fn merge_descriptors(current: PropertyDescriptor, update: PropertyDescriptor) -> PropertyDescriptor {
    let kind = match update.kind {
        DescriptorKind::Generic => current.kind,
        other => other,
    };
    let mut attributes = current.attributes;
    for (has, value) in [
        (Attribute::HAS_WRITABLE, Attribute::WRITABLE),
        (Attribute::HAS_ENUMERABLE, Attribute::ENUMERABLE),
        (Attribute::HAS_CONFIGURABLE, Attribute::CONFIGURABLE),
    ] {
        if update.attributes.contains(has) {
            attributes.insert(has);
            attributes.set(value, update.attributes.contains(value));
        }
    }
    PropertyDescriptor { kind, attributes }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectRef({:p})", self.0.as_ptr())
    }
}
