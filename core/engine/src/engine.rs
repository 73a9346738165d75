//! The execution engine.
//!
//! One engine instance owns everything a program can reach: the interned
//! identifier table, the string and object slabs, the prototype singletons,
//! the global object, the root context and the compiled modules with their
//! executable code. All of it lives exactly as long as the engine, which is
//! what allows generated code and property tables to hold raw pointers.
//!
//! The engine is strictly single-threaded: one instance belongs to one
//! thread for its entire lifetime.

use crate::context::Context;
use crate::ir;
use crate::jit::{CompileError, ModuleCompiler};
use crate::object::{
    Array, ForEachIteratorData, FunctionBody, FunctionData, NativeFn, Object, ObjectKind,
    ObjectRef, RegExpData, RegExpFlags,
};
use crate::property::{Attribute, PropertyDescriptor};
use crate::string::{JsString, StringRef};
use crate::value::Value;
use crate::JsResult;
use krait_jit::ExecutableMemory;
use rustc_hash::FxHashMap;
use std::ptr::NonNull;

/// Identifier handles the engine pre-interns because the core compares
/// against them on hot paths.
#[derive(Debug)]
pub struct CommonNames {
    pub length: StringRef,
    pub prototype: StringRef,
    pub constructor: StringRef,
    pub this_: StringRef,
    pub arguments_: StringRef,
    pub message: StringRef,
    pub name: StringRef,
    pub source: StringRef,
    pub global: StringRef,
    pub ignore_case: StringRef,
    pub multiline: StringRef,
    pub last_index: StringRef,
    pub value_of: StringRef,
    pub to_string: StringRef,
    pub proto_accessor: StringRef,
}

/// Identifies a compiled module within its engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleId(pub usize);

/// One try-scope established by the `create_exception_handler` builtin.
#[derive(Debug)]
struct UnwindFrame {
    context: *mut Context,
}

#[derive(Debug)]
struct CompiledUnit {
    module: ir::Module,
    /// Keeps the machine code mapped while the module is alive.
    #[allow(dead_code)]
    code: ExecutableMemory,
}

/// The engine. Owns all engine state; see the module docs.
#[derive(Debug)]
pub struct ExecutionEngine {
    strings: Vec<Box<JsString>>,
    identifiers: FxHashMap<String, StringRef>,
    objects: Vec<Box<Object>>,
    /// Call contexts that outlived their call (captured scopes).
    retained_contexts: Vec<*mut Context>,
    modules: Vec<CompiledUnit>,
    unwind_stack: Vec<UnwindFrame>,

    pub names: CommonNames,
    pub object_prototype: ObjectRef,
    pub function_prototype: ObjectRef,
    pub array_prototype: ObjectRef,
    pub string_prototype: ObjectRef,
    pub number_prototype: ObjectRef,
    pub boolean_prototype: ObjectRef,
    pub date_prototype: ObjectRef,
    pub regexp_prototype: ObjectRef,
    pub error_prototype: ObjectRef,
    pub global_object: ObjectRef,
    root_context: Option<Box<Context>>,
}

fn slab_string(strings: &mut Vec<Box<JsString>>, text: &str) -> StringRef {
    strings.push(Box::new(JsString::new(text)));
    let ptr = NonNull::from(strings.last_mut().expect("just pushed").as_mut());
    StringRef::from_non_null(ptr)
}

fn slab_object(objects: &mut Vec<Box<Object>>, object: Object) -> ObjectRef {
    objects.push(Box::new(object));
    let ptr = NonNull::from(objects.last_mut().expect("just pushed").as_mut());
    ObjectRef::from_non_null(ptr)
}

impl ExecutionEngine {
    /// Create an engine with its intrinsics installed.
    ///
    /// The engine is boxed because contexts and generated code keep raw
    /// back-pointers to it; the box pins its address for its lifetime.
    pub fn new() -> Box<Self> {
        let mut strings = Vec::new();
        let mut identifiers: FxHashMap<String, StringRef> = FxHashMap::default();
        let mut objects = Vec::new();

        let mut intern = |text: &str| -> StringRef {
            if let Some(&existing) = identifiers.get(text) {
                return existing;
            }
            let handle = slab_string(&mut strings, text);
            identifiers.insert(text.to_owned(), handle);
            handle
        };

        let names = CommonNames {
            length: intern("length"),
            prototype: intern("prototype"),
            constructor: intern("constructor"),
            this_: intern("this"),
            arguments_: intern("arguments"),
            message: intern("message"),
            name: intern("name"),
            source: intern("source"),
            global: intern("global"),
            ignore_case: intern("ignoreCase"),
            multiline: intern("multiline"),
            last_index: intern("lastIndex"),
            value_of: intern("valueOf"),
            to_string: intern("toString"),
            proto_accessor: intern("__proto__"),
        };

        let klass_object = intern("Object");
        let object_prototype = slab_object(
            &mut objects,
            Object::new(ObjectKind::Ordinary, klass_object, None),
        );
        let mut prototype_for = |klass: &str| {
            let klass = intern(klass);
            slab_object(
                &mut objects,
                Object::new(ObjectKind::Ordinary, klass, Some(object_prototype)),
            )
        };
        let function_prototype = prototype_for("Function");
        let array_prototype = prototype_for("Array");
        let string_prototype = prototype_for("String");
        let number_prototype = prototype_for("Number");
        let boolean_prototype = prototype_for("Boolean");
        let date_prototype = prototype_for("Date");
        let regexp_prototype = prototype_for("RegExp");
        let error_prototype = prototype_for("Error");
        let global_object = slab_object(
            &mut objects,
            Object::new(ObjectKind::Ordinary, klass_object, Some(object_prototype)),
        );

        let mut engine = Box::new(Self {
            strings,
            identifiers,
            objects,
            retained_contexts: Vec::new(),
            modules: Vec::new(),
            unwind_stack: Vec::new(),
            names,
            object_prototype,
            function_prototype,
            array_prototype,
            string_prototype,
            number_prototype,
            boolean_prototype,
            date_prototype,
            regexp_prototype,
            error_prototype,
            global_object,
            root_context: None,
        });

        let engine_ptr: *mut ExecutionEngine = &mut *engine;
        let mut root = Box::new(Context::new(
            engine_ptr,
            std::ptr::null_mut(),
            std::ptr::null_mut(),
            Value::from_object(global_object),
            None,
            &[],
            0,
            0,
        ));
        root.fix_slot_pointers();
        engine.root_context = Some(root);

        crate::builtins::init(&mut engine);
        engine
    }

    // ---- strings -------------------------------------------------------

    /// Intern an identifier: equal source names yield pointer-equal handles
    /// for the lifetime of the engine.
    pub fn identifier(&mut self, text: &str) -> StringRef {
        if let Some(&existing) = self.identifiers.get(text) {
            return existing;
        }
        let handle = slab_string(&mut self.strings, text);
        self.identifiers.insert(text.to_owned(), handle);
        handle
    }

    /// Allocate a fresh (uninterned) string.
    pub fn new_string(&mut self, text: &str) -> StringRef {
        slab_string(&mut self.strings, text)
    }

    pub fn new_string_from_units(&mut self, units: Box<[u16]>) -> StringRef {
        self.strings.push(Box::new(JsString::from_units(units)));
        let ptr = NonNull::from(self.strings.last_mut().expect("just pushed").as_mut());
        StringRef::from_non_null(ptr)
    }

    // ---- object factories ----------------------------------------------

    fn allocate(&mut self, object: Object) -> ObjectRef {
        slab_object(&mut self.objects, object)
    }

    pub fn new_object(&mut self) -> ObjectRef {
        let klass = self.identifier("Object");
        let prototype = self.object_prototype;
        self.allocate(Object::new(ObjectKind::Ordinary, klass, Some(prototype)))
    }

    pub fn new_object_with_prototype(&mut self, prototype: Option<ObjectRef>) -> ObjectRef {
        let klass = self.identifier("Object");
        self.allocate(Object::new(ObjectKind::Ordinary, klass, prototype))
    }

    pub fn new_array_object(&mut self, array: Array) -> ObjectRef {
        let klass = self.identifier("Array");
        let prototype = self.array_prototype;
        self.allocate(Object::new(ObjectKind::Array(array), klass, Some(prototype)))
    }

    pub fn new_boolean_object(&mut self, value: Value) -> ObjectRef {
        let klass = self.identifier("Boolean");
        let prototype = self.boolean_prototype;
        self.allocate(Object::new(ObjectKind::Boolean(value), klass, Some(prototype)))
    }

    pub fn new_number_object(&mut self, value: Value) -> ObjectRef {
        let klass = self.identifier("Number");
        let prototype = self.number_prototype;
        self.allocate(Object::new(ObjectKind::Number(value), klass, Some(prototype)))
    }

    pub fn new_string_object(&mut self, value: Value) -> ObjectRef {
        let klass = self.identifier("String");
        let prototype = self.string_prototype;
        self.allocate(Object::new(ObjectKind::String(value), klass, Some(prototype)))
    }

    pub fn new_date_object(&mut self, value: Value) -> ObjectRef {
        let klass = self.identifier("Date");
        let prototype = self.date_prototype;
        self.allocate(Object::new(ObjectKind::Date(value), klass, Some(prototype)))
    }

    pub fn new_regexp_object(&mut self, pattern: &str, flags: RegExpFlags) -> ObjectRef {
        let klass = self.identifier("RegExp");
        let pattern = self.new_string(pattern);
        let prototype = self.regexp_prototype;
        self.allocate(Object::new(
            ObjectKind::RegExp(RegExpData {
                pattern,
                flags,
                last_index: Value::from_int32(0),
            }),
            klass,
            Some(prototype),
        ))
    }

    pub fn new_foreach_iterator_object(&mut self, target: Option<ObjectRef>) -> ObjectRef {
        let klass = self.identifier("__ForEachIteratorObject");
        self.allocate(Object::new(
            ObjectKind::ForEachIterator(ForEachIteratorData::new(target)),
            klass,
            None,
        ))
    }

    pub fn new_error_object(&mut self, kind: &str, message: Value) -> ObjectRef {
        let klass = self.identifier(kind);
        let prototype = self.error_prototype;
        let object = self.allocate(Object::new(ObjectKind::Error(message), klass, Some(prototype)));
        let hidden = Attribute::HAS_WRITABLE
            | Attribute::WRITABLE
            | Attribute::HAS_ENUMERABLE
            | Attribute::HAS_CONFIGURABLE
            | Attribute::CONFIGURABLE;
        let message_name = self.names.message;
        let name_name = self.names.name;
        let kind_string = Value::from_string(klass);
        object
            .get_mut()
            .insert_property(message_name, PropertyDescriptor::with_attributes(message, hidden));
        object
            .get_mut()
            .insert_property(name_name, PropertyDescriptor::with_attributes(kind_string, hidden));
        object
    }

    /// Build a `TypeError` ready to be thrown.
    pub fn type_error(&mut self, message: &str) -> Value {
        let message = Value::from_string(self.new_string(message));
        Value::from_object(self.new_error_object("TypeError", message))
    }

    /// Build a `ReferenceError` ready to be thrown.
    pub fn reference_error(&mut self, message: &str) -> Value {
        let message = Value::from_string(self.new_string(message));
        Value::from_object(self.new_error_object("ReferenceError", message))
    }

    pub fn new_native_function(&mut self, name: &str, code: NativeFn) -> ObjectRef {
        let name = self.identifier(name);
        let klass = self.identifier("Function");
        let scope = self.root_context();
        let prototype = self.function_prototype;
        self.allocate(Object::new(
            ObjectKind::Function(FunctionData::native(scope, Some(name), code)),
            klass,
            Some(prototype),
        ))
    }

    /// Build the function object for a compiled IR function.
    pub fn new_script_function(
        &mut self,
        function: *const ir::Function,
        scope: *mut Context,
    ) -> ObjectRef {
        let ir_function = unsafe { &*function };
        let name = if ir_function.name.is_empty() {
            None
        } else {
            Some(self.identifier(&ir_function.name))
        };
        let formals: Vec<StringRef> = ir_function
            .formals
            .iter()
            .map(|f| self.identifier(f))
            .collect();
        let vars: Vec<StringRef> = ir_function
            .locals
            .iter()
            .map(|v| self.identifier(v))
            .collect();
        let klass = self.identifier("Function");
        let prototype = self.function_prototype;
        let object = self.allocate(Object::new(
            ObjectKind::Function(FunctionData::script(
                scope,
                name,
                formals,
                vars,
                ir_function.needs_activation,
                function,
            )),
            klass,
            Some(prototype),
        ));

        // Fresh `prototype` object with a constructor backlink, as `new`
        // expressions expect. Neither side is enumerable.
        let hidden = Attribute::HAS_WRITABLE
            | Attribute::WRITABLE
            | Attribute::HAS_ENUMERABLE
            | Attribute::HAS_CONFIGURABLE
            | Attribute::CONFIGURABLE;
        let proto = self.new_object();
        let constructor_name = self.names.constructor;
        let prototype_name = self.names.prototype;
        proto.get_mut().insert_property(
            constructor_name,
            PropertyDescriptor::with_attributes(Value::from_object(object), hidden),
        );
        object.get_mut().insert_property(
            prototype_name,
            PropertyDescriptor::with_attributes(Value::from_object(proto), hidden),
        );
        object
    }

    pub fn new_activation_object(&mut self, context: *mut Context) -> ObjectRef {
        let klass = self.identifier("Activation");
        self.allocate(Object::new(
            ObjectKind::Activation(crate::object::ActivationData { context }),
            klass,
            None,
        ))
    }

    pub fn new_arguments_object(&mut self, context: *mut Context) -> ObjectRef {
        let klass = self.identifier("Arguments");
        let prototype = self.object_prototype;
        self.allocate(Object::new(
            ObjectKind::Arguments(crate::object::ArgumentsData { context }),
            klass,
            Some(prototype),
        ))
    }

    // ---- contexts ------------------------------------------------------

    pub fn root_context(&mut self) -> *mut Context {
        self.root_context
            .as_mut()
            .map(|c| &mut **c as *mut Context)
            .expect("engine initialized")
    }

    fn new_call_context(
        &mut self,
        function: ObjectRef,
        this: Value,
        args: &[Value],
        caller: *mut Context,
    ) -> *mut Context {
        let engine_ptr: *mut ExecutionEngine = self;
        let data = function.get().as_function().expect("callee is a function");
        let (formal_count, local_count) = match data.body {
            FunctionBody::Native(_) => (0, 0),
            FunctionBody::Script(ir_function) => {
                let ir_function = unsafe { &*ir_function };
                (ir_function.formals.len(), ir_function.locals.len())
            }
        };
        let this = if this.is_null_or_undefined() {
            Value::from_object(self.global_object)
        } else {
            this
        };
        let mut context = Box::new(Context::new(
            engine_ptr,
            caller,
            data.scope,
            this,
            Some(function),
            args,
            formal_count,
            local_count,
        ));
        context.fix_slot_pointers();
        Box::into_raw(context)
    }

    fn dispose_context(&mut self, context: *mut Context) {
        let keep = {
            let ctx = unsafe { &*context };
            ctx.activation.is_some()
                || ctx.arguments_object.is_some()
                || !ctx.with_stack.is_empty()
                || ctx
                    .function
                    .and_then(|f| f.get().as_function().map(|d| d.needs_activation))
                    .unwrap_or(false)
        };
        if keep {
            self.retained_contexts.push(context);
        } else {
            drop(unsafe { Box::from_raw(context) });
        }
    }

    // ---- calls ---------------------------------------------------------

    /// Call a function object. Returns the completion value or the thrown
    /// value; the caller's exception state is untouched either way.
    pub fn invoke(
        &mut self,
        callee: ObjectRef,
        this: Value,
        args: &[Value],
        caller: &mut Context,
    ) -> JsResult<Value> {
        let Some(data) = callee.get().as_function() else {
            return Err(self.type_error("value is not a function"));
        };
        let body = data.body;
        let context = self.new_call_context(callee, this, args, caller);
        match body {
            FunctionBody::Native(code) => code(unsafe { &mut *context }),
            FunctionBody::Script(ir_function) => {
                let entry = unsafe { &*ir_function }.code.get();
                match entry {
                    Some(entry) => unsafe { entry(context) },
                    None => {
                        let error = self.type_error("function body has not been compiled");
                        unsafe { &mut *context }.throw(error);
                    }
                }
            }
        }
        let (thrown, result, exception) = {
            let ctx = unsafe { &mut *context };
            (ctx.has_exception(), ctx.result, ctx.exception_value)
        };
        self.dispose_context(context);
        if thrown {
            Err(exception)
        } else {
            Ok(result)
        }
    }

    /// `new callee(...args)`.
    pub fn construct(
        &mut self,
        callee: ObjectRef,
        args: &[Value],
        caller: &mut Context,
    ) -> JsResult<Value> {
        if !callee.get().is_callable() {
            return Err(self.type_error("value is not a constructor"));
        }
        let prototype_name = self.names.prototype;
        let prototype = callee
            .get_property(caller, prototype_name)?
            .as_object()
            .unwrap_or(self.object_prototype);
        let instance = self.new_object_with_prototype(Some(prototype));
        let result = self.invoke(callee, Value::from_object(instance), args, caller)?;
        Ok(if result.is_object() {
            result
        } else {
            Value::from_object(instance)
        })
    }

    // ---- unwind stack --------------------------------------------------

    /// Establish a try scope for `context`.
    pub fn push_exception_handler(&mut self, context: *mut Context) {
        self.unwind_stack.push(UnwindFrame { context });
    }

    /// Dismantle the innermost try scope.
    pub fn pop_exception_handler(&mut self) {
        self.unwind_stack.pop();
    }

    /// Depth of nested try scopes (across host↔JS recursion).
    pub fn exception_handler_depth(&self) -> usize {
        self.unwind_stack.len()
    }

    /// The context of the innermost active try scope, if any.
    pub fn innermost_handler_context(&self) -> Option<*mut Context> {
        self.unwind_stack.last().map(|frame| frame.context)
    }

    // ---- modules -------------------------------------------------------

    /// Compile every function of `module` to machine code and take
    /// ownership of both the IR and the code.
    pub fn compile_module(&mut self, module: ir::Module) -> Result<ModuleId, CompileError> {
        let code = ModuleCompiler::new(self).compile(&module)?;
        let id = ModuleId(self.modules.len());
        self.modules.push(CompiledUnit { module, code });
        Ok(id)
    }

    pub fn module(&self, id: ModuleId) -> &ir::Module {
        &self.modules[id.0].module
    }

    /// Host entry point: run a compiled function on the root scope.
    ///
    /// Returns the completion value, or the thrown value as `Err` if the
    /// function finished with an uncaught exception.
    pub fn run(
        &mut self,
        module: ModuleId,
        function: ir::FnId,
        this: Value,
        args: &[Value],
    ) -> Result<Value, Value> {
        let ir_function: *const ir::Function =
            &*self.modules[module.0].module.functions[function.0 as usize];
        let scope = self.root_context();
        let callee = self.new_script_function(ir_function, scope);
        let root = unsafe { &mut *self.root_context() };
        self.invoke(callee, this, args, root)
    }

    /// Convenience host read of a global property.
    pub fn global_get(&mut self, name: &str) -> JsResult<Value> {
        let name = self.identifier(name);
        let root = unsafe { &mut *self.root_context() };
        self.global_object.get_property(root, name)
    }

    /// Convenience host write of a global property.
    pub fn global_set(&mut self, name: &str, value: Value) -> JsResult<()> {
        let name = self.identifier(name);
        let root = unsafe { &mut *self.root_context() };
        self.global_object.set_property(root, name, value)
    }
}

impl Drop for ExecutionEngine {
    fn drop(&mut self) {
        for &context in &self.retained_contexts {
            drop(unsafe { Box::from_raw(context) });
        }
    }
}
