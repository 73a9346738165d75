//! Krait is an embeddable ECMAScript (ES5) engine with a baseline JIT
//! compiler.
//!
//! A front-end (not part of this crate) lowers JavaScript to the
//! three-address [`ir`]; [`ExecutionEngine::compile_module`] turns that
//! into x86-64 machine code which runs against the engine's object model:
//! NaN-boxed [`Value`]s, interned [`JsString`]s, insertion-ordered
//! property tables, prototype-chained objects and activation-record
//! [`Context`]s. Runtime helpers with C linkage implement every slow path;
//! the generated code and the helpers share one ABI (value layout, context
//! offsets, helper signatures) defined in this crate.
//!
//! ```no_run
//! use krait_engine::{ir, ExecutionEngine, Value};
//!
//! let mut engine = ExecutionEngine::new();
//! let mut module = ir::Module::new();
//! let mut f = ir::FunctionBuilder::new("f").formals(&["a", "b"]).temps(1);
//! let result = f.temp(0);
//! f.move_(
//!     result.clone(),
//!     ir::binop(ir::AluOp::Add, f.arg(0), f.arg(1)),
//! );
//! f.ret(result);
//! let id = module.add_function(f.finish());
//!
//! let module = engine.compile_module(module).unwrap();
//! let sum = engine
//!     .run(
//!         module,
//!         id,
//!         Value::undefined(),
//!         &[Value::from_int32(1), Value::from_int32(2)],
//!     )
//!     .unwrap();
//! assert_eq!(sum.as_int32(), Some(3));
//! ```

#![allow(clippy::missing_safety_doc)]

pub mod builtins;
pub mod context;
pub mod engine;
pub mod ir;
pub mod jit;
pub mod object;
pub mod property;
pub mod runtime;
pub mod string;
pub mod value;

pub use context::Context;
pub use engine::{ExecutionEngine, ModuleId};
pub use jit::CompileError;
pub use object::{Object, ObjectKind, ObjectRef};
pub use property::{Attribute, PropertyDescriptor, PropertyTable};
pub use string::{JsString, StringRef};
pub use value::{Value, ValueKind};

/// The result type of operations that can throw a JavaScript exception;
/// the error side carries the thrown value.
pub type JsResult<T> = std::result::Result<T, Value>;
