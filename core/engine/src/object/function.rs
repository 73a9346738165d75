//! Function objects.
//!
//! A function object is an ordinary object whose kind carries
//! [`FunctionData`]: the lexical scope captured at closure creation, the
//! declared parameter and var names, and a body that is either a native
//! Rust function or a compiled IR function. Invocation itself lives on the
//! execution engine, which builds and tears down the callee context.

use crate::context::Context;
use crate::ir;
use crate::string::StringRef;

/// The signature of a host function callable from JavaScript.
///
/// The function reads its arguments and `this` from the context and leaves
/// its return value in `ctx.result`; a thrown exception is reported through
/// the context's exception state.
pub type NativeFn = fn(&mut Context);

/// What runs when a function object is called.
#[derive(Clone, Copy)]
pub enum FunctionBody {
    Native(NativeFn),
    /// A compiled IR function. The pointer targets an engine-owned module;
    /// the machine entry point is read from the IR function at call time.
    Script(*const ir::Function),
}

impl std::fmt::Debug for FunctionBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Native(_) => f.write_str("FunctionBody::Native"),
            Self::Script(p) => write!(f, "FunctionBody::Script({p:p})"),
        }
    }
}

/// Per-function state of a function object.
#[derive(Debug)]
pub struct FunctionData {
    /// The lexically enclosing context, captured when the closure was made.
    pub scope: *mut Context,
    pub name: Option<StringRef>,
    pub formals: Vec<StringRef>,
    pub vars: Vec<StringRef>,
    /// Whether calls must keep their context alive past the return (the
    /// body uses `eval`/`arguments` or a closure captures its locals).
    pub needs_activation: bool,
    pub body: FunctionBody,
}

impl FunctionData {
    pub fn native(scope: *mut Context, name: Option<StringRef>, code: NativeFn) -> Self {
        Self {
            scope,
            name,
            formals: Vec::new(),
            vars: Vec::new(),
            needs_activation: false,
            body: FunctionBody::Native(code),
        }
    }

    pub fn script(
        scope: *mut Context,
        name: Option<StringRef>,
        formals: Vec<StringRef>,
        vars: Vec<StringRef>,
        needs_activation: bool,
        function: *const ir::Function,
    ) -> Self {
        Self {
            scope,
            name,
            formals,
            vars,
            needs_activation,
            body: FunctionBody::Script(function),
        }
    }

    /// Index of a name in the formal parameter list.
    pub fn formal_index(&self, name: StringRef) -> Option<usize> {
        self.formals.iter().position(|&f| f.equals(name))
    }

    /// Index of a name in the var list (which parallels the local slots).
    pub fn var_index(&self, name: StringRef) -> Option<usize> {
        self.vars.iter().position(|&v| v.equals(name))
    }
}
