//! The baseline compiler: IR in, machine code out.
//!
//! [`ModuleCompiler`] drives [`InstructionSelection`](isel::InstructionSelection)
//! over every function of a module into one shared code buffer, publishes
//! the buffer as executable memory and patches the entry points onto the IR
//! functions. Setting `SHOW_CODE` in the environment dumps each compiled
//! function to stderr.

mod isel;
#[cfg(all(test, target_arch = "x86_64"))]
mod tests;

use crate::engine::ExecutionEngine;
use crate::ir;
use krait_jit::x86_64::Assembler;
use krait_jit::ExecutableMemory;
use log::debug;
use std::sync::OnceLock;

pub(crate) use isel::InstructionSelection;

/// A function could not be translated to machine code.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    /// The selector met an IR shape it has no lowering for. The offending
    /// function keeps a null entry point; nothing is published.
    #[error("cannot select instructions for {function}: {reason}")]
    UnsupportedIr { function: String, reason: String },

    /// A branch target or unresolved patch refers to a block that was
    /// never emitted.
    #[error("unresolved branch target {0:?}")]
    UnresolvedBlock(ir::BlockId),

    #[error(transparent)]
    Jit(#[from] krait_jit::JitError),
}

fn show_code() -> bool {
    static SHOW: OnceLock<bool> = OnceLock::new();
    *SHOW.get_or_init(|| std::env::var_os("SHOW_CODE").is_some_and(|v| !v.is_empty()))
}

/// Compiles whole modules. See the module docs.
#[derive(Debug)]
pub struct ModuleCompiler<'e> {
    engine: &'e mut ExecutionEngine,
}

impl<'e> ModuleCompiler<'e> {
    pub fn new(engine: &'e mut ExecutionEngine) -> Self {
        Self { engine }
    }

    /// Compile every function of `module`; on success the functions' entry
    /// points are set and the returned mapping keeps the code executable.
    pub fn compile(mut self, module: &ir::Module) -> Result<ExecutableMemory, CompileError> {
        let mut asm = Assembler::new();
        let mut entries = Vec::with_capacity(module.functions.len());
        for function in &module.functions {
            let offset =
                InstructionSelection::new(&mut *self.engine, module, function, &mut asm).run()?;
            entries.push(offset);
        }

        let buffer = asm.into_buffer();
        let memory = ExecutableMemory::publish(buffer.bytes())?;

        for (index, function) in module.functions.iter().enumerate() {
            let start = entries[index];
            let end = entries
                .get(index + 1)
                .copied()
                .unwrap_or_else(|| memory.len());
            let entry: ir::JitEntry = unsafe { std::mem::transmute(memory.entry(start)) };
            function.code.set(Some(entry));
            debug!(
                "compiled {}: {} bytes at {:p}",
                display_name(function),
                end - start,
                memory.entry(start)
            );
            if show_code() {
                dump_code(function, &memory.code()[start..end]);
            }
        }
        Ok(memory)
    }
}

fn display_name(function: &ir::Function) -> &str {
    if function.name.is_empty() {
        "<anonymous>"
    } else {
        &function.name
    }
}

fn dump_code(function: &ir::Function, code: &[u8]) {
    eprintln!("{}: code size {} bytes", display_name(function), code.len());
    for (row, chunk) in code.chunks(16).enumerate() {
        let bytes: Vec<String> = chunk.iter().map(|b| format!("{b:02x}")).collect();
        eprintln!("  {:06x}  {}", row * 16, bytes.join(" "));
    }
}
