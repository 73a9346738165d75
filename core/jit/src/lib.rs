//! Machine-code emission for the Krait JavaScript engine.
//!
//! This crate is the architecture layer underneath the instruction selector:
//! a growable [`CodeBuffer`] with label/jump patching, a direct x86-64
//! [`Assembler`](x86_64::Assembler) that writes raw encodings, and
//! [`ExecutableMemory`] that seals finished code read+execute.
//!
//! The buffer and label machinery are architecture-neutral; additional
//! backends only need to provide their own emitter over [`CodeBuffer`].
//!
//! Code assembled here is position independent within a single buffer copy:
//! intra-buffer branches use relative displacements and external calls go
//! through an absolute immediate loaded into a scratch register, so the
//! bytes can be assembled into a plain vector and published to executable
//! pages afterwards (W^X: the pages are never writable and executable at
//! the same time).

mod buffer;
mod error;
mod memory;
pub mod x86_64;

pub use buffer::{CodeBuffer, Jump, Label};
pub use error::JitError;
pub use memory::ExecutableMemory;
