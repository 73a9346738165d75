use std::io;

/// Errors surfaced while assembling or publishing machine code.
#[derive(Debug, thiserror::Error)]
pub enum JitError {
    /// A relative branch displacement does not fit in the 32 bits the
    /// encoding reserves for it.
    #[error("branch displacement {0} does not fit in rel32")]
    DisplacementOverflow(i64),

    /// Mapping or protecting executable memory failed.
    #[error("executable memory: {0}")]
    Memory(#[from] io::Error),
}
