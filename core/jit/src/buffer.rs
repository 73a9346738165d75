use crate::JitError;

/// A bound position in a [`CodeBuffer`].
///
/// Labels are created with [`CodeBuffer::label`] at the current end of the
/// buffer and are immediately usable as branch targets, including for
/// branches emitted earlier (forward branches) via [`CodeBuffer::link`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Label(pub(crate) usize);

impl Label {
    /// Byte offset of the label from the start of the buffer.
    #[inline]
    pub fn offset(self) -> usize {
        self.0
    }
}

/// An emitted branch whose 32-bit displacement has not been resolved yet.
///
/// The instruction selector collects these in per-target patch lists and
/// resolves them once every basic block has been emitted.
#[derive(Debug, Clone, Copy)]
#[must_use = "an unlinked jump leaves a zero displacement in the code"]
pub struct Jump {
    /// Offset of the displacement field inside the buffer.
    pub(crate) disp_at: usize,
}

/// A growable machine-code buffer.
///
/// The buffer only knows about bytes and rel32 displacement fields; all
/// instruction encoding lives in the architecture emitters layered on top.
#[derive(Debug, Default)]
pub struct CodeBuffer {
    bytes: Vec<u8>,
}

impl CodeBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    #[inline]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[inline]
    pub(crate) fn emit_u8(&mut self, byte: u8) {
        self.bytes.push(byte);
    }

    #[inline]
    pub(crate) fn emit_u32(&mut self, word: u32) {
        self.bytes.extend_from_slice(&word.to_le_bytes());
    }

    #[inline]
    pub(crate) fn emit_u64(&mut self, word: u64) {
        self.bytes.extend_from_slice(&word.to_le_bytes());
    }

    /// Bind a label at the current end of the buffer.
    #[inline]
    pub fn label(&self) -> Label {
        Label(self.bytes.len())
    }

    /// Record the rel32 field that starts at the current position and
    /// reserve space for it.
    pub(crate) fn reserve_rel32(&mut self) -> Jump {
        let disp_at = self.bytes.len();
        self.emit_u32(0);
        Jump { disp_at }
    }

    /// Resolve a previously emitted branch to `target`.
    ///
    /// Displacements are measured from the end of the displacement field,
    /// which on x86-64 is the end of the instruction.
    pub fn link(&mut self, jump: Jump, target: Label) -> Result<(), JitError> {
        let disp = target.0 as i64 - (jump.disp_at as i64 + 4);
        let disp32 = i32::try_from(disp).map_err(|_| JitError::DisplacementOverflow(disp))?;
        self.bytes[jump.disp_at..jump.disp_at + 4].copy_from_slice(&disp32.to_le_bytes());
        Ok(())
    }

    /// Pad with `int3` up to the next multiple of `align` bytes.
    ///
    /// Function entry points are kept 16-byte aligned; the filler traps if
    /// anything ever falls into it.
    pub fn align(&mut self, align: usize) {
        debug_assert!(align.is_power_of_two());
        while self.bytes.len() % align != 0 {
            self.bytes.push(0xCC);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_link_patches_relative_displacement() {
        let mut buf = CodeBuffer::new();
        buf.emit_u8(0xE9);
        let jump = buf.reserve_rel32();
        buf.emit_u8(0x90);
        buf.emit_u8(0x90);
        let target = buf.label();
        buf.link(jump, target).unwrap();
        // Displacement counts from the end of the rel32 field: two nops.
        assert_eq!(&buf.bytes()[1..5], &2i32.to_le_bytes());
    }

    #[test]
    fn backward_link_is_negative() {
        let mut buf = CodeBuffer::new();
        let target = buf.label();
        buf.emit_u8(0x90);
        buf.emit_u8(0xE9);
        let jump = buf.reserve_rel32();
        buf.link(jump, target).unwrap();
        assert_eq!(&buf.bytes()[2..6], &(-6i32).to_le_bytes());
    }

    #[test]
    fn align_pads_with_int3() {
        let mut buf = CodeBuffer::new();
        buf.emit_u8(0xC3);
        buf.align(16);
        assert_eq!(buf.len(), 16);
        assert!(buf.bytes()[1..].iter().all(|&b| b == 0xCC));
    }
}
