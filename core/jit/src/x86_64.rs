//! Direct x86-64 emitter.
//!
//! Writes raw instruction encodings into a [`CodeBuffer`]. Only the subset
//! of the architecture the instruction selector needs is covered: 64-bit
//! moves and address arithmetic for threading `Value*` pointers around,
//! 32-bit ALU forms (with overflow branches) for the integer fast path,
//! SSE2 scalar doubles for the number fast path, and absolute calls into
//! runtime helpers.
//!
//! Encoding notes live next to the code that produces them; the reference
//! is the Intel SDM volume 2 instruction format (REX, ModRM, SIB).

use crate::{CodeBuffer, Jump, JitError, Label};

/// General-purpose registers, numbered with their hardware encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Reg {
    Rax = 0,
    Rcx = 1,
    Rdx = 2,
    Rbx = 3,
    Rsp = 4,
    Rbp = 5,
    Rsi = 6,
    Rdi = 7,
    R8 = 8,
    R9 = 9,
    R10 = 10,
    R11 = 11,
    R12 = 12,
    R13 = 13,
    R14 = 14,
    R15 = 15,
}

impl Reg {
    #[inline]
    fn low3(self) -> u8 {
        self as u8 & 7
    }

    #[inline]
    fn is_extended(self) -> bool {
        self as u8 >= 8
    }
}

/// SSE registers used by the double fast paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Xmm {
    Xmm0 = 0,
    Xmm1 = 1,
}

/// Branch condition codes (the low nibble of the `0F 8x` opcodes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Condition {
    Overflow = 0x0,
    Below = 0x2,
    AboveOrEqual = 0x3,
    Equal = 0x4,
    NotEqual = 0x5,
    BelowOrEqual = 0x6,
    Above = 0x7,
    Less = 0xC,
    GreaterOrEqual = 0xD,
    LessOrEqual = 0xE,
    Greater = 0xF,
}

/// A base-plus-displacement memory operand.
#[derive(Debug, Clone, Copy)]
pub struct Address {
    pub base: Reg,
    pub disp: i32,
}

impl Address {
    #[inline]
    pub fn new(base: Reg, disp: i32) -> Self {
        Self { base, disp }
    }

    /// The same address shifted by `delta` bytes.
    #[inline]
    pub fn offset(self, delta: i32) -> Self {
        Self {
            base: self.base,
            disp: self.disp + delta,
        }
    }
}

/// The x86-64 instruction writer.
///
/// Every method appends exactly one instruction. Branches return [`Jump`]
/// handles that must be linked through [`Assembler::link`] (or the
/// underlying buffer) before the code is published.
#[derive(Debug, Default)]
pub struct Assembler {
    buf: CodeBuffer,
}

impl Assembler {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn buffer(&self) -> &CodeBuffer {
        &self.buf
    }

    #[inline]
    pub fn buffer_mut(&mut self) -> &mut CodeBuffer {
        &mut self.buf
    }

    #[inline]
    pub fn into_buffer(self) -> CodeBuffer {
        self.buf
    }

    #[inline]
    pub fn label(&self) -> Label {
        self.buf.label()
    }

    #[inline]
    pub fn link(&mut self, jump: Jump, target: Label) -> Result<(), JitError> {
        self.buf.link(jump, target)
    }

    // ---- encoding primitives ------------------------------------------

    /// REX prefix; omitted entirely when no bit is set.
    fn rex(&mut self, wide: bool, reg: u8, base: Reg) {
        let mut rex = 0x40u8;
        if wide {
            rex |= 0x08;
        }
        if reg & 8 != 0 {
            rex |= 0x04;
        }
        if base.is_extended() {
            rex |= 0x01;
        }
        if rex != 0x40 {
            self.buf.emit_u8(rex);
        }
    }

    /// ModRM (+ SIB, + displacement) for a register/memory pair.
    ///
    /// `reg` is the three (four, with REX.R) bit register or opcode
    /// extension field. RSP/R12 as a base force a SIB byte; RBP/R13 as a
    /// base cannot use the no-displacement form.
    fn modrm_mem(&mut self, reg: u8, addr: Address) {
        let base_low = addr.base.low3();
        let need_sib = base_low == 4;
        let rm = if need_sib { 4 } else { base_low };
        let (mode, disp8) = if addr.disp == 0 && base_low != 5 {
            (0b00, None)
        } else if let Ok(d) = i8::try_from(addr.disp) {
            (0b01, Some(d))
        } else {
            (0b10, None)
        };
        self.buf.emit_u8(mode << 6 | (reg & 7) << 3 | rm);
        if need_sib {
            // scale=1, no index, base in the SIB base field.
            self.buf.emit_u8(0b00_100_000 | base_low);
        }
        match (mode, disp8) {
            (0b01, Some(d)) => self.buf.emit_u8(d as u8),
            (0b10, _) => self.buf.emit_u32(addr.disp as u32),
            _ => {}
        }
    }

    #[inline]
    fn modrm_reg(&mut self, reg: u8, rm: Reg) {
        self.buf.emit_u8(0b11 << 6 | (reg & 7) << 3 | rm.low3());
    }

    // ---- stack and control --------------------------------------------

    pub fn push(&mut self, reg: Reg) {
        if reg.is_extended() {
            self.buf.emit_u8(0x41);
        }
        self.buf.emit_u8(0x50 + reg.low3());
    }

    pub fn pop(&mut self, reg: Reg) {
        if reg.is_extended() {
            self.buf.emit_u8(0x41);
        }
        self.buf.emit_u8(0x58 + reg.low3());
    }

    pub fn ret(&mut self) {
        self.buf.emit_u8(0xC3);
    }

    /// `call reg` (used with [`Assembler::mov_ri64`] to reach an absolute
    /// helper address).
    pub fn call(&mut self, reg: Reg) {
        if reg.is_extended() {
            self.buf.emit_u8(0x41);
        }
        self.buf.emit_u8(0xFF);
        self.modrm_reg(2, reg);
    }

    /// Unconditional `jmp rel32` with an unresolved displacement.
    pub fn jmp(&mut self) -> Jump {
        self.buf.emit_u8(0xE9);
        self.buf.reserve_rel32()
    }

    /// Conditional `jcc rel32` with an unresolved displacement.
    pub fn jcc(&mut self, cc: Condition) -> Jump {
        self.buf.emit_u8(0x0F);
        self.buf.emit_u8(0x80 + cc as u8);
        self.buf.reserve_rel32()
    }

    // ---- 64-bit moves and address arithmetic --------------------------

    /// `mov dst, src` (64-bit).
    pub fn mov_rr(&mut self, dst: Reg, src: Reg) {
        self.rex(true, src as u8, dst);
        self.buf.emit_u8(0x89);
        self.modrm_reg(src as u8, dst);
    }

    /// `mov dst, imm64`.
    pub fn mov_ri64(&mut self, dst: Reg, imm: u64) {
        self.rex(true, 0, dst);
        self.buf.emit_u8(0xB8 + dst.low3());
        self.buf.emit_u64(imm);
    }

    /// `mov dst, [addr]` (64-bit load).
    pub fn load(&mut self, dst: Reg, addr: Address) {
        self.rex(true, dst as u8, addr.base);
        self.buf.emit_u8(0x8B);
        self.modrm_mem(dst as u8, addr);
    }

    /// `mov [addr], src` (64-bit store).
    pub fn store(&mut self, addr: Address, src: Reg) {
        self.rex(true, src as u8, addr.base);
        self.buf.emit_u8(0x89);
        self.modrm_mem(src as u8, addr);
    }

    /// `lea dst, [addr]`.
    pub fn lea(&mut self, dst: Reg, addr: Address) {
        self.rex(true, dst as u8, addr.base);
        self.buf.emit_u8(0x8D);
        self.modrm_mem(dst as u8, addr);
    }

    /// `add reg, imm32` (64-bit, sign-extended immediate).
    pub fn add_ri(&mut self, reg: Reg, imm: i32) {
        self.alu64_ri(0, reg, imm);
    }

    /// `sub reg, imm32` (64-bit, sign-extended immediate).
    pub fn sub_ri(&mut self, reg: Reg, imm: i32) {
        self.alu64_ri(5, reg, imm);
    }

    /// `xor reg, reg` (64-bit), the canonical zeroing idiom.
    pub fn zero(&mut self, reg: Reg) {
        self.rex(true, reg as u8, reg);
        self.buf.emit_u8(0x31);
        self.modrm_reg(reg as u8, reg);
    }

    fn alu64_ri(&mut self, ext: u8, reg: Reg, imm: i32) {
        self.rex(true, 0, reg);
        self.buf.emit_u8(0x81);
        self.modrm_reg(ext, reg);
        self.buf.emit_u32(imm as u32);
    }

    // ---- 32-bit moves -------------------------------------------------

    /// `mov dst, src` (32-bit).
    pub fn mov32_rr(&mut self, dst: Reg, src: Reg) {
        self.rex(false, src as u8, dst);
        self.buf.emit_u8(0x89);
        self.modrm_reg(src as u8, dst);
    }

    /// `mov dst, imm32` (zero-extends into the full register).
    pub fn mov32_ri(&mut self, dst: Reg, imm: u32) {
        self.rex(false, 0, dst);
        self.buf.emit_u8(0xB8 + dst.low3());
        self.buf.emit_u32(imm);
    }

    /// `mov dst, [addr]` (32-bit load).
    pub fn load32(&mut self, dst: Reg, addr: Address) {
        self.rex(false, dst as u8, addr.base);
        self.buf.emit_u8(0x8B);
        self.modrm_mem(dst as u8, addr);
    }

    /// `mov [addr], src` (32-bit store).
    pub fn store32(&mut self, addr: Address, src: Reg) {
        self.rex(false, src as u8, addr.base);
        self.buf.emit_u8(0x89);
        self.modrm_mem(src as u8, addr);
    }

    /// `mov dword [addr], imm32`.
    pub fn store32_imm(&mut self, addr: Address, imm: u32) {
        self.rex(false, 0, addr.base);
        self.buf.emit_u8(0xC7);
        self.modrm_mem(0, addr);
        self.buf.emit_u32(imm);
    }

    // ---- 32-bit ALU (integer fast path) -------------------------------

    /// `add dst, [addr]`; overflow is observable through [`Condition::Overflow`].
    pub fn add32_rm(&mut self, dst: Reg, addr: Address) {
        self.op32_rm(0x03, dst, addr);
    }

    pub fn add32_ri(&mut self, dst: Reg, imm: i32) {
        self.alu32_ri(0, dst, imm);
    }

    pub fn sub32_rm(&mut self, dst: Reg, addr: Address) {
        self.op32_rm(0x2B, dst, addr);
    }

    pub fn sub32_ri(&mut self, dst: Reg, imm: i32) {
        self.alu32_ri(5, dst, imm);
    }

    pub fn and32_rm(&mut self, dst: Reg, addr: Address) {
        self.op32_rm(0x23, dst, addr);
    }

    pub fn and32_ri(&mut self, dst: Reg, imm: i32) {
        self.alu32_ri(4, dst, imm);
    }

    pub fn or32_rm(&mut self, dst: Reg, addr: Address) {
        self.op32_rm(0x0B, dst, addr);
    }

    pub fn or32_ri(&mut self, dst: Reg, imm: i32) {
        self.alu32_ri(1, dst, imm);
    }

    pub fn xor32_rm(&mut self, dst: Reg, addr: Address) {
        self.op32_rm(0x33, dst, addr);
    }

    pub fn xor32_ri(&mut self, dst: Reg, imm: i32) {
        self.alu32_ri(6, dst, imm);
    }

    /// `imul dst, [addr]` (signed, overflow-flagging).
    pub fn imul32_rm(&mut self, dst: Reg, addr: Address) {
        self.rex(false, dst as u8, addr.base);
        self.buf.emit_u8(0x0F);
        self.buf.emit_u8(0xAF);
        self.modrm_mem(dst as u8, addr);
    }

    /// `imul dst, dst, imm32`.
    pub fn imul32_ri(&mut self, dst: Reg, imm: i32) {
        self.rex(false, dst as u8, dst);
        self.buf.emit_u8(0x69);
        self.modrm_reg(dst as u8, dst);
        self.buf.emit_u32(imm as u32);
    }

    /// `shl dst, cl`.
    pub fn shl32_cl(&mut self, dst: Reg) {
        self.shift32_cl(4, dst);
    }

    /// `sar dst, cl` (ECMAScript `>>` is an arithmetic shift).
    pub fn sar32_cl(&mut self, dst: Reg) {
        self.shift32_cl(7, dst);
    }

    /// `shl dst, imm8`.
    pub fn shl32_ri(&mut self, dst: Reg, imm: u8) {
        self.shift32_ri(4, dst, imm);
    }

    /// `sar dst, imm8`.
    pub fn sar32_ri(&mut self, dst: Reg, imm: u8) {
        self.shift32_ri(7, dst, imm);
    }

    pub fn cmp32_ri(&mut self, reg: Reg, imm: i32) {
        self.alu32_ri(7, reg, imm);
    }

    pub fn cmp32_rr(&mut self, a: Reg, b: Reg) {
        self.rex(false, b as u8, a);
        self.buf.emit_u8(0x39);
        self.modrm_reg(b as u8, a);
    }

    pub fn cmp32_rm(&mut self, reg: Reg, addr: Address) {
        self.op32_rm(0x3B, reg, addr);
    }

    /// `cmp dword [addr], imm32`.
    pub fn cmp32_mi(&mut self, addr: Address, imm: i32) {
        self.rex(false, 0, addr.base);
        self.buf.emit_u8(0x81);
        self.modrm_mem(7, addr);
        self.buf.emit_u32(imm as u32);
    }

    /// `setcc dst8` followed by a zero-extension into the 32-bit register.
    pub fn set32(&mut self, cc: Condition, dst: Reg) {
        debug_assert!(
            (dst as u8) < 4,
            "set32 is only used with the legacy byte registers"
        );
        self.buf.emit_u8(0x0F);
        self.buf.emit_u8(0x90 + cc as u8);
        self.modrm_reg(0, dst);
        // movzx dst, dst8
        self.buf.emit_u8(0x0F);
        self.buf.emit_u8(0xB6);
        self.modrm_reg(dst as u8, dst);
    }

    fn op32_rm(&mut self, opcode: u8, reg: Reg, addr: Address) {
        self.rex(false, reg as u8, addr.base);
        self.buf.emit_u8(opcode);
        self.modrm_mem(reg as u8, addr);
    }

    fn alu32_ri(&mut self, ext: u8, reg: Reg, imm: i32) {
        self.rex(false, 0, reg);
        self.buf.emit_u8(0x81);
        self.modrm_reg(ext, reg);
        self.buf.emit_u32(imm as u32);
    }

    fn shift32_cl(&mut self, ext: u8, reg: Reg) {
        self.rex(false, 0, reg);
        self.buf.emit_u8(0xD3);
        self.modrm_reg(ext, reg);
    }

    fn shift32_ri(&mut self, ext: u8, reg: Reg, imm: u8) {
        self.rex(false, 0, reg);
        self.buf.emit_u8(0xC1);
        self.modrm_reg(ext, reg);
        self.buf.emit_u8(imm);
    }

    // ---- SSE2 doubles -------------------------------------------------

    /// `movsd xmm, [addr]`.
    pub fn movsd_load(&mut self, dst: Xmm, addr: Address) {
        self.buf.emit_u8(0xF2);
        self.rex(false, dst as u8, addr.base);
        self.buf.emit_u8(0x0F);
        self.buf.emit_u8(0x10);
        self.modrm_mem(dst as u8, addr);
    }

    /// `movsd [addr], xmm`.
    pub fn movsd_store(&mut self, addr: Address, src: Xmm) {
        self.buf.emit_u8(0xF2);
        self.rex(false, src as u8, addr.base);
        self.buf.emit_u8(0x0F);
        self.buf.emit_u8(0x11);
        self.modrm_mem(src as u8, addr);
    }

    pub fn addsd(&mut self, dst: Xmm, src: Xmm) {
        self.sse_arith(0x58, dst, src);
    }

    pub fn subsd(&mut self, dst: Xmm, src: Xmm) {
        self.sse_arith(0x5C, dst, src);
    }

    pub fn mulsd(&mut self, dst: Xmm, src: Xmm) {
        self.sse_arith(0x59, dst, src);
    }

    pub fn divsd(&mut self, dst: Xmm, src: Xmm) {
        self.sse_arith(0x5E, dst, src);
    }

    /// `movq xmm, r64` — bitwise move of an immediate-built double.
    pub fn movq_xmm(&mut self, dst: Xmm, src: Reg) {
        self.buf.emit_u8(0x66);
        let mut rex = 0x48u8;
        if src.is_extended() {
            rex |= 0x01;
        }
        self.buf.emit_u8(rex);
        self.buf.emit_u8(0x0F);
        self.buf.emit_u8(0x6E);
        self.buf
            .emit_u8(0b11 << 6 | (dst as u8 & 7) << 3 | src.low3());
    }

    /// `ucomisd a, b` — unordered compare, sets ZF/PF/CF.
    pub fn ucomisd(&mut self, a: Xmm, b: Xmm) {
        self.buf.emit_u8(0x66);
        self.buf.emit_u8(0x0F);
        self.buf.emit_u8(0x2E);
        self.buf
            .emit_u8(0b11 << 6 | (a as u8 & 7) << 3 | (b as u8 & 7));
    }

    fn sse_arith(&mut self, opcode: u8, dst: Xmm, src: Xmm) {
        self.buf.emit_u8(0xF2);
        self.buf.emit_u8(0x0F);
        self.buf.emit_u8(opcode);
        self.buf
            .emit_u8(0b11 << 6 | (dst as u8 & 7) << 3 | (src as u8 & 7));
    }

    // ---- helper calls -------------------------------------------------

    /// Call an absolute address through a scratch register:
    /// `mov scratch, imm64; call scratch`.
    pub fn call_absolute(&mut self, scratch: Reg, target: usize) {
        self.mov_ri64(scratch, target as u64);
        self.call(scratch);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emitted(f: impl FnOnce(&mut Assembler)) -> Vec<u8> {
        let mut asm = Assembler::new();
        f(&mut asm);
        asm.into_buffer().bytes().to_vec()
    }

    #[test]
    fn prologue_encodings() {
        assert_eq!(emitted(|a| a.push(Reg::Rbp)), [0x55]);
        assert_eq!(emitted(|a| a.push(Reg::R14)), [0x41, 0x56]);
        assert_eq!(emitted(|a| a.mov_rr(Reg::Rbp, Reg::Rsp)), [0x48, 0x89, 0xE5]);
        assert_eq!(emitted(|a| a.mov_rr(Reg::R14, Reg::Rdi)), [0x49, 0x89, 0xFE]);
        assert_eq!(
            emitted(|a| a.sub_ri(Reg::Rsp, 0x40)),
            [0x48, 0x81, 0xEC, 0x40, 0x00, 0x00, 0x00]
        );
        assert_eq!(emitted(|a| a.ret()), [0xC3]);
    }

    #[test]
    fn rsp_base_needs_sib() {
        assert_eq!(
            emitted(|a| a.lea(Reg::Rdi, Address::new(Reg::Rsp, 8))),
            [0x48, 0x8D, 0x7C, 0x24, 0x08]
        );
        assert_eq!(
            emitted(|a| a.lea(Reg::Rdi, Address::new(Reg::Rsp, 0))),
            [0x48, 0x8D, 0x3C, 0x24]
        );
    }

    #[test]
    fn rbp_base_needs_displacement() {
        // [rbp] has no mod=00 form; a zero disp8 is required.
        assert_eq!(
            emitted(|a| a.load(Reg::Rax, Address::new(Reg::Rbp, 0))),
            [0x48, 0x8B, 0x45, 0x00]
        );
        assert_eq!(
            emitted(|a| a.load(Reg::Rax, Address::new(Reg::R13, 0))),
            [0x49, 0x8B, 0x45, 0x00]
        );
    }

    #[test]
    fn wide_displacements_use_disp32() {
        assert_eq!(
            emitted(|a| a.load(Reg::R15, Address::new(Reg::R14, 0x1234))),
            [0x4D, 0x8B, 0xBE, 0x34, 0x12, 0x00, 0x00]
        );
    }

    #[test]
    fn absolute_call_sequence() {
        assert_eq!(
            emitted(|a| a.call_absolute(Reg::Rax, 0x1122334455667788)),
            [0x48, 0xB8, 0x88, 0x77, 0x66, 0x55, 0x44, 0x33, 0x22, 0x11, 0xFF, 0xD0]
        );
    }

    #[test]
    fn alu32_forms() {
        assert_eq!(
            emitted(|a| a.add32_rm(Reg::Rax, Address::new(Reg::Rdx, 0))),
            [0x03, 0x02]
        );
        assert_eq!(
            emitted(|a| a.imul32_rm(Reg::Rax, Address::new(Reg::Rdx, 0))),
            [0x0F, 0xAF, 0x02]
        );
        assert_eq!(emitted(|a| a.shl32_cl(Reg::Rax)), [0xD3, 0xE0]);
        assert_eq!(emitted(|a| a.sar32_cl(Reg::Rax)), [0xD3, 0xF8]);
        assert_eq!(
            emitted(|a| a.and32_ri(Reg::Rcx, 0x1F)),
            [0x81, 0xE1, 0x1F, 0x00, 0x00, 0x00]
        );
        assert_eq!(emitted(|a| a.mov32_rr(Reg::Rcx, Reg::Rax)), [0x89, 0xC1]);
        assert_eq!(emitted(|a| a.zero(Reg::Rsi)), [0x48, 0x31, 0xF6]);
    }

    #[test]
    fn sse_forms() {
        assert_eq!(
            emitted(|a| a.movsd_load(Xmm::Xmm0, Address::new(Reg::Rdx, 8))),
            [0xF2, 0x0F, 0x10, 0x42, 0x08]
        );
        assert_eq!(
            emitted(|a| a.addsd(Xmm::Xmm0, Xmm::Xmm1)),
            [0xF2, 0x0F, 0x58, 0xC1]
        );
        assert_eq!(
            emitted(|a| a.ucomisd(Xmm::Xmm0, Xmm::Xmm1)),
            [0x66, 0x0F, 0x2E, 0xC1]
        );
        assert_eq!(
            emitted(|a| a.movq_xmm(Xmm::Xmm0, Reg::Rax)),
            [0x66, 0x48, 0x0F, 0x6E, 0xC0]
        );
    }

    #[test]
    fn setcc_zero_extends() {
        assert_eq!(
            emitted(|a| a.set32(Condition::Equal, Reg::Rax)),
            [0x0F, 0x94, 0xC0, 0x0F, 0xB6, 0xC0]
        );
    }

    #[test]
    fn branches_link() {
        let mut asm = Assembler::new();
        let j = asm.jcc(Condition::NotEqual);
        asm.mov32_ri(Reg::Rax, 1);
        let target = asm.label();
        asm.link(j, target).unwrap();
        let bytes = asm.into_buffer().bytes().to_vec();
        assert_eq!(&bytes[..2], &[0x0F, 0x85]);
        assert_eq!(&bytes[2..6], &5i32.to_le_bytes());
    }
}
