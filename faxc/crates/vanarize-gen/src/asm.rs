//! Byte-level x86-64 instruction encoder: MOV / ADD / SUB /
//! IMUL / INC / DEC / AND / PUSH / POP / CMP / Jcc / CALL / RET, with
//! forward-jump patching. No disassembler, no LLVM, no external codegen
//! backend - every byte emitted here is hand-computed ModR/M and REX.W.

use crate::error::{AsmError, Result};

/// One of the 16 general-purpose 64-bit registers. Only
/// `Rax..Rdi` (encodings 0-7) can actually be emitted by this assembler;
/// the rest exist so the register set is complete even though encoding one
/// of them is a hard error, since R8-R15 need REX.B/REX.R prefixes this
/// encoder doesn't implement yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
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
    fn code(self) -> Result<u8> {
        let n = self as u8;
        if n >= 8 {
            Err(AsmError::ExtendedRegisterUnsupported(n))
        } else {
            Ok(n)
        }
    }
}

/// Conditions this assembler can branch on: `JE`/`JNE`/`JAE`/`JGE`/`JL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cond {
    Eq,
    NotEq,
    AboveEq,
    GreaterEq,
    Less,
}

impl Cond {
    fn opcode(self) -> u8 {
        match self {
            Cond::Eq => 0x84,
            Cond::NotEq => 0x85,
            Cond::AboveEq => 0x83,
            Cond::GreaterEq => 0x8D,
            Cond::Less => 0x8C,
        }
    }
}

const REX_W: u8 = 0x48;

fn modrm(mode: u8, reg: u8, rm: u8) -> u8 {
    (mode << 6) | (reg << 3) | rm
}

/// A growable byte buffer with a write cursor, addressed by byte offset
/// from its own start - final addresses aren't known until the whole
/// program has been assembled and copied into an executable page (see
/// `codegen.rs`'s relocation pass).
pub struct Assembler {
    buf: Vec<u8>,
}

impl Assembler {
    pub fn new() -> Self {
        Assembler { buf: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.buf
    }

    fn push_byte(&mut self, b: u8) {
        self.buf.push(b);
    }

    fn push_bytes(&mut self, bs: &[u8]) {
        self.buf.extend_from_slice(bs);
    }

    /// Reserve 4 bytes of zero and return the offset to write them at later
    /// with [`Assembler::patch32`] - used for forward jumps.
    fn reserve32(&mut self) -> usize {
        let at = self.buf.len();
        self.push_bytes(&[0, 0, 0, 0]);
        at
    }

    /// Append `data` verbatim as inert bytes (not instructions) and return
    /// the offset it starts at. Used to embed string-literal payloads
    /// alongside the code that references them.
    pub fn emit_data(&mut self, data: &[u8]) -> usize {
        let at = self.buf.len();
        self.push_bytes(data);
        at
    }

    // -- MOV ---------------------------------------------------------------

    pub fn mov_reg_imm64(&mut self, dst: Reg, imm: u64) -> Result<()> {
        let d = dst.code()?;
        self.push_byte(REX_W);
        self.push_byte(0xB8 + d);
        self.push_bytes(&imm.to_le_bytes());
        Ok(())
    }

    /// Returns the buffer offset of the 8-byte immediate field, for callers
    /// that need to patch it in once a final address is known (function
    /// calls, string-literal data pointers).
    pub fn mov_reg_imm64_patchable(&mut self, dst: Reg, placeholder: u64) -> Result<usize> {
        let d = dst.code()?;
        self.push_byte(REX_W);
        self.push_byte(0xB8 + d);
        let at = self.buf.len();
        self.push_bytes(&placeholder.to_le_bytes());
        Ok(at)
    }

    pub fn mov_reg_reg(&mut self, dst: Reg, src: Reg) -> Result<()> {
        let (d, s) = (dst.code()?, src.code()?);
        self.push_byte(REX_W);
        self.push_byte(0x89);
        self.push_byte(modrm(0b11, s, d));
        Ok(())
    }

    pub fn mov_reg_mem(&mut self, dst: Reg, base: Reg, disp32: i32) -> Result<()> {
        let (d, b) = (dst.code()?, base.code()?);
        self.push_byte(REX_W);
        self.push_byte(0x8B);
        self.push_byte(modrm(0b10, d, b));
        self.push_bytes(&disp32.to_le_bytes());
        Ok(())
    }

    pub fn mov_mem_reg(&mut self, base: Reg, disp32: i32, src: Reg) -> Result<()> {
        let (b, s) = (base.code()?, src.code()?);
        self.push_byte(REX_W);
        self.push_byte(0x89);
        self.push_byte(modrm(0b10, s, b));
        self.push_bytes(&disp32.to_le_bytes());
        Ok(())
    }

    // -- stack ---------------------------------------------------------------

    pub fn push(&mut self, reg: Reg) -> Result<()> {
        let r = reg.code()?;
        self.push_byte(0x50 + r);
        Ok(())
    }

    pub fn pop(&mut self, reg: Reg) -> Result<()> {
        let r = reg.code()?;
        self.push_byte(0x58 + r);
        Ok(())
    }

    // -- arithmetic ---------------------------------------------------------------

    pub fn add_reg_reg(&mut self, dst: Reg, src: Reg) -> Result<()> {
        let (d, s) = (dst.code()?, src.code()?);
        self.push_byte(REX_W);
        self.push_byte(0x01);
        self.push_byte(modrm(0b11, s, d));
        Ok(())
    }

    /// `ADD r64, imm32`, sign-extended - also how negative displacements of
    /// RSP are expressed, since the instruction set has no dedicated
    /// `SUB r64, imm32`.
    pub fn add_reg_imm32(&mut self, dst: Reg, imm: i32) -> Result<()> {
        if imm == 1 {
            return self.inc_reg(dst);
        }
        if imm == -1 {
            return self.dec_reg(dst);
        }
        let d = dst.code()?;
        self.push_byte(REX_W);
        self.push_byte(0x81);
        self.push_byte(modrm(0b11, 0, d));
        self.push_bytes(&imm.to_le_bytes());
        Ok(())
    }

    pub fn sub_reg_reg(&mut self, dst: Reg, src: Reg) -> Result<()> {
        let (d, s) = (dst.code()?, src.code()?);
        self.push_byte(REX_W);
        self.push_byte(0x29);
        self.push_byte(modrm(0b11, s, d));
        Ok(())
    }

    pub fn imul_reg_reg(&mut self, dst: Reg, src: Reg) -> Result<()> {
        let (d, s) = (dst.code()?, src.code()?);
        self.push_byte(REX_W);
        self.push_byte(0x0F);
        self.push_byte(0xAF);
        self.push_byte(modrm(0b11, d, s));
        Ok(())
    }

    pub fn inc_reg(&mut self, reg: Reg) -> Result<()> {
        let r = reg.code()?;
        self.push_byte(REX_W);
        self.push_byte(0xFF);
        self.push_byte(modrm(0b11, 0, r));
        Ok(())
    }

    pub fn dec_reg(&mut self, reg: Reg) -> Result<()> {
        let r = reg.code()?;
        self.push_byte(REX_W);
        self.push_byte(0xFF);
        self.push_byte(modrm(0b11, 1, r));
        Ok(())
    }

    pub fn and_reg_reg(&mut self, dst: Reg, src: Reg) -> Result<()> {
        let (d, s) = (dst.code()?, src.code()?);
        self.push_byte(REX_W);
        self.push_byte(0x21);
        self.push_byte(modrm(0b11, s, d));
        Ok(())
    }

    // -- comparison & control flow ---------------------------------------------------------------

    /// `CMP dst, imm32` - sets flags from `dst - imm32`.
    pub fn cmp_reg_imm32(&mut self, dst: Reg, imm: i32) -> Result<()> {
        let d = dst.code()?;
        self.push_byte(REX_W);
        self.push_byte(0x81);
        self.push_byte(modrm(0b11, 7, d));
        self.push_bytes(&imm.to_le_bytes());
        Ok(())
    }

    /// `CMP a, b` - sets flags from `a - b`.
    pub fn cmp_reg_reg(&mut self, a: Reg, b: Reg) -> Result<()> {
        let (ra, rb) = (a.code()?, b.code()?);
        self.push_byte(REX_W);
        self.push_byte(0x39);
        self.push_byte(modrm(0b11, rb, ra));
        Ok(())
    }

    pub fn call_reg(&mut self, reg: Reg) -> Result<()> {
        let r = reg.code()?;
        self.push_byte(0xFF);
        self.push_byte(modrm(0b11, 2, r));
        Ok(())
    }

    pub fn ret(&mut self) {
        self.push_byte(0xC3);
    }

    /// Emit an unconditional forward jump with a placeholder target,
    /// returning the offset of the `rel32` field for later patching.
    pub fn jmp(&mut self) -> usize {
        self.push_byte(0xE9);
        self.reserve32()
    }

    /// Emit a conditional forward jump, returning the `rel32` field offset.
    pub fn jcc(&mut self, cond: Cond) -> usize {
        self.push_byte(0x0F);
        self.push_byte(cond.opcode());
        self.reserve32()
    }

    /// Back-patch a previously reserved 32-bit relative field so the jump
    /// at `patch_offset` lands at `target_offset`. `target_offset` must be the offset of the instruction
    /// the jump should land on.
    pub fn patch32(&mut self, patch_offset: usize, target_offset: usize) -> Result<()> {
        if patch_offset + 4 > self.buf.len() {
            return Err(AsmError::InvalidPatchOffset(patch_offset, self.buf.len()));
        }
        let rel = target_offset as i64 - (patch_offset as i64 + 4);
        let rel = rel as i32;
        self.buf[patch_offset..patch_offset + 4].copy_from_slice(&rel.to_le_bytes());
        Ok(())
    }

    /// Back-patch an 8-byte absolute address into a field reserved by
    /// [`Assembler::mov_reg_imm64_patchable`] or [`Assembler::emit_data`]'s
    /// caller. Not part of `Patch32` (which only covers
    /// relative jump fixups); this is the code generator's own relocation
    /// primitive for absolute call targets and data pointers once the
    /// final executable page address is known.
    pub fn patch64(&mut self, patch_offset: usize, value: u64) -> Result<()> {
        if patch_offset + 8 > self.buf.len() {
            return Err(AsmError::InvalidPatchOffset(patch_offset, self.buf.len()));
        }
        self.buf[patch_offset..patch_offset + 8].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }
}

impl Default for Assembler {
    fn default() -> Self {
        Self::new()
    }
}
