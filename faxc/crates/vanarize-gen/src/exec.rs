//! Executable memory: page-granular allocation with a
//! configurable RW→RX protection transition. `AllocExec` maps anonymous
//! memory directly; `ProtectExec`/`FreeExec` are `libc::mprotect`/`munmap`
//! calls behind a tiny safe wrapper - the only `unsafe` in this crate that
//! isn't inside the assembler's own byte buffer.

use crate::error::{JitError, Result};
use log::{debug, trace};

/// Page size and whether to actually enforce W^X via a second `mprotect`
/// call once code emission finishes.
#[derive(Debug, Clone, Copy)]
pub struct JitConfig {
    pub page_size: usize,
    /// When `true`, `AllocExec` maps RW-only and `ProtectExec` later drops
    /// write access; when `false` (the default, simplest mode), pages are
    /// mapped RWX up front and `ProtectExec` is a no-op.
    pub enforce_w_xor_x: bool,
}

impl Default for JitConfig {
    fn default() -> Self {
        JitConfig { page_size: 4096, enforce_w_xor_x: false }
    }
}

impl JitConfig {
    pub fn validate(&self) -> Result<(), JitError> {
        if self.page_size == 0 || self.page_size % 4096 != 0 {
            return Err(JitError::Configuration("page_size must be a non-zero multiple of 4096".into()));
        }
        Ok(())
    }
}

/// An owned page-aligned executable memory region. Freed on drop via
/// `munmap`.
pub struct ExecBuffer {
    ptr: *mut u8,
    len: usize,
}

// SAFETY: the region is exclusively owned by this struct, never aliased,
// and only ever touched from the single thread that drives compilation and
// execution - there is nothing here
// that requires `Send`/`Sync` to hold for correctness, but this allocation
// outlives the function call that created it and is moved into
// `CompiledProgram`.
unsafe impl Send for ExecBuffer {}

impl ExecBuffer {
    /// `AllocExec(size)` - map at least `size` bytes, rounded up to a whole
    /// number of pages.
    pub fn alloc(size: usize, config: &JitConfig) -> Result<Self> {
        config.validate()?;
        let len = size.max(1).div_ceil(config.page_size) * config.page_size;
        let prot = if config.enforce_w_xor_x {
            libc::PROT_READ | libc::PROT_WRITE
        } else {
            libc::PROT_READ | libc::PROT_WRITE | libc::PROT_EXEC
        };
        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                len,
                prot,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            return Err(JitError::MmapFailed(len));
        }
        trace!("mapped {len} bytes of executable memory at {ptr:p}");
        Ok(ExecBuffer { ptr: ptr as *mut u8, len })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.ptr
    }

    /// Copy `code` into the region starting at byte 0. `code.len()` must not
    /// exceed the mapped length.
    pub fn write(&mut self, code: &[u8]) {
        debug_assert!(code.len() <= self.len);
        unsafe {
            std::ptr::copy_nonoverlapping(code.as_ptr(), self.ptr, code.len());
        }
    }

    /// `ProtectExec` - the RW→RX transition. A no-op unless
    /// `JitConfig::enforce_w_xor_x` is set.
    pub fn protect_exec(&mut self, config: &JitConfig) -> Result<()> {
        if !config.enforce_w_xor_x {
            return Ok(());
        }
        let rc = unsafe { libc::mprotect(self.ptr as *mut _, self.len, libc::PROT_READ | libc::PROT_EXEC) };
        if rc != 0 {
            return Err(JitError::MprotectFailed(self.len));
        }
        debug!("transitioned {} bytes from RW to RX", self.len);
        Ok(())
    }

    /// Address of the byte at `offset` within the mapped region, as an
    /// absolute pointer suitable for baking into emitted call sites.
    pub fn address_of(&self, offset: usize) -> u64 {
        (self.ptr as usize + offset) as u64
    }

    /// Interpret the function starting at `offset` as the program's
    /// nullary entry point.
    ///
    /// # Safety
    /// `offset` must point at machine code that was compiled for this ABI
    /// and that has already been written into this buffer.
    pub unsafe fn entry_fn(&self, offset: usize) -> extern "C" fn() -> u64 {
        std::mem::transmute::<*const u8, extern "C" fn() -> u64>(self.ptr.add(offset))
    }
}

impl Drop for ExecBuffer {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.ptr as *mut _, self.len);
        }
    }
}
