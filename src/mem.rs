//! Raw access to executable memory.
//!
//! This module is the only place that dereferences code addresses. The rest
//! of the crate goes through [`read_bytes`], [`write_bytes`], and
//! [`with_writable_code`].
//!
//! # Safety
//! Writing into executable memory changes the behaviour of every thread that
//! runs through it. Callers must ensure the address points at code they own
//! the right to patch and that `len` bytes from it belong to that code.

pub use crate::os::DefaultCodeMemory;

use crate::{Result, arch::Patch};
use bitflags::bitflags;
use core::{
    ffi::{c_int, c_void},
    fmt::Debug,
    ptr::NonNull,
};

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    /// Memory protection flags for controlling access permissions.
    pub struct ProtFlags: c_int {
        /// No access allowed.
        const PROT_NONE = 0;

        /// Allow reading from the memory region.
        const PROT_READ = 1;

        /// Allow writing to the memory region.
        const PROT_WRITE = 2;

        /// Allow executing code in the memory region.
        const PROT_EXEC = 4;
    }
}

/// A trait for changing the protection of code pages.
///
/// The default implementation for the running platform is
/// [`DefaultCodeMemory`]. Embedders that need to route protection changes
/// elsewhere (a sandbox, a debugger, a test double) implement this trait and
/// pass the type to [`Redirection`](crate::Redirection).
///
/// # Example
/// ```rust,ignore
/// struct MyCodeMemory;
///
/// impl CodeMemory for MyCodeMemory {
///     fn page_size() -> usize {
///         4096
///     }
///
///     unsafe fn mprotect(addr: NonNull<c_void>, len: usize, prot: ProtFlags) -> Result<()> {
///         // Platform-specific implementation
///         todo!()
///     }
/// }
/// ```
pub trait CodeMemory {
    /// Returns the granularity at which protection can be changed.
    fn page_size() -> usize;

    /// Changes the protection of a memory region.
    ///
    /// # Arguments
    /// * `addr` - Pointer to the start of the region (page-aligned).
    /// * `len` - Size of the region in bytes (a multiple of the page size).
    /// * `prot` - New protection flags to apply.
    ///
    /// # Returns
    /// `Ok(())` on success, or an [`Error::Protection`](crate::Error::Protection)
    /// carrying the platform error code.
    ///
    /// # Safety
    /// Changing permissions affects running code. `addr` must be page-aligned.
    unsafe fn mprotect(addr: NonNull<c_void>, len: usize, prot: ProtFlags) -> Result<()>;
}

/// The address of a function's first instruction.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CodePtr(NonNull<u8>);

// A code address is plain data; all access goes through this module.
unsafe impl Send for CodePtr {}
unsafe impl Sync for CodePtr {}

impl CodePtr {
    /// Creates a code pointer, returning `None` for a null address.
    #[inline]
    pub fn new(addr: usize) -> Option<Self> {
        NonNull::new(addr as *mut u8).map(Self)
    }

    /// Returns the address.
    #[inline]
    pub fn addr(self) -> usize {
        self.0.as_ptr() as usize
    }

    /// Returns the address as a raw pointer.
    #[inline]
    pub fn as_ptr(self) -> *const () {
        self.0.as_ptr() as *const ()
    }

    /// Absolute distance in bytes between two code pointers.
    #[inline]
    pub fn distance(self, other: CodePtr) -> usize {
        self.addr().abs_diff(other.addr())
    }
}

impl Debug for CodePtr {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "CodePtr({:#x})", self.addr())
    }
}

/// Copies `len` bytes starting at `addr`.
///
/// # Safety
/// `addr..addr + len` must be readable.
#[inline]
pub unsafe fn read_bytes(addr: CodePtr, len: usize) -> Patch {
    let mut patch = Patch::zeroed(len);
    unsafe {
        core::ptr::copy_nonoverlapping(addr.0.as_ptr(), patch.as_mut_slice().as_mut_ptr(), len);
    }
    patch
}

/// Copies `bytes` to `addr`.
///
/// # Safety
/// `addr..addr + bytes.len()` must be writable, which for code means it was
/// unlocked by [`with_writable_code`].
#[inline]
pub unsafe fn write_bytes(addr: CodePtr, bytes: &[u8]) {
    unsafe {
        core::ptr::copy_nonoverlapping(bytes.as_ptr(), addr.0.as_ptr(), bytes.len());
    }
}

/// Returns the page-aligned region covering `addr..addr + len`.
#[inline]
pub fn page_span(addr: usize, len: usize, page_size: usize) -> (usize, usize) {
    debug_assert!(page_size.is_power_of_two());
    let start = addr & !(page_size - 1);
    let end = (addr + len.max(1) + page_size - 1) & !(page_size - 1);
    (start, end - start)
}

/// Makes the pages covering `addr..addr + len` readable, writable, and
/// executable, then runs `body`.
///
/// The protection change is attempted exactly once. The previous protection
/// is not restored: code pages stay writable once touched.
///
/// # Safety
/// `addr` must point into mapped code.
pub unsafe fn with_writable_code<M: CodeMemory, R>(
    addr: CodePtr,
    len: usize,
    body: impl FnOnce() -> R,
) -> Result<R> {
    let (start, size) = page_span(addr.addr(), len, M::page_size());
    // Page zero is never mapped executable.
    let page = NonNull::new(start as *mut c_void)
        .ok_or_else(|| crate::error::protection_error("cannot unlock page zero", 0))?;
    unsafe {
        M::mprotect(
            page,
            size,
            ProtFlags::PROT_READ | ProtFlags::PROT_WRITE | ProtFlags::PROT_EXEC,
        )?;
    }
    #[cfg(feature = "log")]
    log::trace!("Unlocked code pages [{:#x}, {:#x})", start, start + size);
    Ok(body())
}
