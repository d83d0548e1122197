use crate::{
    Result,
    error::protection_error,
    mem::{CodeMemory, ProtFlags},
};
use core::{ffi::c_void, ptr::NonNull};
use libc::{_SC_PAGESIZE, mprotect, sysconf};

/// An implementation of the CodeMemory trait
pub struct DefaultCodeMemory;

const FALLBACK_PAGE_SIZE: usize = 4096;

impl CodeMemory for DefaultCodeMemory {
    fn page_size() -> usize {
        let size = unsafe { sysconf(_SC_PAGESIZE) };
        if size <= 0 {
            return FALLBACK_PAGE_SIZE;
        }
        size as usize
    }

    unsafe fn mprotect(addr: NonNull<c_void>, len: usize, prot: ProtFlags) -> Result<()> {
        let res = unsafe { mprotect(addr.as_ptr(), len, prot.bits()) };
        if res != 0 {
            let code = std::io::Error::last_os_error().raw_os_error().unwrap_or(0);
            return Err(protection_error(
                "unable to make method memory readable and writable",
                code,
            ));
        }
        #[cfg(feature = "log")]
        log::trace!(
            "mprotect {:p}, length: {}, flags: {:?}",
            addr.as_ptr(),
            len,
            prot
        );
        Ok(())
    }
}
