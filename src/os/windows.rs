use crate::{
    Result,
    error::protection_error,
    mem::{CodeMemory, ProtFlags},
};
use core::{ffi::c_void, mem::MaybeUninit, ptr::NonNull};
use windows_sys::Win32::{
    Foundation::GetLastError,
    System::{
        Memory::{
            PAGE_EXECUTE, PAGE_EXECUTE_READ, PAGE_EXECUTE_READWRITE, PAGE_NOACCESS,
            PAGE_PROTECTION_FLAGS, PAGE_READONLY, PAGE_READWRITE, VirtualProtect,
        },
        SystemInformation::{GetSystemInfo, SYSTEM_INFO},
    },
};

/// An implementation of the CodeMemory trait
pub struct DefaultCodeMemory;

fn prot_win(prot: ProtFlags) -> PAGE_PROTECTION_FLAGS {
    match prot.bits() {
        0 => PAGE_NOACCESS,
        1 => PAGE_READONLY,
        0b10 | 0b11 => PAGE_READWRITE,
        0b100 => PAGE_EXECUTE,
        0b101 => PAGE_EXECUTE_READ,
        // Write-only execute pages do not exist; widen to read-write-execute.
        _ => PAGE_EXECUTE_READWRITE,
    }
}

impl CodeMemory for DefaultCodeMemory {
    fn page_size() -> usize {
        let mut info = MaybeUninit::<SYSTEM_INFO>::uninit();
        unsafe {
            GetSystemInfo(info.as_mut_ptr());
            info.assume_init().dwPageSize as usize
        }
    }

    unsafe fn mprotect(addr: NonNull<c_void>, len: usize, prot: ProtFlags) -> Result<()> {
        let mut old: PAGE_PROTECTION_FLAGS = 0;
        if unsafe { VirtualProtect(addr.as_ptr(), len, prot_win(prot), &mut old) } == 0 {
            let code = unsafe { GetLastError() } as i32;
            return Err(protection_error(
                "unable to make method memory readable and writable",
                code,
            ));
        }
        #[cfg(feature = "log")]
        log::trace!(
            "VirtualProtect {:p}, length: {}, flags: {:?}, previous: {:#x}",
            addr.as_ptr(),
            len,
            prot,
            old
        );
        Ok(())
    }
}
