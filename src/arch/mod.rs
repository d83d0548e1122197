//! Jump encodings for the architectures supported by the redirector.
//!
//! Every encoding is an absolute transfer: the bytes do not depend on the
//! address they are written to, so one encoded patch is valid at any entry
//! point.
use crate::{Result, error::construction_error};
use core::{fmt::Debug, ops::Deref};

mod x86;
mod x86_64;

/// Largest patch produced by any encoding.
pub const MAX_PATCH_SIZE: usize = x86_64::JMP_ABS_SIZE;

/// Size of the patch written by the host encoding.
pub const PATCH_SIZE: usize = JumpEncoding::HOST.size();

/// The closed set of absolute jump encodings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JumpEncoding {
    /// `mov rax, imm64; jmp rax` (12 bytes, 64-bit hosts).
    MovRaxJmpRax,
    /// `push imm32; ret` (6 bytes, 32-bit hosts).
    PushRet,
}

impl JumpEncoding {
    /// The encoding selected for the host pointer width.
    #[cfg(target_pointer_width = "64")]
    pub const HOST: JumpEncoding = JumpEncoding::MovRaxJmpRax;

    /// The encoding selected for the host pointer width.
    #[cfg(not(target_pointer_width = "64"))]
    pub const HOST: JumpEncoding = JumpEncoding::PushRet;

    /// Number of bytes this encoding writes.
    #[inline]
    pub const fn size(self) -> usize {
        match self {
            JumpEncoding::MovRaxJmpRax => x86_64::JMP_ABS_SIZE,
            JumpEncoding::PushRet => x86::PUSH_RET_SIZE,
        }
    }

    /// Encodes an unconditional transfer to `target`.
    ///
    /// Fails when `target` does not fit in the encoding's immediate.
    pub fn encode(self, target: usize) -> Result<Patch> {
        match self {
            JumpEncoding::MovRaxJmpRax => Ok(x86_64::jmp_abs(target as u64)),
            JumpEncoding::PushRet => u32::try_from(target).map(x86::push_ret).map_err(|_| {
                construction_error(alloc::format!(
                    "jump target {target:#x} does not fit in a 32-bit push immediate"
                ))
            }),
        }
    }
}

/// Encodes a jump to `target` with the host encoding.
#[inline]
pub fn encode_jump(target: usize) -> Result<Patch> {
    JumpEncoding::HOST.encode(target)
}

/// A fixed-capacity byte sequence written at (or read from) an entry point.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Patch {
    bytes: [u8; MAX_PATCH_SIZE],
    len: u8,
}

impl Patch {
    /// Copies `bytes` into a new patch.
    ///
    /// # Panics
    /// Panics if `bytes` is longer than [`MAX_PATCH_SIZE`].
    pub fn from_slice(bytes: &[u8]) -> Self {
        assert!(bytes.len() <= MAX_PATCH_SIZE, "patch too long");
        let mut buf = [0; MAX_PATCH_SIZE];
        buf[..bytes.len()].copy_from_slice(bytes);
        Self {
            bytes: buf,
            len: bytes.len() as u8,
        }
    }

    /// Returns the patch as a byte slice.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    #[inline]
    pub(crate) fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.bytes[..self.len as usize]
    }

    #[inline]
    pub(crate) fn zeroed(len: usize) -> Self {
        assert!(len <= MAX_PATCH_SIZE, "patch too long");
        Self {
            bytes: [0; MAX_PATCH_SIZE],
            len: len as u8,
        }
    }
}

impl Deref for Patch {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl Debug for Patch {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Patch(")?;
        for (i, byte) in self.as_slice().iter().enumerate() {
            if i != 0 {
                write!(f, " ")?;
            }
            write!(f, "{byte:02x}")?;
        }
        write!(f, ")")
    }
}
