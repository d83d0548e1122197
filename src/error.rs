use alloc::borrow::Cow;
use core::fmt::{Debug, Display};

/// Error types used throughout the `redirect` library.
/// These errors represent the failure conditions that can occur while
/// resolving, patching, and restoring function entry points.
#[derive(Debug)]
pub enum Error {
    /// A redirection could not be constructed.
    ///
    /// This error typically indicates that:
    /// * The original and the replacement resolve to the same address
    /// * The two entry points are closer together than the patch size
    /// * The jump target cannot be expressed by the selected encoding
    Construction {
        /// A descriptive message about the construction error.
        msg: Cow<'static, str>,
    },

    /// A function descriptor could not be resolved to an entry address.
    ///
    /// Raised for null handles and for materializers that fail or
    /// return a null address.
    Resolve {
        /// A descriptive message about the resolution error.
        msg: Cow<'static, str>,
    },

    /// The operating system refused to make a code page writable.
    Protection {
        /// A descriptive message about the protection error.
        msg: Cow<'static, str>,
        /// The platform error code (`errno` or `GetLastError`).
        code: i32,
    },

    /// Re-applying the patch after invoking the original failed.
    ///
    /// The entry point is left holding the original bytes.
    Restore {
        /// A descriptive message about the restoration error.
        msg: Cow<'static, str>,
        /// The platform error code of the underlying protection failure.
        code: i32,
    },

    /// An operation was invoked on a disposed redirection.
    Usage {
        /// A descriptive message about the misuse.
        msg: Cow<'static, str>,
    },

    /// An error occurred in a user-defined callback, such as a materializer.
    Custom {
        /// A descriptive message about the custom error.
        msg: Cow<'static, str>,
    },
}

impl Error {
    /// Returns the platform error code carried by protection and restoration failures.
    pub fn os_code(&self) -> Option<i32> {
        match self {
            Error::Protection { code, .. } | Error::Restore { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::Construction { msg } => write!(f, "Construction error: {msg}"),
            Error::Resolve { msg } => write!(f, "Resolve error: {msg}"),
            Error::Protection { msg, code } => {
                write!(f, "Memory protection error: {msg} (error code: {code})")
            }
            Error::Restore { msg, code } => {
                write!(f, "Patch restoration error: {msg} (error code: {code})")
            }
            Error::Usage { msg } => write!(f, "Usage error: {msg}"),
            Error::Custom { msg } => write!(f, "Custom error: {msg}"),
        }
    }
}

impl core::error::Error for Error {}

#[cold]
#[inline(never)]
pub(crate) fn construction_error(msg: impl Into<Cow<'static, str>>) -> Error {
    Error::Construction { msg: msg.into() }
}

#[cold]
#[inline(never)]
pub(crate) fn resolve_error(msg: impl Into<Cow<'static, str>>) -> Error {
    Error::Resolve { msg: msg.into() }
}

/// Creates a protection error with the specified message and platform error code.
///
/// Custom [`CodeMemory`](crate::mem::CodeMemory) backends use this to report
/// a refused protection change.
#[cold]
#[inline(never)]
pub fn protection_error(msg: impl Into<Cow<'static, str>>, code: i32) -> Error {
    Error::Protection {
        msg: msg.into(),
        code,
    }
}

#[cold]
#[inline(never)]
pub(crate) fn restore_error(cause: Error) -> Error {
    let code = cause.os_code().unwrap_or(0);
    Error::Restore {
        msg: alloc::format!("unable to re-apply the patch after invoking the original: {cause}")
            .into(),
        code,
    }
}

#[cold]
#[inline(never)]
pub(crate) fn usage_error(msg: impl Into<Cow<'static, str>>) -> Error {
    Error::Usage { msg: msg.into() }
}

/// Creates a custom error with the specified message.
///
/// Materializers use this to report that the host could not compile a function.
#[cold]
#[inline(never)]
pub fn custom_error(msg: impl Into<Cow<'static, str>>) -> Error {
    Error::Custom { msg: msg.into() }
}
