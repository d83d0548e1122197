//! # redirect
//! Redirect calls from one compiled function to another at runtime.
//! ## Usage
//! A [`Redirection`] overwrites the entry point of an original function with
//! an absolute jump to a replacement. The redirection can be toggled with
//! [`Redirection::start`] and [`Redirection::stop`], and the unmodified
//! original stays callable through [`Redirection::invoke_original`], which is
//! how a replacement forwards to the function it replaces.
//! ## Example
//! ```no_run
//! use redirect::Redirection;
//! use std::sync::OnceLock;
//!
//! static HOOK: OnceLock<Redirection<fn(u32) -> u32>> = OnceLock::new();
//!
//! #[inline(never)]
//! fn level(id: u32) -> u32 {
//!     id * 2
//! }
//!
//! fn logged_level(id: u32) -> u32 {
//!     let value = HOOK.get().unwrap().invoke_original((id,)).unwrap();
//!     println!("level {id} -> {value}");
//!     value
//! }
//!
//! let hook = unsafe { Redirection::<fn(u32) -> u32>::new(level, logged_level, true) }.unwrap();
//! let hook = HOOK.get_or_init(|| hook);
//! assert_eq!(level(21), 42);
//! hook.dispose().unwrap();
//! ```
extern crate alloc;

#[cfg(not(any(target_arch = "x86_64", target_arch = "x86")))]
compile_error!("unsupport arch");

#[macro_use]
mod macros;

pub mod accessor;
pub mod arch;
pub mod descriptor;
mod error;
mod function;
pub mod mem;
mod os;
pub mod redirection;
pub mod registry;
pub mod resolver;

pub use accessor::FieldAccessor;
pub use arch::{JumpEncoding, PATCH_SIZE, Patch, encode_jump};
pub use descriptor::{Descriptor, DescriptorBuilder, FunctionKind};
pub use error::{Error, custom_error, protection_error};
pub use function::Function;
pub use redirection::{Redirection, State};
pub use registry::{RetentionRegistry, global_registry};

pub type Result<T> = core::result::Result<T, Error>;
