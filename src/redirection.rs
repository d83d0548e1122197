//! Redirection of one compiled function to another.

use crate::{
    Function, Result,
    arch::{self, Patch},
    descriptor::Descriptor,
    error::{construction_error, restore_error, usage_error},
    mem::{self, CodeMemory, CodePtr, DefaultCodeMemory},
    registry::global_registry,
    resolver::resolve_entry,
};
use core::{cell::Cell, fmt::Debug, marker::PhantomData};
use parking_lot::ReentrantMutex;
use std::panic::{self, AssertUnwindSafe};

/// The lifecycle state of a [`Redirection`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    /// The entry point holds the original bytes.
    Inactive,
    /// The entry point holds the jump to the replacement.
    Active,
    /// The redirection has been disposed; no further operation is allowed.
    Disposed,
}

/// Redirects every call through the entry point of `original` to `replacement`.
///
/// The first [`PATCH_SIZE`](crate::PATCH_SIZE) bytes of the original are
/// overwritten with an absolute jump while the redirection is active. The
/// overwritten bytes are kept, so the original can be restored with
/// [`stop`](Self::stop) or called directly with
/// [`invoke_original`](Self::invoke_original).
///
/// All state changes of one redirection are serialized. The lock is
/// reentrant: the original may itself go through `invoke_original` on the
/// same thread, or call [`start`](Self::start), [`stop`](Self::stop) and
/// [`dispose`](Self::dispose). Those nested calls decide the state the
/// redirection is left in once the outer `invoke_original` returns.
///
/// Dropping a redirection without [`dispose`](Self::dispose) leaves the
/// entry point patched and both descriptors retained.
pub struct Redirection<F: Function, M: CodeMemory = DefaultCodeMemory> {
    original: Descriptor,
    replacement: Descriptor,
    entry: CodePtr,
    saved: Patch,
    patch: Patch,
    control: ReentrantMutex<Control>,
    _marker: PhantomData<(F, fn() -> M)>,
}

struct Control {
    state: Cell<State>,
    /// Set while `invoke_original` has put the original bytes back: the
    /// state to re-enter when it returns, `None` once disposed.
    resume: Cell<Option<State>>,
}

impl Control {
    fn new(state: State) -> Self {
        Self {
            state: Cell::new(state),
            resume: Cell::new(None),
        }
    }

    fn bypassed(&self) -> bool {
        self.resume.get().is_some()
    }
}

impl<F: Function> Redirection<F> {
    /// Redirects `original` to `replacement` with the platform's code memory.
    ///
    /// If `start` is true the redirection is active on return.
    ///
    /// # Safety
    /// Both pointers must be functions whose first [`PATCH_SIZE`](crate::PATCH_SIZE)
    /// bytes may be overwritten, and no thread may be executing those bytes
    /// while they are rewritten.
    pub unsafe fn new(original: F, replacement: F, start: bool) -> Result<Self> {
        unsafe {
            Self::from_descriptors(
                Descriptor::from_fn(original),
                Descriptor::from_fn(replacement),
                start,
            )
        }
    }
}

impl<F: Function, M: CodeMemory> Redirection<F, M> {
    /// Redirects the function behind `original` to the one behind `replacement`.
    ///
    /// Both descriptors are resolved (materializing them if needed) and
    /// checked to be at least [`PATCH_SIZE`](crate::PATCH_SIZE) bytes apart.
    /// The bytes at the original's entry are saved, and both descriptors are
    /// retained until [`dispose`](Self::dispose). Nothing is retained if
    /// construction fails.
    ///
    /// # Errors
    /// [`Error::Resolve`](crate::Error::Resolve) if a descriptor cannot be
    /// resolved or its materializer fails.
    /// [`Error::Construction`](crate::Error::Construction) if both resolve to
    /// the same entry, or the entries are closer than the patch.
    /// [`Error::Protection`](crate::Error::Protection) if the entry cannot be
    /// made writable.
    ///
    /// # Safety
    /// Both descriptors must refer to functions with the signature `F`, and
    /// the requirements of [`Redirection::new`] apply.
    pub unsafe fn from_descriptors(
        original: Descriptor,
        replacement: Descriptor,
        start: bool,
    ) -> Result<Self> {
        let entry = unsafe { resolve_entry(&original)? };
        let target = unsafe { resolve_entry(&replacement)? };
        if entry == target {
            return Err(construction_error("cannot redirect a method to itself"));
        }
        if entry.distance(target) < arch::PATCH_SIZE {
            return Err(construction_error(
                "unable to redirect methods whose bodies are too close to one another",
            ));
        }

        let patch = arch::encode_jump(target.addr())?;
        let saved = unsafe {
            mem::with_writable_code::<M, _>(entry, patch.len(), || {
                let saved = mem::read_bytes(entry, patch.len());
                if start {
                    mem::write_bytes(entry, &patch);
                }
                saved
            })?
        };

        global_registry().retain(&original);
        global_registry().retain(&replacement);
        #[cfg(feature = "log")]
        log::debug!(
            "Redirecting [{}] {:#x} -> [{}] {:#x}, active: {}",
            original.name(),
            entry.addr(),
            replacement.name(),
            target.addr(),
            start
        );

        let state = if start { State::Active } else { State::Inactive };
        Ok(Self {
            original,
            replacement,
            entry,
            saved,
            patch,
            control: ReentrantMutex::new(Control::new(state)),
            _marker: PhantomData,
        })
    }

    /// Gets the descriptor of the redirected function.
    #[inline]
    pub fn original(&self) -> &Descriptor {
        &self.original
    }

    /// Gets the descriptor of the function calls are sent to.
    #[inline]
    pub fn replacement(&self) -> &Descriptor {
        &self.replacement
    }

    /// Gets the patched entry address.
    #[inline]
    pub fn entry(&self) -> CodePtr {
        self.entry
    }

    /// Gets the bytes that were at the entry before the first patch.
    #[inline]
    pub fn saved_bytes(&self) -> &[u8] {
        &self.saved
    }

    /// Gets the jump written at the entry while active.
    #[inline]
    pub fn patch_bytes(&self) -> &[u8] {
        &self.patch
    }

    /// Reads the bytes currently stored at the entry.
    pub fn entry_bytes(&self) -> Patch {
        let _control = self.control.lock();
        unsafe { mem::read_bytes(self.entry, self.patch.len()) }
    }

    /// Gets the current state.
    #[inline]
    pub fn state(&self) -> State {
        self.control.lock().state.get()
    }

    /// Whether calls are currently redirected.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.state() == State::Active
    }

    /// Starts redirecting calls to the replacement. Does nothing if already active.
    ///
    /// Called from inside [`invoke_original`](Self::invoke_original), the
    /// patch is written when that call returns.
    pub fn start(&self) -> Result<()> {
        let control = self.control.lock();
        match control.state.get() {
            State::Disposed => Err(self.disposed("start")),
            _ if control.bypassed() => {
                control.resume.set(Some(State::Active));
                Ok(())
            }
            State::Active => Ok(()),
            State::Inactive => {
                self.write(&self.patch)?;
                control.state.set(State::Active);
                Ok(())
            }
        }
    }

    /// Stops redirecting calls. Does nothing if already inactive.
    ///
    /// Called from inside [`invoke_original`](Self::invoke_original), the
    /// original bytes stay in place when that call returns.
    pub fn stop(&self) -> Result<()> {
        let control = self.control.lock();
        match control.state.get() {
            State::Disposed => Err(self.disposed("stop")),
            _ if control.bypassed() => {
                control.resume.set(Some(State::Inactive));
                Ok(())
            }
            State::Inactive => Ok(()),
            State::Active => {
                self.write(&self.saved)?;
                control.state.set(State::Inactive);
                Ok(())
            }
        }
    }

    /// Calls the original function, whatever the current state.
    ///
    /// If the redirection is active, the original bytes are put back for
    /// the duration of the call and the patch is re-applied afterwards,
    /// including when the original panics. A panic is resumed unchanged once
    /// the patch is back in place.
    ///
    /// While the original runs the state reads `Inactive`. A nested
    /// [`stop`](Self::stop) or [`start`](Self::start) chooses whether the
    /// patch is re-applied, and a nested [`dispose`](Self::dispose) leaves
    /// the original bytes in place.
    ///
    /// # Errors
    /// [`Error::Restore`](crate::Error::Restore) if the patch could not be
    /// re-applied; the redirection is then inactive. The original's return
    /// value is lost in that case.
    pub fn invoke_original(&self, args: F::Arguments) -> Result<F::Output> {
        let control = self.control.lock();
        let bypass = match control.state.get() {
            State::Disposed => return Err(self.disposed("invoke the original of")),
            State::Active => {
                self.write(&self.saved)?;
                control.state.set(State::Inactive);
                control.resume.set(Some(State::Active));
                true
            }
            State::Inactive => false,
        };

        let original = unsafe { F::from_ptr(self.entry.as_ptr()) };
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| unsafe { original.invoke(args) }));

        if bypass && control.resume.take() == Some(State::Active) {
            if let Err(err) = self.write(&self.patch) {
                #[cfg(feature = "log")]
                log::error!(
                    "[{}] failed to re-apply the patch at {:#x}: {}",
                    self.original.name(),
                    self.entry.addr(),
                    err
                );
                return Err(restore_error(err));
            }
            control.state.set(State::Active);
        }

        match outcome {
            Ok(output) => Ok(output),
            Err(payload) => panic::resume_unwind(payload),
        }
    }

    /// Restores the original bytes and releases both descriptors.
    ///
    /// The redirection is unusable afterwards.
    pub fn dispose(&self) -> Result<()> {
        let control = self.control.lock();
        match control.state.get() {
            State::Disposed => return Err(self.disposed("dispose")),
            State::Active => {
                self.write(&self.saved)?;
                control.state.set(State::Inactive);
            }
            State::Inactive => {}
        }
        global_registry().release(&self.original);
        global_registry().release(&self.replacement);
        control.resume.set(None);
        control.state.set(State::Disposed);
        #[cfg(feature = "log")]
        log::debug!(
            "Disposed redirection of [{}] at {:#x}",
            self.original.name(),
            self.entry.addr()
        );
        Ok(())
    }

    fn write(&self, bytes: &Patch) -> Result<()> {
        unsafe {
            mem::with_writable_code::<M, _>(self.entry, bytes.len(), || {
                mem::write_bytes(self.entry, bytes)
            })?;
        }
        #[cfg(feature = "log")]
        log::trace!("Wrote {:?} at {:#x}", bytes, self.entry.addr());
        Ok(())
    }

    #[cold]
    fn disposed(&self, op: &str) -> crate::Error {
        usage_error(alloc::format!(
            "cannot {op} the disposed redirection of `{}`",
            self.original.name()
        ))
    }
}

impl<F: Function, M: CodeMemory> Debug for Redirection<F, M> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Redirection")
            .field("original", &self.original)
            .field("replacement", &self.replacement)
            .field("entry", &self.entry)
            .field("state", &self.state())
            .finish()
    }
}
