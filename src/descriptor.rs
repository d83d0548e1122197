//! Handles to compiled functions.
//!
//! A [`Descriptor`] identifies a function to the redirector: where its code
//! currently starts, how to force the host to compile it, and what keeps that
//! code alive.

use crate::{Function, Result};
use alloc::{borrow::Cow, boxed::Box, sync::Arc};
use core::{
    any::Any,
    fmt::Debug,
    sync::atomic::{AtomicUsize, Ordering},
};

/// Forces the host runtime to compile a function and returns its final entry address.
pub type Materializer = Box<dyn Fn() -> Result<usize> + Send + Sync>;

/// What kind of callable a descriptor refers to.
///
/// Carried for the host's bookkeeping; redirection treats both kinds alike.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FunctionKind {
    /// An ordinary function or method.
    #[default]
    Function,
    /// A constructor-like initializer.
    Initializer,
}

struct DescriptorInner {
    name: Cow<'static, str>,
    kind: FunctionKind,
    /// Entry address as last observed; a stub until materialized.
    entry: AtomicUsize,
    materializer: Option<Materializer>,
    /// Keeps the memory holding the code alive.
    owner: Option<Arc<dyn Any + Send + Sync>>,
}

/// A reference-counted handle to a compiled function.
///
/// Clones share identity: two descriptors are the same function when
/// [`Descriptor::ptr_eq`] says so, regardless of their entry addresses.
#[derive(Clone)]
pub struct Descriptor {
    inner: Arc<DescriptorInner>,
}

impl Descriptor {
    /// Creates a descriptor for a native function pointer.
    pub fn from_fn<F: Function>(f: F) -> Self {
        Self::builder(core::any::type_name::<F>(), f.to_ptr() as usize).build()
    }

    /// Starts building a descriptor for code at `entry`.
    ///
    /// `entry` may be the address of an uncompiled stub if a
    /// [materializer](DescriptorBuilder::materializer) is supplied.
    pub fn builder(name: impl Into<Cow<'static, str>>, entry: usize) -> DescriptorBuilder {
        DescriptorBuilder {
            name: name.into(),
            entry,
            kind: FunctionKind::Function,
            materializer: None,
            owner: None,
        }
    }

    /// Gets the name of the function.
    #[inline]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Gets the kind of the function.
    #[inline]
    pub fn kind(&self) -> FunctionKind {
        self.inner.kind
    }

    /// Whether the host marked the function as a constructor-like initializer.
    #[inline]
    pub fn is_initializer(&self) -> bool {
        self.inner.kind == FunctionKind::Initializer
    }

    /// Gets the entry address as last observed.
    #[inline]
    pub fn entry(&self) -> usize {
        self.inner.entry.load(Ordering::Acquire)
    }

    /// Gets the object that owns the function's code, if any.
    #[inline]
    pub fn owner(&self) -> Option<&Arc<dyn Any + Send + Sync>> {
        self.inner.owner.as_ref()
    }

    /// Gets the number of strong references to this descriptor.
    #[inline]
    pub fn strong_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    /// Whether two descriptors refer to the same function.
    #[inline]
    pub fn ptr_eq(&self, other: &Descriptor) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// An identity key for this descriptor.
    #[inline]
    pub(crate) fn id(&self) -> usize {
        Arc::as_ptr(&self.inner) as *const () as usize
    }

    #[inline]
    pub(crate) fn has_materializer(&self) -> bool {
        self.inner.materializer.is_some()
    }

    /// Runs the materializer and records the address it returns.
    pub(crate) fn materialize(&self) -> Option<Result<usize>> {
        let materializer = self.inner.materializer.as_ref()?;
        Some(materializer().inspect(|&addr| {
            self.inner.entry.store(addr, Ordering::Release);
        }))
    }
}

impl Debug for Descriptor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Descriptor")
            .field("name", &self.inner.name)
            .field("kind", &self.inner.kind)
            .field("entry", &format_args!("{:#x}", self.entry()))
            .finish()
    }
}

/// Builder for [`Descriptor`].
pub struct DescriptorBuilder {
    name: Cow<'static, str>,
    entry: usize,
    kind: FunctionKind,
    materializer: Option<Materializer>,
    owner: Option<Arc<dyn Any + Send + Sync>>,
}

impl DescriptorBuilder {
    /// Sets the kind of the function.
    pub fn kind(mut self, kind: FunctionKind) -> Self {
        self.kind = kind;
        self
    }

    /// Sets the callback that compiles the function on demand.
    pub fn materializer<M>(mut self, materializer: M) -> Self
    where
        M: Fn() -> Result<usize> + Send + Sync + 'static,
    {
        self.materializer = Some(Box::new(materializer));
        self
    }

    /// Sets the object that owns the function's code.
    pub fn owner(mut self, owner: Arc<dyn Any + Send + Sync>) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn build(self) -> Descriptor {
        Descriptor {
            inner: Arc::new(DescriptorInner {
                name: self.name,
                kind: self.kind,
                entry: AtomicUsize::new(self.entry),
                materializer: self.materializer,
                owner: self.owner,
            }),
        }
    }
}
