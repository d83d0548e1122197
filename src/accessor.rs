//! Typed access to fields by offset.
//!
//! Host objects often keep the state a plugin needs in private fields. A
//! [`FieldAccessor`] is bound once to such a field and then used everywhere
//! instead of recomputing offsets at each call site.

use core::{fmt::Debug, marker::PhantomData};

/// Reads and writes one field of type `T` inside objects of type `O`.
pub struct FieldAccessor<O, T> {
    name: &'static str,
    offset: usize,
    _marker: PhantomData<fn(&O) -> T>,
}

impl<O, T> Clone for FieldAccessor<O, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<O, T> Copy for FieldAccessor<O, T> {}

impl<O, T> FieldAccessor<O, T> {
    /// Binds an accessor to the field `name` at byte `offset` in `O`.
    ///
    /// # Safety
    /// `O` must contain a properly aligned, initialized `T` at `offset` for
    /// every value the accessor is used with.
    pub const unsafe fn new(name: &'static str, offset: usize) -> Self {
        Self {
            name,
            offset,
            _marker: PhantomData,
        }
    }

    /// Gets the field name.
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Gets the byte offset of the field.
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    #[inline]
    fn field_ptr(&self, owner: *const O) -> *const T {
        unsafe { owner.cast::<u8>().add(self.offset).cast::<T>() }
    }

    /// Returns a reference to the field.
    #[inline]
    pub fn get_ref<'a>(&self, owner: &'a O) -> &'a T {
        unsafe { &*self.field_ptr(owner) }
    }

    /// Returns a copy of the field.
    #[inline]
    pub fn get(&self, owner: &O) -> T
    where
        T: Copy,
    {
        *self.get_ref(owner)
    }

    /// Stores `value` in the field, dropping the previous value.
    #[inline]
    pub fn set(&self, owner: &mut O, value: T) {
        drop(self.replace(owner, value));
    }

    /// Stores `value` in the field and returns the previous value.
    #[inline]
    pub fn replace(&self, owner: &mut O, value: T) -> T {
        let owner: *mut O = owner;
        unsafe {
            let ptr = owner.cast::<u8>().add(self.offset).cast::<T>();
            core::mem::replace(&mut *ptr, value)
        }
    }

    /// Overrides the field with `value` while `body` runs, then puts the
    /// previous value back, also when `body` panics.
    pub fn with_value<R>(&self, owner: &mut O, value: T, body: impl FnOnce(&mut O) -> R) -> R {
        let previous = self.replace(owner, value);
        let mut guard = PutBack {
            accessor: *self,
            owner,
            previous: Some(previous),
        };
        body(&mut *guard.owner)
    }
}

struct PutBack<'a, O, T> {
    accessor: FieldAccessor<O, T>,
    owner: &'a mut O,
    previous: Option<T>,
}

impl<O, T> Drop for PutBack<'_, O, T> {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            self.accessor.set(self.owner, previous);
        }
    }
}

impl<O, T> Debug for FieldAccessor<O, T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FieldAccessor")
            .field("owner", &core::any::type_name::<O>())
            .field("name", &self.name)
            .field("offset", &self.offset)
            .finish()
    }
}
