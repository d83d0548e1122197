/// Implements [`Function`](crate::Function) for safe and unsafe function
/// pointers of every supported ABI, for each arity up to the given list.
macro_rules! impl_function {
    (@recurse () ($($nm:ident : $ty:ident),*)) => {
        impl_function!(@impl_all ($($nm : $ty),*));
    };
    (@recurse ($hd_nm:ident : $hd_ty:ident $(, $tl_nm:ident : $tl_ty:ident)*) ($($nm:ident : $ty:ident),*)) => {
        impl_function!(@impl_all ($($nm : $ty),*));
        impl_function!(@recurse ($($tl_nm : $tl_ty),*) ($($nm : $ty,)* $hd_nm : $hd_ty));
    };

    (@impl_all ($($nm:ident : $ty:ident),*)) => {
        impl_function!(@impl_abi "Rust" ($($nm : $ty),*));
        impl_function!(@impl_abi "C" ($($nm : $ty),*));
        impl_function!(@impl_abi "system" ($($nm : $ty),*));
    };

    (@impl_abi $abi:tt ($($nm:ident : $ty:ident),*)) => {
        unsafe impl<Ret: 'static, $($ty: 'static),*> $crate::Function for extern $abi fn($($ty),*) -> Ret {
            type Arguments = ($($ty,)*);
            type Output = Ret;

            #[inline]
            unsafe fn from_ptr(ptr: *const ()) -> Self {
                unsafe { core::mem::transmute(ptr) }
            }

            #[inline]
            fn to_ptr(&self) -> *const () {
                *self as *const ()
            }

            #[inline]
            unsafe fn invoke(&self, ($($nm,)*): Self::Arguments) -> Self::Output {
                (*self)($($nm),*)
            }
        }

        unsafe impl<Ret: 'static, $($ty: 'static),*> $crate::Function for unsafe extern $abi fn($($ty),*) -> Ret {
            type Arguments = ($($ty,)*);
            type Output = Ret;

            #[inline]
            unsafe fn from_ptr(ptr: *const ()) -> Self {
                unsafe { core::mem::transmute(ptr) }
            }

            #[inline]
            fn to_ptr(&self) -> *const () {
                *self as *const ()
            }

            #[inline]
            unsafe fn invoke(&self, ($($nm,)*): Self::Arguments) -> Self::Output {
                unsafe { (*self)($($nm),*) }
            }
        }
    };

    ($($nm:ident : $ty:ident),*) => {
        impl_function!(@recurse ($($nm : $ty),*) ());
    };
}

/// Builds a [`FieldAccessor`](crate::accessor::FieldAccessor) for a field
/// whose offset is visible at the call site.
///
/// # Example
/// ```
/// use redirect::field_accessor;
///
/// struct Spawner {
///     duration: f32,
/// }
///
/// let duration = field_accessor!(Spawner, duration: f32);
/// let mut spawner = Spawner { duration: 0.7 };
/// duration.set(&mut spawner, 1.5);
/// assert_eq!(duration.get(&spawner), 1.5);
/// ```
#[macro_export]
macro_rules! field_accessor {
    ($owner:ty, $field:ident : $ty:ty) => {{
        fn __field_type(owner: &$owner) -> &$ty {
            &owner.$field
        }
        let _ = __field_type;
        unsafe {
            $crate::accessor::FieldAccessor::<$owner, $ty>::new(
                stringify!($field),
                core::mem::offset_of!($owner, $field),
            )
        }
    }};
}
