//! Typed function pointers that can be redirected and re-invoked.

/// A function pointer type whose entry point can be patched.
///
/// Implemented for `fn`, `unsafe fn`, `extern "C" fn`, `unsafe extern "C" fn`,
/// `extern "system" fn`, and `unsafe extern "system" fn` pointers with up to
/// six arguments. The arguments are passed to [`Function::invoke`] as a tuple;
/// a method receiver is simply the first element.
///
/// # Safety
/// Implementors must be pointer-sized function pointers, so that
/// [`Function::from_ptr`] and [`Function::to_ptr`] round-trip.
pub unsafe trait Function: Copy + Send + Sync + 'static {
    /// The argument tuple.
    type Arguments;

    /// The return type.
    type Output;

    /// Reinterprets a code address as this function type.
    ///
    /// # Safety
    /// `ptr` must be the entry point of a function with this exact signature.
    unsafe fn from_ptr(ptr: *const ()) -> Self;

    /// Returns the entry address of this function.
    fn to_ptr(&self) -> *const ();

    /// Calls the function with the given arguments.
    ///
    /// # Safety
    /// Safe function pointers are always sound to call; unsafe ones carry the
    /// contract of the pointed-to function.
    unsafe fn invoke(&self, args: Self::Arguments) -> Self::Output;
}

impl_function!(a: A, b: B, c: C, d: D, e: E, f: F);
