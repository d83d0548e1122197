//! Resolution of descriptors to the entry points of their compiled code.

use crate::{
    Result,
    descriptor::Descriptor,
    error::resolve_error,
    mem::{self, CodePtr},
};

/// `call rel32`: the first instruction of an unresolved precode stub.
const CALL_REL32: u8 = 0xe8;

/// Number of bytes inspected when looking for a stub.
pub const STUB_PROBE_SIZE: usize = 6;

/// Whether the code at `entry` looks like a compiled body rather than a
/// stub that will be replaced once the host compiles the function.
///
/// Only the leading `call rel32` of a precode stub is recognised; anything
/// else is assumed to be compiled.
///
/// # Safety
/// `entry..entry + STUB_PROBE_SIZE` must be readable.
pub unsafe fn is_materialized(entry: CodePtr) -> bool {
    let head = unsafe { mem::read_bytes(entry, STUB_PROBE_SIZE) };
    head[0] != CALL_REL32
}

/// Returns the entry address of the compiled body of `descriptor`.
///
/// If the current address holds a stub and the descriptor can be
/// materialized, the host is asked to compile it first and the new address
/// is returned. Descriptors without a materializer are taken as compiled.
///
/// # Safety
/// The descriptor's entry address must point at readable code.
pub unsafe fn resolve_entry(descriptor: &Descriptor) -> Result<CodePtr> {
    let entry = CodePtr::new(descriptor.entry()).ok_or_else(|| {
        resolve_error(alloc::format!(
            "function `{}` has no entry address",
            descriptor.name()
        ))
    })?;
    if !descriptor.has_materializer() || unsafe { is_materialized(entry) } {
        return Ok(entry);
    }

    #[cfg(feature = "log")]
    log::debug!(
        "[{}] entry {:#x} is a stub, materializing",
        descriptor.name(),
        entry.addr()
    );
    let compiled = match descriptor.materialize() {
        Some(result) => result.map_err(|err| {
            resolve_error(alloc::format!(
                "materializing `{}` failed: {err}",
                descriptor.name()
            ))
        })?,
        None => return Ok(entry),
    };
    CodePtr::new(compiled).ok_or_else(|| {
        resolve_error(alloc::format!(
            "materializing `{}` produced a null entry address",
            descriptor.name()
        ))
    })
}
