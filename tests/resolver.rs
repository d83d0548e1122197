mod common;

use common::call0;
use redirect::{
    Descriptor, Error, FunctionKind, Redirection, custom_error,
    mem::CodePtr,
    resolver::{is_materialized, resolve_entry},
};
use std::{
    hint::black_box,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

/// Bytes shaped like an unresolved precode stub: `call rel32; pop rdi; pop rsi`.
fn stub_bytes() -> Vec<u8> {
    vec![0xe8, 0x00, 0x00, 0x00, 0x00, 0x5f, 0x5e, 0xcc]
}

#[test]
fn null_descriptors_do_not_resolve() {
    let descriptor = Descriptor::builder("null", 0).build();
    let err = unsafe { resolve_entry(&descriptor) }.unwrap_err();
    assert!(matches!(err, Error::Resolve { .. }), "{err}");
}

#[test]
fn stub_signature_is_detected() {
    let stub = stub_bytes();
    let body = vec![0x55u8, 0x48, 0x89, 0xe5, 0x5d, 0xc3];
    unsafe {
        assert!(!is_materialized(CodePtr::new(stub.as_ptr() as usize).unwrap()));
        assert!(is_materialized(CodePtr::new(body.as_ptr() as usize).unwrap()));
    }
}

#[inline(never)]
fn compiled_body() -> i32 {
    black_box(201)
}

#[test]
fn stubs_are_materialized_before_resolving() {
    let stub = stub_bytes();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let descriptor = Descriptor::builder("lazy", stub.as_ptr() as usize)
        .materializer(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(compiled_body as fn() -> i32 as usize)
        })
        .build();

    let entry = unsafe { resolve_entry(&descriptor) }.unwrap();
    assert_eq!(entry.addr(), compiled_body as fn() -> i32 as usize);
    assert_eq!(descriptor.entry(), entry.addr());
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // Already compiled: the materializer is not consulted again.
    let entry = unsafe { resolve_entry(&descriptor) }.unwrap();
    assert_eq!(entry.addr(), compiled_body as fn() -> i32 as usize);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn stubs_without_materializer_fail_open() {
    let stub = stub_bytes();
    let descriptor = Descriptor::builder("opaque", stub.as_ptr() as usize).build();
    let entry = unsafe { resolve_entry(&descriptor) }.unwrap();
    assert_eq!(entry.addr(), stub.as_ptr() as usize);
}

#[test]
fn failing_materializers_surface_resolve_errors() {
    let stub = stub_bytes();
    let failing = Descriptor::builder("broken", stub.as_ptr() as usize)
        .materializer(|| Err(custom_error("compilation failed")))
        .build();
    let err = unsafe { resolve_entry(&failing) }.unwrap_err();
    assert!(matches!(err, Error::Resolve { .. }), "{err}");

    let null = Descriptor::builder("vanishing", stub.as_ptr() as usize)
        .materializer(|| Ok(0))
        .build();
    let err = unsafe { resolve_entry(&null) }.unwrap_err();
    assert!(matches!(err, Error::Resolve { .. }), "{err}");
}

#[inline(never)]
fn jitted_original() -> i32 {
    black_box(211)
}

#[inline(never)]
fn jitted_replacement() -> i32 {
    black_box(212)
}

#[test]
fn redirection_materializes_the_original() {
    let stub = Arc::new(stub_bytes());
    let owner: Arc<dyn std::any::Any + Send + Sync> = stub.clone();
    let original = Descriptor::builder("jitted_original", stub.as_ptr() as usize)
        .kind(FunctionKind::Function)
        .owner(Arc::clone(&owner))
        .materializer(|| Ok(jitted_original as fn() -> i32 as usize))
        .build();
    let replacement = Descriptor::from_fn(jitted_replacement as fn() -> i32);

    let redirection =
        unsafe { Redirection::<fn() -> i32>::from_descriptors(original, replacement, true) }
            .unwrap();
    assert_eq!(
        redirection.entry().addr(),
        jitted_original as fn() -> i32 as usize
    );
    assert_eq!(call0(jitted_original), 212);
    assert_eq!(*stub, stub_bytes());
    assert!(redirection.original().owner().is_some());
    redirection.dispose().unwrap();
    assert_eq!(call0(jitted_original), 211);
}

#[test]
fn descriptors_carry_their_metadata() {
    let descriptor = Descriptor::builder("init", 0x1000)
        .kind(FunctionKind::Initializer)
        .build();
    assert_eq!(descriptor.name(), "init");
    assert!(descriptor.is_initializer());
    assert_eq!(descriptor.entry(), 0x1000);

    let clone = descriptor.clone();
    assert!(clone.ptr_eq(&descriptor));
    assert_eq!(descriptor.strong_count(), 2);
    let other = Descriptor::builder("init", 0x1000).build();
    assert!(!other.ptr_eq(&descriptor));
    assert_eq!(other.kind(), FunctionKind::Function);
}
