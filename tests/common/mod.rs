#![allow(dead_code)]

use std::hint::black_box;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Calls `f` through its entry point, out of reach of constant propagation.
#[inline(never)]
pub fn call0(f: fn() -> i32) -> i32 {
    black_box(f)()
}

#[inline(never)]
pub fn call1(f: fn(i32) -> i32, x: i32) -> i32 {
    black_box(f)(black_box(x))
}
