//! x86 absolute jump.

use super::Patch;

/// Size of the `push imm32; ret` sequence in bytes.
pub(crate) const PUSH_RET_SIZE: usize = 6;

const PUSH_RET: [u8; PUSH_RET_SIZE] = [
    0x68, // push imm32
    0, 0, 0, 0, // imm32
    0xc3, // ret
];

pub(crate) fn push_ret(target: u32) -> Patch {
    let mut code = PUSH_RET;
    code[1..5].copy_from_slice(&target.to_le_bytes());
    Patch::from_slice(&code)
}
