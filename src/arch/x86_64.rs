//! x86-64 absolute jump.

use super::Patch;

/// Size of the `mov rax, imm64; jmp rax` sequence in bytes.
pub(crate) const JMP_ABS_SIZE: usize = 12;

/// Template for the absolute jump.
/// - `48 B8`: mov rax, imm64
/// - 8 bytes of little-endian target address
/// - `FF E0`: jmp rax
const JMP_ABS: [u8; JMP_ABS_SIZE] = [
    0x48, 0xb8, // mov rax, imm64
    0, 0, 0, 0, 0, 0, 0, 0, // imm64
    0xff, 0xe0, // jmp rax
];

pub(crate) fn jmp_abs(target: u64) -> Patch {
    let mut code = JMP_ABS;
    code[2..10].copy_from_slice(&target.to_le_bytes());
    Patch::from_slice(&code)
}
