//! FNV-1a hashing of section names.
//!
//! Section names come from a tiny, well-known alphabet (`.text`, `.rdata`,
//! ...), so 64-bit collisions are not guarded against.

pub const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
pub const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// 64-bit FNV-1a over `bytes`, stopping at the first NUL.
pub const fn fnv1a_64(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET_BASIS;
    let mut i = 0;
    while i < bytes.len() && bytes[i] != 0 {
        hash ^= bytes[i] as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
        i += 1;
    }
    hash
}

pub const fn section_hash(name: &str) -> u64 {
    fnv1a_64(name.as_bytes())
}
