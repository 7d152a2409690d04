// src/archive/signature.rs

//! Magic-pattern scanning
//!
//! An embedded archive announces itself with an eight-byte magic pattern
//! somewhere in the executable. The side-load opt-in signature is the same
//! pattern with byte 3 shifted by a fixed delta, so an executable that was
//! never built for side-loading cannot be tricked into accepting an
//! adjacent data file as its payload.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Magic pattern marking an embedded payload archive
pub const ARCHIVE_MAGIC: [u8; 8] = *b"PRN\x00\x0d\x0a\x1a\x0b";

/// Delta applied to byte 3 of [`ARCHIVE_MAGIC`] to form the side-load
/// opt-in signature
pub const SIDELOAD_SHIFT: u8 = 0x0d;

/// The side-load opt-in signature (`0x00` -> `0x0d` at byte 3)
pub fn sideload_magic() -> [u8; 8] {
    let mut magic = ARCHIVE_MAGIC;
    magic[3] = magic[3].wrapping_add(SIDELOAD_SHIFT);
    magic
}

/// Scan `reader` for the first occurrence of `pattern`.
///
/// Reads in fixed-size chunks, carrying `pattern.len() - 1` bytes across
/// chunk boundaries so a pattern spanning two reads is still found. Returns
/// the absolute byte offset of the match.
pub fn find_magic_pattern<R: Read>(reader: &mut R, pattern: &[u8]) -> io::Result<Option<u64>> {
    const CHUNK: usize = 8192;
    debug_assert!(!pattern.is_empty() && pattern.len() <= CHUNK);

    let mut buf = vec![0u8; CHUNK];
    let mut carry = 0usize;
    let mut base = 0u64;

    loop {
        let read = reader.read(&mut buf[carry..])?;
        if read == 0 {
            return Ok(None);
        }
        let valid = carry + read;

        if valid >= pattern.len()
            && let Some(pos) = buf[..valid]
                .windows(pattern.len())
                .position(|window| window == pattern)
        {
            return Ok(Some(base + pos as u64));
        }

        let keep = (pattern.len() - 1).min(valid);
        buf.copy_within(valid - keep..valid, 0);
        base += (valid - keep) as u64;
        carry = keep;
    }
}

/// Does the file at `path` contain the embedded-archive magic?
pub fn file_contains_archive_magic(path: impl AsRef<Path>) -> io::Result<bool> {
    let mut file = File::open(path)?;
    Ok(find_magic_pattern(&mut file, &ARCHIVE_MAGIC)?.is_some())
}

/// Does the file at `path` carry the side-load opt-in signature?
pub fn file_allows_sideload(path: impl AsRef<Path>) -> io::Result<bool> {
    let mut file = File::open(path)?;
    Ok(find_magic_pattern(&mut file, &sideload_magic())?.is_some())
}
