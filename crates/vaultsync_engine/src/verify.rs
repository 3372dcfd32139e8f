//! Exact byte comparison of two files.

use crate::config::DEFAULT_VERIFY_CHUNK_SIZE;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

const WORD: usize = std::mem::size_of::<u64>();

/// Largest chunk read per file per step.
const MAX_CHUNK: usize = 16 * 1024 * 1024;

/// Returns true if `a` and `b` have the same length and bytes.
///
/// Both files are streamed in lock-step 64 KiB chunks; neither is loaded
/// whole.
pub fn files_equal(a: &Path, b: &Path) -> io::Result<bool> {
    files_equal_with_chunk(a, b, DEFAULT_VERIFY_CHUNK_SIZE)
}

/// [`files_equal`] with an explicit chunk size.
///
/// The chunk size is clamped to 8 bytes..16 MiB and rounded up to a whole
/// number of 64-bit words.
pub fn files_equal_with_chunk(a: &Path, b: &Path, chunk_size: usize) -> io::Result<bool> {
    let mut fa = File::open(a)?;
    let mut fb = File::open(b)?;

    if fa.metadata()?.len() != fb.metadata()?.len() {
        return Ok(false);
    }

    let chunk_size = chunk_size.clamp(WORD, MAX_CHUNK).div_ceil(WORD) * WORD;
    let mut buf_a = vec![0u8; chunk_size];
    let mut buf_b = vec![0u8; chunk_size];

    loop {
        let na = fill(&mut fa, &mut buf_a)?;
        let nb = fill(&mut fb, &mut buf_b)?;
        if na != nb {
            // One file changed length while we were reading.
            return Ok(false);
        }
        if na == 0 {
            return Ok(true);
        }

        let words_a = buf_a[..na].chunks(WORD).map(word);
        let words_b = buf_b[..nb].chunks(WORD).map(word);
        if !words_a.eq(words_b) {
            return Ok(false);
        }
    }
}

/// Reads until `buf` is full or EOF.
fn fill(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Little-endian word, zero-padded when short.
fn word(bytes: &[u8]) -> u64 {
    let mut w = [0u8; WORD];
    w[..bytes.len()].copy_from_slice(bytes);
    u64::from_le_bytes(w)
}
