//! Streaming MD5 over byte windows of a file.
//!
//! Reads in 100 KiB chunks so large bodies hash with bounded memory. Digests
//! are lowercase hex.

use anyhow::{Context, Result};
use md5::{Digest, Md5};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

const BUF_SIZE: usize = 100 * 1024;

/// MD5 of `len` bytes of `f` starting at `offset`. A window that runs past
/// the end of the file hashes what is actually there.
pub fn md5_window(f: &mut File, offset: u64, len: u64) -> Result<String> {
    f.seek(SeekFrom::Start(offset)).context("seek for md5")?;
    let mut hasher = Md5::new();
    let mut buf = [0u8; BUF_SIZE];
    let mut remaining = len;
    while remaining > 0 {
        let want = remaining.min(BUF_SIZE as u64) as usize;
        let n = f.read(&mut buf[..want]).context("read for md5")?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        remaining -= n as u64;
    }
    Ok(hex::encode(hasher.finalize()))
}

/// MD5 of a byte window of the file at `path`.
pub fn md5_path_window(path: &Path, offset: u64, len: u64) -> Result<String> {
    let mut f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    md5_window(&mut f, offset, len)
}
