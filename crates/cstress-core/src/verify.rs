//! Post-completion verification of transaction bodies against ground truth.
//!
//! Full transfers are hashed against the expected digest. Byte-range
//! transfers are hashed against the matching window of the local reference
//! file, with one carve-out: a caching proxy serving the *first* request for
//! an object delivers the whole object even when a range was asked for, so a
//! transfer that overshoots the range but matches the reference file's full
//! size is a noted exception, not an error.

use crate::checksum;
use crate::plan::ByteRange;
use anyhow::{Context, Result};
use std::fs::File;
use std::path::Path;

/// Final verdict for one transaction body.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// Content checks passed (or there was nothing to check against).
    Passed,
    /// Digest comparison failed.
    Md5Mismatch { truth: String, actual: String },
    /// Byte-range transfer returned the wrong number of bytes.
    SizeMismatch { expected: u64, got: u64 },
}

/// Outcome of verifying one body: the verdict plus whether the first-fetch
/// cache-fill exception was observed on the way. The exception is noted even
/// when the follow-up digest comparison then fails.
#[derive(Debug, Clone, PartialEq)]
pub struct Verification {
    pub bytes: u64,
    pub cache_fill: bool,
    pub verdict: Verdict,
}

impl Verification {
    fn plain(bytes: u64, verdict: Verdict) -> Self {
        Self {
            bytes,
            cache_fill: false,
            verdict,
        }
    }
}

/// Verify a completed transfer body.
pub fn verify_body(
    body: &mut File,
    byte_range: Option<ByteRange>,
    expected_md5: Option<&str>,
    local_ref: Option<&Path>,
) -> Result<Verification> {
    let bytes = body.metadata().context("stat transferred body")?.len();

    let range = match byte_range {
        Some(range) => range,
        None => {
            // full-object transfer: check against the expected digest
            let verdict = match expected_md5 {
                Some(truth) => compare_md5(body, bytes, truth)?,
                None => Verdict::Passed,
            };
            return Ok(Verification::plain(bytes, verdict));
        }
    };

    let local = match local_ref {
        Some(local) => local,
        None => {
            // range request without a reference: nothing to compare against
            return Ok(Verification::plain(bytes, Verdict::Passed));
        }
    };

    let requested = range.len();
    if bytes > requested {
        let local_len = std::fs::metadata(local)
            .with_context(|| format!("stat {}", local.display()))?
            .len();
        if local_len == bytes {
            // whole object delivered on first fetch through a cache
            let verdict = match expected_md5 {
                Some(truth) => compare_md5(body, bytes, truth)?,
                None => Verdict::Passed,
            };
            return Ok(Verification {
                bytes,
                cache_fill: true,
                verdict,
            });
        }
    }

    if bytes != requested {
        return Ok(Verification::plain(
            bytes,
            Verdict::SizeMismatch {
                expected: requested,
                got: bytes,
            },
        ));
    }

    let truth = checksum::md5_path_window(local, range.start, requested)?;
    let actual = checksum::md5_window(body, 0, bytes)?;
    let verdict = if actual == truth {
        Verdict::Passed
    } else {
        Verdict::Md5Mismatch { truth, actual }
    };
    Ok(Verification::plain(bytes, verdict))
}

fn compare_md5(body: &mut File, bytes: u64, truth: &str) -> Result<Verdict> {
    let actual = checksum::md5_window(body, 0, bytes)?;
    if actual == truth {
        Ok(Verdict::Passed)
    } else {
        Ok(Verdict::Md5Mismatch {
            truth: truth.to_string(),
            actual,
        })
    }
}
