//! Transaction body sinks: discard (byte counting only) or a temp file the
//! verifier can hash afterwards.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Destination for downloaded bytes.
///
/// `Discard` counts bytes per transaction and into the shared per-interval
/// tally without touching disk. `TempFile` streams into a uniquely named
/// `testfile.<random>` under the temp directory; the engine decides after
/// verification whether the file is unlinked or kept for inspection.
pub enum Sink {
    Discard {
        bytes: u64,
        interval: Arc<AtomicU64>,
    },
    TempFile {
        path: PathBuf,
        file: File,
        bytes: u64,
    },
}

impl Sink {
    pub fn discard(interval: Arc<AtomicU64>) -> Sink {
        Sink::Discard { bytes: 0, interval }
    }

    /// Open a temp-file sink. The path is persisted immediately so the file
    /// survives handle drops; cleanup is the engine's call, not the OS's.
    pub fn temp_file(dir: Option<&Path>) -> Result<Sink> {
        let builder_result = match dir {
            Some(d) => tempfile::Builder::new().prefix("testfile.").tempfile_in(d),
            None => tempfile::Builder::new().prefix("testfile.").tempfile(),
        };
        let named = builder_result.context("create response body temp file")?;
        let (file, temp_path) = named.into_parts();
        let path = temp_path
            .keep()
            .context("persist response body temp file")?;
        Ok(Sink::TempFile {
            path,
            file,
            bytes: 0,
        })
    }

    /// Accept bytes; returns the count accepted.
    pub fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        match self {
            Sink::Discard { bytes, interval } => {
                *bytes += data.len() as u64;
                interval.fetch_add(data.len() as u64, Ordering::Relaxed);
                Ok(data.len())
            }
            Sink::TempFile { file, bytes, .. } => {
                file.write_all(data)?;
                *bytes += data.len() as u64;
                Ok(data.len())
            }
        }
    }

    /// Bytes received so far. Temp-file sinks re-stat the file (the file is
    /// the authority for throttle math); discard sinks use the counter.
    pub fn len(&self) -> u64 {
        match self {
            Sink::Discard { bytes, .. } => *bytes,
            Sink::TempFile { file, bytes, .. } => {
                file.metadata().map(|m| m.len()).unwrap_or(*bytes)
            }
        }
    }

    pub fn flush(&mut self) -> io::Result<()> {
        match self {
            Sink::Discard { .. } => Ok(()),
            Sink::TempFile { file, .. } => file.flush(),
        }
    }

    /// Path of the on-disk artifact, if any.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Sink::Discard { .. } => None,
            Sink::TempFile { path, .. } => Some(path),
        }
    }
}
