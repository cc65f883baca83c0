//! Completion path for one transaction: pull it off the multi handle,
//! classify, verify, report, and keep or unlink the on-disk artifacts.

use anyhow::{anyhow, Result};
use curl::easy::Easy2;
use curl::multi::Multi;
use std::fmt::Write as _;
use std::io::Write as _;
use std::path::Path;

use crate::catalog::Catalog;
use crate::config::Options;
use crate::report::Reporter;
use crate::sink::Sink;
use crate::verify::{self, Verdict};

use super::handler::TransferHandler;
use super::setup::sibling;
use super::{Conn, RunStats, Transaction};

/// Finish one transaction. `error` carries the transport failure when curl
/// reported one; `None` means the transfer completed (or the engine
/// synthesized completion for an operator termination).
pub(super) fn finish(
    multi: &Multi,
    mut t: Transaction,
    error: Option<curl::Error>,
    catalog: &Catalog,
    reporter: &Reporter,
    opts: &Options,
    stats: &mut RunStats,
) -> Result<()> {
    stats.finished += 1;

    let mut easy = match t.conn.take() {
        Some(Conn::Polling(handle)) => multi
            .remove2(handle)
            .map_err(|e| anyhow!("curl multi remove: {}", e))?,
        Some(Conn::Suspended(easy)) => easy,
        None => return Ok(()),
    };

    let ip = easy
        .primary_ip()
        .ok()
        .flatten()
        .unwrap_or("unknown address")
        .to_string();

    if opts.verbose {
        write_aux_stats(&mut easy, &ip);
    }

    let url = &catalog.urls[t.url_id];
    let handler = easy.get_mut();
    let outfile = handler
        .sink
        .path()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "(discarded)".to_string());

    if let Some(err) = error {
        // transport or HTTP failure: artifacts stay on disk for inspection
        reporter.transfer_error(url, &ip, &err.to_string(), &outfile);
        stats.transport_errors += 1;
        return Ok(());
    }

    let (path, file) = match &mut handler.sink {
        Sink::TempFile { path, file, .. } => (path.clone(), file),
        Sink::Discard { .. } => {
            // no consistency checks; just account for the outcome
            if t.terminated {
                stats.terminated += 1;
            } else {
                stats.succeeded += 1;
            }
            return Ok(());
        }
    };
    let _ = file.flush();

    if t.terminated {
        // deliberate termination: no hash comparison, artifacts removed
        let bytes = file.metadata().map(|m| m.len()).unwrap_or(0);
        reporter.success(url, &ip, t.byte_range, bytes);
        stats.terminated += 1;
        remove_artifacts(&path, opts.verbose);
        return Ok(());
    }

    let expected_md5 = if catalog.has_md5s() {
        Some(catalog.md5s[t.url_id].as_str())
    } else {
        None
    };
    let local_ref = if catalog.has_locals() {
        Some(catalog.locals[t.url_id].as_path())
    } else {
        None
    };

    let verification = match verify::verify_body(file, t.byte_range, expected_md5, local_ref) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!("verification of {} failed: {:#}", url, e);
            return Ok(());
        }
    };

    if verification.cache_fill {
        if let Some(range) = t.byte_range {
            reporter.cache_fill_exception(url, &ip, range, verification.bytes);
        }
        stats.cache_fill_exceptions += 1;
    }

    match verification.verdict {
        Verdict::Passed => {
            reporter.success(url, &ip, t.byte_range, verification.bytes);
            stats.succeeded += 1;
            remove_artifacts(&path, opts.verbose);
        }
        Verdict::Md5Mismatch { truth, actual } => {
            match t.byte_range {
                Some(range) => reporter.range_md5_error(
                    url,
                    &ip,
                    &truth,
                    &actual,
                    verification.bytes,
                    range,
                    &outfile,
                ),
                None => reporter.full_md5_error(
                    url,
                    &ip,
                    &truth,
                    &actual,
                    verification.bytes,
                    &outfile,
                ),
            }
            stats.md5_mismatches += 1;
        }
        Verdict::SizeMismatch { expected, got } => {
            if let Some(range) = t.byte_range {
                reporter.range_size_error(url, &ip, expected, got, range, &outfile);
            }
            stats.size_mismatches += 1;
        }
    }
    Ok(())
}

/// Fetch a `CURLINFO_*` double-valued field not exposed by the `curl` crate's
/// safe wrapper (e.g. transfer speeds), mirroring how it implements
/// `download_size`/`upload_size` internally.
fn getinfo_double(easy: &Easy2<TransferHandler>, info: curl_sys::CURLINFO) -> Result<f64, curl::Error> {
    unsafe {
        let mut value: f64 = 0.0;
        let rc = curl_sys::curl_easy_getinfo(easy.raw(), info, &mut value);
        if rc == curl_sys::CURLE_OK {
            Ok(value)
        } else {
            Err(curl::Error::new(rc))
        }
    }
}

/// Append per-request transfer statistics to the `.aux` sibling.
fn write_aux_stats(easy: &mut Easy2<TransferHandler>, ip: &str) {
    let mut out = String::new();
    if let Ok(Some(u)) = easy.effective_url() {
        let _ = writeln!(out, "URL: {}", u);
    }
    let _ = writeln!(out, "CONNECTED TO: {}", ip);
    if let Ok(code) = easy.response_code() {
        let _ = writeln!(out, "RESPONSE CODE: {}", code);
    }
    if let Ok(d) = easy.total_time() {
        let _ = writeln!(out, "TOTAL TIME: {:.6} sec", d.as_secs_f64());
    }
    if let Ok(d) = easy.namelookup_time() {
        let _ = writeln!(out, "  DNS: {:.6} sec", d.as_secs_f64());
    }
    if let Ok(d) = easy.connect_time() {
        let _ = writeln!(out, "  CONNECT: {:.6} sec", d.as_secs_f64());
    }
    if let Ok(d) = easy.starttransfer_time() {
        let _ = writeln!(out, "  FIRST BYTE: {:.6} sec", d.as_secs_f64());
    }
    if let Ok(b) = easy.upload_size() {
        let _ = writeln!(out, "TOTAL BYTES UPLOADED: {}", b);
    }
    if let Ok(b) = easy.download_size() {
        let _ = writeln!(out, "TOTAL BYTES DOWNLOADED: {}", b);
    }
    if let Ok(s) = getinfo_double(easy, curl_sys::CURLINFO_SPEED_UPLOAD) {
        let _ = writeln!(out, "UPLOAD SPEED: {} Bps", s);
    }
    if let Ok(s) = getinfo_double(easy, curl_sys::CURLINFO_SPEED_DOWNLOAD) {
        let _ = writeln!(out, "DOWNLOAD SPEED: {} Bps", s);
    }
    if let Ok(l) = easy.content_length_download() {
        let _ = writeln!(out, "CONTENT-LENGTH: {}", l);
    }
    if let Ok(Some(ct)) = easy.content_type() {
        let _ = writeln!(out, "CONTENT-TYPE: {}", ct);
    }
    if let Some(aux) = easy.get_mut().aux_out.as_mut() {
        let _ = aux.write_all(out.as_bytes());
    }
}

/// Unlink the body file and, in verbose mode, its siblings.
fn remove_artifacts(path: &Path, verbose: bool) {
    let _ = std::fs::remove_file(path);
    if verbose {
        let _ = std::fs::remove_file(sibling(path, "header"));
        let _ = std::fs::remove_file(sibling(path, "aux"));
    }
}
