//! Timestamped status and per-transaction report lines.
//!
//! One line per event on stdout, prefixed `[MM/DD/YYYY HH:MM:SS] `. Quiet
//! mode drops per-transaction info lines but never errors or status.

use crate::plan::ByteRange;
use chrono::Local;

pub struct Reporter {
    quiet: bool,
    discard: bool,
}

impl Reporter {
    /// `discard` selects the status-line variant with the download-rate
    /// field, which is only measured in discard-sink mode.
    pub fn new(quiet: bool, discard: bool) -> Self {
        Self { quiet, discard }
    }

    fn emit(&self, line: &str) {
        println!("[{}] {}", Local::now().format("%m/%d/%Y %H:%M:%S"), line);
    }

    pub fn status(&self, live: usize, done: u64, throttling: usize, per_sec: u64, bps: u64) {
        let bps = if self.discard { Some(bps) } else { None };
        self.emit(&format_status(live, done, throttling, per_sec, bps));
    }

    pub fn success(&self, url: &str, ip: &str, range: Option<ByteRange>, bytes: u64) {
        if !self.quiet {
            self.emit(&format_success(url, ip, range, bytes));
        }
    }

    pub fn transfer_error(&self, url: &str, ip: &str, msg: &str, outfile: &str) {
        self.emit(&format_transfer_error(url, ip, msg, outfile));
    }

    pub fn full_md5_error(
        &self,
        url: &str,
        ip: &str,
        truth: &str,
        actual: &str,
        bytes: u64,
        outfile: &str,
    ) {
        self.emit(&format_full_md5_error(url, ip, truth, actual, bytes, outfile));
    }

    pub fn range_md5_error(
        &self,
        url: &str,
        ip: &str,
        truth: &str,
        actual: &str,
        bytes: u64,
        range: ByteRange,
        outfile: &str,
    ) {
        self.emit(&format_range_md5_error(
            url, ip, truth, actual, bytes, range, outfile,
        ));
    }

    pub fn range_size_error(
        &self,
        url: &str,
        ip: &str,
        expected: u64,
        got: u64,
        range: ByteRange,
        outfile: &str,
    ) {
        self.emit(&format_range_size_error(url, ip, expected, got, range, outfile));
    }

    pub fn cache_fill_exception(&self, url: &str, ip: &str, range: ByteRange, got: u64) {
        if !self.quiet {
            self.emit(&format_cache_fill(url, ip, range, got));
        }
    }

    pub fn terminating(&self, url: &str, secs: u64) {
        if !self.quiet {
            self.emit(&format_terminating(url, secs));
        }
    }

    pub fn repeat(&self, url: &str) {
        if !self.quiet {
            self.emit(&format_repeat(url));
        }
    }

    pub fn quitting(&self) {
        self.emit("received interrupt, quitting");
    }
}

fn format_status(
    live: usize,
    done: u64,
    throttling: usize,
    per_sec: u64,
    bps: Option<u64>,
) -> String {
    match bps {
        Some(bps) => format!(
            "status: {} transfers, {} finished, {} throttling, ~{} req per sec, ~{} Bps download",
            live, done, throttling, per_sec, bps
        ),
        None => format!(
            "status: {} transfers, {} finished, {} throttling, ~{} req per sec",
            live, done, throttling, per_sec
        ),
    }
}

fn format_success(url: &str, ip: &str, range: Option<ByteRange>, bytes: u64) -> String {
    match range {
        Some(r) => format!(
            "success: {} [{}], range {}-{} --- {} bytes",
            url, ip, r.start, r.end, bytes
        ),
        None => format!("success: {} [{}] --- {} bytes", url, ip, bytes),
    }
}

fn format_transfer_error(url: &str, ip: &str, msg: &str, outfile: &str) -> String {
    format!("transfer error: {} [{}] --- {} -> {}", url, ip, msg, outfile)
}

fn format_full_md5_error(
    url: &str,
    ip: &str,
    truth: &str,
    actual: &str,
    bytes: u64,
    outfile: &str,
) -> String {
    format!(
        "full-file md5 error: {} [{}] --- {} (truth) != {} ({} transferred bytes) -> {}",
        url, ip, truth, actual, bytes, outfile
    )
}

fn format_range_md5_error(
    url: &str,
    ip: &str,
    truth: &str,
    actual: &str,
    bytes: u64,
    range: ByteRange,
    outfile: &str,
) -> String {
    format!(
        "byte-range md5 error: {} [{}] --- {} (truth) != {} ({} transferred bytes), range {}-{} -> {}",
        url, ip, truth, actual, bytes, range.start, range.end, outfile
    )
}

fn format_range_size_error(
    url: &str,
    ip: &str,
    expected: u64,
    got: u64,
    range: ByteRange,
    outfile: &str,
) -> String {
    format!(
        "byte-range size mismatch error: {} [{}] --- {} (truth) != {} (transferred bytes), range {}-{} -> {}",
        url, ip, expected, got, range.start, range.end, outfile
    )
}

fn format_cache_fill(url: &str, ip: &str, range: ByteRange, got: u64) -> String {
    format!(
        "first-download cache byte range exception: {} [{}], range {}-{}, got {} bytes",
        url, ip, range.start, range.end, got
    )
}

fn format_terminating(url: &str, secs: u64) -> String {
    format!("terminating request for {} after {} seconds", url, secs)
}

fn format_repeat(url: &str) -> String {
    format!("opting to repeat request for {} immediately", url)
}
