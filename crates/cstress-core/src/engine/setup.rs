//! Transaction admission: open the sink, configure the easy handle, add it
//! to the multi set.

use anyhow::{anyhow, Result};
use curl::easy::{Easy2, List};
use curl::multi::Multi;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::compose::ComposedRequest;
use crate::config::Options;
use crate::plan::TransactionPlan;
use crate::sink::Sink;

use super::handler::TransferHandler;
use super::{Conn, Transaction};

/// Build and register one transfer, returning the live transaction.
pub(super) fn admit(
    multi: &Multi,
    request: &ComposedRequest,
    plan: &TransactionPlan,
    opts: &Options,
    interval_bytes: &Arc<AtomicU64>,
) -> Result<Transaction> {
    let (sink, header_out, aux_out) = open_sink(opts, interval_bytes)?;
    let mut easy = Easy2::new(TransferHandler::new(sink, header_out, aux_out));

    easy.url(&request.url)
        .map_err(|e| anyhow!("curl url: {}", e))?;
    // 5 second connection timeout, no transfer timeout
    easy.connect_timeout(Duration::from_secs(5))
        .map_err(|e| anyhow!("curl: {}", e))?;
    easy.fail_on_error(true).map_err(|e| anyhow!("curl: {}", e))?;
    if opts.verbose {
        easy.verbose(true).map_err(|e| anyhow!("curl: {}", e))?;
    }
    if let Some(host) = &request.host_header {
        let mut list = List::new();
        list.append(&format!("Host: {}", host))
            .map_err(|e| anyhow!("curl: {}", e))?;
        easy.http_headers(list).map_err(|e| anyhow!("curl: {}", e))?;
    }
    if let Some(range) = plan.byte_range {
        easy.range(&range.curl_range_value())
            .map_err(|e| anyhow!("curl: {}", e))?;
    }
    // every request resolves for itself
    easy.dns_cache_timeout(Duration::from_secs(0))
        .map_err(|e| anyhow!("curl: {}", e))?;
    if !opts.reuse_connections {
        easy.forbid_reuse(true).map_err(|e| anyhow!("curl: {}", e))?;
    }

    let started = Instant::now();
    let handle = multi
        .add2(easy)
        .map_err(|e| anyhow!("curl multi add: {}", e))?;

    Ok(Transaction {
        url_id: plan.url_id,
        byte_range: plan.byte_range,
        throttle_bps: plan.throttle_bps,
        terminate_after: plan.terminate_after,
        terminated: false,
        throttled: false,
        started,
        conn: Some(Conn::Polling(handle)),
    })
}

fn open_sink(
    opts: &Options,
    interval_bytes: &Arc<AtomicU64>,
) -> Result<(Sink, Option<File>, Option<File>)> {
    if opts.no_checks {
        return Ok((Sink::discard(Arc::clone(interval_bytes)), None, None));
    }
    let sink = Sink::temp_file(opts.temp_dir.as_deref())?;
    if !opts.verbose {
        return Ok((sink, None, None));
    }
    let base = match sink.path() {
        Some(p) => p.to_path_buf(),
        None => return Ok((sink, None, None)),
    };
    let header_out = File::create(sibling(&base, "header"))
        .map_err(|e| anyhow!("open {}.header: {}", base.display(), e))?;
    let aux_out = File::create(sibling(&base, "aux"))
        .map_err(|e| anyhow!("open {}.aux: {}", base.display(), e))?;
    Ok((sink, Some(header_out), Some(aux_out)))
}

/// `<base>.<ext>` next to the body file.
pub(super) fn sibling(base: &Path, ext: &str) -> PathBuf {
    let mut s = base.as_os_str().to_os_string();
    s.push(format!(".{}", ext));
    PathBuf::from(s)
}
