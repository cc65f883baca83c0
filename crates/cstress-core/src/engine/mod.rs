//! Concurrent transaction engine: keeps N transfers in flight on one curl
//! multi handle, applies the planned perturbations, and verifies bodies on
//! completion.
//!
//! Single-threaded by design: all bookkeeping happens in the engine loop,
//! and transfer I/O runs inside libcurl's multi machinery between `wait` and
//! `perform`. Throttling works by pulling a transfer out of the poll set and
//! putting it back once the measured rate drops under the ceiling; the
//! socket stays open the whole time.

mod finish;
mod handler;
mod run;
mod setup;

pub use handler::TransferHandler;
pub use run::run;

use crate::plan::ByteRange;
use curl::easy::Easy2;
use curl::multi::Easy2Handle;
use std::time::Instant;

/// Transport-side state of one transaction: registered with the multi handle
/// and polled, or parked out of the poll set while throttled.
pub(crate) enum Conn {
    Polling(Easy2Handle<TransferHandler>),
    Suspended(Easy2<TransferHandler>),
}

/// One in-flight HTTP GET plus its perturbation state.
pub(crate) struct Transaction {
    pub url_id: usize,
    pub byte_range: Option<ByteRange>,
    pub throttle_bps: Option<u64>,
    pub terminate_after: Option<f64>,
    /// Set when the engine cut the transfer at its deadline; the verifier
    /// skips hashing for these.
    pub terminated: bool,
    pub throttled: bool,
    pub started: Instant,
    /// Always `Some` between engine steps; taken during suspend/resume and
    /// on the finish path.
    pub conn: Option<Conn>,
}

/// Run-wide outcome counters, updated only by the engine loop.
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    pub finished: u64,
    pub succeeded: u64,
    pub transport_errors: u64,
    pub md5_mismatches: u64,
    pub size_mismatches: u64,
    pub cache_fill_exceptions: u64,
    pub terminated: u64,
    pub throttle_suspends: u64,
}
