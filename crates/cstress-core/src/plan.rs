//! Per-transaction perturbation planning.
//!
//! One seedable RNG drives every draw. The draw order per transaction is
//! fixed: repeat, URL selection, byte range, termination deadline, throttle
//! rate. Perturbations with zero probability consume no draws, so disabling
//! one does not shift the others.

use crate::catalog::Catalog;
use crate::config::Options;
use rand::rngs::SmallRng;
use rand::Rng;

/// Inclusive byte range for an HTTP Range request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// Number of bytes the range covers. Never zero: `end >= start`.
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Value for CURLOPT_RANGE: `start-end`, both inclusive.
    pub fn curl_range_value(&self) -> String {
        format!("{}-{}", self.start, self.end)
    }
}

/// The perturbations chosen for one new transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionPlan {
    pub url_id: usize,
    /// The repeat draw fired: `url_id` is the previous transaction's.
    pub repeated: bool,
    pub byte_range: Option<ByteRange>,
    pub throttle_bps: Option<u64>,
    /// Wall-clock seconds after which the engine terminates the transfer.
    pub terminate_after: Option<f64>,
}

/// Rolls the dice for each new transaction.
pub struct Planner<'a> {
    opts: &'a Options,
    catalog: &'a Catalog,
    cursor: usize,
    prev_url: usize,
    br_enabled: bool,
}

impl<'a> Planner<'a> {
    pub fn new(opts: &'a Options, catalog: &'a Catalog) -> Self {
        // byte ranges need a reference file for every URL
        let br_enabled = opts.br_prob > 0.0 && catalog.has_locals();
        Self {
            opts,
            catalog,
            cursor: 0,
            prev_url: 0,
            br_enabled,
        }
    }

    /// Produce the plan for the next transaction.
    pub fn next(&mut self, rng: &mut SmallRng) -> TransactionPlan {
        let mut repeated = false;
        let url_id = if self.opts.repeat_prob > 0.0
            && rng.random::<f64>() < self.opts.repeat_prob
        {
            repeated = true;
            self.prev_url
        } else if self.opts.sequential {
            let id = self.cursor;
            self.cursor += 1;
            if self.cursor >= self.catalog.len() {
                self.cursor = 0;
            }
            id
        } else {
            rng.random_range(0..self.catalog.len())
        };
        self.prev_url = url_id;

        let mut byte_range = None;
        if self.br_enabled && rng.random::<f64>() < self.opts.br_prob {
            byte_range = self.pick_range(rng, url_id);
        }

        let mut terminate_after = None;
        if self.opts.term_prob > 0.0 && rng.random::<f64>() < self.opts.term_prob {
            let u: f64 = rng.random();
            terminate_after = Some(
                self.opts.term_min_sec
                    + (self.opts.term_weibull_lambda * -u.ln())
                        .powf(1.0 / self.opts.term_weibull_k),
            );
        }

        let mut throttle_bps = None;
        if self.opts.throttle_prob > 0.0 && rng.random::<f64>() < self.opts.throttle_prob {
            throttle_bps = Some(if self.opts.throttle_max > self.opts.throttle_min {
                self.opts.throttle_min
                    + rng.random_range(0..self.opts.throttle_max - self.opts.throttle_min)
            } else {
                self.opts.throttle_min
            });
        }

        TransactionPlan {
            url_id,
            repeated,
            byte_range,
            throttle_bps,
            terminate_after,
        }
    }

    /// Uniform start in `[0, size-1)`, uniform end in `[start+1, size-1]`,
    /// from the current size of the local reference file.
    fn pick_range(&self, rng: &mut SmallRng, url_id: usize) -> Option<ByteRange> {
        let path = &self.catalog.locals[url_id];
        let size = match std::fs::metadata(path) {
            Ok(m) => m.len(),
            Err(e) => {
                tracing::warn!(
                    "stat {} failed ({}), skipping byte range",
                    path.display(),
                    e
                );
                return None;
            }
        };
        if size < 2 {
            return None;
        }
        let start = rng.random_range(0..size - 1);
        let end = start + 1 + rng.random_range(0..size - 1 - start);
        Some(ByteRange { start, end })
    }
}
