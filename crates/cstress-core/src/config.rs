use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Runtime options for a stress run.
///
/// Defaults are overridden by the option file (`--config`), which is in turn
/// overridden by explicit command-line flags. `--save-config` writes the
/// merged set back out as TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Options {
    /// File with the expected MD5 digest for each URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub md5_list: Option<PathBuf>,
    /// File with a local reference copy for each URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_list: Option<PathBuf>,
    /// File with weighted origin servers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_list: Option<PathBuf>,

    /// Number of simultaneous transactions to maintain.
    pub num_transactions: usize,
    /// Keep connections open and reuse them for new requests.
    pub reuse_connections: bool,
    /// Request URLs in sequential order instead of at random.
    pub sequential: bool,

    /// Probability of appending a random query-string parameter.
    pub random_qstring_prob: f64,
    /// Probability of making a byte-range request (needs a local list).
    pub br_prob: f64,
    /// Probability of throttling a request's bandwidth.
    pub throttle_prob: f64,
    /// Randomized throttling: minimum bytes/sec.
    pub throttle_min: u64,
    /// Randomized throttling: maximum bytes/sec.
    pub throttle_max: u64,
    /// Probability of terminating a request early.
    pub term_prob: f64,
    /// Seconds before early termination is considered.
    pub term_min_sec: f64,
    /// Weibull k parameter for the termination deadline.
    pub term_weibull_k: f64,
    /// Weibull lambda parameter for the termination deadline.
    pub term_weibull_lambda: f64,
    /// Probability of repeating the previous request immediately.
    pub repeat_prob: f64,

    /// Dump per-request headers, the curl debug stream, and transfer stats.
    pub verbose: bool,
    /// Skip all consistency checks; count bytes instead of saving them.
    pub no_checks: bool,
    /// Log only status lines and errors.
    pub quiet: bool,

    /// Seed for the perturbation RNG; a fixed seed reproduces the same plan
    /// sequence for identical inputs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Stop once this many transactions have finished (run forever if unset).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_after: Option<u64>,
    /// Directory for response-body temp files (system temp dir if unset).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temp_dir: Option<PathBuf>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            md5_list: None,
            local_list: None,
            server_list: None,
            num_transactions: 80,
            reuse_connections: false,
            sequential: false,
            random_qstring_prob: 0.0,
            br_prob: 0.0,
            throttle_prob: 0.0,
            throttle_min: 10_000_000,
            throttle_max: 10_000_000,
            term_prob: 0.0,
            term_min_sec: 100_000_000_000.0,
            term_weibull_k: 1.2,
            term_weibull_lambda: 30.0,
            repeat_prob: 0.0,
            verbose: false,
            no_checks: false,
            quiet: false,
            seed: None,
            stop_after: None,
            temp_dir: None,
        }
    }
}

/// Keys accepted in the option file; anything else warns and is skipped.
const KNOWN_KEYS: &[&str] = &[
    "md5-list",
    "local-list",
    "server-list",
    "num-transactions",
    "reuse-connections",
    "sequential",
    "random-qstring-prob",
    "br-prob",
    "throttle-prob",
    "throttle-min",
    "throttle-max",
    "term-prob",
    "term-min-sec",
    "term-weibull-k",
    "term-weibull-lambda",
    "repeat-prob",
    "verbose",
    "no-checks",
    "quiet",
    "seed",
    "stop-after",
    "temp-dir",
];

impl Options {
    /// Load options from a TOML file. Unknown keys are reported and skipped.
    pub fn load(path: &Path) -> Result<Options> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("read option file {}", path.display()))?;
        let table: toml::Table = data
            .parse()
            .with_context(|| format!("parse option file {}", path.display()))?;
        for key in table.keys() {
            if !KNOWN_KEYS.contains(&key.as_str()) {
                tracing::warn!("unknown option `{}` in {}, skipping", key, path.display());
            }
        }
        let opts: Options = toml::from_str(&data)
            .with_context(|| format!("parse option file {}", path.display()))?;
        Ok(opts)
    }

    /// Write the current option set as pretty TOML.
    pub fn save(&self, path: &Path) -> Result<()> {
        let toml = toml::to_string_pretty(self).context("serialize options")?;
        fs::write(path, toml)
            .with_context(|| format!("write option file {}", path.display()))?;
        Ok(())
    }

    /// Resolve inter-option constraints. Verbose output needs body files,
    /// so `no-checks` wins over `verbose`.
    pub fn normalize(&mut self) {
        if self.no_checks {
            self.verbose = false;
        }
    }
}
