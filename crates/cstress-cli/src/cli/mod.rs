//! Command-line surface: flag parsing, option-file merge, catalog loading,
//! signal wiring, and the engine invocation.

use anyhow::{Context, Result};
use clap::Parser;
use cstress_core::catalog::Catalog;
use cstress_core::config::Options;
use cstress_core::engine::{self, RunStats};
use cstress_core::report::Reporter;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Synthetic HTTP workload generator for stress-testing caches and origins.
#[derive(Debug, Parser)]
#[command(name = "cstress")]
#[command(
    about = "Hit a list of URLs with concurrent, perturbed GET traffic and verify the bodies",
    long_about = None
)]
pub struct Cli {
    /// File with one URL per line.
    pub url_file: PathBuf,

    /// Read options from a TOML file; explicit flags override it.
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Write the merged option set to a file before running.
    #[arg(long)]
    pub save_config: Option<PathBuf>,

    /// File with the expected MD5 digest for each URL.
    #[arg(short = 'm', long)]
    pub md5_list: Option<PathBuf>,

    /// File with a local reference copy for each URL.
    #[arg(short = 'l', long)]
    pub local_list: Option<PathBuf>,

    /// File with weighted origin servers (`authority [weight]` per line).
    #[arg(long)]
    pub server_list: Option<PathBuf>,

    /// Number of simultaneous transactions to maintain.
    #[arg(short = 'n', long)]
    pub num_transactions: Option<usize>,

    /// Keep connections open and reuse them for new requests.
    #[arg(short = 'u', long)]
    pub reuse_connections: bool,

    /// Request URLs in random order (default).
    #[arg(short = 'r', long)]
    pub random: bool,

    /// Request URLs in sequential order.
    #[arg(short = 's', long, conflicts_with = "random")]
    pub sequential: bool,

    /// Probability of appending a random query-string parameter.
    #[arg(long)]
    pub random_qstring_prob: Option<f64>,

    /// Probability of making a byte-range request (needs --local-list).
    #[arg(short = 'b', long)]
    pub br_prob: Option<f64>,

    /// Probability of throttling a request's bandwidth.
    #[arg(short = 'o', long)]
    pub throttle_prob: Option<f64>,

    /// Randomized throttling: minimum bytes/sec.
    #[arg(short = 'i', long)]
    pub throttle_min: Option<u64>,

    /// Randomized throttling: maximum bytes/sec.
    #[arg(short = 'a', long)]
    pub throttle_max: Option<u64>,

    /// Probability of terminating a request early.
    #[arg(short = 't', long)]
    pub term_prob: Option<f64>,

    /// Seconds before early termination is considered.
    #[arg(short = 'e', long)]
    pub term_min_sec: Option<f64>,

    /// Weibull k parameter for the termination deadline.
    #[arg(short = 'k', long)]
    pub term_weibull_k: Option<f64>,

    /// Weibull lambda parameter for the termination deadline.
    #[arg(short = 'd', long)]
    pub term_weibull_lambda: Option<f64>,

    /// Probability of repeating the previous request immediately.
    #[arg(short = 'p', long)]
    pub repeat_prob: Option<f64>,

    /// Dump per-request headers, the curl debug stream, and transfer stats.
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Skip all consistency checks; count bytes instead of saving them.
    #[arg(short = 'x', long)]
    pub no_checks: bool,

    /// Log only status lines and errors.
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Seed for the perturbation RNG (reproducible runs).
    #[arg(long)]
    pub seed: Option<u64>,

    /// Stop after this many transactions have finished (default: run until
    /// signaled).
    #[arg(long)]
    pub stop_after: Option<u64>,
}

impl Cli {
    /// Merge defaults, the option file, and explicit flags, in that order.
    pub fn to_options(&self) -> Result<Options> {
        let mut opts = match &self.config {
            Some(path) => Options::load(path)?,
            None => Options::default(),
        };

        if let Some(v) = &self.md5_list {
            opts.md5_list = Some(v.clone());
        }
        if let Some(v) = &self.local_list {
            opts.local_list = Some(v.clone());
        }
        if let Some(v) = &self.server_list {
            opts.server_list = Some(v.clone());
        }
        if let Some(v) = self.num_transactions {
            opts.num_transactions = v;
        }
        if let Some(v) = self.random_qstring_prob {
            opts.random_qstring_prob = v;
        }
        if let Some(v) = self.br_prob {
            opts.br_prob = v;
        }
        if let Some(v) = self.throttle_prob {
            opts.throttle_prob = v;
        }
        if let Some(v) = self.throttle_min {
            opts.throttle_min = v;
        }
        if let Some(v) = self.throttle_max {
            opts.throttle_max = v;
        }
        if let Some(v) = self.term_prob {
            opts.term_prob = v;
        }
        if let Some(v) = self.term_min_sec {
            opts.term_min_sec = v;
        }
        if let Some(v) = self.term_weibull_k {
            opts.term_weibull_k = v;
        }
        if let Some(v) = self.term_weibull_lambda {
            opts.term_weibull_lambda = v;
        }
        if let Some(v) = self.repeat_prob {
            opts.repeat_prob = v;
        }
        if let Some(v) = self.seed {
            opts.seed = Some(v);
        }
        if let Some(v) = self.stop_after {
            opts.stop_after = Some(v);
        }
        if self.reuse_connections {
            opts.reuse_connections = true;
        }
        if self.sequential {
            opts.sequential = true;
        }
        if self.random {
            opts.sequential = false;
        }
        if self.verbose {
            opts.verbose = true;
        }
        if self.no_checks {
            opts.no_checks = true;
        }
        if self.quiet {
            opts.quiet = true;
        }

        opts.normalize();
        Ok(opts)
    }
}

/// Parse the command line, load the catalogs, and run the engine.
pub fn run_from_args() -> Result<RunStats> {
    let cli = Cli::parse();
    let mut opts = cli.to_options()?;

    if let Some(path) = &cli.save_config {
        opts.save(path)?;
        tracing::info!("saved options to {}", path.display());
    }

    let catalog = Catalog::load(
        &cli.url_file,
        opts.md5_list.as_deref(),
        opts.local_list.as_deref(),
        opts.server_list.as_deref(),
    )?;

    if opts.br_prob > 0.0 && !catalog.has_locals() {
        tracing::warn!("byte-range requests need a local reference for every URL; disabling");
        opts.br_prob = 0.0;
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);
    ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed))
        .context("install signal handler")?;

    let reporter = Reporter::new(opts.quiet, opts.no_checks);
    engine::run(&opts, &catalog, &reporter, &shutdown)
}
