//! The engine loop: refill, poll, drain completions, simulate perturbations,
//! status tick.

use anyhow::{anyhow, Result};
use curl::multi::Multi;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::catalog::Catalog;
use crate::compose;
use crate::config::Options;
use crate::plan::Planner;
use crate::report::Reporter;

use super::{finish, setup, Conn, RunStats, Transaction};

/// Run the engine until the shutdown flag is raised or the optional
/// `stop_after` transaction budget has drained.
pub fn run(
    opts: &Options,
    catalog: &Catalog,
    reporter: &Reporter,
    shutdown: &AtomicBool,
) -> Result<RunStats> {
    let mut multi = Multi::new();
    if opts.reuse_connections {
        multi
            .pipelining(true, true)
            .map_err(|e| anyhow!("curl multi pipelining: {}", e))?;
    }

    let seed = opts.seed.unwrap_or_else(rand::random);
    tracing::debug!("perturbation rng seed {}", seed);
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut planner = Planner::new(opts, catalog);

    let interval_bytes = Arc::new(AtomicU64::new(0));
    let mut live: Vec<Transaction> = Vec::new();
    let mut stats = RunStats::default();
    let mut admitted: u64 = 0;
    let mut done_since: u64 = 0;
    let mut throttling_now = 0usize;
    let mut last_status = Instant::now();

    loop {
        if shutdown.load(Ordering::Relaxed) {
            reporter.quitting();
            return Ok(stats);
        }

        // refill: keep the configured number of transactions in flight
        while live.len() < opts.num_transactions
            && opts.stop_after.map_or(true, |n| admitted < n)
        {
            let plan = planner.next(&mut rng);
            if plan.repeated {
                reporter.repeat(&catalog.urls[plan.url_id]);
            }
            let request =
                compose::compose(&mut rng, catalog, plan.url_id, opts.random_qstring_prob);
            let transaction = setup::admit(&multi, &request, &plan, opts, &interval_bytes)?;
            live.push(transaction);
            admitted += 1;
        }

        if live.is_empty() {
            // transaction budget drained
            return Ok(stats);
        }

        // poll: wait up to a second for socket readiness, then drive transfers
        multi
            .wait(&mut [], Duration::from_secs(1))
            .map_err(|e| anyhow!("curl multi wait: {}", e))?;
        multi
            .perform()
            .map_err(|e| anyhow!("curl multi perform: {}", e))?;

        // drain completions
        let mut completed: Vec<(usize, Option<curl::Error>)> = Vec::new();
        multi.messages(|msg| {
            for (i, t) in live.iter().enumerate() {
                if let Some(Conn::Polling(handle)) = t.conn.as_ref() {
                    if let Some(result) = msg.result_for2(handle) {
                        completed.push((i, result.err()));
                        break;
                    }
                }
            }
        });
        // highest index first so swap_remove leaves earlier entries alone
        completed.sort_by(|a, b| b.0.cmp(&a.0));
        for (i, error) in completed {
            let t = live.swap_remove(i);
            finish::finish(&multi, t, error, catalog, reporter, opts, &mut stats)?;
            done_since += 1;
        }

        // simulate termination deadlines and throttling
        if opts.term_prob > 0.0 || opts.throttle_prob > 0.0 {
            throttling_now = 0;
            let now = Instant::now();
            let mut i = 0;
            while i < live.len() {
                let elapsed = now.duration_since(live[i].started).as_secs_f64();

                let deadline_hit = match live[i].terminate_after {
                    Some(deadline) => elapsed > deadline,
                    None => false,
                };
                if deadline_hit {
                    let mut t = live.swap_remove(i);
                    t.terminated = true;
                    reporter.terminating(&catalog.urls[t.url_id], elapsed as u64);
                    finish::finish(&multi, t, None, catalog, reporter, opts, &mut stats)?;
                    done_since += 1;
                    continue;
                }

                if let Some(limit) = live[i].throttle_bps {
                    throttle_step(&multi, &mut live[i], limit, elapsed, &mut stats)?;
                    if live[i].throttled {
                        throttling_now += 1;
                    }
                }
                i += 1;
            }
        }

        // status tick once per second
        if last_status.elapsed() >= Duration::from_secs(1) {
            let bps = interval_bytes.swap(0, Ordering::Relaxed);
            reporter.status(live.len(), stats.finished, throttling_now, done_since, bps);
            done_since = 0;
            last_status = Instant::now();
        }
    }
}

/// Throttle state machine for one transaction: suspend (remove from the poll
/// set) when the measured rate exceeds the ceiling, resume (re-add) once it
/// falls back under. The transfer's socket stays open while suspended.
fn throttle_step(
    multi: &Multi,
    t: &mut Transaction,
    limit: u64,
    elapsed: f64,
    stats: &mut RunStats,
) -> Result<()> {
    let sent = match t.conn.as_ref() {
        Some(Conn::Polling(handle)) => handle.get_ref().sink.len(),
        Some(Conn::Suspended(easy)) => easy.get_ref().sink.len(),
        None => return Ok(()),
    };
    let bps = if elapsed > 0.0 {
        sent as f64 / elapsed
    } else {
        0.0
    };

    if !t.throttled && bps > limit as f64 {
        match t.conn.take() {
            Some(Conn::Polling(handle)) => {
                let easy = multi
                    .remove2(handle)
                    .map_err(|e| anyhow!("curl multi remove: {}", e))?;
                t.conn = Some(Conn::Suspended(easy));
                t.throttled = true;
                stats.throttle_suspends += 1;
            }
            other => t.conn = other,
        }
    } else if t.throttled && bps <= limit as f64 {
        match t.conn.take() {
            Some(Conn::Suspended(easy)) => {
                let handle = multi
                    .add2(easy)
                    .map_err(|e| anyhow!("curl multi add: {}", e))?;
                t.conn = Some(Conn::Polling(handle));
                t.throttled = false;
            }
            other => t.conn = other,
        }
    }
    Ok(())
}
