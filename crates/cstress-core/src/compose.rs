//! URL composition: weighted server selection, random query strings, and the
//! `Host:` header override.

use crate::catalog::{Catalog, WeightedServer};
use rand::Rng;

/// A concrete request produced for one transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedRequest {
    pub url: String,
    pub host_header: Option<String>,
}

/// Weighted sampling over normalized weights: one uniform draw, linear scan
/// subtracting each weight, first index that drives the draw below zero.
/// Falls back to index 0 when rounding leaves the draw non-negative.
pub fn weighted_pick<R: Rng>(rng: &mut R, servers: &[WeightedServer]) -> usize {
    let mut d: f64 = rng.random();
    for (i, s) in servers.iter().enumerate() {
        d -= s.weight;
        if d < 0.0 {
            return i;
        }
    }
    0
}

/// Compose the request URL for `url_id`, optionally appending a randomized
/// query string and, when a server pool is in use, substituting a weighted
/// server for the authority and overriding the `Host:` header.
pub fn compose<R: Rng>(
    rng: &mut R,
    catalog: &Catalog,
    url_id: usize,
    qstring_prob: f64,
) -> ComposedRequest {
    let mut qstring = String::new();
    if qstring_prob > 0.0 && rng.random::<f64>() < qstring_prob {
        qstring = format!("?q={}", rng.random_range(0..10_000_000u32));
    }

    if catalog.servers.is_empty() {
        return ComposedRequest {
            url: format!("{}{}", catalog.urls[url_id], qstring),
            host_header: None,
        };
    }

    let server = &catalog.servers[weighted_pick(rng, &catalog.servers)];
    ComposedRequest {
        url: format!("http://{}{}{}", server.authority, catalog.urls[url_id], qstring),
        host_header: Some(catalog.hosts[url_id].clone()),
    }
}
