//! Minimal HTTP/1.1 origin for engine integration tests.
//!
//! Serves a single static body. Honors Range GETs with 206 by default, and
//! can misbehave on demand: ship the full body despite a Range header (what
//! a cache does on the first fetch of an object), fail every request with a
//! fixed status, or pace the body to simulate a slow origin.

use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct StressServerOptions {
    /// If false, GET ignores Range and always returns 200 with the full body.
    pub support_ranges: bool,
    /// Respond to every request with this status and an empty body.
    pub fail_status: Option<u16>,
    /// Pause between body chunks.
    pub chunk_delay: Option<Duration>,
    /// Body chunk size for paced writes.
    pub chunk_size: usize,
}

impl Default for StressServerOptions {
    fn default() -> Self {
        Self {
            support_ranges: true,
            fail_status: None,
            chunk_delay: None,
            chunk_size: 8192,
        }
    }
}

/// What one request asked for, recorded for assertions.
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub target: String,
    pub host: Option<String>,
    pub range: Option<(u64, u64)>,
}

/// Running server handle: base URL plus the requests it has seen.
pub struct ServerHandle {
    pub base_url: String,
    pub requests: Arc<Mutex<Vec<SeenRequest>>>,
}

/// Start a server in a background thread serving `body`. Runs until the
/// process exits.
pub fn start(body: Vec<u8>) -> ServerHandle {
    start_with_options(body, StressServerOptions::default())
}

pub fn start_with_options(body: Vec<u8>, opts: StressServerOptions) -> ServerHandle {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let body = Arc::new(body);
    let requests: Arc<Mutex<Vec<SeenRequest>>> = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&requests);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let body = Arc::clone(&body);
            let seen = Arc::clone(&seen);
            thread::spawn(move || handle(stream, &body, opts, &seen));
        }
    });
    ServerHandle {
        base_url: format!("http://127.0.0.1:{}/", port),
        requests,
    }
}

fn handle(
    mut stream: std::net::TcpStream,
    body: &[u8],
    opts: StressServerOptions,
    seen: &Mutex<Vec<SeenRequest>>,
) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(5)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) => return,
        Ok(n) => n,
        Err(_) => return,
    };
    let request = match std::str::from_utf8(&buf[..n]) {
        Ok(s) => s,
        Err(_) => return,
    };
    let parsed = parse_request(request);
    seen.lock().unwrap().push(parsed.clone());

    if let Some(status) = opts.fail_status {
        let response = format!(
            "HTTP/1.1 {} Error\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
            status
        );
        let _ = stream.write_all(response.as_bytes());
        return;
    }

    let total = body.len() as u64;
    let range = if opts.support_ranges { parsed.range } else { None };
    let (status, content_range, slice) = match range {
        Some((start, end_incl)) => {
            let start = start.min(total) as usize;
            let end_excl = (end_incl.saturating_add(1)).min(total) as usize;
            let slice = body.get(start..end_excl).unwrap_or(&body[0..0]);
            (
                "206 Partial Content",
                Some(format!(
                    "bytes {}-{}/{}",
                    start,
                    end_excl.saturating_sub(1),
                    total
                )),
                slice,
            )
        }
        None => ("200 OK", None, body),
    };

    let mut response = format!(
        "HTTP/1.1 {}\r\nContent-Length: {}\r\nAccept-Ranges: bytes\r\nConnection: close\r\n",
        status,
        slice.len()
    );
    if let Some(cr) = content_range {
        response.push_str(&format!("Content-Range: {}\r\n", cr));
    }
    response.push_str("\r\n");
    let _ = stream.write_all(response.as_bytes());

    match opts.chunk_delay {
        Some(delay) => {
            for chunk in slice.chunks(opts.chunk_size.max(1)) {
                if stream.write_all(chunk).is_err() {
                    return;
                }
                thread::sleep(delay);
            }
        }
        None => {
            let _ = stream.write_all(slice);
        }
    }
}

/// Pull the target, Host header, and Range header out of a request.
fn parse_request(request: &str) -> SeenRequest {
    let mut target = String::new();
    let mut host = None;
    let mut range = None;
    for (idx, line) in request.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            break;
        }
        if idx == 0 {
            target = line.split_whitespace().nth(1).unwrap_or("").to_string();
            continue;
        }
        let (name, value) = match line.split_once(':') {
            Some(pair) => pair,
            None => continue,
        };
        let value = value.trim();
        if name.trim().eq_ignore_ascii_case("host") {
            host = Some(value.to_string());
        } else if name.trim().eq_ignore_ascii_case("range") {
            let spec = value.to_lowercase();
            if let Some(part) = spec.strip_prefix("bytes=") {
                if let Some((a, b)) = part.trim().split_once('-') {
                    let start = a.trim().parse::<u64>().unwrap_or(0);
                    let end = match b.trim() {
                        "" => u64::MAX,
                        e => e.parse::<u64>().unwrap_or(0),
                    };
                    range = Some((start, end));
                }
            }
        }
    }
    SeenRequest {
        target,
        host,
        range,
    }
}
