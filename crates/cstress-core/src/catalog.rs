//! Input catalogs: URL list, MD5 list, local reference list, weighted servers.
//!
//! All catalogs are loaded before any network activity and frozen afterwards.
//! Size cross-validation failures are fatal.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// One weighted origin server. Weights are normalized to sum 1.0 at load.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedServer {
    pub authority: String,
    pub weight: f64,
}

/// Immutable inputs for a run.
///
/// `urls` holds full URLs, or just the path components when `servers` is
/// non-empty (the authority then comes from the server pool and each URL's
/// own host moves into `hosts` for the `Host:` header override). `md5s` and
/// `locals` are either empty or exactly as long as `urls`.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub urls: Vec<String>,
    pub hosts: Vec<String>,
    pub md5s: Vec<String>,
    pub locals: Vec<PathBuf>,
    pub servers: Vec<WeightedServer>,
}

impl Catalog {
    /// Load and cross-validate all input files. The URL list is mandatory.
    pub fn load(
        url_file: &Path,
        md5_file: Option<&Path>,
        local_file: Option<&Path>,
        server_file: Option<&Path>,
    ) -> Result<Catalog> {
        let mut urls = read_lines(url_file)?;
        if urls.is_empty() {
            bail!("URL list {} is empty", url_file.display());
        }

        let md5s = match md5_file {
            Some(p) => {
                let md5s = read_lines(p)?;
                if md5s.len() != urls.len() {
                    bail!(
                        "MD5 list must be the same size as the URL list ({} != {})",
                        md5s.len(),
                        urls.len()
                    );
                }
                md5s
            }
            None => Vec::new(),
        };

        let locals = match local_file {
            Some(p) => {
                let locals = read_lines(p)?;
                if locals.len() != urls.len() {
                    bail!(
                        "local file list must be the same size as the URL list ({} != {})",
                        locals.len(),
                        urls.len()
                    );
                }
                locals.into_iter().map(PathBuf::from).collect()
            }
            None => Vec::new(),
        };

        let servers = match server_file {
            Some(p) => load_servers(p)?,
            None => Vec::new(),
        };

        // with a server pool, URLs become (host, path) pairs: the path is
        // requested from a pooled server, the host rides along as a header
        let mut hosts = Vec::new();
        if !servers.is_empty() {
            for url in urls.iter_mut() {
                let stripped = url.strip_prefix("http://").unwrap_or(url).to_string();
                match stripped.find('/') {
                    Some(slash) => {
                        hosts.push(stripped[..slash].to_string());
                        *url = stripped[slash..].to_string();
                    }
                    None => {
                        hosts.push(stripped);
                        *url = String::new();
                    }
                }
            }
        }

        Ok(Catalog {
            urls,
            hosts,
            md5s,
            locals,
            servers,
        })
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    /// True when every URL has an expected MD5 digest.
    pub fn has_md5s(&self) -> bool {
        !self.urls.is_empty() && self.md5s.len() == self.urls.len()
    }

    /// True when every URL has a local reference file.
    pub fn has_locals(&self) -> bool {
        !self.urls.is_empty() && self.locals.len() == self.urls.len()
    }
}

/// Non-empty lines of a text file, stripped of their line terminators.
pub fn read_lines(path: &Path) -> Result<Vec<String>> {
    let data =
        fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    Ok(data
        .lines()
        .filter(|l| !l.is_empty())
        .map(|l| l.to_string())
        .collect())
}

/// Parse `<authority>[whitespace<weight>]` lines and normalize the weights.
fn load_servers(path: &Path) -> Result<Vec<WeightedServer>> {
    let mut servers = Vec::new();
    for line in read_lines(path)? {
        let mut authority = line.as_str();
        let mut weight = 1.0;
        if let Some((head, rest)) = line.split_once(|c: char| c.is_whitespace()) {
            authority = head;
            if let Some(w) = rest.trim().parse::<f64>().ok().filter(|w| *w > 0.0) {
                weight = w;
            }
        }
        servers.push(WeightedServer {
            authority: authority.to_string(),
            weight,
        });
    }

    let total: f64 = servers.iter().map(|s| s.weight).sum();
    if total > 0.0 {
        for s in servers.iter_mut() {
            s.weight /= total;
        }
    }
    Ok(servers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        let mut f = fs::File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn read_lines_skips_empty_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "urls", "http://a/x\n\nhttp://b/y\n\n\n");
        let lines = read_lines(&path).unwrap();
        assert_eq!(lines, vec!["http://a/x", "http://b/y"]);
    }

    #[test]
    fn load_plain_url_list() {
        let dir = tempfile::tempdir().unwrap();
        let urls = write_file(dir.path(), "urls", "http://a/x\nhttp://b/y\n");
        let cat = Catalog::load(&urls, None, None, None).unwrap();
        assert_eq!(cat.len(), 2);
        assert!(!cat.has_md5s());
        assert!(!cat.has_locals());
        assert!(cat.servers.is_empty());
        assert!(cat.hosts.is_empty());
        assert_eq!(cat.urls[0], "http://a/x");
    }

    #[test]
    fn md5_list_size_mismatch_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let urls = write_file(dir.path(), "urls", "http://a/x\nhttp://b/y\n");
        let md5s = write_file(dir.path(), "md5s", "d41d8cd98f00b204e9800998ecf8427e\n");
        let err = Catalog::load(&urls, Some(&md5s), None, None).unwrap_err();
        assert!(err.to_string().contains("same size"));
    }

    #[test]
    fn local_list_size_mismatch_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let urls = write_file(dir.path(), "urls", "http://a/x\n");
        let locals = write_file(dir.path(), "locals", "/tmp/a\n/tmp/b\n");
        assert!(Catalog::load(&urls, None, Some(&locals), None).is_err());
    }

    #[test]
    fn empty_url_list_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let urls = write_file(dir.path(), "urls", "\n\n");
        assert!(Catalog::load(&urls, None, None, None).is_err());
    }

    #[test]
    fn server_weights_default_and_normalize() {
        let dir = tempfile::tempdir().unwrap();
        let urls = write_file(dir.path(), "urls", "http://origin.example.com/p\n");
        let servers = write_file(dir.path(), "servers", "10.0.0.1 3\n10.0.0.2\n");
        let cat = Catalog::load(&urls, None, None, Some(&servers)).unwrap();
        assert_eq!(cat.servers.len(), 2);
        assert_eq!(cat.servers[0].authority, "10.0.0.1");
        assert_eq!(cat.servers[1].authority, "10.0.0.2");
        assert!((cat.servers[0].weight - 0.75).abs() < 1e-9);
        assert!((cat.servers[1].weight - 0.25).abs() < 1e-9);
        let total: f64 = cat.servers.iter().map(|s| s.weight).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn server_list_splits_urls_into_host_and_path() {
        let dir = tempfile::tempdir().unwrap();
        let urls = write_file(
            dir.path(),
            "urls",
            "http://origin.example.com/a/b.bin\nhttp://other.example.com:8080/c\n",
        );
        let servers = write_file(dir.path(), "servers", "10.0.0.1\n");
        let cat = Catalog::load(&urls, None, None, Some(&servers)).unwrap();
        assert_eq!(cat.urls[0], "/a/b.bin");
        assert_eq!(cat.hosts[0], "origin.example.com");
        assert_eq!(cat.urls[1], "/c");
        assert_eq!(cat.hosts[1], "other.example.com:8080");
    }

    #[test]
    fn server_weight_invalid_defaults_to_one() {
        let dir = tempfile::tempdir().unwrap();
        let urls = write_file(dir.path(), "urls", "http://h/p\n");
        let servers = write_file(dir.path(), "servers", "10.0.0.1 bogus\n10.0.0.2 1\n");
        let cat = Catalog::load(&urls, None, None, Some(&servers)).unwrap();
        assert!((cat.servers[0].weight - 0.5).abs() < 1e-9);
        assert!((cat.servers[1].weight - 0.5).abs() < 1e-9);
    }
}
