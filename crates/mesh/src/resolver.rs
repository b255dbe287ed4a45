//! Candidate address resolution.
//!
//! For a logical target the resolver produces, in priority order:
//! 1. the mesh (low-power radio) address read from the target's side-channel
//!    file, bracketed as an IPv6 literal;
//! 2. the conventional hostname, resolved to an IP (IPv4 preferred), or the
//!    hostname literal when the lookup fails.
//!
//! The side-channel file is read fresh on every resolution. In strict mode a
//! missing or empty file is fatal and the hostname tier is never produced.

use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;

use serde::Serialize;
use telemesh_core::config::{HopTimeouts, ResolverConfig, TargetConfig};
use tracing::debug;

use crate::error::{MeshError, MeshResult};

/// Which tier a candidate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateTier {
    /// Side-channel mesh address
    Mesh,
    /// Conventional network hostname
    Hostname,
}

/// One address to try, with its own budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Address as placed in the URL authority (`[fd00::1]`, `10.0.0.4`, `gps.local`)
    pub address: String,
    /// Full request URL
    pub url: String,
    /// Source tier
    pub tier: CandidateTier,
    /// Budget for this attempt
    pub timeout: Duration,
}

/// Produces ordered candidates for logical targets.
#[derive(Debug, Clone)]
pub struct AddressResolver {
    policy: ResolverConfig,
    timeouts: HopTimeouts,
}

impl AddressResolver {
    /// Create a resolver for one hop.
    pub fn new(policy: ResolverConfig, timeouts: HopTimeouts) -> Self {
        Self { policy, timeouts }
    }

    /// Resolve `target` (named `name` in errors and logs) into candidates.
    pub async fn resolve(&self, name: &str, target: &TargetConfig) -> MeshResult<Vec<Candidate>> {
        let mut candidates = Vec::with_capacity(2);

        if self.policy.use_mesh_address {
            let mesh_addr = match &target.addr_file {
                Some(path) => read_mesh_address(path).await,
                None => None,
            };
            match mesh_addr {
                Some(addr) => {
                    let address = bracket(&addr);
                    candidates.push(Candidate {
                        url: build_url(&address, target),
                        address,
                        tier: CandidateTier::Mesh,
                        timeout: self.timeouts.mesh(),
                    });
                }
                None if self.policy.strict => {
                    let file = target
                        .addr_file
                        .as_deref()
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| "<not configured>".to_string());
                    return Err(MeshError::Config(format!(
                        "mesh address missing for {}: {}",
                        name, file
                    )));
                }
                None => {}
            }
        }

        if !self.policy.strict {
            let address = lookup_host(&target.host, target.port).await;
            candidates.push(Candidate {
                url: build_url(&address, target),
                address,
                tier: CandidateTier::Hostname,
                timeout: self.timeouts.hostname(),
            });
        }

        debug!(
            target = name,
            candidates = ?candidates.iter().map(|c| c.url.as_str()).collect::<Vec<_>>(),
            "resolved candidates"
        );
        Ok(candidates)
    }
}

/// Trimmed contents of a mesh-address file, or `None` if unreadable or empty.
pub async fn read_mesh_address(path: &Path) -> Option<String> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => {
            let addr = content.trim();
            if addr.is_empty() {
                None
            } else {
                Some(addr.to_string())
            }
        }
        Err(e) => {
            debug!(path = %path.display(), error = %e, "mesh address file unreadable");
            None
        }
    }
}

/// Resolve a hostname, preferring IPv4. Falls back to the literal hostname.
pub async fn lookup_host(host: &str, port: u16) -> String {
    match tokio::net::lookup_host((host, port)).await {
        Ok(addrs) => {
            let addrs: Vec<IpAddr> = addrs.map(|a| a.ip()).collect();
            addrs
                .iter()
                .find(|ip| ip.is_ipv4())
                .or_else(|| addrs.first())
                .map(format_ip)
                .unwrap_or_else(|| host.to_string())
        }
        Err(e) => {
            debug!(host, error = %e, "hostname lookup failed, using literal");
            host.to_string()
        }
    }
}

fn format_ip(ip: &IpAddr) -> String {
    match ip {
        IpAddr::V4(v4) => v4.to_string(),
        IpAddr::V6(v6) => format!("[{}]", v6),
    }
}

fn bracket(addr: &str) -> String {
    if addr.starts_with('[') || !addr.contains(':') {
        addr.to_string()
    } else {
        format!("[{}]", addr)
    }
}

fn build_url(address: &str, target: &TargetConfig) -> String {
    format!(
        "http://{}:{}/{}",
        address,
        target.port,
        target.path.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn timeouts() -> HopTimeouts {
        HopTimeouts {
            mesh_secs: 1.0,
            hostname_secs: 2.5,
        }
    }

    fn target(addr_file: Option<PathBuf>) -> TargetConfig {
        TargetConfig {
            host: "127.0.0.1".to_string(),
            port: 5683,
            path: "gps".to_string(),
            addr_file,
        }
    }

    fn policy(use_mesh_address: bool, strict: bool) -> ResolverConfig {
        ResolverConfig {
            use_mesh_address,
            strict,
        }
    }

    #[tokio::test]
    async fn test_mesh_then_hostname() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("gps.addr");
        std::fs::write(&file, "  fd00::2\n").unwrap();

        let resolver = AddressResolver::new(policy(true, false), timeouts());
        let candidates = resolver.resolve("gps", &target(Some(file))).await.unwrap();

        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].tier, CandidateTier::Mesh);
        assert_eq!(candidates[0].address, "[fd00::2]");
        assert_eq!(candidates[0].url, "http://[fd00::2]:5683/gps");
        assert_eq!(candidates[0].timeout, Duration::from_secs(1));
        assert_eq!(candidates[1].tier, CandidateTier::Hostname);
        assert_eq!(candidates[1].url, "http://127.0.0.1:5683/gps");
        assert_eq!(candidates[1].timeout, Duration::from_millis(2500));
    }

    #[tokio::test]
    async fn test_unreadable_file_non_strict_yields_hostname_only() {
        let resolver = AddressResolver::new(policy(true, false), timeouts());
        let candidates = resolver
            .resolve("gps", &target(Some(PathBuf::from("/nonexistent/gps.addr"))))
            .await
            .unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].tier, CandidateTier::Hostname);
    }

    #[tokio::test]
    async fn test_empty_file_is_no_mesh_candidate() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("gps.addr");
        std::fs::write(&file, "\n   \n").unwrap();

        let resolver = AddressResolver::new(policy(true, false), timeouts());
        let candidates = resolver.resolve("gps", &target(Some(file))).await.unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].tier, CandidateTier::Hostname);
    }

    #[tokio::test]
    async fn test_strict_missing_file_fails() {
        let resolver = AddressResolver::new(policy(true, true), timeouts());
        let err = resolver
            .resolve("battery", &target(Some(PathBuf::from("/nonexistent/batt.addr"))))
            .await
            .unwrap_err();
        match err {
            MeshError::Config(msg) => {
                assert!(msg.contains("battery"));
                assert!(msg.contains("/nonexistent/batt.addr"));
            }
            other => panic!("expected config error, got {:?}", other),
        }

        let err = resolver.resolve("battery", &target(None)).await.unwrap_err();
        assert!(matches!(err, MeshError::Config(_)));
    }

    #[tokio::test]
    async fn test_strict_with_file_skips_hostname() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("leader.addr");
        std::fs::write(&file, "fd00::4").unwrap();

        let resolver = AddressResolver::new(policy(true, true), timeouts());
        let candidates = resolver.resolve("leader", &target(Some(file))).await.unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].tier, CandidateTier::Mesh);
    }

    #[tokio::test]
    async fn test_file_read_fresh_each_time() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("gps.addr");
        std::fs::write(&file, "fd00::2").unwrap();
        let resolver = AddressResolver::new(policy(true, false), timeouts());
        let t = target(Some(file.clone()));

        assert_eq!(resolver.resolve("gps", &t).await.unwrap()[0].address, "[fd00::2]");
        std::fs::write(&file, "fd00::9").unwrap();
        assert_eq!(resolver.resolve("gps", &t).await.unwrap()[0].address, "[fd00::9]");
    }

    #[tokio::test]
    async fn test_mesh_disabled_ignores_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("gps.addr");
        std::fs::write(&file, "fd00::2").unwrap();

        let resolver = AddressResolver::new(policy(false, false), timeouts());
        let candidates = resolver.resolve("gps", &target(Some(file))).await.unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].tier, CandidateTier::Hostname);
    }

    #[tokio::test]
    async fn test_unresolvable_host_falls_back_to_literal() {
        let address = lookup_host("no-such-host.invalid", 5683).await;
        assert_eq!(address, "no-such-host.invalid");
    }

    #[test]
    fn test_bracketing() {
        assert_eq!(bracket("fd00::1"), "[fd00::1]");
        assert_eq!(bracket("[fd00::1]"), "[fd00::1]");
        assert_eq!(bracket("10.0.0.2"), "10.0.0.2");
    }
}
