//! Liveness reporting.
//!
//! The dashboard framework serves `GET /_stcore/health` once its serving loop
//! has started. This module probes that path for the hosting platform, and
//! falls back to plain port reachability for targets with no health check
//! wired, which cannot tell a wedged app from a healthy one.

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use std::fmt;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use crate::constants::HEALTH_PATH;

/// Point-in-time liveness. Never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    /// The app answered with a non-success status code.
    Unhealthy(u16),
    /// Nothing accepted the connection, or it timed out.
    Unreachable(String),
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthStatus::Healthy => f.write_str("healthy"),
            HealthStatus::Unhealthy(code) => write!(f, "unhealthy (HTTP {})", code),
            HealthStatus::Unreachable(reason) => write!(f, "unreachable ({})", reason),
        }
    }
}

pub fn health_url(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("http://[{}]:{}{}", host, port, HEALTH_PATH)
    } else {
        format!("http://{}:{}{}", host, port, HEALTH_PATH)
    }
}

/// Command the container host runs for its health check.
pub fn check_command(port: u16) -> Vec<String> {
    vec![
        "curl".to_string(),
        "--fail".to_string(),
        "--silent".to_string(),
        "--show-error".to_string(),
        health_url("localhost", port),
    ]
}

pub struct Prober {
    client: Client,
    timeout: Duration,
}

impl Prober {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Prober { client, timeout })
    }

    /// GET the fixed health path. Success only on a 2xx answer.
    pub fn probe_endpoint(&self, host: &str, port: u16) -> HealthStatus {
        let url = health_url(host, port);
        match self.client.get(&url).send() {
            Ok(resp) if resp.status().is_success() => HealthStatus::Healthy,
            Ok(resp) => HealthStatus::Unhealthy(resp.status().as_u16()),
            Err(e) => HealthStatus::Unreachable(e.to_string()),
        }
    }

    /// Whether anything accepts TCP connections on the port, on any address
    /// the host resolves to.
    pub fn probe_port(&self, host: &str, port: u16) -> HealthStatus {
        let addrs = match (host, port).to_socket_addrs() {
            Ok(addrs) => addrs,
            Err(e) => return HealthStatus::Unreachable(e.to_string()),
        };
        let mut last_error = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, self.timeout) {
                Ok(_) => return HealthStatus::Healthy,
                Err(e) => last_error = Some(format!("{}: {}", addr, e)),
            }
        }
        HealthStatus::Unreachable(last_error.unwrap_or_else(|| format!("no address for {}", host)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use std::net::TcpListener;

    fn free_port() -> u16 {
        TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port()
    }

    #[test]
    fn test_health_url() {
        assert_eq!(
            health_url("127.0.0.1", 8501),
            "http://127.0.0.1:8501/_stcore/health"
        );
        assert_eq!(health_url("::1", 8502), "http://[::1]:8502/_stcore/health");
    }

    #[test]
    fn test_check_command_targets_fixed_path() {
        let cmd = check_command(8502);
        assert_eq!(cmd[0], "curl");
        assert!(cmd.contains(&"--fail".to_string()));
        assert_eq!(cmd.last().unwrap(), "http://localhost:8502/_stcore/health");
    }

    #[test]
    fn test_endpoint_before_bind_is_unreachable() {
        let prober = Prober::new(Duration::from_secs(2)).unwrap();
        let port = free_port();
        let status = prober.probe_endpoint("127.0.0.1", port);
        assert!(matches!(status, HealthStatus::Unreachable(_)), "{}", status);
        assert!(!prober.probe_port("127.0.0.1", port).is_healthy());
    }

    #[test]
    fn test_health_tracks_startup() {
        let server = MockServer::start();
        let port = server.port();
        let prober = Prober::new(Duration::from_secs(2)).unwrap();

        let mut starting = server.mock(|when, then| {
            when.method(GET).path(HEALTH_PATH);
            then.status(503).body("starting");
        });
        assert_eq!(prober.probe_endpoint("127.0.0.1", port), HealthStatus::Unhealthy(503));
        starting.assert();

        // Port reachability cannot see the difference.
        assert!(prober.probe_port("127.0.0.1", port).is_healthy());

        starting.delete();
        let ready = server.mock(|when, then| {
            when.method(GET).path(HEALTH_PATH);
            then.status(200).body("ok");
        });
        for _ in 0..3 {
            assert_eq!(prober.probe_endpoint("127.0.0.1", port), HealthStatus::Healthy);
        }
        ready.assert_hits(3);
    }

    #[test]
    fn test_port_check_tries_every_resolved_address() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let prober = Prober::new(Duration::from_secs(2)).unwrap();

        // `localhost` may resolve to ::1 first while only IPv4 is bound.
        assert!(prober.probe_port("localhost", port).is_healthy());
    }

    #[test]
    fn test_status_display() {
        assert_eq!(HealthStatus::Healthy.to_string(), "healthy");
        assert_eq!(HealthStatus::Unhealthy(500).to_string(), "unhealthy (HTTP 500)");
    }
}
