//! Reachability probe behind `GET /ping`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::config::{ProbeConfig, ProbeMethod};

/// Answers "is this host reachable right now?".
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, host: &str) -> bool;
}

/// ICMP echo through the system `ping` tool.
#[derive(Debug, Clone)]
pub struct IcmpProber {
    count: u32,
    timeout: Duration,
}

impl IcmpProber {
    pub fn new(count: u32, timeout: Duration) -> Self {
        Self {
            count: count.max(1),
            timeout,
        }
    }

    fn command(&self, host: &str) -> Command {
        let mut cmd = Command::new("ping");
        #[cfg(target_os = "windows")]
        {
            cmd.arg("-n")
                .arg(self.count.to_string())
                .arg("-w")
                .arg(self.timeout.as_millis().to_string());
        }
        #[cfg(not(target_os = "windows"))]
        {
            let secs = self.timeout.as_secs().max(1);
            cmd.arg("-c")
                .arg(self.count.to_string())
                .arg("-W")
                .arg(secs.to_string());
        }
        cmd.arg(host).kill_on_drop(true);
        cmd
    }

    // Every echo may take the full timeout, plus a second of slack.
    fn overall_limit(&self) -> Duration {
        self.timeout * self.count + Duration::from_secs(1)
    }
}

#[async_trait]
impl Prober for IcmpProber {
    async fn probe(&self, host: &str) -> bool {
        let output = timeout(self.overall_limit(), self.command(host).output()).await;
        match output {
            Ok(Ok(out)) => {
                debug!(host, code = ?out.status.code(), "ping finished");
                out.status.success()
            }
            Ok(Err(e)) => {
                warn!(host, "could not run ping: {e}");
                false
            }
            Err(_) => {
                debug!(host, "ping timed out");
                false
            }
        }
    }
}

/// TCP connect to a fixed port; any successful attempt counts.
#[derive(Debug, Clone)]
pub struct TcpProber {
    port: u16,
    attempts: u32,
    timeout: Duration,
}

impl TcpProber {
    pub fn new(port: u16, attempts: u32, timeout: Duration) -> Self {
        Self {
            port,
            attempts: attempts.max(1),
            timeout,
        }
    }
}

#[async_trait]
impl Prober for TcpProber {
    async fn probe(&self, host: &str) -> bool {
        for attempt in 1..=self.attempts {
            match timeout(self.timeout, TcpStream::connect((host, self.port))).await {
                Ok(Ok(_)) => return true,
                Ok(Err(e)) => debug!(host, port = self.port, attempt, "connect failed: {e}"),
                Err(_) => debug!(host, port = self.port, attempt, "connect timed out"),
            }
        }
        false
    }
}

/// Build the configured prober. `port` is used by the TCP method.
pub fn from_config(cfg: &ProbeConfig, port: u16) -> Arc<dyn Prober> {
    let limit = Duration::from_millis(cfg.timeout_ms.max(1));
    match cfg.method {
        ProbeMethod::Icmp => Arc::new(IcmpProber::new(cfg.count, limit)),
        ProbeMethod::Tcp => Arc::new(TcpProber::new(port, cfg.count, limit)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn tcp_probe_reaches_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let prober = TcpProber::new(port, 1, Duration::from_secs(1));
        assert!(prober.probe("127.0.0.1").await);
    }

    #[tokio::test]
    async fn tcp_probe_fails_on_closed_port() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let prober = TcpProber::new(port, 2, Duration::from_millis(200));
        assert!(!prober.probe("127.0.0.1").await);
    }

    #[test]
    fn icmp_limit_covers_every_echo() {
        let prober = IcmpProber::new(3, Duration::from_millis(500));
        assert_eq!(prober.overall_limit(), Duration::from_millis(2_500));
        assert_eq!(IcmpProber::new(0, Duration::from_secs(1)).count, 1);
    }

    #[tokio::test]
    async fn from_config_picks_method() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let cfg = ProbeConfig {
            method: ProbeMethod::Tcp,
            count: 1,
            timeout_ms: 500,
        };
        assert!(from_config(&cfg, port).probe("127.0.0.1").await);
    }
}
