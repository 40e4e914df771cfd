//! Probe scheduler.
//!
//! Runs one reachability probe per candidate on a bounded pool of tokio
//! tasks. Each probe gets a single attempt under its own timeout; errors and
//! timeouts count as "no response".

use std::net::{IpAddr, Ipv4Addr};
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::process::Command;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// A single-address reachability check.
#[async_trait]
pub trait Prober: Send + Sync {
    /// `Ok(true)` when the address answered. Any error is treated as silence.
    async fn probe(&self, addr: IpAddr) -> std::io::Result<bool>;
}

/// Reachability via the system `ping` binary, one echo request.
pub struct PingProber {
    ping_path: String,
    timeout: Duration,
}

impl PingProber {
    pub fn new(ping_path: &str, timeout: Duration) -> Self {
        Self {
            ping_path: ping_path.to_string(),
            timeout,
        }
    }

    fn args(&self, addr: IpAddr) -> Vec<String> {
        if cfg!(windows) {
            vec![
                "-n".to_string(),
                "1".to_string(),
                "-w".to_string(),
                self.timeout.as_millis().to_string(),
                addr.to_string(),
            ]
        } else {
            // `-W` takes whole seconds on Linux; the scheduler enforces the
            // real timeout.
            let secs = self.timeout.as_secs().max(1);
            vec![
                "-c".to_string(),
                "1".to_string(),
                "-W".to_string(),
                secs.to_string(),
                addr.to_string(),
            ]
        }
    }
}

#[async_trait]
impl Prober for PingProber {
    async fn probe(&self, addr: IpAddr) -> std::io::Result<bool> {
        let status = Command::new(&self.ping_path)
            .args(self.args(addr))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await?;
        Ok(status.success())
    }
}

/// Bounded-concurrency sweep settings.
#[derive(Debug, Clone, Copy)]
pub struct ProbeSettings {
    pub max_concurrent: usize,
    pub timeout: Duration,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            max_concurrent: 64,
            timeout: Duration::from_millis(800),
        }
    }
}

/// Probe every candidate and return the addresses that answered.
///
/// Returns only once every probe has finished, so callers may rely on the
/// neighbor cache having been populated. The result order is unspecified.
pub async fn probe_all(
    prober: Arc<dyn Prober>,
    candidates: Vec<Ipv4Addr>,
    settings: ProbeSettings,
) -> Vec<Ipv4Addr> {
    let start = Instant::now();
    let total = candidates.len();
    let semaphore = Arc::new(Semaphore::new(settings.max_concurrent.max(1)));
    let mut tasks = JoinSet::new();

    for addr in candidates {
        let prober = prober.clone();
        let semaphore = semaphore.clone();
        let timeout = settings.timeout;

        tasks.spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return None;
            };
            match tokio::time::timeout(timeout, prober.probe(IpAddr::V4(addr))).await {
                Ok(Ok(true)) => Some(addr),
                Ok(Ok(false)) => None,
                Ok(Err(e)) => {
                    tracing::debug!(address = %addr, error = %e, "Probe failed");
                    None
                }
                Err(_) => {
                    tracing::debug!(address = %addr, "Probe timed out");
                    None
                }
            }
        });
    }

    let mut live = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Some(addr)) => live.push(addr),
            Ok(None) => {}
            Err(e) => tracing::debug!(error = %e, "Probe task aborted"),
        }
    }

    tracing::debug!(
        probed = total,
        live = live.len(),
        duration_ms = start.elapsed().as_millis(),
        "Probe pass complete"
    );
    live
}
