//! Connectivity probing
//!
//! Measures TCP reachability from inside a pod to a target host:port. Used
//! identically before and after fault application. Any failure collapses
//! to `None`: unreachability is a valid measurement, not an error.

use crate::executor::RemoteExecutor;
use std::time::{Duration, Instant};
use tracing::debug;

/// Probes connectivity through the remote executor.
pub struct ConnectivityProber {
    timeout: Duration,
}

impl ConnectivityProber {
    /// `timeout` bounds the whole probe, including the exec round trip.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Measure reachability of `host:port` from inside `pod`.
    ///
    /// Returns the observed wall latency in milliseconds, or `None` when the
    /// target is unreachable (timeout, connection refused, DNS failure).
    pub async fn probe(
        &self,
        executor: &dyn RemoteExecutor,
        pod: &str,
        host: &str,
        port: u16,
    ) -> Option<u64> {
        let connect_secs = self.timeout.as_secs().max(1);
        // Prefer nc; fall back to a bash /dev/tcp connect for minimal images.
        let script = format!(
            "nc -z -w {connect_secs} {host} {port} 2>/dev/null || \
             timeout {connect_secs} sh -c 'exec 3<>/dev/tcp/{host}/{port}'"
        );
        let command = vec!["sh".to_string(), "-c".to_string(), script];

        let started = Instant::now();
        match executor.execute(pod, &command, self.timeout).await {
            Ok(_) => {
                let latency_ms = started.elapsed().as_millis() as u64;
                debug!(pod = %pod, host = %host, port, latency_ms, "probe succeeded");
                Some(latency_ms)
            }
            Err(error) => {
                debug!(
                    pod = %pod,
                    host = %host,
                    port,
                    error = %error,
                    "probe failed, treating target as unreachable"
                );
                None
            }
        }
    }
}
