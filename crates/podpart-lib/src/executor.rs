//! Remote command execution
//!
//! The orchestrator reaches pods through the `RemoteExecutor` trait. The
//! production implementation rides Kubernetes pod exec; the dry-run
//! implementation always succeeds and records what it would have run, so
//! the full state machine can be exercised without touching a cluster.

use crate::error::ExecError;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, AttachParams};
use kube::Client;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tracing::debug;

/// Executes a single command against a specific pod with a bounded timeout.
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    async fn execute(
        &self,
        pod: &str,
        command: &[String],
        timeout: Duration,
    ) -> Result<String, ExecError>;
}

/// Executor backed by the Kubernetes exec subresource.
pub struct KubeExecutor {
    pods: Api<Pod>,
}

impl KubeExecutor {
    pub fn new(client: Client, namespace: &str) -> Self {
        Self {
            pods: Api::namespaced(client, namespace),
        }
    }

    async fn exec_once(&self, pod: &str, command: &[String]) -> Result<String, ExecError> {
        let params = AttachParams::default().stdout(true).stderr(true);
        let mut attached = self
            .pods
            .exec(pod, command.to_vec(), &params)
            .await
            .map_err(|source| ExecError::Transport {
                pod: pod.to_string(),
                source,
            })?;

        let mut output = String::new();
        if let Some(mut stdout) = attached.stdout() {
            let mut buf = Vec::new();
            if stdout.read_to_end(&mut buf).await.is_ok() {
                output = String::from_utf8_lossy(&buf).into_owned();
            }
        }

        let status = match attached.take_status() {
            Some(status_fut) => status_fut.await,
            None => None,
        };
        // join reports a remote-command error, not a kube::Error.
        attached.join().await.map_err(|error| ExecError::CommandFailed {
            pod: pod.to_string(),
            message: error.to_string(),
        })?;

        if let Some(status) = status {
            if status.status.as_deref() == Some("Failure") {
                return Err(ExecError::CommandFailed {
                    pod: pod.to_string(),
                    message: status.message.unwrap_or_else(|| "unknown failure".into()),
                });
            }
        }

        Ok(output)
    }
}

#[async_trait]
impl RemoteExecutor for KubeExecutor {
    async fn execute(
        &self,
        pod: &str,
        command: &[String],
        timeout: Duration,
    ) -> Result<String, ExecError> {
        debug!(pod = %pod, command = ?command, "executing remote command");
        match tokio::time::timeout(timeout, self.exec_once(pod, command)).await {
            Ok(result) => result,
            Err(_) => Err(ExecError::Timeout {
                pod: pod.to_string(),
                timeout,
            }),
        }
    }
}

/// Fixed-success executor for dry runs.
///
/// Records every command it was asked to run; performs none of them.
#[derive(Default)]
pub struct DryRunExecutor {
    invocations: AtomicUsize,
    commands: Mutex<Vec<(String, Vec<String>)>>,
}

impl DryRunExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of commands that would have been executed.
    pub fn invocations(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }

    /// The recorded (pod, command) pairs, in call order.
    pub fn recorded(&self) -> Vec<(String, Vec<String>)> {
        self.commands.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl RemoteExecutor for DryRunExecutor {
    async fn execute(
        &self,
        pod: &str,
        command: &[String],
        _timeout: Duration,
    ) -> Result<String, ExecError> {
        debug!(pod = %pod, command = ?command, "dry run, skipping remote command");
        self.invocations.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut commands) = self.commands.lock() {
            commands.push((pod.to_string(), command.to_vec()));
        }
        Ok(String::new())
    }
}
