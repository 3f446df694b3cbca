//! Target resolution
//!
//! Turns a logical service name into the set of currently running pods and
//! a routable address for a target service. Zero running pods is a
//! legitimate result, not an error; only a failed listing call surfaces as
//! `ResolveError`.

use crate::error::ResolveError;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Pod, Service};
use kube::api::{Api, ListParams};
use kube::{Client, ResourceExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// A pod selected for fault injection. Resolved once per run, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PodTarget {
    pub name: String,
    /// Pod IP, when the cluster reported one.
    pub address: Option<String>,
}

/// Pod listing and service address resolution.
#[async_trait]
pub trait TargetResolver: Send + Sync {
    /// List the currently running pods carrying `app=<service_label>`.
    async fn list_running_pods(
        &self,
        namespace: &str,
        service_label: &str,
    ) -> Result<Vec<PodTarget>, ResolveError>;

    /// Map a service name to a routable cluster address, falling back to
    /// the name itself when no mapping exists.
    async fn resolve_address(&self, namespace: &str, service: &str) -> String;
}

/// Resolver backed by the Kubernetes API.
pub struct KubeResolver {
    client: Client,
}

impl KubeResolver {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TargetResolver for KubeResolver {
    async fn list_running_pods(
        &self,
        namespace: &str,
        service_label: &str,
    ) -> Result<Vec<PodTarget>, ResolveError> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let params = ListParams::default().labels(&format!("app={service_label}"));
        let list = pods.list(&params).await?;

        let targets: Vec<PodTarget> = list
            .items
            .into_iter()
            .filter(|pod| {
                pod.status
                    .as_ref()
                    .and_then(|status| status.phase.as_deref())
                    == Some("Running")
            })
            .map(|pod| {
                let name = pod.name_any();
                let address = pod.status.and_then(|status| status.pod_ip);
                PodTarget { name, address }
            })
            .collect();

        info!(
            namespace = %namespace,
            service = %service_label,
            count = targets.len(),
            "resolved running pods"
        );
        Ok(targets)
    }

    async fn resolve_address(&self, namespace: &str, service: &str) -> String {
        let services: Api<Service> = Api::namespaced(self.client.clone(), namespace);
        match services.get(service).await {
            Ok(svc) => {
                let cluster_ip = pick_cluster_ip(svc.spec.and_then(|spec| spec.cluster_ip));
                match cluster_ip {
                    Some(ip) => {
                        debug!(service = %service, address = %ip, "resolved service address");
                        ip
                    }
                    None => service.to_string(),
                }
            }
            Err(error) => {
                debug!(
                    service = %service,
                    error = %error,
                    "service lookup failed, treating name as host"
                );
                service.to_string()
            }
        }
    }
}

/// Headless services report "None" as their cluster IP; treat that and an
/// empty string as unresolvable.
fn pick_cluster_ip(cluster_ip: Option<String>) -> Option<String> {
    cluster_ip.filter(|ip| !ip.is_empty() && ip != "None")
}
