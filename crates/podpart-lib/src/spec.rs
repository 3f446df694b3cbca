//! Partition specification
//!
//! A `PartitionSpec` is built once from operator input, validated, and never
//! mutated afterwards. Everything downstream (rule compilation, the
//! orchestrator, the reporter) is a function of this value.

use crate::error::SpecError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Traffic direction relative to a source pod.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Outbound traffic from the pod.
    Egress,
    /// Inbound traffic to the pod.
    Ingress,
}

/// Immutable description of one partition run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionSpec {
    /// Service whose pods receive the fault rules.
    pub source_service: String,
    /// Namespace the source pods live in.
    pub namespace: String,
    /// Target service to cut off, resolved to a cluster address.
    pub target_service: Option<String>,
    /// Target host to cut off, used verbatim.
    pub target_host: Option<String>,
    /// Restrict the partition to a single TCP port.
    pub target_port: Option<u16>,
    /// Percentage of matching packets to drop, 1-100.
    pub drop_percent: u8,
    /// How long the fault stays applied before restoration.
    pub duration: Duration,
    /// Drop traffic in both directions instead of egress only.
    pub bidirectional: bool,
    /// Run the full state machine without touching the cluster.
    pub dry_run: bool,
}

impl PartitionSpec {
    /// Validate and build a spec.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        source_service: impl Into<String>,
        namespace: impl Into<String>,
        target_service: Option<String>,
        target_host: Option<String>,
        target_port: Option<u16>,
        drop_percent: u8,
        duration: Duration,
        bidirectional: bool,
        dry_run: bool,
    ) -> Result<Self, SpecError> {
        if !(1..=100).contains(&drop_percent) {
            return Err(SpecError::DropPercentOutOfRange(drop_percent));
        }
        if target_service.is_some() && target_host.is_some() {
            return Err(SpecError::ConflictingTargets);
        }

        Ok(Self {
            source_service: source_service.into(),
            namespace: namespace.into(),
            target_service,
            target_host,
            target_port,
            drop_percent,
            duration,
            bidirectional,
            dry_run,
        })
    }

    /// True when no target is given and the partition covers all traffic.
    ///
    /// A broad partition must be flagged to the operator before any
    /// destructive call is made.
    pub fn is_broad(&self) -> bool {
        self.target_service.is_none() && self.target_host.is_none()
    }

    /// The directions rules are compiled for.
    pub fn directions(&self) -> Vec<Direction> {
        if self.bidirectional {
            vec![Direction::Egress, Direction::Ingress]
        } else {
            vec![Direction::Egress]
        }
    }

    /// Display name of the target for log lines and the summary.
    pub fn target_label(&self) -> String {
        self.target_service
            .clone()
            .or_else(|| self.target_host.clone())
            .unwrap_or_else(|| "all traffic".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(drop_percent: u8, target_service: Option<&str>) -> Result<PartitionSpec, SpecError> {
        PartitionSpec::new(
            "orders",
            "default",
            target_service.map(String::from),
            None,
            None,
            drop_percent,
            Duration::from_secs(60),
            false,
            false,
        )
    }

    #[test]
    fn test_drop_percent_bounds() {
        assert!(spec(0, Some("postgres")).is_err());
        assert!(spec(1, Some("postgres")).is_ok());
        assert!(spec(100, Some("postgres")).is_ok());
        assert!(spec(101, Some("postgres")).is_err());
    }

    #[test]
    fn test_conflicting_targets_rejected() {
        let result = PartitionSpec::new(
            "orders",
            "default",
            Some("postgres".into()),
            Some("10.0.0.1".into()),
            None,
            100,
            Duration::from_secs(60),
            false,
            false,
        );
        assert!(matches!(result, Err(SpecError::ConflictingTargets)));
    }

    #[test]
    fn test_broad_when_no_target() {
        let broad = spec(100, None).unwrap();
        assert!(broad.is_broad());
        assert_eq!(broad.target_label(), "all traffic");

        let scoped = spec(100, Some("postgres")).unwrap();
        assert!(!scoped.is_broad());
        assert_eq!(scoped.target_label(), "postgres");
    }

    #[test]
    fn test_directions() {
        let mut s = spec(100, Some("postgres")).unwrap();
        assert_eq!(s.directions(), vec![Direction::Egress]);
        s.bidirectional = true;
        assert_eq!(s.directions(), vec![Direction::Egress, Direction::Ingress]);
    }
}
