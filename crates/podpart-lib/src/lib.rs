//! Core library for podpart, a network partition injector for Kubernetes
//!
//! This crate provides the building blocks for a partition run:
//! - Target resolution (running pods, service addresses)
//! - Rule compilation (symmetric apply/remove iptables descriptors)
//! - Remote command execution (kube exec, plus a dry-run stub)
//! - Connectivity probing from inside a pod
//! - The partition orchestrator and its per-pod state machine
//! - Result summarization and exit-code mapping

pub mod error;
pub mod executor;
pub mod orchestrator;
pub mod probe;
pub mod report;
pub mod resolver;
pub mod rules;
pub mod spec;

pub use error::{ExecError, ResolveError, SpecError};
pub use executor::{DryRunExecutor, KubeExecutor, RemoteExecutor};
pub use orchestrator::{Orchestrator, OrchestratorConfig, PartitionResult, PodPhase};
pub use probe::ConnectivityProber;
pub use report::summarize;
pub use resolver::{KubeResolver, PodTarget, TargetResolver};
pub use rules::{compile_apply, compile_remove, RuleDescriptor};
pub use spec::{Direction, PartitionSpec};
