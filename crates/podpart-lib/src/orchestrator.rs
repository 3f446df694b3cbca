//! Partition orchestrator
//!
//! Drives the per-pod state machine:
//! `Pending -> MeasuredPre -> Applied -> Monitoring -> Restoring ->
//! {Restored | RestoreFailed} -> MeasuredPost -> Done`.
//!
//! Pods whose apply fails short-circuit to Done with nothing to restore.
//! Restoration fires on exactly one of duration expiry or cancellation and
//! is idempotent per pod, guarded by the `applied`/`restored` flags rather
//! than by locking. Each pod's result record has a single writer for its
//! whole lifetime.

use crate::executor::RemoteExecutor;
use crate::probe::ConnectivityProber;
use crate::resolver::PodTarget;
use crate::rules;
use crate::spec::{Direction, PartitionSpec};
use futures::future;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{interval_at, sleep, Instant};
use tracing::{debug, error, info, warn};

/// Port probed when the operator gave a target but no port.
const DEFAULT_PROBE_PORT: u16 = 80;

/// Phases of the per-pod state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PodPhase {
    Pending,
    MeasuredPre,
    Applied,
    Restoring,
    Restored,
    RestoreFailed,
    MeasuredPost,
    Done,
}

/// Outcome record for one pod, finalized only after a restoration attempt
/// has been made and a post-measurement taken.
#[derive(Debug, Clone, Serialize)]
pub struct PartitionResult {
    pub pod: String,
    pub directions: Vec<Direction>,
    pub applied: bool,
    pub restored: bool,
    pub pre_latency_ms: Option<u64>,
    pub post_latency_ms: Option<u64>,
    pub packets_dropped: Option<u64>,
    /// Manual cleanup commands, filled in when restoration failed.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub remediation: Vec<String>,
}

/// Timing knobs for a run.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Monitoring tick interval while the fault is active.
    pub tick_interval: Duration,
    /// Per-probe timeout. Must stay strictly below the tick interval so a
    /// hung probe cannot stall the run; clamped at construction otherwise.
    pub probe_timeout: Duration,
    /// Timeout for apply/restore commands.
    pub exec_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(10),
            probe_timeout: Duration::from_secs(3),
            exec_timeout: Duration::from_secs(10),
        }
    }
}

/// Per-pod bookkeeping while the state machine runs.
struct PodRun {
    target: PodTarget,
    phase: PodPhase,
    /// Directions whose rule actually landed on this pod. Restoration and
    /// counter polling cover exactly this set, so a partial bidirectional
    /// apply never tries to delete a rule that was never installed.
    applied_directions: Vec<Direction>,
    result: PartitionResult,
}

impl PodRun {
    fn new(target: PodTarget, spec: &PartitionSpec) -> Self {
        let result = PartitionResult {
            pod: target.name.clone(),
            directions: spec.directions(),
            applied: false,
            restored: false,
            pre_latency_ms: None,
            post_latency_ms: None,
            packets_dropped: None,
            remediation: Vec::new(),
        };
        Self {
            target,
            phase: PodPhase::Pending,
            applied_directions: Vec::new(),
            result,
        }
    }
}

/// Coordinates fault application, monitoring and restoration across pods.
pub struct Orchestrator {
    executor: Arc<dyn RemoteExecutor>,
    prober: ConnectivityProber,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(executor: Arc<dyn RemoteExecutor>, mut config: OrchestratorConfig) -> Self {
        if config.probe_timeout >= config.tick_interval {
            let clamped = config.tick_interval / 2;
            warn!(
                probe_timeout_secs = config.probe_timeout.as_secs(),
                tick_secs = config.tick_interval.as_secs(),
                clamped_secs = clamped.as_secs(),
                "probe timeout must be shorter than the monitoring tick, clamping"
            );
            config.probe_timeout = clamped;
        }
        let prober = ConnectivityProber::new(config.probe_timeout);
        Self {
            executor,
            prober,
            config,
        }
    }

    /// Run one partition end to end and return the finalized results.
    ///
    /// `cancel` is an asynchronous interrupt: receiving a value short-circuits
    /// any remaining wait and fast-forwards to restoration for every pod
    /// already applied. Pods not yet reached never receive a rule.
    pub async fn run(
        &self,
        spec: &PartitionSpec,
        pods: Vec<PodTarget>,
        target_addr: Option<String>,
        mut cancel: broadcast::Receiver<()>,
    ) -> Vec<PartitionResult> {
        if spec.is_broad() {
            warn!(
                source = %spec.source_service,
                "no target specified: partition applies to ALL traffic from the source pods"
            );
        }
        info!(
            source = %spec.source_service,
            target = %spec.target_label(),
            pods = pods.len(),
            drop_percent = spec.drop_percent,
            duration_secs = spec.duration.as_secs(),
            dry_run = spec.dry_run,
            "starting partition run"
        );

        let mut runs: Vec<PodRun> = pods
            .into_iter()
            .map(|target| PodRun::new(target, spec))
            .collect();

        // Sequential apply keeps the log stream deterministic.
        for run in &mut runs {
            run.result.pre_latency_ms = self.measure(spec, run, target_addr.as_deref()).await;
            run.phase = PodPhase::MeasuredPre;

            match self.apply_pod(spec, run, target_addr.as_deref()).await {
                Ok(()) => {
                    run.result.applied = true;
                    run.phase = PodPhase::Applied;
                    info!(pod = %run.target.name, "partition rule applied");
                }
                Err(error) => {
                    error!(
                        pod = %run.target.name,
                        error = %error,
                        "failed to apply partition rule, excluding pod from the run"
                    );
                    run.phase = PodPhase::Done;
                }
            }
        }

        if runs.iter().any(|run| run.result.applied) {
            self.monitor(spec, &mut runs, &mut cancel).await;
        }

        for run in &mut runs {
            self.restore_pod(spec, run, target_addr.as_deref()).await;
        }

        for run in &mut runs {
            // Apply failures short-circuited to Done; nothing to measure.
            if !run.result.applied {
                continue;
            }
            run.result.post_latency_ms = self.measure(spec, run, target_addr.as_deref()).await;
            run.phase = PodPhase::MeasuredPost;
        }
        for run in &mut runs {
            run.phase = PodPhase::Done;
        }

        let restored = runs.iter().filter(|run| run.result.restored).count();
        info!(
            pods = runs.len(),
            restored,
            "partition run complete"
        );
        runs.into_iter().map(|run| run.result).collect()
    }

    /// Probe the target from inside the pod; `None` when unreachable or when
    /// the partition is broad (no target to probe).
    async fn measure(
        &self,
        spec: &PartitionSpec,
        run: &PodRun,
        target_addr: Option<&str>,
    ) -> Option<u64> {
        let host = target_addr?;
        let port = spec.target_port.unwrap_or(DEFAULT_PROBE_PORT);
        self.prober
            .probe(self.executor.as_ref(), &run.target.name, host, port)
            .await
    }

    async fn apply_pod(
        &self,
        spec: &PartitionSpec,
        run: &mut PodRun,
        target_addr: Option<&str>,
    ) -> Result<(), crate::error::ExecError> {
        for direction in spec.directions() {
            let rule = rules::compile_apply(spec, target_addr, direction);
            // No durable record of applied rules exists; a hard crash from
            // here on can leave this rule behind. Log the exact inverse so
            // the trace aids manual cleanup.
            debug!(
                pod = %run.target.name,
                remove_args = ?rules::compile_remove(spec, target_addr, direction).to_args(),
                "applying partition rule"
            );
            match self
                .executor
                .execute(&run.target.name, &rule.to_args(), self.config.exec_timeout)
                .await
            {
                Ok(_) => run.applied_directions.push(direction),
                Err(error) => {
                    if !run.applied_directions.is_empty() {
                        // A one-direction rule is in place; report the pod as
                        // applied so restoration is still attempted for it.
                        // Only the installed directions get removed later.
                        warn!(
                            pod = %run.target.name,
                            error = %error,
                            "partial apply, restoration will still run for this pod"
                        );
                        return Ok(());
                    }
                    return Err(error);
                }
            }
        }
        Ok(())
    }

    /// Wait out the fault duration, polling drop counters every tick.
    /// Breaks on whichever fires first: expiry or cancellation.
    async fn monitor(
        &self,
        spec: &PartitionSpec,
        runs: &mut [PodRun],
        cancel: &mut broadcast::Receiver<()>,
    ) {
        let deadline = sleep(spec.duration);
        tokio::pin!(deadline);

        let cancelled = async {
            loop {
                match cancel.recv().await {
                    Ok(()) => break,
                    Err(broadcast::error::RecvError::Lagged(_)) => break,
                    // Sender gone without a signal: nothing will ever cancel.
                    Err(broadcast::error::RecvError::Closed) => {
                        future::pending::<()>().await;
                    }
                }
            }
        };
        tokio::pin!(cancelled);

        let mut ticker = interval_at(
            Instant::now() + self.config.tick_interval,
            self.config.tick_interval,
        );

        loop {
            tokio::select! {
                _ = &mut deadline => {
                    info!("partition duration elapsed, restoring");
                    break;
                }
                _ = &mut cancelled => {
                    warn!("cancellation received, restoring early");
                    break;
                }
                _ = ticker.tick() => {
                    self.poll_counters(runs).await;
                }
            }
        }
    }

    /// One monitoring tick: poll drop counters for every still-applied pod.
    ///
    /// Polls run concurrently and each is bounded by the probe timeout, so a
    /// failing or hung pod cannot delay the tick for the others or disturb
    /// the master duration timer.
    async fn poll_counters(&self, runs: &mut [PodRun]) {
        let polls = runs
            .iter()
            .enumerate()
            .filter(|(_, run)| run.result.applied && !run.result.restored)
            .map(|(index, run)| {
                let pod = run.target.name.clone();
                let directions = run.applied_directions.clone();
                async move {
                    // Sum the counters over every chain this pod has a rule
                    // in; one failed chain still surfaces the others.
                    let mut total = None;
                    let mut failed = None;
                    for direction in directions {
                        let command = rules::counter_command(direction);
                        match self
                            .executor
                            .execute(&pod, &command, self.config.probe_timeout)
                            .await
                        {
                            Ok(output) => {
                                if let Some(packets) = rules::parse_packet_count(&output) {
                                    *total.get_or_insert(0) += packets;
                                }
                            }
                            Err(error) => failed = Some(error),
                        }
                    }
                    (index, total, failed)
                }
            });

        let outputs = future::join_all(polls).await;
        for (index, total, failed) in outputs {
            let run = &mut runs[index];
            if let Some(error) = failed {
                debug!(
                    pod = %run.target.name,
                    error = %error,
                    "drop counter poll failed"
                );
            }
            if let Some(packets) = total {
                run.result.packets_dropped = Some(packets);
                info!(
                    pod = %run.target.name,
                    packets_dropped = packets,
                    "partition active"
                );
            }
        }
    }

    /// Attempt restoration for one pod. Idempotent: a second call observes
    /// `restored` (or a never-applied pod) and is a no-op.
    async fn restore_pod(
        &self,
        spec: &PartitionSpec,
        run: &mut PodRun,
        target_addr: Option<&str>,
    ) {
        if !run.result.applied || run.result.restored {
            return;
        }
        run.phase = PodPhase::Restoring;

        // Remove only what was installed: a partial bidirectional apply must
        // not attempt to delete the direction that never landed.
        let mut all_removed = true;
        for direction in run.applied_directions.clone() {
            let rule = rules::compile_remove(spec, target_addr, direction);
            match self
                .executor
                .execute(&run.target.name, &rule.to_args(), self.config.exec_timeout)
                .await
            {
                Ok(_) => {}
                Err(error) => {
                    all_removed = false;
                    let remediation =
                        rules::kubectl_remediation(&spec.namespace, &run.target.name, &rule);
                    error!(
                        pod = %run.target.name,
                        error = %error,
                        "failed to restore partition rule"
                    );
                    error!(
                        pod = %run.target.name,
                        "manual remediation required: {remediation}"
                    );
                    run.result.remediation.push(remediation);
                }
            }
        }

        if all_removed {
            run.result.restored = true;
            run.phase = PodPhase::Restored;
            info!(pod = %run.target.name, "partition rule removed");
        } else {
            run.phase = PodPhase::RestoreFailed;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExecError;
    use crate::executor::DryRunExecutor;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// Scripted executor: records every call and fails apply or restore for
    /// chosen pods.
    #[derive(Default)]
    struct MockExecutor {
        calls: Mutex<Vec<(String, Vec<String>)>>,
        fail_apply: HashSet<String>,
        fail_ingress_apply: HashSet<String>,
        fail_restore: HashSet<String>,
        counter_output: Option<String>,
        ingress_counter_output: Option<String>,
    }

    impl MockExecutor {
        fn new() -> Self {
            Self::default()
        }

        fn fail_apply_for(mut self, pod: &str) -> Self {
            self.fail_apply.insert(pod.to_string());
            self
        }

        fn fail_ingress_apply_for(mut self, pod: &str) -> Self {
            self.fail_ingress_apply.insert(pod.to_string());
            self
        }

        fn fail_restore_for(mut self, pod: &str) -> Self {
            self.fail_restore.insert(pod.to_string());
            self
        }

        fn with_counter_output(mut self, output: &str) -> Self {
            self.counter_output = Some(output.to_string());
            self
        }

        fn with_ingress_counter_output(mut self, output: &str) -> Self {
            self.ingress_counter_output = Some(output.to_string());
            self
        }

        fn restore_calls(&self, pod: &str) -> usize {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|(p, command)| p == pod && command.contains(&"-D".to_string()))
                .count()
        }

        fn restore_calls_on_chain(&self, pod: &str, chain: &str) -> usize {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|(p, command)| {
                    p == pod
                        && command.contains(&"-D".to_string())
                        && command.contains(&chain.to_string())
                })
                .count()
        }

        fn apply_calls(&self, pod: &str) -> usize {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|(p, command)| p == pod && command.contains(&"-I".to_string()))
                .count()
        }

        fn counter_polls_on_chain(&self, chain: &str) -> usize {
            let needle = format!("iptables -nvxL {chain}");
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|(_, command)| command.iter().any(|arg| arg.contains(&needle)))
                .count()
        }
    }

    #[async_trait]
    impl RemoteExecutor for MockExecutor {
        async fn execute(
            &self,
            pod: &str,
            command: &[String],
            _timeout: Duration,
        ) -> Result<String, ExecError> {
            self.calls
                .lock()
                .unwrap()
                .push((pod.to_string(), command.to_vec()));

            let failed = |message: &str| ExecError::CommandFailed {
                pod: pod.to_string(),
                message: message.into(),
            };

            if command.contains(&"-I".to_string()) {
                if self.fail_apply.contains(pod) {
                    return Err(failed("injected apply failure"));
                }
                if self.fail_ingress_apply.contains(pod)
                    && command.contains(&"INPUT".to_string())
                {
                    return Err(failed("injected ingress apply failure"));
                }
                return Ok(String::new());
            }
            if command.contains(&"-D".to_string()) {
                if self.fail_restore.contains(pod) {
                    return Err(failed("injected restore failure"));
                }
                return Ok(String::new());
            }
            if command.iter().any(|arg| arg.contains("iptables -nvxL INPUT")) {
                return Ok(self.ingress_counter_output.clone().unwrap_or_default());
            }
            if command.iter().any(|arg| arg.contains("iptables -nvxL")) {
                return Ok(self.counter_output.clone().unwrap_or_default());
            }
            // Connectivity probe.
            Ok(String::new())
        }
    }

    fn spec(duration_secs: u64) -> PartitionSpec {
        PartitionSpec::new(
            "order-payment-service",
            "default",
            Some("postgres".into()),
            None,
            Some(5432),
            100,
            Duration::from_secs(duration_secs),
            false,
            false,
        )
        .unwrap()
    }

    fn pods(names: &[&str]) -> Vec<PodTarget> {
        names
            .iter()
            .map(|name| PodTarget {
                name: name.to_string(),
                address: Some("10.1.0.9".into()),
            })
            .collect()
    }

    fn orchestrator(executor: Arc<dyn RemoteExecutor>) -> Orchestrator {
        Orchestrator::new(executor, OrchestratorConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_scenario_happy_path_two_pods() {
        let executor = Arc::new(MockExecutor::new());
        let orch = orchestrator(executor.clone());
        let (_tx, rx) = broadcast::channel(1);

        let results = orch
            .run(
                &spec(5),
                pods(&["orders-a", "orders-b"]),
                Some("10.0.0.5".into()),
                rx,
            )
            .await;

        assert_eq!(results.len(), 2);
        for result in &results {
            assert!(result.applied);
            assert!(result.restored);
            assert!(result.pre_latency_ms.is_some());
            assert!(result.post_latency_ms.is_some());
            assert!(result.remediation.is_empty());
        }
        assert_eq!(executor.apply_calls("orders-a"), 1);
        assert_eq!(executor.restore_calls("orders-a"), 1);
        assert_eq!(executor.restore_calls("orders-b"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restore_failure_is_isolated_and_recorded() {
        let executor = Arc::new(MockExecutor::new().fail_restore_for("orders-b"));
        let orch = orchestrator(executor.clone());
        let (_tx, rx) = broadcast::channel(1);

        let results = orch
            .run(
                &spec(5),
                pods(&["orders-a", "orders-b"]),
                Some("10.0.0.5".into()),
                rx,
            )
            .await;

        let a = results.iter().find(|r| r.pod == "orders-a").unwrap();
        let b = results.iter().find(|r| r.pod == "orders-b").unwrap();
        assert!(a.restored);
        assert!(b.applied);
        assert!(!b.restored);
        assert_eq!(b.remediation.len(), 1);
        assert!(b.remediation[0].contains("kubectl exec -n default orders-b"));
        // The failed pod still gets a post-measurement.
        assert!(b.post_latency_ms.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_apply_failure_excludes_pod_and_skips_restore() {
        let executor = Arc::new(MockExecutor::new().fail_apply_for("orders-a"));
        let orch = orchestrator(executor.clone());
        let (_tx, rx) = broadcast::channel(1);

        let results = orch
            .run(
                &spec(5),
                pods(&["orders-a", "orders-b"]),
                Some("10.0.0.5".into()),
                rx,
            )
            .await;

        let a = results.iter().find(|r| r.pod == "orders-a").unwrap();
        assert!(!a.applied);
        assert!(!a.restored);
        assert_eq!(executor.restore_calls("orders-a"), 0);
        // The healthy pod is unaffected.
        let b = results.iter().find(|r| r.pod == "orders-b").unwrap();
        assert!(b.applied && b.restored);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interrupt_triggers_exactly_one_restore_per_pod() {
        let executor = Arc::new(MockExecutor::new());
        let orch = orchestrator(executor.clone());
        let (tx, rx) = broadcast::channel(1);

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            let _ = tx.send(());
        });

        let results = orch
            .run(
                &spec(3600),
                pods(&["orders-a", "orders-b"]),
                Some("10.0.0.5".into()),
                rx,
            )
            .await;

        for result in &results {
            assert!(result.applied && result.restored);
        }
        assert_eq!(executor.restore_calls("orders-a"), 1);
        assert_eq!(executor.restore_calls("orders-b"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restore_is_idempotent() {
        let executor = Arc::new(MockExecutor::new());
        let orch = orchestrator(executor.clone());
        let s = spec(5);

        let mut run = PodRun::new(
            PodTarget {
                name: "orders-a".into(),
                address: None,
            },
            &s,
        );
        run.result.applied = true;
        run.applied_directions.push(Direction::Egress);

        // Interrupt racing with expiry reaches this path twice.
        orch.restore_pod(&s, &mut run, Some("10.0.0.5")).await;
        orch.restore_pod(&s, &mut run, Some("10.0.0.5")).await;

        assert!(run.result.restored);
        assert_eq!(run.phase, PodPhase::Restored);
        assert_eq!(executor.restore_calls("orders-a"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dry_run_exercises_full_state_machine() {
        let executor = Arc::new(DryRunExecutor::new());
        let orch = orchestrator(executor.clone());
        let (_tx, rx) = broadcast::channel(1);

        let mut s = spec(5);
        s.dry_run = true;

        let results = orch
            .run(&s, pods(&["orders-a", "orders-b"]), Some("10.0.0.5".into()), rx)
            .await;

        for result in &results {
            assert!(result.applied);
            assert!(result.restored);
        }
        // Commands were recorded, none executed for real.
        assert!(executor.invocations() > 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_monitoring_tick_polls_drop_counters() {
        let counter_line = "    42   2940 DROP  all  --  *  *  0.0.0.0/0  10.0.0.5  /* podpart */";
        let executor = Arc::new(MockExecutor::new().with_counter_output(counter_line));
        let orch = orchestrator(executor.clone());
        let (_tx, rx) = broadcast::channel(1);

        // 25s duration with a 10s tick: two polls before expiry.
        let results = orch
            .run(&spec(25), pods(&["orders-a"]), Some("10.0.0.5".into()), rx)
            .await;

        assert_eq!(results[0].packets_dropped, Some(42));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bidirectional_applies_and_removes_both_rules() {
        let executor = Arc::new(MockExecutor::new());
        let orch = orchestrator(executor.clone());
        let (_tx, rx) = broadcast::channel(1);

        let mut s = spec(5);
        s.bidirectional = true;

        let results = orch
            .run(&s, pods(&["orders-a"]), Some("10.0.0.5".into()), rx)
            .await;

        assert!(results[0].applied && results[0].restored);
        assert_eq!(results[0].directions, vec![Direction::Egress, Direction::Ingress]);
        assert_eq!(executor.apply_calls("orders-a"), 2);
        assert_eq!(executor.restore_calls("orders-a"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bidirectional_tick_polls_both_chains() {
        let egress_line = "    42   2940 DROP  all  --  *  *  0.0.0.0/0  10.0.0.5  /* podpart */";
        let ingress_line = "    13    910 DROP  all  --  *  *  10.0.0.5  0.0.0.0/0  /* podpart */";
        let executor = Arc::new(
            MockExecutor::new()
                .with_counter_output(egress_line)
                .with_ingress_counter_output(ingress_line),
        );
        let orch = orchestrator(executor.clone());
        let (_tx, rx) = broadcast::channel(1);

        let mut s = spec(25);
        s.bidirectional = true;

        let results = orch
            .run(&s, pods(&["orders-a"]), Some("10.0.0.5".into()), rx)
            .await;

        // Each tick polls both chains and sums their counters.
        assert_eq!(results[0].packets_dropped, Some(55));
        assert!(executor.counter_polls_on_chain("OUTPUT") > 0);
        assert!(executor.counter_polls_on_chain("INPUT") > 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_bidirectional_apply_restores_only_installed_direction() {
        let executor = Arc::new(MockExecutor::new().fail_ingress_apply_for("orders-a"));
        let orch = orchestrator(executor.clone());
        let (_tx, rx) = broadcast::channel(1);

        let mut s = spec(5);
        s.bidirectional = true;

        let results = orch
            .run(&s, pods(&["orders-a"]), Some("10.0.0.5".into()), rx)
            .await;

        // The egress rule landed, so the pod counts as applied and its
        // restoration succeeds cleanly.
        assert!(results[0].applied);
        assert!(results[0].restored);
        assert!(results[0].remediation.is_empty());
        // Only the installed egress rule is deleted; the ingress rule that
        // never landed is not touched.
        assert_eq!(executor.restore_calls("orders-a"), 1);
        assert_eq!(executor.restore_calls_on_chain("orders-a", "OUTPUT"), 1);
        assert_eq!(executor.restore_calls_on_chain("orders-a", "INPUT"), 0);
    }

    /// Writer handing formatted log output to the test for assertions.
    #[derive(Clone, Default)]
    struct CaptureWriter(Arc<Mutex<Vec<u8>>>);

    impl CaptureWriter {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl std::io::Write for CaptureWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CaptureWriter {
        type Writer = CaptureWriter;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_broad_partition_warns_before_first_apply() {
        let writer = CaptureWriter::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(writer.clone())
            .with_max_level(tracing::Level::INFO)
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let executor = Arc::new(MockExecutor::new());
        let orch = orchestrator(executor.clone());
        let (_tx, rx) = broadcast::channel(1);

        let broad = PartitionSpec::new(
            "order-payment-service",
            "default",
            None,
            None,
            None,
            100,
            Duration::from_secs(5),
            false,
            false,
        )
        .unwrap();

        orch.run(&broad, pods(&["orders-a"]), None, rx).await;

        let logs = writer.contents();
        let warned_at = logs.find("ALL traffic").expect("blast-radius warning missing");
        let applied_at = logs
            .find("partition rule applied")
            .expect("apply log missing");
        assert!(
            warned_at < applied_at,
            "blast-radius warning must precede the first apply"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_broad_partition_skips_probes() {
        let executor = Arc::new(MockExecutor::new());
        let orch = orchestrator(executor.clone());
        let (_tx, rx) = broadcast::channel(1);

        let broad = PartitionSpec::new(
            "order-payment-service",
            "default",
            None,
            None,
            None,
            100,
            Duration::from_secs(5),
            false,
            false,
        )
        .unwrap();

        let results = orch.run(&broad, pods(&["orders-a"]), None, rx).await;

        assert!(results[0].applied && results[0].restored);
        assert_eq!(results[0].pre_latency_ms, None);
        assert_eq!(results[0].post_latency_ms, None);
    }

    #[test]
    fn test_probe_timeout_clamped_below_tick() {
        let config = OrchestratorConfig {
            tick_interval: Duration::from_secs(10),
            probe_timeout: Duration::from_secs(30),
            exec_timeout: Duration::from_secs(10),
        };
        let orch = Orchestrator::new(Arc::new(MockExecutor::new()), config);
        assert!(orch.config.probe_timeout < orch.config.tick_interval);
    }
}
