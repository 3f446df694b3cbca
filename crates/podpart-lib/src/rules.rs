//! Rule compilation
//!
//! Compiles a `PartitionSpec` into symmetric iptables rule descriptors.
//! `compile_apply` and `compile_remove` are pure functions of
//! `(spec, resolved target address, direction)`: the removal descriptor is
//! derived from the same inputs as the apply descriptor, never by editing
//! the rendered apply command. That determinism lets the orchestrator
//! recompute the exact removal rule at cleanup time without remembering the
//! original apply call.

use crate::spec::{Direction, PartitionSpec};

/// Comment tag attached to every rule so counters and manual cleanup can
/// find them.
pub const RULE_TAG: &str = "podpart";

/// Whether a descriptor inserts or deletes its rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleAction {
    Insert,
    Delete,
}

/// Drop semantics for matching packets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropMode {
    /// Drop every matching packet (hard partition).
    Full,
    /// Drop each matching packet with the given probability in percent.
    Probabilistic(u8),
}

/// One firewall rule, fully described.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleDescriptor {
    pub direction: Direction,
    pub action: RuleAction,
    /// Peer address filter: destination for egress, source for ingress.
    pub peer: Option<String>,
    /// TCP port filter: dport for egress, sport for ingress.
    pub port: Option<u16>,
    pub drop: DropMode,
}

/// Compile the rule that applies the fault.
pub fn compile_apply(
    spec: &PartitionSpec,
    target_addr: Option<&str>,
    direction: Direction,
) -> RuleDescriptor {
    descriptor(spec, target_addr, direction, RuleAction::Insert)
}

/// Compile the exact inverse of [`compile_apply`] for the same inputs.
pub fn compile_remove(
    spec: &PartitionSpec,
    target_addr: Option<&str>,
    direction: Direction,
) -> RuleDescriptor {
    descriptor(spec, target_addr, direction, RuleAction::Delete)
}

fn descriptor(
    spec: &PartitionSpec,
    target_addr: Option<&str>,
    direction: Direction,
    action: RuleAction,
) -> RuleDescriptor {
    RuleDescriptor {
        direction,
        action,
        peer: target_addr.map(str::to_owned),
        port: spec.target_port,
        drop: if spec.drop_percent >= 100 {
            DropMode::Full
        } else {
            DropMode::Probabilistic(spec.drop_percent)
        },
    }
}

impl RuleDescriptor {
    /// Chain the rule lives in.
    pub fn chain(&self) -> &'static str {
        match self.direction {
            Direction::Egress => "OUTPUT",
            Direction::Ingress => "INPUT",
        }
    }

    /// Render the full iptables argv for this rule.
    ///
    /// Insert and delete share the same match specification, so a delete
    /// always matches the rule its counterpart inserted.
    pub fn to_args(&self) -> Vec<String> {
        let mut args: Vec<String> = vec!["iptables".into()];
        match self.action {
            RuleAction::Insert => {
                args.push("-I".into());
                args.push(self.chain().into());
                args.push("1".into());
            }
            RuleAction::Delete => {
                args.push("-D".into());
                args.push(self.chain().into());
            }
        }
        if let Some(peer) = &self.peer {
            let flag = match self.direction {
                Direction::Egress => "-d",
                Direction::Ingress => "-s",
            };
            args.push(flag.into());
            args.push(peer.clone());
        }
        if let Some(port) = self.port {
            args.push("-p".into());
            args.push("tcp".into());
            let flag = match self.direction {
                Direction::Egress => "--dport",
                Direction::Ingress => "--sport",
            };
            args.push(flag.into());
            args.push(port.to_string());
        }
        if let DropMode::Probabilistic(percent) = self.drop {
            args.extend(
                ["-m", "statistic", "--mode", "random", "--probability"]
                    .iter()
                    .map(|s| s.to_string()),
            );
            args.push(format!("{:.2}", f64::from(percent) / 100.0));
        }
        args.extend(
            ["-m", "comment", "--comment", RULE_TAG, "-j", "DROP"]
                .iter()
                .map(|s| s.to_string()),
        );
        args
    }
}

/// Command that lists rule packet counters for a chain.
pub fn counter_command(direction: Direction) -> Vec<String> {
    let chain = match direction {
        Direction::Egress => "OUTPUT",
        Direction::Ingress => "INPUT",
    };
    vec![
        "sh".into(),
        "-c".into(),
        format!("iptables -nvxL {chain} | grep {RULE_TAG}"),
    ]
}

/// Sum the packet counters of tagged rules from `iptables -nvxL` output.
///
/// Returns `None` when no tagged rule line is present.
pub fn parse_packet_count(output: &str) -> Option<u64> {
    let mut total = None;
    for line in output.lines() {
        if !line.contains(RULE_TAG) {
            continue;
        }
        if let Some(packets) = line
            .split_whitespace()
            .next()
            .and_then(|field| field.parse::<u64>().ok())
        {
            *total.get_or_insert(0) += packets;
        }
    }
    total
}

/// Render the copy-paste manual cleanup command for an unrestored pod.
pub fn kubectl_remediation(namespace: &str, pod: &str, rule: &RuleDescriptor) -> String {
    format!(
        "kubectl exec -n {namespace} {pod} -- {}",
        rule.to_args().join(" ")
    )
}
