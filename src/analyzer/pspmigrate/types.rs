//! Core types shared by the mutation detector and the level suggester.
//!
//! - `Level` - Pod Security Standards levels, ordered `Restricted < Baseline < Privileged`
//! - `ControlMode` - PSA label modes (`enforce`, `audit`, `warn`)
//! - `ControllerKind` - owner kinds whose pod template can be fetched
//! - `StaticPodPolicy` - how pods owned by a `Node` are reported
//! - `MutationReport` - outcome of comparing a pod with its controller template
//! - `NamespaceSuggestion` - aggregated level for one namespace

use serde::{Deserialize, Serialize};
use std::fmt;

/// Label prefix used by Pod Security Admission on namespaces.
pub const PSA_LABEL_PREFIX: &str = "pod-security.kubernetes.io";

/// Annotation set by the PSP admission controller on admitted pods.
pub const PSP_ANNOTATION: &str = "kubernetes.io/psp";

/// Pod Security Standards levels.
///
/// Ordered from most to least restrictive, so `max` over a set of levels
/// yields the most permissive one.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Restricted,
    Baseline,
    Privileged,
}

impl Level {
    /// Levels probed for a single pod, most restrictive first.
    /// `Privileged` is never probed: it is the fallback.
    pub const PROBE_ORDER: [Level; 2] = [Level::Restricted, Level::Baseline];

    /// Parse a level from a string (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "restricted" => Some(Self::Restricted),
            "baseline" => Some(Self::Baseline),
            "privileged" => Some(Self::Privileged),
            _ => None,
        }
    }

    /// Get the label value for this level.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Restricted => "restricted",
            Self::Baseline => "baseline",
            Self::Privileged => "privileged",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// PSA control modes, each one a namespace label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlMode {
    Enforce,
    Audit,
    Warn,
}

impl ControlMode {
    pub const ALL: [ControlMode; 3] = [ControlMode::Enforce, ControlMode::Audit, ControlMode::Warn];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Enforce => "enforce",
            Self::Audit => "audit",
            Self::Warn => "warn",
        }
    }

    /// Namespace label key for this mode, e.g. `pod-security.kubernetes.io/enforce`.
    pub fn label_key(&self) -> String {
        format!("{}/{}", PSA_LABEL_PREFIX, self.as_str())
    }
}

impl fmt::Display for ControlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Controller kinds whose pod template can be compared with a running pod.
///
/// Deployments are covered through their ReplicaSets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControllerKind {
    ReplicaSet,
    DaemonSet,
}

impl ControllerKind {
    /// Parse an owner reference kind. Matching is exact, like the API server.
    pub fn parse(kind: &str) -> Option<Self> {
        match kind {
            "ReplicaSet" => Some(Self::ReplicaSet),
            "DaemonSet" => Some(Self::DaemonSet),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReplicaSet => "ReplicaSet",
            Self::DaemonSet => "DaemonSet",
        }
    }
}

impl fmt::Display for ControllerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How to report a pod whose controlling owner is a `Node` (a static pod).
///
/// Static pods have no controller template, so there is nothing to compare.
/// The default reports them as not mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StaticPodPolicy {
    /// Return an empty, non-mutated report.
    #[default]
    TreatAsNotMutated,
    /// Return `MutationError::StaticPod`.
    ReportUnsupported,
}

/// Result of comparing a pod with its controller template.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationReport {
    /// Whether any security-relevant field differs.
    pub mutated: bool,
    /// Human-readable differences, in check order.
    pub differences: Vec<String>,
}

impl MutationReport {
    /// A report with no differences.
    pub fn unchanged() -> Self {
        Self::default()
    }

    /// Build a report from a list of differences.
    pub fn from_differences(differences: Vec<String>) -> Self {
        Self {
            mutated: !differences.is_empty(),
            differences,
        }
    }
}

/// Suggested level for a single pod.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodLevel {
    pub pod: String,
    pub level: Level,
}

/// A pod whose level could not be evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodFailure {
    pub pod: String,
    pub error: String,
}

/// Aggregated suggestion for one namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceSuggestion {
    pub namespace: String,
    /// `None` when no pod could be evaluated (including an empty namespace).
    pub level: Option<Level>,
    pub pods: Vec<PodLevel>,
    pub failures: Vec<PodFailure>,
}

impl NamespaceSuggestion {
    /// True when the namespace had no pods at all.
    pub fn is_empty(&self) -> bool {
        self.pods.is_empty() && self.failures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordering() {
        assert!(Level::Restricted < Level::Baseline);
        assert!(Level::Baseline < Level::Privileged);
        assert_eq!(
            [Level::Baseline, Level::Privileged, Level::Restricted]
                .into_iter()
                .max(),
            Some(Level::Privileged)
        );
    }

    #[test]
    fn test_level_parse_and_display() {
        assert_eq!(Level::parse("Baseline"), Some(Level::Baseline));
        assert_eq!(Level::parse("none"), None);
        assert_eq!(Level::Restricted.to_string(), "restricted");
        assert_eq!(
            serde_json::to_string(&Level::Privileged).unwrap(),
            "\"privileged\""
        );
    }

    #[test]
    fn test_control_mode_label_key() {
        assert_eq!(
            ControlMode::Enforce.label_key(),
            "pod-security.kubernetes.io/enforce"
        );
        assert_eq!(ControlMode::Warn.label_key(), "pod-security.kubernetes.io/warn");
    }

    #[test]
    fn test_controller_kind_parse() {
        assert_eq!(ControllerKind::parse("ReplicaSet"), Some(ControllerKind::ReplicaSet));
        assert_eq!(ControllerKind::parse("DaemonSet"), Some(ControllerKind::DaemonSet));
        assert_eq!(ControllerKind::parse("StatefulSet"), None);
        assert_eq!(ControllerKind::parse("replicaset"), None);
    }

    #[test]
    fn test_static_pod_policy_serde() {
        let policy: StaticPodPolicy = serde_json::from_str("\"report-unsupported\"").unwrap();
        assert_eq!(policy, StaticPodPolicy::ReportUnsupported);
        assert_eq!(StaticPodPolicy::default(), StaticPodPolicy::TreatAsNotMutated);
    }

    #[test]
    fn test_report_from_differences() {
        assert!(!MutationReport::from_differences(Vec::new()).mutated);
        assert!(MutationReport::from_differences(vec!["x".to_string()]).mutated);
    }
}
