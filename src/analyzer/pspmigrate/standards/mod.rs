//! Built-in Pod Security Standards evaluator.
//!
//! Implements the baseline and restricted profiles as a list of checks over
//! a pod's metadata and spec. A pod satisfies a level when no check that
//! applies to that level forbids it; `privileged` has no checks.
//!
//! # Checks
//!
//! ## Baseline (also enforced by restricted)
//! - Privileged containers
//! - Host namespaces (network, PID, IPC)
//! - hostPath volumes and host ports
//! - Capabilities outside the default set
//! - `/proc` mount type, sysctls
//! - Seccomp `Unconfined`, AppArmor `unconfined`, custom SELinux options
//! - Windows HostProcess
//!
//! ## Restricted
//! - Volume types
//! - Privilege escalation, running as non-root, UID 0
//! - Seccomp profile, dropping `ALL` capabilities

pub mod baseline;
pub mod restricted;

use super::suggest::{EvaluationError, LevelEvaluator};
use super::types::Level;
use k8s_openapi::api::core::v1::{ContainerPort, Pod, PodSpec, SecurityContext};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::{Deserialize, Serialize};

/// A single Pod Security Standards check.
pub trait Check: Send + Sync {
    /// Stable identifier, e.g. `hostNamespaces`.
    fn id(&self) -> &str;

    /// Most permissive level this check belongs to. The check applies to that
    /// level and to every stricter one.
    fn level(&self) -> Level;

    /// Reason the pod is forbidden, or `None` if it passes.
    fn check(&self, metadata: &ObjectMeta, spec: &PodSpec) -> Option<String>;
}

/// A check backed by a plain function.
pub struct FnCheck {
    pub id: &'static str,
    pub level: Level,
    pub run: fn(&ObjectMeta, &PodSpec) -> Option<String>,
}

impl Check for FnCheck {
    fn id(&self) -> &str {
        self.id
    }

    fn level(&self) -> Level {
        self.level
    }

    fn check(&self, metadata: &ObjectMeta, spec: &PodSpec) -> Option<String> {
        (self.run)(metadata, spec)
    }
}

/// A check that forbade a pod.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckFailure {
    pub check: String,
    pub reason: String,
}

/// Evaluator over a fixed set of checks.
///
/// Build it once and share it by reference; it holds no mutable state.
pub struct StandardsEvaluator {
    checks: Vec<Box<dyn Check>>,
}

impl Default for StandardsEvaluator {
    fn default() -> Self {
        let mut checks = baseline::checks();
        checks.extend(restricted::checks());
        Self { checks }
    }
}

impl StandardsEvaluator {
    /// Evaluator with the built-in baseline and restricted checks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluator with a custom check list.
    pub fn with_checks(checks: Vec<Box<dyn Check>>) -> Self {
        Self { checks }
    }

    /// Every check that forbids the pod at `level`.
    pub fn failures(&self, pod: &Pod, level: Level) -> Result<Vec<CheckFailure>, EvaluationError> {
        let spec = pod.spec.as_ref().ok_or_else(|| {
            EvaluationError::MissingSpec(pod.metadata.name.clone().unwrap_or_default())
        })?;

        Ok(self
            .checks
            .iter()
            .filter(|check| level <= check.level())
            .filter_map(|check| {
                check.check(&pod.metadata, spec).map(|reason| CheckFailure {
                    check: check.id().to_string(),
                    reason,
                })
            })
            .collect())
    }
}

impl LevelEvaluator for StandardsEvaluator {
    fn evaluate(&self, pod: &Pod, level: Level) -> Result<bool, EvaluationError> {
        Ok(self.failures(pod, level)?.is_empty())
    }
}

/// Uniform view over containers, init containers and ephemeral containers.
pub(crate) struct ContainerView<'a> {
    pub name: &'a str,
    pub security_context: Option<&'a SecurityContext>,
    pub ports: &'a [ContainerPort],
}

pub(crate) fn all_containers(spec: &PodSpec) -> Vec<ContainerView<'_>> {
    let regular = spec
        .containers
        .iter()
        .chain(spec.init_containers.as_deref().unwrap_or_default())
        .map(|c| ContainerView {
            name: &c.name,
            security_context: c.security_context.as_ref(),
            ports: c.ports.as_deref().unwrap_or_default(),
        });
    let ephemeral = spec
        .ephemeral_containers
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(|c| ContainerView {
            name: &c.name,
            security_context: c.security_context.as_ref(),
            ports: c.ports.as_deref().unwrap_or_default(),
        });
    regular.chain(ephemeral).collect()
}

/// Format a list of container names for a failure reason.
pub(crate) fn containers_reason(what: &str, names: &[&str]) -> Option<String> {
    if names.is_empty() {
        return None;
    }
    let quoted: Vec<String> = names.iter().map(|n| format!("\"{n}\"")).collect();
    let noun = if names.len() == 1 { "container" } else { "containers" };
    Some(format!("{noun} {} {what}", quoted.join(", ")))
}

/// True when the pod declares a Windows OS; some restricted checks do not apply.
pub(crate) fn is_windows(spec: &PodSpec) -> bool {
    spec.os.as_ref().is_some_and(|os| os.name == "windows")
}

#[cfg(test)]
pub(crate) fn parse_pod(yaml: &str) -> Pod {
    serde_yaml::from_str(&format!("apiVersion: v1\nkind: Pod\n{yaml}")).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::pspmigrate::suggest::suggest_level;

    #[test]
    fn test_plain_nginx_is_baseline() {
        let pod = parse_pod(
            r#"
metadata:
  name: test-pod
spec:
  containers:
  - name: nginx
    image: nginx
"#,
        );
        let evaluator = StandardsEvaluator::new();
        assert_eq!(suggest_level(&pod, &evaluator), Ok(Level::Baseline));

        let failures = evaluator.failures(&pod, Level::Restricted).unwrap();
        let ids: Vec<&str> = failures.iter().map(|f| f.check.as_str()).collect();
        assert!(ids.contains(&"allowPrivilegeEscalation"));
        assert!(ids.contains(&"runAsNonRoot"));
        assert!(ids.contains(&"seccompProfile_restricted"));
        assert!(ids.contains(&"capabilities_restricted"));
    }

    #[test]
    fn test_privileged_container_is_privileged() {
        let pod = parse_pod(
            r#"
metadata:
  name: test-pod
spec:
  containers:
  - name: nginx
    image: nginx
    securityContext:
      privileged: true
"#,
        );
        let evaluator = StandardsEvaluator::new();
        assert_eq!(suggest_level(&pod, &evaluator), Ok(Level::Privileged));
    }

    #[test]
    fn test_hardened_pod_is_restricted() {
        let pod = parse_pod(
            r#"
metadata:
  name: hardened
spec:
  securityContext:
    runAsNonRoot: true
    seccompProfile:
      type: RuntimeDefault
  containers:
  - name: app
    image: app:1.0
    securityContext:
      allowPrivilegeEscalation: false
      capabilities:
        drop: ["ALL"]
        add: ["NET_BIND_SERVICE"]
  volumes:
  - name: cache
    emptyDir: {}
"#,
        );
        let evaluator = StandardsEvaluator::new();
        assert_eq!(suggest_level(&pod, &evaluator), Ok(Level::Restricted));
        assert!(evaluator.failures(&pod, Level::Restricted).unwrap().is_empty());
    }

    #[test]
    fn test_privileged_level_has_no_checks() {
        let pod = parse_pod(
            r#"
spec:
  hostNetwork: true
  containers:
  - name: nginx
    securityContext:
      privileged: true
"#,
        );
        let evaluator = StandardsEvaluator::new();
        assert_eq!(evaluator.evaluate(&pod, Level::Privileged), Ok(true));
        assert_eq!(evaluator.evaluate(&pod, Level::Baseline), Ok(false));
    }

    #[test]
    fn test_pod_without_spec_is_an_error() {
        let pod = Pod {
            metadata: ObjectMeta {
                name: Some("empty".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let evaluator = StandardsEvaluator::new();
        assert_eq!(
            evaluator.evaluate(&pod, Level::Restricted),
            Err(EvaluationError::MissingSpec("empty".to_string()))
        );
    }

    #[test]
    fn test_custom_check_list() {
        let evaluator = StandardsEvaluator::with_checks(vec![Box::new(FnCheck {
            id: "noHostNetwork",
            level: Level::Baseline,
            run: |_, spec| (spec.host_network == Some(true)).then(|| "hostNetwork=true".to_string()),
        })]);
        let pod = parse_pod(
            r#"
spec:
  hostNetwork: true
  containers:
  - name: web
"#,
        );
        let failures = evaluator.failures(&pod, Level::Restricted).unwrap();
        assert_eq!(
            failures,
            vec![CheckFailure {
                check: "noHostNetwork".to_string(),
                reason: "hostNetwork=true".to_string(),
            }]
        );
    }

    #[test]
    fn test_containers_reason() {
        assert_eq!(containers_reason("x", &[]), None);
        assert_eq!(
            containers_reason("must not set securityContext.privileged=true", &["a"]),
            Some("container \"a\" must not set securityContext.privileged=true".to_string())
        );
        assert_eq!(
            containers_reason("y", &["a", "b"]),
            Some("containers \"a\", \"b\" y".to_string())
        );
    }
}
