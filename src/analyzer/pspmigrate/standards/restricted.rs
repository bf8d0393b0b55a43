//! Restricted profile checks.
//!
//! Restricted follows current pod hardening practice. These checks apply on
//! top of the baseline ones.

use super::{Check, FnCheck, all_containers, containers_reason, is_windows};
use crate::analyzer::pspmigrate::types::Level;
use k8s_openapi::api::core::v1::{PodSpec, Volume};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

const ALLOWED_SECCOMP_TYPES: &[&str] = &["RuntimeDefault", "Localhost"];

pub fn checks() -> Vec<Box<dyn Check>> {
    let table: [(&'static str, fn(&ObjectMeta, &PodSpec) -> Option<String>); 6] = [
        ("restrictedVolumes", restricted_volumes),
        ("allowPrivilegeEscalation", allow_privilege_escalation),
        ("runAsNonRoot", run_as_non_root),
        ("runAsUser", run_as_user),
        ("seccompProfile_restricted", seccomp),
        ("capabilities_restricted", capabilities),
    ];

    table
        .into_iter()
        .map(|(id, run)| {
            Box::new(FnCheck {
                id,
                level: Level::Restricted,
                run,
            }) as Box<dyn Check>
        })
        .collect()
}

/// Volume sources allowed under restricted.
fn is_allowed_volume(volume: &Volume) -> bool {
    volume.config_map.is_some()
        || volume.csi.is_some()
        || volume.downward_api.is_some()
        || volume.empty_dir.is_some()
        || volume.ephemeral.is_some()
        || volume.persistent_volume_claim.is_some()
        || volume.projected.is_some()
        || volume.secret.is_some()
}

fn restricted_volumes(_: &ObjectMeta, spec: &PodSpec) -> Option<String> {
    let names: Vec<&str> = spec
        .volumes
        .as_deref()
        .unwrap_or_default()
        .iter()
        .filter(|v| !is_allowed_volume(v))
        .map(|v| v.name.as_str())
        .collect();
    (!names.is_empty()).then(|| format!("volumes {} use a restricted volume type", names.join(", ")))
}

fn allow_privilege_escalation(_: &ObjectMeta, spec: &PodSpec) -> Option<String> {
    if is_windows(spec) {
        return None;
    }
    let names: Vec<&str> = all_containers(spec)
        .iter()
        .filter(|c| c.security_context.and_then(|sc| sc.allow_privilege_escalation) != Some(false))
        .map(|c| c.name)
        .collect();
    containers_reason("must set securityContext.allowPrivilegeEscalation=false", &names)
}

fn run_as_non_root(_: &ObjectMeta, spec: &PodSpec) -> Option<String> {
    let pod_non_root = spec
        .security_context
        .as_ref()
        .and_then(|sc| sc.run_as_non_root);
    if pod_non_root == Some(false) {
        return Some("pod must not set securityContext.runAsNonRoot=false".to_string());
    }

    let containers = all_containers(spec);
    let explicit_false: Vec<&str> = containers
        .iter()
        .filter(|c| c.security_context.and_then(|sc| sc.run_as_non_root) == Some(false))
        .map(|c| c.name)
        .collect();
    if !explicit_false.is_empty() {
        return containers_reason("must not set securityContext.runAsNonRoot=false", &explicit_false);
    }

    if pod_non_root == Some(true) {
        return None;
    }
    let unset: Vec<&str> = containers
        .iter()
        .filter(|c| c.security_context.and_then(|sc| sc.run_as_non_root).is_none())
        .map(|c| c.name)
        .collect();
    (!unset.is_empty()).then(|| {
        let quoted: Vec<String> = unset.iter().map(|n| format!("\"{n}\"")).collect();
        format!(
            "pod or containers {} must set securityContext.runAsNonRoot=true",
            quoted.join(", ")
        )
    })
}

fn run_as_user(_: &ObjectMeta, spec: &PodSpec) -> Option<String> {
    let pod_root = spec.security_context.as_ref().and_then(|sc| sc.run_as_user) == Some(0);
    if pod_root {
        return Some("pod must not set securityContext.runAsUser=0".to_string());
    }
    let names: Vec<&str> = all_containers(spec)
        .iter()
        .filter(|c| c.security_context.and_then(|sc| sc.run_as_user) == Some(0))
        .map(|c| c.name)
        .collect();
    containers_reason("must not set securityContext.runAsUser=0", &names)
}

fn seccomp(_: &ObjectMeta, spec: &PodSpec) -> Option<String> {
    if is_windows(spec) {
        return None;
    }
    let pod_type = spec
        .security_context
        .as_ref()
        .and_then(|sc| sc.seccomp_profile.as_ref())
        .map(|p| p.type_.as_str());
    if let Some(t) = pod_type
        && !ALLOWED_SECCOMP_TYPES.contains(&t)
    {
        return Some(format!("pod must not set securityContext.seccompProfile.type to \"{t}\""));
    }

    let containers = all_containers(spec);
    let mut bad = Vec::new();
    let mut unset = Vec::new();
    for container in &containers {
        match container
            .security_context
            .and_then(|sc| sc.seccomp_profile.as_ref())
            .map(|p| p.type_.as_str())
        {
            Some(t) if !ALLOWED_SECCOMP_TYPES.contains(&t) => bad.push(container.name),
            None if pod_type.is_none() => unset.push(container.name),
            _ => {}
        }
    }

    if !bad.is_empty() {
        return containers_reason(
            "must set securityContext.seccompProfile.type to \"RuntimeDefault\" or \"Localhost\"",
            &bad,
        );
    }
    (!unset.is_empty()).then(|| {
        let quoted: Vec<String> = unset.iter().map(|n| format!("\"{n}\"")).collect();
        format!(
            "pod or containers {} must set securityContext.seccompProfile.type to \"RuntimeDefault\" or \"Localhost\"",
            quoted.join(", ")
        )
    })
}

fn capabilities(_: &ObjectMeta, spec: &PodSpec) -> Option<String> {
    if is_windows(spec) {
        return None;
    }
    let mut not_dropping = Vec::new();
    let mut adding = Vec::new();
    for container in all_containers(spec) {
        let caps = container.security_context.and_then(|sc| sc.capabilities.as_ref());
        let drops_all = caps
            .and_then(|c| c.drop.as_deref())
            .unwrap_or_default()
            .iter()
            .any(|cap| cap == "ALL");
        if !drops_all {
            not_dropping.push(container.name);
        }
        let adds_other = caps
            .and_then(|c| c.add.as_deref())
            .unwrap_or_default()
            .iter()
            .any(|cap| cap != "NET_BIND_SERVICE");
        if adds_other {
            adding.push(container.name);
        }
    }

    let reasons: Vec<String> = [
        containers_reason("must set securityContext.capabilities.drop=[\"ALL\"]", &not_dropping),
        containers_reason(
            "must not include capabilities other than NET_BIND_SERVICE in securityContext.capabilities.add",
            &adding,
        ),
    ]
    .into_iter()
    .flatten()
    .collect();
    (!reasons.is_empty()).then(|| reasons.join("; "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::pspmigrate::standards::parse_pod;

    fn run(check: fn(&ObjectMeta, &PodSpec) -> Option<String>, yaml: &str) -> Option<String> {
        let pod = parse_pod(yaml);
        check(&pod.metadata, pod.spec.as_ref().unwrap())
    }

    #[test]
    fn test_restricted_volumes() {
        let yaml = r#"
spec:
  containers:
  - name: web
  volumes:
  - name: config
    configMap:
      name: app
  - name: data
    nfs:
      server: nfs.local
      path: /exports
"#;
        assert_eq!(
            run(restricted_volumes, yaml).as_deref(),
            Some("volumes data use a restricted volume type")
        );
    }

    #[test]
    fn test_allow_privilege_escalation_must_be_false() {
        let yaml = r#"
spec:
  containers:
  - name: set
    securityContext:
      allowPrivilegeEscalation: false
  - name: unset
"#;
        assert_eq!(
            run(allow_privilege_escalation, yaml).as_deref(),
            Some("container \"unset\" must set securityContext.allowPrivilegeEscalation=false")
        );
    }

    #[test]
    fn test_windows_pods_skip_linux_checks() {
        let yaml = r#"
spec:
  os:
    name: windows
  containers:
  - name: win
"#;
        assert_eq!(run(allow_privilege_escalation, yaml), None);
        assert_eq!(run(seccomp, yaml), None);
        assert_eq!(run(capabilities, yaml), None);
    }

    #[test]
    fn test_run_as_non_root() {
        let pod_level = r#"
spec:
  securityContext:
    runAsNonRoot: true
  containers:
  - name: web
"#;
        assert_eq!(run(run_as_non_root, pod_level), None);

        let override_false = r#"
spec:
  securityContext:
    runAsNonRoot: true
  containers:
  - name: web
    securityContext:
      runAsNonRoot: false
"#;
        assert!(run(run_as_non_root, override_false).is_some());

        let unset = r#"
spec:
  containers:
  - name: a
    securityContext:
      runAsNonRoot: true
  - name: b
"#;
        assert_eq!(
            run(run_as_non_root, unset).as_deref(),
            Some("pod or containers \"b\" must set securityContext.runAsNonRoot=true")
        );
    }

    #[test]
    fn test_run_as_user_zero() {
        let yaml = r#"
spec:
  containers:
  - name: web
    securityContext:
      runAsUser: 0
"#;
        assert!(run(run_as_user, yaml).is_some());

        let non_root = r#"
spec:
  securityContext:
    runAsUser: 1000
  containers:
  - name: web
"#;
        assert_eq!(run(run_as_user, non_root), None);
    }

    #[test]
    fn test_seccomp_restricted() {
        let pod_level = r#"
spec:
  securityContext:
    seccompProfile:
      type: RuntimeDefault
  containers:
  - name: web
"#;
        assert_eq!(run(seccomp, pod_level), None);

        let container_level = r#"
spec:
  containers:
  - name: a
    securityContext:
      seccompProfile:
        type: Localhost
        localhostProfile: profiles/a.json
  - name: b
"#;
        let reason = run(seccomp, container_level).unwrap();
        assert!(reason.contains("\"b\""));
        assert!(!reason.contains("\"a\""));

        let unconfined_override = r#"
spec:
  securityContext:
    seccompProfile:
      type: RuntimeDefault
  containers:
  - name: web
    securityContext:
      seccompProfile:
        type: Unconfined
"#;
        assert!(run(seccomp, unconfined_override).is_some());
    }

    #[test]
    fn test_capabilities_restricted() {
        let ok = r#"
spec:
  containers:
  - name: web
    securityContext:
      capabilities:
        drop: ["ALL"]
        add: ["NET_BIND_SERVICE"]
"#;
        assert_eq!(run(capabilities, ok), None);

        let bad = r#"
spec:
  containers:
  - name: web
    securityContext:
      capabilities:
        add: ["CHOWN"]
"#;
        let reason = run(capabilities, bad).unwrap();
        assert!(reason.contains("drop=[\"ALL\"]"));
        assert!(reason.contains("NET_BIND_SERVICE"));
    }

    #[test]
    fn test_all_checks_are_restricted() {
        assert!(checks().iter().all(|c| c.level() == Level::Restricted));
    }
}
