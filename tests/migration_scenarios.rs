use k8s_openapi::api::core::v1::{Pod, PodTemplateSpec};
use pspmigrator::analyzer::pspmigrate::{
    ControllerKind, ControllerLookup, Level, LookupError, PodSecurityPolicy, StandardsEvaluator,
    StaticPodPolicy, aggregate, detect_mutation, is_psp_mutating, suggest_level, suggest_namespace,
};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

fn fixture(path: &str) -> String {
    let path = Path::new("tests/fixtures").join(path);
    fs::read_to_string(&path).unwrap_or_else(|e| panic!("{}: {}", path.display(), e))
}

fn pod(name: &str) -> Pod {
    serde_yaml::from_str(&fixture(&format!("pods/{name}.yaml"))).unwrap()
}

fn template(name: &str) -> PodTemplateSpec {
    serde_yaml::from_str(&fixture(&format!("templates/{name}.yaml"))).unwrap()
}

fn psp(name: &str) -> PodSecurityPolicy {
    serde_json::from_str(&fixture(&format!("psp/{name}.json"))).unwrap()
}

/// Controller templates keyed by kind and name.
#[derive(Default)]
struct FixtureLookup {
    templates: HashMap<(ControllerKind, String), PodTemplateSpec>,
}

impl FixtureLookup {
    fn with(mut self, kind: ControllerKind, name: &str, template: PodTemplateSpec) -> Self {
        self.templates.insert((kind, name.to_string()), template);
        self
    }
}

impl ControllerLookup for FixtureLookup {
    async fn fetch_controller_template(
        &self,
        kind: ControllerKind,
        name: &str,
        namespace: &str,
    ) -> Result<PodTemplateSpec, LookupError> {
        self.templates
            .get(&(kind, name.to_string()))
            .cloned()
            .ok_or_else(|| LookupError::NotFound {
                kind,
                name: name.to_string(),
                namespace: namespace.to_string(),
            })
    }
}

#[test]
fn psp_with_default_capabilities_is_mutating() {
    let result = is_psp_mutating(&psp("default-capabilities"));
    assert!(result.mutating);
    assert_eq!(result.fields, vec!["DefaultAddCapabilities"]);
    assert!(result.annotations.is_empty());
}

#[test]
fn restricted_psp_reports_fields_and_default_profiles() {
    let result = is_psp_mutating(&psp("restricted"));
    assert!(result.mutating);
    assert_eq!(
        result.fields,
        vec![
            "RequiredDropCapabilities",
            "RunAsUser",
            "SupplementalGroups",
            "FSGroup",
            "AllowPrivilegeEscalation",
        ]
    );
    assert_eq!(
        result.annotations,
        vec![
            "apparmor.security.beta.kubernetes.io/defaultProfileName",
            "seccomp.security.alpha.kubernetes.io/defaultProfileName",
        ]
    );
}

#[test]
fn plain_nginx_pod_suggests_baseline() {
    let evaluator = StandardsEvaluator::new();
    assert_eq!(suggest_level(&pod("nginx"), &evaluator), Ok(Level::Baseline));
}

#[test]
fn privileged_pod_suggests_privileged() {
    let evaluator = StandardsEvaluator::new();
    assert_eq!(suggest_level(&pod("privileged"), &evaluator), Ok(Level::Privileged));
}

#[test]
fn hardened_pod_suggests_restricted() {
    let evaluator = StandardsEvaluator::new();
    assert_eq!(suggest_level(&pod("hardened"), &evaluator), Ok(Level::Restricted));
}

#[test]
fn namespace_takes_the_most_permissive_level() {
    let evaluator = StandardsEvaluator::new();
    let pods = vec![pod("hardened"), pod("nginx")];
    let suggestion = suggest_namespace("shop", &pods, &evaluator);
    assert_eq!(suggestion.level, Some(Level::Baseline));
    assert_eq!(suggestion.pods.len(), 2);
    assert!(suggestion.failures.is_empty());

    let levels = suggestion.pods.iter().map(|p| p.level);
    assert_eq!(aggregate(levels), suggestion.level);
}

#[tokio::test]
async fn pod_matching_its_replica_set_is_not_mutated() {
    let lookup =
        FixtureLookup::default().with(ControllerKind::ReplicaSet, "nginx-7c5ddbdf54", template("nginx"));
    let report = detect_mutation(&pod("nginx"), &lookup, StaticPodPolicy::default())
        .await
        .unwrap();
    assert!(!report.mutated);
    assert!(report.differences.is_empty());
}

#[tokio::test]
async fn pod_rewritten_by_psp_is_mutated() {
    let lookup =
        FixtureLookup::default().with(ControllerKind::ReplicaSet, "api-5f8d9c7b6d", template("api"));
    let report = detect_mutation(&pod("hardened"), &lookup, StaticPodPolicy::default())
        .await
        .unwrap();
    assert!(report.mutated);
    assert_eq!(
        report.differences,
        vec![
            "containers[0].securityContext.readOnlyRootFilesystem: <unset> != true",
            "securityContext.runAsUser: <unset> != 1000",
            "securityContext.fsGroup: <unset> != 2000",
            "annotations[seccomp.security.alpha.kubernetes.io/pod]: <unset> != runtime/default",
        ]
    );
}

#[tokio::test]
async fn missing_controller_is_a_lookup_error() {
    let lookup = FixtureLookup::default();
    let err = detect_mutation(&pod("privileged"), &lookup, StaticPodPolicy::default())
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "DaemonSet monitoring/node-exporter not found"
    );
}
