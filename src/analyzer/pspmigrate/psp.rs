//! PodSecurityPolicy inspection.
//!
//! `policy/v1beta1` PodSecurityPolicy was removed from Kubernetes 1.25 and is
//! not part of current `k8s-openapi` releases, so the fields needed here are
//! modelled directly and deserialized from the raw object.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::{Deserialize, Serialize};

/// Strategy rule that leaves a field untouched.
pub const RUN_AS_ANY: &str = "RunAsAny";
/// RunAsGroup rule that injects a default group.
pub const MUST_RUN_AS: &str = "MustRunAs";

/// PSP annotations that inject a default profile into admitted pods.
pub const MUTATING_ANNOTATIONS: [&str; 2] = [
    "seccomp.security.alpha.kubernetes.io/defaultProfileName",
    "apparmor.security.beta.kubernetes.io/defaultProfileName",
];

/// A `policy/v1beta1` PodSecurityPolicy, reduced to the fields that matter
/// for mutation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PodSecurityPolicy {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: PodSecurityPolicySpec,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PodSecurityPolicySpec {
    pub default_add_capabilities: Vec<String>,
    pub required_drop_capabilities: Vec<String>,
    pub se_linux: StrategyOptions,
    pub run_as_user: StrategyOptions,
    pub run_as_group: Option<StrategyOptions>,
    pub supplemental_groups: StrategyOptions,
    pub fs_group: StrategyOptions,
    pub read_only_root_filesystem: bool,
    pub default_allow_privilege_escalation: Option<bool>,
    pub allow_privilege_escalation: Option<bool>,
}

/// The `rule` of a PSP strategy (seLinux, runAsUser, fsGroup, ...).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyOptions {
    pub rule: String,
}

/// Fields and annotations of a PSP that can mutate pods.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PspMutation {
    pub mutating: bool,
    pub fields: Vec<String>,
    pub annotations: Vec<String>,
}

/// Check whether a PodSecurityPolicy is potentially mutating pods.
///
/// Fields are reported in declaration order, annotations sorted by key.
pub fn is_psp_mutating(psp: &PodSecurityPolicy) -> PspMutation {
    let spec = &psp.spec;
    let checks: [(&str, bool); 10] = [
        ("DefaultAddCapabilities", !spec.default_add_capabilities.is_empty()),
        ("RequiredDropCapabilities", !spec.required_drop_capabilities.is_empty()),
        ("SELinux", spec.se_linux.rule != RUN_AS_ANY),
        ("RunAsUser", spec.run_as_user.rule != RUN_AS_ANY),
        (
            "RunAsGroup",
            spec.run_as_group
                .as_ref()
                .is_some_and(|g| g.rule == MUST_RUN_AS),
        ),
        ("SupplementalGroups", spec.supplemental_groups.rule != RUN_AS_ANY),
        ("FSGroup", spec.fs_group.rule != RUN_AS_ANY),
        ("ReadOnlyRootFilesystem", spec.read_only_root_filesystem),
        (
            "DefaultAllowPrivilegeEscalation",
            spec.default_allow_privilege_escalation.is_some(),
        ),
        (
            "AllowPrivilegeEscalation",
            spec.allow_privilege_escalation == Some(false),
        ),
    ];

    let fields: Vec<String> = checks
        .into_iter()
        .filter(|(_, mutating)| *mutating)
        .map(|(name, _)| name.to_string())
        .collect();

    let annotations: Vec<String> = psp
        .metadata
        .annotations
        .iter()
        .flat_map(|a| a.keys())
        .filter(|key| MUTATING_ANNOTATIONS.contains(&key.as_str()))
        .cloned()
        .collect();

    PspMutation {
        mutating: !fields.is_empty() || !annotations.is_empty(),
        fields,
        annotations,
    }
}
