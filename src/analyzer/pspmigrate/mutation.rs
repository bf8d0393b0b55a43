//! Detection of pods mutated by a PodSecurityPolicy.
//!
//! A pod admitted through PSP may have had its security context or its
//! seccomp/AppArmor annotations rewritten. Pod Security Admission never
//! mutates, so such pods would change behaviour after migration. The
//! detector compares the running pod with the pod template of its
//! controlling owner; any difference in a field PSP can set is reported.

use super::diff::diff_pod_against_template;
use super::types::{ControllerKind, MutationReport, StaticPodPolicy};
use k8s_openapi::api::core::v1::{Pod, PodTemplateSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use std::future::Future;

/// Owner kind used by the kubelet for static pods.
const NODE_KIND: &str = "Node";

/// Error returned by a [`ControllerLookup`].
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("failed to fetch controller: {0}")]
    Api(#[from] kube::Error),

    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        kind: ControllerKind,
        name: String,
        namespace: String,
    },

    #[error("{kind} {namespace}/{name} has no pod template")]
    MissingTemplate {
        kind: ControllerKind,
        name: String,
        namespace: String,
    },
}

/// Error type for mutation detection.
#[derive(Debug, thiserror::Error)]
pub enum MutationError {
    #[error("unsupported controller kind {0}")]
    UnsupportedControllerKind(String),

    #[error("pod {pod} is a static pod managed by node {node}; there is no controller template to compare against")]
    StaticPod { pod: String, node: String },

    /// Returned as produced by the lookup.
    #[error(transparent)]
    Lookup(#[from] LookupError),
}

/// Resolves the pod template declared by a controller.
pub trait ControllerLookup {
    fn fetch_controller_template(
        &self,
        kind: ControllerKind,
        name: &str,
        namespace: &str,
    ) -> impl Future<Output = Result<PodTemplateSpec, LookupError>> + Send;
}

/// The owner reference marked as controller, if any.
pub fn controlling_owner(pod: &Pod) -> Option<&OwnerReference> {
    pod.metadata
        .owner_references
        .as_deref()
        .unwrap_or_default()
        .iter()
        .find(|owner| owner.controller == Some(true))
}

/// Report whether a pod differs from the template of its controller.
///
/// - no controlling owner: not mutated
/// - owned by a `Node`: decided by `static_pods`
/// - owner kind other than ReplicaSet or DaemonSet: `UnsupportedControllerKind`,
///   without calling `lookup`
/// - lookup failure: returned unmodified
pub async fn detect_mutation<L>(
    pod: &Pod,
    lookup: &L,
    static_pods: StaticPodPolicy,
) -> Result<MutationReport, MutationError>
where
    L: ControllerLookup + ?Sized,
{
    let Some(owner) = controlling_owner(pod) else {
        return Ok(MutationReport::unchanged());
    };

    if owner.kind == NODE_KIND {
        return match static_pods {
            StaticPodPolicy::TreatAsNotMutated => Ok(MutationReport::unchanged()),
            StaticPodPolicy::ReportUnsupported => Err(MutationError::StaticPod {
                pod: pod.metadata.name.clone().unwrap_or_default(),
                node: owner.name.clone(),
            }),
        };
    }

    let kind = ControllerKind::parse(&owner.kind)
        .ok_or_else(|| MutationError::UnsupportedControllerKind(owner.kind.clone()))?;
    let namespace = pod.metadata.namespace.as_deref().unwrap_or("default");

    let template = lookup
        .fetch_controller_template(kind, &owner.name, namespace)
        .await?;

    Ok(MutationReport::from_differences(diff_pod_against_template(
        &template, pod,
    )))
}
