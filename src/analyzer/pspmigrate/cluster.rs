//! Kubernetes cluster access for the migrator.
//!
//! Wraps a `kube::Client` and provides exactly the reads and writes the
//! migration needs: listing pods and namespaces outside the system
//! namespaces, fetching controller templates and PodSecurityPolicies, and
//! labelling namespaces with a Pod Security Admission level.
//!
//! # Prerequisites
//!
//! - Valid kubeconfig (uses default context or specified context)
//! - RBAC permissions to read pods, namespaces, replicasets, daemonsets and
//!   podsecuritypolicies, and to patch namespaces

use super::mutation::{ControllerLookup, LookupError};
use super::psp::PodSecurityPolicy;
use super::types::{ControlMode, ControllerKind, Level, PSA_LABEL_PREFIX};
use k8s_openapi::api::apps::v1::{DaemonSet, ReplicaSet};
use k8s_openapi::api::core::v1::{Namespace, Pod, PodTemplateSpec};
use kube::{
    Client, Config,
    api::{Api, ApiResource, DynamicObject, GroupVersionKind, ListParams, Patch, PatchParams},
};
use serde_json::json;
use std::collections::BTreeMap;

/// Namespaces skipped unless configured otherwise.
pub const DEFAULT_IGNORED_NAMESPACES: [&str; 3] = ["kube-system", "kube-public", "kube-node-lease"];

/// Error type for cluster operations.
#[derive(Debug, thiserror::Error)]
pub enum ClusterError {
    #[error("Kubernetes API error: {0}")]
    Api(#[from] kube::Error),

    #[error("Failed to infer Kubernetes config: {0}")]
    ConfigError(#[from] kube::config::InferConfigError),

    #[error("Failed to read kubeconfig: {0}")]
    KubeconfigError(#[from] kube::config::KubeconfigError),

    #[error("Failed to decode object: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Build a field selector excluding the given namespaces on `field`.
///
/// `ignored_namespaces_selector("metadata.name", &["a", "b"])` yields
/// `metadata.name!=a,metadata.name!=b`.
pub fn ignored_namespaces_selector<S: AsRef<str>>(field: &str, namespaces: &[S]) -> String {
    namespaces
        .iter()
        .map(|ns| format!("{}!={}", field, ns.as_ref()))
        .collect::<Vec<_>>()
        .join(",")
}

/// Whether a namespace already carries any Pod Security Admission label.
pub fn has_psa_labels(namespace: &Namespace) -> bool {
    namespace
        .metadata
        .labels
        .iter()
        .flat_map(|labels| labels.keys())
        .any(|key| key.starts_with(PSA_LABEL_PREFIX))
}

/// Kubernetes client used by the migrator.
pub struct ClusterClient {
    client: Client,
    ignored_namespaces: Vec<String>,
}

impl ClusterClient {
    /// Connect using the default kubeconfig, or a named context.
    pub async fn connect(
        context: Option<&str>,
        ignored_namespaces: Vec<String>,
    ) -> Result<Self, ClusterError> {
        let config = match context {
            Some(context) => {
                let kubeconfig = kube::config::Kubeconfig::read()?;
                Config::from_custom_kubeconfig(
                    kubeconfig,
                    &kube::config::KubeConfigOptions {
                        context: Some(context.to_string()),
                        ..Default::default()
                    },
                )
                .await?
            }
            None => Config::infer().await?,
        };
        let client = Client::try_from(config)?;
        Ok(Self::from_client(client, ignored_namespaces))
    }

    /// Wrap an existing client.
    pub fn from_client(client: Client, ignored_namespaces: Vec<String>) -> Self {
        Self {
            client,
            ignored_namespaces,
        }
    }

    pub fn ignored_namespaces(&self) -> &[String] {
        &self.ignored_namespaces
    }

    fn list_params(&self, field: &str) -> ListParams {
        let selector = ignored_namespaces_selector(field, &self.ignored_namespaces);
        if selector.is_empty() {
            ListParams::default()
        } else {
            ListParams::default().fields(&selector)
        }
    }

    /// All pods outside the ignored namespaces.
    pub async fn list_pods(&self) -> Result<Vec<Pod>, ClusterError> {
        let pods: Api<Pod> = Api::all(self.client.clone());
        let list = pods.list(&self.list_params("metadata.namespace")).await?;
        log::debug!("Listed {} pods across namespaces", list.items.len());
        Ok(list.items)
    }

    /// All pods of one namespace.
    pub async fn list_pods_in(&self, namespace: &str) -> Result<Vec<Pod>, ClusterError> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        Ok(pods.list(&ListParams::default()).await?.items)
    }

    /// All namespaces except the ignored ones.
    pub async fn list_namespaces(&self) -> Result<Vec<Namespace>, ClusterError> {
        let namespaces: Api<Namespace> = Api::all(self.client.clone());
        Ok(namespaces.list(&self.list_params("metadata.name")).await?.items)
    }

    /// A single pod, or `None` if it does not exist.
    pub async fn get_pod(&self, namespace: &str, name: &str) -> Result<Option<Pod>, ClusterError> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        Ok(pods.get_opt(name).await?)
    }

    /// A PodSecurityPolicy, or `None` if it does not exist.
    ///
    /// Read through the dynamic API since the typed resource is gone from
    /// current Kubernetes releases.
    pub async fn get_pod_security_policy(
        &self,
        name: &str,
    ) -> Result<Option<PodSecurityPolicy>, ClusterError> {
        let gvk = GroupVersionKind::gvk("policy", "v1beta1", "PodSecurityPolicy");
        let resource = ApiResource::from_gvk_with_plural(&gvk, "podsecuritypolicies");
        let api: Api<DynamicObject> = Api::all_with(self.client.clone(), &resource);

        match api.get_opt(name).await? {
            Some(object) => {
                let value = serde_json::to_value(&object)?;
                Ok(Some(serde_json::from_value(value)?))
            }
            None => Ok(None),
        }
    }

    /// Label a namespace with `pod-security.kubernetes.io/<mode>=<level>`.
    pub async fn apply_level(
        &self,
        namespace: &str,
        level: Level,
        mode: ControlMode,
    ) -> Result<Namespace, ClusterError> {
        let namespaces: Api<Namespace> = Api::all(self.client.clone());
        let labels = BTreeMap::from([(mode.label_key(), level.as_str())]);
        let patch = json!({ "metadata": { "labels": labels } });
        log::debug!("Patching namespace {} with {}={}", namespace, mode.label_key(), level);
        Ok(namespaces
            .patch(namespace, &PatchParams::default(), &Patch::Merge(&patch))
            .await?)
    }
}

impl ControllerLookup for ClusterClient {
    async fn fetch_controller_template(
        &self,
        kind: ControllerKind,
        name: &str,
        namespace: &str,
    ) -> Result<PodTemplateSpec, LookupError> {
        let not_found = || LookupError::NotFound {
            kind,
            name: name.to_string(),
            namespace: namespace.to_string(),
        };
        let template = match kind {
            ControllerKind::ReplicaSet => {
                let api: Api<ReplicaSet> = Api::namespaced(self.client.clone(), namespace);
                let replica_set = api.get_opt(name).await?.ok_or_else(not_found)?;
                replica_set.spec.and_then(|spec| spec.template)
            }
            ControllerKind::DaemonSet => {
                let api: Api<DaemonSet> = Api::namespaced(self.client.clone(), namespace);
                let daemon_set = api.get_opt(name).await?.ok_or_else(not_found)?;
                daemon_set.spec.map(|spec| spec.template)
            }
        };

        template.ok_or_else(|| LookupError::MissingTemplate {
            kind,
            name: name.to_string(),
            namespace: namespace.to_string(),
        })
    }
}
