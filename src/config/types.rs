use crate::analyzer::pspmigrate::{DEFAULT_IGNORED_NAMESPACES, StaticPodPolicy};
use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub cluster: ClusterConfig,
    #[serde(default)]
    pub mutation: MutationConfig,
    #[serde(default)]
    pub migrate: MigrateConfig,
}

/// Cluster connection configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Kubeconfig context; the current context when unset
    pub context: Option<String>,
    /// Namespaces never inspected or labelled
    pub ignored_namespaces: Vec<String>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            context: None,
            ignored_namespaces: DEFAULT_IGNORED_NAMESPACES
                .iter()
                .map(|ns| ns.to_string())
                .collect(),
        }
    }
}

/// Mutation check configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MutationConfig {
    pub static_pods: StaticPodPolicy,
}

/// Migration configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrateConfig {
    pub dry_run: bool,
}

impl Default for MigrateConfig {
    fn default() -> Self {
        Self { dry_run: true }
    }
}
