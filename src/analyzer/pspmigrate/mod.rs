//! PodSecurityPolicy to Pod Security Admission migration
//!
//! Helps move a cluster off PodSecurityPolicy by answering two questions for
//! every workload:
//!
//! - Was this pod mutated by a PSP at admission? Pod Security Admission only
//!   validates, so a mutated pod would run differently after migration.
//! - Which Pod Security Standards level (`restricted`, `baseline`,
//!   `privileged`) does it satisfy, and what is the strictest level a whole
//!   namespace can enforce?
//!
//! # Example
//!
//! ```rust,ignore
//! use pspmigrator::analyzer::pspmigrate::{
//!     ClusterClient, StandardsEvaluator, StaticPodPolicy, detect_mutation, suggest_namespace,
//! };
//!
//! let cluster = ClusterClient::connect(None, vec!["kube-system".into()]).await?;
//! for pod in cluster.list_pods().await? {
//!     let report = detect_mutation(&pod, &cluster, StaticPodPolicy::default()).await?;
//!     println!("{:?}: {:?}", pod.metadata.name, report.differences);
//! }
//!
//! let evaluator = StandardsEvaluator::new();
//! let pods = cluster.list_pods_in("shop").await?;
//! let suggestion = suggest_namespace("shop", &pods, &evaluator);
//! ```

// ============================================================================
// Core analysis
// ============================================================================

/// Core data types.
pub mod types;

/// Field-by-field comparison of pod security settings.
pub mod diff;

/// Mutation detection against the controller template.
pub mod mutation;

/// Level suggestion and namespace aggregation.
pub mod suggest;

/// PodSecurityPolicy model and mutating field detection.
pub mod psp;

/// Built-in Pod Security Standards checks.
pub mod standards;

// ============================================================================
// Cluster access and output
// ============================================================================

/// Kubernetes API access.
pub mod cluster;

/// Output formatting (table, JSON, YAML).
pub mod formatter;

pub use cluster::{ClusterClient, ClusterError, DEFAULT_IGNORED_NAMESPACES, has_psa_labels};
pub use formatter::{FormatError, OutputFormat, PodMutationRow, admitting_psp};
pub use mutation::{ControllerLookup, LookupError, MutationError, detect_mutation};
pub use psp::{PodSecurityPolicy, PspMutation, is_psp_mutating};
pub use standards::{Check, CheckFailure, StandardsEvaluator};
pub use suggest::{EvaluationError, LevelEvaluator, aggregate, suggest_level, suggest_namespace};
pub use types::{
    ControlMode, ControllerKind, Level, MutationReport, NamespaceSuggestion, PodFailure, PodLevel,
    StaticPodPolicy,
};
