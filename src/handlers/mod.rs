// Handler modules
pub mod migrate;
pub mod mutating;

// Re-export all handler functions
pub use migrate::{MigrateOptions, handle_migrate};
pub use mutating::{check_mutations, handle_mutating_pod, handle_mutating_pods, handle_mutating_psp};

use crate::analyzer::pspmigrate::ClusterClient;
use crate::config::types::Config;
use crate::error::Result;

/// Connect to the cluster named by `context`, falling back to the configured one.
pub async fn connect(config: &Config, context: Option<&str>) -> Result<ClusterClient> {
    let context = context.or(config.cluster.context.as_deref());
    log::info!(
        "Connecting to cluster (context: {})",
        context.unwrap_or("current")
    );
    Ok(ClusterClient::connect(context, config.cluster.ignored_namespaces.clone()).await?)
}
