//! # pspmigrator
//!
//! A command-line tool and library for migrating Kubernetes namespaces from
//! PodSecurityPolicy (PSP) to Pod Security Admission (PSA).
//!
//! ## Features
//!
//! - **Mutation Detection**: Finds pods whose security settings were rewritten
//!   by a PSP at admission, by comparing them with their controller's template
//! - **Level Suggestion**: Computes the strictest Pod Security Standards level
//!   each pod and namespace satisfies
//! - **PSP Inspection**: Lists the fields and annotations of a PSP that mutate pods
//! - **Interactive Migration**: Applies the suggested level as a namespace label
//!
//! ## Example
//!
//! ```rust,no_run
//! use pspmigrator::analyzer::pspmigrate::{StandardsEvaluator, suggest_level};
//! use k8s_openapi::api::core::v1::Pod;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let pod: Pod = serde_yaml::from_str(&std::fs::read_to_string("pod.yaml")?)?;
//! let level = suggest_level(&pod, &StandardsEvaluator::new())?;
//! println!("{}", level);
//! # Ok(())
//! # }
//! ```

pub mod analyzer;
pub mod cli;
pub mod config;
pub mod error;
pub mod handlers;

// Re-export commonly used types and functions
pub use error::{MigratorError, Result};
pub use handlers::*;

use analyzer::pspmigrate::OutputFormat;
use cli::{Cli, Commands, MutatingCommand};
use config::types::Config;

/// The current version of the CLI tool
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub async fn run_command(cli: Cli, config: Config) -> Result<()> {
    let cluster = handlers::connect(&config, cli.context.as_deref()).await?;
    let static_pods = config.mutation.static_pods;

    match cli.command {
        Commands::Migrate { dry_run } => {
            let options = MigrateOptions {
                dry_run: dry_run.unwrap_or(config.migrate.dry_run),
                static_pods,
            };
            handlers::handle_migrate(&cluster, options).await
        }
        Commands::Mutating { command } => match command {
            MutatingCommand::Pod { name, namespace } => {
                handlers::handle_mutating_pod(&cluster, &name, &namespace, static_pods).await
            }
            MutatingCommand::Pods { json, yaml } => {
                let format = match (json, yaml) {
                    (true, _) => OutputFormat::Json,
                    (_, true) => OutputFormat::Yaml,
                    _ => OutputFormat::Table,
                };
                handlers::handle_mutating_pods(&cluster, format, static_pods).await
            }
            MutatingCommand::Psp { name } => handlers::handle_mutating_psp(&cluster, &name).await,
        },
    }
}
