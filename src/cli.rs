use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pspmigrator")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Migrate namespaces from PodSecurityPolicy to Pod Security Admission")]
#[command(long_about = "Checks whether running pods were mutated by a PodSecurityPolicy, suggests the strictest Pod Security Standards level each namespace can enforce and applies it as a Pod Security Admission label.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Kubeconfig context to use instead of the current one
    #[arg(long, global = true, value_name = "CONTEXT")]
    pub context: Option<String>,

    /// Enable verbose logging (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Interactive command to migrate from PSP to PSA
    Migrate {
        /// Only print suggestions; set to false to apply labels
        #[arg(long, value_name = "BOOL", action = ArgAction::Set, num_args = 0..=1, default_missing_value = "true")]
        dry_run: Option<bool>,
    },

    /// Check if pods or PodSecurityPolicies are mutating
    Mutating {
        #[command(subcommand)]
        command: MutatingCommand,
    },
}

#[derive(Subcommand)]
pub enum MutatingCommand {
    /// Check if a pod is being mutated by a PSP policy
    Pod {
        /// Name of the pod
        name: String,

        /// Namespace of the pod
        #[arg(short, long)]
        namespace: String,
    },

    /// Check all pods across all namespaces in a cluster for being mutated by PSP
    Pods {
        /// Output the listing as JSON
        #[arg(long, conflicts_with = "yaml")]
        json: bool,

        /// Output the listing as YAML
        #[arg(long)]
        yaml: bool,
    },

    /// Check if a PSP is mutating pods
    Psp {
        /// Name of the PodSecurityPolicy
        name: String,
    },
}

impl Cli {
    /// Initialize logging based on verbosity level
    pub fn init_logging(&self) {
        if self.quiet {
            return;
        }

        let level = match self.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        };

        env_logger::Builder::from_default_env()
            .filter_level(level)
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_migrate_dry_run_values() {
        let cli = Cli::try_parse_from(["pspmigrator", "migrate"]).unwrap();
        assert!(matches!(cli.command, Commands::Migrate { dry_run: None }));

        let cli = Cli::try_parse_from(["pspmigrator", "migrate", "--dry-run=false"]).unwrap();
        assert!(matches!(cli.command, Commands::Migrate { dry_run: Some(false) }));

        let cli = Cli::try_parse_from(["pspmigrator", "migrate", "--dry-run"]).unwrap();
        assert!(matches!(cli.command, Commands::Migrate { dry_run: Some(true) }));
    }

    #[test]
    fn test_mutating_pod_requires_namespace() {
        assert!(Cli::try_parse_from(["pspmigrator", "mutating", "pod", "web"]).is_err());

        let cli =
            Cli::try_parse_from(["pspmigrator", "mutating", "pod", "web", "-n", "shop", "-vv"])
                .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Mutating {
                command: MutatingCommand::Pod { name, namespace },
            } => {
                assert_eq!(name, "web");
                assert_eq!(namespace, "shop");
            }
            _ => panic!("expected mutating pod"),
        }
    }

    #[test]
    fn test_pods_output_flags_conflict() {
        assert!(Cli::try_parse_from(["pspmigrator", "mutating", "pods", "--json", "--yaml"]).is_err());
        let cli = Cli::try_parse_from(["pspmigrator", "mutating", "pods", "--yaml"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Mutating {
                command: MutatingCommand::Pods { json: false, yaml: true }
            }
        ));
    }

    #[test]
    fn test_global_context_flag() {
        let cli = Cli::try_parse_from([
            "pspmigrator",
            "mutating",
            "psp",
            "restricted",
            "--context",
            "staging",
        ])
        .unwrap();
        assert_eq!(cli.context.as_deref(), Some("staging"));
    }
}
