//! Handler for the `migrate` command.
//!
//! Refuses to migrate while any pod is mutated by a PodSecurityPolicy, then
//! walks every namespace with pods, suggests the strictest Pod Security
//! Standards level its pods satisfy and, outside dry-run, applies it as a
//! Pod Security Admission label in the control mode the user picks.

use super::mutating::check_mutations;
use crate::analyzer::pspmigrate::formatter::{PodMutationRow, format_mutated_pods, format_suggestion};
use crate::analyzer::pspmigrate::{
    ClusterClient, ControlMode, Level, StandardsEvaluator, StaticPodPolicy, has_psa_labels,
    suggest_namespace,
};
use crate::error::{MigratorError, Result};
use colored::Colorize;
use inquire::{InquireError, Select};
use std::fmt;

/// Configuration for the migrate command
pub struct MigrateOptions {
    /// Print suggestions without labelling namespaces
    pub dry_run: bool,
    /// How pods owned by a Node are reported
    pub static_pods: StaticPodPolicy,
}

impl Default for MigrateOptions {
    fn default() -> Self {
        Self {
            dry_run: true,
            static_pods: StaticPodPolicy::default(),
        }
    }
}

/// Entry in the control mode prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ModeChoice {
    Apply(ControlMode),
    Skip,
}

impl fmt::Display for ModeChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModeChoice::Apply(mode) => write!(f, "{}", mode),
            ModeChoice::Skip => write!(f, "skip, continue with next namespace"),
        }
    }
}

fn mode_choices() -> Vec<ModeChoice> {
    ControlMode::ALL
        .into_iter()
        .map(ModeChoice::Apply)
        .chain(std::iter::once(ModeChoice::Skip))
        .collect()
}

/// Ask which control mode to apply; `None` skips the namespace.
fn prompt_control_mode(level: Level, namespace: &str) -> Result<Option<ControlMode>> {
    let selection = Select::new(
        &format!("Select control mode for {} on namespace {}", level, namespace),
        mode_choices(),
    )
    .with_help_message("Use ↑/↓ to navigate, Enter to select, Esc to skip")
    .prompt();

    match selection {
        Ok(ModeChoice::Apply(mode)) => Ok(Some(mode)),
        Ok(ModeChoice::Skip) | Err(InquireError::OperationCanceled) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn print_mutated_pods(rows: &[PodMutationRow]) {
    let mutated: Vec<&PodMutationRow> = rows.iter().filter(|r| r.mutated).collect();
    let Some(first) = mutated.first() else {
        return;
    };

    println!("The table below shows the pods that were mutated by a PSP object");
    print!("{}", format_mutated_pods(rows));
    println!(
        "There were {} pods mutated. Please modify the PodSpec such that PSP no longer needs to mutate your pod.",
        mutated.len().to_string().red().bold()
    );
    println!(
        "You can run `pspmigrator mutating pod {} -n {}` to learn more why and how your pod is being mutated.",
        first.name, first.namespace
    );
    println!("Please re-run the tool again after you've modified your PodSpecs.");
}

/// Handle the `migrate` command.
pub async fn handle_migrate(cluster: &ClusterClient, options: MigrateOptions) -> Result<()> {
    println!("Checking if any pods are being mutated by a PSP object");
    let pods = cluster.list_pods().await?;
    let rows = check_mutations(&pods, cluster, options.static_pods).await?;

    let mutated = rows.iter().filter(|r| r.mutated).count();
    if mutated > 0 {
        print_mutated_pods(&rows);
        return Err(MigratorError::MutatedPods(mutated));
    }
    log::info!("No pod out of {} is mutated by a PSP", rows.len());

    let evaluator = StandardsEvaluator::new();
    for namespace in cluster.list_namespaces().await? {
        let name = namespace.metadata.name.clone().unwrap_or_default();
        let pods = cluster.list_pods_in(&name).await?;
        if pods.is_empty() {
            println!(
                "There are no pods running in namespace {}. Skipping and going to the next one.",
                name
            );
            continue;
        }

        let suggestion = suggest_namespace(&name, &pods, &evaluator);
        for failure in &suggestion.failures {
            log::warn!(
                "Could not check the pod security standard of pod {}/{}: {}",
                name,
                failure.pod,
                failure.error
            );
        }
        print!("{}", format_suggestion(&suggestion));

        let Some(level) = suggestion.level else {
            continue;
        };

        if has_psa_labels(&namespace) {
            println!(
                "{} Namespace {} already has Pod Security Admission labels",
                "ℹ".cyan(),
                name
            );
        }

        if options.dry_run {
            println!(
                "In dry-run mode so not applying any changes. You can run this command again with --dry-run=false to apply {} on namespace {}",
                level, name
            );
            continue;
        }

        let Some(mode) = prompt_control_mode(level, &name)? else {
            log::info!("Skipping namespace {}", name);
            continue;
        };
        cluster.apply_level(&name, level, mode).await?;
        println!(
            "{} Applied pod security level {} on namespace {} in {} control mode",
            "✓".green(),
            level,
            name,
            mode
        );
        println!("Review the labels by running `kubectl get ns {} -o yaml`", name);
    }

    println!("Done with migrating namespaces with pods to PSA");
    Ok(())
}
