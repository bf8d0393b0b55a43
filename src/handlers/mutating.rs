//! Handlers for the `mutating` commands.
//!
//! Report whether pods were mutated by a PodSecurityPolicy at admission and
//! which fields of a PodSecurityPolicy can mutate pods.

use crate::analyzer::pspmigrate::formatter::{
    OutputFormat, PodMutationRow, format_pod_mutation, format_pods, format_psp_mutation,
};
use crate::analyzer::pspmigrate::{
    ClusterClient, ControllerLookup, MutationError, StaticPodPolicy, admitting_psp,
    detect_mutation, is_psp_mutating,
};
use crate::error::{MigratorError, Result};
use k8s_openapi::api::core::v1::Pod;

/// Run mutation detection over `pods`.
///
/// Static pods rejected under `ReportUnsupported` are logged and left out;
/// any other error stops the check.
pub async fn check_mutations<L>(
    pods: &[Pod],
    lookup: &L,
    static_pods: StaticPodPolicy,
) -> Result<Vec<PodMutationRow>>
where
    L: ControllerLookup + ?Sized,
{
    let mut rows = Vec::with_capacity(pods.len());
    for pod in pods {
        match detect_mutation(pod, lookup, static_pods).await {
            Ok(report) => rows.push(PodMutationRow::new(pod, &report)),
            Err(MutationError::StaticPod { pod, node }) => {
                log::info!("Skipping static pod {} on node {}", pod, node);
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(rows)
}

/// Handle `mutating pod <name> -n <namespace>`.
pub async fn handle_mutating_pod(
    cluster: &ClusterClient,
    name: &str,
    namespace: &str,
    static_pods: StaticPodPolicy,
) -> Result<()> {
    let pod = cluster
        .get_pod(namespace, name)
        .await?
        .ok_or_else(|| MigratorError::NotFound {
            kind: "Pod",
            name: format!("{}/{}", namespace, name),
        })?;

    let report = detect_mutation(&pod, cluster, static_pods).await?;
    print!("{}", format_pod_mutation(&PodMutationRow::new(&pod, &report)));

    if let Some(psp_name) = admitting_psp(&pod) {
        match cluster.get_pod_security_policy(psp_name).await? {
            Some(psp) => print!("{}", format_psp_mutation(psp_name, &is_psp_mutating(&psp))),
            None => println!("PodSecurityPolicy {} not found", psp_name),
        }
    }
    Ok(())
}

/// Handle `mutating pods`: every PSP-admitted pod outside the ignored namespaces.
pub async fn handle_mutating_pods(
    cluster: &ClusterClient,
    format: OutputFormat,
    static_pods: StaticPodPolicy,
) -> Result<()> {
    let pods = cluster.list_pods().await?;
    if format == OutputFormat::Table {
        println!("There are {} pods in the cluster", pods.len());
    }

    let admitted: Vec<Pod> = pods
        .into_iter()
        .filter(|pod| admitting_psp(pod).is_some())
        .collect();
    log::debug!("{} pods were admitted by a PodSecurityPolicy", admitted.len());

    let mut rows = Vec::with_capacity(admitted.len());
    for pod in &admitted {
        match detect_mutation(pod, cluster, static_pods).await {
            Ok(report) => rows.push(PodMutationRow::new(pod, &report)),
            Err(e) => log::warn!(
                "Error checking if pod {} is mutated: {}",
                pod.metadata.name.as_deref().unwrap_or_default(),
                e
            ),
        }
    }

    println!("{}", format_pods(&rows, format)?);
    Ok(())
}

/// Handle `mutating psp <name>`.
pub async fn handle_mutating_psp(cluster: &ClusterClient, name: &str) -> Result<()> {
    let psp = cluster
        .get_pod_security_policy(name)
        .await?
        .ok_or_else(|| MigratorError::NotFound {
            kind: "PodSecurityPolicy",
            name: name.to_string(),
        })?;
    print!("{}", format_psp_mutation(name, &is_psp_mutating(&psp)));
    Ok(())
}
