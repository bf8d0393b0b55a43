//! Output formatting for migration results.
//!
//! Supports table, JSON and YAML output.

use super::psp::PspMutation;
use super::types::{MutationReport, NamespaceSuggestion, PSP_ANNOTATION};
use colored::Colorize;
use k8s_openapi::api::core::v1::Pod;
use prettytable::{Table, format, row};
use serde::{Deserialize, Serialize};

/// Output format for pod listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// ASCII table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
    /// YAML format
    Yaml,
}

impl OutputFormat {
    /// Parse from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "table" => Some(Self::Table),
            "json" => Some(Self::Json),
            "yaml" => Some(Self::Yaml),
            _ => None,
        }
    }
}

/// Error serializing machine-readable output.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML serialization failed: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Name of the PSP that admitted a pod, from its `kubernetes.io/psp` annotation.
pub fn admitting_psp(pod: &Pod) -> Option<&str> {
    pod.metadata
        .annotations
        .as_ref()
        .and_then(|a| a.get(PSP_ANNOTATION))
        .map(String::as_str)
}

/// One pod with its mutation result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodMutationRow {
    pub name: String,
    pub namespace: String,
    pub mutated: bool,
    pub psp: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub differences: Vec<String>,
}

impl PodMutationRow {
    pub fn new(pod: &Pod, report: &MutationReport) -> Self {
        Self {
            name: pod.metadata.name.clone().unwrap_or_default(),
            namespace: pod.metadata.namespace.clone().unwrap_or_default(),
            mutated: report.mutated,
            psp: admitting_psp(pod).unwrap_or_default().to_string(),
            differences: report.differences.clone(),
        }
    }
}

fn new_table() -> Table {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BOX_CHARS);
    table
}

/// Table of pods that a PSP mutated, shown before aborting a migration.
pub fn format_mutated_pods(rows: &[PodMutationRow]) -> String {
    let mut table = new_table();
    table.set_titles(row!["Pod Name", "Namespace", "PSP"]);
    for pod in rows.iter().filter(|r| r.mutated) {
        table.add_row(row![pod.name, pod.namespace, pod.psp]);
    }
    table.to_string()
}

/// Listing of PSP-admitted pods and whether each one was mutated.
pub fn format_pods(rows: &[PodMutationRow], format: OutputFormat) -> Result<String, FormatError> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(rows)?),
        OutputFormat::Yaml => Ok(serde_yaml::to_string(rows)?),
        OutputFormat::Table => {
            let mut table = new_table();
            table.set_titles(row!["Name", "Namespace", "Mutated", "PSP"]);
            for pod in rows {
                table.add_row(row![pod.name, pod.namespace, pod.mutated, pod.psp]);
            }
            Ok(table.to_string())
        }
    }
}

/// Mutation details for a single pod.
pub fn format_pod_mutation(row: &PodMutationRow) -> String {
    let mut output = format!(
        "Pod {} in namespace {} is mutated by PSP {}: {}\n",
        row.name.bright_white(),
        row.namespace.cyan(),
        if row.psp.is_empty() { "<none>" } else { row.psp.as_str() },
        if row.mutated {
            "true".red().bold()
        } else {
            "false".green()
        }
    );
    for difference in &row.differences {
        output.push_str(&format!("  {} {}\n", "-".dimmed(), difference));
    }
    output
}

/// Mutating fields and annotations of a PSP.
pub fn format_psp_mutation(name: &str, mutation: &PspMutation) -> String {
    if !mutation.mutating {
        return format!("PSP profile {} is not mutating pods\n", name.bright_white());
    }
    let list = |items: &[String]| {
        if items.is_empty() {
            "[]".to_string()
        } else {
            format!("[{}]", items.join(", "))
        }
    };
    format!(
        "PSP profile {} has the following mutating fields: {} and annotations: {}\n",
        name.bright_white(),
        list(&mutation.fields).yellow(),
        list(&mutation.annotations).yellow()
    )
}

/// Per-namespace suggestion with the level of each evaluated pod.
pub fn format_suggestion(suggestion: &NamespaceSuggestion) -> String {
    let Some(level) = suggestion.level else {
        return format!(
            "No pod in namespace {} could be evaluated; no level suggested\n",
            suggestion.namespace.cyan()
        );
    };

    let mut output = format!(
        "Suggest using {} in namespace {}\n",
        level.as_str().bright_green().bold(),
        suggestion.namespace.cyan()
    );
    if !suggestion.pods.is_empty() {
        let mut table = new_table();
        table.set_titles(row!["Pod", "Level"]);
        for pod in &suggestion.pods {
            table.add_row(row![pod.pod, pod.level]);
        }
        output.push_str(&table.to_string());
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::pspmigrate::types::{Level, PodFailure, PodLevel};

    fn pod(yaml: &str) -> Pod {
        serde_yaml::from_str(&format!("apiVersion: v1\nkind: Pod\n{yaml}")).unwrap()
    }

    fn rows() -> Vec<PodMutationRow> {
        let admitted = pod(r#"
metadata:
  name: web-1
  namespace: shop
  annotations:
    kubernetes.io/psp: restricted-psp
"#);
        let plain = pod(r#"
metadata:
  name: worker
  namespace: jobs
"#);
        vec![
            PodMutationRow::new(
                &admitted,
                &MutationReport::from_differences(vec![
                    "containers[0].securityContext.runAsUser: <unset> != 1000".to_string(),
                ]),
            ),
            PodMutationRow::new(&plain, &MutationReport::unchanged()),
        ]
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!(OutputFormat::parse("JSON"), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::parse("table"), Some(OutputFormat::Table));
        assert_eq!(OutputFormat::parse("yaml"), Some(OutputFormat::Yaml));
        assert_eq!(OutputFormat::parse("xml"), None);
    }

    #[test]
    fn test_row_reads_psp_annotation() {
        let rows = rows();
        assert_eq!(rows[0].psp, "restricted-psp");
        assert!(rows[0].mutated);
        assert_eq!(rows[1].psp, "");
        assert!(!rows[1].mutated);
    }

    #[test]
    fn test_mutated_pods_table_lists_only_mutated() {
        let table = format_mutated_pods(&rows());
        assert!(table.contains("Pod Name"));
        assert!(table.contains("web-1"));
        assert!(table.contains("restricted-psp"));
        assert!(!table.contains("worker"));
    }

    #[test]
    fn test_pods_json() {
        let json = format_pods(&rows(), OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value[0]["name"], "web-1");
        assert_eq!(value[0]["mutated"], true);
        assert_eq!(value[1]["namespace"], "jobs");
        assert!(value[1].get("differences").is_none());
    }

    #[test]
    fn test_pods_yaml() {
        let yaml = format_pods(&rows(), OutputFormat::Yaml).unwrap();
        let value: Vec<PodMutationRow> = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(value, rows());
    }

    #[test]
    fn test_pods_table() {
        let table = format_pods(&rows(), OutputFormat::Table).unwrap();
        assert!(table.contains("Mutated"));
        assert!(table.contains("worker"));
        assert!(table.contains("false"));
    }

    #[test]
    fn test_pod_mutation_lists_differences() {
        let output = format_pod_mutation(&rows()[0]);
        assert!(output.contains("runAsUser: <unset> != 1000"));
    }

    #[test]
    fn test_psp_mutation() {
        let mutation = PspMutation {
            mutating: true,
            fields: vec!["DefaultAddCapabilities".to_string()],
            annotations: vec![],
        };
        let output = format_psp_mutation("custom", &mutation);
        assert!(output.contains("[DefaultAddCapabilities]"));
        assert!(output.contains("[]"));

        let output = format_psp_mutation("permissive", &PspMutation::default());
        assert!(output.contains("is not mutating pods"));
    }

    #[test]
    fn test_suggestion() {
        let suggestion = NamespaceSuggestion {
            namespace: "shop".to_string(),
            level: Some(Level::Baseline),
            pods: vec![
                PodLevel {
                    pod: "web-1".to_string(),
                    level: Level::Restricted,
                },
                PodLevel {
                    pod: "web-2".to_string(),
                    level: Level::Baseline,
                },
            ],
            failures: vec![],
        };
        let output = format_suggestion(&suggestion);
        assert!(output.contains("web-2"));
        assert!(output.contains("restricted"));

        let none = NamespaceSuggestion {
            namespace: "broken".to_string(),
            level: None,
            pods: vec![],
            failures: vec![PodFailure {
                pod: "x".to_string(),
                error: "no spec".to_string(),
            }],
        };
        assert!(format_suggestion(&none).contains("no level suggested"));
    }
}
