use crate::analyzer::pspmigrate::formatter::FormatError;
use crate::analyzer::pspmigrate::{ClusterError, MutationError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MigratorError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Cluster error: {0}")]
    Cluster(#[from] ClusterError),

    #[error("Mutation check failed: {0}")]
    Mutation(#[from] MutationError),

    #[error("Output error: {0}")]
    Format(#[from] FormatError),

    #[error("Prompt error: {0}")]
    Prompt(#[from] inquire::InquireError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{kind} {name} not found")]
    NotFound { kind: &'static str, name: String },

    #[error("{0} pods are mutated by a PodSecurityPolicy; fix their PodSpecs and run the migration again")]
    MutatedPods(usize),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    ReadFailed {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid configuration in {path}: {source}")]
    ParsingFailed {
        path: String,
        source: toml::de::Error,
    },
}

pub type Result<T> = std::result::Result<T, MigratorError>;
