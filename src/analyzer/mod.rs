//! Analysis of cluster workloads for the PSP to PSA migration.

pub mod pspmigrate;
