//! Kubernetes client for kube-log-collector
//!
//! This crate provides credential fetching through the cloud provider CLIs,
//! client construction from a kubeconfig file, and pod log access.

mod client;
mod credentials;
mod source;

pub use client::KubeClient;
pub use credentials::{FetchCommand, fetch_kubeconfig};
pub use source::{LogReader, LogSource};

// Re-export types that are used in our public API
pub use klc_types::{CloudProvider, Error, LogOptions, PodInfo, PodStatus, Result};
