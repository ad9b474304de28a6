//! Shared types for kube-log-collector
//!
//! This crate contains data structures used across multiple kube-log-collector crates.

mod error;

pub use error::{Error, Result};

// ============================================================================
// Cloud Provider Types
// ============================================================================

/// Cloud provider that owns the cluster, with the provider-specific auth qualifier
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CloudProvider {
    /// AWS EKS, authenticated with an IAM profile
    Aws { profile: String },
    /// Google GKE, located by compute zone
    Gcp { zone: String },
    /// Azure AKS, scoped to a subscription (and a resource group)
    Azure {
        subscription: String,
        resource_group: Option<String>,
    },
}

impl CloudProvider {
    /// Build a provider from a tag (`aws`, `gcp`, `azure`, any case) and its qualifier
    pub fn from_tag(tag: &str, qualifier: &str) -> Result<Self> {
        let qualifier = qualifier.trim().to_string();
        match tag.trim().to_lowercase().as_str() {
            "aws" | "eks" => Ok(Self::Aws { profile: qualifier }),
            "gcp" | "gke" | "gcloud" => Ok(Self::Gcp { zone: qualifier }),
            "azure" | "aks" => Ok(Self::Azure {
                subscription: qualifier,
                resource_group: None,
            }),
            _ => Err(Error::UnsupportedProvider(tag.to_string())),
        }
    }

    /// Attach an Azure resource group; no-op for other providers
    pub fn with_resource_group(self, group: Option<String>) -> Self {
        match self {
            Self::Azure { subscription, .. } => Self::Azure {
                subscription,
                resource_group: group.filter(|g| !g.trim().is_empty()),
            },
            other => other,
        }
    }

    /// Short display name
    pub fn label(&self) -> &'static str {
        match self {
            Self::Aws { .. } => "AWS",
            Self::Gcp { .. } => "GCP",
            Self::Azure { .. } => "Azure",
        }
    }
}

// ============================================================================
// Kubernetes Resource Types
// ============================================================================

/// Pod information
#[derive(Clone, Debug)]
pub struct PodInfo {
    pub name: String,
    pub namespace: String,
    pub status: PodStatus,
    pub containers: Vec<String>,
}

impl PodInfo {
    pub fn new(name: String, namespace: String) -> Self {
        Self {
            name,
            namespace,
            status: PodStatus::Unknown,
            containers: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PodStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

impl From<&str> for PodStatus {
    fn from(s: &str) -> Self {
        match s {
            "Pending" => Self::Pending,
            "Running" => Self::Running,
            "Succeeded" => Self::Succeeded,
            "Failed" => Self::Failed,
            _ => Self::Unknown,
        }
    }
}

// ============================================================================
// Log Types
// ============================================================================

/// Options applied to every pod log request
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LogOptions {
    /// Container to read (required by the API for multi-container pods)
    pub container: Option<String>,

    /// Only the last N lines
    pub tail_lines: Option<i64>,

    /// Only lines newer than this many seconds
    pub since_seconds: Option<i64>,

    /// Prefix each line with the RFC 3339 time the API server received it
    pub timestamps: bool,

    /// Read the previous terminated container instance
    pub previous: bool,
}
