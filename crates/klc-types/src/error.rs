use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised while fetching credentials, reading pod logs or writing output
#[derive(Debug, Error)]
pub enum Error {
    #[error("Unsupported cloud type: '{0}'. Valid types are: aws, gcp, azure")]
    UnsupportedProvider(String),

    #[error("Failed to fetch kubeconfig with `{program}`: {message}")]
    CredentialFetch { program: String, message: String },

    #[error("Failed to create Kubernetes client from {}: {message}", path.display())]
    ClientConstruction { path: PathBuf, message: String },

    #[error("Failed to list pods in namespace {namespace}: {message}")]
    PodList { namespace: String, message: String },

    #[error("Failed to get logs for pod {pod}: {message}")]
    LogStream { pod: String, message: String },

    #[error("Failed to write {}: {source}", path.display())]
    OutputWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid pod name '{0}': cannot be used as a file name")]
    InvalidPodName(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error(
        "Failed to collect logs for {} of {total} pods: {}",
        .failed.len(),
        .failed.join(", ")
    )]
    PartialCollection { failed: Vec<String>, total: usize },
}

impl Error {
    /// Process exit code for this error kind
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) => 2,
            Self::UnsupportedProvider(_) | Self::CredentialFetch { .. } => 3,
            Self::ClientConstruction { .. } => 4,
            Self::PodList { .. } | Self::LogStream { .. } => 5,
            Self::OutputWrite { .. } | Self::InvalidPodName(_) => 6,
            Self::PartialCollection { .. } => 7,
        }
    }

    pub fn log_stream(pod: &str, err: impl std::fmt::Display) -> Self {
        Self::LogStream {
            pod: pod.to_string(),
            message: err.to_string(),
        }
    }

    pub fn output_write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::OutputWrite {
            path: path.into(),
            source,
        }
    }
}
