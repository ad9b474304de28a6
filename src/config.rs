//! Run settings: CLI flags and env vars over an optional TOML file over defaults

use std::path::{Path, PathBuf};

use serde::Deserialize;

use klc_logs::QueryFilter;
use klc_types::{CloudProvider, Error, LogOptions, Result};

use crate::cli::{Args, parse_pod_list};

const DEFAULT_CLOUD_TYPE: &str = "aws";
const DEFAULT_CLUSTER_NAME: &str = "blue";
const DEFAULT_AUTH_DETAILS: &str = "my-auth-profile";
const DEFAULT_NAMESPACE: &str = "default";
const DEFAULT_PODS: &[&str] = &["planner", "executor", "storage"];
const DEFAULT_OUTPUT: &str = "./logs";

/// Defaults read from the `--config` TOML file
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub cloud_type: Option<String>,
    pub cluster_name: Option<String>,
    pub auth_details: Option<String>,
    pub resource_group: Option<String>,
    pub namespace: Option<String>,
    pub kubeconfig: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub pods: Option<Vec<String>>,
    pub concurrency: Option<usize>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::parse(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    fn parse(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}

/// What a run does once the client is ready
#[derive(Debug)]
pub enum Mode {
    /// Search the listed pods and merge the matches into one file
    Filtered {
        pods: Vec<String>,
        filter: QueryFilter,
    },
    /// Export one pod's raw log
    SinglePod(String),
    /// Export every pod in the namespace
    Namespace,
}

/// Fully resolved settings for one run
#[derive(Debug)]
pub struct Settings {
    pub provider: CloudProvider,
    pub cluster_name: String,
    pub namespace: String,
    pub kubeconfig: PathBuf,
    pub output: PathBuf,
    pub log_options: LogOptions,
    pub concurrency: usize,
    pub skip_fetch: bool,
    pub mode: Mode,
}

impl Settings {
    pub fn resolve(args: Args, file: FileConfig) -> Result<Self> {
        let cloud_type = args
            .cloud_type
            .or(file.cloud_type)
            .unwrap_or_else(|| DEFAULT_CLOUD_TYPE.to_string());
        let auth_details = args
            .auth_details
            .or(file.auth_details)
            .unwrap_or_else(|| DEFAULT_AUTH_DETAILS.to_string());
        let provider = CloudProvider::from_tag(&cloud_type, &auth_details)?
            .with_resource_group(args.resource_group.or(file.resource_group));

        let pods = match (args.pods, file.pods) {
            (Some(raw), _) => parse_pod_list(&raw),
            (None, Some(list)) => parse_pod_list(&list.join(",")),
            (None, None) => DEFAULT_PODS.iter().map(|p| p.to_string()).collect(),
        };

        let concurrency = args.concurrency.or(file.concurrency).unwrap_or(1);
        if concurrency == 0 {
            return Err(Error::Config("concurrency must be at least 1".to_string()));
        }

        let mode = match (QueryFilter::new(args.query_id.as_deref()), args.pod) {
            (Some(filter), _) if !pods.is_empty() => Mode::Filtered { pods, filter },
            (_, Some(pod)) => Mode::SinglePod(pod),
            _ => Mode::Namespace,
        };

        Ok(Self {
            provider,
            cluster_name: args
                .cluster_name
                .or(file.cluster_name)
                .unwrap_or_else(|| DEFAULT_CLUSTER_NAME.to_string()),
            namespace: args
                .namespace
                .or(file.namespace)
                .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string()),
            kubeconfig: args
                .kubeconfig
                .or(file.kubeconfig)
                .unwrap_or_else(default_kubeconfig),
            output: args
                .output
                .or(file.output)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT)),
            log_options: LogOptions {
                container: args.container,
                tail_lines: args.tail_lines,
                since_seconds: args.since_seconds,
                timestamps: args.timestamps,
                previous: args.previous,
            },
            concurrency,
            skip_fetch: args.skip_fetch,
            mode,
        })
    }
}

/// `~/.kube/config`, or `.kube/config` relative to the working directory without a home
fn default_kubeconfig() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_default()
        .join(".kube")
        .join("config")
}
