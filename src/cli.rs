use std::path::PathBuf;

use clap::Parser;

/// kube-log-collector - Fetch cluster credentials and save Kubernetes pod logs locally
///
/// With --query-id the listed pods are searched and every matching line is
/// merged into one time-ordered file. Without it, every pod in the namespace
/// (or just --pod) is exported verbatim.
#[derive(Parser, Debug)]
#[command(name = "kube-log-collector")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Cloud provider hosting the cluster: aws, gcp or azure [default: aws]
    #[arg(long, env = "KLC_CLOUD_TYPE")]
    pub cloud_type: Option<String>,

    /// Cluster to collect pod logs from [default: blue]
    #[arg(long, env = "KLC_CLUSTER_NAME")]
    pub cluster_name: Option<String>,

    /// AWS profile, GCP zone or Azure subscription [default: my-auth-profile]
    #[arg(long, env = "KLC_AUTH_DETAILS")]
    pub auth_details: Option<String>,

    /// Azure resource group of the cluster
    #[arg(long, env = "KLC_RESOURCE_GROUP")]
    pub resource_group: Option<String>,

    /// Namespace to collect pod logs from [default: default]
    #[arg(short = 'n', long, env = "KLC_NAMESPACE")]
    pub namespace: Option<String>,

    /// Kubeconfig file written by the provider CLI [default: ~/.kube/config]
    #[arg(long, env = "KLC_KUBECONFIG")]
    pub kubeconfig: Option<PathBuf>,

    /// Keep only lines containing this token and merge them across --pods
    #[arg(short = 'q', long, env = "KLC_QUERY_ID")]
    pub query_id: Option<String>,

    /// Comma-separated pods searched by --query-id [default: planner,executor,storage]
    #[arg(long, env = "KLC_PODS")]
    pub pods: Option<String>,

    /// Export the raw log of a single pod to <output>/<pod>.log
    #[arg(long, env = "KLC_POD", conflicts_with = "query_id")]
    pub pod: Option<String>,

    /// Directory the logs are written to [default: ./logs]
    #[arg(short = 'o', long, env = "KLC_OUTPUT")]
    pub output: Option<PathBuf>,

    /// Container to read from multi-container pods
    #[arg(short = 'c', long)]
    pub container: Option<String>,

    /// Only fetch the last N lines of each pod
    #[arg(long)]
    pub tail_lines: Option<i64>,

    /// Only fetch lines newer than this many seconds
    #[arg(long)]
    pub since_seconds: Option<i64>,

    /// Prefix every line with the time the API server received it
    #[arg(long)]
    pub timestamps: bool,

    /// Read logs of the previous container instance
    #[arg(long)]
    pub previous: bool,

    /// Pods fetched at once by --query-id [default: 1]
    #[arg(long, env = "KLC_CONCURRENCY")]
    pub concurrency: Option<usize>,

    /// Use the kubeconfig as is instead of running the provider CLI
    #[arg(long)]
    pub skip_fetch: bool,

    /// TOML file with defaults for the options above
    #[arg(long, env = "KLC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

/// Split a comma-separated pod list, trimming whitespace and dropping empties
pub fn parse_pod_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(String::from)
        .collect()
}
