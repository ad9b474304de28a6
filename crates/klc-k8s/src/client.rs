//! Kubernetes client for kube-log-collector

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::Api;
use kube::api::{ListParams, LogParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use tracing::debug;

use klc_types::{Error, LogOptions, PodInfo, PodStatus, Result};

use crate::source::{LogReader, LogSource};

/// Kubernetes client wrapper built from an explicit kubeconfig file
#[derive(Clone)]
pub struct KubeClient {
    client: kube::Client,
    kubeconfig_path: PathBuf,
}

impl KubeClient {
    /// Create a client from the kubeconfig at `path`, using its current context
    pub async fn from_kubeconfig(path: &Path) -> Result<Self> {
        let construction_error = |message: String| Error::ClientConstruction {
            path: path.to_path_buf(),
            message,
        };

        let kubeconfig = Kubeconfig::read_from(path)
            .map_err(|e| construction_error(format!("failed to read kubeconfig: {}", e)))?;

        debug!(
            "Loaded kubeconfig {} (current context: {})",
            path.display(),
            kubeconfig.current_context.as_deref().unwrap_or("<none>")
        );

        let config = kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
            .await
            .map_err(|e| construction_error(format!("failed to build config: {}", e)))?;

        let client = kube::Client::try_from(config)
            .map_err(|e| construction_error(format!("failed to create client: {}", e)))?;

        Ok(Self {
            client,
            kubeconfig_path: path.to_path_buf(),
        })
    }

    /// Kubeconfig file this client was built from
    pub fn kubeconfig_path(&self) -> &Path {
        &self.kubeconfig_path
    }

    /// Convert a k8s Pod to PodInfo
    fn pod_to_info(pod: Pod, namespace: &str) -> PodInfo {
        let name = pod.metadata.name.unwrap_or_default();
        let mut info = PodInfo::new(name, namespace.to_string());

        if let Some(spec) = pod.spec {
            info.containers = spec.containers.into_iter().map(|c| c.name).collect();
        }

        if let Some(status) = pod.status {
            info.status = status
                .phase
                .as_deref()
                .map(PodStatus::from)
                .unwrap_or(PodStatus::Unknown);
        }

        info
    }
}

fn log_params(options: &LogOptions) -> LogParams {
    LogParams {
        follow: false,
        container: options.container.clone(),
        tail_lines: options.tail_lines,
        since_seconds: options.since_seconds,
        timestamps: options.timestamps,
        previous: options.previous,
        ..Default::default()
    }
}

#[async_trait]
impl LogSource for KubeClient {
    async fn list_pods(&self, namespace: &str) -> Result<Vec<PodInfo>> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let list = pods
            .list(&ListParams::default())
            .await
            .map_err(|e| Error::PodList {
                namespace: namespace.to_string(),
                message: e.to_string(),
            })?;

        Ok(list
            .items
            .into_iter()
            .map(|pod| Self::pod_to_info(pod, namespace))
            .collect())
    }

    async fn get_pod(&self, namespace: &str, pod: &str) -> Result<PodInfo> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let found = pods
            .get(pod)
            .await
            .map_err(|e| Error::log_stream(pod, e))?;

        Ok(Self::pod_to_info(found, namespace))
    }

    async fn open_log(
        &self,
        namespace: &str,
        pod: &str,
        options: &LogOptions,
    ) -> Result<LogReader> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let stream = pods
            .log_stream(pod, &log_params(options))
            .await
            .map_err(|e| Error::log_stream(pod, e))?;

        Ok(Box::pin(stream))
    }
}
