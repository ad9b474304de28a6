use std::pin::Pin;

use async_trait::async_trait;
use futures::AsyncBufRead;

use klc_types::{LogOptions, PodInfo, Result};

/// Byte stream of one pod's log text
pub type LogReader = Pin<Box<dyn AsyncBufRead + Send>>;

/// Anything that can enumerate pods and hand out their log streams
#[async_trait]
pub trait LogSource: Send + Sync {
    /// List every pod in a namespace
    async fn list_pods(&self, namespace: &str) -> Result<Vec<PodInfo>>;

    /// Look up one pod; failures are reported as `LogStream` for that pod
    async fn get_pod(&self, namespace: &str, pod: &str) -> Result<PodInfo>;

    /// Open a non-following read of a pod's log.
    ///
    /// The stream ends when the API server has sent everything it holds for
    /// the pod. Read errors after opening surface as `std::io::Error` from the
    /// reader and are mapped by the caller.
    async fn open_log(&self, namespace: &str, pod: &str, options: &LogOptions)
    -> Result<LogReader>;
}
