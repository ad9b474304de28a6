use std::path::{Path, PathBuf};

use futures::AsyncBufReadExt;
use tokio::fs::{self, File};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::debug;

use klc_k8s::LogReader;
use klc_types::{Error, Result};

/// File name of the merged output of a filtered multi-pod query
pub const COMBINED_FILE_NAME: &str = "combined_filtered_logs.txt";

/// Reject names that would escape their directory when used as a path component
pub fn validate_pod_name(name: &str) -> Result<&str> {
    let invalid = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0']);

    if invalid {
        Err(Error::InvalidPodName(name.to_string()))
    } else {
        Ok(name)
    }
}

/// Every filesystem side effect of a run, rooted at one output directory
#[derive(Clone, Debug)]
pub struct OutputWriter {
    root: PathBuf,
}

impl OutputWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/<namespace>`
    pub fn namespace_dir(&self, namespace: &str) -> Result<PathBuf> {
        validate_pod_name(namespace).map_err(|_| {
            Error::Config(format!("namespace '{}' cannot be used as a directory", namespace))
        })?;
        Ok(self.root.join(namespace))
    }

    /// `<dir>/<pod>.log`
    pub fn pod_log_path(&self, dir: &Path, pod: &str) -> Result<PathBuf> {
        Ok(dir.join(format!("{}.log", validate_pod_name(pod)?)))
    }

    /// `<root>/<namespace>/combined_filtered_logs.txt`
    pub fn combined_path(&self, namespace: &str) -> Result<PathBuf> {
        Ok(self.namespace_dir(namespace)?.join(COMBINED_FILE_NAME))
    }

    /// Create a directory and all missing ancestors
    pub async fn ensure_dir(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)
            .await
            .map_err(|e| Error::output_write(dir, e))
    }

    /// Create or truncate a file, creating its parent directory first
    async fn create(&self, path: &Path) -> Result<BufWriter<File>> {
        if let Some(parent) = path.parent() {
            self.ensure_dir(parent).await?;
        }
        let file = File::create(path)
            .await
            .map_err(|e| Error::output_write(path, e))?;
        Ok(BufWriter::new(file))
    }

    /// Write each line followed by `\n`, replacing any previous content
    pub async fn write_lines(&self, path: &Path, lines: &[String]) -> Result<()> {
        let mut out = self.create(path).await?;
        for line in lines {
            out.write_all(line.as_bytes())
                .await
                .map_err(|e| Error::output_write(path, e))?;
            out.write_all(b"\n")
                .await
                .map_err(|e| Error::output_write(path, e))?;
        }
        out.flush().await.map_err(|e| Error::output_write(path, e))?;
        debug!("Wrote {} lines to {}", lines.len(), path.display());
        Ok(())
    }

    /// Copy a pod's log stream verbatim into `path`, replacing any previous content.
    ///
    /// Read failures are reported as `LogStream` for `pod`, write failures as
    /// `OutputWrite`. On either, the partially written file is removed.
    /// Returns the number of bytes written.
    pub async fn copy_stream(&self, path: &Path, pod: &str, reader: LogReader) -> Result<u64> {
        let out = self.create(path).await?;
        match copy_into(out, path, pod, reader).await {
            Ok(written) => Ok(written),
            Err(e) => {
                if let Err(rm) = fs::remove_file(path).await {
                    debug!("Could not remove partial {}: {}", path.display(), rm);
                }
                Err(e)
            }
        }
    }
}

async fn copy_into(
    mut out: BufWriter<File>,
    path: &Path,
    pod: &str,
    mut reader: LogReader,
) -> Result<u64> {
    let mut written = 0u64;

    loop {
        let chunk = reader
            .fill_buf()
            .await
            .map_err(|e| Error::log_stream(pod, e))?;
        if chunk.is_empty() {
            break;
        }
        out.write_all(chunk)
            .await
            .map_err(|e| Error::output_write(path, e))?;
        let len = chunk.len();
        reader.consume_unpin(len);
        written += len as u64;
    }

    out.flush().await.map_err(|e| Error::output_write(path, e))?;
    Ok(written)
}
