//! Kubeconfig fetching through the cloud provider CLIs
//!
//! Each provider writes (or updates) the kubeconfig file at a caller-chosen
//! path. Nothing is retried; the commands are idempotent and user-invoked.

use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::Path;

use tracing::{debug, info};

use klc_types::{CloudProvider, Error, Result};

/// External program invocation that materializes a kubeconfig
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchCommand {
    pub program: &'static str,
    pub args: Vec<OsString>,
}

impl FetchCommand {
    /// Build the provider CLI invocation for `cluster`, writing to `kubeconfig`
    pub fn for_provider(provider: &CloudProvider, cluster: &str, kubeconfig: &Path) -> Self {
        let kubeconfig = kubeconfig.as_os_str().to_owned();

        let (program, args) = match provider {
            CloudProvider::Aws { profile } => {
                let mut args = os_args(&["eks", "update-kubeconfig", "--name", cluster]);
                args.extend(["--kubeconfig".into(), kubeconfig]);
                if !profile.is_empty() {
                    args.extend(os_args(&["--profile", profile.as_str()]));
                }
                ("aws", args)
            }
            CloudProvider::Gcp { zone } => {
                let mut args = os_args(&["container", "clusters", "get-credentials", cluster]);
                if !zone.is_empty() {
                    args.extend(os_args(&["--zone", zone.as_str()]));
                }
                args.extend(["--kubeconfig".into(), kubeconfig]);
                ("gcloud", args)
            }
            CloudProvider::Azure {
                subscription,
                resource_group,
            } => {
                let mut args = os_args(&["aks", "get-credentials", "--name", cluster]);
                if let Some(group) = resource_group {
                    args.extend(os_args(&["--resource-group", group.as_str()]));
                }
                if !subscription.is_empty() {
                    args.extend(os_args(&["--subscription", subscription.as_str()]));
                }
                args.extend(["--file".into(), kubeconfig]);
                ("az", args)
            }
        };

        Self { program, args }
    }

    /// Run the program to completion.
    ///
    /// A missing program or a non-zero exit is a `CredentialFetch` error
    /// carrying the trimmed stderr, or the exit status when stderr is empty.
    pub async fn run(&self) -> Result<()> {
        debug!("Running {} {:?}", self.program, self.args);

        let output = tokio::process::Command::new(self.program)
            .args(&self.args)
            .output()
            .await
            .map_err(|e| self.error(match e.kind() {
                ErrorKind::NotFound => format!("`{}` not found on PATH", self.program),
                _ => e.to_string(),
            }))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(self.error(if stderr.is_empty() {
                format!("exited with {}", output.status)
            } else {
                stderr
            }));
        }

        Ok(())
    }

    fn error(&self, message: String) -> Error {
        Error::CredentialFetch {
            program: self.program.to_string(),
            message,
        }
    }
}

fn os_args(parts: &[&str]) -> Vec<OsString> {
    parts.iter().map(OsString::from).collect()
}

/// Run the provider CLI so that `kubeconfig` holds credentials for `cluster`
pub async fn fetch_kubeconfig(
    provider: &CloudProvider,
    cluster: &str,
    kubeconfig: &Path,
) -> Result<()> {
    if let Some(parent) = kubeconfig.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| Error::output_write(parent, e))?;
    }

    FetchCommand::for_provider(provider, cluster, kubeconfig)
        .run()
        .await?;

    info!(
        "Fetched {} credentials for cluster {} into {}",
        provider.label(),
        cluster,
        kubeconfig.display()
    );
    Ok(())
}
