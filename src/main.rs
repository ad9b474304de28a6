mod cli;
mod config;

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use klc_k8s::{KubeClient, fetch_kubeconfig};
use klc_logs::{Collector, OutputWriter};

use cli::Args;
use config::{FileConfig, Mode, Settings};

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let filter = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            let code = e
                .downcast_ref::<klc_types::Error>()
                .map(klc_types::Error::exit_code)
                .unwrap_or(1);
            ExitCode::from(code)
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let file = match &args.config {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };
    let settings = Settings::resolve(args, file)?;

    if settings.skip_fetch {
        info!(
            "Skipping credential fetch, using {}",
            settings.kubeconfig.display()
        );
    } else {
        fetch_kubeconfig(
            &settings.provider,
            &settings.cluster_name,
            &settings.kubeconfig,
        )
        .await
        .with_context(|| format!("fetching credentials for cluster {}", settings.cluster_name))?;
    }

    let client = KubeClient::from_kubeconfig(&settings.kubeconfig).await?;
    info!("Using kubeconfig {}", client.kubeconfig_path().display());
    let collector = Collector::new(client, OutputWriter::new(&settings.output))
        .with_options(settings.log_options.clone())
        .with_concurrency(settings.concurrency);

    match &settings.mode {
        Mode::Filtered { pods, filter } => {
            let report = collector
                .collect_filtered(&settings.namespace, pods, filter)
                .await
                .with_context(|| format!("collecting logs for pods {}", pods.join(", ")))?;
            info!(
                "{} matching lines from {} pods saved to {}",
                report.total_matches(),
                report.matches.len(),
                report.path.display()
            );
        }
        Mode::SinglePod(pod) => {
            collector.collect_pod(&settings.namespace, pod).await?;
        }
        Mode::Namespace => {
            let report = collector.collect_namespace(&settings.namespace).await?;
            if !report.failed.is_empty() {
                warn!(
                    "Saved logs for {} pods in namespace {}; {} failed",
                    report.written.len(),
                    settings.namespace,
                    report.failed.len()
                );
            }
            let written = report.into_result()?;
            info!(
                "Saved logs for {} pods in namespace {}",
                written.len(),
                settings.namespace
            );
        }
    }

    Ok(())
}
