use std::path::PathBuf;

use futures::{AsyncBufReadExt, StreamExt, TryStreamExt, stream};
use tracing::{debug, info, warn};

use klc_k8s::LogSource;
use klc_types::{Error, LogOptions, PodInfo, Result};

use crate::filter::QueryFilter;
use crate::merge::LogMerger;
use crate::writer::{OutputWriter, validate_pod_name};

/// Outcome of a best-effort bulk export
#[derive(Debug, Default)]
pub struct CollectionReport {
    /// Log files written, in pod list order
    pub written: Vec<PathBuf>,

    /// Pods that could not be exported, with the reason
    pub failed: Vec<(String, Error)>,
}

impl CollectionReport {
    /// `Err(PartialCollection)` naming every failed pod, if any
    pub fn into_result(self) -> Result<Vec<PathBuf>> {
        if self.failed.is_empty() {
            return Ok(self.written);
        }
        Err(Error::PartialCollection {
            total: self.written.len() + self.failed.len(),
            failed: self.failed.into_iter().map(|(pod, _)| pod).collect(),
        })
    }
}

/// Outcome of a filtered multi-pod query
#[derive(Debug)]
pub struct FilteredReport {
    /// Combined, time-ordered output file
    pub path: PathBuf,

    /// Matching lines per pod, in pod list order
    pub matches: Vec<(String, usize)>,
}

impl FilteredReport {
    pub fn total_matches(&self) -> usize {
        self.matches.iter().map(|(_, n)| n).sum()
    }
}

/// Drives the three collection flows against a log source
pub struct Collector<S> {
    source: S,
    writer: OutputWriter,
    options: LogOptions,
    concurrency: usize,
}

impl<S: LogSource> Collector<S> {
    pub fn new(source: S, writer: OutputWriter) -> Self {
        Self {
            source,
            writer,
            options: LogOptions::default(),
            concurrency: 1,
        }
    }

    /// Set the options applied to every log request
    pub fn with_options(mut self, options: LogOptions) -> Self {
        self.options = options;
        self
    }

    /// Number of pod logs fetched at once by the filtered query (minimum 1)
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Copy one pod's raw log to `<output>/<pod>.log`; any failure is fatal
    pub async fn collect_pod(&self, namespace: &str, pod: &str) -> Result<PathBuf> {
        let path = self.writer.pod_log_path(self.writer.root(), pod)?;
        let options = self.resolve_options(namespace, pod).await?;
        self.export(namespace, pod, &options, &path).await?;
        Ok(path)
    }

    /// Copy the raw log of every pod in `namespace` to `<output>/<namespace>/<pod>.log`.
    ///
    /// Listing pods or creating the namespace directory is fatal; a failure on
    /// one pod is logged and the remaining pods are still exported.
    pub async fn collect_namespace(&self, namespace: &str) -> Result<CollectionReport> {
        let pods = self.source.list_pods(namespace).await?;
        info!("Found {} pods in namespace {}", pods.len(), namespace);

        let dir = self.writer.namespace_dir(namespace)?;
        self.writer.ensure_dir(&dir).await?;

        let mut report = CollectionReport::default();
        for pod in &pods {
            debug!("Pod {} is {:?}", pod.name, pod.status);
            let result = match self.writer.pod_log_path(&dir, &pod.name) {
                Ok(path) => self
                    .export(namespace, &pod.name, &self.options_for(pod), &path)
                    .await
                    .map(|_| path),
                Err(e) => Err(e),
            };

            match result {
                Ok(path) => report.written.push(path),
                Err(e) => {
                    warn!("Error collecting logs for pod {}: {}", pod.name, e);
                    report.failed.push((pod.name.clone(), e));
                }
            }
        }

        Ok(report)
    }

    /// Collect the lines containing the query token from each pod, merge them
    /// into one time-ordered sequence and write it to
    /// `<output>/<namespace>/combined_filtered_logs.txt`.
    ///
    /// Any pod whose log cannot be read aborts the query before the combined
    /// file is touched. Pods are accumulated in the order given regardless of
    /// how many are fetched concurrently.
    pub async fn collect_filtered(
        &self,
        namespace: &str,
        pods: &[String],
        filter: &QueryFilter,
    ) -> Result<FilteredReport> {
        for pod in pods {
            validate_pod_name(pod)?;
        }
        let path = self.writer.combined_path(namespace)?;

        let per_pod: Vec<Vec<String>> = stream::iter(
            pods.iter()
                .map(|pod| self.filtered_lines(namespace, pod, filter)),
        )
        .buffered(self.concurrency)
        .try_collect()
        .await?;

        let mut merger = LogMerger::new();
        let mut matches = Vec::with_capacity(pods.len());
        for (pod, lines) in pods.iter().zip(per_pod) {
            matches.push((pod.clone(), lines.len()));
            merger.extend(lines);
        }

        let sorted = merger.into_sorted();
        self.writer.write_lines(&path, &sorted).await?;
        info!(
            "Combined and sorted {} lines saved to {}",
            sorted.len(),
            path.display()
        );

        Ok(FilteredReport { path, matches })
    }

    /// Stream one pod's log and keep the lines that match.
    ///
    /// Lines are split on `\n` with a trailing `\r` dropped. Bytes that are not
    /// valid UTF-8 are replaced with U+FFFD rather than failing the read.
    async fn filtered_lines(
        &self,
        namespace: &str,
        pod: &str,
        filter: &QueryFilter,
    ) -> Result<Vec<String>> {
        let options = self.resolve_options(namespace, pod).await?;
        let mut reader = self.source.open_log(namespace, pod, &options).await?;
        let mut buf = Vec::new();
        let mut kept = Vec::new();
        let mut seen = 0usize;

        loop {
            buf.clear();
            let read = reader
                .read_until(b'\n', &mut buf)
                .await
                .map_err(|e| Error::log_stream(pod, e))?;
            if read == 0 {
                break;
            }

            seen += 1;
            let line = String::from_utf8_lossy(trim_line_end(&buf));
            if filter.matches(&line) {
                kept.push(line.into_owned());
            }
        }

        info!(
            "Filtered logs for pod {}: {} of {} lines match '{}'",
            pod,
            kept.len(),
            seen,
            filter.token()
        );
        Ok(kept)
    }

    async fn export(
        &self,
        namespace: &str,
        pod: &str,
        options: &LogOptions,
        path: &std::path::Path,
    ) -> Result<()> {
        let reader = self.source.open_log(namespace, pod, options).await?;
        let bytes = self.writer.copy_stream(path, pod, reader).await?;
        info!("Logs for pod {} saved to {}", pod, path.display());
        debug!("{} bytes written for pod {}", bytes, pod);
        Ok(())
    }

    /// Options for one named pod, looking up its containers unless one was chosen
    async fn resolve_options(&self, namespace: &str, pod: &str) -> Result<LogOptions> {
        if self.options.container.is_some() {
            return Ok(self.options.clone());
        }
        let info = self.source.get_pod(namespace, pod).await?;
        Ok(self.options_for(&info))
    }

    /// Multi-container pods need an explicit container; default to the first one
    fn options_for(&self, pod: &PodInfo) -> LogOptions {
        let mut options = self.options.clone();
        if options.container.is_none() && pod.containers.len() > 1 {
            options.container = pod.containers.first().cloned();
            debug!(
                "Pod {} has {} containers, reading {:?}",
                pod.name,
                pod.containers.len(),
                options.container
            );
        }
        options
    }
}

fn trim_line_end(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use klc_k8s::LogReader;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory cluster: pod name -> log body, `None` for pods whose stream fails
    #[derive(Default)]
    struct FakeSource {
        pods: Vec<(String, Option<Vec<u8>>)>,
        containers: HashMap<String, Vec<String>>,
        requests: Mutex<Vec<(String, LogOptions)>>,
    }

    impl FakeSource {
        fn with_pod(mut self, name: &str, lines: &[&str]) -> Self {
            let body: String = lines.iter().map(|l| format!("{}\n", l)).collect();
            self.with_raw_pod(name, body.as_bytes())
        }

        fn with_raw_pod(mut self, name: &str, body: &[u8]) -> Self {
            self.pods.push((name.to_string(), Some(body.to_vec())));
            self
        }

        fn with_failing_pod(mut self, name: &str) -> Self {
            self.pods.push((name.to_string(), None));
            self
        }
    }

    #[async_trait]
    impl LogSource for FakeSource {
        async fn list_pods(&self, namespace: &str) -> Result<Vec<PodInfo>> {
            Ok(self
                .pods
                .iter()
                .map(|(name, _)| {
                    let mut info = PodInfo::new(name.clone(), namespace.to_string());
                    info.containers = self.containers.get(name).cloned().unwrap_or_default();
                    info
                })
                .collect())
        }

        async fn get_pod(&self, namespace: &str, pod: &str) -> Result<PodInfo> {
            self.list_pods(namespace)
                .await?
                .into_iter()
                .find(|info| info.name == pod)
                .ok_or_else(|| Error::log_stream(pod, format!("pods \"{}\" not found", pod)))
        }

        async fn open_log(
            &self,
            _namespace: &str,
            pod: &str,
            options: &LogOptions,
        ) -> Result<LogReader> {
            self.requests
                .lock()
                .unwrap()
                .push((pod.to_string(), options.clone()));
            match self.pods.iter().find(|(name, _)| name == pod) {
                Some((_, Some(body))) => Ok(Box::pin(futures::io::Cursor::new(body.clone()))),
                Some((_, None)) => Err(Error::log_stream(pod, "connection reset")),
                None => Err(Error::log_stream(pod, "pods \"missing\" not found")),
            }
        }
    }

    fn pods(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn read_lines(path: &std::path::Path) -> Vec<String> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(String::from)
            .collect()
    }

    #[tokio::test]
    async fn test_filtered_merge_example() {
        let tmp = tempfile::tempdir().unwrap();
        let source = FakeSource::default()
            .with_pod(
                "a",
                &["2025-01-09T10:00:00Z ERR disk", "2025-01-09T09:00:00Z OK"],
            )
            .with_pod("b", &["2025-01-09T08:00:00Z ERR net"]);
        let collector = Collector::new(source, OutputWriter::new(tmp.path()));
        let filter = QueryFilter::new(Some("ERR")).unwrap();

        let report = collector
            .collect_filtered("default", &pods(&["a", "b"]), &filter)
            .await
            .unwrap();

        assert_eq!(report.path, tmp.path().join("default/combined_filtered_logs.txt"));
        assert_eq!(
            read_lines(&report.path),
            vec!["2025-01-09T08:00:00Z ERR net", "2025-01-09T10:00:00Z ERR disk"]
        );
        assert_eq!(report.matches, vec![("a".to_string(), 1), ("b".to_string(), 1)]);
        assert_eq!(report.total_matches(), 2);
    }

    #[tokio::test]
    async fn test_filtered_tolerates_invalid_utf8() {
        let tmp = tempfile::tempdir().unwrap();
        let source = FakeSource::default()
            .with_raw_pod(
                "a",
                b"2025-01-09T10:00:00Z ERR disk\n2025-01-09T10:00:01Z OK bin \xff\xfe\n",
            )
            .with_raw_pod("b", b"2025-01-09T08:00:00Z ERR net \xff\r\n");
        let collector = Collector::new(source, OutputWriter::new(tmp.path()));
        let filter = QueryFilter::new(Some("ERR")).unwrap();

        let report = collector
            .collect_filtered("default", &pods(&["a", "b"]), &filter)
            .await
            .unwrap();

        assert_eq!(
            read_lines(&report.path),
            vec![
                "2025-01-09T08:00:00Z ERR net \u{FFFD}",
                "2025-01-09T10:00:00Z ERR disk",
            ]
        );
        assert_eq!(report.total_matches(), 2);
    }

    #[tokio::test]
    async fn test_filtered_keeps_every_match_exactly_once() {
        let tmp = tempfile::tempdir().unwrap();
        let source = FakeSource::default()
            .with_pod(
                "planner",
                &[
                    "2025-01-09T10:00:00Z q-1 plan",
                    "2025-01-09T10:00:01Z q-2 plan",
                    "2025-01-09T10:00:02Z q-1 done",
                ],
            )
            .with_pod("executor", &["2025-01-09T10:00:01Z q-1 exec"]);
        let collector = Collector::new(source, OutputWriter::new(tmp.path()));
        let filter = QueryFilter::new(Some("q-1")).unwrap();

        let report = collector
            .collect_filtered("default", &pods(&["planner", "executor"]), &filter)
            .await
            .unwrap();

        let combined = read_lines(&report.path);
        assert_eq!(
            combined,
            vec![
                "2025-01-09T10:00:00Z q-1 plan",
                "2025-01-09T10:00:01Z q-1 exec",
                "2025-01-09T10:00:02Z q-1 done",
            ]
        );
        assert!(combined.iter().all(|l| !l.contains("q-2")));
    }

    #[tokio::test]
    async fn test_filtered_aborts_on_stream_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let source = FakeSource::default()
            .with_pod("a", &["2025-01-09T10:00:00Z ERR disk"])
            .with_failing_pod("b");
        let collector = Collector::new(source, OutputWriter::new(tmp.path()));
        let filter = QueryFilter::new(Some("ERR")).unwrap();

        let err = collector
            .collect_filtered("default", &pods(&["a", "b"]), &filter)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::LogStream { ref pod, .. } if pod == "b"));
        assert!(!tmp.path().join("default/combined_filtered_logs.txt").exists());
    }

    #[tokio::test]
    async fn test_filtered_rejects_path_traversal() {
        let tmp = tempfile::tempdir().unwrap();
        let collector = Collector::new(FakeSource::default(), OutputWriter::new(tmp.path()));
        let filter = QueryFilter::new(Some("ERR")).unwrap();

        let err = collector
            .collect_filtered("default", &pods(&["../../etc"]), &filter)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidPodName(_)));
    }

    #[tokio::test]
    async fn test_filtered_concurrency_does_not_change_output() {
        let build = || {
            FakeSource::default()
                .with_pod("a", &["garbage ERR a", "2025-01-09T10:00:00Z ERR a"])
                .with_pod("b", &["also garbage ERR b", "2025-01-09T09:00:00Z ERR b"])
                .with_pod("c", &["2025-01-09T11:00:00Z ERR c"])
        };
        let filter = QueryFilter::new(Some("ERR")).unwrap();
        let names = pods(&["a", "b", "c"]);

        let seq_dir = tempfile::tempdir().unwrap();
        let seq = Collector::new(build(), OutputWriter::new(seq_dir.path()))
            .collect_filtered("default", &names, &filter)
            .await
            .unwrap();

        let par_dir = tempfile::tempdir().unwrap();
        let par = Collector::new(build(), OutputWriter::new(par_dir.path()))
            .with_concurrency(3)
            .collect_filtered("default", &names, &filter)
            .await
            .unwrap();

        assert_eq!(read_lines(&seq.path), read_lines(&par.path));
        assert_eq!(
            read_lines(&seq.path),
            vec![
                "garbage ERR a",
                "2025-01-09T09:00:00Z ERR b",
                "2025-01-09T10:00:00Z ERR a",
                "also garbage ERR b",
                "2025-01-09T11:00:00Z ERR c",
            ]
        );
    }

    #[tokio::test]
    async fn test_namespace_collection_tolerates_failed_pod() {
        let tmp = tempfile::tempdir().unwrap();
        let source = FakeSource::default()
            .with_pod("a", &["alpha"])
            .with_failing_pod("b")
            .with_pod("c", &["gamma"]);
        let collector = Collector::new(source, OutputWriter::new(tmp.path()));

        let report = collector.collect_namespace("prod").await.unwrap();

        let ns_dir = tmp.path().join("prod");
        assert_eq!(report.written, vec![ns_dir.join("a.log"), ns_dir.join("c.log")]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "b");
        assert_eq!(std::fs::read_to_string(ns_dir.join("a.log")).unwrap(), "alpha\n");
        assert_eq!(std::fs::read_to_string(ns_dir.join("c.log")).unwrap(), "gamma\n");

        let err = report.into_result().unwrap_err();
        assert!(matches!(
            err,
            Error::PartialCollection { ref failed, total: 3 } if failed == &["b"]
        ));
        assert_eq!(err.exit_code(), 7);
    }

    #[tokio::test]
    async fn test_namespace_collection_without_failures_is_ok() {
        let tmp = tempfile::tempdir().unwrap();
        let source = FakeSource::default().with_pod("a", &["alpha"]);
        let collector = Collector::new(source, OutputWriter::new(tmp.path()));

        let written = collector
            .collect_namespace("prod")
            .await
            .unwrap()
            .into_result()
            .unwrap();
        assert_eq!(written, vec![tmp.path().join("prod/a.log")]);
    }

    #[tokio::test]
    async fn test_namespace_collection_overwrites() {
        let tmp = tempfile::tempdir().unwrap();
        let source = FakeSource::default().with_pod("a", &["one", "two"]);
        let collector = Collector::new(source, OutputWriter::new(tmp.path()));

        collector.collect_namespace("default").await.unwrap();
        collector.collect_namespace("default").await.unwrap();

        assert_eq!(
            std::fs::read_to_string(tmp.path().join("default/a.log")).unwrap(),
            "one\ntwo\n"
        );
    }

    #[tokio::test]
    async fn test_namespace_collection_skips_unsafe_names() {
        let tmp = tempfile::tempdir().unwrap();
        let source = FakeSource::default()
            .with_pod("../escape", &["nope"])
            .with_pod("ok", &["fine"]);
        let collector = Collector::new(source, OutputWriter::new(tmp.path()));

        let report = collector.collect_namespace("default").await.unwrap();

        assert_eq!(report.written.len(), 1);
        assert!(matches!(report.failed[0].1, Error::InvalidPodName(_)));
        assert!(!tmp.path().join("escape.log").exists());
    }

    #[tokio::test]
    async fn test_multi_container_pod_reads_first_container() {
        let tmp = tempfile::tempdir().unwrap();
        let mut source = FakeSource::default().with_pod("web", &["hello"]);
        source.containers.insert(
            "web".to_string(),
            vec!["nginx".to_string(), "istio-proxy".to_string()],
        );
        let collector = Collector::new(source, OutputWriter::new(tmp.path()));

        collector.collect_namespace("default").await.unwrap();

        let requests = collector.source.requests.lock().unwrap();
        assert_eq!(requests[0].1.container.as_deref(), Some("nginx"));
    }

    #[tokio::test]
    async fn test_multi_container_pod_in_single_and_filtered_modes() {
        let tmp = tempfile::tempdir().unwrap();
        let mut source =
            FakeSource::default().with_pod("web", &["2025-01-09T10:00:00Z q-1 hello"]);
        source.containers.insert(
            "web".to_string(),
            vec!["nginx".to_string(), "istio-proxy".to_string()],
        );
        let collector = Collector::new(source, OutputWriter::new(tmp.path()));
        let filter = QueryFilter::new(Some("q-1")).unwrap();

        collector.collect_pod("default", "web").await.unwrap();
        collector
            .collect_filtered("default", &pods(&["web"]), &filter)
            .await
            .unwrap();

        let requests = collector.source.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert!(requests.iter().all(|(_, o)| o.container.as_deref() == Some("nginx")));
    }

    #[tokio::test]
    async fn test_explicit_container_is_kept() {
        let tmp = tempfile::tempdir().unwrap();
        let mut source = FakeSource::default().with_pod("web", &["hello"]);
        source.containers.insert(
            "web".to_string(),
            vec!["nginx".to_string(), "istio-proxy".to_string()],
        );
        let options = LogOptions {
            container: Some("istio-proxy".to_string()),
            ..Default::default()
        };
        let collector =
            Collector::new(source, OutputWriter::new(tmp.path())).with_options(options);

        collector.collect_pod("default", "web").await.unwrap();

        let requests = collector.source.requests.lock().unwrap();
        assert_eq!(requests[0].1.container.as_deref(), Some("istio-proxy"));
    }

    #[tokio::test]
    async fn test_single_pod_collection() {
        let tmp = tempfile::tempdir().unwrap();
        let source = FakeSource::default().with_pod("planner", &["raw line"]);
        let collector = Collector::new(source, OutputWriter::new(tmp.path()));

        let path = collector.collect_pod("default", "planner").await.unwrap();

        assert_eq!(path, tmp.path().join("planner.log"));
        assert_eq!(std::fs::read_to_string(path).unwrap(), "raw line\n");
    }

    #[tokio::test]
    async fn test_single_pod_failure_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let collector = Collector::new(
            FakeSource::default().with_failing_pod("planner"),
            OutputWriter::new(tmp.path()),
        );

        let err = collector.collect_pod("default", "planner").await.unwrap_err();
        assert_eq!(err.exit_code(), 5);
    }
}
