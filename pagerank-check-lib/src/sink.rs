//! Result sinks for incremental persistence.
//!
//! A sink receives each successful record as soon as its unit of work
//! finishes. Persistence is best effort: a failed `store` is logged and
//! counted by the orchestrator, and the record stays in the in-memory report.

use crate::error::PageRankError;
use crate::types::MetricsRecord;
use async_trait::async_trait;
use chrono::Utc;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Stores one metrics record at a time.
#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn store(&self, record: &MetricsRecord) -> Result<(), PageRankError>;
}

/// Writes one pretty-printed JSON file per record.
///
/// Files are named after the domain's leftmost label (`amazon.json` for
/// `amazon.co.uk`). An existing file is never overwritten; the next free
/// `amazon_1.json`, `amazon_2.json`, ... is used instead.
pub struct JsonFileSink {
    directory: PathBuf,
    // Serializes name selection so two records with the same label can't race
    write_lock: Mutex<()>,
}

impl JsonFileSink {
    /// Sink writing straight into `directory`.
    pub fn new<P: Into<PathBuf>>(directory: P) -> Self {
        Self {
            directory: directory.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Sink writing into a fresh `batch_<UTC timestamp>` directory under `root`.
    pub fn for_batch<P: AsRef<Path>>(root: P) -> Self {
        let name = format!("batch_{}", Utc::now().format("%Y%m%dT%H%M%SZ"));
        Self::new(root.as_ref().join(name))
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Write `record` and return the file it landed in.
    pub async fn write_record(&self, record: &MetricsRecord) -> Result<PathBuf, PageRankError> {
        let payload = serde_json::to_vec_pretty(record)?;
        let label = file_label(&record.domain);

        let _guard = self.write_lock.lock().await;
        tokio::fs::create_dir_all(&self.directory)
            .await
            .map_err(|e| self.sink_error(&self.directory, e))?;

        let mut suffix = 0usize;
        loop {
            let path = self.directory.join(file_name(&label, suffix));
            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(mut file) => {
                    file.write_all(&payload)
                        .await
                        .map_err(|e| self.sink_error(&path, e))?;
                    file.flush().await.map_err(|e| self.sink_error(&path, e))?;
                    return Ok(path);
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => suffix += 1,
                Err(e) => return Err(self.sink_error(&path, e)),
            }
        }
    }

    fn sink_error(&self, path: &Path, err: std::io::Error) -> PageRankError {
        PageRankError::sink(path.to_string_lossy(), err.to_string())
    }
}

#[async_trait]
impl ResultSink for JsonFileSink {
    async fn store(&self, record: &MetricsRecord) -> Result<(), PageRankError> {
        let path = self.write_record(record).await?;
        tracing::debug!(domain = %record.domain, path = %path.display(), "stored record");
        Ok(())
    }
}

/// "amazon.co.uk" -> "amazon"
fn file_label(domain: &str) -> String {
    let label = domain.split('.').next().unwrap_or(domain);
    let cleaned: String = label
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    if cleaned.is_empty() {
        "domain".to_string()
    } else {
        cleaned
    }
}

fn file_name(label: &str, suffix: usize) -> String {
    if suffix == 0 {
        format!("{}.json", label)
    } else {
        format!("{}_{}.json", label, suffix)
    }
}

/// Keeps stored records in memory.
#[derive(Default)]
pub struct MemorySink {
    records: Mutex<Vec<MetricsRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything stored so far, in store order.
    pub async fn records(&self) -> Vec<MetricsRecord> {
        self.records.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }
}

#[async_trait]
impl ResultSink for MemorySink {
    async fn store(&self, record: &MetricsRecord) -> Result<(), PageRankError> {
        self.records.lock().await.push(record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_label() {
        assert_eq!(file_label("amazon.co.uk"), "amazon");
        assert_eq!(file_label("wikipedia.org"), "wikipedia");
        assert_eq!(file_label("my-site.io"), "my-site");
    }

    #[tokio::test]
    async fn test_json_sink_writes_flat_record() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonFileSink::new(dir.path());
        let record = MetricsRecord::new("amazon.co.uk", "2024-03-01").with_metric("page_rank", "7");

        let path = sink.write_record(&record).await.unwrap();
        assert_eq!(path, dir.path().join("amazon.json"));

        let content = std::fs::read_to_string(&path).unwrap();
        let json: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(json["domain"], "amazon.co.uk");
        assert_eq!(json["last_checked"], "2024-03-01");
        assert_eq!(json["page_rank"], "7");
    }

    #[tokio::test]
    async fn test_json_sink_appends_numeric_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonFileSink::new(dir.path());

        let uk = MetricsRecord::new("amazon.co.uk", "2024-03-01");
        let com = MetricsRecord::new("amazon.com", "2024-03-01");
        let de = MetricsRecord::new("amazon.de", "2024-03-01");

        assert_eq!(
            sink.write_record(&uk).await.unwrap(),
            dir.path().join("amazon.json")
        );
        assert_eq!(
            sink.write_record(&com).await.unwrap(),
            dir.path().join("amazon_1.json")
        );
        assert_eq!(
            sink.write_record(&de).await.unwrap(),
            dir.path().join("amazon_2.json")
        );
    }

    #[tokio::test]
    async fn test_for_batch_uses_scoped_directory() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonFileSink::for_batch(dir.path());

        assert!(sink.directory().starts_with(dir.path()));
        let name = sink.directory().file_name().unwrap().to_string_lossy();
        assert!(name.starts_with("batch_"));

        sink.store(&MetricsRecord::new("bbc.co.uk", "2024-03-01"))
            .await
            .unwrap();
        assert!(sink.directory().join("bbc.json").exists());
    }

    #[test]
    fn test_memory_sink_keeps_records() {
        let sink = MemorySink::new();
        tokio_test::block_on(async {
            assert!(sink.is_empty().await);
            sink.store(&MetricsRecord::new("a.com", "x")).await.unwrap();
            sink.store(&MetricsRecord::new("b.com", "y")).await.unwrap();

            assert_eq!(sink.len().await, 2);
            assert_eq!(sink.records().await[1].domain, "b.com");
        });
    }
}
