use super::{AuditKind, AuditRecord};
use anyhow::Context;
use fs2::FileExt;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_appender::non_blocking::{NonBlocking, NonBlockingBuilder, WorkerGuard};

/// Appends each buffer to `path` under an exclusive file lock. Runs on the
/// tracing-appender worker thread, never on the async runtime.
struct LockedAppend {
    path: PathBuf,
}

impl LockedAppend {
    fn append(&self, buf: &[u8]) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create audit directory")?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open audit file {}", self.path.display()))?;
        file.lock_exclusive().context("Failed to lock audit file")?;
        let written = file.write_all(buf).context("Failed to write audit record");
        FileExt::unlock(&file).context("Failed to unlock audit file")?;
        written
    }
}

impl Write for LockedAppend {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.append(buf) {
            Ok(()) => Ok(buf.len()),
            Err(e) => {
                tracing::warn!(error = %e, path = %self.path.display(), "Failed to append audit record");
                Err(io::Error::other(e))
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[derive(Clone)]
struct AuditFile {
    path: PathBuf,
    writer: NonBlocking,
    /// Flushes pending records when the last clone is dropped
    _guard: Arc<WorkerGuard>,
}

/// Emits audit records as `audit` tracing events and, optionally, as JSON
/// lines appended to a file by a background writer.
#[derive(Clone, Default)]
pub struct AuditLogger {
    file: Option<AuditFile>,
}

impl std::fmt::Debug for AuditLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLogger")
            .field("file", &self.file())
            .finish()
    }
}

impl AuditLogger {
    pub fn new(file: Option<PathBuf>) -> Self {
        let file = file.map(|path| {
            let (writer, guard) = NonBlockingBuilder::default()
                .lossy(false)
                .thread_name("tuin-audit")
                .finish(LockedAppend { path: path.clone() });
            AuditFile {
                path,
                writer,
                _guard: Arc::new(guard),
            }
        });
        Self { file }
    }

    /// A logger that only emits tracing events.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn file(&self) -> Option<&Path> {
        self.file.as_ref().map(|f| f.path.as_path())
    }

    pub fn log_data_access(
        &self,
        user_id: Option<i64>,
        resource: &str,
        action: &str,
        record_id: Option<i64>,
    ) {
        let mut record = AuditRecord::new(AuditKind::DataAccess, user_id, resource, action);
        record.record_id = record_id;
        self.record(record);
    }

    pub fn log_user_action(
        &self,
        user_id: Option<i64>,
        action: &str,
        resource: &str,
        details: serde_json::Value,
    ) {
        let record =
            AuditRecord::new(AuditKind::UserAction, user_id, resource, action).with_details(details);
        self.record(record);
    }

    /// Queue the record for the audit file. Failures are logged and swallowed;
    /// auditing never fails a request.
    pub fn record(&self, record: AuditRecord) {
        tracing::info!(
            target: "audit",
            kind = ?record.kind,
            user_id = ?record.user_id,
            resource = %record.resource,
            action = %record.action,
            record_id = ?record.record_id,
            "audit"
        );
        let Some(file) = &self.file else {
            return;
        };
        let mut line = match serde_json::to_string(&record) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to serialize audit record");
                return;
            }
        };
        line.push('\n');
        // One write is one message for the worker, so lines never interleave
        if let Err(e) = file.writer.clone().write_all(line.as_bytes()) {
            tracing::warn!(error = %e, path = %file.path.display(), "Failed to queue audit record");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_records_are_appended_as_json_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("audit").join("audit.jsonl");
        let logger = AuditLogger::new(Some(path.clone()));

        logger.log_data_access(Some(1), "gardens", "list", None);
        logger.log_user_action(
            Some(1),
            "delete",
            "gardens",
            serde_json::json!({"garden_id": 4}),
        );

        // Dropping the last clone flushes the background writer
        drop(logger);
        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: AuditRecord = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.kind, AuditKind::DataAccess);
        assert_eq!(first.resource, "gardens");
        let second: AuditRecord = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second.kind, AuditKind::UserAction);
        assert_eq!(second.details.unwrap()["garden_id"], 4);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_records_from_concurrent_tasks_stay_whole() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let logger = AuditLogger::new(Some(path.clone()));

        let handles: Vec<_> = (0..8)
            .map(|task| {
                let logger = logger.clone();
                tokio::spawn(async move {
                    for i in 0..25 {
                        logger.log_data_access(Some(task), "plants", "read", Some(i));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }
        drop(logger);

        let content = std::fs::read_to_string(&path).unwrap();
        let records: Vec<AuditRecord> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(records.len(), 200);
        assert!(records.iter().all(|r| r.resource == "plants"));
    }

    #[test]
    fn test_disabled_logger_writes_nothing() {
        let logger = AuditLogger::disabled();
        assert!(logger.file().is_none());
        logger.log_data_access(None, "tasks", "stats", None);
    }
}
