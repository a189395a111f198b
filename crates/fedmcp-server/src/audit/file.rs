//! JSON-lines audit log: one event per line, appended and never rewritten.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Mutex;

use super::{AuditError, AuditLog, AuditQuery};
use crate::models::AuditEvent;

pub struct FileAuditLog {
    path: PathBuf,
    // Serializes appends from this process; true once the tail was checked.
    write_lock: Mutex<bool>,
}

impl FileAuditLog {
    /// The file and its parent directory are created on first append.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(false),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> Result<Vec<AuditEvent>, AuditError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        // A crash mid-append leaves an unterminated last line. It is skipped
        // here and cut off before the next append.
        let terminated = content.ends_with('\n');
        let lines: Vec<&str> = content.lines().collect();
        let mut events: Vec<AuditEvent> = Vec::with_capacity(lines.len());
        for (index, line) in lines.iter().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(line) {
                Ok(event) => events.push(event),
                Err(e) if !terminated && index + 1 == lines.len() => {
                    tracing::warn!(
                        path = %self.path.display(),
                        line = index + 1,
                        error = %e,
                        "ignoring partial audit line"
                    );
                }
                Err(e) => {
                    return Err(AuditError::Corrupt(format!(
                        "{}:{}: {}",
                        self.path.display(),
                        index + 1,
                        e
                    )))
                }
            }
        }
        Ok(events)
    }

    /// Truncates the file back to its last complete line.
    async fn repair_tail(&self) -> Result<(), AuditError> {
        let mut file = match tokio::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open(&self.path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        let len = file.metadata().await?.len();
        if len == 0 {
            return Ok(());
        }
        file.seek(std::io::SeekFrom::Start(len - 1)).await?;
        let mut last = [0u8; 1];
        file.read_exact(&mut last).await?;
        if last[0] == b'\n' {
            return Ok(());
        }

        file.seek(std::io::SeekFrom::Start(0)).await?;
        let mut content = Vec::with_capacity(len as usize);
        file.read_to_end(&mut content).await?;
        let keep = content
            .iter()
            .rposition(|b| *b == b'\n')
            .map(|pos| pos as u64 + 1)
            .unwrap_or(0);
        tracing::warn!(
            path = %self.path.display(),
            dropped_bytes = len - keep,
            "truncating partial audit line"
        );
        file.set_len(keep).await?;
        file.sync_data().await?;
        Ok(())
    }
}

#[async_trait]
impl AuditLog for FileAuditLog {
    async fn append(&self, event: &AuditEvent) -> Result<(), AuditError> {
        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');

        let mut tail_checked = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        if !*tail_checked {
            self.repair_tail().await?;
            *tail_checked = true;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&line).await?;
        file.sync_data().await?;
        Ok(())
    }

    async fn query(&self, query: &AuditQuery) -> Result<Vec<AuditEvent>, AuditError> {
        let events = self.read_all().await?;
        Ok(query.apply(events.iter()))
    }

    async fn last(&self) -> Result<Option<AuditEvent>, AuditError> {
        Ok(self.read_all().await?.pop())
    }

    async fn all(&self) -> Result<Vec<AuditEvent>, AuditError> {
        self.read_all().await
    }

    fn backend_name(&self) -> &'static str {
        "file"
    }
}
