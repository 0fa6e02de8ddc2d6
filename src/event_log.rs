//! Protocol event log.
//!
//! Append-only record of every state-changing protocol event (registrations,
//! dead-node removals, received gossip, dead-node reports). Each component gets
//! an [`EventLog`] handle tagged with its own endpoint; several handles may
//! share one [`EventSink`] (e.g. all seeds of one process writing one file).

use crate::protocol::Endpoint;
use anyhow::Result;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

enum SinkTarget {
    File { path: PathBuf, file: Mutex<File> },
    Memory(Mutex<Vec<String>>),
}

/// Destination for event lines.
pub struct EventSink {
    target: SinkTarget,
}

impl EventSink {
    /// Opens `path` for appending, creating it if needed.
    pub async fn open(path: impl AsRef<Path>) -> Result<Arc<Self>> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        Ok(Arc::new(Self {
            target: SinkTarget::File {
                path,
                file: Mutex::new(file),
            },
        }))
    }

    /// Sink that keeps lines in memory; used by tests and embedders.
    pub fn memory() -> Arc<Self> {
        Arc::new(Self {
            target: SinkTarget::Memory(Mutex::new(Vec::new())),
        })
    }

    async fn append(&self, line: String) {
        match &self.target {
            SinkTarget::File { path, file } => {
                let mut file = file.lock().await;
                if let Err(e) = file.write_all(format!("{}\n", line).as_bytes()).await {
                    tracing::warn!("Failed to append to event log {}: {}", path.display(), e);
                }
            }
            SinkTarget::Memory(lines) => lines.lock().await.push(line),
        }
    }

    /// Everything recorded so far, oldest first.
    pub async fn lines(&self) -> Vec<String> {
        match &self.target {
            SinkTarget::File { path, file } => {
                if let Err(e) = file.lock().await.flush().await {
                    tracing::warn!("Failed to flush event log {}: {}", path.display(), e);
                }
                tokio::fs::read_to_string(path)
                    .await
                    .map(|content| content.lines().map(str::to_string).collect())
                    .unwrap_or_default()
            }
            SinkTarget::Memory(lines) => lines.lock().await.clone(),
        }
    }
}

/// Handle through which one node records its events.
#[derive(Clone)]
pub struct EventLog {
    owner: Endpoint,
    sink: Arc<EventSink>,
}

impl EventLog {
    pub fn new(owner: Endpoint, sink: Arc<EventSink>) -> Self {
        Self { owner, sink }
    }

    /// Appends `<owner> : <event>` to the sink.
    pub async fn record(&self, event: impl Display) {
        let line = format!("{} : {}", self.owner, event);
        tracing::info!("{}", line);
        self.sink.append(line).await;
    }
}
