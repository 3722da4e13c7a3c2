//! Fire-and-forget command audit log.
//!
//! Sessions hand every executed command to an [`AuditLog`]; a background
//! task writes the entries to an [`AuditSink`] in order. Writing never
//! blocks or fails the session: sink errors are logged at `warn!` and
//! dropped.

use std::future::Future;

use log::{debug, warn};
use tokio::sync::{mpsc, oneshot};

use crate::error::StoreError;
use crate::model::CommandLogEntry;

/// Destination for audit entries.
pub trait AuditSink: Send + Sync + 'static {
    fn append(&self, entry: &CommandLogEntry) -> impl Future<Output = Result<(), StoreError>> + Send;
}

enum AuditMessage {
    Entry(CommandLogEntry),
    Flush(oneshot::Sender<()>),
}

/// Handle to the background audit writer. Cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct AuditLog {
    tx: Option<mpsc::UnboundedSender<AuditMessage>>,
}

impl std::fmt::Debug for AuditMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuditMessage::Entry(entry) => f.debug_tuple("Entry").field(&entry.command).finish(),
            AuditMessage::Flush(_) => f.write_str("Flush"),
        }
    }
}

impl AuditLog {
    /// Spawn the writer task on the current runtime.
    pub fn spawn<S: AuditSink>(sink: S) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                match message {
                    AuditMessage::Entry(entry) => {
                        if let Err(e) = sink.append(&entry).await {
                            warn!(
                                "audit: failed to record '{}' for {}: {}",
                                entry.command, entry.host, e
                            );
                        }
                    }
                    AuditMessage::Flush(done) => {
                        let _ = done.send(());
                    }
                }
            }
            debug!("audit: writer stopped");
        });

        Self { tx: Some(tx) }
    }

    /// An audit log that discards everything.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Queue one entry. Never blocks, never fails.
    pub fn record(&self, entry: CommandLogEntry) {
        let Some(tx) = &self.tx else {
            return;
        };
        if tx.send(AuditMessage::Entry(entry)).is_err() {
            debug!("audit: writer gone, entry dropped");
        }
    }

    /// Wait until every entry queued before this call has been written.
    pub async fn flush(&self) {
        let Some(tx) = &self.tx else {
            return;
        };
        let (done_tx, done_rx) = oneshot::channel();
        if tx.send(AuditMessage::Flush(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }
}
