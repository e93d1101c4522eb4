//! Serialized access to a [`SheetWriter`]
//!
//! The document encoder is owned by one blocking thread that drains a bounded
//! queue of commands. Concurrent callers submit sheets through cloned
//! [`SheetWriterHandle`]s and wait for their own reply, so at most one sheet is
//! being encoded at any instant and writes never interleave.
//!
//! ```text
//!  task 0 ──┐
//!  task 1 ──┼── mpsc<SinkCommand> ──► sink thread (owns Box<dyn SheetWriter>)
//!  task n ──┘         ▲                        │
//!                     └──── oneshot reply ◄────┘
//! ```

use crate::adapters::document::{DocumentStats, SheetWriter};
use crate::domain::{Record, Result, SheetPartition, TransferError};
use crate::log_page_written;
use std::collections::HashSet;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

enum SinkCommand {
    Write {
        sheet: SheetPartition,
        rows: Vec<Record>,
        reply: oneshot::Sender<Result<()>>,
    },
    Finish {
        reply: oneshot::Sender<Result<DocumentStats>>,
    },
    Abandon,
}

/// Owner of the sink actor
///
/// Exactly one of [`finish`](Self::finish) or [`abandon`](Self::abandon)
/// ends its life; dropping it without either abandons the document once the
/// last handle is gone.
pub struct SerializedSheetWriter {
    sender: mpsc::Sender<SinkCommand>,
    actor: JoinHandle<()>,
}

/// Cloneable submission handle for concurrent producers
#[derive(Clone)]
pub struct SheetWriterHandle {
    sender: mpsc::Sender<SinkCommand>,
}

impl SerializedSheetWriter {
    /// Start the sink actor around `writer`
    ///
    /// `queue_depth` bounds how many submitted sheets may wait for the sink
    /// before submitters are suspended. Must be called within a Tokio runtime.
    pub fn open(writer: Box<dyn SheetWriter>, queue_depth: usize) -> Self {
        let (sender, receiver) = mpsc::channel(queue_depth.max(1));
        let actor = tokio::task::spawn_blocking(move || run_sink(writer, receiver));
        Self { sender, actor }
    }

    /// Handle for submitting sheets from worker tasks
    pub fn handle(&self) -> SheetWriterHandle {
        SheetWriterHandle {
            sender: self.sender.clone(),
        }
    }

    /// Finalize the document
    ///
    /// Every sheet submitted before this call is written first. Callers must
    /// have awaited all their `write_partition` calls; later submissions fail.
    pub async fn finish(self) -> Result<DocumentStats> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(SinkCommand::Finish { reply })
            .await
            .map_err(|_| TransferError::SinkWrite("sheet writer is closed".to_string()))?;

        let stats = response
            .await
            .map_err(|_| TransferError::SinkWrite("sheet writer stopped".to_string()))?;

        self.actor
            .await
            .map_err(|e| TransferError::SinkWrite(format!("sheet writer task failed: {e}")))?;

        stats
    }

    /// Drop the document without finalizing it
    ///
    /// The encoder is dropped without its trailer, leaving a document any
    /// reader recognizes as truncated.
    pub async fn abandon(self) {
        if self.sender.send(SinkCommand::Abandon).await.is_ok() {
            if let Err(e) = self.actor.await {
                tracing::warn!(error = %e, "Sheet writer task failed while abandoning");
            }
        }
    }
}

impl SheetWriterHandle {
    /// Write `rows` as sheet `sheet`
    ///
    /// Suspends while the queue is full and until the sink has written this
    /// sheet. Each sheet id may be written once per document.
    pub async fn write_partition(&self, sheet: SheetPartition, rows: Vec<Record>) -> Result<()> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(SinkCommand::Write { sheet, rows, reply })
            .await
            .map_err(|_| TransferError::SinkWrite("sheet writer is closed".to_string()))?;

        response
            .await
            .map_err(|_| TransferError::SinkWrite("sheet writer stopped".to_string()))?
    }
}

fn run_sink(mut writer: Box<dyn SheetWriter>, mut receiver: mpsc::Receiver<SinkCommand>) {
    let mut written = HashSet::new();

    while let Some(command) = receiver.blocking_recv() {
        match command {
            SinkCommand::Write { sheet, rows, reply } => {
                let result = if written.insert(sheet.id) {
                    writer.write_sheet(&sheet, &rows)
                } else {
                    Err(TransferError::SinkWrite(format!(
                        "sheet {} ({}) was already written",
                        sheet.id, sheet.name
                    )))
                };
                if result.is_ok() {
                    log_page_written!(sheet.id, sheet.name, rows.len());
                }
                // The submitter may have been cancelled; nothing to report to
                let _ = reply.send(result);
            }
            SinkCommand::Finish { reply } => {
                let _ = reply.send(writer.finish());
                return;
            }
            SinkCommand::Abandon => {
                tracing::warn!(sheets = written.len(), "Document abandoned before finish");
                return;
            }
        }
    }

    tracing::warn!(
        sheets = written.len(),
        "Sheet writer dropped before finish; document left unfinalized"
    );
}
