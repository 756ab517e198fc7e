// Round log for post-game analysis
//
// When enabled, every tick is appended to a JSONL file: the published snapshot,
// the commands the engine applied and the events it produced. Writes happen on
// a background tokio task fed through an unbounded channel, so the round loop
// never waits on disk I/O and lines stay in tick order.

use log::{error, info};
use serde::{Deserialize, Serialize};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::command::Command;
use crate::engine::GameEvent;
use crate::snapshot::Snapshot;

/// One line of the round log
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LogEntry {
    pub tick: u64,
    pub snapshot: Snapshot,
    pub commands: Vec<Command>,
    pub events: Vec<GameEvent>,
    pub timestamp: String,
}

/// Handle to the background log writer
pub struct RoundLogger {
    sender: Option<mpsc::UnboundedSender<LogEntry>>,
    writer: Option<JoinHandle<()>>,
}

impl RoundLogger {
    /// Creates a new round logger
    /// If enabled is true, initializes the log file (truncating if it exists)
    pub async fn new(enabled: bool, log_file_path: &str) -> Self {
        if !enabled {
            return RoundLogger::disabled();
        }

        match OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(log_file_path)
            .await
        {
            Ok(mut file) => {
                info!("Round logging enabled: {}", log_file_path);
                let (sender, mut receiver) = mpsc::unbounded_channel::<LogEntry>();
                let writer = tokio::spawn(async move {
                    while let Some(entry) = receiver.recv().await {
                        match serde_json::to_string(&entry) {
                            Ok(json_line) => {
                                let line = format!("{}\n", json_line);
                                if let Err(e) = file.write_all(line.as_bytes()).await {
                                    error!("Failed to write round log entry: {}", e);
                                }
                            }
                            Err(e) => error!("Failed to serialize round log entry: {}", e),
                        }
                    }
                    if let Err(e) = file.flush().await {
                        error!("Failed to flush round log: {}", e);
                    }
                });
                RoundLogger {
                    sender: Some(sender),
                    writer: Some(writer),
                }
            }
            Err(e) => {
                error!("Failed to create round log file '{}': {}", log_file_path, e);
                RoundLogger::disabled()
            }
        }
    }

    /// Creates a disabled round logger (no-op)
    pub fn disabled() -> Self {
        RoundLogger {
            sender: None,
            writer: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.sender.is_some()
    }

    /// Queues one tick for writing (fire-and-forget)
    pub fn log_tick(&self, snapshot: &Snapshot, commands: &[Command], events: &[GameEvent]) {
        let Some(sender) = &self.sender else {
            return;
        };

        let entry = LogEntry {
            tick: snapshot.tick,
            snapshot: snapshot.clone(),
            commands: commands.to_vec(),
            events: events.to_vec(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };
        if sender.send(entry).is_err() {
            error!("Round log writer has stopped; dropping tick {}", snapshot.tick);
        }
    }

    /// Writes out everything queued so far and closes the file
    pub async fn close(mut self) {
        self.sender.take();
        if let Some(writer) = self.writer.take() {
            if let Err(e) = writer.await {
                error!("Round log writer failed: {}", e);
            }
        }
    }
}
