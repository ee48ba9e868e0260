use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

use crate::auth::CredentialAttempt;
use crate::utils::{filter_printable_chars, safe_log_string};

/// Attempts queued before new ones are dropped.
pub const SINK_CAPACITY: usize = 1024;

/// Enqueue side of the capture pipeline. Never waits on the consumer.
#[derive(Clone)]
pub struct EventSink {
    tx: mpsc::Sender<CredentialAttempt>,
}

impl EventSink {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<CredentialAttempt>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    pub fn emit(&self, attempt: CredentialAttempt) {
        match self.tx.try_send(attempt) {
            Ok(()) => {}
            Err(TrySendError::Full(attempt)) => {
                tracing::warn!(peer = %attempt.peer, "capture queue full, attempt dropped");
            }
            Err(TrySendError::Closed(attempt)) => {
                tracing::warn!(peer = %attempt.peer, "capture log gone, attempt dropped");
            }
        }
    }
}

/// Writes captured attempts to stdout and, when configured, to a file.
pub struct CaptureLog {
    writer: Option<BufWriter<File>>,
    raw_display: bool,
}

impl CaptureLog {
    pub fn new(log_file: Option<PathBuf>, raw_display: bool) -> anyhow::Result<Self> {
        let writer = match log_file {
            Some(path) => {
                if let Some(parent) = path.parent() {
                    if !parent.as_os_str().is_empty() && !parent.exists() {
                        std::fs::create_dir_all(parent)?;
                    }
                }
                let file = OpenOptions::new().create(true).append(true).open(path)?;
                Some(BufWriter::new(file))
            }
            None => None,
        };
        Ok(Self {
            writer,
            raw_display,
        })
    }

    pub fn format(attempt: &CredentialAttempt, raw: bool) -> String {
        let clean = |s: &str| {
            if raw {
                s.to_string()
            } else {
                safe_log_string(s)
            }
        };
        let mut line = format!(
            "{} {} helo={} mechanism={} identity={:?} secret={:?} verdict={}",
            attempt.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
            attempt.peer,
            clean(attempt.client_hostname.as_deref().unwrap_or("-")),
            attempt.mechanism,
            clean(&attempt.identity.to_string()),
            clean(&attempt.secret),
            attempt.verdict,
        );
        if attempt.abandoned {
            line.push_str(" abandoned");
        }
        if let Some(detail) = &attempt.detail {
            line.push_str(&format!(" detail={:?}", clean(detail)));
        }
        line
    }

    pub fn record(&mut self, attempt: &CredentialAttempt) {
        let line = Self::format(attempt, self.raw_display);
        if self.raw_display {
            println!("{}", line);
        } else {
            println!("{}", filter_printable_chars(&line));
        }

        if let Some(writer) = &mut self.writer {
            let file_line = Self::format(attempt, false);
            if let Err(e) = writeln!(writer, "{}", file_line).and_then(|_| writer.flush()) {
                tracing::error!(error = %e, "failed to write capture log");
            }
        }
    }

    /// Drains the queue until every `EventSink` clone is dropped.
    pub fn spawn(mut self, mut rx: mpsc::Receiver<CredentialAttempt>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(attempt) = rx.recv().await {
                self.record(&attempt);
            }
        })
    }
}
