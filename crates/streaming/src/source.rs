//! Line-oriented producer and its shared status.
//!
//! A producer task reads newline-delimited JSON from any async reader (a
//! capture file, stdin, a bridge process) and forwards each object to the
//! consumer. It never looks at record semantics; that happens on drain.

use std::sync::Arc;

use foundation::time::Time;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, info};

use crate::protocol::DropReason;
use crate::queue::UpdateSender;

/// Point-in-time copy of the source status.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatusSnapshot {
    pub label: String,
    pub connected: bool,
    /// Lines read, including ones that were not valid JSON.
    pub received: u64,
    /// Lines the producer could not decode; they never reach the queue.
    pub rejected: u64,
    pub last_packet: Option<Time>,
}

/// Status shared between the producer task and the display.
#[derive(Debug, Default)]
pub struct SourceStatus {
    inner: Mutex<StatusSnapshot>,
}

impl SourceStatus {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            inner: Mutex::new(StatusSnapshot {
                label: label.into(),
                ..StatusSnapshot::default()
            }),
        }
    }

    pub fn set_connected(&self, connected: bool) {
        self.inner.lock().connected = connected;
    }

    pub fn record_packet(&self, at: Time) {
        let mut inner = self.inner.lock();
        inner.received += 1;
        inner.last_packet = Some(at);
    }

    pub fn record_rejected(&self) {
        self.inner.lock().rejected += 1;
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.inner.lock().clone()
    }
}

/// Totals for one [`pump_lines`] run.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct PumpSummary {
    pub lines: u64,
    pub forwarded: u64,
    pub rejected: u64,
    /// The consumer hung up before the input ended.
    pub consumer_closed: bool,
}

/// Reads `reader` to the end, forwarding one JSON value per non-blank line.
///
/// Returns early once the consumer side of `sender` is gone. The status is
/// marked connected for the duration of the call.
pub async fn pump_lines<R>(
    mut reader: R,
    sender: UpdateSender,
    status: Arc<SourceStatus>,
) -> std::io::Result<PumpSummary>
where
    R: AsyncBufRead + Unpin,
{
    let mut summary = PumpSummary::default();
    let mut buf = Vec::new();
    status.set_connected(true);
    info!(source = %status.snapshot().label, "source connected");

    let result = loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break Ok(()),
            Ok(_) => {}
            Err(err) => break Err(err),
        }
        let line = buf.trim_ascii();
        if line.is_empty() {
            continue;
        }
        summary.lines += 1;
        status.record_packet(Time::now());

        // Decoded from bytes: a line that is not UTF-8 is rejected alone.
        let value: Value = match serde_json::from_slice(line) {
            Ok(value) => value,
            Err(err) => {
                let reason = DropReason::InvalidJson(err.to_string());
                debug!(reason = %reason, "rejected ingest line");
                summary.rejected += 1;
                status.record_rejected();
                continue;
            }
        };
        if sender.send(value).is_err() {
            summary.consumer_closed = true;
            break Ok(());
        }
        summary.forwarded += 1;
    };

    status.set_connected(false);
    info!(
        lines = summary.lines,
        forwarded = summary.forwarded,
        rejected = summary.rejected,
        "source finished"
    );
    result.map(|()| summary)
}
