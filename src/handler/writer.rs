//! Async batch writer for log points
//!
//! Lines are handed to a background task over an unbounded channel and
//! written in batches of `batch_size` lines, or whatever has accumulated
//! when `flush_interval` elapses. Failed batches are logged and dropped.

use super::point::Point;
use crate::client::PointWriter;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

#[derive(Debug)]
enum WriterMessage {
    Line(String),
    Flush(oneshot::Sender<()>),
    Close(oneshot::Sender<()>),
}

/// Async writer handle
///
/// Cheap to clone; all clones feed the same background task.
#[derive(Clone)]
pub struct AsyncWriter {
    sender: mpsc::UnboundedSender<WriterMessage>,
}

impl AsyncWriter {
    /// Spawn a new async writer task. Must be called inside a tokio runtime.
    ///
    /// ```ignore
    /// let writer = AsyncWriter::spawn(Arc::new(client), 100, Duration::from_secs(1));
    /// writer.write_point(&point);  // Non-blocking
    /// writer.flush().await;
    /// ```
    pub fn spawn(sink: Arc<dyn PointWriter>, batch_size: usize, flush_interval: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            writer_task(sink, rx, batch_size.max(1), flush_interval).await;
        });

        Self { sender: tx }
    }

    /// Queue a point (non-blocking)
    pub fn write_point(&self, point: &Point) {
        match point.to_line() {
            Ok(line) => self.write_line(line),
            Err(e) => tracing::warn!(error = %e, "Dropping unencodable point"),
        }
    }

    /// Queue a pre-encoded line (non-blocking). Ignored after close.
    pub fn write_line(&self, line: String) {
        let _ = self.sender.send(WriterMessage::Line(line));
    }

    /// Write everything queued so far and wait until it has been sent
    pub async fn flush(&self) {
        let (ack, done) = oneshot::channel();
        if self.sender.send(WriterMessage::Flush(ack)).is_ok() {
            let _ = done.await;
        }
    }

    /// Flush, then stop the background task
    pub async fn close(&self) {
        let (ack, done) = oneshot::channel();
        if self.sender.send(WriterMessage::Close(ack)).is_ok() {
            let _ = done.await;
        }
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

async fn writer_task(
    sink: Arc<dyn PointWriter>,
    mut rx: mpsc::UnboundedReceiver<WriterMessage>,
    batch_size: usize,
    flush_interval: Duration,
) {
    let mut batch: Vec<String> = Vec::with_capacity(batch_size);

    let mut flush_timer = tokio::time::interval(flush_interval);
    flush_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            msg = rx.recv() => match msg {
                Some(WriterMessage::Line(line)) => {
                    batch.push(line);
                    if batch.len() >= batch_size {
                        flush_lines(sink.as_ref(), &mut batch).await;
                    }
                }
                Some(WriterMessage::Flush(ack)) => {
                    flush_lines(sink.as_ref(), &mut batch).await;
                    let _ = ack.send(());
                }
                Some(WriterMessage::Close(ack)) => {
                    flush_lines(sink.as_ref(), &mut batch).await;
                    rx.close();
                    let _ = ack.send(());
                    break;
                }
                // All handles dropped
                None => {
                    flush_lines(sink.as_ref(), &mut batch).await;
                    break;
                }
            },

            _ = flush_timer.tick() => {
                flush_lines(sink.as_ref(), &mut batch).await;
            }
        }
    }

    tracing::debug!("Log writer task shutting down");
}

async fn flush_lines(sink: &dyn PointWriter, batch: &mut Vec<String>) {
    if batch.is_empty() {
        return;
    }

    let count = batch.len();
    let start = std::time::Instant::now();

    match sink.write_lines(batch).await {
        Ok(()) => {
            tracing::debug!(
                count = count,
                duration_ms = start.elapsed().as_millis() as u64,
                "Flushed log batch"
            );
        }
        Err(e) => {
            tracing::error!(error = %e, count = count, "Failed to write log batch");
        }
    }

    batch.clear();
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::{Error, Result};
    use async_trait::async_trait;
    use reqwest::StatusCode;
    use std::sync::Mutex;

    /// Collects every batch it is asked to write
    #[derive(Default)]
    pub(crate) struct RecordingSink {
        pub batches: Mutex<Vec<Vec<String>>>,
        pub fail: bool,
    }

    impl RecordingSink {
        pub fn lines(&self) -> Vec<String> {
            self.batches.lock().unwrap().iter().flatten().cloned().collect()
        }
    }

    #[async_trait]
    impl PointWriter for RecordingSink {
        async fn write_lines(&self, lines: &[String]) -> Result<()> {
            self.batches.lock().unwrap().push(lines.to_vec());
            if self.fail {
                return Err(Error::Upstream {
                    status: StatusCode::SERVICE_UNAVAILABLE,
                    message: "unavailable".to_string(),
                });
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_flush_writes_pending_lines() {
        let sink = Arc::new(RecordingSink::default());
        let writer = AsyncWriter::spawn(sink.clone(), 10, Duration::from_secs(60));

        for i in 0..5 {
            writer.write_point(&Point::new("logging").field("message", format!("m{}", i)));
        }
        writer.flush().await;

        let batches = sink.batches.lock().unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 5);
        assert!(batches[0][0].starts_with("logging message=\"m0\" "));
    }

    #[tokio::test]
    async fn test_full_batch_is_written_without_flush() {
        let sink = Arc::new(RecordingSink::default());
        let writer = AsyncWriter::spawn(sink.clone(), 3, Duration::from_secs(60));

        for i in 0..7 {
            writer.write_line(format!("m v={}i", i));
        }
        writer.flush().await;

        let sizes: Vec<usize> = sink.batches.lock().unwrap().iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![3, 3, 1]);
    }

    #[tokio::test]
    async fn test_interval_flush() {
        let sink = Arc::new(RecordingSink::default());
        let writer = AsyncWriter::spawn(sink.clone(), 100, Duration::from_millis(20));

        writer.write_line("m v=1i".to_string());
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(sink.lines(), vec!["m v=1i".to_string()]);
    }

    #[tokio::test]
    async fn test_close_flushes_and_stops() {
        let sink = Arc::new(RecordingSink::default());
        let writer = AsyncWriter::spawn(sink.clone(), 100, Duration::from_secs(60));

        writer.write_line("m v=1i".to_string());
        writer.close().await;
        assert!(writer.is_closed());

        writer.write_line("m v=2i".to_string());
        writer.flush().await;
        assert_eq!(sink.lines(), vec!["m v=1i".to_string()]);
    }

    #[tokio::test]
    async fn test_failed_batch_is_dropped() {
        let sink = Arc::new(RecordingSink {
            fail: true,
            ..Default::default()
        });
        let writer = AsyncWriter::spawn(sink.clone(), 100, Duration::from_secs(60));

        writer.write_line("m v=1i".to_string());
        writer.flush().await;
        writer.write_line("m v=2i".to_string());
        writer.flush().await;

        let batches = sink.batches.lock().unwrap();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[1], vec!["m v=2i".to_string()]);
    }
}
