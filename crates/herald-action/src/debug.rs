//! Opt-in per-invocation debug streams.
//!
//! An action with `debug = true` gets a [`DebugStream`] for each invocation.
//! Handlers write progress lines to it; the dispatcher flushes the buffered
//! lines with the outcome and elapsed time to a [`DebugSink`] once the
//! handler settles.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use herald_core::{ChannelId, CorrelationId};

use crate::descriptor::ActionKind;
use crate::platform::{ChatPlatform, OutgoingMessage};

/// Whole milliseconds of `elapsed`, saturating.
pub(crate) fn elapsed_ms(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

/// How an invocation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DebugOutcome {
    Succeeded,
    Failed(String),
}

/// Everything a debug stream collected for one invocation.
#[derive(Debug, Clone)]
pub struct DebugReport {
    pub correlation_id: CorrelationId,
    pub kind: ActionKind,
    pub action_id: String,
    pub lines: Vec<String>,
    pub outcome: DebugOutcome,
    pub elapsed: Duration,
}

impl DebugReport {
    /// Render the report as plain text, one line per entry.
    pub fn render(&self) -> String {
        let status = match &self.outcome {
            DebugOutcome::Succeeded => "succeeded".to_string(),
            DebugOutcome::Failed(e) => format!("failed: {}", e),
        };
        let mut out = format!(
            "[{}] {} `{}` {} in {}ms",
            self.correlation_id,
            self.kind,
            self.action_id,
            status,
            self.elapsed.as_millis()
        );
        for line in &self.lines {
            out.push_str("\n  ");
            out.push_str(line);
        }
        out
    }
}

/// Buffered write sink bound to one invocation.
#[derive(Debug)]
pub struct DebugStream {
    correlation_id: CorrelationId,
    kind: ActionKind,
    action_id: String,
    started_at: Instant,
    lines: Mutex<Vec<String>>,
}

impl DebugStream {
    pub fn open(correlation_id: CorrelationId, kind: ActionKind, action_id: String) -> Self {
        Self {
            correlation_id,
            kind,
            action_id,
            started_at: Instant::now(),
            lines: Mutex::new(Vec::new()),
        }
    }

    pub fn correlation_id(&self) -> CorrelationId {
        self.correlation_id
    }

    pub fn write(&self, line: impl Into<String>) {
        let line = line.into();
        tracing::trace!(correlation_id = %self.correlation_id, %line, "debug stream");
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line);
        }
    }

    /// Close the stream and produce its report.
    pub(crate) fn finish(&self, outcome: DebugOutcome) -> DebugReport {
        let lines = self
            .lines
            .lock()
            .map(|mut l| std::mem::take(&mut *l))
            .unwrap_or_default();
        DebugReport {
            correlation_id: self.correlation_id,
            kind: self.kind,
            action_id: self.action_id.clone(),
            lines,
            outcome,
            elapsed: self.started_at.elapsed(),
        }
    }
}

/// Write to an optional stream; a no-op when the action did not opt in.
pub trait DebugLog {
    fn log(&self, line: impl Into<String>);
}

impl DebugLog for Option<&DebugStream> {
    fn log(&self, line: impl Into<String>) {
        if let Some(stream) = self {
            stream.write(line);
        }
    }
}

/// Developer-visible destination for flushed debug reports.
#[async_trait]
pub trait DebugSink: Send + Sync {
    async fn flush(&self, report: DebugReport);
}

/// Writes reports to the log under the `herald::debug` target.
#[derive(Debug, Default)]
pub struct TracingDebugSink;

#[async_trait]
impl DebugSink for TracingDebugSink {
    async fn flush(&self, report: DebugReport) {
        tracing::info!(
            target: "herald::debug",
            correlation_id = %report.correlation_id,
            kind = %report.kind,
            action = %report.action_id,
            elapsed_ms = elapsed_ms(report.elapsed),
            lines = report.lines.len(),
            "{}",
            report.render()
        );
    }
}

/// Posts reports to a developer channel, and to the log as well.
pub struct ChannelDebugSink {
    platform: Arc<dyn ChatPlatform>,
    channel: ChannelId,
}

/// Platform message length limit.
const MAX_MESSAGE_LEN: usize = 2000;

impl ChannelDebugSink {
    pub fn new(platform: Arc<dyn ChatPlatform>, channel: ChannelId) -> Self {
        Self { platform, channel }
    }
}

#[async_trait]
impl DebugSink for ChannelDebugSink {
    async fn flush(&self, report: DebugReport) {
        TracingDebugSink.flush(report.clone()).await;

        let mut content = report.render();
        if content.chars().count() > MAX_MESSAGE_LEN {
            content = content.chars().take(MAX_MESSAGE_LEN - 1).collect();
            content.push('…');
        }
        if let Err(e) = self
            .platform
            .send(self.channel, OutgoingMessage::new(content))
            .await
        {
            tracing::warn!(correlation_id = %report.correlation_id, error = %e, "Failed to post debug report");
        }
    }
}

/// Keeps reports in memory.
#[derive(Debug, Default)]
pub struct MemoryDebugSink {
    reports: Mutex<Vec<DebugReport>>,
}

impl MemoryDebugSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<DebugReport> {
        self.reports.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl DebugSink for MemoryDebugSink {
    async fn flush(&self, report: DebugReport) {
        if let Ok(mut reports) = self.reports.lock() {
            reports.push(report);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{PlatformCall, RecordingPlatform};

    #[test]
    fn test_elapsed_ms_saturates() {
        assert_eq!(elapsed_ms(Duration::from_millis(1500)), 1500);
        assert_eq!(elapsed_ms(Duration::MAX), u64::MAX);
    }

    #[test]
    fn test_stream_buffers_lines_until_finish() {
        let stream = DebugStream::open(CorrelationId::new(), ActionKind::Command, "ping".into());
        stream.write("fetching latency");
        stream.write("replying");

        let report = stream.finish(DebugOutcome::Succeeded);
        assert_eq!(report.lines, vec!["fetching latency", "replying"]);
        assert_eq!(report.outcome, DebugOutcome::Succeeded);
        assert_eq!(report.action_id, "ping");
    }

    #[test]
    fn test_absent_stream_is_noop() {
        let none: Option<&DebugStream> = None;
        none.log("ignored");

        let stream = DebugStream::open(CorrelationId::new(), ActionKind::Route, "GET /x".into());
        Some(&stream).log("kept");
        assert_eq!(stream.finish(DebugOutcome::Succeeded).lines, vec!["kept"]);
    }

    #[test]
    fn test_render_includes_outcome() {
        let stream = DebugStream::open(CorrelationId::new(), ActionKind::Button, "close".into());
        stream.write("step one");
        let text = stream
            .finish(DebugOutcome::Failed("boom".to_string()))
            .render();
        assert!(text.contains("button `close` failed: boom"));
        assert!(text.ends_with("\n  step one"));
    }

    #[tokio::test]
    async fn test_channel_sink_posts_truncated_report() {
        let platform = Arc::new(RecordingPlatform::new());
        let sink = ChannelDebugSink::new(platform.clone(), ChannelId(77));

        let stream = DebugStream::open(CorrelationId::new(), ActionKind::Command, "ping".into());
        stream.write("x".repeat(3000));
        sink.flush(stream.finish(DebugOutcome::Succeeded)).await;

        match &platform.calls()[0] {
            PlatformCall::Send { channel, message } => {
                assert_eq!(*channel, ChannelId(77));
                assert_eq!(message.content.chars().count(), MAX_MESSAGE_LEN);
            }
            other => panic!("unexpected call {:?}", other),
        }
    }
}
