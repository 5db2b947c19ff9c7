//! Streaming events and the fan-in stream
//!
//! Producers share one bounded channel. [`EventStream`] drains it in arrival
//! order and yields a single terminal [`StreamEvent::Done`] once every
//! producer has finished. Dropping the stream aborts every producer.

use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

/// One event of a multi-agent run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Text produced by an agent
    Chunk {
        /// Agent id
        agent_id: String,
        /// Agent display name
        agent_name: String,
        /// Agent display color
        color: String,
        /// Text fragment
        content: String,
    },
    /// Sentinel-approved code awaiting persistence
    Preview {
        /// Agent id
        agent_id: String,
        /// Agent display name
        agent_name: String,
        /// Target file
        filename: String,
        /// Proposed code
        code: String,
        /// Agent output with the code block removed
        explanation: String,
    },
    /// Proposed code was rejected by the sentinel
    SecurityWarning {
        /// Agent id
        agent_id: String,
        /// Agent display name
        agent_name: String,
        /// Blocking threats, one line each
        threats: Vec<String>,
    },
    /// An agent failed
    Error {
        /// Agent id (empty when no agent was selected)
        agent_id: String,
        /// Agent display name
        agent_name: String,
        /// Failure message
        message: String,
    },
    /// Every agent has finished
    Done {},
}

impl StreamEvent {
    /// Is this the terminal event?
    #[inline]
    #[must_use]
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done {})
    }

    /// Agent id, if the event belongs to one agent
    #[must_use]
    pub fn agent_id(&self) -> Option<&str> {
        match self {
            Self::Chunk { agent_id, .. }
            | Self::Preview { agent_id, .. }
            | Self::SecurityWarning { agent_id, .. }
            | Self::Error { agent_id, .. } => Some(agent_id),
            Self::Done {} => None,
        }
    }

    /// One JSON object followed by `\n`
    ///
    /// # Errors
    /// Propagates `serde_json` encoding failures
    pub fn to_ndjson_line(&self) -> Result<String, serde_json::Error> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

/// Ordered multi-agent event stream
///
/// Yields every producer event in arrival order, then exactly one
/// [`StreamEvent::Done`], then ends.
#[derive(Debug)]
pub struct EventStream {
    rx: mpsc::Receiver<StreamEvent>,
    producers: JoinSet<()>,
    finished: bool,
}

impl EventStream {
    pub(crate) fn new(rx: mpsc::Receiver<StreamEvent>, producers: JoinSet<()>) -> Self {
        Self {
            rx,
            producers,
            finished: false,
        }
    }

    /// Stream that yields the given events and then `Done`
    pub(crate) fn from_events(events: Vec<StreamEvent>) -> Self {
        let (tx, rx) = mpsc::channel(events.len().max(1));
        for event in events {
            // Capacity covers every event.
            let _ = tx.try_send(event);
        }
        Self::new(rx, JoinSet::new())
    }

    /// Producers still running
    #[inline]
    #[must_use]
    pub fn running(&self) -> usize {
        self.producers.len()
    }

    /// Abort every producer; the stream then drains and ends with `Done`
    pub fn cancel(&mut self) {
        tracing::info!(producers = self.producers.len(), "cancelling stream producers");
        self.producers.abort_all();
    }
}

impl Stream for EventStream {
    type Item = StreamEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.finished {
            return Poll::Ready(None);
        }

        // Reap finished producers so the set does not grow with completed tasks.
        while let Poll::Ready(Some(_)) = self.producers.poll_join_next(cx) {}

        match self.rx.poll_recv(cx) {
            Poll::Ready(Some(event)) => Poll::Ready(Some(event)),
            Poll::Ready(None) => {
                self.finished = true;
                tracing::debug!("all producers finished");
                Poll::Ready(Some(StreamEvent::Done {}))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use pretty_assertions::assert_eq;

    #[test]
    fn wire_format_is_tagged() {
        let chunk = StreamEvent::Chunk {
            agent_id: "a".into(),
            agent_name: "Architect".into(),
            color: "blue".into(),
            content: "hi".into(),
        };
        let line = chunk.to_ndjson_line().unwrap();
        assert!(line.ends_with('\n'));
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["type"], "chunk");
        assert_eq!(value["content"], "hi");

        assert_eq!(
            StreamEvent::Done {}.to_ndjson_line().unwrap(),
            "{\"type\":\"done\"}\n"
        );
        let warning = StreamEvent::SecurityWarning {
            agent_id: "a".into(),
            agent_name: "A".into(),
            threats: vec![],
        };
        assert!(warning.to_ndjson_line().unwrap().contains("\"security_warning\""));
    }

    #[tokio::test]
    async fn prefilled_stream_ends_with_single_done() {
        let error = StreamEvent::Error {
            agent_id: String::new(),
            agent_name: String::new(),
            message: "no agents".into(),
        };
        let events: Vec<_> = EventStream::from_events(vec![error.clone()]).collect().await;
        assert_eq!(events, vec![error, StreamEvent::Done {}]);
    }
}
