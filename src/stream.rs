//! Server-sent event consumption and streamed-message aggregation.
//!
//! A streaming completion arrives as text lines:
//!
//! ```text
//! : OPENROUTER PROCESSING
//!
//! data: {"id":"gen-1","choices":[{"index":0,"delta":{"content":"Hel"}}]}
//!
//! data: {"id":"gen-1","choices":[{"index":0,"delta":{"content":"lo"}}]}
//!
//! data: [DONE]
//! ```
//!
//! [`ChatStream`] turns such a line source into an ordered sequence of
//! [`StreamEvent`]s. One reader task owns the source and feeds a bounded
//! queue; the consumer side sees exactly one [`StreamEvent::Terminal`] at the
//! end, whether the stream finished, failed or was cancelled.
//!
//! [`DeltaAggregator`] folds the `Data` chunks back into a complete assistant
//! [`Message`]:
//!
//! ```text
//! Chunk 1: { tool_calls: [{ index: 0, id: "call_1", function: { name: "search" } }] }
//! Chunk 2: { tool_calls: [{ index: 0, function: { arguments: "{\"q" } }] }
//! Chunk 3: { tool_calls: [{ index: 0, function: { arguments: "\":\"rust\"}" } }] }
//! Chunk 4: { finish_reason: "tool_calls" }
//! ```

use crate::types::{Message, MessageRole, Response, ToolCall, Usage};
use crate::{Error, Result};
use futures::stream::{Stream, StreamExt};
use std::collections::BTreeMap;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Raw line source handed from the transport to the consumer.
pub type LineSource = Pin<Box<dyn Stream<Item = io::Result<String>> + Send>>;

/// Events queued between the reader task and the consumer.
const EVENT_BUFFER: usize = 32;

const DATA_PREFIX: &str = "data:";
const DONE_SENTINEL: &str = "[DONE]";

/// One classified item of a streamed response.
#[derive(Debug)]
pub enum StreamEvent {
    /// A decoded chunk
    Data(Response),
    /// Keep-alive comment line
    Heartbeat,
    /// End of stream; `None` on normal completion
    Terminal(Option<Error>),
}

impl StreamEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Terminal(_))
    }
}

/// Classify one line.
///
/// Returns `None` for lines that carry nothing (blank lines). Any returned
/// terminal event ends the stream.
pub fn classify_line(line: &str) -> Option<StreamEvent> {
    let line = line.trim_end();

    if line.is_empty() {
        return None;
    }

    if line.starts_with(':') {
        return Some(StreamEvent::Heartbeat);
    }

    if let Some(payload) = line.strip_prefix(DATA_PREFIX) {
        let payload = payload.trim();
        if payload == DONE_SENTINEL {
            return Some(StreamEvent::Terminal(None));
        }

        return Some(match serde_json::from_str::<Response>(payload) {
            Ok(chunk) => StreamEvent::Data(chunk),
            Err(e) => StreamEvent::Terminal(Some(Error::Serialization(e))),
        });
    }

    Some(StreamEvent::Terminal(Some(Error::protocol(format!(
        "unexpected line: {}",
        line
    )))))
}

/// Ordered, cancellable stream of [`StreamEvent`]s.
///
/// Dropping a `ChatStream` cancels its reader and releases the line source.
#[derive(Debug)]
pub struct ChatStream {
    rx: Option<mpsc::Receiver<StreamEvent>>,
    cancel: CancellationToken,
    finished: bool,
}

impl ChatStream {
    /// Start consuming `lines` on a new tokio task.
    ///
    /// The stream stops when `cancel` (or [`ChatStream::cancel`]) fires.
    /// Must be called from within a tokio runtime.
    pub fn from_lines<S>(lines: S, cancel: CancellationToken) -> Self
    where
        S: Stream<Item = io::Result<String>> + Send + Unpin + 'static,
    {
        let token = cancel.child_token();
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);

        tokio::spawn(read_lines(lines, tx, token.clone()));

        Self {
            rx: Some(rx),
            cancel: token,
            finished: false,
        }
    }

    /// Next event, or `None` once the terminal event has been delivered.
    pub async fn recv(&mut self) -> Option<StreamEvent> {
        self.next().await
    }

    /// Stop the stream; the next event is `Terminal(Some(Cancelled))`.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// True after the terminal event was handed out.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn finish(&mut self, error: Option<Error>) -> StreamEvent {
        self.finished = true;
        self.rx = None;
        self.cancel.cancel();
        StreamEvent::Terminal(error)
    }
}

impl Stream for ChatStream {
    type Item = StreamEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<StreamEvent>> {
        let this = self.get_mut();

        if this.finished {
            return Poll::Ready(None);
        }

        if this.cancel.is_cancelled() {
            return Poll::Ready(Some(this.finish(Some(Error::Cancelled))));
        }

        let Some(rx) = this.rx.as_mut() else {
            return Poll::Ready(Some(this.finish(None)));
        };

        match rx.poll_recv(cx) {
            Poll::Ready(Some(StreamEvent::Terminal(error))) => {
                Poll::Ready(Some(this.finish(error)))
            }
            Poll::Ready(Some(event)) => Poll::Ready(Some(event)),
            Poll::Ready(None) => {
                // reader exits without a terminal only when cancelled
                let error = if this.cancel.is_cancelled() {
                    Error::Cancelled
                } else {
                    Error::other("stream reader stopped unexpectedly")
                };
                Poll::Ready(Some(this.finish(Some(error))))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for ChatStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Reader task: owns `lines` and drops it exactly once on return.
async fn read_lines<S>(mut lines: S, tx: mpsc::Sender<StreamEvent>, cancel: CancellationToken)
where
    S: Stream<Item = io::Result<String>> + Unpin,
{
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                log::debug!("stream cancelled while reading");
                return;
            }
            next = lines.next() => next,
        };

        let event = match next {
            Some(Ok(line)) => match classify_line(&line) {
                Some(event) => event,
                None => continue,
            },
            Some(Err(e)) => {
                log::debug!("stream read failed, treating as end of stream: {}", e);
                StreamEvent::Terminal(None)
            }
            None => {
                log::debug!("stream ended without [DONE]");
                StreamEvent::Terminal(None)
            }
        };

        if let StreamEvent::Terminal(Some(err)) = &event {
            log::warn!("stream terminated: {}", err);
        }

        let terminal = event.is_terminal();
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                log::debug!("stream cancelled before delivery");
                return;
            }
            sent = tx.send(event) => {
                if sent.is_err() {
                    return;
                }
            }
        }

        if terminal {
            return;
        }
    }
}

/// Folds streamed chunks into one assistant message.
///
/// Only the first choice (index 0) is tracked. Tool calls are keyed by their
/// delta index so interleaved fragments land on the right call, and come out
/// in index order.
#[derive(Debug, Default)]
pub struct DeltaAggregator {
    role: Option<MessageRole>,
    content: String,
    reasoning: String,
    tool_calls: BTreeMap<u32, PartialToolCall>,
    finish_reason: Option<String>,
    usage: Option<Usage>,
    saw_choice: bool,
}

#[derive(Debug, Default)]
struct PartialToolCall {
    id: Option<String>,
    name: Option<String>,
    arguments: String,
}

impl DeltaAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one chunk.
    pub fn push(&mut self, chunk: &Response) {
        if let Some(usage) = chunk.usage {
            self.usage = Some(usage);
        }

        for choice in chunk.choices.iter().filter(|c| c.index == 0) {
            self.saw_choice = true;

            if let Some(delta) = &choice.delta {
                if let Some(role) = delta.role {
                    self.role = Some(role);
                }
                if let Some(content) = &delta.content {
                    self.content.push_str(content);
                }
                if let Some(reasoning) = &delta.reasoning {
                    self.reasoning.push_str(reasoning);
                }

                for fragment in &delta.tool_calls {
                    let entry = self.tool_calls.entry(fragment.index).or_default();

                    if let Some(id) = &fragment.id {
                        entry.id = Some(id.clone());
                    }
                    if let Some(function) = &fragment.function {
                        if let Some(name) = &function.name {
                            entry.name = Some(name.clone());
                        }
                        if let Some(args) = &function.arguments {
                            entry.arguments.push_str(args);
                        }
                    }
                }
            }

            // completion-style chunks carry text instead of a delta
            if let Some(text) = &choice.text {
                self.content.push_str(text);
            }

            if let Some(reason) = &choice.finish_reason {
                self.finish_reason = Some(reason.clone());
            }
        }
    }

    /// Fold the payload of a `Data` event; other events are ignored.
    pub fn push_event(&mut self, event: &StreamEvent) {
        if let StreamEvent::Data(chunk) = event {
            self.push(chunk);
        }
    }

    pub fn finish_reason(&self) -> Option<&str> {
        self.finish_reason.as_deref()
    }

    pub fn usage(&self) -> Option<Usage> {
        self.usage
    }

    /// True until a chunk carrying the first choice has been seen.
    pub fn is_empty(&self) -> bool {
        !self.saw_choice
    }

    /// The assembled message, or `NoMessage` if no choice ever arrived.
    ///
    /// Tool calls that never received an id or a name are dropped.
    pub fn into_message(self) -> Result<Message> {
        if !self.saw_choice {
            return Err(Error::NoMessage);
        }

        let tool_calls: Vec<ToolCall> = self
            .tool_calls
            .into_iter()
            .filter_map(|(index, partial)| {
                let id = partial.id.filter(|id| !id.is_empty());
                match (id, partial.name) {
                    (Some(id), Some(name)) => Some(ToolCall::new(id, name, partial.arguments)),
                    (None, _) => {
                        log::debug!("dropping streamed tool call {} without an id", index);
                        None
                    }
                    (_, None) => {
                        log::debug!("dropping streamed tool call {} without a name", index);
                        None
                    }
                }
            })
            .collect();

        let mut message = Message::assistant(self.content);
        message.role = self.role.unwrap_or(MessageRole::Assistant);
        message.tool_calls = tool_calls;
        if !self.reasoning.is_empty() {
            message.reasoning = Some(self.reasoning);
        }
        Ok(message)
    }
}
