//! Multi-turn conversation agent with automatic tool execution
//!
//! An [`Agent`] owns the message history, its options, its tool registry and
//! a handle to a [`ChatTransport`]. Each call to [`Agent::chat`] is one user
//! turn:
//!
//! ```text
//! user message ──> staging
//!     │
//!     ├─> request = render(history ++ staging) + tools + parameters
//!     │
//!     ├─> transport ──> assistant message ──> staging
//!     │
//!     ├─> no tool calls? ──> merge staging into history, return it
//!     │
//!     └─> one tool message per call ──> staging ──> next round
//! ```
//!
//! Nothing touches the history until the turn succeeds. A transport failure,
//! a missing message, a cancelled stream or an exhausted tool budget discards
//! the staged messages, so the history only ever grows by whole turns. A tool
//! that fails does not fail the turn: its error payload becomes the tool
//! message the model sees.
//!
//! # Example
//!
//! ```rust,no_run
//! use openrouter_agent::{Agent, AgentOptions};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let options = AgentOptions::builder()
//!     .model("meta-llama/llama-3.2-1b-instruct")
//!     .system_prompt("You are a helpful assistant")
//!     .build()?;
//!
//! let mut agent = Agent::from_env(options)?;
//! let added = agent.chat("What's the capital of France?").await?;
//!
//! if let Some(reply) = added.last() {
//!     println!("{}", reply.text());
//! }
//! # Ok(())
//! # }
//! ```

use crate::attachment::{self, ImageAttachment};
use crate::client::{ChatTransport, RouterClient};
use crate::stream::{DeltaAggregator, StreamEvent};
use crate::tools::{Tool, ToolRegistry};
use crate::types::{AgentOptions, Message, Request, render_messages};
use crate::{Error, Result};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Per-turn streaming state
struct Streaming<'a> {
    cancel: CancellationToken,
    on_event: &'a mut (dyn FnMut(&StreamEvent) + Send),
}

/// Stateful conversation over one transport
pub struct Agent {
    transport: Arc<dyn ChatTransport>,

    options: AgentOptions,

    tools: ToolRegistry,

    /// Committed messages; the system prompt, if any, comes first
    history: Vec<Message>,
}

impl Agent {
    pub fn new(transport: impl ChatTransport + 'static, options: AgentOptions) -> Self {
        Self::with_transport(Arc::new(transport), options)
    }

    /// Agent over a shared transport
    pub fn with_transport(transport: Arc<dyn ChatTransport>, options: AgentOptions) -> Self {
        let history = seed_history(&options);
        Self {
            transport,
            options,
            tools: ToolRegistry::new(),
            history,
        }
    }

    /// Agent over a [`RouterClient`] configured from the environment.
    pub fn from_env(options: AgentOptions) -> Result<Self> {
        Ok(Self::new(RouterClient::from_env()?, options))
    }

    pub fn register_tool(&mut self, tool: Tool) -> Result<()> {
        self.tools.register(tool)
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    /// Forget the conversation, keeping the system prompt.
    pub fn clear_history(&mut self) {
        self.history = seed_history(&self.options);
    }

    pub fn options(&self) -> &AgentOptions {
        &self.options
    }

    /// Run one text turn; returns the messages it added to the history.
    ///
    /// A tool handler returning `Err` becomes an error payload for the model.
    /// A handler that panics unwinds through this call; the history is left
    /// as it was before the turn.
    pub async fn chat(&mut self, text: &str) -> Result<Vec<Message>> {
        self.run_turn(Message::user(text), None).await
    }

    /// Run one turn whose user message carries images.
    pub async fn chat_with_images(
        &mut self,
        text: &str,
        images: &[ImageAttachment],
    ) -> Result<Vec<Message>> {
        let parts = attachment::image_parts(text, images);
        self.run_turn(Message::user_with_parts(parts), None).await
    }

    /// Run one turn whose user message carries PDF files.
    ///
    /// A file that cannot be read fails the turn before any request is sent.
    pub async fn chat_with_pdf<P: AsRef<Path>>(
        &mut self,
        text: &str,
        paths: &[P],
    ) -> Result<Vec<Message>> {
        let parts = attachment::pdf_parts(text, paths).await?;
        self.run_turn(Message::user_with_parts(parts), None).await
    }

    /// Run one text turn over streamed responses.
    ///
    /// `on_event` sees every event of every model round as it arrives.
    /// Cancelling `cancel` ends the turn with [`Error::Cancelled`] and leaves
    /// the history as it was.
    pub async fn chat_streaming<F>(
        &mut self,
        text: &str,
        cancel: CancellationToken,
        mut on_event: F,
    ) -> Result<Vec<Message>>
    where
        F: FnMut(&StreamEvent) + Send,
    {
        let streaming = Streaming {
            cancel,
            on_event: &mut on_event,
        };
        self.run_turn(Message::user(text), Some(streaming)).await
    }

    /// Plain prompt completion. Does not read or change the history.
    pub async fn completion(&self, prompt: &str) -> Result<String> {
        let request = self
            .options
            .parameters
            .apply(Request::completion(self.options.model.clone(), prompt));

        let response = self.transport.send(&request).await?;
        let choice = response.choices.into_iter().next().ok_or(Error::NoMessage)?;

        choice
            .text
            .or_else(|| choice.message.and_then(|m| m.content))
            .ok_or(Error::NoMessage)
    }

    async fn run_turn(
        &mut self,
        first: Message,
        mut streaming: Option<Streaming<'_>>,
    ) -> Result<Vec<Message>> {
        let mut staging = vec![first];
        let mut rounds: u32 = 0;

        loop {
            let request = self.build_request(&staging, streaming.is_some());

            let message = match streaming.as_mut() {
                None => self.request_message(&request).await?,
                Some(streaming) => self.stream_message(&request, streaming).await?,
            };

            if !message.has_tool_calls() {
                staging.push(message);
                break;
            }

            if let Some(limit) = self.options.max_tool_rounds {
                if rounds >= limit {
                    log::warn!("tool round limit {} reached, discarding turn", limit);
                    return Err(Error::ToolLoopLimit(limit));
                }
            }
            rounds += 1;

            let calls = message.tool_calls.clone();
            staging.push(message);

            for call in &calls {
                if let Some(streaming) = &streaming {
                    if streaming.cancel.is_cancelled() {
                        return Err(Error::Cancelled);
                    }
                }

                let output = self.tools.invoke(call).await;
                staging.push(Message::tool(
                    call.id.clone(),
                    call.function.name.clone(),
                    output.content,
                ));
            }

            log::debug!("tool round {} done ({} call(s))", rounds, calls.len());
        }

        log::debug!(
            "turn complete: {} message(s) added after {} tool round(s)",
            staging.len(),
            rounds
        );
        self.history.extend(staging.iter().cloned());
        Ok(staging)
    }

    fn build_request(&self, staging: &[Message], stream: bool) -> Request {
        let messages = render_messages(self.history.iter().chain(staging));
        let request = Request::chat(self.options.model.clone(), messages)
            .with_tools(self.tools.generate_tool_list())
            .with_stream(stream);

        self.options.parameters.apply(request)
    }

    async fn request_message(&self, request: &Request) -> Result<Message> {
        let response = self.transport.send(request).await?;

        if let Some(err) = response.choices.first().and_then(|c| c.error.as_ref()) {
            log::warn!("provider reported error {}: {}", err.code, err.message);
        }

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .map(Message::from)
            .ok_or(Error::NoMessage)
    }

    async fn stream_message(
        &self,
        request: &Request,
        streaming: &mut Streaming<'_>,
    ) -> Result<Message> {
        let mut events = self
            .transport
            .stream(request, streaming.cancel.clone())
            .await?;
        let mut aggregator = DeltaAggregator::new();

        while let Some(event) = events.recv().await {
            (streaming.on_event)(&event);

            match event {
                StreamEvent::Data(chunk) => aggregator.push(&chunk),
                StreamEvent::Heartbeat => {}
                StreamEvent::Terminal(None) => break,
                StreamEvent::Terminal(Some(err)) => return Err(err),
            }
        }

        aggregator.into_message()
    }
}

fn seed_history(options: &AgentOptions) -> Vec<Message> {
    options
        .system_prompt
        .as_ref()
        .map(|prompt| vec![Message::system(prompt.clone())])
        .unwrap_or_default()
}
