//! # openrouter-agent
//!
//! An async Rust client for OpenRouter-style chat-completion APIs, with a
//! stateful conversation agent that runs caller-registered tools.
//!
//! ## Key Features
//!
//! - **Typed wire model**: requests and responses as serde types
//! - **Streaming**: server-sent events consumed as an ordered, cancellable
//!   [`ChatStream`] of [`StreamEvent`]s
//! - **Tool calling**: typed or schema-based tools with isolated failures
//! - **Atomic turns**: history grows only by complete, successful turns
//! - **Multimodal input**: images and PDFs as base64 data URLs
//! - **Retry helpers**: exponential backoff with jitter for callers
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use openrouter_agent::{Agent, AgentOptions, tool};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let options = AgentOptions::builder()
//!         .model("meta-llama/llama-3.2-1b-instruct")
//!         .system_prompt("You are a helpful assistant")
//!         .build()?;
//!
//!     let mut agent = Agent::from_env(options)?;
//!     agent.register_tool(
//!         tool("add", "Add two numbers")
//!             .param("a", "number")
//!             .param("b", "number")
//!             .build(|args| async move {
//!                 let a = args["a"].as_f64().unwrap_or(0.0);
//!                 let b = args["b"].as_f64().unwrap_or(0.0);
//!                 Ok(json!({"result": a + b}))
//!             }),
//!     )?;
//!
//!     let added = agent.chat("What is 2 + 40?").await?;
//!     println!("{}", added.last().map(|m| m.text()).unwrap_or_default());
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - **client**: HTTP transport and the [`ChatTransport`] seam
//! - **stream**: SSE line classification and delta aggregation
//! - **tools**: tool definitions and the per-agent registry
//! - **schema**: JSON-Schema generation from field tables
//! - **agent**: the conversation loop
//! - **attachment**: image and PDF encoding
//! - **types**: conversation and wire data model
//! - **config**: environment-based configuration
//! - **error**: the crate-wide `Error` enum
//! - **retry**: backoff helpers for callers

// ============================================================================
// MODULE DECLARATIONS
// ============================================================================

/// Conversation agent: history, tool loop, streaming turns.
mod agent;

/// Image and PDF attachments encoded as data URLs.
mod attachment;

/// HTTP transport to the chat-completions endpoint.
mod client;

/// Environment variables and defaults.
mod config;

/// Error enum and `Result` alias.
mod error;

/// Server-sent event consumer and streamed-message aggregation.
mod stream;

/// Tool definitions and registry.
mod tools;

/// Conversation and wire types, agent options.
mod types;

// ============================================================================
// PUBLIC EXPORTS
// ============================================================================

/// Backoff helpers for callers that want a retry policy.
pub mod retry;

/// Field tables and JSON-Schema generation for typed tool inputs.
pub mod schema;

// --- Agent ---

pub use agent::Agent;

// --- Transport ---

pub use client::{ChatTransport, RouterClient, RouterClientBuilder};

// --- Streaming ---

pub use stream::{ChatStream, DeltaAggregator, LineSource, StreamEvent, classify_line};

// --- Configuration ---

pub use config::{
    API_KEY_ENV, BASE_URL_ENV, DEFAULT_BASE_URL, MODEL_ENV, get_api_key, get_base_url, get_model,
};

// --- Error Handling ---

pub use error::{Error, Result};

// --- Tool System ---

pub use tools::{Tool, ToolBuilder, ToolHandler, ToolOutput, ToolRegistry, tool};

// --- Attachments ---

pub use attachment::{ImageAttachment, data_url, image_parts, pdf_part, pdf_parts};

// --- Core Types ---

pub use types::{
    AgentOptions, AgentOptionsBuilder, Choice, ChoiceError, Content, ContentPart, Delta,
    FileData, FunctionCall, FunctionChoice, FunctionDelta, FunctionDescription, FunctionName,
    ImageDetail, ImageUrl, Message, MessageRole, PdfPlugin, Plugin, Prediction,
    ProviderPreferences, Request, RequestMessage, RequestParameters, Response, ResponseFormat,
    ResponseMessage, ToolCall, ToolCallDelta, ToolChoice, ToolDescriptor, Usage, render_messages,
};

// Tokens are part of the public streaming API
pub use tokio_util::sync::CancellationToken;

// ============================================================================
// CONVENIENCE PRELUDE
// ============================================================================

/// The most commonly used items: `use openrouter_agent::prelude::*;`
pub mod prelude {
    pub use crate::schema::{FieldKind, FieldSpec, ToolInput};
    pub use crate::{
        Agent, AgentOptions, CancellationToken, ChatStream, Error, ImageAttachment, Message,
        MessageRole, Result, RouterClient, StreamEvent, Tool, ToolRegistry, tool,
    };
}
