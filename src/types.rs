//! Core types for the OpenRouter agent client
//!
//! Two groups live here. The conversation model ([`Message`], [`Content`],
//! [`ContentPart`], [`ToolCall`]) is what the agent stores in history. The
//! wire model ([`Request`], [`Response`] and friends) mirrors the JSON the
//! chat-completions endpoint speaks. [`RequestMessage`] is the bridge: it is
//! how a history message is rendered into a request.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

// ============================================================================
// CONVERSATION MODEL
// ============================================================================

/// Message role in the conversation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    #[default]
    Assistant,
    Tool,
}

/// Message content: one text string or an ordered list of parts.
///
/// Serialized untagged, so `Text` is a JSON string and `Parts` a JSON array.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Content {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl Content {
    /// Concatenated text of the content, skipping non-text parts.
    pub fn text(&self) -> String {
        match self {
            Content::Text(text) => text.clone(),
            Content::Parts(parts) => parts
                .iter()
                .filter_map(|part| match part {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::ImageUrl { .. } | ContentPart::File { .. } => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    /// True when there is nothing to send.
    pub fn is_empty(&self) -> bool {
        match self {
            Content::Text(text) => text.is_empty(),
            Content::Parts(parts) => parts.is_empty(),
        }
    }
}

impl From<String> for Content {
    fn from(text: String) -> Self {
        Content::Text(text)
    }
}

impl From<&str> for Content {
    fn from(text: &str) -> Self {
        Content::Text(text.to_string())
    }
}

impl From<Vec<ContentPart>> for Content {
    fn from(parts: Vec<ContentPart>) -> Self {
        Content::Parts(parts)
    }
}

/// One element of a multi-part message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
    File { file: FileData },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text { text: text.into() }
    }

    pub fn image_url(url: impl Into<String>, detail: Option<ImageDetail>) -> Self {
        ContentPart::ImageUrl {
            image_url: ImageUrl {
                url: url.into(),
                detail,
            },
        }
    }

    pub fn file(filename: impl Into<String>, file_data: impl Into<String>) -> Self {
        ContentPart::File {
            file: FileData {
                filename: filename.into(),
                file_data: file_data.into(),
            },
        }
    }
}

/// Image reference: a remote URL or a `data:` URL with inline base64.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageUrl {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<ImageDetail>,
}

/// Resolution hint for image inputs
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ImageDetail {
    Low,
    High,
    Auto,
}

/// Inline file payload (e.g. a PDF as a `data:` URL).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileData {
    pub filename: String,
    pub file_data: String,
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type", default = "function_type")]
    pub call_type: String,
    pub function: FunctionCall,
}

impl ToolCall {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            call_type: function_type(),
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }
}

/// Function name plus its raw, still-encoded JSON arguments.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionCall {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub arguments: String,
}

fn function_type() -> String {
    "function".to_string()
}

/// Some providers send `null` where a list is expected.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A message in the conversation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: MessageRole,
    pub content: Content,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// Reasoning text some models return next to their answer. Never sent back.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

impl Message {
    pub fn new(role: MessageRole, content: impl Into<Content>) -> Self {
        Self {
            role,
            content: content.into(),
            name: None,
            tool_call_id: None,
            tool_calls: Vec::new(),
            reasoning: None,
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(MessageRole::System, Content::Text(text.into()))
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(MessageRole::User, Content::Text(text.into()))
    }

    /// Create a user message from an ordered list of parts
    pub fn user_with_parts(parts: Vec<ContentPart>) -> Self {
        Self::new(MessageRole::User, Content::Parts(parts))
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, Content::Text(text.into()))
    }

    /// Assistant message that requests tool calls
    pub fn assistant_with_tool_calls(text: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls,
            ..Self::assistant(text)
        }
    }

    /// Result of one tool call, answering `tool_call_id`.
    pub fn tool(
        tool_call_id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            name: Some(name.into()),
            tool_call_id: Some(tool_call_id.into()),
            ..Self::new(MessageRole::Tool, Content::Text(content.into()))
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    /// Text of the message (parts joined, attachments skipped).
    pub fn text(&self) -> String {
        self.content.text()
    }
}

impl From<ResponseMessage> for Message {
    fn from(msg: ResponseMessage) -> Self {
        Self {
            role: msg.role,
            content: Content::Text(msg.content.unwrap_or_default()),
            name: None,
            tool_call_id: None,
            tool_calls: msg.tool_calls,
            reasoning: msg.reasoning.filter(|r| !r.is_empty()),
        }
    }
}

// ============================================================================
// REQUEST WIRE FORMAT
// ============================================================================

/// A message as it appears in a request body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RequestMessage {
    pub role: MessageRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Content>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
}

impl From<&Message> for RequestMessage {
    /// Messages carrying tool calls render without content; everything else
    /// renders its text or parts as-is.
    fn from(msg: &Message) -> Self {
        let (content, tool_calls) = if msg.has_tool_calls() {
            (None, Some(msg.tool_calls.clone()))
        } else {
            (Some(msg.content.clone()), None)
        };

        Self {
            role: msg.role,
            content,
            name: msg.name.clone(),
            tool_call_id: msg.tool_call_id.clone(),
            tool_calls,
        }
    }
}

/// Render messages in order.
pub fn render_messages<'a>(messages: impl IntoIterator<Item = &'a Message>) -> Vec<RequestMessage> {
    messages.into_iter().map(RequestMessage::from).collect()
}

/// Chat-completions request body
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Request {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<RequestMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub model: String,
    #[serde(default)]
    pub stream: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repetition_penalty: Option<f64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub logit_bias: BTreeMap<i64, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_logprobs: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_p: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_a: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prediction: Option<Prediction>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transforms: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub models: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<ProviderPreferences>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub include_reasoning: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub plugins: Vec<Plugin>,
}

impl Request {
    /// Chat request over already-rendered messages.
    pub fn chat(model: impl Into<String>, messages: Vec<RequestMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            ..Default::default()
        }
    }

    /// Plain prompt-completion request.
    pub fn completion(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: Some(prompt.into()),
            ..Default::default()
        }
    }

    pub fn with_tools(mut self, tools: Vec<ToolDescriptor>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }
}

/// Structured-output hint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub format_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json_schema: Option<Value>,
}

impl ResponseFormat {
    pub fn json_object() -> Self {
        Self {
            format_type: "json_object".to_string(),
            json_schema: None,
        }
    }

    pub fn json_schema(schema: Value) -> Self {
        Self {
            format_type: "json_schema".to_string(),
            json_schema: Some(schema),
        }
    }
}

/// Predicted output, used by some providers to cut latency
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Prediction {
    #[serde(rename = "type")]
    pub prediction_type: String,
    pub content: String,
}

impl Prediction {
    pub fn content(content: impl Into<String>) -> Self {
        Self {
            prediction_type: "content".to_string(),
            content: content.into(),
        }
    }
}

/// Provider routing preferences.
///
/// When present on a request, the client also sends the referer and site
/// name as attribution headers.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProviderPreferences {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referer_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_name: Option<String>,
}

/// Server-side plugin, e.g. PDF parsing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Plugin {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf: Option<PdfPlugin>,
}

impl Plugin {
    /// The file-parser plugin with a PDF engine (`"pdf-text"`, `"mistral-ocr"`, `"native"`).
    pub fn file_parser(engine: impl Into<String>) -> Self {
        Self {
            id: "file-parser".to_string(),
            pdf: Some(PdfPlugin {
                engine: engine.into(),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PdfPlugin {
    pub engine: String,
}

/// Tool-choice policy: a mode string or one forced function.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ToolChoice {
    Mode(String),
    Function(FunctionChoice),
}

impl ToolChoice {
    pub fn auto() -> Self {
        ToolChoice::Mode("auto".to_string())
    }

    pub fn none() -> Self {
        ToolChoice::Mode("none".to_string())
    }

    pub fn required() -> Self {
        ToolChoice::Mode("required".to_string())
    }

    pub fn function(name: impl Into<String>) -> Self {
        ToolChoice::Function(FunctionChoice {
            choice_type: function_type(),
            function: FunctionName { name: name.into() },
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionChoice {
    #[serde(rename = "type")]
    pub choice_type: String,
    pub function: FunctionName,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionName {
    pub name: String,
}

/// Tool as advertised in a request's `tools[]`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolDescriptor {
    #[serde(rename = "type")]
    pub tool_type: String,
    pub function: FunctionDescription,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionDescription {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub parameters: Value,
}

// ============================================================================
// RESPONSE WIRE FORMAT
// ============================================================================

/// Chat-completions response body, also the shape of each streamed chunk
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Response {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub created: i64,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub object: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_fingerprint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl Response {
    /// Message of the first choice, if the response has one.
    pub fn first_message(&self) -> Option<&ResponseMessage> {
        self.choices.first().and_then(|c| c.message.as_ref())
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Choice {
    #[serde(default)]
    pub index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<ResponseMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<Delta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ChoiceError>,
}

/// Complete assistant message in a non-streamed response
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ResponseMessage {
    #[serde(default)]
    pub role: MessageRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub tool_calls: Vec<ToolCall>,
}

/// Incremental piece of an assistant message in a streamed chunk
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Delta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<MessageRole>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub tool_calls: Vec<ToolCallDelta>,
}

/// Tool call fragment; `index` says which call it extends
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ToolCallDelta {
    #[serde(default)]
    pub index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub call_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<FunctionDelta>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FunctionDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}

/// Per-choice error reported by the upstream provider
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChoiceError {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

// ============================================================================
// AGENT CONFIGURATION
// ============================================================================

/// Sampling and control knobs applied to every request an agent makes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestParameters {
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub top_k: Option<u32>,
    pub frequency_penalty: Option<f64>,
    pub presence_penalty: Option<f64>,
    pub repetition_penalty: Option<f64>,
    pub min_p: Option<f64>,
    pub top_a: Option<f64>,
    pub seed: Option<i64>,
    pub max_tokens: Option<u32>,
    pub top_logprobs: Option<u32>,
    pub stop: Vec<String>,
    pub logit_bias: BTreeMap<i64, f64>,
    pub tool_choice: Option<ToolChoice>,
    pub response_format: Option<ResponseFormat>,
    pub prediction: Option<Prediction>,
    pub transforms: Vec<String>,
    pub models: Vec<String>,
    pub route: Option<String>,
    pub provider: Option<ProviderPreferences>,
    pub include_reasoning: bool,
    pub plugins: Vec<Plugin>,
}

impl RequestParameters {
    /// Copy every knob onto `request`, leaving model, messages and tools alone.
    pub fn apply(&self, mut request: Request) -> Request {
        request.temperature = self.temperature;
        request.top_p = self.top_p;
        request.top_k = self.top_k;
        request.frequency_penalty = self.frequency_penalty;
        request.presence_penalty = self.presence_penalty;
        request.repetition_penalty = self.repetition_penalty;
        request.min_p = self.min_p;
        request.top_a = self.top_a;
        request.seed = self.seed;
        request.max_tokens = self.max_tokens;
        request.top_logprobs = self.top_logprobs;
        request.stop = self.stop.clone();
        request.logit_bias = self.logit_bias.clone();
        request.tool_choice = self.tool_choice.clone();
        request.response_format = self.response_format.clone();
        request.prediction = self.prediction.clone();
        request.transforms = self.transforms.clone();
        request.models = self.models.clone();
        request.route = self.route.clone();
        request.provider = self.provider.clone();
        request.include_reasoning = self.include_reasoning;
        request.plugins = self.plugins.clone();
        request
    }
}

/// Options for configuring an agent
#[derive(Debug, Clone)]
pub struct AgentOptions {
    /// Model id (e.g., "meta-llama/llama-3.2-1b-instruct")
    pub model: String,

    /// System prompt seeded as the first history message
    pub system_prompt: Option<String>,

    /// Sampling and control knobs
    pub parameters: RequestParameters,

    /// Upper bound on tool rounds per turn (None = until the model stops)
    pub max_tool_rounds: Option<u32>,
}

impl AgentOptions {
    /// Create a new builder for AgentOptions
    pub fn builder() -> AgentOptionsBuilder {
        AgentOptionsBuilder::default()
    }
}

/// Builder for AgentOptions
#[derive(Debug, Default)]
pub struct AgentOptionsBuilder {
    model: Option<String>,
    system_prompt: Option<String>,
    parameters: RequestParameters,
    max_tool_rounds: Option<u32>,
}

impl AgentOptionsBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn temperature(mut self, temp: f64) -> Self {
        self.parameters.temperature = Some(temp);
        self
    }

    pub fn top_p(mut self, top_p: f64) -> Self {
        self.parameters.top_p = Some(top_p);
        self
    }

    pub fn top_k(mut self, top_k: u32) -> Self {
        self.parameters.top_k = Some(top_k);
        self
    }

    pub fn frequency_penalty(mut self, penalty: f64) -> Self {
        self.parameters.frequency_penalty = Some(penalty);
        self
    }

    pub fn presence_penalty(mut self, penalty: f64) -> Self {
        self.parameters.presence_penalty = Some(penalty);
        self
    }

    pub fn repetition_penalty(mut self, penalty: f64) -> Self {
        self.parameters.repetition_penalty = Some(penalty);
        self
    }

    pub fn min_p(mut self, min_p: f64) -> Self {
        self.parameters.min_p = Some(min_p);
        self
    }

    pub fn top_a(mut self, top_a: f64) -> Self {
        self.parameters.top_a = Some(top_a);
        self
    }

    pub fn seed(mut self, seed: i64) -> Self {
        self.parameters.seed = Some(seed);
        self
    }

    pub fn max_tokens(mut self, tokens: u32) -> Self {
        self.parameters.max_tokens = Some(tokens);
        self
    }

    pub fn top_logprobs(mut self, n: u32) -> Self {
        self.parameters.top_logprobs = Some(n);
        self
    }

    pub fn stop(mut self, sequence: impl Into<String>) -> Self {
        self.parameters.stop.push(sequence.into());
        self
    }

    pub fn logit_bias(mut self, token_id: i64, bias: f64) -> Self {
        self.parameters.logit_bias.insert(token_id, bias);
        self
    }

    pub fn tool_choice(mut self, choice: ToolChoice) -> Self {
        self.parameters.tool_choice = Some(choice);
        self
    }

    pub fn response_format(mut self, format: ResponseFormat) -> Self {
        self.parameters.response_format = Some(format);
        self
    }

    pub fn prediction(mut self, prediction: Prediction) -> Self {
        self.parameters.prediction = Some(prediction);
        self
    }

    pub fn transform(mut self, transform: impl Into<String>) -> Self {
        self.parameters.transforms.push(transform.into());
        self
    }

    pub fn fallback_model(mut self, model: impl Into<String>) -> Self {
        self.parameters.models.push(model.into());
        self
    }

    pub fn route(mut self, route: impl Into<String>) -> Self {
        self.parameters.route = Some(route.into());
        self
    }

    pub fn provider(mut self, provider: ProviderPreferences) -> Self {
        self.parameters.provider = Some(provider);
        self
    }

    pub fn include_reasoning(mut self, include: bool) -> Self {
        self.parameters.include_reasoning = include;
        self
    }

    pub fn plugin(mut self, plugin: Plugin) -> Self {
        self.parameters.plugins.push(plugin);
        self
    }

    pub fn max_tool_rounds(mut self, rounds: u32) -> Self {
        self.max_tool_rounds = Some(rounds);
        self
    }

    /// Replace all knobs at once
    pub fn parameters(mut self, parameters: RequestParameters) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn build(self) -> crate::Result<AgentOptions> {
        let model = self
            .model
            .filter(|m| !m.trim().is_empty())
            .ok_or_else(|| crate::Error::config("model is required"))?;

        if let Some(t) = self.parameters.temperature {
            if !(0.0..=2.0).contains(&t) {
                return Err(crate::Error::config(format!(
                    "temperature must be within 0.0..=2.0, got {}",
                    t
                )));
            }
        }

        Ok(AgentOptions {
            model,
            system_prompt: self.system_prompt.filter(|p| !p.is_empty()),
            parameters: self.parameters,
            max_tool_rounds: self.max_tool_rounds,
        })
    }
}
