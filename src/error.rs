//! Error types for the OpenRouter agent client

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the client
#[derive(Error, Debug)]
pub enum Error {
    /// Network-level HTTP failure (connect, TLS, body read)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status
    #[error("Transport error {status}: {body}")]
    Transport { status: u16, body: String },

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A streamed line matched none of the recognized SSE shapes
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The operation was cancelled by the caller or a deadline
    #[error("Operation cancelled")]
    Cancelled,

    /// The model asked for a tool that is not registered
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// Tool arguments did not decode into the tool's input shape
    #[error("Invalid arguments for tool '{tool}': {message}")]
    ToolArgument { tool: String, message: String },

    /// The tool handler itself failed
    #[error("Tool '{tool}' failed: {message}")]
    ToolExecution { tool: String, message: String },

    /// A tool definition was rejected by the registry
    #[error("Tool registration failed: {0}")]
    ToolRegistration(String),

    /// The response carried no message in its first choice
    #[error("Response contained no message")]
    NoMessage,

    /// The model kept requesting tools past the configured limit
    #[error("Tool loop exceeded {0} rounds")]
    ToolLoopLimit(u32),

    /// File I/O error (attachments)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Other errors
    #[error("Error: {0}")]
    Other(String),
}

impl Error {
    /// Create a new transport error from a status code and response body
    pub fn transport(status: u16, body: impl Into<String>) -> Self {
        Error::Transport {
            status,
            body: body.into(),
        }
    }

    /// Create a new protocol error
    pub fn protocol(msg: impl Into<String>) -> Self {
        Error::Protocol(msg.into())
    }

    /// Create a new tool argument error
    pub fn tool_argument(tool: impl Into<String>, msg: impl Into<String>) -> Self {
        Error::ToolArgument {
            tool: tool.into(),
            message: msg.into(),
        }
    }

    /// Create a new tool execution error
    pub fn tool_execution(tool: impl Into<String>, msg: impl Into<String>) -> Self {
        Error::ToolExecution {
            tool: tool.into(),
            message: msg.into(),
        }
    }

    /// Create a new tool registration error
    pub fn tool_registration(msg: impl Into<String>) -> Self {
        Error::ToolRegistration(msg.into())
    }

    /// Create a new config error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a new invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }

    /// Create a new other error
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// True for failures that belong to a single tool invocation.
    ///
    /// These never abort a conversation turn; the agent turns them into
    /// tool-result messages instead.
    pub fn is_tool_error(&self) -> bool {
        matches!(
            self,
            Error::ToolNotFound(_) | Error::ToolArgument { .. } | Error::ToolExecution { .. }
        )
    }

    /// Short machine-readable label used in tool error payloads.
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Error::Http(_) => "http",
            Error::Transport { .. } => "transport",
            Error::Serialization(_) => "serialization",
            Error::Protocol(_) => "protocol",
            Error::Cancelled => "cancelled",
            Error::ToolNotFound(_) => "not_found",
            Error::ToolArgument { .. } => "argument",
            Error::ToolExecution { .. } => "execution",
            Error::ToolRegistration(_) => "registration",
            Error::NoMessage => "no_message",
            Error::ToolLoopLimit(_) => "tool_loop_limit",
            Error::Io(_) => "io",
            Error::Config(_) => "config",
            Error::InvalidInput(_) => "invalid_input",
            Error::Other(_) => "other",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_transport() {
        let err = Error::transport(502, "bad gateway");
        assert!(matches!(err, Error::Transport { status: 502, .. }));
        assert_eq!(err.to_string(), "Transport error 502: bad gateway");
    }

    #[test]
    fn test_error_protocol() {
        let err = Error::protocol("unexpected line: event: ping");
        assert!(matches!(err, Error::Protocol(_)));
        assert_eq!(
            err.to_string(),
            "Protocol error: unexpected line: event: ping"
        );
    }

    #[test]
    fn test_error_cancelled() {
        assert_eq!(Error::Cancelled.to_string(), "Operation cancelled");
    }

    #[test]
    fn test_error_tool_argument() {
        let err = Error::tool_argument("add", "missing field `a`");
        assert_eq!(
            err.to_string(),
            "Invalid arguments for tool 'add': missing field `a`"
        );
        assert_eq!(err.kind(), "argument");
    }

    #[test]
    fn test_error_tool_execution() {
        let err = Error::tool_execution("divide", "division by zero");
        assert_eq!(err.to_string(), "Tool 'divide' failed: division by zero");
        assert_eq!(err.kind(), "execution");
    }

    #[test]
    fn test_tool_errors_are_classified() {
        assert!(Error::ToolNotFound("x".into()).is_tool_error());
        assert!(Error::tool_argument("x", "y").is_tool_error());
        assert!(Error::tool_execution("x", "y").is_tool_error());
        assert!(!Error::Cancelled.is_tool_error());
        assert!(!Error::transport(500, "").is_tool_error());
        assert!(!Error::NoMessage.is_tool_error());
    }

    #[test]
    fn test_error_config() {
        let err = Error::config("model is required");
        assert!(matches!(err, Error::Config(_)));
        assert_eq!(err.to_string(), "Invalid configuration: model is required");
    }

    #[test]
    fn test_error_invalid_input() {
        let err = Error::invalid_input("Missing parameter");
        assert!(matches!(err, Error::InvalidInput(_)));
        assert_eq!(err.to_string(), "Invalid input: Missing parameter");
    }

    #[test]
    fn test_error_from_reqwest() {
        // Compile-time check that reqwest::Error converts
        fn _test_conversion(e: reqwest::Error) -> Error {
            e.into()
        }
    }

    #[test]
    fn test_error_from_serde_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Serialization(_)));
        assert_eq!(err.kind(), "serialization");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.pdf");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
