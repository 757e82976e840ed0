use thiserror::Error;

/// Structured error context for better error handling and debugging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Field path or configuration key that caused the error (e.g., "prompt_override.structured_call", "requests[2]")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., template position, offending value)
    pub details: Option<String>,
    /// Source of the error (e.g., "prompt_renderer", "batch_engine")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self {
            field_path: None,
            details: None,
            source: None,
        }
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Failures talking to the model gateway.
///
/// These are never retried inside the engines; retry policy belongs to the
/// gateway implementation.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("gateway returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode gateway response: {0}")]
    Decode(String),

    #[error("{0}")]
    Other(String),
}

/// Unified error type for structured calls.
///
/// Protocol problems inside a tool round-trip (unknown tool, bad arguments,
/// failing tool) never show up here: they are fed back to the model as tool
/// results. Per-item batch failures are likewise reported as data on the
/// batch result rather than as an `Error`.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("Network transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("no structured output found in model response (output was: {raw})")]
    NoStructuredOutput { raw: String },

    #[error("failed to parse JSON output: {source} (output was: {raw})")]
    Parse {
        #[source]
        source: serde_json::Error,
        raw: String,
    },

    #[error("structured call cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

// Helper function to format error context for display
fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

impl Error {
    /// Create a new configuration error with structured context
    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Configuration { context, .. } => Some(context),
            _ => None,
        }
    }

    /// Raw model output attached to output errors, if any.
    pub fn raw_output(&self) -> Option<&str> {
        match self {
            Error::NoStructuredOutput { raw } | Error::Parse { raw, .. } => Some(raw),
            _ => None,
        }
    }

    /// Whether this error came from decoding the model's final answer.
    pub fn is_output_error(&self) -> bool {
        matches!(self, Error::NoStructuredOutput { .. } | Error::Parse { .. })
    }
}
