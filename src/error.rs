/// Error handling module for the streaming markdown pipeline.
///
/// Most of the pipeline is deliberately infallible from the caller's point of
/// view: the tokenizer degrades malformed input to literal text and attribute
/// patterns fall back to no-ops. The error type below covers the remaining
/// fallible surfaces (rendering and sanitization) so the pipeline can retain
/// the previous stable output instead of surfacing a broken fragment.
use thiserror::Error;

/// Main error type for the markdown pipeline.
#[derive(Debug, Clone, Error)]
pub enum MarkdownError {
    /// Rendering errors (token tree to HTML phase).
    #[error("Render error: {message}")]
    Render { message: String },

    /// Sanitization errors while filtering raw HTML.
    #[error("Sanitize error: {message}")]
    Sanitize { message: String },

    /// Internal invariant failures in the token stream.
    ///
    /// These indicate a malformed token array (e.g. an unbalanced closing
    /// token) and are treated as recoverable: the affected transform becomes
    /// a no-op.
    #[error("Token stream error: {message}")]
    TokenStream { message: String },
}

/// Convenience type alias for Results in the markdown pipeline.
pub type Result<T> = std::result::Result<T, MarkdownError>;

impl MarkdownError {
    /// Creates a new render error.
    pub fn render_error(message: impl Into<String>) -> Self {
        MarkdownError::Render {
            message: message.into(),
        }
    }

    /// Creates a new sanitization error.
    pub fn sanitize_error(message: impl Into<String>) -> Self {
        MarkdownError::Sanitize {
            message: message.into(),
        }
    }

    /// Creates a new token stream error.
    pub fn token_stream_error(message: impl Into<String>) -> Self {
        MarkdownError::TokenStream {
            message: message.into(),
        }
    }

    /// Returns true if the pipeline can continue with previous output after
    /// this error.
    pub fn is_recoverable(&self) -> bool {
        match self {
            MarkdownError::Render { .. } => true,
            MarkdownError::Sanitize { .. } => true,
            MarkdownError::TokenStream { .. } => true,
        }
    }
}
