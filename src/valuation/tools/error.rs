use std::path::PathBuf;

use thiserror::Error;

/// Convenient alias for fallible results returned throughout the crate.
pub type Result<T> = std::result::Result<T, ToolError>;

/// Error type covering the different failure cases that can occur when the
/// tool reads queries, talks to the valuation provider, flattens responses, or
/// writes the resulting dataset.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Wrapper for IO failures such as reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Raised when JSON parsing or serialization fails.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Raised when the address list or the CSV output cannot be processed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Transport level failures reported by the HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Errors bubbled up from the Excel writer implementation.
    #[error("Excel write error: {0}")]
    ExcelWrite(#[from] rust_xlsxwriter::XlsxError),

    /// Errors bubbled up from the Excel reader implementation.
    #[error("Excel read error: {0}")]
    ExcelRead(#[from] calamine::XlsxError),

    /// Raised when a requested section is absent from a raw response.
    #[error("response has no section named '{0}'")]
    MissingSection(String),

    /// Raised when a requested section is present but is not a mapping.
    #[error("section '{section}' is not a mapping (found {found})")]
    MalformedSection { section: String, found: &'static str },

    /// Raised when a provider reply cannot be decoded into response sections.
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),

    /// Raised when the provider answers with an unsuccessful status.
    #[error("provider returned status {status}: {message}")]
    Provider { status: u16, message: String },

    /// Raised when the provider answers successfully but refuses the lookup,
    /// for instance when no exact match exists for the address.
    #[error("provider rejected the request with code {code}: {message}")]
    ProviderRejected { code: String, message: String },

    /// Raised when an input file does not follow the expected layout.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Raised when the user provides a path that does not exist.
    #[error("input file not found: {0}")]
    MissingInput(PathBuf),

    /// Raised when the tracing subscriber fails to initialise.
    #[error("failed to initialise logging: {0}")]
    Logging(String),
}
