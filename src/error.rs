//! Error taxonomy for the retrieval and dispatch core.
//!
//! Three failure classes cross the API boundary:
//!
//! - [`Error::Precondition`] — rejected before any external call (empty
//!   input, missing credentials, dimension mismatch).
//! - [`Error::Upstream`] — an embedding backend, provider API, or web
//!   search call failed. Surfaced verbatim with provider-identifying
//!   context; the core never retries.
//! - [`Error::Extract`] / [`Error::Storage`] — collaborator failures
//!   from document extraction and the blob store.
//!
//! "Not found" is not an error anywhere in the core: a scope with no
//! index or metadata is an empty scope.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Input rejected before any external call was made.
    #[error("{0}")]
    Precondition(String),

    /// An upstream API call failed. `status` is `None` for transport
    /// errors that never produced an HTTP response.
    #[error("{provider} request failed{}: {message}", fmt_status(.status))]
    Upstream {
        provider: String,
        status: Option<u16>,
        message: String,
    },

    /// Document text extraction failed (corrupt or unreadable input).
    #[error("text extraction failed: {0}")]
    Extract(String),

    /// Blob store read or write failed.
    #[error("storage error: {0}")]
    Storage(String),
}

fn fmt_status(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" ({code})"),
        None => String::new(),
    }
}

impl Error {
    pub fn precondition(message: impl Into<String>) -> Self {
        Error::Precondition(message.into())
    }

    pub fn upstream(
        provider: impl Into<String>,
        status: Option<u16>,
        message: impl Into<String>,
    ) -> Self {
        Error::Upstream {
            provider: provider.into(),
            status,
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_display_includes_status() {
        let err = Error::upstream("anthropic", Some(429), "rate limited");
        assert_eq!(
            err.to_string(),
            "anthropic request failed (429): rate limited"
        );
    }

    #[test]
    fn upstream_display_without_status() {
        let err = Error::upstream("gemini", None, "connection refused");
        assert_eq!(err.to_string(), "gemini request failed: connection refused");
    }
}
