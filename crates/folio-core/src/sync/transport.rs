//! Request/response boundary between the editor and the persistence
//! daemon, plus the wire contracts both sides share.
//!
//! The wire is deliberately small: fetch the whole document, or submit
//! one section's replacement value. Responses are success envelopes, not
//! status-code protocols, so a transport implementation maps its own
//! failures (connection refused, bad payload) onto [`TransportError`] and
//! a rejecting envelope onto [`TransportError::Rejected`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::document::Document;

/// Errors crossing the transport boundary.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request itself failed (connection, timeout, protocol).
    #[error("transport request failed: {0}")]
    Http(String),

    /// The service answered with a failure envelope.
    #[error("service rejected the request: {detail}")]
    Rejected {
        /// Error string carried in the envelope.
        detail: String,
    },

    /// The response body could not be decoded.
    #[error("failed to decode service response: {0}")]
    Decode(String),
}

/// How the synchronizer reaches the document store.
///
/// Implementations are synchronous from the synchronizer's point of view;
/// `fetch` and `submit` are the only operations that may block.
pub trait DocumentTransport {
    /// Fetches the current durably-saved document.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if the request fails or the service
    /// reports an error.
    fn fetch(&self) -> Result<Document, TransportError>;

    /// Submits one section-level replacement.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if the request fails or the service
    /// rejects the update.
    fn submit(&self, section: &str, value: &serde_yaml::Value) -> Result<(), TransportError>;
}

/// Envelope answering a document fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigResponse {
    /// Whether the fetch succeeded.
    pub success: bool,
    /// The document, present on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<Document>,
    /// Failure detail, present on error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ConfigResponse {
    /// Success envelope carrying a document.
    #[must_use]
    pub fn ok(document: Document) -> Self {
        Self {
            success: true,
            document: Some(document),
            error: None,
        }
    }

    /// Failure envelope carrying an error string.
    #[must_use]
    pub fn error(detail: impl Into<String>) -> Self {
        Self {
            success: false,
            document: None,
            error: Some(detail.into()),
        }
    }
}

/// A section-level update submitted to the store.
///
/// The value travels as JSON; the store treats it as opaque structured
/// data and merges it in wholesale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionUpdate {
    /// Plain-text section name (`theme`, `hero`, ...).
    pub section: String,
    /// The section's full replacement value.
    pub value: serde_json::Value,
}

/// Envelope answering a section update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateResponse {
    /// Whether the update was committed.
    pub success: bool,
    /// Failure detail, present on error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Optional human-readable confirmation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl UpdateResponse {
    /// Success envelope.
    #[must_use]
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            error: None,
            message: Some(message.into()),
        }
    }

    /// Failure envelope carrying an error string.
    #[must_use]
    pub fn error(detail: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(detail.into()),
            message: None,
        }
    }
}
