//! Blocking HTTP implementation of the transport boundary.

use std::time::Duration;

use folio_core::document::Document;
use folio_core::sync::transport::{
    ConfigResponse, DocumentTransport, SectionUpdate, TransportError, UpdateResponse,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Talks to the folio daemon over HTTP.
pub(crate) struct HttpTransport {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    /// Builds a transport for the daemon at `base_url`
    /// (e.g. `http://127.0.0.1:7878`).
    pub(crate) fn new(base_url: &str) -> Result<Self, TransportError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| TransportError::Http(err.to_string()))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn config_url(&self) -> String {
        format!("{}/api/config", self.base_url)
    }
}

impl DocumentTransport for HttpTransport {
    fn fetch(&self) -> Result<Document, TransportError> {
        tracing::debug!(url = %self.config_url(), "fetching document");
        let response = self
            .client
            .get(self.config_url())
            .send()
            .map_err(|err| TransportError::Http(err.to_string()))?;
        let envelope: ConfigResponse = response
            .json()
            .map_err(|err| TransportError::Decode(err.to_string()))?;
        if !envelope.success {
            return Err(TransportError::Rejected {
                detail: envelope
                    .error
                    .unwrap_or_else(|| "unspecified service error".to_string()),
            });
        }
        envelope
            .document
            .ok_or_else(|| TransportError::Decode("success envelope without document".to_string()))
    }

    fn submit(&self, section: &str, value: &serde_yaml::Value) -> Result<(), TransportError> {
        let value = serde_json::to_value(value)
            .map_err(|err| TransportError::Decode(format!("section value not JSON-safe: {err}")))?;
        let update = SectionUpdate {
            section: section.to_string(),
            value,
        };
        let response = self
            .client
            .post(self.config_url())
            .json(&update)
            .send()
            .map_err(|err| TransportError::Http(err.to_string()))?;
        let envelope: UpdateResponse = response
            .json()
            .map_err(|err| TransportError::Decode(err.to_string()))?;
        if envelope.success {
            Ok(())
        } else {
            Err(TransportError::Rejected {
                detail: envelope
                    .error
                    .unwrap_or_else(|| "unspecified service error".to_string()),
            })
        }
    }
}
