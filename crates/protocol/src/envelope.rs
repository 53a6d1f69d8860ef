use serde::{Deserialize, Serialize};

/// Error or informational message inside an API envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiMessage {
    #[serde(default)]
    pub code: i64,
    pub message: String,
}

/// Envelope wrapping every pages API response.
///
/// `result` is absent or `null` on failures and for endpoints that return
/// nothing useful.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub errors: Vec<ApiMessage>,
    #[serde(default)]
    pub messages: Vec<ApiMessage>,
    pub result: Option<T>,
}

/// Errors raised while unwrapping an envelope.
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    #[error("API reported failure: {0}")]
    Unsuccessful(String),

    #[error("API response carried no result")]
    MissingResult,
}

impl<T> ApiEnvelope<T> {
    /// Joins the error messages into one line (empty when there are none).
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| format!("{} ({})", e.message, e.code))
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Returns the result, failing if the call was unsuccessful or empty.
    pub fn into_result(self) -> Result<T, EnvelopeError> {
        if !self.success {
            return Err(EnvelopeError::Unsuccessful(self.error_summary()));
        }
        self.result.ok_or(EnvelopeError::MissingResult)
    }

    /// Checks success without requiring a result payload.
    pub fn ensure_success(&self) -> Result<(), EnvelopeError> {
        if self.success {
            Ok(())
        } else {
            Err(EnvelopeError::Unsuccessful(self.error_summary()))
        }
    }
}
