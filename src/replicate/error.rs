use reqwest::StatusCode;
use thiserror::Error;

/// Longest response body we embed in an error message.
const MAX_BODY_CHARS: usize = 2000;

/// Errors returned by the Replicate predictions API
#[derive(Debug, Error)]
pub enum ReplicateError {
    #[error("Replicate API error {status}: {body}")]
    Api { status: StatusCode, body: String },

    /// The create call succeeded but the response carried no prediction id
    #[error("Missing prediction id from create response: {body}")]
    MissingId { body: String },
}

impl ReplicateError {
    pub fn api(status: StatusCode, body: String) -> Self {
        Self::Api {
            status,
            body: truncated(body),
        }
    }

    pub fn missing_id(body: String) -> Self {
        Self::MissingId {
            body: truncated(body),
        }
    }
}

fn truncated(body: String) -> String {
    if body.chars().count() <= MAX_BODY_CHARS {
        body
    } else {
        body.chars().take(MAX_BODY_CHARS).collect()
    }
}
