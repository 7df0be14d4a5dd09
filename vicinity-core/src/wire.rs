//! Response encodings for the batch endpoint.
//!
//! JSON is the default; clients sending `Accept: application/octet-stream`
//! receive the same structure encoded with `bincode`.

use thiserror::Error;

use crate::BatchResponse;

/// Media type of JSON bodies.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Media type of `bincode` bodies.
pub const BINARY_CONTENT_TYPE: &str = "application/octet-stream";

/// Body encoding negotiated from the `Accept` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    /// `application/json`.
    #[default]
    Json,
    /// `application/octet-stream` carrying `bincode`.
    Binary,
}

/// Failure while encoding or decoding a response body.
#[derive(Debug, Error)]
pub enum WireError {
    /// JSON (de)serialisation failed.
    #[error("JSON body error: {0}")]
    Json(#[from] serde_json::Error),
    /// `bincode` (de)serialisation failed.
    #[error("binary body error: {0}")]
    Binary(#[from] bincode::Error),
}

impl Encoding {
    /// Pick the encoding for an `Accept` header value.
    ///
    /// # Examples
    ///
    /// ```
    /// use vicinity_core::wire::Encoding;
    ///
    /// assert_eq!(Encoding::from_accept(None), Encoding::Json);
    /// assert_eq!(
    ///     Encoding::from_accept(Some("application/octet-stream")),
    ///     Encoding::Binary
    /// );
    /// ```
    pub fn from_accept(accept: Option<&str>) -> Self {
        let wants_binary = accept.is_some_and(|value| {
            value
                .split(',')
                .any(|part| part.trim().starts_with(BINARY_CONTENT_TYPE))
        });
        if wants_binary { Self::Binary } else { Self::Json }
    }

    /// Pick the decoding for a `Content-Type` header value.
    pub fn from_content_type(content_type: Option<&str>) -> Self {
        match content_type {
            Some(value) if value.trim().starts_with(BINARY_CONTENT_TYPE) => Self::Binary,
            _ => Self::Json,
        }
    }

    /// Media type to send with this encoding.
    pub const fn content_type(self) -> &'static str {
        match self {
            Self::Json => JSON_CONTENT_TYPE,
            Self::Binary => BINARY_CONTENT_TYPE,
        }
    }
}

/// Encode a response body.
pub fn encode_response(response: &BatchResponse, encoding: Encoding) -> Result<Vec<u8>, WireError> {
    Ok(match encoding {
        Encoding::Json => serde_json::to_vec(response)?,
        Encoding::Binary => bincode::serialize(response)?,
    })
}

/// Decode a response body.
pub fn decode_response(body: &[u8], encoding: Encoding) -> Result<BatchResponse, WireError> {
    Ok(match encoding {
        Encoding::Json => serde_json::from_slice(body)?,
        Encoding::Binary => bincode::deserialize(body)?,
    })
}
