//! Error types for API requests, parsing and session state.
//!
//! Every failure a caller can observe is an [`OsmError`]. The type is `Clone`
//! so a single result can be fanned out to every waiter of a coalesced
//! request.
//!
//! Errors carry a numeric [`status`](OsmError::status): the HTTP status for
//! transport failures, or one of the synthetic negative codes below for
//! failures produced by the client itself.

use thiserror::Error;

/// Synthetic status for connection switches and empty documents.
pub const STATUS_CONNECTION: i32 = -1;

/// Synthetic status for single-flight rejections.
pub const STATUS_INFLIGHT: i32 = -2;

/// Synthetic status for operations that require authentication.
pub const STATUS_NOT_AUTHENTICATED: i32 = -3;

/// HTTP statuses that mean the session credentials were rejected.
const AUTHORIZATION_STATUSES: [u16; 3] = [400, 401, 403];

/// HTTP statuses that mean the server is throttling us.
const RATE_LIMIT_STATUSES: [u16; 2] = [429, 509];

/// Errors produced by the API client.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OsmError {
    /// The server (or the network) failed the request.
    #[error("HTTP {status}: {message}")]
    Transport { status: u16, message: String },

    /// The session was reset, re-authenticated or switched while the
    /// request was outstanding.
    #[error("Connection Switched")]
    ConnectionSwitched,

    /// The response did not contain a document with a root element.
    #[error("No XML")]
    NoData,

    /// The response body could not be decoded.
    #[error("Malformed document: {0}")]
    MalformedDocument(String),

    /// A changeset step is already outstanding for this connection.
    #[error("Changeset already inflight")]
    ChangesetInflight,

    /// A create/comment/close/reopen request for this note is outstanding.
    #[error("Note update already inflight")]
    NoteUpdateInflight,

    /// The operation requires an authenticated session.
    #[error("Not Authenticated")]
    NotAuthenticated,

    /// The request was aborted before it completed.
    #[error("Request cancelled")]
    Cancelled,
}

impl OsmError {
    /// Creates a transport error.
    pub fn transport(status: u16, message: impl Into<String>) -> Self {
        OsmError::Transport {
            status,
            message: message.into(),
        }
    }

    /// Returns the HTTP status, or the synthetic code for client-side errors.
    pub fn status(&self) -> i32 {
        match self {
            OsmError::Transport { status, .. } => i32::from(*status),
            OsmError::ConnectionSwitched | OsmError::NoData => STATUS_CONNECTION,
            OsmError::MalformedDocument(_) | OsmError::Cancelled => STATUS_CONNECTION,
            OsmError::ChangesetInflight | OsmError::NoteUpdateInflight => STATUS_INFLIGHT,
            OsmError::NotAuthenticated => STATUS_NOT_AUTHENTICATED,
        }
    }

    /// True for 400 Bad Request, 401 Unauthorized and 403 Forbidden.
    pub fn is_authorization(&self) -> bool {
        matches!(self, OsmError::Transport { status, .. } if AUTHORIZATION_STATUSES.contains(status))
    }

    /// True for 429 Too Many Requests and 509 Bandwidth Limit Exceeded.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, OsmError::Transport { status, .. } if RATE_LIMIT_STATUSES.contains(status))
    }

    /// True when the error comes from an epoch mismatch.
    pub fn is_connection_switched(&self) -> bool {
        matches!(self, OsmError::ConnectionSwitched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authorization_statuses() {
        for status in [400, 401, 403] {
            let err = OsmError::transport(status, "denied");
            assert!(err.is_authorization(), "{} should be authorization", status);
            assert!(!err.is_rate_limited());
        }
        assert!(!OsmError::transport(404, "missing").is_authorization());
        assert!(!OsmError::NotAuthenticated.is_authorization());
    }

    #[test]
    fn test_rate_limit_statuses() {
        assert!(OsmError::transport(429, "slow down").is_rate_limited());
        assert!(OsmError::transport(509, "bandwidth").is_rate_limited());
        assert!(!OsmError::transport(500, "boom").is_rate_limited());
    }

    #[test]
    fn test_synthetic_status_codes() {
        assert_eq!(OsmError::ConnectionSwitched.status(), -1);
        assert_eq!(OsmError::NoData.status(), -1);
        assert_eq!(OsmError::ChangesetInflight.status(), -2);
        assert_eq!(OsmError::NoteUpdateInflight.status(), -2);
        assert_eq!(OsmError::NotAuthenticated.status(), -3);
        assert_eq!(OsmError::transport(503, "down").status(), 503);
    }

    #[test]
    fn test_display_messages() {
        assert_eq!(OsmError::ConnectionSwitched.to_string(), "Connection Switched");
        assert_eq!(
            OsmError::transport(401, "Unauthorized").to_string(),
            "HTTP 401: Unauthorized"
        );
    }
}
