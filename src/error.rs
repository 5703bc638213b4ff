//! Normalized request errors and the classifier that produces them.
use thiserror::Error;

use crate::api::model::ErrorBody;

/// Every failure the notes API can produce, tagged by kind so callers can
/// branch on it instead of parsing messages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    /// Superseded or aborted on purpose. Never surfaced to the user.
    #[error("request cancelled")]
    Cancelled,
    #[error("Network Error ({reason})")]
    NetworkFailure { reason: String },
    #[error("{message}")]
    ServerError {
        code: u16,
        message: String,
        detail: Option<String>,
        codename: Option<String>,
    },
    /// The caller asked for something that cannot be sent (e.g. update without id).
    #[error("{0}")]
    Invalid(String),
    #[error("{0}")]
    Unknown(String),
}

pub const NETWORK_ERROR: &str = "Network Error";

impl RequestError {
    pub fn message(&self) -> String {
        match self {
            RequestError::NetworkFailure { .. } => NETWORK_ERROR.to_string(),
            other => other.to_string(),
        }
    }

    pub fn code(&self) -> Option<u16> {
        match self {
            RequestError::ServerError { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub fn detail(&self) -> Option<&str> {
        match self {
            RequestError::ServerError { detail, .. } => detail.as_deref(),
            RequestError::NetworkFailure { reason } => Some(reason),
            _ => None,
        }
    }

    pub fn codename(&self) -> Option<&str> {
        match self {
            RequestError::ServerError { codename, .. } => codename.as_deref(),
            _ => None,
        }
    }

    pub fn is_ignorable(&self) -> bool {
        matches!(self, RequestError::Cancelled)
    }

    pub fn is_network(&self) -> bool {
        matches!(self, RequestError::NetworkFailure { .. })
    }
}

/// Classify a non-2xx response.
///
/// The message comes from the first of: the body's `message`, the body's
/// `detail` when it is a plain string, the status line, a generic fallback.
pub fn classify_status(status: u16, reason: Option<&str>, body: &str) -> RequestError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    let detail = parsed.detail_text();

    let message = parsed
        .message
        .clone()
        .filter(|m| !m.trim().is_empty())
        .or_else(|| {
            parsed
                .detail
                .as_ref()
                .and_then(|d| d.as_str())
                .filter(|d| !d.trim().is_empty())
                .map(str::to_string)
        })
        .or_else(|| reason.map(|r| format!("{} {}", status, r)))
        .unwrap_or_else(|| format!("HTTP error! status: {}", status));

    RequestError::ServerError {
        code: status,
        message,
        detail,
        codename: parsed.codename,
    }
}

/// Classify a transport-level failure reported by reqwest.
pub fn classify_transport(err: &reqwest::Error) -> RequestError {
    if let Some(status) = err.status() {
        return classify_status(status.as_u16(), status.canonical_reason(), "");
    }
    if err.is_decode() {
        return RequestError::Unknown(format!("invalid response from notes API: {}", err));
    }
    if err.is_connect() || err.is_timeout() || err.is_request() || err.is_body() {
        return RequestError::NetworkFailure {
            reason: err.to_string(),
        };
    }
    RequestError::Unknown(err.to_string())
}

impl From<reqwest::Error> for RequestError {
    fn from(err: reqwest::Error) -> Self {
        classify_transport(&err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_structured_message() {
        let err = classify_status(
            404,
            Some("Not Found"),
            r#"{"message":"Note 42 not found","detail":"no row","codename":"NOTE_NOT_FOUND"}"#,
        );
        assert_eq!(err.code(), Some(404));
        assert_eq!(err.message(), "Note 42 not found");
        assert_eq!(err.detail(), Some("no row"));
        assert_eq!(err.codename(), Some("NOTE_NOT_FOUND"));
    }

    #[test]
    fn falls_back_to_string_detail() {
        let err = classify_status(422, Some("Unprocessable Entity"), r#"{"detail":"title too long"}"#);
        assert_eq!(err.message(), "title too long");
        assert_eq!(err.detail(), Some("title too long"));
    }

    #[test]
    fn structured_detail_is_kept_but_not_used_as_message() {
        let err = classify_status(
            422,
            Some("Unprocessable Entity"),
            r#"{"detail":[{"loc":["body","title"],"msg":"field required"}]}"#,
        );
        assert_eq!(err.message(), "422 Unprocessable Entity");
        assert!(err.detail().unwrap().contains("field required"));
    }

    #[test]
    fn non_json_body_uses_status_text() {
        let err = classify_status(502, Some("Bad Gateway"), "<html>upstream down</html>");
        assert_eq!(err.message(), "502 Bad Gateway");
        assert_eq!(err.detail(), None);
    }

    #[test]
    fn generic_message_without_status_text() {
        let err = classify_status(599, None, "");
        assert_eq!(err.message(), "HTTP error! status: 599");
        assert_eq!(err.codename(), None);
    }

    #[test]
    fn only_cancellation_is_ignorable() {
        assert!(RequestError::Cancelled.is_ignorable());
        let network = RequestError::NetworkFailure {
            reason: "connection refused".into(),
        };
        assert!(!network.is_ignorable());
        assert!(network.is_network());
        assert_eq!(network.message(), NETWORK_ERROR);
        assert!(!classify_status(500, None, "").is_ignorable());
    }
}
