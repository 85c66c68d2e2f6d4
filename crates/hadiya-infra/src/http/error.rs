//! Mapping from HTTP failures to [`ApiError`].
//!
//! - 401 becomes [`ApiError::Unauthorized`]
//! - any other error status becomes [`ApiError::Network`] with the status
//! - transport failures become [`ApiError::Network`] without a status
//!
//! The message is the response body's `detail` field when present, falling
//! back to the status text.

use reqwest::StatusCode;
use serde_json::Value;

use hadiya_types::error::ApiError;

/// Build an [`ApiError`] from a non-success response, consuming its body.
pub async fn from_response(response: reqwest::Response) -> ApiError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    from_status(status, &body)
}

pub fn from_status(status: StatusCode, body: &str) -> ApiError {
    let message = detail_message(body).unwrap_or_else(|| status_text(status));
    if status == StatusCode::UNAUTHORIZED {
        ApiError::Unauthorized(message)
    } else {
        ApiError::Network {
            status: Some(status.as_u16()),
            message,
        }
    }
}

/// Map a `reqwest` transport error.
pub fn from_transport(err: reqwest::Error) -> ApiError {
    let message = if err.is_timeout() {
        "request timed out".to_string()
    } else if err.is_connect() {
        format!("could not reach server: {err}")
    } else {
        format!("HTTP request failed: {err}")
    };
    ApiError::Network {
        status: err.status().map(|s| s.as_u16()),
        message,
    }
}

/// `detail` from a JSON error body. Non-string details (validation error
/// lists) are rendered as compact JSON.
fn detail_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    match value.get("detail")? {
        Value::Null => None,
        Value::String(detail) if detail.trim().is_empty() => None,
        Value::String(detail) => Some(detail.clone()),
        other => Some(other.to_string()),
    }
}

fn status_text(status: StatusCode) -> String {
    status
        .canonical_reason()
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_uses_detail() {
        let err = from_status(
            StatusCode::UNAUTHORIZED,
            r#"{"detail":"Could not validate credentials"}"#,
        );
        assert_eq!(err, ApiError::Unauthorized("Could not validate credentials".into()));
        assert!(err.is_auth());
    }

    #[test]
    fn forbidden_is_network_not_auth() {
        let err = from_status(StatusCode::FORBIDDEN, r#"{"detail":"Not authorized"}"#);
        assert!(!err.is_auth());
        assert_eq!(
            err,
            ApiError::Network {
                status: Some(403),
                message: "Not authorized".into()
            }
        );
    }

    #[test]
    fn missing_detail_falls_back_to_status_text() {
        let err = from_status(StatusCode::NOT_FOUND, "");
        assert_eq!(err.user_message(), "Not Found");

        let err = from_status(StatusCode::BAD_GATEWAY, "<html>oops</html>");
        assert_eq!(err.user_message(), "Bad Gateway");
    }

    #[test]
    fn structured_detail_is_rendered() {
        let err = from_status(
            StatusCode::UNPROCESSABLE_ENTITY,
            r#"{"detail":[{"loc":["body","content"],"msg":"field required"}]}"#,
        );
        assert!(err.user_message().contains("field required"));
    }
}
