use reqwest::StatusCode;
use thiserror::Error;

/// Failures detected by this crate.
///
/// Public functions return [`anyhow::Result`]; when the root cause is one of these
/// variants it can be recovered with `err.downcast_ref::<cdseapi::Error>()`.
#[derive(Debug, Error)]
pub enum Error {
    /// The catalogue or download service answered with a non-success status.
    #[error("HTTP {status} for url ({url})\n{message}")]
    Http {
        status: StatusCode,
        url: String,
        message: String,
    },

    /// The identity service refused to issue an access token.
    #[error(
        "access token request failed (HTTP {status})\n{message}\nCheck that your CDSE username and password are valid for https://dataspace.copernicus.eu/"
    )]
    Token { status: StatusCode, message: String },

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("invalid area of interest: {0}")]
    Geometry(String),

    #[error("missing configuration: {0}")]
    Config(String),
}

#[derive(Debug, Default, serde::Deserialize)]
pub(crate) struct ODataErrorResponse {
    #[serde(default)]
    pub(crate) detail: Option<serde_json::Value>,
    #[serde(default)]
    pub(crate) message: Option<String>,
    #[serde(default)]
    pub(crate) error: Option<ODataErrorBody>,
    // identity service style: {"error": "...", "error_description": "..."}
    #[serde(default)]
    pub(crate) error_description: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
#[serde(untagged)]
pub(crate) enum ODataErrorBody {
    Object {
        #[serde(default)]
        code: Option<String>,
        #[serde(default)]
        message: Option<String>,
    },
    Text(String),
}

impl ODataErrorResponse {
    fn summary(&self) -> Option<String> {
        let mut parts: Vec<String> = Vec::new();
        match &self.error {
            Some(ODataErrorBody::Object { code, message }) => {
                if let Some(code) = code {
                    parts.push(code.clone());
                }
                if let Some(message) = message {
                    parts.push(message.clone());
                }
            }
            Some(ODataErrorBody::Text(text)) => parts.push(text.clone()),
            None => {}
        }
        if let Some(message) = &self.message {
            parts.push(message.clone());
        }
        if let Some(desc) = &self.error_description {
            parts.push(desc.clone());
        }
        match &self.detail {
            Some(serde_json::Value::String(s)) => parts.push(s.clone()),
            Some(serde_json::Value::Null) | None => {}
            Some(other) => parts.push(other.to_string()),
        }
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(": "))
        }
    }
}

/// Builds the error for a non-success catalogue or download response.
pub(crate) fn http_error(status: StatusCode, url: &str, body: &str) -> Error {
    let summary = serde_json::from_str::<ODataErrorResponse>(body)
        .ok()
        .and_then(|e| e.summary())
        .unwrap_or_else(|| body.trim().to_string());

    let message = if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        format!(
            "CDSE authentication/authorization failed.\n- Access tokens expire after a few minutes; request a new one\n- Check that the account may download this product\n\nServer message: {}",
            summary
        )
    } else {
        summary
    };

    Error::Http {
        status,
        url: url.to_string(),
        message,
    }
}

pub(crate) fn token_error(status: StatusCode, body: &str) -> Error {
    let message = serde_json::from_str::<ODataErrorResponse>(body)
        .ok()
        .and_then(|e| e.summary())
        .unwrap_or_else(|| body.trim().to_string());
    Error::Token { status, message }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn odata_error_object_is_summarised() {
        let body = r#"{"error":{"code":"InvalidFilter","message":"Unknown property 'Foo'"}}"#;
        let err = http_error(StatusCode::BAD_REQUEST, "http://x/Products", body);
        match err {
            Error::Http { status, message, .. } => {
                assert_eq!(status, StatusCode::BAD_REQUEST);
                assert_eq!(message, "InvalidFilter: Unknown property 'Foo'");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn detail_list_and_plain_bodies() {
        let body = r#"{"detail":[{"msg":"bad skip"}]}"#;
        let err = http_error(StatusCode::UNPROCESSABLE_ENTITY, "u", body);
        assert!(err.to_string().contains("bad skip"));

        let err = http_error(StatusCode::BAD_GATEWAY, "u", "upstream down\n");
        assert!(err.to_string().ends_with("upstream down"));
    }

    #[test]
    fn unauthorized_adds_hint() {
        let err = http_error(StatusCode::UNAUTHORIZED, "u", r#"{"detail":"Expired signature!"}"#);
        let text = err.to_string();
        assert!(text.contains("authentication/authorization failed"));
        assert!(text.contains("Expired signature!"));
    }

    #[test]
    fn token_error_uses_error_description() {
        let body = r#"{"error":"invalid_grant","error_description":"Invalid user credentials"}"#;
        let err = token_error(StatusCode::UNAUTHORIZED, body);
        assert!(err.to_string().contains("invalid_grant: Invalid user credentials"));
    }
}
