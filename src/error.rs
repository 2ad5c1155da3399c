use thiserror::Error;

/// Type alias for Result with ResponderError
pub type Result<T> = std::result::Result<T, ResponderError>;

/// Error types for the vacation responder
#[derive(Error, Debug)]
pub enum ResponderError {
    /// Gmail API returned an error that fits no other category
    #[error("Gmail API error: {0}")]
    ApiError(String),

    /// Credentials or token are invalid
    #[error("Authentication failed: {0}")]
    AuthError(String),

    /// Rate limit exceeded - should retry after specified seconds
    #[error("Rate limit exceeded, retry after {retry_after} seconds")]
    RateLimitExceeded { retry_after: u64 },

    /// Network-related error (connection issues, timeouts, etc.)
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Server returned 5xx error
    #[error("Server error (HTTP {status}): {message}")]
    ServerError { status: u16, message: String },

    /// Resource not found (404), e.g. a message deleted after listing
    #[error("Not found: {0}")]
    NotFound(String),

    /// The request payload was rejected (400)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Forbidden (403)
    #[error("Access forbidden: {0}")]
    Forbidden(String),

    /// Resource already exists (409)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A header needed to build the reply is missing or unparseable
    #[error("Malformed header: {0}")]
    MalformedHeader(String),

    /// Label setup failed in a way that needs operator attention
    #[error("Label error: {0}")]
    LabelError(String),

    /// IO error (file operations, etc.)
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl ResponderError {
    /// Check if the error is transient and the work may succeed next cycle
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ResponderError::RateLimitExceeded { .. }
                | ResponderError::ServerError { .. }
                | ResponderError::NetworkError(_)
        )
    }

    /// Check if the error is permanent and should not be retried
    pub fn is_permanent(&self) -> bool {
        !self.is_transient()
    }

    /// Errors that only concern the message being processed.
    ///
    /// These skip the message; everything else aborts the cycle.
    pub fn is_message_scoped(&self) -> bool {
        matches!(
            self,
            ResponderError::NotFound(_)
                | ResponderError::MalformedHeader(_)
                | ResponderError::InvalidArgument(_)
        )
    }

    /// Map an HTTP status from the Gmail API onto the taxonomy
    fn from_status(status_code: u16, message: String, retry_after: u64) -> Self {
        match status_code {
            400 => ResponderError::InvalidArgument(message),
            401 => ResponderError::AuthError(message),
            403 => ResponderError::Forbidden(message),
            404 => ResponderError::NotFound(message),
            409 => ResponderError::Conflict(message),
            429 => ResponderError::RateLimitExceeded { retry_after },
            500..=599 => ResponderError::ServerError {
                status: status_code,
                message,
            },
            _ => ResponderError::ApiError(message),
        }
    }
}

const DEFAULT_RETRY_AFTER: u64 = 5;

/// Parse the Retry-After header from an HTTP response
///
/// The header is either delay-seconds (`"120"`) or an HTTP-date
/// (`"Wed, 21 Oct 2015 07:28:00 GMT"`). Missing, invalid or past values
/// fall back to 5 seconds.
fn parse_retry_after_header<B>(response: &hyper::Response<B>) -> u64 {
    parse_retry_after(response.headers())
}

fn parse_retry_after(headers: &hyper::HeaderMap) -> u64 {
    let Some(value) = headers
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
    else {
        return DEFAULT_RETRY_AFTER;
    };

    if let Ok(seconds) = value.trim().parse::<u64>() {
        return seconds;
    }

    // HTTP-date is a fixed-zone subset of RFC 2822
    if let Ok(date) = chrono::DateTime::parse_from_rfc2822(value.trim()) {
        let remaining = date.with_timezone(&chrono::Utc) - chrono::Utc::now();
        if remaining.num_seconds() > 0 {
            return remaining.num_seconds() as u64;
        }
    }

    DEFAULT_RETRY_AFTER
}

/// Extract `(code, message)` from a Gmail JSON error body
///
/// Gmail reports failures as `{"error": {"code": 409, "message": "..."}}`.
fn parse_error_body(body: &serde_json::Value) -> Option<(u16, String)> {
    let error = body.get("error")?;
    let code = error.get("code")?.as_u64()?;
    let message = error
        .get("message")
        .and_then(|m| m.as_str())
        .unwrap_or("Unknown error")
        .to_string();
    u16::try_from(code).ok().map(|code| (code, message))
}

impl ResponderError {
    /// Map a non-success response that bypassed the generated Gmail calls
    ///
    /// A JSON error envelope takes precedence over the HTTP status line.
    pub(crate) fn from_http_parts(
        status: hyper::StatusCode,
        headers: &hyper::HeaderMap,
        body: &[u8],
    ) -> Self {
        let retry_after = parse_retry_after(headers);
        let parsed = serde_json::from_slice::<serde_json::Value>(body)
            .ok()
            .and_then(|value| parse_error_body(&value));

        match parsed {
            Some((code, message)) => {
                ResponderError::from_status(code, format!("HTTP {}: {}", code, message), retry_after)
            }
            None => ResponderError::from_status(
                status.as_u16(),
                format!(
                    "HTTP {}: {}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or("Unknown")
                ),
                retry_after,
            ),
        }
    }
}

impl From<google_gmail1::Error> for ResponderError {
    fn from(error: google_gmail1::Error) -> Self {
        match error {
            // Non-success status without a JSON body
            google_gmail1::Error::Failure(ref response) => {
                let status = response.status();
                let message = format!(
                    "HTTP {}: {}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or("Unknown")
                );
                ResponderError::from_status(
                    status.as_u16(),
                    message,
                    parse_retry_after_header(response),
                )
            }
            // Non-success status with a JSON error body
            google_gmail1::Error::BadRequest(ref body) => match parse_error_body(body) {
                Some((code, message)) => ResponderError::from_status(
                    code,
                    format!("HTTP {}: {}", code, message),
                    DEFAULT_RETRY_AFTER,
                ),
                None => ResponderError::InvalidArgument(body.to_string()),
            },
            google_gmail1::Error::MissingToken(ref err) => {
                ResponderError::AuthError(format!("Could not obtain access token: {}", err))
            }
            google_gmail1::Error::HttpError(ref err) => {
                ResponderError::NetworkError(format!("Connection error: {}", err))
            }
            google_gmail1::Error::Io(err) => ResponderError::NetworkError(err.to_string()),
            _ => ResponderError::ApiError(error.to_string()),
        }
    }
}
