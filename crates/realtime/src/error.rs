//! Location tracking errors

use axum::response::{IntoResponse, Response};
use http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type used across the crate.
pub type Result<T> = anyhow::Result<T, Error>;

/// Domain level error type returned by the tracking subsystem.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum Error {
    /// The user declined location access. The caller should direct the user
    /// to the system settings; nothing retries automatically.
    #[error("code: 403, description: permission_denied")]
    PermissionDenied,

    /// Fix acquisition failed (signal loss, hardware fault).
    #[error("code: 503, description: location_unavailable {0}")]
    LocationUnavailable(String),

    /// A write to the shared store failed.
    #[error("code: 502, description: publish_failure {0}")]
    PublishFailure(String),

    /// Tracking was started while a session was already active.
    #[error("code: 409, description: stale_session {0}")]
    StaleSessionConflict(String),

    /// Latitude or longitude is out of range or not finite.
    #[error("code: 400, description: invalid_coordinates {0}")]
    InvalidCoordinates(String),

    /// The request payload is invalid or missing required fields.
    #[error("code: 400, description: {0}")]
    BadRequest(String),

    /// A stored record could not be decoded.
    #[error("code: 500, description: invalid_format {0}")]
    InvalidFormat(String),

    /// The requested resource could not be found.
    #[error("code: 404, description: {0}")]
    NotFound(String),

    /// A non recoverable internal error occurred.
    #[error("code: 500, description: {0}")]
    Internal(String),
}

impl Error {
    /// Returns the stable error code associated with the variant.
    #[must_use]
    pub const fn code(&self) -> StatusCode {
        match self {
            Self::PermissionDenied => StatusCode::FORBIDDEN,
            Self::LocationUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::PublishFailure(_) => StatusCode::BAD_GATEWAY,
            Self::StaleSessionConflict(_) => StatusCode::CONFLICT,
            Self::InvalidCoordinates(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidFormat(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the error description.
    #[must_use]
    pub fn description(&self) -> String {
        self.to_string()
    }

    /// Whether the error should be surfaced to the user as an actionable
    /// prompt. Everything else is recovered locally.
    #[must_use]
    pub const fn is_user_actionable(&self) -> bool {
        matches!(self, Self::PermissionDenied)
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        let chain = err.chain().map(ToString::to_string).collect::<Vec<_>>().join(" -> ");

        // if type is Error, return it with the newly added context
        if let Some(inner) = err.downcast_ref::<Self>() {
            tracing::debug!("Error: {err}, caused by: {inner}");

            return match inner {
                Self::BadRequest(_) => Self::BadRequest(chain),
                Self::NotFound(_) => Self::NotFound(chain),
                Self::Internal(_) => Self::Internal(chain),
                Self::LocationUnavailable(e) => Self::LocationUnavailable(format!("{err}: {e}")),
                Self::PublishFailure(e) => Self::PublishFailure(format!("{err}: {e}")),
                Self::StaleSessionConflict(e) => Self::StaleSessionConflict(format!("{err}: {e}")),
                Self::InvalidCoordinates(e) => Self::InvalidCoordinates(format!("{err}: {e}")),
                Self::InvalidFormat(e) => Self::InvalidFormat(format!("{err}: {e}")),
                Self::PermissionDenied => Self::PermissionDenied,
            };
        }

        // otherwise, return an Internal error
        Self::Internal(chain)
    }
}

impl From<geoindex::Error> for Error {
    fn from(err: geoindex::Error) -> Self {
        match err {
            geoindex::Error::InvalidGeohash(_) => Self::InvalidFormat(err.to_string()),
            _ => Self::InvalidCoordinates(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidFormat(err.to_string())
    }
}

/// Error rendered as an HTTP response.
pub struct HttpError {
    status: StatusCode,
    error: String,
}

impl HttpError {
    /// The response status.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<anyhow::Error> for HttpError {
    fn from(e: anyhow::Error) -> Self {
        let error = format!("{e}, caused by: {}", e.root_cause());
        let status = e.downcast_ref().map_or(StatusCode::INTERNAL_SERVER_ERROR, Error::code);
        Self { status, error }
    }
}

impl From<Error> for HttpError {
    fn from(e: Error) -> Self {
        Self { status: e.code(), error: e.to_string() }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        (self.status, self.error).into_response()
    }
}

#[macro_export]
macro_rules! bad_request {
    ($fmt:expr, $($arg:tt)*) => {
        $crate::Error::BadRequest(format!($fmt, $($arg)*))
    };
     ($err:expr $(,)?) => {
        $crate::Error::BadRequest(format!($err))
    };
}

#[cfg(test)]
mod tests {
    use anyhow::{Context, Result, anyhow};
    use http::StatusCode;
    use serde_json::Value;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::{EnvFilter, Registry, fmt};

    use super::{Error, HttpError};

    #[test]
    fn error_display() {
        let err = Error::BadRequest("invalid input".to_string());
        assert_eq!(format!("{err}",), "code: 400, description: invalid input");
    }

    #[test]
    fn with_context() {
        let _ = Registry::default().with(EnvFilter::new("debug")).with(fmt::layer()).try_init();

        let context_error = || -> Result<(), Error> {
            Err(Error::BadRequest("invalid input".to_string()))
                .context("doing something")
                .context("more context")?;
            Ok(())
        };

        let result = context_error();
        assert_eq!(
            result.unwrap_err(),
            Error::BadRequest(
                "more context -> doing something -> code: 400, description: invalid input"
                    .to_string()
            )
        );
    }

    // Should keep the variant and prefix the outermost context.
    #[test]
    fn publish_context() {
        let result = Err::<(), Error>(Error::PublishFailure("store offline".to_string()))
            .context("publishing v1");
        let err: Error = result.unwrap_err().into();

        assert_eq!(
            err.to_string(),
            "code: 502, description: publish_failure publishing v1: store offline"
        );
        assert_eq!(err.code(), StatusCode::BAD_GATEWAY);
    }

    // Should survive added context unchanged.
    #[test]
    fn permission_context() {
        let result = Err::<(), Error>(Error::PermissionDenied).context("starting sampler");
        let err: Error = result.unwrap_err().into();

        assert_eq!(err, Error::PermissionDenied);
        assert!(err.is_user_actionable());
    }

    #[test]
    fn anyhow_context() {
        let result = Err::<(), anyhow::Error>(anyhow!("one-off error")).context("error context");
        let err: Error = result.unwrap_err().into();

        assert_eq!(err.to_string(), "code: 500, description: error context -> one-off error");
        assert!(!err.is_user_actionable());
    }

    #[test]
    fn serde_context() {
        let result: Result<Value, anyhow::Error> =
            serde_json::from_str(r#"{"foo": "bar""#).context("error context");
        let err: Error = result.unwrap_err().into();

        assert_eq!(
            err.to_string(),
            "code: 500, description: error context -> EOF while parsing an object at line 1 column 13"
        );
    }

    #[test]
    fn geo_errors() {
        let err: Error = geoindex::encode(91.0, 0.0, 9).unwrap_err().into();
        assert_eq!(err.code(), StatusCode::BAD_REQUEST);

        let err: Error = geoindex::decode("abc").unwrap_err().into();
        assert!(matches!(err, Error::InvalidFormat(_)));
    }

    #[test]
    fn http_status() {
        let err: HttpError = Error::InvalidCoordinates("lat 91".to_string()).into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err: HttpError = anyhow!(Error::NotFound("v9".to_string())).into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }
}
