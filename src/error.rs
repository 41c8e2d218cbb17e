use crate::{extraction::UpstreamError, page::IndexPage};
use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;
use tracing::{error, warn};

#[derive(Debug, Error)]
pub enum Error {
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Multipart error: {0}")]
    Multipart(#[from] MultipartError),
    #[error("Extraction service error: {0}")]
    Upstream(#[from] UpstreamError),
    #[error("Too many extractions in progress, try again shortly")]
    ServiceUnavailable,
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn status(&self) -> StatusCode {
        match self {
            Error::BadRequest(_) => StatusCode::BAD_REQUEST,
            Error::Multipart(_) => StatusCode::BAD_REQUEST,
            Error::Upstream(_) => StatusCode::BAD_GATEWAY,
            Error::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let code = self.status();
        let message = self.to_string();

        if code.is_server_error() {
            error!("{message}");
        } else {
            warn!("{message}");
        }

        match IndexPage::with_error(&message).render_html() {
            Ok(page) => (code, Html(page)).into_response(),
            Err(err) => {
                error!("Could not render error page: {err}");
                (code, message).into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_map_to_statuses() {
        assert_eq!(
            Error::BadRequest("x".to_owned()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            Error::Upstream(UpstreamError::MissingApiKey).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            Error::ServiceUnavailable.status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            Error::Internal("x".to_owned()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn upstream_message_is_carried_through() {
        let err = Error::from(UpstreamError::RateLimited("slow down".to_owned()));

        assert!(err.to_string().contains("slow down"));
    }
}
