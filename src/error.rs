//! Request-fatal errors raised while preparing a file response

use crate::content::SourceError;
use hyper::StatusCode;
use std::io;
use thiserror::Error;

/// Failure that ends a file request before the responder runs
///
/// The display text is what the client sees, so it never carries paths.
#[derive(Debug, Error)]
pub enum ServeError {
    #[error("cannot serve files with unknown sizes")]
    UnknownSize(#[source] SourceError),
    #[error("cannot detect content-type: {0}")]
    Detection(#[source] io::Error),
    #[error("seeker can't seek")]
    Rewind(#[source] io::Error),
}

impl ServeError {
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::UnknownSize(_) => StatusCode::BAD_GATEWAY,
            Self::Detection(_) | Self::Rewind(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ServeError::UnknownSize(SourceError::UnknownSize).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ServeError::Detection(io::Error::other("boom")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ServeError::Rewind(io::Error::other("boom")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            ServeError::Detection(io::Error::other("block missing")).to_string(),
            "cannot detect content-type: block missing"
        );
        assert_eq!(
            ServeError::UnknownSize(SourceError::UnknownSize).to_string(),
            "cannot serve files with unknown sizes"
        );
    }
}
