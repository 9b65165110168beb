mod controller;
pub mod handlers;
mod models;

pub use controller::SessionController;
pub use models::{SessionView, TimeAnchor};

use axum::http::StatusCode;
use thiserror::Error;

use crate::error::HttpError;
use crate::impl_into_response;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("No location selected")]
    NoLocationSelected,

    #[error("Saved location not found: {0}")]
    LocationNotFound(String),

    #[error("Invalid location: {0}")]
    InvalidLocation(String),

    #[error("Notice not found: {0}")]
    NoticeNotFound(u64),
}

impl HttpError for SessionError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::NoLocationSelected => StatusCode::CONFLICT,
            Self::LocationNotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidLocation(_) => StatusCode::BAD_REQUEST,
            Self::NoticeNotFound(_) => StatusCode::NOT_FOUND,
        }
    }

    fn error_code(&self) -> Option<&'static str> {
        match self {
            Self::NoLocationSelected => Some("NO_LOCATION_SELECTED"),
            Self::LocationNotFound(_) => Some("LOCATION_NOT_FOUND"),
            Self::InvalidLocation(_) => Some("INVALID_LOCATION"),
            Self::NoticeNotFound(_) => Some("NOTICE_NOT_FOUND"),
        }
    }
}

impl_into_response!(SessionError);
