//! Business-rule failures reported by the services.

use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("invalid role")]
    InvalidRole,

    #[error("invalid email")]
    InvalidEmail,

    #[error("invalid city")]
    InvalidCity,

    #[error("invalid product type")]
    InvalidProductType,

    #[error("invalid pvz id")]
    InvalidPickupPoint(Uuid),

    #[error("user already exists")]
    UserExists,

    #[error("open reception already exists")]
    OpenReceptionAlreadyExists,

    #[error("no open reception exists")]
    NoOpenReception,

    #[error("no products in open reception")]
    NoProducts,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("invalid token")]
    InvalidToken,

    #[error("token expired")]
    TokenExpired,

    /// Anything the caller cannot fix; the message stays in the logs
    #[error("internal server error")]
    Internal(String),
}

impl ServiceError {
    /// Wrap an unexpected store failure, logging the cause
    pub fn internal(context: &str, err: impl std::fmt::Display) -> Self {
        tracing::error!("{}: {}", context, err);
        Self::Internal(format!("{}: {}", context, err))
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
