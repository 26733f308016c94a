use rocket::http::Status;
use thiserror::Error;

pub type AuthResult<T> = Result<T, AuthError>;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("account is deactivated")]
    AccountInactive,
    #[error("malformed token")]
    MalformedToken,
    #[error("invalid token signature")]
    InvalidSignature,
    #[error("token expired")]
    ExpiredToken,
    #[error("token subject does not match identity")]
    SubjectMismatch,
    #[error("identity not found")]
    IdentityNotFound,
    #[error("role not permitted for this route")]
    RoleMismatch,
    #[error("reset token not found")]
    ResetTokenNotFound,
    #[error("reset token expired")]
    ResetTokenExpired,
    #[error("reset token already used")]
    ResetTokenAlreadyUsed,
    #[error("unauthorized")]
    Unauthorized,
    #[error("configuration error: {0}")]
    Config(String),
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("argon2 parameter error: {0}")]
    Argon2(String),
    #[error("password hashing error: {0}")]
    PasswordHash(String),
    #[error("unexpected error: {0}")]
    Other(String),
}

impl AuthError {
    pub fn status(&self) -> Status {
        match self {
            AuthError::InvalidCredentials
            | AuthError::AccountInactive
            | AuthError::MalformedToken
            | AuthError::InvalidSignature
            | AuthError::ExpiredToken
            | AuthError::SubjectMismatch
            | AuthError::IdentityNotFound
            | AuthError::Unauthorized => Status::Unauthorized,
            AuthError::RoleMismatch => Status::Forbidden,
            AuthError::ResetTokenNotFound
            | AuthError::ResetTokenExpired
            | AuthError::ResetTokenAlreadyUsed => Status::BadRequest,
            AuthError::Config(_)
            | AuthError::Sqlx(_)
            | AuthError::Argon2(_)
            | AuthError::PasswordHash(_)
            | AuthError::Other(_) => Status::InternalServerError,
        }
    }

    /// Message safe to return to the caller. Sub-reasons within a class are
    /// collapsed so responses cannot serve as an oracle: every authentication
    /// failure reads the same, and the three reset-token failures are
    /// indistinguishable.
    pub fn public_message(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials => "Invalid email or password",
            AuthError::RoleMismatch => "Access denied",
            AuthError::ResetTokenNotFound
            | AuthError::ResetTokenExpired
            | AuthError::ResetTokenAlreadyUsed => "Invalid or expired token",
            AuthError::AccountInactive
            | AuthError::MalformedToken
            | AuthError::InvalidSignature
            | AuthError::ExpiredToken
            | AuthError::SubjectMismatch
            | AuthError::IdentityNotFound
            | AuthError::Unauthorized => "Unauthorized",
            AuthError::Config(_)
            | AuthError::Sqlx(_)
            | AuthError::Argon2(_)
            | AuthError::PasswordHash(_)
            | AuthError::Other(_) => "Internal server error",
        }
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;
        match err.kind() {
            ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
            ErrorKind::InvalidSignature => AuthError::InvalidSignature,
            ErrorKind::InvalidToken
            | ErrorKind::Base64(_)
            | ErrorKind::Json(_)
            | ErrorKind::Utf8(_) => AuthError::MalformedToken,
            _ => AuthError::InvalidSignature,
        }
    }
}

impl From<argon2::Error> for AuthError {
    fn from(err: argon2::Error) -> Self {
        AuthError::Argon2(err.to_string())
    }
}

impl From<argon2::password_hash::Error> for AuthError {
    fn from(err: argon2::password_hash::Error) -> Self {
        AuthError::PasswordHash(err.to_string())
    }
}
