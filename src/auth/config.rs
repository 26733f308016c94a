use crate::auth::{AuthError, AuthResult};

/// Authentication configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub issuer: String,
    pub audience: String,
    pub token_ttl_secs: i64,
    pub reset_token_ttl_secs: i64,
    pub jwt_secret: String,
    pub frontend_url: String,
}

impl AuthConfig {
    pub fn from_env() -> AuthResult<Self> {
        let issuer =
            std::env::var("HOSPITAL_JWT_ISSUER").unwrap_or_else(|_| "http://localhost".into());
        let audience =
            std::env::var("HOSPITAL_JWT_AUDIENCE").unwrap_or_else(|_| "hospital-api".into());
        let token_ttl_secs = std::env::var("HOSPITAL_TOKEN_TTL_SECS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(10 * 60 * 60);
        let reset_token_ttl_secs = std::env::var("HOSPITAL_RESET_TOKEN_TTL_SECS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(60 * 60);
        let jwt_secret = std::env::var("HOSPITAL_JWT_SECRET")
            .map_err(|_| AuthError::Config("HOSPITAL_JWT_SECRET is required".into()))?;
        let frontend_url = std::env::var("HOSPITAL_FRONTEND_URL")
            .unwrap_or_else(|_| "http://localhost:3000".into());

        Ok(Self {
            issuer,
            audience,
            token_ttl_secs,
            reset_token_ttl_secs,
            jwt_secret,
            frontend_url,
        })
    }
}
