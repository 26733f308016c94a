//! Authentication core: configuration, token minting and validation, the
//! request gate, route policy, credential storage, and the password reset
//! lifecycle.

use std::sync::Arc;

pub mod config;
pub mod error;
pub mod guards;
pub mod jwt;
pub mod mailer;
pub mod passwords;
pub mod policy;
pub mod reset;
pub mod responses;
pub mod routes;
pub mod store;

pub use config::AuthConfig;
pub use error::{AuthError, AuthResult};
pub use guards::{AuthUser, RequireAdmin, RequireDoctor, RequirePharmacist, RequireReceptionist};
pub use jwt::TokenService;
pub use mailer::Mailer;
pub use passwords::PasswordService;
pub use policy::Role;
pub use reset::PasswordResetStore;
pub use store::CredentialStore;

#[derive(Clone)]
pub struct AuthState {
    pub config: AuthConfig,
    pub password_service: Arc<PasswordService>,
    pub token_service: Arc<TokenService>,
    pub mailer: Arc<dyn Mailer>,
}

impl AuthState {
    pub fn new(
        config: AuthConfig,
        password_service: PasswordService,
        token_service: TokenService,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self {
            config,
            password_service: Arc::new(password_service),
            token_service: Arc::new(token_service),
            mailer,
        }
    }
}
