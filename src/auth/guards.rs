//! Request guards forming the authentication gate and role checks.
//!
//! Per request the gate walks: bearer header present → token parsed →
//! identity resolved → token validated against that identity → route policy
//! satisfied. The first failed step short-circuits with 401 (or 403 for a
//! policy denial) and the handler never runs. Callers only ever see the
//! generic message; the concrete reason goes to the log.

use rocket::Request;
use rocket::State;
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome};
use rocket_okapi::request::OpenApiFromRequest;
use sqlx::PgPool;

use crate::auth::policy::{self, Role};
use crate::auth::store::CredentialStore;
use crate::auth::{AuthError, AuthResult, AuthState};

/// The identity attached to a request once the gate accepts it.
#[derive(Debug, Clone, OpenApiFromRequest)]
pub struct AuthUser {
    pub id: i32,
    pub user_id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthUser {
    type Error = AuthError;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match extract_user(request).await {
            Ok(user) => Outcome::Success(user),
            Err(err) => {
                log::warn!("{} {}: rejected: {}", request.method(), request.uri(), err);
                Outcome::Error((err.status(), err))
            }
        }
    }
}

async fn extract_user(request: &Request<'_>) -> AuthResult<AuthUser> {
    // TokenPresent: header must exist and carry the Bearer scheme. A
    // malformed header is rejected before any identity lookup.
    let token = bearer_token(request.headers().get_one("Authorization"))?;

    let auth_state = request
        .guard::<&State<AuthState>>()
        .await
        .succeeded()
        .ok_or_else(|| AuthError::Config("AuthState missing from state".into()))?;

    let pool = request
        .guard::<&State<PgPool>>()
        .await
        .succeeded()
        .ok_or_else(|| AuthError::Config("database pool missing from state".into()))?;

    // TokenParsed: untrusted parse, only to learn which identity to load.
    let subject = auth_state.token_service.extract_subject(token)?;

    // IdentityResolved.
    let store = CredentialStore::new(pool.inner().clone());
    let user = store
        .find_by_email(&subject)
        .await?
        .ok_or(AuthError::IdentityNotFound)?;

    if !user.is_active {
        return Err(AuthError::AccountInactive);
    }

    // TokenValidated: signature, expiry, and subject against the identity's
    // current email.
    let claims = auth_state.token_service.validate(token, &user.email)?;

    let role = Role::parse(&user.role)
        .ok_or_else(|| AuthError::Other(format!("unknown role '{}' in store", user.role)))?;
    if claims.role != role.as_str() {
        // Role changed since issuance; force a fresh login.
        return Err(AuthError::Unauthorized);
    }

    // Authenticated; now the route policy. Matching uses the mounted route
    // path (the path the router actually resolved), not the raw URI.
    let routing_path = request
        .route()
        .map(|route| route.uri.unmounted_origin.path().as_str().to_string())
        .unwrap_or_else(|| request.uri().path().as_str().to_string());
    if !policy::allows(role, &routing_path) {
        return Err(AuthError::RoleMismatch);
    }

    Ok(AuthUser {
        id: user.id,
        user_id: user.user_id,
        email: user.email,
        first_name: user.first_name,
        last_name: user.last_name,
        role,
    })
}

fn bearer_token(header: Option<&str>) -> AuthResult<&str> {
    let header = header.ok_or(AuthError::Unauthorized)?;
    let mut parts = header.splitn(2, ' ');
    let scheme = parts.next().unwrap_or_default();
    let token = parts.next().unwrap_or_default();
    if scheme.eq_ignore_ascii_case("Bearer") && !token.is_empty() {
        Ok(token)
    } else {
        Err(AuthError::MalformedToken)
    }
}

macro_rules! role_guard {
    ($name:ident, $variant:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, OpenApiFromRequest)]
        pub struct $name(pub AuthUser);

        #[rocket::async_trait]
        impl<'r> FromRequest<'r> for $name {
            type Error = AuthError;

            async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
                match AuthUser::from_request(request).await {
                    Outcome::Success(user) if user.role == Role::$variant => {
                        Outcome::Success($name(user))
                    }
                    Outcome::Success(_) => {
                        Outcome::Error((Status::Forbidden, AuthError::RoleMismatch))
                    }
                    Outcome::Error(err) => Outcome::Error(err),
                    Outcome::Forward(_) => {
                        Outcome::Error((Status::Unauthorized, AuthError::Unauthorized))
                    }
                }
            }
        }
    };
}

role_guard!(RequireAdmin, Admin, "Guard for admin-only routes.");
role_guard!(RequireDoctor, Doctor, "Guard for doctor-only routes.");
role_guard!(RequirePharmacist, Pharmacist, "Guard for pharmacist-only routes.");
role_guard!(
    RequireReceptionist,
    Receptionist,
    "Guard for receptionist-only routes."
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_scheme_is_required() {
        assert!(bearer_token(Some("Bearer abc.def.ghi")).is_ok());
        assert!(bearer_token(Some("bearer abc.def.ghi")).is_ok());

        assert!(matches!(bearer_token(None), Err(AuthError::Unauthorized)));
        assert!(matches!(
            bearer_token(Some("abc.def.ghi")),
            Err(AuthError::MalformedToken)
        ));
        assert!(matches!(
            bearer_token(Some("Basic dXNlcjpwYXNz")),
            Err(AuthError::MalformedToken)
        ));
        assert!(matches!(
            bearer_token(Some("Bearer ")),
            Err(AuthError::MalformedToken)
        ));
    }
}
