use chrono::{Duration, Utc};
use rocket::http::Status;
use rocket::response::status;
use rocket::serde::json::Json;
use rocket::{State, get, post};
use rocket_okapi::okapi::schemars::JsonSchema;
use rocket_okapi::openapi;
use sqlx::PgPool;

use crate::auth::guards::AuthUser;
use crate::auth::policy::Role;
use crate::auth::reset::PasswordResetStore;
use crate::auth::responses::{
    ForgotPasswordRequest, LoginRequest, LoginResponse, MessageResponse, RegisterRequest,
    ResetPasswordRequest, UserSummary,
};
use crate::auth::store::{CredentialStore, NewIdentity};
use crate::auth::{AuthError, AuthState};

type AuthRouteResult<T> = Result<Json<T>, status::Custom<Json<AuthErrorResponse>>>;

#[derive(Debug, serde::Serialize, JsonSchema)]
pub struct AuthErrorResponse {
    pub status: u16,
    pub message: String,
}

#[openapi(tag = "Auth")]
#[post("/auth/login", data = "<payload>")]
pub async fn login(
    state: &State<AuthState>,
    pool: &State<PgPool>,
    payload: Json<LoginRequest>,
) -> AuthRouteResult<LoginResponse> {
    // Only the email is normalized; passwords are compared verbatim, as
    // they were hashed at registration.
    let email = payload.email.trim().to_lowercase();
    let password = payload.password.as_str();

    if email.is_empty() || password.is_empty() {
        return Err(respond_message(
            Status::BadRequest,
            "Email and password are required",
        ));
    }

    let store = CredentialStore::new(pool.inner().clone());
    let user = store
        .find_by_email(&email)
        .await
        .map_err(respond_error)?
        .ok_or_else(|| respond_error(AuthError::InvalidCredentials))?;

    if !user.is_active {
        return Err(respond_error(AuthError::AccountInactive));
    }

    let verified = state
        .password_service
        .verify_password(password, &user.password_hash)
        .map_err(respond_error)?;
    if !verified {
        return Err(respond_error(AuthError::InvalidCredentials));
    }

    let role = Role::parse(&user.role)
        .ok_or_else(|| respond_error(AuthError::Other(format!("unknown role '{}'", user.role))))?;

    let signed = state
        .token_service
        .issue(&user.email, role)
        .map_err(respond_error)?;

    log::info!("login succeeded for {}", user.user_id);

    Ok(Json(LoginResponse {
        token: signed.token,
        expires_at: signed.expires_at,
        user: UserSummary::from_user(&user, role),
    }))
}

#[openapi(tag = "Auth")]
#[post("/auth/register", data = "<payload>")]
pub async fn register(
    state: &State<AuthState>,
    pool: &State<PgPool>,
    payload: Json<RegisterRequest>,
) -> Result<status::Created<Json<LoginResponse>>, status::Custom<Json<AuthErrorResponse>>> {
    let payload = payload.into_inner();
    let email = payload.email.trim().to_lowercase();

    if email.is_empty() || !email.contains('@') {
        return Err(respond_message(
            Status::BadRequest,
            "A valid email is required",
        ));
    }
    if payload.password.trim().is_empty() {
        return Err(respond_message(Status::BadRequest, "Password is required"));
    }

    let store = CredentialStore::new(pool.inner().clone());
    if store.exists_by_email(&email).await.map_err(respond_error)? {
        return Err(respond_message(Status::BadRequest, "Email already in use"));
    }

    let role = payload.role;
    let user = store
        .create(
            &state.password_service,
            NewIdentity {
                first_name: payload.first_name,
                last_name: payload.last_name,
                email,
                password: payload.password,
                role,
                phone_number: payload.phone_number,
                address: payload.address,
                gender: payload.gender,
                specialization: payload.specialization,
                license_number: payload.license_number,
                qualification: payload.qualification,
                shift: payload.shift,
            },
        )
        .await
        .map_err(respond_error)?;

    let signed = state
        .token_service
        .issue(&user.email, role)
        .map_err(respond_error)?;

    log::info!("registered {} with role {}", user.user_id, role.as_str());

    let body = Json(LoginResponse {
        token: signed.token,
        expires_at: signed.expires_at,
        user: UserSummary::from_user(&user, role),
    });
    Ok(status::Created::new("/auth/validate").body(body))
}

/// One-shot bootstrap of the first administrator account. Refuses to run
/// once any admin exists.
#[openapi(tag = "Auth")]
#[post("/auth/create-admin")]
pub async fn create_admin(
    state: &State<AuthState>,
    pool: &State<PgPool>,
) -> Result<status::Created<Json<MessageResponse>>, status::Custom<Json<AuthErrorResponse>>> {
    let store = CredentialStore::new(pool.inner().clone());

    let admins = store
        .count_by_role(Role::Admin)
        .await
        .map_err(respond_error)?;
    if admins > 0 {
        return Err(respond_message(
            Status::BadRequest,
            "Admin user already exists",
        ));
    }

    let user = store
        .create(
            &state.password_service,
            NewIdentity {
                first_name: "Admin".into(),
                last_name: "User".into(),
                email: "admin@hospital.com".into(),
                password: "admin123".into(),
                role: Role::Admin,
                phone_number: None,
                address: None,
                gender: None,
                specialization: None,
                license_number: None,
                qualification: None,
                shift: None,
            },
        )
        .await
        .map_err(respond_error)?;

    log::info!("initial admin {} created", user.user_id);

    Ok(status::Created::new("/auth/login").body(Json(MessageResponse::new(format!(
        "Initial admin created successfully: {}",
        user.email
    )))))
}

/// Echo of the authenticated identity; any role passes the gate here.
#[openapi(tag = "Auth")]
#[get("/auth/validate")]
pub async fn validate(user: AuthUser) -> Json<UserSummary> {
    Json(UserSummary {
        id: user.id,
        user_id: user.user_id,
        first_name: user.first_name,
        last_name: user.last_name,
        email: user.email,
        role: user.role,
    })
}

#[openapi(tag = "Auth")]
#[post("/auth/forgot-password", data = "<payload>")]
pub async fn forgot_password(
    state: &State<AuthState>,
    pool: &State<PgPool>,
    payload: Json<ForgotPasswordRequest>,
) -> AuthRouteResult<MessageResponse> {
    let email = payload.email.trim().to_lowercase();
    let store = CredentialStore::new(pool.inner().clone());

    // The response is identical whether or not the email exists, so the
    // endpoint cannot be used to enumerate accounts.
    if let Some(user) = store.find_by_email(&email).await.map_err(respond_error)? {
        let reset_store = PasswordResetStore::new(pool.inner().clone());

        // Opportunistic cleanup of tokens that can never be redeemed.
        if let Ok(purged) = reset_store.purge_expired(Utc::now()).await {
            if purged > 0 {
                log::debug!("purged {} dead reset tokens", purged);
            }
        }

        let issued = reset_store
            .issue(
                user.id,
                Utc::now(),
                Duration::seconds(state.config.reset_token_ttl_secs),
            )
            .await
            .map_err(respond_error)?;

        let reset_url = format!(
            "{}/login/resetPassword?token={}",
            state.config.frontend_url, issued.token
        );
        if let Err(err) = state.mailer.send(
            &user.email,
            "Reset Password Request",
            &format!("Click this link to reset your password: {}", reset_url),
        ) {
            // Delivery failure is ours, not the caller's; keep the
            // response uniform.
            log::error!("reset mail dispatch failed for {}: {}", user.user_id, err);
        }
    } else {
        log::debug!("forgot-password for unknown email");
    }

    Ok(Json(MessageResponse::new(
        "If an account exists for that email, a reset link has been sent",
    )))
}

#[openapi(tag = "Auth")]
#[post("/auth/reset-password", data = "<payload>")]
pub async fn reset_password(
    state: &State<AuthState>,
    pool: &State<PgPool>,
    payload: Json<ResetPasswordRequest>,
) -> AuthRouteResult<MessageResponse> {
    if payload.new_password.trim().is_empty() {
        return Err(respond_message(
            Status::BadRequest,
            "New password is required",
        ));
    }

    let reset_store = PasswordResetStore::new(pool.inner().clone());
    let user_id = reset_store
        .redeem(
            &state.password_service,
            payload.token.trim(),
            &payload.new_password,
            Utc::now(),
        )
        .await
        .map_err(respond_error)?;

    log::info!("password reset completed for user id {}", user_id);

    Ok(Json(MessageResponse::new("Password has been reset")))
}

/// Convert an internal error to its caller-facing shape. The concrete
/// reason is logged here and never serialized.
fn respond_error(err: AuthError) -> status::Custom<Json<AuthErrorResponse>> {
    let http = err.status();
    if http == Status::InternalServerError {
        log::error!("auth failure: {}", err);
    } else {
        log::warn!("auth failure: {}", err);
    }
    status::Custom(
        http,
        Json(AuthErrorResponse {
            status: http.code,
            message: err.public_message().to_string(),
        }),
    )
}

fn respond_message(
    status: Status,
    message: impl Into<String>,
) -> status::Custom<Json<AuthErrorResponse>> {
    status::Custom(
        status,
        Json(AuthErrorResponse {
            status: status.code,
            message: message.into(),
        }),
    )
}
