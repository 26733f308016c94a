//! Administrative endpoints: staff account management.

use chrono::Utc;
use rocket::serde::json::Json;
use rocket::{State, delete, get, put};
use rocket_okapi::okapi::schemars::JsonSchema;
use rocket_okapi::openapi;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::auth::RequireAdmin;
use crate::auth::store::CredentialStore;
use crate::error::ApiError;
use crate::models::{ApiResponse, User};

/// Mutable profile fields of a staff account. Role and credentials are
/// deliberately not editable here; credentials change through the reset
/// flow only.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpdateUserRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    pub address: Option<String>,
    pub gender: Option<String>,
    pub specialization: Option<String>,
    pub license_number: Option<String>,
    pub qualification: Option<String>,
    pub shift: Option<String>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct DeleteResponse {
    pub deleted: String,
}

/// List staff accounts, optionally filtered by role, active flag, and a
/// case-insensitive search over name and email.
#[openapi(tag = "Admin")]
#[get("/admin/users?<role>&<active>&<search>")]
pub async fn list_users(
    _admin: RequireAdmin,
    pool: &State<PgPool>,
    role: Option<String>,
    active: Option<bool>,
    search: Option<String>,
) -> Result<Json<ApiResponse<Vec<User>>>, ApiError> {
    let pattern = search.map(|s| format!("%{}%", s));
    let users = sqlx::query_as::<_, User>(
        r#"
        SELECT * FROM users
        WHERE ($1::text IS NULL OR role = $1)
          AND ($2::boolean IS NULL OR is_active = $2)
          AND ($3::text IS NULL
               OR first_name ILIKE $3 OR last_name ILIKE $3 OR email ILIKE $3)
        ORDER BY last_name, first_name
        "#,
    )
    .bind(role)
    .bind(active)
    .bind(pattern)
    .fetch_all(pool.inner())
    .await?;

    Ok(Json(ApiResponse::new(users)))
}

#[openapi(tag = "Admin")]
#[get("/admin/users/<user_id>")]
pub async fn get_user(
    _admin: RequireAdmin,
    pool: &State<PgPool>,
    user_id: &str,
) -> Result<Json<ApiResponse<User>>, ApiError> {
    let store = CredentialStore::new(pool.inner().clone());
    let user = store
        .find_by_user_id(user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("User '{}' not found", user_id)))?;

    Ok(Json(ApiResponse::new(user)))
}

#[openapi(tag = "Admin")]
#[put("/admin/users/<user_id>", data = "<payload>")]
pub async fn update_user(
    _admin: RequireAdmin,
    pool: &State<PgPool>,
    user_id: &str,
    payload: Json<UpdateUserRequest>,
) -> Result<Json<ApiResponse<User>>, ApiError> {
    let payload = payload.into_inner();
    let user = sqlx::query_as::<_, User>(
        r#"
        UPDATE users SET
            first_name = COALESCE($2, first_name),
            last_name = COALESCE($3, last_name),
            phone_number = COALESCE($4, phone_number),
            address = COALESCE($5, address),
            gender = COALESCE($6, gender),
            specialization = COALESCE($7, specialization),
            license_number = COALESCE($8, license_number),
            qualification = COALESCE($9, qualification),
            shift = COALESCE($10, shift),
            updated_at = $11
        WHERE user_id = $1
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(payload.first_name)
    .bind(payload.last_name)
    .bind(payload.phone_number)
    .bind(payload.address)
    .bind(payload.gender)
    .bind(payload.specialization)
    .bind(payload.license_number)
    .bind(payload.qualification)
    .bind(payload.shift)
    .bind(Utc::now())
    .fetch_optional(pool.inner())
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("User '{}' not found", user_id)))?;

    Ok(Json(ApiResponse::new(user)))
}

/// Soft-deactivate an account. The gate refuses tokens for deactivated
/// identities from the next request on.
#[openapi(tag = "Admin")]
#[put("/admin/users/<user_id>/deactivate")]
pub async fn deactivate_user(
    _admin: RequireAdmin,
    pool: &State<PgPool>,
    user_id: &str,
) -> Result<Json<ApiResponse<User>>, ApiError> {
    let user = sqlx::query_as::<_, User>(
        "UPDATE users SET is_active = FALSE, updated_at = $2 WHERE user_id = $1 RETURNING *",
    )
    .bind(user_id)
    .bind(Utc::now())
    .fetch_optional(pool.inner())
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("User '{}' not found", user_id)))?;

    log::info!("deactivated account {}", user.user_id);
    Ok(Json(ApiResponse::new(user)))
}

/// Hard delete. A business operation, not part of the auth path; the
/// account's reset tokens go with it via the FK cascade.
#[openapi(tag = "Admin")]
#[delete("/admin/users/<user_id>")]
pub async fn delete_user(
    _admin: RequireAdmin,
    pool: &State<PgPool>,
    user_id: &str,
) -> Result<Json<ApiResponse<DeleteResponse>>, ApiError> {
    let result = sqlx::query("DELETE FROM users WHERE user_id = $1")
        .bind(user_id)
        .execute(pool.inner())
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound(format!("User '{}' not found", user_id)));
    }

    log::info!("deleted account {}", user_id);
    Ok(Json(ApiResponse::new(DeleteResponse {
        deleted: user_id.to_string(),
    })))
}
