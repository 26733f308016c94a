//! Credential store: lookup and persistence for staff identities.
//!
//! The auth path never hard-deletes a row; deactivation flips `is_active`
//! and the gate refuses deactivated identities.

use chrono::Utc;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::auth::policy::Role;
use crate::auth::{AuthResult, PasswordService};
use crate::models::User;

/// Fields required to provision a new identity.
#[derive(Debug, Clone)]
pub struct NewIdentity {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
    pub phone_number: Option<String>,
    pub address: Option<String>,
    pub gender: Option<String>,
    pub specialization: Option<String>,
    pub license_number: Option<String>,
    pub qualification: Option<String>,
    pub shift: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CredentialStore {
    pool: PgPool,
}

impl CredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_email(&self, email: &str) -> AuthResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE lower(email) = lower($1)")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    /// Lookup by the external identifier (`DOC-1A2B3C4D`).
    pub async fn find_by_user_id(&self, user_id: &str) -> AuthResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    pub async fn exists_by_email(&self, email: &str) -> AuthResult<bool> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE lower(email) = lower($1)")
                .bind(email)
                .fetch_one(&self.pool)
                .await?;
        Ok(count > 0)
    }

    pub async fn count_by_role(&self, role: Role) -> AuthResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = $1")
            .bind(role.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Insert a new identity with a freshly hashed password and a
    /// role-prefixed external identifier.
    pub async fn create(
        &self,
        passwords: &PasswordService,
        identity: NewIdentity,
    ) -> AuthResult<User> {
        let password_hash = passwords.hash_password(&identity.password)?;
        let external_id = mint_user_id(identity.role);
        let now = Utc::now();

        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users
                (user_id, first_name, last_name, email, password_hash, role,
                 phone_number, address, gender, specialization, license_number,
                 qualification, shift, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, lower($4), $5, $6, $7, $8, $9, $10, $11, $12, $13, TRUE, $14, $14)
            RETURNING *
            "#,
        )
        .bind(&external_id)
        .bind(&identity.first_name)
        .bind(&identity.last_name)
        .bind(&identity.email)
        .bind(&password_hash)
        .bind(identity.role.as_str())
        .bind(&identity.phone_number)
        .bind(&identity.address)
        .bind(&identity.gender)
        .bind(&identity.specialization)
        .bind(&identity.license_number)
        .bind(&identity.qualification)
        .bind(&identity.shift)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    /// Update a stored password hash inside an existing transaction, so the
    /// reset flow can pair it atomically with marking the token used.
    pub async fn update_password_hash_tx(
        tx: &mut Transaction<'_, Postgres>,
        user_id: i32,
        password_hash: &str,
    ) -> AuthResult<()> {
        sqlx::query("UPDATE users SET password_hash = $1, updated_at = $2 WHERE id = $3")
            .bind(password_hash)
            .bind(Utc::now())
            .bind(user_id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }
}

/// External identifiers look like `DOC-1A2B3C4D`: role prefix plus the
/// first eight hex digits of a fresh UUID, uppercased.
pub fn mint_user_id(role: Role) -> String {
    let suffix = Uuid::new_v4().simple().to_string()[..8].to_uppercase();
    format!("{}-{}", role.user_id_prefix(), suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minted_ids_carry_the_role_prefix() {
        assert!(mint_user_id(Role::Doctor).starts_with("DOC-"));
        assert!(mint_user_id(Role::Admin).starts_with("ADM-"));
        assert!(mint_user_id(Role::Pharmacist).starts_with("PHM-"));
        assert!(mint_user_id(Role::Receptionist).starts_with("RCP-"));
        assert_eq!(mint_user_id(Role::Doctor).len(), "DOC-".len() + 8);
    }
}
