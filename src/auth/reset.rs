//! Single-use password reset tokens.
//!
//! Issued tokens live in `password_reset_tokens` as a SHA-256 digest; the
//! plaintext value appears only in the emailed link. Redemption runs in one
//! transaction holding a row lock, so of two concurrent redemptions of the
//! same token the first commits and the second observes `used = true`.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::auth::store::CredentialStore;
use crate::auth::{AuthError, AuthResult, PasswordService};

#[derive(Debug, Clone)]
pub struct ResetTokenIssued {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct PasswordResetStore {
    pool: PgPool,
}

impl PasswordResetStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a reset token for the identity and persist its digest with
    /// `used = false` and the configured expiry.
    pub async fn issue(
        &self,
        user_id: i32,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> AuthResult<ResetTokenIssued> {
        let token = Uuid::new_v4().to_string();
        let expires_at = now + ttl;

        sqlx::query(
            "INSERT INTO password_reset_tokens (token_hash, user_id, expires_at, used, created_at)
             VALUES ($1, $2, $3, FALSE, $4)",
        )
        .bind(digest(&token))
        .bind(user_id)
        .bind(expires_at)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(ResetTokenIssued { token, expires_at })
    }

    /// Exchange a valid token for a password change. The token row is
    /// locked, checked, and consumed in the same transaction that rewrites
    /// the identity's password hash: both writes land or neither does.
    pub async fn redeem(
        &self,
        passwords: &PasswordService,
        token: &str,
        new_password: &str,
        now: DateTime<Utc>,
    ) -> AuthResult<i32> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            "SELECT id, user_id, expires_at, used FROM password_reset_tokens
             WHERE token_hash = $1 FOR UPDATE",
        )
        .bind(digest(token))
        .fetch_optional(&mut *tx)
        .await?;

        let row = row.ok_or(AuthError::ResetTokenNotFound)?;
        let token_row_id: i32 = row.try_get("id")?;
        let user_id: i32 = row.try_get("user_id")?;
        let expires_at: DateTime<Utc> = row.try_get("expires_at")?;
        let used: bool = row.try_get("used")?;

        // Expiry wins over the used flag: a stale token is expired no
        // matter what happened to it in the meantime.
        if expires_at <= now {
            return Err(AuthError::ResetTokenExpired);
        }
        if used {
            return Err(AuthError::ResetTokenAlreadyUsed);
        }

        let password_hash = passwords.hash_password(new_password)?;
        CredentialStore::update_password_hash_tx(&mut tx, user_id, &password_hash).await?;

        sqlx::query("UPDATE password_reset_tokens SET used = TRUE WHERE id = $1")
            .bind(token_row_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(user_id)
    }

    /// Drop rows that can never be redeemed again.
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> AuthResult<u64> {
        let result =
            sqlx::query("DELETE FROM password_reset_tokens WHERE expires_at <= $1 OR used")
                .bind(now)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected())
    }
}

/// Deterministic digest stored in place of the token so a database leak
/// does not hand out live reset links.
fn digest(token: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_deterministic_and_opaque() {
        let token = Uuid::new_v4().to_string();
        assert_eq!(digest(&token), digest(&token));
        assert_ne!(digest(&token), token);
        assert_ne!(digest(&token), digest("something-else"));
    }
}
