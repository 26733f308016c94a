use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use uuid::Uuid;

use crate::auth::policy::Role;
use crate::auth::{AuthConfig, AuthError, AuthResult};

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    pub iss: String,
    pub aud: String,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
    pub role: String,
}

#[derive(Debug, Clone)]
pub struct SignedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Issues and validates the signed bearer tokens that carry a staff
/// identity between requests. Tokens are stateless; nothing is persisted.
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    issuer: String,
    audience: String,
    token_ttl: Duration,
}

impl TokenService {
    pub fn from_config(config: &AuthConfig) -> AuthResult<Self> {
        let secret_bytes = config.jwt_secret.as_bytes();
        let encoding_key = EncodingKey::from_secret(secret_bytes);
        let decoding_key = DecodingKey::from_secret(secret_bytes);

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[config.audience.clone()]);
        validation.set_issuer(&[config.issuer.clone()]);
        validation.leeway = 30;

        Ok(Self {
            encoding_key,
            decoding_key,
            validation,
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            token_ttl: Duration::seconds(config.token_ttl_secs),
        })
    }

    /// Mint a token for a validated identity. Subject is the identity's
    /// email at issuance time.
    pub fn issue(&self, email: &str, role: Role) -> AuthResult<SignedToken> {
        let now = Utc::now();
        let expires_at = now + self.token_ttl;

        let claims = TokenClaims {
            sub: email.to_string(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
            role: role.as_str().to_string(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?;

        Ok(SignedToken { token, expires_at })
    }

    /// Verify signature and expiry, then confirm the embedded subject still
    /// matches the identity's current email. A token minted before an email
    /// change fails here even though its signature is intact.
    pub fn validate(&self, token: &str, expected_subject: &str) -> AuthResult<TokenClaims> {
        let claims = self.decode(token)?;
        if claims.sub != expected_subject {
            return Err(AuthError::SubjectMismatch);
        }
        Ok(claims)
    }

    /// Verify signature and expiry and return the claims.
    pub fn decode(&self, token: &str) -> AuthResult<TokenClaims> {
        let token_data = decode::<TokenClaims>(token, &self.decoding_key, &self.validation)?;
        Ok(token_data.claims)
    }

    /// Parse claims without verifying the signature. Only usable to find
    /// which identity to look up; never an authorization input.
    pub fn extract_subject(&self, token: &str) -> AuthResult<String> {
        let mut insecure = Validation::new(Algorithm::HS256);
        insecure.insecure_disable_signature_validation();
        insecure.validate_exp = false;
        insecure.validate_aud = false;
        let token_data = decode::<TokenClaims>(token, &self.decoding_key, &insecure)
            .map_err(|_| AuthError::MalformedToken)?;
        Ok(token_data.claims.sub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_JWT_SECRET: &str = "super-secret-test-key";

    fn make_test_config() -> AuthConfig {
        AuthConfig {
            issuer: "https://hospital.test".into(),
            audience: "hospital-api".into(),
            token_ttl_secs: 36_000,
            reset_token_ttl_secs: 3_600,
            jwt_secret: TEST_JWT_SECRET.into(),
            frontend_url: "http://localhost:3000".into(),
        }
    }

    #[test]
    fn issues_and_validates_tokens() {
        let service = TokenService::from_config(&make_test_config()).expect("token service");

        let signed = service
            .issue("doc@hospital.test", Role::Doctor)
            .expect("issue token");
        let claims = service
            .validate(&signed.token, "doc@hospital.test")
            .expect("validate token");

        assert_eq!(claims.sub, "doc@hospital.test");
        assert_eq!(claims.role, "DOCTOR");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn rejects_subject_mismatch_after_email_change() {
        let service = TokenService::from_config(&make_test_config()).expect("token service");

        let signed = service
            .issue("old@hospital.test", Role::Doctor)
            .expect("issue token");

        // Identity's email changed after issuance; the old token must die.
        let err = service
            .validate(&signed.token, "new@hospital.test")
            .unwrap_err();
        assert!(matches!(err, AuthError::SubjectMismatch));
    }

    #[test]
    fn rejects_expired_tokens() {
        let mut config = make_test_config();
        // Already past expiry by more than the 30s validation leeway.
        config.token_ttl_secs = -120;
        let service = TokenService::from_config(&config).expect("token service");

        let signed = service
            .issue("doc@hospital.test", Role::Doctor)
            .expect("issue token");
        let err = service
            .validate(&signed.token, "doc@hospital.test")
            .unwrap_err();
        assert!(matches!(err, AuthError::ExpiredToken));
    }

    #[test]
    fn rejects_tampered_signatures() {
        let service = TokenService::from_config(&make_test_config()).expect("token service");
        let other_config = AuthConfig {
            jwt_secret: "a-different-secret".into(),
            ..make_test_config()
        };
        let other = TokenService::from_config(&other_config).expect("token service");

        let signed = other
            .issue("doc@hospital.test", Role::Doctor)
            .expect("issue token");
        let err = service
            .validate(&signed.token, "doc@hospital.test")
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidSignature));
    }

    #[test]
    fn extract_subject_never_verifies_but_rejects_garbage() {
        let service = TokenService::from_config(&make_test_config()).expect("token service");

        let signed = service
            .issue("doc@hospital.test", Role::Doctor)
            .expect("issue token");
        let subject = service.extract_subject(&signed.token).expect("subject");
        assert_eq!(subject, "doc@hospital.test");

        let err = service.extract_subject("not-a-jwt").unwrap_err();
        assert!(matches!(err, AuthError::MalformedToken));
    }
}
