//! Signed, purpose-tagged tokens.
//!
//! Every emailed link and every API bearer token is a signed payload
//! carrying a purpose tag and a subject id. Validity is not embedded in
//! the token: the verifier supplies a maximum age which is checked
//! against the signed issue timestamp.

use std::collections::HashSet;

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::{AppError, AppResult};

/// What a token is allowed to be used for.
///
/// A token minted for one purpose never verifies under another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenPurpose {
    /// Account email confirmation.
    Confirm,
    /// Password reset.
    Reset,
    /// Email address change (carries the pending address).
    ChangeEmail,
    /// API bearer authentication.
    Id,
}

/// Signed token payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Purpose tag.
    pub purpose: TokenPurpose,
    /// Subject user id.
    pub sub: String,
    /// Pending new email address (`change_email` tokens only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_email: Option<String>,
    /// Issue timestamp (seconds since the epoch).
    pub iat: u64,
}

/// Issues and verifies signed tokens using the configured secret key.
#[derive(Clone)]
pub struct TokenSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner").finish_non_exhaustive()
    }
}

fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

impl TokenSigner {
    /// Create a signer from the application secret key.
    #[must_use]
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Issue a token for `user_id` with the given purpose.
    pub fn generate(&self, purpose: TokenPurpose, user_id: &str) -> AppResult<String> {
        self.generate_claims(TokenClaims {
            purpose,
            sub: user_id.to_string(),
            new_email: None,
            iat: now_secs(),
        })
    }

    /// Issue an email-change token carrying the pending address.
    pub fn generate_email_change(&self, user_id: &str, new_email: &str) -> AppResult<String> {
        self.generate_claims(TokenClaims {
            purpose: TokenPurpose::ChangeEmail,
            sub: user_id.to_string(),
            new_email: Some(new_email.to_string()),
            iat: now_secs(),
        })
    }

    fn generate_claims(&self, claims: TokenClaims) -> AppResult<String> {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(format!("Failed to sign token: {e}")))
    }

    /// Verify a token against a purpose and a maximum age in seconds.
    ///
    /// Returns `None` on any failure: bad signature, malformed input,
    /// purpose mismatch, or a token older than `max_age_secs`. A token
    /// verified with `max_age_secs == 0` is only accepted within the
    /// second it was issued.
    #[must_use]
    pub fn verify(
        &self,
        token: &str,
        purpose: TokenPurpose,
        max_age_secs: u64,
    ) -> Option<TokenClaims> {
        // Age is checked by hand against iat, so spec-claim validation
        // (exp in particular) is disabled. Leeway must be zero for the
        // max_age contract to hold exactly.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.required_spec_claims = HashSet::new();
        validation.validate_exp = false;
        validation.leeway = 0;

        let data = jsonwebtoken::decode::<TokenClaims>(token, &self.decoding, &validation).ok()?;
        let claims = data.claims;

        if claims.purpose != purpose {
            return None;
        }
        if now_secs() > claims.iat.saturating_add(max_age_secs) {
            return None;
        }

        Some(claims)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn signer() -> TokenSigner {
        TokenSigner::new("unit-test-secret")
    }

    #[test]
    fn test_round_trip() {
        let signer = signer();
        let token = signer.generate(TokenPurpose::Confirm, "user1").unwrap();

        let claims = signer.verify(&token, TokenPurpose::Confirm, 3600).unwrap();
        assert_eq!(claims.sub, "user1");
        assert_eq!(claims.purpose, TokenPurpose::Confirm);
        assert!(claims.new_email.is_none());
    }

    #[test]
    fn test_purpose_mismatch_rejected() {
        let signer = signer();
        let token = signer.generate(TokenPurpose::Reset, "user1").unwrap();

        assert!(signer.verify(&token, TokenPurpose::Confirm, 3600).is_none());
        assert!(signer.verify(&token, TokenPurpose::Id, 3600).is_none());
    }

    #[test]
    fn test_subject_is_preserved() {
        // Cross-account checks happen at the call site; the claims must
        // carry the original subject for that check to work.
        let signer = signer();
        let token = signer.generate(TokenPurpose::Confirm, "user-a").unwrap();

        let claims = signer.verify(&token, TokenPurpose::Confirm, 3600).unwrap();
        assert_ne!(claims.sub, "user-b");
    }

    #[test]
    fn test_email_change_carries_new_address() {
        let signer = signer();
        let token = signer
            .generate_email_change("user1", "new@example.com")
            .unwrap();

        let claims = signer
            .verify(&token, TokenPurpose::ChangeEmail, 3600)
            .unwrap();
        assert_eq!(claims.new_email.as_deref(), Some("new@example.com"));
    }

    #[test]
    fn test_expired_token_rejected() {
        let signer = signer();
        let token = signer.generate(TokenPurpose::Confirm, "user1").unwrap();

        // Accepted within a 1 second window...
        assert!(signer.verify(&token, TokenPurpose::Confirm, 1).is_some());

        std::thread::sleep(std::time::Duration::from_secs(2));

        // ...rejected once the window has passed, and with max_age 0.
        assert!(signer.verify(&token, TokenPurpose::Confirm, 1).is_none());
        assert!(signer.verify(&token, TokenPurpose::Confirm, 0).is_none());
    }

    #[test]
    fn test_tampered_token_rejected() {
        let signer = signer();
        let token = signer.generate(TokenPurpose::Confirm, "user1").unwrap();

        let mut tampered = token.clone();
        tampered.pop();
        assert!(signer.verify(&tampered, TokenPurpose::Confirm, 3600).is_none());
        assert!(signer.verify("not-a-token", TokenPurpose::Confirm, 3600).is_none());
    }

    #[test]
    fn test_wrong_key_rejected() {
        let token = signer().generate(TokenPurpose::Id, "user1").unwrap();
        let other = TokenSigner::new("another-secret");

        assert!(other.verify(&token, TokenPurpose::Id, 3600).is_none());
    }
}
