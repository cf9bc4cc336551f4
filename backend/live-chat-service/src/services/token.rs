use crate::error::HandshakeError;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

/// Claims of a handshake token issued by the social network at login.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HandshakeClaims {
    pub user_id: String,
    pub exp: usize,
    #[serde(default)]
    pub iat: usize,
}

/// Checks HS256 handshake tokens against the configured secret.
#[derive(Clone)]
pub struct HandshakeVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl HandshakeVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    /// Accepts the token only if it is valid, unexpired and issued to `claimed_user`.
    pub fn verify(&self, token: Option<&str>, claimed_user: &str) -> Result<(), HandshakeError> {
        let token = token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| HandshakeError::Token("missing token".into()))?;

        let data = decode::<HandshakeClaims>(token, &self.key, &self.validation)
            .map_err(|e| HandshakeError::Token(e.to_string()))?;

        if data.claims.user_id != claimed_user {
            return Err(HandshakeError::Token(format!(
                "token issued to {} used by {}",
                data.claims.user_id, claimed_user
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token_for(user_id: &str, expires_in_seconds: i64, secret: &str) -> String {
        let now = chrono::Utc::now().timestamp();
        let claims = HandshakeClaims {
            user_id: user_id.to_string(),
            exp: (now + expires_in_seconds) as usize,
            iat: now as usize,
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn valid_token_for_claimed_user_passes() {
        let verifier = HandshakeVerifier::new("test-secret");
        let token = token_for("u1", 3600, "test-secret");
        assert!(verifier.verify(Some(&token), "u1").is_ok());
    }

    #[test]
    fn token_for_another_user_is_rejected() {
        let verifier = HandshakeVerifier::new("test-secret");
        let token = token_for("u2", 3600, "test-secret");
        assert!(matches!(
            verifier.verify(Some(&token), "u1"),
            Err(HandshakeError::Token(_))
        ));
    }

    #[test]
    fn expired_or_foreign_tokens_are_rejected() {
        let verifier = HandshakeVerifier::new("test-secret");
        let expired = token_for("u1", -3600, "test-secret");
        let forged = token_for("u1", 3600, "other-secret");
        assert!(verifier.verify(Some(&expired), "u1").is_err());
        assert!(verifier.verify(Some(&forged), "u1").is_err());
        assert!(verifier.verify(None, "u1").is_err());
        assert!(verifier.verify(Some(""), "u1").is_err());
    }
}
