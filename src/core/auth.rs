use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::config::AuthConfig;
use super::error::AuthError;
use super::types::UserId;

/// JWT claims carried by an access token. The subject is the user id.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

/// Verifies bearer tokens and resolves them to a user identity.
///
/// Tokens are HS256 JWTs signed with the configured secret. The pipeline
/// itself never sees a token; handlers resolve the identity up front and
/// pass a validated `UserId` downstream.
pub struct AuthProvider {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl AuthProvider {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    /// Verify a bearer token and return the user id it names.
    pub fn verify_token(&self, token: &str) -> Result<UserId, AuthError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            AuthError::InvalidToken {
                reason: e.to_string(),
            }
        })?;

        let uuid = Uuid::parse_str(&data.claims.sub).map_err(|_| AuthError::InvalidToken {
            reason: "subject is not a valid user id".to_string(),
        })?;

        Ok(UserId::from_uuid(uuid))
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header_value: Option<&str>) -> Result<&str, AuthError> {
    header_value
        .and_then(|v| v.strip_prefix("Bearer "))
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::MissingToken)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn make_token(secret: &str, sub: &str, exp_offset_secs: i64) -> String {
        let exp = (chrono::Utc::now().timestamp() + exp_offset_secs) as usize;
        let claims = Claims {
            sub: sub.to_string(),
            exp,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn provider(secret: &str) -> AuthProvider {
        AuthProvider::new(&AuthConfig {
            jwt_secret: secret.to_string(),
        })
    }

    #[test]
    fn test_valid_token_resolves_user() {
        let user = Uuid::new_v4();
        let token = make_token("s3cret", &user.to_string(), 3600);
        let resolved = provider("s3cret").verify_token(&token).unwrap();
        assert_eq!(resolved.as_uuid(), user);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = make_token("s3cret", &Uuid::new_v4().to_string(), 3600);
        assert!(provider("other").verify_token(&token).is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        let token = make_token("s3cret", &Uuid::new_v4().to_string(), -3600);
        assert!(provider("s3cret").verify_token(&token).is_err());
    }

    #[test]
    fn test_non_uuid_subject_rejected() {
        let token = make_token("s3cret", "not-a-uuid", 3600);
        assert!(provider("s3cret").verify_token(&token).is_err());
    }

    #[test]
    fn test_bearer_token_extraction() {
        assert_eq!(bearer_token(Some("Bearer abc")).unwrap(), "abc");
        assert!(bearer_token(Some("Basic abc")).is_err());
        assert!(bearer_token(Some("Bearer ")).is_err());
        assert!(bearer_token(None).is_err());
    }
}
