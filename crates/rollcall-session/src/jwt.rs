//! HS256 bearer tokens carrying `{ userId, role }`.

use std::time::Duration;

use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use rollcall_protocol::{Role, UserId};
use serde::{Deserialize, Serialize};

use crate::{AuthError, Authenticator, Identity};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Claims {
    user_id: String,
    role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    exp: Option<u64>,
}

/// Verifies (and mints) HS256 tokens signed with a shared secret.
///
/// `exp` is optional: tokens minted without one never expire, tokens
/// with one are rejected once it has passed.
pub struct JwtAuthenticator {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl JwtAuthenticator {
    /// Creates an authenticator for the given shared secret.
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.required_spec_claims.clear();
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Mints a token for `identity`, optionally expiring after `ttl`.
    pub fn issue(
        &self,
        identity: &Identity,
        ttl: Option<Duration>,
    ) -> Result<String, AuthError> {
        let claims = Claims {
            user_id: identity.user_id.0.clone(),
            role: identity.role,
            exp: ttl.map(|ttl| jsonwebtoken::get_current_timestamp() + ttl.as_secs()),
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::Signing(e.to_string()))
    }

    /// Checks the signature and claims of `token`.
    pub fn verify(&self, token: &str) -> Result<Identity, AuthError> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.validation)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?;
        if data.claims.user_id.is_empty() {
            return Err(AuthError::InvalidToken("empty userId".into()));
        }
        Ok(Identity {
            user_id: UserId(data.claims.user_id),
            role: data.claims.role,
        })
    }
}

impl Authenticator for JwtAuthenticator {
    async fn authenticate(&self, token: &str) -> Result<Identity, AuthError> {
        let result = self.verify(token);
        if let Err(e) = &result {
            tracing::debug!(error = %e, "token rejected");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth() -> JwtAuthenticator {
        JwtAuthenticator::new(b"test-secret")
    }

    #[test]
    fn test_issue_then_verify_returns_identity() {
        let auth = auth();
        let token = auth.issue(&Identity::teacher("t1"), None).unwrap();
        let identity = auth.verify(&token).unwrap();
        assert_eq!(identity, Identity::teacher("t1"));
    }

    #[test]
    fn test_verify_with_ttl_in_future() {
        let auth = auth();
        let token = auth
            .issue(&Identity::student("s1"), Some(Duration::from_secs(3600)))
            .unwrap();
        assert_eq!(auth.verify(&token).unwrap().role, Role::Student);
    }

    #[test]
    fn test_verify_rejects_other_secret() {
        let token = auth().issue(&Identity::teacher("t1"), None).unwrap();
        let other = JwtAuthenticator::new(b"another-secret");
        assert!(matches!(other.verify(&token), Err(AuthError::InvalidToken(_))));
    }

    #[test]
    fn test_verify_rejects_expired_token() {
        let auth = auth();
        let claims = Claims {
            user_id: "t1".into(),
            role: Role::Teacher,
            exp: Some(jsonwebtoken::get_current_timestamp() - 3600),
        };
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();
        assert!(matches!(auth.verify(&token), Err(AuthError::InvalidToken(_))));
    }

    #[test]
    fn test_verify_rejects_unknown_role() {
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &admin_claims(),
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();
        assert!(auth().verify(&token).is_err());
    }

    #[test]
    fn test_verify_rejects_garbage() {
        assert!(auth().verify("not.a.jwt").is_err());
        assert!(auth().verify("").is_err());
    }

    #[tokio::test]
    async fn test_authenticator_trait_delegates_to_verify() {
        let auth = auth();
        let token = auth.issue(&Identity::student("s9"), None).unwrap();
        let identity = auth.authenticate(&token).await.unwrap();
        assert_eq!(identity.user_id, UserId::from("s9"));
    }

    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    struct AdminClaims {
        user_id: String,
        role: String,
    }

    fn admin_claims() -> AdminClaims {
        AdminClaims {
            user_id: "a1".into(),
            role: "admin".into(),
        }
    }
}
