use crate::error::{ProxyError, ProxyResult};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Subprotocol prefix carrying the session token
pub const ACCESS_TOKEN_PREFIX: &str = "access_token.";

/// Claims embedded in a session token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Issued at (unix seconds)
    pub iat: i64,
    /// Expiry (unix seconds)
    pub exp: i64,
}

/// Signs session tokens handed out to browsers
#[derive(Clone)]
pub struct TokenIssuer {
    key: EncodingKey,
    ttl_secs: i64,
}

impl TokenIssuer {
    pub fn new(secret: &str, ttl_secs: u64) -> Self {
        Self {
            key: EncodingKey::from_secret(secret.as_bytes()),
            ttl_secs: i64::try_from(ttl_secs).unwrap_or(i64::MAX),
        }
    }

    /// Issue a token valid from now for the configured TTL
    pub fn issue(&self) -> ProxyResult<String> {
        let now = Utc::now().timestamp();
        let claims = SessionClaims {
            iat: now,
            exp: now.saturating_add(self.ttl_secs),
        };

        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.key)?)
    }
}

/// Checks tokens presented during the WebSocket upgrade
#[derive(Clone)]
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Verify signature and expiry of a bare token
    pub fn verify(&self, token: &str) -> ProxyResult<SessionClaims> {
        let data = decode::<SessionClaims>(token, &self.key, &self.validation)?;
        Ok(data.claims)
    }

    /// Pick the subprotocol to accept from the client's offer list.
    ///
    /// Only the first entry carrying [`ACCESS_TOKEN_PREFIX`] is considered;
    /// anything after it is ignored even if the first one fails. On success
    /// the exact offered string is returned so it can be echoed back.
    pub fn authorize<'a, I>(&self, offered: I) -> ProxyResult<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let protocol = offered
            .into_iter()
            .find(|p| p.starts_with(ACCESS_TOKEN_PREFIX))
            .ok_or(ProxyError::MissingToken)?;

        let token = &protocol[ACCESS_TOKEN_PREFIX.len()..];
        let claims = self.verify(token)?;
        debug!("Accepted session token expiring at {}", claims.exp);

        Ok(protocol.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issued_token_verifies() {
        let issuer = TokenIssuer::new("secret", 60);
        let verifier = TokenVerifier::new("secret");

        let token = issuer.issue().unwrap();
        let claims = verifier.verify(&token).unwrap();
        assert_eq!(claims.exp - claims.iat, 60);
    }

    #[test]
    fn test_prefix_is_stripped_before_verification() {
        let issuer = TokenIssuer::new("secret", 60);
        let verifier = TokenVerifier::new("secret");
        let proto = format!("{}{}", ACCESS_TOKEN_PREFIX, issuer.issue().unwrap());

        assert_eq!(verifier.authorize([proto.as_str()]).unwrap(), proto);
    }
}
