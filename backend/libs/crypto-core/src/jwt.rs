/// Bearer token verification
///
/// Tokens carry the user UUID in `sub`. Two key setups are supported:
///
/// - **HS256** with a shared secret (`JwtKeys::from_secret`), used by the
///   identity provider the chat frontend talks to.
/// - **RS256** with a PEM public key (`JwtKeys::from_rsa_public_pem`) for
///   validation-only deployments.
///
/// Keys are held in a `JwtKeys` value owned by the application state, not in
/// a process global, so tests can build as many independent key sets as they
/// need.
///
/// ## Usage
///
/// ```rust
/// use crypto_core::jwt::JwtKeys;
///
/// let keys = JwtKeys::from_secret("local-dev-secret");
/// let user_id = uuid::Uuid::new_v4();
/// let token = keys.issue_token(user_id, chrono::Duration::hours(1)).unwrap();
/// assert_eq!(keys.user_id(&token).unwrap(), user_id);
/// ```
use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("failed to parse key: {0}")]
    KeyParse(String),

    #[error("no signing key configured")]
    SigningUnavailable,

    #[error("token expired")]
    Expired,

    #[error("invalid token: {0}")]
    Invalid(String),

    #[error("token subject is not a user id")]
    MalformedSubject,
}

/// Claims the chat backend relies on
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// User ID as UUID string
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn user_id(&self) -> Result<Uuid, JwtError> {
        Uuid::parse_str(&self.sub).map_err(|_| JwtError::MalformedSubject)
    }
}

#[derive(Clone)]
pub struct JwtKeys {
    algorithm: Algorithm,
    decoding: DecodingKey,
    encoding: Option<EncodingKey>,
}

impl fmt::Debug for JwtKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtKeys")
            .field("algorithm", &self.algorithm)
            .field("can_sign", &self.encoding.is_some())
            .finish()
    }
}

impl JwtKeys {
    /// HS256 keys from a shared secret. The same value signs and verifies.
    pub fn from_secret(secret: &str) -> Self {
        Self {
            algorithm: Algorithm::HS256,
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            encoding: Some(EncodingKey::from_secret(secret.as_bytes())),
        }
    }

    /// RS256 verification only
    pub fn from_rsa_public_pem(public_key_pem: &str) -> Result<Self, JwtError> {
        let decoding = DecodingKey::from_rsa_pem(public_key_pem.as_bytes())
            .map_err(|e| JwtError::KeyParse(format!("RSA public key: {e}")))?;

        Ok(Self {
            algorithm: Algorithm::RS256,
            decoding,
            encoding: None,
        })
    }

    /// RS256 key pair, able to issue tokens as well
    pub fn from_rsa_pem(private_key_pem: &str, public_key_pem: &str) -> Result<Self, JwtError> {
        let encoding = EncodingKey::from_rsa_pem(private_key_pem.as_bytes())
            .map_err(|e| JwtError::KeyParse(format!("RSA private key: {e}")))?;
        let mut keys = Self::from_rsa_public_pem(public_key_pem)?;
        keys.encoding = Some(encoding);
        Ok(keys)
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Issue a token for `user_id` valid for `ttl`.
    ///
    /// Used by tooling and tests; production tokens come from the identity
    /// provider.
    pub fn issue_token(&self, user_id: Uuid, ttl: Duration) -> Result<String, JwtError> {
        let encoding = self.encoding.as_ref().ok_or(JwtError::SigningUnavailable)?;
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };

        encode(&Header::new(self.algorithm), &claims, encoding)
            .map_err(|e| JwtError::Invalid(format!("failed to sign token: {e}")))
    }

    /// Verify signature and expiry, returning the decoded claims
    pub fn validate(&self, token: &str) -> Result<Claims, JwtError> {
        let mut validation = Validation::new(self.algorithm);
        validation.validate_exp = true;
        validation.leeway = 0;

        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => JwtError::Expired,
                _ => {
                    tracing::debug!("token validation failed: {}", e);
                    JwtError::Invalid(e.to_string())
                }
            })
    }

    /// Validate and extract the user id in one step
    pub fn user_id(&self, token: &str) -> Result<Uuid, JwtError> {
        self.validate(token)?.user_id()
    }
}

/// Split an `Authorization` header value into its bearer token.
///
/// Returns `None` when the scheme is not `Bearer` or the token is empty.
pub fn bearer_token(header_value: &str) -> Option<&str> {
    header_value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}
