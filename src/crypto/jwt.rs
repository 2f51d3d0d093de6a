/// Signed access and refresh tokens (HS256)
use crate::{
    config::AuthConfig,
    error::{ApiError, ApiResult},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;

/// Claims carried by an access token
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccessClaims {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
}

/// Claims carried by a refresh token.
///
/// No identity claims: the token is resolved to an account through the
/// row that stores it. `jti` keeps tokens minted in the same second
/// distinct.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RefreshClaims {
    pub jti: String,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
}

/// Encodes and verifies session tokens over the configured secret
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenCodec {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            issuer: config.issuer.clone(),
            access_ttl: Duration::minutes(config.access_exp_minutes),
            refresh_ttl: Duration::hours(config.refresh_exp_hours),
        }
    }

    /// Mint an access token for the given identity
    pub fn issue_access_token(&self, id: Uuid, username: &str, email: &str) -> ApiResult<String> {
        let now = Utc::now();
        let claims = AccessClaims {
            id,
            username: username.to_string(),
            email: email.to_string(),
            iss: self.issuer.clone(),
            iat: now.timestamp(),
            exp: (now + self.access_ttl).timestamp(),
        };

        self.sign(&claims)
    }

    /// Mint a refresh token
    pub fn issue_refresh_token(&self) -> ApiResult<String> {
        let now = Utc::now();
        let claims = RefreshClaims {
            jti: Uuid::new_v4().to_string(),
            iss: self.issuer.clone(),
            iat: now.timestamp(),
            exp: (now + self.refresh_ttl).timestamp(),
        };

        self.sign(&claims)
    }

    pub fn verify_access_token(&self, token: &str) -> ApiResult<AccessClaims> {
        self.verify(token)
    }

    pub fn verify_refresh_token(&self, token: &str) -> ApiResult<RefreshClaims> {
        self.verify(token)
    }

    fn sign<T: Serialize>(&self, claims: &T) -> ApiResult<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| ApiError::Internal(format!("Failed to sign token: {}", e)))
    }

    fn verify<T: DeserializeOwned>(&self, token: &str) -> ApiResult<T> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss"]);

        decode::<T>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!("token verification failed: {}", e);
                match e.kind() {
                    ErrorKind::InvalidSignature => {
                        ApiError::Unauthorized("signature is invalid".to_string())
                    }
                    ErrorKind::ExpiredSignature => {
                        ApiError::Forbidden("token has expired".to_string())
                    }
                    _ => ApiError::Unauthorized(format!("invalid token: {}", e)),
                }
            })
    }
}
