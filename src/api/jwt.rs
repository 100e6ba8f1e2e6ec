use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::AuthConfig;
use crate::model::UserId;

/// User token claims
///
/// The token identifies a user for as long as the cookie lives, so it carries
/// no expiry.
#[derive(Debug, Serialize, Deserialize)]
pub struct UserClaims {
    pub user_id: u64,
    pub iat: i64,
    pub jti: String,
}

/// JWT Service for issuing and validating user tokens (HS256)
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtService {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.required_spec_claims.clear();
        validation.validate_exp = false;

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Create JwtService from config
    pub fn from_config(config: &AuthConfig) -> Self {
        // 密钥为空时生成随机值（重启后旧 cookie 失效）
        if config.secret_key.is_empty() {
            warn!("JWT secret not configured or empty, generating random secret");
            return Self::new(&generate_secret(32));
        }
        Self::new(&config.secret_key)
    }

    /// Issue a token for `user`
    pub fn issue(&self, user: UserId) -> Result<String, jsonwebtoken::errors::Error> {
        let claims = UserClaims {
            user_id: user.get(),
            iat: Utc::now().timestamp(),
            jti: uuid::Uuid::new_v4().to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
    }

    /// Validate a token and return its user
    pub fn validate(&self, token: &str) -> Result<UserId, jsonwebtoken::errors::Error> {
        let token_data = decode::<UserClaims>(token, &self.decoding_key, &self.validation)?;
        Ok(UserId::new(token_data.claims.user_id))
    }
}

fn generate_secret(length: usize) -> String {
    use std::iter;

    let chars = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    iter::repeat_with(|| chars[rand::random_range(0..chars.len())] as char)
        .take(length)
        .collect()
}
