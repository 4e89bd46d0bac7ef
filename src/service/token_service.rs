use crate::error::token_error::TokenError;
use crate::model::identity::Identity;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

/// 身份提供方签发的 token 载荷
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct TokenClaims {
    pub sub: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub picture: Option<String>,
    pub exp: usize,
}

#[derive(Clone)]
pub struct TokenService {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenService {
    pub fn new(secret: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    pub fn verify(&self, token: &str) -> Result<Identity, TokenError> {
        let claims = decode::<TokenClaims>(token, &self.decoding_key, &self.validation)?.claims;
        if claims.sub.trim().is_empty() {
            return Err(TokenError::InvalidToken("empty subject".to_string()));
        }
        let display_name = if claims.name.trim().is_empty() {
            claims.sub.clone()
        } else {
            claims.name
        };
        Ok(Identity {
            user_id: claims.sub,
            display_name,
            avatar_ref: claims.picture,
        })
    }
}
