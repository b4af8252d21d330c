use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::tokens::repo_types::{Token, TokenType};

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Token as handed to its owner.
#[derive(Debug, Serialize)]
pub struct IssuedToken {
    pub token: String,
    #[serde(rename = "type")]
    pub kind: TokenType,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub user_id: String,
}

impl From<Token> for IssuedToken {
    fn from(t: Token) -> Self {
        Self {
            token: t.token,
            kind: t.kind,
            created_at: t.created_at,
            user_id: t.user_id,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: IssuedToken,
}

#[derive(Debug, Serialize)]
pub struct TokenListResponse {
    pub tokens: Vec<IssuedToken>,
}
