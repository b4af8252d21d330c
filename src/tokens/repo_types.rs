use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;

/// Purpose a bearer token was issued for. Stored as lowercase text.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Login,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Login => "login",
        }
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TokenType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "login" => Ok(TokenType::Login),
            other => anyhow::bail!("unknown token type {other:?}"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Token {
    pub token: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: TokenType,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Raw `tokens` row; the type column is checked when converting to [`Token`].
#[derive(Debug, FromRow)]
pub struct TokenRow {
    pub token: String,
    pub user_id: String,
    pub kind: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl TryFrom<TokenRow> for Token {
    type Error = anyhow::Error;

    fn try_from(r: TokenRow) -> Result<Self, Self::Error> {
        Ok(Self {
            kind: r.kind.parse()?,
            token: r.token,
            user_id: r.user_id,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewToken {
    pub token: String,
    pub user_id: String,
    pub kind: TokenType,
}
