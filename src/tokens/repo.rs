use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};
use tracing::{debug, info, warn};

use super::repo_types::{NewToken, Token, TokenType};
use crate::{error::AppError, store::Queries};

const TOKEN_BYTES: usize = 32;

/// Opaque bearer value: 32 bytes from the OS RNG, base64url without padding.
fn generate_value() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    Base64UrlUnpadded::encode_string(&bytes)
}

pub async fn create(
    db: &mut dyn Queries,
    user_id: &str,
    kind: TokenType,
) -> Result<Token, AppError> {
    let token = db
        .insert_token(&NewToken {
            token: generate_value(),
            user_id: user_id.to_owned(),
            kind,
        })
        .await?;
    debug!(user_id = %user_id, kind = %kind, "token issued");
    Ok(token)
}

pub async fn get_by_value(db: &mut dyn Queries, token: &str) -> Result<Token, AppError> {
    db.find_token(token)
        .await?
        .ok_or(AppError::NotFound("Token not found"))
}

pub async fn list_by_user(db: &mut dyn Queries, user_id: &str) -> Result<Vec<Token>, AppError> {
    Ok(db.list_tokens(user_id, None).await?)
}

/// Newest first.
pub async fn list_by_user_and_type(
    db: &mut dyn Queries,
    user_id: &str,
    kind: TokenType,
) -> Result<Vec<Token>, AppError> {
    Ok(db.list_tokens(user_id, Some(kind)).await?)
}

pub async fn exists_for_user_and_type(
    db: &mut dyn Queries,
    token: &str,
    user_id: &str,
    kind: TokenType,
) -> Result<bool, AppError> {
    Ok(db.token_exists(token, user_id, kind).await?)
}

/// Deletes `token` only if it belongs to `user_id` and has type `kind`.
pub async fn delete(
    db: &mut dyn Queries,
    token: &str,
    user_id: &str,
    kind: TokenType,
) -> Result<(), AppError> {
    if !exists_for_user_and_type(db, token, user_id, kind).await? {
        warn!(user_id = %user_id, kind = %kind, "token delete: no matching token");
        return Err(AppError::NotFound("Token not found"));
    }
    db.delete_token(token).await?;
    info!(user_id = %user_id, kind = %kind, "token deleted");
    Ok(())
}
