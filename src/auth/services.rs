use tracing::{debug, info};

use super::identity::Session;
use crate::{
    error::AppError,
    store::Queries,
    tokens::{
        self,
        repo_types::{Token, TokenType},
    },
    users,
};

/// Verifies the credentials and hands back the user's newest login token,
/// issuing one only when none exists.
pub async fn login(db: &mut dyn Queries, email: &str, password: &str) -> Result<Token, AppError> {
    let user = users::repo::authenticate(db, email, password).await?;

    let existing = tokens::repo::list_by_user_and_type(db, &user.id, TokenType::Login).await?;
    let token = match existing.into_iter().next() {
        Some(token) => {
            debug!(user_id = %user.id, "reusing login token");
            token
        }
        None => tokens::repo::create(db, &user.id, TokenType::Login).await?,
    };

    info!(user_id = %user.id, "user logged in");
    Ok(token)
}

/// Deletes the token the session was resolved from.
pub async fn logout(db: &mut dyn Queries, session: &Session) -> Result<(), AppError> {
    tokens::repo::delete(db, &session.token, &session.user.id, TokenType::Login).await?;
    info!(user_id = %session.user.id, "user logged out");
    Ok(())
}
