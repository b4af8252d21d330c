//! Storage boundary.
//!
//! [`Queries`] has one method per parameterized statement the domain needs.
//! It is implemented both by pooled connections and by open transactions, so
//! the user directory, token store and oink registry run unchanged inside or
//! outside the write coordinator. Absence is reported as `None`/`false`/`0`.
//! An `insert_*` rejected by a unique constraint fails with
//! [`UniqueViolation`]; every other `Err` is an infrastructure failure.

use async_trait::async_trait;

use crate::{
    oinks::repo_types::{NewOink, Oink, OinkKey, OinkWithCreator},
    tokens::repo_types::{NewToken, Token, TokenType},
    users::repo_types::{NewUser, User, UserKey},
};

#[cfg(test)]
pub mod memory;
pub mod postgres;

/// A row lost a uniqueness race: the existence check passed, but another
/// writer committed the same key before the insert.
#[derive(Debug, thiserror::Error)]
#[error("unique constraint {constraint} violated")]
pub struct UniqueViolation {
    pub constraint: String,
}

pub fn unique_violation(err: &anyhow::Error) -> Option<&UniqueViolation> {
    err.downcast_ref::<UniqueViolation>()
}

#[async_trait]
pub trait Queries: Send {
    async fn ping(&mut self) -> anyhow::Result<()>;

    async fn user_exists(&mut self, key: UserKey<'_>) -> anyhow::Result<bool>;
    async fn insert_user(&mut self, user: &NewUser) -> anyhow::Result<User>;
    async fn find_user(&mut self, key: UserKey<'_>) -> anyhow::Result<Option<User>>;
    async fn list_users(&mut self) -> anyhow::Result<Vec<User>>;
    /// Returns the number of rows updated.
    async fn update_user_password(&mut self, id: &str, password_hash: &str)
        -> anyhow::Result<u64>;
    async fn delete_user(&mut self, id: &str) -> anyhow::Result<u64>;

    async fn insert_token(&mut self, token: &NewToken) -> anyhow::Result<Token>;
    async fn find_token(&mut self, token: &str) -> anyhow::Result<Option<Token>>;
    /// Newest first.
    async fn list_tokens(
        &mut self,
        user_id: &str,
        kind: Option<TokenType>,
    ) -> anyhow::Result<Vec<Token>>;
    async fn token_exists(
        &mut self,
        token: &str,
        user_id: &str,
        kind: TokenType,
    ) -> anyhow::Result<bool>;
    async fn delete_token(&mut self, token: &str) -> anyhow::Result<u64>;
    async fn delete_tokens_for_user(&mut self, user_id: &str) -> anyhow::Result<u64>;

    async fn oink_exists(&mut self, name: &str) -> anyhow::Result<bool>;
    async fn count_oinks_by_creator(&mut self, creator_id: &str) -> anyhow::Result<i64>;
    async fn insert_oink(&mut self, oink: &NewOink) -> anyhow::Result<Oink>;
    async fn list_oinks(&mut self) -> anyhow::Result<Vec<OinkWithCreator>>;
    async fn find_oink(&mut self, key: OinkKey<'_>) -> anyhow::Result<Option<OinkWithCreator>>;
    async fn delete_oink(&mut self, name: &str) -> anyhow::Result<u64>;
}

/// An open storage transaction.
///
/// Dropping it without calling [`Transaction::commit`] must roll it back.
#[async_trait]
pub trait Transaction: Send {
    fn queries(&mut self) -> &mut dyn Queries;
    /// On failure the transaction is left rolled back.
    async fn commit(self: Box<Self>) -> anyhow::Result<()>;
    async fn rollback(self: Box<Self>) -> anyhow::Result<()>;
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Autocommit handle for read-only and single-statement work.
    async fn connection(&self) -> anyhow::Result<Box<dyn Queries>>;
    async fn begin(&self) -> anyhow::Result<Box<dyn Transaction>>;
}
