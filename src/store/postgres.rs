use std::ops::DerefMut;

use anyhow::Context;
use async_trait::async_trait;
use sqlx::{migrate::Migrator, postgres::PgPoolOptions, PgConnection, PgPool, Postgres};
use tracing::{debug, info};

use super::{Queries, Store, Transaction, UniqueViolation};
use crate::{
    config::AppConfig,
    oinks::repo_types::{NewOink, Oink, OinkKey, OinkWithCreator},
    tokens::repo_types::{NewToken, Token, TokenRow, TokenType},
    users::repo_types::{NewUser, User, UserKey},
};

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

const USER_COLUMNS: &str = "id, email, username, password_hash, created_at, updated_at";
const TOKEN_COLUMNS: &str = "token, user_id, type AS kind, created_at, updated_at";
const OINK_COLUMNS: &str = "id, name, description, creator_id, created_at, updated_at";
const OINK_WITH_CREATOR: &str = r#"
    SELECT o.id, o.name, o.description, o.creator_id,
           u.username AS creator_username, o.created_at, o.updated_at
      FROM oinks o
      JOIN users u ON u.id = o.creator_id
"#;

const UNIQUE_VIOLATION: &str = "23505";

/// Separates unique-constraint rejections from other insert failures.
fn insert_error(err: sqlx::Error, what: &'static str) -> anyhow::Error {
    if let sqlx::Error::Database(db) = &err {
        if db.code().as_deref() == Some(UNIQUE_VIOLATION) {
            return UniqueViolation {
                constraint: db.constraint().unwrap_or("unknown").to_owned(),
            }
            .into();
        }
    }
    anyhow::Error::new(err).context(what)
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(config: &AppConfig) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;
        info!(max_connections = config.max_connections, "database pool ready");
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        MIGRATOR.run(&self.pool).await.context("run migrations")?;
        debug!("migrations applied");
        Ok(())
    }
}

#[async_trait]
impl Store for PgStore {
    async fn connection(&self) -> anyhow::Result<Box<dyn Queries>> {
        let conn = self.pool.acquire().await.context("acquire connection")?;
        Ok(Box::new(PgQueries(conn)))
    }

    async fn begin(&self) -> anyhow::Result<Box<dyn Transaction>> {
        let tx = self.pool.begin().await.context("begin transaction")?;
        Ok(Box::new(PgQueries(tx)))
    }
}

/// Runs statements on anything that derefs to a live connection: a pooled
/// connection or an open `sqlx` transaction.
pub struct PgQueries<C>(C);

#[async_trait]
impl Transaction for PgQueries<sqlx::Transaction<'static, Postgres>> {
    fn queries(&mut self) -> &mut dyn Queries {
        self
    }

    // sqlx only marks the transaction closed after a successful COMMIT, so a
    // failed commit is rolled back when `tx` drops.
    async fn commit(self: Box<Self>) -> anyhow::Result<()> {
        let PgQueries(tx) = *self;
        tx.commit().await.context("commit transaction")
    }

    async fn rollback(self: Box<Self>) -> anyhow::Result<()> {
        let PgQueries(tx) = *self;
        tx.rollback().await.context("rollback transaction")
    }
}

#[async_trait]
impl<C> Queries for PgQueries<C>
where
    C: DerefMut<Target = PgConnection> + Send + 'static,
{
    async fn ping(&mut self) -> anyhow::Result<()> {
        sqlx::query("SELECT 1")
            .execute(&mut *self.0)
            .await
            .context("ping database")?;
        Ok(())
    }

    async fn user_exists(&mut self, key: UserKey<'_>) -> anyhow::Result<bool> {
        let sql = format!(
            "SELECT EXISTS(SELECT 1 FROM users WHERE {} = $1)",
            key.column()
        );
        sqlx::query_scalar::<_, bool>(&sql)
            .bind(key.value())
            .fetch_one(&mut *self.0)
            .await
            .with_context(|| format!("check user exists by {}", key.column()))
    }

    async fn insert_user(&mut self, user: &NewUser) -> anyhow::Result<User> {
        let sql = format!(
            r#"
            INSERT INTO users (id, email, username, password_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING {USER_COLUMNS}
            "#
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(&user.id)
            .bind(&user.email)
            .bind(&user.username)
            .bind(&user.password_hash)
            .fetch_one(&mut *self.0)
            .await
            .map_err(|e| insert_error(e, "insert user"))
    }

    async fn find_user(&mut self, key: UserKey<'_>) -> anyhow::Result<Option<User>> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE {} = $1",
            key.column()
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(key.value())
            .fetch_optional(&mut *self.0)
            .await
            .with_context(|| format!("find user by {}", key.column()))
    }

    async fn list_users(&mut self) -> anyhow::Result<Vec<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at ASC");
        sqlx::query_as::<_, User>(&sql)
            .fetch_all(&mut *self.0)
            .await
            .context("list users")
    }

    async fn update_user_password(
        &mut self,
        id: &str,
        password_hash: &str,
    ) -> anyhow::Result<u64> {
        let res = sqlx::query(
            r#"
            UPDATE users
               SET password_hash = $2, updated_at = clock_timestamp()
             WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(password_hash)
        .execute(&mut *self.0)
        .await
        .context("update user password")?;
        Ok(res.rows_affected())
    }

    async fn delete_user(&mut self, id: &str) -> anyhow::Result<u64> {
        let res = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *self.0)
            .await
            .context("delete user")?;
        Ok(res.rows_affected())
    }

    async fn insert_token(&mut self, token: &NewToken) -> anyhow::Result<Token> {
        let sql = format!(
            r#"
            INSERT INTO tokens (token, user_id, type)
            VALUES ($1, $2, $3)
            RETURNING {TOKEN_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, TokenRow>(&sql)
            .bind(&token.token)
            .bind(&token.user_id)
            .bind(token.kind.as_str())
            .fetch_one(&mut *self.0)
            .await
            .context("insert token")?;
        row.try_into()
    }

    async fn find_token(&mut self, token: &str) -> anyhow::Result<Option<Token>> {
        let sql = format!("SELECT {TOKEN_COLUMNS} FROM tokens WHERE token = $1");
        sqlx::query_as::<_, TokenRow>(&sql)
            .bind(token)
            .fetch_optional(&mut *self.0)
            .await
            .context("find token")?
            .map(Token::try_from)
            .transpose()
    }

    async fn list_tokens(
        &mut self,
        user_id: &str,
        kind: Option<TokenType>,
    ) -> anyhow::Result<Vec<Token>> {
        let sql = format!(
            r#"
            SELECT {TOKEN_COLUMNS}
              FROM tokens
             WHERE user_id = $1 AND ($2::text IS NULL OR type = $2)
             ORDER BY created_at DESC
            "#
        );
        sqlx::query_as::<_, TokenRow>(&sql)
            .bind(user_id)
            .bind(kind.map(|k| k.as_str()))
            .fetch_all(&mut *self.0)
            .await
            .context("list tokens")?
            .into_iter()
            .map(Token::try_from)
            .collect()
    }

    async fn token_exists(
        &mut self,
        token: &str,
        user_id: &str,
        kind: TokenType,
    ) -> anyhow::Result<bool> {
        sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM tokens WHERE token = $1 AND user_id = $2 AND type = $3
            )
            "#,
        )
        .bind(token)
        .bind(user_id)
        .bind(kind.as_str())
        .fetch_one(&mut *self.0)
        .await
        .context("check token exists")
    }

    async fn delete_token(&mut self, token: &str) -> anyhow::Result<u64> {
        let res = sqlx::query("DELETE FROM tokens WHERE token = $1")
            .bind(token)
            .execute(&mut *self.0)
            .await
            .context("delete token")?;
        Ok(res.rows_affected())
    }

    async fn delete_tokens_for_user(&mut self, user_id: &str) -> anyhow::Result<u64> {
        let res = sqlx::query("DELETE FROM tokens WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *self.0)
            .await
            .context("delete tokens for user")?;
        Ok(res.rows_affected())
    }

    async fn oink_exists(&mut self, name: &str) -> anyhow::Result<bool> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM oinks WHERE name = $1)")
            .bind(name)
            .fetch_one(&mut *self.0)
            .await
            .context("check oink exists")
    }

    async fn count_oinks_by_creator(&mut self, creator_id: &str) -> anyhow::Result<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM oinks WHERE creator_id = $1")
            .bind(creator_id)
            .fetch_one(&mut *self.0)
            .await
            .context("count oinks by creator")
    }

    async fn insert_oink(&mut self, oink: &NewOink) -> anyhow::Result<Oink> {
        let sql = format!(
            r#"
            INSERT INTO oinks (id, name, description, creator_id)
            VALUES ($1, $2, $3, $4)
            RETURNING {OINK_COLUMNS}
            "#
        );
        sqlx::query_as::<_, Oink>(&sql)
            .bind(&oink.id)
            .bind(&oink.name)
            .bind(&oink.description)
            .bind(&oink.creator_id)
            .fetch_one(&mut *self.0)
            .await
            .map_err(|e| insert_error(e, "insert oink"))
    }

    async fn list_oinks(&mut self) -> anyhow::Result<Vec<OinkWithCreator>> {
        sqlx::query_as::<_, OinkWithCreator>(OINK_WITH_CREATOR)
            .fetch_all(&mut *self.0)
            .await
            .context("list oinks")
    }

    async fn find_oink(&mut self, key: OinkKey<'_>) -> anyhow::Result<Option<OinkWithCreator>> {
        let sql = format!("{OINK_WITH_CREATOR} WHERE o.{} = $1", key.column());
        sqlx::query_as::<_, OinkWithCreator>(&sql)
            .bind(key.value())
            .fetch_optional(&mut *self.0)
            .await
            .with_context(|| format!("find oink by {}", key.column()))
    }

    async fn delete_oink(&mut self, name: &str) -> anyhow::Result<u64> {
        let res = sqlx::query("DELETE FROM oinks WHERE name = $1")
            .bind(name)
            .execute(&mut *self.0)
            .await
            .context("delete oink")?;
        Ok(res.rows_affected())
    }
}
