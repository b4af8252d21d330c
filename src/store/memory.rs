//! In-memory [`Store`] for tests.
//!
//! Enforces the same unique and foreign-key constraints as the schema in
//! `migrations/`. Transactions work on a private copy of the tables that
//! replaces the shared state on commit. Like a unique index, inserts inside a
//! transaction also see rows committed after the copy was taken, and user
//! updates and deletes skip rows that are no longer committed. Faults can be
//! switched on to exercise infrastructure failure paths.

use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc, Mutex,
};

use anyhow::{anyhow, bail};
use async_trait::async_trait;
use time::{Duration, OffsetDateTime};

use super::{Queries, Store, Transaction, UniqueViolation};
use crate::{
    oinks::repo_types::{NewOink, Oink, OinkKey, OinkWithCreator},
    tokens::repo_types::{NewToken, Token, TokenType},
    users::repo_types::{NewUser, User, UserKey},
};

#[derive(Debug, Clone, Default)]
pub struct Tables {
    pub users: Vec<User>,
    pub tokens: Vec<Token>,
    pub oinks: Vec<Oink>,
}

#[derive(Default)]
struct Faults {
    storage_down: AtomicBool,
    fail_commit: AtomicBool,
    fail_rollback: AtomicBool,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    faults: Arc<Faults>,
    clock: Arc<AtomicU64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Tables {
        self.tables.lock().expect("tables lock").clone()
    }

    /// Every statement fails until switched back.
    pub fn set_storage_down(&self, down: bool) {
        self.faults.storage_down.store(down, Ordering::SeqCst);
    }

    pub fn set_fail_commit(&self, fail: bool) {
        self.faults.fail_commit.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_rollback(&self, fail: bool) {
        self.faults.fail_rollback.store(fail, Ordering::SeqCst);
    }

    /// Removes a user row while leaving its tokens and oinks behind, as if the
    /// foreign keys had been bypassed.
    pub fn purge_user(&self, id: &str) {
        self.tables
            .lock()
            .expect("tables lock")
            .users
            .retain(|u| u.id != id);
    }

    fn handle(&self, target: Target) -> MemoryQueries {
        MemoryQueries {
            target,
            faults: self.faults.clone(),
            clock: self.clock.clone(),
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn connection(&self) -> anyhow::Result<Box<dyn Queries>> {
        if self.faults.storage_down.load(Ordering::SeqCst) {
            bail!("acquire connection: storage unavailable");
        }
        Ok(Box::new(self.handle(Target::Shared(self.tables.clone()))))
    }

    async fn begin(&self) -> anyhow::Result<Box<dyn Transaction>> {
        if self.faults.storage_down.load(Ordering::SeqCst) {
            bail!("begin transaction: storage unavailable");
        }
        let work = self.snapshot();
        Ok(Box::new(self.handle(Target::Staged {
            base: self.tables.clone(),
            started: work.clone(),
            work,
        })))
    }
}

enum Target {
    Shared(Arc<Mutex<Tables>>),
    Staged {
        base: Arc<Mutex<Tables>>,
        started: Tables,
        work: Tables,
    },
}

pub struct MemoryQueries {
    target: Target,
    faults: Arc<Faults>,
    clock: Arc<AtomicU64>,
}

impl MemoryQueries {
    fn with<R>(&mut self, f: impl FnOnce(&mut Tables) -> anyhow::Result<R>) -> anyhow::Result<R> {
        if self.faults.storage_down.load(Ordering::SeqCst) {
            bail!("storage unavailable");
        }
        match &mut self.target {
            Target::Shared(tables) => {
                let mut guard = tables.lock().map_err(|_| anyhow!("tables lock poisoned"))?;
                f(&mut guard)
            }
            Target::Staged { work, .. } => f(work),
        }
    }

    /// Runs `conflict` against the committed tables when inside a transaction.
    fn check_committed(
        &self,
        conflict: impl Fn(&Tables) -> Option<&'static str>,
    ) -> anyhow::Result<()> {
        if self.faults.storage_down.load(Ordering::SeqCst) {
            bail!("storage unavailable");
        }
        if let Target::Staged { base, .. } = &self.target {
            let tables = base.lock().map_err(|_| anyhow!("tables lock poisoned"))?;
            if let Some(constraint) = conflict(&*tables) {
                return Err(violation(constraint));
            }
        }
        Ok(())
    }

    /// False when a row matched by `present` existed as the transaction
    /// began but has since been removed by another writer. Updates and
    /// deletes inside a transaction skip such rows.
    fn still_committed(&self, present: impl Fn(&Tables) -> bool) -> anyhow::Result<bool> {
        match &self.target {
            Target::Shared(_) => Ok(true),
            Target::Staged { base, started, .. } => {
                let tables = base.lock().map_err(|_| anyhow!("tables lock poisoned"))?;
                Ok(present(&*tables) || !present(started))
            }
        }
    }

    /// Strictly increasing timestamps so newest-first ordering is stable.
    fn now(&self) -> OffsetDateTime {
        let tick = self.clock.fetch_add(1, Ordering::SeqCst);
        OffsetDateTime::now_utc() + Duration::microseconds(tick as i64)
    }
}

#[async_trait]
impl Transaction for MemoryQueries {
    fn queries(&mut self) -> &mut dyn Queries {
        self
    }

    async fn commit(self: Box<Self>) -> anyhow::Result<()> {
        let this = *self;
        let Target::Staged { base, work, .. } = this.target else {
            bail!("commit outside a transaction");
        };
        if this.faults.fail_commit.load(Ordering::SeqCst) {
            // staged work is discarded, i.e. rolled back
            bail!("commit transaction: injected failure");
        }
        *base.lock().map_err(|_| anyhow!("tables lock poisoned"))? = work;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> anyhow::Result<()> {
        if self.faults.fail_rollback.load(Ordering::SeqCst) {
            bail!("rollback transaction: injected failure");
        }
        Ok(())
    }
}

fn violation(constraint: &str) -> anyhow::Error {
    UniqueViolation {
        constraint: constraint.to_owned(),
    }
    .into()
}

fn user_conflict(t: &Tables, user: &NewUser) -> Option<&'static str> {
    if t.users.iter().any(|u| u.id == user.id) {
        Some("users_pkey")
    } else if t.users.iter().any(|u| u.email == user.email) {
        Some("users_email_key")
    } else if t.users.iter().any(|u| u.username == user.username) {
        Some("users_username_key")
    } else {
        None
    }
}

fn oink_conflict(t: &Tables, oink: &NewOink) -> Option<&'static str> {
    if t.oinks.iter().any(|o| o.id == oink.id) {
        Some("oinks_pkey")
    } else if t.oinks.iter().any(|o| o.name == oink.name) {
        Some("oinks_name_key")
    } else {
        None
    }
}

fn to_listing(t: &Tables, oink: &Oink) -> anyhow::Result<OinkWithCreator> {
    let creator = t
        .users
        .iter()
        .find(|u| u.id == oink.creator_id)
        .ok_or_else(|| anyhow!("oink {} references missing user", oink.id))?;
    Ok(OinkWithCreator::new(oink.clone(), creator.username.clone()))
}

#[async_trait]
impl Queries for MemoryQueries {
    async fn ping(&mut self) -> anyhow::Result<()> {
        self.with(|_| Ok(()))
    }

    async fn user_exists(&mut self, key: UserKey<'_>) -> anyhow::Result<bool> {
        self.with(|t| Ok(t.users.iter().any(|u| key.matches(u))))
    }

    async fn insert_user(&mut self, user: &NewUser) -> anyhow::Result<User> {
        let now = self.now();
        self.check_committed(|t| user_conflict(t, user))?;
        self.with(|t| {
            if let Some(constraint) = user_conflict(t, user) {
                return Err(violation(constraint));
            }
            let row = User {
                id: user.id.clone(),
                email: user.email.clone(),
                username: user.username.clone(),
                password_hash: user.password_hash.clone(),
                created_at: now,
                updated_at: now,
            };
            t.users.push(row.clone());
            Ok(row)
        })
    }

    async fn find_user(&mut self, key: UserKey<'_>) -> anyhow::Result<Option<User>> {
        self.with(|t| Ok(t.users.iter().find(|u| key.matches(u)).cloned()))
    }

    async fn list_users(&mut self) -> anyhow::Result<Vec<User>> {
        self.with(|t| Ok(t.users.clone()))
    }

    async fn update_user_password(
        &mut self,
        id: &str,
        password_hash: &str,
    ) -> anyhow::Result<u64> {
        let now = self.now();
        if !self.still_committed(|t| t.users.iter().any(|u| u.id == id))? {
            return Ok(0);
        }
        self.with(|t| {
            Ok(match t.users.iter_mut().find(|u| u.id == id) {
                Some(u) => {
                    u.password_hash = password_hash.to_owned();
                    u.updated_at = now;
                    1
                }
                None => 0,
            })
        })
    }

    async fn delete_user(&mut self, id: &str) -> anyhow::Result<u64> {
        if !self.still_committed(|t| t.users.iter().any(|u| u.id == id))? {
            return Ok(0);
        }
        self.with(|t| {
            let referenced = t.tokens.iter().any(|k| k.user_id == id)
                || t.oinks.iter().any(|o| o.creator_id == id);
            if referenced {
                bail!("delete user: foreign key constraint violated");
            }
            let before = t.users.len();
            t.users.retain(|u| u.id != id);
            Ok((before - t.users.len()) as u64)
        })
    }

    async fn insert_token(&mut self, token: &NewToken) -> anyhow::Result<Token> {
        let now = self.now();
        self.with(|t| {
            if !t.users.iter().any(|u| u.id == token.user_id) {
                bail!("insert token: foreign key constraint violated");
            }
            if t.tokens.iter().any(|k| k.token == token.token) {
                bail!("insert token: unique constraint violated");
            }
            let row = Token {
                token: token.token.clone(),
                user_id: token.user_id.clone(),
                kind: token.kind,
                created_at: now,
                updated_at: now,
            };
            t.tokens.push(row.clone());
            Ok(row)
        })
    }

    async fn find_token(&mut self, token: &str) -> anyhow::Result<Option<Token>> {
        self.with(|t| Ok(t.tokens.iter().find(|k| k.token == token).cloned()))
    }

    async fn list_tokens(
        &mut self,
        user_id: &str,
        kind: Option<TokenType>,
    ) -> anyhow::Result<Vec<Token>> {
        self.with(|t| {
            let mut rows: Vec<Token> = t
                .tokens
                .iter()
                .filter(|k| k.user_id == user_id && kind.map_or(true, |kind| k.kind == kind))
                .cloned()
                .collect();
            rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(rows)
        })
    }

    async fn token_exists(
        &mut self,
        token: &str,
        user_id: &str,
        kind: TokenType,
    ) -> anyhow::Result<bool> {
        self.with(|t| {
            Ok(t
                .tokens
                .iter()
                .any(|k| k.token == token && k.user_id == user_id && k.kind == kind))
        })
    }

    async fn delete_token(&mut self, token: &str) -> anyhow::Result<u64> {
        self.with(|t| {
            let before = t.tokens.len();
            t.tokens.retain(|k| k.token != token);
            Ok((before - t.tokens.len()) as u64)
        })
    }

    async fn delete_tokens_for_user(&mut self, user_id: &str) -> anyhow::Result<u64> {
        self.with(|t| {
            let before = t.tokens.len();
            t.tokens.retain(|k| k.user_id != user_id);
            Ok((before - t.tokens.len()) as u64)
        })
    }

    async fn oink_exists(&mut self, name: &str) -> anyhow::Result<bool> {
        self.with(|t| Ok(t.oinks.iter().any(|o| o.name == name)))
    }

    async fn count_oinks_by_creator(&mut self, creator_id: &str) -> anyhow::Result<i64> {
        self.with(|t| Ok(t.oinks.iter().filter(|o| o.creator_id == creator_id).count() as i64))
    }

    async fn insert_oink(&mut self, oink: &NewOink) -> anyhow::Result<Oink> {
        let now = self.now();
        self.check_committed(|t| oink_conflict(t, oink))?;
        self.with(|t| {
            if !t.users.iter().any(|u| u.id == oink.creator_id) {
                bail!("insert oink: foreign key constraint violated");
            }
            if let Some(constraint) = oink_conflict(t, oink) {
                return Err(violation(constraint));
            }
            let row = Oink {
                id: oink.id.clone(),
                name: oink.name.clone(),
                description: oink.description.clone(),
                creator_id: oink.creator_id.clone(),
                created_at: now,
                updated_at: now,
            };
            t.oinks.push(row.clone());
            Ok(row)
        })
    }

    async fn list_oinks(&mut self) -> anyhow::Result<Vec<OinkWithCreator>> {
        self.with(|t| {
            let t: &Tables = t;
            t.oinks.iter().map(|o| to_listing(t, o)).collect()
        })
    }

    async fn find_oink(&mut self, key: OinkKey<'_>) -> anyhow::Result<Option<OinkWithCreator>> {
        self.with(|t| {
            let t: &Tables = t;
            t.oinks
                .iter()
                .find(|o| key.matches(o))
                .map(|o| to_listing(t, o))
                .transpose()
        })
    }

    async fn delete_oink(&mut self, name: &str) -> anyhow::Result<u64> {
        self.with(|t| {
            let before = t.oinks.len();
            t.oinks.retain(|o| o.name != name);
            Ok((before - t.oinks.len()) as u64)
        })
    }
}
