//! Request identity.
//!
//! [`resolve_identity`] runs in front of every route and inserts exactly one
//! [`Identity`] into the request extensions. Handlers state what they need
//! with the [`CurrentSession`] or [`Anonymous`] extractors.

use anyhow::anyhow;
use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use tracing::{debug, error};

use crate::{
    error::AppError,
    state::AppState,
    store::Store,
    tokens,
    users::{self, repo_types::User},
};

/// A resolved bearer token and the user it belongs to.
#[derive(Debug, Clone)]
pub struct Session {
    pub user: User,
    pub token: String,
}

#[derive(Debug, Clone)]
pub enum Identity {
    Anonymous,
    Authenticated(Session),
}

/// Token part of `Authorization: <scheme> <token>`. Anything that does not
/// split on single spaces into exactly two parts counts as no header.
pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let mut parts = value.split(' ');
    let (_scheme, token) = (parts.next()?, parts.next()?);
    if parts.next().is_some() || token.is_empty() {
        return None;
    }
    Some(token)
}

/// Unknown tokens resolve to [`Identity::Anonymous`]. A token whose owner
/// cannot be loaded is an error, never anonymous.
pub async fn resolve(store: &dyn Store, headers: &HeaderMap) -> Result<Identity, AppError> {
    let Some(value) = bearer_token(headers) else {
        return Ok(Identity::Anonymous);
    };

    let mut db = store.connection().await?;
    let token = match tokens::repo::get_by_value(&mut *db, value).await {
        Ok(token) => token,
        Err(AppError::NotFound(_)) => {
            debug!("unknown bearer token, continuing anonymously");
            return Ok(Identity::Anonymous);
        }
        Err(e) => return Err(e),
    };

    let user = match users::repo::get_by_id(&mut *db, &token.user_id).await {
        Ok(user) => user,
        Err(AppError::NotFound(_)) => {
            error!(user_id = %token.user_id, "token references missing user");
            return Err(AppError::Infrastructure(anyhow!(
                "token owner {} not found",
                token.user_id
            )));
        }
        Err(e) => return Err(e),
    };

    debug!(user_id = %user.id, "request authenticated");
    Ok(Identity::Authenticated(Session {
        user,
        token: token.token,
    }))
}

pub async fn resolve_identity(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let identity = resolve(state.store.as_ref(), request.headers()).await?;
    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

fn identity(parts: &Parts) -> Result<&Identity, AppError> {
    parts
        .extensions
        .get::<Identity>()
        .ok_or_else(|| AppError::Infrastructure(anyhow!("request identity was not resolved")))
}

/// Rejects anonymous requests with 403.
#[derive(Debug, Clone)]
pub struct CurrentSession(pub Session);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentSession
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match identity(parts)? {
            Identity::Authenticated(session) => Ok(CurrentSession(session.clone())),
            Identity::Anonymous => Err(AppError::Forbidden),
        }
    }
}

/// Rejects requests that already carry a valid session.
#[derive(Debug, Clone, Copy)]
pub struct Anonymous;

#[async_trait]
impl<S> FromRequestParts<S> for Anonymous
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match identity(parts)? {
            Identity::Anonymous => Ok(Anonymous),
            Identity::Authenticated(_) => Err(AppError::AlreadyAuthenticated),
        }
    }
}
