use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::{
        dto::{LoginRequest, LoginResponse, TokenListResponse},
        identity::{Anonymous, CurrentSession},
        services,
    },
    error::AppError,
    extract::AppJson,
    state::AppState,
    tokens,
    users::dto::UserResponse,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(get_me))
        .route("/auth/tokens", get(list_tokens))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    _anonymous: Anonymous,
    AppJson(payload): AppJson<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let mut db = state.store.connection().await?;
    let token = services::login(&mut *db, &payload.email, &payload.password).await?;
    Ok(Json(LoginResponse {
        token: token.into(),
    }))
}

#[instrument(skip_all, fields(user_id = %session.user.id))]
pub async fn get_me(CurrentSession(session): CurrentSession) -> Json<UserResponse> {
    Json(UserResponse {
        user: session.user.into(),
    })
}

#[instrument(skip_all, fields(user_id = %session.user.id))]
pub async fn logout(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
) -> Result<StatusCode, AppError> {
    let mut db = state.store.connection().await?;
    services::logout(&mut *db, &session).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip_all, fields(user_id = %session.user.id))]
pub async fn list_tokens(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
) -> Result<Json<TokenListResponse>, AppError> {
    let mut db = state.store.connection().await?;
    let tokens = tokens::repo::list_by_user(&mut *db, &session.user.id).await?;
    Ok(Json(TokenListResponse {
        tokens: tokens.into_iter().map(Into::into).collect(),
    }))
}
