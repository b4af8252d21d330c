use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use super::{
    dto::{
        CreateUserRequest, StatusResponse, UpdatePasswordRequest, UserListResponse, UserResponse,
    },
    repo,
};
use crate::{
    auth::identity::CurrentSession, error::AppError, extract::AppJson, state::AppState,
    tx::WriteTx,
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", post(create_user).get(list_users))
        .route("/users/:id", get(get_user).delete(delete_user))
        .route("/users/:id/password", post(update_password))
}

#[instrument(skip(state, payload))]
pub async fn create_user(
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), AppError> {
    let mut tx = WriteTx::begin(state.store.as_ref()).await?;
    let res = repo::create(
        tx.queries(),
        &payload.email,
        &payload.password,
        &payload.username,
    )
    .await;
    let user = tx.finish(res).await?;
    Ok((StatusCode::CREATED, Json(UserResponse { user: user.into() })))
}

#[instrument(skip_all)]
pub async fn list_users(
    State(state): State<AppState>,
    _session: CurrentSession,
) -> Result<Json<UserListResponse>, AppError> {
    let mut db = state.store.connection().await?;
    let users = repo::list(&mut *db).await?;
    Ok(Json(UserListResponse {
        users: users.into_iter().map(Into::into).collect(),
    }))
}

#[instrument(skip(state, _session))]
pub async fn get_user(
    State(state): State<AppState>,
    _session: CurrentSession,
    Path(id): Path<String>,
) -> Result<Json<UserResponse>, AppError> {
    let mut db = state.store.connection().await?;
    let user = repo::get_by_id(&mut *db, &id).await?;
    Ok(Json(UserResponse { user: user.into() }))
}

#[instrument(skip(state, session), fields(by = %session.user.id))]
pub async fn delete_user(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Path(id): Path<String>,
) -> Result<Json<StatusResponse>, AppError> {
    let mut tx = WriteTx::begin(state.store.as_ref()).await?;
    let res = repo::delete(tx.queries(), &id).await;
    tx.finish(res).await?;
    Ok(Json(StatusResponse {
        status: "User deleted",
    }))
}

#[instrument(skip(state, _session, payload))]
pub async fn update_password(
    State(state): State<AppState>,
    _session: CurrentSession,
    Path(id): Path<String>,
    AppJson(payload): AppJson<UpdatePasswordRequest>,
) -> Result<Json<StatusResponse>, AppError> {
    let mut db = state.store.connection().await?;
    repo::update_password(&mut *db, &id, &payload.password).await?;
    Ok(Json(StatusResponse {
        status: "Password updated",
    }))
}
