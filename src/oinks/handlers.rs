use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::instrument;

use super::{
    dto::{CreateOinkRequest, CreatedOinkResponse, OinkListResponse, OinkResponse},
    repo,
};
use crate::{
    auth::identity::CurrentSession, error::AppError, extract::AppJson, state::AppState,
    tx::WriteTx,
};

pub fn oink_routes() -> Router<AppState> {
    Router::new()
        .route("/oinks", get(list_oinks).post(create_oink))
        .route("/oinks/:name", get(get_oink).delete(delete_oink))
        .route("/oinks/id/:id", get(get_oink_by_id))
}

#[instrument(skip(state, session, payload), fields(creator_id = %session.user.id))]
pub async fn create_oink(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    AppJson(payload): AppJson<CreateOinkRequest>,
) -> Result<(StatusCode, Json<CreatedOinkResponse>), AppError> {
    let mut tx = WriteTx::begin(state.store.as_ref()).await?;
    let res = repo::create(
        tx.queries(),
        &payload.name,
        payload.description.as_deref(),
        &session.user.id,
    )
    .await;
    let oink = tx.finish(res).await?;
    Ok((StatusCode::CREATED, Json(CreatedOinkResponse { oink })))
}

#[instrument(skip_all)]
pub async fn list_oinks(
    State(state): State<AppState>,
    _session: CurrentSession,
) -> Result<Json<OinkListResponse>, AppError> {
    let mut db = state.store.connection().await?;
    let oinks = repo::list(&mut *db).await?;
    Ok(Json(OinkListResponse { oinks }))
}

#[instrument(skip(state, _session))]
pub async fn get_oink(
    State(state): State<AppState>,
    _session: CurrentSession,
    Path(name): Path<String>,
) -> Result<Json<OinkResponse>, AppError> {
    let mut db = state.store.connection().await?;
    let oink = repo::retrieve_by_name(&mut *db, &name).await?;
    Ok(Json(OinkResponse { oink }))
}

#[instrument(skip(state, _session))]
pub async fn get_oink_by_id(
    State(state): State<AppState>,
    _session: CurrentSession,
    Path(id): Path<String>,
) -> Result<Json<OinkResponse>, AppError> {
    let mut db = state.store.connection().await?;
    let oink = repo::retrieve_by_id(&mut *db, &id).await?;
    Ok(Json(OinkResponse { oink }))
}

#[instrument(skip(state, _session))]
pub async fn delete_oink(
    State(state): State<AppState>,
    _session: CurrentSession,
    Path(name): Path<String>,
) -> Result<StatusCode, AppError> {
    let mut db = state.store.connection().await?;
    repo::delete(&mut *db, &name).await?;
    Ok(StatusCode::NO_CONTENT)
}
