pub mod dto;
pub mod handlers;
pub mod identity;
pub mod password;
pub mod services;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    handlers::auth_routes()
}
