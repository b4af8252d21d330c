//! Creates the first account so someone can log in to a fresh deployment.

use anyhow::Context;
use oinkd::{config::AppConfig, error::AppError, state::AppState, tx::WriteTx, users};
use tracing::info;

fn required(key: &str) -> anyhow::Result<String> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .with_context(|| format!("{key} is not set"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "oinkd=info".to_string());
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let email = required("BOOTSTRAP_EMAIL")?;
    let username = required("BOOTSTRAP_USERNAME")?;
    let password = required("BOOTSTRAP_PASSWORD")?;

    let state = AppState::init(AppConfig::from_env()?).await?;

    let mut tx = WriteTx::begin(state.store.as_ref()).await?;
    let res = users::repo::create(tx.queries(), &email, &password, &username).await;
    match tx.finish(res).await {
        Ok(user) => info!(user_id = %user.id, email = %user.email, "bootstrap account created"),
        Err(AppError::DuplicateIdentity(reason)) => {
            info!(email = %email, reason, "bootstrap account already present, nothing to do")
        }
        Err(e) => return Err(e).context("create bootstrap account"),
    }
    Ok(())
}
