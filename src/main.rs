use oinkd::{app, config::AppConfig, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "oinkd=debug,axum=info,tower_http=info".to_string());
    // outside development the default is JSON
    let json_logs = match std::env::var("LOG_FORMAT") {
        Ok(v) => v == "json",
        Err(_) => !config.is_development(),
    };

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    tracing::info!(env = %config.env, "starting oinkd");
    let server = config.server.clone();
    let state = AppState::init(config).await?;
    app::serve(app::build_app(state), &server).await
}
