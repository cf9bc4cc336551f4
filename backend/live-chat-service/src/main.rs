use actix_middleware::{RequestTracing, SessionAuth, SessionResolver};
use actix_web::{web, App, HttpServer};
use anyhow::Context;
use live_chat_service::{
    config::Config,
    db, logging, routes,
    services::{MessageStore, SqliteMessageStore, SqliteSessionResolver},
    state::AppState,
};
use std::sync::Arc;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let cfg = Arc::new(Config::from_env()?);
    logging::init_tracing(cfg.log_format);

    let pool = db::init_pool(&cfg.database_url, cfg.database_max_connections)
        .await
        .with_context(|| format!("failed to open database at {}", cfg.database_url))?;

    let store: Arc<dyn MessageStore> = Arc::new(SqliteMessageStore::new(pool.clone()));
    let sessions: Arc<dyn SessionResolver> = Arc::new(SqliteSessionResolver::new(pool));

    let (state, worker) = AppState::build(cfg.clone(), store);
    let pipeline_task = worker.spawn();

    if cfg.handshake_jwt_secret.is_some() {
        tracing::info!("handshake token verification enabled");
    } else {
        tracing::warn!("handshake identity is asserted, not verified");
    }

    let bind_addr = cfg.bind_addr();
    tracing::info!(%bind_addr, origin = %cfg.allowed_origin, "starting live-chat-service");

    let data = web::Data::new(state);
    let server_cfg = cfg.clone();
    HttpServer::new(move || {
        let session_auth = SessionAuth::new(
            server_cfg.session_cookie_name.clone(),
            sessions.clone(),
        );

        App::new()
            .app_data(data.clone())
            .wrap(RequestTracing)
            .configure(|c| routes::configure(c, session_auth, &server_cfg.allowed_origin))
    })
    .bind(&bind_addr)
    .with_context(|| format!("failed to bind {bind_addr}"))?
    .run()
    .await
    .context("http server failed")?;

    pipeline_task.abort();
    tracing::info!("live-chat-service stopped");
    Ok(())
}
