use crate::error::AppError;
use crate::state::AppState;
use crate::websocket::WsSession;
use actix_web::{get, http::header, web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;

/// Exact match against the single configured origin.
fn origin_allowed(req: &HttpRequest, allowed: &str) -> bool {
    req.headers()
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(|origin| origin == allowed)
        .unwrap_or(false)
}

#[get("/ws")]
pub async fn ws_handler(
    req: HttpRequest,
    stream: web::Payload,
    state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    if !origin_allowed(&req, &state.config.allowed_origin) {
        tracing::warn!(
            origin = ?req.headers().get(header::ORIGIN),
            "websocket upgrade rejected: origin not allowed"
        );
        return Err(AppError::Forbidden("origin not allowed".into()).into());
    }

    ws::start(WsSession::new(state.lifecycle.clone()), &req, stream)
}
