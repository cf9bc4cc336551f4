use crate::metrics;
use actix_cors::Cors;
use actix_middleware::SessionAuth;
use actix_web::{http::header, web, HttpResponse};

pub mod messages;
pub mod presence;
pub mod wsroute;

async fn health() -> HttpResponse {
    HttpResponse::Ok().body("OK")
}

/// CORS for the browser-facing API. `/ws` checks `Origin` itself.
pub fn api_cors(allowed_origin: &str) -> Cors {
    Cors::default()
        .allowed_origin(allowed_origin)
        .allowed_methods(vec!["GET"])
        .allowed_headers(vec![header::CONTENT_TYPE, header::ACCEPT])
        .supports_credentials()
        .max_age(3600)
}

/// Mounts every route. The `/api` scope sits behind CORS and session
/// authentication.
pub fn configure(cfg: &mut web::ServiceConfig, session_auth: SessionAuth, allowed_origin: &str) {
    cfg.route("/health", web::get().to(health))
        .route("/metrics", web::get().to(metrics::serve_metrics))
        .service(wsroute::ws_handler)
        .service(
            web::scope("/api")
                .wrap(session_auth)
                .wrap(api_cors(allowed_origin))
                .service(presence::user_statuses)
                .service(messages::conversation),
        );
}
