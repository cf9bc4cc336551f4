use crate::error::AppResult;
use crate::state::AppState;
use actix_middleware::UserId;
use actix_web::{get, web, HttpResponse};

/// Contact list of the calling user with online status, most recent first.
#[get("/users/status")]
pub async fn user_statuses(user: UserId, state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let statuses = state.presence.resolve(user.as_str()).await?;
    Ok(HttpResponse::Ok().json(statuses))
}
