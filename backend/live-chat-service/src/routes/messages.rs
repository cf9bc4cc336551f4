use crate::error::{AppError, AppResult};
use crate::state::AppState;
use actix_middleware::UserId;
use actix_web::{get, web, HttpResponse};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ConversationQuery {
    #[serde(rename = "receiverId", default)]
    pub receiver_id: String,
}

/// Full history between the caller and `receiverId`, oldest first.
#[get("/messages")]
pub async fn conversation(
    user: UserId,
    query: web::Query<ConversationQuery>,
    state: web::Data<AppState>,
) -> AppResult<HttpResponse> {
    let receiver_id = query.receiver_id.trim();
    if receiver_id.is_empty() || !state.store.user_exists(receiver_id).await? {
        return Err(AppError::BadRequest(
            "select a user to converse with".into(),
        ));
    }

    let entries = state
        .store
        .query_conversation(user.as_str(), receiver_id)
        .await?;
    Ok(HttpResponse::Ok().json(entries))
}
