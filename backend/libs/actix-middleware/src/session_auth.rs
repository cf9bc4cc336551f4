//! Session cookie authentication
//!
//! The social network issues an opaque session id in a cookie at login. This
//! middleware resolves that cookie to a user id through a [`SessionResolver`]
//! supplied by the service (the session table lives in the service's store)
//! and makes the id available to handlers through the [`UserId`] extractor.
//!
//! - Missing or empty cookie: 401
//! - Unknown or expired session: 401
//! - Resolver failure: 500

use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::StatusCode,
    Error, HttpMessage, HttpResponse,
};
use async_trait::async_trait;
use futures::future::{ready, LocalBoxFuture, Ready};
use std::rc::Rc;
use std::sync::Arc;
use thiserror::Error;

/// User id resolved from the session cookie
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserId(pub String);

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Error)]
pub enum SessionAuthError {
    #[error("session lookup failed: {0}")]
    Lookup(String),
}

/// Maps a session id to the user that owns it.
///
/// Implementations return `Ok(None)` for sessions that do not exist or have
/// expired.
#[async_trait]
pub trait SessionResolver: Send + Sync {
    async fn resolve(&self, session_id: &str) -> Result<Option<String>, SessionAuthError>;
}

/// Session authentication middleware
#[derive(Clone)]
pub struct SessionAuth {
    cookie_name: Arc<str>,
    resolver: Arc<dyn SessionResolver>,
}

impl SessionAuth {
    pub fn new(cookie_name: impl Into<String>, resolver: Arc<dyn SessionResolver>) -> Self {
        Self {
            cookie_name: Arc::from(cookie_name.into()),
            resolver,
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for SessionAuth
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = SessionAuthService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(SessionAuthService {
            service: Rc::new(service),
            cookie_name: self.cookie_name.clone(),
            resolver: self.resolver.clone(),
        }))
    }
}

pub struct SessionAuthService<S> {
    service: Rc<S>,
    cookie_name: Arc<str>,
    resolver: Arc<dyn SessionResolver>,
}

impl<S, B> Service<ServiceRequest> for SessionAuthService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let cookie_name = self.cookie_name.clone();
        let resolver = self.resolver.clone();

        Box::pin(async move {
            let session_id = req
                .cookie(&cookie_name)
                .map(|c| c.value().to_string())
                .filter(|v| !v.is_empty());

            let Some(session_id) = session_id else {
                return Ok(reject(
                    req,
                    StatusCode::UNAUTHORIZED,
                    "Unauthorized: No session cookie",
                ));
            };

            let user_id = match resolver.resolve(&session_id).await {
                Ok(Some(user_id)) => user_id,
                Ok(None) => {
                    tracing::debug!(path = %req.path(), "rejected unknown or expired session");
                    return Ok(reject(
                        req,
                        StatusCode::UNAUTHORIZED,
                        "Unauthorized: Invalid session",
                    ));
                }
                Err(e) => {
                    tracing::error!(error = %e, "session resolution failed");
                    return Ok(reject(
                        req,
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Internal server error",
                    ));
                }
            };

            req.extensions_mut().insert(UserId(user_id));

            service
                .call(req)
                .await
                .map(ServiceResponse::map_into_left_body)
        })
    }
}

fn reject<B>(
    req: ServiceRequest,
    status: StatusCode,
    message: &'static str,
) -> ServiceResponse<EitherBody<B>> {
    let response = HttpResponse::build(status).body(message);
    req.into_response(response).map_into_right_body()
}

impl actix_web::FromRequest for UserId {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(
        req: &actix_web::HttpRequest,
        _payload: &mut actix_web::dev::Payload,
    ) -> Self::Future {
        match req.extensions().get::<UserId>() {
            Some(user_id) => ready(Ok(user_id.clone())),
            None => ready(Err(actix_web::error::ErrorUnauthorized(
                "User not authenticated",
            ))),
        }
    }
}
