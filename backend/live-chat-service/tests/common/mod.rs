#![allow(dead_code)]

use actix_middleware::{RequestTracing, SessionAuth, SessionResolver};
use actix_web::{dev::ServerHandle, web, App, HttpServer};
use awc::{error::WsProtocolError, ws};
use chrono::{Duration, Utc};
use futures::{Sink, SinkExt, Stream, StreamExt};
use live_chat_service::config::Config;
use live_chat_service::db::MIGRATOR;
use live_chat_service::routes;
use live_chat_service::services::{MessageStore, SqliteMessageStore, SqliteSessionResolver};
use live_chat_service::state::AppState;
use live_chat_service::websocket::{
    ConnectionHandle, FrameDisposition, Outbound, PipelineWorker,
};
use serde_json::{json, Value};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::future::Future;
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;

pub const ORIGIN: &str = "http://localhost:3000";
pub const COOKIE: &str = "social-network";

pub async fn memory_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite");
    MIGRATOR.run(&pool).await.expect("migrations");
    pool
}

pub async fn seed_user(pool: &SqlitePool, id: &str, fname: &str, lname: &str) {
    sqlx::query("INSERT INTO users (id, email, fname, lname) VALUES (?, ?, ?, ?)")
        .bind(id)
        .bind(format!("{id}@example.com"))
        .bind(fname)
        .bind(lname)
        .execute(pool)
        .await
        .expect("seed user");
}

pub async fn seed_session(
    pool: &SqlitePool,
    session_id: &str,
    user_id: &str,
    expires_in: Duration,
) {
    let expires_at = (Utc::now() + expires_in)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string();
    sqlx::query("INSERT INTO sessions (id, user_id, expires_at) VALUES (?, ?, ?)")
        .bind(session_id)
        .bind(user_id)
        .bind(expires_at)
        .execute(pool)
        .await
        .expect("seed session");
}

pub async fn seeded_pool() -> SqlitePool {
    let pool = memory_pool().await;
    seed_user(&pool, "u1", "Ada", "Lovelace").await;
    seed_user(&pool, "u2", "Grace", "Hopper").await;
    seed_user(&pool, "u3", "Alan", "Turing").await;
    pool
}

pub fn test_config() -> Arc<Config> {
    Arc::new(Config::default())
}

pub fn sqlite_state(pool: &SqlitePool) -> (AppState, PipelineWorker) {
    let store: Arc<dyn MessageStore> = Arc::new(SqliteMessageStore::new(pool.clone()));
    AppState::build(test_config(), store)
}

/// A live connection without a socket: the test holds the actor's inbox.
pub struct TestConnection {
    pub user_id: String,
    pub handle: ConnectionHandle,
    pub inbox: UnboundedReceiver<Outbound>,
}

impl TestConnection {
    pub async fn connect(state: &AppState, user_id: &str) -> Self {
        let (handle, inbox) = ConnectionHandle::new();
        let handshake = json!({"from": user_id, "to": "", "content": "", "timestamp": ""});
        let registered = state
            .lifecycle
            .handshake(&handshake.to_string(), handle.clone())
            .await
            .expect("handshake");
        assert_eq!(registered, user_id);
        Self {
            user_id: user_id.to_string(),
            handle,
            inbox,
        }
    }

    pub fn send(&self, state: &AppState, frame: Value) -> FrameDisposition {
        state
            .lifecycle
            .accept_frame(&self.user_id, &frame.to_string())
            .expect("frame accepted")
    }

    /// Everything queued for this connection so far.
    pub fn drain(&mut self) -> Vec<Outbound> {
        let mut out = Vec::new();
        while let Ok(item) = self.inbox.try_recv() {
            out.push(item);
        }
        out
    }

    pub fn drain_json(&mut self) -> Vec<Value> {
        self.drain()
            .into_iter()
            .filter_map(|item| match item {
                Outbound::Text(text) => serde_json::from_str(&text).ok(),
                Outbound::Close => None,
            })
            .collect()
    }

    /// Closes the socket the way the actor does: its inbox goes away, then
    /// the lifecycle runs the disconnect step.
    pub async fn disconnect(self, state: &AppState) {
        let TestConnection {
            user_id,
            handle,
            inbox,
        } = self;
        drop(inbox);
        state.lifecycle.disconnect(&user_id, handle.id()).await;
    }
}

pub fn presence_pushes(frames: &[Value]) -> Vec<&Value> {
    frames.iter().filter(|f| f["type"] == "userlist").collect()
}

pub fn chat_frames(frames: &[Value]) -> Vec<&Value> {
    frames.iter().filter(|f| f["type"] != "userlist").collect()
}

/// Runs the full app on an ephemeral port, built the way `main` builds it.
pub fn start_server(
    pool: &SqlitePool,
    state: AppState,
) -> std::io::Result<(SocketAddr, ServerHandle)> {
    let sessions: Arc<dyn SessionResolver> = Arc::new(SqliteSessionResolver::new(pool.clone()));
    let data = web::Data::new(state);

    let listener = TcpListener::bind("127.0.0.1:0")?;
    let addr = listener.local_addr()?;

    let server = HttpServer::new(move || {
        let session_auth = SessionAuth::new(COOKIE, sessions.clone());
        App::new()
            .app_data(data.clone())
            .wrap(RequestTracing)
            .configure(|c| routes::configure(c, session_auth, ORIGIN))
    })
    .workers(1)
    .listen(listener)?
    .run();

    let handle = server.handle();
    actix_rt::spawn(server);
    Ok((addr, handle))
}

pub trait ClientSocket:
    Stream<Item = Result<ws::Frame, WsProtocolError>>
    + Sink<ws::Message, Error = WsProtocolError>
    + Unpin
{
}

impl<T> ClientSocket for T where
    T: Stream<Item = Result<ws::Frame, WsProtocolError>>
        + Sink<ws::Message, Error = WsProtocolError>
        + Unpin
{
}

pub async fn open_socket(addr: SocketAddr) -> impl ClientSocket {
    let (_resp, socket) = awc::Client::new()
        .ws(format!("http://{addr}/ws"))
        .origin(ORIGIN)
        .connect()
        .await
        .expect("connect websocket client");
    socket
}

pub async fn send_text(socket: &mut impl ClientSocket, text: impl Into<String>) {
    socket
        .send(ws::Message::Text(text.into().into()))
        .await
        .expect("send text frame");
}

pub async fn send_close(socket: &mut impl ClientSocket) {
    socket
        .send(ws::Message::Close(Some(ws::CloseCode::Normal.into())))
        .await
        .expect("send close frame");
}

#[derive(Debug, PartialEq)]
pub enum Received {
    Json(Value),
    Closed(Option<ws::CloseCode>),
    Silence,
}

pub fn userlist(data: Value) -> Received {
    Received::Json(json!({"type": "userlist", "data": data}))
}

pub fn contact(id: &str, first: &str, last: &str, status: &str) -> Value {
    json!({"id": id, "firstname": first, "lastname": last, "status": status})
}

/// Next text or close frame, skipping control frames.
pub async fn next_event_within(
    socket: &mut impl ClientSocket,
    wait: std::time::Duration,
) -> Received {
    loop {
        let frame = match tokio::time::timeout(wait, socket.next()).await {
            Err(_) => return Received::Silence,
            Ok(None) => return Received::Closed(None),
            Ok(Some(frame)) => frame.expect("websocket frame"),
        };
        match frame {
            ws::Frame::Text(bytes) => {
                return Received::Json(serde_json::from_slice(&bytes).expect("json frame"))
            }
            ws::Frame::Close(reason) => return Received::Closed(reason.map(|r| r.code)),
            _ => continue,
        }
    }
}

pub async fn next_event(socket: &mut impl ClientSocket) -> Received {
    next_event_within(socket, std::time::Duration::from_secs(5)).await
}

pub async fn wait_until<F, Fut>(mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..250 {
        if condition().await {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    panic!("condition not reached within 5s");
}
