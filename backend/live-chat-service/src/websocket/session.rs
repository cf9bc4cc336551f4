use super::lifecycle::ConnectionLifecycle;
use super::{ConnectionHandle, Outbound};
use crate::error::{FrameError, HandshakeError};
use actix::{
    Actor, ActorContext, ActorFutureExt, AsyncContext, ContextFutureSpawner, Handler,
    StreamHandler, WrapFuture,
};
use actix_web_actors::ws;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_stream::wrappers::UnboundedReceiverStream;

enum SessionState {
    AwaitingHandshake,
    Handshaking,
    Registered(String),
    Closed,
}

/// WebSocket actor owning one live connection.
pub struct WsSession {
    lifecycle: ConnectionLifecycle,
    handle: ConnectionHandle,
    outbound: Option<UnboundedReceiver<Outbound>>,
    state: SessionState,
}

impl WsSession {
    pub fn new(lifecycle: ConnectionLifecycle) -> Self {
        let (handle, outbound) = ConnectionHandle::new();
        Self {
            lifecycle,
            handle,
            outbound: Some(outbound),
            state: SessionState::AwaitingHandshake,
        }
    }

    fn begin_handshake(&mut self, text: String, ctx: &mut ws::WebsocketContext<Self>) {
        self.state = SessionState::Handshaking;
        let lifecycle = self.lifecycle.clone();
        let handle = self.handle.clone();

        // Hold back further frames until the identity is registered.
        async move { lifecycle.handshake(&text, handle).await }
            .into_actor(self)
            .map(|result, act, ctx| match result {
                Ok(user_id) => act.state = SessionState::Registered(user_id),
                Err(_) => act.shut(ctx, ws::CloseCode::Policy),
            })
            .wait(ctx);
    }

    fn handle_frame(&mut self, text: &str, ctx: &mut ws::WebsocketContext<Self>) {
        let SessionState::Registered(user_id) = &self.state else {
            return;
        };

        if let Err(e) = self.lifecycle.accept_frame(user_id, text) {
            self.drop_on_frame_error(e, ctx);
        }
    }

    fn drop_on_frame_error(&mut self, error: FrameError, ctx: &mut ws::WebsocketContext<Self>) {
        let user_id = match &self.state {
            SessionState::Registered(user_id) => user_id.as_str(),
            _ => "",
        };
        tracing::warn!(user_id = %user_id, error = %error, "closing connection after bad frame");
        let code = match error {
            FrameError::PipelineClosed => ws::CloseCode::Error,
            FrameError::Binary => ws::CloseCode::Unsupported,
            _ => ws::CloseCode::Invalid,
        };
        self.shut(ctx, code);
    }

    fn shut(&mut self, ctx: &mut ws::WebsocketContext<Self>, code: ws::CloseCode) {
        ctx.close(Some(code.into()));
        ctx.stop();
    }
}

impl Actor for WsSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::debug!(connection = %self.handle.id(), "websocket session started");
        if let Some(outbound) = self.outbound.take() {
            ctx.add_message_stream(UnboundedReceiverStream::new(outbound));
        }
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        let state = std::mem::replace(&mut self.state, SessionState::Closed);
        let SessionState::Registered(user_id) = state else {
            tracing::debug!(
                connection = %self.handle.id(),
                "unregistered websocket session stopped"
            );
            return;
        };

        let lifecycle = self.lifecycle.clone();
        let connection = self.handle.id();
        actix::spawn(async move {
            lifecycle.disconnect(&user_id, connection).await;
        });
    }
}

impl Handler<Outbound> for WsSession {
    type Result = ();

    fn handle(&mut self, msg: Outbound, ctx: &mut Self::Context) {
        match msg {
            Outbound::Text(text) => ctx.text(text),
            Outbound::Close => self.shut(ctx, ws::CloseCode::Away),
        }
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for WsSession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        let msg = match msg {
            Ok(msg) => msg,
            Err(e) => {
                tracing::warn!(error = %e, "websocket protocol error");
                ctx.stop();
                return;
            }
        };

        match msg {
            ws::Message::Ping(payload) => ctx.pong(&payload),
            ws::Message::Pong(_) => {}
            ws::Message::Text(text) => match self.state {
                SessionState::AwaitingHandshake => self.begin_handshake(text.to_string(), ctx),
                SessionState::Registered(_) => self.handle_frame(&text, ctx),
                SessionState::Handshaking | SessionState::Closed => {}
            },
            ws::Message::Binary(_) => match self.state {
                SessionState::AwaitingHandshake => {
                    ConnectionLifecycle::reject_handshake(&HandshakeError::NotText);
                    self.shut(ctx, ws::CloseCode::Unsupported);
                }
                _ => self.drop_on_frame_error(FrameError::Binary, ctx),
            },
            ws::Message::Close(reason) => {
                tracing::debug!(reason = ?reason, "websocket close received");
                ctx.close(reason);
                ctx.stop();
            }
            ws::Message::Continuation(_) | ws::Message::Nop => {}
        }
    }
}
