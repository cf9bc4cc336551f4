use crate::config::Config;
use crate::services::{HandshakeVerifier, MessageStore};
use crate::websocket::{
    ConnectionLifecycle, ConnectionRegistry, MessagePipeline, PipelineWorker, PresenceResolver,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn MessageStore>,
    pub registry: ConnectionRegistry,
    pub presence: PresenceResolver,
    pub lifecycle: ConnectionLifecycle,
}

impl AppState {
    /// Wires the chat core around one registry. The returned worker is the
    /// pipeline's consumer and must be spawned by the caller.
    pub fn build(config: Arc<Config>, store: Arc<dyn MessageStore>) -> (Self, PipelineWorker) {
        let registry = ConnectionRegistry::new();
        let presence = PresenceResolver::new(store.clone(), registry.clone());
        let (pipeline, worker) =
            MessagePipeline::new(store.clone(), registry.clone(), presence.clone());
        let verifier = config
            .handshake_jwt_secret
            .as_deref()
            .map(HandshakeVerifier::new);
        let lifecycle =
            ConnectionLifecycle::new(registry.clone(), presence.clone(), pipeline, verifier);

        (
            Self {
                config,
                store,
                registry,
                presence,
                lifecycle,
            },
            worker,
        )
    }
}
