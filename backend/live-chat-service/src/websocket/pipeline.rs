//! Single-consumer persistence and delivery stage.
//!
//! Every live connection submits into one unbounded queue. One worker drains
//! it: persist, deliver to the recipient if registered, then rebroadcast
//! presence. Messages from one connection are handled in the order they were
//! read; there is no ordering across connections.

use super::presence::PresenceResolver;
use super::ConnectionRegistry;
use crate::error::FrameError;
use crate::metrics;
use crate::models::Message;
use crate::services::MessageStore;
use std::sync::Arc;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    RecipientOffline,
    /// The write failed; the recipient was closed and evicted.
    DeliveryFailed,
}

impl DeliveryOutcome {
    fn label(self) -> &'static str {
        match self {
            DeliveryOutcome::Delivered => "delivered",
            DeliveryOutcome::RecipientOffline => "recipient_offline",
            DeliveryOutcome::DeliveryFailed => "failed",
        }
    }
}

/// Producer side of the pipeline. Cheap to clone; never blocks.
#[derive(Clone)]
pub struct MessagePipeline {
    sender: UnboundedSender<Message>,
}

impl MessagePipeline {
    pub fn new(
        store: Arc<dyn MessageStore>,
        registry: ConnectionRegistry,
        presence: PresenceResolver,
    ) -> (Self, PipelineWorker) {
        let (sender, receiver) = unbounded_channel();
        (
            Self { sender },
            PipelineWorker {
                receiver,
                store,
                registry,
                presence,
            },
        )
    }

    pub fn submit(&self, message: Message) -> Result<(), FrameError> {
        self.sender
            .send(message)
            .map_err(|_| FrameError::PipelineClosed)
    }
}

/// The pipeline's only consumer.
pub struct PipelineWorker {
    receiver: UnboundedReceiver<Message>,
    store: Arc<dyn MessageStore>,
    registry: ConnectionRegistry,
    presence: PresenceResolver,
}

impl PipelineWorker {
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Drains the queue until every producer handle is dropped.
    pub async fn run(mut self) {
        tracing::info!("message pipeline started");
        while self.process_next().await.is_some() {}
        tracing::info!("message pipeline stopped");
    }

    /// Waits for the next queued message and handles it. `None` once the
    /// queue is closed and empty.
    pub async fn process_next(&mut self) -> Option<DeliveryOutcome> {
        let message = self.receiver.recv().await?;
        Some(self.process(message).await)
    }

    pub async fn process(&self, message: Message) -> DeliveryOutcome {
        self.persist(&message).await;

        let outcome = self.deliver(&message).await;
        metrics::record_delivery(outcome.label());

        self.presence.rebroadcast().await;
        outcome
    }

    async fn persist(&self, message: &Message) {
        match self
            .store
            .insert_message(message.id, &message.from, &message.to, &message.content)
            .await
        {
            Ok(()) => metrics::record_persisted(),
            Err(e) => {
                metrics::record_persistence_failure();
                tracing::error!(
                    message_id = %message.id,
                    from = %message.from,
                    to = %message.to,
                    error = %e,
                    "failed to save message"
                );
            }
        }
    }

    async fn deliver(&self, message: &Message) -> DeliveryOutcome {
        let Some(recipient) = self.registry.lookup(&message.to).await else {
            tracing::info!(
                message_id = %message.id,
                to = %message.to,
                typing = message.is_typing_notice(),
                "recipient not online, message not delivered"
            );
            return DeliveryOutcome::RecipientOffline;
        };

        match recipient.send_json(&message.to_frame()) {
            Ok(()) => DeliveryOutcome::Delivered,
            Err(e) => {
                tracing::warn!(
                    message_id = %message.id,
                    to = %message.to,
                    error = %e,
                    "delivery failed, evicting recipient"
                );
                self.registry.evict(&message.to, &recipient).await;
                DeliveryOutcome::DeliveryFailed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConversationEntry, RecentContact};
    use crate::websocket::message_types::FrameKind;
    use crate::websocket::{ConnectionHandle, Outbound};
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;
    use uuid::Uuid;

    #[derive(Default)]
    struct RecordingStore {
        rows: StdMutex<Vec<(String, String, String)>>,
    }

    #[async_trait]
    impl MessageStore for RecordingStore {
        async fn insert_message(
            &self,
            _id: Uuid,
            from: &str,
            to: &str,
            content: &str,
        ) -> Result<(), sqlx::Error> {
            self.rows
                .lock()
                .unwrap()
                .push((from.into(), to.into(), content.into()));
            Ok(())
        }

        async fn query_conversation(
            &self,
            _: &str,
            _: &str,
        ) -> Result<Vec<ConversationEntry>, sqlx::Error> {
            Ok(Vec::new())
        }

        async fn query_recent_contacts(&self, _: &str) -> Result<Vec<RecentContact>, sqlx::Error> {
            // Anyone who has exchanged a row knows only u1.
            if self.rows.lock().unwrap().is_empty() {
                return Ok(Vec::new());
            }
            Ok(vec![RecentContact {
                id: "u1".into(),
                first_name: "Ada".into(),
                last_name: "Lovelace".into(),
                last_message_at: None,
            }])
        }

        async fn user_exists(&self, _: &str) -> Result<bool, sqlx::Error> {
            Ok(true)
        }
    }

    fn message(kind: Option<FrameKind>, to: &str, content: &str) -> Message {
        Message {
            id: Uuid::new_v4(),
            kind,
            from: "u1".into(),
            to: to.into(),
            content: content.into(),
            timestamp: "2024-01-01T00:00:00.000Z".into(),
            is_typing: kind == Some(FrameKind::Typing),
        }
    }

    fn pipeline() -> (Arc<RecordingStore>, ConnectionRegistry, MessagePipeline, PipelineWorker) {
        let store = Arc::new(RecordingStore::default());
        let registry = ConnectionRegistry::new();
        let presence = PresenceResolver::new(store.clone(), registry.clone());
        let (pipeline, worker) = MessagePipeline::new(store.clone(), registry.clone(), presence);
        (store, registry, pipeline, worker)
    }

    #[tokio::test]
    async fn typing_notice_is_persisted_delivered_and_followed_by_presence() {
        let (store, registry, pipeline, mut worker) = pipeline();
        let (handle, mut rx) = ConnectionHandle::new();
        registry.register("u2", handle).await;

        pipeline
            .submit(message(Some(FrameKind::Typing), "u2", ""))
            .unwrap();
        assert_eq!(worker.process_next().await, Some(DeliveryOutcome::Delivered));
        assert_eq!(
            *store.rows.lock().unwrap(),
            vec![("u1".to_string(), "u2".to_string(), String::new())]
        );

        let Some(Outbound::Text(text)) = rx.recv().await else {
            panic!("expected typing frame");
        };
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["type"], "typing");
        assert_eq!(value["isTyping"], true);

        let Some(Outbound::Text(text)) = rx.recv().await else {
            panic!("expected presence push");
        };
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["type"], "userlist");
        assert_eq!(value["data"][0]["id"], "u1");
    }

    #[tokio::test]
    async fn worker_stops_when_producers_are_gone() {
        let (_store, _registry, pipeline, mut worker) = pipeline();
        pipeline.submit(message(None, "u9", "bye")).unwrap();
        drop(pipeline);

        assert_eq!(
            worker.process_next().await,
            Some(DeliveryOutcome::RecipientOffline)
        );
        assert_eq!(worker.process_next().await, None);
    }

    #[tokio::test]
    async fn submit_fails_once_worker_is_gone() {
        let (_store, _registry, pipeline, worker) = pipeline();
        drop(worker);
        assert!(matches!(
            pipeline.submit(message(None, "u2", "hi")),
            Err(FrameError::PipelineClosed)
        ));
    }
}
