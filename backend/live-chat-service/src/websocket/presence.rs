use super::message_types::PresenceFrame;
use super::ConnectionRegistry;
use crate::metrics;
use crate::models::{ContactStatus, OnlineStatus, RecentContact};
use crate::services::MessageStore;
use std::cmp::Ordering;
use std::sync::Arc;

/// Computes each user's ordered contact list and pushes it to live connections.
#[derive(Clone)]
pub struct PresenceResolver {
    store: Arc<dyn MessageStore>,
    registry: ConnectionRegistry,
}

impl PresenceResolver {
    pub fn new(store: Arc<dyn MessageStore>, registry: ConnectionRegistry) -> Self {
        Self { store, registry }
    }

    /// Contacts of `user_id`, most recent conversation first.
    pub async fn resolve(&self, user_id: &str) -> Result<Vec<ContactStatus>, sqlx::Error> {
        let mut contacts = self.store.query_recent_contacts(user_id).await?;
        sort_contacts(&mut contacts);

        let online = self.registry.online_users().await;
        Ok(contacts
            .into_iter()
            .map(|c| {
                let status = if online.contains(&c.id) {
                    OnlineStatus::Online
                } else {
                    OnlineStatus::Offline
                };
                ContactStatus {
                    id: c.id,
                    firstname: c.first_name,
                    lastname: c.last_name,
                    status,
                }
            })
            .collect())
    }

    /// Pushes a freshly resolved list to every registered connection. Each
    /// recipient gets its own list. Returns the number of successful pushes.
    pub async fn rebroadcast(&self) -> usize {
        let targets = self.registry.snapshot().await;
        let mut pushed = 0;

        for (user_id, handle) in targets {
            let statuses = match self.resolve(&user_id).await {
                Ok(statuses) => statuses,
                Err(e) => {
                    tracing::warn!(user_id = %user_id, error = %e, "failed to resolve presence");
                    continue;
                }
            };

            match handle.send_json(&PresenceFrame::new(&statuses)) {
                Ok(()) => {
                    pushed += 1;
                    metrics::record_presence_push();
                }
                Err(e) => {
                    tracing::warn!(
                        user_id = %user_id,
                        error = %e,
                        "presence push failed, evicting"
                    );
                    self.registry.evict(&user_id, &handle).await;
                }
            }
        }

        tracing::debug!(pushed, "presence rebroadcast complete");
        pushed
    }
}

/// Latest conversation first. Contacts without a timestamp come after those
/// with one. Ties and the timestamp-less tail are ordered by "first last".
pub fn sort_contacts(contacts: &mut [RecentContact]) {
    contacts.sort_by(compare_contacts);
}

fn compare_contacts(a: &RecentContact, b: &RecentContact) -> Ordering {
    b.last_message_at
        .is_some()
        .cmp(&a.last_message_at.is_some())
        .then_with(|| b.last_message_at.cmp(&a.last_message_at))
        .then_with(|| a.full_name().cmp(&b.full_name()))
}
