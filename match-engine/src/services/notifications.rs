use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde_json::json;
use tokio::sync::mpsc;

use super::{Context, Settings};
use crate::error::{WorkflowError, WorkflowResult};
use crate::identity::Actor;
use crate::models::{
    format_instant, Notification, NotificationCategory, NotificationList, OutgoingNotification,
};
use crate::store::{self, DocumentStore, Order, Query, NOTIFICATIONS};

const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Sending half of the notification outbox. Enqueueing never fails the caller.
#[derive(Clone)]
pub struct Outbox {
    tx: mpsc::UnboundedSender<OutgoingNotification>,
}

impl Outbox {
    pub fn enqueue(&self, notification: OutgoingNotification) {
        let user_id = notification.user_id.clone();
        let kind = notification.kind;
        if self.tx.send(notification).is_err() {
            tracing::error!(
                user_id = %user_id,
                kind = kind.as_str(),
                "notification outbox closed, dropping notification"
            );
        }
    }
}

/// Drains the outbox into the `notifications` collection.
pub struct Dispatcher {
    rx: mpsc::UnboundedReceiver<OutgoingNotification>,
    store: Arc<dyn DocumentStore>,
    max_attempts: u32,
    backoff: Duration,
}

pub(crate) fn channel(store: Arc<dyn DocumentStore>, settings: &Settings) -> (Outbox, Dispatcher) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        Outbox { tx },
        Dispatcher {
            rx,
            store,
            max_attempts: settings.notify_max_attempts.max(1),
            backoff: settings.notify_backoff,
        },
    )
}

/// Delay before retry number `attempt` (1-based): doubling from `base`,
/// capped, plus up to half of `base` in jitter.
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let exp = base.saturating_mul(1u32 << attempt.saturating_sub(1).min(16));
    let capped = exp.min(MAX_BACKOFF);
    let jitter_ms = (base.as_millis() / 2) as u64;
    let jitter = if jitter_ms == 0 {
        0
    } else {
        rand::thread_rng().gen_range(0..=jitter_ms)
    };
    capped + Duration::from_millis(jitter)
}

impl Dispatcher {
    /// Runs until every `Outbox` handle is dropped.
    pub async fn run(mut self) {
        tracing::info!("notification dispatcher started");
        while let Some(notification) = self.rx.recv().await {
            self.deliver(notification).await;
        }
        tracing::info!("notification dispatcher stopped");
    }

    /// Delivers whatever is queued right now. Returns how many were written.
    pub async fn deliver_pending(&mut self) -> usize {
        let mut written = 0;
        while let Ok(notification) = self.rx.try_recv() {
            if self.deliver(notification).await {
                written += 1;
            }
        }
        written
    }

    async fn deliver(&self, notification: OutgoingNotification) -> bool {
        let user_id = notification.user_id.clone();
        let kind = notification.kind;
        let body = match store::to_body(&notification.into_record()) {
            Ok(body) => body,
            Err(e) => {
                tracing::error!(user_id = %user_id, "could not encode notification: {e}");
                return false;
            }
        };

        for attempt in 1..=self.max_attempts {
            match self.store.create(NOTIFICATIONS, body.clone()).await {
                Ok(id) => {
                    tracing::debug!(
                        notification_id = %id,
                        user_id = %user_id,
                        kind = kind.as_str(),
                        "notification delivered"
                    );
                    return true;
                }
                Err(e) if attempt < self.max_attempts => {
                    let delay = backoff_delay(self.backoff, attempt);
                    tracing::warn!(
                        user_id = %user_id,
                        attempt,
                        "notification write failed, retrying in {delay:?}: {e}"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    tracing::error!(
                        user_id = %user_id,
                        kind = kind.as_str(),
                        attempts = self.max_attempts,
                        "dropping notification: {e}"
                    );
                }
            }
        }
        false
    }
}

#[derive(Clone)]
pub struct NotificationService {
    ctx: Context,
}

impl NotificationService {
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }

    pub fn notify(&self, notification: OutgoingNotification) {
        self.ctx.outbox.enqueue(notification);
    }

    /// Newest first. The unread count covers the whole inbox, not just the category.
    pub async fn list(
        &self,
        actor: &Actor,
        category: Option<NotificationCategory>,
    ) -> WorkflowResult<NotificationList> {
        let docs = self
            .ctx
            .store
            .query(
                NOTIFICATIONS,
                &Query::new()
                    .eq("userId", actor.id.as_str())
                    .order_by("createdAt", Order::Desc),
            )
            .await?;

        let mut notifications = Vec::with_capacity(docs.len());
        for doc in docs {
            notifications.push(store::from_document::<Notification>(doc)?);
        }
        let unread_count = notifications.iter().filter(|n| !n.read).count();
        if let Some(category) = category {
            notifications.retain(|n| n.kind.category() == category);
        }
        Ok(NotificationList {
            notifications,
            unread_count,
        })
    }

    async fn load_owned(&self, id: &str, actor: &Actor) -> WorkflowResult<Notification> {
        let doc = self
            .ctx
            .store
            .get(NOTIFICATIONS, id)
            .await?
            .ok_or(WorkflowError::NotFound("Notification"))?;
        let notification: Notification = store::from_document(doc)?;
        if notification.user_id != actor.id {
            return Err(WorkflowError::forbidden(
                "Only the recipient can change this notification",
            ));
        }
        Ok(notification)
    }

    pub async fn mark_read(&self, id: &str, actor: &Actor) -> WorkflowResult<()> {
        let notification = self.load_owned(id, actor).await?;
        if notification.read {
            return Ok(());
        }
        let now = format_instant(self.ctx.clock.now());
        self.ctx
            .store
            .update(NOTIFICATIONS, id, json!({ "read": true, "readAt": now }))
            .await?;
        Ok(())
    }

    pub async fn mark_all_read(&self, actor: &Actor) -> WorkflowResult<usize> {
        let unread = self
            .ctx
            .store
            .query(
                NOTIFICATIONS,
                &Query::new()
                    .eq("userId", actor.id.as_str())
                    .eq("read", false),
            )
            .await?;
        let now = format_instant(self.ctx.clock.now());
        for doc in &unread {
            self.ctx
                .store
                .update(NOTIFICATIONS, &doc.id, json!({ "read": true, "readAt": now }))
                .await?;
        }
        Ok(unread.len())
    }

    pub async fn delete(&self, id: &str, actor: &Actor) -> WorkflowResult<()> {
        self.load_owned(id, actor).await?;
        self.ctx.store.delete(NOTIFICATIONS, id).await?;
        Ok(())
    }
}
