pub mod invitations;
pub mod join_requests;
pub mod matches;
pub mod notifications;
pub mod players;
pub mod ratings;
pub mod reminders;

use std::sync::Arc;

use serde::Serialize;

pub use invitations::InvitationService;
pub use join_requests::JoinRequestService;
pub use matches::MatchService;
pub use notifications::{Dispatcher, NotificationService, Outbox};
pub use players::PlayerDirectory;
pub use ratings::RatingService;
pub use reminders::{ReminderSweep, SweepReport};

use crate::clock::Clock;
use crate::error::WorkflowResult;
use crate::identity::Actor;
use crate::models::{CreateMatchRequest, Invitation, MatchView};
use crate::store::DocumentStore;

#[derive(Debug, Clone)]
pub struct Settings {
    /// Compare-and-swap attempts after the first before giving up with `Conflict`.
    pub max_conflict_retries: u32,
    pub reminder_lead: chrono::Duration,
    pub notify_max_attempts: u32,
    pub notify_backoff: std::time::Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_conflict_retries: 5,
            reminder_lead: chrono::Duration::hours(2),
            notify_max_attempts: 5,
            notify_backoff: std::time::Duration::from_millis(200),
        }
    }
}

/// What every service shares.
#[derive(Clone)]
pub struct Context {
    pub store: Arc<dyn DocumentStore>,
    pub clock: Arc<dyn Clock>,
    pub outbox: Outbox,
    pub settings: Settings,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedMatch {
    #[serde(rename = "match")]
    pub created: MatchView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invitation: Option<Invitation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invitation_error: Option<String>,
}

#[derive(Clone)]
pub struct Workflow {
    pub matches: MatchService,
    pub invitations: InvitationService,
    pub requests: JoinRequestService,
    pub ratings: RatingService,
    pub notifications: NotificationService,
    pub players: PlayerDirectory,
    pub reminders: ReminderSweep,
}

impl Workflow {
    /// Wires the services over one store. The returned dispatcher must be
    /// driven (`run` or `deliver_pending`) for notifications to be written.
    pub fn new(
        store: Arc<dyn DocumentStore>,
        clock: Arc<dyn Clock>,
        settings: Settings,
    ) -> (Self, Dispatcher) {
        let (outbox, dispatcher) = notifications::channel(store.clone(), &settings);
        let ctx = Context {
            store,
            clock,
            outbox,
            settings,
        };
        let matches = MatchService::new(ctx.clone());
        let workflow = Self {
            invitations: InvitationService::new(ctx.clone(), matches.clone()),
            requests: JoinRequestService::new(ctx.clone(), matches.clone()),
            ratings: RatingService::new(ctx.clone(), matches.clone()),
            notifications: NotificationService::new(ctx.clone()),
            players: PlayerDirectory::new(ctx.clone()),
            reminders: ReminderSweep::new(ctx),
            matches,
        };
        (workflow, dispatcher)
    }

    /// Creates a match and, if asked, invites one player to it. A failed
    /// invitation is reported alongside the match rather than failing it.
    pub async fn create_match(
        &self,
        actor: &Actor,
        req: CreateMatchRequest,
    ) -> WorkflowResult<CreatedMatch> {
        let invitee = req.invite_player_id.clone().filter(|p| !p.trim().is_empty());
        let created = self.matches.create(actor, req).await?;

        let mut out = CreatedMatch {
            created,
            invitation: None,
            invitation_error: None,
        };
        if let Some(player_id) = invitee {
            match self
                .invitations
                .send(actor, &out.created.inner.id, &player_id)
                .await
            {
                Ok(inv) => out.invitation = Some(inv),
                Err(e) => {
                    tracing::warn!(
                        match_id = %out.created.inner.id,
                        player_id = %player_id,
                        "invitation after match creation failed: {e}"
                    );
                    out.invitation_error = Some(e.to_string());
                }
            }
        }
        Ok(out)
    }
}
