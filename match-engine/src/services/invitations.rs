use serde_json::{json, Value};

use super::{Context, MatchService};
use crate::error::{WorkflowError, WorkflowResult};
use crate::identity::Actor;
use crate::models::{
    format_instant, Invitation, InvitationStatus, MatchStatus, OutgoingNotification, UserProfile,
};
use crate::store::{self, Order, Query, Versioned, INVITATIONS, USERS};

#[derive(Clone)]
pub struct InvitationService {
    ctx: Context,
    matches: MatchService,
}

impl InvitationService {
    pub fn new(ctx: Context, matches: MatchService) -> Self {
        Self { ctx, matches }
    }

    pub async fn send(
        &self,
        actor: &Actor,
        match_id: &str,
        invited_player_id: &str,
    ) -> WorkflowResult<Invitation> {
        if invited_player_id == actor.id {
            return Err(WorkflowError::validation("You cannot invite yourself"));
        }
        let now = self.ctx.clock.now();
        let m = self.matches.load(match_id).await?.value;
        match m.status(now) {
            MatchStatus::Completed => {
                return Err(WorkflowError::invalid_state("Match has already been played"))
            }
            MatchStatus::Full => return Err(WorkflowError::MatchFull),
            MatchStatus::Open => {}
        }
        if m.is_participant(invited_player_id) {
            return Err(WorkflowError::AlreadyParticipant);
        }
        let invited: UserProfile = match self.ctx.store.get(USERS, invited_player_id).await? {
            Some(doc) => store::from_document(doc)?,
            None => return Err(WorkflowError::NotFound("Player")),
        };

        let mut invitation = Invitation {
            id: String::new(),
            match_id: match_id.to_string(),
            invited_by: actor.id.clone(),
            invited_by_name: actor.display_name.clone(),
            invited_player_id: invited_player_id.to_string(),
            invited_player_name: invited.display_name,
            status: InvitationStatus::Pending,
            created_at: now,
            responded_at: None,
        };
        let guard = Query::new()
            .eq("matchId", match_id)
            .eq("invitedPlayerId", invited_player_id)
            .eq("status", InvitationStatus::Pending.as_str());
        invitation.id = self
            .ctx
            .store
            .create_unless_exists(INVITATIONS, &guard, store::to_body(&invitation)?)
            .await?
            .ok_or(WorkflowError::DuplicateInvitation)?;

        tracing::info!(
            invitation_id = %invitation.id,
            match_id,
            invited_player_id,
            "invitation sent"
        );
        self.ctx.outbox.enqueue(OutgoingNotification::match_invitation(
            invited_player_id,
            match_id,
            &invitation.id,
            &m.location,
            &format!("{} {}", m.date, m.time),
            &actor.display_name,
            now,
        ));
        Ok(invitation)
    }

    async fn load(&self, invitation_id: &str) -> WorkflowResult<Versioned<Invitation>> {
        let doc = self
            .ctx
            .store
            .get(INVITATIONS, invitation_id)
            .await?
            .ok_or(WorkflowError::NotFound("Invitation"))?;
        Ok(store::from_versioned(doc)?)
    }

    /// Moves a pending invitation to `to`. Fails with `InvalidState` if it was
    /// already answered, including by a concurrent writer.
    async fn settle(
        &self,
        invitation_id: &str,
        actor: &Actor,
        to: InvitationStatus,
    ) -> WorkflowResult<Invitation> {
        for _ in 0..=self.ctx.settings.max_conflict_retries {
            let Versioned { value: mut inv, version } = self.load(invitation_id).await?;
            if inv.invited_player_id != actor.id {
                return Err(WorkflowError::forbidden(
                    "Only the invited player can answer this invitation",
                ));
            }
            if inv.status != InvitationStatus::Pending {
                return Err(WorkflowError::invalid_state(format!(
                    "Invitation is already {}",
                    inv.status.as_str()
                )));
            }
            let now = self.ctx.clock.now();
            let patch = json!({ "status": to.as_str(), "respondedAt": format_instant(now) });
            if self
                .ctx
                .store
                .update_if_version(INVITATIONS, invitation_id, version, patch)
                .await?
            {
                inv.status = to;
                inv.responded_at = Some(now);
                return Ok(inv);
            }
        }
        Err(WorkflowError::Conflict(format!("invitation {invitation_id}")))
    }

    /// Rewrites the status of an invitation this call already claimed.
    async fn rewrite_status(&self, invitation_id: &str, status: InvitationStatus) {
        let responded_at = match status {
            InvitationStatus::Pending => Value::Null,
            _ => json!(format_instant(self.ctx.clock.now())),
        };
        let patch = json!({ "status": status.as_str(), "respondedAt": responded_at });
        if let Err(e) = self.ctx.store.update(INVITATIONS, invitation_id, patch).await {
            tracing::error!(invitation_id, "could not rewrite invitation status: {e}");
        }
    }

    /// The invitation is claimed first, so only one of two racing answers wins.
    /// A match that filled up or was played meanwhile leaves it `declined`; a
    /// player who is already in leaves it `accepted`. Only transient failures
    /// put it back to `pending`.
    pub async fn accept(&self, invitation_id: &str, actor: &Actor) -> WorkflowResult<Invitation> {
        let inv = self
            .settle(invitation_id, actor, InvitationStatus::Accepted)
            .await?;

        match self.matches.add_participant(&inv.match_id, &actor.id).await {
            Ok(m) => {
                tracing::info!(
                    invitation_id,
                    match_id = %inv.match_id,
                    user_id = %actor.id,
                    "invitation accepted"
                );
                self.ctx.outbox.enqueue(OutgoingNotification::invitation_accepted(
                    &inv.invited_by,
                    &inv.match_id,
                    &inv.id,
                    &m.location,
                    &actor.display_name,
                    self.ctx.clock.now(),
                ));
                Ok(inv)
            }
            Err(e @ (WorkflowError::MatchFull | WorkflowError::InvalidState(_))) => {
                self.rewrite_status(invitation_id, InvitationStatus::Declined)
                    .await;
                tracing::info!(
                    invitation_id,
                    match_id = %inv.match_id,
                    "invitation declined: {e}"
                );
                Err(e)
            }
            Err(WorkflowError::AlreadyParticipant) => {
                tracing::info!(
                    invitation_id,
                    match_id = %inv.match_id,
                    user_id = %actor.id,
                    "invitation closed, player already in the match"
                );
                Err(WorkflowError::AlreadyParticipant)
            }
            Err(e) => {
                self.rewrite_status(invitation_id, InvitationStatus::Pending)
                    .await;
                Err(e)
            }
        }
    }

    pub async fn decline(&self, invitation_id: &str, actor: &Actor) -> WorkflowResult<Invitation> {
        let inv = self
            .settle(invitation_id, actor, InvitationStatus::Declined)
            .await?;
        tracing::info!(
            invitation_id,
            match_id = %inv.match_id,
            user_id = %actor.id,
            "invitation declined"
        );
        Ok(inv)
    }

    /// Newest first.
    pub async fn pending_for(&self, actor: &Actor) -> WorkflowResult<Vec<Invitation>> {
        let docs = self
            .ctx
            .store
            .query(
                INVITATIONS,
                &Query::new()
                    .eq("invitedPlayerId", actor.id.as_str())
                    .eq("status", InvitationStatus::Pending.as_str())
                    .order_by("createdAt", Order::Desc),
            )
            .await?;
        let mut out = Vec::with_capacity(docs.len());
        for doc in docs {
            out.push(store::from_document(doc)?);
        }
        Ok(out)
    }
}
