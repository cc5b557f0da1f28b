use serde_json::{json, Value};

use super::{Context, MatchService};
use crate::error::{WorkflowError, WorkflowResult};
use crate::identity::Actor;
use crate::models::{
    format_instant, IncomingRequest, JoinRequest, Match, MatchStatus, MatchSummary, RequestStatus,
};
use crate::store::{self, Order, Query, Versioned, JOIN_REQUESTS};

#[derive(Clone)]
pub struct JoinRequestService {
    ctx: Context,
    matches: MatchService,
}

impl JoinRequestService {
    pub fn new(ctx: Context, matches: MatchService) -> Self {
        Self { ctx, matches }
    }

    pub async fn request(&self, match_id: &str, actor: &Actor) -> WorkflowResult<JoinRequest> {
        let now = self.ctx.clock.now();
        let m = self.matches.load(match_id).await?.value;
        if m.status(now) == MatchStatus::Completed {
            return Err(WorkflowError::invalid_state("Match has already been played"));
        }
        if m.is_participant(&actor.id) {
            return Err(WorkflowError::AlreadyParticipant);
        }
        if m.is_full() {
            return Err(WorkflowError::MatchFull);
        }
        if m.created_by == actor.id {
            return Err(WorkflowError::validation("You cannot request to join your own match"));
        }

        let mut req = JoinRequest {
            id: String::new(),
            match_id: match_id.to_string(),
            requested_by: actor.id.clone(),
            requested_by_name: actor.display_name.clone(),
            match_creator: m.created_by.clone(),
            status: RequestStatus::Pending,
            created_at: now,
            responded_at: None,
        };
        let guard = Query::new()
            .eq("matchId", match_id)
            .eq("requestedBy", actor.id.as_str())
            .eq("status", RequestStatus::Pending.as_str());
        req.id = self
            .ctx
            .store
            .create_unless_exists(JOIN_REQUESTS, &guard, store::to_body(&req)?)
            .await?
            .ok_or(WorkflowError::DuplicateRequest)?;

        tracing::info!(request_id = %req.id, match_id, user_id = %actor.id, "join request sent");
        Ok(req)
    }

    /// Withdraws every pending request the actor has on the match.
    pub async fn cancel(&self, match_id: &str, actor: &Actor) -> WorkflowResult<usize> {
        let pending = self
            .ctx
            .store
            .query(
                JOIN_REQUESTS,
                &Query::new()
                    .eq("matchId", match_id)
                    .eq("requestedBy", actor.id.as_str())
                    .eq("status", RequestStatus::Pending.as_str()),
            )
            .await?;
        for doc in &pending {
            self.ctx.store.delete(JOIN_REQUESTS, &doc.id).await?;
        }
        tracing::info!(
            match_id,
            user_id = %actor.id,
            removed = pending.len(),
            "join request cancelled"
        );
        Ok(pending.len())
    }

    async fn load(&self, request_id: &str) -> WorkflowResult<Versioned<JoinRequest>> {
        let doc = self
            .ctx
            .store
            .get(JOIN_REQUESTS, request_id)
            .await?
            .ok_or(WorkflowError::NotFound("Join request"))?;
        Ok(store::from_versioned(doc)?)
    }

    /// Creator-side transition out of `pending`.
    async fn settle(
        &self,
        request_id: &str,
        actor: &Actor,
        to: RequestStatus,
    ) -> WorkflowResult<JoinRequest> {
        for _ in 0..=self.ctx.settings.max_conflict_retries {
            let Versioned { value: mut req, version } = self.load(request_id).await?;
            if req.match_creator != actor.id {
                return Err(WorkflowError::forbidden(
                    "Only the match creator can answer join requests",
                ));
            }
            if req.status != RequestStatus::Pending {
                return Err(WorkflowError::invalid_state(format!(
                    "Join request is already {}",
                    req.status.as_str()
                )));
            }
            let now = self.ctx.clock.now();
            let patch = json!({ "status": to.as_str(), "respondedAt": format_instant(now) });
            if self
                .ctx
                .store
                .update_if_version(JOIN_REQUESTS, request_id, version, patch)
                .await?
            {
                req.status = to;
                req.responded_at = Some(now);
                return Ok(req);
            }
        }
        Err(WorkflowError::Conflict(format!("join request {request_id}")))
    }

    async fn rewrite_status(&self, request_id: &str, status: RequestStatus) {
        let responded_at = match status {
            RequestStatus::Pending => Value::Null,
            _ => json!(format_instant(self.ctx.clock.now())),
        };
        let patch = json!({ "status": status.as_str(), "respondedAt": responded_at });
        if let Err(e) = self.ctx.store.update(JOIN_REQUESTS, request_id, patch).await {
            tracing::error!(request_id, "could not rewrite join request status: {e}");
        }
    }

    pub async fn accept(
        &self,
        request_id: &str,
        match_id: &str,
        requester_id: &str,
        actor: &Actor,
    ) -> WorkflowResult<JoinRequest> {
        let current = self.load(request_id).await?.value;
        if current.match_id != match_id || current.requested_by != requester_id {
            return Err(WorkflowError::validation(
                "Join request does not belong to this match and player",
            ));
        }

        let req = self.settle(request_id, actor, RequestStatus::Accepted).await?;
        match self.matches.add_participant(match_id, requester_id).await {
            Ok(_) => {
                tracing::info!(request_id, match_id, requester_id, "join request accepted");
                Ok(req)
            }
            Err(e @ (WorkflowError::MatchFull | WorkflowError::InvalidState(_))) => {
                self.rewrite_status(request_id, RequestStatus::Rejected).await;
                tracing::info!(request_id, match_id, "join request rejected: {e}");
                Err(e)
            }
            Err(WorkflowError::AlreadyParticipant) => {
                tracing::info!(
                    request_id,
                    match_id,
                    requester_id,
                    "join request closed, requester already in the match"
                );
                Err(WorkflowError::AlreadyParticipant)
            }
            Err(e) => {
                self.rewrite_status(request_id, RequestStatus::Pending).await;
                Err(e)
            }
        }
    }

    pub async fn reject(&self, request_id: &str, actor: &Actor) -> WorkflowResult<JoinRequest> {
        let req = self.settle(request_id, actor, RequestStatus::Rejected).await?;
        tracing::info!(request_id, match_id = %req.match_id, "join request rejected");
        Ok(req)
    }

    /// Pending requests on the actor's matches, newest first.
    pub async fn incoming(&self, actor: &Actor) -> WorkflowResult<Vec<IncomingRequest>> {
        let docs = self
            .ctx
            .store
            .query(
                JOIN_REQUESTS,
                &Query::new()
                    .eq("matchCreator", actor.id.as_str())
                    .eq("status", RequestStatus::Pending.as_str())
                    .order_by("createdAt", Order::Desc),
            )
            .await?;

        let mut out = Vec::with_capacity(docs.len());
        for doc in docs {
            let request: JoinRequest = store::from_document(doc)?;
            let match_details = match self.matches.load(&request.match_id).await {
                Ok(v) => Some(summary(&v.value)),
                Err(WorkflowError::NotFound(_)) => None,
                Err(e) => return Err(e),
            };
            out.push(IncomingRequest {
                request,
                match_details,
            });
        }
        Ok(out)
    }

    pub async fn outgoing(&self, actor: &Actor) -> WorkflowResult<Vec<JoinRequest>> {
        let docs = self
            .ctx
            .store
            .query(
                JOIN_REQUESTS,
                &Query::new()
                    .eq("requestedBy", actor.id.as_str())
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

fn summary(m: &Match) -> MatchSummary {
    MatchSummary {
        location: m.location.clone(),
        date: m.date.clone(),
        time: m.time.clone(),
        players_needed: m.players_needed,
        participants: m.participants.len(),
    }
}
