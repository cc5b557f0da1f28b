use serde_json::json;

use super::Context;
use crate::error::{WorkflowError, WorkflowResult};
use crate::identity::Actor;
use crate::models::{
    parse_schedule, CreateMatchRequest, Match, MatchFilters, MatchStatus, MatchView, MyMatches,
};
use crate::store::{self, Order, Query, Versioned, INVITATIONS, JOIN_REQUESTS, MATCHES};

/// A doubles court holds the creator plus three others.
pub const MAX_PLAYERS_NEEDED: u32 = 3;

#[derive(Clone)]
pub struct MatchService {
    ctx: Context,
}

impl MatchService {
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }

    pub async fn create(
        &self,
        actor: &Actor,
        req: CreateMatchRequest,
    ) -> WorkflowResult<MatchView> {
        let now = self.ctx.clock.now();
        let date_time = parse_schedule(&req.date, &req.time).ok_or_else(|| {
            WorkflowError::validation("Date must be YYYY-MM-DD and time HH:MM")
        })?;
        if date_time < now {
            return Err(WorkflowError::validation("Match cannot be scheduled in the past"));
        }
        if req.players_needed < 1 || req.players_needed > MAX_PLAYERS_NEEDED {
            return Err(WorkflowError::validation(format!(
                "Players needed must be between 1 and {MAX_PLAYERS_NEEDED}"
            )));
        }
        let location = req.location.trim();
        if location.is_empty() {
            return Err(WorkflowError::validation("Location is required"));
        }

        let mut created = Match {
            id: String::new(),
            created_by: actor.id.clone(),
            created_by_name: actor.display_name.clone(),
            date: req.date.trim().to_string(),
            time: req.time.trim().to_string(),
            date_time,
            location: location.to_string(),
            players_needed: req.players_needed,
            skill_preference: req.skill_preference,
            gender_preference: req.gender_preference,
            kind: req.kind,
            participants: Vec::new(),
            created_at: now,
            reminder_sent_at: None,
            rating_request_sent_at: None,
        };
        created.id = self
            .ctx
            .store
            .create(MATCHES, store::to_body(&created)?)
            .await?;

        tracing::info!(match_id = %created.id, user_id = %actor.id, "match created");
        Ok(created.view(now))
    }

    pub(crate) async fn load(&self, match_id: &str) -> WorkflowResult<Versioned<Match>> {
        let doc = self
            .ctx
            .store
            .get(MATCHES, match_id)
            .await?
            .ok_or(WorkflowError::NotFound("Match"))?;
        Ok(store::from_versioned(doc)?)
    }

    pub async fn get(&self, match_id: &str) -> WorkflowResult<MatchView> {
        let m = self.load(match_id).await?.value;
        Ok(m.view(self.ctx.clock.now()))
    }

    async fn all(&self, query: Query) -> WorkflowResult<Vec<Match>> {
        let docs = self.ctx.store.query(MATCHES, &query).await?;
        let mut out = Vec::with_capacity(docs.len());
        for doc in docs {
            out.push(store::from_document(doc)?);
        }
        Ok(out)
    }

    /// Soonest first.
    pub async fn list(&self, filters: &MatchFilters) -> WorkflowResult<Vec<MatchView>> {
        let now = self.ctx.clock.now();
        let matches = self
            .all(Query::new().order_by("dateTime", Order::Asc))
            .await?;
        Ok(matches
            .into_iter()
            .filter(|m| filters.accepts(m, m.status(now)))
            .map(|m| m.view(now))
            .collect())
    }

    /// Matches the actor created or plays in, newest first.
    pub async fn mine(&self, actor: &Actor) -> WorkflowResult<MyMatches> {
        let now = self.ctx.clock.now();
        let matches = self
            .all(Query::new().order_by("dateTime", Order::Desc))
            .await?;

        let (past, upcoming): (Vec<_>, Vec<_>) = matches
            .into_iter()
            .filter(|m| m.created_by == actor.id || m.is_participant(&actor.id))
            .map(|m| m.view(now))
            .partition(|v| v.status == MatchStatus::Completed);
        Ok(MyMatches { upcoming, past })
    }

    /// The actor's own future matches that still have room.
    pub async fn invitable(&self, actor: &Actor) -> WorkflowResult<Vec<MatchView>> {
        let now = self.ctx.clock.now();
        let matches = self
            .all(
                Query::new()
                    .eq("createdBy", actor.id.as_str())
                    .order_by("dateTime", Order::Asc),
            )
            .await?;
        Ok(matches
            .into_iter()
            .map(|m| m.view(now))
            .filter(|v| v.status == MatchStatus::Open)
            .collect())
    }

    /// Direct join from the match list.
    pub async fn join(&self, match_id: &str, actor: &Actor) -> WorkflowResult<MatchView> {
        let m = self.add_participant(match_id, &actor.id).await?;
        Ok(m.view(self.ctx.clock.now()))
    }

    /// Appends `user_id` under compare-and-swap. Played matches are closed;
    /// capacity is re-checked on every attempt.
    pub async fn add_participant(&self, match_id: &str, user_id: &str) -> WorkflowResult<Match> {
        for attempt in 0..=self.ctx.settings.max_conflict_retries {
            let Versioned { value: mut m, version } = self.load(match_id).await?;
            if m.status(self.ctx.clock.now()) == MatchStatus::Completed {
                return Err(WorkflowError::invalid_state("Match has already been played"));
            }
            if m.is_participant(user_id) {
                return Err(WorkflowError::AlreadyParticipant);
            }
            if m.is_full() {
                return Err(WorkflowError::MatchFull);
            }
            m.participants.push(user_id.to_string());

            let patch = json!({ "participants": m.participants });
            if self
                .ctx
                .store
                .update_if_version(MATCHES, match_id, version, patch)
                .await?
            {
                tracing::info!(
                    match_id,
                    user_id,
                    participants = m.participants.len(),
                    "participant added"
                );
                return Ok(m);
            }
            tracing::debug!(match_id, attempt, "participant list changed underneath, retrying");
        }
        Err(WorkflowError::Conflict(format!("match {match_id}")))
    }

    pub async fn leave(&self, match_id: &str, actor: &Actor) -> WorkflowResult<MatchView> {
        let now = self.ctx.clock.now();
        for attempt in 0..=self.ctx.settings.max_conflict_retries {
            let Versioned { value: mut m, version } = self.load(match_id).await?;
            if !m.is_participant(&actor.id) {
                return Err(WorkflowError::NotParticipant);
            }
            if m.status(now) == MatchStatus::Completed {
                return Err(WorkflowError::invalid_state(
                    "Cannot leave a match that has been played",
                ));
            }
            m.participants.retain(|p| p != &actor.id);

            let patch = json!({ "participants": m.participants });
            if self
                .ctx
                .store
                .update_if_version(MATCHES, match_id, version, patch)
                .await?
            {
                tracing::info!(match_id, user_id = %actor.id, "participant left");
                return Ok(m.view(now));
            }
            tracing::debug!(match_id, attempt, "participant list changed underneath, retrying");
        }
        Err(WorkflowError::Conflict(format!("match {match_id}")))
    }

    /// Admin hard delete. Pending invitations and requests go with the match;
    /// answered ones and ratings stay as history.
    pub async fn delete(&self, actor: &Actor, match_id: &str) -> WorkflowResult<()> {
        if !actor.is_admin() {
            return Err(WorkflowError::forbidden("Admin access required"));
        }
        self.load(match_id).await?;

        let mut cascaded = 0;
        for collection in [INVITATIONS, JOIN_REQUESTS] {
            let pending = self
                .ctx
                .store
                .query(
                    collection,
                    &Query::new().eq("matchId", match_id).eq("status", "pending"),
                )
                .await?;
            for doc in pending {
                self.ctx.store.delete(collection, &doc.id).await?;
                cascaded += 1;
            }
        }
        self.ctx.store.delete(MATCHES, match_id).await?;

        tracing::info!(match_id, admin_id = %actor.id, cascaded, "match deleted");
        Ok(())
    }
}
