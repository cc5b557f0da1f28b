use serde_json::json;

use super::{Context, MatchService};
use crate::error::{WorkflowError, WorkflowResult};
use crate::identity::Actor;
use crate::models::{
    fold_rating, MatchStatus, Rating, RatingSummary, SubmitRatingRequest, UserProfile,
    DEFAULT_RATING,
};
use crate::store::{self, Order, Query, Versioned, RATINGS, USERS};

#[derive(Clone)]
pub struct RatingService {
    ctx: Context,
    matches: MatchService,
}

impl RatingService {
    pub fn new(ctx: Context, matches: MatchService) -> Self {
        Self { ctx, matches }
    }

    pub async fn submit(
        &self,
        match_id: &str,
        actor: &Actor,
        req: SubmitRatingRequest,
    ) -> WorkflowResult<Rating> {
        if !req.scores.in_range() {
            return Err(WorkflowError::validation("Every score must be between 1 and 5"));
        }
        if req.rated_player_id == actor.id {
            return Err(WorkflowError::validation("You cannot rate yourself"));
        }
        let now = self.ctx.clock.now();
        let m = self.matches.load(match_id).await?.value;
        if m.status(now) != MatchStatus::Completed {
            return Err(WorkflowError::validation(
                "Players can be rated once the match has been played",
            ));
        }
        if !m.is_participant(&actor.id) {
            return Err(WorkflowError::validation("Only participants can rate players"));
        }
        if !m.is_participant(&req.rated_player_id) {
            return Err(WorkflowError::validation(
                "Rated player did not take part in this match",
            ));
        }
        if self.ctx.store.get(USERS, &req.rated_player_id).await?.is_none() {
            return Err(WorkflowError::NotFound("Player"));
        }

        let earlier = self
            .ctx
            .store
            .query(
                RATINGS,
                &Query::new()
                    .eq("matchId", match_id)
                    .eq("ratedBy", actor.id.as_str())
                    .eq("ratedPlayer", req.rated_player_id.as_str())
                    .limit(1),
            )
            .await?;
        if !earlier.is_empty() {
            tracing::warn!(
                match_id,
                rated_by = %actor.id,
                rated_player = %req.rated_player_id,
                "player rated twice for the same match"
            );
        }

        let mut rating = Rating {
            id: String::new(),
            rated_by: actor.id.clone(),
            rated_player: req.rated_player_id.clone(),
            match_id: match_id.to_string(),
            scores: req.scores,
            average_rating: req.scores.average(),
            created_at: now,
        };
        rating.id = self
            .ctx
            .store
            .create(RATINGS, store::to_body(&rating)?)
            .await?;

        if let Err(e) = self
            .fold_into_profile(&rating.rated_player, rating.average_rating)
            .await
        {
            // A rating the aggregate never counted must not stay listed.
            if let Err(rollback) = self.ctx.store.delete(RATINGS, &rating.id).await {
                tracing::error!(
                    rating_id = %rating.id,
                    error = %rollback,
                    "could not remove rating after aggregate update failed"
                );
            }
            return Err(e);
        }
        tracing::info!(
            rating_id = %rating.id,
            match_id,
            rated_player = %rating.rated_player,
            average = rating.average_rating,
            "rating submitted"
        );
        Ok(rating)
    }

    async fn fold_into_profile(
        &self,
        player_id: &str,
        average: f64,
    ) -> WorkflowResult<RatingSummary> {
        for attempt in 0..=self.ctx.settings.max_conflict_retries {
            let doc = self
                .ctx
                .store
                .get(USERS, player_id)
                .await?
                .ok_or(WorkflowError::NotFound("Player"))?;
            let Versioned {
                value: profile,
                version,
            } = store::from_versioned::<UserProfile>(doc)?;

            let (rating, rating_count) = fold_rating(
                profile.rating.unwrap_or(0.0),
                profile.rating_count,
                average,
            );
            let patch = json!({ "rating": rating, "ratingCount": rating_count });
            if self
                .ctx
                .store
                .update_if_version(USERS, player_id, version, patch)
                .await?
            {
                return Ok(RatingSummary {
                    rating,
                    rating_count,
                });
            }
            tracing::debug!(player_id, attempt, "rating aggregate changed underneath, retrying");
        }
        tracing::error!(player_id, "rating aggregate update kept conflicting");
        Err(WorkflowError::Conflict(format!("rating aggregate of {player_id}")))
    }

    /// Newest first.
    pub async fn ratings_for(&self, player_id: &str) -> WorkflowResult<Vec<Rating>> {
        let docs = self
            .ctx
            .store
            .query(
                RATINGS,
                &Query::new()
                    .eq("ratedPlayer", player_id)
                    .order_by("createdAt", Order::Desc),
            )
            .await?;
        let mut out = Vec::with_capacity(docs.len());
        for doc in docs {
            out.push(store::from_document(doc)?);
        }
        Ok(out)
    }

    pub async fn summary(&self, player_id: &str) -> WorkflowResult<RatingSummary> {
        let doc = self
            .ctx
            .store
            .get(USERS, player_id)
            .await?
            .ok_or(WorkflowError::NotFound("Player"))?;
        let profile: UserProfile = store::from_document(doc)?;
        Ok(RatingSummary {
            rating: profile.rating.unwrap_or(DEFAULT_RATING),
            rating_count: profile.rating_count,
        })
    }
}
