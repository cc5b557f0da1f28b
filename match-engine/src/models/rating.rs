use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::timestamp;

pub const MIN_SCORE: u8 = 1;
pub const MAX_SCORE: u8 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingScores {
    pub punctuality: u8,
    pub skills: u8,
    pub behavior: u8,
    pub teamwork: u8,
}

impl RatingScores {
    pub fn all(&self) -> [u8; 4] {
        [self.punctuality, self.skills, self.behavior, self.teamwork]
    }

    pub fn in_range(&self) -> bool {
        self.all()
            .iter()
            .all(|s| (MIN_SCORE..=MAX_SCORE).contains(s))
    }

    pub fn average(&self) -> f64 {
        self.all().iter().map(|s| *s as f64).sum::<f64>() / 4.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rating {
    pub id: String,
    pub rated_by: String,
    pub rated_player: String,
    pub match_id: String,
    #[serde(flatten)]
    pub scores: RatingScores,
    pub average_rating: f64,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRatingRequest {
    pub rated_player_id: String,
    #[serde(flatten)]
    pub scores: RatingScores,
}

/// Running mean after folding one more rating average into `(rating, count)`.
pub fn fold_rating(rating: f64, count: u32, average: f64) -> (f64, u32) {
    if count == 0 {
        (average, 1)
    } else {
        (
            (rating * count as f64 + average) / (count as f64 + 1.0),
            count + 1,
        )
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingSummary {
    pub rating: f64,
    pub rating_count: u32,
}
