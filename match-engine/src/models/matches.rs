use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use super::timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SkillLevel {
    Beginner,
    Intermediate,
    Advanced,
    #[default]
    Any,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GenderPreference {
    Male,
    Female,
    Mixed,
    #[default]
    Any,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    Singles,
    #[default]
    Doubles,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    Open,
    Full,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    pub id: String,
    pub created_by: String,
    pub created_by_name: String,
    pub date: String,
    pub time: String,
    #[serde(with = "timestamp")]
    pub date_time: DateTime<Utc>,
    pub location: String,
    pub players_needed: u32,
    #[serde(default)]
    pub skill_preference: SkillLevel,
    #[serde(default, alias = "gender")]
    pub gender_preference: GenderPreference,
    #[serde(rename = "type", default)]
    pub kind: MatchKind,
    #[serde(default)]
    pub participants: Vec<String>,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(
        default,
        with = "timestamp::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub reminder_sent_at: Option<DateTime<Utc>>,
    #[serde(
        default,
        with = "timestamp::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub rating_request_sent_at: Option<DateTime<Utc>>,
}

/// Status is a function of the schedule and the fill level at `now`, nothing else.
pub fn derive_status(
    scheduled_at: DateTime<Utc>,
    now: DateTime<Utc>,
    participant_count: usize,
    players_needed: u32,
) -> MatchStatus {
    if scheduled_at < now {
        MatchStatus::Completed
    } else if participant_count >= players_needed as usize {
        MatchStatus::Full
    } else {
        MatchStatus::Open
    }
}

impl Match {
    pub fn status(&self, now: DateTime<Utc>) -> MatchStatus {
        derive_status(
            self.date_time,
            now,
            self.participants.len(),
            self.players_needed,
        )
    }

    pub fn is_participant(&self, user_id: &str) -> bool {
        self.participants.iter().any(|p| p == user_id)
    }

    pub fn is_full(&self) -> bool {
        self.participants.len() >= self.players_needed as usize
    }

    pub fn open_slots(&self) -> u32 {
        self.players_needed
            .saturating_sub(self.participants.len() as u32)
    }

    pub fn view(self, now: DateTime<Utc>) -> MatchView {
        MatchView {
            status: self.status(now),
            open_slots: self.open_slots(),
            inner: self,
        }
    }
}

/// What readers see: the stored match plus its status derived at read time.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchView {
    #[serde(flatten)]
    pub inner: Match,
    pub status: MatchStatus,
    pub open_slots: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMatchRequest {
    pub date: String,
    pub time: String,
    pub location: String,
    pub players_needed: u32,
    #[serde(default)]
    pub skill_preference: SkillLevel,
    #[serde(default, alias = "gender")]
    pub gender_preference: GenderPreference,
    #[serde(rename = "type", default)]
    pub kind: MatchKind,
    pub invite_player_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchFilters {
    pub skill_level: Option<SkillLevel>,
    pub location: Option<String>,
    pub status: Option<MatchStatus>,
    pub gender: Option<GenderPreference>,
}

impl MatchFilters {
    pub fn accepts(&self, m: &Match, status: MatchStatus) -> bool {
        if let Some(skill) = self.skill_level {
            if skill != SkillLevel::Any
                && m.skill_preference != skill
                && m.skill_preference != SkillLevel::Any
            {
                return false;
            }
        }
        if let Some(loc) = self.location.as_deref().filter(|l| !l.trim().is_empty()) {
            if !m
                .location
                .to_lowercase()
                .contains(&loc.trim().to_lowercase())
            {
                return false;
            }
        }
        if let Some(wanted) = self.status {
            if wanted != status {
                return false;
            }
        }
        if let Some(gender) = self.gender {
            if gender != GenderPreference::Any
                && m.gender_preference != gender
                && m.gender_preference != GenderPreference::Any
            {
                return false;
            }
        }
        true
    }
}

/// A creator's own matches, split around `now`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MyMatches {
    pub upcoming: Vec<MatchView>,
    pub past: Vec<MatchView>,
}

/// Parses `YYYY-MM-DD` and `HH:MM` (seconds optional) into a UTC instant.
pub fn parse_schedule(date: &str, time: &str) -> Option<DateTime<Utc>> {
    let day = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d").ok()?;
    let clock = NaiveTime::parse_from_str(time.trim(), "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(time.trim(), "%H:%M:%S"))
        .ok()?;
    Some(day.and_time(clock).and_utc())
}
