use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::timestamp;
use super::{GenderPreference, SkillLevel};

/// Shown for players nobody has rated yet.
pub const DEFAULT_RATING: f64 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub skill_level: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub available_times: Vec<String>,
    #[serde(default)]
    pub gender: Option<Gender>,
    #[serde(default)]
    pub gender_preference: Option<GenderPreference>,
    #[serde(default)]
    pub whatsapp: Option<String>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub rating_count: u32,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(
        default,
        with = "timestamp::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_at: Option<DateTime<Utc>>,
}

impl UserProfile {
    pub fn new(id: &str, email: &str, display_name: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: id.to_string(),
            email: email.to_string(),
            display_name: display_name.to_string(),
            role: Role::User,
            skill_level: None,
            city: None,
            available_times: Vec::new(),
            gender: None,
            gender_preference: None,
            whatsapp: None,
            rating: None,
            rating_count: 0,
            created_at: now,
            updated_at: None,
        }
    }

    /// Skill level stored as free text; only the three ladder values count.
    pub fn skill(&self) -> Option<SkillLevel> {
        match self.skill_level.as_deref()? {
            "beginner" => Some(SkillLevel::Beginner),
            "intermediate" => Some(SkillLevel::Intermediate),
            "advanced" => Some(SkillLevel::Advanced),
            _ => None,
        }
    }

    pub fn is_discoverable(&self) -> bool {
        !self.display_name.trim().is_empty()
            && self
                .city
                .as_deref()
                .map(|c| !c.trim().is_empty())
                .unwrap_or(false)
            && self.skill().is_some()
    }
}

/// Public directory entry.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerCard {
    pub id: String,
    pub display_name: String,
    pub skill_level: Option<SkillLevel>,
    pub city: Option<String>,
    pub gender: Option<Gender>,
    pub gender_preference: Option<GenderPreference>,
    pub available_times: Vec<String>,
    pub rating: f64,
    pub rating_count: u32,
}

impl From<UserProfile> for PlayerCard {
    fn from(p: UserProfile) -> Self {
        Self {
            skill_level: p.skill(),
            id: p.id,
            display_name: p.display_name,
            city: p.city,
            gender: p.gender,
            gender_preference: p.gender_preference,
            available_times: p.available_times,
            rating: p.rating.unwrap_or(DEFAULT_RATING),
            rating_count: p.rating_count,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub display_name: Option<String>,
    pub skill_level: Option<String>,
    pub city: Option<String>,
    pub available_times: Option<Vec<String>>,
    pub gender: Option<Gender>,
    pub gender_preference: Option<GenderPreference>,
    pub whatsapp: Option<String>,
}

/// Discovery type filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerType {
    Male,
    Female,
    Mixed,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryFilters {
    pub skill_level: Option<SkillLevel>,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub player_type: Option<PlayerType>,
}

impl DiscoveryFilters {
    pub fn accepts(&self, p: &UserProfile) -> bool {
        if let Some(skill) = self.skill_level.filter(|s| *s != SkillLevel::Any) {
            if p.skill() != Some(skill) {
                return false;
            }
        }
        if let Some(name) = self.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            if !p
                .display_name
                .to_lowercase()
                .contains(&name.to_lowercase())
            {
                return false;
            }
        }
        match self.player_type {
            Some(PlayerType::Male) => p.gender == Some(Gender::Male),
            Some(PlayerType::Female) => p.gender == Some(Gender::Female),
            Some(PlayerType::Mixed) => matches!(
                p.gender_preference,
                Some(GenderPreference::Mixed) | Some(GenderPreference::Any)
            ),
            None => true,
        }
    }
}
