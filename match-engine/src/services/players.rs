use serde_json::{json, Map, Value};

use super::Context;
use crate::error::{WorkflowError, WorkflowResult};
use crate::identity::Actor;
use crate::models::{
    format_instant, DiscoveryFilters, PlayerCard, ProfileUpdate, Role, UserProfile,
};
use crate::store::{self, Order, Query, USERS};

const SKILL_LEVELS: [&str; 3] = ["beginner", "intermediate", "advanced"];

#[derive(Clone)]
pub struct PlayerDirectory {
    ctx: Context,
}

impl PlayerDirectory {
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }

    /// Writes the profile for a freshly signed-up identity.
    pub async fn register(
        &self,
        user_id: &str,
        email: &str,
        display_name: &str,
    ) -> WorkflowResult<UserProfile> {
        let profile = UserProfile::new(user_id, email, display_name, self.ctx.clock.now());
        self.ctx
            .store
            .put(USERS, user_id, store::to_body(&profile)?)
            .await?;
        tracing::info!(user_id, "profile created");
        Ok(profile)
    }

    pub async fn profile(&self, user_id: &str) -> WorkflowResult<UserProfile> {
        let doc = self
            .ctx
            .store
            .get(USERS, user_id)
            .await?
            .ok_or(WorkflowError::NotFound("Player"))?;
        Ok(store::from_document(doc)?)
    }

    pub async fn card(&self, user_id: &str) -> WorkflowResult<PlayerCard> {
        Ok(self.profile(user_id).await?.into())
    }

    pub async fn update_profile(
        &self,
        actor: &Actor,
        update: ProfileUpdate,
    ) -> WorkflowResult<UserProfile> {
        let mut patch = Map::new();
        if let Some(name) = update.display_name {
            let name = name.trim();
            if name.is_empty() {
                return Err(WorkflowError::validation("Display name cannot be blank"));
            }
            patch.insert("displayName".into(), Value::String(name.to_string()));
        }
        if let Some(skill) = update.skill_level {
            let skill = skill.trim().to_lowercase();
            if !SKILL_LEVELS.contains(&skill.as_str()) {
                return Err(WorkflowError::validation(
                    "Skill level must be beginner, intermediate or advanced",
                ));
            }
            patch.insert("skillLevel".into(), Value::String(skill));
        }
        if let Some(city) = update.city {
            patch.insert("city".into(), Value::String(city.trim().to_string()));
        }
        if let Some(times) = update.available_times {
            patch.insert("availableTimes".into(), json!(times));
        }
        if let Some(gender) = update.gender {
            patch.insert("gender".into(), json!(gender));
        }
        if let Some(pref) = update.gender_preference {
            patch.insert("genderPreference".into(), json!(pref));
        }
        if let Some(whatsapp) = update.whatsapp {
            patch.insert("whatsapp".into(), Value::String(whatsapp.trim().to_string()));
        }

        self.profile(&actor.id).await?;
        patch.insert(
            "updatedAt".into(),
            Value::String(format_instant(self.ctx.clock.now())),
        );
        self.ctx
            .store
            .update(USERS, &actor.id, Value::Object(patch))
            .await?;
        self.profile(&actor.id).await
    }

    /// Complete profiles other than the actor's, by name.
    pub async fn discover(
        &self,
        actor: &Actor,
        filters: &DiscoveryFilters,
    ) -> WorkflowResult<Vec<PlayerCard>> {
        let docs = self
            .ctx
            .store
            .query(USERS, &Query::new().order_by("displayName", Order::Asc))
            .await?;
        let mut out = Vec::new();
        for doc in docs {
            if doc.id == actor.id {
                continue;
            }
            let profile: UserProfile = store::from_document(doc)?;
            if profile.is_discoverable() && filters.accepts(&profile) {
                out.push(profile.into());
            }
        }
        Ok(out)
    }

    pub async fn list_users(&self, actor: &Actor) -> WorkflowResult<Vec<UserProfile>> {
        require_admin(actor)?;
        let docs = self
            .ctx
            .store
            .query(USERS, &Query::new().order_by("createdAt", Order::Desc))
            .await?;
        let mut out = Vec::with_capacity(docs.len());
        for doc in docs {
            out.push(store::from_document(doc)?);
        }
        Ok(out)
    }

    pub async fn set_role(
        &self,
        actor: &Actor,
        user_id: &str,
        role: Role,
    ) -> WorkflowResult<UserProfile> {
        require_admin(actor)?;
        if user_id == actor.id && role != Role::Admin {
            return Err(WorkflowError::validation("Admins cannot demote themselves"));
        }
        self.profile(user_id).await?;
        self.ctx
            .store
            .update(
                USERS,
                user_id,
                json!({
                    "role": role.as_str(),
                    "updatedAt": format_instant(self.ctx.clock.now()),
                }),
            )
            .await?;
        tracing::info!(user_id, admin_id = %actor.id, role = role.as_str(), "role changed");
        self.profile(user_id).await
    }
}

fn require_admin(actor: &Actor) -> WorkflowResult<()> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(WorkflowError::forbidden("Admin access required"))
    }
}
