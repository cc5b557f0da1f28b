use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use match_engine::models::{
    CreateMatchRequest, GenderPreference, MatchKind, ProfileUpdate, SkillLevel,
};
use match_engine::services::Dispatcher;
use match_engine::{Actor, FixedClock, MemoryStore, Settings, Workflow};

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub clock: FixedClock,
    pub wf: Workflow,
    pub dispatcher: Dispatcher,
}

/// 2026-10-19 12:00 UTC.
pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap()
}

pub fn setup() -> Harness {
    let store = Arc::new(MemoryStore::new());
    let clock = FixedClock::new(start());
    let settings = Settings {
        notify_backoff: std::time::Duration::from_millis(1),
        ..Settings::default()
    };
    let (wf, dispatcher) = Workflow::new(store.clone(), Arc::new(clock.clone()), settings);
    Harness {
        store,
        clock,
        wf,
        dispatcher,
    }
}

impl Harness {
    /// Registers a player with a complete profile.
    pub async fn player(&self, id: &str, name: &str) -> Actor {
        self.wf
            .players
            .register(id, &format!("{id}@example.com"), name)
            .await
            .expect("register player");
        let actor = Actor::new(id, name);
        self.wf
            .players
            .update_profile(
                &actor,
                ProfileUpdate {
                    city: Some("Madrid".into()),
                    skill_level: Some("intermediate".into()),
                    ..Default::default()
                },
            )
            .await
            .expect("complete profile");
        actor
    }

    /// Creates a doubles match `hours_ahead` from the harness start.
    #[allow(dead_code)]
    pub async fn open_match(
        &self,
        creator: &Actor,
        players_needed: u32,
        hours_ahead: i64,
    ) -> String {
        let at = start() + Duration::hours(hours_ahead);
        self.wf
            .matches
            .create(creator, match_request(at, players_needed))
            .await
            .expect("create match")
            .inner
            .id
    }
}

pub fn match_request(at: DateTime<Utc>, players_needed: u32) -> CreateMatchRequest {
    CreateMatchRequest {
        date: at.format("%Y-%m-%d").to_string(),
        time: at.format("%H:%M").to_string(),
        location: "Club Central".into(),
        players_needed,
        skill_preference: SkillLevel::Any,
        gender_preference: GenderPreference::Any,
        kind: MatchKind::Doubles,
        invite_player_id: None,
    }
}
