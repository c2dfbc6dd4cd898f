use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::{likes, profiles};

// --- Profile ---

#[derive(Debug, Queryable, Identifiable, Serialize, Deserialize, Clone)]
#[diesel(table_name = profiles)]
pub struct Profile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub display_name: String,
    pub age: i32,
    pub gender: Option<String>,
    pub location_city: Option<String>,
    pub location_region: Option<String>,
    pub bio: Option<String>,
    #[serde(rename = "profile_photo")]
    pub profile_photo_url: Option<String>,
    pub tags: serde_json::Value,
    /// Free-text token or array of tokens; the evaluator resolves it
    /// together with the legacy `preferences.partner_gender` field.
    pub looking_for: Option<serde_json::Value>,
    /// Onboarding preference block: `partner_gender`, `partner_age_range`.
    pub preferences: serde_json::Value,
    pub cloned_voice_id: Option<String>,
    pub cloned_agent_id: Option<String>,
    pub voice_cloning_consent: bool,
    pub onboarding_completed: bool,
    pub agent_ready: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// --- Like ---

#[derive(Debug, Queryable, Identifiable, Serialize, Clone)]
#[diesel(table_name = likes)]
pub struct Like {
    pub id: Uuid,
    pub from_user_id: Uuid,
    pub to_user_id: Uuid,
    pub call_duration_secs: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = likes)]
pub struct NewLike {
    pub from_user_id: Uuid,
    pub to_user_id: Uuid,
    pub call_duration_secs: i32,
}
