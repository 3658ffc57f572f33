//! Records read from the external record store.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{PreferenceId, UserId};

/// Status of a preference session as seen by the record store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreferenceStatus {
    Pending,
    Generating,
    Completed,
    Failed,
}

impl fmt::Display for PreferenceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PreferenceStatus::Pending => "pending",
            PreferenceStatus::Generating => "generating",
            PreferenceStatus::Completed => "completed",
            PreferenceStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: UserId,
    pub name: String,
    pub age: u32,
    pub gender: String,
    pub location: String,
    #[serde(default)]
    pub driving_style: Option<String>,
    #[serde(default)]
    pub fuel_preference: Option<String>,
    #[serde(default)]
    pub budget_sensitivity: Option<String>,
    #[serde(default)]
    pub risk_tolerance: Option<String>,
}

impl UserRecord {
    /// Context line handed to the generator when the caller supplied none.
    pub fn profile_context(&self) -> String {
        let mut context = format!(
            "User: {}, Age: {}, Gender: {}, Location: {}",
            self.name, self.age, self.gender, self.location
        );
        let optional = [
            ("Driving Style", &self.driving_style),
            ("Fuel Preference", &self.fuel_preference),
            ("Budget Sensitivity", &self.budget_sensitivity),
            ("Risk Tolerance", &self.risk_tolerance),
        ];
        for (label, value) in optional {
            if let Some(value) = value.as_deref()
                && !value.is_empty()
            {
                context.push_str(&format!(", {label}: {value}"));
            }
        }
        context
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreferenceRecord {
    pub id: PreferenceId,
    pub user_id: UserId,
    pub status: PreferenceStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
