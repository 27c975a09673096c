use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientStatus {
    Active,
    Paused,
    Inactive,
    Churned,
}

impl ClientStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientStatus::Active => "active",
            ClientStatus::Paused => "paused",
            ClientStatus::Inactive => "inactive",
            ClientStatus::Churned => "churned",
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, ClientStatus::Active)
    }
}

impl FromStr for ClientStatus {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(ClientStatus::Active),
            "paused" => Ok(ClientStatus::Paused),
            "inactive" => Ok(ClientStatus::Inactive),
            "churned" => Ok(ClientStatus::Churned),
            other => Err(ValidationError::UnknownClientStatus(other.to_string())),
        }
    }
}

impl fmt::Display for ClientStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Workload weight one client contributes to their coach, as last computed
/// by the allocation process.
#[derive(Debug, Clone)]
pub struct ClientUnit {
    pub client_id: Uuid,
    pub coach_id: Uuid,
    pub calculated_units: f64,
    pub status: ClientStatus,
    pub calculated_at: DateTime<Utc>,
}

/// The unit weight and client status the capacity sum looks at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitEntry {
    pub units: f64,
    pub client_status: ClientStatus,
}

/// Per-coach capacity ceiling. `UseDefault` defers to the process-wide
/// default passed into the engine on each call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "units")]
pub enum CapacityCeiling {
    Explicit(f64),
    UseDefault,
}

impl CapacityCeiling {
    /// Builds an explicit ceiling from user input. Anything below one unit is
    /// rejected here; the engine itself accepts any value.
    pub fn explicit(units: f64) -> Result<Self, ValidationError> {
        if !units.is_finite() || units < 1.0 {
            return Err(ValidationError::CapacityTooSmall(units));
        }
        Ok(CapacityCeiling::Explicit(units))
    }

    pub fn resolve(&self, global_default: f64) -> f64 {
        match self {
            CapacityCeiling::Explicit(units) => *units,
            CapacityCeiling::UseDefault => global_default,
        }
    }
}

impl From<Option<f64>> for CapacityCeiling {
    fn from(value: Option<f64>) -> Self {
        match value {
            Some(units) => CapacityCeiling::Explicit(units),
            None => CapacityCeiling::UseDefault,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapacityState {
    pub current_units: f64,
    pub max_capacity: f64,
    pub effective_capacity: f64,
    pub available_units: f64,
    pub is_paused: bool,
    pub utilization_percentage: i64,
    pub is_over_capacity: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UtilizationLevel {
    Available,
    NearCapacity,
    AtCapacity,
    OverCapacity,
    Paused,
}

impl UtilizationLevel {
    pub fn label(&self) -> &'static str {
        match self {
            UtilizationLevel::Available => "Available",
            UtilizationLevel::NearCapacity => "Near capacity",
            UtilizationLevel::AtCapacity => "At capacity",
            UtilizationLevel::OverCapacity => "Over capacity",
            UtilizationLevel::Paused => "Paused",
        }
    }
}

impl fmt::Display for UtilizationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone)]
pub struct CoachRecord {
    pub coach_id: Uuid,
    pub coach_name: String,
    pub coach_email: String,
    pub ceiling: CapacityCeiling,
    pub is_paused: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoachCapacity {
    pub coach_id: Uuid,
    pub coach_name: String,
    pub coach_email: String,
    pub active_clients: usize,
    pub level: UtilizationLevel,
    pub state: CapacityState,
}

/// A satisfaction score on the 0-10 scale. Construction rejects anything
/// outside that range, so the NPS engine never sees a malformed score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(into = "u8")]
pub struct NpsScore(u8);

impl NpsScore {
    pub const MAX: u8 = 10;

    pub fn new(value: i32) -> Result<Self, ValidationError> {
        Self::try_from(value)
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl TryFrom<i32> for NpsScore {
    type Error = ValidationError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        if (0..=Self::MAX as i32).contains(&value) {
            Ok(NpsScore(value as u8))
        } else {
            Err(ValidationError::ScoreOutOfRange(value))
        }
    }
}

impl From<NpsScore> for u8 {
    fn from(score: NpsScore) -> Self {
        score.0
    }
}

#[derive(Debug, Clone)]
pub struct NpsResponse {
    pub response_id: Uuid,
    pub client_name: String,
    pub coach_id: Option<Uuid>,
    pub coach_name: Option<String>,
    pub score: NpsScore,
    pub comment: Option<String>,
    pub responded_at: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NpsCategory {
    Detractor,
    Passive,
    Promoter,
}

impl fmt::Display for NpsCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            NpsCategory::Detractor => "detractor",
            NpsCategory::Passive => "passive",
            NpsCategory::Promoter => "promoter",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NpsDistribution {
    pub detractors: u64,
    pub passives: u64,
    pub promoters: u64,
}

impl NpsDistribution {
    pub fn total(&self) -> u64 {
        self.detractors + self.passives + self.promoters
    }

    pub fn record(&mut self, category: NpsCategory) {
        match category {
            NpsCategory::Detractor => self.detractors += 1,
            NpsCategory::Passive => self.passives += 1,
            NpsCategory::Promoter => self.promoters += 1,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct NpsPercentages {
    pub detractors: f64,
    pub passives: f64,
    pub promoters: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NpsResult {
    pub score: i32,
    pub distribution: NpsDistribution,
    pub percentages: NpsPercentages,
    pub total_responses: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScoreGrade {
    Excellent,
    Good,
    #[serde(rename = "Needs Improvement")]
    NeedsImprovement,
    Critical,
}

impl fmt::Display for ScoreGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ScoreGrade::Excellent => "Excellent",
            ScoreGrade::Good => "Good",
            ScoreGrade::NeedsImprovement => "Needs Improvement",
            ScoreGrade::Critical => "Critical",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoachNps {
    pub coach_id: Uuid,
    pub coach_name: String,
    pub result: NpsResult,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NpsTrendPoint {
    pub month_start: NaiveDate,
    pub result: NpsResult,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapacityOverview {
    pub coach_count: usize,
    pub active_coaches: usize,
    pub paused_coaches: usize,
    pub over_capacity: usize,
    pub total_units: f64,
    pub total_capacity: f64,
}
