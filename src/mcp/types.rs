use schemars::JsonSchema;
use schemars::transform::RecursiveTransform;
use serde::{Deserialize, Serialize};

use crate::types::{DayCell, Intensity, MonthGrid, UserProfile};

/// Strips non-standard numeric `format` annotations from JSON Schemas.
///
/// `schemars` emits formats like `"uint32"` and `"double"` for Rust numeric
/// types. They are not part of JSON Schema and strict validators such as `ajv`
/// warn about them.
fn strip_non_standard_format(schema: &mut schemars::Schema) {
    let non_standard = schema
        .get("format")
        .and_then(|v| v.as_str())
        .is_some_and(|f| {
            matches!(
                f,
                "uint8"
                    | "int8"
                    | "uint16"
                    | "int16"
                    | "uint32"
                    | "int32"
                    | "uint64"
                    | "int64"
                    | "uint"
                    | "int"
                    | "float"
                    | "double"
            )
        });
    if non_standard {
        schema.remove("format");
    }
}

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct GetMonthGridRequest {
    /// Month to render (YYYY-MM). If omitted, uses the current month.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub month: Option<String>,

    /// User whose sessions fill the grid. If omitted, uses the configured user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
#[schemars(transform = RecursiveTransform(strip_non_standard_format))]
pub struct GetDailyMinutesRequest {
    /// User to report on. If omitted, uses the configured user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    /// Earliest date to include (YYYY-MM-DD).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,

    /// Latest date to include (YYYY-MM-DD).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,

    /// Number of most recent days to return. If omitted, returns all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct StartTrainingRequest {}

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct FinishTrainingRequest {
    /// Session to finish. If omitted, finishes the most recent unfinished session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct ListFollowingRequest {}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Clone, Serialize, JsonSchema)]
#[schemars(transform = RecursiveTransform(strip_non_standard_format))]
pub struct DayCellEntry {
    pub date: String,
    pub minutes: u32,
    pub in_target_month: bool,
    pub intensity: String,
}

impl From<&DayCell> for DayCellEntry {
    fn from(cell: &DayCell) -> Self {
        Self {
            date: cell.date.to_string(),
            minutes: cell.minutes,
            in_target_month: cell.in_target_month,
            intensity: cell.intensity.as_str().to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
#[schemars(transform = RecursiveTransform(strip_non_standard_format))]
pub struct MonthGridResponse {
    pub user: String,
    pub month: String,
    pub label: String,
    /// Six weeks of seven days, Sunday first.
    pub weeks: Vec<Vec<DayCellEntry>>,
    pub total_minutes: u64,
    pub active_days: u32,
}

impl MonthGridResponse {
    pub fn new(user: &str, grid: &MonthGrid) -> Self {
        let in_month = || grid.cells().filter(|c| c.in_target_month);
        Self {
            user: user.to_string(),
            month: grid.month.to_string(),
            label: grid.month.label(),
            weeks: grid
                .weeks
                .iter()
                .map(|week| week.iter().map(DayCellEntry::from).collect())
                .collect(),
            total_minutes: grid.target_month_minutes(),
            active_days: in_month().filter(|c| c.minutes > 0).count() as u32,
        }
    }
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
#[schemars(transform = RecursiveTransform(strip_non_standard_format))]
pub struct DailyMinutesEntry {
    pub date: String,
    pub minutes: u32,
    pub intensity: String,
}

impl DailyMinutesEntry {
    pub fn new(date: chrono::NaiveDate, minutes: u32) -> Self {
        Self {
            date: date.to_string(),
            minutes,
            intensity: Intensity::from_minutes(minutes).as_str().to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
#[schemars(transform = RecursiveTransform(strip_non_standard_format))]
pub struct DailyMinutesResponse {
    pub user: String,
    /// Most recent first.
    pub results: Vec<DailyMinutesEntry>,
    pub total_minutes: u64,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct StartTrainingResponse {
    pub session_id: String,
    pub start_time: String,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
#[schemars(transform = RecursiveTransform(strip_non_standard_format))]
pub struct FinishTrainingResponse {
    pub session_id: String,
    pub end_time: String,
    pub duration_minutes: i64,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct FollowingEntry {
    pub user_id: String,
    pub name: String,
    pub place: String,
    pub profile_color: String,
}

impl From<&UserProfile> for FollowingEntry {
    fn from(profile: &UserProfile) -> Self {
        Self {
            user_id: profile.user_id.to_string(),
            name: profile.display_name().to_string(),
            place: profile.display_place().to_string(),
            profile_color: profile.color().as_str().to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct FollowingResponse {
    pub users: Vec<FollowingEntry>,
}
