//! Activity records as stored locally, and the mapping from Strava's
//! summary activity objects into them.
//!
//! Strava omits fields freely (no heart rate strap, no power meter, private
//! gear...), so each optional field is probed on its own and falls back to a
//! default instead of failing the record.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Result, SyncError};

/// Summary activity as returned by `GET /athlete/activities`
///
/// Kept as raw JSON so that missing or oddly typed fields can be handled
/// per field during [`normalize`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StravaActivity(pub Value);

impl StravaActivity {
    /// The activity id if present and numeric, for log context
    pub fn id(&self) -> Option<i64> {
        self.0.get("id").and_then(as_int)
    }

    fn fields(&self) -> Option<&Map<String, Value>> {
        self.0.as_object()
    }
}

impl From<Value> for StravaActivity {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// One activity in the local archive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub id: i64,
    pub name: String,
    /// Local start time, e.g. `2024-01-02T08:15:00Z`
    pub start_date_local: String,
    #[serde(rename = "type")]
    pub activity_type: String,
    /// Meters
    #[serde(default)]
    pub distance: f64,
    /// Seconds
    #[serde(default)]
    pub moving_time: i64,
    /// Seconds
    #[serde(default)]
    pub elapsed_time: i64,

    #[serde(default)]
    pub total_elevation_gain: Option<f64>,
    #[serde(default)]
    pub average_speed: Option<f64>,
    #[serde(default)]
    pub max_speed: Option<f64>,
    #[serde(default)]
    pub average_heartrate: Option<f64>,
    #[serde(default)]
    pub max_heartrate: Option<f64>,
    #[serde(default)]
    pub average_cadence: Option<f64>,
    #[serde(default)]
    pub average_watts: Option<f64>,
    #[serde(default)]
    pub calories: Option<f64>,

    #[serde(default)]
    pub kudos_count: i64,
    #[serde(default)]
    pub achievement_count: i64,
    #[serde(default)]
    pub athlete_count: i64,

    #[serde(default)]
    pub gear_id: Option<String>,
    #[serde(default)]
    pub device_name: Option<String>,

    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub commute: bool,

    /// Keys written by other tools, carried through rewrites untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ActivityRecord {
    /// Record with only the required core set; numeric core fields are zero
    /// and every optional field holds its default.
    pub fn minimal(id: i64, name: String, start_date_local: String, activity_type: String) -> Self {
        Self {
            id,
            name,
            start_date_local,
            activity_type,
            distance: 0.0,
            moving_time: 0,
            elapsed_time: 0,
            total_elevation_gain: None,
            average_speed: None,
            max_speed: None,
            average_heartrate: None,
            max_heartrate: None,
            average_cadence: None,
            average_watts: None,
            calories: None,
            kudos_count: 0,
            achievement_count: 0,
            athlete_count: 0,
            gear_id: None,
            device_name: None,
            private: false,
            commute: false,
            extra: Map::new(),
        }
    }
}

/// Map a Strava activity into an [`ActivityRecord`]
///
/// - `id`, `name`, `start_date_local` and `type` are required; if any is
///   missing or unusable the activity is rejected with
///   [`SyncError::RecordConversion`] and the caller skips it.
/// - `distance`, `moving_time` and `elapsed_time` default to zero when
///   absent. If one is present but not numeric the record degrades to
///   [`ActivityRecord::minimal`].
/// - Every other field defaults independently (`null`, `0` or `false`).
pub fn normalize(activity: &StravaActivity) -> Result<ActivityRecord> {
    let id = activity.id();
    let reject = |reason: &str| SyncError::RecordConversion {
        id,
        reason: reason.to_string(),
    };

    let fields = activity.fields().ok_or_else(|| reject("not a JSON object"))?;
    let id = id.ok_or_else(|| reject("missing or non-integer id"))?;
    let name = required_str(fields, "name").ok_or_else(|| reject("missing name"))?;
    let start_date_local = required_str(fields, "start_date_local")
        .ok_or_else(|| reject("missing start_date_local"))?;
    let activity_type = required_str(fields, "type").ok_or_else(|| reject("missing type"))?;

    let mut record = ActivityRecord::minimal(id, name, start_date_local, activity_type);

    let Some((distance, moving_time, elapsed_time)) = core_metrics(fields) else {
        tracing::warn!(
            activity_id = id,
            "Activity has malformed distance or times, keeping core fields only"
        );
        return Ok(record);
    };
    record.distance = distance;
    record.moving_time = moving_time;
    record.elapsed_time = elapsed_time;

    let float = |key: &str| fields.get(key).and_then(as_float);
    record.total_elevation_gain = float("total_elevation_gain");
    record.average_speed = float("average_speed");
    record.max_speed = float("max_speed");
    record.average_heartrate = float("average_heartrate");
    record.max_heartrate = float("max_heartrate");
    record.average_cadence = float("average_cadence");
    record.average_watts = float("average_watts");
    record.calories = float("calories");

    let count = |key: &str| fields.get(key).and_then(as_int).unwrap_or(0);
    record.kudos_count = count("kudos_count");
    record.achievement_count = count("achievement_count");
    record.athlete_count = count("athlete_count");

    let text = |key: &str| fields.get(key).and_then(as_text);
    record.gear_id = text("gear_id");
    record.device_name = text("device_name");

    let flag = |key: &str| fields.get(key).and_then(as_bool).unwrap_or(false);
    record.private = flag("private");
    record.commute = flag("commute");

    Ok(record)
}

fn required_str(fields: &Map<String, Value>, key: &str) -> Option<String> {
    fields.get(key).and_then(as_text)
}

/// Zero when absent or null, `None` when present but not numeric.
fn core_number<T: Default>(
    fields: &Map<String, Value>,
    key: &str,
    convert: fn(&Value) -> Option<T>,
) -> Option<T> {
    match fields.get(key) {
        None | Some(Value::Null) => Some(T::default()),
        Some(value) => convert(value),
    }
}

fn core_metrics(fields: &Map<String, Value>) -> Option<(f64, i64, i64)> {
    Some((
        core_number(fields, "distance", as_float)?,
        core_number(fields, "moving_time", as_int)?,
        core_number(fields, "elapsed_time", as_int)?,
    ))
}

fn as_float(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0),
        _ => None,
    }
}
