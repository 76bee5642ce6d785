use crate::error::{ModelError, Result};
use crate::types::{Snapshot, UNKNOWN_TITLE};
use chrono::NaiveDateTime;
use serde_json::Value;

/// Builds a [`Snapshot`] from one upstream details record.
///
/// Absent (or `null`) counters default to 0 and an absent title to
/// [`UNKNOWN_TITLE`]. Counters may arrive as JSON integers, non-negative
/// floats (truncated) or decimal strings.
///
/// # Errors
///
/// Returns [`ModelError::Uncoercible`] when a counter is present but is not a
/// non-negative number, [`ModelError::InvalidTitle`] for a non-string title,
/// and [`ModelError::NotAnObject`] when `details` is not an object.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use serde_json::json;
/// use wstrack_common::normalize;
///
/// let ts = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
/// let snap = normalize(&json!({"subscriptions": "42", "favorited": 3}), ts).unwrap();
/// assert_eq!(snap.title, "unknown");
/// assert_eq!(snap.subscriptions, 42);
/// assert_eq!(snap.favorites, 3);
/// assert_eq!(snap.views, 0);
/// ```
pub fn normalize(details: &Value, observed_at: NaiveDateTime) -> Result<Snapshot> {
    if !details.is_object() {
        return Err(ModelError::NotAnObject(details.to_string()));
    }

    let title = match details.get("title") {
        None | Some(Value::Null) => UNKNOWN_TITLE.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => return Err(ModelError::InvalidTitle(other.to_string())),
    };

    Ok(Snapshot {
        timestamp: observed_at,
        title,
        views: count(details, "views")?,
        subscriptions: count(details, "subscriptions")?,
        favorites: count(details, "favorited")?,
        lifetime_subscriptions: count(details, "lifetime_subscriptions")?,
        lifetime_favorited: count(details, "lifetime_favorited")?,
    })
}

fn count(details: &Value, field: &'static str) -> Result<u64> {
    let uncoercible = |v: &Value| ModelError::Uncoercible {
        field,
        value: v.to_string(),
    };

    match details.get(field) {
        None | Some(Value::Null) => Ok(0),
        Some(v @ Value::Number(n)) => {
            if let Some(u) = n.as_u64() {
                return Ok(u);
            }
            match n.as_f64() {
                Some(f) if f.is_finite() && f >= 0.0 => Ok(f.trunc() as u64),
                _ => Err(uncoercible(v)),
            }
        }
        Some(v @ Value::String(s)) => s.trim().parse::<u64>().map_err(|_| uncoercible(v)),
        Some(other) => Err(uncoercible(other)),
    }
}
