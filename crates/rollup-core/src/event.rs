//! The event record and its derived time dimensions.
//!
//! Derived fields are pure functions of `ts`; nothing here consults clock
//! state or carries any other hidden input, so two calls with the same `ts`
//! always produce identical derived fields.

use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Low-cardinality event type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
  Serve,
  Impression,
  Click,
  Purchase,
}

impl EventType {
  pub const ALL: [EventType; 4] =
    [EventType::Serve, EventType::Impression, EventType::Click, EventType::Purchase];

  pub fn as_str(&self) -> &'static str {
    match self {
      EventType::Serve => "serve",
      EventType::Impression => "impression",
      EventType::Click => "click",
      EventType::Purchase => "purchase",
    }
  }

  pub fn parse(s: &str) -> Option<Self> {
    match s {
      "serve" => Some(EventType::Serve),
      "impression" => Some(EventType::Impression),
      "click" => Some(EventType::Click),
      "purchase" => Some(EventType::Purchase),
      _ => None,
    }
  }
}

impl fmt::Display for EventType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

/// A raw event row plus its derived time dimensions, ready for the builder's
/// group-by accumulators.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
  pub ts: i64,
  pub event_type: EventType,
  pub auction_id: String,
  pub advertiser_id: i32,
  pub publisher_id: i32,
  pub bid_price: Option<f64>,
  pub user_id: i64,
  pub total_price: Option<f64>,
  pub country: String,

  pub day: String,
  pub hour: u8,
  pub minute: String,
  pub week: String,
}

impl Event {
  /// Build an `Event` from raw fields, computing the derived time dimensions
  /// from `ts` (treated as UTC).
  pub fn from_raw(
    ts: i64,
    event_type: EventType,
    auction_id: String,
    advertiser_id: i32,
    publisher_id: i32,
    bid_price: Option<f64>,
    user_id: i64,
    total_price: Option<f64>,
    country: String,
  ) -> Self {
    let (day, hour, minute, week) = derive_time_dimensions(ts);
    Event {
      ts,
      event_type,
      auction_id,
      advertiser_id,
      publisher_id,
      bid_price,
      user_id,
      total_price,
      country,
      day,
      hour,
      minute,
      week,
    }
  }
}

/// Compute `(day, hour, minute, week)` from a Unix-millisecond timestamp,
/// treating it as UTC. This is the single source of truth for time
/// derivation; the column derivation relation (see [`crate::derivation`])
/// must stay consistent with what this function actually produces.
pub fn derive_time_dimensions(ts_millis: i64) -> (String, u8, String, String) {
  let dt: DateTime<Utc> =
    DateTime::from_timestamp_millis(ts_millis).unwrap_or_else(|| DateTime::from_timestamp(0, 0).unwrap());

  let day = dt.format("%Y-%m-%d").to_string();
  let hour = dt.hour() as u8;
  let minute = dt.format("%Y-%m-%d %H:%M").to_string();

  let iso_week = dt.iso_week();
  let week = format!("{:04}-W{:02}", iso_week.year(), iso_week.week());

  (day, hour, minute, week)
}

/// `day` is a pure prefix of `minute` under the fixed `YYYY-MM-DD HH:MM`
/// encoding; used by the rollup executor to derive `day` from a stored
/// `minute` key instead of re-deriving from `ts`.
pub fn day_from_minute(minute: &str) -> &str {
  &minute[..10]
}

/// `hour` is not derivable from `day` alone, but it IS derivable from
/// `minute` (the `HH` slice at offset 11..13).
pub fn hour_from_minute(minute: &str) -> u8 {
  minute[11..13].parse().expect("minute string has fixed HH:MM suffix")
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_derive_time_dimensions_matches_scenario_seed() {
    // 1717200000000 ms = 2024-06-01T00:00:00Z
    let (day, hour, minute, week) = derive_time_dimensions(1_717_200_000_000);
    assert_eq!(day, "2024-06-01");
    assert_eq!(hour, 0);
    assert_eq!(minute, "2024-06-01 00:00");
    assert_eq!(week, "2024-W22");
  }

  #[test]
  fn test_derive_time_dimensions_second_day() {
    // 1717286400000 ms = 2024-06-02T00:00:00Z
    let (day, hour, minute, _week) = derive_time_dimensions(1_717_286_400_000);
    assert_eq!(day, "2024-06-02");
    assert_eq!(hour, 0);
    assert_eq!(minute, "2024-06-02 00:00");
  }

  #[test]
  fn test_day_from_minute() {
    assert_eq!(day_from_minute("2024-06-01 13:45"), "2024-06-01");
  }

  #[test]
  fn test_hour_from_minute() {
    assert_eq!(hour_from_minute("2024-06-01 13:45"), 13);
  }

  #[test]
  fn test_event_type_round_trip() {
    for t in EventType::ALL {
      assert_eq!(EventType::parse(t.as_str()), Some(t));
    }
  }

  #[test]
  fn test_event_from_raw_fills_derived_fields() {
    let event = Event::from_raw(
      1_717_200_060_000,
      EventType::Impression,
      "auc-1".to_string(),
      1,
      10,
      Some(2.0),
      42,
      None,
      "US".to_string(),
    );
    assert_eq!(event.day, "2024-06-01");
    assert_eq!(event.minute, "2024-06-01 00:01");
    assert_eq!(event.hour, 0);
  }
}
