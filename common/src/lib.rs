//! Common types and scoring rules for the pitbox fantasy racing league.

pub mod picks;
pub mod results;
pub mod schedule;
pub mod standings;

#[cfg(feature = "database")]
pub mod db_util;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// How many times a user may double a week's points in one season.
pub const LEAD_DRIVER_MAX_USES: u32 = 6;
/// Multiplier applied to a pick's points when the lead driver is played.
pub const LEAD_DRIVER_MULTIPLIER: u32 = 2;
/// Prefix used for the per-race keys of the weekly points map.
pub const RACE_KEY_PREFIX: &str = "race_";
/// Largest points value accepted for a single driver in one race.
pub const MAX_RESULT_POINTS: u32 = 1_000;
/// Largest finishing position accepted in a results upload.
pub const MAX_FINISHING_POSITION: u32 = 1_000;

/// The two driver tiers. Every pick takes one driver from each.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DriverGroup {
    A,
    B,
}

impl DriverGroup {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            DriverGroup::A => "A",
            DriverGroup::B => "B",
        }
    }
}

impl fmt::Display for DriverGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DriverGroup {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "A" | "a" => Ok(DriverGroup::A),
            "B" | "b" => Ok(DriverGroup::B),
            other => Err(format!("Unknown driver group: {other}")),
        }
    }
}

/// Points earned per race within a season, keyed by race number.
///
/// Serialized as a JSON object with `race_<n>` keys, which is how the
/// standings column has always been stored. Writing a race that is already
/// present replaces its entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<String, u32>",
    into = "BTreeMap<String, u32>"
)]
pub struct WeeklyPoints(BTreeMap<u32, u32>);

impl WeeklyPoints {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the points for a race, replacing any earlier value.
    pub fn set(&mut self, race_number: u32, points: u32) {
        self.0.insert(race_number, points);
    }

    #[must_use]
    pub fn get(&self, race_number: u32) -> Option<u32> {
        self.0.get(&race_number).copied()
    }

    /// Sum over every race in the map, or `None` if it does not fit a `u32`.
    #[must_use]
    pub fn total(&self) -> Option<u32> {
        self.0
            .values()
            .try_fold(0u32, |total, &points| total.checked_add(points))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.0.iter().map(|(race, points)| (*race, *points))
    }
}

impl FromIterator<(u32, u32)> for WeeklyPoints {
    fn from_iter<I: IntoIterator<Item = (u32, u32)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl TryFrom<BTreeMap<String, u32>> for WeeklyPoints {
    type Error = String;

    fn try_from(raw: BTreeMap<String, u32>) -> Result<Self, Self::Error> {
        raw.into_iter()
            .map(|(key, points)| {
                key.strip_prefix(RACE_KEY_PREFIX)
                    .and_then(|n| n.parse::<u32>().ok())
                    .map(|race_number| (race_number, points))
                    .ok_or_else(|| format!("Invalid weekly points key: {key}"))
            })
            .collect()
    }
}

impl From<WeeklyPoints> for BTreeMap<String, u32> {
    fn from(weekly: WeeklyPoints) -> Self {
        weekly
            .0
            .into_iter()
            .map(|(race_number, points)| (format!("{RACE_KEY_PREFIX}{race_number}"), points))
            .collect()
    }
}

/// A league member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub user_id: u32,
    pub email: String,
    pub team_name: String,
    pub is_admin: bool,
}

/// A driver entered for one season. The number is unique within the season.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverRecord {
    pub driver_id: u32,
    pub name: String,
    pub number: String,
    pub group: DriverGroup,
    pub season: u32,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaceRecord {
    pub race_id: u32,
    pub name: String,
    pub track: String,
    pub race_date: DateTime<Utc>,
    pub season: u32,
    pub race_number: u32,
    pub completed: bool,
}

/// A user's driver selection for a single race.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickRecord {
    pub pick_id: u32,
    pub user_id: u32,
    pub race_id: u32,
    pub driver_a_id: u32,
    pub driver_b_id: u32,
    pub is_lead_driver: bool,
    pub submitted_at: DateTime<Utc>,
}

/// One driver's finish in a race.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaceResultRecord {
    pub result_id: u32,
    pub race_id: u32,
    pub driver_id: u32,
    pub position: u32,
    pub points: u32,
}

/// A user's cumulative score for a season.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandingRecord {
    pub user_id: u32,
    pub season: u32,
    pub total_points: u32,
    pub weekly_points: WeeklyPoints,
    pub last_updated: DateTime<Utc>,
}

/// The driver a user nominated as their lead for a season, and how often the
/// doubling has been spent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadDriverRecord {
    pub user_id: u32,
    pub season: u32,
    pub driver_id: u32,
    pub times_used: u32,
}

/// A row of the standings table as shown to users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandingEntry {
    pub rank: u32,
    pub user_id: u32,
    pub team_name: String,
    pub season: u32,
    pub total_points: u32,
    pub weekly_points: WeeklyPoints,
    pub last_updated: DateTime<Utc>,
}

/// A pick together with the team, race and drivers it refers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickDetail {
    #[serde(flatten)]
    pub pick: PickRecord,
    pub team_name: String,
    pub race: RaceRecord,
    pub driver_a: DriverRecord,
    pub driver_b: DriverRecord,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewDriver {
    pub name: String,
    pub number: String,
    pub group: DriverGroup,
    pub season: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DriverUpdate {
    pub name: Option<String>,
    pub number: Option<String>,
    pub group: Option<DriverGroup>,
    pub season: Option<u32>,
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewRace {
    pub name: String,
    pub track: String,
    pub race_date: DateTime<Utc>,
    pub season: u32,
    pub race_number: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RaceUpdate {
    pub name: Option<String>,
    pub track: Option<String>,
    pub race_date: Option<DateTime<Utc>>,
    pub season: Option<u32>,
    pub race_number: Option<u32>,
    pub completed: Option<bool>,
}

/// The body of a pick submission.
#[derive(Debug, Clone, Deserialize)]
pub struct PickSubmission {
    pub race_id: u32,
    pub driver_a_id: u32,
    pub driver_b_id: u32,
    #[serde(default)]
    pub is_lead_driver: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LeadDriverSelection {
    pub season: u32,
    pub driver_id: u32,
}

/// A single uploaded result row, before it has been matched to a driver.
#[derive(Debug, Clone, Deserialize)]
pub struct ResultRow {
    pub driver_number: String,
    #[serde(default)]
    pub driver_name: Option<String>,
    pub position: u32,
    pub points: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResultsUpload {
    pub race_id: u32,
    pub results: Vec<ResultRow>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultsUploadSummary {
    pub race_id: u32,
    pub matched: usize,
    pub unmatched: Vec<String>,
    pub standings_updated: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weekly_points_serialization() {
        let weekly: WeeklyPoints = [(1, 74), (2, 30), (10, 12)].into_iter().collect();
        let value = serde_json::to_value(&weekly).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"race_1": 74, "race_2": 30, "race_10": 12})
        );
        let back: WeeklyPoints = serde_json::from_value(value).unwrap();
        assert_eq!(back, weekly);
    }

    #[test]
    fn test_weekly_points_rejects_bad_keys() {
        let value = serde_json::json!({"week_1": 10});
        assert!(serde_json::from_value::<WeeklyPoints>(value).is_err());
        let value = serde_json::json!({"race_x": 10});
        assert!(serde_json::from_value::<WeeklyPoints>(value).is_err());
    }

    #[test]
    fn test_weekly_points_set_overwrites() {
        let mut weekly = WeeklyPoints::new();
        weekly.set(3, 40);
        weekly.set(3, 22);
        assert_eq!(weekly.len(), 1);
        assert_eq!(weekly.get(3), Some(22));
        assert_eq!(weekly.total(), Some(22));
    }

    #[test]
    fn test_weekly_points_total_overflow() {
        let weekly: WeeklyPoints = [(1, u32::MAX - 5), (2, 5)].into_iter().collect();
        assert_eq!(weekly.total(), Some(u32::MAX));
        let weekly: WeeklyPoints = [(1, u32::MAX - 5), (2, 6)].into_iter().collect();
        assert_eq!(weekly.total(), None);
    }

    #[test]
    fn test_driver_group_parse() {
        assert_eq!("A".parse::<DriverGroup>(), Ok(DriverGroup::A));
        assert_eq!(" b ".parse::<DriverGroup>(), Ok(DriverGroup::B));
        assert!("C".parse::<DriverGroup>().is_err());
        assert_eq!(DriverGroup::B.to_string(), "B");
    }
}
