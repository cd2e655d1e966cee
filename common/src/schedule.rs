//! Rules for editing the race schedule.

use crate::{RaceRecord, RaceUpdate};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RaceUpdateRejection {
    #[error("Race numbers start at 1")]
    InvalidRaceNumber,
    /// Standings key a race's points by season and race number, so a scored
    /// race keeps both.
    #[error("Race #{0} is completed, its season and race number can no longer change")]
    CompletedRaceRenumbered(u32),
}

/// Check an admin edit against the race as currently stored.
///
/// # Errors
/// Rejects race number 0, and any change of season or race number on a
/// completed race. Repeating the current values is allowed.
pub fn check_race_update(
    race: &RaceRecord,
    update: &RaceUpdate,
) -> Result<(), RaceUpdateRejection> {
    if update.race_number == Some(0) {
        return Err(RaceUpdateRejection::InvalidRaceNumber);
    }

    let season_changes = update.season.is_some_and(|s| s != race.season);
    let number_changes = update.race_number.is_some_and(|n| n != race.race_number);
    if race.completed && (season_changes || number_changes) {
        return Err(RaceUpdateRejection::CompletedRaceRenumbered(race.race_id));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn race(completed: bool) -> RaceRecord {
        RaceRecord {
            race_id: 2,
            name: "Pennzoil 400".to_string(),
            track: "Las Vegas Motor Speedway".to_string(),
            race_date: Utc.with_ymd_and_hms(2024, 3, 3, 19, 30, 0).unwrap(),
            season: 2024,
            race_number: 2,
            completed,
        }
    }

    #[test]
    fn test_open_race_can_be_renumbered() {
        let update = RaceUpdate {
            season: Some(2025),
            race_number: Some(7),
            ..RaceUpdate::default()
        };
        assert_eq!(check_race_update(&race(false), &update), Ok(()));
    }

    #[test]
    fn test_completed_race_keeps_its_key() {
        let renumber = RaceUpdate {
            race_number: Some(3),
            ..RaceUpdate::default()
        };
        assert_eq!(
            check_race_update(&race(true), &renumber),
            Err(RaceUpdateRejection::CompletedRaceRenumbered(2))
        );

        let move_season = RaceUpdate {
            season: Some(2025),
            ..RaceUpdate::default()
        };
        assert_eq!(
            check_race_update(&race(true), &move_season),
            Err(RaceUpdateRejection::CompletedRaceRenumbered(2))
        );
    }

    #[test]
    fn test_completed_race_other_edits_allowed() {
        let update = RaceUpdate {
            name: Some("South Point 400".to_string()),
            race_date: Some(Utc.with_ymd_and_hms(2024, 3, 4, 19, 30, 0).unwrap()),
            season: Some(2024),
            race_number: Some(2),
            ..RaceUpdate::default()
        };
        assert_eq!(check_race_update(&race(true), &update), Ok(()));
    }

    #[test]
    fn test_race_number_zero() {
        let update = RaceUpdate {
            race_number: Some(0),
            ..RaceUpdate::default()
        };
        assert_eq!(
            check_race_update(&race(false), &update),
            Err(RaceUpdateRejection::InvalidRaceNumber)
        );
    }
}
