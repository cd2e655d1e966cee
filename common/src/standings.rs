//! Recompute season standings after a race's results are in.

use crate::{
    LEAD_DRIVER_MULTIPLIER, PickRecord, RaceRecord, RaceResultRecord, StandingEntry,
    StandingRecord, WeeklyPoints,
};
use anyhow::{Context, Result};
use itertools::Itertools;
use std::collections::HashMap;

/// Everything the standings updater reads and writes.
///
/// The database implementation lives in `db_util::PgStandingsStore`; callers
/// are expected to run the whole update inside one transaction.
pub trait StandingsStore {
    fn find_race(&mut self, race_id: u32) -> Result<Option<RaceRecord>>;

    fn find_picks_by_race(&mut self, race_id: u32) -> Result<Vec<PickRecord>>;

    fn find_results_by_race(&mut self, race_id: u32) -> Result<Vec<RaceResultRecord>>;

    fn find_standing(&mut self, user_id: u32, season: u32) -> Result<Option<StandingRecord>>;

    /// Create or replace the standing for `(user_id, season)`.
    fn upsert_standing(
        &mut self,
        user_id: u32,
        season: u32,
        weekly_points: &WeeklyPoints,
        total_points: u32,
    ) -> Result<()>;
}

/// What a single call to [`update_standings`] touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StandingsUpdate {
    pub race_id: u32,
    pub season: u32,
    pub race_number: u32,
    pub users_updated: usize,
}

/// Index a race's results by driver.
#[must_use]
pub fn points_by_driver(results: &[RaceResultRecord]) -> HashMap<u32, u32> {
    results
        .iter()
        .map(|result| (result.driver_id, result.points))
        .collect()
}

/// Points a pick earned. A driver with no result scores 0.
///
/// # Errors
/// Returns an error if the points do not fit a `u32`.
pub fn week_points(pick: &PickRecord, driver_points: &HashMap<u32, u32>) -> Result<u32> {
    let points_of = |driver_id: u32| driver_points.get(&driver_id).copied().unwrap_or(0);
    let base = points_of(pick.driver_a_id)
        .checked_add(points_of(pick.driver_b_id))
        .with_context(|| format!("Points overflow for pick #{}", pick.pick_id))?;
    if pick.is_lead_driver {
        base.checked_mul(LEAD_DRIVER_MULTIPLIER)
            .with_context(|| format!("Lead driver points overflow for pick #{}", pick.pick_id))
    } else {
        Ok(base)
    }
}

/// Write a race's points into a (possibly new) weekly map.
/// Returns the map together with its freshly summed total.
///
/// # Errors
/// Returns an error if the season total does not fit a `u32`.
pub fn apply_week_points(
    existing: Option<&WeeklyPoints>,
    race_number: u32,
    points: u32,
) -> Result<(WeeklyPoints, u32)> {
    let mut weekly = existing.cloned().unwrap_or_default();
    weekly.set(race_number, points);
    let total = weekly
        .total()
        .with_context(|| format!("Season total overflow after race {race_number}"))?;
    Ok((weekly, total))
}

/// Recompute the standings of every user with a pick for `race_id`.
///
/// Returns `Ok(None)` without writing anything if the race does not exist.
/// Running this twice over the same results leaves the standings unchanged;
/// running it after a correction replaces the race's old entry.
///
/// # Errors
/// Returns an error if any read or write on the store fails, or if a user's
/// points overflow. Nothing is written for the remaining users in that case,
/// so callers should roll back.
pub fn update_standings<S: StandingsStore + ?Sized>(
    store: &mut S,
    race_id: u32,
) -> Result<Option<StandingsUpdate>> {
    let Some(race) = store.find_race(race_id)? else {
        log::warn!("Race #{race_id} not found, standings left unchanged");
        return Ok(None);
    };

    let picks = store.find_picks_by_race(race_id)?;
    let results = store.find_results_by_race(race_id)?;
    let driver_points = points_by_driver(&results);

    for pick in &picks {
        let points = week_points(pick, &driver_points)?;
        let existing = store.find_standing(pick.user_id, race.season)?;
        let (weekly, total) = apply_week_points(
            existing.as_ref().map(|s| &s.weekly_points),
            race.race_number,
            points,
        )?;
        store.upsert_standing(pick.user_id, race.season, &weekly, total)?;
        log::debug!(
            "User #{} scored {points} in race #{race_id}, season total {total}",
            pick.user_id
        );
    }

    log::info!(
        "Updated {} standings for season {} race {}",
        picks.len(),
        race.season,
        race.race_number
    );

    Ok(Some(StandingsUpdate {
        race_id,
        season: race.season,
        race_number: race.race_number,
        users_updated: picks.len(),
    }))
}

/// Order standings for display: highest total first, team name breaking ties
/// for ordering only. Equal totals share a rank (1, 2, 2, 4).
#[must_use]
pub fn rank_standings(standings: Vec<(StandingRecord, String)>) -> Vec<StandingEntry> {
    let sorted = standings
        .into_iter()
        .sorted_by(|(a, a_team), (b, b_team)| {
            b.total_points
                .cmp(&a.total_points)
                .then_with(|| a_team.cmp(b_team))
        })
        .collect::<Vec<_>>();

    let mut ranked = Vec::with_capacity(sorted.len());
    let mut rank = 0;
    let mut previous_total = None;
    for (position, (standing, team_name)) in sorted.into_iter().enumerate() {
        if previous_total != Some(standing.total_points) {
            rank = u32::try_from(position + 1).unwrap_or(u32::MAX);
            previous_total = Some(standing.total_points);
        }
        ranked.push(StandingEntry {
            rank,
            user_id: standing.user_id,
            team_name,
            season: standing.season,
            total_points: standing.total_points,
            weekly_points: standing.weekly_points,
            last_updated: standing.last_updated,
        });
    }
    ranked
}
