//! Postgres-backed [`StandingsStore`] and [`PickStore`].

use super::*;
use crate::picks::PickStore;
use crate::standings::StandingsStore;

/// Borrows a connection for the length of one standings update.
/// Open a transaction on the connection first so the update is all-or-nothing.
pub struct PgStandingsStore<'a> {
    conn: &'a mut PgConnection,
}

impl<'a> PgStandingsStore<'a> {
    pub fn new(conn: &'a mut PgConnection) -> Self {
        Self { conn }
    }
}

impl StandingsStore for PgStandingsStore<'_> {
    fn find_race(&mut self, race_id: u32) -> Result<Option<RaceRecord>> {
        get_race_by_id(self.conn, race_id)
    }

    fn find_picks_by_race(&mut self, race_id: u32) -> Result<Vec<PickRecord>> {
        get_picks_by_race(self.conn, race_id)
    }

    fn find_results_by_race(&mut self, race_id: u32) -> Result<Vec<RaceResultRecord>> {
        get_results_by_race(self.conn, race_id)
    }

    fn find_standing(&mut self, user_id: u32, season: u32) -> Result<Option<StandingRecord>> {
        get_standing(self.conn, user_id, season)
    }

    fn upsert_standing(
        &mut self,
        user_id: u32,
        season: u32,
        weekly_points: &WeeklyPoints,
        total_points: u32,
    ) -> Result<()> {
        upsert_standing(self.conn, user_id, season, weekly_points, total_points)
    }
}

/// Borrows a connection for one pick submission, which must run in a
/// transaction: the lead driver row stays locked until it commits.
pub struct PgPickStore<'a> {
    conn: &'a mut PgConnection,
}

impl<'a> PgPickStore<'a> {
    pub fn new(conn: &'a mut PgConnection) -> Self {
        Self { conn }
    }
}

impl PickStore for PgPickStore<'_> {
    fn find_race(&mut self, race_id: u32) -> Result<Option<RaceRecord>> {
        get_race_by_id(self.conn, race_id)
    }

    fn find_driver(&mut self, driver_id: u32) -> Result<Option<DriverRecord>> {
        get_driver_by_id(self.conn, driver_id)
    }

    fn lock_lead_driver(&mut self, user_id: u32, season: u32) -> Result<Option<LeadDriverRecord>> {
        get_lead_driver_for_update(self.conn, user_id, season)
    }

    fn find_pick(&mut self, user_id: u32, race_id: u32) -> Result<Option<PickRecord>> {
        get_pick_for_user_and_race(self.conn, user_id, race_id)
    }

    fn save_pick(&mut self, user_id: u32, submission: &PickSubmission) -> Result<PickRecord> {
        upsert_pick(self.conn, user_id, submission)
    }

    fn set_lead_driver_usage(&mut self, user_id: u32, season: u32, times_used: u32) -> Result<()> {
        set_lead_driver_usage(self.conn, user_id, season, times_used)
    }
}
