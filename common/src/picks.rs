//! Rules applied when a user submits or changes a pick.

use crate::{
    DriverGroup, DriverRecord, LEAD_DRIVER_MAX_USES, LeadDriverRecord, PickDetail, PickRecord,
    PickSubmission, RaceRecord, UserRecord,
};
use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use thiserror::Error;

/// Why a pick was refused. Each of these is the user's mistake, not a server fault.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PickRejection {
    #[error("Race #{0} is already completed")]
    RaceCompleted(u32),
    #[error("Deadline has passed ({0})")]
    DeadlinePassed(DateTime<Utc>),
    #[error("Driver #{0} does not exist")]
    UnknownDriver(u32),
    #[error("Driver #{driver_id} is in group {actual}, expected group {expected}")]
    WrongGroup {
        driver_id: u32,
        expected: DriverGroup,
        actual: DriverGroup,
    },
    #[error("Driver #{driver_id} is not entered in season {season}")]
    WrongSeason { driver_id: u32, season: u32 },
    #[error("Driver #{0} is not active")]
    InactiveDriver(u32),
    #[error("No lead driver selected")]
    NoLeadDriver,
    #[error("Lead driver limit reached")]
    LeadDriverLimitReached,
}

/// Picks close at midnight (UTC) at the start of race day.
#[must_use]
pub fn pick_deadline(race: &RaceRecord) -> DateTime<Utc> {
    race.race_date
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .map_or(race.race_date, |midnight| midnight.and_utc())
}

/// Change to apply to a user's lead driver counter when `previous` is
/// replaced by a pick with `is_lead_driver`.
/// Resubmitting a lead pick costs nothing; withdrawing one refunds it.
#[must_use]
pub fn lead_driver_usage_delta(previous: Option<&PickRecord>, is_lead_driver: bool) -> i32 {
    let was_lead = previous.is_some_and(|p| p.is_lead_driver);
    i32::from(is_lead_driver) - i32::from(was_lead)
}

fn check_driver(
    driver_id: u32,
    driver: Option<&DriverRecord>,
    expected: DriverGroup,
    season: u32,
) -> Result<(), PickRejection> {
    let driver = driver.ok_or(PickRejection::UnknownDriver(driver_id))?;
    if driver.season != season {
        return Err(PickRejection::WrongSeason { driver_id, season });
    }
    if driver.group != expected {
        return Err(PickRejection::WrongGroup {
            driver_id,
            expected,
            actual: driver.group,
        });
    }
    if !driver.active {
        return Err(PickRejection::InactiveDriver(driver_id));
    }
    Ok(())
}

/// Everything needed to judge a pick submission.
#[derive(Debug, Clone)]
pub struct PickContext<'a> {
    pub now: DateTime<Utc>,
    pub race: &'a RaceRecord,
    pub driver_a_id: u32,
    pub driver_a: Option<&'a DriverRecord>,
    pub driver_b_id: u32,
    pub driver_b: Option<&'a DriverRecord>,
    pub is_lead_driver: bool,
    pub lead_driver: Option<&'a LeadDriverRecord>,
    pub previous: Option<&'a PickRecord>,
}

/// Check a pick against the deadline, the driver groups, and the lead driver cap.
///
/// # Errors
/// Returns the first rule the pick breaks.
pub fn validate_pick(ctx: &PickContext<'_>) -> Result<(), PickRejection> {
    if ctx.race.completed {
        return Err(PickRejection::RaceCompleted(ctx.race.race_id));
    }
    let deadline = pick_deadline(ctx.race);
    if ctx.now >= deadline {
        return Err(PickRejection::DeadlinePassed(deadline));
    }

    check_driver(ctx.driver_a_id, ctx.driver_a, DriverGroup::A, ctx.race.season)?;
    check_driver(ctx.driver_b_id, ctx.driver_b, DriverGroup::B, ctx.race.season)?;

    if ctx.is_lead_driver {
        let lead = ctx.lead_driver.ok_or(PickRejection::NoLeadDriver)?;
        if lead_driver_usage_delta(ctx.previous, true) > 0
            && lead.times_used >= LEAD_DRIVER_MAX_USES
        {
            return Err(PickRejection::LeadDriverLimitReached);
        }
    }

    Ok(())
}

/// Everything a pick submission reads and writes.
///
/// The database implementation lives in `db_util::PgPickStore`. Callers run
/// [`submit_pick`] inside one transaction.
pub trait PickStore {
    fn find_race(&mut self, race_id: u32) -> Result<Option<RaceRecord>>;

    fn find_driver(&mut self, driver_id: u32) -> Result<Option<DriverRecord>>;

    /// Read the user's lead driver and hold it until the transaction ends.
    /// The usage cap is checked against this value and nothing else.
    fn lock_lead_driver(&mut self, user_id: u32, season: u32) -> Result<Option<LeadDriverRecord>>;

    fn find_pick(&mut self, user_id: u32, race_id: u32) -> Result<Option<PickRecord>>;

    /// Create or replace the user's pick for the submitted race.
    fn save_pick(&mut self, user_id: u32, submission: &PickSubmission) -> Result<PickRecord>;

    fn set_lead_driver_usage(&mut self, user_id: u32, season: u32, times_used: u32) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickOutcome {
    Saved(PickRecord),
    RaceNotFound,
    Rejected(PickRejection),
}

/// Validate and store a pick, moving the lead driver counter with it.
///
/// # Errors
/// Returns an error if the store fails or the counter would leave the `u32`
/// range. A pick that breaks a rule is [`PickOutcome::Rejected`], not an error.
pub fn submit_pick<S: PickStore + ?Sized>(
    store: &mut S,
    user_id: u32,
    submission: &PickSubmission,
    now: DateTime<Utc>,
) -> Result<PickOutcome> {
    let Some(race) = store.find_race(submission.race_id)? else {
        return Ok(PickOutcome::RaceNotFound);
    };
    let driver_a = store.find_driver(submission.driver_a_id)?;
    let driver_b = store.find_driver(submission.driver_b_id)?;
    let lead_driver = store.lock_lead_driver(user_id, race.season)?;
    let previous = store.find_pick(user_id, race.race_id)?;

    let ctx = PickContext {
        now,
        race: &race,
        driver_a_id: submission.driver_a_id,
        driver_a: driver_a.as_ref(),
        driver_b_id: submission.driver_b_id,
        driver_b: driver_b.as_ref(),
        is_lead_driver: submission.is_lead_driver,
        lead_driver: lead_driver.as_ref(),
        previous: previous.as_ref(),
    };
    if let Err(rejection) = validate_pick(&ctx) {
        return Ok(PickOutcome::Rejected(rejection));
    }

    let pick = store.save_pick(user_id, submission)?;
    let delta = lead_driver_usage_delta(previous.as_ref(), submission.is_lead_driver);
    if let Some(lead) = lead_driver
        && delta != 0
    {
        let times_used = lead
            .times_used
            .checked_add_signed(delta)
            .with_context(|| format!("Lead driver usage {} out of range", lead.times_used))?;
        store.set_lead_driver_usage(user_id, race.season, times_used)?;
        log::debug!(
            "User #{user_id} has used their lead driver {times_used} times in season {}",
            race.season
        );
    }

    Ok(PickOutcome::Saved(pick))
}

/// Join picks with their team, race and drivers, keeping the order of `picks`.
///
/// # Errors
/// Returns an error if a pick refers to a record missing from the inputs.
pub fn pick_details(
    picks: Vec<PickRecord>,
    users: &[UserRecord],
    races: &[RaceRecord],
    drivers: &[DriverRecord],
) -> Result<Vec<PickDetail>> {
    let users: HashMap<u32, &UserRecord> = users.iter().map(|u| (u.user_id, u)).collect();
    let races: HashMap<u32, &RaceRecord> = races.iter().map(|r| (r.race_id, r)).collect();
    let drivers: HashMap<u32, &DriverRecord> = drivers.iter().map(|d| (d.driver_id, d)).collect();
    let driver = |driver_id: u32| {
        drivers
            .get(&driver_id)
            .map(|d| (*d).clone())
            .ok_or_else(|| anyhow!("Driver #{driver_id} not loaded"))
    };

    picks
        .into_iter()
        .map(|pick| {
            let team_name = users
                .get(&pick.user_id)
                .map(|u| u.team_name.clone())
                .ok_or_else(|| anyhow!("User #{} not loaded", pick.user_id))?;
            let race = races
                .get(&pick.race_id)
                .map(|r| (*r).clone())
                .ok_or_else(|| anyhow!("Race #{} not loaded", pick.race_id))?;
            Ok(PickDetail {
                team_name,
                race,
                driver_a: driver(pick.driver_a_id)?,
                driver_b: driver(pick.driver_b_id)?,
                pick,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn race() -> RaceRecord {
        RaceRecord {
            race_id: 3,
            name: "Shriners Children's 500".to_string(),
            track: "Phoenix Raceway".to_string(),
            race_date: Utc.with_ymd_and_hms(2024, 3, 10, 19, 30, 0).unwrap(),
            season: 2024,
            race_number: 3,
            completed: false,
        }
    }

    fn driver(driver_id: u32, group: DriverGroup) -> DriverRecord {
        DriverRecord {
            driver_id,
            name: format!("Driver {driver_id}"),
            number: driver_id.to_string(),
            group,
            season: 2024,
            active: true,
        }
    }

    fn lead(times_used: u32) -> LeadDriverRecord {
        LeadDriverRecord {
            user_id: 1,
            season: 2024,
            driver_id: 5,
            times_used,
        }
    }

    fn previous_pick(is_lead_driver: bool) -> PickRecord {
        PickRecord {
            pick_id: 9,
            user_id: 1,
            race_id: 3,
            driver_a_id: 5,
            driver_b_id: 23,
            is_lead_driver,
            submitted_at: Utc.with_ymd_and_hms(2024, 3, 8, 12, 0, 0).unwrap(),
        }
    }

    struct Fixture {
        race: RaceRecord,
        a: DriverRecord,
        b: DriverRecord,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                race: race(),
                a: driver(5, DriverGroup::A),
                b: driver(23, DriverGroup::B),
            }
        }

        fn ctx(&self) -> PickContext<'_> {
            PickContext {
                now: Utc.with_ymd_and_hms(2024, 3, 9, 18, 0, 0).unwrap(),
                race: &self.race,
                driver_a_id: self.a.driver_id,
                driver_a: Some(&self.a),
                driver_b_id: self.b.driver_id,
                driver_b: Some(&self.b),
                is_lead_driver: false,
                lead_driver: None,
                previous: None,
            }
        }
    }

    #[test]
    fn test_deadline_is_midnight_of_race_day() {
        assert_eq!(
            pick_deadline(&race()),
            Utc.with_ymd_and_hms(2024, 3, 10, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_valid_pick() {
        let fixture = Fixture::new();
        assert_eq!(validate_pick(&fixture.ctx()), Ok(()));
    }

    #[test]
    fn test_pick_after_deadline() {
        let fixture = Fixture::new();
        let ctx = PickContext {
            now: Utc.with_ymd_and_hms(2024, 3, 10, 0, 0, 0).unwrap(),
            ..fixture.ctx()
        };
        assert!(matches!(
            validate_pick(&ctx),
            Err(PickRejection::DeadlinePassed(_))
        ));
    }

    #[test]
    fn test_pick_for_completed_race() {
        let mut fixture = Fixture::new();
        fixture.race.completed = true;
        assert_eq!(
            validate_pick(&fixture.ctx()),
            Err(PickRejection::RaceCompleted(3))
        );
    }

    #[test]
    fn test_pick_with_swapped_groups() {
        let fixture = Fixture::new();
        let ctx = PickContext {
            driver_a_id: fixture.b.driver_id,
            driver_a: Some(&fixture.b),
            driver_b_id: fixture.a.driver_id,
            driver_b: Some(&fixture.a),
            ..fixture.ctx()
        };
        assert_eq!(
            validate_pick(&ctx),
            Err(PickRejection::WrongGroup {
                driver_id: 23,
                expected: DriverGroup::A,
                actual: DriverGroup::B,
            })
        );
    }

    #[test]
    fn test_pick_with_unknown_inactive_or_other_season_driver() {
        let mut fixture = Fixture::new();
        let ctx = PickContext {
            driver_b_id: 77,
            driver_b: None,
            ..fixture.ctx()
        };
        assert_eq!(validate_pick(&ctx), Err(PickRejection::UnknownDriver(77)));

        fixture.b.active = false;
        assert_eq!(
            validate_pick(&fixture.ctx()),
            Err(PickRejection::InactiveDriver(23))
        );

        fixture.b.active = true;
        fixture.a.season = 2023;
        assert_eq!(
            validate_pick(&fixture.ctx()),
            Err(PickRejection::WrongSeason {
                driver_id: 5,
                season: 2024
            })
        );
    }

    #[test]
    fn test_lead_driver_requires_selection() {
        let fixture = Fixture::new();
        let ctx = PickContext {
            is_lead_driver: true,
            ..fixture.ctx()
        };
        assert_eq!(validate_pick(&ctx), Err(PickRejection::NoLeadDriver));
    }

    #[test]
    fn test_lead_driver_cap() {
        let fixture = Fixture::new();
        let under = lead(LEAD_DRIVER_MAX_USES - 1);
        let at_cap = lead(LEAD_DRIVER_MAX_USES);

        let ctx = PickContext {
            is_lead_driver: true,
            lead_driver: Some(&under),
            ..fixture.ctx()
        };
        assert_eq!(validate_pick(&ctx), Ok(()));

        let ctx = PickContext {
            is_lead_driver: true,
            lead_driver: Some(&at_cap),
            ..fixture.ctx()
        };
        assert_eq!(
            validate_pick(&ctx),
            Err(PickRejection::LeadDriverLimitReached)
        );
    }

    #[test]
    fn test_resubmitting_lead_pick_at_cap_is_allowed() {
        let fixture = Fixture::new();
        let at_cap = lead(LEAD_DRIVER_MAX_USES);
        let previous = previous_pick(true);
        let ctx = PickContext {
            is_lead_driver: true,
            lead_driver: Some(&at_cap),
            previous: Some(&previous),
            ..fixture.ctx()
        };
        assert_eq!(validate_pick(&ctx), Ok(()));
    }

    #[test]
    fn test_lead_driver_usage_delta() {
        let lead_pick = previous_pick(true);
        let plain_pick = previous_pick(false);
        assert_eq!(lead_driver_usage_delta(None, true), 1);
        assert_eq!(lead_driver_usage_delta(None, false), 0);
        assert_eq!(lead_driver_usage_delta(Some(&plain_pick), true), 1);
        assert_eq!(lead_driver_usage_delta(Some(&lead_pick), true), 0);
        assert_eq!(lead_driver_usage_delta(Some(&lead_pick), false), -1);
    }

    #[derive(Default)]
    struct MemoryStore {
        races: Vec<RaceRecord>,
        drivers: Vec<DriverRecord>,
        lead: Option<LeadDriverRecord>,
        picks: Vec<PickRecord>,
        /// Usage committed by another submission while this one waited for the lock.
        usage_committed_elsewhere: Option<u32>,
        calls: Vec<&'static str>,
    }

    impl PickStore for MemoryStore {
        fn find_race(&mut self, race_id: u32) -> Result<Option<RaceRecord>> {
            self.calls.push("find_race");
            Ok(self.races.iter().find(|r| r.race_id == race_id).cloned())
        }

        fn find_driver(&mut self, driver_id: u32) -> Result<Option<DriverRecord>> {
            self.calls.push("find_driver");
            Ok(self.drivers.iter().find(|d| d.driver_id == driver_id).cloned())
        }

        fn lock_lead_driver(
            &mut self,
            _user_id: u32,
            _season: u32,
        ) -> Result<Option<LeadDriverRecord>> {
            self.calls.push("lock_lead_driver");
            if let (Some(lead), Some(committed)) =
                (self.lead.as_mut(), self.usage_committed_elsewhere.take())
            {
                lead.times_used = committed;
            }
            Ok(self.lead.clone())
        }

        fn find_pick(&mut self, user_id: u32, race_id: u32) -> Result<Option<PickRecord>> {
            self.calls.push("find_pick");
            Ok(self
                .picks
                .iter()
                .find(|p| p.user_id == user_id && p.race_id == race_id)
                .cloned())
        }

        fn save_pick(&mut self, user_id: u32, submission: &PickSubmission) -> Result<PickRecord> {
            self.calls.push("save_pick");
            self.picks
                .retain(|p| !(p.user_id == user_id && p.race_id == submission.race_id));
            let pick = PickRecord {
                pick_id: u32::try_from(self.picks.len()).unwrap() + 1,
                user_id,
                race_id: submission.race_id,
                driver_a_id: submission.driver_a_id,
                driver_b_id: submission.driver_b_id,
                is_lead_driver: submission.is_lead_driver,
                submitted_at: Utc.with_ymd_and_hms(2024, 3, 9, 18, 0, 0).unwrap(),
            };
            self.picks.push(pick.clone());
            Ok(pick)
        }

        fn set_lead_driver_usage(
            &mut self,
            _user_id: u32,
            _season: u32,
            times_used: u32,
        ) -> Result<()> {
            self.calls.push("set_lead_driver_usage");
            let lead = self.lead.as_mut().ok_or_else(|| anyhow!("no lead driver"))?;
            lead.times_used = times_used;
            Ok(())
        }
    }

    impl MemoryStore {
        fn with_lead(times_used: u32) -> Self {
            let mut next_race = race();
            next_race.race_id = 4;
            next_race.race_number = 4;
            next_race.race_date = Utc.with_ymd_and_hms(2024, 3, 17, 19, 30, 0).unwrap();
            Self {
                races: vec![race(), next_race],
                drivers: vec![driver(5, DriverGroup::A), driver(23, DriverGroup::B)],
                lead: Some(lead(times_used)),
                ..Self::default()
            }
        }

        fn times_used(&self) -> u32 {
            self.lead.as_ref().map_or(0, |l| l.times_used)
        }
    }

    fn submission(race_id: u32, is_lead_driver: bool) -> PickSubmission {
        PickSubmission {
            race_id,
            driver_a_id: 5,
            driver_b_id: 23,
            is_lead_driver,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 9, 18, 0, 0).unwrap()
    }

    #[test_log::test]
    fn test_submit_lead_picks_stop_at_cap() {
        let mut store = MemoryStore::with_lead(LEAD_DRIVER_MAX_USES - 1);

        let outcome = submit_pick(&mut store, 1, &submission(3, true), now()).unwrap();
        assert!(matches!(outcome, PickOutcome::Saved(ref p) if p.is_lead_driver));
        assert_eq!(store.times_used(), LEAD_DRIVER_MAX_USES);

        let outcome = submit_pick(&mut store, 1, &submission(4, true), now()).unwrap();
        assert_eq!(
            outcome,
            PickOutcome::Rejected(PickRejection::LeadDriverLimitReached)
        );
        assert_eq!(store.times_used(), LEAD_DRIVER_MAX_USES);
        assert_eq!(store.picks.len(), 1);
    }

    #[test_log::test]
    fn test_cap_is_checked_against_locked_usage() {
        // another lead pick for a different race committed while we waited
        let mut store = MemoryStore::with_lead(LEAD_DRIVER_MAX_USES - 1);
        store.usage_committed_elsewhere = Some(LEAD_DRIVER_MAX_USES);

        let outcome = submit_pick(&mut store, 1, &submission(4, true), now()).unwrap();
        assert_eq!(
            outcome,
            PickOutcome::Rejected(PickRejection::LeadDriverLimitReached)
        );
        assert_eq!(store.times_used(), LEAD_DRIVER_MAX_USES);
        assert!(store.picks.is_empty());

        assert!(store.calls.contains(&"lock_lead_driver"));
        assert!(!store.calls.contains(&"save_pick"));
    }

    #[test_log::test]
    fn test_lead_driver_is_locked_before_saving() {
        let mut store = MemoryStore::with_lead(0);
        submit_pick(&mut store, 1, &submission(3, true), now()).unwrap();

        let position = |name| store.calls.iter().position(|c| *c == name).unwrap();
        assert!(position("lock_lead_driver") < position("save_pick"));
        assert!(position("save_pick") < position("set_lead_driver_usage"));
        assert_eq!(store.times_used(), 1);
    }

    #[test_log::test]
    fn test_resubmit_and_withdraw_lead_pick() {
        let mut store = MemoryStore::with_lead(2);

        submit_pick(&mut store, 1, &submission(3, true), now()).unwrap();
        assert_eq!(store.times_used(), 3);
        submit_pick(&mut store, 1, &submission(3, true), now()).unwrap();
        assert_eq!(store.times_used(), 3);
        submit_pick(&mut store, 1, &submission(3, false), now()).unwrap();
        assert_eq!(store.times_used(), 2);
        assert_eq!(store.picks.len(), 1);
        assert!(!store.picks[0].is_lead_driver);
    }

    #[test_log::test]
    fn test_submit_pick_for_missing_race() {
        let mut store = MemoryStore::with_lead(0);
        let outcome = submit_pick(&mut store, 1, &submission(99, false), now()).unwrap();
        assert_eq!(outcome, PickOutcome::RaceNotFound);
        assert_eq!(store.calls, vec!["find_race"]);
    }

    #[test_log::test]
    fn test_plain_pick_without_lead_driver() {
        let mut store = MemoryStore {
            lead: None,
            ..MemoryStore::with_lead(0)
        };
        let outcome = submit_pick(&mut store, 1, &submission(3, false), now()).unwrap();
        assert!(matches!(outcome, PickOutcome::Saved(_)));
        assert!(!store.calls.contains(&"set_lead_driver_usage"));
    }

    fn user(user_id: u32, team_name: &str) -> UserRecord {
        UserRecord {
            user_id,
            email: format!("user{user_id}@example.com"),
            team_name: team_name.to_string(),
            is_admin: false,
        }
    }

    #[test]
    fn test_pick_details_join() {
        let mut second = previous_pick(true);
        second.pick_id = 10;
        second.user_id = 2;
        let picks = vec![previous_pick(false), second];
        let users = [user(1, "Speed Demons"), user(2, "Track Masters")];
        let drivers = [driver(5, DriverGroup::A), driver(23, DriverGroup::B)];

        let details = pick_details(picks, &users, &[race()], &drivers).unwrap();
        let summary: Vec<(u32, &str, &str, u32, u32)> = details
            .iter()
            .map(|d| {
                (
                    d.pick.pick_id,
                    d.team_name.as_str(),
                    d.race.name.as_str(),
                    d.driver_a.driver_id,
                    d.driver_b.driver_id,
                )
            })
            .collect();
        assert_eq!(
            summary,
            vec![
                (9, "Speed Demons", "Shriners Children's 500", 5, 23),
                (10, "Track Masters", "Shriners Children's 500", 5, 23),
            ]
        );

        let value = serde_json::to_value(&details[0]).unwrap();
        assert_eq!(value["pick_id"], 9);
        assert_eq!(value["team_name"], "Speed Demons");
        assert_eq!(value["driver_b"]["number"], "23");
    }

    #[test]
    fn test_pick_details_missing_driver() {
        let users = [user(1, "Speed Demons")];
        let drivers = [driver(5, DriverGroup::A)];
        assert!(pick_details(vec![previous_pick(false)], &users, &[race()], &drivers).is_err());
    }
}
