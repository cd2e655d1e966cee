//! Admin-only routes: schedule and roster management, and results upload.

use crate::auth::AdminUser;
use crate::helpers::{
    ApiResult, database_error, get_connection, not_found_error, unprocessable_entity_error,
};
use pitbox_common::db_util::{
    PgPool, PgStandingsStore, get_drivers_in_season, get_race_by_id_for_update, insert_driver,
    insert_race, mark_race_completed, run_in_transaction, update_driver, update_race,
    upsert_race_results,
};
use pitbox_common::results::{ResultsRejection, match_results};
use pitbox_common::schedule::{RaceUpdateRejection, check_race_update};
use pitbox_common::standings::update_standings;
use pitbox_common::{
    DriverRecord, DriverUpdate, NewDriver, NewRace, RaceRecord, RaceUpdate, ResultsUpload,
    ResultsUploadSummary,
};
use rocket::State;
use rocket::serde::json::Json;

#[post("/drivers", data = "<driver>")]
pub fn create_driver(
    pool: &State<PgPool>,
    _admin: AdminUser,
    driver: Json<NewDriver>,
) -> ApiResult<DriverRecord> {
    if driver.name.trim().is_empty() || driver.number.trim().is_empty() {
        return Err(unprocessable_entity_error("Driver name and number are required"));
    }
    let mut conn = get_connection(pool)?;
    let driver = insert_driver(&mut conn, &driver).map_err(|e| database_error(&e))?;
    tracing::info!(driver_id = driver.driver_id, number = %driver.number, "Driver created");
    Ok(Json(driver))
}

#[patch("/drivers/<id>", data = "<update>")]
pub fn patch_driver(
    pool: &State<PgPool>,
    _admin: AdminUser,
    id: u32,
    update: Json<DriverUpdate>,
) -> ApiResult<DriverRecord> {
    let mut conn = get_connection(pool)?;
    update_driver(&mut conn, id, &update)
        .map_err(|e| database_error(&e))?
        .map(Json)
        .ok_or_else(|| not_found_error("Driver not found"))
}

#[post("/races", data = "<race>")]
pub fn create_race(
    pool: &State<PgPool>,
    _admin: AdminUser,
    race: Json<NewRace>,
) -> ApiResult<RaceRecord> {
    if race.race_number == 0 {
        return Err(unprocessable_entity_error("Race numbers start at 1"));
    }
    let mut conn = get_connection(pool)?;
    let race = insert_race(&mut conn, &race).map_err(|e| database_error(&e))?;
    tracing::info!(
        race_id = race.race_id,
        season = race.season,
        race_number = race.race_number,
        "Race created"
    );
    Ok(Json(race))
}

enum RaceEditOutcome {
    Updated(RaceRecord),
    RaceNotFound,
    Rejected(RaceUpdateRejection),
}

/// Edit a race. The row is locked while the edit is checked, so a results
/// upload cannot complete the race in between.
#[patch("/races/<id>", data = "<update>")]
pub fn patch_race(
    pool: &State<PgPool>,
    _admin: AdminUser,
    id: u32,
    update: Json<RaceUpdate>,
) -> ApiResult<RaceRecord> {
    let mut conn = get_connection(pool)?;

    let outcome = run_in_transaction(&mut conn, |conn| {
        let Some(race) = get_race_by_id_for_update(conn, id)? else {
            return Ok(RaceEditOutcome::RaceNotFound);
        };
        if let Err(rejection) = check_race_update(&race, &update) {
            return Ok(RaceEditOutcome::Rejected(rejection));
        }
        Ok(match update_race(conn, id, &update)? {
            Some(race) => RaceEditOutcome::Updated(race),
            None => RaceEditOutcome::RaceNotFound,
        })
    })
    .map_err(|e| database_error(&e))?;

    match outcome {
        RaceEditOutcome::Updated(race) => Ok(Json(race)),
        RaceEditOutcome::RaceNotFound => Err(not_found_error("Race not found")),
        RaceEditOutcome::Rejected(rejection) => {
            Err(unprocessable_entity_error(rejection.to_string()))
        }
    }
}

enum UploadOutcome {
    Done(ResultsUploadSummary),
    RaceNotFound,
    Rejected(ResultsRejection),
}

/// Store a race's results, close the race, and recompute standings, all in
/// one transaction.
#[post("/admin/results", data = "<upload>")]
pub fn upload_results(
    pool: &State<PgPool>,
    admin: AdminUser,
    upload: Json<ResultsUpload>,
) -> ApiResult<ResultsUploadSummary> {
    let upload = upload.into_inner();
    let race_id = upload.race_id;
    let mut conn = get_connection(pool)?;

    let outcome = run_in_transaction(&mut conn, |conn| {
        let Some(race) = get_race_by_id_for_update(conn, race_id)? else {
            return Ok(UploadOutcome::RaceNotFound);
        };
        let season_drivers = get_drivers_in_season(conn, race.season)?;
        let matched = match match_results(&season_drivers, &upload.results) {
            Ok(matched) => matched,
            Err(rejection) => return Ok(UploadOutcome::Rejected(rejection)),
        };

        upsert_race_results(conn, race_id, &matched.matched)?;
        mark_race_completed(conn, race_id)?;
        let update = update_standings(&mut PgStandingsStore::new(conn), race_id)?;

        Ok(UploadOutcome::Done(ResultsUploadSummary {
            race_id,
            matched: matched.matched.len(),
            unmatched: matched.unmatched,
            standings_updated: update.map_or(0, |u| u.users_updated),
        }))
    })
    .map_err(|e| database_error(&e))?;

    match outcome {
        UploadOutcome::Done(summary) => {
            tracing::info!(
                admin_id = admin.0.user_id,
                race_id = race_id,
                matched = summary.matched,
                unmatched = summary.unmatched.len(),
                standings_updated = summary.standings_updated,
                "Results processed"
            );
            Ok(Json(summary))
        }
        UploadOutcome::RaceNotFound => Err(not_found_error("Race not found")),
        UploadOutcome::Rejected(rejection) => {
            Err(unprocessable_entity_error(rejection.to_string()))
        }
    }
}
