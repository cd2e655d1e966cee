//! Pick submission and the lead driver.

use crate::auth::AuthedUser;
use crate::helpers::{
    ApiResult, bad_request_error, database_error, get_connection, not_found_error,
    unprocessable_entity_error,
};
use chrono::Utc;
use pitbox_common::db_util::{
    PgPickStore, PgPool, get_driver_by_id, get_lead_driver, get_pick_details, get_picks_by_race,
    get_picks_by_user, run_in_transaction, set_lead_driver,
};
use pitbox_common::picks::{self, PickOutcome, PickRejection};
use pitbox_common::{LeadDriverRecord, LeadDriverSelection, PickDetail, PickRecord, PickSubmission};
use rocket::State;
use rocket::serde::json::Json;

/// Every pick for a race, or without `race_id` the caller's own picks, each
/// with its team, race and drivers.
#[get("/picks?<race_id>")]
pub fn list_picks(
    pool: &State<PgPool>,
    user: AuthedUser,
    race_id: Option<u32>,
) -> ApiResult<Vec<PickDetail>> {
    let mut conn = get_connection(pool)?;
    let picks = match race_id {
        Some(race_id) => get_picks_by_race(&mut conn, race_id),
        None => get_picks_by_user(&mut conn, user.0.user_id),
    }
    .and_then(|picks| get_pick_details(&mut conn, picks))
    .map_err(|e| database_error(&e))?;
    Ok(Json(picks))
}

#[post("/picks", data = "<submission>")]
pub fn submit_pick(
    pool: &State<PgPool>,
    user: AuthedUser,
    submission: Json<PickSubmission>,
) -> ApiResult<PickRecord> {
    let submission = submission.into_inner();
    let user_id = user.0.user_id;
    let mut conn = get_connection(pool)?;

    let outcome = run_in_transaction(&mut conn, |conn| {
        picks::submit_pick(&mut PgPickStore::new(conn), user_id, &submission, Utc::now())
    })
    .map_err(|e| database_error(&e))?;

    match outcome {
        PickOutcome::Saved(pick) => {
            tracing::info!(
                user_id = user_id,
                race_id = pick.race_id,
                lead = pick.is_lead_driver,
                "Pick saved"
            );
            Ok(Json(pick))
        }
        PickOutcome::RaceNotFound => Err(not_found_error("Race not found")),
        PickOutcome::Rejected(rejection) => {
            tracing::debug!(user_id = user_id, reason = %rejection, "Pick rejected");
            match rejection {
                PickRejection::UnknownDriver(_)
                | PickRejection::WrongGroup { .. }
                | PickRejection::WrongSeason { .. }
                | PickRejection::InactiveDriver(_) => {
                    Err(unprocessable_entity_error(rejection.to_string()))
                }
                PickRejection::RaceCompleted(_)
                | PickRejection::DeadlinePassed(_)
                | PickRejection::NoLeadDriver
                | PickRejection::LeadDriverLimitReached => {
                    Err(bad_request_error(rejection.to_string()))
                }
            }
        }
    }
}

#[get("/lead-driver?<season>")]
pub fn get_my_lead_driver(
    pool: &State<PgPool>,
    user: AuthedUser,
    season: u32,
) -> ApiResult<LeadDriverRecord> {
    let mut conn = get_connection(pool)?;
    get_lead_driver(&mut conn, user.0.user_id, season)
        .map_err(|e| database_error(&e))?
        .map(Json)
        .ok_or_else(|| not_found_error("No lead driver selected"))
}

#[put("/lead-driver", data = "<selection>")]
pub fn choose_lead_driver(
    pool: &State<PgPool>,
    user: AuthedUser,
    selection: Json<LeadDriverSelection>,
) -> ApiResult<LeadDriverRecord> {
    let mut conn = get_connection(pool)?;

    let driver = get_driver_by_id(&mut conn, selection.driver_id)
        .map_err(|e| database_error(&e))?
        .ok_or_else(|| not_found_error("Driver not found"))?;
    if driver.season != selection.season || !driver.active {
        return Err(unprocessable_entity_error(format!(
            "Driver #{} is not an active driver in season {}",
            driver.driver_id, selection.season
        )));
    }

    let record = set_lead_driver(&mut conn, user.0.user_id, selection.season, driver.driver_id)
        .map_err(|e| database_error(&e))?;
    tracing::info!(
        user_id = record.user_id,
        season = record.season,
        driver_id = record.driver_id,
        "Lead driver chosen"
    );
    Ok(Json(record))
}
