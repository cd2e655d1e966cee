//! An api for picks, race results and season standings in the pitbox league.

#[macro_use]
extern crate rocket;

mod admin;
mod auth;
mod helpers;
mod picks;

use chrono::Utc;
use helpers::{
    ApiErrorBody, ApiResult, CorsFairing, RequestTimingFairing, bad_request_error,
    database_error, get_connection, status_body,
};
use pitbox_common::db_util::{
    PgPool, check_connection, get_active_drivers, get_database_pool, get_races,
    get_standings_with_teams,
};
use pitbox_common::standings::rank_standings;
use pitbox_common::{DriverGroup, DriverRecord, RaceRecord, StandingEntry};
use rocket::State;
use rocket::http::Status;
use rocket::request::Request;
use rocket::response::status as rocket_status;
use rocket::serde::json::{Json, Value, json};
use rocket_prometheus::PrometheusMetrics;
use tracing_subscriber::EnvFilter;

#[get("/health")]
fn health(pool: &State<PgPool>) -> rocket_status::Custom<Value> {
    let database = get_connection(pool)
        .ok()
        .is_some_and(|mut conn| check_connection(&mut conn).is_ok());
    let status = if database {
        Status::Ok
    } else {
        Status::ServiceUnavailable
    };
    rocket_status::Custom(
        status,
        json!({
            "status": if database { "healthy" } else { "unhealthy" },
            "timestamp": Utc::now(),
            "database": database,
        }),
    )
}

#[get("/drivers?<group>&<season>")]
fn list_drivers(
    pool: &State<PgPool>,
    group: Option<&str>,
    season: Option<u32>,
) -> ApiResult<Vec<DriverRecord>> {
    let group = group
        .map(str::parse::<DriverGroup>)
        .transpose()
        .map_err(bad_request_error)?;
    let mut conn = get_connection(pool)?;
    let drivers = get_active_drivers(&mut conn, group, season).map_err(|e| database_error(&e))?;
    Ok(Json(drivers))
}

#[get("/races?<season>")]
fn list_races(pool: &State<PgPool>, season: Option<u32>) -> ApiResult<Vec<RaceRecord>> {
    let mut conn = get_connection(pool)?;
    let races = get_races(&mut conn, season).map_err(|e| database_error(&e))?;
    Ok(Json(races))
}

#[get("/standings?<season>")]
fn list_standings(pool: &State<PgPool>, season: Option<u32>) -> ApiResult<Vec<StandingEntry>> {
    let season = season.ok_or_else(|| bad_request_error("Season required"))?;
    let mut conn = get_connection(pool)?;
    let standings =
        get_standings_with_teams(&mut conn, season).map_err(|e| database_error(&e))?;
    Ok(Json(rank_standings(standings)))
}

#[catch(default)]
fn default_catcher(status: Status, _request: &Request<'_>) -> Json<ApiErrorBody> {
    Json(status_body(status))
}

#[launch]
fn rocket() -> _ {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let pool = match get_database_pool() {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "Could not set up the database pool");
            std::process::exit(1);
        }
    };

    let prometheus = PrometheusMetrics::new();

    rocket::build()
        .manage(pool)
        .attach(RequestTimingFairing)
        .attach(CorsFairing)
        .attach(prometheus.clone())
        .mount(
            "/",
            routes![
                health,
                list_drivers,
                list_races,
                list_standings,
                picks::list_picks,
                picks::submit_pick,
                picks::get_my_lead_driver,
                picks::choose_lead_driver,
                admin::create_driver,
                admin::patch_driver,
                admin::create_race,
                admin::patch_race,
                admin::upload_results,
            ],
        )
        .mount("/metrics", prometheus)
        .register("/", catchers![default_catcher])
}
