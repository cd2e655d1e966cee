//! Maintenance jobs for the pitbox league.

#![warn(clippy::all, clippy::pedantic)]

use anyhow::{Context, Result};
use chrono::{NaiveDate, TimeZone, Utc};
use clap::{Parser, Subcommand};
use pitbox_common::db_util::{
    self, PgStandingsStore, delete_standings_in_season, ensure_driver, ensure_race,
    ensure_standing, ensure_user, get_completed_races_in_season, run_in_transaction,
};
use pitbox_common::standings::update_standings;
use pitbox_common::{DriverGroup, NewDriver, NewRace};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Show additional output
    #[arg(short, long, global = true, env = "PITBOX_VERBOSE")]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Rebuild a season's standings from the stored results of every completed race
    Recompute {
        #[arg(short, long, env = "PITBOX_SEASON")]
        season: u32,

        /// Delete the season's standings first instead of overwriting race by race
        #[arg(long)]
        reset: bool,
    },
    /// Insert a demo season. Safe to run more than once.
    Seed {
        #[arg(short, long, default_value_t = 2024, env = "PITBOX_SEASON")]
        season: u32,
    },
}

const GROUP_A_DRIVERS: [(&str, &str); 8] = [
    ("Kyle Larson", "5"),
    ("Chase Elliott", "9"),
    ("Martin Truex Jr.", "19"),
    ("Denny Hamlin", "11"),
    ("William Byron", "24"),
    ("Christopher Bell", "20"),
    ("Tyler Reddick", "45"),
    ("Kyle Busch", "8"),
];

const GROUP_B_DRIVERS: [(&str, &str); 8] = [
    ("Bubba Wallace", "23"),
    ("Ross Chastain", "1"),
    ("Daniel Suarez", "99"),
    ("Chase Briscoe", "14"),
    ("Alex Bowman", "48"),
    ("AJ Allmendinger", "16"),
    ("Ryan Blaney", "12"),
    ("Brad Keselowski", "6"),
];

/// (name, track, month, day)
const SCHEDULE: [(&str, &str, u32, u32); 5] = [
    ("Daytona 500", "Daytona International Speedway", 2, 18),
    ("Pennzoil 400", "Las Vegas Motor Speedway", 3, 3),
    ("Shriners Children's 500", "Phoenix Raceway", 3, 10),
    ("Coca-Cola 600", "Charlotte Motor Speedway", 5, 26),
    ("Hollywood Casino 400", "Kansas Speedway", 9, 29),
];

fn recompute(season: u32, reset: bool) -> Result<()> {
    let mut conn = db_util::get_database_connection()?;
    log::info!("Recomputing standings for season {season}");

    run_in_transaction(&mut conn, |conn| {
        if reset {
            let deleted = delete_standings_in_season(conn, season)?;
            log::info!("Deleted {deleted} standings");
        }

        let races = get_completed_races_in_season(conn, season)?;
        if races.is_empty() {
            log::warn!("Season {season} has no completed races");
        }
        for race in races {
            let update = update_standings(&mut PgStandingsStore::new(conn), race.race_id)?;
            if let Some(update) = update {
                println!(
                    "Race {} ({}): {} standings updated",
                    race.race_number, race.name, update.users_updated
                );
            }
        }
        Ok(())
    })
}

fn seed(season: u32) -> Result<()> {
    let mut conn = db_util::get_database_connection()?;
    let year = i32::try_from(season).context("Season does not fit a calendar year")?;

    run_in_transaction(&mut conn, |conn| {
        ensure_user(conn, "admin@pitbox.local", "Admin Team", true)?;
        let players = [
            ensure_user(conn, "user1@example.com", "Speed Demons", false)?,
            ensure_user(conn, "user2@example.com", "Track Masters", false)?,
        ];
        println!("Users ready.");

        let roster = GROUP_A_DRIVERS
            .iter()
            .map(|d| (d, DriverGroup::A))
            .chain(GROUP_B_DRIVERS.iter().map(|d| (d, DriverGroup::B)));
        for ((name, number), group) in roster {
            ensure_driver(
                conn,
                &NewDriver {
                    name: (*name).to_string(),
                    number: (*number).to_string(),
                    group,
                    season,
                },
            )?;
        }
        println!("Drivers ready.");

        for (race_number, (name, track, month, day)) in (1u32..).zip(SCHEDULE) {
            let date = NaiveDate::from_ymd_opt(year, month, day)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .with_context(|| format!("Invalid race date {year}-{month}-{day}"))?;
            ensure_race(
                conn,
                &NewRace {
                    name: name.to_string(),
                    track: track.to_string(),
                    race_date: Utc.from_utc_datetime(&date),
                    season,
                    race_number,
                },
            )?;
        }
        println!("Races ready.");

        for player in &players {
            ensure_standing(conn, player.user_id, season)?;
        }
        println!("Standings ready.");
        Ok(())
    })?;

    log::info!("Seeded season {season}");
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    match cli.command {
        Command::Recompute { season, reset } => recompute(season, reset),
        Command::Seed { season } => seed(season),
    }
}
