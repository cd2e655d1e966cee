use super::*;
use crate::results::MatchedResult;

table! {
    race_results (id) {
        id -> Integer,
        race_id -> Integer,
        driver_id -> Integer,
        position -> Integer,
        points -> Integer,
    }
}

#[derive(Queryable)]
#[diesel(table_name = race_results)]
struct RaceResultPrivate {
    id: i32,
    race_id: i32,
    driver_id: i32,
    position: i32,
    points: i32,
}

#[derive(Insertable)]
#[diesel(table_name = race_results)]
struct RaceResultPrivateNew {
    race_id: i32,
    driver_id: i32,
    position: i32,
    points: i32,
}

fn private_to_public(p: RaceResultPrivate) -> Result<RaceResultRecord> {
    use conversions::*;
    Ok(RaceResultRecord {
        result_id: i32_to_u32(p.id)?,
        race_id: i32_to_u32(p.race_id)?,
        driver_id: i32_to_u32(p.driver_id)?,
        position: i32_to_u32(p.position)?,
        points: i32_to_u32(p.points)?,
    })
}

fn build_new_row(race: u32, result: &MatchedResult) -> Result<RaceResultPrivateNew> {
    use conversions::*;
    Ok(RaceResultPrivateNew {
        race_id: u32_to_i32(race)?,
        driver_id: u32_to_i32(result.driver_id)?,
        position: u32_to_i32(result.position)?,
        points: u32_to_i32(result.points)?,
    })
}

/// Store results for a race. A driver that already has a result for the race
/// gets its position and points replaced.
pub fn upsert_race_results(
    conn: &mut PgConnection,
    race: u32,
    results: &[MatchedResult],
) -> Result<usize> {
    use self::race_results::dsl::*;

    if results.is_empty() {
        return Ok(0);
    }

    let insert_rows = results
        .iter()
        .map(|result| build_new_row(race, result))
        .collect::<Result<Vec<RaceResultPrivateNew>>>()?;

    diesel::insert_into(race_results)
        .values(&insert_rows)
        .on_conflict((race_id, driver_id))
        .do_update()
        .set((position.eq(excluded(position)), points.eq(excluded(points))))
        .execute(conn)
        .context("Error saving race results")
}

pub fn get_results_by_race(
    conn: &mut PgConnection,
    input_race_id: u32,
) -> Result<Vec<RaceResultRecord>> {
    use self::race_results::dsl::*;

    let input_race_id = conversions::u32_to_i32(input_race_id)?;

    let items_private: Vec<RaceResultPrivate> = race_results
        .filter(race_id.eq(input_race_id))
        .order(position.asc())
        .load(conn)
        .context("Error loading race results")?;

    items_private
        .into_iter()
        .map(private_to_public)
        .collect::<Result<Vec<RaceResultRecord>>>()
}
