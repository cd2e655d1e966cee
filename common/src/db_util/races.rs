use super::*;

table! {
    races (id) {
        id -> Integer,
        name -> Varchar,
        track -> Varchar,
        race_date -> Timestamptz,
        season -> Integer,
        race_number -> Integer,
        completed -> Bool,
    }
}

#[derive(Queryable)]
#[diesel(table_name = races)]
struct RacePrivate {
    id: i32,
    name: String,
    track: String,
    race_date: DateTime<Utc>,
    season: i32,
    race_number: i32,
    completed: bool,
}

#[derive(Insertable)]
#[diesel(table_name = races)]
struct RacePrivateNew {
    name: String,
    track: String,
    race_date: DateTime<Utc>,
    season: i32,
    race_number: i32,
    completed: bool,
}

#[derive(AsChangeset, Default)]
#[diesel(table_name = races)]
struct RacePrivateUpdate {
    name: Option<String>,
    track: Option<String>,
    race_date: Option<DateTime<Utc>>,
    season: Option<i32>,
    race_number: Option<i32>,
    completed: Option<bool>,
}

impl RacePrivateUpdate {
    fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.track.is_none()
            && self.race_date.is_none()
            && self.season.is_none()
            && self.race_number.is_none()
            && self.completed.is_none()
    }
}

fn private_to_public(p: RacePrivate) -> Result<RaceRecord> {
    use conversions::*;
    Ok(RaceRecord {
        race_id: i32_to_u32(p.id)?,
        name: p.name,
        track: p.track,
        race_date: p.race_date,
        season: i32_to_u32(p.season)?,
        race_number: i32_to_u32(p.race_number)?,
        completed: p.completed,
    })
}

fn build_new_row(race: &NewRace) -> Result<RacePrivateNew> {
    use conversions::*;
    Ok(RacePrivateNew {
        name: race.name.trim().to_string(),
        track: race.track.trim().to_string(),
        race_date: race.race_date,
        season: u32_to_i32(race.season)?,
        race_number: u32_to_i32(race.race_number)?,
        completed: false,
    })
}

fn build_update_row(update: &RaceUpdate) -> Result<RacePrivateUpdate> {
    use conversions::*;
    Ok(RacePrivateUpdate {
        name: update.name.as_ref().map(|n| n.trim().to_string()),
        track: update.track.as_ref().map(|t| t.trim().to_string()),
        race_date: update.race_date,
        season: optu32_to_opti32(update.season)?,
        race_number: optu32_to_opti32(update.race_number)?,
        completed: update.completed,
    })
}

fn collect_public(items_private: Vec<RacePrivate>) -> Result<Vec<RaceRecord>> {
    items_private
        .into_iter()
        .map(private_to_public)
        .collect::<Result<Vec<RaceRecord>>>()
}

pub fn insert_race(conn: &mut PgConnection, race: &NewRace) -> Result<RaceRecord> {
    use self::races::dsl::*;

    let insert_row = build_new_row(race)?;

    let result = diesel::insert_into(races)
        .values(&insert_row)
        .get_result::<RacePrivate>(conn)
        .context("Error inserting race")?;
    private_to_public(result)
}

/// Insert a race unless its number is already used in the season.
pub fn ensure_race(conn: &mut PgConnection, race: &NewRace) -> Result<()> {
    use self::races::dsl::*;

    let insert_row = build_new_row(race)?;

    diesel::insert_into(races)
        .values(&insert_row)
        .on_conflict((season, race_number))
        .do_nothing()
        .execute(conn)
        .context("Error inserting race")?;
    Ok(())
}

pub fn get_race_by_id(conn: &mut PgConnection, row_id: u32) -> Result<Option<RaceRecord>> {
    use self::races::dsl::*;

    let row_id = conversions::u32_to_i32(row_id)?;

    races
        .filter(id.eq(row_id))
        .first::<RacePrivate>(conn)
        .optional()
        .context("Error loading race")?
        .map(private_to_public)
        .transpose()
}

/// Like [`get_race_by_id`], but locks the row until the transaction ends.
pub fn get_race_by_id_for_update(
    conn: &mut PgConnection,
    row_id: u32,
) -> Result<Option<RaceRecord>> {
    use self::races::dsl::*;

    let row_id = conversions::u32_to_i32(row_id)?;

    races
        .filter(id.eq(row_id))
        .for_update()
        .first::<RacePrivate>(conn)
        .optional()
        .context("Error locking race")?
        .map(private_to_public)
        .transpose()
}

pub fn get_races_by_ids(conn: &mut PgConnection, row_ids: &[u32]) -> Result<Vec<RaceRecord>> {
    use self::races::dsl::*;

    let row_ids = conversions::ids_to_i32(row_ids)?;

    let items_private: Vec<RacePrivate> = races
        .filter(id.eq_any(row_ids))
        .load(conn)
        .context("Error loading races")?;
    collect_public(items_private)
}

/// Races ordered by date, optionally limited to one season.
pub fn get_races(conn: &mut PgConnection, input_season: Option<u32>) -> Result<Vec<RaceRecord>> {
    use self::races::dsl::*;

    let mut query = races.into_boxed();
    if let Some(s) = input_season {
        query = query.filter(season.eq(conversions::u32_to_i32(s)?));
    }

    let items_private: Vec<RacePrivate> = query
        .order((race_date.asc(), race_number.asc()))
        .load(conn)
        .context("Error loading races")?;
    collect_public(items_private)
}

/// Completed races of a season in race-number order.
pub fn get_completed_races_in_season(
    conn: &mut PgConnection,
    input_season: u32,
) -> Result<Vec<RaceRecord>> {
    use self::races::dsl::*;

    let input_season = conversions::u32_to_i32(input_season)?;

    let items_private: Vec<RacePrivate> = races
        .filter(season.eq(input_season))
        .filter(completed.eq(true))
        .order(race_number.asc())
        .load(conn)
        .context("Error loading races")?;
    collect_public(items_private)
}

pub fn update_race(
    conn: &mut PgConnection,
    row_id: u32,
    update: &RaceUpdate,
) -> Result<Option<RaceRecord>> {
    use self::races::dsl::*;

    let update_row = build_update_row(update)?;
    if update_row.is_empty() {
        return get_race_by_id(conn, row_id);
    }

    let row_id = conversions::u32_to_i32(row_id)?;

    diesel::update(races.filter(id.eq(row_id)))
        .set(&update_row)
        .get_result::<RacePrivate>(conn)
        .optional()
        .context("Error updating race")?
        .map(private_to_public)
        .transpose()
}

pub fn mark_race_completed(conn: &mut PgConnection, row_id: u32) -> Result<()> {
    use self::races::dsl::*;

    let row_id = conversions::u32_to_i32(row_id)?;

    diesel::update(races.filter(id.eq(row_id)))
        .set(completed.eq(true))
        .execute(conn)
        .context("Error marking race completed")?;
    Ok(())
}
