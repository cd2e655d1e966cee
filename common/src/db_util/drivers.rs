use super::*;

table! {
    drivers (id) {
        id -> Integer,
        name -> Varchar,
        number -> Varchar,
        driver_group -> Varchar,
        season -> Integer,
        active -> Bool,
    }
}

#[derive(Queryable)]
#[diesel(table_name = drivers)]
struct DriverPrivate {
    id: i32,
    name: String,
    number: String,
    driver_group: String,
    season: i32,
    active: bool,
}

#[derive(Insertable)]
#[diesel(table_name = drivers)]
struct DriverPrivateNew {
    name: String,
    number: String,
    driver_group: String,
    season: i32,
    active: bool,
}

#[derive(AsChangeset, Default)]
#[diesel(table_name = drivers)]
struct DriverPrivateUpdate {
    name: Option<String>,
    number: Option<String>,
    driver_group: Option<String>,
    season: Option<i32>,
    active: Option<bool>,
}

impl DriverPrivateUpdate {
    fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.number.is_none()
            && self.driver_group.is_none()
            && self.season.is_none()
            && self.active.is_none()
    }
}

fn private_to_public(p: DriverPrivate) -> Result<DriverRecord> {
    use conversions::*;
    Ok(DriverRecord {
        driver_id: i32_to_u32(p.id)?,
        name: p.name,
        number: p.number,
        group: deserialize_group(&p.driver_group)?,
        season: i32_to_u32(p.season)?,
        active: p.active,
    })
}

fn build_new_row(driver: &NewDriver) -> Result<DriverPrivateNew> {
    use conversions::*;
    Ok(DriverPrivateNew {
        name: driver.name.trim().to_string(),
        number: driver.number.trim().to_string(),
        driver_group: serialize_group(driver.group),
        season: u32_to_i32(driver.season)?,
        active: true,
    })
}

fn build_update_row(update: &DriverUpdate) -> Result<DriverPrivateUpdate> {
    use conversions::*;
    Ok(DriverPrivateUpdate {
        name: update.name.as_ref().map(|n| n.trim().to_string()),
        number: update.number.as_ref().map(|n| n.trim().to_string()),
        driver_group: update.group.map(serialize_group),
        season: optu32_to_opti32(update.season)?,
        active: update.active,
    })
}

fn collect_public(items_private: Vec<DriverPrivate>) -> Result<Vec<DriverRecord>> {
    items_private
        .into_iter()
        .map(private_to_public)
        .collect::<Result<Vec<DriverRecord>>>()
}

pub fn insert_driver(conn: &mut PgConnection, driver: &NewDriver) -> Result<DriverRecord> {
    use self::drivers::dsl::*;

    let insert_row = build_new_row(driver)?;

    let result = diesel::insert_into(drivers)
        .values(&insert_row)
        .get_result::<DriverPrivate>(conn)
        .context("Error inserting driver")?;
    private_to_public(result)
}

/// Insert a driver unless its number is already taken for the season.
pub fn ensure_driver(conn: &mut PgConnection, driver: &NewDriver) -> Result<()> {
    use self::drivers::dsl::*;

    let insert_row = build_new_row(driver)?;

    diesel::insert_into(drivers)
        .values(&insert_row)
        .on_conflict((number, season))
        .do_nothing()
        .execute(conn)
        .context("Error inserting driver")?;
    Ok(())
}

pub fn get_driver_by_id(conn: &mut PgConnection, row_id: u32) -> Result<Option<DriverRecord>> {
    use self::drivers::dsl::*;

    let row_id = conversions::u32_to_i32(row_id)?;

    drivers
        .filter(id.eq(row_id))
        .first::<DriverPrivate>(conn)
        .optional()
        .context("Error loading driver")?
        .map(private_to_public)
        .transpose()
}

pub fn get_drivers_by_ids(conn: &mut PgConnection, row_ids: &[u32]) -> Result<Vec<DriverRecord>> {
    use self::drivers::dsl::*;

    let row_ids = conversions::ids_to_i32(row_ids)?;

    let items_private: Vec<DriverPrivate> = drivers
        .filter(id.eq_any(row_ids))
        .load(conn)
        .context("Error loading drivers")?;
    collect_public(items_private)
}

/// All drivers entered in a season, active or not, ordered by id.
pub fn get_drivers_in_season(
    conn: &mut PgConnection,
    input_season: u32,
) -> Result<Vec<DriverRecord>> {
    use self::drivers::dsl::*;

    let input_season = conversions::u32_to_i32(input_season)?;

    let items_private: Vec<DriverPrivate> = drivers
        .filter(season.eq(input_season))
        .order(id.asc())
        .load(conn)
        .context("Error loading drivers")?;
    collect_public(items_private)
}

/// Active drivers, optionally narrowed to a group and/or season.
/// Numbers are strings, so ordering is done numerically here rather than in sql.
pub fn get_active_drivers(
    conn: &mut PgConnection,
    input_group: Option<DriverGroup>,
    input_season: Option<u32>,
) -> Result<Vec<DriverRecord>> {
    use self::drivers::dsl::*;

    let mut query = drivers.filter(active.eq(true)).into_boxed();
    if let Some(g) = input_group {
        query = query.filter(driver_group.eq(conversions::serialize_group(g)));
    }
    if let Some(s) = input_season {
        query = query.filter(season.eq(conversions::u32_to_i32(s)?));
    }

    let items_private: Vec<DriverPrivate> = query
        .order(id.asc())
        .load(conn)
        .context("Error loading drivers")?;

    let mut items = collect_public(items_private)?;
    items.sort_by_key(|d| (d.number.parse::<u32>().unwrap_or(u32::MAX), d.number.clone()));
    Ok(items)
}

pub fn update_driver(
    conn: &mut PgConnection,
    row_id: u32,
    update: &DriverUpdate,
) -> Result<Option<DriverRecord>> {
    use self::drivers::dsl::*;

    let update_row = build_update_row(update)?;
    if update_row.is_empty() {
        return get_driver_by_id(conn, row_id);
    }

    let row_id = conversions::u32_to_i32(row_id)?;

    diesel::update(drivers.filter(id.eq(row_id)))
        .set(&update_row)
        .get_result::<DriverPrivate>(conn)
        .optional()
        .context("Error updating driver")?
        .map(private_to_public)
        .transpose()
}
