use super::*;

table! {
    picks (id) {
        id -> Integer,
        user_id -> Integer,
        race_id -> Integer,
        driver_a_id -> Integer,
        driver_b_id -> Integer,
        is_lead_driver -> Bool,
        submitted_at -> Timestamptz,
    }
}

#[derive(Queryable)]
#[diesel(table_name = picks)]
struct PickPrivate {
    id: i32,
    user_id: i32,
    race_id: i32,
    driver_a_id: i32,
    driver_b_id: i32,
    is_lead_driver: bool,
    submitted_at: DateTime<Utc>,
}

#[derive(Insertable)]
#[diesel(table_name = picks)]
struct PickPrivateNew {
    user_id: i32,
    race_id: i32,
    driver_a_id: i32,
    driver_b_id: i32,
    is_lead_driver: bool,
    submitted_at: DateTime<Utc>,
}

fn private_to_public(p: PickPrivate) -> Result<PickRecord> {
    use conversions::*;
    Ok(PickRecord {
        pick_id: i32_to_u32(p.id)?,
        user_id: i32_to_u32(p.user_id)?,
        race_id: i32_to_u32(p.race_id)?,
        driver_a_id: i32_to_u32(p.driver_a_id)?,
        driver_b_id: i32_to_u32(p.driver_b_id)?,
        is_lead_driver: p.is_lead_driver,
        submitted_at: p.submitted_at,
    })
}

fn build_new_row(user: u32, submission: &PickSubmission) -> Result<PickPrivateNew> {
    use conversions::*;
    Ok(PickPrivateNew {
        user_id: u32_to_i32(user)?,
        race_id: u32_to_i32(submission.race_id)?,
        driver_a_id: u32_to_i32(submission.driver_a_id)?,
        driver_b_id: u32_to_i32(submission.driver_b_id)?,
        is_lead_driver: submission.is_lead_driver,
        submitted_at: Utc::now(),
    })
}

fn collect_public(items_private: Vec<PickPrivate>) -> Result<Vec<PickRecord>> {
    items_private
        .into_iter()
        .map(private_to_public)
        .collect::<Result<Vec<PickRecord>>>()
}

/// Create the user's pick for the race, or replace the drivers of an existing one.
pub fn upsert_pick(
    conn: &mut PgConnection,
    user: u32,
    submission: &PickSubmission,
) -> Result<PickRecord> {
    use self::picks::dsl::*;

    let insert_row = build_new_row(user, submission)?;

    let result = diesel::insert_into(picks)
        .values(&insert_row)
        .on_conflict((user_id, race_id))
        .do_update()
        .set((
            driver_a_id.eq(excluded(driver_a_id)),
            driver_b_id.eq(excluded(driver_b_id)),
            is_lead_driver.eq(excluded(is_lead_driver)),
            submitted_at.eq(excluded(submitted_at)),
        ))
        .get_result::<PickPrivate>(conn)
        .context("Error saving pick")?;
    private_to_public(result)
}

pub fn get_pick_for_user_and_race(
    conn: &mut PgConnection,
    input_user_id: u32,
    input_race_id: u32,
) -> Result<Option<PickRecord>> {
    use self::picks::dsl::*;

    let input_user_id = conversions::u32_to_i32(input_user_id)?;
    let input_race_id = conversions::u32_to_i32(input_race_id)?;

    picks
        .filter(user_id.eq(input_user_id))
        .filter(race_id.eq(input_race_id))
        .first::<PickPrivate>(conn)
        .optional()
        .context("Error loading pick")?
        .map(private_to_public)
        .transpose()
}

pub fn get_picks_by_race(conn: &mut PgConnection, input_race_id: u32) -> Result<Vec<PickRecord>> {
    use self::picks::dsl::*;

    let input_race_id = conversions::u32_to_i32(input_race_id)?;

    let items_private: Vec<PickPrivate> = picks
        .filter(race_id.eq(input_race_id))
        .order(id.asc())
        .load(conn)
        .context("Error loading picks")?;
    collect_public(items_private)
}

/// A user's picks across all races, newest submission first.
pub fn get_picks_by_user(conn: &mut PgConnection, input_user_id: u32) -> Result<Vec<PickRecord>> {
    use self::picks::dsl::*;

    let input_user_id = conversions::u32_to_i32(input_user_id)?;

    let items_private: Vec<PickPrivate> = picks
        .filter(user_id.eq(input_user_id))
        .order(submitted_at.desc())
        .load(conn)
        .context("Error loading picks")?;
    collect_public(items_private)
}

/// Load the teams, races and drivers referenced by `items` and join them on.
pub fn get_pick_details(
    conn: &mut PgConnection,
    items: Vec<PickRecord>,
) -> Result<Vec<PickDetail>> {
    use itertools::Itertools;

    let user_ids = items.iter().map(|p| p.user_id).unique().collect_vec();
    let race_ids = items.iter().map(|p| p.race_id).unique().collect_vec();
    let driver_ids = items
        .iter()
        .flat_map(|p| [p.driver_a_id, p.driver_b_id])
        .unique()
        .collect_vec();

    let users = get_users_by_ids(conn, &user_ids)?;
    let races = get_races_by_ids(conn, &race_ids)?;
    let drivers = get_drivers_by_ids(conn, &driver_ids)?;
    crate::picks::pick_details(items, &users, &races, &drivers)
}
