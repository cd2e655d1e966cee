use super::*;

table! {
    lead_drivers (id) {
        id -> Integer,
        user_id -> Integer,
        season -> Integer,
        driver_id -> Integer,
        times_used -> Integer,
    }
}

#[derive(Queryable)]
#[diesel(table_name = lead_drivers)]
struct LeadDriverPrivate {
    #[allow(dead_code)]
    id: i32,
    user_id: i32,
    season: i32,
    driver_id: i32,
    times_used: i32,
}

#[derive(Insertable)]
#[diesel(table_name = lead_drivers)]
struct LeadDriverPrivateNew {
    user_id: i32,
    season: i32,
    driver_id: i32,
    times_used: i32,
}

fn private_to_public(p: LeadDriverPrivate) -> Result<LeadDriverRecord> {
    use conversions::*;
    Ok(LeadDriverRecord {
        user_id: i32_to_u32(p.user_id)?,
        season: i32_to_u32(p.season)?,
        driver_id: i32_to_u32(p.driver_id)?,
        times_used: i32_to_u32(p.times_used)?,
    })
}

pub fn get_lead_driver(
    conn: &mut PgConnection,
    input_user_id: u32,
    input_season: u32,
) -> Result<Option<LeadDriverRecord>> {
    use self::lead_drivers::dsl::*;

    let input_user_id = conversions::u32_to_i32(input_user_id)?;
    let input_season = conversions::u32_to_i32(input_season)?;

    lead_drivers
        .filter(user_id.eq(input_user_id))
        .filter(season.eq(input_season))
        .first::<LeadDriverPrivate>(conn)
        .optional()
        .context("Error loading lead driver")?
        .map(private_to_public)
        .transpose()
}

/// Choose the user's lead driver for a season. Switching drivers keeps the usage count.
pub fn set_lead_driver(
    conn: &mut PgConnection,
    input_user_id: u32,
    input_season: u32,
    input_driver_id: u32,
) -> Result<LeadDriverRecord> {
    use self::lead_drivers::dsl::*;

    let insert_row = LeadDriverPrivateNew {
        user_id: conversions::u32_to_i32(input_user_id)?,
        season: conversions::u32_to_i32(input_season)?,
        driver_id: conversions::u32_to_i32(input_driver_id)?,
        times_used: 0,
    };

    let result = diesel::insert_into(lead_drivers)
        .values(&insert_row)
        .on_conflict((user_id, season))
        .do_update()
        .set(driver_id.eq(excluded(driver_id)))
        .get_result::<LeadDriverPrivate>(conn)
        .context("Error saving lead driver")?;
    private_to_public(result)
}

/// Like [`get_lead_driver`], but locks the row until the transaction ends.
/// Concurrent submissions for the same user and season queue up here, so the
/// usage cap is always checked against the count they will update.
pub fn get_lead_driver_for_update(
    conn: &mut PgConnection,
    input_user_id: u32,
    input_season: u32,
) -> Result<Option<LeadDriverRecord>> {
    use self::lead_drivers::dsl::*;

    let input_user_id = conversions::u32_to_i32(input_user_id)?;
    let input_season = conversions::u32_to_i32(input_season)?;

    lead_drivers
        .filter(user_id.eq(input_user_id))
        .filter(season.eq(input_season))
        .for_update()
        .first::<LeadDriverPrivate>(conn)
        .optional()
        .context("Error locking lead driver")?
        .map(private_to_public)
        .transpose()
}

/// Overwrite the usage counter. Read the row with
/// [`get_lead_driver_for_update`] in the same transaction first.
pub fn set_lead_driver_usage(
    conn: &mut PgConnection,
    input_user_id: u32,
    input_season: u32,
    input_times_used: u32,
) -> Result<()> {
    use self::lead_drivers::dsl::*;

    let input_user_id = conversions::u32_to_i32(input_user_id)?;
    let input_season = conversions::u32_to_i32(input_season)?;
    let input_times_used = conversions::u32_to_i32(input_times_used)?;

    let updated = diesel::update(
        lead_drivers
            .filter(user_id.eq(input_user_id))
            .filter(season.eq(input_season)),
    )
    .set(times_used.eq(input_times_used))
    .execute(conn)
    .context("Error updating lead driver usage")?;
    if updated == 0 {
        return Err(anyhow!(
            "No lead driver for user #{input_user_id} in season {input_season}"
        ));
    }
    Ok(())
}
