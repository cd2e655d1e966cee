use super::*;

table! {
    standings (id) {
        id -> Integer,
        user_id -> Integer,
        season -> Integer,
        total_points -> Integer,
        weekly_points -> Jsonb,
        last_updated -> Timestamptz,
    }
}

#[derive(Queryable)]
#[diesel(table_name = standings)]
struct StandingPrivate {
    #[allow(dead_code)]
    id: i32,
    user_id: i32,
    season: i32,
    total_points: i32,
    weekly_points: Value,
    last_updated: DateTime<Utc>,
}

#[derive(Insertable)]
#[diesel(table_name = standings)]
struct StandingPrivateNew {
    user_id: i32,
    season: i32,
    total_points: i32,
    weekly_points: Value,
    last_updated: DateTime<Utc>,
}

/// A standing joined with its owner's team name.
#[derive(Debug, QueryableByName)]
struct StandingWithTeam {
    #[diesel(sql_type = diesel::sql_types::Integer)]
    user_id: i32,
    #[diesel(sql_type = diesel::sql_types::Integer)]
    season: i32,
    #[diesel(sql_type = diesel::sql_types::Integer)]
    total_points: i32,
    #[diesel(sql_type = diesel::sql_types::Jsonb)]
    weekly_points: Value,
    #[diesel(sql_type = diesel::sql_types::Timestamptz)]
    last_updated: DateTime<Utc>,
    #[diesel(sql_type = diesel::sql_types::Text)]
    team_name: String,
}

fn private_to_public(p: StandingPrivate) -> Result<StandingRecord> {
    use conversions::*;
    Ok(StandingRecord {
        user_id: i32_to_u32(p.user_id)?,
        season: i32_to_u32(p.season)?,
        total_points: i32_to_u32(p.total_points)?,
        weekly_points: deserialize_weekly_points(p.weekly_points)?,
        last_updated: p.last_updated,
    })
}

fn build_new_row(
    user: u32,
    input_season: u32,
    weekly: &WeeklyPoints,
    total: u32,
) -> Result<StandingPrivateNew> {
    use conversions::*;
    Ok(StandingPrivateNew {
        user_id: u32_to_i32(user)?,
        season: u32_to_i32(input_season)?,
        total_points: u32_to_i32(total)?,
        weekly_points: serialize_weekly_points(weekly)?,
        last_updated: Utc::now(),
    })
}

pub fn get_standing(
    conn: &mut PgConnection,
    input_user_id: u32,
    input_season: u32,
) -> Result<Option<StandingRecord>> {
    use self::standings::dsl::*;

    let input_user_id = conversions::u32_to_i32(input_user_id)?;
    let input_season = conversions::u32_to_i32(input_season)?;

    standings
        .filter(user_id.eq(input_user_id))
        .filter(season.eq(input_season))
        .first::<StandingPrivate>(conn)
        .optional()
        .context("Error loading standing")?
        .map(private_to_public)
        .transpose()
}

/// Write the full weekly map and total for a user's season, creating the row if needed.
pub fn upsert_standing(
    conn: &mut PgConnection,
    user: u32,
    input_season: u32,
    weekly: &WeeklyPoints,
    total: u32,
) -> Result<()> {
    use self::standings::dsl::*;

    let insert_row = build_new_row(user, input_season, weekly, total)?;

    diesel::insert_into(standings)
        .values(&insert_row)
        .on_conflict((user_id, season))
        .do_update()
        .set((
            total_points.eq(excluded(total_points)),
            weekly_points.eq(excluded(weekly_points)),
            last_updated.eq(excluded(last_updated)),
        ))
        .execute(conn)
        .context("Error saving standing")?;
    Ok(())
}

/// Create an empty standing for a user's season if none exists yet.
pub fn ensure_standing(conn: &mut PgConnection, user: u32, input_season: u32) -> Result<()> {
    use self::standings::dsl::*;

    let insert_row = build_new_row(user, input_season, &WeeklyPoints::new(), 0)?;

    diesel::insert_into(standings)
        .values(&insert_row)
        .on_conflict((user_id, season))
        .do_nothing()
        .execute(conn)
        .context("Error creating standing")?;
    Ok(())
}

/// Remove every standing of a season. Only used before a full rebuild.
pub fn delete_standings_in_season(conn: &mut PgConnection, input_season: u32) -> Result<usize> {
    use self::standings::dsl::*;

    let input_season = conversions::u32_to_i32(input_season)?;

    diesel::delete(standings.filter(season.eq(input_season)))
        .execute(conn)
        .context("Error deleting standings")
}

/// Every standing of a season with the owner's team name, unordered.
pub fn get_standings_with_teams(
    conn: &mut PgConnection,
    input_season: u32,
) -> Result<Vec<(StandingRecord, String)>> {
    use diesel::sql_query;
    use diesel::sql_types::Integer;

    let input_season = conversions::u32_to_i32(input_season)?;

    let query = "SELECT s.user_id, s.season, s.total_points, s.weekly_points, s.last_updated,
            u.team_name
        FROM standings s
        JOIN users u ON u.id = s.user_id
        WHERE s.season = $1;";

    let items: Vec<StandingWithTeam> = sql_query(query)
        .bind::<Integer, _>(input_season)
        .load(conn)
        .context("Error loading standings")?;

    items
        .into_iter()
        .map(|item| {
            let standing = StandingRecord {
                user_id: conversions::i32_to_u32(item.user_id)?,
                season: conversions::i32_to_u32(item.season)?,
                total_points: conversions::i32_to_u32(item.total_points)?,
                weekly_points: conversions::deserialize_weekly_points(item.weekly_points)?,
                last_updated: item.last_updated,
            };
            Ok((standing, item.team_name))
        })
        .collect::<Result<Vec<_>>>()
}
