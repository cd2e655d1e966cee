use super::*;

table! {
    users (id) {
        id -> Integer,
        email -> Varchar,
        team_name -> Varchar,
        is_admin -> Bool,
    }
}

#[derive(Queryable)]
#[diesel(table_name = users)]
struct UserPrivate {
    id: i32,
    email: String,
    team_name: String,
    is_admin: bool,
}

#[derive(Insertable)]
#[diesel(table_name = users)]
struct UserPrivateNew {
    email: String,
    team_name: String,
    is_admin: bool,
}

fn private_to_public(p: UserPrivate) -> Result<UserRecord> {
    use conversions::*;
    Ok(UserRecord {
        user_id: i32_to_u32(p.id)?,
        email: p.email,
        team_name: p.team_name,
        is_admin: p.is_admin,
    })
}

pub fn get_user_by_id(conn: &mut PgConnection, row_id: u32) -> Result<Option<UserRecord>> {
    use self::users::dsl::*;

    let row_id = conversions::u32_to_i32(row_id)?;

    users
        .filter(id.eq(row_id))
        .first::<UserPrivate>(conn)
        .optional()
        .context("Error loading user")?
        .map(private_to_public)
        .transpose()
}

pub fn get_user_by_email(conn: &mut PgConnection, input_email: &str) -> Result<Option<UserRecord>> {
    use self::users::dsl::*;

    users
        .filter(email.eq(input_email))
        .first::<UserPrivate>(conn)
        .optional()
        .context("Error loading user")?
        .map(private_to_public)
        .transpose()
}

/// Insert a user unless the email is already registered, then return the stored row.
pub fn ensure_user(
    conn: &mut PgConnection,
    input_email: &str,
    input_team_name: &str,
    input_is_admin: bool,
) -> Result<UserRecord> {
    use self::users::dsl::*;

    let insert_row = UserPrivateNew {
        email: input_email.to_string(),
        team_name: input_team_name.to_string(),
        is_admin: input_is_admin,
    };

    diesel::insert_into(users)
        .values(&insert_row)
        .on_conflict(email)
        .do_nothing()
        .execute(conn)
        .context("Error inserting user")?;

    get_user_by_email(conn, input_email)?
        .ok_or_else(|| anyhow!("User {input_email} missing after insert"))
}

pub fn get_users_by_ids(conn: &mut PgConnection, row_ids: &[u32]) -> Result<Vec<UserRecord>> {
    use self::users::dsl::*;

    let row_ids = conversions::ids_to_i32(row_ids)?;

    users
        .filter(id.eq_any(row_ids))
        .load::<UserPrivate>(conn)
        .context("Error loading users")?
        .into_iter()
        .map(private_to_public)
        .collect()
}
