//! Request guards for the caller's identity.
//!
//! Sign-in happens upstream; the proxy in front of the API forwards the
//! authenticated user's id in `X-User-Id`. These guards only resolve that id
//! to a user and check the admin flag.

use pitbox_common::UserRecord;
use pitbox_common::db_util::{PgPool, get_pooled_database_connection, get_user_by_id};
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome, Request};

pub const USER_ID_HEADER: &str = "X-User-Id";

/// Any signed-in user.
pub struct AuthedUser(pub UserRecord);

/// A signed-in user with the admin flag.
pub struct AdminUser(pub UserRecord);

fn parse_user_id(raw: &str) -> Option<u32> {
    raw.trim().parse::<u32>().ok().filter(|id| *id > 0)
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthedUser {
    type Error = &'static str;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let Some(user_id) = request
            .headers()
            .get_one(USER_ID_HEADER)
            .and_then(parse_user_id)
        else {
            return Outcome::Error((Status::Unauthorized, "missing or invalid user id"));
        };

        let Some(pool) = request.rocket().state::<PgPool>() else {
            return Outcome::Error((Status::InternalServerError, "database pool not configured"));
        };

        let lookup = get_pooled_database_connection(pool)
            .and_then(|mut conn| get_user_by_id(&mut conn, user_id));
        match lookup {
            Ok(Some(user)) => Outcome::Success(AuthedUser(user)),
            Ok(None) => {
                tracing::warn!(user_id = user_id, "Request for unknown user");
                Outcome::Error((Status::Unauthorized, "unknown user"))
            }
            Err(e) => {
                tracing::error!(error = %format!("{e:#}"), "Failed to load user");
                Outcome::Error((Status::InternalServerError, "failed to load user"))
            }
        }
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AdminUser {
    type Error = &'static str;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match request.guard::<AuthedUser>().await {
            Outcome::Success(AuthedUser(user)) if user.is_admin => {
                Outcome::Success(AdminUser(user))
            }
            Outcome::Success(AuthedUser(user)) => {
                tracing::warn!(user_id = user.user_id, "Admin route refused");
                Outcome::Error((Status::Forbidden, "admin only"))
            }
            Outcome::Error(e) => Outcome::Error(e),
            Outcome::Forward(status) => Outcome::Forward(status),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_user_id() {
        assert_eq!(parse_user_id("42"), Some(42));
        assert_eq!(parse_user_id(" 7 "), Some(7));
        assert_eq!(parse_user_id("0"), None);
        assert_eq!(parse_user_id("-3"), None);
        assert_eq!(parse_user_id("admin"), None);
    }
}
