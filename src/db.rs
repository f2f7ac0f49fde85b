use std::str::FromStr;

use serde::Serialize;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    FromRow, SqlitePool,
};
use uuid::Uuid;

use crate::{entry, AppResult};

pub async fn connect(database_url: &str) -> AppResult<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let db_pool = SqlitePoolOptions::new()
        .max_connections(16)
        .connect_with(options)
        .await?;

    migrate(&db_pool).await?;
    Ok(db_pool)
}

pub async fn migrate(db_pool: &SqlitePool) -> AppResult<()> {
    sqlx::migrate!("./migrations").run(db_pool).await?;
    Ok(())
}

pub fn now_millis() -> i64 {
    (time::OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

pub fn new_id() -> String {
    Uuid::now_v7().to_string()
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    pub id: String,
    #[serde(skip)]
    pub google_sub: Option<String>,
    pub email: String,
    pub name: String,
    pub picture: Option<String>,
    pub bio: String,
    pub department: Option<String>,
    pub program: Option<String>,
    pub entry_year: Option<i64>,
    pub created_at: i64,
    pub last_login_at: i64,
}

/// What other people get to see next to a post or message.
#[derive(Debug, Clone, FromRow, Serialize, PartialEq)]
pub struct UserSummary {
    pub id: String,
    pub name: String,
    pub picture: Option<String>,
    pub department: Option<String>,
}

pub const USER_COLUMNS: &str =
    "id,google_sub,email,name,picture,bio,department,program,entry_year,created_at,last_login_at";

pub async fn find_user(db_pool: &SqlitePool, user_id: &str) -> AppResult<Option<User>> {
    Ok(
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id=?"))
            .bind(user_id)
            .fetch_optional(db_pool)
            .await?
    )
}

pub async fn find_summary(db_pool: &SqlitePool, user_id: &str) -> AppResult<Option<UserSummary>> {
    Ok(
        sqlx::query_as::<_, UserSummary>("SELECT id,name,picture,department FROM users WHERE id=?")
            .bind(user_id)
            .fetch_optional(db_pool)
            .await?
    )
}

pub async fn is_blocked(db_pool: &SqlitePool, email: &str) -> AppResult<bool> {
    Ok(
        sqlx::query("SELECT 1 FROM blocked_users WHERE email=?")
            .bind(email.to_lowercase())
            .fetch_optional(db_pool)
            .await?
            .is_some()
    )
}

/// Identity handed over by a sign-in method.
pub struct SignIn<'a> {
    pub google_sub: Option<&'a str>,
    pub email: &'a str,
    pub name: &'a str,
    pub picture: Option<&'a str>,
}

/// Finds the account for a sign-in (by Google subject first, then by email)
/// and refreshes it, or creates a new one.
pub async fn upsert_user(db_pool: &SqlitePool, sign_in: SignIn<'_>) -> AppResult<User> {
    let email = sign_in.email.to_lowercase();
    let now = now_millis();

    let existing: Option<(String, String)> = match sign_in.google_sub {
        Some(sub) => {
            sqlx::query_as("SELECT id,email FROM users WHERE google_sub=?1 OR email=?2 ORDER BY google_sub=?1 DESC LIMIT 1")
                .bind(sub)
                .bind(&email)
                .fetch_optional(db_pool)
                .await?
        }
        None => {
            sqlx::query_as("SELECT id,email FROM users WHERE email=?")
                .bind(&email)
                .fetch_optional(db_pool)
                .await?
        }
    };

    let user_id = match existing {
        Some((user_id, current_email)) => {
            let taken = current_email != email
                && sqlx::query("SELECT 1 FROM users WHERE email=? AND id<>?")
                    .bind(&email)
                    .bind(&user_id)
                    .fetch_optional(db_pool)
                    .await?
                    .is_some();
            let email = if taken {
                tracing::warn!("{user_id} signed in as {email}, which belongs to another account; keeping {current_email}");
                current_email
            } else {
                email
            };
            let info = entry::parse(&email);

            sqlx::query(
                "UPDATE users SET google_sub=COALESCE(?,google_sub),email=?,picture=COALESCE(?,picture),
                 department=?,program=?,entry_year=?,last_login_at=? WHERE id=?",
            )
            .bind(sign_in.google_sub)
            .bind(&email)
            .bind(sign_in.picture)
            .bind(info.as_ref().map(|i| i.department))
            .bind(info.as_ref().map(|i| i.program))
            .bind(info.as_ref().map(|i| i.entry_year))
            .bind(now)
            .bind(&user_id)
            .execute(db_pool)
            .await?;
            user_id
        }
        None => {
            let user_id = new_id();
            let info = entry::parse(&email);
            let name = match sign_in.name.trim() {
                "" => email.split('@').next().unwrap_or_default().to_owned(),
                name => name.to_owned(),
            };

            tracing::info!("adding {email} as {user_id} ({name})");
            sqlx::query(
                "INSERT INTO users (id,google_sub,email,name,picture,bio,department,program,entry_year,created_at,last_login_at)
                 VALUES (?,?,?,?,?,'',?,?,?,?,?)",
            )
            .bind(&user_id)
            .bind(sign_in.google_sub)
            .bind(&email)
            .bind(name)
            .bind(sign_in.picture)
            .bind(info.as_ref().map(|i| i.department))
            .bind(info.as_ref().map(|i| i.program))
            .bind(info.as_ref().map(|i| i.entry_year))
            .bind(now)
            .bind(now)
            .execute(db_pool)
            .await?;
            user_id
        }
    };

    find_user(db_pool, &user_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("user {user_id} vanished after upsert").into())
}

/// Clamps a client-supplied page size.
pub fn page_limit(limit: Option<i64>, default: i64, max: i64) -> i64 {
    limit.unwrap_or(default).clamp(1, max)
}

#[cfg(test)]
pub(crate) async fn memory_pool() -> SqlitePool {
    let db_pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    migrate(&db_pool).await.unwrap();
    db_pool
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upsert_creates_then_updates() {
        let db_pool = memory_pool().await;

        let created = upsert_user(&db_pool, SignIn {
            google_sub: Some("g-1"),
            email: "CS1200123@iitd.ac.in",
            name: "Asha",
            picture: None,
        })
        .await
        .unwrap();
        assert_eq!(created.email, "cs1200123@iitd.ac.in");
        assert_eq!(created.department.as_deref(), Some("Computer Science and Engineering"));
        assert_eq!(created.entry_year, Some(2020));

        let again = upsert_user(&db_pool, SignIn {
            google_sub: Some("g-1"),
            email: "cs1200123@iitd.ac.in",
            name: "Someone Else",
            picture: Some("https://example.com/a.png"),
        })
        .await
        .unwrap();
        assert_eq!(again.id, created.id);
        assert_eq!(again.name, "Asha");
        assert_eq!(again.picture.as_deref(), Some("https://example.com/a.png"));
    }

    #[tokio::test]
    async fn blank_name_falls_back_to_local_part() {
        let db_pool = memory_pool().await;
        let user = upsert_user(&db_pool, SignIn {
            google_sub: None,
            email: "visitor@example.com",
            name: "  ",
            picture: None,
        })
        .await
        .unwrap();
        assert_eq!(user.name, "visitor");
        assert_eq!(user.department, None);
    }

    #[tokio::test]
    async fn google_account_keeps_its_email_when_the_new_one_is_taken() {
        let db_pool = memory_pool().await;
        let reviewer = upsert_user(&db_pool, SignIn {
            google_sub: None,
            email: "cs1200123@iitd.ac.in",
            name: "Reviewer",
            picture: None,
        })
        .await
        .unwrap();
        let google = upsert_user(&db_pool, SignIn {
            google_sub: Some("g-2"),
            email: "ee1210001@iitd.ac.in",
            name: "Ravi",
            picture: None,
        })
        .await
        .unwrap();

        let again = upsert_user(&db_pool, SignIn {
            google_sub: Some("g-2"),
            email: "cs1200123@iitd.ac.in",
            name: "Ravi",
            picture: None,
        })
        .await
        .unwrap();
        assert_eq!(again.id, google.id);
        assert_eq!(again.email, "ee1210001@iitd.ac.in");
        assert_eq!(again.department.as_deref(), Some("Electrical Engineering"));
        assert_eq!(find_user(&db_pool, &reviewer.id).await.unwrap().unwrap().email, "cs1200123@iitd.ac.in");
    }

    #[test]
    fn page_limits_are_clamped() {
        assert_eq!(page_limit(None, 20, 50), 20);
        assert_eq!(page_limit(Some(500), 20, 50), 50);
        assert_eq!(page_limit(Some(-3), 20, 50), 1);
    }
}
