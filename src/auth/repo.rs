use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;

use crate::auth::repo_types::{NewUser, Profile, User, UserChanges, UserId};

/// A write collided with an existing email or username. Stores return it
/// inside their `anyhow::Error` so callers can `downcast_ref` it.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("{field} is already taken")]
pub struct UniqueViolation {
    pub field: &'static str,
}

/// Persistence for users and their profiles.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: UserId) -> anyhow::Result<Option<User>>;
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>>;
    async fn find_profile(&self, user_id: UserId) -> anyhow::Result<Option<Profile>>;

    /// Insert the user, then its empty profile. Both exist or neither does.
    async fn create(&self, new_user: NewUser) -> anyhow::Result<(User, Profile)>;

    /// Apply changes to an existing user and its profile.
    async fn update(&self, id: UserId, changes: UserChanges) -> anyhow::Result<(User, Profile)>;

    /// Returns false when no such user exists.
    async fn set_active(&self, id: UserId, active: bool) -> anyhow::Result<bool>;
}

const USER_COLUMNS: &str =
    "id, email, username, password_hash, is_active, created_at, updated_at";
const PROFILE_COLUMNS: &str = "user_id, bio, image, created_at, updated_at";

const UNIQUE_VIOLATION: &str = "23505";

/// Map a Postgres unique-constraint failure on `users` to [`UniqueViolation`].
fn classify_write(err: sqlx::Error, what: &'static str) -> anyhow::Error {
    if let sqlx::Error::Database(db) = &err {
        if db.code().as_deref() == Some(UNIQUE_VIOLATION) {
            let constraint = db.constraint().unwrap_or_default();
            let field = if constraint.contains("username") {
                Some("username")
            } else if constraint.contains("email") {
                Some("email")
            } else {
                None
            };
            if let Some(field) = field {
                return UniqueViolation { field }.into();
            }
        }
    }
    anyhow::Error::new(err).context(what)
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn find_one_by(&self, column: &str, value: &str) -> anyhow::Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(value)
            .fetch_optional(&self.db)
            .await
            .with_context(|| format!("find user by {column}"))?;
        Ok(user)
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_id(&self, id: UserId) -> anyhow::Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .context("find user by id")?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        self.find_one_by("email", email).await
    }

    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        self.find_one_by("username", username).await
    }

    async fn find_profile(&self, user_id: UserId) -> anyhow::Result<Option<Profile>> {
        let sql = format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE user_id = $1");
        let profile = sqlx::query_as::<_, Profile>(&sql)
            .bind(user_id)
            .fetch_optional(&self.db)
            .await
            .context("find profile")?;
        Ok(profile)
    }

    async fn create(&self, new_user: NewUser) -> anyhow::Result<(User, Profile)> {
        let mut tx = self.db.begin().await.context("begin tx")?;

        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (email, username, password_hash)
            VALUES ($1, $2, $3)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&new_user.email)
        .bind(&new_user.username)
        .bind(&new_user.password_hash)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| classify_write(e, "insert user"))?;

        let profile = sqlx::query_as::<_, Profile>(&format!(
            r#"
            INSERT INTO profiles (user_id)
            VALUES ($1)
            RETURNING {PROFILE_COLUMNS}
            "#
        ))
        .bind(user.id)
        .fetch_one(&mut *tx)
        .await
        .context("insert profile")?;

        tx.commit().await.context("commit tx")?;
        Ok((user, profile))
    }

    async fn update(&self, id: UserId, changes: UserChanges) -> anyhow::Result<(User, Profile)> {
        let mut tx = self.db.begin().await.context("begin tx")?;

        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
               SET email = COALESCE($2, email),
                   username = COALESCE($3, username),
                   password_hash = COALESCE($4, password_hash),
                   updated_at = now()
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(changes.email.as_deref())
        .bind(changes.username.as_deref())
        .bind(changes.password_hash.as_deref())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| classify_write(e, "update user"))?;

        let profile = sqlx::query_as::<_, Profile>(&format!(
            r#"
            UPDATE profiles
               SET bio = COALESCE($2, bio),
                   image = COALESCE($3, image),
                   updated_at = now()
             WHERE user_id = $1
            RETURNING {PROFILE_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(changes.bio.as_deref())
        .bind(changes.image.as_deref())
        .fetch_one(&mut *tx)
        .await
        .context("update profile")?;

        tx.commit().await.context("commit tx")?;
        Ok((user, profile))
    }

    async fn set_active(&self, id: UserId, active: bool) -> anyhow::Result<bool> {
        let result = sqlx::query("UPDATE users SET is_active = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(active)
            .execute(&self.db)
            .await
            .context("set user active flag")?;
        Ok(result.rows_affected() == 1)
    }
}
