use anyhow::{Context, Result};
use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use std::collections::HashMap;
use tokio::task;

use crate::config::SecurityConfig;
use crate::entities::{
    member_profiles, otp_codes, prelude::*, setup_tokens, user_guilds, user_roles, users,
};

/// User data returned from the repository (without the password hash).
#[derive(Debug, Clone)]
pub struct User {
    pub id: i32,
    pub email: String,
    /// Whether setup has been completed (password hash present).
    pub has_password: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<users::Model> for User {
    fn from(model: users::Model) -> Self {
        Self {
            id: model.id,
            email: model.email,
            has_password: model.password_hash.is_some(),
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

pub struct UserRepository {
    conn: DatabaseConnection,
}

impl UserRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn get_by_id(&self, id: i32) -> Result<Option<User>> {
        let user = Users::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query user by ID")?;

        Ok(user.map(User::from))
    }

    pub async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = find_by_email(&self.conn, email)
            .await
            .context("Failed to query user by email")?;

        Ok(user.map(User::from))
    }

    /// Newest first, matching the admin list view.
    pub async fn list_all(&self) -> Result<Vec<User>> {
        let rows = Users::find()
            .order_by_desc(users::Column::CreatedAt)
            .all(&self.conn)
            .await
            .context("Failed to list users")?;

        Ok(rows.into_iter().map(User::from).collect())
    }

    pub async fn roles_for_user(&self, user_id: i32) -> Result<Vec<String>> {
        let rows = UserRoles::find()
            .filter(user_roles::Column::UserId.eq(user_id))
            .all(&self.conn)
            .await
            .context("Failed to query user roles")?;

        Ok(rows.into_iter().map(|r| r.role).collect())
    }

    pub async fn roles_by_user_ids(&self, user_ids: &[i32]) -> Result<HashMap<i32, Vec<String>>> {
        let rows = UserRoles::find()
            .filter(user_roles::Column::UserId.is_in(user_ids.to_vec()))
            .all(&self.conn)
            .await
            .context("Failed to batch-query user roles")?;

        let mut map: HashMap<i32, Vec<String>> = HashMap::new();
        for row in rows {
            map.entry(row.user_id).or_default().push(row.role);
        }

        Ok(map)
    }

    /// Verify a login password for a user.
    /// Note: This uses `spawn_blocking` because Argon2 verification is
    /// CPU-intensive and would block the async runtime if run directly.
    /// A user that never completed setup (no hash) never matches.
    pub async fn verify_password(&self, email: &str, password: &str) -> Result<bool> {
        let user = find_by_email(&self.conn, email)
            .await
            .context("Failed to query user for password verification")?;

        let Some(hash) = user.and_then(|u| u.password_hash) else {
            return Ok(false);
        };

        let password = password.to_string();
        let is_valid = task::spawn_blocking(move || verify_secret(&password, &hash))
            .await
            .context("Password verification task panicked")?;

        Ok(is_valid)
    }

    /// Hashes and stores a new password for the user.
    pub async fn update_password(
        &self,
        user_id: i32,
        new_password: &str,
        config: &SecurityConfig,
    ) -> Result<()> {
        let password = new_password.to_string();
        let config = config.clone();
        let new_hash = task::spawn_blocking(move || hash_secret(&password, &config))
            .await
            .context("Password hashing task panicked")??;

        set_password_hash(&self.conn, user_id, &new_hash)
            .await
            .context("Failed to update password")?;

        Ok(())
    }

    /// Removes the user and everything hanging off it in one transaction.
    /// Returns false when the user does not exist.
    pub async fn delete_cascade(&self, user_id: i32) -> Result<bool> {
        let Some(user) = Users::find_by_id(user_id).one(&self.conn).await? else {
            return Ok(false);
        };

        let email = user.email.clone();

        self.conn
            .transaction::<_, (), DbErr>(move |txn| {
                Box::pin(async move {
                    UserRoles::delete_many()
                        .filter(user_roles::Column::UserId.eq(user_id))
                        .exec(txn)
                        .await?;

                    UserGuilds::delete_many()
                        .filter(user_guilds::Column::UserId.eq(user_id))
                        .exec(txn)
                        .await?;

                    MemberProfiles::delete_many()
                        .filter(member_profiles::Column::UserId.eq(user_id))
                        .exec(txn)
                        .await?;

                    SetupTokens::delete_many()
                        .filter(setup_tokens::Column::UserId.eq(user_id))
                        .exec(txn)
                        .await?;

                    OtpCodes::delete_many()
                        .filter(otp_codes::Column::Email.eq(email))
                        .exec(txn)
                        .await?;

                    Users::delete_by_id(user_id).exec(txn).await?;

                    Ok(())
                })
            })
            .await
            .context("Failed to delete user")?;

        Ok(true)
    }
}

/// Look up a full user row (including the password hash) by email.
pub async fn find_by_email<C: ConnectionTrait>(
    conn: &C,
    email: &str,
) -> Result<Option<users::Model>, DbErr> {
    Users::find()
        .filter(users::Column::Email.eq(email))
        .one(conn)
        .await
}

/// Insert a user with no password hash (setup pending).
pub async fn insert_user<C: ConnectionTrait>(
    conn: &C,
    email: &str,
) -> Result<users::Model, DbErr> {
    let now = chrono::Utc::now().to_rfc3339();

    let active = users::ActiveModel {
        email: Set(email.to_string()),
        password_hash: Set(None),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    };

    active.insert(conn).await
}

/// Store a pre-computed password hash for the user.
pub async fn set_password_hash<C: ConnectionTrait>(
    conn: &C,
    user_id: i32,
    hash: &str,
) -> Result<(), DbErr> {
    let user = Users::find_by_id(user_id)
        .one(conn)
        .await?
        .ok_or_else(|| DbErr::RecordNotFound(format!("user {user_id}")))?;

    let mut active: users::ActiveModel = user.into();
    active.password_hash = Set(Some(hash.to_string()));
    active.updated_at = Set(chrono::Utc::now().to_rfc3339());
    active.update(conn).await?;

    Ok(())
}

/// Change a user's email address. Unique-constraint violations surface as
/// their own `DbErr` kind for the caller to map.
pub async fn update_email<C: ConnectionTrait>(
    conn: &C,
    user_id: i32,
    email: &str,
) -> Result<users::Model, DbErr> {
    let user = Users::find_by_id(user_id)
        .one(conn)
        .await?
        .ok_or_else(|| DbErr::RecordNotFound(format!("user {user_id}")))?;

    if user.email == email {
        return Ok(user);
    }

    let mut active: users::ActiveModel = user.into();
    active.email = Set(email.to_string());
    active.updated_at = Set(chrono::Utc::now().to_rfc3339());
    active.update(conn).await
}

/// Grant a role unless the user already holds it.
pub async fn ensure_role<C: ConnectionTrait>(
    conn: &C,
    user_id: i32,
    role: &str,
) -> Result<(), DbErr> {
    let existing = UserRoles::find()
        .filter(user_roles::Column::UserId.eq(user_id))
        .filter(user_roles::Column::Role.eq(role))
        .one(conn)
        .await?;

    if existing.is_some() {
        return Ok(());
    }

    let active = user_roles::ActiveModel {
        user_id: Set(user_id),
        role: Set(role.to_string()),
        ..Default::default()
    };

    active.insert(conn).await?;
    Ok(())
}

/// Hash a secret (password, setup token, or OTP code) using Argon2id with the
/// configured work factor.
pub fn hash_secret(secret: &str, config: &SecurityConfig) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);

    let params = Params::new(
        config.argon2_memory_cost_kib,
        config.argon2_time_cost,
        config.argon2_parallelism,
        None,
    )
    .map_err(|e| anyhow::anyhow!("Invalid Argon2 params: {e}"))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let hash = argon2
        .hash_password(secret.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash secret: {e}"))?;

    Ok(hash.to_string())
}

/// Verify a secret against a stored hash with the hash function's own
/// constant-time comparison. Malformed hashes simply fail verification.
#[must_use]
pub fn verify_secret(secret: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };

    Argon2::default()
        .verify_password(secret.as_bytes(), &parsed)
        .is_ok()
}
