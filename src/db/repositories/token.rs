use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, Set,
};

use crate::entities::{otp_codes, prelude::*, setup_tokens};

pub struct TokenRepository {
    conn: DatabaseConnection,
}

impl TokenRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// All setup tokens that are still live at `now`. The verifier scans
    /// these because the stored form is a one-way hash and cannot be looked
    /// up by key.
    pub async fn list_unexpired(&self, now: DateTime<Utc>) -> Result<Vec<setup_tokens::Model>> {
        SetupTokens::find()
            .filter(setup_tokens::Column::ExpiresAt.gt(now))
            .all(&self.conn)
            .await
            .context("Failed to list unexpired setup tokens")
    }

    /// Drops expired rows so the verifier's scan set stays small.
    pub async fn prune_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = SetupTokens::delete_many()
            .filter(setup_tokens::Column::ExpiresAt.lte(now))
            .exec(&self.conn)
            .await
            .context("Failed to prune expired setup tokens")?;

        Ok(result.rows_affected)
    }

    pub async fn count_for_user(&self, user_id: i32) -> Result<u64> {
        use sea_orm::PaginatorTrait;

        SetupTokens::find()
            .filter(setup_tokens::Column::UserId.eq(user_id))
            .count(&self.conn)
            .await
            .context("Failed to count setup tokens")
    }

    pub async fn get_otp_by_email(&self, email: &str) -> Result<Option<otp_codes::Model>> {
        OtpCodes::find()
            .filter(otp_codes::Column::Email.eq(email))
            .one(&self.conn)
            .await
            .context("Failed to query OTP code by email")
    }
}

/// Replace any live token for the user with a fresh one. At most one live
/// setup token per user, at every issuance site.
pub async fn replace_for_user<C: ConnectionTrait>(
    conn: &C,
    user_id: i32,
    token_hash: &str,
    expires_at: DateTime<Utc>,
) -> Result<(), DbErr> {
    SetupTokens::delete_many()
        .filter(setup_tokens::Column::UserId.eq(user_id))
        .exec(conn)
        .await?;

    let active = setup_tokens::ActiveModel {
        user_id: Set(user_id),
        token_hash: Set(token_hash.to_string()),
        expires_at: Set(expires_at),
        created_at: Set(Utc::now()),
        ..Default::default()
    };

    active.insert(conn).await?;
    Ok(())
}

/// Consume a setup token. Returns the number of rows deleted; a concurrent
/// redemption of the same token leaves this at zero for the loser.
pub async fn consume_token<C: ConnectionTrait>(conn: &C, token_id: i32) -> Result<u64, DbErr> {
    let result = SetupTokens::delete_by_id(token_id).exec(conn).await?;
    Ok(result.rows_affected)
}

/// Upsert the OTP row for an email address: the address is the lookup
/// selector, so only one code per address can be live.
pub async fn upsert_otp<C: ConnectionTrait>(
    conn: &C,
    email: &str,
    code_hash: &str,
    expires_at: DateTime<Utc>,
) -> Result<(), DbErr> {
    OtpCodes::delete_many()
        .filter(otp_codes::Column::Email.eq(email))
        .exec(conn)
        .await?;

    let active = otp_codes::ActiveModel {
        email: Set(email.to_string()),
        code_hash: Set(code_hash.to_string()),
        expires_at: Set(expires_at),
        created_at: Set(Utc::now()),
        ..Default::default()
    };

    active.insert(conn).await?;
    Ok(())
}

/// Consume an OTP row; same rows-affected contract as [`consume_token`].
pub async fn consume_otp<C: ConnectionTrait>(conn: &C, otp_id: i32) -> Result<u64, DbErr> {
    let result = OtpCodes::delete_by_id(otp_id).exec(conn).await?;
    Ok(result.rows_affected)
}

/// Generate a setup-token secret: 32 random bytes as a 64-char hex string.
#[must_use]
pub fn generate_token_secret() -> String {
    use rand::Rng;

    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();

    bytes.iter().fold(String::with_capacity(64), |mut acc, b| {
        use std::fmt::Write;
        let _ = write!(acc, "{b:02x}");
        acc
    })
}

/// Generate a 6-digit OTP code.
#[must_use]
pub fn generate_otp_code() -> String {
    use rand::Rng;

    let mut rng = rand::rng();
    rng.random_range(100_000..=999_999u32).to_string()
}
