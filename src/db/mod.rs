use anyhow::Result;
use chrono::{DateTime, Utc};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::entities::{documents, guilds, member_profiles, otp_codes, setup_tokens};

pub mod migrator;
pub mod repositories;

pub use repositories::profile::ProfileInput;
pub use repositories::user::User;

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        if !db_url.starts_with(":memory:") && !db_url.contains("memory:") {
            let path_str = db_url.trim_start_matches("sqlite:");
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    #[must_use]
    pub fn user_repo(&self) -> repositories::user::UserRepository {
        repositories::user::UserRepository::new(self.conn.clone())
    }

    #[must_use]
    pub fn token_repo(&self) -> repositories::token::TokenRepository {
        repositories::token::TokenRepository::new(self.conn.clone())
    }

    #[must_use]
    pub fn profile_repo(&self) -> repositories::profile::ProfileRepository {
        repositories::profile::ProfileRepository::new(self.conn.clone())
    }

    #[must_use]
    pub fn guild_repo(&self) -> repositories::guild::GuildRepository {
        repositories::guild::GuildRepository::new(self.conn.clone())
    }

    #[must_use]
    pub fn document_repo(&self) -> repositories::document::DocumentRepository {
        repositories::document::DocumentRepository::new(self.conn.clone())
    }

    // ========== Users ==========

    pub async fn get_user_by_id(&self, id: i32) -> Result<Option<User>> {
        self.user_repo().get_by_id(id).await
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.user_repo().get_by_email(email).await
    }

    pub async fn list_users(&self) -> Result<Vec<User>> {
        self.user_repo().list_all().await
    }

    pub async fn roles_for_user(&self, user_id: i32) -> Result<Vec<String>> {
        self.user_repo().roles_for_user(user_id).await
    }

    pub async fn roles_by_user_ids(&self, user_ids: &[i32]) -> Result<HashMap<i32, Vec<String>>> {
        self.user_repo().roles_by_user_ids(user_ids).await
    }

    pub async fn verify_user_password(&self, email: &str, password: &str) -> Result<bool> {
        self.user_repo().verify_password(email, password).await
    }

    pub async fn update_user_password(
        &self,
        user_id: i32,
        new_password: &str,
        config: &crate::config::SecurityConfig,
    ) -> Result<()> {
        self.user_repo()
            .update_password(user_id, new_password, config)
            .await
    }

    pub async fn delete_user(&self, user_id: i32) -> Result<bool> {
        self.user_repo().delete_cascade(user_id).await
    }

    /// Admin edit of a member: optional email change, optional role
    /// replacement, and a profile upsert, all in one transaction. Returns
    /// `Ok(None)` when the user does not exist; unique-constraint violations
    /// bubble up as `DbErr` for the caller to map to a conflict.
    pub async fn update_user_with_profile(
        &self,
        user_id: i32,
        email: Option<&str>,
        role: Option<&str>,
        input: &ProfileInput,
    ) -> std::result::Result<Option<User>, sea_orm::DbErr> {
        use crate::entities::prelude::{UserRoles, Users};
        use crate::entities::user_roles;
        use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, TransactionTrait};

        let email = email.map(str::to_string);
        let role = role.map(str::to_string);
        let input = input.clone();

        let result = self
            .conn
            .transaction::<_, Option<crate::entities::users::Model>, sea_orm::DbErr>(move |txn| {
                Box::pin(async move {
                    let Some(user) = Users::find_by_id(user_id).one(txn).await? else {
                        return Ok(None);
                    };

                    let user = match email {
                        Some(email) => {
                            repositories::user::update_email(txn, user_id, &email).await?
                        }
                        None => user,
                    };

                    if let Some(role) = role {
                        UserRoles::delete_many()
                            .filter(user_roles::Column::UserId.eq(user_id))
                            .exec(txn)
                            .await?;
                        repositories::user::ensure_role(txn, user_id, &role).await?;
                    }

                    repositories::profile::upsert(txn, user_id, &user.email, &input).await?;

                    Ok(Some(user))
                })
            })
            .await;

        match result {
            Ok(user) => Ok(user.map(User::from)),
            Err(sea_orm::TransactionError::Connection(e) | sea_orm::TransactionError::Transaction(e)) => {
                Err(e)
            }
        }
    }

    // ========== Profiles ==========

    pub async fn get_profile(&self, user_id: i32) -> Result<Option<member_profiles::Model>> {
        self.profile_repo().get_by_user_id(user_id).await
    }

    pub async fn upsert_profile(
        &self,
        user_id: i32,
        email: &str,
        input: &ProfileInput,
    ) -> Result<member_profiles::Model> {
        repositories::profile::upsert(&self.conn, user_id, email, input)
            .await
            .map_err(Into::into)
    }

    pub async fn profile_names_by_user_ids(
        &self,
        user_ids: &[i32],
    ) -> Result<HashMap<i32, String>> {
        self.profile_repo().names_by_user_ids(user_ids).await
    }

    // ========== Guilds ==========

    pub async fn get_guild(&self, id: i32) -> Result<Option<guilds::Model>> {
        self.guild_repo().get(id).await
    }

    pub async fn list_guilds_with_member_counts(&self) -> Result<Vec<(guilds::Model, i64)>> {
        self.guild_repo().list_with_member_counts().await
    }

    pub async fn guild_for_user(&self, user_id: i32) -> Result<Option<guilds::Model>> {
        self.guild_repo().guild_for_user(user_id).await
    }

    pub async fn guild_names_by_user_ids(&self, user_ids: &[i32]) -> Result<HashMap<i32, String>> {
        self.guild_repo().guild_names_by_user_ids(user_ids).await
    }

    // ========== Documents ==========

    pub async fn list_documents_for_guild(
        &self,
        guild_id: Option<i32>,
        page: u64,
        page_size: u64,
    ) -> Result<(Vec<documents::Model>, u64)> {
        self.document_repo()
            .list_for_guild(guild_id, page, page_size)
            .await
    }

    pub async fn document_count(&self) -> Result<u64> {
        self.document_repo().count_all().await
    }

    // ========== Tokens ==========

    pub async fn list_unexpired_tokens(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<setup_tokens::Model>> {
        self.token_repo().list_unexpired(now).await
    }

    pub async fn prune_expired_tokens(&self, now: DateTime<Utc>) -> Result<u64> {
        self.token_repo().prune_expired(now).await
    }

    pub async fn get_otp_by_email(&self, email: &str) -> Result<Option<otp_codes::Model>> {
        self.token_repo().get_otp_by_email(email).await
    }
}
