//! `SeaORM` implementation of the `ProvisionService` trait.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use sea_orm::{ConnectionTrait, EntityTrait, TransactionTrait};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task;
use tracing::{info, warn};

use crate::clients::Mailer;
use crate::config::{Config, SecurityConfig};
use crate::db::Store;
use crate::db::repositories::{profile, token, user};
use crate::entities::prelude::Users;
use crate::services::provision_service::{
    CreatedMember, ImportSummary, MemberRecord, ProvisionError, ProvisionService, RedeemedUser,
    validate_record,
};

pub struct SeaOrmProvisionService {
    store: Store,
    mailer: Arc<dyn Mailer>,
    config: Arc<RwLock<Config>>,
}

impl SeaOrmProvisionService {
    #[must_use]
    pub fn new(store: Store, mailer: Arc<dyn Mailer>, config: Arc<RwLock<Config>>) -> Self {
        Self {
            store,
            mailer,
            config,
        }
    }

    /// One import row as a unit of work. An existing user keeps their
    /// password hash; profile and role are refreshed either way.
    async fn import_one(
        &self,
        config: &Config,
        record: MemberRecord,
    ) -> Result<(), ProvisionError> {
        let mailer = self.mailer.clone();
        let security = config.security.clone();
        let setup_link_base = config.clone();

        self.store
            .conn
            .transaction::<_, (), ProvisionError>(move |txn| {
                Box::pin(async move {
                    let user = match user::find_by_email(txn, &record.email).await? {
                        Some(existing) => existing,
                        None => user::insert_user(txn, &record.email).await?,
                    };

                    user::ensure_role(txn, user.id, "member").await?;
                    profile::upsert(txn, user.id, &record.email, &record.profile_input()).await?;

                    let secret = issue_setup_token(txn, user.id, &security).await?;
                    let link = setup_link_base.setup_link(&secret);
                    let html = setup_email_html(
                        &record.first_name,
                        &link,
                        security.token_validity_hours,
                    );

                    let sent = mailer
                        .send_email(&record.email, "Set Up Your Parish Account", &html)
                        .await
                        .map_err(ProvisionError::from)?;

                    if !sent {
                        return Err(ProvisionError::Delivery(record.email.clone()));
                    }

                    Ok(())
                })
            })
            .await
            .map_err(ProvisionError::from)
    }
}

#[async_trait]
impl ProvisionService for SeaOrmProvisionService {
    async fn create_member(&self, record: MemberRecord) -> Result<CreatedMember, ProvisionError> {
        validate_record(&record).map_err(ProvisionError::Validation)?;

        let config = self.config.read().await.clone();
        let mailer = self.mailer.clone();
        let role = record
            .role
            .clone()
            .unwrap_or_else(|| "member".to_string());

        let created = self
            .store
            .conn
            .transaction::<_, CreatedMember, ProvisionError>(move |txn| {
                Box::pin(async move {
                    let user = user::insert_user(txn, &record.email).await?;

                    user::ensure_role(txn, user.id, &role).await?;
                    profile::upsert(txn, user.id, &record.email, &record.profile_input()).await?;

                    let secret = issue_setup_token(txn, user.id, &config.security).await?;
                    let link = config.setup_link(&secret);
                    let html = setup_email_html(
                        &record.first_name,
                        &link,
                        config.security.token_validity_hours,
                    );

                    let sent = mailer
                        .send_email(&record.email, "Set Up Your Parish Account", &html)
                        .await
                        .map_err(ProvisionError::from)?;

                    if !sent {
                        return Err(ProvisionError::Delivery(record.email.clone()));
                    }

                    Ok(CreatedMember {
                        user_id: user.id,
                        email: user.email,
                    })
                })
            })
            .await
            .map_err(ProvisionError::from)?;

        info!("Provisioned member {} (id {})", created.email, created.user_id);
        Ok(created)
    }

    async fn resend_setup(&self, user_id: i32) -> Result<(), ProvisionError> {
        let user = self
            .store
            .get_user_by_id(user_id)
            .await?
            .ok_or_else(|| ProvisionError::NotFound("User".to_string()))?;

        let first_name = self
            .store
            .get_profile(user_id)
            .await?
            .map_or_else(|| "Member".to_string(), |p| p.first_name);

        let config = self.config.read().await.clone();
        let mailer = self.mailer.clone();
        let email = user.email.clone();

        self.store
            .conn
            .transaction::<_, (), ProvisionError>(move |txn| {
                Box::pin(async move {
                    let secret = issue_setup_token(txn, user_id, &config.security).await?;
                    let link = config.setup_link(&secret);
                    let html = resend_email_html(
                        &first_name,
                        &link,
                        config.security.token_validity_hours,
                    );

                    let sent = mailer
                        .send_email(&email, "Set Up Your Parish Account Password", &html)
                        .await
                        .map_err(ProvisionError::from)?;

                    if !sent {
                        return Err(ProvisionError::Delivery(email.clone()));
                    }

                    Ok(())
                })
            })
            .await
            .map_err(ProvisionError::from)?;

        info!("Re-sent setup link to user {user_id}");
        Ok(())
    }

    async fn redeem_setup_token(
        &self,
        token: &str,
        new_password: &str,
    ) -> Result<RedeemedUser, ProvisionError> {
        // Password floor is checked before anything touches the database.
        if new_password.len() < 8 {
            return Err(ProvisionError::Validation(
                "Password must be at least 8 characters".to_string(),
            ));
        }

        if token.is_empty() {
            return Err(ProvisionError::InvalidToken);
        }

        let now = Utc::now();
        self.store.prune_expired_tokens(now).await?;

        // The stored form is a one-way hash, so there is nothing to look up
        // by key: scan the live set and let the hash function compare.
        let candidates = self.store.list_unexpired_tokens(now).await?;

        let submitted = token.to_string();
        let matched = task::spawn_blocking(move || {
            candidates
                .into_iter()
                .find(|t| user::verify_secret(&submitted, &t.token_hash))
        })
        .await
        .map_err(|e| ProvisionError::Internal(format!("Token scan task panicked: {e}")))?;

        let Some(matched) = matched else {
            return Err(ProvisionError::InvalidToken);
        };

        let security = self.config.read().await.security.clone();
        let password = new_password.to_string();
        let password_hash = task::spawn_blocking(move || user::hash_secret(&password, &security))
            .await
            .map_err(|e| ProvisionError::Internal(format!("Hashing task panicked: {e}")))??;

        let token_id = matched.id;
        let user_id = matched.user_id;

        let redeemed = self
            .store
            .conn
            .transaction::<_, RedeemedUser, ProvisionError>(move |txn| {
                Box::pin(async move {
                    // Losing a race to another redemption of the same token
                    // must look identical to a bad token.
                    let deleted = token::consume_token(txn, token_id).await?;
                    if deleted != 1 {
                        return Err(ProvisionError::InvalidToken);
                    }

                    let Some(user) = Users::find_by_id(user_id).one(txn).await? else {
                        return Err(ProvisionError::InvalidToken);
                    };

                    user::set_password_hash(txn, user_id, &password_hash).await?;

                    Ok(RedeemedUser {
                        user_id,
                        email: user.email,
                    })
                })
            })
            .await
            .map_err(ProvisionError::from)?;

        info!("Setup token redeemed for user {}", redeemed.user_id);
        Ok(redeemed)
    }

    async fn import_members(
        &self,
        rows: Vec<MemberRecord>,
    ) -> Result<ImportSummary, ProvisionError> {
        if rows.is_empty() {
            return Err(ProvisionError::Validation(
                "No rows to import".to_string(),
            ));
        }

        let config = self.config.read().await.clone();
        let mut summary = ImportSummary::default();

        for (idx, record) in rows.into_iter().enumerate() {
            let position = idx + 1;

            if let Err(problem) = validate_record(&record) {
                summary.failed += 1;
                summary
                    .errors
                    .push(format!("Row {position} ({}): {problem}", record.identifier()));
                continue;
            }

            let identifier = record.identifier().to_string();
            match self.import_one(&config, record).await {
                Ok(()) => summary.success += 1,
                Err(e) => {
                    warn!("Import row {position} ({identifier}) failed: {e}");
                    summary.failed += 1;
                    summary.errors.push(format!("Row {position} ({identifier}): {e}"));
                }
            }
        }

        info!(
            "Import finished: {} succeeded, {} failed",
            summary.success, summary.failed
        );
        Ok(summary)
    }
}

/// Issue a fresh setup token inside the caller's transaction: random 256-bit
/// secret, Argon2id hash stored, any previous token for the user dropped.
/// Returns the plaintext for the notification email.
pub(crate) async fn issue_setup_token<C: ConnectionTrait>(
    conn: &C,
    user_id: i32,
    security: &SecurityConfig,
) -> Result<String, ProvisionError> {
    let secret = token::generate_token_secret();

    let to_hash = secret.clone();
    let config = security.clone();
    let hash = task::spawn_blocking(move || user::hash_secret(&to_hash, &config))
        .await
        .map_err(|e| ProvisionError::Internal(format!("Hashing task panicked: {e}")))??;

    let expires_at = Utc::now() + Duration::hours(security.token_validity_hours);

    token::replace_for_user(conn, user_id, &hash, expires_at).await?;

    Ok(secret)
}

fn setup_email_html(first_name: &str, link: &str, validity_hours: i64) -> String {
    format!(
        "<p>Hello {first_name},</p>\
         <p>An account has been created for you in the Parish Management System.</p>\
         <p>Please click the link below to set up your password:</p>\
         <p><a href=\"{link}\">{link}</a></p>\
         <p>This link will expire in {validity_hours} hours.</p>"
    )
}

fn resend_email_html(first_name: &str, link: &str, validity_hours: i64) -> String {
    format!(
        "<p>Hello {first_name},</p>\
         <p>A request was made to set up or reset the password for your account \
         in the Parish Management System.</p>\
         <p>Please click the link below to set your password:</p>\
         <p><a href=\"{link}\">{link}</a></p>\
         <p>This link will expire in {validity_hours} hours. If you did not \
         request this, please ignore this email.</p>"
    )
}
