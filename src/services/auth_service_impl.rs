//! `SeaORM` implementation of the `AuthService` trait.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use sea_orm::TransactionTrait;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task;
use tracing::info;

use crate::clients::Mailer;
use crate::config::Config;
use crate::db::Store;
use crate::db::repositories::{token, user};
use crate::services::auth_service::{
    AuthError, AuthService, AuthenticatedUser, OtpOutcome, UserInfo,
};

pub struct SeaOrmAuthService {
    store: Store,
    mailer: Arc<dyn Mailer>,
    config: Arc<RwLock<Config>>,
}

impl SeaOrmAuthService {
    #[must_use]
    pub fn new(store: Store, mailer: Arc<dyn Mailer>, config: Arc<RwLock<Config>>) -> Self {
        Self {
            store,
            mailer,
            config,
        }
    }

    async fn authenticated(&self, user: crate::db::User) -> Result<AuthenticatedUser, AuthError> {
        let roles = self.store.roles_for_user(user.id).await?;

        Ok(AuthenticatedUser {
            id: user.id,
            email: user.email,
            roles,
        })
    }
}

#[async_trait]
impl AuthService for SeaOrmAuthService {
    async fn login(&self, email: &str, password: &str) -> Result<AuthenticatedUser, AuthError> {
        let is_valid = self.store.verify_user_password(email, password).await?;

        if !is_valid {
            return Err(AuthError::InvalidCredentials);
        }

        let user = self
            .store
            .get_user_by_email(email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        self.authenticated(user).await
    }

    async fn request_otp(&self, email: &str) -> Result<(), AuthError> {
        let user = self
            .store
            .get_user_by_email(email)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let config = self.config.read().await.clone();
        let security = config.security.clone();

        let code = token::generate_otp_code();
        let to_hash = code.clone();
        let hash_config = security.clone();
        let code_hash = task::spawn_blocking(move || user::hash_secret(&to_hash, &hash_config))
            .await
            .map_err(|e| AuthError::Internal(format!("Hashing task panicked: {e}")))??;

        let expires_at = Utc::now() + Duration::hours(security.otp_validity_hours);
        let mailer = self.mailer.clone();
        let to = user.email.clone();

        self.store
            .conn
            .transaction::<_, (), AuthError>(move |txn| {
                Box::pin(async move {
                    token::upsert_otp(txn, &to, &code_hash, expires_at).await?;

                    let html = otp_email_html(&code, security.otp_validity_hours);
                    let sent = mailer
                        .send_email(&to, "Your Login OTP", &html)
                        .await
                        .map_err(AuthError::from)?;

                    if !sent {
                        return Err(AuthError::Delivery(to.clone()));
                    }

                    Ok(())
                })
            })
            .await
            .map_err(AuthError::from)?;

        info!("OTP issued for {email}");
        Ok(())
    }

    async fn verify_otp(&self, email: &str, code: &str) -> Result<OtpOutcome, AuthError> {
        let Some(row) = self.store.get_otp_by_email(email).await? else {
            return Err(AuthError::InvalidOtp);
        };

        if row.expires_at <= Utc::now() {
            return Err(AuthError::InvalidOtp);
        }

        let submitted = code.to_string();
        let hash = row.code_hash.clone();
        let matches = task::spawn_blocking(move || user::verify_secret(&submitted, &hash))
            .await
            .map_err(|e| AuthError::Internal(format!("Verification task panicked: {e}")))?;

        if !matches {
            return Err(AuthError::InvalidOtp);
        }

        // Consume the code; a concurrent verification of the same code must
        // fail exactly like a wrong one.
        let deleted = token::consume_otp(&self.store.conn, row.id).await?;
        if deleted != 1 {
            return Err(AuthError::InvalidOtp);
        }

        let user = self
            .store
            .get_user_by_email(email)
            .await?
            .ok_or(AuthError::InvalidOtp)?;

        if !user.has_password {
            return Ok(OtpOutcome::NeedsPasswordSetup);
        }

        let authenticated = self.authenticated(user).await?;
        Ok(OtpOutcome::LoggedIn(authenticated))
    }

    async fn change_password(
        &self,
        user_id: i32,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        if new_password.len() < 8 {
            return Err(AuthError::Validation(
                "New password must be at least 8 characters".to_string(),
            ));
        }

        if current_password == new_password {
            return Err(AuthError::Validation(
                "New password must be different from current password".to_string(),
            ));
        }

        let user = self
            .store
            .get_user_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let is_valid = self
            .store
            .verify_user_password(&user.email, current_password)
            .await?;

        if !is_valid {
            return Err(AuthError::Validation(
                "Current password is incorrect".to_string(),
            ));
        }

        let security = self.config.read().await.security.clone();
        self.store
            .update_user_password(user_id, new_password, &security)
            .await?;

        info!("Password changed for user {user_id}");
        Ok(())
    }

    async fn get_user_info(&self, user_id: i32) -> Result<UserInfo, AuthError> {
        let user = self
            .store
            .get_user_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let roles = self.store.roles_for_user(user.id).await?;

        Ok(UserInfo {
            id: user.id,
            email: user.email,
            roles,
            created_at: user.created_at,
            updated_at: user.updated_at,
        })
    }
}

fn otp_email_html(code: &str, validity_hours: i64) -> String {
    format!(
        "<p>Your OTP is: <b>{code}</b>.</p>\
         <p>This code will expire in {validity_hours} hours.</p>\
         <p>If you did not request this OTP, please ignore this email.</p>"
    )
}
