//! Domain service for account provisioning: setup-token issuance and
//! redemption, single-member creation, and bulk import.

use serde::Deserialize;
use thiserror::Error;

use crate::db::ProfileInput;

/// Errors specific to provisioning operations.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Failed to send email to {0}")]
    Delivery(String),

    /// Deliberately does not distinguish wrong, expired, or already-used.
    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for ProvisionError {
    fn from(err: sea_orm::DbErr) -> Self {
        if matches!(err.sql_err(), Some(sea_orm::SqlErr::UniqueConstraintViolation(_))) {
            return Self::Conflict("Email already exists".to_string());
        }
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for ProvisionError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<sea_orm::TransactionError<Self>> for ProvisionError {
    fn from(err: sea_orm::TransactionError<Self>) -> Self {
        match err {
            sea_orm::TransactionError::Connection(e) => e.into(),
            sea_orm::TransactionError::Transaction(e) => e,
        }
    }
}

/// One member row, as submitted by the admin form or one CSV line.
/// Everything beyond email, first name, and surname is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MemberRecord {
    pub email: String,
    pub first_name: String,
    pub surname: String,
    /// "admin" or "member"; defaults to "member".
    pub role: Option<String>,
    pub title: Option<String>,
    pub middle_name: Option<String>,
    pub gender: Option<String>,
    pub date_of_birth: Option<String>,
    pub marital_status: Option<String>,
    pub address: Option<String>,
    pub phone_number: Option<String>,
    pub place_of_baptism: Option<String>,
    pub baptism_number: Option<String>,
    pub type_of_marriage: Option<String>,
    pub place_of_marriage: Option<String>,
    pub marriage_number: Option<String>,
    pub married_to: Option<String>,
    pub section_name: Option<String>,
    pub church_support_card: Option<String>,
    pub occupation: Option<String>,
    pub skills: Option<String>,
    pub profession: Option<String>,
    pub notes: Option<String>,
}

impl MemberRecord {
    #[must_use]
    pub fn profile_input(&self) -> ProfileInput {
        ProfileInput {
            first_name: Some(self.first_name.clone()),
            surname: Some(self.surname.clone()),
            title: self.title.clone(),
            middle_name: self.middle_name.clone(),
            gender: self.gender.clone(),
            date_of_birth: self.date_of_birth.clone(),
            marital_status: self.marital_status.clone(),
            address: self.address.clone(),
            phone_number: self.phone_number.clone(),
            place_of_baptism: self.place_of_baptism.clone(),
            baptism_number: self.baptism_number.clone(),
            type_of_marriage: self.type_of_marriage.clone(),
            place_of_marriage: self.place_of_marriage.clone(),
            marriage_number: self.marriage_number.clone(),
            married_to: self.married_to.clone(),
            section_name: self.section_name.clone(),
            church_support_card: self.church_support_card.clone(),
            occupation: self.occupation.clone(),
            skills: self.skills.clone(),
            profession: self.profession.clone(),
            notes: self.notes.clone(),
        }
    }

    /// Something human to hang a per-row error message on.
    #[must_use]
    pub fn identifier(&self) -> &str {
        if !self.email.is_empty() {
            &self.email
        } else if !self.surname.is_empty() {
            &self.surname
        } else {
            "unknown"
        }
    }
}

/// Checks a record is importable. Returns the first problem found.
pub fn validate_record(record: &MemberRecord) -> Result<(), String> {
    if record.email.trim().is_empty() {
        return Err("missing email".to_string());
    }
    if !record.email.contains('@') {
        return Err(format!("invalid email: {}", record.email));
    }
    if record.first_name.trim().is_empty() {
        return Err("missing first name".to_string());
    }
    if record.surname.trim().is_empty() {
        return Err("missing surname".to_string());
    }
    if let Some(role) = &record.role
        && role != "admin"
        && role != "member"
    {
        return Err(format!("invalid role: {role}"));
    }
    Ok(())
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct CreatedMember {
    pub user_id: i32,
    pub email: String,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct RedeemedUser {
    pub user_id: i32,
    pub email: String,
}

/// Outcome of a bulk import. Partial failure is a normal result, never an
/// error; only an unreadable or empty dataset fails the whole call.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ImportSummary {
    pub success: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

/// Domain service trait for the provisioning workflow.
#[async_trait::async_trait]
pub trait ProvisionService: Send + Sync {
    /// Creates a user with no password, its role, its profile, and a setup
    /// token, then emails the setup link. All of it is one unit of work: a
    /// failed delivery leaves nothing behind.
    async fn create_member(&self, record: MemberRecord) -> Result<CreatedMember, ProvisionError>;

    /// Replaces the user's setup token with a fresh one and re-sends the
    /// setup link. Also serves as a password reset trigger.
    async fn resend_setup(&self, user_id: i32) -> Result<(), ProvisionError>;

    /// Redeems a setup-token secret: on success the user's password is set
    /// and the token is consumed, atomically.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::InvalidToken`] for every non-matching
    /// secret, expired or otherwise.
    async fn redeem_setup_token(
        &self,
        token: &str,
        new_password: &str,
    ) -> Result<RedeemedUser, ProvisionError>;

    /// Imports rows one transaction each; a bad row never affects its
    /// siblings. Re-importing an email updates the existing member instead
    /// of duplicating it.
    async fn import_members(
        &self,
        rows: Vec<MemberRecord>,
    ) -> Result<ImportSummary, ProvisionError>;
}
