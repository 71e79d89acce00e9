use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_sessions::Session;

use super::{ApiError, ApiResponse, AppState, MessageResponse, UserSummaryDto, auth, validation};
use crate::db::ProfileInput;
use crate::services::{CreatedMember, ImportSummary, MemberRecord};

// ============================================================================
// Request/Response Types
// ============================================================================

/// Admin edit of a member. Absent fields keep their stored values.
#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub role: Option<String>,
    pub first_name: Option<String>,
    pub surname: Option<String>,
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

impl UpdateUserRequest {
    fn profile_input(&self) -> ProfileInput {
        ProfileInput {
            first_name: self.first_name.clone(),
            surname: self.surname.clone(),
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
}

#[derive(Debug, Serialize)]
pub struct ImportResponse {
    pub message: String,
    pub details: ImportSummary,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /admin/users
/// All users with display name, roles, guild, and derived setup status.
pub async fn list_users(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<UserSummaryDto>>>, ApiError> {
    let users = state.store().list_users().await?;
    let user_ids: Vec<i32> = users.iter().map(|u| u.id).collect();

    let names = state.store().profile_names_by_user_ids(&user_ids).await?;
    let roles = state.store().roles_by_user_ids(&user_ids).await?;
    let guilds = state.store().guild_names_by_user_ids(&user_ids).await?;

    let dtos = users
        .into_iter()
        .map(|user| {
            let name = names
                .get(&user.id)
                .filter(|n| !n.is_empty())
                .cloned()
                .unwrap_or_else(|| user.email.clone());
            let role = roles
                .get(&user.id)
                .map_or_else(|| "N/A".to_string(), |r| r.join(", "));
            let guild = guilds
                .get(&user.id)
                .cloned()
                .unwrap_or_else(|| "N/A".to_string());
            let status = if user.has_password {
                "Active".to_string()
            } else {
                "Pending Setup".to_string()
            };

            UserSummaryDto {
                id: user.id,
                name,
                email: user.email,
                role,
                guild,
                status,
                created_at: user.created_at,
                updated_at: user.updated_at,
            }
        })
        .collect();

    Ok(Json(ApiResponse::success(dtos)))
}

/// POST /admin/users
/// Create a single member and email them a password-setup link.
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<MemberRecord>,
) -> Result<(StatusCode, Json<ApiResponse<CreatedMember>>), ApiError> {
    let created = state.provision().create_member(payload).await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(created))))
}

/// PUT /admin/users/{id}
/// Update a member's account email, role, and profile.
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path(user_id): Path<i32>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    validation::validate_user_id(user_id)?;

    if let Some(email) = &payload.email {
        validation::validate_email(email)?;
    }

    if let Some(role) = &payload.role {
        if role != "admin" && role != "member" {
            return Err(ApiError::validation(format!("Invalid role: {role}")));
        }

        let caller = auth::current_user(&session).await?;
        if caller.id == user_id {
            return Err(ApiError::validation("Cannot update your own role"));
        }
    }

    let updated = state
        .store()
        .update_user_with_profile(
            user_id,
            payload.email.as_deref(),
            payload.role.as_deref(),
            &payload.profile_input(),
        )
        .await
        .map_err(|e| {
            if matches!(e.sql_err(), Some(sea_orm::SqlErr::UniqueConstraintViolation(_))) {
                ApiError::Conflict("Email already exists".to_string())
            } else {
                ApiError::DatabaseError(e.to_string())
            }
        })?;

    if updated.is_none() {
        return Err(ApiError::not_found("User", user_id));
    }

    Ok(Json(ApiResponse::success(MessageResponse {
        message: "User updated successfully".to_string(),
    })))
}

/// DELETE /admin/users/{id}
/// Remove a member and all their related records.
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path(user_id): Path<i32>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    validation::validate_user_id(user_id)?;

    let caller = auth::current_user(&session).await?;
    if caller.id == user_id {
        return Err(ApiError::validation("Cannot delete your own account"));
    }

    let deleted = state.store().delete_user(user_id).await?;
    if !deleted {
        return Err(ApiError::not_found("User", user_id));
    }

    Ok(Json(ApiResponse::success(MessageResponse {
        message: "User deleted successfully".to_string(),
    })))
}

/// POST /admin/users/{id}/resend-setup
/// Replace the member's setup token and re-send the setup link. Also works
/// as a password-reset trigger for members who already completed setup.
pub async fn resend_setup(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i32>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    validation::validate_user_id(user_id)?;

    state.provision().resend_setup(user_id).await?;

    Ok(Json(ApiResponse::success(MessageResponse {
        message: "Password setup email sent successfully.".to_string(),
    })))
}

/// POST /admin/users/upload
/// Bulk import from a CSV body. Expected headers: email, first_name,
/// surname, plus any optional profile columns.
pub async fn upload_users(
    State(state): State<Arc<AppState>>,
    body: String,
) -> Result<Json<ApiResponse<ImportResponse>>, ApiError> {
    if body.trim().is_empty() {
        return Err(ApiError::validation("CSV file is empty"));
    }

    let mut reader = csv::Reader::from_reader(body.as_bytes());
    let mut rows: Vec<MemberRecord> = Vec::new();

    for (idx, result) in reader.deserialize::<MemberRecord>().enumerate() {
        match result {
            Ok(record) => rows.push(record),
            Err(e) => {
                return Err(ApiError::validation(format!(
                    "Unable to parse CSV row {}: {e}",
                    idx + 1
                )));
            }
        }
    }

    if rows.is_empty() {
        return Err(ApiError::validation("CSV file is empty"));
    }

    let total = rows.len();
    let details = state.provision().import_members(rows).await?;

    Ok(Json(ApiResponse::success(ImportResponse {
        message: format!(
            "Processed {total} users. Success: {}, Failed: {}",
            details.success, details.failed
        ),
        details,
    })))
}
