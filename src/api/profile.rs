use axum::{Json, extract::State};
use serde::Deserialize;
use std::sync::Arc;
use tower_sessions::Session;

use super::{ApiError, ApiResponse, AppState, ProfileDto, auth};
use crate::db::ProfileInput;

/// Member self-service edit. Names can be corrected but not blanked; absent
/// fields keep their stored values. Email changes go through an admin.
#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
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

/// GET /users/me
/// The caller's own profile; null data when no census record exists yet.
pub async fn get_my_profile(
    State(state): State<Arc<AppState>>,
    session: Session,
) -> Result<Json<ApiResponse<Option<ProfileDto>>>, ApiError> {
    let user = auth::current_user(&session).await?;

    let profile = state.store().get_profile(user.id).await?;

    Ok(Json(ApiResponse::success(
        profile.map(|p| ProfileDto::from_profile(p, user.email)),
    )))
}

/// PUT /users/me
/// Upsert the caller's own profile.
pub async fn update_my_profile(
    State(state): State<Arc<AppState>>,
    session: Session,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<ApiResponse<ProfileDto>>, ApiError> {
    let user = auth::current_user(&session).await?;

    if matches!(&payload.first_name, Some(v) if v.trim().is_empty()) {
        return Err(ApiError::validation("First name cannot be empty"));
    }
    if matches!(&payload.surname, Some(v) if v.trim().is_empty()) {
        return Err(ApiError::validation("Surname cannot be empty"));
    }

    let input = ProfileInput {
        first_name: payload.first_name,
        surname: payload.surname,
        title: payload.title,
        middle_name: payload.middle_name,
        gender: payload.gender,
        date_of_birth: payload.date_of_birth,
        marital_status: payload.marital_status,
        address: payload.address,
        phone_number: payload.phone_number,
        place_of_baptism: payload.place_of_baptism,
        baptism_number: payload.baptism_number,
        type_of_marriage: payload.type_of_marriage,
        place_of_marriage: payload.place_of_marriage,
        marriage_number: payload.marriage_number,
        married_to: payload.married_to,
        section_name: payload.section_name,
        church_support_card: payload.church_support_card,
        occupation: payload.occupation,
        skills: payload.skills,
        profession: payload.profession,
        notes: payload.notes,
    };

    let profile = state
        .store()
        .upsert_profile(user.id, &user.email, &input)
        .await?;

    Ok(Json(ApiResponse::success(ProfileDto::from_profile(
        profile, user.email,
    ))))
}
