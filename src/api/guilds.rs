use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use std::sync::Arc;

use super::{ApiError, ApiResponse, AppState, GuildDto, MessageResponse, validation};

#[derive(Debug, Deserialize)]
pub struct CreateGuildRequest {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateGuildRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

fn map_guild_db_err(e: sea_orm::DbErr) -> ApiError {
    if matches!(e.sql_err(), Some(sea_orm::SqlErr::UniqueConstraintViolation(_))) {
        ApiError::Conflict("A guild with this name already exists".to_string())
    } else {
        ApiError::DatabaseError(e.to_string())
    }
}

/// GET /admin/guilds
/// All guilds, alphabetical, with member counts.
pub async fn list_guilds(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<GuildDto>>>, ApiError> {
    let guilds = state.store().list_guilds_with_member_counts().await?;

    let dtos = guilds
        .into_iter()
        .map(|(guild, member_count)| GuildDto {
            id: guild.id,
            name: guild.name,
            description: guild.description,
            member_count,
            created_at: guild.created_at,
        })
        .collect();

    Ok(Json(ApiResponse::success(dtos)))
}

/// POST /admin/guilds
pub async fn create_guild(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateGuildRequest>,
) -> Result<(StatusCode, Json<ApiResponse<GuildDto>>), ApiError> {
    let name = validation::validate_guild_name(&payload.name)?;

    let guild = state
        .store()
        .guild_repo()
        .create(name, payload.description.as_deref())
        .await
        .map_err(map_guild_db_err)?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(GuildDto {
            id: guild.id,
            name: guild.name,
            description: guild.description,
            member_count: 0,
            created_at: guild.created_at,
        })),
    ))
}

/// PUT /admin/guilds/{id}
pub async fn update_guild(
    State(state): State<Arc<AppState>>,
    Path(guild_id): Path<i32>,
    Json(payload): Json<UpdateGuildRequest>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    if payload.name.is_none() && payload.description.is_none() {
        return Err(ApiError::validation(
            "Name or description must be provided for update",
        ));
    }

    let name = match &payload.name {
        Some(name) => Some(validation::validate_guild_name(name)?),
        None => None,
    };

    let updated = state
        .store()
        .guild_repo()
        .update(guild_id, name, payload.description.as_deref())
        .await
        .map_err(map_guild_db_err)?;

    if updated.is_none() {
        return Err(ApiError::not_found("Guild", guild_id));
    }

    Ok(Json(ApiResponse::success(MessageResponse {
        message: "Guild updated successfully".to_string(),
    })))
}

/// DELETE /admin/guilds/{id}
pub async fn delete_guild(
    State(state): State<Arc<AppState>>,
    Path(guild_id): Path<i32>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    let deleted = state.store().guild_repo().delete(guild_id).await?;
    if !deleted {
        return Err(ApiError::not_found("Guild", guild_id));
    }

    Ok(Json(ApiResponse::success(MessageResponse {
        message: "Guild deleted successfully".to_string(),
    })))
}
