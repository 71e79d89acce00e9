use axum::{
    Json,
    extract::{Query, State},
};
use serde::Deserialize;
use std::sync::Arc;
use tower_sessions::Session;

use super::{ApiError, ApiResponse, AppState, DocumentDto, DocumentListDto, auth, validation};

const PAGE_SIZE: u64 = 10;

#[derive(Debug, Deserialize)]
pub struct DocumentQuery {
    #[serde(default = "default_page")]
    pub page: u64,
}

const fn default_page() -> u64 {
    1
}

/// GET /documents?page=
/// Documents visible to the caller (their guild's plus parish-wide ones),
/// newest first.
pub async fn list_documents(
    State(state): State<Arc<AppState>>,
    session: Session,
    Query(query): Query<DocumentQuery>,
) -> Result<Json<ApiResponse<DocumentListDto>>, ApiError> {
    let user = auth::current_user(&session).await?;
    let page = validation::validate_page(query.page)?;

    let guild = state.store().guild_for_user(user.id).await?;
    let guild_id = guild.map(|g| g.id);

    let (documents, total_pages) = state
        .store()
        .list_documents_for_guild(guild_id, page, PAGE_SIZE)
        .await?;

    Ok(Json(ApiResponse::success(DocumentListDto {
        documents: documents.into_iter().map(DocumentDto::from).collect(),
        total_pages,
        current_page: page,
    })))
}
