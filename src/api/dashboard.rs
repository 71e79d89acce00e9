use axum::{Json, extract::State};
use std::sync::Arc;
use tower_sessions::Session;

use super::{ApiError, ApiResponse, AppState, DashboardSummaryDto, auth};

/// GET /dashboard/summary
/// The landing-page numbers for a logged-in member.
pub async fn get_summary(
    State(state): State<Arc<AppState>>,
    session: Session,
) -> Result<Json<ApiResponse<DashboardSummaryDto>>, ApiError> {
    let user = auth::current_user(&session).await?;

    let guild = state.store().guild_for_user(user.id).await?;
    let document_count = state.store().document_count().await?;

    let (guild_name, guild_status) = match guild {
        Some(g) => (Some(g.name), "Active Member".to_string()),
        None => (None, "No Guild Assigned".to_string()),
    };

    Ok(Json(ApiResponse::success(DashboardSummaryDto {
        guild_name,
        guild_status,
        document_count,
    })))
}
