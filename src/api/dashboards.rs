//! Dashboard management endpoints

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
};
use serde::Deserialize;

use crate::AppState;
use crate::data::{Dashboard, DashboardFeed};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct CreateDashboardRequest {
    pub title: String,
}

/// GET /api/dashboards
/// All dashboards in display order, each with its posts
async fn list_dashboards(
    State(state): State<AppState>,
) -> Result<Json<Vec<DashboardFeed>>, AppError> {
    Ok(Json(state.dashboards.feeds().await?))
}

/// POST /api/dashboards
/// Register a rule and create the matching dashboard(s)
async fn create_dashboard(
    State(state): State<AppState>,
    Json(request): Json<CreateDashboardRequest>,
) -> Result<(StatusCode, Json<Vec<Dashboard>>), AppError> {
    let created = state.dashboards.create(&request.title).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// DELETE /api/dashboards/:id
async fn delete_dashboard(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.dashboards.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn dashboards_router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/dashboards",
            get(list_dashboards).post(create_dashboard),
        )
        .route("/api/dashboards/:id", delete(delete_dashboard))
}
