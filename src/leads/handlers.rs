use axum::{
    extract::State,
    http::StatusCode,
    routing::{delete, get, patch, post},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::extractors::{AdminUser, ApiJson, ApiPath, ApiQuery},
    error::AppError,
    leads::dto::{ContactRequest, LeadPage, LeadQuery, LeadResponse, UpdateStatusRequest},
    state::AppState,
};

pub fn public_routes() -> Router<AppState> {
    Router::new().route("/contact/submit", post(submit_contact))
}

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/contact/admin/all", get(list_leads))
        .route("/contact/admin/status/:id", patch(update_status))
        .route("/contact/admin/delete/:id", delete(delete_lead))
}

#[instrument(skip(state, payload))]
pub async fn submit_contact(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<ContactRequest>,
) -> Result<(StatusCode, Json<LeadResponse>), AppError> {
    let lead = state.leads.submit(payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(LeadResponse {
            message: "Message sent successfully!",
            lead,
        }),
    ))
}

#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn list_leads(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ApiQuery(q): ApiQuery<LeadQuery>,
) -> Result<Json<LeadPage>, AppError> {
    Ok(Json(state.leads.list(q).await?))
}

#[instrument(skip(state, admin, payload), fields(admin_id = %admin.id))]
pub async fn update_status(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<UpdateStatusRequest>,
) -> Result<Json<LeadResponse>, AppError> {
    let lead = state.leads.update_status(id, payload.status).await?;
    Ok(Json(LeadResponse {
        message: "Status updated",
        lead,
    }))
}

#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn delete_lead(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.leads.delete(id).await?;
    Ok(Json(serde_json::json!({ "message": "Lead deleted" })))
}
