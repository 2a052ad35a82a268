use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::{
        dto::{
            AdminRegisterRequest, AuthResponse, EmployeesResponse, LoginRequest, MessageResponse,
            ProfileResponse, PublicUser, RegisterRequest, ResetPasswordRequest,
        },
        extractors::{AdminUser, ApiJson, AuthUser},
        services::Session,
    },
    error::AppError,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/admin/register", post(admin_register))
        .route("/auth/login", post(login))
        .route("/auth/reset-password", post(reset_password))
}

pub fn profile_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/profile", get(get_profile))
        .route("/users/employees", get(list_employees))
}

fn auth_response(message: &'static str, session: Session) -> Json<AuthResponse> {
    Json(AuthResponse {
        message,
        token: session.token,
        role: session.user.role,
    })
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RegisterRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let session = state.auth.register(payload).await?;
    Ok(auth_response("Registered", session))
}

#[instrument(skip(state, payload))]
pub async fn admin_register(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<AdminRegisterRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let session = state.auth.admin_register(payload).await?;
    Ok(auth_response("Registered", session))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let session = state.auth.login(payload).await?;
    Ok(auth_response("Logged in", session))
}

#[instrument(skip(state, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    state.auth.reset_password(payload).await?;
    Ok(Json(MessageResponse {
        message: "Password reset successful",
    }))
}

#[instrument(skip(state))]
pub async fn get_profile(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<ProfileResponse>, AppError> {
    let user = state.auth.get_profile(user.id).await?;
    Ok(Json(ProfileResponse {
        success: true,
        user: user.into(),
    }))
}

#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn list_employees(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
) -> Result<Json<EmployeesResponse>, AppError> {
    let employees: Vec<PublicUser> = state
        .auth
        .list_employees()
        .await?
        .into_iter()
        .map(PublicUser::from)
        .collect();
    Ok(Json(EmployeesResponse {
        success: true,
        count: employees.len(),
        employees,
    }))
}
