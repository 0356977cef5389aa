use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::json;
use tracing::info;

use storefront_auth::{
    IssuePasswordReset, JwtClaims, Permission, ResetPassword, ResetToken, SignUp, User, UserCommand,
};
use storefront_core::{AggregateId, AggregateRoot, DomainError};

use crate::app::dto;
use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::authz;
use crate::context::{AdminContext, PrincipalContext};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_users))
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password", post(reset_password))
        .route("/search", get(search_users))
        .route("/protected", get(protected))
        .route("/admin-only", get(admin_only))
}

fn user_stream(user: &User) -> AggregateId {
    AggregateId::from(*user.id())
}

fn session_response(services: &AppServices, user: &User) -> Result<Response, ApiError> {
    let claims = JwtClaims::new(*user.id(), user.role().clone(), Utc::now());
    let token = services
        .jwt()
        .issue(&claims)
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "id": user.id().to_string(),
            "email": user.email(),
            "role": user.role().as_str(),
            "token": token,
        })),
    )
        .into_response())
}

/// Runs password hashing or verification on the blocking pool.
async fn off_runtime<T, F>(work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ApiError::Internal(format!("password task failed: {e}")))
}

pub async fn signup(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::SignupRequest>,
) -> Result<Response, ApiError> {
    let dto::SignupRequest { name, email, password, role } = body;
    let cmd = off_runtime(move || SignUp::prepare(&name, &email, &password, &role, Utc::now())).await??;
    if cmd.role.is_admin() && !services.settings().allow_privileged_signup {
        return Err(ApiError::Forbidden(format!(
            "role '{}' cannot be self-assigned",
            cmd.role.as_str()
        )));
    }

    let user_id = cmd.user_id;
    let result = services
        .dispatch(user_id.into(), User::AGGREGATE_TYPE, UserCommand::SignUp(cmd), |id| {
            User::empty(id.into())
        })
        .await;

    // Two signups racing on one email collide on stream creation.
    if let Err(storefront_infra::DispatchError::Concurrency(_)) = result {
        return Err(DomainError::duplicate("Email already in use").into());
    }
    result?;

    let user: User = services.load(user_id.into(), |id| User::empty(id.into())).await?;
    info!(user_id = %user_id, role = user.role().as_str(), "user signed up");
    session_response(&services, &user)
}

pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::LoginRequest>,
) -> Result<Response, ApiError> {
    let missing = [("email", &body.email), ("password", &body.password)]
        .into_iter()
        .filter(|(_, v)| v.trim().is_empty())
        .map(|(k, _)| k);
    if let Some(err) = DomainError::missing_fields(missing) {
        return Err(err.into());
    }

    let user_id = User::id_for_email(&body.email);
    let user: User = services.load(user_id.into(), |id| User::empty(id.into())).await?;
    if !user.exists() {
        return Err(DomainError::validation("Incorrect Email").into());
    }
    let password = body.password;
    let (user, verified) = off_runtime(move || {
        let verified = user.verify_password(&password);
        (user, verified)
    })
    .await?;
    if !verified {
        return Err(DomainError::validation("Incorrect Password").into());
    }

    session_response(&services, &user)
}

/// Always answers the same way, whether or not the email is registered.
pub async fn forgot_password(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::ForgotPasswordRequest>,
) -> Result<Response, ApiError> {
    if body.email.trim().is_empty() {
        return Err(DomainError::MissingFields(vec!["email".to_string()]).into());
    }

    let user_id = User::id_for_email(&body.email);
    let user: User = services.load(user_id.into(), |id| User::empty(id.into())).await?;
    if user.exists() {
        let token = ResetToken::generate(user_id);
        services
            .dispatch(
                user_stream(&user),
                User::AGGREGATE_TYPE,
                UserCommand::IssuePasswordReset(IssuePasswordReset::for_token(&token, Utc::now())),
                |id| User::empty(id.into()),
            )
            .await?;
        // Delivery channel: the log.
        info!(user_id = %user_id, reset_token = %token, "password reset issued");
    }

    Ok((
        StatusCode::OK,
        Json(json!({ "message": "If the account exists, a reset token has been issued" })),
    )
        .into_response())
}

pub async fn reset_password(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::ResetPasswordRequest>,
) -> Result<Response, ApiError> {
    let missing = [("token", &body.token), ("password", &body.password)]
        .into_iter()
        .filter(|(_, v)| v.trim().is_empty())
        .map(|(k, _)| k);
    if let Some(err) = DomainError::missing_fields(missing) {
        return Err(err.into());
    }

    let token = ResetToken::parse(&body.token)?;
    let password = body.password;
    let cmd = {
        let token = token.clone();
        off_runtime(move || ResetPassword::prepare(&token, &password, Utc::now())).await??
    };
    services
        .dispatch(
            token.user_id().into(),
            User::AGGREGATE_TYPE,
            UserCommand::ResetPassword(cmd),
            |id| User::empty(id.into()),
        )
        .await?;

    Ok((StatusCode::OK, Json(json!({ "message": "Password has been reset" }))).into_response())
}

pub async fn list_users(
    Extension(services): Extension<Arc<AppServices>>,
    principal: PrincipalContext,
) -> Result<Response, ApiError> {
    authz::require(&principal, &Permission::USERS_READ)?;
    let users = services
        .read_models()
        .users
        .list()
        .iter()
        .map(dto::user_to_json)
        .collect::<Vec<_>>();
    Ok((StatusCode::OK, Json(users)).into_response())
}

pub async fn search_users(
    Extension(services): Extension<Arc<AppServices>>,
    principal: PrincipalContext,
    Query(q): Query<dto::SearchQuery>,
) -> Result<Response, ApiError> {
    authz::require(&principal, &Permission::USERS_READ)?;
    let users = services
        .read_models()
        .users
        .search(&q.query)
        .iter()
        .map(dto::user_to_json)
        .collect::<Vec<_>>();
    Ok((StatusCode::OK, Json(users)).into_response())
}

pub async fn protected(principal: PrincipalContext) -> impl IntoResponse {
    Json(json!({
        "message": "You have access to this protected route",
        "user": {
            "id": principal.user_id().to_string(),
            "email": principal.email(),
            "role": principal.role().as_str(),
        },
    }))
}

pub async fn admin_only(AdminContext(admin): AdminContext) -> impl IntoResponse {
    Json(json!({
        "message": "Welcome, admin",
        "user": {
            "id": admin.user_id().to_string(),
            "email": admin.email(),
            "role": admin.role().as_str(),
        },
    }))
}
