//! User, role and permission management plus the dashboard counters.
//!
//! Content-specific admin endpoints live next to their public counterparts
//! (articles, books, pins, quotes, referidos).

use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    AppState,
    auth::AuthUser,
    authz::{self, perms},
    error::{ApiJson, ApiPath, AppError, ErrorBody, OrNotFound},
    models::{
        AdminCreateUserRequest, AdminDashboardStats, AssignRoleRequest, CreateRoleRequest,
        GrantPermissionRequest, MessageResponse, NewUser, Permission, ResetPasswordRequest, Role,
        RoleWithPermissions, User, UserFlagsUpdate,
    },
    password::hash_password,
    validation::{non_blank, normalize_email, validate_password, validate_username},
};

async fn role_named(state: &AppState, name: &str) -> Result<Role, AppError> {
    state
        .repo
        .find_role_by_name(name)
        .await?
        .ok_or_else(|| AppError::validation(format!("unknown role '{name}'")))
}

/// stats
///
/// [Admin Route] Dashboard counters. Requires `stats:read`.
#[utoipa::path(
    get,
    path = "/api/admin/stats",
    responses(
        (status = 200, description = "Counters", body = AdminDashboardStats),
        (status = 403, description = "Missing stats:read", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "admin"
)]
pub async fn stats(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<AdminDashboardStats>, AppError> {
    authz::authorize(&state, &user, perms::STATS_READ).await?;
    Ok(Json(state.repo.get_stats().await?))
}

/// list_users
///
/// [Admin Route] Every account with its role. Requires `users:read`.
#[utoipa::path(
    get,
    path = "/api/admin/users",
    responses((status = 200, description = "All users", body = [User])),
    security(("bearer" = [])),
    tag = "admin"
)]
pub async fn list_users(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<User>>, AppError> {
    authz::authorize(&state, &user, perms::USERS_READ).await?;
    Ok(Json(state.repo.list_users().await?))
}

/// create_user
///
/// [Admin Route] Creates an account directly, optionally with a role other
/// than the default. Requires `users:create`.
#[utoipa::path(
    post,
    path = "/api/admin/users",
    request_body = AdminCreateUserRequest,
    responses(
        (status = 201, description = "Created", body = User),
        (status = 400, description = "Invalid input or unknown role", body = ErrorBody),
        (status = 409, description = "Email or username taken", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "admin"
)]
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn create_user(
    user: AuthUser,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<AdminCreateUserRequest>,
) -> Result<(StatusCode, Json<User>), AppError> {
    authz::authorize(&state, &user, perms::USERS_CREATE).await?;
    let email = normalize_email(&payload.email)?;
    validate_password(&payload.password)?;
    let username = payload
        .username
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty());
    if let Some(username) = &username {
        validate_username(username)?;
    }
    let role_name = match payload.role {
        Some(name) => role_named(&state, name.trim()).await?.name,
        None => state.config.default_role.clone(),
    };

    let created = state
        .repo
        .create_user(NewUser {
            email,
            username,
            password_hash: hash_password(&payload.password)?,
            display_name: payload.display_name,
            role_name,
            is_subscribed: payload.is_subscribed,
        })
        .await?;
    tracing::info!(created = %created.id, role = %created.role_name, "user created by admin");
    Ok((StatusCode::CREATED, Json(created)))
}

/// update_user_flags
///
/// [Admin Route] Toggles `is_active` / `is_subscribed`. Admins cannot
/// deactivate their own account.
#[utoipa::path(
    patch,
    path = "/api/admin/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = UserFlagsUpdate,
    responses(
        (status = 200, description = "Updated", body = User),
        (status = 404, description = "Not found", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "admin"
)]
#[instrument(skip_all, fields(user_id = %user.id, target = %id))]
pub async fn update_user_flags(
    user: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<UserFlagsUpdate>,
) -> Result<Json<User>, AppError> {
    authz::authorize(&state, &user, perms::USERS_UPDATE).await?;
    if id == user.id && payload.is_active == Some(false) {
        return Err(AppError::validation("you cannot deactivate your own account"));
    }
    let updated = state
        .repo
        .set_user_flags(id, payload)
        .await
        .or_not_found("user")?;
    tracing::info!(
        is_active = updated.is_active,
        is_subscribed = updated.is_subscribed,
        "user flags updated"
    );
    Ok(Json(updated))
}

/// reset_password
///
/// [Admin Route] Sets a new password for a user. Requires `users:update`.
#[utoipa::path(
    put,
    path = "/api/admin/users/{id}/password",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = ResetPasswordRequest,
    responses((status = 200, description = "Password reset", body = MessageResponse)),
    security(("bearer" = [])),
    tag = "admin"
)]
#[instrument(skip_all, fields(user_id = %user.id, target = %id))]
pub async fn reset_password(
    user: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    authz::authorize(&state, &user, perms::USERS_UPDATE).await?;
    validate_password(&payload.new_password)?;
    let hash = hash_password(&payload.new_password)?;
    state
        .repo
        .set_password_hash(id, &hash)
        .await
        .or_not_found("user")?;
    tracing::info!("password reset by admin");
    Ok(Json(MessageResponse::new("password reset")))
}

/// assign_role
///
/// [Admin Route] Moves a user to another role, by name. Requires `roles:assign`.
#[utoipa::path(
    put,
    path = "/api/admin/users/{id}/role",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = AssignRoleRequest,
    responses(
        (status = 200, description = "Role assigned", body = User),
        (status = 400, description = "Unknown role", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "admin"
)]
#[instrument(skip_all, fields(user_id = %user.id, target = %id))]
pub async fn assign_role(
    user: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<AssignRoleRequest>,
) -> Result<Json<User>, AppError> {
    authz::authorize(&state, &user, perms::ROLES_ASSIGN).await?;
    let role = role_named(&state, payload.role.trim()).await?;
    let updated = state
        .repo
        .set_user_role(id, role.id)
        .await
        .or_not_found("user")?;
    tracing::info!(role = %role.name, "role assigned");
    Ok(Json(updated))
}

/// list_roles
///
/// [Admin Route] Requires `roles:read`.
#[utoipa::path(
    get,
    path = "/api/admin/roles",
    responses((status = 200, description = "Roles with their permissions", body = [RoleWithPermissions])),
    security(("bearer" = [])),
    tag = "admin"
)]
pub async fn list_roles(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<RoleWithPermissions>>, AppError> {
    authz::authorize(&state, &user, perms::ROLES_READ).await?;
    Ok(Json(state.repo.list_roles().await?))
}

/// list_permissions
///
/// [Admin Route] The `resource:action` catalogue. Requires `roles:read`.
#[utoipa::path(
    get,
    path = "/api/admin/permissions",
    responses((status = 200, description = "Permission catalogue", body = [Permission])),
    security(("bearer" = [])),
    tag = "admin"
)]
pub async fn list_permissions(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Permission>>, AppError> {
    authz::authorize(&state, &user, perms::ROLES_READ).await?;
    Ok(Json(state.repo.list_permissions().await?))
}

/// create_role
///
/// [Admin Route] Requires `roles:manage`. Role names are unique.
#[utoipa::path(
    post,
    path = "/api/admin/roles",
    request_body = CreateRoleRequest,
    responses(
        (status = 201, description = "Created", body = Role),
        (status = 409, description = "Name taken", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "admin"
)]
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn create_role(
    user: AuthUser,
    State(state): State<AppState>,
    ApiJson(mut payload): ApiJson<CreateRoleRequest>,
) -> Result<(StatusCode, Json<Role>), AppError> {
    authz::authorize(&state, &user, perms::ROLES_MANAGE).await?;
    payload.name = non_blank("name", &payload.name)?;
    let role = state.repo.create_role(payload).await?;
    tracing::info!(role = %role.name, "role created");
    Ok((StatusCode::CREATED, Json(role)))
}

/// grant_permission
///
/// [Admin Route] Grants a catalogue permission to a role. Granting one the
/// role already holds answers 409.
#[utoipa::path(
    post,
    path = "/api/admin/roles/{id}/permissions",
    params(("id" = Uuid, Path, description = "Role ID")),
    request_body = GrantPermissionRequest,
    responses(
        (status = 200, description = "Granted", body = MessageResponse),
        (status = 404, description = "Unknown role or permission", body = ErrorBody),
        (status = 409, description = "Already granted", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "admin"
)]
#[instrument(skip_all, fields(user_id = %user.id, role_id = %id))]
pub async fn grant_permission(
    user: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<GrantPermissionRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    authz::authorize(&state, &user, perms::ROLES_MANAGE).await?;
    state
        .repo
        .grant_permission(id, payload.permission_id)
        .await
        .or_not_found("role or permission")?;
    tracing::info!(permission_id = %payload.permission_id, "permission granted");
    Ok(Json(MessageResponse::new("permission granted")))
}

/// revoke_permission
///
/// [Admin Route] Removes a permission from a role. Requires `roles:manage`.
#[utoipa::path(
    delete,
    path = "/api/admin/roles/{id}/permissions/{permission_id}",
    params(
        ("id" = Uuid, Path, description = "Role ID"),
        ("permission_id" = Uuid, Path, description = "Permission ID")
    ),
    responses(
        (status = 204, description = "Revoked"),
        (status = 404, description = "Role does not hold this permission", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "admin"
)]
#[instrument(skip_all, fields(user_id = %user.id, role_id = %id))]
pub async fn revoke_permission(
    user: AuthUser,
    State(state): State<AppState>,
    ApiPath((id, permission_id)): ApiPath<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    authz::authorize(&state, &user, perms::ROLES_MANAGE).await?;
    state
        .repo
        .revoke_permission(id, permission_id)
        .await
        .or_not_found("role permission")?;
    tracing::info!(%permission_id, "permission revoked");
    Ok(StatusCode::NO_CONTENT)
}
