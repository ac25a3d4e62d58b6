use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use axum::{
    Json,
    extract::{Path, State},
};
use axum_extra::extract::WithRejection;
use rand_core::OsRng;
use std::sync::LazyLock;
use tracing::{info, warn};

use aristocratii_db::blocking;
use aristocratii_db::models::NewUser;
use aristocratii_types::api::{LoginRequest, LoginResponse, RegisterRequest};
use aristocratii_types::models::User;

use crate::error::{ApiError, JsonBody, PathParam};
use crate::state::AppState;

const BAD_CREDENTIALS: &str = "Invalid username or password";

/// Hash checked against when the username is unknown, so both login failures
/// cost one Argon2 verification.
static DUMMY_HASH: LazyLock<Option<String>> = LazyLock::new(|| {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(b"aristocratii-dummy-password", &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| warn!("Failed to build dummy password hash: {}", e))
        .ok()
});

fn verify_against_dummy(password: &str) {
    let Some(hash) = DUMMY_HASH.as_deref() else {
        return;
    };
    if let Ok(parsed) = PasswordHash::new(hash) {
        let _ = Argon2::default().verify_password(password.as_bytes(), &parsed);
    }
}

/// POST /register and POST /users
pub async fn register(
    State(state): State<AppState>,
    WithRejection(Json(req), _): JsonBody<RegisterRequest>,
) -> Result<Json<User>, ApiError> {
    // Validate input
    if req.username.trim().is_empty() {
        return Err(ApiError::BadRequest("username must not be empty".into()));
    }
    if req.password.is_empty() {
        return Err(ApiError::BadRequest("password must not be empty".into()));
    }
    if !req.email.contains('@') {
        return Err(ApiError::BadRequest("email is not valid".into()));
    }

    // Hash password with Argon2id
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?
        .to_string();

    // The UNIQUE constraint decides, so two racing registrations cannot both win
    let created = blocking(&state.db, move |db| {
        db.create_user(&NewUser {
            username: &req.username,
            password_hash: &password_hash,
            email: &req.email,
            balance: req.balance,
            is_verified: req.is_verified,
            is_visible: req.is_visible,
            avatar: req.avatar.as_deref(),
        })
    })
    .await?
    .ok_or_else(|| ApiError::Conflict("Username already exists".into()))?;

    info!("Registered user {} ({})", created.username, created.id);
    Ok(Json(created.into_user()))
}

/// POST /login: unknown usernames and wrong passwords are indistinguishable.
pub async fn login(
    State(state): State<AppState>,
    WithRejection(Json(req), _): JsonBody<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let username = req.username.clone();
    let Some(user) = blocking(&state.db, move |db| db.get_user_by_username(&username)).await? else {
        verify_against_dummy(&req.password);
        return Err(ApiError::Unauthorized(BAD_CREDENTIALS.into()));
    };

    // Verify password
    let parsed_hash = PasswordHash::new(&user.password)
        .map_err(|e| anyhow::anyhow!("stored hash for user {} is unreadable: {}", user.id, e))?;

    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::Unauthorized(BAD_CREDENTIALS.into()))?;

    Ok(Json(LoginResponse {
        message: "Login successful".into(),
        user: user.into_user(),
    }))
}

/// GET /users
pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<User>>, ApiError> {
    let rows = blocking(&state.db, |db| db.list_users()).await?;
    Ok(Json(rows.into_iter().map(|row| row.into_user()).collect()))
}

/// GET /users/{id}
pub async fn get_user(
    State(state): State<AppState>,
    WithRejection(Path(id), _): PathParam<i64>,
) -> Result<Json<User>, ApiError> {
    let row = blocking(&state.db, move |db| db.get_user(id))
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;
    Ok(Json(row.into_user()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dummy_hash_is_a_real_argon2_hash() {
        let hash = DUMMY_HASH.as_deref().expect("dummy hash should be built");
        let parsed = PasswordHash::new(hash).unwrap();
        assert_eq!(parsed.algorithm.as_str(), "argon2id");
        assert!(
            Argon2::default()
                .verify_password(b"secret", &parsed)
                .is_err()
        );
    }
}
