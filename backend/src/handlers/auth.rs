use crate::{
    auth::{encode_jwt, hash_password, verify_password},
    config::Config,
    database::{repository::UserRepository, DbPool},
};
use axum::{
    extract::{Json, State},
    http::StatusCode,
};
use shared::{AuthResponse, ErrorResponse, LoginRequest, SignupRequest};
use tracing::{debug, error, info, warn};

/// Signup handler - creates a new user account
pub async fn signup(
    State(pool): State<DbPool>,
    State(config): State<Config>,
    Json(req): Json<SignupRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), (StatusCode, Json<ErrorResponse>)> {
    info!("[SIGNUP] new user signup request");
    debug!("   Username: {}", req.username);

    // Validate input
    if req.username.len() < 3 {
        warn!("[SIGNUP] username too short");
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "Username must be at least 3 characters".to_string(),
            }),
        ));
    }

    // Check if username already exists
    match UserRepository::find_by_username(&pool, &req.username).await {
        Ok(Some(_)) => {
            warn!("[SIGNUP] username already taken: {}", req.username);
            return Err((
                StatusCode::CONFLICT,
                Json(ErrorResponse {
                    error: "Username already taken".to_string(),
                }),
            ));
        }
        Ok(None) => {}
        Err(e) => {
            error!("[SIGNUP] database error checking username: {}", e);
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "Database error".to_string(),
                }),
            ));
        }
    }

    // Hash password
    let password_hash = match hash_password(&req.password) {
        Ok(hash) => hash,
        Err(e) => {
            warn!("[SIGNUP] password hashing failed: {}", e);
            return Err((StatusCode::BAD_REQUEST, Json(ErrorResponse { error: e })));
        }
    };

    // Create user
    let user = match UserRepository::create(&pool, &req.username, &password_hash).await {
        Ok(user) => user,
        Err(e) => {
            error!("[SIGNUP] failed to create user: {}", e);
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "Failed to create user".to_string(),
                }),
            ));
        }
    };

    // Generate JWT
    let token = match encode_jwt(user.id, user.username.clone(), &config) {
        Ok(token) => token,
        Err(e) => {
            error!("[SIGNUP] JWT encoding failed: {}", e);
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "Failed to generate token".to_string(),
                }),
            ));
        }
    };

    info!("[SIGNUP] user created: id={} username={}", user.id, user.username);

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            username: user.username,
            message: "Signup successful".to_string(),
        }),
    ))
}

/// Login handler - authenticates existing user and marks them online
pub async fn login(
    State(pool): State<DbPool>,
    State(config): State<Config>,
    Json(req): Json<LoginRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), (StatusCode, Json<ErrorResponse>)> {
    info!("[LOGIN] login attempt");
    debug!("   Username: {}", req.username);

    let user = match UserRepository::find_by_username(&pool, &req.username).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            warn!("[LOGIN] user not found: {}", req.username);
            return Err((
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse {
                    error: "Invalid credentials".to_string(),
                }),
            ));
        }
        Err(e) => {
            error!("[LOGIN] database error: {}", e);
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "Database error".to_string(),
                }),
            ));
        }
    };

    // Verify password
    let is_valid = match verify_password(&req.password, &user.password_hash) {
        Ok(valid) => valid,
        Err(e) => {
            error!("[LOGIN] password verification error: {}", e);
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "Authentication error".to_string(),
                }),
            ));
        }
    };

    if !is_valid {
        warn!("[LOGIN] invalid password for user: {}", user.username);
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse {
                error: "Invalid credentials".to_string(),
            }),
        ));
    }

    // Mark online at login time; the realtime announce keeps it in sync
    // from here on
    if let Err(e) = UserRepository::set_online(&pool, &user.username, true).await {
        warn!("[LOGIN] failed to persist online flag for {}: {}", user.username, e);
    }

    // Generate JWT
    let token = match encode_jwt(user.id, user.username.clone(), &config) {
        Ok(token) => token,
        Err(e) => {
            error!("[LOGIN] JWT encoding failed: {}", e);
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "Failed to generate token".to_string(),
                }),
            ));
        }
    };

    info!("[LOGIN] user authenticated: id={} username={}", user.id, user.username);

    Ok((
        StatusCode::OK,
        Json(AuthResponse {
            token,
            username: user.username,
            message: "Login successful".to_string(),
        }),
    ))
}
