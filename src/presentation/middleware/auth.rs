//! Authentication Middleware
//!
//! Bearer-token validation for protected routes, delegating to the
//! [`crate::application::services::TokenVerifier`] collaborator.

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};

use crate::shared::error::AppError;
use crate::startup::AppState;

/// Authenticated caller extension
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub identity: String,
}

/// Authentication middleware that validates bearer tokens
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    // Extract Authorization header
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| AppError::Unauthenticated("Missing authorization header".into()))?;

    // Check for Bearer token
    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Unauthenticated("Invalid authorization header format".into()))?;

    let identity = state.verifier.verify(token).await?;

    // Insert authenticated caller into request extensions
    request.extensions_mut().insert(AuthUser { identity });

    // Continue to the next handler
    Ok(next.run(request).await)
}
