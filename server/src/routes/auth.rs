//! Auth routes — staff login, session management, WS tickets.

use axum::extract::{FromRef, State};
use axum::http::StatusCode;
use axum::http::header::AUTHORIZATION;
use axum::response::Json;
use serde::{Deserialize, Serialize};

use crate::services::staff;
use crate::state::AppState;

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;

// =============================================================================
// AUTH EXTRACTOR
// =============================================================================

/// Authenticated staff member extracted from the `Authorization: Bearer`
/// header. Use as a handler parameter to require authentication.
pub struct AuthStaff {
    pub staff: staff::StaffMember,
    pub token: String,
}

pub(crate) fn bearer_token(headers: &axum::http::HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

impl<S> axum::extract::FromRequestParts<S> for AuthStaff
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut axum::http::request::Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Some(token) = bearer_token(&parts.headers) else {
            return Err(StatusCode::UNAUTHORIZED);
        };

        let app_state = AppState::from_ref(state);
        let staff = staff::validate_session(&app_state.pool, token)
            .await
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
            .ok_or(StatusCode::UNAUTHORIZED)?;

        Ok(Self { staff, token: token.to_owned() })
    }
}

// =============================================================================
// HANDLERS
// =============================================================================

#[derive(Deserialize)]
pub struct LoginBody {
    pub name: String,
    pub access_code: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub staff: staff::StaffMember,
}

/// `POST /api/auth/login` — exchange name + access code for a session token.
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginBody>,
) -> Result<Json<LoginResponse>, StatusCode> {
    match staff::login(&state.pool, &body.name, &body.access_code).await {
        Ok((token, staff)) => Ok(Json(LoginResponse { token, staff })),
        Err(staff::StaffError::InvalidCredentials) => Err(StatusCode::UNAUTHORIZED),
        Err(_) => Err(StatusCode::INTERNAL_SERVER_ERROR),
    }
}

/// `POST /api/auth/logout` — delete the current session.
pub async fn logout(
    State(state): State<AppState>,
    auth: AuthStaff,
) -> Result<Json<serde_json::Value>, StatusCode> {
    staff::delete_session(&state.pool, &auth.token)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

/// `GET /api/auth/me` — current staff identity.
pub async fn me(auth: AuthStaff) -> Json<staff::StaffMember> {
    Json(auth.staff)
}

#[derive(Serialize)]
pub struct WsTicketResponse {
    pub ticket: String,
}

/// `POST /api/auth/ws-ticket` — mint a one-time websocket ticket.
pub async fn ws_ticket(
    State(state): State<AppState>,
    auth: AuthStaff,
) -> Result<Json<WsTicketResponse>, StatusCode> {
    let ticket = staff::create_ws_ticket(&state.pool, auth.staff.id)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(Json(WsTicketResponse { ticket }))
}
