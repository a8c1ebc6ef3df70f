use std::collections::HashMap;

use axum::{
    extract::{Path, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use axum_extra::headers::{authorization::Bearer, Authorization, HeaderMapExt};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use staydesk_core::identity::{Actor, Role};

use crate::error::AppError;
use crate::state::AppState;

pub const SESSION_COOKIE: &str = "session";

// ============================================================================
// JWT Claims
// ============================================================================

/// Operator session. Also the shape of the identity provider's custom claims.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SessionClaims {
    pub sub: String,
    pub email: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hotel_id: Option<Uuid>,
    pub exp: usize,
}

impl SessionClaims {
    /// None for a hotelier session that is not bound to a hotel.
    pub fn actor(&self) -> Option<Actor> {
        match self.role {
            Role::Agency => Some(Actor::Agency { user_id: self.sub.clone() }),
            Role::Hotelier => self.hotel_id.map(|hotel_id| Actor::Hotelier {
                user_id: self.sub.clone(),
                hotel_id,
            }),
        }
    }
}

/// Cookie first, then `Authorization: Bearer`.
fn session_token(headers: &HeaderMap) -> Option<String> {
    let jar = CookieJar::from_headers(headers);
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        return Some(cookie.value().to_string());
    }
    headers
        .typed_get::<Authorization<Bearer>>()
        .map(|Authorization(bearer)| bearer.token().to_string())
}

pub fn decode_claims(token: &str, secret: &str) -> Result<SessionClaims, AppError> {
    decode::<SessionClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| AppError::AuthenticationError(format!("Invalid session: {}", e)))
}

fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<SessionClaims, AppError> {
    let token = session_token(headers)
        .ok_or_else(|| AppError::AuthenticationError("Missing session".to_string()))?;
    decode_claims(&token, &state.auth.secret)
}

// ============================================================================
// Agency Guard
// ============================================================================

pub async fn agency_guard(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let claims = authenticate(&state, req.headers())?;

    if claims.role != Role::Agency {
        return Err(AppError::AuthorizationError("Agency access only".to_string()));
    }

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

// ============================================================================
// Hotel Guard
// ============================================================================

/// Agency, or the hotelier of the hotel named by `{hotel_id}`.
pub async fn hotel_guard(
    State(state): State<AppState>,
    Path(params): Path<HashMap<String, String>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let claims = authenticate(&state, req.headers())?;

    let hotel_id = params
        .get("hotel_id")
        .and_then(|raw| Uuid::parse_str(raw).ok())
        .ok_or_else(|| AppError::BadRequest("Invalid hotel id".to_string()))?;

    let allowed = claims
        .actor()
        .is_some_and(|actor| actor.can_access_hotel(hotel_id));
    if !allowed {
        tracing::warn!("Session {} denied access to hotel {}", claims.sub, hotel_id);
        return Err(AppError::AuthorizationError("No access to this hotel".to_string()));
    }

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}
