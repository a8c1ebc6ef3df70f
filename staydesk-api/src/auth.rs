use axum::{
    extract::State,
    http::StatusCode,
    routing::post,
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use staydesk_core::identity::Role;

use crate::middleware::auth::{decode_claims, SessionClaims, SESSION_COOKIE};
use crate::state::{AppState, AuthConfig};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
struct SessionRequest {
    id_token: String,
}

#[derive(Debug, Serialize)]
struct SessionResponse {
    token: String,
    role: Role,
    hotel_id: Option<Uuid>,
    expires_at: i64,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/session", post(create_session).delete(end_session))
}

/// Signs a session for an already verified identity.
pub fn issue_session_token(
    auth: &AuthConfig,
    sub: &str,
    email: &str,
    role: Role,
    hotel_id: Option<Uuid>,
) -> Result<(String, i64), AppError> {
    let exp = (Utc::now() + Duration::seconds(auth.expiration as i64)).timestamp();
    let claims = SessionClaims {
        sub: sub.to_string(),
        email: email.to_string(),
        role,
        hotel_id,
        exp: exp as usize,
    };

    let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(auth.secret.as_bytes()))
        .map_err(|e| AppError::InternalServerError(format!("Token encoding failed: {}", e)))?;
    Ok((token, exp))
}

async fn create_session(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<SessionRequest>,
) -> Result<(CookieJar, Json<SessionResponse>), AppError> {
    let identity = decode_claims(&req.id_token, &state.auth.identity_secret)?;

    if identity.role == Role::Hotelier && identity.hotel_id.is_none() {
        return Err(AppError::AuthorizationError(
            "Hotelier account is not linked to a hotel".to_string(),
        ));
    }
    let hotel_id = match identity.role {
        Role::Agency => None,
        Role::Hotelier => identity.hotel_id,
    };

    let (token, expires_at) =
        issue_session_token(&state.auth, &identity.sub, &identity.email, identity.role, hotel_id)?;

    let cookie = Cookie::build((SESSION_COOKIE, token.clone()))
        .path("/")
        .http_only(true)
        .secure(state.auth.cookie_secure)
        .same_site(SameSite::Lax)
        .build();

    tracing::info!("Session started for {} as {}", identity.sub, identity.role);

    Ok((
        jar.add(cookie),
        Json(SessionResponse {
            token,
            role: identity.role,
            hotel_id,
            expires_at,
        }),
    ))
}

async fn end_session(jar: CookieJar) -> (CookieJar, StatusCode) {
    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    (jar, StatusCode::NO_CONTENT)
}
