use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequestParts, State},
    http::request::Parts,
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

use super::error::ApiError;
use super::validation::validate_register;
use crate::auth::{SessionClaims, TokenError};
use crate::db::{LoginRequest, NewUser, RegisterRequest, User, UserResponse};
use crate::AppState;

/// Claims of the caller's verified session cookie.
///
/// Rejects with 401 when the cookie is absent, empty or not signed by us.
pub struct SessionUser(pub SessionClaims);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for SessionUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let token = session_token(&jar, state).ok_or(TokenError::Missing)?;
        let claims = state.sessions.verify(&token)?;
        Ok(SessionUser(claims))
    }
}

/// The session cookie value, if one is set and not cleared by logout
fn session_token(jar: &CookieJar, state: &AppState) -> Option<String> {
    jar.get(&state.config.auth.cookie_name)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}

fn session_cookie(state: &AppState, value: String) -> Cookie<'static> {
    Cookie::build((state.config.auth.cookie_name.clone(), value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

/// POST /register
pub async fn register(
    State(state): State<Arc<AppState>>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Json<UserResponse>, ApiError> {
    let Json(request) = body?;
    validate_register(&request)?;

    let password_hash = state.passwords.hash(&request.password)?;
    let user = User::create(
        &state.db,
        NewUser {
            name: request.name,
            email: request.email,
            password_hash,
            number: request.number,
            phone: request.phone,
            agency: request.agency,
        },
    )
    .await
    .map_err(|e| match &e {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            ApiError::conflict("Email is already registered")
        }
        _ => ApiError::from(e),
    })?;

    info!(user_id = %user.id, email = %user.email, "User registered");
    Ok(Json(UserResponse::from(user)))
}

/// POST /login
///
/// Unknown emails answer `null` rather than an error.
pub async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = body?;
    let user = match User::find_by_email(&state.db, &request.email).await? {
        Some(user) => user,
        None => {
            info!(email = %request.email, "Login for unknown email");
            return Ok(Json(Value::Null).into_response());
        }
    };

    if !state.passwords.verify(&request.password, &user.password_hash) {
        warn!(user_id = %user.id, "Login with wrong password");
        return Err(ApiError::unprocessable("Incorrect password"));
    }

    let token = state.sessions.issue(&SessionClaims {
        email: user.email.clone(),
        id: user.id.clone(),
    })?;

    info!(user_id = %user.id, "User logged in");
    let jar = jar.add(session_cookie(&state, token));
    Ok((jar, Json(UserResponse::from(user))).into_response())
}

/// GET /profile
///
/// `null` when no session cookie is present or its user no longer exists.
pub async fn profile(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<Json<Option<UserResponse>>, ApiError> {
    let token = match session_token(&jar, &state) {
        Some(token) => token,
        None => return Ok(Json(None)),
    };

    let claims = state.sessions.verify(&token)?;
    let user = User::find_by_id(&state.db, &claims.id).await?;
    Ok(Json(user.map(UserResponse::from)))
}

/// POST /logout
pub async fn logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> impl IntoResponse {
    // Overwrite rather than expire, the client treats an empty token as signed out
    let jar = jar.add(session_cookie(&state, String::new()));
    (jar, Json(true))
}
