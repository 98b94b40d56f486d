//! Session cookie extractors.
//!
//! The session lives entirely in the `data` cookie. [`Authenticated`] verifies
//! it on every request; [`Facilitator`] additionally requires the facilitator
//! role. Verification failures are logged here and surface to the client only
//! as a generic 401. A cookie that is present but empty or invalid is cleared
//! in that same response.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use d20_core::{Environment, Participant};

use crate::{error::ApiError, state::AppState};

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "data";

/// Session cookie lifetime.
pub const SESSION_MAX_AGE: time::Duration = time::Duration::hours(24);

/// Cookie carrying a freshly issued token.
pub fn session_cookie(token: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .same_site(SameSite::Lax)
        .http_only(true)
        .max_age(SESSION_MAX_AGE)
        .build()
}

/// Cookie that clears the session on removal.
pub fn cleared_session_cookie() -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE).path("/").build()
}

/// A request carrying a valid session.
#[derive(Debug, Clone)]
pub struct Authenticated(pub Participant);

#[async_trait]
impl<E: Environment> FromRequestParts<AppState<E>> for Authenticated {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<E>,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let token = jar.get(SESSION_COOKIE).map(Cookie::value).ok_or(ApiError::Unauthorized)?;
        if token.is_empty() {
            tracing::debug!("empty session cookie");
            return Err(ApiError::InvalidSession);
        }

        match state.codec.verify(token) {
            Ok(participant) => Ok(Self(participant)),
            Err(e) => {
                tracing::warn!(malformed = e.is_malformed(), "rejected session token: {}", e);
                Err(ApiError::InvalidSession)
            },
        }
    }
}

/// A request from the table's facilitator.
#[derive(Debug, Clone)]
pub struct Facilitator(pub Participant);

#[async_trait]
impl<E: Environment> FromRequestParts<AppState<E>> for Facilitator {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<E>,
    ) -> Result<Self, Self::Rejection> {
        let Authenticated(participant) = Authenticated::from_request_parts(parts, state).await?;
        if participant.is_facilitator {
            Ok(Self(participant))
        } else {
            tracing::debug!(name = %participant.name, "facilitator route refused");
            Err(ApiError::Forbidden)
        }
    }
}
