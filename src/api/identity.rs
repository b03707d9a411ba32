//! Viewer Identity
//!
//! Each viewer carries an opaque `ID` cookie issued by the page handler.
//! Requests without it are treated as anonymous and ignored by the sync
//! endpoints.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use std::convert::Infallible;

use crate::sync::ClientIdentity;

/// Name of the identity cookie
pub const IDENTITY_COOKIE: &str = "ID";

/// The caller's identity, if the request carried one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaybeIdentity(pub Option<ClientIdentity>);

#[async_trait]
impl<S> FromRequestParts<S> for MaybeIdentity
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        Ok(Self(identity_from_jar(&jar)))
    }
}

/// Read the identity cookie; an empty value counts as missing
pub fn identity_from_jar(jar: &CookieJar) -> Option<ClientIdentity> {
    jar.get(IDENTITY_COOKIE)
        .map(|cookie| cookie.value().trim())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Issue a new identity and add its cookie to the jar
pub fn issue_identity(jar: CookieJar) -> (CookieJar, ClientIdentity) {
    let id = uuid::Uuid::new_v4().to_string();
    let cookie = Cookie::build((IDENTITY_COOKIE, id.clone()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax);
    (jar.add(cookie), id)
}
