// session.rs
// Bearer-token middleware for protected routes and the extractor handlers use
// to read the authenticated caller.

use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
    typed_header::TypedHeaderRejection,
};
use futures::future::BoxFuture;
use tracing::debug;

use crate::error::AppError;
use crate::models::check_user_id;
use crate::state::AppState;
use crate::token::Claims;

#[derive(Debug, Clone)]
pub struct AuthData {
    pub claims: Claims,
    pub token: String,
}

pub async fn require_bearer(
    State(state): State<Arc<AppState>>,
    bearer: Result<TypedHeader<Authorization<Bearer>>, TypedHeaderRejection>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let TypedHeader(Authorization(bearer)) = bearer.map_err(|rejection| {
        debug!(reason = %rejection, "rejected request without bearer token");
        unauthorized()
    })?;

    let token = bearer.token().to_string();
    let claims = state.tokens.parse(&token).map_err(|err| {
        debug!(reason = %err, "rejected bearer token");
        AppError::Unauthorized(err.to_string())
    })?;

    request.extensions_mut().insert(AuthData { claims, token });
    Ok(next.run(request).await)
}

pub struct AuthUser(pub AuthData);

impl AuthUser {
    pub fn user_id(&self) -> &str {
        &self.0.claims.sub
    }

    pub fn email(&self) -> &str {
        &self.0.claims.email
    }

    /// A caller may only act on their own tenant: the path id must be a valid
    /// user id and equal the token subject.
    pub fn owner<'a>(&self, user_id: &'a str) -> Result<&'a str, AppError> {
        let user_id = check_user_id(user_id)?;
        if user_id != self.user_id() {
            return Err(AppError::Unauthorized(
                "you are not allowed to access this resource".to_string(),
            ));
        }
        Ok(user_id)
    }
}

#[allow(refining_impl_trait)]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = Response;

    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> BoxFuture<'static, Result<Self, Self::Rejection>> {
        let data = parts
            .extensions
            .get::<AuthData>()
            .cloned()
            .ok_or_else(|| unauthorized().into_response());

        Box::pin(async move { data.map(AuthUser) })
    }
}

fn unauthorized() -> AppError {
    AppError::Unauthorized("missing or malformed authorization header".to_string())
}
