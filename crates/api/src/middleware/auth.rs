//! Principal extractor for Axum handlers.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use viewguard_core::error::CoreError;
use viewguard_core::presence::Principal;

use crate::auth::jwt::validate_token;
use crate::error::AppError;
use crate::state::AppState;

/// The caller of a presence endpoint.
///
/// A request without an `Authorization` header is an anonymous viewer of the
/// default guard. A header that is present but malformed or carries an
/// invalid token is rejected with 401.
///
/// ```ignore
/// async fn my_handler(viewer: Viewer) -> AppResult<Json<()>> {
///     tracing::info!(guard = %viewer.principal.guard, "handling request");
///     Ok(Json(()))
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Viewer {
    pub principal: Principal,
    /// Role from the token; `None` for anonymous viewers.
    pub role: Option<String>,
}

impl FromRequestParts<AppState> for Viewer {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let presence = &state.config.presence;

        let Some(auth_header) = parts.headers.get("authorization") else {
            return Ok(Viewer {
                principal: Principal::anonymous(
                    presence.default_guard.clone(),
                    presence.anonymous_name.clone(),
                ),
                role: None,
            });
        };

        let token = auth_header
            .to_str()
            .ok()
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or_else(|| {
                AppError::Core(CoreError::Unauthorized(
                    "Invalid Authorization format. Expected: Bearer <token>".into(),
                ))
            })?;

        let claims = validate_token(token, &state.config.jwt).map_err(|_| {
            AppError::Core(CoreError::Unauthorized("Invalid or expired token".into()))
        })?;

        let guard = claims
            .guard
            .filter(|g| !g.trim().is_empty())
            .unwrap_or_else(|| presence.default_guard.clone());

        Ok(Viewer {
            principal: Principal::new(claims.sub, guard, claims.name),
            role: Some(claims.role),
        })
    }
}
