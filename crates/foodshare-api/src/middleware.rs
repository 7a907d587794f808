use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use tracing::debug;

use foodshare_db::users;
use foodshare_types::enums::{Role, UserStatus};

use crate::auth::decode_token;
use crate::error::ApiError;
use crate::{AppState, run_db};

/// The authenticated staff member behind a request.
#[derive(Debug, Clone)]
pub struct CurrentActor {
    pub user_id: i64,
    pub username: String,
    pub full_name: String,
    pub role: Role,
    /// Purok of the actor, used to scope team officers.
    pub purok: Option<String>,
}

impl CurrentActor {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Validate the bearer token, reload the account and admit admins and team officers.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let bearer = req
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .ok_or_else(|| ApiError::Unauthorized("Missing bearer token".into()))?;

    let claims = decode_token(&state.jwt_secret, bearer.token())
        .map_err(|_| ApiError::Unauthorized("Invalid or expired token".into()))?;

    let user = run_db(&state, move |conn| users::get_user(conn, claims.sub))
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Account not found".into()))?;

    if user.status != UserStatus::Approved {
        return Err(ApiError::Unauthorized("Account is not active".into()));
    }
    if user.role == Role::Resident {
        debug!("Resident {} denied admin access", user.username);
        return Err(ApiError::Forbidden("Access denied".into()));
    }

    req.extensions_mut().insert(CurrentActor {
        user_id: user.user_id,
        username: user.username,
        full_name: user.full_name,
        role: user.role,
        purok: user.address,
    });
    Ok(next.run(req).await)
}

impl<S> FromRequestParts<S> for CurrentActor
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentActor>()
            .cloned()
            .ok_or_else(|| ApiError::Unauthorized("Not authenticated".into()))
    }
}
