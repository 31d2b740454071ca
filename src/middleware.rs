use std::sync::Arc;

use axum::{
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};

use crate::{
    error::AppError,
    model::{CurrentUser, User},
    AppState,
};

/// Header carrying the bearer token, both on requests and on login responses.
pub const AUTH_HEADER: &str = "x-auth";

pub async fn mw_require_auth<B>(
    State(data): State<Arc<AppState>>,
    mut request: Request<B>,
    next: Next<B>,
) -> Result<Response, AppError> {
    let token = request
        .headers()
        .get(AUTH_HEADER)
        .and_then(|header| header.to_str().ok())
        .map(str::to_owned);

    let token = if let Some(token) = token {
        token
    } else {
        return Err(AppError::Unauthorized);
    };

    let user = match User::find_by_token(&data.db, &data.auth, &token).await? {
        Some(user) => user,
        None => {
            tracing::debug!("rejected unknown or revoked token");
            return Err(AppError::Unauthorized);
        }
    };

    request.extensions_mut().insert(CurrentUser { user, token });

    Ok(next.run(request).await)
}
