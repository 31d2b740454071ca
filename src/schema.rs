use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest},
    http::Request,
    Json,
};
use serde::Deserialize;

use crate::error::AppError;

// Request body for registering a user and for logging in
#[derive(Debug, Deserialize)]
pub struct CredentialsSchema {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

// Struct representing the request body for creating a new Todo
#[derive(Debug, Deserialize)]
pub struct CreateTodoSchema {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub completed: bool,
}

// Struct representing the request body for updating a Todo
#[derive(Debug, Deserialize)]
pub struct UpdateTodoSchema {
    pub text: Option<String>,
    pub completed: Option<bool>,
}

/// `Json` extractor whose rejections are reported as validation failures.
pub struct ValidJson<T>(pub T);

#[async_trait]
impl<S, B, T> FromRequest<S, B> for ValidJson<T>
where
    Json<T>: FromRequest<S, B, Rejection = JsonRejection>,
    S: Send + Sync,
    B: Send + 'static,
{
    type Rejection = AppError;

    async fn from_request(req: Request<B>, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| AppError::Validation(rejection.body_text()))?;
        Ok(ValidJson(value))
    }
}
