use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderName, HeaderValue, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use serde_json::json;

use crate::{
    error::AppError,
    middleware::AUTH_HEADER,
    model::{CurrentUser, NewTodo, NewUser, Todo, TodoPatch, User},
    schema::{CreateTodoSchema, CredentialsSchema, UpdateTodoSchema, ValidJson},
    AppState,
};

// Handler for the health checker route
pub async fn health_checker_handler() -> impl IntoResponse {
    const MESSAGE: &str = "Authenticated todo API with Rust, SQLX, SQLite, and Axum";

    let json_response = serde_json::json!({
        "status": "success",
        "message": MESSAGE
    });

    Json(json_response)
}

// Handler for getting all Todo items of the caller
pub async fn get_todos(
    State(data): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
) -> Result<impl IntoResponse, AppError> {
    let todos = Todo::find_all_by_owner(&data.db, current.user.id).await?;

    let json_response = serde_json::json!({
        "status": "success",
        "results": todos.len(),
        "todos": todos
    });
    Ok((StatusCode::OK, Json(json_response)))
}

// Handler for creating a new Todo
pub async fn create_todo(
    State(data): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    ValidJson(body): ValidJson<CreateTodoSchema>,
) -> Result<impl IntoResponse, AppError> {
    let new_todo = NewTodo::new(&body.text, body.completed)?;
    let todo = Todo::create(&data.db, current.user.id, new_todo).await?;
    tracing::debug!(todo_id = todo.id, owner_id = todo.owner_id, "todo created");

    let todo_response = json!({"status": "success","data": json!({
        "todo": todo
    })});

    Ok((StatusCode::CREATED, Json(todo_response)))
}

// Handler for getting a specific Todo by ID
pub async fn get_todo(
    Path(id): Path<String>,
    State(data): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
) -> Result<impl IntoResponse, AppError> {
    let todo_id = parse_todo_id(&id)?;
    let todo = Todo::find_by_owner(&data.db, todo_id, current.user.id)
        .await?
        .ok_or_else(|| todo_not_found(&id))?;

    let todo_response = serde_json::json!({"status": "success","data": serde_json::json!({
        "todo": todo
    })});

    Ok((StatusCode::OK, Json(todo_response)))
}

// Handler for updating a Todo by ID
pub async fn update_todo(
    Path(id): Path<String>,
    State(data): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    ValidJson(body): ValidJson<UpdateTodoSchema>,
) -> Result<impl IntoResponse, AppError> {
    let todo_id = parse_todo_id(&id)?;
    let patch = TodoPatch::new(body.text.as_deref(), body.completed)?;

    let todo = Todo::update_by_owner(&data.db, todo_id, current.user.id, patch)
        .await?
        .ok_or_else(|| todo_not_found(&id))?;

    let todo_response = serde_json::json!({"status": "success","data": serde_json::json!({
        "todo": todo
    })});

    Ok(Json(todo_response))
}

// Handler for deleting a Todo by ID, answering with the removed item
pub async fn delete_todo(
    Path(id): Path<String>,
    State(data): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
) -> Result<impl IntoResponse, AppError> {
    let todo_id = parse_todo_id(&id)?;
    let todo = Todo::delete_by_owner(&data.db, todo_id, current.user.id)
        .await?
        .ok_or_else(|| todo_not_found(&id))?;

    let todo_response = serde_json::json!({"status": "success","data": serde_json::json!({
        "todo": todo
    })});

    Ok(Json(todo_response))
}

// Handler for registering a user; the response carries a fresh token
pub async fn signup(
    State(data): State<Arc<AppState>>,
    ValidJson(body): ValidJson<CredentialsSchema>,
) -> Result<impl IntoResponse, AppError> {
    let new_user = NewUser::new(&body.email, &body.password)?;
    tracing::debug!(email = new_user.email(), "registering user");

    let user = User::create(&data.db, &data.auth, new_user).await?;
    let token = user.generate_auth_token(&data.db, &data.auth).await?;
    tracing::info!(user_id = user.id, "user registered");

    let user_response = json!({"status": "success","data": json!({
        "user": user
    })});

    Ok((StatusCode::CREATED, auth_header(&token)?, Json(user_response)))
}

pub async fn login(
    State(data): State<Arc<AppState>>,
    ValidJson(body): ValidJson<CredentialsSchema>,
) -> Result<impl IntoResponse, AppError> {
    let user = User::find_by_credentials(&data.db, &data.auth, &body.email, &body.password).await?;
    let token = user.generate_auth_token(&data.db, &data.auth).await?;
    tracing::info!(user_id = user.id, "user logged in");

    let user_response = json!({"status": "success","data": json!({
        "user": user
    })});

    Ok((StatusCode::OK, auth_header(&token)?, Json(user_response)))
}

pub async fn get_me(Extension(current): Extension<CurrentUser>) -> impl IntoResponse {
    Json(json!({"status": "success","data": json!({
        "user": current.user
    })}))
}

// Handler for logging out: only the token presented with this request is revoked
pub async fn logout(
    State(data): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
) -> Result<impl IntoResponse, AppError> {
    if !current.user.remove_token(&data.db, &current.token).await? {
        return Err(AppError::Unauthorized);
    }
    tracing::info!(user_id = current.user.id, "user logged out");

    Ok((
        StatusCode::OK,
        Json(json!({"status": "success","message": "Logged out"})),
    ))
}

// Malformed ids are reported the same way as missing or foreign todos
fn parse_todo_id(id: &str) -> Result<i64, AppError> {
    id.parse::<i64>().map_err(|_| todo_not_found(id))
}

fn todo_not_found(id: &str) -> AppError {
    AppError::NotFound(format!("Todo with ID: {}", id))
}

fn auth_header(token: &str) -> Result<[(HeaderName, HeaderValue); 1], AppError> {
    let value = HeaderValue::from_str(token)
        .map_err(|e| AppError::Internal(format!("token is not a valid header value: {e}")))?;
    Ok([(HeaderName::from_static(AUTH_HEADER), value)])
}
