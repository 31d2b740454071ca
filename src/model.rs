use serde::{Deserialize, Serialize};
use sqlx::{query, query_as, Pool, Sqlite};

use crate::{
    auth::{AuthKeys, AUTH_ACCESS},
    error::AppError,
};

const MIN_PASSWORD_LEN: usize = 6;

// Data model representing a registered user
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing)]
    pub(crate) password_hash: String,
}

// Validated registration input, password still in plaintext
#[derive(Debug, Clone)]
pub struct NewUser {
    email: String,
    password: String,
}

impl NewUser {
    pub fn new(email: &str, password: &str) -> Result<Self, AppError> {
        let email = email.trim();
        if email.is_empty() {
            return Err(AppError::Validation("Email is required".to_string()));
        }
        if !email_address::EmailAddress::is_valid(email) {
            return Err(AppError::Validation(format!("{} is not a valid email", email)));
        }
        validate_password(password)?;

        Ok(NewUser {
            email: email.to_string(),
            password: password.to_string(),
        })
    }

    pub fn email(&self) -> &str {
        &self.email
    }
}

fn validate_password(password: &str) -> Result<(), AppError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "Password must be at least {} characters long",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

impl User {
    pub async fn create(db: &Pool<Sqlite>, keys: &AuthKeys, new_user: NewUser) -> Result<User, AppError> {
        let password_hash = keys.hash_password(&new_user.password)?;

        let user_result = query_as::<_, User>(
            "INSERT INTO users (email, password_hash) VALUES (?, ?) RETURNING id, email, password_hash",
        )
        .bind(&new_user.email)
        .bind(password_hash)
        .fetch_one(db)
        .await;

        match user_result {
            Ok(user) => Ok(user),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(AppError::Validation(
                format!("User with email {} already exists", new_user.email),
            )),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn find_by_credentials(
        db: &Pool<Sqlite>,
        keys: &AuthKeys,
        email: &str,
        password: &str,
    ) -> Result<User, AppError> {
        let user = query_as::<_, User>("SELECT id, email, password_hash FROM users WHERE email = ?")
            .bind(email.trim())
            .fetch_optional(db)
            .await?;

        match user {
            Some(user) if keys.verify_password(password, &user.password_hash) => Ok(user),
            Some(_) => Err(AppError::InvalidCredentials),
            None => {
                // Dummy hash so unknown emails cost the same as wrong passwords
                keys.hash_password(password)?;
                Err(AppError::InvalidCredentials)
            }
        }
    }

    /// Looks up the user a bearer token belongs to. The token must both carry
    /// a valid signature and still be present in that user's token list.
    pub async fn find_by_token(
        db: &Pool<Sqlite>,
        keys: &AuthKeys,
        token: &str,
    ) -> Result<Option<User>, AppError> {
        let Some(user_id) = keys.verify_token(token).and_then(|claims| claims.user_id()) else {
            return Ok(None);
        };

        let user = query_as::<_, User>(
            r#"SELECT users.id, users.email, users.password_hash
            FROM users JOIN user_tokens ON user_tokens.user_id = users.id
            WHERE users.id = ? AND user_tokens.token = ? AND user_tokens.access = ?
            LIMIT 1"#,
        )
        .bind(user_id)
        .bind(token)
        .bind(AUTH_ACCESS)
        .fetch_optional(db)
        .await?;

        Ok(user)
    }

    // Issue a fresh token and append it to this user's token list
    pub async fn generate_auth_token(&self, db: &Pool<Sqlite>, keys: &AuthKeys) -> Result<String, AppError> {
        let token = keys.issue_token(self.id)?;

        query("INSERT INTO user_tokens (user_id, access, token) VALUES (?, ?, ?)")
            .bind(self.id)
            .bind(AUTH_ACCESS)
            .bind(&token)
            .execute(db)
            .await?;

        Ok(token)
    }

    // Returns false when the token was not in this user's list
    pub async fn remove_token(&self, db: &Pool<Sqlite>, token: &str) -> Result<bool, AppError> {
        let rows_affected = query("DELETE FROM user_tokens WHERE user_id = ? AND token = ?")
            .bind(self.id)
            .bind(token)
            .execute(db)
            .await?
            .rows_affected();

        Ok(rows_affected > 0)
    }

    pub async fn set_password(
        &mut self,
        db: &Pool<Sqlite>,
        keys: &AuthKeys,
        password: &str,
    ) -> Result<(), AppError> {
        validate_password(password)?;
        let password_hash = keys.hash_password(password)?;

        query("UPDATE users SET password_hash = ? WHERE id = ?")
            .bind(&password_hash)
            .bind(self.id)
            .execute(db)
            .await?;

        self.password_hash = password_hash;
        Ok(())
    }
}

// Data model representing a Todo item owned by a single user
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Todo {
    pub id: i64,
    pub text: String,
    pub completed: bool,
    /// Milliseconds since the Unix epoch; present exactly when `completed` is true.
    pub completed_at: Option<i64>,
    pub owner_id: i64,
}

#[derive(Debug, Clone)]
pub struct NewTodo {
    text: String,
    completed: bool,
}

impl NewTodo {
    pub fn new(text: &str, completed: bool) -> Result<Self, AppError> {
        Ok(NewTodo {
            text: validate_text(text)?,
            completed,
        })
    }
}

// Partial update; `None` leaves the stored field untouched
#[derive(Debug, Clone, Default)]
pub struct TodoPatch {
    text: Option<String>,
    completed: Option<bool>,
}

impl TodoPatch {
    pub fn new(text: Option<&str>, completed: Option<bool>) -> Result<Self, AppError> {
        Ok(TodoPatch {
            text: text.map(validate_text).transpose()?,
            completed,
        })
    }
}

fn validate_text(text: &str) -> Result<String, AppError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(AppError::Validation("Todo text must not be empty".to_string()));
    }
    Ok(text.to_string())
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

const TODO_COLUMNS: &str = "id, text, completed, completed_at, owner_id";

impl Todo {
    pub async fn create(db: &Pool<Sqlite>, owner_id: i64, new_todo: NewTodo) -> Result<Todo, AppError> {
        let completed_at = new_todo.completed.then(now_millis);

        let todo = query_as::<_, Todo>(&format!(
            "INSERT INTO todos (text, completed, completed_at, owner_id) VALUES (?, ?, ?, ?) RETURNING {TODO_COLUMNS}"
        ))
        .bind(new_todo.text)
        .bind(new_todo.completed)
        .bind(completed_at)
        .bind(owner_id)
        .fetch_one(db)
        .await?;

        Ok(todo)
    }

    pub async fn find_all_by_owner(db: &Pool<Sqlite>, owner_id: i64) -> Result<Vec<Todo>, AppError> {
        let todos = query_as::<_, Todo>(&format!(
            "SELECT {TODO_COLUMNS} FROM todos WHERE owner_id = ? ORDER BY id"
        ))
        .bind(owner_id)
        .fetch_all(db)
        .await?;

        Ok(todos)
    }

    pub async fn find_by_owner(db: &Pool<Sqlite>, id: i64, owner_id: i64) -> Result<Option<Todo>, AppError> {
        let todo = query_as::<_, Todo>(&format!(
            "SELECT {TODO_COLUMNS} FROM todos WHERE id = ? AND owner_id = ?"
        ))
        .bind(id)
        .bind(owner_id)
        .fetch_optional(db)
        .await?;

        Ok(todo)
    }

    /// Applies `patch` in a single statement. Completing an open todo stamps
    /// `completed_at`, completing an already-completed one keeps the original
    /// stamp, and reopening clears it.
    pub async fn update_by_owner(
        db: &Pool<Sqlite>,
        id: i64,
        owner_id: i64,
        patch: TodoPatch,
    ) -> Result<Option<Todo>, AppError> {
        let todo = query_as::<_, Todo>(&format!(
            r#"UPDATE todos SET
                text = COALESCE(?1, text),
                completed = COALESCE(?2, completed),
                completed_at = CASE
                    WHEN ?2 IS NULL THEN completed_at
                    WHEN ?2 = 0 THEN NULL
                    WHEN completed = 1 AND completed_at IS NOT NULL THEN completed_at
                    ELSE ?3
                END
            WHERE id = ?4 AND owner_id = ?5
            RETURNING {TODO_COLUMNS}"#
        ))
        .bind(patch.text)
        .bind(patch.completed)
        .bind(now_millis())
        .bind(id)
        .bind(owner_id)
        .fetch_optional(db)
        .await?;

        Ok(todo)
    }

    pub async fn delete_by_owner(db: &Pool<Sqlite>, id: i64, owner_id: i64) -> Result<Option<Todo>, AppError> {
        let todo = query_as::<_, Todo>(&format!(
            "DELETE FROM todos WHERE id = ? AND owner_id = ? RETURNING {TODO_COLUMNS}"
        ))
        .bind(id)
        .bind(owner_id)
        .fetch_optional(db)
        .await?;

        Ok(todo)
    }
}

// Identity attached to a request by the auth middleware
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    pub token: String,
}
