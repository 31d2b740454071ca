use std::str::FromStr;

use sqlx::{
    migrate::MigrateDatabase,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Sqlite,
};

const SCHEMA: [&str; 5] = [
    r#"CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        email TEXT NOT NULL UNIQUE COLLATE NOCASE,
        password_hash TEXT NOT NULL
    );"#,
    r#"CREATE TABLE IF NOT EXISTS user_tokens (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        access TEXT NOT NULL,
        token TEXT NOT NULL
    );"#,
    "CREATE INDEX IF NOT EXISTS idx_user_tokens_token ON user_tokens(token);",
    r#"CREATE TABLE IF NOT EXISTS todos (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        text TEXT NOT NULL,
        completed BOOLEAN NOT NULL DEFAULT 0,
        completed_at INTEGER,
        owner_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE
    );"#,
    "CREATE INDEX IF NOT EXISTS idx_todos_owner ON todos(owner_id);",
];

// Open a pool on `database_url`, creating the database file first if needed
pub async fn connect(database_url: &str, max_connections: u32) -> Result<Pool<Sqlite>, sqlx::Error> {
    if !Sqlite::database_exists(database_url).await.unwrap_or(false) {
        tracing::info!("Creating database {}", database_url);
        Sqlite::create_database(database_url).await?;
    } else {
        tracing::debug!("Database already exists");
    }

    let options = SqliteConnectOptions::from_str(database_url)?.foreign_keys(true);

    // In-memory databases live as long as their connection, so never recycle it
    SqlitePoolOptions::new()
        .max_connections(max_connections)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
}

pub async fn migrate(pool: &Pool<Sqlite>) -> Result<(), sqlx::Error> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    tracing::info!("Database schema is up to date");
    Ok(())
}
