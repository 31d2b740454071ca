use std::{num::NonZeroU32, sync::Arc};

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt; // for `app.oneshot()`

use todo_api::{auth::AuthKeys, db, route::create_router, AppState};

struct Reply {
    status: StatusCode,
    token: Option<String>,
    body: Value,
}

async fn app() -> Router {
    let pool = db::connect("sqlite::memory:", 1).await.unwrap();
    db::migrate(&pool).await.unwrap();

    let state = AppState {
        db: pool,
        auth: AuthKeys::new("test-secret", NonZeroU32::new(1_000).unwrap()),
    };
    create_router(Arc::new(state))
}

async fn send(app: &Router, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Reply {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        request = request.header("x-auth", token);
    }
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string())),
        None => request.body(Body::empty()),
    }
    .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let token = response
        .headers()
        .get("x-auth")
        .map(|value| value.to_str().unwrap().to_string());
    let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };

    Reply { status, token, body }
}

async fn register(app: &Router, email: &str) -> String {
    let reply = send(
        app,
        Method::POST,
        "/users",
        None,
        Some(json!({"email": email, "password": "userOnePass"})),
    )
    .await;
    assert_eq!(reply.status, StatusCode::CREATED);
    reply.token.unwrap()
}

async fn create_todo(app: &Router, token: &str, text: &str) -> Value {
    let reply = send(app, Method::POST, "/todos", Some(token), Some(json!({"text": text}))).await;
    assert_eq!(reply.status, StatusCode::CREATED);
    reply.body["data"]["todo"].clone()
}

#[tokio::test]
async fn health_check_needs_no_token() {
    let app = app().await;
    let reply = send(&app, Method::GET, "/", None, None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["status"], "success");
}

#[tokio::test]
async fn signup_returns_token_and_public_user() {
    let app = app().await;
    let reply = send(
        &app,
        Method::POST,
        "/users",
        None,
        Some(json!({"email": "andrew@example.com", "password": "123mnb!"})),
    )
    .await;

    assert_eq!(reply.status, StatusCode::CREATED);
    assert!(reply.token.is_some());
    let user = &reply.body["data"]["user"];
    assert_eq!(user["email"], "andrew@example.com");
    assert!(user["id"].is_i64());
    assert!(user.get("password").is_none());
    assert!(user.get("password_hash").is_none());
    assert!(user.get("tokens").is_none());
}

#[tokio::test]
async fn signup_rejects_invalid_input() {
    let app = app().await;

    for body in [
        json!({"email": "and", "password": "123mnb!"}),
        json!({"email": "andrew@example.com", "password": "123"}),
        json!({"password": "123mnb!"}),
        json!({}),
    ] {
        let reply = send(&app, Method::POST, "/users", None, Some(body)).await;
        assert_eq!(reply.status, StatusCode::BAD_REQUEST);
        assert_eq!(reply.body["status"], "fail");
        assert!(reply.token.is_none());
    }
}

#[tokio::test]
async fn signup_rejects_duplicate_email() {
    let app = app().await;
    register(&app, "andrew@example.com").await;

    let reply = send(
        &app,
        Method::POST,
        "/users",
        None,
        Some(json!({"email": "andrew@example.com", "password": "otherPass1"})),
    )
    .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() {
    let app = app().await;
    let request = Request::builder()
        .method(Method::POST)
        .uri("/users")
        .header("content-type", "application/json")
        .body(Body::from("{\"email\": "))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn login_issues_a_new_token() {
    let app = app().await;
    let signup_token = register(&app, "jen@example.com").await;

    let reply = send(
        &app,
        Method::POST,
        "/users/login",
        None,
        Some(json!({"email": "jen@example.com", "password": "userOnePass"})),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK);
    let login_token = reply.token.unwrap();
    assert_ne!(login_token, signup_token);
    assert_eq!(reply.body["data"]["user"]["email"], "jen@example.com");

    let me = send(&app, Method::GET, "/users/me", Some(&login_token), None).await;
    assert_eq!(me.status, StatusCode::OK);
}

#[tokio::test]
async fn login_rejects_bad_credentials() {
    let app = app().await;
    register(&app, "jen@example.com").await;

    for body in [
        json!({"email": "jen@example.com", "password": "wrongPass1"}),
        json!({"email": "nobody@example.com", "password": "userOnePass"}),
    ] {
        let reply = send(&app, Method::POST, "/users/login", None, Some(body)).await;
        assert_eq!(reply.status, StatusCode::BAD_REQUEST);
        assert!(reply.token.is_none());
    }
}

#[tokio::test]
async fn me_requires_a_valid_token() {
    let app = app().await;
    let token = register(&app, "andrew@example.com").await;

    let reply = send(&app, Method::GET, "/users/me", Some(&token), None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["data"]["user"]["email"], "andrew@example.com");

    let missing = send(&app, Method::GET, "/users/me", None, None).await;
    assert_eq!(missing.status, StatusCode::UNAUTHORIZED);

    let bogus = send(&app, Method::GET, "/users/me", Some("abc123"), None).await;
    assert_eq!(bogus.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_removes_only_the_presented_token() {
    let app = app().await;
    let first = register(&app, "andrew@example.com").await;
    let second = send(
        &app,
        Method::POST,
        "/users/login",
        None,
        Some(json!({"email": "andrew@example.com", "password": "userOnePass"})),
    )
    .await
    .token
    .unwrap();

    let reply = send(&app, Method::DELETE, "/users/me/token", Some(&first), None).await;
    assert_eq!(reply.status, StatusCode::OK);

    let revoked = send(&app, Method::GET, "/users/me", Some(&first), None).await;
    assert_eq!(revoked.status, StatusCode::UNAUTHORIZED);
    let still_valid = send(&app, Method::GET, "/users/me", Some(&second), None).await;
    assert_eq!(still_valid.status, StatusCode::OK);
}

#[tokio::test]
async fn todo_routes_require_auth() {
    let app = app().await;

    let list = send(&app, Method::GET, "/todos", None, None).await;
    assert_eq!(list.status, StatusCode::UNAUTHORIZED);
    let create = send(&app, Method::POST, "/todos", None, Some(json!({"text": "walk dog"}))).await;
    assert_eq!(create.status, StatusCode::UNAUTHORIZED);
    assert_eq!(create.body["status"], "fail");
}

#[tokio::test]
async fn create_todo_is_owned_by_caller() {
    let app = app().await;
    let token = register(&app, "andrew@example.com").await;
    let me = send(&app, Method::GET, "/users/me", Some(&token), None).await;

    let todo = create_todo(&app, &token, "  First test todo ").await;
    assert_eq!(todo["text"], "First test todo");
    assert_eq!(todo["completed"], false);
    assert_eq!(todo["completedAt"], Value::Null);
    assert_eq!(todo["ownerId"], me.body["data"]["user"]["id"]);
}

#[tokio::test]
async fn create_todo_rejects_empty_text() {
    let app = app().await;
    let token = register(&app, "andrew@example.com").await;

    for body in [json!({"text": ""}), json!({"text": "   "}), json!({})] {
        let reply = send(&app, Method::POST, "/todos", Some(&token), Some(body)).await;
        assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    }

    let list = send(&app, Method::GET, "/todos", Some(&token), None).await;
    assert_eq!(list.body["results"], 0);
}

#[tokio::test]
async fn list_only_contains_own_todos() {
    let app = app().await;
    let andrew = register(&app, "andrew@example.com").await;
    let jen = register(&app, "jen@example.com").await;

    create_todo(&app, &andrew, "First test todo").await;
    create_todo(&app, &andrew, "Second test todo").await;
    create_todo(&app, &jen, "Jen's todo").await;

    let reply = send(&app, Method::GET, "/todos", Some(&andrew), None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["results"], 2);
    let texts: Vec<&str> = reply.body["todos"]
        .as_array()
        .unwrap()
        .iter()
        .map(|todo| todo["text"].as_str().unwrap())
        .collect();
    assert_eq!(texts, ["First test todo", "Second test todo"]);
}

#[tokio::test]
async fn get_todo_hides_foreign_and_missing_items() {
    let app = app().await;
    let andrew = register(&app, "andrew@example.com").await;
    let jen = register(&app, "jen@example.com").await;
    let todo = create_todo(&app, &andrew, "First test todo").await;
    let uri = format!("/todos/{}", todo["id"]);

    let own = send(&app, Method::GET, &uri, Some(&andrew), None).await;
    assert_eq!(own.status, StatusCode::OK);
    assert_eq!(own.body["data"]["todo"]["text"], "First test todo");

    let foreign = send(&app, Method::GET, &uri, Some(&jen), None).await;
    assert_eq!(foreign.status, StatusCode::NOT_FOUND);

    let missing = send(&app, Method::GET, "/todos/9999", Some(&andrew), None).await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);

    let malformed = send(&app, Method::GET, "/todos/123abc", Some(&andrew), None).await;
    assert_eq!(malformed.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn patch_sets_and_clears_completed_at() {
    let app = app().await;
    let token = register(&app, "andrew@example.com").await;
    let todo = create_todo(&app, &token, "First test todo").await;
    let uri = format!("/todos/{}", todo["id"]);

    let done = send(
        &app,
        Method::PATCH,
        &uri,
        Some(&token),
        Some(json!({"text": "Updated text", "completed": true})),
    )
    .await;
    assert_eq!(done.status, StatusCode::OK);
    let updated = &done.body["data"]["todo"];
    assert_eq!(updated["text"], "Updated text");
    assert_eq!(updated["completed"], true);
    assert!(updated["completedAt"].is_i64());

    let reopened = send(&app, Method::PATCH, &uri, Some(&token), Some(json!({"completed": false}))).await;
    assert_eq!(reopened.status, StatusCode::OK);
    let updated = &reopened.body["data"]["todo"];
    assert_eq!(updated["text"], "Updated text");
    assert_eq!(updated["completed"], false);
    assert_eq!(updated["completedAt"], Value::Null);
}

#[tokio::test]
async fn patch_rejects_empty_text() {
    let app = app().await;
    let token = register(&app, "andrew@example.com").await;
    let todo = create_todo(&app, &token, "First test todo").await;
    let uri = format!("/todos/{}", todo["id"]);

    let reply = send(&app, Method::PATCH, &uri, Some(&token), Some(json!({"text": " "}))).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn patch_of_foreign_todo_is_not_found_and_leaves_it_unchanged() {
    let app = app().await;
    let andrew = register(&app, "andrew@example.com").await;
    let jen = register(&app, "jen@example.com").await;
    let todo = create_todo(&app, &andrew, "First test todo").await;
    let uri = format!("/todos/{}", todo["id"]);

    let reply = send(
        &app,
        Method::PATCH,
        &uri,
        Some(&jen),
        Some(json!({"text": "hijacked", "completed": true})),
    )
    .await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);

    let own = send(&app, Method::GET, &uri, Some(&andrew), None).await;
    assert_eq!(own.body["data"]["todo"]["text"], "First test todo");
    assert_eq!(own.body["data"]["todo"]["completed"], false);
}

#[tokio::test]
async fn delete_returns_the_removed_todo() {
    let app = app().await;
    let andrew = register(&app, "andrew@example.com").await;
    let jen = register(&app, "jen@example.com").await;
    let todo = create_todo(&app, &andrew, "First test todo").await;
    let uri = format!("/todos/{}", todo["id"]);

    let foreign = send(&app, Method::DELETE, &uri, Some(&jen), None).await;
    assert_eq!(foreign.status, StatusCode::NOT_FOUND);

    let removed = send(&app, Method::DELETE, &uri, Some(&andrew), None).await;
    assert_eq!(removed.status, StatusCode::OK);
    assert_eq!(removed.body["data"]["todo"]["id"], todo["id"]);

    let gone = send(&app, Method::GET, &uri, Some(&andrew), None).await;
    assert_eq!(gone.status, StatusCode::NOT_FOUND);
    let again = send(&app, Method::DELETE, &uri, Some(&andrew), None).await;
    assert_eq!(again.status, StatusCode::NOT_FOUND);
}
