use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use storehouse::{app::build_app, state::AppState};
use tower::ServiceExt;

async fn app() -> Router {
    build_app(AppState::in_memory().await.unwrap())
}

async fn call(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(t) = token {
        req = req.header(header::AUTHORIZATION, format!("Bearer {t}"));
    }
    let req = match body {
        Some(b) => req
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(b.to_string()))
            .unwrap(),
        None => req.body(Body::empty()).unwrap(),
    };

    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&bytes).into_owned())
        })
    };
    (status, json)
}

async fn token_for(app: &Router, username: &str, password: &str) -> String {
    let creds = json!({ "username": username, "password": password });
    let (status, _) = call(app, Method::POST, "/register", None, Some(creds.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, body) = call(app, Method::POST, "/login", None, Some(creds)).await;
    assert_eq!(status, StatusCode::OK);
    body["access_token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn health_is_public() {
    let app = app().await;
    let (status, body) = call(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("ok".into()));
}

#[tokio::test]
async fn revoked_token_cannot_delete_tag() {
    let app = app().await;
    let t1 = token_for(&app, "alice", "pw1").await;

    let (status, store) = call(&app, Method::POST, "/stores", Some(&t1), Some(json!({"name": "shoes"}))).await;
    assert_eq!(status, StatusCode::CREATED);
    let store_id = store["id"].as_i64().unwrap();

    let (status, tag) = call(
        &app,
        Method::POST,
        &format!("/stores/{store_id}/tags"),
        Some(&t1),
        Some(json!({"name": "summer"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let tag_id = tag["id"].as_i64().unwrap();

    // item creation is open to anonymous callers
    let (status, item) = call(
        &app,
        Method::POST,
        "/items",
        None,
        Some(json!({"name": "sandal", "price": 19.99, "store_id": store_id})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let item_id = item["id"].as_i64().unwrap();

    let (status, linked) = call(
        &app,
        Method::POST,
        &format!("/items/{item_id}/tags/{tag_id}"),
        Some(&t1),
        Some(json!({"store_id": store_id})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(linked["tags"][0]["name"], "summer");

    let (status, body) = call(&app, Method::POST, "/logout", Some(&t1), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Logout successful");

    let (status, body) = call(&app, Method::DELETE, &format!("/tags/{tag_id}"), Some(&t1), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "token_revoked");

    // a fresh login still works
    let (status, body) = call(
        &app,
        Method::POST,
        "/login",
        None,
        Some(json!({"username": "alice", "password": "pw1"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let t2 = body["access_token"].as_str().unwrap();
    let (status, body) = call(&app, Method::DELETE, &format!("/tags/{tag_id}"), Some(t2), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "tag_linked");
}

#[tokio::test]
async fn protected_routes_report_token_problems() {
    let app = app().await;

    let (status, body) = call(&app, Method::POST, "/stores", None, Some(json!({"name": "x"}))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "authorization_required");

    let (status, body) = call(&app, Method::GET, "/tags/1", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid_token");

    let (status, body) = call(&app, Method::POST, "/logout", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "authorization_required");
}

#[tokio::test]
async fn registration_and_login_failures() {
    let app = app().await;
    token_for(&app, "bob", "secret").await;

    let (status, body) = call(
        &app,
        Method::POST,
        "/register",
        None,
        Some(json!({"username": "bob", "password": "other"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "duplicate_username");

    let (status, body) = call(
        &app,
        Method::POST,
        "/register",
        None,
        Some(json!({"username": "   ", "password": "pw"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "validation_error");

    for creds in [
        json!({"username": "bob", "password": "wrong"}),
        json!({"username": "nobody", "password": "secret"}),
    ] {
        let (status, body) = call(&app, Method::POST, "/login", None, Some(creds)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "invalid_credentials");
    }
}

#[tokio::test]
async fn duplicates_and_store_deletion() {
    let app = app().await;
    let token = token_for(&app, "carol", "pw").await;

    let (_, store) = call(&app, Method::POST, "/stores", Some(&token), Some(json!({"name": "hats"}))).await;
    let store_id = store["id"].as_i64().unwrap();
    let (status, body) = call(&app, Method::POST, "/stores", Some(&token), Some(json!({"name": "hats"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "duplicate_store");

    let tags = format!("/stores/{store_id}/tags");
    let (status, _) = call(&app, Method::POST, &tags, Some(&token), Some(json!({"name": "wool"}))).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, body) = call(&app, Method::POST, &tags, Some(&token), Some(json!({"name": "wool"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "duplicate_tag");

    let (status, body) = call(&app, Method::DELETE, &format!("/stores/{store_id}"), Some(&token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "store_not_empty");

    let (status, body) = call(&app, Method::GET, "/stores/999", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn cross_store_link_is_rejected_over_http() {
    let app = app().await;
    let token = token_for(&app, "dave", "pw").await;

    let (_, a) = call(&app, Method::POST, "/stores", Some(&token), Some(json!({"name": "a"}))).await;
    let (_, b) = call(&app, Method::POST, "/stores", Some(&token), Some(json!({"name": "b"}))).await;
    let (a, b) = (a["id"].as_i64().unwrap(), b["id"].as_i64().unwrap());

    let (_, item) = call(
        &app,
        Method::POST,
        "/items",
        None,
        Some(json!({"name": "boot", "price": 40.0, "store_id": a})),
    )
    .await;
    let (_, tag) = call(
        &app,
        Method::POST,
        &format!("/stores/{b}/tags"),
        Some(&token),
        Some(json!({"name": "winter"})),
    )
    .await;

    let (status, body) = call(
        &app,
        Method::POST,
        &format!("/items/{}/tags/{}", item["id"], tag["id"]),
        Some(&token),
        Some(json!({"store_id": b})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "cross_store_link");
}

#[tokio::test]
async fn item_validation_and_upsert() {
    let app = app().await;
    let token = token_for(&app, "erin", "pw").await;
    let (_, store) = call(&app, Method::POST, "/stores", Some(&token), Some(json!({"name": "s"}))).await;
    let store_id = store["id"].as_i64().unwrap();

    let (status, body) = call(
        &app,
        Method::POST,
        "/items",
        None,
        Some(json!({"name": "cheap", "price": -1.0, "store_id": store_id})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "validation_error");

    let (status, body) = call(
        &app,
        Method::PUT,
        "/items/42",
        Some(&token),
        Some(json!({"name": "new", "price": 3.5})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "validation_error");

    let (status, body) = call(
        &app,
        Method::PUT,
        "/items/42",
        Some(&token),
        Some(json!({"name": "new", "price": 3.5, "store_id": store_id})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], 42);

    let (status, _) = call(&app, Method::DELETE, "/items/42", Some(&token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = call(&app, Method::GET, "/items/42", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn tag_rename_and_unlink_over_http() {
    let app = app().await;
    let token = token_for(&app, "frank", "pw").await;
    let (_, store) = call(&app, Method::POST, "/stores", Some(&token), Some(json!({"name": "s"}))).await;
    let store_id = store["id"].as_i64().unwrap();
    let tags = format!("/stores/{store_id}/tags");
    let (_, summer) = call(&app, Method::POST, &tags, Some(&token), Some(json!({"name": "summer"}))).await;
    let (_, winter) = call(&app, Method::POST, &tags, Some(&token), Some(json!({"name": "winter"}))).await;
    let winter_id = winter["id"].as_i64().unwrap();

    let (status, body) = call(
        &app,
        Method::PUT,
        &format!("/tags/{winter_id}"),
        Some(&token),
        Some(json!({"name": "summer"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "duplicate_tag");

    let (status, body) = call(
        &app,
        Method::PUT,
        &format!("/tags/{winter_id}"),
        Some(&token),
        Some(json!({"name": "autumn"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "autumn");

    let (status, body) = call(&app, Method::PUT, "/tags/500", Some(&token), Some(json!({"name": "new"}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "validation_error");

    let (_, item) = call(
        &app,
        Method::POST,
        "/items",
        None,
        Some(json!({"name": "sandal", "price": 9.5, "store_id": store_id})),
    )
    .await;
    let link = format!("/items/{}/tags/{}", item["id"], summer["id"]);
    let (status, _) = call(&app, Method::POST, &link, Some(&token), Some(json!({"store_id": store_id}))).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = call(&app, Method::DELETE, &link, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tags"], json!([]));

    // removing it again is a no-op
    let (status, body) = call(&app, Method::DELETE, &link, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tags"], json!([]));

    let (status, _) = call(&app, Method::DELETE, &format!("/tags/{}", summer["id"]), Some(&token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}
