//! In-process stand-in for the Conduit and JSONPlaceholder APIs.
//!
//! Serves the same wire shapes as the real deployments on an ephemeral
//! port, and counts upstream hits so tests can prove whether a request
//! ever left the harness.

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::{Path as UrlPath, State};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use conduit_harness::HarnessConfig;
use parking_lot::Mutex;
use serde_json::{json, Value};

pub const STUB_TOKEN: &str = "stub-jwt-token";
pub const STUB_EMAIL: &str = "pwtest155@test.com";
pub const STUB_PASSWORD: &str = "123456";

/// How the stub answers `/api/users/login`
#[derive(Clone, Copy, Default, PartialEq)]
pub enum LoginBehavior {
    #[default]
    Normal,

    /// 200 with a user envelope that carries no token
    MissingToken,

    /// 500 regardless of the credentials
    Outage,
}

#[derive(Default)]
struct StubState {
    articles: Mutex<Vec<Value>>,
    login: LoginBehavior,
    slug_seq: AtomicUsize,
    tag_hits: AtomicUsize,
    article_hits: AtomicUsize,
}

/// Handle for the stub server. Dropping it aborts the serve task.
pub struct StubApi {
    base_url: String,
    state: Arc<StubState>,
    server: tokio::task::JoinHandle<()>,
}

impl StubApi {
    pub async fn spawn() -> Self {
        Self::spawn_inner(Vec::new(), LoginBehavior::default()).await
    }

    pub async fn spawn_with_articles(articles: Vec<Value>) -> Self {
        Self::spawn_inner(articles, LoginBehavior::default()).await
    }

    pub async fn spawn_with_login(behavior: LoginBehavior) -> Self {
        Self::spawn_inner(Vec::new(), behavior).await
    }

    async fn spawn_inner(articles: Vec<Value>, login: LoginBehavior) -> Self {
        let state = Arc::new(StubState {
            articles: Mutex::new(articles),
            login,
            ..Default::default()
        });
        let app = Router::new()
            .route("/api/users/login", post(login_handler))
            .route("/api/tags", get(tags_handler))
            .route(
                "/api/articles",
                get(list_articles_handler).post(create_article_handler),
            )
            .route("/api/articles/:slug", delete(delete_article_handler))
            .route("/posts", post(create_post_handler))
            .route("/posts/:id", get(get_post_handler))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind stub listener");
        let addr = listener.local_addr().expect("stub listener addr");
        let server = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            base_url: format!("http://{addr}"),
            state,
            server,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Times `/api/tags` was served.
    pub fn tag_hits(&self) -> usize {
        self.state.tag_hits.load(Ordering::SeqCst)
    }

    /// Times `/api/articles` was listed.
    pub fn article_hits(&self) -> usize {
        self.state.article_hits.load(Ordering::SeqCst)
    }

    pub fn article_count(&self) -> usize {
        self.state.articles.lock().len()
    }
}

impl Drop for StubApi {
    fn drop(&mut self) {
        self.server.abort();
    }
}

/// Harness configuration pointing every endpoint at the stub, with the
/// snapshot file placed under `dir`.
pub fn stub_config(api: &StubApi, dir: &Path) -> HarnessConfig {
    let mut config = HarnessConfig::default();
    config.api_base_url = api.base_url().to_string();
    config.placeholder_base_url = api.base_url().to_string();
    config.storage_state_path = dir.join("user.json");
    config.request_timeout_ms = 5_000;
    config
}

/// An article in the shape `GET /api/articles` reports.
pub fn seeded_article(slug: &str, title: &str, description: &str) -> Value {
    json!({
        "slug": slug,
        "title": title,
        "description": description,
        "body": "seeded body",
        "tagList": [],
        "favorited": false,
        "favoritesCount": 0,
    })
}

async fn login_handler(State(state): State<Arc<StubState>>, Json(body): Json<Value>) -> Response {
    match state.login {
        LoginBehavior::Outage => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"message": "internal server error"})),
            )
                .into_response();
        }
        LoginBehavior::MissingToken => {
            return Json(json!({
                "user": {
                    "email": STUB_EMAIL,
                    "username": "pwtest155",
                }
            }))
            .into_response();
        }
        LoginBehavior::Normal => {}
    }

    let email = body.pointer("/user/email").and_then(Value::as_str);
    let password = body.pointer("/user/password").and_then(Value::as_str);
    if email != Some(STUB_EMAIL) || password != Some(STUB_PASSWORD) {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({"errors": {"email or password": ["is invalid"]}})),
        )
            .into_response();
    }
    Json(json!({
        "user": {
            "email": STUB_EMAIL,
            "token": STUB_TOKEN,
            "username": "pwtest155",
            "bio": null,
            "image": null,
        }
    }))
    .into_response()
}

async fn tags_handler(State(state): State<Arc<StubState>>) -> Json<Value> {
    state.tag_hits.fetch_add(1, Ordering::SeqCst);
    Json(json!({"tags": ["upstream", "untouched"]}))
}

async fn list_articles_handler(State(state): State<Arc<StubState>>) -> Json<Value> {
    state.article_hits.fetch_add(1, Ordering::SeqCst);
    let articles = state.articles.lock().clone();
    let count = articles.len();
    Json(json!({"articles": articles, "articlesCount": count}))
}

async fn create_article_handler(
    State(state): State<Arc<StubState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !authorized(&headers) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"message": "missing authorization credentials"})),
        )
            .into_response();
    }

    let draft = body.get("article").cloned().unwrap_or(Value::Null);
    let title = draft
        .get("title")
        .and_then(Value::as_str)
        .unwrap_or("untitled")
        .to_string();
    // The real API suffixes slugs to keep them unique; a counter does here.
    let seq = state.slug_seq.fetch_add(1, Ordering::SeqCst);
    let slug = format!("{}-{seq}", slugify(&title));
    let article = json!({
        "slug": slug,
        "title": title,
        "description": draft.get("description").and_then(Value::as_str).unwrap_or(""),
        "body": draft.get("body").and_then(Value::as_str).unwrap_or(""),
        "tagList": draft.get("tagList").cloned().unwrap_or_else(|| json!([])),
        "favorited": false,
        "favoritesCount": 0,
    });
    state.articles.lock().push(article.clone());
    (StatusCode::CREATED, Json(json!({"article": article}))).into_response()
}

async fn delete_article_handler(
    State(state): State<Arc<StubState>>,
    headers: HeaderMap,
    UrlPath(slug): UrlPath<String>,
) -> Response {
    if !authorized(&headers) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"message": "missing authorization credentials"})),
        )
            .into_response();
    }

    let mut articles = state.articles.lock();
    let before = articles.len();
    articles.retain(|article| article.get("slug").and_then(Value::as_str) != Some(slug.as_str()));
    if articles.len() == before {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"message": "article not found"})),
        )
            .into_response();
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn get_post_handler(UrlPath(id): UrlPath<u64>) -> Response {
    if id != 1 {
        return StatusCode::NOT_FOUND.into_response();
    }
    Json(json!({
        "userId": 1,
        "id": 1,
        "title": "sunt aut facere",
        "body": "quia et suscipit",
    }))
    .into_response()
}

// JSONPlaceholder echoes the posted body back with an assigned id.
async fn create_post_handler(Json(body): Json<Value>) -> Response {
    let mut post = body;
    if let Some(map) = post.as_object_mut() {
        map.insert("id".to_string(), json!(101));
    }
    (StatusCode::CREATED, Json(post)).into_response()
}

fn authorized(headers: &HeaderMap) -> bool {
    let expected = format!("Token {STUB_TOKEN}");
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        == Some(expected.as_str())
}

fn slugify(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect()
}
