//! Typed HTTP clients for the Conduit API and the JSONPlaceholder service

use std::time::Duration;

use reqwest::header::AUTHORIZATION;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::config::HarnessConfig;
use crate::error::{HarnessError, HarnessResult};

/// Authenticated user as returned by the login endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub email: String,
    pub token: String,
    pub username: String,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    user: LoginUser<'a>,
}

#[derive(Serialize)]
struct LoginUser<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct UserEnvelope {
    user: User,
}

/// Fields the caller supplies when creating an article
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleDraft {
    pub title: String,
    pub description: String,
    pub body: String,
    #[serde(rename = "tagList", default)]
    pub tag_list: Vec<String>,
}

/// An article as the API reports it
#[derive(Debug, Clone, Deserialize)]
pub struct Article {
    pub slug: String,
    pub title: String,
    pub description: String,
    pub body: String,
    #[serde(rename = "tagList", default)]
    pub tag_list: Vec<String>,
    #[serde(default)]
    pub favorited: bool,
    #[serde(rename = "favoritesCount", default)]
    pub favorites_count: u64,
}

#[derive(Serialize)]
struct ArticleRequest<'a> {
    article: &'a ArticleDraft,
}

#[derive(Deserialize)]
struct ArticleEnvelope {
    article: Article,
}

/// One page of the global article feed
#[derive(Debug, Clone, Deserialize)]
pub struct ArticlesPage {
    pub articles: Vec<Article>,
    #[serde(rename = "articlesCount")]
    pub articles_count: u64,
}

#[derive(Deserialize)]
struct TagsResponse {
    tags: Vec<String>,
}

/// Client for the Conduit backend. Holds the bearer token once a login has
/// succeeded and attaches it as `Authorization: Token <jwt>` on every
/// subsequent request, which is the scheme the Conduit API expects.
#[derive(Debug, Clone)]
pub struct ConduitClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ConduitClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> HarnessResult<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self {
            http,
            base_url,
            token: None,
        })
    }

    pub fn from_config(config: &HarnessConfig) -> HarnessResult<Self> {
        Self::new(&config.api_base_url, config.request_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Adopt a token obtained elsewhere, e.g. restored from a saved
    /// browser session.
    pub fn set_token(&mut self, token: impl Into<String>) {
        self.token = Some(token.into());
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn bearer(&self) -> HarnessResult<&str> {
        self.token.as_deref().ok_or_else(|| {
            HarnessError::Authentication("no session token; log in first".to_string())
        })
    }

    /// Exchange credentials for a token. The token is stored on the client
    /// and also returned inside the user record.
    ///
    /// Every rejection surfaces as `Authentication`: any non-success
    /// status, or a success body with no `user.token` in it.
    pub async fn login(&mut self, email: &str, password: &str) -> HarnessResult<User> {
        let endpoint = self.endpoint("/api/users/login");
        let response = self
            .http
            .post(&endpoint)
            .json(&LoginRequest {
                user: LoginUser { email, password },
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(HarnessError::Authentication(format!(
                "login rejected for {email} with {status}: {detail}"
            )));
        }

        let body: Value = response.json().await?;
        if body.pointer("/user/token").and_then(Value::as_str).is_none() {
            return Err(HarnessError::Authentication(format!(
                "login response for {email} carries no user.token"
            )));
        }
        let envelope: UserEnvelope = serde_json::from_value(body)?;
        debug!("logged in as {}", envelope.user.username);
        self.token = Some(envelope.user.token.clone());
        Ok(envelope.user)
    }

    pub async fn tags(&self) -> HarnessResult<Vec<String>> {
        let endpoint = self.endpoint("/api/tags");
        let response = self.http.get(&endpoint).send().await?;
        let response = Self::require_status(endpoint, response, StatusCode::OK)?;
        let tags: TagsResponse = response.json().await?;
        Ok(tags.tags)
    }

    pub async fn list_articles(&self) -> HarnessResult<ArticlesPage> {
        let endpoint = self.endpoint("/api/articles");
        let response = self.http.get(&endpoint).send().await?;
        let response = Self::require_status(endpoint, response, StatusCode::OK)?;
        Ok(response.json().await?)
    }

    /// Create an article under the authenticated user and return it with
    /// its server-assigned slug.
    pub async fn create_article(&self, draft: &ArticleDraft) -> HarnessResult<Article> {
        let token = self.bearer()?;
        let endpoint = self.endpoint("/api/articles");
        let response = self
            .http
            .post(&endpoint)
            .header(AUTHORIZATION, format!("Token {token}"))
            .json(&ArticleRequest { article: draft })
            .send()
            .await?;
        let response = Self::require_status(endpoint, response, StatusCode::CREATED)?;
        let envelope: ArticleEnvelope = response.json().await?;
        debug!("created article {}", envelope.article.slug);
        Ok(envelope.article)
    }

    pub async fn delete_article(&self, slug: &str) -> HarnessResult<()> {
        let token = self.bearer()?;
        let endpoint = self.endpoint(&format!("/api/articles/{slug}"));
        let response = self
            .http
            .delete(&endpoint)
            .header(AUTHORIZATION, format!("Token {token}"))
            .send()
            .await?;
        Self::require_status(endpoint, response, StatusCode::NO_CONTENT)?;
        debug!("deleted article {slug}");
        Ok(())
    }

    fn require_status(
        endpoint: String,
        response: reqwest::Response,
        expected: StatusCode,
    ) -> HarnessResult<reqwest::Response> {
        let status = response.status();
        if status == expected {
            Ok(response)
        } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            Err(HarnessError::Authentication(format!(
                "request to {endpoint} rejected with {status}"
            )))
        } else {
            Err(HarnessError::UnexpectedStatus {
                endpoint,
                status: status.as_u16(),
            })
        }
    }
}

/// A JSONPlaceholder post
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    #[serde(rename = "userId")]
    pub user_id: u64,
    pub id: u64,
    pub title: String,
    pub body: String,
}

/// Body for creating a post; the service assigns the id
#[derive(Debug, Clone, Serialize)]
pub struct NewPost {
    #[serde(rename = "userId")]
    pub user_id: u64,
    pub title: String,
    pub body: String,
}

/// Client for the JSONPlaceholder demo service
#[derive(Debug, Clone)]
pub struct PlaceholderClient {
    http: reqwest::Client,
    base_url: String,
}

impl PlaceholderClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> HarnessResult<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { http, base_url })
    }

    pub fn from_config(config: &HarnessConfig) -> HarnessResult<Self> {
        Self::new(&config.placeholder_base_url, config.request_timeout())
    }

    pub async fn get_post(&self, id: u64) -> HarnessResult<Post> {
        let endpoint = format!("{}/posts/{id}", self.base_url);
        let response = self.http.get(&endpoint).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(HarnessError::UnexpectedStatus {
                endpoint,
                status: status.as_u16(),
            });
        }
        Ok(response.json().await?)
    }

    pub async fn create_post(&self, post: &NewPost) -> HarnessResult<Post> {
        let endpoint = format!("{}/posts", self.base_url);
        let response = self.http.post(&endpoint).json(post).send().await?;
        let status = response.status();
        if status != StatusCode::CREATED {
            return Err(HarnessError::UnexpectedStatus {
                endpoint,
                status: status.as_u16(),
            });
        }
        Ok(response.json().await?)
    }
}
