//! Typed API clients exercised end to end against the stub.

mod support;

use std::time::Duration;

use conduit_harness::api::{ArticleDraft, NewPost};
use conduit_harness::{ConduitClient, HarnessError, PlaceholderClient};

use support::{LoginBehavior, StubApi, STUB_EMAIL, STUB_PASSWORD, STUB_TOKEN};

fn conduit(stub: &StubApi) -> ConduitClient {
    ConduitClient::new(stub.base_url(), Duration::from_secs(5)).expect("client")
}

#[tokio::test]
async fn login_create_list_delete_round_trip() {
    let stub = StubApi::spawn().await;
    let mut client = conduit(&stub);

    let user = client.login(STUB_EMAIL, STUB_PASSWORD).await.expect("login");
    assert_eq!(user.token, STUB_TOKEN);
    assert_eq!(client.token(), Some(STUB_TOKEN));

    let draft = ArticleDraft {
        title: "This is a test title".to_string(),
        description: "This is a test description".to_string(),
        body: "This is a test body".to_string(),
        tag_list: vec!["automation".to_string()],
    };
    let article = client.create_article(&draft).await.expect("create");
    assert!(article.slug.starts_with("this-is-a-test-title"));
    assert_eq!(article.title, draft.title);
    assert_eq!(article.tag_list, draft.tag_list);

    let page = client.list_articles().await.expect("list");
    assert_eq!(page.articles_count, 1);
    assert_eq!(page.articles[0].slug, article.slug);

    client.delete_article(&article.slug).await.expect("delete");
    let page = client.list_articles().await.expect("list after delete");
    assert_eq!(page.articles_count, 0);
}

#[tokio::test]
async fn login_outage_is_an_authentication_error() {
    let stub = StubApi::spawn_with_login(LoginBehavior::Outage).await;
    let mut client = conduit(&stub);

    let error = client
        .login(STUB_EMAIL, STUB_PASSWORD)
        .await
        .expect_err("login against a broken service");
    assert!(matches!(error, HarnessError::Authentication(_)), "got {error:?}");
    assert!(client.token().is_none());
}

#[tokio::test]
async fn tokenless_login_response_is_an_authentication_error() {
    let stub = StubApi::spawn_with_login(LoginBehavior::MissingToken).await;
    let mut client = conduit(&stub);

    let error = client
        .login(STUB_EMAIL, STUB_PASSWORD)
        .await
        .expect_err("login without a token in the response");
    assert!(matches!(error, HarnessError::Authentication(_)), "got {error:?}");
    assert!(client.token().is_none());
}

#[tokio::test]
async fn stale_token_is_rejected_by_the_service() {
    let stub = StubApi::spawn().await;
    let mut client = conduit(&stub);
    client.set_token("expired-token");

    let draft = ArticleDraft {
        title: "Never lands".to_string(),
        description: String::new(),
        body: String::new(),
        tag_list: Vec::new(),
    };
    let error = client.create_article(&draft).await.expect_err("stale token");
    assert!(matches!(error, HarnessError::Authentication(_)), "got {error:?}");
    assert_eq!(stub.article_count(), 0);
}

#[tokio::test]
async fn tags_listing_decodes_the_envelope() {
    let stub = StubApi::spawn().await;
    let client = conduit(&stub);
    let tags = client.tags().await.expect("tags");
    assert_eq!(tags, vec!["upstream".to_string(), "untouched".to_string()]);
}

#[tokio::test]
async fn placeholder_post_fetch_and_create() {
    let stub = StubApi::spawn().await;
    let client = PlaceholderClient::new(stub.base_url(), Duration::from_secs(5)).expect("client");

    let post = client.get_post(1).await.expect("get post");
    assert_eq!(post.id, 1);
    assert_eq!(post.user_id, 1);
    assert!(!post.title.is_empty());
    assert!(!post.body.is_empty());

    let created = client
        .create_post(&NewPost {
            user_id: 1,
            title: "Test Post".to_string(),
            body: "This is a test post".to_string(),
        })
        .await
        .expect("create post");
    assert_eq!(created.id, 101);
    assert_eq!(created.title, "Test Post");
    assert_eq!(created.user_id, 1);
}

#[tokio::test]
async fn missing_post_is_an_unexpected_status() {
    let stub = StubApi::spawn().await;
    let client = PlaceholderClient::new(stub.base_url(), Duration::from_secs(5)).expect("client");
    let error = client.get_post(404).await.expect_err("missing post");
    assert!(
        matches!(error, HarnessError::UnexpectedStatus { status: 404, .. }),
        "got {error:?}"
    );
}
