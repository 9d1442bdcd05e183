use axum::{
    http::{header, HeaderValue, Method, StatusCode},
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    set_header::SetResponseHeaderLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::{
    config::Config,
    handlers::{
        events::posts_updated,
        health::livez,
        posts::{delete_post, get_post, list_posts, upsert_post},
        sync::hard_sync,
        tags::list_tags,
    },
    state::AppState,
};

/// Cache policy for every blog read. Browsers revalidate after a few
/// minutes; the CDN keeps pages until a write invalidates them.
const BLOG_CACHE_CONTROL: &str = "public, max-age=360, s-maxage=31536000";

/// Create the application router with all routes and middleware.
pub fn create_app(state: AppState) -> Router {
    let cors = cors_layer(&state.config);
    let cache_control = SetResponseHeaderLayer::overriding(
        header::CACHE_CONTROL,
        HeaderValue::from_static(BLOG_CACHE_CONTROL),
    );

    // `MethodRouter::layer` only wraps the methods chained before it, so the
    // cache header lands on GET responses alone.
    let blog_routes = Router::new()
        .route(
            "/posts",
            get(list_posts).layer(cache_control.clone()).put(upsert_post),
        )
        .route(
            "/posts/{slug}",
            get(get_post)
                .layer(cache_control.clone())
                .delete(delete_post),
        )
        .route("/tags", get(list_tags).layer(cache_control))
        .route("/events/posts-updated", post(posts_updated))
        .route("/hardsync", post(hard_sync));

    Router::new()
        .route("/livez", get(livez))
        .nest("/blog", blog_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            state.config.request_timeout(),
        ))
        .with_state(state)
}

/// CORS for browser clients. An empty origin list allows any origin.
fn cors_layer(config: &Config) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::ORIGIN,
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::AUTHORIZATION,
        ]);

    if config.allowed_origins.is_empty() {
        return cors.allow_origin(Any);
    }

    let origins = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect::<Vec<_>>();

    cors.allow_origin(AllowOrigin::list(origins))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{Request, StatusCode},
        response::Response,
    };
    use base64::Engine;
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use blogsync_core::post::Post;

    use super::*;
    use crate::cdn::testing::RecordingInvalidator;
    use crate::storage::dynamodb::DynamoDbRepository;
    use crate::storage::inmemory::InMemoryTable;

    fn test_config() -> Config {
        Config {
            table_name: "blogsync-test".to_string(),
            endpoint_url: None,
            region: None,
            default_page_size: 6,
            max_page_size: 100,
            tag_count_concurrency: 4,
            store_max_retries: 0,
            allowed_origins: Vec::new(),
            request_timeout_seconds: 10,
        }
    }

    fn test_app() -> (Router, Arc<RecordingInvalidator>) {
        let repo = DynamoDbRepository::new(InMemoryTable::new()).with_tag_count_concurrency(4);
        let cdn = Arc::new(RecordingInvalidator::default());
        let state = AppState::new(Arc::new(repo), cdn.clone(), test_config());
        (create_app(state), cdn)
    }

    fn post_json(slug: &str, created_at: &str, tags: &[&str]) -> Value {
        json!({
            "title": format!("Title of {}", slug),
            "tags": tags,
            "created_at": created_at,
            "description": "",
            "slug": slug,
        })
    }

    fn push_event(event_type: &str, post: Option<&Value>, slug: &str) -> Value {
        let data = post
            .map(|post| {
                base64::engine::general_purpose::STANDARD
                    .encode(serde_json::to_vec(post).unwrap())
            })
            .unwrap_or_default();
        json!({
            "message": {
                "data": data,
                "attributes": {"eventType": event_type, "slug": slug},
                "messageId": "1"
            },
            "subscription": "projects/blog/subscriptions/posts"
        })
    }

    /// Percent-encodes the characters of standard base64 that are not safe in
    /// a query string.
    fn encode_query_value(value: &str) -> String {
        value
            .replace('+', "%2B")
            .replace('/', "%2F")
            .replace('=', "%3D")
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> Response {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        app.clone().oneshot(request).await.unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_livez() {
        let (app, _) = test_app();

        let response = send(&app, "GET", "/livez", None).await;

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_list_posts_empty() {
        let (app, _) = test_app();

        let response = send(&app, "GET", "/blog/posts", None).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CACHE_CONTROL],
            "public, max-age=360, s-maxage=31536000"
        );
        assert_eq!(
            body_json(response).await,
            json!({"items": [], "nextCursor": null})
        );
    }

    #[tokio::test]
    async fn test_upsert_then_get_post() {
        let (app, _) = test_app();
        let post = post_json("hello", "2024-01-01T00:00:00Z", &["rust"]);

        let response = send(&app, "PUT", "/blog/posts", Some(post.clone())).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(header::CACHE_CONTROL).is_none());
        assert_eq!(
            body_json(response).await,
            json!({"message": "Post upserted successfully"})
        );

        let response = send(&app, "GET", "/blog/posts/hello", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let fetched: Post = serde_json::from_value(body_json(response).await).unwrap();
        assert_eq!(fetched.slug, "hello");
        assert_eq!(fetched.tags, vec!["rust"]);
    }

    #[tokio::test]
    async fn test_get_missing_post_is_404() {
        let (app, _) = test_app();

        let response = send(&app, "GET", "/blog/posts/missing", None).await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            body_json(response).await,
            json!({"error": "Post not found: missing"})
        );
    }

    #[tokio::test]
    async fn test_upsert_rejects_invalid_posts() {
        let (app, _) = test_app();

        let mut empty_title = post_json("a", "2024-01-01T00:00:00Z", &[]);
        empty_title["title"] = json!("");
        let response = send(&app, "PUT", "/blog/posts", Some(empty_title)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = send(&app, "PUT", "/blog/posts", Some(json!({"slug": "a"}))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["error"]
            .as_str()
            .unwrap()
            .contains("Invalid request payload"));
    }

    #[tokio::test]
    async fn test_list_posts_rejects_bad_limits() {
        let (app, _) = test_app();

        for uri in [
            "/blog/posts?limit=0",
            "/blog/posts?limit=101",
            "/blog/posts?limit=ten",
        ] {
            let response = send(&app, "GET", uri, None).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", uri);
        }
    }

    #[tokio::test]
    async fn test_list_posts_rejects_bad_cursor() {
        let (app, _) = test_app();

        let response = send(&app, "GET", "/blog/posts?cursor=not-a-cursor", None).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_list_posts_paginates_newest_first() {
        let (app, _) = test_app();
        for (slug, created_at) in [
            ("first", "2024-01-01T00:00:00Z"),
            ("second", "2024-02-01T00:00:00Z"),
            ("third", "2024-03-01T00:00:00Z"),
        ] {
            let post = post_json(slug, created_at, &["rust"]);
            let response = send(&app, "PUT", "/blog/posts", Some(post)).await;
            assert_eq!(response.status(), StatusCode::OK);
        }

        let page = body_json(send(&app, "GET", "/blog/posts?limit=2", None).await).await;
        let slugs: Vec<&str> = page["items"]
            .as_array()
            .unwrap()
            .iter()
            .map(|post| post["slug"].as_str().unwrap())
            .collect();
        assert_eq!(slugs, vec!["third", "second"]);

        let cursor = page["nextCursor"].as_str().unwrap();
        let uri = format!("/blog/posts?limit=2&cursor={}", encode_query_value(cursor));
        let page = body_json(send(&app, "GET", &uri, None).await).await;
        assert_eq!(page["items"].as_array().unwrap().len(), 1);
        assert_eq!(page["items"][0]["slug"], "first");
        assert_eq!(page["nextCursor"], Value::Null);
    }

    #[tokio::test]
    async fn test_list_posts_by_tag() {
        let (app, _) = test_app();
        for post in [
            post_json("a", "2024-01-01T00:00:00Z", &["rust"]),
            post_json("b", "2024-01-02T00:00:00Z", &["go"]),
        ] {
            send(&app, "PUT", "/blog/posts", Some(post)).await;
        }

        let page = body_json(send(&app, "GET", "/blog/posts?tag=go", None).await).await;

        assert_eq!(page["items"].as_array().unwrap().len(), 1);
        assert_eq!(page["items"][0]["slug"], "b");
    }

    #[tokio::test]
    async fn test_list_tags_sorted_by_count() {
        let (app, _) = test_app();
        for post in [
            post_json("a", "2024-01-01T00:00:00Z", &["rust", "aws"]),
            post_json("b", "2024-01-02T00:00:00Z", &["rust"]),
            post_json("c", "2024-01-03T00:00:00Z", &["go"]),
        ] {
            send(&app, "PUT", "/blog/posts", Some(post)).await;
        }

        let response = send(&app, "GET", "/blog/tags", None).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(header::CACHE_CONTROL).is_some());
        assert_eq!(
            body_json(response).await,
            json!([
                {"tag": "rust", "count": 2},
                {"tag": "aws", "count": 1},
                {"tag": "go", "count": 1},
            ])
        );
    }

    #[tokio::test]
    async fn test_delete_post() {
        let (app, _) = test_app();
        let post = post_json("gone", "2024-01-01T00:00:00Z", &["rust"]);
        send(&app, "PUT", "/blog/posts", Some(post)).await;

        let response = send(&app, "DELETE", "/blog/posts/gone", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({"message": "Post deleted successfully"})
        );

        let response = send(&app, "DELETE", "/blog/posts/gone", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let tags = body_json(send(&app, "GET", "/blog/tags", None).await).await;
        assert_eq!(tags, json!([{"tag": "rust", "count": 0}]));
    }

    #[tokio::test]
    async fn test_post_created_event_upserts_and_invalidates() {
        let (app, cdn) = test_app();
        let post = post_json("evented", "2024-01-01T00:00:00Z", &["rust"]);

        let response = send(
            &app,
            "POST",
            "/blog/events/posts-updated",
            Some(push_event("POST_CREATED", Some(&post), "")),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({"message": "Post upserted successfully"})
        );
        assert_eq!(cdn.paths(), vec!["/blog/*"]);

        let response = send(&app, "GET", "/blog/posts/evented", None).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_post_deleted_event() {
        let (app, cdn) = test_app();
        let post = post_json("doomed", "2024-01-01T00:00:00Z", &[]);
        send(&app, "PUT", "/blog/posts", Some(post)).await;

        let response = send(
            &app,
            "POST",
            "/blog/events/posts-updated",
            Some(push_event("POST_DELETED", None, "doomed")),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(cdn.paths(), vec!["/blog/*"]);
        let response = send(&app, "GET", "/blog/posts/doomed", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_post_deleted_event_requires_slug() {
        let (app, cdn) = test_app();

        let response = send(
            &app,
            "POST",
            "/blog/events/posts-updated",
            Some(push_event("POST_DELETED", None, "")),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(cdn.paths().is_empty());
    }

    #[tokio::test]
    async fn test_content_updated_event_only_invalidates() {
        let (app, cdn) = test_app();

        let response = send(
            &app,
            "POST",
            "/blog/events/posts-updated",
            Some(push_event("CONTENT_UPDATED", None, "any")),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({"message": "ok"}));
        assert_eq!(cdn.paths(), vec!["/blog/*"]);
    }

    #[tokio::test]
    async fn test_unknown_event_is_rejected() {
        let (app, cdn) = test_app();

        let response = send(
            &app,
            "POST",
            "/blog/events/posts-updated",
            Some(push_event("POST_ARCHIVED", None, "a")),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["error"].as_str().unwrap().contains("Invalid event type"));
        assert!(cdn.paths().is_empty());
    }

    #[tokio::test]
    async fn test_hard_sync() {
        let (app, cdn) = test_app();
        let request = json!({
            "posts": [
                post_json("a", "2024-01-01T00:00:00Z", &["rust"]),
                post_json("b", "2024-01-02T00:00:00Z", &["rust", "go"]),
            ]
        });

        let response = send(&app, "POST", "/blog/hardsync", Some(request)).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({"message": "ok"}));
        assert_eq!(cdn.paths(), vec!["/blog/*"]);

        let page = body_json(send(&app, "GET", "/blog/posts", None).await).await;
        assert_eq!(page["items"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_hard_sync_validates_before_writing() {
        let (app, cdn) = test_app();
        let mut bad = post_json("b", "2024-01-02T00:00:00Z", &[]);
        bad["created_at"] = json!("");
        let request = json!({
            "posts": [post_json("a", "2024-01-01T00:00:00Z", &[]), bad]
        });

        let response = send(&app, "POST", "/blog/hardsync", Some(request)).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(cdn.paths().is_empty());
        let page = body_json(send(&app, "GET", "/blog/posts", None).await).await;
        assert!(page["items"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cors_preflight() {
        let (app, _) = test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .method("OPTIONS")
                    .uri("/blog/posts")
                    .header("Origin", "https://blog.example.com")
                    .header("Access-Control-Request-Method", "PUT")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "*"
        );
    }
}
