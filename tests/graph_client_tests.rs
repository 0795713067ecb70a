//! Integration tests for Graph client retry logic
//!
//! Uses wiremock to simulate Graph responses and verify retry behavior,
//! rate limit handling, pagination and error propagation.

use reviewctl::graph::GraphClient;
use reviewctl::Error;
use serde::Deserialize;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct User {
    id: String,
    display_name: String,
}

async fn setup() -> (MockServer, GraphClient) {
    let server = MockServer::start().await;
    let client = GraphClient::new("test-token".into()).with_base_url(&server.uri());
    (server, client)
}

/// Successful GET, no retry needed
#[tokio::test]
async fn test_get_success() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/v1.0/users/u1"))
        .and(header("Authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "u1",
            "displayName": "Adele Vance"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let user: User = client.get("users/u1").await.unwrap();
    assert_eq!(user.id, "u1");
    assert_eq!(user.display_name, "Adele Vance");
}

/// A transient 5xx is retried and the later success is returned
#[tokio::test]
async fn test_server_error_then_success() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/v1.0/users/u1"))
        .respond_with(ResponseTemplate::new(503).set_body_string("Service Unavailable"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1.0/users/u1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "u1",
            "displayName": "Adele Vance"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let user: User = client.get("users/u1").await.unwrap();
    assert_eq!(user.display_name, "Adele Vance");
}

/// 429 honors Retry-After and then succeeds
#[tokio::test]
async fn test_rate_limit_with_retry_after() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/v1.0/users/u1"))
        .respond_with(
            ResponseTemplate::new(429)
                .append_header("Retry-After", "1")
                .set_body_string("Rate limited"),
        )
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1.0/users/u1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "u1",
            "displayName": "Adele Vance"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let started = std::time::Instant::now();
    let user: User = client.get("users/u1").await.unwrap();
    assert_eq!(user.id, "u1");
    assert!(started.elapsed() >= std::time::Duration::from_secs(1));
}

/// 4xx responses fail immediately with the Graph error message
#[tokio::test]
async fn test_not_found_is_not_retried() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/v1.0/users/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
            "error": {
                "code": "Request_ResourceNotFound",
                "message": "Resource 'missing' does not exist."
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = client.get::<User>("users/missing").await.unwrap_err();
    match err {
        Error::GraphApiError(message) => {
            assert!(message.contains("404"));
            assert!(message.contains("does not exist"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

/// Persistent server errors give up after the retry budget
#[tokio::test]
async fn test_server_error_exhausts_retries() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/v1.0/users/u1"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(3)
        .mount(&server)
        .await;

    let err = client.get::<User>("users/u1").await.unwrap_err();
    assert!(matches!(err, Error::GraphApiError(_)));
}

/// Pagination follows @odata.nextLink until it is absent
#[tokio::test]
async fn test_get_all_pages_follows_next_link() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/v1.0/users"))
        .and(query_param("$skiptoken", "page2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "value": [{ "id": "u3", "displayName": "Megan Bowen" }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1.0/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "value": [
                { "id": "u1", "displayName": "Adele Vance" },
                { "id": "u2", "displayName": "Alex Wilber" }
            ],
            "@odata.nextLink": format!("{}/v1.0/users?$skiptoken=page2", server.uri())
        })))
        .expect(1)
        .mount(&server)
        .await;

    let users: Vec<User> = client.get_all_pages("users").await.unwrap();
    let ids: Vec<&str> = users.iter().map(|u| u.id.as_str()).collect();
    assert_eq!(ids, vec!["u1", "u2", "u3"]);
}

/// 202 Accepted with an empty body is success for post_no_content
#[tokio::test]
async fn test_post_no_content_accepted() {
    let (server, client) = setup().await;
    let body = serde_json::json!({ "ping": true });

    Mock::given(method("POST"))
        .and(path("/v1.0/users/sender@contoso.com/sendMail"))
        .and(body_json(&body))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    client
        .post_no_content("users/sender@contoso.com/sendMail", &body)
        .await
        .unwrap();
}
