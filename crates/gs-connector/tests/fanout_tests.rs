//! FanOutLister Tests
//!
//! Tests for:
//! - Base listing plus per-user role lookups against a mock directory API
//! - Ledger contents and ordering
//! - A failing lookup aborts the whole listing
//! - Connectors without a user interface

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use gs_common::{Principal, ProvenanceLedger, Role, SharedRole};
use gs_config::{EngineConfig, HttpConfig};
use gs_connector::{
    list_principals, Connector, ConnectorError, ConnectorResult, FanOutLister, FanOutSource,
    LinkHeaderFetch, PrincipalLister, RecordedHttpClient,
};
use gs_engine::Paginator;
use serde::Deserialize;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Debug, Deserialize)]
struct DirectoryUser {
    id: String,
    login: String,
    email: String,
}

#[derive(Debug, Deserialize)]
struct DirectoryRole {
    label: String,
}

/// Directory API source: `/users` once, then `/users/{id}/roles` per user.
struct DirectorySource {
    client: RecordedHttpClient,
    base_url: String,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    seen: parking_lot::Mutex<Vec<String>>,
}

impl DirectorySource {
    fn new(base_url: String) -> Self {
        Self {
            client: RecordedHttpClient::new(&HttpConfig::default()).unwrap(),
            base_url,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            seen: parking_lot::Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl FanOutSource for DirectorySource {
    type Entity = DirectoryUser;

    async fn list_entities(&self) -> ConnectorResult<(Vec<DirectoryUser>, ProvenanceLedger)> {
        let fetcher = LinkHeaderFetch::new(
            self.client.clone(),
            format!("{}/users", self.base_url),
            |user: &DirectoryUser| user.id.clone(),
        );
        let paged = Paginator::new(fetcher).run().await?;
        Ok((paged.items, paged.ledger))
    }

    async fn fetch_roles(
        &self,
        user: &DirectoryUser,
    ) -> ConnectorResult<(Vec<SharedRole>, ProvenanceLedger)> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.seen.lock().push(user.id.clone());

        tokio::time::sleep(Duration::from_millis(10)).await;
        let result = self
            .client
            .get_json::<Vec<DirectoryRole>>(&format!("{}/users/{}/roles", self.base_url, user.id))
            .await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let (roles, response) = result?;
        let roles = roles.into_iter().map(|r| Role::new(r.label).shared()).collect();
        Ok((roles, ProvenanceLedger::from(response.record)))
    }

    fn to_principal(&self, user: &DirectoryUser) -> Principal {
        Principal::new(user.login.as_str()).with_email(user.email.as_str())
    }
}

fn users_body(count: usize) -> String {
    let users: Vec<String> = (1..=count)
        .map(|i| {
            format!(
                r#"{{"id":"00u{i}","login":"user{i}@acme.com","email":"user{i}@acme.com"}}"#
            )
        })
        .collect();
    format!("[{}]", users.join(","))
}

async fn mount_roles(server: &MockServer, user_id: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/users/{}/roles", user_id)))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_fan_out_listing() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/users"))
        .respond_with(ResponseTemplate::new(200).set_body_string(users_body(3)))
        .expect(1)
        .mount(&mock_server)
        .await;
    mount_roles(&mock_server, "00u1", r#"[{"label":"Super Administrator"}]"#).await;
    mount_roles(&mock_server, "00u2", r#"[]"#).await;
    mount_roles(&mock_server, "00u3", r#"[{"label":"Read-only Administrator"},{"label":"App Admin"}]"#).await;

    let lister = FanOutLister::new(DirectorySource::new(mock_server.uri()), EngineConfig::default());
    let listing = lister.list_principals().await.unwrap();

    // Principals follow base listing order
    let names: Vec<_> = listing.principals.iter().map(|p| p.username.as_str()).collect();
    assert_eq!(names, vec!["user1@acme.com", "user2@acme.com", "user3@acme.com"]);

    assert!(listing.principal("user1@acme.com").unwrap().role("Super Administrator").is_some());
    assert!(listing.principal("user2@acme.com").unwrap().roles.is_empty());
    assert_eq!(listing.principal("user3@acme.com").unwrap().roles.len(), 2);

    // Base listing first, then one record per role lookup in completion order
    assert_eq!(listing.ledger.len(), 4);
    assert_eq!(
        listing.ledger.commands()[0].command(),
        format!("{}/users", mock_server.uri())
    );
    let mut lookups: Vec<_> = listing.ledger.commands()[1..]
        .iter()
        .map(|c| c.command().to_string())
        .collect();
    lookups.sort();
    assert_eq!(
        lookups,
        (1..=3)
            .map(|i| format!("{}/users/00u{}/roles", mock_server.uri(), i))
            .collect::<Vec<_>>()
    );
}

#[tokio::test]
async fn test_lookups_bounded_by_concurrency() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/users"))
        .respond_with(ResponseTemplate::new(200).set_body_string(users_body(12)))
        .mount(&mock_server)
        .await;
    for i in 1..=12 {
        mount_roles(&mock_server, &format!("00u{}", i), r#"[{"label":"Member"}]"#).await;
    }

    let engine = EngineConfig {
        concurrency: 3,
        aggregator_buffer: 1,
    };
    let lister = FanOutLister::new(DirectorySource::new(mock_server.uri()), engine);
    let listing = lister.list_principals().await.unwrap();

    assert_eq!(listing.principals.len(), 12);
    assert_eq!(listing.ledger.len(), 13);
    assert!(lister.source().peak.load(Ordering::SeqCst) <= 3);

    // Every user was looked up exactly once
    let mut seen = lister.source().seen.lock().clone();
    seen.sort();
    seen.dedup();
    assert_eq!(seen.len(), 12);
}

#[tokio::test]
async fn test_failed_lookup_aborts_listing() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/users"))
        .respond_with(ResponseTemplate::new(200).set_body_string(users_body(3)))
        .mount(&mock_server)
        .await;
    mount_roles(&mock_server, "00u1", r#"[]"#).await;
    mount_roles(&mock_server, "00u3", r#"[]"#).await;
    Mock::given(method("GET"))
        .and(path("/users/00u2/roles"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let source = DirectorySource::new(mock_server.uri());
    let lister = FanOutLister::new(source, EngineConfig::default());
    let result = lister.list_principals().await;

    assert!(matches!(result, Err(ConnectorError::Http { status: 500, .. })));
    // Siblings still ran to completion
    assert_eq!(lister.source().seen.lock().len(), 3);
}

#[tokio::test]
async fn test_base_listing_failure_aborts_before_fan_out() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/users"))
        .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
        .mount(&mock_server)
        .await;

    let lister = FanOutLister::new(DirectorySource::new(mock_server.uri()), EngineConfig::default());
    let result = lister.list_principals().await;

    assert!(matches!(result, Err(ConnectorError::Http { status: 401, .. })));
    assert!(lister.source().seen.lock().is_empty());
}

struct AuditOnlyConnector;

impl Connector for AuditOnlyConnector {
    fn name(&self) -> &str {
        "audit-only"
    }
}

struct DirectoryConnector {
    base_url: String,
}

impl Connector for DirectoryConnector {
    fn name(&self) -> &str {
        "directory"
    }

    fn user_interface(&self) -> ConnectorResult<Box<dyn PrincipalLister>> {
        Ok(Box::new(FanOutLister::new(
            DirectorySource::new(self.base_url.clone()),
            EngineConfig::default(),
        )))
    }
}

#[tokio::test]
async fn test_connector_without_user_interface() {
    let result = list_principals(&AuditOnlyConnector).await;
    assert!(matches!(result, Err(ConnectorError::NotImplemented)));
}

#[tokio::test]
async fn test_connector_user_interface() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/users"))
        .respond_with(ResponseTemplate::new(200).set_body_string(users_body(1)))
        .mount(&mock_server)
        .await;
    mount_roles(&mock_server, "00u1", r#"[{"label":"Org Admin"}]"#).await;

    let connector = Arc::new(DirectoryConnector {
        base_url: mock_server.uri(),
    });
    let listing = list_principals(connector.as_ref()).await.unwrap();

    assert_eq!(listing.principals.len(), 1);
    assert_eq!(listing.principals[0].email, "user1@acme.com");
    assert_eq!(listing.ledger.len(), 2);
}
