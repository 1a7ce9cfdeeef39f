/*
 * pipeline.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * Integration tests for the export pipeline over a scripted in-process
 * transport: folder resolution, query paging, search directive, and the
 * end-to-end row shape. No network.
 *
 * Run with:
 *   cargo test -p scadenziario_core --test pipeline
 */

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use scadenziario_core::config::RunConfig;
use scadenziario_core::error::{AuthError, Error, RemoteError};
use scadenziario_core::graph::{FolderResolver, GraphClient, MessageQuery, MessageStream};
use scadenziario_core::http::{HttpResponse, Request, Transport};
use scadenziario_core::oauth::TokenProvider;
use scadenziario_core::retry::RetryPolicy;
use scadenziario_core::run::run_export;
use scadenziario_core::sink::VecSink;

// ── Fakes ─────────────────────────────────────────────────────────────

/// Routes requests by path substring to scripted response queues and
/// records every request for assertions.
#[derive(Default)]
struct FakeTransport {
    routes: Mutex<Vec<(String, Vec<HttpResponse>)>>,
    log: Mutex<Vec<Request>>,
}

impl FakeTransport {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue `responses` for requests whose path contains `matcher`.
    /// Routes are tried in insertion order; first match wins.
    fn route(&self, matcher: &str, responses: Vec<HttpResponse>) {
        self.routes
            .lock()
            .unwrap()
            .push((matcher.to_string(), responses));
    }

    fn requests(&self) -> Vec<Request> {
        self.log.lock().unwrap().clone()
    }

    fn paths_containing(&self, needle: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.path.contains(needle))
            .count()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn send(&self, request: Request) -> Result<HttpResponse, RemoteError> {
        self.log.lock().unwrap().push(request.clone());
        let mut routes = self.routes.lock().unwrap();
        for (matcher, responses) in routes.iter_mut() {
            if request.path.contains(matcher.as_str()) {
                if responses.is_empty() {
                    panic!("route '{}' exhausted (path {})", matcher, request.path);
                }
                return Ok(responses.remove(0));
            }
        }
        panic!("no route for path {}", request.path);
    }
}

struct FakeTokens;

#[async_trait]
impl TokenProvider for FakeTokens {
    async fn bearer_token(&self) -> Result<String, AuthError> {
        Ok("TESTTOKEN".to_string())
    }
}

struct NoLogin;

#[async_trait]
impl TokenProvider for NoLogin {
    async fn bearer_token(&self) -> Result<String, AuthError> {
        Err(AuthError::NotLoggedIn)
    }
}

fn json(body: &str) -> HttpResponse {
    HttpResponse {
        status: 200,
        reason: Some("OK".to_string()),
        headers: vec![("Content-Type".to_string(), "application/json".to_string())],
        body: body.as_bytes().to_vec(),
    }
}

fn status(code: u16) -> HttpResponse {
    HttpResponse {
        status: code,
        reason: None,
        headers: Vec::new(),
        body: Vec::new(),
    }
}

fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 5,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
    }
}

fn client(transport: &Arc<FakeTransport>) -> GraphClient<Arc<FakeTransport>> {
    GraphClient::with_policy(transport.clone(), fast_policy(), Arc::new(FakeTokens))
}

fn folder_page(entries: &[(&str, &str)]) -> String {
    let items: Vec<String> = entries
        .iter()
        .map(|(id, name)| format!(r#"{{"id":"{}","displayName":"{}"}}"#, id, name))
        .collect();
    format!(r#"{{"value":[{}]}}"#, items.join(","))
}

fn config(folder: &str, keywords: &str) -> RunConfig {
    let mut defaults = HashMap::new();
    defaults.insert("CLIENT_ID".to_string(), "app-123".to_string());
    defaults.insert("FOLDER_PATH".to_string(), folder.to_string());
    defaults.insert("KEYWORDS".to_string(), keywords.to_string());
    RunConfig::from_sources(&defaults, &Default::default()).unwrap()
}

fn message_json(id: &str, received: &str, body_html: &str) -> String {
    format!(
        r#"{{
            "id": "{id}",
            "subject": "Invoice {id}",
            "receivedDateTime": "{received}",
            "from": {{"emailAddress": {{"name": "Acme Billing", "address": "billing@acme.example"}}}},
            "body": {{"contentType": "html", "content": "{body_html}"}},
            "bodyPreview": "preview",
            "webLink": "https://outlook.office365.com/owa/?ItemID={id}"
        }}"#
    )
}

// ── Folder resolution ─────────────────────────────────────────────────

#[tokio::test]
async fn resolution_makes_one_list_call_per_segment() {
    let transport = FakeTransport::new();
    transport.route(
        "/F-INV/childFolders",
        vec![json(&folder_page(&[("F-2025", "2025")]))],
    );
    transport.route(
        "/F-INBOX/childFolders",
        vec![json(&folder_page(&[("F-INV", "Invoices"), ("F-OLD", "Old")]))],
    );
    transport.route(
        "/me/mailFolders?",
        vec![json(&folder_page(&[
            ("F-INBOX", "Inbox"),
            ("F-SENT", "Sent Items"),
        ]))],
    );

    let client = client(&transport);
    let mut resolver = FolderResolver::new(&client);
    let id = resolver.resolve("Inbox/Invoices/2025").await.unwrap();
    assert_eq!(id, "F-2025");

    let requests = transport.requests();
    assert_eq!(requests.len(), 3);
    assert!(requests[0].path.contains("/me/mailFolders?"));
    assert!(requests[1].path.contains("/F-INBOX/childFolders"));
    assert!(requests[2].path.contains("/F-INV/childFolders"));

    // A repeated prefix within the same run is served from the cache.
    let id = resolver.resolve("Inbox/Invoices").await.unwrap();
    assert_eq!(id, "F-INV");
    assert_eq!(transport.requests().len(), 3);
}

#[tokio::test]
async fn resolution_is_case_insensitive_exact() {
    let transport = FakeTransport::new();
    transport.route(
        "/me/mailFolders?",
        vec![json(&folder_page(&[("F-INBOX", "Inbox")]))],
    );
    let client = client(&transport);
    let mut resolver = FolderResolver::new(&client);
    assert_eq!(resolver.resolve("INBOX").await.unwrap(), "F-INBOX");
}

#[tokio::test]
async fn missing_segment_is_named_exactly() {
    let transport = FakeTransport::new();
    transport.route(
        "/F-INBOX/childFolders",
        vec![json(&folder_page(&[("F-INV", "Invoices")]))],
    );
    transport.route(
        "/me/mailFolders?",
        vec![json(&folder_page(&[("F-INBOX", "Inbox")]))],
    );

    let client = client(&transport);
    let mut resolver = FolderResolver::new(&client);
    let err = resolver.resolve("Inbox/Taxes/2025").await.unwrap_err();
    match err {
        Error::FolderNotFound(e) => {
            assert_eq!(e.segment, "Taxes");
            assert_eq!(e.parent, "Inbox");
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[tokio::test]
async fn top_level_falls_back_to_well_known_name() {
    let transport = FakeTransport::new();
    // Top-level listing shows localized names only.
    transport.route(
        "/me/mailFolders?",
        vec![json(&folder_page(&[("F-IN", "Posta in arrivo")]))],
    );
    transport.route(
        "/me/mailFolders/sentitems",
        vec![json(r#"{"id":"F-SENT","displayName":"Posta inviata"}"#)],
    );

    let client = client(&transport);
    let mut resolver = FolderResolver::new(&client);
    assert_eq!(resolver.resolve("Sent Items").await.unwrap(), "F-SENT");
}

#[tokio::test]
async fn empty_path_resolves_without_remote_call() {
    let transport = FakeTransport::new();
    let client = client(&transport);
    let mut resolver = FolderResolver::new(&client);
    assert_eq!(resolver.resolve("").await.unwrap(), "inbox");
    assert!(transport.requests().is_empty());
}

// ── Query paging ──────────────────────────────────────────────────────

#[tokio::test]
async fn pagination_follows_continuation_and_preserves_order() {
    let transport = FakeTransport::new();
    let page1 = format!(
        r#"{{"value":[{},{}],"@odata.nextLink":"https://graph.microsoft.com/v1.0/me/mailFolders/F1/messages?$skiptoken=NEXT123"}}"#,
        message_json("M1", "2025-03-05T08:30:00Z", "a"),
        message_json("M2", "2025-03-04T09:00:00Z", "b"),
    );
    let page2 = format!(
        r#"{{"value":[{}]}}"#,
        message_json("M3", "2025-03-03T10:00:00Z", "c"),
    );
    transport.route("$skiptoken=NEXT123", vec![json(&page2)]);
    transport.route("/F1/messages", vec![json(&page1)]);

    let client = client(&transport);
    let query = MessageQuery {
        folder_id: "F1".to_string(),
        keywords: Vec::new(),
        since: chrono::Utc::now(),
    };
    let mut stream = MessageStream::new(&client, &query);
    let mut ids = Vec::new();
    while let Some(record) = stream.try_next().await.unwrap() {
        ids.push(record.id);
    }
    assert_eq!(ids, vec!["M1", "M2", "M3"]);
    assert_eq!(transport.paths_containing("$skiptoken=NEXT123"), 1);
}

#[tokio::test]
async fn search_attaches_eventual_consistency_directive() {
    let transport = FakeTransport::new();
    transport.route("/F1/messages", vec![json(r#"{"value":[]}"#)]);
    let client = client(&transport);
    let query = MessageQuery {
        folder_id: "F1".to_string(),
        keywords: vec!["invoice".to_string(), "receipt".to_string()],
        since: chrono::Utc::now(),
    };
    let mut stream = MessageStream::new(&client, &query);
    assert!(stream.try_next().await.unwrap().is_none());

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert!(request.path.contains("%22invoice%20OR%20receipt%22"));
    assert_eq!(request.header_value("ConsistencyLevel"), Some("eventual"));
    assert_eq!(
        request.header_value("Authorization"),
        Some("Bearer TESTTOKEN")
    );
}

#[tokio::test]
async fn no_keywords_means_no_search_and_no_directive() {
    let transport = FakeTransport::new();
    transport.route("/F1/messages", vec![json(r#"{"value":[]}"#)]);
    let client = client(&transport);
    let query = MessageQuery {
        folder_id: "F1".to_string(),
        keywords: Vec::new(),
        since: chrono::Utc::now(),
    };
    let mut stream = MessageStream::new(&client, &query);
    assert!(stream.try_next().await.unwrap().is_none());

    let request = &transport.requests()[0];
    assert!(!request.path.contains("$search"));
    assert!(request.header_value("ConsistencyLevel").is_none());
    // Inclusive lower bound on receive time.
    assert!(request.path.contains("$filter=receivedDateTime%20ge%20"));
}

#[tokio::test]
async fn page_failure_aborts_only_the_remainder() {
    let transport = FakeTransport::new();
    let page1 = format!(
        r#"{{"value":[{}],"@odata.nextLink":"https://graph.microsoft.com/v1.0/me/mailFolders/F1/messages?$skiptoken=X"}}"#,
        message_json("M1", "2025-03-05T08:30:00Z", "a"),
    );
    transport.route("$skiptoken=X", vec![status(404)]);
    transport.route("/F1/messages", vec![json(&page1)]);

    let client = client(&transport);
    let query = MessageQuery {
        folder_id: "F1".to_string(),
        keywords: Vec::new(),
        since: chrono::Utc::now(),
    };
    let mut stream = MessageStream::new(&client, &query);

    // First record arrives intact.
    let first = stream.try_next().await.unwrap().unwrap();
    assert_eq!(first.id, "M1");
    // The next page fails; only the unconsumed remainder is lost.
    match stream.try_next().await.unwrap_err() {
        Error::Remote(RemoteError::Status { status, .. }) => assert_eq!(status, 404),
        other => panic!("unexpected error: {}", other),
    }
}

#[tokio::test]
async fn throttled_page_is_retried_until_success() {
    let transport = FakeTransport::new();
    let page = format!(
        r#"{{"value":[{}]}}"#,
        message_json("M1", "2025-03-05T08:30:00Z", "a"),
    );
    transport.route("/F1/messages", vec![status(429), status(429), json(&page)]);

    let client = client(&transport);
    let query = MessageQuery {
        folder_id: "F1".to_string(),
        keywords: Vec::new(),
        since: chrono::Utc::now(),
    };
    let mut stream = MessageStream::new(&client, &query);
    assert_eq!(stream.try_next().await.unwrap().unwrap().id, "M1");
    assert_eq!(transport.paths_containing("/F1/messages"), 3);
}

// ── End to end ────────────────────────────────────────────────────────

#[tokio::test]
async fn end_to_end_invoice_scenario() {
    let transport = FakeTransport::new();
    transport.route(
        "/F-INBOX/childFolders",
        vec![json(&folder_page(&[("F-INV", "Invoices")]))],
    );
    transport.route(
        "/me/mailFolders?",
        vec![json(&folder_page(&[("F-INBOX", "Inbox")]))],
    );
    let page = format!(
        r#"{{"value":[{}]}}"#,
        message_json(
            "M1",
            "2025-03-05T08:30:00Z",
            "<p>Payment due on <b>15th March 2025</b> (ref 10/03/2025)</p>"
        ),
    );
    transport.route("/F-INV/messages", vec![json(&page)]);

    let client = client(&transport);
    let config = config("Inbox/Invoices", "invoice");
    let mut sink = VecSink::default();
    let summary = run_export(&config, &client, &mut sink).await.unwrap();

    assert_eq!(summary.messages, 1);
    assert_eq!(summary.rows_written, 1);
    assert_eq!(summary.dates_found, 2);

    let row = &sink.rows[0];
    assert_eq!(row.subject, "Invoice M1");
    assert_eq!(row.dates, vec!["2025-03-15", "2025-03-10"]);
    assert_eq!(row.display_dates(), "2025-03-15, 2025-03-10");
    assert_eq!(row.from, "Acme Billing");
    assert_eq!(row.received_local, "2025-03-05 14:00");
    assert_eq!(row.link, "https://outlook.office365.com/owa/?ItemID=M1");

    // The query carried the search clause and the directive.
    let message_request = transport
        .requests()
        .into_iter()
        .find(|r| r.path.contains("/F-INV/messages"))
        .unwrap();
    assert!(message_request.path.contains("%22invoice%22"));
    assert_eq!(
        message_request.header_value("ConsistencyLevel"),
        Some("eventual")
    );
}

#[tokio::test]
async fn rows_preserve_service_yield_order() {
    let transport = FakeTransport::new();
    transport.route(
        "/me/mailFolders?",
        vec![json(&folder_page(&[("F-INBOX", "Inbox")]))],
    );
    let page = format!(
        r#"{{"value":[{},{},{}]}}"#,
        message_json("M2", "2025-03-04T10:00:00Z", "x"),
        message_json("M1", "2025-03-05T10:00:00Z", "y"),
        message_json("M3", "2025-03-03T10:00:00Z", "z"),
    );
    transport.route("/F-INBOX/messages", vec![json(&page)]);

    let client = client(&transport);
    let config = config("Inbox", "");
    let mut sink = VecSink::default();
    run_export(&config, &client, &mut sink).await.unwrap();

    let subjects: Vec<&str> = sink.rows.iter().map(|r| r.subject.as_str()).collect();
    // Service order, not re-sorted by receive time.
    assert_eq!(subjects, vec!["Invoice M2", "Invoice M1", "Invoice M3"]);
}

#[tokio::test]
async fn auth_failure_surfaces_before_any_request() {
    let transport = FakeTransport::new();
    let client: GraphClient<Arc<FakeTransport>> =
        GraphClient::with_policy(transport.clone(), fast_policy(), Arc::new(NoLogin));
    let config = config("Inbox", "");
    let mut sink = VecSink::default();
    match run_export(&config, &client, &mut sink).await.unwrap_err() {
        Error::Auth(AuthError::NotLoggedIn) => {}
        other => panic!("unexpected error: {}", other),
    }
    assert!(sink.rows.is_empty());
    assert!(transport.requests().is_empty());
}
