//! End-to-end pipeline scenarios: webhook in, analysis request out,
//! feedback email delivered — with every external surface mocked.

use mailsage::analysis::AnalysisClient;
use mailsage::config::Config;
use mailsage::delivery::DeliveryClient;
use mailsage::gateway::{AppState, build_router};
use mailsage::persona::{PersonaCache, PersonaResolver, PersonaStore, SqlitePersonaStore};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DEFAULT_ID: &str = "default-analyst";

struct Harness {
    addr: SocketAddr,
    analysis_server: MockServer,
    delivery_server: MockServer,
    store: SqlitePersonaStore,
    _db_dir: tempfile::TempDir,
}

impl Harness {
    /// Stand the whole service up against mock externals. `default_id`
    /// lets a test break the default-persona invariant deliberately.
    async fn start(seeded_default: &str, resolver_default: &str) -> Self {
        let analysis_server = MockServer::start().await;
        let delivery_server = MockServer::start().await;

        let db_dir = tempfile::tempdir().unwrap();
        let store = SqlitePersonaStore::open(&db_dir.path().join("personas.db"), seeded_default)
            .await
            .unwrap();

        let mut config = Config::default();
        config.analysis.base_url = format!("{}/v1/chat/completions", analysis_server.uri());
        config.delivery.base_url = format!("{}/emails", delivery_server.uri());
        config.delivery.retry_delay_ms = 10;
        config.persona.default_persona_id = resolver_default.to_string();

        let cache = Arc::new(PersonaCache::new(Duration::from_secs(3600)));
        let resolver = Arc::new(PersonaResolver::new(
            store.clone(),
            cache,
            resolver_default,
            Duration::from_secs(5),
        ));
        let analysis = Arc::new(AnalysisClient::new(config.analysis.base_url.clone(), None));
        let delivery = Arc::new(DeliveryClient::new(
            config.delivery.base_url.clone(),
            Some("re-test"),
            Duration::from_millis(config.delivery.retry_delay_ms),
        ));

        let state = AppState {
            config: Arc::new(config),
            resolver,
            analysis,
            delivery,
            download: reqwest::Client::new(),
        };

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, build_router(state)).await.unwrap();
        });

        Self {
            addr,
            analysis_server,
            delivery_server,
            store,
            _db_dir: db_dir,
        }
    }

    async fn mock_analysis_ok(&self, feedback: &str) {
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"content": feedback}}],
                "usage": {"total_tokens": 21}
            })))
            .mount(&self.analysis_server)
            .await;
    }

    async fn mock_delivery_ok(&self) {
        Mock::given(method("POST"))
            .and(path("/emails"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "snd_1"})),
            )
            .mount(&self.delivery_server)
            .await;
    }

    async fn post_webhook(&self, body: serde_json::Value) -> (u16, serde_json::Value) {
        let response = reqwest::Client::new()
            .post(format!("http://{}/webhooks/inbound", self.addr))
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = response.status().as_u16();
        (status, response.json().await.unwrap())
    }

    async fn analysis_request_body(&self) -> serde_json::Value {
        let requests = self.analysis_server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1, "expected exactly one analysis call");
        serde_json::from_slice(&requests[0].body).unwrap()
    }

    async fn delivery_request_body(&self) -> serde_json::Value {
        let requests = self.delivery_server.received_requests().await.unwrap();
        assert!(!requests.is_empty(), "expected a delivery call");
        serde_json::from_slice(&requests[0].body).unwrap()
    }
}

#[tokio::test]
async fn german_text_only_email_flows_end_to_end() {
    let harness = Harness::start(DEFAULT_ID, DEFAULT_ID).await;
    harness.mock_analysis_ok("ok").await;
    harness.mock_delivery_ok().await;

    let (status, body) = harness
        .post_webhook(serde_json::json!({
            "from": "marketer@example.com",
            "to": "feedback@mailsage.dev",
            "subject": "Rabattaktion",
            "text": "Sichern Sie sich 50% Rabatt"
        }))
        .await;

    assert_eq!(status, 200);
    assert_eq!(body["status"], "processed");
    assert_eq!(body["delivered"], true);

    // single text content item, directive-wrapped around the German copy
    let analysis_body = harness.analysis_request_body().await;
    let user_content = &analysis_body["messages"][1]["content"];
    let text = user_content.as_str().expect("lone text rides as a string");
    assert!(text.contains("Sichern Sie sich 50% Rabatt"));
    assert!(text.starts_with("Analyze the following email marketing campaign copy"));

    // reply goes back to the sender, carrying the feedback
    let delivery_body = harness.delivery_request_body().await;
    assert_eq!(delivery_body["to"], "marketer@example.com");
    assert_eq!(delivery_body["subject"], "Re: Rabattaktion");
    assert!(delivery_body["text"].as_str().unwrap().contains("ok"));
}

#[tokio::test]
async fn unknown_recipient_is_served_by_the_default_persona() {
    let harness = Harness::start(DEFAULT_ID, DEFAULT_ID).await;
    harness.mock_analysis_ok("fallback feedback").await;
    harness.mock_delivery_ok().await;

    let (status, body) = harness
        .post_webhook(serde_json::json!({
            "from": "marketer@example.com",
            "to": "totally-unknown@mailsage.dev",
            "subject": "s",
            "text": "analyze my campaign please"
        }))
        .await;

    assert_eq!(status, 200);
    assert_eq!(body["status"], "processed");

    // the system prompt on the wire is the seeded default persona's prompt
    let seeded = harness
        .store
        .lookup_by_id(DEFAULT_ID)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(seeded.persona_id, DEFAULT_ID);
    let analysis_body = harness.analysis_request_body().await;
    assert_eq!(
        analysis_body["messages"][0]["content"],
        serde_json::Value::String(seeded.system_prompt)
    );
}

#[tokio::test]
async fn screenshot_attachment_rides_before_the_directive() {
    let harness = Harness::start(DEFAULT_ID, DEFAULT_ID).await;
    harness.mock_analysis_ok("image feedback").await;
    harness.mock_delivery_ok().await;

    // attachment file server
    let files = MockServer::start().await;
    let png = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0x00];
    Mock::given(method("GET"))
        .and(path("/shot.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(png.to_vec()))
        .mount(&files)
        .await;

    let (status, body) = harness
        .post_webhook(serde_json::json!({
            "from": "marketer@example.com",
            "to": "feedback@mailsage.dev",
            "subject": "screenshot",
            "attachments": [{
                "url": format!("{}/shot.png", files.uri()),
                "filename": "shot.png",
                "contentType": "image/png"
            }]
        }))
        .await;

    assert_eq!(status, 200);
    assert_eq!(body["status"], "processed");

    let analysis_body = harness.analysis_request_body().await;
    let parts = analysis_body["messages"][1]["content"].as_array().unwrap();
    assert_eq!(parts.len(), 2);
    assert_eq!(parts[0]["type"], "image_url");
    assert!(
        parts[0]["image_url"]["url"]
            .as_str()
            .unwrap()
            .starts_with("data:image/png;base64,")
    );
    assert_eq!(parts[1]["type"], "text");
}

#[tokio::test]
async fn empty_email_gets_a_polite_error_notice() {
    let harness = Harness::start(DEFAULT_ID, DEFAULT_ID).await;
    harness.mock_delivery_ok().await;

    let (status, body) = harness
        .post_webhook(serde_json::json!({
            "from": "marketer@example.com",
            "to": "feedback@mailsage.dev",
            "subject": "",
            "text": "   "
        }))
        .await;

    assert_eq!(status, 200);
    assert_eq!(body["status"], "handled_error");
    assert_eq!(body["code"], "NO_CONTENT");

    // no analysis call was made; the notice went to the sender
    assert!(
        harness
            .analysis_server
            .received_requests()
            .await
            .unwrap()
            .is_empty()
    );
    let notice = harness.delivery_request_body().await;
    assert_eq!(notice["to"], "marketer@example.com");
    let text = notice["text"].as_str().unwrap();
    assert!(!text.contains("NO_CONTENT"), "codes never reach the user");
}

#[tokio::test]
async fn analysis_failure_is_acknowledged_with_an_error_notice() {
    let harness = Harness::start(DEFAULT_ID, DEFAULT_ID).await;
    harness.mock_delivery_ok().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .mount(&harness.analysis_server)
        .await;

    let (status, body) = harness
        .post_webhook(serde_json::json!({
            "from": "marketer@example.com",
            "to": "feedback@mailsage.dev",
            "subject": "s",
            "text": "analyze this campaign"
        }))
        .await;

    assert_eq!(status, 200);
    assert_eq!(body["status"], "handled_error");
    assert_eq!(body["code"], "LLM_HTTP_ERROR");

    let notice = harness.delivery_request_body().await;
    let text = notice["text"].as_str().unwrap();
    assert!(text.contains("try again"));
    assert!(!text.contains("500"), "status codes never reach the user");
}

#[tokio::test]
async fn missing_default_persona_is_an_operational_alarm() {
    // store seeded under one id, resolver configured with another
    let harness = Harness::start("seeded-elsewhere", "missing-default").await;

    let (status, body) = harness
        .post_webhook(serde_json::json!({
            "from": "marketer@example.com",
            "to": "unknown@mailsage.dev",
            "subject": "s",
            "text": "hello"
        }))
        .await;

    assert_eq!(status, 500);
    assert_eq!(body["status"], "misconfigured");
    // nothing was sent: this is not a per-request failure
    assert!(
        harness
            .delivery_server
            .received_requests()
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn disallowed_sender_is_rejected_before_any_work() {
    let analysis_server = MockServer::start().await;
    let delivery_server = MockServer::start().await;
    let db_dir = tempfile::tempdir().unwrap();
    let store = SqlitePersonaStore::open(&db_dir.path().join("personas.db"), DEFAULT_ID)
        .await
        .unwrap();

    let mut config = Config::default();
    config.analysis.base_url = format!("{}/v1/chat/completions", analysis_server.uri());
    config.delivery.base_url = format!("{}/emails", delivery_server.uri());
    config.gateway.allowed_senders = vec!["trusted@example.com".into()];

    let state = AppState {
        config: Arc::new(config),
        resolver: Arc::new(PersonaResolver::new(
            store,
            Arc::new(PersonaCache::new(Duration::from_secs(3600))),
            DEFAULT_ID,
            Duration::from_secs(5),
        )),
        analysis: Arc::new(AnalysisClient::new("http://127.0.0.1:1", None)),
        delivery: Arc::new(DeliveryClient::new(
            "http://127.0.0.1:1",
            None,
            Duration::from_millis(10),
        )),
        download: reqwest::Client::new(),
    };

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, build_router(state)).await.unwrap();
    });

    let response = reqwest::Client::new()
        .post(format!("http://{addr}/webhooks/inbound"))
        .json(&serde_json::json!({
            "from": "stranger@example.com",
            "to": "feedback@mailsage.dev",
            "text": "hi"
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 403);
}

/// Cached default-persona entries must serve repeat traffic to the same
/// unknown alias without another durable lookup, which also keeps persona
/// data bit-identical between the two responses.
#[tokio::test]
async fn repeat_unknown_recipient_hits_cache() {
    let harness = Harness::start(DEFAULT_ID, DEFAULT_ID).await;
    harness.mock_analysis_ok("fb").await;
    harness.mock_delivery_ok().await;

    for _ in 0..2 {
        let (status, body) = harness
            .post_webhook(serde_json::json!({
                "from": "marketer@example.com",
                "to": "mystery@mailsage.dev",
                "subject": "s",
                "text": "campaign copy"
            }))
            .await;
        assert_eq!(status, 200);
        assert_eq!(body["status"], "processed");
    }

    let requests = harness.analysis_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
    let first: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    let second: serde_json::Value = serde_json::from_slice(&requests[1].body).unwrap();
    assert_eq!(first["messages"][0], second["messages"][0]);
}
