//! End-to-end tests over real I/O.
//!
//! HTTP failures come from a wiremock server hit through `reqwest`, so the
//! reqwest adapter, the classifier and the retry executor are exercised
//! together. Reports go through a `FileStore` in a temp directory.

use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

use tokio_test::{assert_err, assert_ok};
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

use meal_resilience::{
    capture::{GlobalFailureCapture, HostSignals},
    error::CoreError,
    failure::{AppError, ErrorCode, ErrorType},
    handler::{ErrorHandler, HandleOptions},
    notify::{ChannelNotifier, LogNotifier, NotificationKind},
    reporter::{ErrorReporter, RemoteSink, ReportContext, WebhookSink, REPORTS_KEY},
    retry::{retry_transient, RetryOptions},
    storage::{FileStore, KeyValueStore, MemoryStore},
};

// ---- Helpers ----------------------------------------------------------------

fn fast_options(max_retries: u32) -> RetryOptions {
    RetryOptions::default()
        .with_max_retries(max_retries)
        .with_base_delay(Duration::from_millis(5))
}

async fn get(http: &reqwest::Client, url: &str) -> Result<reqwest::Response, reqwest::Error> {
    http.get(url).send().await?.error_for_status()
}

// ---- Retry over HTTP --------------------------------------------------------

#[tokio::test]
async fn not_found_is_classified_and_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/menu/42"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let (notifier, mut notifications) = ChannelNotifier::new();
    let handler = ErrorHandler::new(Arc::new(notifier));
    let http = reqwest::Client::new();
    let url = format!("{}/menu/42", server.uri());

    let result = handler
        .execute_with_retry(|| get(&http, &url), fast_options(3))
        .await;

    let err = assert_err!(result);
    assert_eq!(err.status().map(|s| s.as_u16()), Some(404));

    let recent = handler.recent_errors();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].error_type(), ErrorType::NotFound);
    assert_eq!(recent[0].code(), Some(&ErrorCode::Numeric(404)));

    let shown = notifications.recv().await.unwrap();
    assert_eq!(shown.kind, NotificationKind::Error);
    assert_eq!(shown.message.as_deref(), Some(recent[0].user_message()));
}

#[tokio::test]
async fn transient_server_error_recovers_without_side_effects() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/orders"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/orders"))
        .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
        .expect(1)
        .mount(&server)
        .await;

    let (notifier, mut notifications) = ChannelNotifier::new();
    let handler = ErrorHandler::new(Arc::new(notifier));
    let http = reqwest::Client::new();
    let url = format!("{}/orders", server.uri());

    let result = handler
        .execute_with_retry(
            || get(&http, &url),
            fast_options(3).with_retry_predicate(retry_transient),
        )
        .await;

    let response = assert_ok!(result);
    assert_eq!(response.status().as_u16(), 200);
    assert!(handler.recent_errors().is_empty());
    assert!(notifications.try_recv().is_err());
}

#[tokio::test]
async fn persistent_server_error_exhausts_budget() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/checkout"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let (notifier, mut notifications) = ChannelNotifier::new();
    let handler = ErrorHandler::new(Arc::new(notifier));
    let http = reqwest::Client::new();
    let url = format!("{}/checkout", server.uri());

    let result = handler
        .execute_with_retry(
            || get(&http, &url),
            fast_options(2)
                .with_retry_predicate(retry_transient)
                .with_handling(HandleOptions::default().with_title("Checkout failed")),
        )
        .await;

    let err = assert_err!(result);
    assert_eq!(err.status().map(|s| s.as_u16()), Some(500));

    let recent = handler.recent_errors();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].error_type(), ErrorType::Server);

    let shown = notifications.recv().await.unwrap();
    assert_eq!(shown.title, "Checkout failed");
    assert!(notifications.try_recv().is_err());
}

#[tokio::test]
async fn connection_refused_is_network() {
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };

    let handler = ErrorHandler::new(Arc::new(LogNotifier));
    let http = reqwest::Client::new();
    let url = format!("http://{}/menu", addr);

    let result = handler
        .execute_with_retry(|| get(&http, &url), fast_options(0).without_notification())
        .await;

    assert_err!(result);
    let recent = handler.recent_errors();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].error_type(), ErrorType::Network);
}

// ---- Reporting --------------------------------------------------------------

#[tokio::test]
async fn webhook_sink_posts_report_json() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/errors"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let sink = WebhookSink::new(format!("{}/errors", server.uri()));
    let reporter = ErrorReporter::new(Arc::new(MemoryStore::new()));
    reporter.report(
        &AppError::new(ErrorType::Server, "upstream 502", "Server error"),
        ReportContext::custom("sync"),
    );
    let report = reporter.reports().unwrap().remove(0);

    assert_ok!(sink.submit(&report).await);

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["error"]["type"], "SERVER");
    assert_eq!(body["context"]["kind"], "custom");
    assert_eq!(body["context"]["label"], "sync");
}

#[tokio::test]
async fn webhook_sink_rejected_status_is_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let sink = WebhookSink::new(server.uri());
    let reporter = ErrorReporter::new(Arc::new(MemoryStore::new()));
    reporter.report(
        &AppError::new(ErrorType::Client, "bad state", "Something went wrong."),
        ReportContext::UnhandledRejection,
    );
    let report = reporter.reports().unwrap().remove(0);

    let err = sink.submit(&report).await.unwrap_err();
    assert!(matches!(err, CoreError::RemoteStatus { status: 500 }));
}

#[test]
fn file_backed_reports_survive_restart() {
    let dir = tempfile::tempdir().unwrap();

    {
        let reporter = ErrorReporter::new(Arc::new(FileStore::open(dir.path()).unwrap()));
        reporter.set_location("/plans/weekly");
        for n in 0..55 {
            reporter.report(
                &AppError::new(ErrorType::Network, format!("offline #{}", n), "Check your connection"),
                ReportContext::UnhandledRejection,
            );
        }
    }

    let store = FileStore::open(dir.path()).unwrap();
    assert!(store.get(REPORTS_KEY).unwrap().is_some());

    let reporter = ErrorReporter::new(Arc::new(store));
    let reports = reporter.reports().unwrap();
    assert_eq!(reports.len(), 50);
    assert_eq!(reports[0].error.message(), "offline #5");
    assert_eq!(reports[49].location.as_deref(), Some("/plans/weekly"));
}

// ---- Global capture ---------------------------------------------------------

#[test]
fn panic_is_captured_as_uncaught_error() {
    let reporter = Arc::new(ErrorReporter::new(Arc::new(MemoryStore::new())));
    let capture = GlobalFailureCapture::new(reporter.clone());
    assert!(capture.install(&HostSignals::process()));
    HostSignals::forward_panics();
    HostSignals::forward_panics();

    let joined = std::thread::spawn(|| panic!("pantry index corrupted")).join();
    assert!(joined.is_err());

    let reports = reporter.reports().unwrap();
    let report = reports
        .iter()
        .find(|r| r.error.message() == "pantry index corrupted")
        .expect("panic should be reported");
    assert_eq!(report.error.error_type(), ErrorType::Client);
    match &report.context {
        ReportContext::UncaughtError { location, line, .. } => {
            assert!(location.as_deref().unwrap().ends_with("resilience_integration.rs"));
            assert!(line.is_some());
        }
        other => panic!("unexpected context: {:?}", other),
    }
}
