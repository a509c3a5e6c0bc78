use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use quay_bq_export_core::config::{ApiConfig, RetryPolicy};
use quay_bq_export_core::contract::{MockLogsTransport, PageRequest, PageSource};
use quay_bq_export_core::fetch::{HttpTransport, PageFetcher};
use quay_bq_export_core::model::{DateWindow, EntryKind};
use quay_bq_export_core::{ExportError, TransportError};

const PAGE_BODY: &str = r#"{
  "start_time": "Thu, 01 Jun 2023 00:00:00 -0000",
  "end_time": "Fri, 02 Jun 2023 00:00:00 -0000",
  "next_page": "p1",
  "logs": [
    {
      "ip": "10.0.0.1",
      "kind": "pull_repo",
      "datetime": "Thu, 01 Jun 2023 10:00:00 -0000",
      "metadata": {
        "repo": "cert-manager-controller",
        "tag": "v1.12.0",
        "namespace": "jetstack",
        "public": true,
        "resolved_ip": {"sync_token": "abc", "region": "us-east-1", "service": "s3", "provider": "aws"}
      }
    }
  ]
}"#;

fn api() -> ApiConfig {
    ApiConfig {
        base_url: "https://quay.example.com/".to_string(),
        namespace: "jetstack".to_string(),
        repository: "cert-manager-controller".to_string(),
        auth_token: "secret-token".to_string(),
    }
}

fn no_delay() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        delay: Duration::ZERO,
        ..RetryPolicy::default()
    }
}

fn june_first() -> DateWindow {
    DateWindow::new(NaiveDate::from_ymd_opt(2023, 6, 1).unwrap())
}

#[tokio::test]
async fn succeeds_on_third_attempt_after_two_connection_failures() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&calls);

    let mut transport = MockLogsTransport::new();
    transport.expect_get().times(3).returning(move |_req: &PageRequest| {
        let attempt = counter.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt < 3 {
            Err(TransportError::Connection(format!("connection reset (attempt {attempt})")))
        } else {
            Ok(PAGE_BODY.to_string())
        }
    });

    let fetcher = PageFetcher::new(transport, api(), no_delay());
    let page = fetcher
        .fetch(None, june_first())
        .await
        .expect("third attempt should succeed");

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(page.logs.len(), 1);
    assert_eq!(page.next_token(), Some("p1"));
    assert_eq!(page.logs[0].kind, EntryKind::PullRepo);
    assert_eq!(page.logs[0].metadata.resolved_ip.service, serde_json::json!("s3"));
}

#[tokio::test]
async fn gives_up_after_three_connection_failures() {
    let mut transport = MockLogsTransport::new();
    transport
        .expect_get()
        .times(3)
        .returning(|_req: &PageRequest| Err(TransportError::Connection("refused".into())));

    let fetcher = PageFetcher::new(transport, api(), no_delay());
    let err = fetcher.fetch(None, june_first()).await.unwrap_err();

    match err {
        ExportError::TransientNetwork { attempts, message } => {
            assert_eq!(attempts, 3);
            assert!(message.contains("refused"));
        }
        other => panic!("expected TransientNetwork, got {other:?}"),
    }
}

#[tokio::test]
async fn error_status_is_not_retried() {
    let mut transport = MockLogsTransport::new();
    transport.expect_get().times(1).returning(|_req: &PageRequest| {
        Err(TransportError::Status {
            status: 401,
            body: "unauthorized".into(),
        })
    });

    let fetcher = PageFetcher::new(transport, api(), no_delay());
    let err = fetcher.fetch(None, june_first()).await.unwrap_err();
    assert!(matches!(err, ExportError::Protocol(ref m) if m.contains("401")), "{err:?}");
}

#[tokio::test]
async fn malformed_timestamp_is_a_protocol_error() {
    let body = PAGE_BODY.replace("Thu, 01 Jun 2023 10:00:00 -0000", "2023-06-01T10:00:00Z");
    let mut transport = MockLogsTransport::new();
    transport
        .expect_get()
        .times(1)
        .returning(move |_req: &PageRequest| Ok(body.clone()));

    let fetcher = PageFetcher::new(transport, api(), no_delay());
    let err = fetcher.fetch(None, june_first()).await.unwrap_err();
    assert!(matches!(err, ExportError::Protocol(_)), "{err:?}");
}

#[tokio::test]
async fn request_carries_day_window_token_and_credential() {
    let mut transport = MockLogsTransport::new();
    transport
        .expect_get()
        .withf(|req: &PageRequest| {
            req.url == "https://quay.example.com/api/v1/repository/jetstack/cert-manager-controller/logs"
                && req.query_value("starttime") == Some("06/01/2023")
                && req.query_value("endtime") == Some("06/01/2023")
                && req.query_value("next_page") == Some("p1")
                && req.bearer_token == "secret-token"
        })
        .times(1)
        .returning(|_req: &PageRequest| Ok(PAGE_BODY.to_string()));

    let fetcher = PageFetcher::new(transport, api(), no_delay());
    fetcher
        .fetch(Some("p1".to_string()), june_first())
        .await
        .expect("fetch should succeed");
}

#[test]
fn first_page_request_has_no_token() {
    let fetcher = PageFetcher::new(MockLogsTransport::new(), api(), no_delay());
    let req = fetcher.build_request(None, june_first());
    assert_eq!(req.query_value("next_page"), None);

    let req = fetcher.build_request(Some(""), june_first());
    assert_eq!(req.query_value("next_page"), None);
}

#[tokio::test(start_paused = true)]
async fn waits_the_fixed_delay_between_attempts() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&calls);

    let mut transport = MockLogsTransport::new();
    transport.expect_get().times(3).returning(move |_req: &PageRequest| {
        if counter.fetch_add(1, Ordering::SeqCst) < 2 {
            Err(TransportError::Connection("connection refused".into()))
        } else {
            Ok(PAGE_BODY.to_string())
        }
    });

    let delay = Duration::from_secs(5);
    let fetcher = PageFetcher::new(
        transport,
        api(),
        RetryPolicy {
            max_attempts: 3,
            delay,
            ..RetryPolicy::default()
        },
    );

    let started = tokio::time::Instant::now();
    fetcher.fetch(None, june_first()).await.unwrap();
    let elapsed = started.elapsed();

    assert!(elapsed >= delay * 2, "waited {elapsed:?}");
    assert!(elapsed < delay * 3, "waited {elapsed:?}");
}

#[tokio::test]
async fn stalled_server_is_a_retryable_connection_failure() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accepted = Arc::new(AtomicU32::new(0));
    let accepted_in_server = Arc::clone(&accepted);
    let server = tokio::spawn(async move {
        let mut held = Vec::new();
        loop {
            let (socket, _) = listener.accept().await.unwrap();
            accepted_in_server.fetch_add(1, Ordering::SeqCst);
            held.push(socket);
        }
    });

    let transport = HttpTransport::with_timeout(Duration::from_millis(200)).unwrap();
    let fetcher = PageFetcher::new(
        transport,
        ApiConfig {
            base_url: format!("http://{addr}"),
            ..api()
        },
        RetryPolicy {
            max_attempts: 2,
            delay: Duration::from_millis(10),
            request_timeout: Duration::from_millis(200),
        },
    );

    let err = tokio::time::timeout(Duration::from_secs(10), fetcher.fetch(None, june_first()))
        .await
        .expect("request must not hang")
        .unwrap_err();

    assert!(
        matches!(err, ExportError::TransientNetwork { attempts: 2, .. }),
        "got {err:?}"
    );
    assert_eq!(accepted.load(Ordering::SeqCst), 2);
    server.abort();
}
